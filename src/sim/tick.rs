//! Frame driver
//!
//! Advances the world by one rendered frame. Phases run strictly in order:
//! state machine, movement, projectiles, hit detection, arbitration, hit
//! application, cleanup.

use super::arbitration::{HitSource, arbitrate};
use super::collision;
use super::geom::Rect;
use super::hits::{collect_melee_hits, collect_projectile_hits};
use super::host::{CombatantView, EffectRequest, FrameReport, HurtboxProvider, MusicClock};
use super::input::ControlIntent;
use super::machine::{self, MachineContext, Peer};
use super::world::SimulationWorld;

/// Advance the world by one frame. `inputs[i]` drives combatant `i`; missing
/// entries count as no input.
pub fn tick<H: HurtboxProvider + MusicClock>(
    world: &mut SimulationWorld,
    inputs: &[ControlIntent],
    host: &H,
    dt: f32,
) -> FrameReport {
    let dt = world.settings.clamp_dt(dt, world.frames_since_start);
    world.frame += 1;
    world.frames_since_start = world.frames_since_start.saturating_add(1);

    // Slow motion counts down in real time
    let sim_dt = if world.slow_motion > 0.0 {
        world.slow_motion = (world.slow_motion - dt).max(0.0);
        dt * world.settings.slow_motion_scale
    } else {
        dt
    };
    world.stage.rhythm.advance(dt);

    let mut report = FrameReport {
        frame: world.frame,
        dt,
        sim_dt,
        ..Default::default()
    };
    if world.match_over() {
        finish(world, &mut report);
        return report;
    }

    let music_ms = host.music_time_ms();
    let beat = world.stage.rhythm.classify(music_ms);
    let in_beat_window = world.stage.rhythm.in_window(music_ms);

    // State machine, against a frame-start snapshot of everyone
    let peers: Vec<Peer> = world.combatants.iter().map(Peer::of).collect();
    let idle = ControlIntent::default();
    let mut spawns = Vec::new();
    {
        let ctx = MachineContext {
            terrain: &world.stage.terrain,
            descriptors: &world.descriptors,
            settings: &world.settings,
            beat,
            in_beat_window,
            peers: &peers,
        };
        for (i, c) in world.combatants.iter_mut().enumerate() {
            if c.eliminated {
                continue;
            }
            let intent = inputs.get(i).unwrap_or(&idle);
            let events = machine::step(c, intent, &ctx, sim_dt);
            report.effects.extend(events.effects);
            if let Some((spec, on_beat)) = events.projectile {
                spawns.push((i, spec, on_beat));
            }
        }
    }
    for (owner, spec, on_beat) in spawns {
        world.spawn_projectile(owner, spec, on_beat);
    }

    // Movement
    let mut deaths = Vec::new();
    for (i, c) in world.combatants.iter_mut().enumerate() {
        if c.eliminated || c.is_frozen() || c.is_grabbed() {
            continue;
        }
        let moved = collision::integrate(c, &world.stage.terrain, &world.settings, sim_dt);
        report.effects.extend(moved.effects);
        if let Some(cause) = moved.kill {
            deaths.push((i, cause, c.center()));
        }
    }
    for (i, cause, at) in deaths {
        report.effects.push(EffectRequest::at("ko", at));
        report.kills.push(world.handle_kill(i, cause));
    }

    for projectile in &mut world.projectiles {
        projectile.advance(&world.stage.terrain, sim_dt);
    }

    // Hit detection
    let hurtboxes: Vec<Rect> = world.combatants.iter().map(|c| host.hurtbox(c)).collect();
    let mut pending = collect_melee_hits(&world.combatants, &hurtboxes);
    pending.extend(collect_projectile_hits(
        &mut world.projectiles,
        &world.combatants,
        &hurtboxes,
        &world.descriptors,
    ));
    // A swing strikes each target once even when arbitration cancels it
    for hit in &pending {
        if !matches!(hit.source, HitSource::Melee | HitSource::Ultimate) {
            continue;
        }
        let attack = world
            .combatants
            .iter_mut()
            .find(|c| c.id == hit.attacker)
            .and_then(|c| c.attack.as_mut());
        if let Some(attack) = attack {
            if !attack.hit_log.contains(&hit.target) {
                attack.hit_log.push(hit.target);
            }
        }
    }

    // Arbitration, then exactly one application per target
    let resolution = arbitrate(pending);
    report.clanks = resolution.clanks.len() as u32;
    for clank in &resolution.clanks {
        report.effects.push(EffectRequest::at("clank", clank.position));
    }
    for hit in &resolution.winners {
        world.apply_hit(hit, &mut report.effects);
    }

    // Cleanup
    world.projectiles.retain(|p| p.alive);
    finish(world, &mut report);
    if report.match_over {
        match report.winner {
            Some(id) => log::info!("Match over on frame {}: combatant {id} wins", world.frame),
            None => log::info!("Match over on frame {}: no combatants left", world.frame),
        }
    }
    report
}

fn finish(world: &SimulationWorld, report: &mut FrameReport) {
    report.combatants = world.combatants.iter().map(CombatantView::of).collect();
    report.match_over = world.match_over();
    report.winner = world.winner();
}

#[cfg(test)]
mod tests {
    use glam::Vec2;

    use super::*;
    use crate::consts::SIM_DT;
    use crate::settings::Settings;
    use crate::sim::descriptor::{Archetype, DescriptorTable};
    use crate::sim::host::{Headless, KillCause};
    use crate::sim::input::Button;
    use crate::sim::world::Stage;

    fn world(settings: Settings) -> SimulationWorld {
        SimulationWorld::new(
            Stage::proving_ground(),
            &[Archetype::Striker, Archetype::Blinker],
            DescriptorTable::standard(),
            settings,
        )
    }

    fn settle(world: &mut SimulationWorld, frames: usize) {
        for _ in 0..frames {
            tick(world, &[], &Headless, SIM_DT);
        }
    }

    #[test]
    fn test_combatants_land_on_stage() {
        let mut w = world(Settings::default());
        settle(&mut w, 120);
        for c in &w.combatants {
            assert!(c.grounded, "combatant {} not grounded", c.id);
            assert!((c.pos.y + c.size.y - 700.0).abs() < 1.0);
        }
    }

    #[test]
    fn test_hard_kill_respawn_round_trip() {
        let mut w = world(Settings::default());
        settle(&mut w, 60);
        let c = &mut w.combatants[0];
        c.percent = 85.0;
        c.pos = Vec2::new(560.0, 1300.0);
        c.vel = Vec2::new(0.0, 200.0);
        c.grounded = false;

        let report = tick(&mut w, &[], &Headless, SIM_DT);
        assert_eq!(report.kills.len(), 1);
        assert_eq!(report.kills[0].cause, KillCause::HardKill);
        let c = &w.combatants[0];
        assert_eq!(c.percent, 0.0);
        assert_eq!(c.vel, Vec2::ZERO);
        assert!(c.is_invincible());
        assert_eq!(c.stocks, w.settings.stocks - 1);

        let grace = w.settings.respawn_freeze_seconds + w.settings.respawn_grace_seconds;
        settle(&mut w, (grace / SIM_DT) as usize + 10);
        assert!(!w.combatants[0].is_invincible());

        // Vulnerable again
        let beside = w.combatants[0].pos + Vec2::new(30.0, 0.0);
        let attacker = &mut w.combatants[1];
        attacker.pos = beside;
        attacker.facing = crate::sim::geom::Facing::Left;
        let light = ControlIntent {
            light: Button::tap(),
            ..Default::default()
        };
        tick(&mut w, &[ControlIntent::default(), light], &Headless, SIM_DT);
        settle(&mut w, 20);
        assert!(w.combatants[0].percent > 0.0);
    }

    #[test]
    fn test_light_attack_lands_once() {
        let mut w = world(Settings::default());
        settle(&mut w, 90);
        w.combatants[1].pos.x = w.combatants[0].pos.x + 50.0;
        w.combatants[0].facing = crate::sim::geom::Facing::Right;

        let light = ControlIntent {
            light: Button::tap(),
            ..Default::default()
        };
        tick(&mut w, &[light], &Headless, SIM_DT);
        settle(&mut w, 30);
        assert_eq!(w.combatants[1].percent, 5.0);
        assert!(w.combatants[0].meter.current > 0.0);
    }

    #[test]
    fn test_elimination_ends_match() {
        let settings = Settings {
            stocks: 1,
            ..Default::default()
        };
        let mut w = world(settings);
        settle(&mut w, 30);
        w.combatants[1].pos = Vec2::new(1000.0, -600.0);

        let report = tick(&mut w, &[], &Headless, SIM_DT);
        assert!(report.match_over);
        assert_eq!(report.winner, Some(1));
        assert!(report.combatants[1].eliminated);

        // Frozen once over
        let pos = w.combatants[0].pos;
        let report = tick(&mut w, &[], &Headless, SIM_DT);
        assert!(report.match_over);
        assert_eq!(w.combatants[0].pos, pos);
    }

    #[test]
    fn test_startup_frames_clamp_dt() {
        let mut w = world(Settings::default());
        let report = tick(&mut w, &[], &Headless, 0.5);
        assert_eq!(report.dt, SIM_DT);

        w.frames_since_start = w.settings.startup_clamp_frames;
        let report = tick(&mut w, &[], &Headless, 0.5);
        assert_eq!(report.dt, crate::consts::MAX_DT);
    }

    #[test]
    fn test_slow_motion_scales_sim_dt() {
        let mut w = world(Settings::default());
        settle(&mut w, 20);
        w.slow_motion = 0.5;
        let report = tick(&mut w, &[], &Headless, SIM_DT);
        assert_eq!(report.sim_dt, SIM_DT * w.settings.slow_motion_scale);
        assert!(w.slow_motion < 0.5);
    }

    /// Button held for `len` frames out of every `period`, starting at `start`
    fn pulse(frame: usize, period: usize, start: usize, len: usize) -> Button {
        let down = |f: usize| (start..start + len).contains(&(f % period));
        Button::from_levels(frame > 0 && down(frame - 1), down(frame))
    }

    fn scripted(frame: usize) -> Vec<ControlIntent> {
        let a = ControlIntent {
            move_x: if frame % 120 < 60 { 1.0 } else { -0.5 },
            jump: pulse(frame, 45, 0, 1),
            light: pulse(frame, 20, 0, 2),
            heavy: pulse(frame, 90, 30, 25),
            special: pulse(frame, 70, 5, 1),
            ..Default::default()
        };
        let b = ControlIntent {
            move_x: -1.0,
            light: pulse(frame, 25, 3, 1),
            grab: pulse(frame, 100, 50, 10),
            roll: pulse(frame, 80, 10, 1),
            ..Default::default()
        };
        vec![a, b]
    }

    #[test]
    fn test_determinism() {
        let mut a = world(Settings::default());
        let mut b = world(Settings::default());
        for frame in 0..600 {
            let inputs = scripted(frame);
            let ra = tick(&mut a, &inputs, &Headless, SIM_DT);
            let rb = tick(&mut b, &inputs, &Headless, SIM_DT);
            assert_eq!(ra, rb, "diverged on frame {frame}");
        }
    }
}
