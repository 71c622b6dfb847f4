//! Simulation world
//!
//! One explicit struct owns everything a match mutates: combatants,
//! projectiles, the seeded RNG and frame counters. The frame driver passes it
//! by reference into every component call.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::arbitration::{HitSource, PendingHit};
use super::damage::{
    HitOutcome, KnockbackParams, apply_to_target, charge_ratio, final_knockback, knockback_velocity,
};
use super::descriptor::{Archetype, AttackKind, DescriptorTable, KnockbackKind, ProjectileSpec};
use super::geom::Rect;
use super::hits::Projectile;
use super::host::{EffectRequest, KillCause, KillEvent};
use super::rhythm::RhythmClock;
use super::state::{ActiveAttack, AttackFamily, Combatant, GrabLink, Phase, WallState};
use super::terrain::{MaskLayer, StageTerrain, TerrainClass, TerrainMask};
use crate::consts::*;
use crate::settings::Settings;

/// Terrain, spawn points and tempo of one stage
#[derive(Debug, Clone)]
pub struct Stage {
    pub name: String,
    pub terrain: StageTerrain,
    pub spawn_points: Vec<Vec2>,
    pub rhythm: RhythmClock,
}

impl Stage {
    pub fn new(name: impl Into<String>, terrain: StageTerrain, rhythm: RhythmClock) -> Self {
        Self {
            name: name.into(),
            terrain,
            spawn_points: Vec::new(),
            rhythm,
        }
    }

    pub fn with_spawns(mut self, spawn_points: Vec<Vec2>) -> Self {
        self.spawn_points = spawn_points;
        self
    }

    /// Spawn point for the `index`-th of `count` combatants. Without
    /// configured points, combatants are spread across the upper stage.
    pub fn spawn_for(&self, index: usize, count: usize) -> Vec2 {
        if !self.spawn_points.is_empty() {
            return self.spawn_points[index % self.spawn_points.len()];
        }
        let bounds = self.terrain.bounds();
        let t = (index + 1) as f32 / (count + 1) as f32;
        Vec2::new(bounds.left() + bounds.w * t, bounds.top() + bounds.h * 0.25)
    }

    /// Built-in stage: a main floor over two pits, a semisolid platform,
    /// wall-slide sides, a hazard strip, a bounce pad and a speed lane.
    /// Masks are half resolution to exercise world-to-mask scaling.
    pub fn proving_ground() -> Self {
        let bounds = Rect::new(0.0, 0.0, 1600.0, 900.0);
        let (w, h) = (800, 450);

        let mut collision = TerrainMask::blank(w, h);
        collision.fill_rect(100, 350, 600, 100, TerrainClass::Ground);
        collision.fill_rect(300, 250, 200, 5, TerrainClass::Platform);

        let mut wall_slide = TerrainMask::blank(w, h);
        wall_slide.fill_rect(100, 350, 2, 100, TerrainClass::WallSlide);
        wall_slide.fill_rect(698, 350, 2, 100, TerrainClass::WallSlide);

        let mut hazard = TerrainMask::blank(w, h);
        hazard.fill_rect(640, 345, 40, 5, TerrainClass::Hazard);

        let mut bounce = TerrainMask::blank(w, h);
        bounce.fill_rect(120, 349, 30, 1, TerrainClass::Bounce);

        let mut speed = TerrainMask::blank(w, h);
        speed.fill_rect(330, 300, 140, 50, TerrainClass::Speed);

        let terrain = StageTerrain::new(bounds)
            .with_layer(MaskLayer::Collision, collision)
            .with_layer(MaskLayer::WallSlide, wall_slide)
            .with_layer(MaskLayer::Hazard, hazard)
            .with_layer(MaskLayer::Bounce, bounce)
            .with_layer(MaskLayer::Speed, speed);

        Stage::new("proving_ground", terrain, RhythmClock::new(120.0, 0.0))
            .with_spawns(vec![Vec2::new(560.0, 560.0), Vec2::new(1000.0, 560.0)])
    }
}

/// Everything a match mutates, owned by the frame driver
#[derive(Debug, Clone)]
pub struct SimulationWorld {
    pub stage: Stage,
    /// Ordered by id; index `i` is controller slot `i`
    pub combatants: Vec<Combatant>,
    pub projectiles: Vec<Projectile>,
    pub descriptors: DescriptorTable,
    pub settings: Settings,
    pub rng: Pcg32,
    pub frame: u64,
    /// Frames since (re)start, for the startup dt clamp
    pub frames_since_start: u32,
    /// Remaining slow motion in real seconds
    pub slow_motion: f32,
    pub next_projectile_id: u32,
}

impl SimulationWorld {
    pub fn new(
        mut stage: Stage,
        roster: &[Archetype],
        descriptors: DescriptorTable,
        settings: Settings,
    ) -> Self {
        stage.rhythm.perfect_fraction = settings.beat_perfect_fraction;
        stage.rhythm.window_fraction = settings.beat_window_fraction;

        let combatants = roster
            .iter()
            .enumerate()
            .map(|(i, &archetype)| {
                let spawn = stage.spawn_for(i, roster.len());
                Combatant::new(i as u32 + 1, i as u8, archetype, spawn, settings.stocks, &descriptors)
            })
            .collect();

        log::info!(
            "Match on '{}' with {} combatants, {} stocks, seed {:#x}",
            stage.name,
            roster.len(),
            settings.stocks,
            settings.seed
        );

        Self {
            stage,
            combatants,
            projectiles: Vec::new(),
            descriptors,
            rng: Pcg32::seed_from_u64(settings.seed),
            settings,
            frame: 0,
            frames_since_start: 0,
            slow_motion: 0.0,
            next_projectile_id: 1,
        }
    }

    /// Reset every combatant in place and re-arm the startup clamp
    pub fn restart(&mut self) {
        for c in &mut self.combatants {
            c.reset(self.settings.stocks, &self.descriptors);
        }
        self.projectiles.clear();
        self.stage.rhythm.reset();
        self.rng = Pcg32::seed_from_u64(self.settings.seed);
        self.frame = 0;
        self.frames_since_start = 0;
        self.slow_motion = 0.0;
        self.next_projectile_id = 1;
        log::info!("Match restarted on '{}'", self.stage.name);
    }

    pub fn combatant(&self, id: u32) -> Option<&Combatant> {
        self.combatants.iter().find(|c| c.id == id)
    }

    fn index_of(&self, id: u32) -> Option<usize> {
        self.combatants.iter().position(|c| c.id == id)
    }

    pub fn living(&self) -> impl Iterator<Item = &Combatant> {
        self.combatants.iter().filter(|c| !c.eliminated)
    }

    /// At most one combatant left standing (none left for a solo session)
    pub fn match_over(&self) -> bool {
        let living = self.living().count();
        if self.combatants.len() > 1 {
            living <= 1
        } else {
            living == 0
        }
    }

    pub fn winner(&self) -> Option<u32> {
        if self.combatants.len() > 1 && self.match_over() {
            self.living().next().map(|c| c.id)
        } else {
            None
        }
    }

    pub(crate) fn spawn_projectile(&mut self, owner_index: usize, spec: ProjectileSpec, on_beat: bool) {
        let Some(owner) = self.combatants.get(owner_index) else {
            return;
        };
        let id = self.next_projectile_id;
        self.next_projectile_id += 1;
        self.projectiles.push(Projectile::launch(id, owner, spec, on_beat));
    }

    /// Take a stock; respawn or eliminate
    pub(crate) fn handle_kill(&mut self, index: usize, cause: KillCause) -> KillEvent {
        let freeze = self.settings.respawn_freeze_seconds;
        let grace = self.settings.respawn_grace_seconds;
        let c = &mut self.combatants[index];
        c.stocks = c.stocks.saturating_sub(1);

        if c.stocks == 0 {
            log::info!("Combatant {} eliminated ({:?})", c.id, cause);
            c.eliminated = true;
            c.vel = Vec2::ZERO;
            c.attack = None;
            c.roll = None;
            c.grabbed = None;
            c.invincibility = None;
        } else {
            log::info!(
                "Combatant {} lost a stock ({:?}), {} left",
                c.id,
                cause,
                c.stocks
            );
            c.respawn(freeze, grace, &self.descriptors);
        }

        KillEvent {
            id: c.id,
            cause,
            stocks_left: c.stocks,
        }
    }

    /// Apply one arbitration winner to its target
    pub(crate) fn apply_hit(&mut self, hit: &PendingHit, effects: &mut Vec<EffectRequest>) {
        let Some(desc) = hit.descriptor.as_ref() else {
            return;
        };
        let (Some(ai), Some(ti)) = (self.index_of(hit.attacker), self.index_of(hit.target)) else {
            log::warn!(
                "Hit from {} on {} references a missing combatant",
                hit.attacker,
                hit.target
            );
            return;
        };
        if ai == ti {
            return;
        }
        let jitter = if desc.knockback == KnockbackKind::Launcher {
            self.rng
                .random_range(-LAUNCHER_JITTER_DEGREES..=LAUNCHER_JITTER_DEGREES)
        } else {
            0.0
        };
        let (attacker, target) = pair_mut(&mut self.combatants, ai, ti);

        if hit.source == HitSource::Melee && try_capture(attacker, target) {
            effects.push(EffectRequest::at(desc.effect.clone(), hit.contact).facing(hit.facing));
            return;
        }

        let stacks = attacker.rhythm.consume_stacks();
        let params = KnockbackParams {
            charge_seconds: hit.charge_seconds,
            combo_multiplier: hit.combo_multiplier,
            target_percent: target.percent,
            on_beat: hit.on_beat,
            rhythm_stacks: stacks,
        };
        let damage = hit.damage();
        let knockback = final_knockback(desc, &params);
        let outcome = HitOutcome {
            damage,
            knockback,
            velocity: knockback_velocity(
                desc,
                knockback,
                hit.facing,
                hit.origin,
                target.center(),
                jitter,
            ),
            stun: hit.stun_override.unwrap_or(desc.stun),
        };
        apply_to_target(target, &outcome);

        // Throw ends the hold
        if hit.attack == AttackKind::Grab {
            target.grabbed = None;
        }
        attacker.meter.gain(damage * METER_GAIN_DEALT);
        if desc.knockback == KnockbackKind::Dash && hit.source == HitSource::Melee {
            attacker.vel.x = hit.facing.sign() * DASH_FOLLOW_SPEED;
        }

        if desc.finisher && charge_ratio(desc, hit.charge_seconds) >= 1.0 {
            if let Some(seconds) = desc.slow_motion_seconds {
                log::debug!(
                    "Full charge finisher by {} on {}, slow motion {seconds:.2}s",
                    hit.attacker,
                    hit.target
                );
                self.slow_motion = self.slow_motion.max(seconds);
            }
        }

        effects.push(
            EffectRequest::at(desc.effect.clone(), hit.contact)
                .facing(hit.facing)
                .scaled((1.0 + knockback / 200.0).min(3.0)),
        );
    }
}

/// Grab contact turns into a hold unless the target is committed to an attack
fn try_capture(attacker: &mut Combatant, target: &mut Combatant) -> bool {
    let attacker_id = attacker.id;
    let Some(AttackFamily::Grab(grab)) = attacker.attack.as_mut().map(|a| &mut a.family) else {
        return false;
    };
    if grab.phase != Phase::Active || grab.target.is_some() {
        return false;
    }
    if target.attack.as_ref().is_some_and(ActiveAttack::is_committed) {
        return false;
    }
    grab.target = Some(target.id);
    grab.phase = Phase::Loop;
    grab.timer = 0.0;

    target.grabbed = Some(GrabLink {
        by: attacker_id,
        elapsed: 0.0,
    });
    target.attack = None;
    target.roll = None;
    target.wall = WallState::None;
    target.vel = Vec2::ZERO;
    true
}

fn pair_mut<T>(items: &mut [T], a: usize, b: usize) -> (&mut T, &mut T) {
    if a < b {
        let (left, right) = items.split_at_mut(b);
        (&mut left[a], &mut right[0])
    } else {
        let (left, right) = items.split_at_mut(a);
        (&mut right[0], &mut left[b])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::geom::Facing;

    fn world() -> SimulationWorld {
        SimulationWorld::new(
            Stage::proving_ground(),
            &[Archetype::Striker, Archetype::Brawler],
            DescriptorTable::standard(),
            Settings::default(),
        )
    }

    fn hit(world: &SimulationWorld, attacker: u32, target: u32, kind: AttackKind) -> PendingHit {
        let a = world.combatant(attacker).unwrap();
        let t = world.combatant(target).unwrap();
        PendingHit {
            attacker,
            target,
            attack: kind,
            descriptor: Some(world.descriptors.resolve(a.archetype, kind)),
            source: HitSource::Melee,
            stun_override: None,
            charge_seconds: 0.0,
            combo_multiplier: 1.0,
            on_beat: false,
            facing: a.facing,
            origin: a.center(),
            contact: t.center(),
        }
    }

    fn start(world: &mut SimulationWorld, id: u32, kind: AttackKind, phase: Phase) {
        let index = world.index_of(id).unwrap();
        let c = &mut world.combatants[index];
        let desc = world.descriptors.resolve(c.archetype, kind);
        let mut attack = ActiveAttack::new(kind, desc, false, c.archetype);
        attack.family.set_phase(phase);
        c.attack = Some(attack);
    }

    #[test]
    fn test_roster_spawns_and_ids() {
        let w = world();
        assert_eq!(w.combatants.len(), 2);
        assert_eq!(w.combatants[0].id, 1);
        assert_eq!(w.combatants[1].pos, Vec2::new(1000.0, 560.0));
        assert_eq!(w.combatants[1].facing, Facing::Left);
        assert!(!w.match_over());
        assert_eq!(w.winner(), None);
    }

    #[test]
    fn test_spawn_fallback_spreads_across_bounds() {
        let stage = Stage::new(
            "empty",
            StageTerrain::new(Rect::new(0.0, 0.0, 900.0, 400.0)),
            RhythmClock::new(100.0, 0.0),
        );
        assert_eq!(stage.spawn_for(0, 2), Vec2::new(300.0, 100.0));
        assert_eq!(stage.spawn_for(1, 2), Vec2::new(600.0, 100.0));
    }

    #[test]
    fn test_kill_takes_stock_then_eliminates() {
        let mut w = world();
        w.combatants[1].stocks = 2;
        let event = w.handle_kill(1, KillCause::HardKill);
        assert_eq!(event.stocks_left, 1);
        assert!(!w.combatants[1].eliminated);
        assert!(w.combatants[1].is_frozen());

        let event = w.handle_kill(1, KillCause::SoftKill);
        assert_eq!(event.stocks_left, 0);
        assert!(w.combatants[1].eliminated);
        assert!(w.match_over());
        assert_eq!(w.winner(), Some(1));
    }

    #[test]
    fn test_hit_applies_damage_stun_and_meter() {
        let mut w = world();
        let h = hit(&w, 1, 2, AttackKind::Light);
        let mut effects = Vec::new();
        w.apply_hit(&h, &mut effects);

        let target = w.combatant(2).unwrap();
        assert_eq!(target.percent, 5.0);
        assert!(target.is_stunned());
        assert!(target.vel.x > 0.0 && target.vel.y < 0.0);
        assert_eq!(w.combatant(1).unwrap().meter.current, 5.0 * METER_GAIN_DEALT);
        assert_eq!(effects.len(), 1);
        assert_eq!(effects[0].name, "hit_light");
    }

    #[test]
    fn test_grab_contact_captures() {
        let mut w = world();
        start(&mut w, 1, AttackKind::Grab, Phase::Active);
        let h = hit(&w, 1, 2, AttackKind::Grab);
        w.apply_hit(&h, &mut Vec::new());

        assert_eq!(w.combatant(2).unwrap().grabbed.map(|g| g.by), Some(1));
        assert_eq!(w.combatant(2).unwrap().percent, 0.0);
        assert_eq!(w.combatant(1).unwrap().holding(), Some(2));
    }

    #[test]
    fn test_committed_target_cannot_be_captured() {
        let mut w = world();
        start(&mut w, 1, AttackKind::Grab, Phase::Active);
        start(&mut w, 2, AttackKind::Slam, Phase::Impact);
        let h = hit(&w, 1, 2, AttackKind::Grab);
        w.apply_hit(&h, &mut Vec::new());

        let target = w.combatant(2).unwrap();
        assert!(!target.is_grabbed());
        assert!(target.percent > 0.0);
    }

    #[test]
    fn test_throw_releases_hold() {
        let mut w = world();
        start(&mut w, 1, AttackKind::Grab, Phase::Release);
        w.combatants[1].grabbed = Some(GrabLink { by: 1, elapsed: 0.2 });
        let h = hit(&w, 1, 2, AttackKind::Grab);
        w.apply_hit(&h, &mut Vec::new());

        let target = w.combatant(2).unwrap();
        assert!(!target.is_grabbed());
        assert!(target.percent > 0.0);
        assert_ne!(target.vel, Vec2::ZERO);
    }

    #[test]
    fn test_full_charge_finisher_starts_slow_motion() {
        let mut w = world();
        let mut h = hit(&w, 1, 2, AttackKind::Heavy);
        h.charge_seconds = 0.5;
        w.apply_hit(&h, &mut Vec::new());
        assert_eq!(w.slow_motion, 0.0);

        h.charge_seconds = 1.0;
        w.apply_hit(&h, &mut Vec::new());
        assert!(w.slow_motion > 0.0);
    }

    #[test]
    fn test_rhythm_stacks_consumed_on_hit() {
        let mut w = world();
        w.combatants[0].rhythm.charge_stacks = 2;
        let h = hit(&w, 1, 2, AttackKind::Light);
        w.apply_hit(&h, &mut Vec::new());
        assert_eq!(w.combatants[0].rhythm.charge_stacks, 0);
    }

    #[test]
    fn test_restart_restores_match() {
        let mut w = world();
        w.combatants[0].percent = 80.0;
        w.handle_kill(1, KillCause::KillPixel);
        w.frames_since_start = 500;
        w.restart();

        assert!(w.combatants.iter().all(|c| c.percent == 0.0 && !c.eliminated));
        assert!(w.combatants.iter().all(|c| c.stocks == w.settings.stocks));
        assert_eq!(w.frames_since_start, 0);
        assert_eq!(w.combatants[1].pos, Vec2::new(1000.0, 560.0));
    }
}
