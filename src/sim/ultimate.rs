//! Ultimate attack sub-machine
//!
//! Barrage: start -> active (radial pulses) -> end.
//! Blink: start -> teleport (behind the nearest opponent) -> finish -> end.
//! The caller has already advanced the phase timer for this frame.

use glam::Vec2;

use super::host::EffectRequest;
use super::machine::{AttackStep, Peer};
use super::state::{ActiveAttack, AttackFamily, Combatant, InvincibilitySource, Phase, UltimateKind};
use crate::consts::{BLINK_GAP, ULTIMATE_PULSE_SECONDS};

/// Refreshed every frame so it lapses shortly after the ultimate ends
const INVINCIBILITY_REFRESH: f32 = 0.1;

pub fn advance(
    c: &mut Combatant,
    attack: &mut ActiveAttack,
    peers: &[Peer],
    dt: f32,
    effects: &mut Vec<EffectRequest>,
) -> AttackStep {
    let ActiveAttack {
        descriptor,
        hit_log,
        family,
        ..
    } = attack;
    let AttackFamily::Ultimate(u) = family else {
        return AttackStep::Continue;
    };
    let timing = descriptor.timing;

    if u.phase != Phase::End {
        c.grant_invincibility(INVINCIBILITY_REFRESH, InvincibilitySource::Ultimate);
    }

    match (u.kind, u.phase) {
        (_, Phase::Start) => {
            c.vel = Vec2::ZERO;
            if u.timer < timing.startup {
                return AttackStep::Continue;
            }
            match u.kind {
                UltimateKind::Barrage => {
                    u.phase = Phase::Active;
                    u.timer = 0.0;
                    u.pulse_timer = ULTIMATE_PULSE_SECONDS;
                    hit_log.clear();
                    effects.push(EffectRequest::at(descriptor.effect.clone(), c.center()).scaled(1.5));
                }
                UltimateKind::Blink => match nearest_opponent(c, peers) {
                    Some(target) => {
                        blink_behind(c, &target, effects);
                        u.target = Some(target.id);
                        u.phase = Phase::Teleport;
                        u.timer = 0.0;
                    }
                    None => {
                        log::debug!("Combatant {}: blink ultimate found no target", c.id);
                        end(c, &mut u.phase, &mut u.timer);
                    }
                },
            }
        }

        (UltimateKind::Barrage, Phase::Active) => {
            c.vel = Vec2::ZERO;
            u.pulse_timer -= dt;
            if u.pulse_timer <= 0.0 {
                u.pulse_timer += ULTIMATE_PULSE_SECONDS;
                // Each pulse may strike everyone again
                hit_log.clear();
                effects.push(EffectRequest::at(descriptor.effect.clone(), c.center()));
            }
            if u.timer >= timing.active {
                end(c, &mut u.phase, &mut u.timer);
            }
        }

        (UltimateKind::Blink, Phase::Teleport) => {
            c.vel = Vec2::ZERO;
            if u.timer >= timing.active * 0.5 {
                u.phase = Phase::Finish;
                u.timer = 0.0;
                effects.push(
                    EffectRequest::at(descriptor.effect.clone(), c.center()).facing(c.facing),
                );
            }
        }

        (UltimateKind::Blink, Phase::Finish) => {
            c.vel = Vec2::ZERO;
            if u.timer >= timing.active * 0.5 {
                end(c, &mut u.phase, &mut u.timer);
            }
        }

        (_, Phase::End) => {
            c.clear_invincibility(InvincibilitySource::Ultimate);
            if u.timer >= timing.recovery {
                return AttackStep::Finished;
            }
        }

        (kind, phase) => {
            log::error!(
                "Combatant {}: {kind:?} ultimate in illegal phase '{}', forcing end",
                c.id,
                phase.name()
            );
            end(c, &mut u.phase, &mut u.timer);
        }
    }
    AttackStep::Continue
}

fn end(c: &mut Combatant, phase: &mut Phase, timer: &mut f32) {
    *phase = Phase::End;
    *timer = 0.0;
    c.clear_invincibility(InvincibilitySource::Ultimate);
}

/// Closest living opponent by center distance; ties go to the lower id
fn nearest_opponent(c: &Combatant, peers: &[Peer]) -> Option<Peer> {
    let origin = c.center();
    peers
        .iter()
        .filter(|p| p.id != c.id && !p.eliminated)
        .min_by(|a, b| {
            let da = a.center().distance_squared(origin);
            let db = b.center().distance_squared(origin);
            da.total_cmp(&db).then(a.id.cmp(&b.id))
        })
        .copied()
}

/// Reappear just behind the target, facing the same way it does
fn blink_behind(c: &mut Combatant, target: &Peer, effects: &mut Vec<EffectRequest>) {
    effects.push(EffectRequest::at("blink_out", c.center()));
    c.pos = Vec2::new(
        target.pos.x - target.facing.sign() * (c.size.x + BLINK_GAP),
        target.pos.y + target.size.y - c.size.y,
    );
    c.facing = target.facing;
    c.vel = Vec2::ZERO;
    c.wall = Default::default();
    effects.push(EffectRequest::at("blink_in", c.center()).facing(c.facing));
}
