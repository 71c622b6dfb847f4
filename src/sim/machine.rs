//! Combatant state machine
//!
//! Orthogonal sub-machines driven by input intents and timers: timers, respawn
//! freeze, grabbed, roll / air dodge, wall cling / launch, run and jump, and
//! the attack families. Runs before movement each frame; the integrator then
//! resolves the velocity chosen here against terrain.
//!
//! Other combatants are seen only through a [`Peer`] snapshot taken at the
//! start of the frame, so update order never changes the outcome.

use glam::Vec2;

use super::descriptor::{AttackDescriptor, AttackKind, DescriptorTable, ProjectileSpec};
use super::geom::{Facing, Rect};
use super::host::EffectRequest;
use super::input::ControlIntent;
use super::rhythm::BeatQuality;
use super::state::{
    ActiveAttack, AttackFamily, Combatant, InvincibilitySource, Phase, Roll, RollKind, WallState,
};
use super::terrain::{MaskLayer, StageTerrain, TerrainClass};
use super::ultimate;
use crate::approach;
use crate::consts::*;
use crate::settings::Settings;

/// Width of the wall-slide probe beside the body
const WALL_PROBE: f32 = 2.0;

/// Frame-start snapshot of another combatant
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peer {
    pub id: u32,
    pub pos: Vec2,
    pub size: Vec2,
    pub facing: Facing,
    pub eliminated: bool,
    /// Combatant this one is holding in a grab
    pub holding: Option<u32>,
}

impl Peer {
    pub fn of(c: &Combatant) -> Self {
        Self {
            id: c.id,
            pos: c.pos,
            size: c.size,
            facing: c.facing,
            eliminated: c.eliminated,
            holding: c.holding(),
        }
    }

    pub fn center(&self) -> Vec2 {
        self.pos + self.size * 0.5
    }
}

/// Read-only inputs shared by every combatant's update
pub struct MachineContext<'a> {
    pub terrain: &'a StageTerrain,
    pub descriptors: &'a DescriptorTable,
    pub settings: &'a Settings,
    /// Classification of this frame's instant
    pub beat: BeatQuality,
    pub in_beat_window: bool,
    pub peers: &'a [Peer],
}

/// Side effects the frame driver carries out
#[derive(Debug, Clone, Default)]
pub struct MachineEvents {
    /// Spawn a projectile: (spec, on-beat)
    pub projectile: Option<(ProjectileSpec, bool)>,
    pub effects: Vec<EffectRequest>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackStep {
    Continue,
    Finished,
}

/// Advance one combatant by one frame
pub fn step(c: &mut Combatant, intent: &ControlIntent, ctx: &MachineContext, dt: f32) -> MachineEvents {
    let mut events = MachineEvents::default();
    tick_timers(c, dt);

    if c.is_frozen() {
        c.vel = Vec2::ZERO;
        return events;
    }
    if c.is_grabbed() {
        update_grabbed(c, ctx, dt);
        return events;
    }

    if c.is_stunned() {
        if c.grounded {
            c.vel.x = approach(c.vel.x, 0.0, GROUND_FRICTION * dt);
        }
    } else {
        update_roll(c, intent);
        let jumped_off_wall = update_wall(c, intent, ctx.terrain);
        update_movement(c, intent, dt);
        if !jumped_off_wall {
            update_jump(c, intent, ctx.terrain);
        }
        try_start_attack(c, intent, ctx, &mut events);
    }

    advance_attack(c, intent, ctx, dt, &mut events);
    events
}

fn tick_timers(c: &mut Combatant, dt: f32) {
    c.stun = (c.stun - dt).max(0.0);
    for cooldown in c.cooldowns.values_mut() {
        *cooldown = (*cooldown - dt).max(0.0);
    }
    c.roll_cooldown = (c.roll_cooldown - dt).max(0.0);
    c.drop_through = (c.drop_through - dt).max(0.0);
    c.respawn_freeze = (c.respawn_freeze - dt).max(0.0);
    c.tick_invincibility(dt);

    if let Some(roll) = &mut c.roll {
        roll.timer += dt;
        if roll.timer >= roll.duration {
            c.roll = None;
            c.roll_cooldown = ROLL_COOLDOWN;
            c.clear_invincibility(InvincibilitySource::Roll);
        }
    }

    c.wall = match c.wall {
        WallState::Cling { side, timer } if timer - dt > 0.0 => WallState::Cling {
            side,
            timer: timer - dt,
        },
        WallState::Launch { timer } if timer - dt > 0.0 => WallState::Launch { timer: timer - dt },
        _ => WallState::None,
    };
}

/// Held by a grabber: follow it until released
fn update_grabbed(c: &mut Combatant, ctx: &MachineContext, dt: f32) {
    let Some(link) = &mut c.grabbed else {
        return;
    };
    link.elapsed += dt;
    let (by, elapsed) = (link.by, link.elapsed);
    let timed_out = elapsed >= ctx.settings.grab_timeout_seconds;
    let grabber = ctx
        .peers
        .iter()
        .find(|p| p.id == by)
        .filter(|g| !g.eliminated && g.holding == Some(c.id));

    match grabber {
        Some(g) if !timed_out => {
            c.facing = g.facing.flipped();
            c.pos = Vec2::new(
                g.pos.x + g.facing.sign() * g.size.x * 0.75,
                g.pos.y + g.size.y - c.size.y,
            );
            c.vel = Vec2::ZERO;
            c.attack = None;
            c.roll = None;
            c.wall = WallState::None;
        }
        _ => {
            if timed_out {
                log::debug!("Grab on combatant {} by {} timed out after {:.2}s", c.id, by, elapsed);
            }
            c.grabbed = None;
        }
    }
}

fn update_roll(c: &mut Combatant, intent: &ControlIntent) {
    if c.roll.is_none() && intent.roll.pressed && c.attack.is_none() && c.roll_cooldown <= 0.0 {
        let roll = if c.grounded {
            let dir = Facing::from_axis(intent.move_x).unwrap_or(c.facing);
            c.facing = dir;
            Roll {
                kind: RollKind::Ground,
                timer: 0.0,
                duration: ROLL_SECONDS,
                velocity: Vec2::new(dir.sign() * ROLL_SPEED, 0.0),
            }
        } else {
            let axis = Vec2::new(intent.move_x, intent.move_y);
            let dir = if axis.length_squared() > 0.01 {
                axis.normalize()
            } else {
                Vec2::new(c.facing.sign(), 0.0)
            };
            if intent.holding_down() {
                c.drop_through = DROP_THROUGH_SECONDS;
            }
            Roll {
                kind: RollKind::AirDodge,
                timer: 0.0,
                duration: AIR_DODGE_SECONDS,
                velocity: dir * AIR_DODGE_SPEED,
            }
        };
        c.grant_invincibility(roll.duration * ROLL_INVINCIBLE_FRACTION, InvincibilitySource::Roll);
        c.wall = WallState::None;
        c.roll = Some(roll);
    }

    if let Some(roll) = c.roll {
        match roll.kind {
            RollKind::Ground => c.vel.x = roll.velocity.x,
            RollKind::AirDodge => c.vel = roll.velocity,
        }
    }
}

fn touching_wall_slide(c: &Combatant, terrain: &StageTerrain, side: Facing) -> bool {
    let body = c.body_rect();
    let x = match side {
        Facing::Right => body.right(),
        Facing::Left => body.left() - WALL_PROBE,
    };
    let probe = Rect::new(x, body.top(), WALL_PROBE, body.h);
    terrain.rect_touches(&probe, MaskLayer::WallSlide, &[TerrainClass::WallSlide])
}

/// Wall cling and wall launch; returns true when jump was spent on a launch
fn update_wall(c: &mut Combatant, intent: &ControlIntent, terrain: &StageTerrain) -> bool {
    match c.wall {
        WallState::Cling { side, .. } => {
            let pulling_away = Facing::from_axis(intent.move_x) == Some(side.flipped());
            if c.grounded || pulling_away || !touching_wall_slide(c, terrain, side) {
                c.wall = WallState::None;
            } else if intent.jump.pressed {
                let away = side.flipped();
                c.vel = Vec2::new(away.sign() * WALL_LAUNCH_SPEED.0, -WALL_LAUNCH_SPEED.1);
                c.facing = away;
                c.air_jumps = AIR_JUMPS;
                c.wall = WallState::Launch {
                    timer: WALL_LAUNCH_SECONDS,
                };
                return true;
            }
        }
        WallState::Launch { .. } => {}
        WallState::None => {
            let eligible = !c.grounded && c.vel.y > 0.0 && c.roll.is_none() && c.attack.is_none();
            if let Some(side) = Facing::from_axis(intent.move_x).filter(|_| eligible) {
                if touching_wall_slide(c, terrain, side) {
                    c.facing = side;
                    c.vel.x = 0.0;
                    c.wall = WallState::Cling {
                        side,
                        timer: WALL_CLING_SECONDS,
                    };
                }
            }
        }
    }
    false
}

/// Attacks that take over movement entirely
fn movement_locked(attack: &ActiveAttack) -> bool {
    match &attack.family {
        AttackFamily::Ultimate(_) | AttackFamily::Slam(_) => true,
        AttackFamily::Grab(g) => matches!(g.phase, Phase::Loop | Phase::Release),
        _ => false,
    }
}

fn update_movement(c: &mut Combatant, intent: &ControlIntent, dt: f32) {
    if c.roll.is_some() {
        return;
    }
    match c.wall {
        WallState::Launch { .. } => return,
        WallState::Cling { .. } => {
            c.vel.x = 0.0;
            return;
        }
        WallState::None => {}
    }

    let locked = c.attack.as_ref().is_some_and(movement_locked);
    if c.attack.is_none() {
        if let Some(facing) = Facing::from_axis(intent.move_x) {
            c.facing = facing;
        }
    }

    let axis = if locked { 0.0 } else { intent.move_x.clamp(-1.0, 1.0) };
    if c.grounded {
        let target = axis * RUN_SPEED;
        let rate = if axis == 0.0 { GROUND_FRICTION } else { RUN_ACCEL };
        c.vel.x = approach(c.vel.x, target, rate * dt);
    } else if axis != 0.0 {
        // Air control never brakes knockback beyond air speed
        let target = axis * AIR_SPEED;
        if (target > 0.0 && c.vel.x < target) || (target < 0.0 && c.vel.x > target) {
            c.vel.x = approach(c.vel.x, target, AIR_ACCEL * dt);
        }
    }
}

fn on_platform(c: &Combatant, terrain: &StageTerrain) -> bool {
    let body = c.body_rect();
    let feet = Rect::new(body.left(), body.bottom(), body.w, 1.0);
    terrain.rect_touches(&feet, MaskLayer::Collision, &[TerrainClass::Platform])
        && !terrain.rect_touches(&feet, MaskLayer::Collision, &TerrainClass::SOLID)
}

fn update_jump(c: &mut Combatant, intent: &ControlIntent, terrain: &StageTerrain) {
    if !intent.jump.pressed || c.roll.is_some() || c.attack.as_ref().is_some_and(movement_locked) {
        return;
    }
    if c.grounded {
        c.grounded = false;
        if intent.holding_down() && on_platform(c, terrain) {
            c.drop_through = DROP_THROUGH_SECONDS;
        } else {
            c.vel.y = -JUMP_SPEED;
        }
    } else if c.air_jumps > 0 {
        c.air_jumps -= 1;
        c.vel.y = -JUMP_SPEED;
    }
}

/// Attack slot implied by this frame's buttons and stance
pub fn requested_attack(c: &Combatant, intent: &ControlIntent) -> Option<AttackKind> {
    if intent.ultimate.pressed {
        Some(AttackKind::Ultimate)
    } else if intent.grab.pressed {
        Some(AttackKind::Grab)
    } else if intent.heavy.pressed {
        Some(AttackKind::Heavy)
    } else if intent.special.pressed {
        if !c.grounded && intent.holding_down() {
            Some(AttackKind::Slam)
        } else {
            Some(AttackKind::Projectile)
        }
    } else if intent.light.pressed {
        if intent.holding_up() {
            Some(AttackKind::Launcher)
        } else if c.grounded && c.vel.x.abs() >= DASH_ATTACK_SPEED {
            Some(AttackKind::Dash)
        } else {
            Some(AttackKind::Light)
        }
    } else {
        None
    }
}

/// Gate for entering an attack state
pub fn can_start(c: &Combatant, kind: AttackKind, desc: &AttackDescriptor) -> bool {
    c.attack.is_none()
        && c.roll.is_none()
        && !c.is_stunned()
        && !c.is_grabbed()
        && !c.is_frozen()
        && c.cooldown(kind) <= 0.0
        && (!desc.requires_ground || c.grounded)
        && c
            .invincibility
            .is_none_or(|i| i.source < InvincibilitySource::Roll)
        && (kind != AttackKind::Ultimate || c.meter.is_full())
}

fn try_start_attack(
    c: &mut Combatant,
    intent: &ControlIntent,
    ctx: &MachineContext,
    events: &mut MachineEvents,
) {
    let Some(kind) = requested_attack(c, intent) else {
        return;
    };
    let desc = ctx.descriptors.resolve(c.archetype, kind);
    if !can_start(c, kind, &desc) {
        return;
    }

    c.rhythm.record(ctx.beat);
    if ctx.beat == BeatQuality::Perfect {
        events
            .effects
            .push(EffectRequest::at("beat_perfect", c.center()).facing(c.facing));
    }
    // Attacking forfeits respawn grace
    c.clear_invincibility(InvincibilitySource::Respawn);
    c.cooldowns.insert(kind, desc.cooldown);
    if kind == AttackKind::Ultimate {
        c.meter.current = 0.0;
    }
    c.wall = WallState::None;
    c.attack = Some(ActiveAttack::new(kind, desc, ctx.in_beat_window, c.archetype));
}

fn enter(phase: &mut Phase, timer: &mut f32, next: Phase) {
    *phase = next;
    *timer = 0.0;
}

fn force_end(id: u32, kind: AttackKind, phase: &mut Phase, timer: &mut f32) {
    log::error!(
        "Combatant {id}: {kind:?} attack in illegal phase '{}', forcing end",
        phase.name()
    );
    enter(phase, timer, Phase::End);
}

fn advance_attack(
    c: &mut Combatant,
    intent: &ControlIntent,
    ctx: &MachineContext,
    dt: f32,
    events: &mut MachineEvents,
) {
    let Some(mut attack) = c.attack.take() else {
        return;
    };
    attack.family.advance_timer(dt);
    let step = if matches!(attack.family, AttackFamily::Ultimate(_)) {
        ultimate::advance(c, &mut attack, ctx.peers, dt, &mut events.effects)
    } else {
        advance_family(c, &mut attack, intent, ctx, dt, events)
    };
    if step == AttackStep::Continue {
        c.attack = Some(attack);
    }
}

fn advance_family(
    c: &mut Combatant,
    attack: &mut ActiveAttack,
    intent: &ControlIntent,
    ctx: &MachineContext,
    dt: f32,
    events: &mut MachineEvents,
) -> AttackStep {
    let ActiveAttack {
        kind,
        descriptor,
        on_beat,
        hit_log,
        family,
    } = attack;
    let kind = *kind;
    let timing = descriptor.timing;

    match family {
        AttackFamily::Strike(s) => match s.phase {
            Phase::Start if s.timer >= timing.startup => enter(&mut s.phase, &mut s.timer, Phase::Active),
            Phase::Start => {}
            Phase::Active => {
                if kind == AttackKind::Projectile && !s.projectile_spawned {
                    s.projectile_spawned = true;
                    if let Some(spec) = descriptor.projectile {
                        events.projectile = Some((spec, *on_beat));
                    }
                }
                if s.timer >= timing.active {
                    enter(&mut s.phase, &mut s.timer, Phase::End);
                }
            }
            Phase::End => return recovered(s.timer, timing.recovery),
            _ => force_end(c.id, kind, &mut s.phase, &mut s.timer),
        },

        AttackFamily::Charge(ch) => match ch.phase {
            Phase::Start if ch.timer >= timing.startup => enter(&mut ch.phase, &mut ch.timer, Phase::Charge),
            Phase::Start => {}
            Phase::Charge => {
                ch.charge += dt;
                let full = ch.charge >= descriptor.max_charge_seconds;
                if !intent.heavy.held || full {
                    ch.charge = ch.charge.min(descriptor.max_charge_seconds.max(0.0));
                    enter(&mut ch.phase, &mut ch.timer, Phase::Release);
                }
            }
            Phase::Release if ch.timer >= timing.active => enter(&mut ch.phase, &mut ch.timer, Phase::End),
            Phase::Release => {}
            Phase::End => return recovered(ch.timer, timing.recovery),
            _ => force_end(c.id, kind, &mut ch.phase, &mut ch.timer),
        },

        AttackFamily::Slam(sl) => match sl.phase {
            Phase::Start => {
                c.vel = Vec2::new(0.0, -JUMP_SPEED * 0.25);
                if sl.timer >= timing.startup * 0.5 {
                    enter(&mut sl.phase, &mut sl.timer, Phase::Hover);
                }
            }
            Phase::Hover => {
                c.vel = Vec2::ZERO;
                if sl.timer >= timing.startup * 0.5 {
                    enter(&mut sl.phase, &mut sl.timer, Phase::Impact);
                    c.vel.y = ctx.settings.max_fall_speed;
                }
            }
            Phase::Impact => {
                c.vel.x = 0.0;
                c.vel.y = c.vel.y.max(ctx.settings.max_fall_speed);
                if c.grounded {
                    events.effects.push(EffectRequest::at(
                        descriptor.effect.clone(),
                        Vec2::new(c.center().x, c.pos.y + c.size.y),
                    ));
                    enter(&mut sl.phase, &mut sl.timer, Phase::End);
                } else if sl.timer >= timing.active + 1.0 {
                    enter(&mut sl.phase, &mut sl.timer, Phase::End);
                }
            }
            Phase::End => return recovered(sl.timer, timing.recovery),
            _ => force_end(c.id, kind, &mut sl.phase, &mut sl.timer),
        },

        AttackFamily::Grab(g) => match g.phase {
            Phase::Start if g.timer >= timing.startup => enter(&mut g.phase, &mut g.timer, Phase::Active),
            Phase::Start => {}
            // Whiffed
            Phase::Active if g.timer >= timing.active => enter(&mut g.phase, &mut g.timer, Phase::End),
            Phase::Active => {}
            Phase::Loop => {
                c.vel.x = 0.0;
                if g.target.is_none() {
                    enter(&mut g.phase, &mut g.timer, Phase::End);
                } else if !intent.grab.held || g.timer >= GRAB_HOLD_SECONDS {
                    // Throw: the held target becomes hittable once more
                    hit_log.clear();
                    enter(&mut g.phase, &mut g.timer, Phase::Release);
                }
            }
            Phase::Release if g.timer >= timing.active => {
                g.target = None;
                enter(&mut g.phase, &mut g.timer, Phase::End);
            }
            Phase::Release => {}
            Phase::End => return recovered(g.timer, timing.recovery),
            _ => force_end(c.id, kind, &mut g.phase, &mut g.timer),
        },

        // Driven by the ultimate sub-machine
        AttackFamily::Ultimate(_) => {}
    }
    AttackStep::Continue
}

fn recovered(timer: f32, recovery: f32) -> AttackStep {
    if timer >= recovery {
        AttackStep::Finished
    } else {
        AttackStep::Continue
    }
}
