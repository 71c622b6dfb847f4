//! Collision and movement integration against raster terrain
//!
//! The tricky part of the core: moving a rectangular body through pixel masks
//! without tunnelling. Each frame is split into substeps no longer than
//! `max_step_pixels`; every substep moves horizontally first, then
//! vertically. Each move sweeps the body's full leading edge across the step,
//! so geometry of any size in the path is struck. Going down, solid ground is
//! preferred over a platform at the same height. Walls always stop the body
//! flush against the struck pixel. Ceilings and floors may bounce an airborne
//! body.
//!
//! After movement the body is tested against the zone layers (hazard, bounce,
//! speed, special) and the kill bands.

use glam::Vec2;

use super::geom::Rect;
use super::host::{EffectRequest, KillCause};
use super::state::{Combatant, InvincibilitySource, WallState};
use super::terrain::{MaskLayer, StageTerrain, TerrainClass};
use crate::approach;
use crate::consts::*;
use crate::settings::Settings;

/// Inset that keeps flush neighbours out of a swept edge
const EDGE_INSET: f32 = 0.01;
/// Shrink applied before overlap tests
const OVERLAP_EPSILON: f32 = 0.01;
/// Classes that stop a falling body
const CATCHING: [TerrainClass; 4] = [
    TerrainClass::Ground,
    TerrainClass::Wall,
    TerrainClass::Ceiling,
    TerrainClass::Platform,
];
/// Emergency unstick search
const UNSTICK_RADIUS: f32 = 64.0;
const UNSTICK_STEP: f32 = 2.0;

/// Result of the emergency unstick routine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Unstick {
    /// Body was not overlapping terrain
    #[default]
    Clear,
    /// Moved to a nearby free offset
    Nudged,
    /// No free offset nearby; sent back to spawn
    Teleported,
}

/// What happened to a combatant during one movement pass
#[derive(Debug, Clone, Default)]
pub struct MoveResult {
    pub substeps: u32,
    pub hit_wall: bool,
    pub hit_ceiling: bool,
    pub landed: bool,
    pub unstick: Unstick,
    pub kill: Option<KillCause>,
    pub effects: Vec<EffectRequest>,
}

/// Substeps needed so no axis moves further than `max_step_pixels` per step
pub fn substep_count(vel: Vec2, dt: f32, max_step_pixels: f32) -> u32 {
    let travel = vel.x.abs().max(vel.y.abs()) * dt;
    if !travel.is_finite() || max_step_pixels <= 0.0 {
        return 1;
    }
    ((travel / max_step_pixels).ceil() as u32).clamp(1, MAX_SUBSTEPS)
}

/// Whether a body rect overlaps any solid pixel
pub fn overlaps_solid(terrain: &StageTerrain, rect: &Rect) -> bool {
    terrain.rect_touches(
        &rect.expand(-OVERLAP_EPSILON, -OVERLAP_EPSILON),
        MaskLayer::Collision,
        &TerrainClass::SOLID,
    )
}

fn supported(c: &Combatant, terrain: &StageTerrain) -> bool {
    let body = c.body_rect();
    let feet = Rect::new(body.left(), body.bottom(), body.w, 1.0);
    let probe = feet.expand(-OVERLAP_EPSILON, 0.0);
    terrain.rect_touches(&probe, MaskLayer::Collision, &TerrainClass::SOLID)
        || (c.drop_through <= 0.0
            && terrain.rect_touches(&probe, MaskLayer::Collision, &[TerrainClass::Platform]))
}

/// Move horizontally; returns true when a wall stopped the body
///
/// The whole leading edge is swept across `dx`, so any solid pixel in the
/// path stops the body flush against its nearest face.
fn move_horizontal(c: &mut Combatant, terrain: &StageTerrain, dx: f32) -> bool {
    if dx == 0.0 {
        return false;
    }
    let body = c.body_rect();
    let band_top = body.top() + EDGE_INSET;
    let band_h = (body.h - 2.0 * EDGE_INSET).max(0.0);
    let swept = if dx > 0.0 {
        Rect::new(body.right(), band_top, dx, band_h)
    } else {
        Rect::new(body.left() + dx, band_top, -dx, band_h)
    };
    let struck = terrain
        .touching(swept, MaskLayer::Collision, &TerrainClass::SOLID)
        .map(|(_, pixel)| pixel);
    let face = if dx > 0.0 {
        struck.map(|p| p.left()).reduce(f32::min)
    } else {
        struck.map(|p| p.right()).reduce(f32::max)
    };

    match face {
        Some(face) => {
            c.pos.x = if dx > 0.0 { face - c.size.x } else { face };
            c.vel.x = 0.0;
            true
        }
        None => {
            c.pos.x += dx;
            false
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VerticalContact {
    None,
    Ceiling,
    Floor,
}

fn move_vertical(c: &mut Combatant, terrain: &StageTerrain, dy: f32) -> VerticalContact {
    if dy == 0.0 {
        return VerticalContact::None;
    }
    let body = c.body_rect();
    let band_left = body.left() + EDGE_INSET;
    let band_w = (body.w - 2.0 * EDGE_INSET).max(0.0);

    if dy < 0.0 {
        // Rising: solids block, platforms are passed through
        let swept = Rect::new(band_left, body.top() + dy, band_w, -dy);
        let ceiling = terrain
            .touching(swept, MaskLayer::Collision, &TerrainClass::SOLID)
            .map(|(_, pixel)| pixel.bottom())
            .reduce(f32::max);
        if let Some(face) = ceiling {
            c.pos.y = face;
            c.vel.y = if c.grounded {
                0.0
            } else {
                c.vel.y.abs() * CEILING_RETENTION
            };
            return VerticalContact::Ceiling;
        }
        c.pos.y += dy;
        return VerticalContact::None;
    }

    let old_bottom = body.bottom();
    let swept = Rect::new(band_left, old_bottom, band_w, dy);
    let drop_through = c.drop_through > 0.0;
    let floor = terrain
        .touching(swept, MaskLayer::Collision, &CATCHING)
        .filter(|(class, pixel)| {
            // Semisolids only catch a body that was above them
            *class != TerrainClass::Platform
                || (!drop_through && old_bottom <= pixel.top() + OVERLAP_EPSILON)
        })
        .min_by(|(a_class, a), (b_class, b)| {
            let a_platform = *a_class == TerrainClass::Platform;
            let b_platform = *b_class == TerrainClass::Platform;
            a.top().total_cmp(&b.top()).then(a_platform.cmp(&b_platform))
        });

    let Some((class, pixel)) = floor else {
        c.pos.y += dy;
        return VerticalContact::None;
    };
    c.pos.y = pixel.top() - c.size.y;
    let tumbling = c.is_stunned() && c.vel.y > TUMBLE_BOUNCE_SPEED;
    if tumbling && class != TerrainClass::Wall {
        c.vel.y = -c.vel.y * BOUNCE_RETENTION;
    } else {
        c.vel.y = 0.0;
        c.grounded = true;
        c.air_jumps = AIR_JUMPS;
        c.wall = WallState::None;
    }
    VerticalContact::Floor
}

/// Push a body out of solid terrain, or send it home
pub fn unstick(c: &mut Combatant, terrain: &StageTerrain) -> Unstick {
    let body = c.body_rect();
    if !overlaps_solid(terrain, &body) {
        return Unstick::Clear;
    }
    const DIRECTIONS: [Vec2; 8] = [
        Vec2::new(0.0, -1.0),
        Vec2::new(-1.0, 0.0),
        Vec2::new(1.0, 0.0),
        Vec2::new(0.0, 1.0),
        Vec2::new(-1.0, -1.0),
        Vec2::new(1.0, -1.0),
        Vec2::new(-1.0, 1.0),
        Vec2::new(1.0, 1.0),
    ];
    let mut radius = UNSTICK_STEP;
    while radius <= UNSTICK_RADIUS {
        for dir in DIRECTIONS {
            let offset = dir * radius;
            if !overlaps_solid(terrain, &body.translate(offset)) {
                c.pos += offset;
                c.vel = Vec2::ZERO;
                return Unstick::Nudged;
            }
        }
        radius += UNSTICK_STEP;
    }
    log::warn!(
        "Combatant {} wedged in terrain at ({:.1}, {:.1}); returning to spawn",
        c.id,
        c.pos.x,
        c.pos.y
    );
    c.pos = c.spawn;
    c.vel = Vec2::ZERO;
    c.grounded = false;
    Unstick::Teleported
}

fn touches(terrain: &StageTerrain, body: &Rect, layer: MaskLayer, class: TerrainClass) -> bool {
    terrain.rect_touches(body, layer, &[class])
}

/// Hazard, bounce and special zones
fn apply_zones(c: &mut Combatant, terrain: &StageTerrain, fall_speed: f32, result: &mut MoveResult) {
    let body = c.body_rect();

    if !c.is_invincible() && touches(terrain, &body, MaskLayer::Hazard, TerrainClass::Hazard) {
        c.percent = (c.percent + HAZARD_DAMAGE).min(999.0);
        c.vel.y = -HAZARD_POP_SPEED;
        c.grounded = false;
        c.grant_invincibility(HAZARD_GRACE_SECONDS, InvincibilitySource::Hazard);
        result
            .effects
            .push(EffectRequest::at("hazard_burn", body.center()));
    }

    if fall_speed > 0.0 && touches(terrain, &body, MaskLayer::Bounce, TerrainClass::Bounce) {
        c.vel.y = -(fall_speed * BOUNCE_RETENTION).max(BOUNCE_MIN_SPEED);
        c.grounded = false;
        result
            .effects
            .push(EffectRequest::at("bounce_pad", Vec2::new(body.center().x, body.bottom())));
    }

    c.in_special_zone = touches(terrain, &body, MaskLayer::Special, TerrainClass::Special);
}

/// Lateral soft kill countdown and vertical hard kill band
pub fn check_kill_zones(
    c: &mut Combatant,
    terrain: &StageTerrain,
    settings: &Settings,
    dt: f32,
) -> Option<KillCause> {
    let bounds = terrain.bounds();
    let center = c.center();
    let invincible = c.is_invincible();

    if !invincible {
        let falling = c.vel.y >= 0.0;
        let beyond = center.y < bounds.top() - settings.hard_kill_margin
            || center.y > bounds.bottom() + settings.hard_kill_margin;
        if falling && beyond {
            return Some(KillCause::HardKill);
        }
        if falling && touches(terrain, &c.body_rect(), MaskLayer::Collision, TerrainClass::Kill) {
            return Some(KillCause::KillPixel);
        }
    }

    let margin = settings.soft_kill_margin;
    let outside = center.x < bounds.left() - margin || center.x > bounds.right() + margin;
    if !outside {
        c.kill_zone = Default::default();
        return None;
    }
    if !c.kill_zone.outside {
        c.kill_zone.outside = true;
        c.kill_zone.timer = settings.soft_kill_seconds;
    }
    // Invincibility pauses the countdown
    if !invincible {
        c.kill_zone.timer -= dt;
        if c.kill_zone.timer <= 0.0 {
            return Some(KillCause::SoftKill);
        }
    }
    None
}

/// Integrate one frame of motion for a combatant
pub fn integrate(
    c: &mut Combatant,
    terrain: &StageTerrain,
    settings: &Settings,
    dt: f32,
) -> MoveResult {
    let mut result = MoveResult {
        unstick: unstick(c, terrain),
        ..Default::default()
    };

    if c.vel.y < 0.0 {
        c.grounded = false;
    }

    // Gravity and drag
    if !c.grounded && !c.ignores_gravity() {
        c.vel.y = (c.vel.y + settings.gravity * dt).min(settings.max_fall_speed);
    }
    if let WallState::Cling { .. } = c.wall {
        c.vel.y = c.vel.y.min(WALL_SLIDE_SPEED);
    }
    if !c.grounded && c.vel.x.abs() > AIR_SPEED {
        let cap = AIR_SPEED * c.vel.x.signum();
        c.vel.x = approach(c.vel.x, cap, AIR_DRAG * dt);
    }

    let speed = if touches(terrain, &c.body_rect(), MaskLayer::Speed, TerrainClass::Speed) {
        SPEED_ZONE_MULTIPLIER
    } else {
        1.0
    };
    let fall_speed = c.vel.y;

    result.substeps = substep_count(
        Vec2::new(c.vel.x * speed, c.vel.y),
        dt,
        settings.max_step_pixels,
    );
    let sub_dt = dt / result.substeps as f32;
    for _ in 0..result.substeps {
        if move_horizontal(c, terrain, c.vel.x * speed * sub_dt) {
            result.hit_wall = true;
        }
        match move_vertical(c, terrain, c.vel.y * sub_dt) {
            VerticalContact::Ceiling => result.hit_ceiling = true,
            VerticalContact::Floor => result.landed = true,
            VerticalContact::None => {}
        }
    }

    if c.grounded && !supported(c, terrain) {
        c.grounded = false;
    }

    apply_zones(c, terrain, fall_speed, &mut result);
    result.kill = check_kill_zones(c, terrain, settings, dt);
    result
}
