//! Hit generation
//!
//! Turns active attack windows and live projectiles into pending hits. Nothing
//! here applies damage; the frame driver hands the batch to arbitration.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::arbitration::{HitSource, PendingHit};
use super::damage::distance_scaled_stun;
use super::descriptor::{Archetype, AttackDescriptor, AttackKind, DescriptorTable, ProjectileSpec};
use super::geom::{Facing, Rect};
use super::state::{ActiveAttack, AttackFamily, Combatant, Phase, UltimateKind};
use super::terrain::{MaskLayer, StageTerrain};
use crate::consts::MAX_STEP_PIXELS;

/// Descriptor hitbox placed in world space, mirrored for left facing
pub fn hitbox_world(c: &Combatant, desc: &AttackDescriptor) -> Rect {
    let hb = desc.hitbox;
    let x = match c.facing {
        Facing::Right => c.pos.x + hb.x,
        Facing::Left => c.pos.x + c.size.x - (hb.x + hb.w),
    };
    Rect::new(x, c.pos.y + hb.y, hb.w, hb.h)
}

/// Whether an attack's current phase deals melee damage
pub fn is_hitting(attack: &ActiveAttack) -> bool {
    match &attack.family {
        AttackFamily::Strike(s) => s.phase == Phase::Active && attack.kind != AttackKind::Projectile,
        AttackFamily::Charge(c) => c.phase == Phase::Release,
        AttackFamily::Slam(s) => s.phase == Phase::Impact,
        AttackFamily::Grab(g) => g.phase == Phase::Active && g.target.is_none(),
        AttackFamily::Ultimate(u) => matches!(
            (u.kind, u.phase),
            (UltimateKind::Barrage, Phase::Active) | (UltimateKind::Blink, Phase::Finish)
        ),
    }
}

fn overlap_center(a: &Rect, b: &Rect) -> Vec2 {
    let left = a.left().max(b.left());
    let right = a.right().min(b.right());
    let top = a.top().max(b.top());
    let bottom = a.bottom().min(b.bottom());
    Vec2::new((left + right) * 0.5, (top + bottom) * 0.5)
}

fn can_be_hit(target: &Combatant) -> bool {
    !target.eliminated && !target.is_invincible()
}

/// Pending hits from every active melee/ultimate window and grab throw.
/// `hurtboxes` is indexed like `combatants`.
pub fn collect_melee_hits(combatants: &[Combatant], hurtboxes: &[Rect]) -> Vec<PendingHit> {
    let mut hits = Vec::new();
    for attacker in combatants {
        if attacker.eliminated {
            continue;
        }
        let Some(attack) = &attacker.attack else {
            continue;
        };
        let source = match attack.family {
            AttackFamily::Ultimate(_) => HitSource::Ultimate,
            _ => HitSource::Melee,
        };
        let pending = |target: &Combatant, contact: Vec2| PendingHit {
            attacker: attacker.id,
            target: target.id,
            attack: attack.kind,
            descriptor: Some(attack.descriptor.clone()),
            source,
            stun_override: None,
            charge_seconds: attack.charge_seconds(),
            combo_multiplier: attacker.rhythm.multiplier(),
            on_beat: attack.on_beat,
            facing: attacker.facing,
            origin: attacker.center(),
            contact,
        };

        // Throw: the held target is hit without a hurtbox test
        if let AttackFamily::Grab(g) = &attack.family {
            if g.phase == Phase::Release {
                if let Some(target) = g
                    .target
                    .filter(|t| !attack.hit_log.contains(t))
                    .and_then(|t| combatants.iter().find(|c| c.id == t))
                    .filter(|t| can_be_hit(t))
                {
                    hits.push(pending(target, target.center()));
                }
                continue;
            }
        }

        if !is_hitting(attack) {
            continue;
        }
        let hitbox = hitbox_world(attacker, &attack.descriptor);
        for (target, hurtbox) in combatants.iter().zip(hurtboxes) {
            if target.id == attacker.id || !can_be_hit(target) || attack.hit_log.contains(&target.id) {
                continue;
            }
            if hitbox.intersects(hurtbox) {
                hits.push(pending(target, overlap_center(&hitbox, hurtbox)));
            }
        }
    }
    hits
}

/// A thrown straight-line projectile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projectile {
    pub id: u32,
    pub owner: u32,
    pub owner_archetype: Archetype,
    /// Center position
    pub pos: Vec2,
    pub vel: Vec2,
    pub traveled: f32,
    pub spec: ProjectileSpec,
    pub combo_multiplier: f32,
    pub on_beat: bool,
    pub alive: bool,
}

impl Projectile {
    /// Spawn in front of the owner, flying along its facing
    pub fn launch(id: u32, owner: &Combatant, spec: ProjectileSpec, on_beat: bool) -> Self {
        let dir = owner.facing.sign();
        let pos = owner.center() + Vec2::new(dir * (owner.size.x + spec.size.x) * 0.5, 0.0);
        Self {
            id,
            owner: owner.id,
            owner_archetype: owner.archetype,
            pos,
            vel: Vec2::new(dir * spec.speed, 0.0),
            traveled: 0.0,
            spec,
            combo_multiplier: owner.rhythm.multiplier(),
            on_beat,
            alive: true,
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::from_pos_size(self.pos - self.spec.size * 0.5, self.spec.size)
    }

    pub fn facing(&self) -> Facing {
        if self.vel.x < 0.0 { Facing::Left } else { Facing::Right }
    }

    /// Fly for one frame; dies on solid terrain or at max range
    pub fn advance(&mut self, terrain: &StageTerrain, dt: f32) {
        if !self.alive {
            return;
        }
        let travel = self.vel * dt;
        let steps = ((travel.length() / MAX_STEP_PIXELS).ceil() as u32).max(1);
        let step = travel / steps as f32;
        for _ in 0..steps {
            self.pos += step;
            self.traveled += step.length();
            if terrain.classify(self.pos.x, self.pos.y, MaskLayer::Collision).is_solid() {
                self.alive = false;
                return;
            }
            if self.traveled >= self.spec.max_distance {
                self.alive = false;
                return;
            }
        }
    }
}

/// Pending hits from projectiles; a projectile is spent on its first contact.
/// The descriptor is looked up at contact time and may be missing.
pub fn collect_projectile_hits(
    projectiles: &mut [Projectile],
    combatants: &[Combatant],
    hurtboxes: &[Rect],
    descriptors: &DescriptorTable,
) -> Vec<PendingHit> {
    let mut hits = Vec::new();
    for projectile in projectiles.iter_mut().filter(|p| p.alive) {
        let rect = projectile.rect();
        let struck = combatants.iter().zip(hurtboxes).find(|(target, hurtbox)| {
            target.id != projectile.owner && can_be_hit(target) && rect.intersects(hurtbox)
        });
        let Some((target, hurtbox)) = struck else {
            continue;
        };
        projectile.alive = false;
        hits.push(PendingHit {
            attacker: projectile.owner,
            target: target.id,
            attack: AttackKind::Projectile,
            descriptor: descriptors
                .get(projectile.owner_archetype, AttackKind::Projectile)
                .ok()
                .cloned(),
            source: HitSource::Projectile(projectile.id),
            stun_override: Some(distance_scaled_stun(&projectile.spec, projectile.traveled)),
            charge_seconds: 0.0,
            combo_multiplier: projectile.combo_multiplier,
            on_beat: projectile.on_beat,
            facing: projectile.facing(),
            origin: projectile.pos,
            contact: overlap_center(&rect, hurtbox),
        });
    }
    hits
}
