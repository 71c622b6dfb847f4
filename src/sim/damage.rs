//! Damage and knockback model
//!
//! Pure functions from an attack descriptor plus attacker/target context to
//! final damage, knockback magnitude, launch velocity and stun. The only
//! mutation helper is [`apply_to_target`], which writes a computed hit into a
//! combatant.

use glam::Vec2;

use super::descriptor::{AttackDescriptor, ChargeScaling, KnockbackKind, ProjectileSpec};
use super::geom::Facing;
use super::state::{AttackFamily, Combatant, WallState};
use crate::consts::*;
use crate::{launch_direction, lerp};

/// Damage after the finisher combo multiplier
pub fn final_damage(desc: &AttackDescriptor, combo_multiplier: f32) -> f32 {
    if desc.finisher {
        desc.base_damage * combo_multiplier
    } else {
        desc.base_damage
    }
}

/// Charge progress in [0, 1], snapped to stages when the descriptor is staged
pub fn charge_ratio(desc: &AttackDescriptor, charge_seconds: f32) -> f32 {
    if desc.max_charge_seconds <= 0.0 {
        return 0.0;
    }
    let ratio = (charge_seconds / desc.max_charge_seconds).clamp(0.0, 1.0);
    match desc.charge {
        ChargeScaling::None => 0.0,
        ChargeScaling::Linear => ratio,
        ChargeScaling::Staged { stages } if stages > 0 => {
            let stages = stages as f32;
            (ratio * stages).floor() / stages
        }
        ChargeScaling::Staged { .. } => 0.0,
    }
}

/// Rhythm multiplier: banked charge stacks beat a plain on-beat input
pub fn rhythm_bonus(on_beat: bool, rhythm_stacks: u32) -> f32 {
    if rhythm_stacks > 0 {
        1.0 + ((rhythm_stacks + 1) as f32).log2() * RHYTHM_STACK_WEIGHT
    } else if on_beat {
        BEAT_KNOCKBACK_BONUS
    } else {
        1.0
    }
}

/// Everything besides the descriptor that scales knockback
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KnockbackParams {
    pub charge_seconds: f32,
    pub combo_multiplier: f32,
    pub target_percent: f32,
    pub on_beat: bool,
    pub rhythm_stacks: u32,
}

impl Default for KnockbackParams {
    fn default() -> Self {
        Self {
            charge_seconds: 0.0,
            combo_multiplier: 1.0,
            target_percent: 0.0,
            on_beat: false,
            rhythm_stacks: 0,
        }
    }
}

/// Knockback magnitude
pub fn final_knockback(desc: &AttackDescriptor, params: &KnockbackParams) -> f32 {
    // (a) charge, capped
    let ratio = charge_ratio(desc, params.charge_seconds);
    let mut kb = desc.base_knockback * (1.0 + ratio * (desc.charge_knockback_multiplier - 1.0));
    if let Some(cap) = desc.max_knockback {
        kb = kb.min(cap);
    }
    // (b) finisher combo
    if desc.finisher {
        kb *= params.combo_multiplier;
    }
    // (c) target percent
    kb *= (1.0 + params.target_percent.max(0.0) / 100.0).powf(desc.knockback_exponent);
    // (d) global boost, (e) rhythm
    kb * KNOCKBACK_BOOST * rhythm_bonus(params.on_beat, params.rhythm_stacks)
}

/// Launch velocity for a knockback magnitude, `None` when the type applies no
/// velocity change
pub fn knockback_velocity(
    desc: &AttackDescriptor,
    magnitude: f32,
    facing: Facing,
    attacker_center: Vec2,
    target_center: Vec2,
    jitter_degrees: f32,
) -> Option<Vec2> {
    let speed = magnitude * KNOCKBACK_TO_VELOCITY;
    let dir = match desc.knockback {
        KnockbackKind::None => return None,
        KnockbackKind::Standard | KnockbackKind::Dash => {
            let d = launch_direction(desc.angle);
            Vec2::new(d.x * facing.sign(), d.y)
        }
        KnockbackKind::Launcher => {
            let d = launch_direction(desc.angle + jitter_degrees);
            Vec2::new(d.x * facing.sign(), d.y)
        }
        KnockbackKind::Explosion => {
            let away = (target_center - attacker_center).normalize_or_zero();
            if away == Vec2::ZERO { Vec2::NEG_Y } else { away }
        }
    };
    Some(dir * speed)
}

/// Stun for a thrown projectile, interpolated over travel distance
pub fn distance_scaled_stun(spec: &ProjectileSpec, traveled: f32) -> f32 {
    if spec.max_distance <= 0.0 {
        return spec.stun_max;
    }
    let t = (traveled / spec.max_distance).clamp(0.0, 1.0);
    lerp(spec.stun_min, spec.stun_max, t)
}

/// Computed effect of a hit on its target
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitOutcome {
    pub damage: f32,
    pub knockback: f32,
    pub velocity: Option<Vec2>,
    pub stun: f32,
}

/// Write a computed hit into the target
pub fn apply_to_target(target: &mut Combatant, outcome: &HitOutcome) {
    target.percent = (target.percent + outcome.damage).min(999.0);
    target.meter.gain(outcome.damage * METER_GAIN_TAKEN);

    if outcome.stun > 0.0 {
        target.stun = target.stun.max(outcome.stun);
        target.roll = None;
        // Stun interrupts anything short of an ultimate
        if target
            .attack
            .as_ref()
            .is_some_and(|a| !matches!(a.family, AttackFamily::Ultimate(_)))
        {
            target.attack = None;
        }
    }

    if let Some(vel) = outcome.velocity {
        target.vel = vel;
        if target
            .attack
            .as_ref()
            .is_some_and(|a| matches!(a.family, AttackFamily::Charge(_)))
        {
            target.attack = None;
        }
        target.wall = WallState::None;
        target.drop_through = 0.0;
        if vel.y < 0.0 {
            target.grounded = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::descriptor::{Archetype, AttackKind, DescriptorTable};
    use crate::sim::state::{ActiveAttack, InvincibilitySource, Roll, RollKind};
    use proptest::prelude::*;

    fn target_with(archetype: Archetype, attack: Option<AttackKind>) -> Combatant {
        let table = DescriptorTable::standard();
        let mut target = Combatant::new(2, 1, archetype, Vec2::ZERO, 3, &table);
        target.invincibility = None;
        target.attack =
            attack.map(|kind| ActiveAttack::new(kind, table.resolve(archetype, kind), false, archetype));
        target
    }

    fn stun_only(stun: f32) -> HitOutcome {
        HitOutcome {
            damage: 4.0,
            knockback: 0.0,
            velocity: None,
            stun,
        }
    }

    fn plain(base_knockback: f32, exponent: f32) -> AttackDescriptor {
        AttackDescriptor {
            base_knockback,
            knockback_exponent: exponent,
            ..AttackDescriptor::fallback()
        }
    }

    #[test]
    fn test_knockback_grows_with_percent() {
        let desc = plain(100.0, 0.8);
        let at = |percent| {
            final_knockback(
                &desc,
                &KnockbackParams {
                    target_percent: percent,
                    ..Default::default()
                },
            )
        };
        assert!(at(0.0) < at(150.0));
        // 0%: only the global boost applies
        assert!((at(0.0) - 125.0).abs() < 1e-3);
        assert!((at(100.0) - 125.0 * 2f32.powf(0.8)).abs() < 1e-2);
    }

    #[test]
    fn test_finisher_combo_scales_damage_only_for_finishers() {
        let table = DescriptorTable::standard();
        let heavy = table.get(Archetype::Striker, AttackKind::Heavy).unwrap();
        let light = table.get(Archetype::Striker, AttackKind::Light).unwrap();
        assert_eq!(final_damage(heavy, 1.5), heavy.base_damage * 1.5);
        assert_eq!(final_damage(light, 1.5), light.base_damage);
    }

    #[test]
    fn test_charge_scaling_and_cap() {
        let table = DescriptorTable::standard();
        let heavy = table.get(Archetype::Striker, AttackKind::Heavy).unwrap();
        let none = final_knockback(heavy, &KnockbackParams::default());
        let full = final_knockback(
            heavy,
            &KnockbackParams {
                charge_seconds: 5.0,
                ..Default::default()
            },
        );
        // 70 * 1.8 = 126 is under the 140 cap
        assert!((none - 70.0 * 1.25).abs() < 1e-3);
        assert!((full - 126.0 * 1.25).abs() < 1e-3);

        let capped = AttackDescriptor {
            max_knockback: Some(100.0),
            ..AttackDescriptor::clone(heavy)
        };
        let full_capped = final_knockback(
            &capped,
            &KnockbackParams {
                charge_seconds: 1.0,
                ..Default::default()
            },
        );
        assert!((full_capped - 100.0 * 1.25).abs() < 1e-3);
    }

    #[test]
    fn test_staged_charge_snaps_down() {
        let table = DescriptorTable::standard();
        let heavy = table.get(Archetype::Brawler, AttackKind::Heavy).unwrap();
        assert_eq!(charge_ratio(heavy, 0.3), 0.0);
        assert!((charge_ratio(heavy, 0.5) - 1.0 / 3.0).abs() < 1e-6);
        assert_eq!(charge_ratio(heavy, 1.0), 1.0);
    }

    #[test]
    fn test_rhythm_bonus() {
        assert_eq!(rhythm_bonus(false, 0), 1.0);
        assert_eq!(rhythm_bonus(true, 0), BEAT_KNOCKBACK_BONUS);
        // 1 stack: 1 + log2(2) * 0.25
        assert!((rhythm_bonus(true, 1) - 1.25).abs() < 1e-6);
        assert!((rhythm_bonus(false, 3) - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_knockback_directions() {
        let table = DescriptorTable::standard();
        let light = table.get(Archetype::Striker, AttackKind::Light).unwrap();
        let v = knockback_velocity(light, 10.0, Facing::Left, Vec2::ZERO, Vec2::X, 0.0).unwrap();
        assert!(v.x < 0.0 && v.y < 0.0);

        let slam = table.get(Archetype::Striker, AttackKind::Slam).unwrap();
        let v = knockback_velocity(slam, 10.0, Facing::Right, Vec2::ZERO, Vec2::new(-3.0, 0.0), 0.0)
            .unwrap();
        assert!(v.x < 0.0 && v.y.abs() < 1e-3);

        let projectile = table.get(Archetype::Striker, AttackKind::Projectile).unwrap();
        assert!(knockback_velocity(projectile, 10.0, Facing::Right, Vec2::ZERO, Vec2::X, 0.0).is_none());

        let launcher = table.get(Archetype::Striker, AttackKind::Launcher).unwrap();
        let v = knockback_velocity(launcher, 10.0, Facing::Right, Vec2::ZERO, Vec2::X, 0.0).unwrap();
        assert!(v.y < 0.0 && v.y.abs() > v.x.abs() * 5.0);
    }

    #[test]
    fn test_distance_scaled_stun() {
        let spec = ProjectileSpec {
            speed: 100.0,
            size: Vec2::splat(8.0),
            max_distance: 400.0,
            stun_min: 0.2,
            stun_max: 0.6,
        };
        assert!((distance_scaled_stun(&spec, 0.0) - 0.2).abs() < 1e-6);
        assert!((distance_scaled_stun(&spec, 200.0) - 0.4).abs() < 1e-6);
        assert!((distance_scaled_stun(&spec, 9000.0) - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_knockback_cancels_charge() {
        let table = DescriptorTable::standard();
        let mut target = Combatant::new(2, 1, Archetype::Striker, Vec2::ZERO, 3, &table);
        target.grounded = true;
        target.attack = Some(crate::sim::state::ActiveAttack::new(
            AttackKind::Heavy,
            table.resolve(Archetype::Striker, AttackKind::Heavy),
            false,
            Archetype::Striker,
        ));
        apply_to_target(
            &mut target,
            &HitOutcome {
                damage: 10.0,
                knockback: 50.0,
                velocity: Some(Vec2::new(100.0, -300.0)),
                stun: 0.0,
            },
        );
        assert!(target.attack.is_none());
        assert!(!target.grounded);
        assert_eq!(target.percent, 10.0);
        assert_eq!(target.meter.current, 10.0 * METER_GAIN_TAKEN);
    }

    #[test]
    fn test_stun_cancels_roll_but_keeps_its_invincibility() {
        let mut target = target_with(Archetype::Striker, None);
        target.roll = Some(Roll {
            kind: RollKind::Ground,
            timer: 0.1,
            duration: 0.4,
            velocity: Vec2::new(300.0, 0.0),
        });
        target.grant_invincibility(0.3, InvincibilitySource::Roll);

        apply_to_target(&mut target, &stun_only(0.5));
        assert!(target.roll.is_none());
        assert_eq!(target.stun, 0.5);
        assert_eq!(
            target.invincibility.map(|i| i.source),
            Some(InvincibilitySource::Roll)
        );
    }

    #[test]
    fn test_stun_interrupts_strike() {
        let mut target = target_with(Archetype::Striker, Some(AttackKind::Light));
        apply_to_target(&mut target, &stun_only(0.3));
        assert!(target.attack.is_none());
        assert!(target.is_stunned());
        assert_eq!(target.percent, 4.0);
    }

    #[test]
    fn test_stun_leaves_ultimate_running() {
        let mut target = target_with(Archetype::Blinker, Some(AttackKind::Ultimate));
        apply_to_target(&mut target, &stun_only(0.3));
        let attack = target.attack.as_ref().unwrap();
        assert!(matches!(attack.family, AttackFamily::Ultimate(_)));
        assert!(target.is_stunned());
    }

    #[test]
    fn test_zero_stun_keeps_roll() {
        let mut target = target_with(Archetype::Striker, Some(AttackKind::Light));
        target.roll = Some(Roll {
            kind: RollKind::AirDodge,
            timer: 0.0,
            duration: 0.3,
            velocity: Vec2::ZERO,
        });
        apply_to_target(&mut target, &stun_only(0.0));
        assert!(target.roll.is_some());
        assert!(target.attack.is_some());
    }

    proptest! {
        #[test]
        fn prop_knockback_monotonic_in_percent(
            lo in 0.0f32..300.0,
            delta in 0.1f32..300.0,
            base in 1.0f32..200.0,
            exponent in 0.1f32..1.5,
        ) {
            let desc = plain(base, exponent);
            let a = final_knockback(&desc, &KnockbackParams { target_percent: lo, ..Default::default() });
            let b = final_knockback(&desc, &KnockbackParams { target_percent: lo + delta, ..Default::default() });
            prop_assert!(b > a);
        }
    }
}
