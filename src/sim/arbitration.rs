//! Hit arbitration
//!
//! Every frame collects all candidate hits first, then resolves them as one
//! batch:
//! 1. mutual hits (A hits B while B hits A) compare final damage; the weaker
//!    hit is cancelled, equal clankable hits cancel each other (clank), equal
//!    hits with any non-clankable side both proceed (trade)
//! 2. survivors are grouped by target and one winner is picked per target
//!    by (priority tier, priority, charge rank, damage); ties keep the
//!    earliest hit
//!
//! Applying winners is the frame driver's job; this module only decides.

use glam::Vec2;

use super::damage::final_damage;
use super::descriptor::{AttackKind, DescriptorRef, PriorityTier};
use super::geom::Facing;

/// Where a hit came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitSource {
    Melee,
    Projectile(u32),
    Ultimate,
}

/// One attack-target contact detected this frame
#[derive(Debug, Clone, PartialEq)]
pub struct PendingHit {
    pub attacker: u32,
    pub target: u32,
    pub attack: AttackKind,
    /// `None` when the descriptor could not be resolved
    pub descriptor: Option<DescriptorRef>,
    pub source: HitSource,
    /// Replaces the descriptor's stun (distance-scaled projectiles)
    pub stun_override: Option<f32>,
    pub charge_seconds: f32,
    /// Attacker's rhythm combo multiplier at contact
    pub combo_multiplier: f32,
    pub on_beat: bool,
    /// Direction the hit travels (mirrors knockback angles)
    pub facing: Facing,
    /// Attacker (or projectile) center
    pub origin: Vec2,
    /// Contact point for effects
    pub contact: Vec2,
}

impl PendingHit {
    /// Final damage; zero when the descriptor is missing
    pub fn damage(&self) -> f32 {
        self.descriptor
            .as_ref()
            .map_or(0.0, |d| final_damage(d, self.combo_multiplier))
    }

    fn clankable(&self) -> bool {
        self.descriptor.as_ref().is_some_and(|d| d.clankable)
    }

    fn rank(&self) -> (PriorityTier, i32, u8, f32) {
        match &self.descriptor {
            Some(d) => {
                let (tier, priority) = d.priority_key();
                (tier, priority, d.charge_rank, self.damage())
            }
            None => (PriorityTier::Basic, i32::MIN, 0, 0.0),
        }
    }

    fn is_mutual_with(&self, other: &PendingHit) -> bool {
        self.attacker == other.target && self.target == other.attacker
    }
}

/// Two equal clankable hits cancelled each other
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Clank {
    pub position: Vec2,
    pub attackers: (u32, u32),
}

/// Outcome of one arbitration pass
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// At most one hit per target, ordered by target id
    pub winners: Vec<PendingHit>,
    pub clanks: Vec<Clank>,
    /// Hits that lost a mutual comparison or clanked
    pub cancelled: Vec<PendingHit>,
    /// Hits dropped for missing descriptors or duplicate contact
    pub dropped: usize,
}

fn beats(a: (PriorityTier, i32, u8, f32), b: (PriorityTier, i32, u8, f32)) -> bool {
    match (a.0, a.1, a.2).cmp(&(b.0, b.1, b.2)) {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Less => false,
        std::cmp::Ordering::Equal => a.3 > b.3,
    }
}

/// Resolve one frame's pending hits
pub fn arbitrate(hits: Vec<PendingHit>) -> Resolution {
    let mut resolution = Resolution::default();

    // Drop unusable hits and repeated contacts from the same swing
    let mut live: Vec<PendingHit> = Vec::with_capacity(hits.len());
    for hit in hits {
        if hit.descriptor.is_none() {
            log::warn!(
                "Dropping {:?} hit {} -> {}: no descriptor",
                hit.attack,
                hit.attacker,
                hit.target
            );
            resolution.dropped += 1;
            continue;
        }
        let duplicate = live.iter().any(|h| {
            h.attacker == hit.attacker && h.target == hit.target && h.source == hit.source
        });
        if duplicate || hit.attacker == hit.target {
            resolution.dropped += 1;
            continue;
        }
        live.push(hit);
    }

    // Mutual hits
    let mut cancelled = vec![false; live.len()];
    for i in 0..live.len() {
        for j in (i + 1)..live.len() {
            if !live[i].is_mutual_with(&live[j]) {
                continue;
            }
            let (di, dj) = (live[i].damage(), live[j].damage());
            if di > dj {
                cancelled[j] = true;
            } else if dj > di {
                cancelled[i] = true;
            } else if live[i].clankable() && live[j].clankable() {
                cancelled[i] = true;
                cancelled[j] = true;
                let position = (live[i].origin + live[j].origin) * 0.5;
                log::debug!(
                    "Clank between {} and {} at {:?}",
                    live[i].attacker,
                    live[j].attacker,
                    position
                );
                resolution.clanks.push(Clank {
                    position,
                    attackers: (live[i].attacker, live[j].attacker),
                });
            }
            // Equal damage with a non-clankable side: trade, both proceed
        }
    }

    // One winner per target
    let mut winners: Vec<PendingHit> = Vec::new();
    for (hit, is_cancelled) in live.into_iter().zip(cancelled) {
        if is_cancelled {
            resolution.cancelled.push(hit);
            continue;
        }
        match winners.iter_mut().find(|w| w.target == hit.target) {
            Some(current) => {
                if beats(hit.rank(), current.rank()) {
                    *current = hit;
                }
            }
            None => winners.push(hit),
        }
    }
    winners.sort_by_key(|w| w.target);
    resolution.winners = winners;
    resolution
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::descriptor::{Archetype, DescriptorTable};
    use proptest::prelude::*;

    fn hit(attacker: u32, target: u32, kind: AttackKind) -> PendingHit {
        let table = DescriptorTable::standard();
        PendingHit {
            attacker,
            target,
            attack: kind,
            descriptor: Some(table.resolve(Archetype::Striker, kind)),
            source: HitSource::Melee,
            stun_override: None,
            charge_seconds: 0.0,
            combo_multiplier: 1.0,
            on_beat: false,
            facing: Facing::Right,
            origin: Vec2::new(attacker as f32 * 100.0, 0.0),
            contact: Vec2::ZERO,
        }
    }

    #[test]
    fn test_equal_clankable_hits_clank() {
        let res = arbitrate(vec![hit(1, 2, AttackKind::Light), hit(2, 1, AttackKind::Light)]);
        assert!(res.winners.is_empty());
        assert_eq!(res.clanks.len(), 1);
        assert_eq!(res.clanks[0].position, Vec2::new(150.0, 0.0));
        assert_eq!(res.cancelled.len(), 2);
    }

    #[test]
    fn test_equal_non_clankable_hits_trade() {
        let res = arbitrate(vec![hit(1, 2, AttackKind::Heavy), hit(2, 1, AttackKind::Heavy)]);
        assert_eq!(res.winners.len(), 2);
        assert!(res.clanks.is_empty());
    }

    #[test]
    fn test_stronger_mutual_hit_wins() {
        let res = arbitrate(vec![hit(1, 2, AttackKind::Light), hit(2, 1, AttackKind::Dash)]);
        assert_eq!(res.winners.len(), 1);
        assert_eq!(res.winners[0].attacker, 2);
        assert_eq!(res.winners[0].target, 1);
        assert!(res.clanks.is_empty());
    }

    #[test]
    fn test_finisher_combo_breaks_tie() {
        let mut a = hit(1, 2, AttackKind::Heavy);
        let b = hit(2, 1, AttackKind::Heavy);
        a.combo_multiplier = 1.2;
        let res = arbitrate(vec![a, b]);
        assert_eq!(res.winners.len(), 1);
        assert_eq!(res.winners[0].attacker, 1);
    }

    #[test]
    fn test_one_winner_per_target_by_priority() {
        // Two attackers on one target: heavy tier beats basic
        let res = arbitrate(vec![hit(1, 3, AttackKind::Light), hit(2, 3, AttackKind::Heavy)]);
        assert_eq!(res.winners.len(), 1);
        assert_eq!(res.winners[0].attacker, 2);
    }

    #[test]
    fn test_tie_keeps_earliest() {
        let res = arbitrate(vec![hit(4, 3, AttackKind::Light), hit(2, 3, AttackKind::Light)]);
        assert_eq!(res.winners.len(), 1);
        assert_eq!(res.winners[0].attacker, 4);
    }

    #[test]
    fn test_charge_rank_breaks_priority_tie() {
        let low = hit(1, 3, AttackKind::Light);
        let mut high = hit(2, 3, AttackKind::Light);
        if let Some(d) = high.descriptor.as_mut() {
            let d = std::sync::Arc::make_mut(d);
            d.charge_rank = 1;
            d.base_damage = 1.0;
        }
        let res = arbitrate(vec![low, high]);
        assert_eq!(res.winners[0].attacker, 2);
    }

    #[test]
    fn test_missing_descriptor_dropped() {
        let mut h = hit(1, 2, AttackKind::Light);
        h.descriptor = None;
        let res = arbitrate(vec![h]);
        assert!(res.winners.is_empty());
        assert_eq!(res.dropped, 1);
    }

    #[test]
    fn test_same_swing_never_hits_twice() {
        let res = arbitrate(vec![hit(1, 2, AttackKind::Light), hit(1, 2, AttackKind::Light)]);
        assert_eq!(res.winners.len(), 1);
        assert_eq!(res.dropped, 1);
    }

    const KINDS: [AttackKind; 6] = [
        AttackKind::Light,
        AttackKind::Dash,
        AttackKind::Launcher,
        AttackKind::Heavy,
        AttackKind::Slam,
        AttackKind::Grab,
    ];

    proptest! {
        #[test]
        fn prop_at_most_one_hit_per_target(
            raw in prop::collection::vec((0u32..4, 0u32..4, 0usize..KINDS.len()), 0..16)
        ) {
            let hits: Vec<_> = raw
                .into_iter()
                .map(|(a, t, k)| hit(a, t, KINDS[k]))
                .collect();
            let res = arbitrate(hits);
            let mut targets: Vec<u32> = res.winners.iter().map(|w| w.target).collect();
            let before = targets.len();
            targets.dedup();
            prop_assert_eq!(before, targets.len());
            prop_assert!(res.winners.iter().all(|w| w.attacker != w.target));
        }

        #[test]
        fn prop_clank_is_symmetric(k in 0usize..KINDS.len()) {
            let kind = KINDS[k];
            let forward = arbitrate(vec![hit(1, 2, kind), hit(2, 1, kind)]);
            let reverse = arbitrate(vec![hit(2, 1, kind), hit(1, 2, kind)]);
            prop_assert_eq!(forward.winners.len(), reverse.winners.len());
            prop_assert_eq!(forward.clanks.len(), reverse.clanks.len());
            let clankable = hit(1, 2, kind).descriptor.map(|d| d.clankable).unwrap_or(false);
            prop_assert_eq!(forward.clanks.len(), usize::from(clankable));
            if clankable {
                prop_assert!(forward.winners.is_empty());
            }
        }
    }
}
