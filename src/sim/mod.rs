//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (by combatant id)
//! - No rendering, audio or platform dependencies

pub mod arbitration;
pub mod collision;
pub mod damage;
pub mod descriptor;
pub mod geom;
pub mod hits;
pub mod host;
pub mod input;
pub mod machine;
pub mod rhythm;
pub mod state;
pub mod terrain;
pub mod tick;
pub mod ultimate;
pub mod world;

pub use arbitration::{Clank, HitSource, PendingHit, Resolution, arbitrate};
pub use collision::{MoveResult, Unstick, integrate};
pub use damage::{HitOutcome, KnockbackParams, final_damage, final_knockback};
pub use descriptor::{
    Archetype, AttackDescriptor, AttackKind, DescriptorTable, KnockbackKind, PriorityTier,
    ProjectileSpec, Timing,
};
pub use geom::{Facing, Rect};
pub use hits::Projectile;
pub use host::{
    CombatantView, EffectRequest, FixedMusic, FrameReport, Headless, HurtboxProvider, KillCause,
    KillEvent, MusicClock,
};
pub use input::{Button, ControlIntent};
pub use machine::{MachineContext, Peer};
pub use rhythm::{BeatQuality, RhythmClock, RhythmCombo, classify_beat, is_in_beat_window};
pub use state::{ActiveAttack, AttackFamily, Combatant, InvincibilitySource, Phase, UltimateKind};
pub use terrain::{MaskLayer, StageTerrain, Surface, TerrainClass, TerrainMask};
pub use tick::tick;
pub use world::{SimulationWorld, Stage};
