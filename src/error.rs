//! Error types for the simulation core.

use thiserror::Error;

use crate::sim::descriptor::{Archetype, AttackKind};

/// Top-level error type for simulation setup.
#[derive(Debug, Error)]
pub enum SimError {
    /// Terrain mask decoding errors
    #[error("Mask error: {0}")]
    Mask(#[from] MaskError),

    /// Descriptor lookup errors
    #[error("Descriptor error: {0}")]
    Descriptor(#[from] DescriptorError),

    /// Settings / descriptor JSON errors
    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),

    /// Reading a config file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Raster mask decoding errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MaskError {
    /// Zero width or height
    #[error("Mask has empty dimensions {width}x{height}")]
    EmptyDimensions {
        /// Width in pixels
        width: u32,
        /// Height in pixels
        height: u32,
    },

    /// RGBA buffer does not match the declared dimensions
    #[error("Mask buffer is {actual} bytes, expected {expected}")]
    BufferLength {
        /// Expected byte length (width * height * 4)
        expected: usize,
        /// Actual byte length
        actual: usize,
    },
}

/// Attack descriptor lookup errors.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorError {
    /// No descriptor registered for the key
    #[error("No descriptor for {archetype:?}/{attack:?}")]
    NotFound {
        /// Character archetype
        archetype: Archetype,
        /// Attack kind
        attack: AttackKind,
    },
}

/// Result type alias for simulation setup.
pub type SimResult<T> = Result<T, SimError>;
