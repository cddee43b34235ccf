//! Error types for smoke3d.
//!
//! Stepping never fails; these errors only come out of construction,
//! configuration, the noise-tile cache and per-cell emission.

use thiserror::Error;

use crate::config::NoiseKind;

/// Errors that can occur while building or configuring a simulation.
#[derive(Debug, Error)]
pub enum SmokeError {
    /// Every axis needs at least one interior cell for the 3-cell stencils.
    #[error("resolution {x}x{y}x{z} is too small, every axis needs at least {min} cells")]
    ResolutionTooSmall {
        x: usize,
        y: usize,
        z: usize,
        min: usize,
    },

    /// Emission at a cell outside the grid.
    #[error("cell ({x}, {y}, {z}) is outside the {res:?} grid")]
    CellOutOfRange {
        x: usize,
        y: usize,
        z: usize,
        res: [usize; 3],
    },

    /// Turbulence amplification must be at least 1.
    #[error("invalid amplification factor {0}, must be >= 1")]
    InvalidAmplification(usize),

    /// Requested noise source is not available in this build.
    #[error("noise type {0:?} is not supported")]
    UnsupportedNoise(NoiseKind),

    /// Noise cache file does not hold exactly one tile.
    #[error("noise cache holds {found} bytes, expected {expected}")]
    NoiseCacheSize { expected: usize, found: usize },

    /// Filesystem error (noise cache, config files).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed configuration file.
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SmokeError>;
