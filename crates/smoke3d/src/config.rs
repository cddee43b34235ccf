//! Simulation parameters.
//!
//! Everything a host can tune lives here. The running simulation keeps these
//! as public fields and re-reads them every step, so buoyancy, vorticity or
//! the border mode can be animated between steps.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_DT, DEFAULT_MAX_ITERATIONS};
use crate::error::Result;

/// Wall flags for the six outer faces of the domain (`true` = solid wall).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainBorders {
    pub x_min: bool,
    pub x_max: bool,
    pub y_min: bool,
    pub y_max: bool,
    pub z_min: bool,
    pub z_max: bool,
}

impl DomainBorders {
    /// No walls anywhere.
    pub const OPEN: Self = Self {
        x_min: false,
        x_max: false,
        y_min: false,
        y_max: false,
        z_min: false,
        z_max: false,
    };

    /// Walls on every face.
    pub const CLOSED: Self = Self {
        x_min: true,
        x_max: true,
        y_min: true,
        y_max: true,
        z_min: true,
        z_max: true,
    };

    /// Side walls, open floor and ceiling.
    pub const VERTICALLY_OPEN: Self = Self {
        x_min: true,
        x_max: true,
        y_min: true,
        y_max: true,
        z_min: false,
        z_max: false,
    };

    /// Whether velocity along X uses the zero (wall) rule.
    pub fn x_walls(&self) -> bool {
        self.x_min || self.x_max
    }

    /// Whether velocity along Y uses the zero (wall) rule.
    pub fn y_walls(&self) -> bool {
        self.y_min || self.y_max
    }

    /// Whether velocity along Z uses the zero (wall) rule.
    pub fn z_walls(&self) -> bool {
        self.z_min || self.z_max
    }
}

/// How the outer shell of the domain behaves.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BorderMode {
    /// Smoke leaves through every face.
    #[default]
    Open,
    /// Walls on the sides, open along Z.
    VerticallyOpen,
    /// Walls on every face.
    Closed,
    /// Explicit per-face flags.
    Custom(DomainBorders),
}

impl BorderMode {
    /// Per-face wall flags for this mode.
    pub fn borders(&self) -> DomainBorders {
        match self {
            BorderMode::Open => DomainBorders::OPEN,
            BorderMode::VerticallyOpen => DomainBorders::VERTICALLY_OPEN,
            BorderMode::Closed => DomainBorders::CLOSED,
            BorderMode::Custom(b) => *b,
        }
    }
}

/// Per-step density decay.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dissolve {
    /// Number of steps over which smoke fades (>= 1).
    pub speed: u32,
    /// Exponential falloff instead of linear.
    pub logarithmic: bool,
}

/// Coarse solver parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmokeParams {
    /// Timestep in domain units (the domain is 1 unit along its longest axis).
    pub dt: f32,
    /// Density buoyancy coefficient.
    pub alpha: f32,
    /// Heat buoyancy coefficient.
    pub beta: f32,
    /// Temperature that produces no heat buoyancy.
    pub ambient_temperature: f32,
    /// Vorticity confinement strength, disabled when <= 0.
    pub vorticity: f32,
    /// Heat diffusivity for the implicit diffusion solve.
    pub heat_diffusion: f32,
    /// Iteration cap for both CG solves.
    pub max_iterations: usize,
    /// Outer shell behaviour.
    pub borders: BorderMode,
    /// Optional coarse density decay.
    pub dissolve: Option<Dissolve>,
}

impl Default for SmokeParams {
    fn default() -> Self {
        Self {
            dt: DEFAULT_DT,
            alpha: -0.001,
            beta: 0.1,
            ambient_temperature: 0.0,
            vorticity: 2.0,
            heat_diffusion: 1e-3,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            borders: BorderMode::Open,
            dissolve: None,
        }
    }
}

/// Source of the turbulence noise tile.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoiseKind {
    /// Wavelet noise (down/upsample band limiting).
    #[default]
    Wavelet,
    /// FFT band-limited noise, needs the `fft-noise` feature.
    Fft,
    /// Curl noise, declared for compatibility but not implemented.
    Curl,
}

/// Which turbulence synthesis loop to run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SynthesisVariant {
    /// Sequential loop over fine cells, plain curl noise.
    Readable,
    /// Parallel loop over coarse cells with Jacobian-unwarped noise.
    #[default]
    Full,
}

/// Wavelet turbulence parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TurbulenceParams {
    /// Fine cells per coarse cell along each axis.
    pub amplify: usize,
    /// Overall noise strength.
    pub strength: f32,
    /// Noise tile source.
    pub noise: NoiseKind,
    /// Where to cache the generated tile (no caching when `None`).
    pub noise_cache: Option<PathBuf>,
    /// Seed for the tile's Gaussian samples.
    pub noise_seed: u64,
    /// Synthesis loop flavour.
    pub variant: SynthesisVariant,
    /// Optional fine density decay.
    pub dissolve: Option<Dissolve>,
}

impl Default for TurbulenceParams {
    fn default() -> Self {
        Self {
            amplify: 2,
            strength: 2.0,
            noise: NoiseKind::Wavelet,
            noise_cache: None,
            noise_seed: 0x5eed,
            variant: SynthesisVariant::Full,
            dissolve: None,
        }
    }
}

/// Full simulation setup: coarse domain plus optional turbulence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Coarse resolution.
    pub resolution: [usize; 3],
    /// World position of cell (0, 0, 0).
    pub origin: [f32; 3],
    pub smoke: SmokeParams,
    pub turbulence: Option<TurbulenceParams>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            resolution: [32, 32, 32],
            origin: [0.0; 3],
            smoke: SmokeParams::default(),
            turbulence: None,
        }
    }
}

impl SimulationConfig {
    /// Save configuration to a JSON file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load configuration from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&json)?;
        Ok(config)
    }
}
