//! Numerical constants for the smoke solver and the turbulence synthesizer.

// =============================================================================
// COARSE SOLVER
// =============================================================================

/// Default timestep in domain units.
pub const DEFAULT_DT: f32 = 0.1;

/// Smallest resolution per axis (one interior cell between two border cells).
pub const MIN_RESOLUTION: usize = 3;

/// Hard iteration cap for the pressure and heat CG solves.
pub const DEFAULT_MAX_ITERATIONS: usize = 100;

/// CG stops once `max_i r_i * (P r)_i` drops to this.
pub const CG_TOLERANCE: f64 = 1e-9;

/// Blend weight of the checkerboard damping pass.
pub const DAMPING_WEIGHT: f32 = 0.9;

// =============================================================================
// OBSTACLE FLAGS
// =============================================================================

pub const EMPTY: u8 = 0;
pub const OBSTACLE: u8 = 1;
/// Marked during the current energy extrapolation pass.
pub const MARCHED: u8 = 2;
/// Filled by an earlier extrapolation pass.
pub const RETIRED: u8 = 4;

// =============================================================================
// TURBULENCE
// =============================================================================

/// Octave amplitude falloff, 2^(-5/6).
pub const PERSISTENCE: f32 = 0.56123;

/// Fine cells with a smaller noise amplitude skip synthesis.
pub const CULL_THRESHOLD: f32 = 1e-3;

/// Texture coordinates are reset when the largest eigenvalue exceeds this.
pub const MAX_DEFORMATION: f32 = 2.0;

/// Texture coordinates are reset when the smallest eigenvalue drops below this.
pub const MIN_DEFORMATION: f32 = 0.5;

/// Eigen classification used for singular Jacobians.
pub const SINGULAR_MAX_EIGEN: f32 = 10.0;
pub const SINGULAR_MIN_EIGEN: f32 = 0.1;

/// Iteration cap for the Hessenberg QR eigen solve.
pub const EIGEN_MAX_ITERATIONS: usize = 100;

/// Eigenvalue magnitude reported when QR fails to converge.
pub const EIGEN_SENTINEL: f32 = 10000.0;

/// Fine velocity is zeroed where the interpolated obstacle mask exceeds this.
pub const OBSTACLE_CUTOFF: f32 = 0.95;

/// Fine cells a density sample may travel in one advection substep.
pub const SUBSTEP_DISPLACEMENT: f32 = 5.0;

/// Substep caps for the sequential and parallel synthesis loops.
pub const MAX_SUBSTEPS_READABLE: usize = 5;
pub const MAX_SUBSTEPS_FULL: usize = 25;

/// Number of obstacle marching passes for energy extrapolation.
pub const ENERGY_MARCH_PASSES: usize = 4;

/// Edge length of the periodic noise tile.
pub const NOISE_TILE_SIZE: usize = 128;

/// Offset between the three noise lookups that form a curl.
pub const NOISE_CURL_OFFSET: f32 = 64.0;
