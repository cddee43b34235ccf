//! 3D Grid Smoke Simulation
//!
//! A collocated-grid smoke solver (MacCormack advection, vorticity
//! confinement, conjugate-gradient pressure projection, implicit heat
//! diffusion) with optional wavelet turbulence that advects a finer density
//! grid using synthesized sub-grid velocity.
//!
//! # Example
//!
//! ```
//! use smoke3d::{SimulationConfig, SmokeSimulation3D};
//!
//! let mut config = SimulationConfig::default();
//! config.resolution = [12, 12, 16];
//! config.smoke.alpha = 1.0;
//! config.smoke.beta = 0.0;
//!
//! let mut sim = SmokeSimulation3D::new(&config).unwrap();
//!
//! // Seed a small column of smoke near the floor
//! for z in 2..5 {
//!     sim.add_density(6, 6, z, 1.0);
//! }
//!
//! let report = sim.step();
//! assert_eq!(report.step, 1);
//! ```

pub mod advection;
pub mod boundary;
pub mod config;
pub mod constants;
pub mod diffusion;
pub mod eigen;
pub mod error;
pub mod forces;
pub mod grid;
pub mod lu;
pub mod noise;
pub mod obstacle;
pub mod pressure;
pub mod solver;
pub mod turbulence;
pub mod vorticity;

use std::sync::Arc;

pub use config::{
    BorderMode, Dissolve, DomainBorders, NoiseKind, SimulationConfig, SmokeParams,
    SynthesisVariant, TurbulenceParams,
};
pub use error::{Result, SmokeError};
pub use glam::Vec3;
pub use grid::{DoubleBuffer, Grid3D, VectorField, VelocityView};
pub use noise::WaveletNoiseTile;
pub use obstacle::{Obstacle, ObstacleShape};
pub use solver::SolverStats;
pub use turbulence::{CoarseFlow, TurbulenceReport, WaveletTurbulence};

use advection::{advect_maccormack, begin_maccormack};
use boundary::{copy_border_all, copy_velocity_bc, set_border_obstacles, set_zero_border};
use constants::EMPTY;
use solver::CgWorkspace;
use vorticity::VorticityScratch;

/// Diagnostics of one coarse step.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StepReport {
    /// Step counter after this step.
    pub step: u64,
    /// Elapsed simulation time after this step.
    pub time: f32,
    /// Pressure projection solve.
    pub pressure: SolverStats,
    /// Implicit heat diffusion solve.
    pub heat: SolverStats,
    /// Fine step, when turbulence is enabled.
    pub turbulence: Option<TurbulenceReport>,
}

/// 3D grid smoke simulation.
pub struct SmokeSimulation3D {
    /// Resolution and spacing of the coarse grid
    pub grid: Grid3D,
    /// World position of cell (0, 0, 0), used for obstacle and inflow tests
    pub origin: Vec3,
    /// Solver parameters, re-read every step
    pub params: SmokeParams,

    density: DoubleBuffer<Vec<f32>>,
    heat: DoubleBuffer<Vec<f32>>,
    velocity: DoubleBuffer<VectorField>,
    force: VectorField,
    pressure: Vec<f32>,
    divergence: Vec<f32>,
    obstacles: Vec<u8>,

    /// Scratch buffers (pre-allocated to avoid per-step allocation)
    cg: CgWorkspace,
    vorticity: VorticityScratch,
    phi_hat: Vec<f32>,
    phi_hat_hat: Vec<f32>,

    /// Border flags the obstacle shell was last stamped with
    stamped_borders: DomainBorders,
    turbulence: Option<WaveletTurbulence>,

    time: f32,
    steps: u64,
}

impl SmokeSimulation3D {
    /// Create a simulation from a configuration. Builds the turbulence engine
    /// (and its noise tile) when `config.turbulence` is set.
    pub fn new(config: &SimulationConfig) -> Result<Self> {
        let mut sim = Self::coarse_only(config)?;
        if let Some(params) = &config.turbulence {
            sim.turbulence = Some(WaveletTurbulence::new(&sim.grid, params)?);
        }
        Ok(sim)
    }

    /// Like [`SmokeSimulation3D::new`], but turbulence reuses an existing
    /// noise tile instead of loading or generating one.
    pub fn with_noise_tile(
        config: &SimulationConfig,
        noise: Arc<WaveletNoiseTile>,
    ) -> Result<Self> {
        let mut sim = Self::coarse_only(config)?;
        if let Some(params) = &config.turbulence {
            sim.turbulence = Some(WaveletTurbulence::with_noise_tile(&sim.grid, params, noise)?);
        }
        Ok(sim)
    }

    fn coarse_only(config: &SimulationConfig) -> Result<Self> {
        let [x, y, z] = config.resolution;
        let grid = Grid3D::new(x, y, z)?;
        let n = grid.total_cells;

        let borders = config.smoke.borders.borders();
        let mut obstacles = vec![EMPTY; n];
        set_border_obstacles(&grid, &borders, &mut obstacles);

        log::info!(
            "Smoke: {:?} grid, dx {:.4}, dt {}, borders {:?}",
            grid.res(),
            grid.dx,
            config.smoke.dt,
            config.smoke.borders
        );

        Ok(Self {
            grid,
            origin: Vec3::from(config.origin),
            params: config.smoke.clone(),
            density: DoubleBuffer::new(vec![0.0; n]),
            heat: DoubleBuffer::new(vec![0.0; n]),
            velocity: DoubleBuffer::new(VectorField::zeros(n)),
            force: VectorField::zeros(n),
            pressure: vec![0.0; n],
            divergence: vec![0.0; n],
            obstacles,
            cg: CgWorkspace::new(n),
            vorticity: VorticityScratch::new(n),
            phi_hat: vec![0.0; n],
            phi_hat_hat: vec![0.0; n],
            stamped_borders: borders,
            turbulence: None,
            time: 0.0,
            steps: 0,
        })
    }

    /// Run one simulation step, then one turbulence step if enabled.
    pub fn step(&mut self) -> StepReport {
        let grid = self.grid;
        let dt = self.params.dt;
        let borders = self.params.borders.borders();

        // 0. Restamp the outer shell if the border mode changed
        if borders != self.stamped_borders {
            set_border_obstacles(&grid, &borders, &mut self.obstacles);
            self.stamped_borders = borders;
        }

        // 1. Clear forces and wipe the borders
        self.force.fill(0.0);
        {
            let vel = self.velocity.current_mut();
            set_zero_border(&grid, &mut vel.x);
            set_zero_border(&grid, &mut vel.y);
            set_zero_border(&grid, &mut vel.z);
        }
        set_zero_border(&grid, self.density.current_mut());

        // 2. Vorticity confinement and buoyancy into the force accumulator
        vorticity::add_vorticity_confinement(
            &grid,
            self.params.vorticity,
            &self.obstacles,
            self.velocity.current(),
            &mut self.force,
            &mut self.vorticity,
        );
        forces::add_buoyancy(
            self.params.alpha,
            self.params.beta,
            self.params.ambient_temperature,
            self.density.current(),
            self.heat.current(),
            &mut self.force.z,
        );

        // 3. Integrate forces
        forces::add_force(dt, &self.force, self.velocity.current_mut());

        // 4. Pressure projection
        let pressure = pressure::project(
            &grid,
            &borders,
            &mut self.obstacles,
            self.velocity.current_mut(),
            &mut self.pressure,
            &mut self.divergence,
            &mut self.cg,
            self.params.max_iterations,
        );

        // 5. Implicit heat diffusion
        self.heat.swap();
        let heat = {
            let (current, old) = self.heat.split_mut();
            copy_border_all(&grid, old);
            diffusion::diffuse_heat(
                &grid,
                dt,
                self.params.heat_diffusion,
                &self.obstacles,
                old,
                current,
                &mut self.cg,
                self.params.max_iterations,
            )
        };

        // 6. Advect everything with the pre-advection velocity
        self.advect(dt / grid.dx);

        // 7. Boundary conditions on the advected state
        {
            let vel = self.velocity.current_mut();
            copy_velocity_bc(&grid, &borders, &mut vel.x, &mut vel.y, &mut vel.z);
        }
        set_zero_border(&grid, self.density.current_mut());
        set_zero_border(&grid, self.heat.current_mut());

        if let Some(dissolve) = &self.params.dissolve {
            forces::dissolve_density(dissolve, self.density.current_mut());
        }

        // 8. Suppress checkerboard modes of the collocated grid
        forces::artificial_damping(&grid, self.steps, self.velocity.current_mut());

        self.time += dt;
        self.steps += 1;

        log::debug!(
            "Smoke step {}: pressure {} iters (residual {:.3e}), heat {} iters",
            self.steps,
            pressure.iterations,
            pressure.max_residual,
            heat.iterations
        );

        let turbulence = self.turbulence.as_mut().map(|engine| {
            let flow = CoarseFlow {
                velocity: self.velocity.current().view(),
                obstacles: &self.obstacles,
                dt,
            };
            engine.step(&flow)
        });

        StepReport {
            step: self.steps,
            time: self.time,
            pressure,
            heat,
            turbulence,
        }
    }

    /// Swap every advected buffer and MacCormack-advect density, heat and
    /// the three velocity components through the old velocity.
    fn advect(&mut self, dt0: f32) {
        let grid = self.grid;
        self.density.swap();
        self.heat.swap();
        self.velocity.swap();

        let (vel, vel_old) = self.velocity.split_mut();
        begin_maccormack(&grid, vel_old);
        let driver = vel_old.view();
        let mask = Some(self.obstacles.as_slice());
        let (phi_hat, phi_hat_hat) = (&mut self.phi_hat, &mut self.phi_hat_hat);
        let mut advect = |old: &[f32], out: &mut [f32]| {
            advect_maccormack(
                &grid,
                dt0,
                driver,
                old,
                out,
                phi_hat.as_mut_slice(),
                phi_hat_hat.as_mut_slice(),
                mask,
            );
        };

        let (density, density_old) = self.density.split_mut();
        advect(density_old, density);
        let (heat, heat_old) = self.heat.split_mut();
        advect(heat_old, heat);
        advect(&vel_old.x, &mut vel.x);
        advect(&vel_old.y, &mut vel.y);
        advect(&vel_old.z, &mut vel.z);
    }

    /// Read-only view of the coarse state for driving a turbulence engine
    /// owned elsewhere.
    pub fn coarse_flow(&self) -> CoarseFlow<'_> {
        CoarseFlow {
            velocity: self.velocity.current().view(),
            obstacles: &self.obstacles,
            dt: self.params.dt,
        }
    }

    // ========== Obstacles ==========

    /// OR an obstacle into the mask. Returns the number of cells inside it.
    pub fn add_obstacle(&mut self, shape: &(impl Obstacle + ?Sized)) -> usize {
        obstacle::stamp_obstacle(&self.grid, self.origin, shape, &mut self.obstacles)
    }

    /// Remove every obstacle except the border shell.
    pub fn clear_obstacles(&mut self) {
        self.obstacles.fill(EMPTY);
        set_border_obstacles(&self.grid, &self.stamped_borders, &mut self.obstacles);
    }

    // ========== Emission ==========

    /// Index of an emission cell, rejecting coordinates outside the grid.
    fn emission_index(&self, x: usize, y: usize, z: usize) -> Result<usize> {
        self.grid
            .checked_index(x, y, z)
            .ok_or(SmokeError::CellOutOfRange {
                x,
                y,
                z,
                res: self.grid.res(),
            })
    }

    /// Add `amount` of smoke at one cell.
    pub fn add_density(&mut self, x: usize, y: usize, z: usize, amount: f32) -> Result<()> {
        let idx = self.emission_index(x, y, z)?;
        self.density.current_mut()[idx] += amount;
        Ok(())
    }

    /// Add `amount` of heat at one cell.
    pub fn add_heat(&mut self, x: usize, y: usize, z: usize, amount: f32) -> Result<()> {
        let idx = self.emission_index(x, y, z)?;
        self.heat.current_mut()[idx] += amount;
        Ok(())
    }

    /// Add `v` to the velocity of one cell.
    pub fn add_velocity(&mut self, x: usize, y: usize, z: usize, v: Vec3) -> Result<()> {
        let idx = self.emission_index(x, y, z)?;
        let vel = self.velocity.current_mut();
        vel.x[idx] += v.x;
        vel.y[idx] += v.y;
        vel.z[idx] += v.z;
        Ok(())
    }

    /// Set density and heat on every cell inside `shape`. Returns the number
    /// of cells written.
    pub fn inflow(&mut self, shape: &(impl Obstacle + ?Sized), density: f32, heat: f32) -> usize {
        let (grid, origin) = (self.grid, self.origin);
        let rho = self.density.current_mut();
        let t = self.heat.current_mut();
        let mut count = 0;
        obstacle::for_each_inside(&grid, origin, shape, |idx| {
            rho[idx] = density;
            t[idx] = heat;
            count += 1;
        });
        count
    }

    // ========== Diagnostics ==========

    /// Sum of coarse density.
    pub fn total_density(&self) -> f64 {
        self.density.current().iter().map(|&d| d as f64).sum()
    }

    /// Density-weighted mean position in cell units, `None` for an empty
    /// domain.
    pub fn density_centroid(&self) -> Option<Vec3> {
        let mut sum = [0.0f64; 3];
        let mut mass = 0.0f64;
        for (idx, &d) in self.density.current().iter().enumerate() {
            if d == 0.0 {
                continue;
            }
            let (x, y, z) = self.grid.coords(idx);
            let d = d as f64;
            sum[0] += d * x as f64;
            sum[1] += d * y as f64;
            sum[2] += d * z as f64;
            mass += d;
        }
        if mass <= 0.0 {
            return None;
        }
        Some(Vec3::new(
            (sum[0] / mass) as f32,
            (sum[1] / mass) as f32,
            (sum[2] / mass) as f32,
        ))
    }

    /// Largest coarse velocity magnitude.
    pub fn max_velocity(&self) -> f32 {
        let vel = self.velocity.current();
        (0..vel.len())
            .map(|i| vel.get(i).length_squared())
            .fold(0.0f32, f32::max)
            .sqrt()
    }

    // ========== Field access ==========

    pub fn density(&self) -> &[f32] {
        self.density.current()
    }

    pub fn density_mut(&mut self) -> &mut [f32] {
        self.density.current_mut()
    }

    pub fn heat(&self) -> &[f32] {
        self.heat.current()
    }

    pub fn heat_mut(&mut self) -> &mut [f32] {
        self.heat.current_mut()
    }

    pub fn velocity(&self) -> &VectorField {
        self.velocity.current()
    }

    pub fn velocity_mut(&mut self) -> &mut VectorField {
        self.velocity.current_mut()
    }

    /// Pressure from the last projection.
    pub fn pressure(&self) -> &[f32] {
        &self.pressure
    }

    pub fn obstacles(&self) -> &[u8] {
        &self.obstacles
    }

    pub fn turbulence(&self) -> Option<&WaveletTurbulence> {
        self.turbulence.as_ref()
    }

    pub fn turbulence_mut(&mut self) -> Option<&mut WaveletTurbulence> {
        self.turbulence.as_mut()
    }

    /// Elapsed simulation time.
    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }
}
