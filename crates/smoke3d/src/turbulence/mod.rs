//! Wavelet turbulence: sub-grid velocity detail synthesized from a periodic
//! noise tile and used to advect a density field `amplify` times finer than
//! the coarse simulation.
//!
//! Each step:
//! 1. advect the coarse texture coordinates with the coarse velocity
//! 2. classify how much the coordinate map has deformed per coarse cell
//! 3. reset badly deformed coordinates
//! 4. split the coarse kinetic energy and keep its unresolved high band
//! 5. build the fine velocity as interpolated coarse velocity plus curl noise
//! 6. advect the fine density with it, in as many substeps as needed
//!
//! The engine never owns coarse state. The caller hands in a [`CoarseFlow`]
//! borrowed from its own solver every step.

pub mod energy;
pub mod synthesis;
pub mod texcoords;

use std::sync::Arc;


use crate::advection::advect_maccormack;
use crate::boundary::{set_zero_border, set_zero_x, set_zero_y, set_zero_z};
use crate::config::{Dissolve, SynthesisVariant, TurbulenceParams};
use crate::constants::{MAX_SUBSTEPS_FULL, MAX_SUBSTEPS_READABLE};
use crate::error::Result;
use crate::forces::dissolve_density;
use crate::grid::{DoubleBuffer, Grid3D, VectorField, VelocityView};
use crate::noise::WaveletNoiseTile;

use self::energy::{compute_energy, decompose_energy};
use self::synthesis::{
    classify_cells, classify_cells_parallel, substeps, synthesize_full, synthesize_readable,
    CellFrame, Synthesizer,
};
use self::texcoords::TextureCoords;

/// Read-only view of the coarse simulation for one turbulence step.
#[derive(Clone, Copy, Debug)]
pub struct CoarseFlow<'a> {
    /// Coarse velocity after the coarse step.
    pub velocity: VelocityView<'a>,
    /// Coarse obstacle mask.
    pub obstacles: &'a [u8],
    /// Physical timestep of the coarse step.
    pub dt: f32,
}

/// Diagnostics of one turbulence step.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TurbulenceReport {
    /// Fine step counter after this step.
    pub step: u64,
    pub substeps: usize,
    /// Largest fine velocity magnitude, in coarse velocity units.
    pub max_velocity: f32,
    /// Coarse cells whose texture coordinates were reset.
    pub resets: usize,
    pub singular_cells: usize,
    /// Coarse cells where the eigenvalue iteration hit its cap.
    pub eigen_failures: usize,
}

/// Fine-resolution smoke driven by a coarse flow.
pub struct WaveletTurbulence {
    coarse: Grid3D,
    fine: Grid3D,
    amplify: usize,
    octaves: usize,

    /// Noise strength, read every step.
    pub strength: f32,
    /// Which synthesis loop runs, read every step.
    pub variant: SynthesisVariant,
    /// Optional fine density decay, read every step.
    pub dissolve: Option<Dissolve>,

    density: DoubleBuffer<Vec<f32>>,
    velocity: VectorField,
    texcoords: TextureCoords,
    frames: Vec<CellFrame>,

    energy: Vec<f32>,
    high_freq: Vec<f32>,
    energy_scratch: Vec<f32>,
    march_flags: Vec<u8>,

    scratch_a: Vec<f32>,
    scratch_b: Vec<f32>,

    noise: Arc<WaveletNoiseTile>,
    step: u64,
}

impl WaveletTurbulence {
    /// Build the engine for a coarse grid, loading or generating the noise
    /// tile as configured.
    pub fn new(coarse: &Grid3D, params: &TurbulenceParams) -> Result<Self> {
        let noise = WaveletNoiseTile::load_or_generate(
            params.noise,
            params.noise_seed,
            params.noise_cache.as_deref(),
        )?;
        Self::with_noise_tile(coarse, params, Arc::new(noise))
    }

    /// Build the engine around an existing noise tile.
    pub fn with_noise_tile(
        coarse: &Grid3D,
        params: &TurbulenceParams,
        noise: Arc<WaveletNoiseTile>,
    ) -> Result<Self> {
        let fine = coarse.amplified(params.amplify)?;
        let amplify = params.amplify;
        let octaves = ((amplify as f32).log2() + 0.5) as usize;
        let n = coarse.total_cells;

        log::info!(
            "Turbulence: {:?} -> {:?} (x{}, {} octaves, {:?})",
            coarse.res(),
            fine.res(),
            amplify,
            octaves,
            params.variant
        );

        Ok(Self {
            coarse: *coarse,
            fine,
            amplify,
            octaves,
            strength: params.strength,
            variant: params.variant,
            dissolve: params.dissolve,
            density: DoubleBuffer::new(vec![0.0; fine.total_cells]),
            velocity: VectorField::zeros(fine.total_cells),
            texcoords: TextureCoords::new(coarse),
            frames: vec![CellFrame::OUTSIDE; n],
            energy: vec![0.0; n],
            high_freq: vec![0.0; n],
            energy_scratch: vec![0.0; n],
            march_flags: vec![0; n],
            scratch_a: vec![0.0; fine.total_cells],
            scratch_b: vec![0.0; fine.total_cells],
            noise,
            step: 0,
        })
    }

    /// Advance the fine density by one coarse step.
    pub fn step(&mut self, flow: &CoarseFlow<'_>) -> TurbulenceReport {
        match self.variant {
            SynthesisVariant::Readable => self.step_readable(flow),
            SynthesisVariant::Full => self.step_full(flow),
        }
    }

    /// Sequential variant: coordinates are reset before synthesis and the
    /// noise is sampled without unwarping.
    pub fn step_readable(&mut self, flow: &CoarseFlow<'_>) -> TurbulenceReport {
        self.advect_texcoords(flow);
        classify_cells(&self.coarse, &self.texcoords, &mut self.frames);
        let resets = self.reset_texcoords();
        self.update_energy(flow);

        let max_sq = self.synthesize(flow, false);
        self.finish(flow, max_sq, resets, MAX_SUBSTEPS_READABLE)
    }

    /// Parallel variant: noise gradients go through each coarse cell's
    /// inverse Jacobian and coordinates are reset after synthesis.
    pub fn step_full(&mut self, flow: &CoarseFlow<'_>) -> TurbulenceReport {
        self.advect_texcoords(flow);
        classify_cells_parallel(&self.coarse, &self.texcoords, &mut self.frames);
        self.update_energy(flow);

        let max_sq = self.synthesize(flow, true);
        let resets = self.reset_texcoords();
        self.finish(flow, max_sq, resets, MAX_SUBSTEPS_FULL)
    }

    fn advect_texcoords(&mut self, flow: &CoarseFlow<'_>) {
        let dt0 = flow.dt / self.coarse.dx;
        self.texcoords.advect(
            &self.coarse,
            dt0,
            flow.velocity,
            &mut self.scratch_a,
            &mut self.scratch_b,
        );
    }

    fn reset_texcoords(&mut self) -> usize {
        let frames = &self.frames;
        self.texcoords
            .reset_where(&self.coarse, |idx| frames[idx].deformation.needs_reset())
    }

    fn update_energy(&mut self, flow: &CoarseFlow<'_>) {
        compute_energy(
            &self.coarse,
            flow.velocity,
            flow.obstacles,
            &mut self.energy,
            &mut self.march_flags,
        );
        decompose_energy(
            &self.coarse,
            &self.energy,
            flow.obstacles,
            &mut self.high_freq,
            &mut self.energy_scratch,
        );
    }

    /// Build the fine velocity; returns the largest `|v|^2`.
    fn synthesize(&mut self, flow: &CoarseFlow<'_>, parallel: bool) -> f32 {
        let synth = Synthesizer {
            coarse: &self.coarse,
            amplify: self.amplify,
            velocity: flow.velocity,
            obstacles: flow.obstacles,
            texcoords: &self.texcoords,
            high_freq: &self.high_freq,
            frames: &self.frames,
            noise: &self.noise,
            strength: self.strength,
            octaves: self.octaves,
        };
        if parallel {
            synthesize_full(&synth, &self.fine, &mut self.velocity)
        } else {
            synthesize_readable(&synth, &self.fine, &mut self.velocity)
        }
    }

    /// Substepped fine density advection and bookkeeping shared by both
    /// variants.
    fn finish(
        &mut self,
        flow: &CoarseFlow<'_>,
        max_sq: f32,
        resets: usize,
        max_substeps: usize,
    ) -> TurbulenceReport {
        let dt0 = flow.dt / self.coarse.dx * self.amplify as f32;
        let max_velocity = max_sq.sqrt();
        let substeps = substeps(max_velocity, dt0, max_substeps);
        let dt_sub = dt0 / substeps as f32;

        set_zero_x(&self.fine, &mut self.velocity.x);
        set_zero_y(&self.fine, &mut self.velocity.y);
        set_zero_z(&self.fine, &mut self.velocity.z);

        self.density.swap();
        for substep in 0..substeps {
            let (current, old) = self.density.split_mut();
            advect_maccormack(
                &self.fine,
                dt_sub,
                self.velocity.view(),
                old,
                current,
                &mut self.scratch_a,
                &mut self.scratch_b,
                None,
            );
            if substep + 1 < substeps {
                self.density.swap();
            }
        }

        let density = self.density.current_mut();
        set_zero_border(&self.fine, density);
        if let Some(dissolve) = &self.dissolve {
            dissolve_density(dissolve, density);
        }
        self.step += 1;

        let singular_cells = self.frames.iter().filter(|f| f.deformation.singular).count();
        let eigen_failures = self
            .frames
            .iter()
            .filter(|f| f.deformation.eigen_failed)
            .count();

        let report = TurbulenceReport {
            step: self.step,
            substeps,
            max_velocity,
            resets,
            singular_cells,
            eigen_failures,
        };
        log::debug!(
            "Turbulence step {}: {} substeps, max |v| {:.4}, resets {}, singular {}, eigen {}",
            report.step,
            substeps,
            max_velocity,
            resets,
            singular_cells,
            eigen_failures
        );
        report
    }

    // ========== Accessors ==========

    /// Fine grid resolution and spacing.
    pub fn fine_grid(&self) -> &Grid3D {
        &self.fine
    }

    pub fn coarse_grid(&self) -> &Grid3D {
        &self.coarse
    }

    pub fn amplify(&self) -> usize {
        self.amplify
    }

    /// Noise octaves added per fine cell, `round(log2(amplify))`.
    pub fn octaves(&self) -> usize {
        self.octaves
    }

    pub fn steps(&self) -> u64 {
        self.step
    }

    /// Current fine density.
    pub fn density(&self) -> &[f32] {
        self.density.current()
    }

    /// Mutable fine density, for seeding and emitters.
    pub fn density_mut(&mut self) -> &mut [f32] {
        self.density.current_mut()
    }

    /// Fine velocity built by the last step.
    pub fn velocity(&self) -> &VectorField {
        &self.velocity
    }

    pub fn texture_coords(&self) -> &TextureCoords {
        &self.texcoords
    }

    /// Unresolved energy band from the last step.
    pub fn high_freq_energy(&self) -> &[f32] {
        &self.high_freq
    }

    pub fn noise_tile(&self) -> &Arc<WaveletNoiseTile> {
        &self.noise
    }
}
