//! Deformation classification and per-fine-cell noise synthesis.

use glam::Vec3;
use rayon::prelude::*;

use crate::constants::{
    CULL_THRESHOLD, EIGEN_SENTINEL, MAX_DEFORMATION, MIN_DEFORMATION, OBSTACLE_CUTOFF,
    PERSISTENCE, SINGULAR_MAX_EIGEN, SINGULAR_MIN_EIGEN, SUBSTEP_DISPLACEMENT,
};
use crate::eigen::eigenvalues;
use crate::grid::{Grid3D, VectorField, VelocityView};
use crate::lu::{Lu3, Mat3};
use crate::noise::WaveletNoiseTile;

use super::texcoords::TextureCoords;

/// Eigenvalue magnitude bounds of the texture-coordinate Jacobian.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Deformation {
    pub min_eigen: f32,
    pub max_eigen: f32,
    /// The Jacobian had a zero pivot.
    pub singular: bool,
    /// The QR iteration hit its cap.
    pub eigen_failed: bool,
}

impl Deformation {
    /// Coarse cells on the outer shell are never classified and never
    /// receive noise.
    pub const OUTSIDE: Self = Self {
        min_eigen: SINGULAR_MIN_EIGEN,
        max_eigen: SINGULAR_MAX_EIGEN,
        singular: false,
        eigen_failed: false,
    };

    /// Noise is only added where the coordinates are close to rigid.
    pub fn in_band(&self) -> bool {
        self.max_eigen < MAX_DEFORMATION && self.min_eigen > MIN_DEFORMATION
    }

    pub fn needs_reset(&self) -> bool {
        self.max_eigen > MAX_DEFORMATION || self.min_eigen < MIN_DEFORMATION
    }
}

/// Classification of one coarse cell plus the basis that undoes its
/// coordinate warp.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CellFrame {
    pub deformation: Deformation,
    /// Solutions of `J u = e_x`, `J u = e_y`, `J u = e_z`.
    pub unwarped: [Vec3; 3],
}

impl CellFrame {
    pub const OUTSIDE: Self = Self {
        deformation: Deformation::OUTSIDE,
        unwarped: [Vec3::X, Vec3::Y, Vec3::Z],
    };

    pub const SINGULAR: Self = Self {
        deformation: Deformation {
            min_eigen: SINGULAR_MIN_EIGEN,
            max_eigen: SINGULAR_MAX_EIGEN,
            singular: true,
            eigen_failed: false,
        },
        unwarped: [Vec3::X, Vec3::Y, Vec3::Z],
    };
}

/// LU-check the Jacobian, then bound its eigenvalue magnitudes.
pub fn classify(jacobian: &Mat3) -> CellFrame {
    let lu = Lu3::new(jacobian);
    let solve = |e: [f64; 3]| {
        lu.solve(e).map(|u| Vec3::new(u[0] as f32, u[1] as f32, u[2] as f32))
    };
    let (Some(ux), Some(uy), Some(uz)) = (
        solve([1.0, 0.0, 0.0]),
        solve([0.0, 1.0, 0.0]),
        solve([0.0, 0.0, 1.0]),
    ) else {
        return CellFrame::SINGULAR;
    };

    let eigen = eigenvalues(jacobian);
    let deformation = if eigen.converged {
        let m = eigen.magnitudes();
        Deformation {
            min_eigen: m[0].min(m[1]).min(m[2]) as f32,
            max_eigen: m[0].max(m[1]).max(m[2]) as f32,
            singular: false,
            eigen_failed: false,
        }
    } else {
        Deformation {
            min_eigen: EIGEN_SENTINEL,
            max_eigen: EIGEN_SENTINEL,
            singular: false,
            eigen_failed: true,
        }
    };

    CellFrame {
        deformation,
        unwarped: [ux, uy, uz],
    }
}

#[inline]
fn frame_at(grid: &Grid3D, texcoords: &TextureCoords, idx: usize) -> CellFrame {
    let (x, y, z) = grid.coords(idx);
    if grid.is_interior(x, y, z) {
        classify(&texcoords.jacobian(grid, x, y, z))
    } else {
        CellFrame::OUTSIDE
    }
}

/// Classify every coarse cell in order.
pub fn classify_cells(grid: &Grid3D, texcoords: &TextureCoords, frames: &mut [CellFrame]) {
    for (idx, frame) in frames.iter_mut().enumerate() {
        *frame = frame_at(grid, texcoords, idx);
    }
}

/// Classify every coarse cell on the rayon pool.
pub fn classify_cells_parallel(grid: &Grid3D, texcoords: &TextureCoords, frames: &mut [CellFrame]) {
    frames
        .par_iter_mut()
        .enumerate()
        .for_each(|(idx, frame)| *frame = frame_at(grid, texcoords, idx));
}

/// Everything the fine velocity at one cell depends on. Read-only, so one
/// instance is shared by all workers.
pub struct Synthesizer<'a> {
    pub coarse: &'a Grid3D,
    pub amplify: usize,
    pub velocity: VelocityView<'a>,
    pub obstacles: &'a [u8],
    pub texcoords: &'a TextureCoords,
    pub high_freq: &'a [f32],
    pub frames: &'a [CellFrame],
    pub noise: &'a WaveletNoiseTile,
    pub strength: f32,
    pub octaves: usize,
}

impl Synthesizer<'_> {
    /// Fine cell center in coarse cell units.
    #[inline]
    pub fn coarse_position(&self, x: usize, y: usize, z: usize) -> Vec3 {
        (Vec3::new(x as f32, y as f32, z as f32) + 0.5) / self.amplify as f32 - 0.5
    }

    /// Coarse cell containing the fine cell.
    #[inline]
    fn owner(&self, x: usize, y: usize, z: usize) -> usize {
        let a = self.amplify;
        self.coarse.index(x / a, y / a, z / a)
    }

    /// Interpolated coarse velocity plus octaves of curl noise scaled by the
    /// local unresolved energy. With `unwarp` the noise gradients are taken
    /// through the owner cell's inverse Jacobian.
    pub fn velocity_at(&self, x: usize, y: usize, z: usize, unwarp: bool) -> Vec3 {
        let pos = self.coarse_position(x, y, z);
        if self.coarse.lerp_mask(self.obstacles, pos) > OBSTACLE_CUTOFF {
            return Vec3::ZERO;
        }

        let mut vel = self.velocity.lerp(self.coarse, pos);
        let frame = &self.frames[self.owner(x, y, z)];
        if !frame.deformation.in_band() {
            return vel;
        }

        let energy = self.coarse.lerp(self.high_freq, pos);
        let coefficient = (2.0 * energy.abs()).sqrt();
        let amplitude = self.strength * (0.5 * coefficient).abs() * PERSISTENCE;
        if amplitude <= CULL_THRESHOLD {
            return vel;
        }

        let mut tex = self.texcoords.lerp(self.coarse, pos) * self.coarse.res_vec();
        let mut scaled = amplitude;
        for _ in 0..self.octaves {
            let noise = if unwarp {
                self.noise.velocity_with_jacobian(tex, &frame.unwarped)
            } else {
                self.noise.velocity(tex)
            };
            vel += noise * scaled;
            scaled *= PERSISTENCE;
            tex *= 2.0;
        }
        vel
    }
}

/// Fill the fine velocity cell by cell. Returns the largest `|v|^2`.
pub fn synthesize_readable(synth: &Synthesizer<'_>, fine: &Grid3D, out: &mut VectorField) -> f32 {
    let mut max_sq = 0.0f32;
    for z in 0..fine.z_res {
        for y in 0..fine.y_res {
            for x in 0..fine.x_res {
                let idx = fine.index(x, y, z);
                let v = synth.velocity_at(x, y, z, false);
                out.x[idx] = v.x;
                out.y[idx] = v.y;
                out.z[idx] = v.z;
                max_sq = max_sq.max(v.length_squared());
            }
        }
    }
    max_sq
}

/// Fill the fine velocity one z-slab per task with unwarped noise.
/// Returns the largest `|v|^2`, reduced across tasks.
///
/// Every fine cell depends only on its own position and the read-only
/// coarse state, so splitting by fine slab gives the same field as a loop
/// over coarse cells and their fine blocks.
pub fn synthesize_full(synth: &Synthesizer<'_>, fine: &Grid3D, out: &mut VectorField) -> f32 {
    let slab = fine.slab_size;
    let VectorField { x, y, z } = out;

    x.par_chunks_mut(slab)
        .zip(y.par_chunks_mut(slab))
        .zip(z.par_chunks_mut(slab))
        .enumerate()
        .map(|(fz, ((xs, ys), zs))| {
            let mut max_sq = 0.0f32;
            for fy in 0..fine.y_res {
                for fx in 0..fine.x_res {
                    let i = fx + fy * fine.x_res;
                    let v = synth.velocity_at(fx, fy, fz, true);
                    xs[i] = v.x;
                    ys[i] = v.y;
                    zs[i] = v.z;
                    max_sq = max_sq.max(v.length_squared());
                }
            }
            max_sq
        })
        .reduce(|| 0.0, f32::max)
}

/// Number of density advection substeps for a fine timestep `dt0` (in fine
/// cells) so one substep moves at most a few cells.
pub fn substeps(max_velocity: f32, dt0: f32, cap: usize) -> usize {
    let steps = (max_velocity * dt0 / SUBSTEP_DISPLACEMENT) as usize;
    steps.clamp(1, cap)
}
