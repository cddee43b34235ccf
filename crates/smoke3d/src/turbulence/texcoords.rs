//! Advected texture coordinates on the coarse grid and their Jacobian.

use glam::Vec3;

use crate::advection::advect_maccormack;
use crate::boundary::copy_border_all;
use crate::grid::{Grid3D, VelocityView};
use crate::lu::Mat3;

/// Per-coarse-cell texture coordinates `(u, v, w)`, each in `[0, 1]` when
/// undeformed, plus one shared shadow buffer for advection.
#[derive(Clone, Debug)]
pub struct TextureCoords {
    pub u: Vec<f32>,
    pub v: Vec<f32>,
    pub w: Vec<f32>,
    temp: Vec<f32>,
}

impl TextureCoords {
    /// Coordinates at their canonical positions `x / res`.
    pub fn new(grid: &Grid3D) -> Self {
        let mut tc = Self {
            u: vec![0.0; grid.total_cells],
            v: vec![0.0; grid.total_cells],
            w: vec![0.0; grid.total_cells],
            temp: vec![0.0; grid.total_cells],
        };
        for z in 0..grid.z_res {
            for y in 0..grid.y_res {
                for x in 0..grid.x_res {
                    tc.reset_cell(grid, x, y, z);
                }
            }
        }
        tc
    }

    #[inline]
    fn reset_cell(&mut self, grid: &Grid3D, x: usize, y: usize, z: usize) {
        let idx = grid.index(x, y, z);
        self.u[idx] = x as f32 / grid.x_res as f32;
        self.v[idx] = y as f32 / grid.y_res as f32;
        self.w[idx] = z as f32 / grid.z_res as f32;
    }

    /// Interpolated `(u, v, w)` at a coarse position in cell units.
    pub fn lerp(&self, grid: &Grid3D, pos: Vec3) -> Vec3 {
        Vec3::new(
            grid.lerp(&self.u, pos),
            grid.lerp(&self.v, pos),
            grid.lerp(&self.w, pos),
        )
    }

    /// MacCormack-advect all three components with the coarse velocity.
    ///
    /// `scratch_a` and `scratch_b` must hold at least `grid.total_cells`
    /// values; the fine-grid scratch is reused here.
    pub fn advect(
        &mut self,
        grid: &Grid3D,
        dt0: f32,
        velocity: VelocityView<'_>,
        scratch_a: &mut [f32],
        scratch_b: &mut [f32],
    ) {
        let n = grid.total_cells;
        let (hat, hat_hat) = (&mut scratch_a[..n], &mut scratch_b[..n]);
        for component in [&mut self.u, &mut self.v, &mut self.w] {
            std::mem::swap(component, &mut self.temp);
            copy_border_all(grid, &mut self.temp);
            advect_maccormack(grid, dt0, velocity, &self.temp, component, hat, hat_hat, None);
        }
    }

    /// Jacobian of the coordinate map at a coarse cell, scaled to cells.
    ///
    /// Row `a` holds the derivative along axis `a` of `(u, v, w)`.
    pub fn jacobian(&self, grid: &Grid3D, x: usize, y: usize, z: usize) -> Mat3 {
        let idx = grid.index(x, y, z);
        let axes = [
            (x, grid.x_res, 1),
            (y, grid.y_res, grid.x_res),
            (z, grid.z_res, grid.slab_size),
        ];
        let mut j = [[0.0f64; 3]; 3];
        for (row, &(pos, res, stride)) in axes.iter().enumerate() {
            for (col, field) in [&self.u, &self.v, &self.w].into_iter().enumerate() {
                j[row][col] = derivative(field, idx, pos, res, stride) as f64;
            }
        }
        j
    }

    /// Move every interior cell flagged by `needs_reset` back to its
    /// canonical position. Returns the number of cells reset.
    pub fn reset_where(&mut self, grid: &Grid3D, needs_reset: impl Fn(usize) -> bool) -> usize {
        let mut resets = 0;
        for z in 1..grid.z_res - 1 {
            for y in 1..grid.y_res - 1 {
                for x in 1..grid.x_res - 1 {
                    if needs_reset(grid.index(x, y, z)) {
                        self.reset_cell(grid, x, y, z);
                        resets += 1;
                    }
                }
            }
        }
        resets
    }
}

/// Derivative along one axis in units of the whole domain: centered inside
/// `(1, res - 2)`, one-sided from the inner neighbor otherwise.
#[inline]
fn derivative(field: &[f32], idx: usize, pos: usize, res: usize, stride: usize) -> f32 {
    let scale = res as f32;
    if pos <= 1 {
        (field[idx + stride] - field[idx]) * scale
    } else if pos >= res - 2 {
        (field[idx] - field[idx - stride]) * scale
    } else {
        (field[idx + stride] - field[idx - stride]) * scale * 0.5
    }
}
