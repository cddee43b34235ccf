//! Vorticity confinement.
//!
//! Curl is taken with central differences; next to an obstacle the
//! obstacle side is replaced by the center cell, giving a one-sided
//! difference with the matching `1 / dx` factor.

use glam::Vec3;

use crate::constants::EMPTY;
use crate::grid::{Grid3D, VectorField};

/// Curl and curl magnitude buffers reused between steps.
#[derive(Clone, Debug, Default)]
pub struct VorticityScratch {
    omega: VectorField,
    magnitude: Vec<f32>,
}

impl VorticityScratch {
    pub fn new(total_cells: usize) -> Self {
        Self {
            omega: VectorField::zeros(total_cells),
            magnitude: vec![0.0; total_cells],
        }
    }
}

/// Neighbor indices and difference weights around one cell, with
/// obstacle neighbors folded onto the center.
struct Stencil {
    left: usize,
    right: usize,
    down: usize,
    up: usize,
    below: usize,
    above: usize,
    wx: f32,
    wy: f32,
    wz: f32,
}

impl Stencil {
    #[inline]
    fn new(grid: &Grid3D, obstacles: &[u8], idx: usize) -> Self {
        let central = 0.5 / grid.dx;
        let one_sided = 1.0 / grid.dx;
        let pick = |n: usize| if obstacles[n] != EMPTY { idx } else { n };

        let left = pick(idx - 1);
        let right = pick(idx + 1);
        let down = pick(idx - grid.x_res);
        let up = pick(idx + grid.x_res);
        let below = pick(idx - grid.slab_size);
        let above = pick(idx + grid.slab_size);
        let weight = |a: usize, b: usize| {
            if a == idx || b == idx {
                one_sided
            } else {
                central
            }
        };

        Self {
            left,
            right,
            down,
            up,
            below,
            above,
            wx: weight(left, right),
            wy: weight(down, up),
            wz: weight(below, above),
        }
    }
}

/// Add `eps * dx * (N x omega)` to `force` on interior fluid cells.
///
/// Does nothing when `eps <= 0`.
pub fn add_vorticity_confinement(
    grid: &Grid3D,
    eps: f32,
    obstacles: &[u8],
    vel: &VectorField,
    force: &mut VectorField,
    scratch: &mut VorticityScratch,
) {
    if eps <= 0.0 {
        return;
    }

    let VorticityScratch { omega, magnitude } = scratch;
    omega.fill(0.0);
    magnitude.fill(0.0);

    grid.for_each_interior(|_, _, _, idx| {
        let s = Stencil::new(grid, obstacles, idx);
        let wx = (vel.z[s.up] - vel.z[s.down]) * s.wy - (vel.y[s.above] - vel.y[s.below]) * s.wz;
        let wy = (vel.x[s.above] - vel.x[s.below]) * s.wz - (vel.z[s.right] - vel.z[s.left]) * s.wx;
        let wz = (vel.y[s.right] - vel.y[s.left]) * s.wx - (vel.x[s.up] - vel.x[s.down]) * s.wy;
        omega.x[idx] = wx;
        omega.y[idx] = wy;
        omega.z[idx] = wz;
        magnitude[idx] = (wx * wx + wy * wy + wz * wz).sqrt();
    });

    let scale = grid.dx * eps;
    grid.for_each_interior(|_, _, _, idx| {
        if obstacles[idx] != EMPTY {
            return;
        }
        let s = Stencil::new(grid, obstacles, idx);
        let gradient = Vec3::new(
            (magnitude[s.right] - magnitude[s.left]) * s.wx,
            (magnitude[s.up] - magnitude[s.down]) * s.wy,
            (magnitude[s.above] - magnitude[s.below]) * s.wz,
        );
        let length = gradient.length();
        if length <= f32::EPSILON {
            return;
        }
        let n = gradient / length;
        let f = n.cross(omega.get(idx)) * scale;
        force.x[idx] += f.x;
        force.y[idx] += f.y;
        force.z[idx] += f.z;
    });
}
