//! External forces, checkerboard damping and density dissolve.

use crate::config::Dissolve;
use crate::constants::DAMPING_WEIGHT;
use crate::grid::{Grid3D, VectorField};

/// `force.z += alpha * density + beta * (heat - ambient)` on every cell.
pub fn add_buoyancy(
    alpha: f32,
    beta: f32,
    ambient: f32,
    density: &[f32],
    heat: &[f32],
    force_z: &mut [f32],
) {
    for ((f, &rho), &t) in force_z.iter_mut().zip(density).zip(heat) {
        *f += alpha * rho + beta * (t - ambient);
    }
}

/// `vel += dt * force` on every cell.
pub fn add_force(dt: f32, force: &VectorField, vel: &mut VectorField) {
    let pairs = [
        (&mut vel.x, &force.x),
        (&mut vel.y, &force.y),
        (&mut vel.z, &force.z),
    ];
    for (v, f) in pairs {
        for (v, &f) in v.iter_mut().zip(f.iter()) {
            *v += dt * f;
        }
    }
}

/// Which checkerboard color (if any) the damping pass touches on `step`.
///
/// Steps `4k + 1` damp cells with `x + y + z` odd, steps `4k + 3` the even
/// ones.
pub fn damping_parity(step: u64) -> Option<usize> {
    match step % 4 {
        1 => Some(0),
        3 => Some(1),
        _ => None,
    }
}

/// Blend one checkerboard color of `field` toward its 6-neighbor average.
///
/// Neighbors of a damped cell all have the other color, so the pass can run
/// in place.
pub fn damp_checkerboard(grid: &Grid3D, parity: usize, field: &mut [f32]) {
    let w = DAMPING_WEIGHT;
    let (xr, slab) = (grid.x_res, grid.slab_size);
    for z in 1..grid.z_res - 1 {
        for y in 1..grid.y_res - 1 {
            let start = 1 + (y + z + parity) % 2;
            for x in (start..grid.x_res - 1).step_by(2) {
                let idx = grid.index(x, y, z);
                let sum = field[idx + 1]
                    + field[idx - 1]
                    + field[idx + xr]
                    + field[idx - xr]
                    + field[idx + slab]
                    + field[idx - slab];
                field[idx] = (1.0 - w) * field[idx] + w / 6.0 * sum;
            }
        }
    }
}

/// Checkerboard damping of all three velocity components for `step`.
pub fn artificial_damping(grid: &Grid3D, step: u64, vel: &mut VectorField) {
    if let Some(parity) = damping_parity(step) {
        damp_checkerboard(grid, parity, &mut vel.x);
        damp_checkerboard(grid, parity, &mut vel.y);
        damp_checkerboard(grid, parity, &mut vel.z);
    }
}

/// Fade a density field by one step of `dissolve`.
pub fn dissolve_density(dissolve: &Dissolve, density: &mut [f32]) {
    if dissolve.speed == 0 {
        return;
    }
    let rate = 1.0 / dissolve.speed as f32;
    if dissolve.logarithmic {
        let factor = 1.0 - rate;
        density.iter_mut().for_each(|d| *d *= factor);
    } else {
        density.iter_mut().for_each(|d| *d = (*d - rate).max(0.0));
    }
}
