//! Semi-Lagrangian and MacCormack advection on the collocated grid.
//!
//! Timesteps here are in cell units (`dt / dx`). Velocity is sampled at the
//! grid point and the backtrace is clamped to `[0.5, res - 1.5]` so the
//! eight interpolation corners are always valid indices.

use glam::Vec3;

use crate::boundary::{copy_border_all, set_zero_x, set_zero_y, set_zero_z};
use crate::grid::{Grid3D, VectorField, VelocityView};

// ========== Interpolation helpers ==========

/// Clamp a traced position and split it into the base corner index and
/// fractional weights.
#[inline]
fn locate(grid: &Grid3D, trace: Vec3) -> (usize, Vec3) {
    let p = Vec3::new(
        trace.x.clamp(0.5, grid.x_res as f32 - 1.5),
        trace.y.clamp(0.5, grid.y_res as f32 - 1.5),
        trace.z.clamp(0.5, grid.z_res as f32 - 1.5),
    );
    let x0 = p.x as usize;
    let y0 = p.y as usize;
    let z0 = p.z as usize;
    let frac = p - Vec3::new(x0 as f32, y0 as f32, z0 as f32);
    (grid.index(x0, y0, z0), frac)
}

/// The eight interpolation corners starting at `base`.
#[inline]
fn corners(grid: &Grid3D, base: usize) -> [usize; 8] {
    let xr = grid.x_res;
    let slab = grid.slab_size;
    [
        base,
        base + 1,
        base + xr,
        base + xr + 1,
        base + slab,
        base + slab + 1,
        base + slab + xr,
        base + slab + xr + 1,
    ]
}

#[inline]
fn sample(grid: &Grid3D, field: &[f32], trace: Vec3) -> f32 {
    let (base, f) = locate(grid, trace);
    let c = corners(grid, base);
    let (s1, t1, u1) = (f.x, f.y, f.z);
    let (s0, t0, u0) = (1.0 - s1, 1.0 - t1, 1.0 - u1);

    s0 * (t0 * (u0 * field[c[0]] + u1 * field[c[4]]) + t1 * (u0 * field[c[2]] + u1 * field[c[6]]))
        + s1 * (t0 * (u0 * field[c[1]] + u1 * field[c[5]])
            + t1 * (u0 * field[c[3]] + u1 * field[c[7]]))
}

#[inline]
fn cell_pos(x: usize, y: usize, z: usize) -> Vec3 {
    Vec3::new(x as f32, y as f32, z as f32)
}

// ========== Advection ==========

/// First-order semi-Lagrangian advection of `old` into `out`, every cell.
pub fn advect_semi_lagrange(
    grid: &Grid3D,
    dt0: f32,
    vel: VelocityView<'_>,
    old: &[f32],
    out: &mut [f32],
) {
    for z in 0..grid.z_res {
        for y in 0..grid.y_res {
            for x in 0..grid.x_res {
                let idx = grid.index(x, y, z);
                let trace = cell_pos(x, y, z) - dt0 * vel.get(idx);
                out[idx] = sample(grid, old, trace);
            }
        }
    }
}

/// Two-pass MacCormack advection of `old` into `out`.
///
/// `phi_hat` and `phi_hat_hat` are caller-owned scratch of the same length.
/// With `obstacles = None` the obstacle fallback is skipped.
#[allow(clippy::too_many_arguments)]
pub fn advect_maccormack(
    grid: &Grid3D,
    dt0: f32,
    vel: VelocityView<'_>,
    old: &[f32],
    out: &mut [f32],
    phi_hat: &mut [f32],
    phi_hat_hat: &mut [f32],
    obstacles: Option<&[u8]>,
) {
    advect_semi_lagrange(grid, dt0, vel, old, phi_hat);
    advect_semi_lagrange(grid, -dt0, vel, phi_hat, phi_hat_hat);

    for (((o, &hat), &orig), &hat_hat) in out
        .iter_mut()
        .zip(phi_hat.iter())
        .zip(old.iter())
        .zip(phi_hat_hat.iter())
    {
        *o = hat + (orig - hat_hat) * 0.5;
    }
    copy_border_all(grid, out);

    clamp_extrema(grid, dt0, vel, old, out);
    clamp_outside_rays(grid, dt0, vel, obstacles, phi_hat, out);
}

/// Clamp interior values to the range of their eight forward-trace source
/// corners in `old`.
pub fn clamp_extrema(
    grid: &Grid3D,
    dt0: f32,
    vel: VelocityView<'_>,
    old: &[f32],
    out: &mut [f32],
) {
    grid.for_each_interior(|x, y, z, idx| {
        let trace = cell_pos(x, y, z) - dt0 * vel.get(idx);
        let (base, _) = locate(grid, trace);
        let mut lo = f32::MAX;
        let mut hi = f32::MIN;
        for c in corners(grid, base) {
            lo = lo.min(old[c]);
            hi = hi.max(old[c]);
        }
        let v = out[idx];
        out[idx] = if v < lo {
            lo
        } else if v > hi {
            hi
        } else {
            v
        };
    });
}

/// Revert to the first-order result wherever a forward or backward
/// characteristic leaves `[1, res - 2]` or touches an obstacle corner.
pub fn clamp_outside_rays(
    grid: &Grid3D,
    dt0: f32,
    vel: VelocityView<'_>,
    obstacles: Option<&[u8]>,
    phi_hat: &[f32],
    out: &mut [f32],
) {
    let lo = Vec3::ONE;
    let hi = grid.res_vec() - 2.0;
    let outside = |q: Vec3| q.cmplt(lo).any() || q.cmpgt(hi).any();

    grid.for_each_interior(|x, y, z, idx| {
        let p = cell_pos(x, y, z);
        let step = dt0 * vel.get(idx);
        let forward = p - step;
        let backward = p + step;

        if outside(forward) || outside(backward) {
            out[idx] = phi_hat[idx];
            return;
        }

        if let Some(mask) = obstacles {
            let touches = |q: Vec3| {
                let (base, _) = locate(grid, q);
                corners(grid, base).iter().any(|&c| mask[c] != 0)
            };
            if touches(forward) || touches(backward) {
                out[idx] = phi_hat[idx];
            }
        }
    });
}

/// Zero the normal velocity on the outer faces of the velocity that is
/// about to drive advection.
pub fn begin_maccormack(grid: &Grid3D, velocity: &mut VectorField) {
    set_zero_x(grid, &mut velocity.x);
    set_zero_y(grid, &mut velocity.y);
    set_zero_z(grid, &mut velocity.z);
}
