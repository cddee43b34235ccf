//! Jacobi-preconditioned conjugate gradient for the implicit 7-point systems.
//!
//! Both the pressure Poisson equation and implicit heat diffusion use the
//! same matrix shape, never stored: for an interior non-obstacle cell with
//! `n` non-obstacle face neighbors the diagonal is `base + coupling * n` and
//! each non-obstacle neighbor contributes `-coupling`. Border and obstacle
//! cells are not unknowns; their values in `x` act as fixed boundary values.

use crate::constants::{CG_TOLERANCE, EMPTY};
use crate::grid::Grid3D;

/// Matrix coefficients of one implicit solve.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ImplicitStencil {
    pub base: f32,
    pub coupling: f32,
}

impl ImplicitStencil {
    /// Pressure Poisson: diagonal = neighbor count, off-diagonal = -1.
    pub const POISSON: Self = Self {
        base: 0.0,
        coupling: 1.0,
    };

    /// Implicit diffusion with coupling `c = dt * diffusivity / dx^2`.
    pub fn diffusion(c: f32) -> Self {
        Self {
            base: 1.0,
            coupling: c,
        }
    }
}

/// Convergence diagnostics of one solve.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SolverStats {
    pub iterations: usize,
    /// Final `max_i r_i * (P r)_i`.
    pub max_residual: f64,
    /// Whether the tolerance was reached before the iteration cap.
    pub converged: bool,
}

/// Scratch vectors reused across solves.
#[derive(Clone, Debug, Default)]
pub struct CgWorkspace {
    residual: Vec<f32>,
    direction: Vec<f32>,
    q: Vec<f32>,
    precond: Vec<f32>,
}

impl CgWorkspace {
    pub fn new(total_cells: usize) -> Self {
        Self {
            residual: vec![0.0; total_cells],
            direction: vec![0.0; total_cells],
            q: vec![0.0; total_cells],
            precond: vec![0.0; total_cells],
        }
    }
}

#[inline]
fn neighbors(grid: &Grid3D, idx: usize) -> [usize; 6] {
    [
        idx - 1,
        idx + 1,
        idx - grid.x_res,
        idx + grid.x_res,
        idx - grid.slab_size,
        idx + grid.slab_size,
    ]
}

/// `(A v)_idx` for an unknown cell, plus the diagonal entry.
#[inline]
fn apply_row(
    grid: &Grid3D,
    stencil: ImplicitStencil,
    obstacles: &[u8],
    v: &[f32],
    idx: usize,
) -> (f32, f32) {
    let mut count = 0.0;
    let mut off = 0.0;
    for n in neighbors(grid, idx) {
        if obstacles[n] == EMPTY {
            count += 1.0;
            off += v[n];
        }
    }
    let diag = stencil.base + stencil.coupling * count;
    (diag * v[idx] - stencil.coupling * off, diag)
}

/// Solve `A x = b` in place, starting from the current contents of `x`.
pub fn solve_cg(
    grid: &Grid3D,
    stencil: ImplicitStencil,
    obstacles: &[u8],
    b: &[f32],
    x: &mut [f32],
    ws: &mut CgWorkspace,
    max_iterations: usize,
) -> SolverStats {
    let CgWorkspace {
        residual,
        direction,
        q,
        precond,
    } = ws;
    residual.fill(0.0);
    direction.fill(0.0);
    q.fill(0.0);
    precond.fill(0.0);

    // r = b - A x, d = P r
    let mut delta_new = 0.0f64;
    let mut max_r = 0.0f64;
    grid.for_each_interior(|_, _, _, idx| {
        if obstacles[idx] != EMPTY {
            return;
        }
        let (ax, diag) = apply_row(grid, stencil, obstacles, x, idx);
        let r = b[idx] - ax;
        let p = if diag < 1.0 { 0.0 } else { 1.0 / diag };
        residual[idx] = r;
        precond[idx] = p;
        direction[idx] = p * r;
        let rz = r as f64 * direction[idx] as f64;
        delta_new += rz;
        max_r = max_r.max(rz);
    });

    let mut iterations = 0;
    while iterations < max_iterations && max_r > CG_TOLERANCE {
        // q = A d
        let mut dq = 0.0f64;
        grid.for_each_interior(|_, _, _, idx| {
            if obstacles[idx] != EMPTY {
                return;
            }
            let (ad, _) = apply_row(grid, stencil, obstacles, direction, idx);
            q[idx] = ad;
            dq += direction[idx] as f64 * ad as f64;
        });
        if dq == 0.0 {
            break;
        }
        let alpha = delta_new / dq;

        // x += alpha d, r -= alpha q, s = P r (stored in q)
        let delta_old = delta_new;
        delta_new = 0.0;
        max_r = 0.0;
        grid.for_each_interior(|_, _, _, idx| {
            if obstacles[idx] != EMPTY {
                return;
            }
            x[idx] += (alpha * direction[idx] as f64) as f32;
            residual[idx] -= (alpha * q[idx] as f64) as f32;
            let s = precond[idx] * residual[idx];
            q[idx] = s;
            let rz = residual[idx] as f64 * s as f64;
            delta_new += rz;
            max_r = max_r.max(rz);
        });
        iterations += 1;

        if delta_old == 0.0 {
            break;
        }
        let beta = (delta_new / delta_old) as f32;
        grid.for_each_interior(|_, _, _, idx| {
            if obstacles[idx] == EMPTY {
                direction[idx] = q[idx] + beta * direction[idx];
            }
        });
    }

    let stats = SolverStats {
        iterations,
        max_residual: max_r,
        converged: max_r <= CG_TOLERANCE,
    };
    log::trace!(
        "CG: {} iterations, residual {:.3e}, converged {}",
        stats.iterations,
        stats.max_residual,
        stats.converged
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::OBSTACLE;

    /// `A x` over all unknowns, for checking solutions.
    fn residual_norm(
        grid: &Grid3D,
        stencil: ImplicitStencil,
        obstacles: &[u8],
        b: &[f32],
        x: &[f32],
    ) -> f32 {
        let mut worst = 0.0f32;
        grid.for_each_interior(|_, _, _, idx| {
            if obstacles[idx] == EMPTY {
                let (ax, _) = apply_row(grid, stencil, obstacles, x, idx);
                worst = worst.max((b[idx] - ax).abs());
            }
        });
        worst
    }

    #[test]
    fn test_zero_rhs_exits_immediately() {
        let grid = Grid3D::new(6, 6, 6).unwrap();
        let mask = vec![EMPTY; grid.total_cells];
        let b = vec![0.0; grid.total_cells];
        let mut x = vec![0.0; grid.total_cells];
        let mut ws = CgWorkspace::new(grid.total_cells);
        let stats = solve_cg(&grid, ImplicitStencil::POISSON, &mask, &b, &mut x, &mut ws, 100);
        assert_eq!(stats.iterations, 0);
        assert!(stats.converged);
    }

    #[test]
    fn test_poisson_point_source_converges() {
        let grid = Grid3D::new(10, 10, 10).unwrap();
        let mask = vec![EMPTY; grid.total_cells];
        let mut b = vec![0.0; grid.total_cells];
        b[grid.index(5, 5, 5)] = 1.0;
        let mut x = vec![0.0; grid.total_cells];
        let mut ws = CgWorkspace::new(grid.total_cells);

        let stats = solve_cg(&grid, ImplicitStencil::POISSON, &mask, &b, &mut x, &mut ws, 100);
        assert!(stats.converged, "stats {:?}", stats);
        let res = residual_norm(&grid, ImplicitStencil::POISSON, &mask, &b, &x);
        assert!(res < 1e-3, "residual {}", res);
        assert!(x[grid.index(5, 5, 5)] > x[grid.index(3, 5, 5)]);
    }

    #[test]
    fn test_diffusion_identity_when_uncoupled() {
        let grid = Grid3D::new(5, 5, 5).unwrap();
        let mask = vec![EMPTY; grid.total_cells];
        let b: Vec<f32> = (0..grid.total_cells).map(|i| i as f32 * 0.01).collect();
        let mut x = b.clone();
        let mut ws = CgWorkspace::new(grid.total_cells);
        let stats = solve_cg(
            &grid,
            ImplicitStencil::diffusion(0.0),
            &mask,
            &b,
            &mut x,
            &mut ws,
            100,
        );
        assert_eq!(stats.iterations, 0);
        assert_eq!(x, b);
    }

    #[test]
    fn test_obstacle_cells_untouched() {
        let grid = Grid3D::new(8, 8, 8).unwrap();
        let mut mask = vec![EMPTY; grid.total_cells];
        let wall = grid.index(4, 4, 4);
        mask[wall] = OBSTACLE;
        let b = vec![0.5; grid.total_cells];
        let mut x = vec![0.0; grid.total_cells];
        x[wall] = 7.0;
        let mut ws = CgWorkspace::new(grid.total_cells);
        solve_cg(
            &grid,
            ImplicitStencil::diffusion(0.3),
            &mask,
            &b,
            &mut x,
            &mut ws,
            100,
        );
        assert_eq!(x[wall], 7.0);
        // fluid neighbors are still solved for
        assert!(x[grid.index(3, 4, 4)] != 0.0);
        assert!(x[grid.index(4, 4, 5)] != 0.0);
    }

    #[test]
    fn test_iteration_cap_reported() {
        let grid = Grid3D::new(16, 16, 16).unwrap();
        let mask = vec![EMPTY; grid.total_cells];
        let b: Vec<f32> = (0..grid.total_cells)
            .map(|i| if i % 2 == 0 { 1.0 } else { -1.0 })
            .collect();
        let mut x = vec![0.0; grid.total_cells];
        let mut ws = CgWorkspace::new(grid.total_cells);
        let stats = solve_cg(&grid, ImplicitStencil::POISSON, &mask, &b, &mut x, &mut ws, 2);
        assert_eq!(stats.iterations, 2);
        assert!(!stats.converged);
    }
}
