//! Implicit heat diffusion.

use crate::constants::EMPTY;
use crate::grid::Grid3D;
use crate::solver::{solve_cg, CgWorkspace, ImplicitStencil, SolverStats};

/// Backward-Euler diffusion of `old` into `out`:
/// `(I - c * L) out = old` with `c = dt * diffusivity / dx^2`.
///
/// `out` starts as a copy of `old`. Heat inside obstacles is zeroed after
/// the solve.
#[allow(clippy::too_many_arguments)]
pub fn diffuse_heat(
    grid: &Grid3D,
    dt: f32,
    diffusivity: f32,
    obstacles: &[u8],
    old: &[f32],
    out: &mut [f32],
    ws: &mut CgWorkspace,
    max_iterations: usize,
) -> SolverStats {
    let c = dt * diffusivity / (grid.dx * grid.dx);
    out.copy_from_slice(old);

    let stats = solve_cg(
        grid,
        ImplicitStencil::diffusion(c),
        obstacles,
        old,
        out,
        ws,
        max_iterations,
    );

    for (h, &flag) in out.iter_mut().zip(obstacles) {
        if flag != EMPTY {
            *h = 0.0;
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hot_spot_spreads_and_conserves_peak_order() {
        let grid = Grid3D::new(10, 10, 10).unwrap();
        let mask = vec![0u8; grid.total_cells];
        let mut old = vec![0.0; grid.total_cells];
        let center = grid.index(5, 5, 5);
        old[center] = 1.0;
        let mut out = vec![0.0; grid.total_cells];
        let mut ws = CgWorkspace::new(grid.total_cells);

        let stats = diffuse_heat(&grid, 0.1, 1e-3, &mask, &old, &mut out, &mut ws, 100);
        assert!(stats.converged);
        assert!(out[center] < 1.0 && out[center] > 0.5, "center {}", out[center]);
        assert!(out[center + 1] > 0.0);
        assert!(out[center + 1] < out[center]);
    }

    #[test]
    fn test_uniform_heat_unchanged_in_interior() {
        let grid = Grid3D::new(8, 8, 8).unwrap();
        let mut mask = vec![0u8; grid.total_cells];
        let solid = grid.index(2, 2, 2);
        mask[solid] = 1;
        let old = vec![3.0; grid.total_cells];
        let mut out = vec![0.0; grid.total_cells];
        let mut ws = CgWorkspace::new(grid.total_cells);

        diffuse_heat(&grid, 0.1, 1e-3, &mask, &old, &mut out, &mut ws, 100);
        assert_eq!(out[solid], 0.0);
        let far = grid.index(5, 5, 5);
        assert!((out[far] - 3.0).abs() < 1e-4, "got {}", out[far]);
    }
}
