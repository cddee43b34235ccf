//! Pressure projection for the collocated grid.
//!
//! Divergence and gradient use central differences. The Poisson system is
//! solved with the shared preconditioned CG in [`crate::solver`].

use crate::boundary::{apply_velocity_bc, copy_border_all};
use crate::config::DomainBorders;
use crate::constants::EMPTY;
use crate::grid::{Grid3D, VectorField};
use crate::solver::{solve_cg, CgWorkspace, ImplicitStencil, SolverStats};

/// Clean up the obstacle mask before a solve.
///
/// Interior obstacle cells with fewer than 3 solid face neighbors are
/// turned back into fluid. Velocity and pressure are then zeroed inside every
/// remaining obstacle cell.
pub fn set_obstacle_boundaries(
    grid: &Grid3D,
    obstacles: &mut [u8],
    vel: &mut VectorField,
    pressure: &mut [f32],
) {
    let (xr, slab) = (grid.x_res, grid.slab_size);
    grid.for_each_interior(|_, _, _, idx| {
        if obstacles[idx] == EMPTY {
            return;
        }
        let solid = [idx - 1, idx + 1, idx - xr, idx + xr, idx - slab, idx + slab]
            .iter()
            .filter(|&&n| obstacles[n] != EMPTY)
            .count();
        if solid < 3 {
            obstacles[idx] = EMPTY;
        }
    });

    for (idx, &flag) in obstacles.iter().enumerate() {
        if flag != EMPTY {
            vel.x[idx] = 0.0;
            vel.y[idx] = 0.0;
            vel.z[idx] = 0.0;
            pressure[idx] = 0.0;
        }
    }
}

/// Right-hand side of the Poisson equation, `-dx^2 * div(v)` on interior
/// fluid cells. A neighbor inside an obstacle contributes the negated center
/// velocity instead of its own.
pub fn compute_divergence(
    grid: &Grid3D,
    obstacles: &[u8],
    vel: &VectorField,
    divergence: &mut [f32],
) {
    divergence.fill(0.0);
    let (xr, slab) = (grid.x_res, grid.slab_size);
    let scale = -grid.dx * 0.5;

    grid.for_each_interior(|_, _, _, idx| {
        if obstacles[idx] != EMPTY {
            return;
        }
        let pick = |component: &[f32], n: usize| {
            if obstacles[n] != EMPTY {
                -component[idx]
            } else {
                component[n]
            }
        };
        let x_right = pick(&vel.x, idx + 1);
        let x_left = pick(&vel.x, idx - 1);
        let y_up = pick(&vel.y, idx + xr);
        let y_down = pick(&vel.y, idx - xr);
        let z_top = pick(&vel.z, idx + slab);
        let z_bottom = pick(&vel.z, idx - slab);

        divergence[idx] = scale * (x_right - x_left + y_up - y_down + z_top - z_bottom);
    });
}

/// Give obstacle cells on a fluid interface the average pressure of the
/// fluid across each solid/fluid face pair.
///
/// The Z pair reads its neighbor at `idx -/+ x_res`, not `idx -/+ slab_size`.
/// This mirrors the long-standing behaviour of this solver and is kept as is.
pub fn set_obstacle_pressure(grid: &Grid3D, obstacles: &[u8], pressure: &mut [f32]) {
    let (xr, slab) = (grid.x_res, grid.slab_size);
    grid.for_each_interior(|_, _, _, idx| {
        if obstacles[idx] == EMPTY {
            return;
        }
        let left = obstacles[idx - 1] != EMPTY;
        let right = obstacles[idx + 1] != EMPTY;
        let down = obstacles[idx - xr] != EMPTY;
        let up = obstacles[idx + xr] != EMPTY;
        let bottom = obstacles[idx - slab] != EMPTY;
        let top = obstacles[idx + slab] != EMPTY;

        if left && right && down && up && bottom && top {
            return;
        }

        let mut sum = 0.0;
        let mut count = 0;
        if left && !right {
            sum += pressure[idx + 1];
            count += 1;
        }
        if !left && right {
            sum += pressure[idx - 1];
            count += 1;
        }
        if up && !down {
            sum += pressure[idx - xr];
            count += 1;
        }
        if !up && down {
            sum += pressure[idx + xr];
            count += 1;
        }
        if top && !bottom {
            sum += pressure[idx - xr];
            count += 1;
        }
        if !top && bottom {
            sum += pressure[idx + xr];
            count += 1;
        }
        pressure[idx] = if count > 0 { sum / count as f32 } else { 0.0 };
    });
}

/// Subtract the centered pressure gradient on interior fluid cells.
pub fn subtract_pressure_gradient(
    grid: &Grid3D,
    obstacles: &[u8],
    pressure: &[f32],
    vel: &mut VectorField,
) {
    let (xr, slab) = (grid.x_res, grid.slab_size);
    let half_inv_dx = 0.5 / grid.dx;
    grid.for_each_interior(|_, _, _, idx| {
        if obstacles[idx] != EMPTY {
            return;
        }
        vel.x[idx] -= (pressure[idx + 1] - pressure[idx - 1]) * half_inv_dx;
        vel.y[idx] -= (pressure[idx + xr] - pressure[idx - xr]) * half_inv_dx;
        vel.z[idx] -= (pressure[idx + slab] - pressure[idx - slab]) * half_inv_dx;
    });
}

/// Make `vel` (approximately) divergence free.
///
/// `pressure` and `divergence` are overwritten; the pressure field is
/// rebuilt from zero every call.
#[allow(clippy::too_many_arguments)]
pub fn project(
    grid: &Grid3D,
    borders: &DomainBorders,
    obstacles: &mut [u8],
    vel: &mut VectorField,
    pressure: &mut [f32],
    divergence: &mut [f32],
    ws: &mut CgWorkspace,
    max_iterations: usize,
) -> SolverStats {
    pressure.fill(0.0);
    set_obstacle_boundaries(grid, obstacles, vel, pressure);

    apply_velocity_bc(grid, borders, &mut vel.x, &mut vel.y, &mut vel.z);

    compute_divergence(grid, obstacles, vel, divergence);
    copy_border_all(grid, pressure);

    let stats = solve_cg(
        grid,
        ImplicitStencil::POISSON,
        obstacles,
        divergence,
        pressure,
        ws,
        max_iterations,
    );

    set_obstacle_pressure(grid, obstacles, pressure);
    subtract_pressure_gradient(grid, obstacles, pressure, vel);
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::OBSTACLE;

    #[test]
    fn test_divergence_zero_velocity() {
        let grid = Grid3D::new(6, 6, 6).unwrap();
        let mask = vec![0u8; grid.total_cells];
        let vel = VectorField::zeros(grid.total_cells);
        let mut div = vec![1.0; grid.total_cells];
        compute_divergence(&grid, &mask, &vel, &mut div);
        assert!(div.iter().all(|&d| d == 0.0));
    }

    #[test]
    fn test_divergence_of_linear_field() {
        // v = (x, 0, 0) in cell units: central difference gives 1 per cell
        let grid = Grid3D::new(8, 8, 8).unwrap();
        let mask = vec![0u8; grid.total_cells];
        let mut vel = VectorField::zeros(grid.total_cells);
        for idx in 0..grid.total_cells {
            vel.x[idx] = grid.coords(idx).0 as f32;
        }
        let mut div = vec![0.0; grid.total_cells];
        compute_divergence(&grid, &mask, &vel, &mut div);
        let expected = -grid.dx * 0.5 * 2.0;
        assert!((div[grid.index(3, 3, 3)] - expected).abs() < 1e-6);
    }

    #[test]
    fn test_divergence_obstacle_neighbor_mirrors_center() {
        let grid = Grid3D::new(6, 6, 6).unwrap();
        let mut mask = vec![0u8; grid.total_cells];
        let idx = grid.index(2, 2, 2);
        mask[idx + 1] = OBSTACLE;
        let mut vel = VectorField::zeros(grid.total_cells);
        vel.x[idx] = 1.0;
        vel.x[idx + 1] = 50.0;
        let mut div = vec![0.0; grid.total_cells];
        compute_divergence(&grid, &mask, &vel, &mut div);
        // right neighbor reads -1.0, left reads 0.0
        assert!((div[idx] - (-grid.dx * 0.5 * -1.0)).abs() < 1e-6);
    }

    #[test]
    fn test_degenerate_obstacle_reclassified() {
        let grid = Grid3D::new(7, 7, 7).unwrap();
        let mut mask = vec![0u8; grid.total_cells];
        let lone = grid.index(3, 3, 3);
        mask[lone] = OBSTACLE;
        let mut vel = VectorField::zeros(grid.total_cells);
        vel.fill(1.0);
        let mut pressure = vec![1.0; grid.total_cells];

        set_obstacle_boundaries(&grid, &mut mask, &mut vel, &mut pressure);
        assert_eq!(mask[lone], EMPTY);
        assert_eq!(vel.x[lone], 1.0);
    }

    #[test]
    fn test_solid_block_keeps_obstacles_and_zeroes_state() {
        let grid = Grid3D::new(8, 8, 8).unwrap();
        let mut mask = vec![0u8; grid.total_cells];
        for z in 2..5 {
            for y in 2..5 {
                for x in 2..5 {
                    mask[grid.index(x, y, z)] = OBSTACLE;
                }
            }
        }
        let mut vel = VectorField::zeros(grid.total_cells);
        vel.fill(1.0);
        let mut pressure = vec![1.0; grid.total_cells];
        set_obstacle_boundaries(&grid, &mut mask, &mut vel, &mut pressure);

        // a corner of the block has exactly 3 solid neighbors
        let corner = grid.index(2, 2, 2);
        assert_eq!(mask[corner], OBSTACLE);
        assert_eq!(vel.z[corner], 0.0);
        assert_eq!(pressure[corner], 0.0);
        assert_eq!(vel.z[grid.index(5, 5, 5)], 1.0);
    }

    #[test]
    fn test_obstacle_pressure_x_pair_uses_fluid_side() {
        let grid = Grid3D::new(6, 6, 6).unwrap();
        let mut mask = vec![0u8; grid.total_cells];
        let idx = grid.index(2, 2, 2);
        // solid everywhere around except the right neighbor
        for n in [idx, idx - 1, idx - 6, idx + 6, idx - 36, idx + 36] {
            mask[n] = OBSTACLE;
        }
        let mut pressure: Vec<f32> = (0..grid.total_cells).map(|i| i as f32).collect();
        set_obstacle_pressure(&grid, &mask, &mut pressure);
        assert_eq!(pressure[idx], (idx + 1) as f32);
    }

    #[test]
    fn test_obstacle_pressure_z_pair_reads_y_neighbor() {
        let grid = Grid3D::new(6, 6, 6).unwrap();
        let (xr, slab) = (grid.x_res, grid.slab_size);
        let mut mask = vec![0u8; grid.total_cells];
        let idx = grid.index(2, 2, 2);
        // only the top neighbor is fluid
        for n in [idx, idx - 1, idx + 1, idx - xr, idx + xr, idx - slab] {
            mask[n] = OBSTACLE;
        }
        let mut pressure: Vec<f32> = (0..grid.total_cells).map(|i| i as f32).collect();
        set_obstacle_pressure(&grid, &mask, &mut pressure);
        // !top && bottom reads idx + x_res rather than idx + slab
        assert_eq!(pressure[idx], (idx + xr) as f32);
        assert_ne!(pressure[idx], (idx + slab) as f32);
    }

    #[test]
    fn test_project_zero_field_stays_zero() {
        let grid = Grid3D::new(8, 8, 8).unwrap();
        let mut mask = vec![0u8; grid.total_cells];
        let mut vel = VectorField::zeros(grid.total_cells);
        let mut pressure = vec![0.0; grid.total_cells];
        let mut div = vec![0.0; grid.total_cells];
        let mut ws = CgWorkspace::new(grid.total_cells);
        let stats = project(
            &grid,
            &DomainBorders::OPEN,
            &mut mask,
            &mut vel,
            &mut pressure,
            &mut div,
            &mut ws,
            100,
        );
        assert_eq!(stats.iterations, 0);
        assert!(vel.x.iter().all(|&v| v == 0.0));
    }
}
