//! Pressure projection tests
//!
//! Runs the full projection (obstacle cleanup, velocity BC, divergence, CG,
//! gradient subtraction) on prescribed velocity fields.

use smoke3d::constants::{EMPTY, OBSTACLE};
use smoke3d::pressure::{compute_divergence, project};
use smoke3d::solver::CgWorkspace;
use smoke3d::{DomainBorders, Grid3D, VectorField};

fn divergence_norm(grid: &Grid3D, obstacles: &[u8], vel: &VectorField) -> f32 {
    let mut div = vec![0.0; grid.total_cells];
    compute_divergence(grid, obstacles, vel, &mut div);
    div.iter().map(|d| d * d).sum::<f32>().sqrt()
}

fn run_projection(
    grid: &Grid3D,
    borders: &DomainBorders,
    obstacles: &mut [u8],
    vel: &mut VectorField,
) -> smoke3d::SolverStats {
    let n = grid.total_cells;
    let mut pressure = vec![0.0; n];
    let mut divergence = vec![0.0; n];
    let mut ws = CgWorkspace::new(n);
    project(grid, borders, obstacles, vel, &mut pressure, &mut divergence, &mut ws, 100)
}

/// Gradient of a Gaussian potential: a pure source that projection removes
fn source_field(grid: &Grid3D) -> VectorField {
    let mut vel = VectorField::zeros(grid.total_cells);
    let c = grid.res_vec() * 0.5;
    let sigma2 = 4.0f32 * 4.0;
    for idx in 0..grid.total_cells {
        let (x, y, z) = grid.coords(idx);
        let dx = x as f32 - c.x;
        let dy = y as f32 - c.y;
        let dz = z as f32 - c.z;
        let g = (-(dx * dx + dy * dy + dz * dz) / sigma2).exp();
        vel.x[idx] = dx * g;
        vel.y[idx] = dy * g;
        vel.z[idx] = dz * g;
    }
    vel
}

/// Divergence left over after projecting the Gaussian source, relative to
/// what it started with.
fn residual_ratio(res: usize) -> (f32, smoke3d::SolverStats) {
    let grid = Grid3D::new(res, res, res).unwrap();
    let mut obstacles = vec![EMPTY; grid.total_cells];
    let mut vel = source_field(&grid);

    let before = divergence_norm(&grid, &obstacles, &vel);
    let stats = run_projection(&grid, &DomainBorders::OPEN, &mut obstacles, &mut vel);
    let after = divergence_norm(&grid, &obstacles, &vel);
    (after / before, stats)
}

/// Projection removes most of the divergence of a smooth source
#[test]
fn test_projection_reduces_divergence() {
    let (ratio, stats) = residual_ratio(24);

    assert!(stats.iterations > 0);
    assert!(stats.iterations <= 100);
    assert!(stats.converged, "stats {:?}", stats);
    assert!(ratio < 0.1, "divergence ratio {}", ratio);
}

/// The leftover divergence shrinks as the grid is refined
#[test]
fn test_divergence_ratio_drops_with_resolution() {
    let (coarse, _) = residual_ratio(24);
    let (fine, _) = residual_ratio(32);

    assert!(fine < coarse, "ratio {} at 32 vs {} at 24", fine, coarse);
    assert!(fine < 0.06, "divergence ratio {}", fine);
}

/// A sheared stream with each component constant along its own axis has
/// zero central-difference divergence and comes through unchanged
#[test]
fn test_divergence_free_shear_passes_through() {
    let grid = Grid3D::new(12, 12, 12).unwrap();
    let mut obstacles = vec![EMPTY; grid.total_cells];
    let mut vel = VectorField::zeros(grid.total_cells);
    for idx in 0..grid.total_cells {
        let (x, y, z) = grid.coords(idx);
        let (x, y, z) = (x as f32, y as f32, z as f32);
        vel.x[idx] = 1.0 + 0.5 * (0.7 * y + 0.3 * z).sin();
        vel.y[idx] = 0.5 + 0.3 * (0.4 * x - 0.5 * z).cos();
        vel.z[idx] = 0.8 + 0.4 * (0.6 * x + 0.9 * y).sin();
    }
    let original = vel.clone();
    assert_eq!(divergence_norm(&grid, &obstacles, &vel), 0.0);

    let stats = run_projection(&grid, &DomainBorders::OPEN, &mut obstacles, &mut vel);

    assert_eq!(stats.iterations, 0);
    assert!(stats.converged);
    assert_eq!(vel.x, original.x);
    assert_eq!(vel.y, original.y);
    assert_eq!(vel.z, original.z);
}

/// A uniform stream through an open domain is already divergence free
#[test]
fn test_uniform_flow_passes_through() {
    let grid = Grid3D::new(10, 10, 10).unwrap();
    let mut obstacles = vec![EMPTY; grid.total_cells];
    let mut vel = VectorField::zeros(grid.total_cells);
    vel.x.iter_mut().for_each(|v| *v = 1.0);

    let stats = run_projection(&grid, &DomainBorders::OPEN, &mut obstacles, &mut vel);

    assert_eq!(stats.iterations, 0);
    assert!(stats.converged);
    for z in 1..9 {
        for y in 1..9 {
            for x in 1..9 {
                assert_eq!(vel.x[grid.index(x, y, z)], 1.0);
            }
        }
    }
}

/// Velocity inside a solid block is zero after projection
#[test]
fn test_obstacle_velocity_zeroed() {
    let grid = Grid3D::new(12, 12, 12).unwrap();
    let mut obstacles = vec![EMPTY; grid.total_cells];
    for z in 4..8 {
        for y in 4..8 {
            for x in 4..8 {
                obstacles[grid.index(x, y, z)] = OBSTACLE;
            }
        }
    }
    let mut vel = VectorField::zeros(grid.total_cells);
    vel.z.iter_mut().for_each(|v| *v = 0.5);

    run_projection(&grid, &DomainBorders::CLOSED, &mut obstacles, &mut vel);

    for z in 4..8 {
        for y in 4..8 {
            for x in 4..8 {
                let idx = grid.index(x, y, z);
                assert_eq!(obstacles[idx], OBSTACLE);
                assert_eq!(vel.get(idx), smoke3d::Vec3::ZERO);
            }
        }
    }
    assert!(vel.z.iter().all(|v| v.is_finite()));
}

/// Closed walls zero the normal velocity on every face
#[test]
fn test_closed_walls_zero_normal_velocity() {
    let grid = Grid3D::new(8, 8, 8).unwrap();
    let mut obstacles = vec![EMPTY; grid.total_cells];
    let mut vel = source_field(&grid);

    run_projection(&grid, &DomainBorders::CLOSED, &mut obstacles, &mut vel);

    for a in 0..8 {
        for b in 0..8 {
            assert_eq!(vel.x[grid.index(0, a, b)], 0.0);
            assert_eq!(vel.x[grid.index(7, a, b)], 0.0);
            assert_eq!(vel.y[grid.index(a, 0, b)], 0.0);
            assert_eq!(vel.y[grid.index(a, 7, b)], 0.0);
            assert_eq!(vel.z[grid.index(a, b, 0)], 0.0);
            assert_eq!(vel.z[grid.index(a, b, 7)], 0.0);
        }
    }
}
