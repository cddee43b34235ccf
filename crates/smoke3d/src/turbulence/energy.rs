//! Kinetic energy of the coarse flow and its unresolved high band.

use crate::boundary::copy_border_all;
use crate::constants::{EMPTY, ENERGY_MARCH_PASSES, MARCHED, RETIRED};
use crate::grid::{Grid3D, VelocityView};
use crate::noise::wavelet::lowpass_clamped;

/// Counts as a source during marching: fluid, or filled in an earlier pass.
#[inline]
fn is_source(flag: u8) -> bool {
    flag == EMPTY || flag == RETIRED
}

/// `0.5 |v|^2` per cell, pushed into obstacle interiors by neighbor
/// averaging so the wavelet filters see no jump at solid walls.
///
/// `flags` is scratch for a copy of the obstacle mask.
pub fn compute_energy(
    grid: &Grid3D,
    velocity: VelocityView<'_>,
    obstacles: &[u8],
    energy: &mut [f32],
    flags: &mut [u8],
) {
    for (idx, e) in energy.iter_mut().enumerate() {
        *e = 0.5 * velocity.get(idx).length_squared();
    }
    copy_border_all(grid, energy);

    flags.copy_from_slice(obstacles);
    let (xr, slab) = (grid.x_res, grid.slab_size);

    for _ in 0..ENERGY_MARCH_PASSES {
        grid.for_each_interior(|_, _, _, idx| {
            if is_source(flags[idx]) {
                return;
            }
            let mut sum = 0.0;
            let mut valid = 0;
            for n in [idx + 1, idx - 1, idx + xr, idx - xr, idx + slab, idx - slab] {
                if is_source(flags[n]) {
                    sum += energy[n];
                    valid += 1;
                }
            }
            if valid > 0 {
                energy[idx] = sum / valid as f32;
                flags[idx] = MARCHED;
            }
        });
        for flag in flags.iter_mut() {
            if *flag == MARCHED {
                *flag = RETIRED;
            }
        }
    }
}

/// Energy minus its wavelet low-pass reconstruction, zero on the outer shell
/// and inside obstacles.
pub fn decompose_energy(
    grid: &Grid3D,
    energy: &[f32],
    obstacles: &[u8],
    high_freq: &mut [f32],
    scratch: &mut [f32],
) {
    lowpass_clamped(grid.res(), energy, high_freq, scratch);
    for z in 0..grid.z_res {
        for y in 0..grid.y_res {
            for x in 0..grid.x_res {
                let idx = grid.index(x, y, z);
                high_freq[idx] = if grid.is_interior(x, y, z) && obstacles[idx] == EMPTY {
                    energy[idx] - high_freq[idx]
                } else {
                    0.0
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::OBSTACLE;
    use crate::grid::VectorField;

    #[test]
    fn test_energy_of_uniform_flow() {
        let grid = Grid3D::new(6, 6, 6).unwrap();
        let mut vel = VectorField::zeros(grid.total_cells);
        vel.x.iter_mut().for_each(|v| *v = 2.0);
        vel.z.iter_mut().for_each(|v| *v = 1.0);
        let obstacles = vec![EMPTY; grid.total_cells];
        let mut energy = vec![0.0; grid.total_cells];
        let mut flags = vec![0; grid.total_cells];
        compute_energy(&grid, vel.view(), &obstacles, &mut energy, &mut flags);
        for e in energy {
            assert!((e - 2.5).abs() < 1e-6);
        }
    }

    #[test]
    fn test_energy_marches_into_obstacle() {
        let grid = Grid3D::new(9, 9, 9).unwrap();
        let mut vel = VectorField::zeros(grid.total_cells);
        vel.x.iter_mut().for_each(|v| *v = 1.0);
        let mut obstacles = vec![EMPTY; grid.total_cells];
        for z in 3..6 {
            for y in 3..6 {
                for x in 3..6 {
                    let idx = grid.index(x, y, z);
                    obstacles[idx] = OBSTACLE;
                    vel.x[idx] = 0.0;
                }
            }
        }
        let mut energy = vec![0.0; grid.total_cells];
        let mut flags = vec![0; grid.total_cells];
        compute_energy(&grid, vel.view(), &obstacles, &mut energy, &mut flags);

        // the 3x3x3 block is filled within two passes
        let center = grid.index(4, 4, 4);
        assert!((energy[center] - 0.5).abs() < 1e-6, "center {}", energy[center]);
        assert!((energy[grid.index(3, 4, 4)] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_high_band_of_constant_is_zero() {
        let grid = Grid3D::new(8, 8, 8).unwrap();
        let energy = vec![1.25; grid.total_cells];
        let obstacles = vec![EMPTY; grid.total_cells];
        let mut high = vec![0.0; grid.total_cells];
        let mut scratch = vec![0.0; grid.total_cells];
        decompose_energy(&grid, &energy, &obstacles, &mut high, &mut scratch);
        for v in high {
            assert!(v.abs() < 1e-3, "got {}", v);
        }
    }

    #[test]
    fn test_high_band_zero_on_shell_and_obstacles() {
        let grid = Grid3D::new(8, 8, 8).unwrap();
        let energy: Vec<f32> = (0..grid.total_cells).map(|i| (i % 3) as f32).collect();
        let mut obstacles = vec![EMPTY; grid.total_cells];
        let solid = grid.index(4, 4, 4);
        obstacles[solid] = OBSTACLE;
        let mut high = vec![0.0; grid.total_cells];
        let mut scratch = vec![0.0; grid.total_cells];
        decompose_energy(&grid, &energy, &obstacles, &mut high, &mut scratch);
        assert_eq!(high[solid], 0.0);
        assert_eq!(high[grid.index(0, 3, 3)], 0.0);
        assert_eq!(high[grid.index(3, 3, 7)], 0.0);
        assert!(high[grid.index(3, 3, 3)] != 0.0);
    }
}
