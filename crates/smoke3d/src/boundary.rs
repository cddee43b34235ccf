//! Boundary operators for the outer one-cell shell.
//!
//! Face naming: X faces are left/right, Y faces front/back, Z faces
//! bottom/top. All operators touch only the shell, never allocate and are
//! idempotent.

use crate::config::DomainBorders;
use crate::constants::{EMPTY, OBSTACLE};
use crate::grid::Grid3D;

/// Which outer face of an axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Face {
    Min,
    Max,
}

// ========== Face iteration ==========

#[inline]
fn for_each_x_face(grid: &Grid3D, mut f: impl FnMut(usize, usize, Face)) {
    // (face index, inward neighbor index)
    for z in 0..grid.z_res {
        for y in 0..grid.y_res {
            let left = grid.index(0, y, z);
            let right = grid.index(grid.x_res - 1, y, z);
            f(left, left + 1, Face::Min);
            f(right, right - 1, Face::Max);
        }
    }
}

#[inline]
fn for_each_y_face(grid: &Grid3D, mut f: impl FnMut(usize, usize, Face)) {
    for z in 0..grid.z_res {
        for x in 0..grid.x_res {
            let front = grid.index(x, 0, z);
            let back = grid.index(x, grid.y_res - 1, z);
            f(front, front + grid.x_res, Face::Min);
            f(back, back - grid.x_res, Face::Max);
        }
    }
}

#[inline]
fn for_each_z_face(grid: &Grid3D, mut f: impl FnMut(usize, usize, Face)) {
    for y in 0..grid.y_res {
        for x in 0..grid.x_res {
            let bottom = grid.index(x, y, 0);
            let top = grid.index(x, y, grid.z_res - 1);
            f(bottom, bottom + grid.slab_size, Face::Min);
            f(top, top - grid.slab_size, Face::Max);
        }
    }
}

// ========== Zero (wall) rule ==========

/// Zero all six faces.
pub fn set_zero_border(grid: &Grid3D, field: &mut [f32]) {
    set_zero_x(grid, field);
    set_zero_y(grid, field);
    set_zero_z(grid, field);
}

/// Zero the left and right faces.
pub fn set_zero_x(grid: &Grid3D, field: &mut [f32]) {
    for_each_x_face(grid, |face, _, _| field[face] = 0.0);
}

/// Zero the front and back faces.
pub fn set_zero_y(grid: &Grid3D, field: &mut [f32]) {
    for_each_y_face(grid, |face, _, _| field[face] = 0.0);
}

/// Zero the bottom and top faces.
pub fn set_zero_z(grid: &Grid3D, field: &mut [f32]) {
    for_each_z_face(grid, |face, _, _| field[face] = 0.0);
}

// ========== Neumann rule ==========

/// Copy the nearest interior value onto a face; at the max face a negative
/// (inward) value is then clamped to zero.
#[inline]
fn neumann(field: &mut [f32], face: usize, inner: usize, side: Face) {
    field[face] = field[inner];
    if side == Face::Max && field[face] < 0.0 {
        field[face] = 0.0;
    }
}

/// Neumann rule on the left and right faces.
pub fn set_neumann_x(grid: &Grid3D, field: &mut [f32]) {
    for_each_x_face(grid, |face, inner, side| neumann(field, face, inner, side));
}

/// Neumann rule on the front and back faces.
pub fn set_neumann_y(grid: &Grid3D, field: &mut [f32]) {
    for_each_y_face(grid, |face, inner, side| neumann(field, face, inner, side));
}

/// Neumann rule on the bottom and top faces.
pub fn set_neumann_z(grid: &Grid3D, field: &mut [f32]) {
    for_each_z_face(grid, |face, inner, side| neumann(field, face, inner, side));
}

// ========== Copy rule ==========

/// Replicate the interior neighbor onto the left and right faces.
pub fn copy_border_x(grid: &Grid3D, field: &mut [f32]) {
    for_each_x_face(grid, |face, inner, _| field[face] = field[inner]);
}

/// Replicate the interior neighbor onto the front and back faces.
pub fn copy_border_y(grid: &Grid3D, field: &mut [f32]) {
    for_each_y_face(grid, |face, inner, _| field[face] = field[inner]);
}

/// Replicate the interior neighbor onto the bottom and top faces.
pub fn copy_border_z(grid: &Grid3D, field: &mut [f32]) {
    for_each_z_face(grid, |face, inner, _| field[face] = field[inner]);
}

/// Replicate the interior neighbor onto all six faces.
///
/// Edges and corners take the value of the last axis written (Z), which
/// itself was copied from cells already fixed up along X and Y.
pub fn copy_border_all(grid: &Grid3D, field: &mut [f32]) {
    copy_border_x(grid, field);
    copy_border_y(grid, field);
    copy_border_z(grid, field);
}

// ========== Velocity rules per axis ==========

/// Normal-velocity rule used by the projection: Neumann on open axes,
/// zero on walled axes.
pub fn apply_velocity_bc(
    grid: &Grid3D,
    borders: &DomainBorders,
    vx: &mut [f32],
    vy: &mut [f32],
    vz: &mut [f32],
) {
    if borders.x_walls() {
        set_zero_x(grid, vx);
    } else {
        set_neumann_x(grid, vx);
    }
    if borders.y_walls() {
        set_zero_y(grid, vy);
    } else {
        set_neumann_y(grid, vy);
    }
    if borders.z_walls() {
        set_zero_z(grid, vz);
    } else {
        set_neumann_z(grid, vz);
    }
}

/// Normal-velocity rule used after advection: copy on open axes, zero on
/// walled axes.
pub fn copy_velocity_bc(
    grid: &Grid3D,
    borders: &DomainBorders,
    vx: &mut [f32],
    vy: &mut [f32],
    vz: &mut [f32],
) {
    if borders.x_walls() {
        set_zero_x(grid, vx);
    } else {
        copy_border_x(grid, vx);
    }
    if borders.y_walls() {
        set_zero_y(grid, vy);
    } else {
        copy_border_y(grid, vy);
    }
    if borders.z_walls() {
        set_zero_z(grid, vz);
    } else {
        copy_border_z(grid, vz);
    }
}

// ========== Obstacle shell ==========

/// Stamp the outer shell of the obstacle mask from per-face wall flags.
///
/// A shell cell becomes `OBSTACLE` if any walled face contains it and is
/// cleared to `EMPTY` otherwise.
pub fn set_border_obstacles(grid: &Grid3D, borders: &DomainBorders, obstacles: &mut [u8]) {
    let (xm, ym, zm) = (grid.x_res - 1, grid.y_res - 1, grid.z_res - 1);
    for z in 0..grid.z_res {
        for y in 0..grid.y_res {
            for x in 0..grid.x_res {
                if grid.is_interior(x, y, z) {
                    continue;
                }
                let solid = (x == 0 && borders.x_min)
                    || (x == xm && borders.x_max)
                    || (y == 0 && borders.y_min)
                    || (y == ym && borders.y_max)
                    || (z == 0 && borders.z_min)
                    || (z == zm && borders.z_max);
                obstacles[grid.index(x, y, z)] = if solid { OBSTACLE } else { EMPTY };
            }
        }
    }
}
