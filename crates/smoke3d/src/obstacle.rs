//! Obstacle primitives and mask stamping.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::constants::OBSTACLE;
use crate::grid::Grid3D;

/// Anything that can answer "is this world position solid".
pub trait Obstacle {
    fn inside(&self, p: Vec3) -> bool;
}

impl<F: Fn(Vec3) -> bool> Obstacle for F {
    fn inside(&self, p: Vec3) -> bool {
        self(p)
    }
}

/// Built-in obstacle primitives.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum ObstacleShape {
    Sphere { center: Vec3, radius: f32 },
    Aabb { min: Vec3, max: Vec3 },
}

impl Obstacle for ObstacleShape {
    fn inside(&self, p: Vec3) -> bool {
        match *self {
            ObstacleShape::Sphere { center, radius } => {
                p.distance_squared(center) <= radius * radius
            }
            ObstacleShape::Aabb { min, max } => p.cmpge(min).all() && p.cmple(max).all(),
        }
    }
}

/// World position of cell (x, y, z): `origin + (x, y, z) * dx`.
#[inline]
pub fn cell_position(grid: &Grid3D, origin: Vec3, x: usize, y: usize, z: usize) -> Vec3 {
    origin + Vec3::new(x as f32, y as f32, z as f32) * grid.dx
}

/// Calls `f(index)` for every cell whose position lies inside `shape`.
pub fn for_each_inside(
    grid: &Grid3D,
    origin: Vec3,
    shape: &(impl Obstacle + ?Sized),
    mut f: impl FnMut(usize),
) {
    for z in 0..grid.z_res {
        for y in 0..grid.y_res {
            for x in 0..grid.x_res {
                if shape.inside(cell_position(grid, origin, x, y, z)) {
                    f(grid.index(x, y, z));
                }
            }
        }
    }
}

/// OR `shape` into the mask. Returns the number of cells inside the shape.
pub fn stamp_obstacle(
    grid: &Grid3D,
    origin: Vec3,
    shape: &(impl Obstacle + ?Sized),
    obstacles: &mut [u8],
) -> usize {
    let mut count = 0;
    for_each_inside(grid, origin, shape, |idx| {
        obstacles[idx] |= OBSTACLE;
        count += 1;
    });
    count
}
