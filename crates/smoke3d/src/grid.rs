//! Collocated 3D grid: resolution, flat indexing, double buffers and
//! trilinear sampling.
//!
//! Every field (density, heat, each velocity component, obstacle flags) is a
//! flat array indexed `x + y * x_res + z * slab_size`. Velocity components live
//! at cell centers together with the scalars.

use glam::Vec3;

use crate::constants::MIN_RESOLUTION;
use crate::error::{Result, SmokeError};

/// Resolution and spacing of a collocated grid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Grid3D {
    /// Number of cells in X direction
    pub x_res: usize,
    /// Number of cells in Y direction
    pub y_res: usize,
    /// Number of cells in Z direction
    pub z_res: usize,
    /// Cells per XY slab
    pub slab_size: usize,
    /// Total number of cells
    pub total_cells: usize,
    /// Cell size, `1 / max(res)` so the longest axis spans one unit
    pub dx: f32,
}

impl Grid3D {
    /// Create a grid, rejecting axes too small for a 3-cell stencil.
    pub fn new(x_res: usize, y_res: usize, z_res: usize) -> Result<Self> {
        if x_res < MIN_RESOLUTION || y_res < MIN_RESOLUTION || z_res < MIN_RESOLUTION {
            return Err(SmokeError::ResolutionTooSmall {
                x: x_res,
                y: y_res,
                z: z_res,
                min: MIN_RESOLUTION,
            });
        }
        let max_res = x_res.max(y_res).max(z_res);
        Ok(Self {
            x_res,
            y_res,
            z_res,
            slab_size: x_res * y_res,
            total_cells: x_res * y_res * z_res,
            dx: 1.0 / max_res as f32,
        })
    }

    /// Grid refined by `amplify` along every axis.
    pub fn amplified(&self, amplify: usize) -> Result<Self> {
        if amplify == 0 {
            return Err(SmokeError::InvalidAmplification(amplify));
        }
        Self::new(self.x_res * amplify, self.y_res * amplify, self.z_res * amplify)
    }

    /// Resolution as an array.
    pub fn res(&self) -> [usize; 3] {
        [self.x_res, self.y_res, self.z_res]
    }

    /// Resolution as a float vector.
    pub fn res_vec(&self) -> Vec3 {
        Vec3::new(self.x_res as f32, self.y_res as f32, self.z_res as f32)
    }

    // ========== Index functions ==========

    /// Flat index of cell (x, y, z).
    #[inline]
    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        x + y * self.x_res + z * self.slab_size
    }

    /// Flat index of (x, y, z), or `None` when any coordinate is past the
    /// end of its axis.
    #[inline]
    pub fn checked_index(&self, x: usize, y: usize, z: usize) -> Option<usize> {
        (x < self.x_res && y < self.y_res && z < self.z_res).then(|| self.index(x, y, z))
    }

    /// Inverse of [`Grid3D::index`].
    #[inline]
    pub fn coords(&self, index: usize) -> (usize, usize, usize) {
        let z = index / self.slab_size;
        let rem = index - z * self.slab_size;
        (rem % self.x_res, rem / self.x_res, z)
    }

    /// True when the cell is not on the outer one-cell shell.
    #[inline]
    pub fn is_interior(&self, x: usize, y: usize, z: usize) -> bool {
        x > 0 && y > 0 && z > 0 && x < self.x_res - 1 && y < self.y_res - 1 && z < self.z_res - 1
    }

    /// Calls `f(x, y, z, index)` for every interior cell, z outermost.
    #[inline]
    pub fn for_each_interior(&self, mut f: impl FnMut(usize, usize, usize, usize)) {
        for z in 1..self.z_res - 1 {
            for y in 1..self.y_res - 1 {
                for x in 1..self.x_res - 1 {
                    f(x, y, z, self.index(x, y, z));
                }
            }
        }
    }

    // ========== Trilinear sampling ==========

    /// Trilinear interpolation of `field` at a position in cell units.
    ///
    /// The position is clamped to the grid, so the result never reads outside
    /// the array.
    pub fn lerp(&self, field: &[f32], pos: Vec3) -> f32 {
        let px = pos.x.clamp(0.0, (self.x_res - 1) as f32);
        let py = pos.y.clamp(0.0, (self.y_res - 1) as f32);
        let pz = pos.z.clamp(0.0, (self.z_res - 1) as f32);

        let x0 = px as usize;
        let y0 = py as usize;
        let z0 = pz as usize;
        let x1 = (x0 + 1).min(self.x_res - 1);
        let y1 = (y0 + 1).min(self.y_res - 1);
        let z1 = (z0 + 1).min(self.z_res - 1);

        let s1 = px - x0 as f32;
        let s0 = 1.0 - s1;
        let t1 = py - y0 as f32;
        let t0 = 1.0 - t1;
        let u1 = pz - z0 as f32;
        let u0 = 1.0 - u1;

        let at = |x: usize, y: usize, z: usize| field[self.index(x, y, z)];

        u0 * (s0 * (t0 * at(x0, y0, z0) + t1 * at(x0, y1, z0))
            + s1 * (t0 * at(x1, y0, z0) + t1 * at(x1, y1, z0)))
            + u1 * (s0 * (t0 * at(x0, y0, z1) + t1 * at(x0, y1, z1))
                + s1 * (t0 * at(x1, y0, z1) + t1 * at(x1, y1, z1)))
    }

    /// Trilinear interpolation of a byte mask, as a fraction in `[0, 1]`
    /// where any nonzero byte counts as 1.
    pub fn lerp_mask(&self, mask: &[u8], pos: Vec3) -> f32 {
        let px = pos.x.clamp(0.0, (self.x_res - 1) as f32);
        let py = pos.y.clamp(0.0, (self.y_res - 1) as f32);
        let pz = pos.z.clamp(0.0, (self.z_res - 1) as f32);

        let x0 = px as usize;
        let y0 = py as usize;
        let z0 = pz as usize;
        let x1 = (x0 + 1).min(self.x_res - 1);
        let y1 = (y0 + 1).min(self.y_res - 1);
        let z1 = (z0 + 1).min(self.z_res - 1);

        let s1 = px - x0 as f32;
        let t1 = py - y0 as f32;
        let u1 = pz - z0 as f32;

        let mut sum = 0.0;
        for (z, wz) in [(z0, 1.0 - u1), (z1, u1)] {
            for (y, wy) in [(y0, 1.0 - t1), (y1, t1)] {
                for (x, wx) in [(x0, 1.0 - s1), (x1, s1)] {
                    if mask[self.index(x, y, z)] != 0 {
                        sum += wx * wy * wz;
                    }
                }
            }
        }
        sum
    }
}

/// Two owned buffers with a toggled role: one is current, the other old.
#[derive(Clone, Debug)]
pub struct DoubleBuffer<T> {
    buffers: [T; 2],
    current: usize,
}

impl<T: Clone> DoubleBuffer<T> {
    /// Both buffers start as copies of `value`.
    pub fn new(value: T) -> Self {
        Self {
            buffers: [value.clone(), value],
            current: 0,
        }
    }
}

impl<T> DoubleBuffer<T> {
    /// Exchange the roles of current and old.
    #[inline]
    pub fn swap(&mut self) {
        self.current ^= 1;
    }

    pub fn current(&self) -> &T {
        &self.buffers[self.current]
    }

    pub fn current_mut(&mut self) -> &mut T {
        &mut self.buffers[self.current]
    }

    pub fn old(&self) -> &T {
        &self.buffers[self.current ^ 1]
    }

    pub fn old_mut(&mut self) -> &mut T {
        &mut self.buffers[self.current ^ 1]
    }

    /// Mutable access to both buffers at once, `(current, old)`.
    pub fn split_mut(&mut self) -> (&mut T, &mut T) {
        let (first, second) = self.buffers.split_at_mut(1);
        if self.current == 0 {
            (&mut first[0], &mut second[0])
        } else {
            (&mut second[0], &mut first[0])
        }
    }
}

/// Three collocated velocity components.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VectorField {
    pub x: Vec<f32>,
    pub y: Vec<f32>,
    pub z: Vec<f32>,
}

impl VectorField {
    pub fn zeros(len: usize) -> Self {
        Self {
            x: vec![0.0; len],
            y: vec![0.0; len],
            z: vec![0.0; len],
        }
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn fill(&mut self, value: f32) {
        self.x.fill(value);
        self.y.fill(value);
        self.z.fill(value);
    }

    /// Borrowed read-only view of all three components.
    pub fn view(&self) -> VelocityView<'_> {
        VelocityView {
            x: &self.x,
            y: &self.y,
            z: &self.z,
        }
    }

    #[inline]
    pub fn get(&self, index: usize) -> Vec3 {
        Vec3::new(self.x[index], self.y[index], self.z[index])
    }
}

/// Read-only velocity components, borrowed from whoever owns them.
#[derive(Clone, Copy, Debug)]
pub struct VelocityView<'a> {
    pub x: &'a [f32],
    pub y: &'a [f32],
    pub z: &'a [f32],
}

impl VelocityView<'_> {
    #[inline]
    pub fn get(&self, index: usize) -> Vec3 {
        Vec3::new(self.x[index], self.y[index], self.z[index])
    }

    /// Trilinear velocity at a position in cell units of `grid`.
    pub fn lerp(&self, grid: &Grid3D, pos: Vec3) -> Vec3 {
        Vec3::new(
            grid.lerp(self.x, pos),
            grid.lerp(self.y, pos),
            grid.lerp(self.z, pos),
        )
    }
}
