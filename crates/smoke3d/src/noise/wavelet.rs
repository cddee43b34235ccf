//! Wavelet noise generation and the down/upsampling filters behind it.
//!
//! The same 32-tap analysis and 4-tap synthesis filters are used with
//! periodic edges for the noise tile and with clamped edges for the energy
//! band split in the turbulence engine.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::constants::NOISE_TILE_SIZE;

/// Analysis (downsampling) filter, centered between taps 15 and 16.
pub const DOWN_COEFFS: [f32; 32] = [
    0.000334, -0.001528, 0.000410, 0.003545, -0.000938, -0.008233, 0.002172, 0.019120, -0.005040,
    -0.044412, 0.011655, 0.103311, -0.025936, -0.243780, 0.033979, 0.655340, 0.655340, 0.033979,
    -0.243780, -0.025936, 0.103311, 0.011655, -0.044412, -0.005040, 0.019120, 0.002172, -0.008233,
    -0.000938, 0.003546, 0.000410, -0.001528, 0.000334,
];

/// Synthesis (upsampling) filter, quadratic B-spline refinement.
pub const UP_COEFFS: [f32; 4] = [0.25, 0.75, 0.75, 0.25];

/// How reads past the end of a line are resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Edge {
    /// Wrap around (tileable noise).
    Periodic,
    /// Repeat the end sample.
    Clamp,
}

/// One axis-aligned line of samples inside a flat 3D array.
#[derive(Clone, Copy, Debug)]
struct Line {
    start: usize,
    stride: usize,
    len: usize,
}

#[inline]
fn fetch(data: &[f32], line: Line, k: isize, len: usize, edge: Edge) -> f32 {
    let n = len as isize;
    let k = match edge {
        Edge::Periodic => k.rem_euclid(n),
        Edge::Clamp => k.clamp(0, n - 1),
    };
    data[line.start + k as usize * line.stride]
}

fn downsample_line(from: &[f32], to: &mut [f32], line: Line, edge: Edge) {
    let n = line.len;
    for i in 0..n / 2 {
        let center = 2 * i as isize;
        let mut sum = 0.0;
        for (tap, &a) in DOWN_COEFFS.iter().enumerate() {
            let k = center - 16 + tap as isize;
            sum += a * fetch(from, line, k, n, edge);
        }
        to[line.start + i * line.stride] = sum;
    }
}

fn upsample_line(from: &[f32], to: &mut [f32], line: Line, edge: Edge) {
    let n = line.len;
    let half = (n / 2).max(1);
    for i in 0..n {
        let i = i as isize;
        let mut sum = 0.0;
        for k in i / 2..=i / 2 + 1 {
            let p = UP_COEFFS[(i - 2 * k + 2) as usize];
            sum += p * fetch(from, line, k, half, edge);
        }
        to[line.start + i as usize * line.stride] = sum;
    }
}

/// Every line of a `dims` volume running along `axis`.
fn lines(dims: [usize; 3], axis: usize) -> impl Iterator<Item = Line> {
    let [nx, ny, nz] = dims;
    let slab = nx * ny;
    let (outer, inner, outer_step, inner_step, stride) = match axis {
        0 => (nz, ny, slab, nx, 1),
        1 => (nz, nx, slab, 1, nx),
        _ => (ny, nx, nx, 1, slab),
    };
    let len = dims[axis.min(2)];
    (0..outer).flat_map(move |o| {
        (0..inner).map(move |i| Line {
            start: o * outer_step + i * inner_step,
            stride,
            len,
        })
    })
}

/// Downsample every line along `axis` into the first half of each line of `to`.
pub fn downsample_axis(dims: [usize; 3], axis: usize, from: &[f32], to: &mut [f32], edge: Edge) {
    for line in lines(dims, axis) {
        downsample_line(from, to, line, edge);
    }
}

/// Upsample the first half of every line along `axis` into the full line.
pub fn upsample_axis(dims: [usize; 3], axis: usize, from: &[f32], to: &mut [f32], edge: Edge) {
    for line in lines(dims, axis) {
        upsample_line(from, to, line, edge);
    }
}

/// Low-pass reconstruction with clamped edges: downsample X, Y, Z then
/// upsample Z, Y, X. The result lands in `out`.
pub fn lowpass_clamped(dims: [usize; 3], input: &[f32], out: &mut [f32], scratch: &mut [f32]) {
    downsample_axis(dims, 0, input, scratch, Edge::Clamp);
    downsample_axis(dims, 1, scratch, out, Edge::Clamp);
    downsample_axis(dims, 2, out, scratch, Edge::Clamp);
    upsample_axis(dims, 2, scratch, out, Edge::Clamp);
    upsample_axis(dims, 1, out, scratch, Edge::Clamp);
    upsample_axis(dims, 0, scratch, out, Edge::Clamp);
}

/// Unit normal samples (Box-Muller over a seeded ChaCha stream).
pub fn gaussian_field(len: usize, seed: u64) -> Vec<f32> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut out = Vec::with_capacity(len);
    while out.len() < len {
        let u1: f64 = 1.0 - rng.gen::<f64>();
        let u2: f64 = rng.gen();
        let r = (-2.0 * u1.ln()).sqrt();
        let theta = std::f64::consts::TAU * u2;
        out.push((r * theta.cos()) as f32);
        if out.len() < len {
            out.push((r * theta.sin()) as f32);
        }
    }
    out
}

/// Build the band-limited wavelet noise tile.
pub fn generate_wavelet_tile(seed: u64) -> Vec<f32> {
    let n = NOISE_TILE_SIZE;
    let dims = [n; 3];
    let total = n * n * n;

    let mut noise = gaussian_field(total, seed);
    let mut half = vec![0.0; total];
    let mut low = vec![0.0; total];

    // each axis in turn: down then up, feeding the previous reconstruction
    downsample_axis(dims, 0, &noise, &mut half, Edge::Periodic);
    upsample_axis(dims, 0, &half, &mut low, Edge::Periodic);
    for axis in 1..3 {
        downsample_axis(dims, axis, &low, &mut half, Edge::Periodic);
        upsample_axis(dims, axis, &half, &mut low, Edge::Periodic);
    }

    for (v, &l) in noise.iter_mut().zip(&low) {
        *v -= l;
    }

    // add an odd-offset copy to even out the variance of even/odd cells
    let mut offset = n / 2;
    if offset % 2 == 0 {
        offset += 1;
    }
    let mask = n - 1;
    let shifted = &mut half;
    for z in 0..n {
        for y in 0..n {
            for x in 0..n {
                let src = ((x + offset) & mask)
                    + ((y + offset) & mask) * n
                    + ((z + offset) & mask) * n * n;
                shifted[x + y * n + z * n * n] = noise[src];
            }
        }
    }
    for (v, &s) in noise.iter_mut().zip(shifted.iter()) {
        *v += s;
    }
    noise
}
