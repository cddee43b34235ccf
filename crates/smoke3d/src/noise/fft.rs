//! Band-limited noise tile built in the frequency domain.
//!
//! A Gaussian volume is transformed with a 3D radix-2 FFT, multiplied by an
//! annular band filter, transformed back and scaled to unit variance.

use std::f32::consts::PI;

use crate::constants::NOISE_TILE_SIZE;
use crate::noise::wavelet::gaussian_field;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Complex {
    re: f32,
    im: f32,
}

impl Complex {
    fn new(re: f32, im: f32) -> Self {
        Self { re, im }
    }

    fn from_polar(mag: f32, phase: f32) -> Self {
        Self {
            re: mag * phase.cos(),
            im: mag * phase.sin(),
        }
    }
}

impl std::ops::Add for Complex {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.re + rhs.re, self.im + rhs.im)
    }
}

impl std::ops::Sub for Complex {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.re - rhs.re, self.im - rhs.im)
    }
}

impl std::ops::Mul for Complex {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.re * rhs.re - self.im * rhs.im,
            self.re * rhs.im + self.im * rhs.re,
        )
    }
}

/// In-place Cooley-Tukey FFT, unnormalized in both directions.
fn fft_in_place(x: &mut [Complex], inverse: bool) {
    let n = x.len();
    if n <= 1 {
        return;
    }

    // bit-reversal permutation
    let mut j = 0;
    for i in 0..n {
        if i < j {
            x.swap(i, j);
        }
        let mut m = n >> 1;
        while m >= 1 && j >= m {
            j -= m;
            m >>= 1;
        }
        j += m;
    }

    let sign = if inverse { 1.0 } else { -1.0 };
    let mut len = 2;
    while len <= n {
        let half = len / 2;
        let wn = Complex::from_polar(1.0, sign * 2.0 * PI / len as f32);
        for i in (0..n).step_by(len) {
            let mut w = Complex::new(1.0, 0.0);
            for k in 0..half {
                let t = x[i + k + half] * w;
                let u = x[i + k];
                x[i + k] = u + t;
                x[i + k + half] = u - t;
                w = w * wn;
            }
        }
        len <<= 1;
    }
}

/// FFT along every axis of an `n^3` cube.
fn fft3(data: &mut [Complex], n: usize, inverse: bool) {
    let mut line = vec![Complex::default(); n];
    let strides = [1, n, n * n];
    for (axis, &stride) in strides.iter().enumerate() {
        for a in 0..n {
            for b in 0..n {
                let start = match axis {
                    0 => a * n + b * n * n,
                    1 => a + b * n * n,
                    _ => a + b * n,
                };
                for (k, c) in line.iter_mut().enumerate() {
                    *c = data[start + k * stride];
                }
                fft_in_place(&mut line, inverse);
                for (k, c) in line.iter().enumerate() {
                    data[start + k * stride] = *c;
                }
            }
        }
    }
}

/// Annular band filter on the angular frequency radius `r` (radians/sample).
fn band_filter(r: f32) -> f32 {
    if r > PI / 4.0 && r < PI / 2.0 {
        let c = (PI / 2.0 * (4.0 * r / PI).log2()).cos();
        c * c
    } else {
        0.0
    }
}

/// Build the FFT band-limited tile.
pub fn generate_fft_tile(seed: u64) -> Vec<f32> {
    let n = NOISE_TILE_SIZE;
    let total = n * n * n;

    let mut spectrum: Vec<Complex> = gaussian_field(total, seed)
        .into_iter()
        .map(|v| Complex::new(v, 0.0))
        .collect();
    fft3(&mut spectrum, n, false);

    let freq = |i: usize| -> f32 {
        let signed = if i < n / 2 { i as f32 } else { i as f32 - n as f32 };
        signed / (n as f32 / 2.0) * PI
    };
    for z in 0..n {
        for y in 0..n {
            for x in 0..n {
                let r = (freq(x).powi(2) + freq(y).powi(2) + freq(z).powi(2)).sqrt();
                let f = band_filter(r);
                let c = &mut spectrum[x + y * n + z * n * n];
                c.re *= f;
                c.im *= f;
            }
        }
    }

    fft3(&mut spectrum, n, true);

    let mut tile: Vec<f32> = spectrum.iter().map(|c| c.re).collect();
    let mean = tile.iter().map(|&v| v as f64).sum::<f64>() / total as f64;
    let var = tile
        .iter()
        .map(|&v| (v as f64 - mean).powi(2))
        .sum::<f64>()
        / total as f64;
    let scale = if var > 0.0 { (1.0 / var.sqrt()) as f32 } else { 0.0 };
    for v in &mut tile {
        *v = (*v - mean as f32) * scale;
    }
    tile
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fft_roundtrip_scaled_by_n() {
        let input: Vec<Complex> = (0..16).map(|i| Complex::new(i as f32, 0.0)).collect();
        let mut data = input.clone();
        fft_in_place(&mut data, false);
        fft_in_place(&mut data, true);
        for (a, b) in data.iter().zip(&input) {
            assert!((a.re / 16.0 - b.re).abs() < 1e-4);
            assert!((a.im / 16.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_band_filter_edges() {
        assert_eq!(band_filter(0.1), 0.0);
        assert_eq!(band_filter(PI), 0.0);
        let inner = band_filter(PI / 4.0 + 1e-4);
        assert!(inner > 0.99, "inner {}", inner);
        let outer = band_filter(PI / 2.0 - 1e-4);
        assert!(outer < 1e-3, "outer {}", outer);
    }
}
