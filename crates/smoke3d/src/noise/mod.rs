//! Tileable band-limited noise and its analytic derivatives.
//!
//! The tile is a periodic `128^3` volume. Lookups use quadratic B-spline
//! weights over a 3x3x3 neighborhood, and the derivative along an axis swaps
//! in the spline's derivative weights on that axis. Curl noise is built from
//! these derivatives at three offset positions.

pub mod cache;
#[cfg(feature = "fft-noise")]
pub mod fft;
pub mod wavelet;

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use glam::Vec3;

use crate::config::NoiseKind;
use crate::constants::{NOISE_CURL_OFFSET, NOISE_TILE_SIZE};
use crate::error::{Result, SmokeError};

use self::cache::TILE_LEN;

const MASK: i32 = NOISE_TILE_SIZE as i32 - 1;

/// Quadratic B-spline weights and their derivatives for one coordinate.
#[derive(Clone, Copy, Debug)]
struct Spline {
    mid: i32,
    w: [f32; 3],
    dw: [f32; 3],
}

impl Spline {
    #[inline]
    fn new(p: f32) -> Self {
        let shifted = p - 0.5;
        let mid = shifted.ceil();
        let t = mid - shifted;
        let w0 = t * t * 0.5;
        let w2 = (1.0 - t) * (1.0 - t) * 0.5;
        Self {
            mid: mid as i32,
            w: [w0, 1.0 - w0 - w2, w2],
            dw: [-t, 2.0 * t - 1.0, 1.0 - t],
        }
    }

    #[inline]
    fn cell(&self, offset: usize) -> usize {
        ((self.mid + offset as i32 - 1) & MASK) as usize
    }
}

/// The periodic noise volume.
#[derive(Clone, Debug, PartialEq)]
pub struct WaveletNoiseTile {
    data: Vec<f32>,
}

impl WaveletNoiseTile {
    /// Edge length of the tile.
    pub const SIZE: usize = NOISE_TILE_SIZE;

    /// Wrap existing samples, which must hold exactly one tile.
    pub fn from_data(data: Vec<f32>) -> Result<Self> {
        if data.len() != TILE_LEN {
            return Err(SmokeError::NoiseCacheSize {
                expected: TILE_LEN * std::mem::size_of::<f32>(),
                found: data.len() * std::mem::size_of::<f32>(),
            });
        }
        Ok(Self { data })
    }

    /// Generate a fresh tile of the given kind.
    pub fn generate(kind: NoiseKind, seed: u64) -> Result<Self> {
        let data = match kind {
            NoiseKind::Wavelet => wavelet::generate_wavelet_tile(seed),
            #[cfg(feature = "fft-noise")]
            NoiseKind::Fft => fft::generate_fft_tile(seed),
            other => return Err(SmokeError::UnsupportedNoise(other)),
        };
        Ok(Self { data })
    }

    /// Load the tile from `cache` if it holds a valid one, otherwise generate
    /// it and (re)write the cache. Only an unsupported noise kind is an error.
    pub fn load_or_generate(kind: NoiseKind, seed: u64, cache: Option<&Path>) -> Result<Self> {
        let Some(path) = cache else {
            let tile = Self::generate(kind, seed)?;
            log::info!("Noise: generated {:?} tile (seed {})", kind, seed);
            return Ok(tile);
        };
        let path = cache_file(path, kind);

        match cache::load_tile(&path) {
            Ok(data) => {
                log::info!("Noise: loaded {:?} tile from {}", kind, path.display());
                return Self::from_data(data);
            }
            Err(err) => {
                log::warn!("Noise: cache {} unusable ({}), regenerating", path.display(), err);
            }
        }

        let tile = Self::generate(kind, seed)?;
        log::info!("Noise: generated {:?} tile (seed {})", kind, seed);
        if let Err(err) = cache::save_tile(&path, &tile.data) {
            log::warn!("Noise: failed to write cache {}: {}", path.display(), err);
        }
        Ok(tile)
    }

    /// Raw samples, x fastest.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    #[inline]
    fn at(&self, x: usize, y: usize, z: usize) -> f32 {
        self.data[x + y * Self::SIZE + z * Self::SIZE * Self::SIZE]
    }

    /// Weighted 3x3x3 sum with per-axis weights.
    #[inline]
    fn weighted(&self, splines: [&Spline; 3], weights: [[f32; 3]; 3]) -> f32 {
        let [sx, sy, sz] = splines;
        let [wx, wy, wz] = weights;
        let mut sum = 0.0;
        for (k, &wzk) in wz.iter().enumerate() {
            let zc = sz.cell(k);
            for (j, &wyj) in wy.iter().enumerate() {
                let yc = sy.cell(j);
                let wyz = wzk * wyj;
                for (i, &wxi) in wx.iter().enumerate() {
                    sum += wyz * wxi * self.at(sx.cell(i), yc, zc);
                }
            }
        }
        sum
    }

    /// Smoothly interpolated noise value.
    pub fn evaluate(&self, p: Vec3) -> f32 {
        let (sx, sy, sz) = (Spline::new(p.x), Spline::new(p.y), Spline::new(p.z));
        self.weighted([&sx, &sy, &sz], [sx.w, sy.w, sz.w])
    }

    /// Derivative along X.
    pub fn dx(&self, p: Vec3) -> f32 {
        let (sx, sy, sz) = (Spline::new(p.x), Spline::new(p.y), Spline::new(p.z));
        self.weighted([&sx, &sy, &sz], [sx.dw, sy.w, sz.w])
    }

    /// Derivative along Y.
    pub fn dy(&self, p: Vec3) -> f32 {
        let (sx, sy, sz) = (Spline::new(p.x), Spline::new(p.y), Spline::new(p.z));
        self.weighted([&sx, &sy, &sz], [sx.w, sy.dw, sz.w])
    }

    /// Derivative along Z.
    pub fn dz(&self, p: Vec3) -> f32 {
        let (sx, sy, sz) = (Spline::new(p.x), Spline::new(p.y), Spline::new(p.z));
        self.weighted([&sx, &sy, &sz], [sx.w, sy.w, sz.dw])
    }

    /// All three derivatives at once.
    pub fn gradient(&self, p: Vec3) -> Vec3 {
        let (sx, sy, sz) = (Spline::new(p.x), Spline::new(p.y), Spline::new(p.z));
        Vec3::new(
            self.weighted([&sx, &sy, &sz], [sx.dw, sy.w, sz.w]),
            self.weighted([&sx, &sy, &sz], [sx.w, sy.dw, sz.w]),
            self.weighted([&sx, &sy, &sz], [sx.w, sy.w, sz.dw]),
        )
    }

    /// Curl noise: three decorrelated potentials taken at offset positions.
    pub fn velocity(&self, p: Vec3) -> Vec3 {
        let p1 = p + Vec3::new(NOISE_CURL_OFFSET, 0.0, 0.0);
        let p2 = p + Vec3::new(0.0, NOISE_CURL_OFFSET, 0.0);
        let p3 = p + Vec3::new(0.0, 0.0, NOISE_CURL_OFFSET);

        let f1y = self.dy(p1);
        let f1z = self.dz(p1);
        let f2x = self.dx(p2);
        let f2z = self.dz(p2);
        let f3x = self.dx(p3);
        let f3y = self.dy(p3);

        Vec3::new(f3y - f2z, f1z - f3x, f2x - f1y)
    }

    /// Curl noise with each potential gradient re-expressed in the
    /// unwarped basis `[x, y, z]` (rows of the inverse texture Jacobian).
    pub fn velocity_with_jacobian(&self, p: Vec3, unwarped: &[Vec3; 3]) -> Vec3 {
        let project =
            |g: Vec3| Vec3::new(unwarped[0].dot(g), unwarped[1].dot(g), unwarped[2].dot(g));

        let f1 = project(self.gradient(p + Vec3::new(NOISE_CURL_OFFSET, 0.0, 0.0)));
        let f2 = project(self.gradient(p + Vec3::new(0.0, NOISE_CURL_OFFSET, 0.0)));
        let f3 = project(self.gradient(p + Vec3::new(0.0, 0.0, NOISE_CURL_OFFSET)));

        Vec3::new(f3.y - f2.z, f1.z - f3.x, f2.x - f1.y)
    }
}

/// Cache file used for `kind`; FFT tiles get their own file next to the
/// wavelet one.
pub fn cache_file(path: &Path, kind: NoiseKind) -> PathBuf {
    match kind {
        NoiseKind::Fft => {
            let mut name: OsString = path.as_os_str().to_owned();
            name.push(".fft");
            PathBuf::from(name)
        }
        _ => path.to_path_buf(),
    }
}
