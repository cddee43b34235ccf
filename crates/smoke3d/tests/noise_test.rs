//! Wavelet noise tile tests
//!
//! Generating a tile is the expensive part, so one tile is shared by every
//! test in this file.

use std::sync::OnceLock;

use smoke3d::noise::cache_file;
use smoke3d::{NoiseKind, Vec3, WaveletNoiseTile};

const SEED: u64 = 0x5eed;

fn tile() -> &'static WaveletNoiseTile {
    static TILE: OnceLock<WaveletNoiseTile> = OnceLock::new();
    TILE.get_or_init(|| WaveletNoiseTile::generate(NoiseKind::Wavelet, SEED).unwrap())
}

/// Samples are finite, centered on zero and not degenerate
#[test]
fn test_tile_statistics() {
    let data = tile().data();
    assert_eq!(data.len(), WaveletNoiseTile::SIZE.pow(3));
    assert!(data.iter().all(|v| v.is_finite()));

    let n = data.len() as f64;
    let mean = data.iter().map(|&v| v as f64).sum::<f64>() / n;
    let var = data.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / n;
    assert!(mean.abs() < 0.05, "mean {}", mean);
    assert!(var > 1e-3, "variance {}", var);
}

/// The tile wraps around in every direction
#[test]
fn test_tile_is_periodic() {
    let tile = tile();
    let size = WaveletNoiseTile::SIZE as f32;
    for p in [
        Vec3::new(10.25, 3.5, 77.75),
        Vec3::new(0.0, 64.125, 127.5),
        Vec3::new(100.5, 0.75, 5.0),
    ] {
        assert_eq!(tile.evaluate(p), tile.evaluate(p + Vec3::new(size, 0.0, 0.0)));
        assert_eq!(tile.evaluate(p), tile.evaluate(p + Vec3::new(0.0, size, 0.0)));
        assert_eq!(tile.evaluate(p), tile.evaluate(p + Vec3::new(0.0, 0.0, size)));
    }
}

/// Same seed, same tile
#[test]
fn test_generation_is_deterministic() {
    let again = WaveletNoiseTile::generate(NoiseKind::Wavelet, SEED).unwrap();
    assert_eq!(again.data(), tile().data());
}

/// Curl velocity is finite and not identically zero
#[test]
fn test_curl_velocity() {
    let tile = tile();
    let mut max = 0.0f32;
    for i in 0..64 {
        let p = Vec3::new(i as f32 * 1.7, i as f32 * 0.9 + 3.0, 50.0 - i as f32 * 0.6);
        let v = tile.velocity(p);
        assert!(v.is_finite());
        max = max.max(v.length());
    }
    assert!(max > 1e-3, "max curl {}", max);
}

/// The analytic gradient agrees with a central difference of `evaluate`
#[test]
fn test_gradient_matches_finite_difference() {
    let tile = tile();
    let h = 1e-2;
    for p in [Vec3::new(12.3, 45.6, 78.9), Vec3::new(90.1, 2.2, 33.3)] {
        let g = tile.gradient(p);
        let fd = Vec3::new(
            tile.evaluate(p + Vec3::X * h) - tile.evaluate(p - Vec3::X * h),
            tile.evaluate(p + Vec3::Y * h) - tile.evaluate(p - Vec3::Y * h),
            tile.evaluate(p + Vec3::Z * h) - tile.evaluate(p - Vec3::Z * h),
        ) / (2.0 * h);
        let scale = g.length().max(1.0);
        assert!((g - fd).length() < 0.05 * scale, "analytic {:?} vs fd {:?}", g, fd);
    }
}

/// A missing cache file is filled on first use and read back afterwards
#[test]
fn test_cache_roundtrip() {
    let dir = std::env::temp_dir().join(format!("smoke3d-noise-{}", std::process::id()));
    let path = dir.join("noise.bin");
    let _ = std::fs::remove_file(&path);

    let first = WaveletNoiseTile::load_or_generate(NoiseKind::Wavelet, SEED, Some(&path)).unwrap();
    assert!(path.exists());
    assert_eq!(first.data(), tile().data());

    // a different seed proves the second call reads the file
    let second = WaveletNoiseTile::load_or_generate(NoiseKind::Wavelet, 1, Some(&path)).unwrap();
    assert_eq!(second.data(), tile().data());

    let _ = std::fs::remove_dir_all(&dir);
}

/// A truncated cache file is replaced instead of failing the load
#[test]
fn test_corrupt_cache_regenerated() {
    let dir = std::env::temp_dir().join(format!("smoke3d-corrupt-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("noise.bin");
    std::fs::write(&path, [0u8; 16]).unwrap();

    let loaded = WaveletNoiseTile::load_or_generate(NoiseKind::Wavelet, SEED, Some(&path)).unwrap();
    assert_eq!(loaded.data(), tile().data());
    let expected = WaveletNoiseTile::SIZE.pow(3) * std::mem::size_of::<f32>();
    assert_eq!(std::fs::metadata(&path).unwrap().len() as usize, expected);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_fft_tiles_cached_separately() {
    let base = std::path::Path::new("cache/noise.bin");
    assert_eq!(cache_file(base, NoiseKind::Wavelet), base);
    assert_eq!(cache_file(base, NoiseKind::Fft).to_str(), Some("cache/noise.bin.fft"));
}
