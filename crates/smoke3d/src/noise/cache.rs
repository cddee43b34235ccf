//! Flat binary noise-tile cache: `128^3` native-endian `f32`, no header.

use std::path::Path;

use crate::constants::NOISE_TILE_SIZE;
use crate::error::{Result, SmokeError};

/// Number of samples in one tile.
pub const TILE_LEN: usize = NOISE_TILE_SIZE * NOISE_TILE_SIZE * NOISE_TILE_SIZE;

/// Read a tile, rejecting files of the wrong size.
pub fn load_tile(path: &Path) -> Result<Vec<f32>> {
    let bytes = std::fs::read(path)?;
    let expected = TILE_LEN * std::mem::size_of::<f32>();
    if bytes.len() != expected {
        return Err(SmokeError::NoiseCacheSize {
            expected,
            found: bytes.len(),
        });
    }
    let mut data = vec![0.0f32; TILE_LEN];
    bytemuck::cast_slice_mut::<f32, u8>(&mut data).copy_from_slice(&bytes);
    Ok(data)
}

/// Write a tile, replacing any existing file.
pub fn save_tile(path: &Path, data: &[f32]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, bytemuck::cast_slice::<f32, u8>(data))?;
    Ok(())
}
