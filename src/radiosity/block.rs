// Copyright @yucwang 2026

use std::io::{self, Write};

use crate::math::constants::{Float, Vector3f};
use crate::math::spectrum::RGBSpectrum;

use super::cache_file;

pub const PASS_FIRST: u8 = 1;
pub const PASS_MAX: u8 = 125;
pub const PASS_LOADED: u8 = 126;
pub const PASS_FINAL: u8 = 127;

/// One radiosity measurement. Never mutated once filed in the octree.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBlock {
    pub point: Vector3f,
    pub normal: Vector3f,
    pub brilliance: Float,
    pub to_nearest_surface: Vector3f,
    pub illuminance: RGBSpectrum,
    pub harmonic_mean_distance: Float,
    pub nearest_distance: Float,
    pub quality: Float,
    pub bounce_depth: u8,
    pub pass: u8,
    pub tile_id: u32,
}

impl SampleBlock {
    /// A full-quality sample with no recorded nearest surface.
    pub fn new(point: Vector3f,
               normal: Vector3f,
               illuminance: RGBSpectrum,
               harmonic_mean_distance: Float) -> Self {
        Self {
            point,
            normal,
            brilliance: 1.0,
            to_nearest_surface: Vector3f::zeros(),
            illuminance,
            harmonic_mean_distance,
            nearest_distance: harmonic_mean_distance,
            quality: 1.0,
            bounce_depth: 0,
            pass: PASS_FINAL,
            tile_id: 0,
        }
    }
}

/// Per-thread journal of blocks that have been filed in the octree but not yet
/// written to the autosave file. Pools are recycled across tiles.
#[derive(Debug, Default)]
pub struct BlockPool {
    unsaved: Vec<SampleBlock>,
    total: usize,
}

impl BlockPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, block: &SampleBlock) {
        self.unsaved.push(block.clone());
        self.total += 1;
    }

    pub fn unsaved_len(&self) -> usize {
        self.unsaved.len()
    }

    /// Number of blocks recorded over the lifetime of this pool.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Writes the unsaved blocks to `out`, if any. The journal is emptied in
    /// either case, so blocks are never written twice.
    pub fn save(&mut self, out: Option<&mut dyn Write>) -> io::Result<()> {
        let result = match out {
            Some(w) => self.unsaved.iter().try_for_each(|block| cache_file::write_block(&mut *w, block)),
            None => Ok(()),
        };
        self.unsaved.clear();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block_at(x: Float) -> SampleBlock {
        SampleBlock::new(Vector3f::new(x, 0.0, 0.0),
                         Vector3f::new(0.0, 1.0, 0.0),
                         RGBSpectrum::splat(0.5),
                         1.0)
    }

    #[test]
    fn test_pool_save_flushes_once() {
        let mut pool = BlockPool::new();
        pool.record(&block_at(0.0));
        pool.record(&block_at(1.0));
        assert_eq!(pool.unsaved_len(), 2);

        let mut out: Vec<u8> = Vec::new();
        pool.save(Some(&mut out as &mut dyn Write)).expect("write to memory");
        let text = String::from_utf8(out).expect("utf8");
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().all(|l| l.starts_with("C1\t")));
        assert_eq!(pool.unsaved_len(), 0);

        let mut again: Vec<u8> = Vec::new();
        pool.save(Some(&mut again as &mut dyn Write)).expect("write to memory");
        assert!(again.is_empty());
        assert_eq!(pool.total(), 2);
    }

    #[test]
    fn test_pool_save_without_file_discards_journal() {
        let mut pool = BlockPool::new();
        pool.record(&block_at(0.0));
        pool.save(None).expect("no-op save");
        assert_eq!(pool.unsaved_len(), 0);
    }
}
