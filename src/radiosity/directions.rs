// Copyright @yucwang 2026

use crate::math::constants::{Float, Vector3f};
use crate::math::frame::Frame;
use crate::math::halton::cos_weighted_table;

const RAD_EPSILON: Float = 0.001;
// Decorrelates the start of the sequence between tiles.
const TILE_OFFSET_STRIDE: usize = 663;

/// Hands out cosine-weighted directions over the hemisphere around a normal,
/// drawn from a precomputed low-discrepancy table.
pub struct SampleDirectionGenerator {
    table: Vec<Vector3f>,
    cursor: usize,
    remaining: usize,
    raw_normal_mode: bool,
    raw_normal: Vector3f,
    frame: Frame,
    brilliance: Float,
}

impl Default for SampleDirectionGenerator {
    fn default() -> Self {
        Self {
            table: Vec::new(),
            cursor: 0,
            remaining: 0,
            raw_normal_mode: false,
            raw_normal: Vector3f::new(0.0, 1.0, 0.0),
            frame: Frame::default(),
            brilliance: 1.0,
        }
    }
}

impl SampleDirectionGenerator {
    pub fn new(pool_size: usize) -> Self {
        let mut generator = Self::default();
        generator.reset(pool_size, 0);
        generator
    }

    /// Rebuilds the table if its size changed and restarts the sequence at an
    /// offset derived from `tile_id`.
    pub fn reset(&mut self, pool_size: usize, tile_id: u32) {
        let pool_size = pool_size.max(1);
        if self.table.len() != pool_size {
            self.table = cos_weighted_table(pool_size);
        }
        self.cursor = (tile_id as usize).wrapping_mul(TILE_OFFSET_STRIDE) % pool_size;
        self.remaining = 0;
    }

    /// Prepares a sequence around `layer_normal` (or `raw_normal` in raw
    /// mode). Returns the number of samples that can be asked for, which is
    /// `sample_count` clamped to the table size.
    pub fn init_sequence(&mut self,
                         sample_count: usize,
                         raw_normal: &Vector3f,
                         layer_normal: &Vector3f,
                         use_raw_normal: bool,
                         brilliance: Float) -> usize {
        let table_size = self.table.len();
        let sample_count = sample_count.min(table_size);

        // With a perturbed normal some candidates end up below the surface,
        // so the budget is bounded and the caller falls back to raw mode.
        self.remaining = if use_raw_normal {
            table_size
        } else {
            (sample_count * 5).min(table_size)
        };

        self.raw_normal_mode = use_raw_normal;
        self.raw_normal = *raw_normal;
        self.frame = Frame::from_y(if use_raw_normal { *raw_normal } else { *layer_normal });
        self.brilliance = brilliance;
        sample_count
    }

    /// Next direction above the raw surface, or `None` once the budget of the
    /// current sequence is spent.
    pub fn next_direction(&mut self) -> Option<Vector3f> {
        while self.remaining > 0 {
            let mut v = self.table[self.cursor];
            self.cursor = (self.cursor + 1) % self.table.len();
            self.remaining -= 1;

            v.y = v.y.abs();
            if self.brilliance != 1.0 {
                v = warp_brilliance(v, self.brilliance);
            }

            let direction = if self.frame.y.y > 1.0 - RAD_EPSILON {
                v
            } else if self.frame.y.y < -1.0 + RAD_EPSILON {
                -v
            } else {
                self.frame.from_local(v)
            };

            if self.raw_normal_mode || direction.dot(&self.raw_normal) > 0.0 {
                return Some(direction);
            }
        }
        None
    }
}

// Reshapes the polar distribution to `cos^brilliance` while keeping the
// azimuth.
fn warp_brilliance(v: Vector3f, brilliance: Float) -> Vector3f {
    let y_old_sqr = v.y * v.y;
    let y_new_sqr = y_old_sqr.powf(2.0 / (1.0 + brilliance));
    let r_old_sqr = 1.0 - y_old_sqr;
    let r_new_sqr = 1.0 - y_new_sqr;
    let r_factor = if r_old_sqr > 0.0 { (r_new_sqr / r_old_sqr).sqrt() } else { 0.0 };
    Vector3f::new(v.x * r_factor, y_new_sqr.sqrt(), v.z * r_factor)
}
