// Copyright @yucwang 2026

use super::constants::{Float, Vector3f, PI};

/// Radical inverse of `index` in the given prime `base`.
pub fn radical_inverse(base: u32, mut index: u64) -> Float {
    let inv_base = 1.0 / base as Float;
    let mut inv_base_n = 1.0;
    let mut reversed: u64 = 0;
    while index > 0 {
        let next = index / base as u64;
        let digit = index - next * base as u64;
        reversed = reversed * base as u64 + digit;
        inv_base_n *= inv_base;
        index = next;
    }
    (reversed as Float * inv_base_n).min(1.0 - Float::EPSILON)
}

/// Cosine-weighted direction on the +Y hemisphere from a 2D Halton point:
/// the first coordinate picks the squared disc radius, the second the angle.
pub fn halton_cos_weighted_direction(index: u64) -> Vector3f {
    let r = radical_inverse(2, index).sqrt();
    let theta = radical_inverse(3, index) * 2.0 * PI;
    let x = r * theta.cos();
    let z = r * theta.sin();
    let y = (1.0 - x * x - z * z).max(0.0).sqrt();
    Vector3f::new(x, y, z)
}

/// Precomputed table of `count` cosine-weighted directions.
pub fn cos_weighted_table(count: usize) -> Vec<Vector3f> {
    (0..count as u64).map(halton_cos_weighted_direction).collect()
}
