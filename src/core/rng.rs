// Copyright @yucwang 2026

use crate::math::constants::Float;

/// Small reproducible generator for pixel jitter.
pub struct LcgRng {
    state: u64,
}

impl LcgRng {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (self.state >> 32) as u32
    }

    /// Uniform in [0, 1].
    pub fn next_float(&mut self) -> Float {
        (self.next_u32() as Float) / (u32::MAX as Float)
    }

    /// Uniform in [-1, 1].
    pub fn next_signed(&mut self) -> Float {
        2.0 * self.next_float() - 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::LcgRng;

    #[test]
    fn test_lcg_is_reproducible_and_bounded() {
        let mut a = LcgRng::new(17);
        let mut b = LcgRng::new(17);
        for _ in 0..100 {
            let v = a.next_signed();
            assert_eq!(v, b.next_signed());
            assert!((-1.0..=1.0).contains(&v));
        }
        assert_ne!(LcgRng::new(1).next_u32(), LcgRng::new(2).next_u32());
    }
}
