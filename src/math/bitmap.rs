// Copyright 2020 @TwoCookingMice

use super::constants::Float;
use super::spectrum::RGBSpectrum;

use std::ops;
use std::vec::Vec;

#[derive(Debug, Clone)]
pub struct Bitmap {
    data: Vec<RGBSpectrum>,
    height: usize,
    width: usize
}

impl ops::Index<(usize, usize)> for Bitmap {
    type Output = RGBSpectrum;

    fn index(&self, index: (usize, usize)) -> &RGBSpectrum {
        &self.data[index.0 + self.width * index.1]
    }
}

impl ops::IndexMut<(usize, usize)> for Bitmap {
    fn index_mut(&mut self, index: (usize, usize)) -> &mut RGBSpectrum {
        &mut self.data[index.0 + self.width * index.1]
    }
}

impl Bitmap {
    pub fn new(width: usize, height: usize) -> Self {
        Self { data: vec![RGBSpectrum::black(); width * height],
               width,
               height }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn raw_copy(&self) -> Vec<(f32, f32, f32)> {
        self.data.iter()
            .map(|c| (c.r() as f32, c.g() as f32, c.b() as f32))
            .collect()
    }

    /// Root mean square difference over all channels, or `None` when the
    /// sizes differ.
    pub fn rms_difference(&self, other: &Bitmap) -> Option<Float> {
        if self.width != other.width || self.height != other.height {
            return None;
        }
        if self.data.is_empty() {
            return Some(0.0);
        }
        let sum: Float = self.data.iter().zip(other.data.iter())
            .map(|(a, b)| (0..3).map(|c| (a[c] - b[c]) * (a[c] - b[c])).sum::<Float>())
            .sum();
        Some((sum / (3 * self.data.len()) as Float).sqrt())
    }
}

/* Test for Bitmap */
