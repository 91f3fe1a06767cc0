// Copyright @yucwang 2026

use crate::core::emitter::{Emitter, EmitterSample};
use crate::math::constants::Vector3f;
use crate::math::spectrum::RGBSpectrum;

/// Isotropic point light with inverse-square falloff.
pub struct PointEmitter {
    pub position: Vector3f,
    pub intensity: RGBSpectrum,
}

impl PointEmitter {
    pub fn new_with(position: Vector3f, intensity: RGBSpectrum) -> Self {
        Self { position, intensity }
    }
}

impl Emitter for PointEmitter {
    fn sample_li(&self, p: &Vector3f) -> Option<EmitterSample> {
        let to_light = self.position - *p;
        let dist_sqr = to_light.norm_squared();
        if dist_sqr <= 0.0 {
            return None;
        }
        let distance = dist_sqr.sqrt();
        Some(EmitterSample {
            direction: to_light / distance,
            distance,
            irradiance: self.intensity / dist_sqr,
        })
    }

    fn describe(&self) -> String {
        format!("PointEmitter\n  position: {:?}", self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_falloff() {
        let emitter = PointEmitter::new_with(Vector3f::new(0.0, 2.0, 0.0), RGBSpectrum::splat(8.0));
        let sample = emitter.sample_li(&Vector3f::zeros()).expect("light is away from p");
        assert!((sample.distance - 2.0).abs() < 1e-12);
        assert!((sample.irradiance.r() - 2.0).abs() < 1e-12);
        assert!(emitter.sample_li(&Vector3f::new(0.0, 2.0, 0.0)).is_none());
    }
}
