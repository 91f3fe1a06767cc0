// Copyright @yucwang 2026

use crate::math::constants::{Float, Vector3f};
use crate::math::spectrum::RGBSpectrum;

/// Incident light from a delta emitter at a shading point.
#[derive(Debug, Clone, Copy)]
pub struct EmitterSample {
    /// Unit direction from the shading point towards the emitter.
    pub direction: Vector3f,
    /// Distance to the emitter, `Float::INFINITY` for directional lights.
    pub distance: Float,
    pub irradiance: RGBSpectrum,
}

pub trait Emitter: Send + Sync {
    fn sample_li(&self, p: &Vector3f) -> Option<EmitterSample>;

    fn describe(&self) -> String {
        String::from("Emitter")
    }
}
