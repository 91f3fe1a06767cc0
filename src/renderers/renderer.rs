// Copyright @yucwang 2021

use crate::core::scene::Scene;
use crate::core::sensor::Sensor;
use crate::core::tracer::RenderAbort;
use crate::math::bitmap::Bitmap;

pub trait Renderer {
    fn render(&self, scene: &Scene, sensor: &dyn Sensor) -> Result<Bitmap, RenderAbort>;
}
