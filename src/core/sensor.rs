// Copyright @yucwang 2026

use crate::math::constants::{Vector2f, Vector3f};
use crate::math::ray::Ray3f;

pub trait Sensor: Sync {
    /// Primary ray through the normalized film position `u` in [0,1]^2.
    fn sample_ray(&self, u: &Vector2f) -> Ray3f;
    /// Eye position; radiosity scales its reuse distances by the distance to it.
    fn position(&self) -> Vector3f;
    fn describe(&self) -> String {
        String::from("Sensor")
    }
}
