// Copyright @yucwang 2023

use crate::core::interaction::SurfaceIntersection;
use crate::math::ray::Ray3f;

pub trait Shape: Send + Sync {
    fn ray_intersection(&self, ray: &Ray3f) -> Option<SurfaceIntersection>;

    fn ray_intersection_t(&self, ray: &Ray3f) -> bool {
        self.ray_intersection(ray).is_some()
    }

    fn describe(&self) -> String {
        String::from("Shape")
    }
}
