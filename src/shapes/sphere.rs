// Copyright @yucwang 2026

use crate::core::interaction::SurfaceIntersection;
use crate::core::shape::Shape;
use crate::math::constants::{Float, Vector3f};
use crate::math::ray::Ray3f;

pub struct Sphere {
    center: Vector3f,
    radius: Float,
}

impl Sphere {
    pub fn new(center: Vector3f, radius: Float) -> Self {
        Self { center, radius: radius.abs() }
    }

    fn intersect_t(&self, ray: &Ray3f) -> Option<Float> {
        let oc = ray.origin() - self.center;
        // Direction is unit length.
        let half_b = oc.dot(&ray.dir());
        let c = oc.norm_squared() - self.radius * self.radius;
        let discriminant = half_b * half_b - c;
        if discriminant < 0.0 {
            return None;
        }

        let root = discriminant.sqrt();
        let near = -half_b - root;
        if ray.test_segment(near) {
            return Some(near);
        }
        let far = -half_b + root;
        if ray.test_segment(far) {
            return Some(far);
        }
        None
    }
}

impl Shape for Sphere {
    fn ray_intersection(&self, ray: &Ray3f) -> Option<SurfaceIntersection> {
        let t = self.intersect_t(ray)?;
        let p = ray.at(t);
        Some(SurfaceIntersection::new(p, (p - self.center) / self.radius, t))
    }

    fn ray_intersection_t(&self, ray: &Ray3f) -> bool {
        self.intersect_t(ray).is_some()
    }

    fn describe(&self) -> String {
        format!("Sphere\n  center: {:?}\n  radius: {}", self.center, self.radius)
    }
}
