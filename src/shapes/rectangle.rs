// Copyright @yucwang 2026

use crate::core::interaction::SurfaceIntersection;
use crate::core::shape::Shape;
use crate::math::constants::{EPSILON, Float, Vector3f};
use crate::math::ray::Ray3f;

/// Parallelogram spanned by two half-edge vectors around a center. The normal
/// is `half_u x half_v`.
pub struct Rectangle {
    center: Vector3f,
    half_u: Vector3f,
    half_v: Vector3f,
    normal: Vector3f,
    inv_u_len_sqr: Float,
    inv_v_len_sqr: Float,
}

impl Rectangle {
    pub fn new(center: Vector3f, half_u: Vector3f, half_v: Vector3f) -> Self {
        let cross = half_u.cross(&half_v);
        let normal = if cross.norm() > 0.0 { cross.normalize() } else { Vector3f::new(0.0, 0.0, 1.0) };
        let inv = |v: &Vector3f| {
            let len_sqr = v.norm_squared();
            if len_sqr > 0.0 { 1.0 / len_sqr } else { 0.0 }
        };

        Self {
            center,
            half_u,
            half_v,
            normal,
            inv_u_len_sqr: inv(&half_u),
            inv_v_len_sqr: inv(&half_v),
        }
    }

    fn intersect_t(&self, ray: &Ray3f) -> Option<Float> {
        let denom = self.normal.dot(&ray.dir());
        if denom.abs() < EPSILON {
            return None;
        }

        let t = (self.center - ray.origin()).dot(&self.normal) / denom;
        if !ray.test_segment(t) {
            return None;
        }

        // Edge vectors are assumed orthogonal.
        let local = ray.at(t) - self.center;
        let u = local.dot(&self.half_u) * self.inv_u_len_sqr;
        let v = local.dot(&self.half_v) * self.inv_v_len_sqr;
        if u.abs() > 1.0 || v.abs() > 1.0 {
            return None;
        }
        Some(t)
    }
}

impl Shape for Rectangle {
    fn ray_intersection(&self, ray: &Ray3f) -> Option<SurfaceIntersection> {
        let t = self.intersect_t(ray)?;
        Some(SurfaceIntersection::new(ray.at(t), self.normal, t))
    }

    fn ray_intersection_t(&self, ray: &Ray3f) -> bool {
        self.intersect_t(ray).is_some()
    }

    fn describe(&self) -> String {
        format!("Rectangle\n  center: {:?}\n  normal: {:?}", self.center, self.normal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn floor() -> Rectangle {
        Rectangle::new(Vector3f::zeros(),
                       Vector3f::new(0.0, 0.0, 1.0),
                       Vector3f::new(1.0, 0.0, 0.0))
    }

    #[test]
    fn test_rectangle_normal_and_hit() {
        let rect = floor();
        let ray = Ray3f::new(Vector3f::new(0.5, 2.0, -0.5), Vector3f::new(0.0, -1.0, 0.0), None, None);
        let hit = rect.ray_intersection(&ray).expect("ray points at the rectangle");
        assert!((hit.t() - 2.0).abs() < 1e-9);
        assert!((hit.geo_normal() - Vector3f::new(0.0, 1.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_rectangle_misses_outside_and_parallel() {
        let rect = floor();
        let outside = Ray3f::new(Vector3f::new(1.5, 2.0, 0.0), Vector3f::new(0.0, -1.0, 0.0), None, None);
        assert!(!rect.ray_intersection_t(&outside));
        let parallel = Ray3f::new(Vector3f::new(0.0, 1.0, 0.0), Vector3f::new(1.0, 0.0, 0.0), None, None);
        assert!(rect.ray_intersection(&parallel).is_none());
        let bounded = Ray3f::new(Vector3f::new(0.0, 2.0, 0.0), Vector3f::new(0.0, -1.0, 0.0), None, Some(1.0));
        assert!(!rect.ray_intersection_t(&bounded));
    }
}
