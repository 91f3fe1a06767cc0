// Copyright @yucwang 2023

use crate::math::constants::{ Float, Vector3f };

/// Where a ray met a surface. `object_index` is filled in by the scene.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceIntersection {
    p: Vector3f,
    geo_normal: Vector3f,
    t: Float,
    object_index: Option<usize>,
}

impl SurfaceIntersection {
    pub fn new(new_p: Vector3f, new_geo_normal: Vector3f, new_t: Float) -> Self {
        Self { p: new_p, geo_normal: new_geo_normal, t: new_t, object_index: None }
    }

    pub fn t(&self) -> Float {
        self.t
    }

    pub fn p(&self) -> Vector3f {
        self.p
    }

    pub fn geo_normal(&self) -> Vector3f {
        self.geo_normal
    }

    pub fn object_index(&self) -> Option<usize> {
        self.object_index
    }

    pub fn with_object_index(mut self, object_index: Option<usize>) -> Self {
        self.object_index = object_index;
        self
    }

    /// Normal flipped to face the incoming direction `wi` (pointing away
    /// from the surface).
    pub fn facing_normal(&self, wi: &Vector3f) -> Vector3f {
        if self.geo_normal.dot(wi) < 0.0 {
            -self.geo_normal
        } else {
            self.geo_normal
        }
    }
}
