// Copyright @yucwang 2026

use crate::core::emitter::Emitter;
use crate::core::interaction::SurfaceIntersection;
use crate::core::shape::Shape;
use crate::math::constants::Float;
use crate::math::ray::Ray3f;
use crate::math::spectrum::RGBSpectrum;
use std::sync::Arc;

/// A shape with a diffuse finish. `radiosity_importance` overrides the
/// scene-wide default importance when set.
pub struct SceneObject {
    pub shape: Arc<dyn Shape>,
    pub albedo: RGBSpectrum,
    pub emission: RGBSpectrum,
    pub brilliance: Float,
    pub radiosity_importance: Option<Float>,
    pub name: Option<String>,
}

impl SceneObject {
    pub fn new(shape: Arc<dyn Shape>, albedo: RGBSpectrum) -> Self {
        Self {
            shape,
            albedo,
            emission: RGBSpectrum::default(),
            brilliance: 1.0,
            radiosity_importance: None,
            name: None,
        }
    }

    pub fn with_emission(mut self, emission: RGBSpectrum) -> Self {
        self.emission = emission;
        self
    }

    pub fn with_brilliance(mut self, brilliance: Float) -> Self {
        self.brilliance = brilliance;
        self
    }

    pub fn with_importance(mut self, importance: Float) -> Self {
        self.radiosity_importance = Some(importance);
        self
    }

    pub fn with_name(mut self, name: String) -> Self {
        self.name = Some(name);
        self
    }

    pub fn shape(&self) -> &Arc<dyn Shape> {
        &self.shape
    }
}

pub struct Scene {
    objects: Vec<SceneObject>,
    emitters: Vec<Box<dyn Emitter>>,
    background: RGBSpectrum,
    ambient_light: RGBSpectrum,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        Self {
            objects: Vec::new(),
            emitters: Vec::new(),
            background: RGBSpectrum::default(),
            ambient_light: RGBSpectrum::default(),
        }
    }

    pub fn with_objects(objects: Vec<SceneObject>) -> Self {
        Self { objects, ..Self::new() }
    }

    pub fn add_object(&mut self, object: SceneObject) {
        self.objects.push(object);
    }

    pub fn objects(&self) -> &Vec<SceneObject> {
        &self.objects
    }

    pub fn object(&self, index: usize) -> Option<&SceneObject> {
        self.objects.get(index)
    }

    pub fn add_emitter(&mut self, emitter: Box<dyn Emitter>) {
        self.emitters.push(emitter);
    }

    pub fn emitters(&self) -> &Vec<Box<dyn Emitter>> {
        &self.emitters
    }

    pub fn background(&self) -> RGBSpectrum {
        self.background
    }

    pub fn set_background(&mut self, background: RGBSpectrum) {
        self.background = background;
    }

    /// Flat ambient used where no indirect light is gathered.
    pub fn ambient_light(&self) -> RGBSpectrum {
        self.ambient_light
    }

    pub fn set_ambient_light(&mut self, ambient_light: RGBSpectrum) {
        self.ambient_light = ambient_light;
    }

    /// Closest hit along `ray`, tagged with the index of the object hit.
    pub fn ray_intersection(&self, ray: &Ray3f) -> Option<SurfaceIntersection> {
        let mut ray = *ray;
        let mut closest = None;
        for (idx, object) in self.objects.iter().enumerate() {
            if let Some(hit) = object.shape.ray_intersection(&ray) {
                if ray.update(hit.t()) {
                    closest = Some(hit.with_object_index(Some(idx)));
                }
            }
        }
        closest
    }

    /// Whether anything blocks `ray` within its segment.
    pub fn ray_intersection_t(&self, ray: &Ray3f) -> bool {
        self.objects.iter().any(|object| object.shape.ray_intersection_t(ray))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::constants::Vector3f;
    use crate::shapes::sphere::Sphere;

    #[test]
    fn test_scene_returns_closest_object() {
        let far = SceneObject::new(Arc::new(Sphere::new(Vector3f::new(0.0, 0.0, -10.0), 1.0)),
                                   RGBSpectrum::splat(0.5)).with_name("far".to_string());
        let near = SceneObject::new(Arc::new(Sphere::new(Vector3f::new(0.0, 0.0, -4.0), 1.0)),
                                    RGBSpectrum::splat(0.5)).with_name("near".to_string());
        let scene = Scene::with_objects(vec![far, near]);

        let ray = Ray3f::new(Vector3f::zeros(), Vector3f::new(0.0, 0.0, -1.0), None, None);
        let hit = scene.ray_intersection(&ray).expect("two spheres on the axis");
        assert_eq!(hit.object_index(), Some(1));
        assert!((hit.t() - 3.0).abs() < 1e-9);

        let shadow = Ray3f::new(Vector3f::zeros(), Vector3f::new(0.0, 0.0, -1.0), None, Some(2.0));
        assert!(!scene.ray_intersection_t(&shadow));
        assert!(scene.ray_intersection_t(&ray));
    }
}
