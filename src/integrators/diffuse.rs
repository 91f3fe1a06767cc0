// Copyright @yucwang 2026

use crate::core::scene::{Scene, SceneObject};
use crate::core::ticket::TraceTicket;
use crate::core::tracer::{AmbientProvider, CooperateFunctor, RenderAbort, SampleTracer, TraceResult};
use crate::math::constants::{EPSILON, Float, Vector3f};
use crate::math::ray::Ray3f;
use crate::math::spectrum::RGBSpectrum;

/// Whitted-style tracer for purely diffuse scenes: emission, direct light
/// from delta emitters with shadow rays, and an ambient term taken from the
/// `AmbientProvider` handed in by the caller.
pub struct DiffuseTracer<'a> {
    scene: &'a Scene,
    cooperate: &'a dyn CooperateFunctor,
    default_importance: Float,
}

impl<'a> DiffuseTracer<'a> {
    pub fn new(scene: &'a Scene, cooperate: &'a dyn CooperateFunctor, default_importance: Float) -> Self {
        Self { scene, cooperate, default_importance }
    }

    pub fn scene(&self) -> &Scene {
        self.scene
    }

    fn importance_of(&self, object: Option<&SceneObject>) -> Float {
        object.and_then(|o| o.radiosity_importance).unwrap_or(self.default_importance)
    }

    fn direct_light(&self, p: &Vector3f, n: &Vector3f) -> RGBSpectrum {
        let mut direct = RGBSpectrum::black();
        for emitter in self.scene.emitters() {
            let sample = match emitter.sample_li(p) {
                Some(sample) => sample,
                None => continue,
            };
            let cos_theta = n.dot(&sample.direction);
            if cos_theta <= 0.0 {
                continue;
            }
            let shadow = Ray3f::new(*p, sample.direction, Some(EPSILON), Some(sample.distance - EPSILON));
            if !self.scene.ray_intersection_t(&shadow) {
                direct += sample.irradiance * cos_theta;
            }
        }
        direct
    }

    fn shade(&self,
             ticket: &mut TraceTicket,
             weight: Float,
             ambient: &mut dyn AmbientProvider,
             object: &SceneObject,
             p: Vector3f,
             n: Vector3f) -> Result<RGBSpectrum, RenderAbort> {
        let mut colour = object.emission;
        if object.albedo.is_black() {
            return Ok(colour);
        }

        let mut incoming = self.direct_light(&p, &n);
        let ambient_weight = weight * object.albedo.max_component();
        incoming += if ambient.check_radiosity_trace_level(ticket) {
            ambient.compute_ambient(&p, &n, &n, object.brilliance, ambient_weight, ticket)?
        } else {
            self.scene.ambient_light()
        };
        colour += object.albedo.component_mul(&incoming);
        Ok(colour)
    }
}

impl<'a> SampleTracer for DiffuseTracer<'a> {
    fn trace_ray(&self,
                 ray: &Ray3f,
                 ticket: &mut TraceTicket,
                 weight: Float,
                 ambient: &mut dyn AmbientProvider) -> Result<TraceResult, RenderAbort> {
        self.cooperate.cooperate()?;

        if ticket.trace_level >= ticket.max_allowed_trace_level || weight < ticket.adc_bailout {
            return Ok(TraceResult::miss(RGBSpectrum::black()));
        }

        let hit = self.scene.ray_intersection(ray);
        let object = hit.and_then(|h| h.object_index()).and_then(|idx| self.scene.object(idx));
        let distance = hit.map(|h| h.t()).unwrap_or(Float::INFINITY);

        if ticket.radiosity_importance_queried >= 0.0 {
            ticket.radiosity_importance_found = self.importance_of(object);
            if ticket.radiosity_importance_found < ticket.radiosity_importance_queried {
                return Ok(TraceResult { colour: RGBSpectrum::black(), distance });
            }
        }

        // Importance only applies to the ray that asked for it.
        let queried = ticket.radiosity_importance_queried;
        ticket.radiosity_importance_queried = -1.0;
        ticket.trace_level += 1;

        let shaded = match (hit, object) {
            (Some(hit), Some(object)) => {
                let n = hit.facing_normal(&-ray.dir());
                self.shade(ticket, weight, ambient, object, hit.p(), n)
            }
            _ => Ok(self.scene.background()),
        };

        ticket.trace_level -= 1;
        ticket.radiosity_importance_queried = queried;

        Ok(TraceResult { colour: shaded?, distance })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tracer::{AbortFlag, NeverAbort, NoRadiosity};
    use crate::emitters::point::PointEmitter;
    use crate::shapes::rectangle::Rectangle;
    use crate::shapes::sphere::Sphere;
    use std::sync::Arc;

    fn floor_scene() -> Scene {
        let floor = Rectangle::new(Vector3f::zeros(),
                                   Vector3f::new(0.0, 0.0, 10.0),
                                   Vector3f::new(10.0, 0.0, 0.0));
        let mut scene = Scene::with_objects(vec![
            SceneObject::new(Arc::new(floor), RGBSpectrum::splat(0.5)).with_importance(0.25),
        ]);
        scene.add_emitter(Box::new(PointEmitter::new_with(Vector3f::new(0.0, 2.0, 0.0),
                                                          RGBSpectrum::splat(4.0))));
        scene.set_background(RGBSpectrum::new(0.0, 0.0, 1.0));
        scene
    }

    fn down_ray() -> Ray3f {
        Ray3f::new(Vector3f::new(0.0, 1.0, 0.0), Vector3f::new(0.0, -1.0, 0.0), None, None)
    }

    #[test]
    fn test_direct_and_constant_ambient() {
        let scene = floor_scene();
        let tracer = DiffuseTracer::new(&scene, &NeverAbort, 1.0);
        let mut ambient = NoRadiosity::new(RGBSpectrum::splat(0.2));
        let mut ticket = TraceTicket::default();

        let result = tracer.trace_ray(&down_ray(), &mut ticket, 1.0, &mut ambient).expect("not aborted");
        // 0.5 * (4 / 2^2 + 0.2)
        assert!((result.colour.r() - 0.6).abs() < 1e-9);
        assert!((result.distance - 1.0).abs() < 1e-9);
        assert_eq!(ticket.trace_level, 0);
    }

    #[test]
    fn test_shadowed_point_gets_only_ambient() {
        let mut scene = floor_scene();
        scene.add_object(SceneObject::new(Arc::new(Sphere::new(Vector3f::new(0.0, 1.5, 0.0), 0.1)),
                                          RGBSpectrum::splat(0.5)));
        let tracer = DiffuseTracer::new(&scene, &NeverAbort, 1.0);
        let mut ambient = NoRadiosity::new(RGBSpectrum::splat(0.2));
        let mut ticket = TraceTicket::default();
        let ray = Ray3f::new(Vector3f::new(0.5, 1.0, 0.0), Vector3f::new(-0.5, -1.0, 0.0), None, None);

        let result = tracer.trace_ray(&ray, &mut ticket, 1.0, &mut ambient).expect("not aborted");
        assert!((result.colour.r() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_miss_returns_background() {
        let scene = floor_scene();
        let tracer = DiffuseTracer::new(&scene, &NeverAbort, 1.0);
        let mut ambient = NoRadiosity::new(RGBSpectrum::black());
        let mut ticket = TraceTicket::default();
        let up = Ray3f::new(Vector3f::new(0.0, 1.0, 0.0), Vector3f::new(0.0, 1.0, 0.0), None, None);

        let result = tracer.trace_ray(&up, &mut ticket, 1.0, &mut ambient).expect("not aborted");
        assert_eq!(result.colour, RGBSpectrum::new(0.0, 0.0, 1.0));
        assert!(result.distance.is_infinite());
    }

    #[test]
    fn test_importance_query_reports_object_importance() {
        let scene = floor_scene();
        let tracer = DiffuseTracer::new(&scene, &NeverAbort, 1.0);
        let mut ambient = NoRadiosity::new(RGBSpectrum::black());
        let mut ticket = TraceTicket::default();

        // The floor only matters to queries up to 0.25.
        ticket.radiosity_importance_queried = 0.5;
        let result = tracer.trace_ray(&down_ray(), &mut ticket, 1.0, &mut ambient).expect("not aborted");
        assert_eq!(ticket.radiosity_importance_found, 0.25);
        assert!(result.colour.is_black());
        assert!((result.distance - 1.0).abs() < 1e-9);

        ticket.radiosity_importance_queried = 0.1;
        let result = tracer.trace_ray(&down_ray(), &mut ticket, 1.0, &mut ambient).expect("not aborted");
        assert!(!result.colour.is_black());
        assert_eq!(ticket.radiosity_importance_queried, 0.1);
    }

    #[test]
    fn test_bailout_and_trace_level_limit() {
        let scene = floor_scene();
        let tracer = DiffuseTracer::new(&scene, &NeverAbort, 1.0);
        let mut ambient = NoRadiosity::new(RGBSpectrum::splat(0.2));
        let mut ticket = TraceTicket::new(5, 0.1);

        let dim = tracer.trace_ray(&down_ray(), &mut ticket, 0.05, &mut ambient).expect("not aborted");
        assert!(dim.colour.is_black());
        assert!(dim.distance.is_infinite());

        ticket.trace_level = 5;
        let deep = tracer.trace_ray(&down_ray(), &mut ticket, 1.0, &mut ambient).expect("not aborted");
        assert!(deep.colour.is_black());
    }

    #[test]
    fn test_abort_is_propagated() {
        let scene = floor_scene();
        let flag = AbortFlag::new();
        flag.request();
        let tracer = DiffuseTracer::new(&scene, &flag, 1.0);
        let mut ambient = NoRadiosity::new(RGBSpectrum::black());
        let mut ticket = TraceTicket::default();
        assert_eq!(tracer.trace_ray(&down_ray(), &mut ticket, 1.0, &mut ambient).err(), Some(RenderAbort));
    }
}
