// Copyright @yucwang 2026

use crate::core::scene::{Scene, SceneObject};
use crate::emitters::point::PointEmitter;
use crate::math::constants::{Float, Vector3f};
use crate::math::spectrum::RGBSpectrum;
use crate::sensors::perspective::PerspectiveCamera;
use crate::shapes::rectangle::Rectangle;
use crate::shapes::sphere::Sphere;
use std::sync::Arc;

fn wall(center: Vector3f, half_u: Vector3f, half_v: Vector3f, albedo: RGBSpectrum, name: &str) -> SceneObject {
    SceneObject::new(Arc::new(Rectangle::new(center, half_u, half_v)), albedo)
        .with_name(name.to_string())
}

/// Closed box of width and height 2 with a red left wall, a green right wall, a
/// small emissive panel under the ceiling and two spheres. Lit by a point
/// light just below the panel.
pub fn cornell_box(aspect: Float) -> (Scene, PerspectiveCamera) {
    let white = RGBSpectrum::splat(0.75);
    let x = Vector3f::new(1.0, 0.0, 0.0);
    let y = Vector3f::new(0.0, 1.0, 0.0);
    let z = Vector3f::new(0.0, 0.0, 1.0);

    let mut scene = Scene::new();
    // The box runs from the back wall at z = -1 to a front wall just behind
    // the camera, so every gather ray hits something.
    let depth = 2.3 * z;
    let mid = 1.3 * z;
    scene.add_object(wall(mid - y, depth, x, white, "floor"));
    scene.add_object(wall(mid + y, x, depth, white, "ceiling"));
    scene.add_object(wall(-z, x, y, white, "back"));
    scene.add_object(wall(mid - x, y, depth, RGBSpectrum::new(0.75, 0.15, 0.15), "left"));
    scene.add_object(wall(mid + x, depth, y, RGBSpectrum::new(0.15, 0.75, 0.15), "right"));
    scene.add_object(wall(3.6 * z, y, x, white, "front"));

    scene.add_object(SceneObject::new(Arc::new(Rectangle::new(Vector3f::new(0.0, 0.999, 0.0), 0.25 * z, 0.25 * x)),
                                      RGBSpectrum::black())
        .with_emission(RGBSpectrum::splat(4.0))
        .with_importance(0.5)
        .with_name("panel".to_string()));

    scene.add_object(SceneObject::new(Arc::new(Sphere::new(Vector3f::new(-0.45, -0.6, -0.3), 0.4)), white)
        .with_name("left_sphere".to_string()));
    scene.add_object(SceneObject::new(Arc::new(Sphere::new(Vector3f::new(0.45, -0.7, 0.3), 0.3)), white)
        .with_brilliance(2.0)
        .with_name("right_sphere".to_string()));

    scene.add_emitter(Box::new(PointEmitter::new_with(Vector3f::new(0.0, 0.9, 0.0),
                                                      RGBSpectrum::splat(1.2))));

    let camera = PerspectiveCamera::new(Vector3f::new(0.0, 0.0, 3.5),
                                        Vector3f::zeros(),
                                        y,
                                        (40.0 as Float).to_radians(),
                                        aspect);
    (scene, camera)
}
