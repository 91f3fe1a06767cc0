// Copyright @yucwang 2026

//! Indirect diffuse illumination: Ward-style irradiance caching on top of the
//! generic tracer. Sample points are computed by shooting cosine-weighted
//! rays over the hemisphere, stored in an octree, and interpolated wherever
//! enough nearby samples pass the reuse test.

pub mod block;
pub mod cache;
pub mod cache_file;
pub mod directions;
pub mod function;
pub mod octree;
pub mod settings;

pub use self::cache::RadiosityCache;
pub use self::function::RadiosityFunction;
pub use self::settings::{RadiosityRecursionSettings, SceneRadiositySettings};
