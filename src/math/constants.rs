/* Copyright 2020 @Yuchen Wong */

pub type Float = f64;

pub type Vector2f = nalgebra::Vector2<Float>;
pub type Vector3f = nalgebra::Vector3<Float>;

pub const EPSILON: Float = 1e-4;
pub const PI: Float = std::f64::consts::PI;
// Stands in for "no hit" distances that still need to be ordered.
pub const BOUND_HUGE: Float = 2.0e10;
