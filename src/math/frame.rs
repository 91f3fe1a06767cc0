// Copyright @yucwang 2023

use crate::math::constants::Vector3f;

/// Orthonormal basis; local coordinates are expressed along `x`, `y`, `z`.
#[derive(Debug, Clone, Copy)]
pub struct Frame {
    pub x: Vector3f,
    pub y: Vector3f,
    pub z: Vector3f
}

impl Default for Frame {
    fn default() -> Self {
        Frame {
            x: Vector3f::new(1.0, 0.0, 0.0),
            y: Vector3f::new(0.0, 1.0, 0.0),
            z: Vector3f::new(0.0, 0.0, 1.0)
        }
    }
}

impl Frame {
    pub fn new(new_x: Vector3f, new_y: Vector3f, new_z: Vector3f) -> Frame {
        Frame {
            x: new_x,
            y: new_y,
            z: new_z
        }
    }

    /// Frame whose local Y axis is `normal`. The X axis is taken perpendicular
    /// to the normal and the world Z axis, or the world Y axis when the normal
    /// is too close to Z.
    pub fn from_y(normal: Vector3f) -> Frame {
        let off_axis = if normal.z.abs() > 0.9 {
            Vector3f::new(0.0, 1.0, 0.0)
        } else {
            Vector3f::new(0.0, 0.0, 1.0)
        };
        let x = normal.cross(&off_axis).normalize();
        let z = x.cross(&normal).normalize();
        Frame { x, y: normal, z }
    }

    pub fn from_local(&self, v: Vector3f) -> Vector3f {
        v.x * self.x + v.y * self.y + v.z * self.z
    }
}
