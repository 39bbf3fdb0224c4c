//! Math utilities using glam

use glam::{Mat4, Vec3};

/// Right-handed perspective projection with depth mapped to `[0, 1]`
pub fn perspective(fov_y_radians: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
    Mat4::perspective_rh(fov_y_radians, aspect, near, far)
}

/// Right-handed view matrix
pub fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
    Mat4::look_at_rh(eye, target, up)
}

/// Map normalized device coordinates to raster space.
///
/// `[-1, 1]` spans the viewport in x and y, with raster y pointing up so
/// counter-clockwise triangles in NDC stay counter-clockwise. Depth passes
/// through unchanged.
pub fn raster_matrix(width: u32, height: u32) -> Mat4 {
    let half = Vec3::new(width as f32 * 0.5, height as f32 * 0.5, 1.0);
    Mat4::from_scale(half) * Mat4::from_translation(Vec3::new(1.0, 1.0, 0.0))
}
