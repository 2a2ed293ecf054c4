/// Camera: position, orientation and vertical field of view.
///
/// Left-handed eye space: +X right, +Y up, +Z forward. Projections map
/// depth to [0, 1].

use glam::{Mat4, Quat, Vec2, Vec3};
use crate::culling::Frustum;
use crate::graphics_device::Rect2D;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub orientation: Quat,
    /// Vertical field of view in degrees
    pub field_of_view: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self { position: Vec3::ZERO, orientation: Quat::IDENTITY, field_of_view: 60.0 }
    }
}

impl Camera {
    pub fn new(position: Vec3, orientation: Quat, field_of_view: f32) -> Self {
        Self { position, orientation, field_of_view }
    }

    // ===== DERIVED MATRICES =====

    pub fn world_to_eye(&self) -> Mat4 {
        Mat4::from_quat(self.orientation.inverse()) * Mat4::from_translation(-self.position)
    }

    pub fn eye_to_projection(&self, aspect: f32, near: f32, far: f32) -> Mat4 {
        Mat4::perspective_lh(self.field_of_view.to_radians(), aspect, near, far)
    }

    pub fn world_to_projection(&self, aspect: f32, near: f32, far: f32) -> Mat4 {
        self.eye_to_projection(aspect, near, far) * self.world_to_eye()
    }

    /// View frustum with the given far plane
    pub fn frustum(&self, aspect: f32, near: f32, far: f32) -> Frustum {
        Frustum::from_view_projection(&self.world_to_projection(aspect, near, far))
    }

    // ===== AXES =====

    pub fn forward(&self) -> Vec3 {
        self.orientation * Vec3::Z
    }

    pub fn right(&self) -> Vec3 {
        self.orientation * Vec3::X
    }

    pub fn up(&self) -> Vec3 {
        self.orientation * Vec3::Y
    }

    /// World-space ray through a pixel of `viewport`
    ///
    /// `screen` is in pixels with Y growing downwards. Returns the ray start
    /// (the camera position) and an unnormalized direction whose eye-space Z
    /// is 1.
    pub fn unproject(&self, viewport: Rect2D, screen: Vec2) -> (Vec3, Vec3) {
        let size = Vec2::new(viewport.width.max(1) as f32, viewport.height.max(1) as f32);
        let bottom = viewport.y as f32 + size.y;
        let local = Vec2::new(screen.x - viewport.x as f32, bottom - screen.y);
        let ndc = local * 2.0 / size - Vec2::ONE;

        let tan_half_fov = (self.field_of_view.to_radians() * 0.5).tan();
        let aspect = size.x / size.y;
        let eye_direction = Vec3::new(ndc.x * tan_half_fov * aspect, ndc.y * tan_half_fov, 1.0);

        (self.position, self.orientation * eye_direction)
    }
}

#[cfg(test)]
#[path = "camera_tests.rs"]
mod tests;
