//! Camera for ray generation.

use ember_math::{Ray, Vec2, Vec3};

/// Pinhole camera generating primary rays from screen coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    look_from: Vec3,
    look_at: Vec3,
    vup: Vec3,
    /// Horizontal field of view in degrees
    field_of_view: f32,

    // Cached basis, kept in sync by update()
    forward: Vec3,
    right: Vec3,
    up: Vec3,
    scale: f32,
}

impl Camera {
    /// Create a camera at the origin looking down -Z with a 90 degree field of view.
    pub fn new() -> Self {
        let mut camera = Self {
            look_from: Vec3::ZERO,
            look_at: Vec3::new(0.0, 0.0, -1.0),
            vup: Vec3::Y,
            field_of_view: 90.0,
            forward: Vec3::NEG_Z,
            right: Vec3::X,
            up: Vec3::Y,
            scale: 2.0,
        };
        camera.update();
        camera
    }

    /// Set camera position.
    pub fn with_position(mut self, look_from: Vec3, look_at: Vec3, vup: Vec3) -> Self {
        self.look_from = look_from;
        self.look_at = look_at;
        self.vup = vup;
        self.update();
        self
    }

    /// Set the horizontal field of view in degrees.
    pub fn with_fov(mut self, field_of_view: f32) -> Self {
        self.field_of_view = field_of_view;
        self.update();
        self
    }

    fn update(&mut self) {
        self.forward = (self.look_at - self.look_from).normalize_or_zero();
        if self.forward == Vec3::ZERO {
            self.forward = Vec3::NEG_Z;
        }
        self.right = self.forward.cross(self.vup).normalize_or_zero();
        if self.right == Vec3::ZERO {
            self.right = self.forward.any_orthonormal_vector();
        }
        self.up = self.right.cross(self.forward);
        self.scale = 2.0 * (self.field_of_view.to_radians() / 2.0).tan();
    }

    /// Generate a ray through an aspect-corrected screen coordinate.
    ///
    /// `screen_uv.x` spans [-0.5, 0.5] across the image width and
    /// `screen_uv.y` points up, scaled by the same factor.
    pub fn get_ray(&self, screen_uv: Vec2) -> Ray {
        let direction = self.forward
            + self.right * (screen_uv.x * self.scale)
            + self.up * (screen_uv.y * self.scale);
        Ray::new(self.look_from, direction)
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_center_ray() {
        let camera = Camera::new().with_position(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
        let ray = camera.get_ray(Vec2::ZERO);

        assert_eq!(ray.origin, Vec3::new(0.0, 0.0, 5.0));
        assert!((ray.direction - Vec3::NEG_Z).length() < 1e-6);
    }

    #[test]
    fn test_camera_field_of_view() {
        let camera = Camera::new().with_fov(90.0);

        // Right edge of a 90 degree camera is 45 degrees off axis
        let ray = camera.get_ray(Vec2::new(0.5, 0.0));
        let expected = Vec3::new(1.0, 0.0, -1.0).normalize();
        assert!((ray.direction - expected).length() < 1e-5);

        // Positive y points up
        let ray = camera.get_ray(Vec2::new(0.0, 0.25));
        assert!(ray.direction.y > 0.0);
    }
}
