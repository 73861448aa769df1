//! Sphere primitive for ray tracing.

use ember_math::{Aabb, Ray, Vec2, Vec3};
use std::f32::consts::PI;

use crate::geometry::SurfaceHit;
use crate::material::MaterialId;

/// Smallest distance accepted for a ray leaving this sphere's own surface.
const SELF_EPSILON: f32 = 1e-3;

/// A sphere primitive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    center: Vec3,
    radius: f32,
    material: MaterialId,
}

impl Sphere {
    /// Create a new sphere. Negative radii are clamped to zero.
    pub fn new(center: Vec3, radius: f32, material: MaterialId) -> Self {
        Self {
            center,
            radius: radius.max(0.0),
            material,
        }
    }

    pub fn material(&self) -> MaterialId {
        self.material
    }

    pub fn bounding_box(&self) -> Aabb {
        let rvec = Vec3::splat(self.radius);
        Aabb::new(self.center - rvec, self.center + rvec)
    }

    /// Get the UV coordinates for a point on the unit sphere.
    fn sphere_uv(p: Vec3) -> Vec2 {
        // theta: angle down from +Y
        // phi: angle around Y axis from +X
        let theta = (-p.y).clamp(-1.0, 1.0).acos();
        let phi = (-p.z).atan2(p.x) + PI;

        Vec2::new(phi / (2.0 * PI), theta / PI)
    }

    /// Intersect `ray` with this sphere, accepting only hits closer than `max`.
    ///
    /// When `leaving` is set the ray starts on this sphere, so the root at the
    /// origin is rejected and only the far side can be reported.
    pub fn intersect(&self, ray: &Ray, max: f32, leaving: bool) -> Option<SurfaceHit> {
        let oc = self.center - ray.origin;
        let h = ray.direction.dot(oc);
        let c = oc.length_squared() - self.radius * self.radius;

        // Direction is normalized so a == 1
        let discriminant = h * h - c;
        if discriminant < 0.0 {
            return None;
        }

        let sqrtd = discriminant.sqrt();
        let min = if leaving { SELF_EPSILON } else { 0.0 };

        // Find the nearest root in the acceptable range
        let mut root = h - sqrtd;
        if root <= min || root >= max {
            root = h + sqrtd;
            if root <= min || root >= max {
                return None;
            }
        }

        let outward_normal = (ray.at(root) - self.center) / self.radius;

        Some(SurfaceHit {
            distance: root,
            normal: outward_normal,
            uv: Self::sphere_uv(outward_normal),
        })
    }
}
