//! Triangle primitive for ray tracing.
//!
//! Uses the Möller-Trumbore algorithm for ray-triangle intersection.

use ember_math::{Aabb, Ray, Vec2, Vec3};

use crate::geometry::SurfaceHit;
use crate::material::MaterialId;

/// A triangle primitive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    /// Vertices
    v0: Vec3,
    v1: Vec3,
    v2: Vec3,
    /// Pre-computed face normal (unit length)
    normal: Vec3,
    material: MaterialId,
}

impl Triangle {
    /// Create a new triangle from three vertices.
    ///
    /// Counter-clockwise winding (seen from the front) gives the face normal.
    pub fn new(v0: Vec3, v1: Vec3, v2: Vec3, material: MaterialId) -> Self {
        let normal = (v1 - v0).cross(v2 - v0).normalize_or_zero();

        Self {
            v0,
            v1,
            v2,
            normal,
            material,
        }
    }

    pub fn material(&self) -> MaterialId {
        self.material
    }

    pub fn bounding_box(&self) -> Aabb {
        let mut aabb = Aabb::from_points(self.v0, self.v1);
        aabb.encapsulate(self.v2);
        aabb
    }

    /// Möller-Trumbore intersection, accepting only hits closer than `max`.
    pub fn intersect(&self, ray: &Ray, max: f32) -> Option<SurfaceHit> {
        let edge1 = self.v1 - self.v0;
        let edge2 = self.v2 - self.v0;

        let h = ray.direction.cross(edge2);
        let a = edge1.dot(h);

        // Ray is parallel to triangle
        if a.abs() < 1e-8 {
            return None;
        }

        let f = 1.0 / a;
        let s = ray.origin - self.v0;
        let u = f * s.dot(h);

        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(edge1);
        let v = f * ray.direction.dot(q);

        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = f * edge2.dot(q);
        if t <= 0.0 || t >= max {
            return None;
        }

        Some(SurfaceHit {
            distance: t,
            normal: self.normal,
            uv: Vec2::new(u, v),
        })
    }
}
