//! Hit records passed through intersection queries.

use ember_math::{Vec2, Vec3};

use crate::material::Material;

/// Mutable, caller-owned intersection record.
///
/// `distance` starts at the caller's upper bound. Intersection routines only
/// ever narrow it: a query never reports a surface farther than the value
/// `distance` held when the query was made.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub distance: f32,
    pub token: Option<u32>,
    /// Outward geometric normal at the hit
    pub normal: Vec3,
    pub uv: Vec2,
}

impl Hit {
    /// Create a record that accepts hits closer than `max_distance`.
    pub fn new(max_distance: f32) -> Self {
        Self {
            distance: max_distance,
            token: None,
            normal: Vec3::ZERO,
            uv: Vec2::ZERO,
        }
    }

    /// Returns true once any geometry has been recorded.
    pub fn found(&self) -> bool {
        self.token.is_some()
    }
}

impl Default for Hit {
    fn default() -> Self {
        Self::new(f32::INFINITY)
    }
}

/// A resolved hit, ready for shading.
#[derive(Clone, Copy)]
pub struct CalculatedHit<'a> {
    pub position: Vec3,
    /// Direction of the incoming ray
    pub direction: Vec3,
    pub distance: f32,
    pub token: u32,
    /// Shading normal, always facing against the incoming ray
    pub normal: Vec3,
    /// The raw, geometric normal
    pub normal_raw: Vec3,
    /// Whether the ray hit the front face (outside) of the surface
    pub front_face: bool,
    pub texcoord: Vec2,
    pub material: &'a dyn Material,
}

impl<'a> CalculatedHit<'a> {
    /// Build a shading record from a raw hit.
    pub fn new(
        origin: Vec3,
        direction: Vec3,
        hit: &Hit,
        token: u32,
        material: &'a dyn Material,
    ) -> Self {
        let front_face = direction.dot(hit.normal) < 0.0;
        let normal = if front_face { hit.normal } else { -hit.normal };

        Self {
            position: origin + direction * hit.distance,
            direction,
            distance: hit.distance,
            token,
            normal,
            normal_raw: hit.normal,
            front_face,
            texcoord: hit.uv,
            material,
        }
    }
}
