use crate::Vec3;

/// Distance a spawned ray is pushed along its direction before tracing.
pub const SPAWN_OFFSET: f32 = 1e-4;

/// A ray in 3D space with origin, normalized direction and an ignored token.
///
/// `ignore` names a piece of geometry the ray must not report, which is how
/// secondary rays avoid hitting the surface they were spawned from.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
    /// Component-wise reciprocal of `direction`, cached for slab tests.
    pub inverse_direction: Vec3,
    pub ignore: Option<u32>,
}

impl Ray {
    /// Create a new ray. `direction` is normalized here.
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        let direction = direction.normalize();
        Self {
            origin,
            direction,
            inverse_direction: direction.recip(),
            ignore: None,
        }
    }

    /// Create a secondary ray leaving the surface of `token`.
    ///
    /// The origin is offset slightly along the direction and the token is ignored.
    pub fn spawn(origin: Vec3, direction: Vec3, token: u32) -> Self {
        let mut ray = Self::new(origin, direction);
        ray.origin += ray.direction * SPAWN_OFFSET;
        ray.ignore = Some(token);
        ray
    }

    /// Get the point along the ray at parameter t.
    ///
    /// Returns: origin + t * direction
    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Returns true if `token` is the geometry this ray should skip.
    #[inline]
    pub fn ignores(&self, token: u32) -> bool {
        self.ignore == Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ray_normalizes_direction() {
        let ray = Ray::new(Vec3::ZERO, Vec3::new(0.0, 3.0, 4.0));
        assert!((ray.direction.length() - 1.0).abs() < 1e-6);
        assert!((ray.direction.y - 0.6).abs() < 1e-6);
        assert_eq!(ray.ignore, None);
    }

    #[test]
    fn test_ray_at() {
        let ray = Ray::new(Vec3::ZERO, Vec3::X);

        assert_eq!(ray.at(0.0), Vec3::ZERO);
        assert_eq!(ray.at(1.0), Vec3::X);
        assert_eq!(ray.at(2.0), Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(ray.at(-1.0), Vec3::new(-1.0, 0.0, 0.0));
    }

    #[test]
    fn test_ray_zero_component_inverse() {
        let ray = Ray::new(Vec3::ZERO, Vec3::Z);
        assert!(ray.inverse_direction.x.is_infinite());
        assert!(ray.inverse_direction.y.is_infinite());
        assert_eq!(ray.inverse_direction.z, 1.0);
    }

    #[test]
    fn test_ray_spawn() {
        let ray = Ray::spawn(Vec3::ZERO, Vec3::Y, 7);
        assert!(ray.ignores(7));
        assert!(!ray.ignores(3));
        assert!(ray.origin.y > 0.0);
        assert!(ray.origin.y <= SPAWN_OFFSET * 1.01);
    }
}
