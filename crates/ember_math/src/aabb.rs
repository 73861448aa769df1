use bytemuck::{Pod, Zeroable};

use crate::{Ray, Vec3};

/// Axis-Aligned Bounding Box for spatial acceleration structures (BVH).
///
/// Stored as two corners so that a box is exactly 24 bytes; BVH nodes pack
/// it together with two 32-bit fields into half a cache line.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// An empty AABB (contains nothing). Union with it is the identity.
    pub const EMPTY: Aabb = Aabb {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    /// Create a new AABB from its corners. Callers guarantee `min <= max`.
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create an AABB from two arbitrary corner points.
    pub fn from_points(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Create an AABB that covers both boxes.
    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Grow this box to include a point.
    pub fn encapsulate(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Returns true for a degenerate box with `min > max` on any axis.
    pub fn is_empty(&self) -> bool {
        self.min.cmpgt(self.max).any()
    }

    /// Returns true if `other` lies completely inside this box.
    pub fn contains(&self, other: &Aabb) -> bool {
        other.is_empty() || (self.min.cmple(other.min).all() && self.max.cmpge(other.max).all())
    }

    /// Size of the box on each axis.
    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    /// Returns the center point of the bounding box.
    pub fn centroid(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Returns the index (0=X, 1=Y, 2=Z) of the axis with the longest extent.
    pub fn longest_axis(&self) -> usize {
        let e = self.extent();

        if e.x > e.y && e.x > e.z {
            0
        } else if e.y > e.z {
            1
        } else {
            2
        }
    }

    /// Distance along `ray` at which it enters this box.
    ///
    /// Uses the slab method. Returns zero when the origin is inside the box and
    /// `f32::INFINITY` when the ray misses, points away, or the box is empty.
    /// Axes the ray runs parallel to (zero or subnormal direction components)
    /// are resolved by an explicit origin containment test instead of relying
    /// on infinity arithmetic, which would produce NaN on the slab planes.
    pub fn intersect(&self, ray: &Ray) -> f32 {
        if self.is_empty() {
            return f32::INFINITY;
        }

        let mut near = 0.0f32;
        let mut far = f32::INFINITY;

        for axis in 0..3 {
            let origin = ray.origin[axis];
            let inverse = ray.inverse_direction[axis];
            let (min, max) = (self.min[axis], self.max[axis]);

            if !inverse.is_finite() {
                if origin < min || origin > max {
                    return f32::INFINITY;
                }
                continue;
            }

            let mut t0 = (min - origin) * inverse;
            let mut t1 = (max - origin) * inverse;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }

            near = near.max(t0);
            far = far.min(t1);

            if far < near {
                return f32::INFINITY;
            }
        }

        near
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box() -> Aabb {
        Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0))
    }

    #[test]
    fn test_aabb_size() {
        assert_eq!(std::mem::size_of::<Aabb>(), 24);
    }

    #[test]
    fn test_aabb_from_points() {
        let aabb = Aabb::from_points(Vec3::new(10.0, 0.0, 10.0), Vec3::new(0.0, 10.0, 0.0));

        assert_eq!(aabb.min, Vec3::ZERO);
        assert_eq!(aabb.max, Vec3::splat(10.0));
    }

    #[test]
    fn test_aabb_union() {
        let box1 = Aabb::from_points(Vec3::ZERO, Vec3::splat(5.0));
        let box2 = Aabb::from_points(Vec3::splat(3.0), Vec3::splat(10.0));
        let union = box1.union(&box2);

        assert_eq!(union.min, Vec3::ZERO);
        assert_eq!(union.max, Vec3::splat(10.0));
        assert!(union.contains(&box1));
        assert!(union.contains(&box2));
    }

    #[test]
    fn test_aabb_empty_union_identity() {
        let aabb = unit_box();
        assert!(Aabb::EMPTY.is_empty());
        assert_eq!(Aabb::EMPTY.union(&aabb), aabb);
    }

    #[test]
    fn test_aabb_intersect_hit() {
        let ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::Z);
        assert!((unit_box().intersect(&ray) - 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_aabb_intersect_pointing_away() {
        let ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), -Vec3::Z);
        assert_eq!(unit_box().intersect(&ray), f32::INFINITY);
    }

    #[test]
    fn test_aabb_intersect_miss() {
        let ray = Ray::new(Vec3::new(10.0, 0.0, 0.0), Vec3::Z);
        assert_eq!(unit_box().intersect(&ray), f32::INFINITY);
    }

    #[test]
    fn test_aabb_intersect_inside() {
        let ray = Ray::new(Vec3::ZERO, Vec3::new(1.0, 1.0, 0.0));
        assert_eq!(unit_box().intersect(&ray), 0.0);
    }

    #[test]
    fn test_aabb_intersect_empty_box() {
        let ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::Z);
        assert_eq!(Aabb::EMPTY.intersect(&ray), f32::INFINITY);
    }

    #[test]
    fn test_aabb_intersect_parallel_on_slab_plane() {
        // Origin lies exactly on the x = 1 plane and the ray runs parallel to it
        let ray = Ray::new(Vec3::new(1.0, 0.0, -5.0), Vec3::Z);
        let t = unit_box().intersect(&ray);
        assert!(!t.is_nan());
        assert!((t - 4.0).abs() < 1e-6);

        let outside = Ray::new(Vec3::new(1.0001, 0.0, -5.0), Vec3::Z);
        assert_eq!(unit_box().intersect(&outside), f32::INFINITY);
    }

    #[test]
    fn test_aabb_intersect_flat_box() {
        // Zero-thickness boxes still report hits
        let flat = Aabb::new(Vec3::new(-1.0, 0.0, -1.0), Vec3::new(1.0, 0.0, 1.0));
        let ray = Ray::new(Vec3::new(0.0, 3.0, 0.0), -Vec3::Y);
        assert!((flat.intersect(&ray) - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_aabb_centroid() {
        let aabb = Aabb::from_points(Vec3::ZERO, Vec3::splat(10.0));
        assert_eq!(aabb.centroid(), Vec3::splat(5.0));
    }

    #[test]
    fn test_aabb_longest_axis() {
        let aabb_x = Aabb::from_points(Vec3::ZERO, Vec3::new(10.0, 1.0, 1.0));
        assert_eq!(aabb_x.longest_axis(), 0);

        let aabb_y = Aabb::from_points(Vec3::ZERO, Vec3::new(1.0, 10.0, 1.0));
        assert_eq!(aabb_y.longest_axis(), 1);

        let aabb_z = Aabb::from_points(Vec3::ZERO, Vec3::new(1.0, 1.0, 10.0));
        assert_eq!(aabb_z.longest_axis(), 2);
    }

    #[test]
    fn test_aabb_encapsulate() {
        let mut aabb = Aabb::EMPTY;
        aabb.encapsulate(Vec3::new(1.0, -2.0, 3.0));
        aabb.encapsulate(Vec3::new(-1.0, 2.0, 0.0));

        assert_eq!(aabb.min, Vec3::new(-1.0, -2.0, 0.0));
        assert_eq!(aabb.max, Vec3::new(1.0, 2.0, 3.0));
    }
}
