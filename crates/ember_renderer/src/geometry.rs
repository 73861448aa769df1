//! Geometry pack: the token-addressed primitive store the BVH traverses.

use ember_math::{Aabb, Ray, Vec2, Vec3};

use crate::hit::Hit;
use crate::material::MaterialId;
use crate::{Sphere, Triangle};

/// Surface data reported by a single primitive test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceHit {
    pub distance: f32,
    /// Outward normal
    pub normal: Vec3,
    pub uv: Vec2,
}

/// Geometry addressed by opaque 32-bit tokens.
///
/// Implementations must never widen `hit.distance` or `distance`: they only
/// record surfaces strictly closer than the value passed in.
pub trait Geometry: Send + Sync {
    /// Bounding box of the geometry behind `token`.
    fn bounding_box(&self, token: u32) -> Aabb;

    /// Intersect `token` with `ray`, narrowing `hit` on success.
    fn intersect(&self, ray: &Ray, hit: &mut Hit, token: u32) -> bool;

    /// Number of tests spent on `token`, narrowing `distance` on a hit.
    fn intersection_cost(&self, ray: &Ray, distance: &mut f32, token: u32) -> u32;
}

/// A primitive shape. An enum keeps primitive tests free of dynamic dispatch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Sphere(Sphere),
    Triangle(Triangle),
}

impl Shape {
    pub fn bounding_box(&self) -> Aabb {
        match self {
            Shape::Sphere(sphere) => sphere.bounding_box(),
            Shape::Triangle(triangle) => triangle.bounding_box(),
        }
    }

    pub fn material(&self) -> MaterialId {
        match self {
            Shape::Sphere(sphere) => sphere.material(),
            Shape::Triangle(triangle) => triangle.material(),
        }
    }

    /// Intersect this shape. `ignored` is set when the ray left this shape.
    pub fn intersect(&self, ray: &Ray, max: f32, ignored: bool) -> Option<SurfaceHit> {
        match self {
            // A sphere can be re-entered from inside, so only the root at the origin is skipped
            Shape::Sphere(sphere) => sphere.intersect(ray, max, ignored),
            Shape::Triangle(_) if ignored => None,
            Shape::Triangle(triangle) => triangle.intersect(ray, max),
        }
    }
}

/// Flattened list of shapes. A shape's token is its index.
#[derive(Debug, Clone, Default)]
pub struct GeometryPack {
    shapes: Vec<Shape>,
}

impl GeometryPack {
    pub fn new(shapes: Vec<Shape>) -> Self {
        Self { shapes }
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn shape(&self, token: u32) -> Option<&Shape> {
        self.shapes.get(token as usize)
    }

    /// Bounding boxes and tokens of every shape, ready for hierarchy building.
    pub fn build_inputs(&self) -> (Vec<Aabb>, Vec<u32>) {
        let aabbs = self.shapes.iter().map(Shape::bounding_box).collect();
        let tokens = (0..self.shapes.len() as u32).collect();
        (aabbs, tokens)
    }
}

impl Geometry for GeometryPack {
    fn bounding_box(&self, token: u32) -> Aabb {
        self.shape(token).map_or(Aabb::EMPTY, Shape::bounding_box)
    }

    fn intersect(&self, ray: &Ray, hit: &mut Hit, token: u32) -> bool {
        let Some(shape) = self.shape(token) else {
            return false;
        };

        match shape.intersect(ray, hit.distance, ray.ignores(token)) {
            Some(surface) => {
                hit.distance = surface.distance;
                hit.token = Some(token);
                hit.normal = surface.normal;
                hit.uv = surface.uv;
                true
            }
            None => false,
        }
    }

    fn intersection_cost(&self, ray: &Ray, distance: &mut f32, token: u32) -> u32 {
        let Some(shape) = self.shape(token) else {
            return 0;
        };

        if let Some(surface) = shape.intersect(ray, *distance, ray.ignores(token)) {
            *distance = surface.distance;
        }
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pack() -> GeometryPack {
        GeometryPack::new(vec![
            Shape::Sphere(Sphere::new(Vec3::new(0.0, 0.0, -5.0), 1.0, MaterialId(0))),
            Shape::Triangle(Triangle::new(
                Vec3::new(-1.0, -1.0, -2.0),
                Vec3::new(1.0, -1.0, -2.0),
                Vec3::new(0.0, 1.0, -2.0),
                MaterialId(0),
            )),
        ])
    }

    #[test]
    fn test_pack_narrows_hit() {
        let pack = pack();
        let ray = Ray::new(Vec3::ZERO, -Vec3::Z);
        let mut hit = Hit::default();

        assert!(pack.intersect(&ray, &mut hit, 0));
        assert_eq!(hit.token, Some(0));
        assert!((hit.distance - 4.0).abs() < 1e-4);

        assert!(pack.intersect(&ray, &mut hit, 1));
        assert_eq!(hit.token, Some(1));
        assert!((hit.distance - 2.0).abs() < 1e-4);

        // Farther sphere must not widen the record
        assert!(!pack.intersect(&ray, &mut hit, 0));
        assert_eq!(hit.token, Some(1));
    }

    #[test]
    fn test_pack_ignores_source_triangle() {
        let pack = pack();
        let ray = Ray {
            ignore: Some(1),
            ..Ray::new(Vec3::ZERO, -Vec3::Z)
        };
        let mut hit = Hit::default();
        assert!(!pack.intersect(&ray, &mut hit, 1));
    }

    #[test]
    fn test_pack_intersection_cost() {
        let pack = pack();
        let ray = Ray::new(Vec3::ZERO, -Vec3::Z);
        let mut distance = f32::INFINITY;

        assert_eq!(pack.intersection_cost(&ray, &mut distance, 0), 1);
        assert!((distance - 4.0).abs() < 1e-4);
    }

    #[test]
    fn test_pack_build_inputs() {
        let (aabbs, tokens) = pack().build_inputs();
        assert_eq!(aabbs.len(), 2);
        assert_eq!(tokens, vec![0, 1]);
    }
}
