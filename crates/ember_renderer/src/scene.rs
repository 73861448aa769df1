//! Scene description and its pressed, render-ready form.
//!
//! A [`Scene`] is assembled freely by the caller. Starting a render presses
//! it into a [`PressedScene`]: shapes are flattened into a geometry pack, a
//! BVH is built over them, and everything becomes read-only.

use std::sync::Arc;

use ember_math::{Ray, Vec3};

use crate::bvh::Bvh;
use crate::camera::Camera;
use crate::environment::Environment;
use crate::error::BuildError;
use crate::geometry::{GeometryPack, Shape};
use crate::hit::{CalculatedHit, Hit};
use crate::light::DirectionalLight;
use crate::material::{Material, MaterialId};
use crate::{Sphere, Triangle};

/// Mutable scene description.
#[derive(Clone, Default)]
pub struct Scene {
    shapes: Vec<Shape>,
    materials: Vec<Arc<dyn Material>>,
    lights: Vec<DirectionalLight>,
    camera: Option<Camera>,
    environment: Option<Arc<dyn Environment>>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a material and return its id.
    pub fn add_material(&mut self, material: impl Material + 'static) -> MaterialId {
        self.materials.push(Arc::new(material));
        MaterialId(self.materials.len() as u32 - 1)
    }

    pub fn add_sphere(&mut self, center: Vec3, radius: f32, material: MaterialId) {
        self.shapes
            .push(Shape::Sphere(Sphere::new(center, radius, material)));
    }

    pub fn add_triangle(&mut self, v0: Vec3, v1: Vec3, v2: Vec3, material: MaterialId) {
        self.shapes
            .push(Shape::Triangle(Triangle::new(v0, v1, v2, material)));
    }

    /// Add a parallelogram spanned by `u` and `v` from `corner`, as two triangles.
    pub fn add_quad(&mut self, corner: Vec3, u: Vec3, v: Vec3, material: MaterialId) {
        self.add_triangle(corner, corner + u, corner + u + v, material);
        self.add_triangle(corner, corner + u + v, corner + v, material);
    }

    pub fn add_light(&mut self, light: DirectionalLight) {
        self.lights.push(light);
    }

    pub fn set_camera(&mut self, camera: Camera) {
        self.camera = Some(camera);
    }

    pub fn set_environment(&mut self, environment: impl Environment + 'static) {
        self.environment = Some(Arc::new(environment));
    }

    pub fn camera(&self) -> Option<&Camera> {
        self.camera.as_ref()
    }

    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    pub fn material_count(&self) -> usize {
        self.materials.len()
    }
}

/// Immutable, flattened scene shared by all render threads.
pub struct PressedScene {
    bvh: Bvh<GeometryPack>,
    materials: Vec<Arc<dyn Material>>,
    lights: Vec<DirectionalLight>,
    camera: Option<Camera>,
    environment: Option<Arc<dyn Environment>>,
}

impl PressedScene {
    /// Flatten `scene` and build its BVH.
    pub fn new(scene: &Scene) -> Result<Self, BuildError> {
        for (token, shape) in scene.shapes.iter().enumerate() {
            let MaterialId(material) = shape.material();
            if material as usize >= scene.materials.len() {
                return Err(BuildError::UnknownMaterial {
                    token: token as u32,
                    material,
                    count: scene.materials.len(),
                });
            }
        }

        let pack = GeometryPack::new(scene.shapes.clone());
        let (aabbs, tokens) = pack.build_inputs();
        let bvh = Bvh::new(pack, &aabbs, &tokens)?;

        Ok(Self {
            bvh,
            materials: scene.materials.clone(),
            lights: scene.lights.clone(),
            camera: scene.camera.clone(),
            environment: scene.environment.clone(),
        })
    }

    pub fn bvh(&self) -> &Bvh<GeometryPack> {
        &self.bvh
    }

    pub fn camera(&self) -> Option<&Camera> {
        self.camera.as_ref()
    }

    pub fn lights(&self) -> &[DirectionalLight] {
        &self.lights
    }

    pub fn environment(&self) -> Option<&dyn Environment> {
        self.environment.as_deref()
    }

    /// Closest surface along `ray`, resolved for shading.
    pub fn get_intersection(&self, ray: &Ray) -> Option<CalculatedHit<'_>> {
        let mut hit = Hit::default();
        if !self.bvh.get_intersection(ray, &mut hit) {
            return None;
        }

        let token = hit.token?;
        let shape = self.bvh.geometry().shape(token)?;
        let material = self.materials.get(shape.material().0 as usize)?;

        Some(CalculatedHit::new(
            ray.origin,
            ray.direction,
            &hit,
            token,
            material.as_ref(),
        ))
    }

    /// BVH traversal cost of finding the closest surface along `ray`.
    pub fn get_intersection_cost(&self, ray: &Ray) -> u32 {
        let mut distance = f32::INFINITY;
        self.bvh.get_intersection_cost(ray, &mut distance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::{Color, Diffuse};

    #[test]
    fn test_pressed_scene_intersection() {
        let mut scene = Scene::new();
        let gray = scene.add_material(Diffuse::new(Color::splat(0.5)));
        scene.add_sphere(Vec3::new(0.0, 0.0, -3.0), 1.0, gray);
        scene.add_quad(
            Vec3::new(-5.0, -1.0, -5.0),
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 10.0),
            gray,
        );

        let pressed = PressedScene::new(&scene).unwrap();
        assert_eq!(pressed.bvh().node_count(), 5);

        let hit = pressed
            .get_intersection(&Ray::new(Vec3::ZERO, -Vec3::Z))
            .unwrap();
        assert_eq!(hit.token, 0);
        assert!((hit.position.z + 2.0).abs() < 1e-4);
        assert!(hit.front_face);

        // Off the quad's diagonal so exactly one triangle is hit
        let floor = pressed
            .get_intersection(&Ray::new(Vec3::new(2.0, 0.0, 0.0), -Vec3::Y))
            .unwrap();
        assert!(floor.token == 1 || floor.token == 2);
        assert!((floor.distance - 1.0).abs() < 1e-4);

        assert!(pressed.get_intersection(&Ray::new(Vec3::ZERO, Vec3::Y)).is_none());
        assert!(pressed.get_intersection_cost(&Ray::new(Vec3::ZERO, -Vec3::Z)) >= 1);
    }

    #[test]
    fn test_unknown_material() {
        let mut scene = Scene::new();
        scene.add_sphere(Vec3::ZERO, 1.0, MaterialId(3));

        let result = PressedScene::new(&scene);
        assert_eq!(
            result.err(),
            Some(BuildError::UnknownMaterial {
                token: 0,
                material: 3,
                count: 0
            })
        );
    }
}
