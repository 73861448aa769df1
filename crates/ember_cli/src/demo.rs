//! Built-in demo scene: a ground sphere, three feature spheres and a field
//! of small random spheres under a gradient sky.

use ember_renderer::{
    Camera, Color, Dielectric, Diffuse, DirectionalLight, Emissive, GradientSky, Metal, Scene,
    Vec3,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub fn build_scene(seed: u64, aspect: f32) -> Scene {
    let mut scene = Scene::new();

    // Ground
    let ground = scene.add_material(Diffuse::new(Color::new(0.5, 0.5, 0.5)));
    scene.add_sphere(Vec3::new(0.0, -1000.0, 0.0), 1000.0, ground);

    // Three main spheres
    let glass = scene.add_material(Dielectric::new(1.5));
    scene.add_sphere(Vec3::new(0.0, 1.0, 0.0), 1.0, glass);

    let brown = scene.add_material(Diffuse::new(Color::new(0.4, 0.2, 0.1)));
    scene.add_sphere(Vec3::new(-4.0, 1.0, 0.0), 1.0, brown);

    let mirror = scene.add_material(Metal::new(Color::new(0.7, 0.6, 0.5), 0.0));
    scene.add_sphere(Vec3::new(4.0, 1.0, 0.0), 1.0, mirror);

    // A warm panel light behind the spheres
    let lamp = scene.add_material(Emissive::new(Color::new(4.0, 3.6, 3.0)));
    scene.add_quad(
        Vec3::new(-2.0, 3.0, -4.0),
        Vec3::new(4.0, 0.0, 0.0),
        Vec3::new(0.0, 1.5, 0.0),
        lamp,
    );

    // Small random spheres
    let mut rng = StdRng::seed_from_u64(seed);
    for a in -5..5 {
        for b in -5..5 {
            let center = Vec3::new(
                a as f32 + 0.9 * rng.gen::<f32>(),
                0.2,
                b as f32 + 0.9 * rng.gen::<f32>(),
            );
            if (center - Vec3::new(4.0, 0.2, 0.0)).length() <= 0.9 {
                continue;
            }

            let choose_mat: f32 = rng.gen();
            let material = if choose_mat < 0.8 {
                let albedo = Color::new(
                    rng.gen::<f32>() * rng.gen::<f32>(),
                    rng.gen::<f32>() * rng.gen::<f32>(),
                    rng.gen::<f32>() * rng.gen::<f32>(),
                );
                scene.add_material(Diffuse::new(albedo))
            } else if choose_mat < 0.95 {
                let albedo = Color::new(
                    0.5 + 0.5 * rng.gen::<f32>(),
                    0.5 + 0.5 * rng.gen::<f32>(),
                    0.5 + 0.5 * rng.gen::<f32>(),
                );
                scene.add_material(Metal::new(albedo, 0.5 * rng.gen::<f32>()))
            } else {
                glass
            };
            scene.add_sphere(center, 0.2, material);
        }
    }

    scene.add_light(DirectionalLight::new(
        Vec3::new(-1.0, -2.0, -0.5),
        Color::new(2.0, 1.9, 1.7),
        3.0,
    ));
    scene.set_environment(GradientSky::default());

    // Horizontal field of view that keeps a 20 degree vertical view
    let vertical = 20f32.to_radians();
    let horizontal = 2.0 * ((vertical / 2.0).tan() * aspect).atan();
    scene.set_camera(
        Camera::new()
            .with_position(Vec3::new(13.0, 2.0, 3.0), Vec3::ZERO, Vec3::Y)
            .with_fov(horizontal.to_degrees()),
    );

    log::info!("demo scene: {} shapes, {} materials", scene.shape_count(), scene.material_count());
    scene
}
