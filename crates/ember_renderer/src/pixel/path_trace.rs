use ember_math::{Ray, Vec2};
use rand::RngCore;

use super::{PixelWorker, Sample};
use crate::material::Color;
use crate::profile::RenderProfile;

/// Monte Carlo path tracer with BSDF-weighted bounces.
#[derive(Debug, Default, Clone, Copy)]
pub struct PathTraceWorker;

impl PixelWorker for PathTraceWorker {
    fn render(&self, profile: &RenderProfile, screen_uv: Vec2, rng: &mut dyn RngCore) -> Sample {
        let scene = &profile.scene;
        let mut ray = profile.camera.get_ray(screen_uv);

        let mut energy = Color::ONE;
        let mut color = Color::ZERO;
        let mut bounce = 0;

        while bounce < profile.max_bounce {
            let Some(mut hit) = scene.get_intersection(&ray) else {
                break;
            };
            bounce += 1;

            let material = hit.material;
            material.apply_normal(&mut hit);

            let emission = material.emit(&hit, rng);
            let (bsdf, direction) = material.scatter(&hit, rng);

            color += energy * emission;
            energy *= bsdf;

            if energy.cmple(profile.energy_epsilon).all() {
                break;
            }
            ray = Ray::spawn(hit.position, direction, hit.token);
        }

        let environment = scene.environment();

        if bounce == 0 {
            return color + environment.map_or(Color::ZERO, |env| env.sample(ray.direction));
        }
        if let Some(environment) = environment {
            color += energy * environment.sample(ray.direction);
        }

        for light in scene.lights() {
            if let Some(weight) = light.weight(ray.direction) {
                color += energy * light.intensity * weight;
            }
        }

        // Do not clamp up, emissive and sky samples can go beyond one
        color.max(Color::ZERO)
    }
}
