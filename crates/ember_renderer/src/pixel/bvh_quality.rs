use std::sync::atomic::{AtomicU64, Ordering};

use ember_math::Vec2;
use rand::RngCore;

use super::{PixelWorker, Sample};
use crate::profile::RenderProfile;

/// Counts BVH tests per primary ray.
///
/// Each sample is `(cost, running total cost, running sample count)`, so the
/// red channel carries the per-ray cost and the others the session average.
#[derive(Debug, Default)]
pub struct BvhQualityWorker {
    total_cost: AtomicU64,
    total_sample: AtomicU64,
}

impl BvhQualityWorker {
    /// Mean cost per primary ray so far this session.
    pub fn average_cost(&self) -> f64 {
        let samples = self.total_sample.load(Ordering::Relaxed);
        if samples == 0 {
            return 0.0;
        }
        self.total_cost.load(Ordering::Relaxed) as f64 / samples as f64
    }
}

impl PixelWorker for BvhQualityWorker {
    fn assign_profile(&self, _profile: &RenderProfile) {
        self.total_cost.store(0, Ordering::Relaxed);
        self.total_sample.store(0, Ordering::Relaxed);
    }

    fn render(&self, profile: &RenderProfile, screen_uv: Vec2, _rng: &mut dyn RngCore) -> Sample {
        let ray = profile.camera.get_ray(screen_uv);
        let cost = profile.scene.get_intersection_cost(&ray) as u64;

        let current_cost = self.total_cost.fetch_add(cost, Ordering::Relaxed) + cost;
        let current_sample = self.total_sample.fetch_add(1, Ordering::Relaxed) + 1;

        Sample::new(cost as f32, current_cost as f32, current_sample as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Camera;
    use crate::material::{Color, Diffuse};
    use crate::scene::Scene;
    use crate::settings::RenderSettings;
    use ember_math::Vec3;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_running_totals_reset_on_assign() {
        let mut scene = Scene::new();
        let gray = scene.add_material(Diffuse::new(Color::splat(0.5)));
        for i in 0..8 {
            scene.add_sphere(Vec3::new(i as f32 * 2.0 - 8.0, 0.0, -5.0), 0.8, gray);
        }
        scene.set_camera(Camera::new());
        let profile = RenderProfile::new(&scene, &RenderSettings::default()).unwrap();

        let worker = BvhQualityWorker::default();
        worker.assign_profile(&profile);
        let mut rng = StdRng::seed_from_u64(1);

        let first = worker.render(&profile, Vec2::ZERO, &mut rng);
        let second = worker.render(&profile, Vec2::ZERO, &mut rng);
        assert!(first.x >= 1.0);
        assert_eq!(second.y, first.x + second.x);
        assert_eq!(second.z, 2.0);
        assert!(worker.average_cost() >= 1.0);

        worker.assign_profile(&profile);
        assert_eq!(worker.average_cost(), 0.0);
        let third = worker.render(&profile, Vec2::ZERO, &mut rng);
        assert_eq!(third.z, 1.0);
    }
}
