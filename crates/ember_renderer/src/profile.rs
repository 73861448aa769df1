//! Immutable per-session snapshot of settings and the pressed scene.

use ember_math::Vec2;

use crate::camera::Camera;
use crate::error::RenderError;
use crate::material::Color;
use crate::scene::{PressedScene, Scene};
use crate::settings::RenderSettings;

/// Everything a render session reads, copied once when the session begins.
///
/// Never mutated afterwards, so worker threads share it without locking.
pub struct RenderProfile {
    pub scene: PressedScene,
    pub camera: Camera,

    pub pixel_sample: u32,
    pub adaptive_sample: u32,

    pub tile_size: u32,
    pub worker_size: u32,

    pub max_bounce: u32,
    pub energy_epsilon: Color,
    pub seed: u64,
}

impl RenderProfile {
    /// Validate `settings`, press `scene` and build its BVH.
    pub fn new(scene: &Scene, settings: &RenderSettings) -> Result<Self, RenderError> {
        settings.validate()?;

        let camera = scene.camera().cloned().ok_or(RenderError::MissingCamera)?;
        let scene = PressedScene::new(scene)?;

        Ok(Self {
            scene,
            camera,
            pixel_sample: settings.pixel_sample,
            adaptive_sample: settings.adaptive_sample,
            tile_size: settings.tile_size,
            worker_size: settings.worker_size,
            max_bounce: settings.max_bounce,
            energy_epsilon: Color::splat(settings.energy_epsilon),
            seed: settings.seed,
        })
    }

    /// Sub-pixel offsets in [0, 1)² for the base samples of every pixel.
    ///
    /// Points on a golden-angle spiral around the pixel center, evenly
    /// covering the pixel for any sample count.
    pub fn sample_offsets(&self) -> Vec<Vec2> {
        spiral_offsets(self.pixel_sample)
    }
}

pub(crate) fn spiral_offsets(count: u32) -> Vec<Vec2> {
    let golden = std::f32::consts::PI * (1.0 + 5f32.sqrt());

    (0..count)
        .map(|i| {
            let index = i as f32 + 0.5;
            let length = (index / count as f32).sqrt();
            let angle = golden * index;

            Vec2::new(angle.cos(), angle.sin()) * length / 2.0 + Vec2::splat(0.5)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::Diffuse;
    use ember_math::Vec3;

    #[test]
    fn test_profile_requires_camera() {
        let mut scene = Scene::new();
        let gray = scene.add_material(Diffuse::new(Color::splat(0.5)));
        scene.add_sphere(Vec3::ZERO, 1.0, gray);

        let result = RenderProfile::new(&scene, &RenderSettings::default());
        assert!(matches!(result, Err(RenderError::MissingCamera)));

        scene.set_camera(Camera::new());
        let profile = RenderProfile::new(&scene, &RenderSettings::default()).unwrap();
        assert_eq!(profile.scene.bvh().node_count(), 1);
        assert_eq!(profile.energy_epsilon, Color::splat(1e-3));
    }

    #[test]
    fn test_spiral_offsets_inside_pixel() {
        let offsets = spiral_offsets(64);
        assert_eq!(offsets.len(), 64);
        for offset in offsets {
            assert!(offset.cmpge(Vec2::ZERO).all() && offset.cmple(Vec2::ONE).all());
        }
        // A single sample lands near the pixel center
        let single = spiral_offsets(1)[0];
        assert!((single - Vec2::splat(0.5)).length() < 0.36);
    }
}
