//! Environment lighting sampled by rays that escape the scene.

use ember_math::Vec3;

use crate::material::Color;

/// Radiance arriving from infinitely far away along a direction.
pub trait Environment: Send + Sync {
    fn sample(&self, direction: Vec3) -> Color;
}

/// A constant color in every direction.
#[derive(Debug, Clone, Copy)]
pub struct SolidEnvironment {
    pub color: Color,
}

impl SolidEnvironment {
    pub fn new(color: Color) -> Self {
        Self { color }
    }
}

impl Environment for SolidEnvironment {
    fn sample(&self, _direction: Vec3) -> Color {
        self.color
    }
}

/// Vertical blend from a horizon color to a zenith color.
#[derive(Debug, Clone, Copy)]
pub struct GradientSky {
    pub horizon: Color,
    pub zenith: Color,
}

impl Default for GradientSky {
    fn default() -> Self {
        Self {
            horizon: Color::new(1.0, 1.0, 1.0),
            zenith: Color::new(0.5, 0.7, 1.0),
        }
    }
}

impl Environment for GradientSky {
    fn sample(&self, direction: Vec3) -> Color {
        let a = 0.5 * (direction.normalize_or_zero().y + 1.0);
        self.horizon * (1.0 - a) + self.zenith * a
    }
}
