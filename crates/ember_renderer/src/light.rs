//! Analytic directional lights.

use ember_math::Vec3;

use crate::material::Color;

/// A distant light such as the sun.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    /// Direction the light travels (unit length)
    pub direction: Vec3,
    pub intensity: Color,
    /// Cosine of the light's angular radius
    pub threshold: f32,
}

impl DirectionalLight {
    /// `angle` is the angular radius of the light in degrees.
    pub fn new(direction: Vec3, intensity: Color, angle: f32) -> Self {
        Self {
            direction: direction.normalize(),
            intensity,
            threshold: angle.to_radians().cos(),
        }
    }

    /// Cosine weight for a ray escaping along `direction`, if it sees the light.
    pub fn weight(&self, direction: Vec3) -> Option<f32> {
        let weight = -self.direction.dot(direction);
        (weight > self.threshold).then_some(weight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_light_threshold() {
        let light = DirectionalLight::new(-Vec3::Y, Color::ONE, 10.0);

        // Looking straight at the light
        let weight = light.weight(Vec3::Y).unwrap();
        assert!((weight - 1.0).abs() < 1e-6);

        // Outside the angular radius
        let off_axis = Vec3::new(1.0, 1.0, 0.0).normalize();
        assert!(light.weight(off_axis).is_none());
        assert!(light.weight(-Vec3::Y).is_none());
    }
}
