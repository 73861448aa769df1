//! Material trait for surface scattering.

use ember_math::Vec3;
use rand::RngCore;

use crate::gen_f32;
use crate::hit::CalculatedHit;

/// Color type alias (linear RGB, unbounded above)
pub type Color = Vec3;

/// Index of a material within a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialId(pub u32);

/// Trait for materials that describe how light interacts with surfaces.
pub trait Material: Send + Sync {
    /// Perturb the shading normal of `hit`, e.g. from a normal map.
    fn apply_normal(&self, _hit: &mut CalculatedHit<'_>) {}

    /// Light emitted at the hit. Most materials return black.
    fn emit(&self, _hit: &CalculatedHit<'_>, _rng: &mut dyn RngCore) -> Color {
        Color::ZERO
    }

    /// Sample an outgoing direction.
    ///
    /// Returns the throughput weight and the outgoing (unit) direction. A
    /// zero weight absorbs the path.
    fn scatter(&self, hit: &CalculatedHit<'_>, rng: &mut dyn RngCore) -> (Color, Vec3);
}

/// Lambertian (diffuse) material.
#[derive(Debug, Clone)]
pub struct Diffuse {
    albedo: Color,
}

impl Diffuse {
    pub fn new(albedo: Color) -> Self {
        Self { albedo }
    }
}

impl Material for Diffuse {
    fn scatter(&self, hit: &CalculatedHit<'_>, rng: &mut dyn RngCore) -> (Color, Vec3) {
        // Cosine-weighted direction around the normal
        let direction = (hit.normal + random_unit_vector(rng)).normalize_or_zero();

        // Catch degenerate scatter direction
        if direction == Vec3::ZERO {
            return (self.albedo, hit.normal);
        }
        (self.albedo, direction)
    }
}

/// Metal (specular) material.
#[derive(Debug, Clone)]
pub struct Metal {
    albedo: Color,
    fuzz: f32,
}

impl Metal {
    /// - `albedo`: The color of the metal
    /// - `fuzz`: Roughness, 0.0 = perfect mirror, 1.0 = very rough
    pub fn new(albedo: Color, fuzz: f32) -> Self {
        Self {
            albedo,
            fuzz: fuzz.clamp(0.0, 1.0),
        }
    }
}

impl Material for Metal {
    fn scatter(&self, hit: &CalculatedHit<'_>, rng: &mut dyn RngCore) -> (Color, Vec3) {
        let reflected = reflect(hit.direction, hit.normal);
        let direction = (reflected + self.fuzz * random_unit_vector(rng)).normalize_or_zero();

        // Absorb rays fuzzed below the surface
        if direction.dot(hit.normal) > 0.0 {
            (self.albedo, direction)
        } else {
            (Color::ZERO, reflected)
        }
    }
}

/// Dielectric (glass) material.
#[derive(Debug, Clone)]
pub struct Dielectric {
    /// Index of refraction
    ior: f32,
}

impl Dielectric {
    /// - `ior`: Index of refraction (1.0 = air, 1.5 = glass, 2.4 = diamond)
    pub fn new(ior: f32) -> Self {
        Self { ior }
    }

    /// Schlick's approximation for reflectance
    fn reflectance(cosine: f32, ior: f32) -> f32 {
        let r0 = ((1.0 - ior) / (1.0 + ior)).powi(2);
        r0 + (1.0 - r0) * (1.0 - cosine).powi(5)
    }
}

impl Material for Dielectric {
    fn scatter(&self, hit: &CalculatedHit<'_>, rng: &mut dyn RngCore) -> (Color, Vec3) {
        let refraction_ratio = if hit.front_face { 1.0 / self.ior } else { self.ior };

        let cos_theta = (-hit.direction).dot(hit.normal).min(1.0);
        let sin_theta = (1.0 - cos_theta * cos_theta).sqrt();

        // Check for total internal reflection
        let cannot_refract = refraction_ratio * sin_theta > 1.0;

        let direction = if cannot_refract
            || Self::reflectance(cos_theta, refraction_ratio) > gen_f32(rng)
        {
            reflect(hit.direction, hit.normal)
        } else {
            refract(hit.direction, hit.normal, refraction_ratio)
        };

        (Color::ONE, direction.normalize())
    }
}

/// Diffuse light emitter. Absorbs everything it does not emit.
#[derive(Debug, Clone)]
pub struct Emissive {
    emit: Color,
}

impl Emissive {
    pub fn new(emit: Color) -> Self {
        Self { emit }
    }
}

impl Material for Emissive {
    fn emit(&self, _hit: &CalculatedHit<'_>, _rng: &mut dyn RngCore) -> Color {
        self.emit
    }

    fn scatter(&self, hit: &CalculatedHit<'_>, _rng: &mut dyn RngCore) -> (Color, Vec3) {
        (Color::ZERO, hit.direction)
    }
}

// =============================================================================
// Helper functions
// =============================================================================

/// Reflect a vector about a normal.
#[inline]
fn reflect(v: Vec3, n: Vec3) -> Vec3 {
    v - 2.0 * v.dot(n) * n
}

/// Refract a vector through a surface.
#[inline]
fn refract(uv: Vec3, n: Vec3, etai_over_etat: f32) -> Vec3 {
    let cos_theta = (-uv).dot(n).min(1.0);
    let r_out_perp = etai_over_etat * (uv + cos_theta * n);
    let r_out_parallel = -(1.0 - r_out_perp.length_squared()).abs().sqrt() * n;
    r_out_perp + r_out_parallel
}

/// Generate a random unit vector on the unit sphere.
pub(crate) fn random_unit_vector(rng: &mut dyn RngCore) -> Vec3 {
    // Use rejection sampling for uniform distribution on sphere
    loop {
        let v = Vec3::new(
            gen_f32(rng) * 2.0 - 1.0,
            gen_f32(rng) * 2.0 - 1.0,
            gen_f32(rng) * 2.0 - 1.0,
        );
        let len_sq = v.length_squared();
        if len_sq > 1e-6 && len_sq <= 1.0 {
            return v / len_sq.sqrt();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hit::Hit;
    use ember_math::Vec2;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn hit_on<'a>(material: &'a dyn Material, direction: Vec3) -> CalculatedHit<'a> {
        let hit = Hit {
            distance: 1.0,
            token: Some(0),
            normal: Vec3::Y,
            uv: Vec2::ZERO,
        };
        CalculatedHit::new(Vec3::Y, direction, &hit, 0, material)
    }

    #[test]
    fn test_diffuse_scatters_above_surface() {
        let material = Diffuse::new(Color::splat(0.5));
        let hit = hit_on(&material, -Vec3::Y);
        let mut rng = StdRng::seed_from_u64(1);

        for _ in 0..100 {
            let (weight, direction) = material.scatter(&hit, &mut rng);
            assert_eq!(weight, Color::splat(0.5));
            assert!(direction.dot(Vec3::Y) >= 0.0);
            assert!((direction.length() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_mirror_reflects() {
        let material = Metal::new(Color::ONE, 0.0);
        let incoming = Vec3::new(1.0, -1.0, 0.0).normalize();
        let hit = hit_on(&material, incoming);
        let mut rng = StdRng::seed_from_u64(1);

        let (weight, direction) = material.scatter(&hit, &mut rng);
        assert_eq!(weight, Color::ONE);
        assert!((direction - Vec3::new(1.0, 1.0, 0.0).normalize()).length() < 1e-5);
    }

    #[test]
    fn test_emissive_absorbs() {
        let material = Emissive::new(Color::splat(4.0));
        let hit = hit_on(&material, -Vec3::Y);
        let mut rng = StdRng::seed_from_u64(1);

        assert_eq!(material.emit(&hit, &mut rng), Color::splat(4.0));
        assert_eq!(material.scatter(&hit, &mut rng).0, Color::ZERO);
    }

    #[test]
    fn test_dielectric_preserves_energy() {
        let material = Dielectric::new(1.5);
        let hit = hit_on(&material, Vec3::new(0.3, -1.0, 0.0).normalize());
        let mut rng = StdRng::seed_from_u64(3);

        for _ in 0..20 {
            let (weight, direction) = material.scatter(&hit, &mut rng);
            assert_eq!(weight, Color::ONE);
            assert!((direction.length() - 1.0).abs() < 1e-4);
        }
    }
}
