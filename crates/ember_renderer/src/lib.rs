//! Ember - tile-scheduled CPU path tracing
//!
//! Scenes are pressed into an immutable [`RenderProfile`] holding a
//! flattened BVH, then rendered progressively by a pool of tile workers
//! driven by the [`RenderEngine`].

mod accumulator;
mod buffer;
mod builder;
mod bvh;
mod camera;
mod engine;
mod environment;
mod error;
mod geometry;
mod hit;
mod light;
mod material;
mod pixel;
mod profile;
mod scene;
mod settings;
mod sphere;
mod sync;
mod tile;
mod tile_worker;
mod triangle;

pub use accumulator::{luminance, PixelAccumulator};
pub use buffer::{color_to_rgba, linear_to_gamma, RenderBuffer};
pub use builder::{build, BuildNode, Hierarchy};
pub use bvh::{Bvh, MAX_DEPTH};
pub use camera::Camera;
pub use engine::{RenderEngine, State};
pub use environment::{Environment, GradientSky, SolidEnvironment};
pub use error::{BuildError, RenderError};
pub use geometry::{Geometry, GeometryPack, Shape, SurfaceHit};
pub use hit::{CalculatedHit, Hit};
pub use light::DirectionalLight;
pub use material::{Color, Dielectric, Diffuse, Emissive, Material, MaterialId, Metal};
pub use pixel::{BvhQualityWorker, PathTraceWorker, PixelWorker, Sample};
pub use profile::RenderProfile;
pub use scene::{PressedScene, Scene};
pub use settings::{default_worker_size, RenderMethod, RenderSettings};
pub use sphere::Sphere;
pub use tile::{spiral_tiles, tile_grid, TileStatus};
pub use triangle::Triangle;

/// Re-export the math types from ember_math
pub use ember_math::{Aabb, Ray, UVec2, Vec2, Vec3};

use rand::{Rng, RngCore};

/// Uniform float in [0, 1) from a type-erased generator.
#[inline]
pub(crate) fn gen_f32(rng: &mut dyn RngCore) -> f32 {
    rng.gen()
}
