//! Per-pixel sampling strategies invoked by tile workers.

mod bvh_quality;
mod path_trace;

pub use bvh_quality::BvhQualityWorker;
pub use path_trace::PathTraceWorker;

use ember_math::Vec2;
use rand::RngCore;

use crate::material::Color;
use crate::profile::RenderProfile;

/// One sample returned by a pixel worker: a linear color, or a metric for
/// diagnostic workers.
pub type Sample = Color;

/// A per-pixel sampling algorithm shared by every tile worker of a session.
pub trait PixelWorker: Send + Sync {
    /// Called once when a session begins, before any `render` call.
    /// Resets per-session accumulators.
    fn assign_profile(&self, _profile: &RenderProfile) {}

    /// Render one sample at an aspect-corrected screen coordinate.
    fn render(&self, profile: &RenderProfile, screen_uv: Vec2, rng: &mut dyn RngCore) -> Sample;
}
