//! Render configuration surface, validated when a session begins.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::RenderError;
use crate::pixel::{BvhQualityWorker, PathTraceWorker, PixelWorker};

/// Which pixel worker renders the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMethod {
    #[default]
    PathTrace,
    /// Visualize BVH traversal cost per primary ray
    BvhQuality,
}

impl RenderMethod {
    pub fn create_worker(self) -> Arc<dyn PixelWorker> {
        match self {
            RenderMethod::PathTrace => Arc::new(PathTraceWorker),
            RenderMethod::BvhQuality => Arc::new(BvhQualityWorker::default()),
        }
    }
}

/// Render settings. Copied into a [`crate::RenderProfile`] when a session begins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Samples applied to every pixel; rendered first
    pub pixel_sample: u32,
    /// Maximum extra samples for pixels with high variance
    pub adaptive_sample: u32,
    /// Edge length of a square tile in pixels
    pub tile_size: u32,
    /// Number of tile worker threads
    pub worker_size: u32,
    pub max_bounce: u32,
    /// Throughput below which a path is considered to carry no energy
    pub energy_epsilon: f32,
    /// Session seed; every tile derives its generator seed from it
    pub seed: u64,
    pub method: RenderMethod,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            pixel_sample: 16,
            adaptive_sample: 0,
            tile_size: 32,
            worker_size: default_worker_size(),
            max_bounce: 64,
            energy_epsilon: 1e-3,
            seed: 0,
            method: RenderMethod::PathTrace,
        }
    }
}

impl RenderSettings {
    /// Check every numeric setting against its constraint.
    pub fn validate(&self) -> Result<(), RenderError> {
        if self.pixel_sample == 0 {
            return Err(invalid("pixel_sample", self.pixel_sample, "must be positive"));
        }
        if self.tile_size == 0 {
            return Err(invalid("tile_size", self.tile_size, "must be positive"));
        }
        if self.worker_size == 0 {
            return Err(invalid("worker_size", self.worker_size, "must be positive"));
        }
        if !(self.energy_epsilon >= 0.0) || !self.energy_epsilon.is_finite() {
            return Err(invalid(
                "energy_epsilon",
                self.energy_epsilon,
                "must be finite and non-negative",
            ));
        }
        Ok(())
    }
}

/// Half of the available hardware threads, at least one.
pub fn default_worker_size() -> u32 {
    let threads = std::thread::available_parallelism().map_or(1, |n| n.get());
    (threads / 2).max(1) as u32
}

fn invalid(name: &'static str, value: impl ToString, reason: &'static str) -> RenderError {
    RenderError::InvalidSetting {
        name,
        value: value.to_string(),
        reason,
    }
}
