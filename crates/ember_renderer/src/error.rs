//! Error types for hierarchy construction and render sessions.

use ember_math::UVec2;
use thiserror::Error;

use crate::engine::State;

/// Failures while flattening a scene into a BVH.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BuildError {
    #[error("{boxes} bounding boxes were supplied for {tokens} tokens")]
    LengthMismatch { boxes: usize, tokens: usize },

    #[error("shape {token} references material {material}, but the scene has {count} materials")]
    UnknownMaterial { token: u32, material: u32, count: usize },

    #[error("hierarchy depth {depth} exceeds the traversal stack capacity of {capacity}")]
    TooDeep { depth: usize, capacity: usize },
}

/// Failures reported by the render engine.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RenderError {
    #[error("no render buffer assigned")]
    MissingBuffer,

    #[error("no scene assigned")]
    MissingScene,

    #[error("scene has no camera, cannot render without a camera")]
    MissingCamera,

    #[error("invalid setting {name} = {value}: {reason}")]
    InvalidSetting {
        name: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("cannot {operation} while the engine is {state:?}")]
    InvalidState { operation: &'static str, state: State },

    #[error("tile {tile} is outside the {grid} tile grid")]
    TileOutOfRange { tile: UVec2, grid: UVec2 },

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("tile worker {worker} failed: {message}")]
    WorkerFault { worker: usize, message: String },
}

impl RenderError {
    /// Returns true for errors caused by missing inputs or invalid settings.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            RenderError::MissingBuffer
                | RenderError::MissingScene
                | RenderError::MissingCamera
                | RenderError::InvalidSetting { .. }
        )
    }
}
