//! Error types for the renderer and the task queue.
//!
//! Every variant is a configuration or capacity violation; none of them are
//! transient. They are surfaced as values so callers can resize buffers, drop
//! primitives or flush early instead of aborting.

use crate::rendering::texture::{PixelFormat, TextureHandle};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("viewport must be non-empty, got {width}x{height}")]
    InvalidViewport { width: usize, height: usize },

    #[error("primitive rectangle is inverted or not finite")]
    InvalidPrimitive,

    #[error("primitive buffer is full ({capacity} primitives)")]
    PrimitiveCapacityExceeded { capacity: usize },

    #[error("texture slot table is full ({capacity} slots)")]
    TextureSlotCapacityExceeded { capacity: usize },

    #[error("cluster {cluster} primitive buffer is full ({capacity} primitives)")]
    ClusterCapacityExceeded { cluster: usize, capacity: usize },

    #[error("pixel format {0:?} is not supported as a render target")]
    UnsupportedFormat(PixelFormat),

    #[error("render target is {actual_width}x{actual_height} but the frame viewport is {expected_width}x{expected_height}")]
    ViewportMismatch {
        expected_width: usize,
        expected_height: usize,
        actual_width: usize,
        actual_height: usize,
    },

    #[error("render target claims {width}x{height} but its buffer holds {len} pixels")]
    InconsistentTarget { width: usize, height: usize, len: usize },

    #[error("texture {0:?} was removed or reloaded while referenced by the frame")]
    StaleTexture(TextureHandle),

    #[error("invalid texture: {0}")]
    InvalidTexture(&'static str),

    #[error("invalid renderer configuration: {0}")]
    InvalidConfig(&'static str),

    #[error(transparent)]
    TaskQueue(#[from] TaskQueueError),
}

#[derive(Debug, Error)]
pub enum TaskQueueError {
    #[error("task queue is full ({capacity} unfinished entries)")]
    QueueFull { capacity: usize },

    #[error("failed to spawn task queue worker {index}")]
    ThreadSpawn {
        index: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid task queue configuration: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T, E = RenderError> = std::result::Result<T, E>;
