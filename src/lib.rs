/// Cluster Raster - clustered software rasterizer for 2D layered scenes
/// The viewport is split into a grid of clusters that composite in parallel
pub mod error;
pub mod perf;
pub mod rendering;
pub mod tasks;

pub use error::{RenderError, Result, TaskQueueError};
pub use perf::{CounterSnapshot, RenderCounters, RENDER_COUNTERS};
pub use rendering::{
    Color, Dispatch, Framebuffer, PixelFormat, Renderer, RendererConfig, Texture, TextureHandle,
    TextureRegistry,
};
pub use tasks::{TaskQueue, TaskQueueConfig, WorkerId};
