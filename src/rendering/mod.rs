/// Clustered software rasterization of axis-aligned primitives
pub mod cluster;
pub mod framebuffer;
pub mod geometry;
pub mod primitive;
pub mod rasterizer;
pub mod renderer;
pub mod texture;

pub use cluster::{grid_dimensions, partition, Cluster};
pub use framebuffer::{FrameRegion, Framebuffer};
pub use geometry::{Color, PixelRect, Rect};
pub use primitive::{Paint, Primitive, PrimitiveBuffer, TextureSlot};
pub use rasterizer::{select_mip, ClusterRasterizer, MipSelection, UV_EDGE_EPSILON};
pub use renderer::{Dispatch, Renderer, RendererConfig};
pub use texture::{MipLevel, PixelFormat, Texture, TextureHandle, TextureRegistry};
