/// Frame-level API: collect primitives, then composite every cluster.
///
/// A frame is `begin_frame` → any number of `push_*` calls → `end_frame` →
/// `dispatch_clusters`. All buffers are sized once from `RendererConfig`.
use super::cluster::{grid_dimensions, partition, Cluster};
use super::framebuffer::Framebuffer;
use super::geometry::{Color, PixelRect, Rect};
use super::primitive::PrimitiveBuffer;
use super::rasterizer::ClusterRasterizer;
use super::texture::{PixelFormat, Texture, TextureHandle, TextureRegistry};
use crate::error::{RenderError, Result};
use crate::tasks::TaskQueue;
use crate::{count_add, perf_scope};
use glam::Vec2;
use rayon::prelude::*;

/// Renderer configuration parameters
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Requested cluster count; the grid table decides the exact shape
    pub cluster_count: usize,
    /// Primitives accepted per frame
    pub max_primitives: usize,
    /// Distinct textures per frame
    pub max_texture_slots: usize,
    /// Primitives a single cluster may touch per frame
    pub max_cluster_primitives: usize,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            cluster_count: 8,
            max_primitives: 1024,
            max_texture_slots: 64,
            max_cluster_primitives: 128,
        }
    }
}

/// Where cluster jobs run during `dispatch_clusters`.
#[derive(Copy, Clone)]
pub enum Dispatch<'q> {
    /// One cluster after another on the calling thread.
    Inline,
    /// One job per cluster on the given queue; the caller helps and waits.
    TaskQueue(&'q TaskQueue),
    /// Rayon's global pool.
    Rayon,
}

pub struct Renderer {
    config: RendererConfig,
    columns: usize,
    rows: usize,
    viewport: Option<(usize, usize)>,
    regions: Vec<PixelRect>,
    clusters: Vec<Cluster>,
    primitives: PrimitiveBuffer,
}

impl Renderer {
    pub fn new(config: RendererConfig) -> Result<Self> {
        let (columns, rows) = grid_dimensions(config.cluster_count)
            .ok_or(RenderError::InvalidConfig("cluster_count must be at least 1"))?;
        if config.max_primitives == 0 {
            return Err(RenderError::InvalidConfig("max_primitives must be at least 1"));
        }
        if config.max_primitives > u32::MAX as usize {
            return Err(RenderError::InvalidConfig("max_primitives must fit in a u32 index"));
        }

        let clusters = (0..columns * rows)
            .map(|id| Cluster::new(id, config.max_cluster_primitives))
            .collect();
        let primitives = PrimitiveBuffer::new(config.max_primitives, config.max_texture_slots);

        Ok(Self {
            config,
            columns,
            rows,
            viewport: None,
            regions: Vec::with_capacity(columns * rows),
            clusters,
            primitives,
        })
    }

    #[inline]
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Grid shape as `(columns, rows)`.
    #[inline]
    pub fn grid(&self) -> (usize, usize) {
        (self.columns, self.rows)
    }

    /// Viewport of the current frame, if one has begun.
    #[inline]
    pub fn viewport(&self) -> Option<(usize, usize)> {
        self.viewport
    }

    /// Cluster regions in row-major order.
    #[inline]
    pub fn cluster_regions(&self) -> &[PixelRect] {
        &self.regions
    }

    #[inline]
    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    #[inline]
    pub fn primitives(&self) -> &PrimitiveBuffer {
        &self.primitives
    }

    /// Start a frame: drops last frame's primitives and slots, and repartitions
    /// the grid when the viewport changed.
    pub fn begin_frame(&mut self, width: usize, height: usize) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidViewport { width, height });
        }

        if self.viewport != Some((width, height)) {
            log::debug!(
                "viewport {}x{}: {}x{} cluster grid",
                width,
                height,
                self.columns,
                self.rows
            );
            self.regions = partition(width, height, self.columns, self.rows);
            self.viewport = Some((width, height));
        }
        for (cluster, region) in self.clusters.iter_mut().zip(&self.regions) {
            cluster.reset(*region);
        }
        self.primitives.clear();
        Ok(())
    }

    /// Queue a solid rectangle in normalized viewport coordinates.
    pub fn push_primitive(&mut self, min: Vec2, max: Vec2, depth: f32, tint: Color) -> Result<u32> {
        self.primitives.push(Rect::new(min, max), depth, tint, None)
    }

    /// Queue a textured rectangle. UVs are interpolated across the full,
    /// unclipped rectangle; a reversed UV range flips the image.
    #[allow(clippy::too_many_arguments)]
    pub fn push_textured_primitive(
        &mut self,
        min: Vec2,
        max: Vec2,
        depth: f32,
        tint: Color,
        min_uv: Vec2,
        max_uv: Vec2,
        texture: TextureHandle,
    ) -> Result<u32> {
        self.primitives
            .push(Rect::new(min, max), depth, tint, Some((min_uv, max_uv, texture)))
    }

    pub fn end_frame(&mut self) {
        log::trace!(
            "frame closed: {} primitives, {} texture slots",
            self.primitives.len(),
            self.primitives.texture_slots().len()
        );
    }

    /// Composite the frame into `target`. Returns once every cluster is done.
    pub fn dispatch_clusters(
        &mut self,
        target: &mut Framebuffer,
        textures: &TextureRegistry,
        dispatch: Dispatch<'_>,
    ) -> Result<()> {
        perf_scope!("dispatch_clusters");

        let (width, height) = self
            .viewport
            .ok_or(RenderError::InvalidViewport { width: 0, height: 0 })?;
        if target.format() != PixelFormat::Rgba8 {
            return Err(RenderError::UnsupportedFormat(target.format()));
        }
        if target.width != width || target.height != height {
            return Err(RenderError::ViewportMismatch {
                expected_width: width,
                expected_height: height,
                actual_width: target.width,
                actual_height: target.height,
            });
        }
        if !target.is_consistent() {
            return Err(RenderError::InconsistentTarget {
                width: target.width,
                height: target.height,
                len: target.color_buffer.len(),
            });
        }

        let bound: Vec<&Texture> = self
            .primitives
            .texture_slots()
            .iter()
            .map(|&handle| textures.get(handle).ok_or(RenderError::StaleTexture(handle)))
            .collect::<Result<_>>()?;
        let rasterizer = ClusterRasterizer::new(width, height, &bound);
        let frame = self.primitives.primitives();
        let mut regions = target.split_into_regions(&self.regions);
        count_add!(crate::perf::RENDER_COUNTERS.clusters_dispatched, self.clusters.len() as u64);

        match dispatch {
            Dispatch::Inline => {
                for (cluster, region) in self.clusters.iter_mut().zip(regions.iter_mut()) {
                    cluster.execute(frame, &rasterizer, width, height, region)?;
                }
                Ok(())
            }
            Dispatch::TaskQueue(queue) => {
                let mut outcomes: Vec<Option<RenderError>> =
                    std::iter::repeat_with(|| None).take(self.clusters.len()).collect();
                let rasterizer = &rasterizer;
                queue.scope(|s| {
                    let jobs = self.clusters.iter_mut().zip(regions.iter_mut()).zip(outcomes.iter_mut());
                    for ((cluster, region), outcome) in jobs {
                        s.push_or_run(move |_worker| {
                            if let Err(err) = cluster.execute(frame, rasterizer, width, height, region) {
                                *outcome = Some(err);
                            }
                        });
                    }
                });
                match outcomes.into_iter().flatten().next() {
                    Some(err) => Err(err),
                    None => Ok(()),
                }
            }
            Dispatch::Rayon => self
                .clusters
                .par_iter_mut()
                .zip(regions.par_iter_mut())
                .try_for_each(|(cluster, region)| cluster.execute(frame, &rasterizer, width, height, region)),
        }
    }
}
