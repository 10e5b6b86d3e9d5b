/// Cluster partitioning of the viewport and per-cluster binning.
///
/// Key points:
/// 1. The grid shape comes from a fixed lookup table keyed by cluster count
/// 2. Remainder pixels go to the first rows/columns, so regions tile the
///    viewport exactly once for any size
/// 3. Each cluster keeps a private, capacity-bounded copy of the primitives
///    touching it, sorted by (depth, submission index)
/// 4. Regions are disjoint, which is what lets clusters rasterize in parallel
use super::framebuffer::FrameRegion;
use super::geometry::PixelRect;
use super::primitive::Primitive;
use super::rasterizer::ClusterRasterizer;
use crate::count_add;
use crate::error::{RenderError, Result};
use std::cmp::Ordering;

/// Grid shape `(columns, rows)` for a requested cluster count.
pub fn grid_dimensions(cluster_count: usize) -> Option<(usize, usize)> {
    let dims = match cluster_count {
        0 => return None,
        1 => (1, 1),
        2..=3 => (1, 2),
        4..=5 => (2, 2),
        6..=7 => (2, 3),
        8..=9 => (2, 4),
        10..=11 => (2, 5),
        12..=15 => (3, 4),
        _ => (4, 4),
    };
    Some(dims)
}

/// Split `size` pixels into `parts` runs; the first `size % parts` runs get one
/// extra pixel. Returns `(offset, length)` pairs.
fn split_axis(size: usize, parts: usize) -> impl Iterator<Item = (usize, usize)> {
    let base = size / parts;
    let remainder = size % parts;
    (0..parts).scan(0usize, move |offset, i| {
        let len = base + usize::from(i < remainder);
        let start = *offset;
        *offset += len;
        Some((start, len))
    })
}

/// Pixel regions for a viewport, in row-major cluster order.
pub fn partition(width: usize, height: usize, cols: usize, rows: usize) -> Vec<PixelRect> {
    let columns: Vec<(usize, usize)> = split_axis(width, cols).collect();
    split_axis(height, rows)
        .flat_map(|(y, h)| columns.iter().map(move |&(x, w)| PixelRect::new(x, y, w, h)))
        .collect()
}

/// Painter's order: ascending depth, then ascending submission index.
#[inline]
pub fn paint_order(a: &Primitive, b: &Primitive) -> Ordering {
    a.depth
        .partial_cmp(&b.depth)
        .unwrap_or(Ordering::Equal)
        .then(a.index.cmp(&b.index))
}

pub struct Cluster {
    pub id: usize,
    pub region: PixelRect,
    capacity: usize,
    primitives: Vec<Primitive>,
}

impl Cluster {
    pub fn new(id: usize, capacity: usize) -> Self {
        Self {
            id,
            region: PixelRect::default(),
            capacity,
            primitives: Vec::with_capacity(capacity),
        }
    }

    pub fn reset(&mut self, region: PixelRect) {
        self.region = region;
        self.primitives.clear();
    }

    /// The cluster's sorted working list from the last `bin`.
    #[inline]
    pub fn primitives(&self) -> &[Primitive] {
        &self.primitives
    }

    /// Copy every primitive whose rectangle overlaps this cluster with non-zero
    /// area, then sort into paint order.
    pub fn bin(&mut self, frame: &[Primitive], viewport_width: usize, viewport_height: usize) -> Result<()> {
        self.primitives.clear();
        if self.region.is_empty() {
            return Ok(());
        }

        let bounds = self.region.normalized(viewport_width, viewport_height);
        for primitive in frame {
            if primitive.rect.intersect(&bounds).is_degenerate() {
                continue;
            }
            if self.primitives.len() >= self.capacity {
                return Err(RenderError::ClusterCapacityExceeded { cluster: self.id, capacity: self.capacity });
            }
            self.primitives.push(*primitive);
        }

        // Indices are unique, so a stable sort with this comparator is total.
        self.primitives.sort_by(paint_order);
        count_add!(crate::perf::RENDER_COUNTERS.primitives_binned, self.primitives.len() as u64);
        Ok(())
    }

    /// Bin, sort and draw this cluster into its framebuffer region.
    pub fn execute(
        &mut self,
        frame: &[Primitive],
        rasterizer: &ClusterRasterizer<'_>,
        viewport_width: usize,
        viewport_height: usize,
        target: &mut FrameRegion<'_>,
    ) -> Result<()> {
        debug_assert_eq!(self.region, target.rect());
        self.bin(frame, viewport_width, viewport_height)?;
        log::trace!(
            "cluster {} {:?}: {} primitives",
            self.id,
            self.region,
            self.primitives.len()
        );
        for primitive in &self.primitives {
            rasterizer.draw(primitive, target);
        }
        Ok(())
    }
}
