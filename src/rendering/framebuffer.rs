/// Destination pixel buffer for the cluster rasterizer.
///
/// Pixels are packed ARGB32 (0xAARRGGBB), row-major with `width` as stride.
/// Clusters write through `FrameRegion` views that each own a disjoint
/// rectangle of the buffer.
use super::geometry::{Color, PixelRect};
use super::texture::PixelFormat;
use crate::error::{RenderError, Result};
use std::marker::PhantomData;

pub struct Framebuffer {
    pub width: usize,
    pub height: usize,
    pub color_buffer: Vec<u32>,
}

impl Framebuffer {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            color_buffer: vec![0; width * height],
        }
    }

    /// Create a render target of the requested format. Only 4-channel targets
    /// can be drawn into.
    pub fn with_format(width: usize, height: usize, format: PixelFormat) -> Result<Self> {
        match format {
            PixelFormat::Rgba8 => Ok(Self::new(width, height)),
            other => Err(RenderError::UnsupportedFormat(other)),
        }
    }

    #[inline]
    pub fn format(&self) -> PixelFormat {
        PixelFormat::Rgba8
    }

    pub fn clear(&mut self, clear_color: u32) {
        self.color_buffer.fill(clear_color);
    }

    pub fn resize(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
        self.color_buffer.resize(width * height, 0);
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> u32 {
        self.color_buffer[y * self.width + x]
    }

    #[inline]
    pub fn color_at(&self, x: usize, y: usize) -> Color {
        Color::from_argb32(self.pixel(x, y))
    }

    #[inline]
    pub fn set_pixel(&mut self, x: usize, y: usize, color: u32) {
        if x < self.width && y < self.height {
            self.color_buffer[y * self.width + x] = color;
        }
    }

    pub fn color_buffer_slice(&self) -> &[u32] {
        &self.color_buffer
    }

    /// True when `color_buffer` holds exactly `width * height` pixels.
    #[inline]
    pub fn is_consistent(&self) -> bool {
        self.width.checked_mul(self.height) == Some(self.color_buffer.len())
    }

    /// Split the framebuffer into views over the given rectangles.
    ///
    /// Panics if `width`/`height` disagree with the buffer length, if a
    /// rectangle leaves the buffer or if two rectangles overlap: the views
    /// alias the same allocation and are only sound when disjoint and in
    /// bounds.
    pub fn split_into_regions(&mut self, regions: &[PixelRect]) -> Vec<FrameRegion<'_>> {
        assert!(
            self.is_consistent(),
            "framebuffer is {}x{} but holds {} pixels",
            self.width,
            self.height,
            self.color_buffer.len()
        );
        for (i, a) in regions.iter().enumerate() {
            assert!(
                a.is_empty() || (a.x1() <= self.width && a.y1() <= self.height),
                "region {a:?} lies outside the {}x{} framebuffer",
                self.width,
                self.height
            );
            for b in &regions[i + 1..] {
                assert!(!a.overlaps(b), "framebuffer regions {a:?} and {b:?} overlap");
            }
        }

        let ptr = self.color_buffer.as_mut_ptr();
        regions
            .iter()
            .map(|&rect| FrameRegion {
                stride: self.width,
                rect,
                ptr,
                _marker: PhantomData,
            })
            .collect()
    }
}

/// Mutable view of one rectangle of a `Framebuffer`.
///
/// Unlike a row slice, regions partition both X and Y, so they hold a raw
/// pointer to the whole buffer and only ever touch pixels inside `rect`.
pub struct FrameRegion<'a> {
    stride: usize,
    rect: PixelRect,
    ptr: *mut u32,
    _marker: PhantomData<&'a mut [u32]>,
}

// Safety: `split_into_regions` checks that the buffer holds `width * height`
// pixels and that every region of one split is an in-bounds, disjoint
// rectangle. A region never touches pixels outside its rectangle,
// so regions can be written from different threads at the same time.
unsafe impl Send for FrameRegion<'_> {}
unsafe impl Sync for FrameRegion<'_> {}

impl<'a> FrameRegion<'a> {
    #[inline]
    pub fn rect(&self) -> PixelRect {
        self.rect
    }

    /// Mutable pixels of global row `y`, restricted to the region's columns.
    #[inline]
    pub fn row_mut(&mut self, y: usize) -> &mut [u32] {
        assert!(y >= self.rect.y && y < self.rect.y1(), "row {y} outside region {:?}", self.rect);
        // Safety: the row lies inside the region, which lies inside the buffer
        // and is not aliased by any other live region.
        unsafe {
            let start = self.ptr.add(y * self.stride + self.rect.x);
            std::slice::from_raw_parts_mut(start, self.rect.width)
        }
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> u32 {
        assert!(self.rect.contains(x, y));
        // Safety: in bounds and owned by this region.
        unsafe { *self.ptr.add(y * self.stride + x) }
    }
}
