/// Geometry and color primitives shared by the cluster partitioner and rasterizer.
///
/// Normalized rectangles live in viewport space `[0,1]²` with y growing downward,
/// pixel rectangles are integer regions of the destination buffer.
use glam::{Vec2, Vec4};

/// Axis-aligned rectangle in normalized viewport space.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    #[inline]
    pub const fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// The whole viewport.
    pub const UNIT: Rect = Rect::new(Vec2::ZERO, Vec2::ONE);

    #[inline]
    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }

    #[inline]
    pub fn intersect(&self, other: &Rect) -> Rect {
        Rect {
            min: self.min.max(other.min),
            max: self.max.min(other.max),
        }
    }

    /// True when the rectangle has no area (including inverted rectangles).
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.min.x >= self.max.x || self.min.y >= self.max.y
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.min.is_finite() && self.max.is_finite()
    }

    /// Scale into pixel space for a viewport of the given size.
    #[inline]
    pub fn to_pixels(&self, viewport: Vec2) -> Rect {
        Rect {
            min: self.min * viewport,
            max: self.max * viewport,
        }
    }
}

/// Integer pixel region: offset plus size.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct PixelRect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl PixelRect {
    #[inline]
    pub const fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self { x, y, width, height }
    }

    #[inline]
    pub fn x1(&self) -> usize {
        self.x + self.width
    }

    #[inline]
    pub fn y1(&self) -> usize {
        self.y + self.height
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    #[inline]
    pub fn area(&self) -> usize {
        self.width * self.height
    }

    #[inline]
    pub fn contains(&self, x: usize, y: usize) -> bool {
        x >= self.x && x < self.x1() && y >= self.y && y < self.y1()
    }

    pub fn overlaps(&self, other: &PixelRect) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.x < other.x1()
            && other.x < self.x1()
            && self.y < other.y1()
            && other.y < self.y1()
    }

    /// Same region expressed in normalized viewport coordinates.
    pub fn normalized(&self, viewport_width: usize, viewport_height: usize) -> Rect {
        let inv_w = 1.0 / viewport_width as f32;
        let inv_h = 1.0 / viewport_height as f32;
        Rect {
            min: Vec2::new(self.x as f32 * inv_w, self.y as f32 * inv_h),
            max: Vec2::new(self.x1() as f32 * inv_w, self.y1() as f32 * inv_h),
        }
    }
}

/// Straight-alpha RGBA color with channels in `[0,1]`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Color(pub Vec4);

impl Color {
    pub const WHITE: Color = Color(Vec4::ONE);
    pub const BLACK: Color = Color(Vec4::new(0.0, 0.0, 0.0, 1.0));
    pub const TRANSPARENT: Color = Color(Vec4::ZERO);
    pub const RED: Color = Color(Vec4::new(1.0, 0.0, 0.0, 1.0));
    pub const GREEN: Color = Color(Vec4::new(0.0, 1.0, 0.0, 1.0));
    pub const BLUE: Color = Color(Vec4::new(0.0, 0.0, 1.0, 1.0));

    #[inline]
    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self(Vec4::new(r, g, b, a))
    }

    #[inline]
    pub fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self(Vec4::new(r as f32, g as f32, b as f32, a as f32) / 255.0)
    }

    /// Unpack from 0xAARRGGBB.
    #[inline]
    pub fn from_argb32(packed: u32) -> Self {
        Self::from_rgba8(
            (packed >> 16) as u8,
            (packed >> 8) as u8,
            packed as u8,
            (packed >> 24) as u8,
        )
    }

    /// Pack to 0xAARRGGBB, rounding to the nearest 8-bit value.
    #[inline]
    pub fn to_argb32(self) -> u32 {
        let [r, g, b, a] = self.to_rgba8();
        ((a as u32) << 24) | ((r as u32) << 16) | ((g as u32) << 8) | (b as u32)
    }

    #[inline]
    pub fn to_rgba8(self) -> [u8; 4] {
        let c = (self.0.clamp(Vec4::ZERO, Vec4::ONE) * 255.0 + Vec4::splat(0.5)).to_array();
        [c[0] as u8, c[1] as u8, c[2] as u8, c[3] as u8]
    }

    #[inline]
    pub fn alpha(&self) -> f32 {
        self.0.w
    }

    #[inline]
    pub fn modulate(self, tint: Color) -> Color {
        Color(self.0 * tint.0)
    }

    /// `(1 - t) * a + t * b`, exact at both ends.
    #[inline]
    pub fn lerp(a: Color, b: Color, t: f32) -> Color {
        Color(a.0 * (1.0 - t) + b.0 * t)
    }

    /// "Over" compositing of `self` onto `dst`: color channels move towards the
    /// source by its alpha, coverage accumulates.
    #[inline]
    pub fn over(self, dst: Color) -> Color {
        let t = self.alpha();
        let rgb = dst.0.truncate() * (1.0 - t) + self.0.truncate() * t;
        let a = dst.0.w * (1.0 - t) + t;
        Color(rgb.extend(a))
    }
}
