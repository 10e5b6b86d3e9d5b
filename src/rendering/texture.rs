/// Textures with precomputed mip chains, and the registry that owns them.
///
/// The renderer never owns texture memory: primitives carry a `TextureHandle`
/// (index + generation) into a `TextureRegistry`, so reloading or removing a
/// texture invalidates old handles instead of leaving them dangling.
use super::geometry::Color;
use crate::error::{RenderError, Result};
use glam::Vec2;

/// Source pixel layouts. Only `Rgba8` is valid as a render target.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// One byte per pixel, sampled as white with the byte as alpha (glyph masks).
    R8,
    /// Four bytes per pixel in R, G, B, A order.
    Rgba8,
}

impl PixelFormat {
    #[inline]
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::R8 => 1,
            PixelFormat::Rgba8 => 4,
        }
    }
}

/// One level of a mip chain.
#[derive(Clone, Debug)]
pub struct MipLevel {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl MipLevel {
    #[inline]
    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }
}

#[derive(Clone, Debug)]
pub struct Texture {
    format: PixelFormat,
    levels: Vec<MipLevel>,
}

impl Texture {
    /// Create a texture from level-0 pixels and build its mip chain.
    pub fn new(width: usize, height: usize, format: PixelFormat, data: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidTexture("texture dimensions must be non-zero"));
        }
        if data.len() != level_len(width, height, format)? {
            return Err(RenderError::InvalidTexture("pixel data length does not match dimensions"));
        }

        let mut levels = vec![MipLevel { width, height, data }];
        loop {
            let last = &levels[levels.len() - 1];
            if last.width / 2 == 0 || last.height / 2 == 0 {
                break;
            }
            let next = downsample_box(last, format);
            levels.push(next);
        }

        Ok(Self { format, levels })
    }

    /// Create a texture from an already filtered mip chain (e.g. produced offline).
    /// Each level must halve both dimensions of the previous one and the chain must
    /// run until either dimension would reach zero.
    pub fn from_mip_levels(format: PixelFormat, levels: Vec<MipLevel>) -> Result<Self> {
        let Some(first) = levels.first() else {
            return Err(RenderError::InvalidTexture("mip chain is empty"));
        };
        if first.width == 0 || first.height == 0 {
            return Err(RenderError::InvalidTexture("texture dimensions must be non-zero"));
        }
        for level in &levels {
            if level.data.len() != level_len(level.width, level.height, format)? {
                return Err(RenderError::InvalidTexture("pixel data length does not match dimensions"));
            }
        }
        for pair in levels.windows(2) {
            if pair[1].width != pair[0].width / 2 || pair[1].height != pair[0].height / 2 {
                return Err(RenderError::InvalidTexture("mip level does not halve its parent"));
            }
        }
        let last = &levels[levels.len() - 1];
        if last.width / 2 != 0 && last.height / 2 != 0 {
            return Err(RenderError::InvalidTexture("mip chain is truncated"));
        }

        Ok(Self { format, levels })
    }

    /// Solid-color RGBA texture.
    pub fn solid(width: usize, height: usize, color: Color) -> Result<Self> {
        let texel = color.to_rgba8();
        let data = texel.repeat(width * height);
        Self::new(width, height, PixelFormat::Rgba8, data)
    }

    /// Two-color checkerboard with single-pixel cells.
    pub fn checkerboard(width: usize, height: usize, c1: Color, c2: Color) -> Result<Self> {
        let (t1, t2) = (c1.to_rgba8(), c2.to_rgba8());
        let mut data = Vec::with_capacity(width * height * 4);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(if (x + y) % 2 == 0 { &t1 } else { &t2 });
            }
        }
        Self::new(width, height, PixelFormat::Rgba8, data)
    }

    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.levels[0].width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.levels[0].height
    }

    #[inline]
    pub fn mip_levels(&self) -> &[MipLevel] {
        &self.levels
    }

    #[inline]
    pub fn mip_count(&self) -> usize {
        self.levels.len()
    }

    /// Fetch a single texel. Coordinates must be in range for the level.
    #[inline]
    pub fn texel(&self, level: usize, x: usize, y: usize) -> Color {
        let mip = &self.levels[level];
        let bpp = self.format.bytes_per_pixel();
        let offset = (y * mip.width + x) * bpp;
        match self.format {
            PixelFormat::R8 => {
                let v = mip.data[offset] as f32 / 255.0;
                Color::rgba(1.0, 1.0, 1.0, v)
            }
            PixelFormat::Rgba8 => {
                let p = &mip.data[offset..offset + 4];
                Color::from_rgba8(p[0], p[1], p[2], p[3])
            }
        }
    }

    /// Bilinear 4-tap sample at a normalized UV. Texel centers sit at
    /// `(i + 0.5) / size`; neighbours past the border clamp to the edge texel.
    pub fn sample_bilinear(&self, level: usize, uv: Vec2) -> Color {
        let mip = &self.levels[level];
        let tx = uv.x * mip.width as f32 - 0.5;
        let ty = uv.y * mip.height as f32 - 0.5;

        let fx0 = tx.floor();
        let fy0 = ty.floor();
        let fx = tx - fx0;
        let fy = ty - fy0;

        let max_x = (mip.width - 1) as i64;
        let max_y = (mip.height - 1) as i64;
        let x0 = (fx0 as i64).clamp(0, max_x) as usize;
        let y0 = (fy0 as i64).clamp(0, max_y) as usize;
        let x1 = (fx0 as i64 + 1).clamp(0, max_x) as usize;
        let y1 = (fy0 as i64 + 1).clamp(0, max_y) as usize;

        let top = Color::lerp(self.texel(level, x0, y0), self.texel(level, x1, y0), fx);
        let bottom = Color::lerp(self.texel(level, x0, y1), self.texel(level, x1, y1), fx);
        Color::lerp(top, bottom, fy)
    }
}

/// Byte length of a `width` × `height` level, or `InvalidTexture` if it
/// does not fit in `usize`.
fn level_len(width: usize, height: usize, format: PixelFormat) -> Result<usize> {
    width
        .checked_mul(height)
        .and_then(|pixels| pixels.checked_mul(format.bytes_per_pixel()))
        .ok_or(RenderError::InvalidTexture("texture dimensions overflow"))
}

/// 2×2 box filter into a level with half the dimensions (rounded down).
fn downsample_box(src: &MipLevel, format: PixelFormat) -> MipLevel {
    let width = src.width / 2;
    let height = src.height / 2;
    let bpp = format.bytes_per_pixel();
    let mut data = vec![0u8; width * height * bpp];

    for y in 0..height {
        for x in 0..width {
            for c in 0..bpp {
                let at = |sx: usize, sy: usize| src.data[(sy * src.width + sx) * bpp + c] as u32;
                let sum = at(2 * x, 2 * y)
                    + at(2 * x + 1, 2 * y)
                    + at(2 * x, 2 * y + 1)
                    + at(2 * x + 1, 2 * y + 1);
                data[(y * width + x) * bpp + c] = ((sum + 2) / 4) as u8;
            }
        }
    }

    MipLevel { width, height, data }
}

/// Stable reference to a texture in a `TextureRegistry`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TextureHandle {
    index: u32,
    generation: u32,
}

struct RegistryEntry {
    generation: u32,
    texture: Option<Texture>,
}

/// Owner of all textures. Handles stay valid until the texture is removed or
/// replaced; after that they resolve to `None`.
#[derive(Default)]
pub struct TextureRegistry {
    entries: Vec<RegistryEntry>,
    free: Vec<u32>,
}

impl TextureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, texture: Texture) -> TextureHandle {
        if let Some(index) = self.free.pop() {
            let entry = &mut self.entries[index as usize];
            entry.texture = Some(texture);
            return TextureHandle { index, generation: entry.generation };
        }
        let index = self.entries.len() as u32;
        self.entries.push(RegistryEntry { generation: 0, texture: Some(texture) });
        TextureHandle { index, generation: 0 }
    }

    #[inline]
    pub fn get(&self, handle: TextureHandle) -> Option<&Texture> {
        self.entries
            .get(handle.index as usize)
            .filter(|entry| entry.generation == handle.generation)
            .and_then(|entry| entry.texture.as_ref())
    }

    pub fn remove(&mut self, handle: TextureHandle) -> Option<Texture> {
        let entry = self.entries.get_mut(handle.index as usize)?;
        if entry.generation != handle.generation {
            return None;
        }
        let texture = entry.texture.take()?;
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push(handle.index);
        Some(texture)
    }

    /// Swap in a reloaded texture. The old handle goes stale; the returned one
    /// points at the new contents.
    pub fn replace(&mut self, handle: TextureHandle, texture: Texture) -> Option<TextureHandle> {
        let entry = self.entries.get_mut(handle.index as usize)?;
        if entry.generation != handle.generation || entry.texture.is_none() {
            return None;
        }
        entry.generation = entry.generation.wrapping_add(1);
        entry.texture = Some(texture);
        Some(TextureHandle { index: handle.index, generation: entry.generation })
    }

    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.texture.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
