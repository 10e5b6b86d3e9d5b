/// Per-frame primitive submission buffer and texture-slot table.
use super::geometry::{Color, Rect};
use super::texture::TextureHandle;
use crate::error::{RenderError, Result};
use crate::{count_add, count_call};
use glam::Vec2;

/// Index into the frame's texture-slot table.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TextureSlot(pub u32);

/// What a primitive paints inside its rectangle.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Paint {
    Fill,
    Textured {
        min_uv: Vec2,
        max_uv: Vec2,
        slot: TextureSlot,
    },
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Primitive {
    /// Position in the frame's submission order; breaks depth ties.
    pub index: u32,
    pub rect: Rect,
    /// Painter's-algorithm key: higher values draw on top.
    pub depth: f32,
    pub tint: Color,
    pub paint: Paint,
}

/// Fixed-capacity list of the frame's primitives plus the distinct textures
/// they reference.
pub struct PrimitiveBuffer {
    primitives: Vec<Primitive>,
    max_primitives: usize,
    texture_slots: Vec<TextureHandle>,
    max_texture_slots: usize,
}

impl PrimitiveBuffer {
    pub fn new(max_primitives: usize, max_texture_slots: usize) -> Self {
        Self {
            primitives: Vec::with_capacity(max_primitives),
            max_primitives,
            texture_slots: Vec::with_capacity(max_texture_slots),
            max_texture_slots,
        }
    }

    pub fn clear(&mut self) {
        self.primitives.clear();
        self.texture_slots.clear();
    }

    #[inline]
    pub fn primitives(&self) -> &[Primitive] {
        &self.primitives
    }

    #[inline]
    pub fn texture_slots(&self) -> &[TextureHandle] {
        &self.texture_slots
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.max_primitives
    }

    /// Append a primitive and return its submission index. For textured paint
    /// the texture is resolved to a slot, appending one on first use. Nothing
    /// is modified when an error is returned.
    pub fn push(
        &mut self,
        rect: Rect,
        depth: f32,
        tint: Color,
        texture: Option<(Vec2, Vec2, TextureHandle)>,
    ) -> Result<u32> {
        if !rect.is_finite() || !depth.is_finite() || rect.min.x > rect.max.x || rect.min.y > rect.max.y {
            return Err(RenderError::InvalidPrimitive);
        }
        if self.primitives.len() >= self.max_primitives {
            return Err(RenderError::PrimitiveCapacityExceeded { capacity: self.max_primitives });
        }

        let paint = match texture {
            None => Paint::Fill,
            Some((min_uv, max_uv, handle)) => {
                if !min_uv.is_finite() || !max_uv.is_finite() {
                    return Err(RenderError::InvalidPrimitive);
                }
                let slot = self.resolve_slot(handle)?;
                Paint::Textured { min_uv, max_uv, slot }
            }
        };

        let index = self.primitives.len() as u32;
        self.primitives.push(Primitive { index, rect, depth, tint, paint });
        count_call!(crate::perf::RENDER_COUNTERS.primitives_pushed);
        Ok(index)
    }

    /// Linear scan by identity; the table is small and rebuilt each frame.
    fn resolve_slot(&mut self, handle: TextureHandle) -> Result<TextureSlot> {
        if let Some(pos) = self.texture_slots.iter().position(|&h| h == handle) {
            return Ok(TextureSlot(pos as u32));
        }
        if self.texture_slots.len() >= self.max_texture_slots {
            return Err(RenderError::TextureSlotCapacityExceeded { capacity: self.max_texture_slots });
        }
        self.texture_slots.push(handle);
        count_add!(crate::perf::RENDER_COUNTERS.texture_slots_created, 1);
        Ok(TextureSlot((self.texture_slots.len() - 1) as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::texture::{Texture, TextureRegistry};

    fn rect(x0: f32, y0: f32, x1: f32, y1: f32) -> Rect {
        Rect::new(Vec2::new(x0, y0), Vec2::new(x1, y1))
    }

    #[test]
    fn test_submission_index_is_buffer_position() {
        let mut buf = PrimitiveBuffer::new(8, 2);
        for i in 0..5 {
            let idx = buf.push(rect(0.0, 0.0, 1.0, 1.0), 0.0, Color::RED, None).unwrap();
            assert_eq!(idx, i);
        }
        assert!(buf.primitives().iter().enumerate().all(|(i, p)| p.index as usize == i));
    }

    #[test]
    fn test_capacity_exceeded() {
        let mut buf = PrimitiveBuffer::new(2, 2);
        buf.push(rect(0.0, 0.0, 1.0, 1.0), 0.0, Color::RED, None).unwrap();
        buf.push(rect(0.0, 0.0, 1.0, 1.0), 0.0, Color::RED, None).unwrap();
        let err = buf.push(rect(0.0, 0.0, 1.0, 1.0), 0.0, Color::RED, None).unwrap_err();
        assert!(matches!(err, RenderError::PrimitiveCapacityExceeded { capacity: 2 }));
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn test_texture_slots_are_deduplicated() {
        let mut registry = TextureRegistry::new();
        let a = registry.insert(Texture::solid(2, 2, Color::WHITE).unwrap());
        let b = registry.insert(Texture::solid(2, 2, Color::BLACK).unwrap());

        let mut buf = PrimitiveBuffer::new(64, 4);
        for _ in 0..10 {
            buf.push(rect(0.0, 0.0, 1.0, 1.0), 0.0, Color::WHITE, Some((Vec2::ZERO, Vec2::ONE, a)))
                .unwrap();
        }
        assert_eq!(buf.texture_slots(), &[a]);

        buf.push(rect(0.0, 0.0, 1.0, 1.0), 0.0, Color::WHITE, Some((Vec2::ZERO, Vec2::ONE, b)))
            .unwrap();
        assert_eq!(buf.texture_slots(), &[a, b]);
        match buf.primitives()[10].paint {
            Paint::Textured { slot, .. } => assert_eq!(slot, TextureSlot(1)),
            Paint::Fill => panic!("expected textured paint"),
        }
    }

    #[test]
    fn test_slot_table_full_leaves_buffer_untouched() {
        let mut registry = TextureRegistry::new();
        let a = registry.insert(Texture::solid(1, 1, Color::WHITE).unwrap());
        let b = registry.insert(Texture::solid(1, 1, Color::WHITE).unwrap());

        let mut buf = PrimitiveBuffer::new(8, 1);
        buf.push(rect(0.0, 0.0, 1.0, 1.0), 0.0, Color::WHITE, Some((Vec2::ZERO, Vec2::ONE, a)))
            .unwrap();
        let err = buf
            .push(rect(0.0, 0.0, 1.0, 1.0), 0.0, Color::WHITE, Some((Vec2::ZERO, Vec2::ONE, b)))
            .unwrap_err();
        assert!(matches!(err, RenderError::TextureSlotCapacityExceeded { capacity: 1 }));
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn test_rejects_inverted_and_non_finite() {
        let mut buf = PrimitiveBuffer::new(8, 1);
        assert!(buf.push(rect(0.5, 0.0, 0.4, 1.0), 0.0, Color::RED, None).is_err());
        assert!(buf.push(rect(0.0, 0.0, f32::NAN, 1.0), 0.0, Color::RED, None).is_err());
        assert!(buf.push(rect(0.0, 0.0, 1.0, 1.0), f32::INFINITY, Color::RED, None).is_err());
        // Zero area is accepted, it just covers no pixels
        assert!(buf.push(rect(0.5, 0.5, 0.5, 0.5), 0.0, Color::RED, None).is_ok());
    }
}
