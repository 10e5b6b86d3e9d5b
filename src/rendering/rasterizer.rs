/// Pixel-level compositing of axis-aligned primitives into a cluster region.
///
/// Both paths share one coverage rule: pixel `P` is covered on an axis iff its
/// center `P + 0.5` lies in `[min, max)` of the primitive's pixel-space extent.
/// Spans are computed from the unclipped primitive and then intersected with
/// the cluster's integer region, so adjacent clusters (and adjacent primitives
/// sharing an edge) never leave a gap or cover a pixel twice.
use super::framebuffer::FrameRegion;
use super::geometry::{Color, PixelRect, Rect};
use super::primitive::{Paint, Primitive};
use super::texture::Texture;
use crate::count_add;
use glam::Vec2;

/// Keeps the pixel-center to UV mapping inside the texture near clipped edges.
pub const UV_EDGE_EPSILON: f32 = 1.0e-5;

/// Half-open integer pixel range `[start, end)` on one axis.
#[inline]
pub fn sample_span(min_sample: f32, max_sample: f32) -> (i64, i64) {
    let start = (min_sample - 0.5).ceil() as i64;
    let end = (max_sample - 0.5).ceil() as i64;
    (start, end.max(start))
}

/// Pixels covered by `rect` (normalized) in a viewport, restricted to `clip`.
pub fn covered_pixels(rect: &Rect, viewport: Vec2, clip: PixelRect) -> PixelRect {
    let px = rect.to_pixels(viewport);
    let (x0, x1) = sample_span(px.min.x, px.max.x);
    let (y0, y1) = sample_span(px.min.y, px.max.y);

    let x0 = x0.max(clip.x as i64);
    let y0 = y0.max(clip.y as i64);
    let x1 = x1.min(clip.x1() as i64);
    let y1 = y1.min(clip.y1() as i64);
    if x0 >= x1 || y0 >= y1 {
        return PixelRect::new(clip.x, clip.y, 0, 0);
    }
    PixelRect::new(x0 as usize, y0 as usize, (x1 - x0) as usize, (y1 - y0) as usize)
}

/// Result of per-primitive level-of-detail selection.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MipSelection {
    /// Primary level to sample.
    pub level: usize,
    /// Weight of level `level - 1`, in `(0, 1)`. `None` samples one level only.
    pub finer_weight: Option<f32>,
}

/// Pick the mip level(s) for a primitive.
///
/// `pixel_footprint` is the primitive's unclipped on-screen size in pixels,
/// `uv_extent` the size of its UV rectangle, `level_sizes` the texel
/// dimensions of each mip level (level 0 first).
pub fn select_mip(
    pixel_footprint: Vec2,
    uv_extent: Vec2,
    level_sizes: impl IntoIterator<Item = Vec2>,
) -> MipSelection {
    let uv_extent = uv_extent.abs();

    let mut finer = None;
    let mut coarsest = 0;
    for (level, size) in level_sizes.into_iter().enumerate() {
        let footprint = uv_extent * size;
        if footprint.cmple(pixel_footprint).all() {
            return match finer {
                Some(fine) => blend_with_finer(level, pixel_footprint, footprint, fine),
                None => MipSelection { level, finer_weight: None },
            };
        }
        finer = Some(footprint);
        coarsest = level;
    }

    MipSelection { level: coarsest, finer_weight: None }
}

/// `coarse` fits inside `pixel_footprint`, `fine` (one level up) does not.
fn blend_with_finer(level: usize, pixel_footprint: Vec2, coarse: Vec2, fine: Vec2) -> MipSelection {
    let axis_weight = |p: f32, c: f32, f: f32| -> Option<f32> {
        // Only axes where the finer level overshoots the footprint straddle.
        (f > p).then(|| ((p - c) / (f - c)).clamp(0.0, 1.0))
    };
    let wx = axis_weight(pixel_footprint.x, coarse.x, fine.x);
    let wy = axis_weight(pixel_footprint.y, coarse.y, fine.y);
    let weight = match (wx, wy) {
        (Some(x), Some(y)) => (x + y) * 0.5,
        (Some(x), None) => x,
        (None, Some(y)) => y,
        (None, None) => 0.0,
    };

    MipSelection {
        level,
        finer_weight: (weight > 0.0).then_some(weight),
    }
}

/// Position of `pixel`'s center along a primitive spanning `min..min + extent`,
/// kept strictly below 1 so the far edge never samples past the UV rectangle.
#[inline]
pub fn edge_fraction(pixel: usize, min: f32, extent: f32) -> f32 {
    ((pixel as f32 + 0.5 - min) / extent).clamp(0.0, 1.0 - UV_EDGE_EPSILON)
}

/// Draws one cluster's sorted primitives into its framebuffer region.
pub struct ClusterRasterizer<'a> {
    viewport: Vec2,
    textures: &'a [&'a Texture],
}

impl<'a> ClusterRasterizer<'a> {
    pub fn new(viewport_width: usize, viewport_height: usize, textures: &'a [&'a Texture]) -> Self {
        Self {
            viewport: Vec2::new(viewport_width as f32, viewport_height as f32),
            textures,
        }
    }

    pub fn draw(&self, primitive: &Primitive, region: &mut FrameRegion<'_>) {
        match primitive.paint {
            Paint::Fill => self.draw_filled(primitive, region),
            Paint::Textured { min_uv, max_uv, slot } => {
                let texture = self.textures[slot.0 as usize];
                self.draw_textured(primitive, min_uv, max_uv, texture, region);
            }
        }
    }

    fn draw_filled(&self, primitive: &Primitive, region: &mut FrameRegion<'_>) {
        let area = covered_pixels(&primitive.rect, self.viewport, region.rect());
        if area.is_empty() {
            return;
        }

        let x_offset = area.x - region.rect().x;
        for y in area.y..area.y1() {
            let row = &mut region.row_mut(y)[x_offset..x_offset + area.width];
            for pixel in row {
                *pixel = primitive.tint.over(Color::from_argb32(*pixel)).to_argb32();
            }
        }
        count_add!(crate::perf::RENDER_COUNTERS.fill_pixels, area.area() as u64);
    }

    fn draw_textured(
        &self,
        primitive: &Primitive,
        min_uv: Vec2,
        max_uv: Vec2,
        texture: &Texture,
        region: &mut FrameRegion<'_>,
    ) {
        let area = covered_pixels(&primitive.rect, self.viewport, region.rect());
        if area.is_empty() {
            return;
        }

        // Geometry of the whole primitive, independent of clipping, so UVs
        // agree across cluster boundaries.
        let geometry = primitive.rect.to_pixels(self.viewport);
        let extent = geometry.size();

        let level_sizes = texture.mip_levels().iter().map(|m| m.size());
        let selection = select_mip(extent, max_uv - min_uv, level_sizes);
        if selection.finer_weight.is_some() {
            count_add!(crate::perf::RENDER_COUNTERS.mip_blends, 1);
        }

        let x_offset = area.x - region.rect().x;
        for y in area.y..area.y1() {
            let ty = edge_fraction(y, geometry.min.y, extent.y);
            let v = min_uv.y * (1.0 - ty) + max_uv.y * ty;

            let row = &mut region.row_mut(y)[x_offset..x_offset + area.width];
            for (i, pixel) in row.iter_mut().enumerate() {
                let x = area.x + i;
                let tx = edge_fraction(x, geometry.min.x, extent.x);
                let u = min_uv.x * (1.0 - tx) + max_uv.x * tx;
                let uv = Vec2::new(u, v);

                let mut sample = texture.sample_bilinear(selection.level, uv);
                if let Some(weight) = selection.finer_weight {
                    let finer = texture.sample_bilinear(selection.level - 1, uv);
                    sample = Color::lerp(sample, finer, weight);
                }

                let src = sample.modulate(primitive.tint);
                *pixel = src.over(Color::from_argb32(*pixel)).to_argb32();
            }
        }
        count_add!(crate::perf::RENDER_COUNTERS.textured_pixels, area.area() as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sizes(dims: &[(f32, f32)]) -> Vec<Vec2> {
        dims.iter().map(|&(w, h)| Vec2::new(w, h)).collect()
    }

    #[test]
    fn test_sample_span_pixel_centers() {
        // [10.1, 10.9) contains the center 10.5
        assert_eq!(sample_span(10.1, 10.9), (10, 11));
        // [10.0, 11.0) covers exactly pixel 10
        assert_eq!(sample_span(10.0, 11.0), (10, 11));
        // [10.0, 10.4) misses every center
        let (s, e) = sample_span(10.0, 10.4);
        assert_eq!(s, e);
        // A max landing on a center excludes it
        assert_eq!(sample_span(9.0, 10.5), (9, 10));
        // A min landing on a center includes it
        assert_eq!(sample_span(10.5, 12.0), (10, 12));
    }

    #[test]
    fn test_adjacent_spans_share_no_pixels() {
        for split in [0.3f32, 10.5, 33.33, 64.0, 99.999] {
            let (a0, a1) = sample_span(0.0, split);
            let (b0, b1) = sample_span(split, 128.0);
            assert_eq!(a1, b0, "gap or overlap at {split}");
            assert_eq!(a0, 0);
            assert_eq!(b1, 128);
        }
    }

    #[test]
    fn test_covered_pixels_clips_to_region() {
        let rect = Rect::new(Vec2::ZERO, Vec2::splat(0.5));
        let area = covered_pixels(&rect, Vec2::new(100.0, 100.0), PixelRect::new(25, 25, 50, 50));
        assert_eq!(area, PixelRect::new(25, 25, 25, 25));

        let outside = covered_pixels(&rect, Vec2::new(100.0, 100.0), PixelRect::new(50, 0, 50, 50));
        assert!(outside.is_empty());
    }

    #[test]
    fn test_one_to_one_density_picks_level_zero() {
        let levels = sizes(&[(4.0, 4.0), (2.0, 2.0), (1.0, 1.0)]);
        let sel = select_mip(Vec2::new(4.0, 4.0), Vec2::ONE, levels.iter().copied());
        assert_eq!(sel, MipSelection { level: 0, finer_weight: None });

        // Magnification stays on level 0 as well
        let sel = select_mip(Vec2::new(64.0, 64.0), Vec2::ONE, levels.iter().copied());
        assert_eq!(sel, MipSelection { level: 0, finer_weight: None });
    }

    #[test]
    fn test_exact_level_footprint_does_not_blend() {
        let levels = sizes(&[(4.0, 4.0), (2.0, 2.0), (1.0, 1.0)]);
        let sel = select_mip(Vec2::new(2.0, 2.0), Vec2::ONE, levels.iter().copied());
        assert_eq!(sel, MipSelection { level: 1, finer_weight: None });
    }

    #[test]
    fn test_midpoint_between_levels_blends_half() {
        let levels = sizes(&[(4.0, 4.0), (2.0, 2.0), (1.0, 1.0)]);
        let sel = select_mip(Vec2::new(3.0, 3.0), Vec2::ONE, levels.iter().copied());
        assert_eq!(sel.level, 1);
        assert_eq!(sel.finer_weight, Some(0.5));
    }

    #[test]
    fn test_single_straddling_axis_is_used_alone() {
        let levels = sizes(&[(8.0, 8.0), (4.0, 4.0), (2.0, 2.0), (1.0, 1.0)]);
        // X: level 1 fits (4 <= 6) and level 0 overshoots (8 > 6) -> 0.5
        // Y: level 0 already fits (8 <= 16), so Y does not straddle
        let sel = select_mip(Vec2::new(6.0, 16.0), Vec2::ONE, levels.iter().copied());
        assert_eq!(sel.level, 1);
        assert_eq!(sel.finer_weight, Some(0.5));
    }

    #[test]
    fn test_both_axes_straddling_are_averaged() {
        let levels = sizes(&[(8.0, 8.0), (4.0, 4.0), (2.0, 2.0), (1.0, 1.0)]);
        // X weight (5-4)/(8-4) = 0.25, Y weight (7-4)/(8-4) = 0.75
        let sel = select_mip(Vec2::new(5.0, 7.0), Vec2::ONE, levels.iter().copied());
        assert_eq!(sel.level, 1);
        assert_eq!(sel.finer_weight, Some(0.5));
    }

    #[test]
    fn test_clamps_to_coarsest_level() {
        let levels = sizes(&[(4.0, 4.0), (2.0, 2.0), (1.0, 1.0)]);
        let sel = select_mip(Vec2::new(0.5, 0.5), Vec2::ONE, levels.iter().copied());
        assert_eq!(sel, MipSelection { level: 2, finer_weight: None });
    }

    #[test]
    fn test_partial_uv_range_scales_texel_footprint() {
        let levels = sizes(&[(8.0, 8.0), (4.0, 4.0), (2.0, 2.0), (1.0, 1.0)]);
        // Half of an 8x8 texture is 4 texels: 1:1 at 4 pixels
        let sel = select_mip(Vec2::new(4.0, 4.0), Vec2::splat(0.5), levels.iter().copied());
        assert_eq!(sel, MipSelection { level: 0, finer_weight: None });
        // Flipped UVs measure the same footprint
        let sel = select_mip(Vec2::new(4.0, 4.0), Vec2::splat(-0.5), levels.iter().copied());
        assert_eq!(sel, MipSelection { level: 0, finer_weight: None });
    }

    #[test]
    fn test_empty_chain_selects_level_zero() {
        let sel = select_mip(Vec2::splat(4.0), Vec2::ONE, std::iter::empty());
        assert_eq!(sel, MipSelection { level: 0, finer_weight: None });
    }

    /// One ulp past the center of pixel 3, so pixel 3 is the last one covered.
    fn just_past_center_of_pixel_3() -> f32 {
        f32::from_bits(3.5f32.to_bits() + 1)
    }

    #[test]
    fn test_edge_fraction_stays_below_one() {
        // Starting far off-screen, 8.5 / 8.5000002 rounds to exactly 1.0
        let (min, max) = (-5.0f32, just_past_center_of_pixel_3());
        assert_eq!((3.0 + 0.5 - min) / (max - min), 1.0);
        assert!(edge_fraction(3, min, max - min) < 1.0);

        for extent in [1.0f32, 3.0, 7.25, 100.0, 4096.0] {
            let (start, end) = sample_span(0.0, extent);
            for pixel in start..end {
                let t = edge_fraction(pixel as usize, 0.0, extent);
                assert!((0.0..1.0).contains(&t), "pixel {pixel} of {extent}: {t}");
            }
        }
    }

    fn black_white_texture() -> Texture {
        let data = vec![0, 0, 0, 255, 255, 255, 255, 255];
        Texture::new(2, 1, crate::rendering::PixelFormat::Rgba8, data).unwrap()
    }

    fn draw_edge_case(min_uv: Vec2, max_uv: Vec2, splits: &[PixelRect]) -> Vec<u32> {
        let texture = black_white_texture();
        let textures = [&texture];
        let raster = ClusterRasterizer::new(8, 1, &textures);
        // Normalized by a power of two so the pixel edges are exact
        let primitive = Primitive {
            index: 0,
            rect: Rect::new(Vec2::new(-5.0 / 8.0, 0.0), Vec2::new(just_past_center_of_pixel_3() / 8.0, 1.0)),
            depth: 0.0,
            tint: Color::WHITE,
            paint: Paint::Textured { min_uv, max_uv, slot: crate::rendering::TextureSlot(0) },
        };

        let mut fb = crate::rendering::Framebuffer::new(8, 1);
        for region in fb.split_into_regions(splits).iter_mut() {
            raster.draw(&primitive, region);
        }
        fb.color_buffer_slice().to_vec()
    }

    #[test]
    fn test_far_edge_samples_inside_uv_rect() {
        let whole = [PixelRect::new(0, 0, 8, 1)];
        let pixels = draw_edge_case(Vec2::ZERO, Vec2::ONE, &whole);
        assert_eq!(pixels[3], Color::WHITE.to_argb32());
        assert_eq!(pixels[4], 0, "pixel 4 center lies past the primitive");

        // Flipped UVs put the far edge on texel 0
        let flipped = draw_edge_case(Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0), &whole);
        assert_eq!(flipped[3], Color::BLACK.to_argb32());
        assert_eq!(flipped[4], 0);

        // Clusters meeting at the far edge pixel draw the same thing
        let split = [PixelRect::new(0, 0, 3, 1), PixelRect::new(3, 0, 5, 1)];
        assert_eq!(draw_edge_case(Vec2::ZERO, Vec2::ONE, &split), pixels);
        assert_eq!(draw_edge_case(Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0), &split), flipped);
    }
}
