/// Headless demo: renders an animated lawn scene in every dispatch mode,
/// logs frame timings and optionally writes the last frame as a PPM image.
///
/// Usage: `cluster_raster [frames] [output.ppm]`
use glam::Vec2;
use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;
use cluster_raster::perf::FrameStats;
use cluster_raster::rendering::MipLevel;
use cluster_raster::*;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Instant;

const WIDTH: usize = 960;
const HEIGHT: usize = 540;
const LAWN_COLUMNS: usize = 9;
const LAWN_ROWS: usize = 5;

struct SceneTextures {
    grass: TextureHandle,
    plant: TextureHandle,
    walker: TextureHandle,
    glyph: TextureHandle,
}

fn load_textures(registry: &mut TextureRegistry) -> Result<SceneTextures> {
    let light = Color::from_rgba8(96, 168, 64, 255);
    let dark = Color::from_rgba8(72, 140, 48, 255);
    let grass = registry.insert(Texture::checkerboard(64, 64, light, dark)?);

    // Round leafy sprite with a transparent border
    let size = 32;
    let mut data = Vec::with_capacity(size * size * 4);
    for y in 0..size {
        for x in 0..size {
            let d = Vec2::new(x as f32 + 0.5, y as f32 + 0.5) - Vec2::splat(size as f32 * 0.5);
            let inside = d.length() < size as f32 * 0.45;
            let rgba = if inside { [40, 200, 60, 255] } else { [0, 0, 0, 0] };
            data.extend_from_slice(&rgba);
        }
    }
    let plant = registry.insert(Texture::new(size, size, PixelFormat::Rgba8, data)?);

    // Hand-authored two-level chain: the coarse level is deliberately tinted
    // so mip transitions are visible in the output.
    let walker = registry.insert(Texture::from_mip_levels(
        PixelFormat::Rgba8,
        vec![
            MipLevel { width: 2, height: 2, data: [150u8, 150, 170, 255].repeat(4) },
            MipLevel { width: 1, height: 1, data: vec![120, 110, 160, 255] },
        ],
    )?);

    // Single-channel coverage mask, sampled as white with the byte as alpha
    let mask: Vec<u8> = (0..16 * 16).map(|i| if (i / 16 + i % 16) % 3 == 0 { 255 } else { 0 }).collect();
    let glyph = registry.insert(Texture::new(16, 16, PixelFormat::R8, mask)?);

    Ok(SceneTextures { grass, plant, walker, glyph })
}

fn build_frame(renderer: &mut Renderer, textures: &SceneTextures, frame: u32) -> Result<()> {
    renderer.begin_frame(WIDTH, HEIGHT)?;

    // Sky
    renderer.push_primitive(Vec2::ZERO, Vec2::ONE, 0.0, Color::rgba(0.45, 0.7, 0.95, 1.0))?;

    // Lawn tiles, all sharing one texture slot
    let lawn_min = Vec2::new(0.1, 0.2);
    let tile = Vec2::new(0.8 / LAWN_COLUMNS as f32, 0.75 / LAWN_ROWS as f32);
    for row in 0..LAWN_ROWS {
        for col in 0..LAWN_COLUMNS {
            let min = lawn_min + tile * Vec2::new(col as f32, row as f32);
            renderer.push_textured_primitive(
                min,
                min + tile,
                1.0,
                Color::WHITE,
                Vec2::ZERO,
                Vec2::ONE,
                textures.grass,
            )?;
        }
    }

    // Plants in the first three columns
    for row in 0..LAWN_ROWS {
        for col in 0..3 {
            let min = lawn_min + tile * Vec2::new(col as f32 + 0.1, row as f32 + 0.1);
            renderer.push_textured_primitive(
                min,
                min + tile * 0.8,
                2.0,
                Color::WHITE,
                Vec2::ZERO,
                Vec2::ONE,
                textures.plant,
            )?;
        }
    }

    // Walkers drift left; their size shrinks with the row to vary the mip level
    for row in 0..LAWN_ROWS {
        let phase = (frame as f32 * 0.004 + row as f32 * 0.13) % 0.7;
        let scale = 1.0 - row as f32 * 0.15;
        let min = Vec2::new(0.85 - phase, lawn_min.y + tile.y * row as f32);
        renderer.push_textured_primitive(
            min,
            min + Vec2::new(tile.x * 0.6, tile.y) * scale,
            2.0 + row as f32 * 0.01,
            Color::WHITE,
            Vec2::ZERO,
            Vec2::ONE,
            textures.walker,
        )?;
    }

    // Translucent HUD strip with a masked glyph pattern on top
    renderer.push_primitive(Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.12), 10.0, Color::rgba(0.0, 0.0, 0.0, 0.5))?;
    renderer.push_textured_primitive(
        Vec2::new(0.02, 0.02),
        Vec2::new(0.3, 0.1),
        11.0,
        Color::rgba(1.0, 0.9, 0.2, 1.0),
        Vec2::ZERO,
        Vec2::ONE,
        textures.glyph,
    )?;

    renderer.end_frame();
    Ok(())
}

fn write_ppm(path: &Path, framebuffer: &Framebuffer) -> std::io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    write!(out, "P6\n{} {}\n255\n", framebuffer.width, framebuffer.height)?;
    for &argb in framebuffer.color_buffer_slice() {
        out.write_all(&[(argb >> 16) as u8, (argb >> 8) as u8, argb as u8])?;
    }
    out.flush()
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let frames: u32 = match args.next() {
        Some(arg) => arg.parse()?,
        None => 120,
    };
    let output = args.next();

    let mut registry = TextureRegistry::new();
    let textures = load_textures(&mut registry)?;
    let mut renderer = Renderer::new(RendererConfig::default())?;
    let queue = TaskQueue::new(TaskQueueConfig::default())?;
    let mut framebuffer = Framebuffer::new(WIDTH, HEIGHT);

    log::info!(
        "rendering {} frames at {}x{}, {} clusters, {} queue workers",
        frames,
        WIDTH,
        HEIGHT,
        renderer.clusters().len(),
        queue.worker_count()
    );

    let modes: [(&str, Dispatch<'_>); 3] = [
        ("inline", Dispatch::Inline),
        ("task queue", Dispatch::TaskQueue(&queue)),
        ("rayon", Dispatch::Rayon),
    ];
    for (label, dispatch) in modes {
        RENDER_COUNTERS.reset();
        let mut stats = FrameStats::new();
        for frame in 0..frames {
            let submit_start = Instant::now();
            build_frame(&mut renderer, &textures, frame)?;
            let submit = submit_start.elapsed();

            let dispatch_start = Instant::now();
            framebuffer.clear(0xFF00_0000);
            renderer.dispatch_clusters(&mut framebuffer, &registry, dispatch)?;
            stats.record(submit, dispatch_start.elapsed());
        }
        stats.log_summary(label);
        if cfg!(feature = "profiling") {
            RENDER_COUNTERS.snapshot().log_report();
        }
    }

    if let Some(path) = output {
        write_ppm(Path::new(&path), &framebuffer)?;
        log::info!("wrote {path}");
    }
    Ok(())
}
