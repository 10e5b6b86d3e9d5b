//! Differential fuzzing: a multi-cluster frame must match a single-cluster
//! oracle bit for bit, in every dispatch mode.
use cluster_raster::*;
use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const SEEDS: u64 = 24;
const PRIMITIVES_PER_FRAME: usize = 60;

struct Scene {
    registry: TextureRegistry,
    handles: Vec<TextureHandle>,
}

fn scene() -> Scene {
    let mut registry = TextureRegistry::new();
    let handles = vec![
        registry.insert(Texture::checkerboard(16, 16, Color::RED, Color::BLUE).unwrap()),
        registry.insert(Texture::checkerboard(5, 9, Color::WHITE, Color::rgba(0.0, 1.0, 0.0, 0.3)).unwrap()),
        registry.insert(
            Texture::new(8, 8, PixelFormat::R8, (0..64).map(|i| (i * 4) as u8).collect()).unwrap(),
        ),
    ];
    Scene { registry, handles }
}

fn random_frame(renderer: &mut Renderer, scene: &Scene, rng: &mut ChaCha8Rng, width: usize, height: usize) {
    renderer.begin_frame(width, height).unwrap();
    for _ in 0..PRIMITIVES_PER_FRAME {
        // Extend past the viewport to exercise clipping
        let a = Vec2::new(rng.gen_range(-0.2..1.2), rng.gen_range(-0.2..1.2));
        let b = Vec2::new(rng.gen_range(-0.2..1.2), rng.gen_range(-0.2..1.2));
        let (min, max) = (a.min(b), a.max(b));
        // Few distinct depths so ties are common
        let depth = rng.gen_range(0..3) as f32;
        let tint = Color::rgba(rng.gen(), rng.gen(), rng.gen(), rng.gen_range(0.2..1.0));

        if rng.gen_bool(0.5) {
            let handle = scene.handles[rng.gen_range(0..scene.handles.len())];
            let uv_a = Vec2::new(rng.gen_range(0.0..1.0), rng.gen_range(0.0..1.0));
            let uv_b = Vec2::new(rng.gen_range(0.0..1.0), rng.gen_range(0.0..1.0));
            renderer
                .push_textured_primitive(min, max, depth, tint, uv_a, uv_b, handle)
                .unwrap();
        } else {
            renderer.push_primitive(min, max, depth, tint).unwrap();
        }
    }
    renderer.end_frame();
}

fn render(
    cluster_count: usize,
    seed: u64,
    width: usize,
    height: usize,
    scene: &Scene,
    dispatch: Dispatch<'_>,
) -> Vec<u32> {
    let mut renderer = Renderer::new(RendererConfig {
        cluster_count,
        max_cluster_primitives: PRIMITIVES_PER_FRAME,
        ..Default::default()
    })
    .unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    random_frame(&mut renderer, scene, &mut rng, width, height);

    let mut fb = Framebuffer::new(width, height);
    fb.clear(0xFF20_2020);
    renderer.dispatch_clusters(&mut fb, &scene.registry, dispatch).unwrap();
    fb.color_buffer
}

fn first_difference(a: &[u32], b: &[u32], width: usize) -> Option<(usize, usize, u32, u32)> {
    a.iter()
        .zip(b)
        .position(|(x, y)| x != y)
        .map(|i| (i % width, i / width, a[i], b[i]))
}

#[test]
fn test_cluster_count_does_not_change_output() {
    let scene = scene();
    let queue = TaskQueue::new(TaskQueueConfig {
        thread_count: Some(3),
        ..Default::default()
    })
    .unwrap();

    for seed in 0..SEEDS {
        let mut rng = ChaCha8Rng::seed_from_u64(seed ^ 0x5eed);
        // Odd sizes so regions get remainder pixels
        let width = rng.gen_range(7..97);
        let height = rng.gen_range(7..71);
        let oracle = render(1, seed, width, height, &scene, Dispatch::Inline);

        for count in [2, 8, 16] {
            for (label, dispatch) in [
                ("inline", Dispatch::Inline),
                ("task queue", Dispatch::TaskQueue(&queue)),
                ("rayon", Dispatch::Rayon),
            ] {
                let output = render(count, seed, width, height, &scene, dispatch);
                if let Some((x, y, expected, actual)) = first_difference(&oracle, &output, width) {
                    panic!(
                        "seed {seed}, {width}x{height}, {count} clusters ({label}): \
                         pixel ({x}, {y}) is {actual:#010x}, oracle {expected:#010x}"
                    );
                }
            }
        }
    }
}

#[test]
fn test_primitive_straddling_cluster_seams() {
    let scene = scene();
    let width = 101;
    let height = 67;
    let build = |count: usize| {
        let mut renderer = Renderer::new(RendererConfig { cluster_count: count, ..Default::default() }).unwrap();
        renderer.begin_frame(width, height).unwrap();
        // Edges at fractional pixel positions, centred on the grid seams
        renderer
            .push_textured_primitive(
                Vec2::new(0.333, 0.271),
                Vec2::new(0.667, 0.729),
                0.0,
                Color::WHITE,
                Vec2::ZERO,
                Vec2::ONE,
                scene.handles[0],
            )
            .unwrap();
        renderer
            .push_primitive(Vec2::new(0.49, 0.0), Vec2::new(0.51, 1.0), 1.0, Color::rgba(1.0, 1.0, 0.0, 0.5))
            .unwrap();
        let mut fb = Framebuffer::new(width, height);
        renderer.dispatch_clusters(&mut fb, &scene.registry, Dispatch::Inline).unwrap();
        fb.color_buffer
    };

    let oracle = build(1);
    for count in 2..=16 {
        assert_eq!(first_difference(&oracle, &build(count), width), None, "{count} clusters");
    }
}
