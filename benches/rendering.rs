/// Benchmark suite for the cluster rasterizer
/// Covers whole-frame dispatch in each mode plus the texture and binning hot paths.
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use cluster_raster::rendering::{partition, Cluster, PrimitiveBuffer, Rect};
use cluster_raster::*;
use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const WIDTH: usize = 1280;
const HEIGHT: usize = 720;

fn build_scene(renderer: &mut Renderer, registry: &TextureRegistry, handles: &[TextureHandle], seed: u64) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    renderer.begin_frame(WIDTH, HEIGHT).unwrap();
    renderer.push_primitive(Vec2::ZERO, Vec2::ONE, 0.0, Color::BLACK).unwrap();
    for _ in 0..200 {
        let min = Vec2::new(rng.gen_range(0.0..0.9), rng.gen_range(0.0..0.9));
        let size = Vec2::new(rng.gen_range(0.02..0.1), rng.gen_range(0.02..0.1));
        let depth = rng.gen_range(1..8) as f32;
        let handle = handles[rng.gen_range(0..handles.len())];
        debug_assert!(registry.get(handle).is_some());
        renderer
            .push_textured_primitive(min, min + size, depth, Color::WHITE, Vec2::ZERO, Vec2::ONE, handle)
            .unwrap();
    }
    renderer.end_frame();
}

fn bench_dispatch_modes(c: &mut Criterion) {
    let mut registry = TextureRegistry::new();
    let handles: Vec<TextureHandle> = [16, 64, 256]
        .iter()
        .map(|&s| registry.insert(Texture::checkerboard(s, s, Color::RED, Color::WHITE).unwrap()))
        .collect();
    let queue = TaskQueue::new(TaskQueueConfig::default()).unwrap();
    let mut framebuffer = Framebuffer::new(WIDTH, HEIGHT);

    let mut group = c.benchmark_group("dispatch_clusters");
    for cluster_count in [1, 8, 16] {
        let mut renderer = Renderer::new(RendererConfig {
            cluster_count,
            max_cluster_primitives: 256,
            ..Default::default()
        })
        .unwrap();
        build_scene(&mut renderer, &registry, &handles, 7);

        for (label, dispatch) in [
            ("inline", Dispatch::Inline),
            ("task_queue", Dispatch::TaskQueue(&queue)),
            ("rayon", Dispatch::Rayon),
        ] {
            group.bench_with_input(BenchmarkId::new(label, cluster_count), &dispatch, |b, &dispatch| {
                b.iter(|| {
                    renderer
                        .dispatch_clusters(black_box(&mut framebuffer), &registry, dispatch)
                        .unwrap();
                });
            });
        }
    }
    group.finish();
}

fn bench_mip_chain_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("mip_chain_build");
    for size in [64usize, 256, 1024] {
        let data = vec![0x7Fu8; size * size * 4];
        group.bench_with_input(BenchmarkId::from_parameter(size), &data, |b, data| {
            b.iter(|| Texture::new(size, size, PixelFormat::Rgba8, black_box(data.clone())).unwrap());
        });
    }
    group.finish();
}

fn bench_bilinear_sample(c: &mut Criterion) {
    let texture = Texture::checkerboard(256, 256, Color::RED, Color::BLUE).unwrap();
    c.bench_function("sample_bilinear", |b| {
        let mut u = 0.0f32;
        b.iter(|| {
            u = (u + 0.0137) % 1.0;
            black_box(texture.sample_bilinear(0, Vec2::new(u, 1.0 - u)))
        });
    });
}

fn bench_cluster_binning(c: &mut Criterion) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let mut buffer = PrimitiveBuffer::new(1024, 1);
    for _ in 0..1024 {
        let min = Vec2::new(rng.gen_range(0.0..0.95), rng.gen_range(0.0..0.95));
        let rect = Rect::new(min, min + Vec2::splat(0.05));
        buffer.push(rect, rng.gen_range(0..4) as f32, Color::WHITE, None).unwrap();
    }
    let regions = partition(WIDTH, HEIGHT, 4, 4);

    c.bench_function("bin_1024_into_16_clusters", |b| {
        let mut clusters: Vec<Cluster> = (0..16).map(|id| Cluster::new(id, 1024)).collect();
        b.iter(|| {
            for (cluster, region) in clusters.iter_mut().zip(&regions) {
                cluster.reset(*region);
                cluster.bin(black_box(buffer.primitives()), WIDTH, HEIGHT).unwrap();
            }
        });
    });
}

criterion_group!(
    benches,
    bench_dispatch_modes,
    bench_mip_chain_build,
    bench_bilinear_sample,
    bench_cluster_binning
);
criterion_main!(benches);
