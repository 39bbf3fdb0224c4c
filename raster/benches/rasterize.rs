use std::time::Duration;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use glam::{Mat4, Vec3, Vec4};
use raster::math::{look_at, perspective, raster_matrix};
use raster::mesh::sphere;
use raster::{Renderer, RendererConfig, Texture2D};

const WIDTH: u32 = 640;
const HEIGHT: u32 = 480;

fn criterion_config() -> Criterion {
    Criterion::default()
        .warm_up_time(Duration::from_millis(500))
        .measurement_time(Duration::from_secs(3))
        .sample_size(30)
}

fn bench_sphere_frame(c: &mut Criterion) {
    let checker = Texture2D::checkerboard(256, 16, Vec4::ONE, Vec4::new(0.2, 0.2, 0.2, 1.0))
        .expect("checkerboard dimensions are valid");
    let mesh = sphere(1.0, 64, 32).with_texture(checker);

    let view = look_at(Vec3::new(0.0, 0.0, 2.5), Vec3::ZERO, Vec3::Y);
    let projection = perspective(1.0, WIDTH as f32 / HEIGHT as f32, 0.1, 20.0);

    let mut group = c.benchmark_group("sphere_frame");
    group.throughput(Throughput::Elements(mesh.triangle_count() as u64));
    for (msaa, hierarchical) in [(0, true), (0, false), (2, true), (4, true)] {
        let config = RendererConfig {
            msaa,
            hierarchical,
            ..Default::default()
        };
        let mut renderer = Renderer::new(WIDTH, HEIGHT, config).expect("renderer");
        let label = format!("{}x{}", 1 << msaa, if hierarchical { "" } else { "-flat" });
        group.bench_with_input(BenchmarkId::from_parameter(label), &mesh, |b, mesh| {
            let mut angle = 0.0f32;
            b.iter(|| {
                angle += 0.01;
                renderer.set_transform(view * Mat4::from_rotation_y(angle), projection, raster_matrix(WIDTH, HEIGHT));
                renderer.render_mesh(mesh).expect("valid mesh")
            });
        });
    }
    group.finish();
}

criterion_group! {
    name = benches;
    config = criterion_config();
    targets = bench_sphere_frame
}
criterion_main!(benches);
