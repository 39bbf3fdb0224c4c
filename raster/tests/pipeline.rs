use glam::{IVec2, Mat4, Vec2, Vec3};
use pretty_assertions::assert_eq;
use raster::framebuffer::sample_offset;
use raster::math::{look_at, perspective, raster_matrix};
use raster::mesh::{plane, sphere};
use raster::{Mesh, MeshVertex, RenderError, Renderer, RendererConfig, TextureFilter};

/// Maps object units to pixels of an 8x8 buffer, z unchanged
fn pixel_space_8x8() -> Mat4 {
    Mat4::from_translation(Vec3::new(-1.0, -1.0, 0.0)) * Mat4::from_scale(Vec3::new(0.25, 0.25, 1.0))
}

fn corner_triangle() -> Mesh {
    let vertices = [(0.0, 0.0), (4.0, 0.0), (0.0, 4.0)]
        .map(|(x, y)| MeshVertex::new(Vec3::new(x, y, 0.5), Vec3::Z, Vec2::ZERO))
        .to_vec();
    Mesh::new(vertices, vec![0, 1, 2])
}

fn covered(renderer: &Renderer, width: i32, height: i32) -> Vec<(i32, i32)> {
    let fb = renderer.frame_buffer();
    (0..height)
        .flat_map(|y| (0..width).map(move |x| (x, y)))
        .filter(|&(x, y)| fb.pixel(x, y) != [0; 4])
        .collect()
}

fn corner_renderer(msaa: u32) -> Renderer {
    let config = RendererConfig {
        msaa,
        ..Default::default()
    };
    let mut renderer = Renderer::new(8, 8, config).unwrap();
    renderer.set_transform(pixel_space_8x8(), Mat4::IDENTITY, raster_matrix(8, 8));
    renderer.set_light_dir(Vec3::Z);
    renderer
}

fn sphere_scene(renderer: &mut Renderer, width: u32, height: u32, angle: f32) {
    let view = look_at(Vec3::new(0.0, 0.5, 3.0), Vec3::ZERO, Vec3::Y) * Mat4::from_rotation_y(angle);
    let projection = perspective(1.0, width as f32 / height as f32, 0.1, 20.0);
    renderer.set_transform(view, projection, raster_matrix(width, height));
}

#[test]
fn corner_triangle_covers_lower_left_pixels() {
    let mut renderer = corner_renderer(0);
    let stats = renderer.render_mesh(&corner_triangle()).unwrap();
    assert_eq!(stats.rasterized, 1);

    let expected: Vec<(i32, i32)> = (0..8)
        .flat_map(|y| (0..8).map(move |x| (x, y)))
        .filter(|(x, y)| x + y < 4)
        .collect();
    assert_eq!(covered(&renderer, 8, 8), expected);
    assert_eq!(expected.len(), 10);

    // (1 + ambient) * 2 / pi, lit head on with no texture bound
    assert_eq!(renderer.frame_buffer().pixel(1, 1), [195, 195, 195, 255]);

    // Raster row 0 is the last image row
    let image = renderer.back_buffer();
    assert_eq!(&image[7 * 8 * 4..7 * 8 * 4 + 4], &[195, 195, 195, 255]);
    assert_eq!(&image[0..4], &[0, 0, 0, 0]);
}

#[test]
fn multisampling_blends_edges_only() {
    let mut renderer = corner_renderer(2);
    renderer.render_mesh(&corner_triangle()).unwrap();
    let fb = renderer.frame_buffer();

    assert_eq!(fb.pixel(0, 0), [195, 195, 195, 255]);
    for y in 0..8 {
        for x in 0..8 {
            if x + y >= 5 {
                assert_eq!(fb.pixel(x, y), [0; 4], "pixel ({x}, {y})");
            }
        }
    }
    // Pixels straddling the hypotenuse resolve to partial coverage
    let edge = fb.pixel(3, 0);
    assert!(edge[0] > 0 && edge[0] < 195);
}

#[test]
fn thirty_two_samples_resolve_edge_pixels() {
    let mut renderer = corner_renderer(5);
    renderer.render_mesh(&corner_triangle()).unwrap();
    let fb = renderer.frame_buffer();
    let msaa = fb.msaa();
    assert_eq!(msaa.samples(), 32);

    let offsets: Vec<IVec2> = (0..32).map(|s| sample_offset(msaa, s)).collect();
    let resolved = |covered: usize| {
        let n = covered as u32;
        let gray = ((195 * n + 16) / 32) as u8;
        [gray, gray, gray, ((255 * n + 16) / 32) as u8]
    };

    assert_eq!(fb.pixel(1, 1), [195, 195, 195, 255]);

    // The hypotenuse passes through the center of pixel (3, 0) and owns its samples
    let hypotenuse = offsets.iter().filter(|o| o.x + o.y <= 0).count();
    assert!(hypotenuse > 0 && hypotenuse < 32);
    assert_eq!(fb.pixel(3, 0), resolved(hypotenuse));

    // Samples on the left border at x = 0 are not owned by the triangle
    let left = offsets.iter().filter(|o| o.x > -8).count();
    assert!(left < 32);
    assert_eq!(fb.pixel(0, 0), resolved(left));

    // Pixel (1, 1) is lane 3, so sample 31 lands on bit 127 of the coverage mask
    for s in 0..32 {
        assert_eq!(fb.sample_color(1, 1, s), u32::from_ne_bytes([195, 195, 195, 255]));
    }
}

#[test]
fn back_faces_are_culled_unless_disabled() {
    let mut renderer = corner_renderer(0);
    let mut mesh = corner_triangle();
    mesh.indices = vec![0, 2, 1];

    let stats = renderer.render_mesh(&mesh).unwrap();
    assert_eq!((stats.rasterized, stats.culled), (0, 1));
    assert!(covered(&renderer, 8, 8).is_empty());

    renderer.set_back_face_cull(false);
    let stats = renderer.render_mesh(&mesh).unwrap();
    assert_eq!(stats.rasterized, 1);
    assert_eq!(covered(&renderer, 8, 8).len(), 10);
}

#[test]
fn ground_plane_is_clipped_at_the_eye() {
    let (width, height) = (64, 48);
    let mut renderer = Renderer::new(width, height, RendererConfig::default()).unwrap();
    let view = look_at(Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, 1.0, -1.0), Vec3::Y);
    let projection = perspective(1.2, width as f32 / height as f32, 0.1, 40.0);
    renderer.set_transform(view, projection, raster_matrix(width, height));

    let stats = renderer.render_mesh(&plane(100.0, 1)).unwrap();
    assert_eq!(stats.triangles, 2);
    assert!(stats.clipped >= 2);
    assert!(stats.fragments > 0);

    let fb = renderer.frame_buffer();
    // Ground below the horizon, nothing above it
    assert_ne!(fb.pixel(32, 2), [0; 4]);
    assert_eq!(fb.pixel(32, 45), [0; 4]);
}

#[test]
fn guard_band_drops_unclipped_giant_triangles() {
    let mut renderer = Renderer::new(32, 32, RendererConfig::default()).unwrap();
    renderer.set_clip_all_planes(false);
    let vertices = [(-100.0, -100.0), (300.0, -100.0), (-100.0, 300.0)]
        .map(|(x, y)| MeshVertex::new(Vec3::new(x, y, 0.5), Vec3::Z, Vec2::ZERO))
        .to_vec();
    let stats = renderer.render_mesh(&Mesh::new(vertices.clone(), vec![0, 1, 2])).unwrap();
    assert_eq!((stats.clipped, stats.culled), (1, 1));

    // Clipping against every plane brings it back on screen
    renderer.set_clip_all_planes(true);
    let stats = renderer.render_mesh(&Mesh::new(vertices, vec![0, 1, 2])).unwrap();
    assert!(stats.rasterized >= 1);
    assert_eq!(covered(&renderer, 32, 32).len(), 32 * 32);
}

#[test]
fn hierarchical_and_flat_rasterization_agree() {
    let (width, height) = (120, 90);
    let config = RendererConfig {
        msaa: 2,
        ..Default::default()
    };
    let mut renderer = Renderer::new(width, height, config).unwrap();
    sphere_scene(&mut renderer, width, height, 0.3);
    renderer.set_texture_filter(TextureFilter::Nearest);
    let mesh = sphere(1.0, 24, 12);

    renderer.render_mesh(&mesh).unwrap();
    let hierarchical = renderer.back_buffer().to_vec();
    renderer.set_hierarchical(false);
    renderer.render_mesh(&mesh).unwrap();
    assert!(hierarchical == renderer.back_buffer());
    assert_eq!(renderer.frame_count(), 2);
}

#[test]
fn partition_count_does_not_change_the_image() {
    let (width, height) = (96, 96);
    let mesh = sphere(1.0, 16, 8);
    let images: Vec<Vec<u8>> = [1, 3, 7]
        .into_iter()
        .map(|partitions| {
            let config = RendererConfig {
                partitions,
                ..Default::default()
            };
            let mut renderer = Renderer::new(width, height, config).unwrap();
            sphere_scene(&mut renderer, width, height, 1.1);
            renderer.render_mesh(&mesh).unwrap();
            renderer.back_buffer().to_vec()
        })
        .collect();
    assert!(images[0] == images[1] && images[1] == images[2]);
    assert!(images[0].iter().any(|&b| b != 0));
}

#[test]
fn texture_slots_are_validated() {
    let mut renderer = Renderer::new(16, 16, RendererConfig::default()).unwrap();
    let mut mesh = corner_triangle();
    mesh.texture_ids = vec![2];
    assert!(matches!(renderer.render_mesh(&mesh), Err(RenderError::InvalidMesh(_))));
}
