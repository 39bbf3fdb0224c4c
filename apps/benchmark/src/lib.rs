//! Rasterizer benchmark
//!
//! Renders a rotating textured sphere headlessly and reports frame-rate
//! statistics.

use std::time::Instant;

use glam::{Mat4, Vec3, Vec4};
use raster::math::{look_at, perspective, raster_matrix};
use raster::mesh::sphere;
use raster::{FrameStats, Renderer, RendererConfig, Texture2D};
use tracing::{debug, info};

/// Frame times kept for percentile statistics
const FRAME_HISTORY: usize = 256;

/// Benchmark configuration
#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    /// Screen width
    pub width: u32,
    /// Screen height
    pub height: u32,
    /// Frames to render
    pub frames: u64,
    /// log2 of the sample count
    pub msaa: u32,
    /// Sphere tessellation
    pub slices: u32,
    pub stacks: u32,
    /// Rasterize whole tiles quad by quad instead of subdividing
    pub flat: bool,
    /// Binning partitions, 0 for one per worker thread
    pub partitions: usize,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 768,
            frames: 300,
            msaa: 2,
            slices: 96,
            stacks: 48,
            flat: false,
            partitions: 0,
        }
    }
}

/// Benchmark results
#[derive(Debug, Clone, Default)]
pub struct BenchmarkResults {
    /// Total frames rendered
    pub total_frames: u64,
    /// Average FPS
    pub avg_fps: f32,
    /// Minimum FPS
    pub min_fps: f32,
    /// Maximum FPS
    pub max_fps: f32,
    /// 1% low FPS
    pub low_1_percent: f32,
    /// Total triangles rasterized
    pub total_triangles: u64,
    /// Average triangles per frame
    pub avg_triangles: u64,
    /// Average quad fragments per frame
    pub avg_fragments: u64,
}

/// Frame time recorder
pub struct Benchmark {
    config: BenchmarkConfig,
    results: BenchmarkResults,
    running: bool,
    frame_count: u64,
    elapsed_time: f32,
    total_fragments: u64,
    frame_times: [f32; FRAME_HISTORY],
    frame_time_index: usize,
}

impl Benchmark {
    pub fn new(config: BenchmarkConfig) -> Self {
        Self {
            config,
            results: BenchmarkResults::default(),
            running: false,
            frame_count: 0,
            elapsed_time: 0.0,
            total_fragments: 0,
            frame_times: [0.0; FRAME_HISTORY],
            frame_time_index: 0,
        }
    }

    /// Start the benchmark
    pub fn start(&mut self) {
        self.running = true;
        self.frame_count = 0;
        self.elapsed_time = 0.0;
        self.total_fragments = 0;
        self.results = BenchmarkResults::default();
        self.frame_times = [0.0; FRAME_HISTORY];
        self.frame_time_index = 0;
    }

    /// Stop the benchmark and compute results
    pub fn stop(&mut self) -> BenchmarkResults {
        self.running = false;
        self.compute_results();
        self.results.clone()
    }

    /// Record a frame
    pub fn record_frame(&mut self, frame_time: f32, stats: &FrameStats) {
        if !self.running {
            return;
        }

        self.frame_count += 1;
        self.elapsed_time += frame_time;
        self.results.total_triangles += stats.rasterized as u64;
        self.total_fragments += stats.fragments as u64;

        self.frame_times[self.frame_time_index] = frame_time;
        self.frame_time_index = (self.frame_time_index + 1) % FRAME_HISTORY;

        if self.frame_count >= self.config.frames {
            self.stop();
        }
    }

    /// Check if benchmark is running
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Get progress (0.0 - 1.0)
    pub fn progress(&self) -> f32 {
        if self.config.frames == 0 {
            return 1.0;
        }
        (self.frame_count as f32 / self.config.frames as f32).min(1.0)
    }

    /// Compute final results
    fn compute_results(&mut self) {
        self.results.total_frames = self.frame_count;

        if self.elapsed_time > 0.0 {
            self.results.avg_fps = self.frame_count as f32 / self.elapsed_time;
        }

        if self.frame_count > 0 {
            self.results.avg_triangles = self.results.total_triangles / self.frame_count;
            self.results.avg_fragments = self.total_fragments / self.frame_count;
        }

        let valid_count = (self.frame_count as usize).min(FRAME_HISTORY);
        if valid_count == 0 {
            return;
        }
        let mut times = self.frame_times[..valid_count].to_vec();
        times.sort_by(f32::total_cmp);

        // Min FPS = 1 / max frame time
        let max_frame_time = times[valid_count - 1];
        if max_frame_time > 0.0 {
            self.results.min_fps = 1.0 / max_frame_time;
        }

        // Max FPS = 1 / min frame time
        if times[0] > 0.0 {
            self.results.max_fps = 1.0 / times[0];
        }

        // 1% low = 1 / 99th percentile frame time
        let percentile_time = times[((valid_count * 99) / 100).min(valid_count - 1)];
        if percentile_time > 0.0 {
            self.results.low_1_percent = 1.0 / percentile_time;
        }
    }

    /// Get current results (partial while running)
    pub fn results(&self) -> &BenchmarkResults {
        &self.results
    }

    /// Get config
    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }
}

/// Render the rotating sphere scene for the configured number of frames
pub fn run(config: BenchmarkConfig) -> raster::Result<BenchmarkResults> {
    let renderer_config = RendererConfig {
        partitions: config.partitions,
        msaa: config.msaa,
        hierarchical: !config.flat,
    };
    let mut renderer = Renderer::new(config.width, config.height, renderer_config)?;

    let checker = Texture2D::checkerboard(512, 16, Vec4::ONE, Vec4::new(0.15, 0.3, 0.6, 1.0))?;
    let mesh = sphere(1.0, config.slices, config.stacks).with_texture(checker);
    info!(
        triangles = mesh.triangle_count(),
        vertices = mesh.vertices.len(),
        "benchmark scene built"
    );

    let view = look_at(Vec3::new(0.0, 0.6, 2.6), Vec3::ZERO, Vec3::Y);
    let projection = perspective(1.0, config.width as f32 / config.height as f32, 0.1, 20.0);
    let to_raster = raster_matrix(config.width, config.height);

    let mut benchmark = Benchmark::new(config);
    benchmark.start();
    let mut angle = 0.0f32;
    while benchmark.is_running() {
        renderer.set_transform(view * Mat4::from_rotation_y(angle), projection, to_raster);

        let start = Instant::now();
        let stats = renderer.render_mesh(&mesh)?;
        let frame_time = start.elapsed().as_secs_f32();

        benchmark.record_frame(frame_time, &stats);
        angle += 0.02;

        if renderer.frame_count() % 60 == 0 {
            debug!(progress = benchmark.progress(), frame_ms = frame_time * 1000.0, "benchmark progress");
        }
    }

    Ok(benchmark.results().clone())
}
