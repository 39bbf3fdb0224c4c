use benchmark::{BenchmarkConfig, run};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Headless rasterizer benchmark
#[derive(Parser, Debug)]
#[command(name = "raster-bench", version, about = "Renders a rotating textured sphere and reports frame rates")]
struct Args {
    #[arg(long, default_value_t = 1024)]
    width: u32,

    #[arg(long, default_value_t = 768)]
    height: u32,

    /// Frames to render
    #[arg(long, default_value_t = 300)]
    frames: u64,

    /// log2 of the sample count (0 = 1x, 5 = 32x)
    #[arg(long, default_value_t = 2)]
    msaa: u32,

    #[arg(long, default_value_t = 96)]
    slices: u32,

    #[arg(long, default_value_t = 48)]
    stacks: u32,

    /// Skip hierarchical subdivision and test every quad of a tile
    #[arg(long)]
    flat: bool,

    /// Binning partitions, 0 for one per worker thread
    #[arg(long, default_value_t = 0)]
    partitions: usize,
}

impl From<Args> for BenchmarkConfig {
    fn from(args: Args) -> Self {
        Self {
            width: args.width,
            height: args.height,
            frames: args.frames,
            msaa: args.msaa,
            slices: args.slices,
            stacks: args.stacks,
            flat: args.flat,
            partitions: args.partitions,
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = BenchmarkConfig::from(Args::parse());
    info!(?config, "starting benchmark");

    match run(config) {
        Ok(results) => info!(
            frames = results.total_frames,
            avg_fps = results.avg_fps,
            min_fps = results.min_fps,
            max_fps = results.max_fps,
            low_1_percent = results.low_1_percent,
            avg_triangles = results.avg_triangles,
            avg_fragments = results.avg_fragments,
            "benchmark finished"
        ),
        Err(err) => {
            error!(%err, "benchmark failed");
            std::process::exit(1);
        }
    }
}
