use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use gftt_cli::{init_thread_pool, AppError, AppResult, DetectionReport, GoodFeatures};
use gftt_core::MatType;
use gftt_detect::{DetectorConfig, Stream};
use image::{ImageReader, Rgba, RgbaImage};
use imageproc::drawing::draw_hollow_circle_mut;

/// Command line arguments structure.
#[derive(Parser, Debug)]
#[command(author, version, about = "Detect good features to track in a grayscale image.")]
struct Args {
    /// Input image, converted to 8-bit grayscale
    #[arg()]
    image: PathBuf,

    /// Upper bound on returned corners, 0 for no bound
    #[arg(long)]
    max_corners: Option<i32>,

    /// Fraction of the best score a corner must exceed
    #[arg(long)]
    quality_level: Option<f64>,

    /// Minimum distance between returned corners
    #[arg(long)]
    min_distance: Option<f64>,

    /// Covariance window size
    #[arg(long)]
    block_size: Option<i32>,

    /// Use the Harris response instead of the minimum eigenvalue
    #[arg(long)]
    harris: bool,

    /// Harris sensitivity
    #[arg(long)]
    harris_k: Option<f64>,

    /// Mask image; corners are only kept where it is nonzero
    #[arg(long)]
    mask: Option<PathBuf>,

    /// Detector configuration (.json or .toml); flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Annotated output image
    #[arg(long, default_value = "corners.png")]
    output: PathBuf,

    /// Optionally write the corners and run statistics as JSON
    #[arg(long)]
    json: Option<PathBuf>,

    /// Worker threads for the global pool
    #[arg(long)]
    threads: Option<usize>,
}

fn load_config(args: &Args) -> AppResult<DetectorConfig> {
    let mut config = match &args.config {
        Some(path) => DetectorConfig::load(path).map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?,
        None => DetectorConfig::new(MatType::U8C1),
    };

    if let Some(v) = args.max_corners {
        config.core.max_corners = v;
    }
    if let Some(v) = args.quality_level {
        config.core.quality_level = v;
    }
    if let Some(v) = args.min_distance {
        config.core.min_distance = v;
    }
    if let Some(v) = args.block_size {
        config.core.block_size = v;
    }
    if args.harris {
        config.core.use_harris = true;
    }
    if let Some(v) = args.harris_k {
        config.core.harris_k = v;
    }
    if let Some(v) = args.threads {
        config.core.n_threads = v;
    }
    config.validate()?;
    Ok(config)
}

fn run(args: Args) -> AppResult<()> {
    let config = load_config(&args)?;
    init_thread_pool(config.core.n_threads)?;

    let img = ImageReader::open(&args.image)?.decode()?.to_luma8();
    let mask = match &args.mask {
        Some(path) => Some(ImageReader::open(path)?.decode()?.to_luma8()),
        None => None,
    };
    let (w, h) = img.dimensions();
    log::info!("loaded {} ({}x{})", args.image.display(), w, h);

    let mut detector = GoodFeatures::from_config(config, Stream::null())?;

    // Time the full pipeline
    let t0 = Instant::now();
    let (corners, stats) = detector.detect_with_stats(&img, mask.as_ref())?;
    let elapsed = t0.elapsed();

    println!("Time taken: {:.2?}", elapsed);
    println!("Detected {} corners ({} candidates)", corners.len(), stats.candidates);
    if stats.overflowed {
        println!("Candidate buffer filled up at {} entries", stats.capacity);
    }

    // Convert image to RGBA for drawing
    let mut output: RgbaImage = image::DynamicImage::ImageLuma8(img).into_rgba8();

    // Draw red circles at each corner
    for p in &corners {
        draw_hollow_circle_mut(&mut output, (p.x as i32, p.y as i32), 3, Rgba([255, 0, 0, 255]));
    }

    output.save(&args.output)?;
    println!("Saved result image as {}", args.output.display());

    if let Some(path) = &args.json {
        let report = DetectionReport {
            image: args.image.display().to_string(),
            width: w,
            height: h,
            config: detector.config().clone(),
            stats,
            elapsed_ms: elapsed.as_secs_f64() * 1000.0,
            corners,
        };
        report.save_json(path)?;
        println!("Saved corner list as {}", path.display());
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run(Args::parse()) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
