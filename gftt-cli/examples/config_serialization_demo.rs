use gftt_cli::GoodFeatures;
use gftt_core::MatType;
use gftt_detect::{DetectorConfig, Stream};
use image::{GrayImage, ImageReader, Luma};
use std::time::Instant;

/// Checkerboard used when no image path is given
fn synthetic_image() -> GrayImage {
    GrayImage::from_fn(320, 240, |x, y| Luma([if (x / 20 + y / 20) % 2 == 0 { 40 } else { 210 }]))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔧 GFTT Configuration Serialization Demo");
    println!("========================================\n");

    let img = match std::env::args().nth(1) {
        Some(path) => ImageReader::open(path)?.decode()?.to_luma8(),
        None => synthetic_image(),
    };
    println!("📷 Image dimensions: {}x{}", img.width(), img.height());

    // Demo 1: Create configurations
    println!("📋 Demo 1: Creating Configurations");

    let fast_config = DetectorConfig::fast_preset(MatType::U8C1)
        .with_metadata("Production Fast", "Sparse corners for real-time tracking");
    let quality_config = DetectorConfig::quality_preset(MatType::U8C1)
        .with_metadata("Research Quality", "Harris corners over a wide window");
    let custom_config = DetectorConfig::new(MatType::U8C1)
        .to_builder()
        .max_corners(500)
        .min_distance(8.0)
        .to_config()
        .with_metadata("Custom Config", "Default response with spacing");

    println!("   • {}", fast_config.summary());
    println!("   • {}", quality_config.summary());
    println!("   • {}", custom_config.summary());

    // Demo 2: JSON and TOML files
    println!("\n📄 Demo 2: Saving");
    fast_config.save_json("fast_config.json")?;
    quality_config.save_toml("quality_config.toml")?;
    custom_config.save_json("custom_config.json")?;
    println!("   ✅ Saved fast_config.json, quality_config.toml, custom_config.json");

    let quality_toml = quality_config.to_toml()?;
    println!("   Quality config TOML:\n{}", quality_toml);

    // Demo 3: Load and detect
    println!("\n🎯 Demo 3: Configuration-Based Detection");
    for path in ["fast_config.json", "quality_config.toml", "custom_config.json"] {
        let config = DetectorConfig::load(path)?;
        let mut detector = GoodFeatures::from_config(config, Stream::null())?;

        let start = Instant::now();
        let (corners, stats) = detector.detect_with_stats(&img, None)?;
        println!(
            "   • {}: {:.2?}, {} corners from {} candidates",
            path,
            start.elapsed(),
            corners.len(),
            stats.candidates
        );
    }

    // Demo 4: Round-trip
    println!("\n🔄 Demo 4: Round-trip Testing");
    let original = DetectorConfig::dense_preset(MatType::U8C1);
    let from_json = DetectorConfig::from_json(&original.to_json()?)?;
    let from_toml = DetectorConfig::from_toml(&original.to_toml()?)?;
    assert_eq!(original, from_json);
    assert_eq!(original, from_toml);
    println!("   ✅ Round-trip serialization is consistent");

    Ok(())
}
