//! The `medlens bench` command: model load time, resident memory, and
//! classification throughput at several batch sizes, on synthetic images.

use clap::Args;
use image::{DynamicImage, Rgb, RgbImage};
use medlens_core::{Config, TimingStats, ZeroShotClassifier};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{apply_quality, Quality};

/// Arguments for the `bench` command.
#[derive(Args, Debug)]
pub struct BenchArgs {
    /// Comma-separated batch sizes to measure
    #[arg(long, value_delimiter = ',', default_value = "1,2,4,8")]
    pub batch_sizes: Vec<usize>,

    /// Width and height of the synthetic input images
    #[arg(long, default_value = "224")]
    pub size: u32,

    /// Timed runs per batch size (after one warm-up run)
    #[arg(long, default_value = "3")]
    pub iterations: usize,

    /// Quality preset: fast (224 model) or high (384 model)
    #[arg(long, value_enum, default_value = "fast")]
    pub quality: Quality,
}

/// Execute the bench command.
pub async fn execute(args: BenchArgs) -> anyhow::Result<()> {
    if args.batch_sizes.iter().any(|&n| n == 0) {
        anyhow::bail!("Batch sizes must be at least 1");
    }
    if args.size == 0 || args.iterations == 0 {
        anyhow::bail!("--size and --iterations must be at least 1");
    }

    let mut config = Config::load()?;
    apply_quality(&mut config, args.quality);

    let model_dir = config.model_dir();
    if !ZeroShotClassifier::model_exists(&config.classifier, &model_dir) {
        anyhow::bail!(
            "Model not found in {}. Run `medlens models download` first.",
            model_dir.display()
        );
    }

    let memory_before = resident_memory();
    let load_start = Instant::now();
    let classifier_config = config.classifier.clone();
    let loaded = tokio::task::spawn_blocking(move || {
        ZeroShotClassifier::load(&classifier_config, &model_dir)
    })
    .await??;
    let classifier = Arc::new(loaded);
    let load_time = load_start.elapsed();
    let memory_after = resident_memory();

    println!(
        "Model:       {} ({}px)",
        config.classifier.model, config.classifier.image_size
    );
    println!("Load time:   {:.2}s", load_time.as_secs_f64());
    println!("Memory:      {}", memory_line(memory_before, memory_after));
    println!(
        "Input:       {0}x{0} synthetic RGB, {1} run(s) per batch",
        args.size, args.iterations
    );
    println!();
    println!(
        "  {:>6}  {:>12}  {:>12}  {:>12}",
        "batch", "mean/batch", "mean/image", "img/sec"
    );

    for &batch_size in &args.batch_sizes {
        let images = Arc::new(synthetic_batch(batch_size, args.size));

        // Warm-up: first run pays for graph optimization and allocation.
        run_batch(&classifier, &images).await?;

        let mut runs = Vec::with_capacity(args.iterations);
        for _ in 0..args.iterations {
            runs.push(run_batch(&classifier, &images).await?);
        }

        let stats = TimingStats::from_durations(&runs);
        let per_image = stats.mean_seconds / batch_size as f64;
        let throughput = if stats.mean_seconds > 0.0 {
            batch_size as f64 / stats.mean_seconds
        } else {
            0.0
        };

        println!(
            "  {:>6}  {:>11.3}s  {:>11.4}s  {:>12.1}",
            batch_size, stats.mean_seconds, per_image, throughput
        );
    }

    Ok(())
}

async fn run_batch(
    classifier: &Arc<ZeroShotClassifier>,
    images: &Arc<Vec<DynamicImage>>,
) -> anyhow::Result<Duration> {
    let classifier = Arc::clone(classifier);
    let images = Arc::clone(images);

    tokio::task::spawn_blocking(move || {
        let start = Instant::now();
        classifier.classify_batch(&images)?;
        Ok::<_, anyhow::Error>(start.elapsed())
    })
    .await?
}

/// Resident set size of this process in bytes.
fn resident_memory() -> Option<u64> {
    let pid = sysinfo::get_current_pid().ok()?;
    let sys = sysinfo::System::new_all();
    sys.process(pid).map(|process| process.memory())
}

fn memory_line(before: Option<u64>, after: Option<u64>) -> String {
    const MB: f64 = 1024.0 * 1024.0;
    match (before, after) {
        (Some(before), Some(after)) => format!(
            "{:.1} MB before load, {:.1} MB after (+{:.1} MB)",
            before as f64 / MB,
            after as f64 / MB,
            after.saturating_sub(before) as f64 / MB
        ),
        _ => "unavailable on this platform".to_string(),
    }
}

/// Distinct gradient images so no two inputs in a batch are identical.
fn synthetic_batch(count: usize, size: u32) -> Vec<DynamicImage> {
    (0..count)
        .map(|i| {
            let shift = (i * 37) as u32;
            DynamicImage::ImageRgb8(RgbImage::from_fn(size, size, |x, y| {
                Rgb([
                    ((x + shift) % 256) as u8,
                    ((y + shift) % 256) as u8,
                    ((x + y) % 256) as u8,
                ])
            }))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_batch_is_distinct() {
        let batch = synthetic_batch(3, 16);
        assert_eq!(batch.len(), 3);
        assert_eq!((batch[0].width(), batch[0].height()), (16, 16));
        assert_ne!(batch[0].to_rgb8().as_raw(), batch[1].to_rgb8().as_raw());
    }

    #[test]
    fn test_memory_line_reports_increase() {
        let mb = 1024 * 1024;
        assert_eq!(
            memory_line(Some(100 * mb), Some(350 * mb)),
            "100.0 MB before load, 350.0 MB after (+250.0 MB)"
        );
        // Memory can shrink across a load; the increase never goes negative.
        assert!(memory_line(Some(10 * mb), Some(5 * mb)).ends_with("(+0.0 MB)"));
        assert_eq!(memory_line(None, Some(mb)), "unavailable on this platform");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_resident_memory_is_measured() {
        assert!(resident_memory().is_some_and(|bytes| bytes > 0));
    }
}
