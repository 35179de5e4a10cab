//! The `medlens classify` command.

use clap::{Args, ValueEnum};
use medlens_core::{
    Accuracy, Config, ImageReference, Label, MedLens, OutputFormat as CoreOutputFormat,
    OutputWriter, RunReport,
};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

use super::{apply_quality, create_progress_bar, Quality};

/// Arguments for the `classify` command.
#[derive(Args, Debug)]
pub struct ClassifyArgs {
    /// Image file, PDF document, or http(s) URL (image or web page)
    #[arg(required = true)]
    pub input: String,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output format (defaults to `output.format` from the config)
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Label every image is expected to have; reports accuracy
    #[arg(long)]
    pub expect: Option<Label>,

    /// Quality preset: fast (224 model) or high (384 model)
    #[arg(long, value_enum, default_value = "fast")]
    pub quality: Quality,

    /// Hide the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    /// `Image N: label (seconds)` lines
    Text,
    /// Whole report as one JSON document
    Json,
    /// One JSON object per image
    Jsonl,
}

impl From<OutputFormat> for CoreOutputFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Text => CoreOutputFormat::Text,
            OutputFormat::Json => CoreOutputFormat::Json,
            OutputFormat::Jsonl => CoreOutputFormat::JsonLines,
        }
    }
}

/// JSON document for `--format json`.
#[derive(Serialize)]
struct ReportDocument<'a> {
    #[serde(flatten)]
    report: &'a RunReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    expected: Option<Label>,
    #[serde(skip_serializing_if = "Option::is_none")]
    accuracy: Option<Accuracy>,
}

/// Execute the classify command.
pub async fn execute(args: ClassifyArgs) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    apply_quality(&mut config, args.quality);

    let format = args
        .format
        .map(CoreOutputFormat::from)
        .or_else(|| CoreOutputFormat::parse(&config.output.format))
        .unwrap_or(CoreOutputFormat::Text);
    let pretty = config.output.pretty;

    let reference = ImageReference::parse(&args.input);
    let medlens = MedLens::new(config)?;

    // Load the model up front so its cost stays out of the per-image timings.
    let load_start = Instant::now();
    medlens.classifier().await?;
    tracing::info!("Model loaded in {:.2}s", load_start.elapsed().as_secs_f64());

    let progress = create_progress_bar();
    if args.no_progress {
        progress.set_draw_target(indicatif::ProgressDrawTarget::hidden());
    }

    let report = medlens
        .classify_with_progress(&reference, |done, total| {
            progress.set_length(total as u64);
            progress.set_position(done as u64);
            progress.set_message("classifying");
        })
        .await?;
    progress.finish_and_clear();

    if report.extracted == 0 {
        println!("No images were extracted from {reference}");
        return Ok(());
    }

    let accuracy = args.expect.map(|label| report.accuracy(label));

    let sink: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(std::io::stdout().lock()),
    };
    let mut writer = OutputWriter::new(sink, format, pretty);

    if format == CoreOutputFormat::Json {
        writer.write_json(&ReportDocument {
            report: &report,
            expected: args.expect,
            accuracy,
        })?;
    } else {
        writer.write_all(&report.images)?;
    }
    writer.flush()?;

    if let Some(path) = &args.output {
        tracing::info!("Results written to {}", path.display());
    }

    print_summary(&report, args.expect.zip(accuracy));
    Ok(())
}

/// Print the run summary to stderr.
fn print_summary(report: &RunReport, accuracy: Option<(Label, Accuracy)>) {
    for line in summary_lines(report, accuracy) {
        eprintln!("{line}");
    }
}

fn summary_lines(report: &RunReport, accuracy: Option<(Label, Accuracy)>) -> Vec<String> {
    let timing = &report.classification;
    let mut lines = vec![
        String::new(),
        "  ====================================".to_string(),
        "               Summary".to_string(),
        "  ====================================".to_string(),
        format!("    Images:        {:>8}", report.images.len()),
    ];
    if report.failed > 0 {
        lines.push(format!("    Failed:        {:>8}", report.failed));
    }
    lines.push("  ------------------------------------".to_string());
    lines.push(format!(
        "    Extraction:    {:>7.2}s",
        report.extraction_seconds
    ));
    lines.push(format!("    Mean classify: {:>7.3}s", timing.mean_seconds));
    lines.push(format!(
        "    Throughput:    {:>7.1} img/sec",
        timing.images_per_second
    ));
    if let Some((label, acc)) = accuracy {
        lines.push(format!(
            "    Accuracy:      {:>7.1}% ({}/{} {})",
            acc.percent, acc.correct, acc.total, label
        ));
    }
    lines.push("  ====================================".to_string());
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use medlens_core::{ClassifiedImage, ImageOrigin, TimingStats};
    use std::time::Duration;

    fn report() -> RunReport {
        RunReport {
            reference: "doc.pdf".to_string(),
            extracted: 3,
            failed: 1,
            extraction_seconds: 0.25,
            images: vec![ClassifiedImage {
                index: 1,
                origin: ImageOrigin::Pdf { page: 1, xref: 5 },
                width: 10,
                height: 10,
                label: Label::Medical,
                confidence: 0.9,
                classify_ms: 200.0,
            }],
            classification: TimingStats::from_durations(&[Duration::from_millis(200)]),
        }
    }

    #[test]
    fn test_summary_lines() {
        let report = report();
        let accuracy = report.accuracy(Label::Medical);
        let lines = summary_lines(&report, Some((Label::Medical, accuracy)));
        let text = lines.join("\n");

        assert!(text.contains("Images:               1"));
        assert!(text.contains("Failed:               1"));
        assert!(text.contains("0.200s"));
        assert!(text.contains("100.0% (1/1 medical)"));
    }

    #[test]
    fn test_report_document_flattens_report() {
        let report = report();
        let doc = ReportDocument {
            report: &report,
            expected: Some(Label::NonMedical),
            accuracy: Some(report.accuracy(Label::NonMedical)),
        };
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["reference"], "doc.pdf");
        assert_eq!(json["expected"], "non-medical");
        assert_eq!(json["accuracy"]["correct"], 0);
        assert_eq!(json["images"][0]["origin"]["type"], "pdf");
    }
}
