//! medlens CLI - extract images from files, PDFs and web pages and classify
//! them as medical or non-medical.
//!
//! # Usage
//!
//! ```bash
//! # Classify the images embedded in a PDF
//! medlens classify report.pdf
//!
//! # Classify every <img> on a web page, checking against an expected label
//! medlens classify https://example.com/article.html --expect non-medical
//!
//! # Save normalized images without running the model
//! medlens extract report.pdf --out-dir ./images
//!
//! # Manage models
//! medlens models download
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// medlens - zero-shot medical image classification for documents and web pages.
#[derive(Parser, Debug)]
#[command(name = "medlens")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract and classify images from a file, PDF, or URL
    Classify(cli::classify::ClassifyArgs),

    /// Extract normalized images to a directory (no model needed)
    Extract(cli::extract::ExtractArgs),

    /// Measure model load time and classification throughput
    Bench(cli::bench::BenchArgs),

    /// Manage models (download, list, path)
    Models(cli::models::ModelsArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't up yet, so config problems go straight to stderr.
    let config = match medlens_core::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `medlens config path`."
            );
            medlens_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("medlens v{}", medlens_core::VERSION);

    match cli.command {
        Commands::Classify(args) => cli::classify::execute(args).await,
        Commands::Extract(args) => cli::extract::execute(args).await,
        Commands::Bench(args) => cli::bench::execute(args).await,
        Commands::Models(args) => cli::models::execute(args).await,
        Commands::Config(args) => cli::config::execute(args).await,
    }
}
