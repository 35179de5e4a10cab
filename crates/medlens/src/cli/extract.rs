//! The `medlens extract` command: write normalized images to disk.

use clap::Args;
use medlens_core::{Config, ExtractedImage, ImageReference, MedLens};
use std::path::{Path, PathBuf};

/// Arguments for the `extract` command.
#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Image file, PDF document, or http(s) URL (image or web page)
    #[arg(required = true)]
    pub input: String,

    /// Directory for the extracted JPEGs (created if missing)
    #[arg(short = 'd', long)]
    pub out_dir: PathBuf,
}

/// Execute the extract command. Does not need the model.
pub async fn execute(args: ExtractArgs) -> anyhow::Result<()> {
    let config = Config::load()?;
    let reference = ImageReference::parse(&args.input);
    let medlens = MedLens::new(config)?;

    let images = medlens.extract(&reference).await?;
    if images.is_empty() {
        println!("No images were extracted from {reference}");
        return Ok(());
    }

    std::fs::create_dir_all(&args.out_dir)?;
    for image in &images {
        let path = write_image(&args.out_dir, image)?;
        println!(
            "{}  {}x{}  {}",
            path.display(),
            image.image.width,
            image.image.height,
            image.origin
        );
    }

    tracing::info!(
        "Wrote {} image(s) to {}",
        images.len(),
        args.out_dir.display()
    );
    Ok(())
}

fn output_name(index: usize) -> String {
    format!("image_{index:03}.jpg")
}

fn write_image(dir: &Path, image: &ExtractedImage) -> std::io::Result<PathBuf> {
    let path = dir.join(output_name(image.index));
    std::fs::write(&path, &image.image.bytes)?;
    Ok(path)
}
