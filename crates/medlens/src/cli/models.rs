//! The `medlens models` command: fetch and inspect SigLIP model files.

use clap::{Args, Subcommand};
use medlens_core::classify::text::{TEXT_MODEL_FILENAME, TOKENIZER_FILENAME};
use medlens_core::classify::VISUAL_MODEL_FILENAME;
use medlens_core::Config;
use std::path::{Path, PathBuf};

/// Arguments for the `models` command.
#[derive(Args, Debug)]
pub struct ModelsArgs {
    #[command(subcommand)]
    pub command: ModelsCommand,
}

/// Subcommands for model management.
#[derive(Subcommand, Debug)]
pub enum ModelsCommand {
    /// Download the vision encoder, text encoder and tokenizer
    Download {
        /// Also download the 384px vision encoder used by `--quality high`
        #[arg(long)]
        all: bool,
    },

    /// List installed models
    List,

    /// Show model directory path
    Path,
}

/// One downloadable file, pinned by checksum.
struct RemoteFile {
    repo: &'static str,
    remote_path: &'static str,
    blake3: &'static str,
}

impl RemoteFile {
    fn url(&self) -> String {
        format!(
            "https://huggingface.co/{}/resolve/main/{}",
            self.repo, self.remote_path
        )
    }
}

struct VisionVariant {
    name: &'static str,
    label: &'static str,
    file: RemoteFile,
}

const VISION_VARIANTS: &[VisionVariant] = &[
    VisionVariant {
        name: "siglip-base-patch16",
        label: "Base (224)",
        file: RemoteFile {
            repo: "Xenova/siglip-base-patch16-224",
            remote_path: "onnx/vision_model.onnx",
            blake3: "05cd313b67db70acd8e800cd4c16105c3ebc4c385fe6002108d24ea806a248be",
        },
    },
    VisionVariant {
        name: "siglip-base-patch16-384",
        label: "Base (384)",
        file: RemoteFile {
            repo: "Xenova/siglip-base-patch16-384",
            remote_path: "onnx/vision_model.onnx",
            blake3: "9a4dcfd0c21b8e4d143652d1e566da52222605b564979723383f6012b53dd0df",
        },
    },
];

const TEXT_ENCODER: RemoteFile = RemoteFile {
    repo: "Xenova/siglip-base-patch16-224",
    remote_path: "onnx/text_model.onnx",
    blake3: "fe62b4096a9e5c3ce735b771472c9e3faac6ddeceebab5794a0a5ce17ee171dd",
};

const TOKENIZER: RemoteFile = RemoteFile {
    repo: "Xenova/siglip-base-patch16-224",
    remote_path: "tokenizer.json",
    blake3: "cf171f3552992f467891b9d59be5bde1256ffe1344c62030d4bf0f87df583906",
};

/// Execute the models command.
pub async fn execute(args: ModelsArgs) -> anyhow::Result<()> {
    let config = Config::load()?;
    let model_dir = config.model_dir();

    match args.command {
        ModelsCommand::Download { all } => {
            let client = reqwest::Client::new();
            let variants = if all {
                &VISION_VARIANTS[..]
            } else {
                &VISION_VARIANTS[..1]
            };

            for variant in variants {
                let dest = model_dir.join(variant.name).join(VISUAL_MODEL_FILENAME);
                fetch_if_missing(&client, &variant.file, &dest, variant.label).await?;
            }
            fetch_if_missing(
                &client,
                &TEXT_ENCODER,
                &model_dir.join(TEXT_MODEL_FILENAME),
                "Text encoder",
            )
            .await?;
            fetch_if_missing(
                &client,
                &TOKENIZER,
                &model_dir.join(TOKENIZER_FILENAME),
                "Tokenizer",
            )
            .await?;

            tracing::info!("All downloads complete.");
        }

        ModelsCommand::List => {
            if !model_dir.exists() {
                println!("No models installed.");
                println!("Run `medlens models download` to download required models.");
                return Ok(());
            }

            println!("Installed models:");
            println!("  Directory: {}\n", model_dir.display());

            println!("  Vision encoders:");
            for variant in VISION_VARIANTS {
                let path = model_dir.join(variant.name).join(VISUAL_MODEL_FILENAME);
                let default_marker = if variant.name == config.classifier.model {
                    "  (default)"
                } else {
                    ""
                };
                println!(
                    "    - {:30} {:14}{}",
                    variant.name,
                    status(&path),
                    default_marker
                );
            }

            println!("\n  Shared:");
            for name in [TEXT_MODEL_FILENAME, TOKENIZER_FILENAME] {
                println!("    - {:30} {}", name, status(&model_dir.join(name)));
            }
        }

        ModelsCommand::Path => {
            println!("{}", model_dir.display());
        }
    }

    Ok(())
}

fn status(path: &Path) -> &'static str {
    if path.exists() {
        "ready"
    } else {
        "not installed"
    }
}

async fn fetch_if_missing(
    client: &reqwest::Client,
    file: &RemoteFile,
    dest: &Path,
    label: &str,
) -> anyhow::Result<()> {
    if dest.exists() {
        tracing::info!("{label} already exists at {:?}", dest);
        return Ok(());
    }
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let url = file.url();
    tracing::info!("Downloading {label}...");
    tracing::info!("  Source: {url}");
    tracing::info!("  Destination: {:?}", dest);

    download_file(client, &url, dest, file.blake3).await?;

    let size = std::fs::metadata(dest)?.len();
    tracing::info!(
        "  {label} complete ({:.1} MB)",
        size as f64 / (1024.0 * 1024.0)
    );
    Ok(())
}

/// `{dest}.part`, renamed into place once the checksum matches.
fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

/// Stream a URL to disk and verify its BLAKE3 checksum.
async fn download_file(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    expected_blake3: &str,
) -> anyhow::Result<()> {
    use futures_util::StreamExt;
    use tokio::io::AsyncWriteExt;

    let response = client
        .get(url)
        .send()
        .await?
        .error_for_status()
        .map_err(|e| anyhow::anyhow!("Download failed: {e}"))?;

    let total_size = response.content_length();
    if let Some(size) = total_size {
        tracing::info!("  Size: {:.1} MB", size as f64 / (1024.0 * 1024.0));
    }

    let part = partial_path(dest);
    let mut file = tokio::fs::File::create(&part).await?;
    let mut stream = response.bytes_stream();
    let mut downloaded: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;

        if let Some(total) = total_size {
            if downloaded % (50 * 1024 * 1024) < chunk.len() as u64 {
                tracing::info!(
                    "  Progress: {:.0}%",
                    downloaded as f64 / total as f64 * 100.0
                );
            }
        }
    }
    file.flush().await?;
    drop(file);

    verify_blake3(&part, expected_blake3)?;
    std::fs::rename(&part, dest)?;
    Ok(())
}

fn blake3_hex(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(hasher.finalize().to_hex().to_string())
}

/// Verify a file's BLAKE3 checksum; a mismatching file is removed.
fn verify_blake3(path: &Path, expected: &str) -> anyhow::Result<()> {
    let actual = blake3_hex(path)
        .map_err(|e| anyhow::anyhow!("Checksum computation failed for {}: {e}", path.display()))?;

    if actual != expected {
        let _ = std::fs::remove_file(path);
        anyhow::bail!(
            "Checksum mismatch for {}:\n  expected: {}\n  actual:   {}\n\
             Corrupt file removed, try downloading again.",
            path.display(),
            expected,
            actual
        );
    }

    tracing::debug!("  Checksum verified: {}…", &actual[..16]);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_file(dir: &Path, content: &[u8]) -> PathBuf {
        let path = dir.join("model.onnx.part");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn verify_blake3_correct_hash() {
        let dir = tempfile::tempdir().unwrap();
        let path = test_file(dir.path(), b"hello medlens");
        let expected = blake3::hash(b"hello medlens").to_hex().to_string();

        assert!(verify_blake3(&path, &expected).is_ok());
        assert!(path.exists());
    }

    #[test]
    fn verify_blake3_wrong_hash_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = test_file(dir.path(), b"hello medlens");
        let wrong = "0".repeat(64);

        let err = verify_blake3(&path, &wrong).unwrap_err().to_string();
        assert!(err.contains("Checksum mismatch"));
        assert!(err.contains("Corrupt file removed"));
        assert!(!path.exists());
    }

    #[test]
    fn verify_blake3_missing_file() {
        assert!(verify_blake3(Path::new("/nonexistent/file.onnx"), &"0".repeat(64)).is_err());
    }

    #[test]
    fn test_partial_path_and_urls() {
        assert_eq!(
            partial_path(Path::new("/m/visual.onnx")),
            PathBuf::from("/m/visual.onnx.part")
        );
        assert_eq!(
            TOKENIZER.url(),
            "https://huggingface.co/Xenova/siglip-base-patch16-224/resolve/main/tokenizer.json"
        );
        assert_eq!(VISION_VARIANTS[0].name, Config::default().classifier.model);
    }
}
