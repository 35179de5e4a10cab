//! SigLIP text encoder, used once at load time to embed the label prompts.

use std::path::Path;
use std::sync::Mutex;

use ort::session::Session;
use ort::value::Value;

use crate::error::PipelineError;

pub const TEXT_MODEL_FILENAME: &str = "text_model.onnx";
pub const TOKENIZER_FILENAME: &str = "tokenizer.json";

/// SigLIP was trained with fixed-length 64-token sequences.
const MAX_LENGTH: usize = 64;

/// `</s>`, SigLIP's pad token, when the tokenizer carries no padding config.
const FALLBACK_PAD_ID: u32 = 1;

fn model_error(message: impl Into<String>) -> PipelineError {
    PipelineError::Model {
        message: message.into(),
    }
}

pub struct TextEncoder {
    session: Mutex<Session>,
    tokenizer: tokenizers::Tokenizer,
}

impl TextEncoder {
    /// Load `text_model.onnx` and `tokenizer.json` from `model_dir`.
    pub fn load(model_dir: &Path) -> Result<Self, PipelineError> {
        let model_path = model_dir.join(TEXT_MODEL_FILENAME);
        let tokenizer_path = model_dir.join(TOKENIZER_FILENAME);

        for required in [&model_path, &tokenizer_path] {
            if !required.exists() {
                return Err(model_error(format!(
                    "{} not found. Run `medlens models download` first.",
                    required.display()
                )));
            }
        }

        let session = Session::builder()
            .map_err(|e| model_error(format!("Failed to create ONNX session builder: {e}")))?
            .commit_from_file(&model_path)
            .map_err(|e| model_error(format!("Failed to load text encoder: {e}")))?;

        let tokenizer = tokenizers::Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| model_error(format!("Failed to load tokenizer: {e}")))?;

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
        })
    }

    /// Encode prompts into L2-normalized embeddings, one per prompt.
    pub fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| model_error(format!("Tokenization failed: {e}")))?;

        let pad_id = self
            .tokenizer
            .get_padding()
            .map(|p| p.pad_id)
            .unwrap_or(FALLBACK_PAD_ID) as i64;

        let batch_size = texts.len();
        let mut input_ids = vec![pad_id; batch_size * MAX_LENGTH];
        for (row, encoding) in encodings.iter().enumerate() {
            for (col, &id) in encoding.get_ids().iter().take(MAX_LENGTH).enumerate() {
                input_ids[row * MAX_LENGTH + col] = id as i64;
            }
        }

        let input = Value::from_array((vec![batch_size as i64, MAX_LENGTH as i64], input_ids))
            .map_err(|e| model_error(format!("Failed to create input tensor: {e}")))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| model_error(format!("Text session lock poisoned: {e}")))?;

        let outputs = session
            .run(ort::inputs!["input_ids" => input])
            .map_err(|e| model_error(format!("Text inference failed: {e}")))?;

        let pooled = outputs
            .iter()
            .find(|(name, _)| *name == "pooler_output")
            .ok_or_else(|| model_error("Text encoder did not produce pooler_output"))?;

        let (_, data) = pooled
            .1
            .try_extract_tensor::<f32>()
            .map_err(|e| model_error(format!("Failed to extract pooler_output: {e}")))?;

        let dim = data.len() / batch_size;
        if dim == 0 {
            return Err(model_error("Text encoder produced an empty pooler_output"));
        }
        Ok(data.chunks(dim).map(crate::math::l2_normalize).collect())
    }

    pub fn model_exists(model_dir: &Path) -> bool {
        model_dir.join(TEXT_MODEL_FILENAME).exists() && model_dir.join(TOKENIZER_FILENAME).exists()
    }
}
