//! SigLIP vision encoder session.

use std::path::Path;
use std::sync::Mutex;

use ndarray::Array4;
use ort::session::Session;
use ort::value::Value;

use crate::error::PipelineError;

/// Output holding the cross-modal projection. `last_hidden_state` is not
/// aligned with the text side.
const POOLER_OUTPUT: &str = "pooler_output";

fn model_error(message: impl Into<String>) -> PipelineError {
    PipelineError::Model {
        message: message.into(),
    }
}

/// ONNX Runtime session for image embeddings.
///
/// `Session::run` needs `&mut self`, hence the `Mutex`.
pub struct VisionEncoder {
    session: Mutex<Session>,
    input_name: String,
}

impl VisionEncoder {
    pub fn load(model_path: &Path) -> Result<Self, PipelineError> {
        let session = Session::builder()
            .map_err(|e| model_error(format!("Failed to create ONNX session builder: {e}")))?
            .commit_from_file(model_path)
            .map_err(|e| {
                model_error(format!(
                    "Failed to load vision encoder {}: {e}",
                    model_path.display()
                ))
            })?;

        let input_name = session
            .inputs()
            .first()
            .map(|i| i.name().to_string())
            .unwrap_or_else(|| "pixel_values".to_string());

        tracing::debug!(
            "Vision encoder {:?} (input: {}, outputs: {:?})",
            model_path,
            input_name,
            session
                .outputs()
                .iter()
                .map(|o| o.name())
                .collect::<Vec<_>>()
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
        })
    }

    /// Embed one `[1, 3, H, W]` tensor into an L2-normalized vector.
    pub fn embed(&self, tensor: &Array4<f32>) -> Result<Vec<f32>, PipelineError> {
        self.embed_batch(std::slice::from_ref(tensor))?
            .into_iter()
            .next()
            .ok_or_else(|| model_error("Vision encoder returned no embedding"))
    }

    /// Stack `[1, 3, H, W]` tensors into one `[N, 3, H, W]` run.
    pub fn embed_batch(&self, tensors: &[Array4<f32>]) -> Result<Vec<Vec<f32>>, PipelineError> {
        let Some(first) = tensors.first() else {
            return Ok(Vec::new());
        };
        let shape = first.shape();
        if let Some(bad) = tensors.iter().find(|t| t.shape() != shape) {
            return Err(model_error(format!(
                "Tensor shape mismatch in batch: {:?} vs {:?}",
                shape,
                bad.shape()
            )));
        }

        let batch_size = tensors.len();
        let batch_shape = vec![
            batch_size as i64,
            shape[1] as i64,
            shape[2] as i64,
            shape[3] as i64,
        ];
        let flat: Vec<f32> = tensors.iter().flat_map(|t| t.iter().copied()).collect();

        let input = Value::from_array((batch_shape, flat))
            .map_err(|e| model_error(format!("Failed to create input tensor: {e}")))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| model_error(format!("Vision session lock poisoned: {e}")))?;

        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input])
            .map_err(|e| model_error(format!("Vision inference failed: {e}")))?;

        let pooled = outputs
            .iter()
            .find(|(name, _)| *name == POOLER_OUTPUT)
            .ok_or_else(|| model_error("Vision encoder did not produce pooler_output"))?;

        let (out_shape, data) = pooled
            .1
            .try_extract_tensor::<f32>()
            .map_err(|e| model_error(format!("Failed to extract pooler_output: {e}")))?;

        let dim = match out_shape.len() {
            1 => data.len() / batch_size,
            2 => out_shape[1] as usize,
            _ => {
                return Err(model_error(format!(
                    "Unexpected pooler_output shape: {:?}",
                    out_shape
                )))
            }
        };

        if dim == 0 {
            return Err(model_error("Vision encoder produced an empty pooler_output"));
        }

        Ok(data
            .chunks(dim)
            .take(batch_size)
            .map(crate::math::l2_normalize)
            .collect())
    }
}
