//! Scoring of an image embedding against per-label prompt embeddings.

use crate::error::PipelineError;
use crate::math;
use crate::types::{Classification, Label, LabelScore};

/// SigLIP's learned temperature. Turns the narrow band of cosine
/// similarities into logits that separate under softmax.
pub const LOGIT_SCALE: f32 = 117.33;

/// One unit-length text embedding per label.
#[derive(Debug, Clone)]
pub struct LabelPrompts {
    labels: Vec<(Label, Vec<f32>)>,
}

impl LabelPrompts {
    /// Average each label's prompt embeddings and re-normalize.
    ///
    /// Every label needs at least one prompt, and all embeddings must share
    /// one dimension.
    pub fn from_prompt_embeddings(
        groups: Vec<(Label, Vec<Vec<f32>>)>,
    ) -> Result<Self, PipelineError> {
        let mut labels = Vec::with_capacity(groups.len());
        let mut dim = None;

        for (label, embeddings) in groups {
            let centroid = math::mean(&embeddings).ok_or_else(|| PipelineError::Model {
                message: format!("No usable prompt embeddings for label '{label}'"),
            })?;

            match dim {
                None => dim = Some(centroid.len()),
                Some(d) if d != centroid.len() => {
                    return Err(PipelineError::Model {
                        message: format!(
                            "Prompt embedding dimension mismatch for '{label}': {} vs {d}",
                            centroid.len()
                        ),
                    })
                }
                Some(_) => {}
            }

            labels.push((label, math::l2_normalize(&centroid)));
        }

        if labels.is_empty() {
            return Err(PipelineError::Model {
                message: "No labels to score against".to_string(),
            });
        }
        Ok(Self { labels })
    }

    pub fn embedding_dim(&self) -> usize {
        self.labels.first().map_or(0, |(_, e)| e.len())
    }

    /// Pick the label whose prompt embedding is closest to the image.
    ///
    /// Ties go to the label listed first.
    pub fn score(&self, image_embedding: &[f32]) -> Classification {
        let similarities: Vec<f32> = self
            .labels
            .iter()
            .map(|(_, text)| math::dot(image_embedding, text))
            .collect();
        let logits: Vec<f32> = similarities.iter().map(|s| LOGIT_SCALE * s).collect();
        let probabilities = math::softmax(&logits);

        let mut best = 0;
        for (i, s) in similarities.iter().enumerate() {
            if *s > similarities[best] {
                best = i;
            }
        }

        let scores = self
            .labels
            .iter()
            .zip(similarities.iter().zip(&probabilities))
            .map(|((label, _), (&similarity, &probability))| LabelScore {
                label: *label,
                similarity,
                probability,
            })
            .collect();

        Classification {
            label: self.labels[best].0,
            confidence: probabilities[best],
            scores,
        }
    }
}
