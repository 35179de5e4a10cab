//! Run statistics: classification timing and accuracy against an expected label.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::{ClassifiedImage, Label};

/// Summary of a set of timed operations, in seconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimingStats {
    pub count: usize,
    pub total_seconds: f64,
    pub mean_seconds: f64,
    pub min_seconds: f64,
    pub max_seconds: f64,
    /// `count / total_seconds`, 0 when nothing was timed
    pub images_per_second: f64,
}

impl TimingStats {
    pub fn from_durations(durations: &[Duration]) -> Self {
        if durations.is_empty() {
            return Self::default();
        }

        let secs: Vec<f64> = durations.iter().map(Duration::as_secs_f64).collect();
        let total: f64 = secs.iter().sum();
        let count = secs.len();

        Self {
            count,
            total_seconds: total,
            mean_seconds: total / count as f64,
            min_seconds: secs.iter().copied().fold(f64::INFINITY, f64::min),
            max_seconds: secs.iter().copied().fold(0.0, f64::max),
            images_per_second: if total > 0.0 { count as f64 / total } else { 0.0 },
        }
    }
}

/// How many classified images carry the expected label.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Accuracy {
    pub correct: usize,
    pub total: usize,
    pub percent: f64,
}

/// Everything a `classify` run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// The input reference, as given
    pub reference: String,
    /// Raw images the resolver produced
    pub extracted: usize,
    /// Images dropped after extraction (decode, timeout, inference)
    pub failed: usize,
    /// Wall time for resolving the reference
    pub extraction_seconds: f64,
    pub images: Vec<ClassifiedImage>,
    pub classification: TimingStats,
}

impl RunReport {
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn accuracy(&self, expected: Label) -> Accuracy {
        let total = self.images.len();
        let correct = self.images.iter().filter(|i| i.label == expected).count();
        let percent = if total == 0 {
            0.0
        } else {
            correct as f64 / total as f64 * 100.0
        };
        Accuracy {
            correct,
            total,
            percent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ImageOrigin;
    use std::path::PathBuf;

    fn classified(index: usize, label: Label) -> ClassifiedImage {
        ClassifiedImage {
            index,
            origin: ImageOrigin::File {
                path: PathBuf::from("a.png"),
            },
            width: 1,
            height: 1,
            label,
            confidence: 0.9,
            classify_ms: 1.0,
        }
    }

    #[test]
    fn test_timing_stats() {
        let stats = TimingStats::from_durations(&[
            Duration::from_millis(100),
            Duration::from_millis(300),
        ]);
        assert_eq!(stats.count, 2);
        assert!((stats.total_seconds - 0.4).abs() < 1e-9);
        assert!((stats.mean_seconds - 0.2).abs() < 1e-9);
        assert!((stats.min_seconds - 0.1).abs() < 1e-9);
        assert!((stats.max_seconds - 0.3).abs() < 1e-9);
        assert!((stats.images_per_second - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_timing_stats_empty() {
        assert_eq!(TimingStats::from_durations(&[]), TimingStats::default());
        let zero = TimingStats::from_durations(&[Duration::ZERO]);
        assert_eq!(zero.images_per_second, 0.0);
    }

    #[test]
    fn test_accuracy() {
        let report = RunReport {
            reference: "x".to_string(),
            extracted: 4,
            failed: 1,
            extraction_seconds: 0.5,
            images: vec![
                classified(1, Label::Medical),
                classified(2, Label::NonMedical),
                classified(4, Label::Medical),
            ],
            classification: TimingStats::default(),
        };

        let acc = report.accuracy(Label::Medical);
        assert_eq!((acc.correct, acc.total), (2, 3));
        assert!((acc.percent - 66.666).abs() < 0.01);
    }

    #[test]
    fn test_accuracy_of_empty_run() {
        let report = RunReport {
            reference: "x".to_string(),
            extracted: 0,
            failed: 0,
            extraction_seconds: 0.0,
            images: vec![],
            classification: TimingStats::default(),
        };
        assert!(report.is_empty());
        assert_eq!(report.accuracy(Label::Medical).percent, 0.0);
    }
}
