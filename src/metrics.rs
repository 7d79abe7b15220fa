//! Classification metrics over experiment results.
//!
//! Labels are treated as multi-label binary indicators per class.
//! Divisions by zero score 1.0, so a class never predicted and never
//! present does not drag the averages down.

use serde::Serialize;
use std::path::Path;

use crate::models::{FewshotError, Result};
use crate::pipeline::ItemResult;

/// One row of the metrics report.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsRow {
    pub class: String,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Per-class rows followed by macro- and micro-averages.
#[derive(Debug, Clone)]
pub struct MetricsReport {
    pub rows: Vec<MetricsRow>,
}

#[derive(Default)]
struct Counts {
    tp: usize,
    fp: usize,
    fn_: usize,
    tn: usize,
}

impl Counts {
    fn add(&mut self, actual: bool, predicted: bool) {
        match (actual, predicted) {
            (true, true) => self.tp += 1,
            (false, true) => self.fp += 1,
            (true, false) => self.fn_ += 1,
            (false, false) => self.tn += 1,
        }
    }

    fn total(&self) -> usize {
        self.tp + self.fp + self.fn_ + self.tn
    }

    fn accuracy(&self) -> f64 {
        ratio(self.tp + self.tn, self.total())
    }

    fn precision(&self) -> f64 {
        ratio(self.tp, self.tp + self.fp)
    }

    fn recall(&self) -> f64 {
        ratio(self.tp, self.tp + self.fn_)
    }

    fn f1(&self) -> f64 {
        ratio(2 * self.tp, 2 * self.tp + self.fp + self.fn_)
    }
}

/// Zero denominators score 1.0.
fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        1.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Compute the metrics report for `results` over the label set `classes`.
pub fn classification_metrics(results: &[ItemResult], classes: &[String]) -> MetricsReport {
    let mut rows = Vec::with_capacity(classes.len() + 2);
    let mut micro = Counts::default();
    let mut exact_matches = 0usize;
    let (mut macro_p, mut macro_r, mut macro_f1) = (0.0, 0.0, 0.0);

    for class in classes {
        let mut counts = Counts::default();
        for item in results {
            let actual = item.target_classes.iter().any(|c| c == class);
            let predicted = item.predicted_classes.iter().any(|c| c == class);
            counts.add(actual, predicted);
            micro.add(actual, predicted);
        }

        macro_p += counts.precision();
        macro_r += counts.recall();
        macro_f1 += counts.f1();

        rows.push(MetricsRow {
            class: class.clone(),
            accuracy: counts.accuracy(),
            precision: counts.precision(),
            recall: counts.recall(),
            f1: counts.f1(),
        });
    }

    for item in results {
        let matches = classes.iter().all(|class| {
            item.target_classes.iter().any(|c| c == class)
                == item.predicted_classes.iter().any(|c| c == class)
        });
        if matches {
            exact_matches += 1;
        }
    }

    let n_classes = classes.len().max(1) as f64;
    rows.push(MetricsRow {
        class: "Macro-Average".to_string(),
        accuracy: ratio(exact_matches, results.len()),
        precision: macro_p / n_classes,
        recall: macro_r / n_classes,
        f1: macro_f1 / n_classes,
    });

    rows.push(MetricsRow {
        class: "Micro-Average".to_string(),
        accuracy: micro.accuracy(),
        precision: micro.precision(),
        recall: micro.recall(),
        f1: micro.f1(),
    });

    MetricsReport { rows }
}

impl MetricsReport {
    /// Write the report as a semicolon-separated CSV file.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b';')
            .from_path(path)
            .map_err(|e| FewshotError::Internal(format!("Failed to create {}: {e}", path.display())))?;

        writer
            .write_record(["Class", "Accuracy", "Precision", "Recall", "F1"])
            .map_err(|e| FewshotError::Internal(format!("Failed to write metrics: {e}")))?;

        for row in &self.rows {
            writer
                .write_record([
                    row.class.as_str(),
                    &format!("{:.4}", row.accuracy),
                    &format!("{:.4}", row.precision),
                    &format!("{:.4}", row.recall),
                    &format!("{:.4}", row.f1),
                ])
                .map_err(|e| FewshotError::Internal(format!("Failed to write metrics: {e}")))?;
        }

        writer
            .flush()
            .map_err(|e| FewshotError::io("flushing metrics file", e))
    }
}
