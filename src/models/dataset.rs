//! Dataset model: labeled entries loaded from CSV.
//!
//! Rows are rendered into the text form the prompt builders consume:
//! feature columns become the input text, class columns join into the
//! output text. A `split` column, when present, predefines train/test
//! membership; otherwise the split is a seeded shuffle.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::models::{Config, Example, FewshotError, Result};

/// Predefined split membership of a dataset row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Test,
}

/// One labeled dataset row in prompt-ready text form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetEntry {
    /// "label: value; label2: value2" in table format, raw joined text otherwise
    pub input_text: String,
    /// Class labels joined with ", "
    pub output_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub split: Option<Split>,
}

impl DatasetEntry {
    /// Individual feature fields of the input text.
    pub fn features(&self) -> Vec<&str> {
        self.input_text.split("; ").collect()
    }

    /// Class labels of this entry.
    pub fn classes(&self) -> Vec<&str> {
        self.output_text.split(", ").collect()
    }

    /// The few-shot example this entry contributes to a prompt.
    pub fn to_example(&self) -> Example {
        Example::new(self.input_text.clone(), self.output_text.clone())
    }
}

/// An ordered collection of labeled entries.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub entries: Vec<DatasetEntry>,
    has_predefined_split: bool,
}

impl Dataset {
    pub fn new(entries: Vec<DatasetEntry>) -> Self {
        let has_predefined_split = entries.iter().any(|e| e.split.is_some());
        Self {
            entries,
            has_predefined_split,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Load a dataset from a CSV file.
    pub fn from_csv_path(path: &Path, config: &Config) -> Result<Self> {
        let reader = csv::Reader::from_path(path)
            .map_err(|e| FewshotError::Dataset(format!("Failed to open {}: {e}", path.display())))?;
        Self::from_csv_reader(reader, config)
    }

    /// Load a dataset from CSV text (used by tests and in-memory callers).
    pub fn from_csv_str(data: &str, config: &Config) -> Result<Self> {
        Self::from_csv_reader(csv::Reader::from_reader(data.as_bytes()), config)
    }

    fn from_csv_reader<R: std::io::Read>(mut reader: csv::Reader<R>, config: &Config) -> Result<Self> {
        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| FewshotError::Dataset(format!("Failed to read CSV headers: {e}")))?
            .iter()
            .map(str::to_string)
            .collect();

        let split_column = headers.iter().position(|h| h == "split");
        let class_columns: Vec<usize> = headers
            .iter()
            .enumerate()
            .filter(|(_, h)| config.classes.iter().any(|c| c == *h))
            .map(|(i, _)| i)
            .collect();
        let feature_columns: Vec<usize> = (0..headers.len())
            .filter(|i| !class_columns.contains(i) && Some(*i) != split_column)
            .collect();

        let mut entries = Vec::new();
        for (row_num, record) in reader.records().enumerate() {
            let record = record.map_err(|e| {
                FewshotError::Dataset(format!("Row {}: {e}", row_num + 2))
            })?;

            let input_text = if config.pure_text() {
                feature_columns
                    .iter()
                    .filter_map(|&i| record.get(i))
                    .collect::<Vec<_>>()
                    .join(" ")
            } else {
                feature_columns
                    .iter()
                    .filter_map(|&i| record.get(i).map(|v| format!("{}: {}", headers[i], v)))
                    .collect::<Vec<_>>()
                    .join("; ")
            };

            let output_text = class_columns
                .iter()
                .filter(|&&i| record.get(i).is_some_and(is_truthy))
                .map(|&i| headers[i].as_str())
                .collect::<Vec<_>>()
                .join(", ");

            let split = split_column
                .and_then(|i| record.get(i))
                .and_then(|v| match v.trim() {
                    "train" => Some(Split::Train),
                    "test" => Some(Split::Test),
                    _ => None,
                });

            entries.push(DatasetEntry {
                input_text,
                output_text,
                split,
            });
        }

        Ok(Self::new(entries))
    }

    /// Split into (train, test).
    ///
    /// Honors a predefined `split` column when present; otherwise a
    /// seeded shuffle holds out `test_size` of the entries.
    pub fn train_test_split(&self, test_size: f64, seed: u64) -> (Dataset, Dataset) {
        if self.has_predefined_split {
            let train = self
                .entries
                .iter()
                .filter(|e| e.split == Some(Split::Train))
                .cloned()
                .collect();
            let test = self
                .entries
                .iter()
                .filter(|e| e.split == Some(Split::Test))
                .cloned()
                .collect();
            return (Dataset::new(train), Dataset::new(test));
        }

        let mut shuffled = self.entries.clone();
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        shuffled.shuffle(&mut rng);

        let n_test = ((self.entries.len() as f64) * test_size).ceil() as usize;
        let n_test = n_test.min(shuffled.len());
        let test = shuffled.split_off(shuffled.len() - n_test);

        (Dataset::new(shuffled), Dataset::new(test))
    }
}

/// A CSV cell counts as truthy unless empty, zero, or an explicit "no".
fn is_truthy(cell: &str) -> bool {
    let cell = cell.trim();
    !(cell.is_empty() || matches!(cell.to_ascii_lowercase().as_str(), "0" | "false" | "no"))
}
