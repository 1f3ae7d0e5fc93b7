//! Answer key: serial -> correct-answer labels, with durable CSV persistence
//! so grading can run in a later process.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use csv::{ReaderBuilder, WriterBuilder};
use log::debug;

use crate::error::{MucherError, MucherResult};
use crate::generator::SerializedVariant;
use crate::pool::QuestionRef;

/// Key material for one serial: which variants were drawn and, per position,
/// the correct-answer label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEntry {
    pub questions: Vec<QuestionRef>,
    pub labels: Vec<String>,
}

/// The grading ground truth: one entry per generated exam instance
#[derive(Debug, Clone, Default)]
pub struct AnswerKey {
    entries: BTreeMap<u64, KeyEntry>,
}

impl AnswerKey {
    /// Fold generator variants into a key. Two variants claiming the same
    /// serial indicate a generator malfunction or a stale artifact, so the
    /// build fails and no partial key escapes.
    pub fn build(variants: Vec<SerializedVariant>) -> MucherResult<Self> {
        let mut entries = BTreeMap::new();
        for variant in variants {
            let serial = variant.serial;
            let entry = KeyEntry {
                questions: variant.questions,
                labels: variant.labels,
            };
            if entries.insert(serial, entry).is_some() {
                return Err(MucherError::DuplicateSerial(serial));
            }
        }
        Ok(Self { entries })
    }

    pub fn get(&self, serial: u64) -> Option<&KeyEntry> {
        self.entries.get(&serial)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn serials(&self) -> impl Iterator<Item = u64> + '_ {
        self.entries.keys().copied()
    }

    /// All category names referenced by the key, sorted
    pub fn categories(&self) -> BTreeSet<String> {
        self.entries
            .values()
            .flat_map(|entry| entry.questions.iter())
            .map(|q| q.category.clone())
            .collect()
    }

    /// Write the distributable key table: one row per serial holding the
    /// serial number, the space-joined question refs, then one column per
    /// question position with its correct-answer label.
    pub fn write_csv(&self, path: &Path) -> MucherResult<()> {
        let mut writer = WriterBuilder::new().flexible(true).from_path(path)?;
        writer.write_record(["serial", "questions", "answers"])?;

        for (serial, entry) in &self.entries {
            let questions = entry
                .questions
                .iter()
                .map(QuestionRef::to_string)
                .collect::<Vec<_>>()
                .join(" ");
            let mut record = vec![serial.to_string(), questions];
            record.extend(entry.labels.iter().cloned());
            writer.write_record(&record)?;
        }
        writer.flush()?;
        debug!("Answer key written: {}", path.display());
        Ok(())
    }

    /// Read a key table back. The artifact is self-contained: everything
    /// grading needs (labels and category refs) lives in the file.
    pub fn read_csv(path: &Path) -> MucherResult<Self> {
        let malformed = |reason: String| MucherError::KeyArtifactMalformed {
            path: path.display().to_string(),
            reason,
        };

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)?;

        let mut entries = BTreeMap::new();
        for (i, record) in reader.records().enumerate() {
            let record = record?;
            // 1-based row number, header included
            let row = i + 2;
            if record.len() < 3 {
                return Err(malformed(format!(
                    "row {}: expected serial, questions and labels",
                    row
                )));
            }

            let serial: u64 = record[0]
                .trim()
                .parse()
                .map_err(|_| malformed(format!("row {}: unparseable serial '{}'", row, &record[0])))?;

            let questions = record[1]
                .split_whitespace()
                .map(|token| {
                    QuestionRef::parse(token).ok_or_else(|| {
                        malformed(format!("row {}: malformed question ref '{}'", row, token))
                    })
                })
                .collect::<MucherResult<Vec<_>>>()?;

            let mut labels = Vec::new();
            for cell in record.iter().skip(2) {
                let label = cell.trim();
                if label.is_empty() {
                    return Err(malformed(format!("row {}: empty answer label", row)));
                }
                labels.push(label.to_ascii_uppercase());
            }

            if questions.len() != labels.len() {
                return Err(malformed(format!(
                    "row {}: {} questions but {} labels",
                    row,
                    questions.len(),
                    labels.len()
                )));
            }
            if entries
                .insert(
                    serial,
                    KeyEntry {
                        questions,
                        labels,
                    },
                )
                .is_some()
            {
                return Err(MucherError::DuplicateSerial(serial));
            }
        }
        Ok(Self { entries })
    }
}
