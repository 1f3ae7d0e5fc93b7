//! Grading engine: submitted answers vs the answer key under a flat
//! scoring policy, with per-category tallies.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use csv::WriterBuilder;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::config::ExamConfig;
use crate::error::{MucherError, MucherResult, SubmissionError};
use crate::excel;
use crate::key::AnswerKey;
use crate::report;

/// Sentinel label for "no answer given"
pub const MISSING_ANSWER: &str = "-";

/// Point values per answer classification. May be fractional or negative;
/// scores are never clamped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringPolicy {
    pub points_correct: f64,
    pub points_missing: f64,
    pub points_incorrect: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerClass {
    Correct,
    Missing,
    Incorrect,
}

/// Classify one given label against the key's label for that position
pub fn classify(given: &str, correct: &str) -> AnswerClass {
    if given == MISSING_ANSWER {
        AnswerClass::Missing
    } else if given.eq_ignore_ascii_case(correct) {
        AnswerClass::Correct
    } else {
        AnswerClass::Incorrect
    }
}

/// One student's submitted answers. `row` is the 1-based source row used in
/// diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRow {
    pub row: usize,
    pub student: String,
    pub serial: u64,
    pub given: Vec<String>,
}

/// Correct/missing/incorrect counters for one category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTally {
    pub correct: u32,
    pub missing: u32,
    pub incorrect: u32,
}

/// Grading outcome for one submission row
#[derive(Debug, Clone, PartialEq)]
pub struct GradingResult {
    pub row: usize,
    pub student: String,
    pub serial: u64,
    pub score: f64,
    pub tally: BTreeMap<String, CategoryTally>,
}

/// Convert raw sheet rows into submission rows. The first row is a header;
/// blank rows are skipped; structurally broken rows become accumulated
/// errors rather than aborting the batch.
pub fn rows_from_cells(cells: &[Vec<String>]) -> (Vec<SubmissionRow>, Vec<SubmissionError>) {
    let mut rows = Vec::new();
    let mut errors = Vec::new();

    for (i, record) in cells.iter().enumerate().skip(1) {
        let row = i + 1;
        if record.iter().all(|c| c.is_empty()) {
            continue;
        }
        if record.len() < 3 {
            errors.push(SubmissionError::MalformedSubmission {
                row,
                reason: format!(
                    "{} columns, expected student, serial and at least one answer",
                    record.len()
                ),
            });
            continue;
        }

        let serial: u64 = match record[1].parse() {
            Ok(serial) => serial,
            Err(_) => {
                errors.push(SubmissionError::MalformedSubmission {
                    row,
                    reason: format!("unparseable serial '{}'", record[1]),
                });
                continue;
            }
        };

        // trailing blank cells are sheet padding, not answers
        let mut given: Vec<String> = record[2..]
            .iter()
            .map(|cell| cell.trim().to_ascii_uppercase())
            .collect();
        while given.last().map(String::is_empty).unwrap_or(false) {
            given.pop();
        }
        if given.is_empty() {
            errors.push(SubmissionError::MalformedSubmission {
                row,
                reason: "no answers given".to_string(),
            });
            continue;
        }
        if let Some(pos) = given.iter().position(String::is_empty) {
            errors.push(SubmissionError::MalformedSubmission {
                row,
                reason: format!("empty answer cell at position {} (use '-' for no answer)", pos + 1),
            });
            continue;
        }

        rows.push(SubmissionRow {
            row,
            student: record[0].clone(),
            serial,
            given,
        });
    }
    (rows, errors)
}

/// Grade each row independently against the key. Output order matches input
/// order; rows that fail to resolve are collected as errors and do not stop
/// the rest of the batch.
pub fn grade_batch(
    key: &AnswerKey,
    rows: &[SubmissionRow],
    policy: &ScoringPolicy,
) -> (Vec<GradingResult>, Vec<SubmissionError>) {
    let mut results = Vec::new();
    let mut errors = Vec::new();

    for submission in rows {
        let entry = match key.get(submission.serial) {
            Some(entry) => entry,
            None => {
                errors.push(SubmissionError::UnknownSerial {
                    row: submission.row,
                    serial: submission.serial,
                });
                continue;
            }
        };
        if submission.given.len() != entry.labels.len() {
            errors.push(SubmissionError::MalformedSubmission {
                row: submission.row,
                reason: format!(
                    "{} answers given, serial {} expects {}",
                    submission.given.len(),
                    submission.serial,
                    entry.labels.len()
                ),
            });
            continue;
        }

        let mut score = 0.0;
        let mut tally: BTreeMap<String, CategoryTally> = BTreeMap::new();
        for ((given, correct), question) in submission
            .given
            .iter()
            .zip(&entry.labels)
            .zip(&entry.questions)
        {
            let counter = tally.entry(question.category.clone()).or_default();
            match classify(given, correct) {
                AnswerClass::Correct => {
                    score += policy.points_correct;
                    counter.correct += 1;
                }
                AnswerClass::Missing => {
                    score += policy.points_missing;
                    counter.missing += 1;
                }
                AnswerClass::Incorrect => {
                    score += policy.points_incorrect;
                    counter.incorrect += 1;
                }
            }
        }

        results.push(GradingResult {
            row: submission.row,
            student: submission.student.clone(),
            serial: submission.serial,
            score,
            tally,
        });
    }
    (results, errors)
}

/// Write the submission table back out with an appended score column.
/// Rows that did not grade keep their cells and get an empty score.
pub fn write_graded_table(
    path: &Path,
    cells: &[Vec<String>],
    results: &[GradingResult],
) -> MucherResult<()> {
    let scores: HashMap<usize, f64> = results.iter().map(|r| (r.row, r.score)).collect();

    let mut writer = WriterBuilder::new().flexible(true).from_path(path)?;
    for (i, record) in cells.iter().enumerate() {
        let row = i + 1;
        let mut out = record.clone();
        if i == 0 {
            out.push("score".to_string());
        } else {
            out.push(
                scores
                    .get(&row)
                    .map(|score| score.to_string())
                    .unwrap_or_default(),
            );
        }
        writer.write_record(&out)?;
    }
    writer.flush()?;
    Ok(())
}

/// Drives the grading pipeline: key load, submission load, grading, graded
/// table and report emission.
pub struct ExamGrader {
    config: ExamConfig,
}

impl ExamGrader {
    pub fn new(config: ExamConfig) -> Self {
        Self { config }
    }

    pub fn grade(&self) -> MucherResult<(Vec<GradingResult>, Vec<SubmissionError>)> {
        let out_dir = Path::new(&self.config.output_dir);
        let key = AnswerKey::read_csv(&out_dir.join(&self.config.answer_key_file))?;
        info!("Loaded answer key for {} serials", key.len());

        let results_path = Path::new(&self.config.results_file);
        let cells = excel::load_sheet_rows(results_path)?;
        if cells.is_empty() {
            return Err(MucherError::EmptySubmissions {
                path: results_path.display().to_string(),
            });
        }

        let (rows, mut errors) = rows_from_cells(&cells);
        let policy = self.config.scoring_policy();
        let (results, grade_errors) = grade_batch(&key, &rows, &policy);
        errors.extend(grade_errors);
        errors.sort_by_key(SubmissionError::row);

        let graded_path = out_dir.join(graded_file_name(results_path));
        write_graded_table(&graded_path, &cells, &results)?;
        info!("Saved graded results to {}", graded_path.display());

        let categories = key.categories();
        let data = report::build_report(&results, categories.iter().map(String::as_str));
        let report_path = out_dir.join(&self.config.report_file);
        report::write_report_json(&report_path, &data)?;
        info!("Saved category report to {}", report_path.display());

        for error in &errors {
            warn!("{}", error);
        }
        info!(
            "Graded {} submissions ({} rows skipped)",
            results.len(),
            errors.len()
        );
        Ok((results, errors))
    }
}

/// "elaborati.xlsx" -> "elaborati_corretti.csv"
fn graded_file_name(results_path: &Path) -> String {
    let stem = results_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("elaborati");
    format!("{}_corretti.csv", stem)
}
