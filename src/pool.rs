//! Question pool model - categories of interchangeable MCQ variants

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{MucherError, MucherResult};

/// One variant of a prompt. `answers[0]` is always the correct answer;
/// the vector length is the validated answer count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub category: String,
    pub prompt: String,
    pub answers: Vec<String>,
}

/// Reference to one question variant, rendered as "<category>-<index>".
/// This is also the generator's question-file naming convention.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QuestionRef {
    pub category: String,
    pub index: usize,
}

impl QuestionRef {
    pub fn new(category: impl Into<String>, index: usize) -> Self {
        Self {
            category: category.into(),
            index,
        }
    }

    /// Parse a "<category>-<index>" token. Category names may themselves
    /// contain hyphens, so the split is on the last one.
    pub fn parse(token: &str) -> Option<Self> {
        let (category, index) = token.rsplit_once('-')?;
        if category.is_empty() {
            return None;
        }
        let index = index.parse().ok()?;
        Some(Self {
            category: category.to_string(),
            index,
        })
    }
}

impl fmt::Display for QuestionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.category, self.index)
    }
}

/// Normalized question bank: category name -> ordered variants.
/// Categories are kept in a BTreeMap so every iteration is name-ordered,
/// which keeps the generated control file byte-stable.
#[derive(Debug, Clone, Default)]
pub struct QuestionPool {
    categories: BTreeMap<String, Vec<Question>>,
}

impl QuestionPool {
    /// Name-ordered iteration over categories and their variants
    pub fn categories(&self) -> impl Iterator<Item = (&str, &[Question])> {
        self.categories
            .iter()
            .map(|(name, questions)| (name.as_str(), questions.as_slice()))
    }

    pub fn questions(&self, category: &str) -> Option<&[Question]> {
        self.categories.get(category).map(Vec::as_slice)
    }

    /// Number of categories
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Total number of question variants across all categories
    pub fn question_count(&self) -> usize {
        self.categories.values().map(Vec::len).sum()
    }
}

/// Build a QuestionPool from stringified sheet rows.
///
/// One sheet is one category. The first row is a human-readable header and
/// is skipped; each following row is one question: prompt, correct answer,
/// alternative columns, and a trailing declared answer count. Fully blank
/// rows are ignored. Pure parse: the pool is fully materialized or the
/// first offending row aborts with a diagnostic.
pub fn pool_from_sheets(sheets: &[(String, Vec<Vec<String>>)]) -> MucherResult<QuestionPool> {
    let mut categories = BTreeMap::new();

    for (sheet, rows) in sheets {
        let mut questions = Vec::new();

        for (i, cells) in rows.iter().enumerate().skip(1) {
            // 1-based row number as shown by spreadsheet applications
            let row = i + 1;
            if cells.iter().all(|c| c.is_empty()) {
                continue;
            }
            questions.push(parse_question_row(sheet, row, cells)?);
        }

        if questions.is_empty() {
            return Err(MucherError::EmptyCategory {
                sheet: sheet.clone(),
            });
        }
        categories.insert(sheet.clone(), questions);
    }

    Ok(QuestionPool { categories })
}

fn parse_question_row(sheet: &str, row: usize, cells: &[String]) -> MucherResult<Question> {
    let malformed = |reason: String| MucherError::MalformedQuestion {
        sheet: sheet.to_string(),
        row,
        reason,
    };

    // prompt, correct answer, at least one alternative, answer count
    if cells.len() < 4 {
        return Err(malformed(format!(
            "{} columns, expected at least 4 (prompt, correct answer, alternatives, answer count)",
            cells.len()
        )));
    }

    let count_cell = &cells[cells.len() - 1];
    let count: usize = count_cell
        .parse()
        .map_err(|_| malformed(format!("unparseable answer count '{}'", count_cell)))?;
    if count < 2 {
        return Err(malformed(format!(
            "declared answer count {} is less than 2",
            count
        )));
    }

    let alternative_slots = cells.len() - 3;
    if count - 1 > alternative_slots {
        return Err(malformed(format!(
            "declared answer count {} exceeds the {} alternative columns",
            count, alternative_slots
        )));
    }

    let prompt = cells[0].clone();
    if prompt.is_empty() {
        return Err(malformed("empty prompt cell".to_string()));
    }
    let correct = cells[1].clone();
    if correct.is_empty() {
        return Err(malformed("empty correct-answer cell".to_string()));
    }

    let mut answers = Vec::with_capacity(count);
    answers.push(correct);
    for slot in 0..count - 1 {
        let cell = &cells[2 + slot];
        if cell.is_empty() {
            return Err(malformed(format!(
                "answer count {} declared but alternative column {} is empty",
                count,
                slot + 1
            )));
        }
        answers.push(cell.clone());
    }

    // anything non-empty between the declared count and the count column is
    // ambiguous trailing data
    for cell in &cells[2 + (count - 1)..cells.len() - 1] {
        if !cell.is_empty() {
            return Err(malformed(format!(
                "non-empty cell '{}' beyond the declared answer count {}",
                cell, count
            )));
        }
    }

    Ok(Question {
        category: sheet.to_string(),
        prompt,
        answers,
    })
}
