//! Mucher - randomized multiple-choice exam generation and grading
//!
//! Wraps the external 'much' randomizer: parses a spreadsheet question bank
//! into a normalized pool, drives 'much' to produce seed-reproducible exam
//! variants, reconciles its output into a durable answer key, and later
//! grades submitted answer sheets against that key with per-category
//! statistics for the chart renderer.

pub mod config;
pub mod error;
pub mod excel;
pub mod generator;
pub mod grading;
pub mod key;
pub mod latex;
pub mod pool;
pub mod report;

pub use config::{ExamConfig, GenerationSpec, UsagePlan};
pub use error::{MucherError, MucherResult, SubmissionError};
pub use excel::{load_question_pool, load_sheet_rows};
pub use generator::{ExamGenerator, MuchProcess, Randomizer, SerializedVariant};
pub use grading::{
    CategoryTally, ExamGrader, GradingResult, ScoringPolicy, SubmissionRow, MISSING_ANSWER,
};
pub use key::{AnswerKey, KeyEntry};
pub use pool::{pool_from_sheets, Question, QuestionPool, QuestionRef};
pub use report::{build_report, write_report_json};
