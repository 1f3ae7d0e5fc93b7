//! Run configuration - YAML-backed settings for generation and grading

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::MucherResult;
use crate::grading::ScoringPolicy;

/// Configuration for exam generation and grading. Every field has a default,
/// so a partial YAML file works.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExamConfig {
    /// Excel workbook with one sheet per question category
    pub question_file: String,
    /// Spreadsheet with student submissions (xlsx or csv)
    pub results_file: String,
    /// Answer key artifact, relative to `output_dir`
    pub answer_key_file: String,
    /// Per-category report data for the chart renderer, relative to `output_dir`
    pub report_file: String,
    pub output_dir: String,
    /// Name of the external randomizer binary
    pub much_binary: String,
    /// Number of exam instances to generate
    pub num_variants: usize,
    /// First serial number assigned
    pub serial_start: u64,
    /// Random seed handed to the randomizer; same seed, same pool, same output
    pub seed: i64,
    /// Questions drawn per category per instance
    pub usage_per_category: u32,
    /// Per-category overrides of `usage_per_category`
    pub usage_overrides: BTreeMap<String, u32>,
    pub points_correct: f64,
    pub points_missing: f64,
    pub points_incorrect: f64,
    /// Run pdflatex on the generated document
    pub compile_pdf: bool,
    /// Remove the scratch directory after generation
    pub cleanup_temp: bool,
}

impl Default for ExamConfig {
    fn default() -> Self {
        Self {
            question_file: "questionario.xlsx".to_string(),
            results_file: "elaborati.xlsx".to_string(),
            answer_key_file: "answer_key.csv".to_string(),
            report_file: "report.json".to_string(),
            output_dir: ".".to_string(),
            much_binary: "much".to_string(),
            num_variants: 30,
            serial_start: 10,
            seed: 42,
            usage_per_category: 1,
            usage_overrides: BTreeMap::new(),
            points_correct: 4.0,
            points_missing: 1.0,
            points_incorrect: 0.0,
            compile_pdf: true,
            cleanup_temp: true,
        }
    }
}

impl ExamConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml(path: &Path) -> MucherResult<Self> {
        info!("Loading configuration from {}", path.display());
        let text = fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&text)?)
    }

    /// Save configuration as YAML (used for the template config)
    pub fn to_yaml(&self, path: &Path) -> MucherResult<()> {
        info!("Saving configuration to {}", path.display());
        fs::write(path, serde_yaml::to_string(self)?)?;
        Ok(())
    }

    /// The generation-side view of this configuration
    pub fn generation_spec(&self) -> GenerationSpec {
        GenerationSpec {
            num_variants: self.num_variants,
            seed: self.seed,
            serial_start: self.serial_start,
            usage: UsagePlan {
                default: self.usage_per_category,
                overrides: self.usage_overrides.clone(),
            },
        }
    }

    /// The grading-side view of this configuration
    pub fn scoring_policy(&self) -> ScoringPolicy {
        ScoringPolicy {
            points_correct: self.points_correct,
            points_missing: self.points_missing,
            points_incorrect: self.points_incorrect,
        }
    }
}

/// Immutable parameters for one generation run
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSpec {
    pub num_variants: usize,
    pub seed: i64,
    pub serial_start: u64,
    pub usage: UsagePlan,
}

/// How many questions to draw per category, with per-category overrides
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UsagePlan {
    pub default: u32,
    pub overrides: BTreeMap<String, u32>,
}

impl UsagePlan {
    pub fn for_category(&self, category: &str) -> u32 {
        self.overrides.get(category).copied().unwrap_or(self.default)
    }
}
