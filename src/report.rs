//! Report data for the external chart renderer: stacked per-category counts
//! in a stable name ordering.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use log::debug;

use crate::error::MucherResult;
use crate::grading::{CategoryTally, GradingResult};

/// Sum per-category tallies across all graded rows. Every supplied category
/// is present in the output, at zero if nothing was graded for it; the
/// BTreeMap keeps the name ordering the chart layout relies on.
pub fn build_report<'a>(
    results: &[GradingResult],
    categories: impl IntoIterator<Item = &'a str>,
) -> BTreeMap<String, CategoryTally> {
    let mut report: BTreeMap<String, CategoryTally> = categories
        .into_iter()
        .map(|category| (category.to_string(), CategoryTally::default()))
        .collect();

    for result in results {
        for (category, tally) in &result.tally {
            let total = report.entry(category.clone()).or_default();
            total.correct += tally.correct;
            total.missing += tally.missing;
            total.incorrect += tally.incorrect;
        }
    }
    report
}

/// Emit the report as pretty JSON, the data contract the chart collaborator
/// consumes.
pub fn write_report_json(path: &Path, report: &BTreeMap<String, CategoryTally>) -> MucherResult<()> {
    let json = serde_json::to_string_pretty(report)?;
    fs::write(path, json)?;
    debug!("Report data written: {}", path.display());
    Ok(())
}
