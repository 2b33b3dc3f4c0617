//! Coverage aggregation.

use serde::{Deserialize, Serialize};

use crate::models::CoverageResult;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoverageSummary {
    /// Percentage of covered queries, `0.0` when there are none.
    pub score: f64,
    pub covered_count: usize,
    pub total_count: usize,
}

pub fn aggregate(results: &[CoverageResult]) -> CoverageSummary {
    let total_count = results.len();
    let covered_count = results.iter().filter(|r| r.covered).count();
    let score = if total_count == 0 {
        0.0
    } else {
        covered_count as f64 / total_count as f64 * 100.0
    };
    CoverageSummary {
        score,
        covered_count,
        total_count,
    }
}
