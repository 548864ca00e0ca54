use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use crate::models::domain::{Candidate, Match};

/// Reporting statistics for a matching run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSummary {
    #[serde(rename = "poolASize")]
    pub pool_a_size: usize,
    #[serde(rename = "poolBSize")]
    pub pool_b_size: usize,
    #[serde(rename = "matchedPairs")]
    pub matched_pairs: usize,
    #[serde(rename = "unmatchedA")]
    pub unmatched_a: Vec<String>,
    #[serde(rename = "unmatchedB")]
    pub unmatched_b: Vec<String>,
    #[serde(rename = "totalScore")]
    pub total_score: u64,
    #[serde(rename = "averageScore")]
    pub average_score: f64,
    #[serde(rename = "minScore")]
    pub min_score: Option<u32>,
    #[serde(rename = "maxScore")]
    pub max_score: Option<u32>,
    #[serde(rename = "zeroScoreMatches")]
    pub zero_score_matches: usize,
    /// Number of matches sharing each interest tag
    #[serde(rename = "interestCounts")]
    pub interest_counts: BTreeMap<String, usize>,
}

/// Everything a matching run produces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchOutcome {
    pub matches: Vec<Match>,
    #[serde(rename = "unmatchedA")]
    pub unmatched_a: Vec<Candidate>,
    #[serde(rename = "unmatchedB")]
    pub unmatched_b: Vec<Candidate>,
    pub summary: MatchSummary,
}
