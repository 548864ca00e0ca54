use std::collections::BTreeMap;
use crate::core::matcher::MatchResult;
use crate::models::MatchSummary;

impl MatchSummary {
    /// Aggregate matcher output into reporting statistics
    ///
    /// Pool sizes are passed separately because the matcher consumes the pools.
    pub fn build(result: &MatchResult, pool_a_size: usize, pool_b_size: usize) -> Self {
        let matched_pairs = result.matches.len();
        let total_score: u64 = result.matches.iter().map(|m| m.score as u64).sum();

        let average_score = if matched_pairs > 0 {
            total_score as f64 / matched_pairs as f64
        } else {
            0.0
        };

        let mut interest_counts: BTreeMap<String, usize> = BTreeMap::new();
        for m in &result.matches {
            for tag in &m.shared_interests {
                *interest_counts.entry(tag.clone()).or_insert(0) += 1;
            }
        }

        Self {
            pool_a_size,
            pool_b_size,
            matched_pairs,
            unmatched_a: result.unmatched_a.iter().map(|c| c.id.clone()).collect(),
            unmatched_b: result.unmatched_b.iter().map(|c| c.id.clone()).collect(),
            total_score,
            average_score,
            min_score: result.matches.iter().map(|m| m.score).min(),
            max_score: result.matches.iter().map(|m| m.score).max(),
            zero_score_matches: result.matches.iter().filter(|m| m.score == 0).count(),
            interest_counts,
        }
    }

    /// Share of the smaller pool that found a partner (0.0 - 1.0)
    pub fn coverage(&self) -> f64 {
        let smaller = self.pool_a_size.min(self.pool_b_size);
        if smaller == 0 {
            return 0.0;
        }
        self.matched_pairs as f64 / smaller as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Candidate, Match};

    fn sample_result() -> MatchResult {
        MatchResult {
            matches: vec![
                Match {
                    candidate_a: "a1".to_string(),
                    candidate_b: "b1".to_string(),
                    shared_interests: vec!["art".to_string()],
                    score: 15,
                },
                Match {
                    candidate_a: "a2".to_string(),
                    candidate_b: "b2".to_string(),
                    shared_interests: vec!["art".to_string(), "music".to_string()],
                    score: 20,
                },
                Match {
                    candidate_a: "a3".to_string(),
                    candidate_b: "b3".to_string(),
                    shared_interests: vec![],
                    score: 0,
                },
            ],
            unmatched_a: vec![Candidate::new("a4", 5, &[], "s1")],
            unmatched_b: vec![],
        }
    }

    #[test]
    fn test_build_summary() {
        let summary = MatchSummary::build(&sample_result(), 4, 3);

        assert_eq!(summary.matched_pairs, 3);
        assert_eq!(summary.total_score, 35);
        assert!((summary.average_score - 35.0 / 3.0).abs() < 1e-9);
        assert_eq!(summary.min_score, Some(0));
        assert_eq!(summary.max_score, Some(20));
        assert_eq!(summary.zero_score_matches, 1);
        assert_eq!(summary.unmatched_a, vec!["a4"]);
        assert!(summary.unmatched_b.is_empty());
        assert_eq!(summary.interest_counts.get("art"), Some(&2));
        assert_eq!(summary.interest_counts.get("music"), Some(&1));
        assert_eq!(summary.coverage(), 1.0);
    }

    #[test]
    fn test_empty_summary() {
        let empty = MatchResult { matches: vec![], unmatched_a: vec![], unmatched_b: vec![] };
        let summary = MatchSummary::build(&empty, 0, 0);

        assert_eq!(summary.average_score, 0.0);
        assert_eq!(summary.min_score, None);
        assert_eq!(summary.max_score, None);
        assert_eq!(summary.coverage(), 0.0);
    }
}
