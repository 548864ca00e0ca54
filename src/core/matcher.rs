use crate::models::{Candidate, Match, MatchOutcome, MatchSummary, ScoringWeights};
use crate::core::scoring::calculate_compatibility;

/// Result of the greedy assignment
#[derive(Debug)]
pub struct MatchResult {
    pub matches: Vec<Match>,
    pub unmatched_a: Vec<Candidate>,
    pub unmatched_b: Vec<Candidate>,
}

/// A scored entry of the A x B cross product
struct ScoredPair {
    a: usize,
    b: usize,
    score: u32,
    shared_interests: Vec<String>,
}

/// Greedy one-to-one matcher between two candidate pools
///
/// # Pipeline Stages
/// 1. Score the full cross product A x B
/// 2. Stable sort by descending score (ties keep A-major enumeration order)
/// 3. Accept pairs whose members are both still free
///
/// This is deliberately not a maximum-weight matching; which exact pairs
/// form is observable and must stay greedy.
#[derive(Debug, Clone)]
pub struct Matcher {
    weights: ScoringWeights,
}

impl Matcher {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn with_default_weights() -> Self {
        Self {
            weights: ScoringWeights::default(),
        }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Pair candidates from `pool_a` with candidates from `pool_b`
    ///
    /// # Arguments
    /// * `pool_a` - First pool, enumerated first for tie-breaking
    /// * `pool_b` - Second pool
    ///
    /// # Returns
    /// MatchResult with disjoint matches and both unmatched residues,
    /// each residue in its original pool order
    pub fn assign(&self, pool_a: Vec<Candidate>, pool_b: Vec<Candidate>) -> MatchResult {
        let mut pairs: Vec<ScoredPair> = Vec::with_capacity(pool_a.len() * pool_b.len());
        for (ai, a) in pool_a.iter().enumerate() {
            for (bi, b) in pool_b.iter().enumerate() {
                let (score, shared_interests) = calculate_compatibility(a, b, &self.weights);
                pairs.push(ScoredPair { a: ai, b: bi, score, shared_interests });
            }
        }

        // sort_by is stable
        pairs.sort_by(|x, y| y.score.cmp(&x.score));

        let mut taken_a = vec![false; pool_a.len()];
        let mut taken_b = vec![false; pool_b.len()];
        let mut matches = Vec::with_capacity(pool_a.len().min(pool_b.len()));

        for pair in pairs {
            if taken_a[pair.a] || taken_b[pair.b] {
                continue;
            }
            taken_a[pair.a] = true;
            taken_b[pair.b] = true;
            matches.push(Match {
                candidate_a: pool_a[pair.a].id.clone(),
                candidate_b: pool_b[pair.b].id.clone(),
                shared_interests: pair.shared_interests,
                score: pair.score,
            });
        }

        let unmatched_a = pool_a
            .into_iter()
            .zip(taken_a)
            .filter_map(|(candidate, taken)| (!taken).then_some(candidate))
            .collect();
        let unmatched_b = pool_b
            .into_iter()
            .zip(taken_b)
            .filter_map(|(candidate, taken)| (!taken).then_some(candidate))
            .collect();

        MatchResult {
            matches,
            unmatched_a,
            unmatched_b,
        }
    }

    /// Run the matcher and build its summary
    pub fn match_candidates(&self, pool_a: Vec<Candidate>, pool_b: Vec<Candidate>) -> MatchOutcome {
        let pool_a_size = pool_a.len();
        let pool_b_size = pool_b.len();

        let result = self.assign(pool_a, pool_b);
        let summary = MatchSummary::build(&result, pool_a_size, pool_b_size);

        MatchOutcome {
            matches: result.matches,
            unmatched_a: result.unmatched_a,
            unmatched_b: result.unmatched_b,
            summary,
        }
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Self::with_default_weights()
    }
}
