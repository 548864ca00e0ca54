use crate::models::{Candidate, ScoringWeights};

/// Calculate the compatibility score of two candidates
///
/// Scoring formula (default weights):
/// score = (
///     10 * |shared interests| +     # Each common tag
///     5 if same grade,              # Proximity bonus
///     2 if grades differ by one
/// )
///
/// Returns the score together with the shared tags, listed in the order
/// they appear on `a`. The score is symmetric in `a` and `b`.
pub fn calculate_compatibility(
    a: &Candidate,
    b: &Candidate,
    weights: &ScoringWeights,
) -> (u32, Vec<String>) {
    let shared = shared_interests(a, b);
    let interest_score = weights.shared_interest * shared.len() as u32;
    let grade_score = calculate_grade_bonus(a.grade, b.grade, weights);

    (interest_score + grade_score, shared)
}

/// Tags present on both candidates, deduplicated
#[inline]
pub fn shared_interests(a: &Candidate, b: &Candidate) -> Vec<String> {
    let mut shared: Vec<String> = Vec::new();
    for tag in &a.interests {
        if b.interests.contains(tag) && !shared.contains(tag) {
            shared.push(tag.clone());
        }
    }
    shared
}

/// Proximity bonus for grade levels
#[inline]
fn calculate_grade_bonus(grade_a: u8, grade_b: u8, weights: &ScoringWeights) -> u32 {
    match grade_a.abs_diff(grade_b) {
        0 => weights.same_grade,
        1 => weights.adjacent_grade,
        _ => 0,
    }
}
