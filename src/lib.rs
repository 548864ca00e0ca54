//! Pen Pal Pairing - matching and pairing-consistency engine
//!
//! This library pairs students (or whole schools and school groups) for pen pal
//! exchanges. It provides the greedy compatibility matcher and the guard that
//! keeps organization-level pairings symmetric and irreversible once
//! correspondence has begun.

pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use crate::core::{Matcher, PairingGuard, calculate_compatibility};
pub use error::{PairingError, StoreError};
pub use models::{Candidate, CounterpartRef, EntityRef, Match, MatchOutcome, MatchSummary, PairingState, ScoringWeights};
pub use services::{InMemoryStore, PairingStore, PostgresStore};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        let a = Candidate::new("a", 5, &["art"], "s1");
        let b = Candidate::new("b", 5, &["art"], "s2");
        let (score, _) = calculate_compatibility(&a, &b, &ScoringWeights::default());
        assert_eq!(score, 15);
    }
}
