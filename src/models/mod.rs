// Model exports
pub mod domain;
pub mod outcomes;

pub use domain::{AssignmentRecord, Candidate, CounterpartKind, CounterpartRef, EntityRef, Group, Match, Organization, PairingState, ScoringWeights, Status};
pub use outcomes::{MatchOutcome, MatchSummary};
