// Core algorithm exports
pub mod guard;
pub mod matcher;
pub mod scoring;
pub mod summary;

pub use guard::PairingGuard;
pub use matcher::{Matcher, MatchResult};
pub use scoring::{calculate_compatibility, shared_interests};
