//! Error types for pairing operations.

use thiserror::Error;

use crate::models::{CounterpartRef, EntityRef};

/// Errors raised by a [`PairingStore`](crate::services::PairingStore)
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("Not found: {0}")]
    NotFound(EntityRef),

    /// Compare-and-swap failed: the row no longer holds the expected counterpart
    #[error("Stale counterpart on {entity}: expected {expected}, found {actual}")]
    StaleCounterpart {
        entity: EntityRef,
        expected: CounterpartRef,
        actual: CounterpartRef,
    },

    #[error("Assignment records exist under {0}")]
    Locked(EntityRef),

    #[error("Corrupt counterpart columns on {0}")]
    CorruptCounterpart(EntityRef),

    #[error("Candidate {candidate} has out-of-range grade {grade}")]
    InvalidGrade { candidate: String, grade: i16 },

    #[error("Store lock poisoned")]
    Poisoned,
}

/// Errors returned to callers of the pairing guard
#[derive(Debug, Error)]
pub enum PairingError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(EntityRef),

    #[error("{entity} is already paired with {counterpart}")]
    AlreadyPaired {
        entity: EntityRef,
        counterpart: CounterpartRef,
    },

    #[error("{0} is not currently paired")]
    NotPaired(EntityRef),

    /// Correspondence has started under this entity
    #[error("{0} has delivered assignments; its pairing is locked")]
    LockedConflict(EntityRef),

    #[error("Transaction failed: {0}")]
    TransactionFailure(String),

    /// Stored data or the store itself is unusable; retrying will not help
    #[error("Store error: {0}")]
    Store(String),
}

impl PairingError {
    /// Caller supplied something unusable
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PairingError::InvalidInput(_) | PairingError::NotFound(_) | PairingError::NotPaired(_)
        )
    }

    /// Request conflicts with the current pairing state
    pub fn is_conflict(&self) -> bool {
        matches!(self, PairingError::AlreadyPaired { .. } | PairingError::LockedConflict(_))
    }

    /// Only a failed commit is worth retrying; state is unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, PairingError::TransactionFailure(_))
    }
}

impl PairingError {
    /// Convert an error raised by `PairingStore::apply`
    ///
    /// SQL errors there mean the batch did not commit, so they are retryable.
    /// Everywhere else the plain `From` conversion applies.
    pub fn from_apply(value: StoreError) -> Self {
        match value {
            StoreError::SqlxError(e) => PairingError::TransactionFailure(e.to_string()),
            other => other.into(),
        }
    }
}

impl From<StoreError> for PairingError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(entity) => PairingError::NotFound(entity),
            StoreError::Locked(entity) => PairingError::LockedConflict(entity),
            stale @ StoreError::StaleCounterpart { .. } => PairingError::TransactionFailure(stale.to_string()),
            other => PairingError::Store(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let locked = PairingError::LockedConflict(EntityRef::organization("s1"));
        assert!(locked.is_conflict());
        assert!(!locked.is_retryable());
        assert!(!locked.is_client_error());

        let not_paired = PairingError::NotPaired(EntityRef::group("g1"));
        assert!(not_paired.is_client_error());

        let failed = PairingError::TransactionFailure("deadlock".to_string());
        assert!(failed.is_retryable());
        assert!(!failed.is_conflict());
    }

    #[test]
    fn test_store_error_conversion() {
        let err: PairingError = StoreError::Locked(EntityRef::organization("s1")).into();
        assert!(matches!(err, PairingError::LockedConflict(_)));

        let err: PairingError = StoreError::Poisoned.into();
        assert!(matches!(err, PairingError::Store(_)));
        assert!(!err.is_retryable());

        let err: PairingError = StoreError::StaleCounterpart {
            entity: EntityRef::organization("s1"),
            expected: CounterpartRef::None,
            actual: CounterpartRef::Group("g1".to_string()),
        }
        .into();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_unusable_data_is_not_retryable() {
        let corrupt: PairingError = StoreError::CorruptCounterpart(EntityRef::organization("s1")).into();
        assert_eq!(corrupt.to_string(), "Store error: Corrupt counterpart columns on organization:s1");
        assert!(!corrupt.is_retryable());
        assert!(!corrupt.is_conflict());
        assert!(!corrupt.is_client_error());

        let grade: PairingError = StoreError::InvalidGrade {
            candidate: "c1".to_string(),
            grade: 300,
        }
        .into();
        assert!(matches!(grade, PairingError::Store(_)));

        // A read that fails is not a failed commit
        let read: PairingError = StoreError::SqlxError(sqlx::Error::RowNotFound).into();
        assert!(!read.is_retryable());
    }

    #[test]
    fn test_apply_errors() {
        let commit = PairingError::from_apply(StoreError::SqlxError(sqlx::Error::PoolTimedOut));
        assert!(matches!(commit, PairingError::TransactionFailure(_)));
        assert!(commit.is_retryable());

        let corrupt = PairingError::from_apply(StoreError::CorruptCounterpart(EntityRef::group("g1")));
        assert!(!corrupt.is_retryable());

        let locked = PairingError::from_apply(StoreError::Locked(EntityRef::group("g1")));
        assert!(matches!(locked, PairingError::LockedConflict(_)));
    }

    #[test]
    fn test_messages() {
        let err = PairingError::AlreadyPaired {
            entity: EntityRef::organization("s1"),
            counterpart: CounterpartRef::Group("g1".to_string()),
        };
        assert_eq!(err.to_string(), "organization:s1 is already paired with group:g1");
    }
}
