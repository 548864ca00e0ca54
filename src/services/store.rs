//! Persistence seam for pairing state.
//!
//! The [`PairingStore`] trait is everything the pairing guard needs from the
//! data store. All multi-row changes go through [`PairingStore::apply`], which
//! must behave as a single transaction: the compare-and-swap checks, the
//! assignment lock checks and the writes either all happen or none do.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{Candidate, CounterpartRef, EntityRef, Group, Organization};

/// One conditional counterpart update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterpartWrite {
    pub entity: EntityRef,
    /// Value the row must still hold at commit time
    pub expected: CounterpartRef,
    pub new: CounterpartRef,
}

/// A set of counterpart writes committed together
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairingBatch {
    pub writes: Vec<CounterpartWrite>,
    /// Entities that must have no assignment records when the batch commits
    pub require_unlocked: Vec<EntityRef>,
}

impl PairingBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(mut self, entity: EntityRef, expected: CounterpartRef, new: CounterpartRef) -> Self {
        self.writes.push(CounterpartWrite { entity, expected, new });
        self
    }

    /// Require `entity` to still hold `expected` at commit time, leaving it unchanged
    pub fn assert_counterpart(self, entity: EntityRef, expected: CounterpartRef) -> Self {
        let new = expected.clone();
        self.write(entity, expected, new)
    }

    pub fn require_unlocked(mut self, entity: EntityRef) -> Self {
        self.require_unlocked.push(entity);
        self
    }

    /// Writes ordered by entity, so concurrent batches lock rows in the same order
    pub fn ordered_writes(&self) -> Vec<&CounterpartWrite> {
        let mut writes: Vec<&CounterpartWrite> = self.writes.iter().collect();
        writes.sort_by(|a, b| a.entity.cmp(&b.entity));
        writes
    }
}

/// Read and write access to organizations, groups, candidates and assignments
#[async_trait]
pub trait PairingStore: Send + Sync {
    async fn find_organization(&self, id: &str) -> Result<Option<Organization>, StoreError>;

    async fn find_group(&self, id: &str) -> Result<Option<Group>, StoreError>;

    /// Candidates of an organization, or of every member organization of a group
    async fn candidates_of(&self, entity: &EntityRef) -> Result<Vec<Candidate>, StoreError>;

    /// Whether any candidate under the entity appears in an assignment record
    async fn has_assignments(&self, entity: &EntityRef) -> Result<bool, StoreError>;

    /// Atomically apply a batch of conditional writes
    ///
    /// # Errors
    /// - `StoreError::NotFound` if a written entity does not exist
    /// - `StoreError::StaleCounterpart` if a row no longer holds `expected`
    /// - `StoreError::Locked` if a `require_unlocked` entity has assignments
    ///
    /// On any error no row is changed.
    async fn apply(&self, batch: &PairingBatch) -> Result<(), StoreError>;

    /// Current counterpart of an organization or group, if it exists
    async fn counterpart_of(&self, entity: &EntityRef) -> Result<Option<CounterpartRef>, StoreError> {
        match entity {
            EntityRef::Organization(id) => Ok(self.find_organization(id).await?.map(|o| o.counterpart)),
            EntityRef::Group(id) => Ok(self.find_group(id).await?.map(|g| g.counterpart)),
        }
    }
}
