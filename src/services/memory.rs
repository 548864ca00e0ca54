//! In-memory pairing store.
//!
//! [`InMemoryStore`] keeps every entity in `RwLock`-guarded maps and applies
//! each [`PairingBatch`] under a single write lock, which gives the same
//! all-or-nothing behavior as a database transaction within one process.
//!
//! ## Limitations
//!
//! - **Single-process only**: no cross-process coordination
//! - **No persistence**: all state is lost when the process exits

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use super::store::{PairingBatch, PairingStore};
use crate::error::StoreError;
use crate::models::{AssignmentRecord, Candidate, CounterpartRef, EntityRef, Group, Organization};

#[derive(Debug, Default)]
struct State {
    organizations: BTreeMap<String, Organization>,
    groups: BTreeMap<String, Group>,
    candidates: Vec<Candidate>,
    assignments: Vec<AssignmentRecord>,
}

impl State {
    fn counterpart(&self, entity: &EntityRef) -> Option<&CounterpartRef> {
        match entity {
            EntityRef::Organization(id) => self.organizations.get(id).map(|o| &o.counterpart),
            EntityRef::Group(id) => self.groups.get(id).map(|g| &g.counterpart),
        }
    }

    fn counterpart_mut(&mut self, entity: &EntityRef) -> Option<&mut CounterpartRef> {
        match entity {
            EntityRef::Organization(id) => self.organizations.get_mut(id).map(|o| &mut o.counterpart),
            EntityRef::Group(id) => self.groups.get_mut(id).map(|g| &mut g.counterpart),
        }
    }

    fn organization_ids(&self, entity: &EntityRef) -> Vec<String> {
        match entity {
            EntityRef::Organization(id) => vec![id.clone()],
            EntityRef::Group(id) => self
                .groups
                .get(id)
                .map(|g| g.members.clone())
                .unwrap_or_default(),
        }
    }

    fn candidates_of(&self, entity: &EntityRef) -> Vec<Candidate> {
        let orgs = self.organization_ids(entity);
        self.candidates
            .iter()
            .filter(|c| orgs.contains(&c.organization_id))
            .cloned()
            .collect()
    }

    fn has_assignments(&self, entity: &EntityRef) -> bool {
        let ids: Vec<String> = self.candidates_of(entity).into_iter().map(|c| c.id).collect();
        self.assignments
            .iter()
            .any(|a| ids.contains(&a.candidate_a) || ids.contains(&a.candidate_b))
    }
}

/// Converts a lock poison error to a store error.
fn poison_err<T>(_: PoisonError<T>) -> StoreError {
    StoreError::Poisoned
}

/// In-memory store for tests and embedding
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_organization(&self, organization: Organization) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(poison_err)?;
        state.organizations.insert(organization.id.clone(), organization);
        Ok(())
    }

    /// Insert a group and record membership on its organizations
    pub fn insert_group(&self, group: Group) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(poison_err)?;
        for member in &group.members {
            if let Some(org) = state.organizations.get_mut(member) {
                org.group_id = Some(group.id.clone());
            }
        }
        state.groups.insert(group.id.clone(), group);
        Ok(())
    }

    pub fn insert_candidate(&self, candidate: Candidate) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(poison_err)?;
        state.candidates.push(candidate);
        Ok(())
    }

    /// Stand-in for the dispatch process that delivers contact details
    pub fn record_assignment(&self, candidate_a: &str, candidate_b: &str) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(poison_err)?;
        state.assignments.push(AssignmentRecord {
            candidate_a: candidate_a.to_string(),
            candidate_b: candidate_b.to_string(),
            assigned_at: chrono::Utc::now(),
        });
        Ok(())
    }

    /// Snapshot of every counterpart reference, for assertions
    pub fn counterparts(&self) -> Result<HashMap<EntityRef, CounterpartRef>, StoreError> {
        let state = self.state.read().map_err(poison_err)?;
        let orgs = state
            .organizations
            .values()
            .map(|o| (EntityRef::organization(o.id.clone()), o.counterpart.clone()));
        let groups = state
            .groups
            .values()
            .map(|g| (EntityRef::group(g.id.clone()), g.counterpart.clone()));
        Ok(orgs.chain(groups).collect())
    }
}

#[async_trait]
impl PairingStore for InMemoryStore {
    async fn find_organization(&self, id: &str) -> Result<Option<Organization>, StoreError> {
        let state = self.state.read().map_err(poison_err)?;
        Ok(state.organizations.get(id).cloned())
    }

    async fn find_group(&self, id: &str) -> Result<Option<Group>, StoreError> {
        let state = self.state.read().map_err(poison_err)?;
        Ok(state.groups.get(id).cloned())
    }

    async fn candidates_of(&self, entity: &EntityRef) -> Result<Vec<Candidate>, StoreError> {
        let state = self.state.read().map_err(poison_err)?;
        Ok(state.candidates_of(entity))
    }

    async fn has_assignments(&self, entity: &EntityRef) -> Result<bool, StoreError> {
        let state = self.state.read().map_err(poison_err)?;
        Ok(state.has_assignments(entity))
    }

    async fn apply(&self, batch: &PairingBatch) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(poison_err)?;

        // Validate everything before touching a row
        for write in batch.ordered_writes() {
            let actual = state
                .counterpart(&write.entity)
                .ok_or_else(|| StoreError::NotFound(write.entity.clone()))?;
            if *actual != write.expected {
                return Err(StoreError::StaleCounterpart {
                    entity: write.entity.clone(),
                    expected: write.expected.clone(),
                    actual: actual.clone(),
                });
            }
        }

        for entity in &batch.require_unlocked {
            if state.has_assignments(entity) {
                return Err(StoreError::Locked(entity.clone()));
            }
        }

        for write in &batch.writes {
            if let Some(slot) = state.counterpart_mut(&write.entity) {
                *slot = write.new.clone();
            }
        }

        tracing::debug!("Applied pairing batch with {} writes", batch.writes.len());
        Ok(())
    }
}
