use std::collections::HashSet;
use std::sync::Arc;
use validator::Validate;

use crate::core::matcher::Matcher;
use crate::error::{PairingError, StoreError};
use crate::models::{Candidate, CounterpartRef, EntityRef, MatchOutcome, PairingState};
use crate::services::{PairingBatch, PairingStore};

/// Enforces the pairing lifecycle on top of a store
///
/// # State machine
/// Unpaired -> Paired (pair)
/// Paired -> Unpaired (unpair, only while no assignments exist)
/// Paired -> Locked (first assignment record; no way back)
///
/// Every write goes through a single [`PairingBatch`], so the store decides
/// atomically whether the transition still applies.
pub struct PairingGuard<S: PairingStore> {
    store: Arc<S>,
    matcher: Matcher,
}

impl<S: PairingStore> Clone for PairingGuard<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            matcher: self.matcher.clone(),
        }
    }
}

impl<S: PairingStore> PairingGuard<S> {
    pub fn new(store: Arc<S>, matcher: Matcher) -> Self {
        Self { store, matcher }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Pair `x` with `y`, setting both counterpart references together
    ///
    /// An organization and a group that contains it cannot be paired with
    /// each other. Neither side may overlap another live pairing: an
    /// organization whose group is paired, or a group with a paired member,
    /// is rejected as already paired.
    pub async fn pair(&self, x: &EntityRef, y: &EntityRef) -> Result<(), PairingError> {
        validate_ref(x)?;
        validate_ref(y)?;
        if x == y {
            return Err(PairingError::InvalidInput(format!("cannot pair {} with itself", x)));
        }

        let mut batch = PairingBatch::new()
            .write(x.clone(), CounterpartRef::None, y.as_counterpart())
            .write(y.clone(), CounterpartRef::None, x.as_counterpart());

        for (entity, other) in [(x, y), (y, x)] {
            let current = self.load_counterpart(entity).await?;
            if !current.is_none() {
                tracing::warn!("Refusing to pair {}: already paired with {}", entity, current);
                return Err(PairingError::AlreadyPaired {
                    entity: entity.clone(),
                    counterpart: current,
                });
            }

            for (overlapping, counterpart) in self.overlapping(entity).await? {
                if overlapping == *other {
                    return Err(PairingError::InvalidInput(format!(
                        "{} and {} share member organizations",
                        entity, other
                    )));
                }
                if !counterpart.is_none() {
                    tracing::warn!(
                        "Refusing to pair {}: {} is already paired with {}",
                        entity, overlapping, counterpart
                    );
                    return Err(PairingError::AlreadyPaired {
                        entity: overlapping,
                        counterpart,
                    });
                }
                batch = batch.assert_counterpart(overlapping, CounterpartRef::None);
            }
        }

        match self.store.apply(&batch).await {
            Ok(()) => {
                tracing::info!("Paired {} with {}", x, y);
                Ok(())
            }
            // Someone else paired one side between our read and the commit
            Err(StoreError::StaleCounterpart { entity, actual, .. }) => {
                tracing::warn!("Lost pairing race on {}: now paired with {}", entity, actual);
                Err(PairingError::AlreadyPaired {
                    entity,
                    counterpart: actual,
                })
            }
            Err(e) => Err(PairingError::from_apply(e)),
        }
    }

    /// Undo the pairing of `x`, unless correspondence has started
    pub async fn unpair(&self, x: &EntityRef) -> Result<(), PairingError> {
        validate_ref(x)?;

        let current = self.load_counterpart(x).await?;
        let Some(counterpart) = current.entity() else {
            return Err(PairingError::NotPaired(x.clone()));
        };

        // Fast path; the batch repeats this check inside the transaction
        if self.store.has_assignments(x).await? {
            tracing::warn!("Refusing to unpair {}: assignments already delivered", x);
            return Err(PairingError::LockedConflict(x.clone()));
        }

        let mut batch = PairingBatch::new()
            .write(x.clone(), current.clone(), CounterpartRef::None)
            .require_unlocked(x.clone());

        if counterpart.kind() == x.kind() {
            // Same row shape: the back-reference lives on the counterpart row
            match self.store.counterpart_of(&counterpart).await? {
                Some(back) if back == x.as_counterpart() => {
                    batch = batch.write(counterpart.clone(), back, CounterpartRef::None);
                }
                Some(back) => {
                    tracing::warn!(
                        "{} points at {} but {} points at {}; clearing one side only",
                        x, counterpart, counterpart, back
                    );
                }
                None => {
                    tracing::warn!("{} points at missing {}; clearing one side only", x, counterpart);
                }
            }
        }

        self.store.apply(&batch).await.map_err(|e| match e {
            StoreError::Locked(entity) => {
                tracing::warn!("Refusing to unpair {}: assignments delivered concurrently", entity);
                PairingError::LockedConflict(entity)
            }
            other => PairingError::from_apply(other),
        })?;

        tracing::info!("Unpaired {} from {}", x, counterpart);
        Ok(())
    }

    /// Where `x` currently sits in the pairing lifecycle
    pub async fn pairing_state(&self, x: &EntityRef) -> Result<PairingState, PairingError> {
        validate_ref(x)?;

        let counterpart = self.load_counterpart(x).await?;
        if counterpart.is_none() {
            return Ok(PairingState::Unpaired);
        }

        if self.store.has_assignments(x).await? {
            Ok(PairingState::Locked(counterpart))
        } else {
            Ok(PairingState::Paired(counterpart))
        }
    }

    /// Validate two candidate pools and run the greedy matcher on them
    pub fn match_candidates(
        &self,
        pool_a: Vec<Candidate>,
        pool_b: Vec<Candidate>,
    ) -> Result<MatchOutcome, PairingError> {
        validate_pools(&pool_a, &pool_b)?;
        Ok(self.matcher.match_candidates(pool_a, pool_b))
    }

    /// Match the candidates of `x` against those of its counterpart
    ///
    /// `x`'s candidates form the first pool.
    pub async fn match_pairing(&self, x: &EntityRef) -> Result<MatchOutcome, PairingError> {
        validate_ref(x)?;

        let Some(counterpart) = self.load_counterpart(x).await?.entity() else {
            return Err(PairingError::NotPaired(x.clone()));
        };

        let pool_a = self.store.candidates_of(x).await?;
        let pool_b = self.store.candidates_of(&counterpart).await?;

        tracing::info!(
            "Matching {} candidates of {} against {} candidates of {}",
            pool_a.len(),
            x,
            pool_b.len(),
            counterpart
        );

        self.match_candidates(pool_a, pool_b)
    }

    /// Entities sharing member organizations with `entity`, with their counterparts
    ///
    /// For an organization this is its group, for a group its members.
    async fn overlapping(&self, entity: &EntityRef) -> Result<Vec<(EntityRef, CounterpartRef)>, PairingError> {
        let mut found = Vec::new();
        match entity {
            EntityRef::Organization(id) => {
                let group_id = self.store.find_organization(id).await?.and_then(|o| o.group_id);
                if let Some(group_id) = group_id {
                    let group = EntityRef::Group(group_id);
                    if let Some(counterpart) = self.store.counterpart_of(&group).await? {
                        found.push((group, counterpart));
                    }
                }
            }
            EntityRef::Group(id) => {
                let members = self.store.find_group(id).await?.map(|g| g.members).unwrap_or_default();
                for member in members {
                    let member = EntityRef::Organization(member);
                    if let Some(counterpart) = self.store.counterpart_of(&member).await? {
                        found.push((member, counterpart));
                    }
                }
            }
        }
        Ok(found)
    }

    async fn load_counterpart(&self, entity: &EntityRef) -> Result<CounterpartRef, PairingError> {
        self.store
            .counterpart_of(entity)
            .await?
            .ok_or_else(|| PairingError::NotFound(entity.clone()))
    }
}

fn validate_ref(entity: &EntityRef) -> Result<(), PairingError> {
    if entity.id().trim().is_empty() {
        return Err(PairingError::InvalidInput(format!("{} has an empty id", entity)));
    }
    Ok(())
}

/// Candidates must be well formed and appear at most once across both pools
fn validate_pools(pool_a: &[Candidate], pool_b: &[Candidate]) -> Result<(), PairingError> {
    let mut seen: HashSet<&str> = HashSet::new();
    for candidate in pool_a.iter().chain(pool_b) {
        candidate
            .validate()
            .map_err(|e| PairingError::InvalidInput(format!("candidate {:?}: {}", candidate.id, e)))?;
        if !seen.insert(candidate.id.as_str()) {
            return Err(PairingError::InvalidInput(format!(
                "candidate {} appears more than once",
                candidate.id
            )));
        }
    }
    Ok(())
}
