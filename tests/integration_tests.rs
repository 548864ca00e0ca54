// Integration tests for the pairing guard over the in-memory store

use penpal_pairing::core::{Matcher, PairingGuard};
use penpal_pairing::error::PairingError;
use penpal_pairing::models::{Candidate, CounterpartRef, EntityRef, Group, Organization, PairingState};
use penpal_pairing::services::{InMemoryStore, PairingStore};
use std::sync::Arc;

fn setup() -> (Arc<InMemoryStore>, PairingGuard<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    for id in ["s1", "s2", "s3", "s4", "s5"] {
        store.insert_organization(Organization::new(id)).unwrap();
    }
    store.insert_group(Group::new("g1", &["s4", "s5"])).unwrap();

    store.insert_candidate(Candidate::new("a1", 5, &["sports", "art"], "s1")).unwrap();
    store.insert_candidate(Candidate::new("a2", 6, &["music"], "s1")).unwrap();
    store.insert_candidate(Candidate::new("b1", 5, &["art", "chess"], "s2")).unwrap();
    store.insert_candidate(Candidate::new("b2", 8, &["music"], "s2")).unwrap();
    store.insert_candidate(Candidate::new("c1", 4, &["science"], "s4")).unwrap();
    store.insert_candidate(Candidate::new("c2", 5, &["art"], "s5")).unwrap();

    let guard = PairingGuard::new(Arc::clone(&store), Matcher::with_default_weights());
    (store, guard)
}

fn org(id: &str) -> EntityRef {
    EntityRef::organization(id)
}

#[tokio::test]
async fn test_pair_then_unpair_round_trip() {
    let (store, guard) = setup();
    let before = store.counterparts().unwrap();

    guard.pair(&org("s1"), &org("s2")).await.unwrap();

    assert_eq!(
        guard.pairing_state(&org("s1")).await.unwrap(),
        PairingState::Paired(CounterpartRef::Organization("s2".to_string()))
    );
    assert_eq!(
        guard.pairing_state(&org("s2")).await.unwrap(),
        PairingState::Paired(CounterpartRef::Organization("s1".to_string()))
    );

    guard.unpair(&org("s1")).await.unwrap();

    assert_eq!(store.counterparts().unwrap(), before);
}

#[tokio::test]
async fn test_second_pair_fails_and_changes_nothing() {
    let (store, guard) = setup();
    guard.pair(&org("s1"), &org("s2")).await.unwrap();
    let snapshot = store.counterparts().unwrap();

    let err = guard.pair(&org("s1"), &org("s3")).await.unwrap_err();

    assert!(matches!(
        err,
        PairingError::AlreadyPaired { ref entity, ref counterpart }
            if *entity == org("s1") && *counterpart == CounterpartRef::Organization("s2".to_string())
    ));
    assert!(err.is_conflict());
    assert_eq!(store.counterparts().unwrap(), snapshot);
}

#[tokio::test]
async fn test_pair_rejects_already_paired_target() {
    let (_store, guard) = setup();
    guard.pair(&org("s1"), &org("s2")).await.unwrap();

    let err = guard.pair(&org("s3"), &org("s2")).await.unwrap_err();

    assert!(matches!(err, PairingError::AlreadyPaired { ref entity, .. } if *entity == org("s2")));
    assert_eq!(guard.pairing_state(&org("s3")).await.unwrap(), PairingState::Unpaired);
}

#[tokio::test]
async fn test_unpair_locked_after_assignment() {
    let (store, guard) = setup();
    guard.pair(&org("s1"), &org("s2")).await.unwrap();
    store.record_assignment("a1", "b1").unwrap();
    let snapshot = store.counterparts().unwrap();

    for _ in 0..3 {
        let err = guard.unpair(&org("s1")).await.unwrap_err();
        assert!(matches!(err, PairingError::LockedConflict(ref e) if *e == org("s1")));
        assert!(!err.is_retryable());
    }

    assert_eq!(store.counterparts().unwrap(), snapshot);
    assert_eq!(
        guard.pairing_state(&org("s1")).await.unwrap(),
        PairingState::Locked(CounterpartRef::Organization("s2".to_string()))
    );
}

#[tokio::test]
async fn test_unpair_not_paired() {
    let (_store, guard) = setup();

    let err = guard.unpair(&org("s3")).await.unwrap_err();

    assert!(matches!(err, PairingError::NotPaired(_)));
    assert!(err.is_client_error());
}

#[tokio::test]
async fn test_unpair_unknown() {
    let (_store, guard) = setup();

    let err = guard.unpair(&org("nowhere")).await.unwrap_err();

    assert!(matches!(err, PairingError::NotFound(_)));
}

#[tokio::test]
async fn test_school_paired_with_group() {
    let (store, guard) = setup();
    let g1 = EntityRef::group("g1");

    guard.pair(&org("s1"), &g1).await.unwrap();

    let s1 = store.find_organization("s1").await.unwrap().unwrap();
    assert_eq!(s1.counterpart, CounterpartRef::Group("g1".to_string()));
    assert_eq!(
        guard.pairing_state(&g1).await.unwrap(),
        PairingState::Paired(CounterpartRef::Organization("s1".to_string()))
    );
    // Member organizations do not carry the back-reference
    assert_eq!(guard.pairing_state(&org("s4")).await.unwrap(), PairingState::Unpaired);

    let err = guard.pair(&org("s1"), &org("s2")).await.unwrap_err();
    assert!(matches!(err, PairingError::AlreadyPaired { .. }));
}

#[tokio::test]
async fn test_member_cannot_pair_with_its_own_group() {
    let (store, guard) = setup();
    let snapshot = store.counterparts().unwrap();

    let err = guard.pair(&org("s4"), &EntityRef::group("g1")).await.unwrap_err();

    assert!(matches!(err, PairingError::InvalidInput(_)));
    assert!(err.is_client_error());
    assert_eq!(store.counterparts().unwrap(), snapshot);
    assert!(matches!(
        guard.match_pairing(&org("s4")).await.unwrap_err(),
        PairingError::NotPaired(_)
    ));
}

#[tokio::test]
async fn test_member_of_paired_group_stays_out_of_other_pairings() {
    let (store, guard) = setup();
    guard.pair(&EntityRef::group("g1"), &org("s1")).await.unwrap();
    let snapshot = store.counterparts().unwrap();

    let err = guard.pair(&org("s4"), &org("s2")).await.unwrap_err();

    assert!(matches!(err, PairingError::AlreadyPaired { ref entity, .. } if *entity == EntityRef::group("g1")));
    assert!(err.is_conflict());
    assert_eq!(store.counterparts().unwrap(), snapshot);
}

#[tokio::test]
async fn test_unpair_group_from_school_clears_group_only() {
    let (store, guard) = setup();
    let g1 = EntityRef::group("g1");
    guard.pair(&org("s1"), &g1).await.unwrap();

    guard.unpair(&g1).await.unwrap();

    assert_eq!(guard.pairing_state(&g1).await.unwrap(), PairingState::Unpaired);
    let s1 = store.find_organization("s1").await.unwrap().unwrap();
    assert_eq!(s1.counterpart, CounterpartRef::Group("g1".to_string()));
    assert_eq!(
        guard.pairing_state(&org("s1")).await.unwrap(),
        PairingState::Paired(CounterpartRef::Group("g1".to_string()))
    );
}

#[tokio::test]
async fn test_group_locked_through_member_assignment() {
    let (store, guard) = setup();
    let g1 = EntityRef::group("g1");
    guard.pair(&g1, &org("s1")).await.unwrap();
    store.record_assignment("a2", "c2").unwrap();

    let err = guard.unpair(&g1).await.unwrap_err();

    assert!(matches!(err, PairingError::LockedConflict(_)));
}

#[tokio::test]
async fn test_match_pairing_uses_both_sides() {
    let (_store, guard) = setup();
    guard.pair(&org("s1"), &org("s2")).await.unwrap();

    let outcome = guard.match_pairing(&org("s1")).await.unwrap();

    let got: Vec<(&str, &str, u32)> = outcome
        .matches
        .iter()
        .map(|m| (m.candidate_a.as_str(), m.candidate_b.as_str(), m.score))
        .collect();
    assert_eq!(got, vec![("a1", "b1", 15), ("a2", "b2", 10)]);
    assert_eq!(outcome.summary.total_score, 25);
}

#[tokio::test]
async fn test_match_pairing_with_group_members() {
    let (_store, guard) = setup();
    let g1 = EntityRef::group("g1");
    guard.pair(&g1, &org("s1")).await.unwrap();

    let outcome = guard.match_pairing(&g1).await.unwrap();

    assert_eq!(outcome.summary.pool_a_size, 2);
    assert_eq!(outcome.summary.pool_b_size, 2);
    assert_eq!(outcome.matches.len(), 2);
    // c2 (grade 5, art) and a1 (grade 5, art) score highest
    assert_eq!(outcome.matches[0].candidate_a, "c2");
    assert_eq!(outcome.matches[0].candidate_b, "a1");
}

#[tokio::test]
async fn test_match_pairing_requires_pairing() {
    let (_store, guard) = setup();

    let err = guard.match_pairing(&org("s3")).await.unwrap_err();

    assert!(matches!(err, PairingError::NotPaired(_)));
}

#[tokio::test]
async fn test_match_candidates_rejects_overlapping_pools() {
    let (_store, guard) = setup();
    let a = vec![Candidate::new("x1", 5, &["art"], "s1")];
    let b = vec![Candidate::new("x1", 5, &["art"], "s2")];

    let err = guard.match_candidates(a, b).unwrap_err();

    assert!(matches!(err, PairingError::InvalidInput(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_pairs_only_one_wins() {
    let (store, guard) = setup();

    let handles: Vec<_> = ["s2", "s3", "s4", "s5"]
        .into_iter()
        .map(|other| {
            let guard = guard.clone();
            tokio::spawn(async move { guard.pair(&org("s1"), &org(other)).await })
        })
        .collect();

    let mut wins = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => wins += 1,
            Err(e) => assert!(matches!(e, PairingError::AlreadyPaired { .. }), "unexpected {:?}", e),
        }
    }

    assert_eq!(wins, 1);

    // Exactly one organization points back at s1, and s1 points at it
    let counterparts = store.counterparts().unwrap();
    let s1 = counterparts[&org("s1")].entity().unwrap();
    let back: Vec<_> = counterparts
        .iter()
        .filter(|(_, c)| **c == CounterpartRef::Organization("s1".to_string()))
        .map(|(e, _)| e.clone())
        .collect();
    assert_eq!(back, vec![s1]);
}
