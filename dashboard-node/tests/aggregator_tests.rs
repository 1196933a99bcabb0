//! Aggregator behaviour over realistic message sequences
//!
//! - Counter invariants after every message
//! - Attack rate rounding
//! - Recent-history eviction at capacity
//! - The three-record replay scenario

use chrono::Utc;

use dashboard_node::{AggregateState, RECENT_HISTORY_CAPACITY};
use flowguard_common::{FeatureRecord, Label, StreamMessage, FEATURE_COUNT, SCHEMA_VERSION};

fn message(index: u64, prediction: Label) -> StreamMessage {
    let values: Vec<f64> = (0..FEATURE_COUNT).map(|i| (index * 10 + i as u64) as f64).collect();
    StreamMessage {
        version: SCHEMA_VERSION,
        index,
        features: FeatureRecord::from_values(&values).unwrap(),
        prediction,
    }
}

/// Deterministic mixed sequence: every third event is an attack
fn mixed_sequence(len: u64) -> Vec<StreamMessage> {
    (0..len)
        .map(|i| {
            let label = if i % 3 == 2 { Label::Attack } else { Label::Benign };
            message(i, label)
        })
        .collect()
}

#[test]
fn test_counts_always_sum_to_total() {
    let mut state = AggregateState::new();
    let mut processed = 0;
    let mut last_benign = 0;
    let mut last_attack = 0;

    for msg in mixed_sequence(50) {
        state.apply(msg, Utc::now());
        processed += 1;

        assert_eq!(state.benign_count() + state.attack_count(), processed);
        assert_eq!(state.total(), processed);
        assert!(state.benign_count() >= last_benign);
        assert!(state.attack_count() >= last_attack);
        last_benign = state.benign_count();
        last_attack = state.attack_count();
    }
}

#[test]
fn test_attack_rate_matches_rounded_share() {
    let mut state = AggregateState::new();
    assert_eq!(state.attack_rate(), 0.0);

    for msg in mixed_sequence(40) {
        state.apply(msg, Utc::now());
        let expected =
            (state.attack_count() as f64 / state.total() as f64 * 1000.0).round() / 10.0;
        assert!((state.attack_rate() - expected).abs() < 1e-9);
    }

    // 13 attacks out of 40
    assert_eq!(state.attack_rate(), 32.5);
}

#[test]
fn test_twenty_first_event_evicts_oldest() {
    let mut state = AggregateState::new();
    for msg in mixed_sequence(RECENT_HISTORY_CAPACITY as u64) {
        state.apply(msg, Utc::now());
    }
    assert_eq!(state.recent().len(), RECENT_HISTORY_CAPACITY);
    assert_eq!(state.recent().iter().last().unwrap().index, 0);

    state.apply(message(20, Label::Attack), Utc::now());

    let indexes: Vec<u64> = state.recent().iter().map(|e| e.index).collect();
    assert_eq!(indexes.len(), RECENT_HISTORY_CAPACITY);
    assert_eq!(indexes[0], 20);
    assert_eq!(*indexes.last().unwrap(), 1);
    assert!(!indexes.contains(&0));
}

#[test]
fn test_history_never_exceeds_capacity() {
    let mut state = AggregateState::new();
    for msg in mixed_sequence(200) {
        state.apply(msg, Utc::now());
        assert!(state.recent().len() <= RECENT_HISTORY_CAPACITY);
    }

    let indexes: Vec<u64> = state.recent().iter().map(|e| e.index).collect();
    let expected: Vec<u64> = (180..200).rev().collect();
    assert_eq!(indexes, expected);
}

#[test]
fn test_three_record_scenario() {
    let mut state = AggregateState::new();
    for (i, label) in [Label::Benign, Label::Attack, Label::Benign].into_iter().enumerate() {
        state.apply(message(i as u64, label), Utc::now());
    }

    assert_eq!(state.benign_count(), 2);
    assert_eq!(state.attack_count(), 1);
    assert_eq!(state.total(), 3);
    assert_eq!(state.attack_rate(), 33.3);

    let counts = state.count_view();
    assert_eq!((counts.benign, counts.attack), (2, 1));

    let proportions = state.proportion_view();
    assert_eq!(proportions.benign.percent, 66.7);
    assert_eq!(proportions.attack.percent, 33.3);

    let snapshot = state.snapshot();
    let order: Vec<u64> = snapshot.recent.iter().map(|e| e.index).collect();
    assert_eq!(order, vec![2, 1, 0]);
    assert_eq!(snapshot.recent[1].prediction, Label::Attack);
}
