//! Integration tests for the TWAP oracle ring
//!
//! Tests cover:
//! - Observations overwriting the oldest slot once the ring is full
//! - Block timestamps wrapping past `u32::MAX`
//! - Observed cumulatives matching a piecewise-linear reference
//! - Targets older than the oldest retained observation

use bunni_v2_sdk::oracle::{ObservationRing, ObservationState, ObservationStorage};
use bunni_v2_sdk::SwapError;

const INTERVAL: u32 = 10;
const TICKS: [i32; 10] = [10, 40, -20, 100, 100, 70, -50, -50, 30, 200];

/// Ring of `cardinality` slots fed one observation per `INTERVAL`, starting at `start`.
fn build_ring(start: u32, cardinality: u32) -> (ObservationStorage, ObservationState) {
    let mut storage = ObservationStorage::default();
    let mut state = storage.initialize(start, 0);
    state.cardinality_next = storage.grow(1, cardinality).unwrap();
    for (k, tick) in TICKS.iter().enumerate() {
        let time = start.wrapping_add(INTERVAL * (k as u32 + 1));
        storage.record(&mut state, time, *tick, 0);
    }
    (storage, state)
}

/// Tick cumulative `offset` seconds after the first observation. The tick recorded at the end of
/// an interval accrued over that interval; past the last write `current_tick` accrues.
fn reference_cumulative(offset: u32, current_tick: i32) -> i64 {
    let mut cumulative = 0i64;
    let mut elapsed = 0u32;
    for tick in TICKS {
        let step = INTERVAL.min(offset - elapsed);
        cumulative += tick as i64 * step as i64;
        elapsed += step;
        if elapsed == offset {
            return cumulative;
        }
    }
    cumulative + current_tick as i64 * (offset - elapsed) as i64
}

/// A full ring keeps only the newest `cardinality` observations, in slot order `k % cardinality`
#[test]
fn test_ring_overwrites_oldest() {
    let (storage, state) = build_ring(1_000, 4);
    assert_eq!(state.cardinality, 4);
    assert_eq!(state.index, 10 % 4);
    for k in 7..=10u32 {
        assert_eq!(storage.get(k % 4).block_timestamp, 1_000 + INTERVAL * k, "slot for write {}", k);
    }
}

/// Observations inside the retained window follow the reference, across the `u32` wrap
#[test]
fn test_observe_matches_linear_reference_across_wrap() {
    let current_tick = 200;
    for start in [1_000u32, u32::MAX - 45] {
        let (storage, state) = build_ring(start, 4);
        let now_offset = 10 * INTERVAL + 5;
        let now = start.wrapping_add(now_offset);
        // oldest retained observation is write 7
        for seconds_ago in [0u32, 1, 5, 6, 10, 15, 22, 29, 35] {
            let observed = storage
                .observe_single(&state.intermediate, now, seconds_ago, current_tick, state.index, state.cardinality)
                .unwrap();
            let expected = reference_cumulative(now_offset - seconds_ago, current_tick);
            assert_eq!(observed, expected, "start {} seconds_ago {}", start, seconds_ago);
        }

        let twap = storage.twap(&state, now, 30, current_tick).unwrap();
        let expected = (reference_cumulative(now_offset, current_tick) - reference_cumulative(now_offset - 30, current_tick)) / 30;
        assert_eq!(twap as i64, expected, "start {}", start);
    }
}

/// Anything before the oldest retained observation is unavailable
#[test]
fn test_target_before_window_is_too_old() {
    for start in [1_000u32, u32::MAX - 45] {
        let (storage, state) = build_ring(start, 4);
        let now = start.wrapping_add(10 * INTERVAL + 5);
        let err = storage.observe_single(&state.intermediate, now, 36, 200, state.index, state.cardinality);
        assert_eq!(err, Err(SwapError::OracleTargetTooOld), "start {}", start);
        assert_eq!(storage.twap(&state, now, 60, 200), Err(SwapError::OracleTargetTooOld));
    }
}

/// A constant tick reads back as the TWAP no matter how many times the ring has wrapped
#[test]
fn test_constant_tick_survives_many_wraps() {
    let mut storage = ObservationStorage::default();
    let mut state = storage.initialize(u32::MAX - 1_000, -887);
    state.cardinality_next = storage.grow(1, 8).unwrap();
    let mut time = u32::MAX - 1_000;
    for _ in 0..50 {
        time = time.wrapping_add(12);
        storage.record(&mut state, time, -887, 0);
    }
    assert_eq!(state.cardinality, 8);
    for window in [1u32, 12, 50, 80] {
        assert_eq!(storage.twap(&state, time, window, -887).unwrap(), -887, "window {}", window);
    }
}
