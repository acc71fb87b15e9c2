//! # TWAP Oracle
//!
//! Ring buffer of tick observations with a truncated tick delta per update.
//!
//! Two things distinguish it from a plain cumulative-tick oracle:
//! - every update clamps the tick to within [`MAX_ABS_TICK_MOVE`] of the previous one, so a single
//!   block cannot drag the TWAP arbitrarily far
//! - an in-memory *intermediate* observation is updated on every write, while the buffer only
//!   records a new slot once `min_interval` seconds have passed since the last committed one
//!
//! Timestamps are `u32` and compared as a ring, so the buffer keeps working across the 2^32 wrap.
//!
//! Writes are split in two: [`ObservationStorage::prepare_write`] computes the outcome without
//! touching the buffer and [`ObservationStorage::commit`] stores it. Quotes read through a
//! [`PendingRing`] so they see the pending slot while the shared buffer stays untouched.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SwapError};

/// Largest tick change accepted between two consecutive observations.
pub const MAX_ABS_TICK_MOVE: i32 = 9116;

/// Upper bound on the ring size.
pub const MAX_CARDINALITY: u32 = 65_535;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub block_timestamp: u32,
    /// Clamped tick recorded at this observation.
    pub prev_tick: i32,
    pub tick_cumulative: i64,
    pub initialized: bool,
}

impl Observation {
    /// Advance `self` to `block_timestamp`, accruing the clamped `tick`.
    pub fn transform(&self, block_timestamp: u32, tick: i32) -> Observation {
        let delta = block_timestamp.wrapping_sub(self.block_timestamp);
        let tick = tick.clamp(self.prev_tick - MAX_ABS_TICK_MOVE, self.prev_tick + MAX_ABS_TICK_MOVE);
        Observation {
            block_timestamp,
            prev_tick: tick,
            tick_cumulative: self.tick_cumulative.wrapping_add(tick as i64 * delta as i64),
            initialized: true,
        }
    }
}

/// Ring cursor plus the not-yet-committed intermediate observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationState {
    pub index: u32,
    pub cardinality: u32,
    pub cardinality_next: u32,
    pub intermediate: Observation,
}

/// Outcome of a write: the new cursor and, when the interval allowed it, the slot to store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObservationWrite {
    pub intermediate: Observation,
    pub index: u32,
    pub cardinality: u32,
    pub slot: Option<(u32, Observation)>,
}

impl ObservationWrite {
    /// Cursor after the write, keeping `cardinality_next` from `state`.
    pub fn apply_to(&self, state: &ObservationState) -> ObservationState {
        ObservationState {
            index: self.index,
            cardinality: self.cardinality,
            cardinality_next: state.cardinality_next,
            intermediate: self.intermediate,
        }
    }
}

/// `a <= b` on the timestamp ring as seen from `time`.
pub fn lte(time: u32, a: u32, b: u32) -> bool {
    if a <= time && b <= time {
        return a <= b;
    }
    let a_adjusted = if a > time { a as u64 } else { a as u64 + (1u64 << 32) };
    let b_adjusted = if b > time { b as u64 } else { b as u64 + (1u64 << 32) };
    a_adjusted <= b_adjusted
}

/// Read side of the ring. Everything here only needs slot lookups.
pub trait ObservationRing {
    fn observation(&self, index: u32) -> Observation;

    fn binary_search(&self, time: u32, target: u32, index: u32, cardinality: u32) -> Result<(Observation, Observation)> {
        let cardinality = cardinality as u64;
        let mut l = (index as u64 + 1) % cardinality;
        let mut r = l + cardinality - 1;
        loop {
            if l > r {
                return Err(SwapError::OracleTargetTooOld);
            }
            let i = (l + r) / 2;
            let before_or_at = self.observation((i % cardinality) as u32);
            if !before_or_at.initialized {
                l = i + 1;
                continue;
            }
            let at_or_after = self.observation(((i + 1) % cardinality) as u32);
            let target_at_or_after = lte(time, before_or_at.block_timestamp, target);
            if target_at_or_after && lte(time, target, at_or_after.block_timestamp) {
                return Ok((before_or_at, at_or_after));
            }
            if !target_at_or_after {
                if i == 0 {
                    return Err(SwapError::OracleTargetTooOld);
                }
                r = i - 1;
            } else {
                l = i + 1;
            }
        }
    }

    fn surrounding_observations(
        &self,
        intermediate: &Observation,
        time: u32,
        target: u32,
        tick: i32,
        index: u32,
        cardinality: u32,
    ) -> Result<(Observation, Observation)> {
        let newest = self.observation(index);
        if lte(time, newest.block_timestamp, target) {
            if newest.block_timestamp == target {
                return Ok((newest, newest));
            }
            // the intermediate may already cover the target
            let after = if lte(time, target, intermediate.block_timestamp) {
                *intermediate
            } else {
                intermediate.transform(target, tick)
            };
            return Ok((newest, after));
        }
        let mut oldest = self.observation((index + 1) % cardinality);
        if !oldest.initialized {
            oldest = self.observation(0);
        }
        if !lte(time, oldest.block_timestamp, target) {
            return Err(SwapError::OracleTargetTooOld);
        }
        self.binary_search(time, target, index, cardinality)
    }

    /// Tick cumulative as of `seconds_ago` before `time`.
    fn observe_single(
        &self,
        intermediate: &Observation,
        time: u32,
        seconds_ago: u32,
        tick: i32,
        index: u32,
        cardinality: u32,
    ) -> Result<i64> {
        if cardinality == 0 {
            return Err(SwapError::OracleCardinalityZero);
        }
        if seconds_ago == 0 {
            let last = if intermediate.block_timestamp != time { intermediate.transform(time, tick) } else { *intermediate };
            return Ok(last.tick_cumulative);
        }
        let target = time.wrapping_sub(seconds_ago);
        let (before, after) = self.surrounding_observations(intermediate, time, target, tick, index, cardinality)?;
        if target == before.block_timestamp {
            Ok(before.tick_cumulative)
        } else if target == after.block_timestamp {
            Ok(after.tick_cumulative)
        } else {
            let observation_delta = after.block_timestamp.wrapping_sub(before.block_timestamp) as i64;
            let target_delta = target.wrapping_sub(before.block_timestamp) as i64;
            Ok(before.tick_cumulative
                + (after.tick_cumulative - before.tick_cumulative) / observation_delta * target_delta)
        }
    }

    fn observe_double(
        &self,
        intermediate: &Observation,
        time: u32,
        seconds_agos: [u32; 2],
        tick: i32,
        index: u32,
        cardinality: u32,
    ) -> Result<[i64; 2]> {
        Ok([
            self.observe_single(intermediate, time, seconds_agos[0], tick, index, cardinality)?,
            self.observe_single(intermediate, time, seconds_agos[1], tick, index, cardinality)?,
        ])
    }

    fn observe_triple(
        &self,
        intermediate: &Observation,
        time: u32,
        seconds_agos: [u32; 3],
        tick: i32,
        index: u32,
        cardinality: u32,
    ) -> Result<[i64; 3]> {
        Ok([
            self.observe_single(intermediate, time, seconds_agos[0], tick, index, cardinality)?,
            self.observe_single(intermediate, time, seconds_agos[1], tick, index, cardinality)?,
            self.observe_single(intermediate, time, seconds_agos[2], tick, index, cardinality)?,
        ])
    }

    /// Arithmetic mean tick over the last `seconds_ago` seconds.
    fn twap(&self, state: &ObservationState, time: u32, seconds_ago: u32, tick: i32) -> Result<i32> {
        if seconds_ago == 0 {
            return Err(SwapError::InvalidParams("zero TWAP window".to_string()));
        }
        let [then, now] =
            self.observe_double(&state.intermediate, time, [seconds_ago, 0], tick, state.index, state.cardinality)?;
        Ok(((now - then) / seconds_ago as i64) as i32)
    }
}

/// Observation ring. Slots beyond the stored vector read as uninitialized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObservationStorage {
    observations: Vec<Observation>,
}

impl ObservationRing for ObservationStorage {
    fn observation(&self, index: u32) -> Observation {
        self.get(index)
    }
}

impl ObservationStorage {
    pub fn new(observations: Vec<Observation>) -> Self {
        Self { observations }
    }

    pub fn get(&self, index: u32) -> Observation {
        self.observations.get(index as usize).copied().unwrap_or_default()
    }

    fn set(&mut self, index: u32, observation: Observation) {
        let i = index as usize;
        if i >= self.observations.len() {
            self.observations.resize(i + 1, Observation::default());
        }
        self.observations[i] = observation;
    }

    pub fn as_slice(&self) -> &[Observation] {
        &self.observations
    }

    /// Seed the ring with a first observation at `time`.
    pub fn initialize(&mut self, time: u32, tick: i32) -> ObservationState {
        let intermediate = Observation { block_timestamp: time, prev_tick: tick, tick_cumulative: 0, initialized: true };
        self.set(0, intermediate);
        ObservationState { index: 0, cardinality: 1, cardinality_next: 1, intermediate }
    }

    /// Compute the effect of recording `tick` at `block_timestamp` without storing anything.
    #[allow(clippy::too_many_arguments)]
    pub fn prepare_write(
        &self,
        intermediate: Observation,
        index: u32,
        block_timestamp: u32,
        tick: i32,
        cardinality: u32,
        cardinality_next: u32,
        min_interval: u32,
    ) -> ObservationWrite {
        let unchanged = ObservationWrite { intermediate, index, cardinality, slot: None };
        if intermediate.block_timestamp == block_timestamp {
            return unchanged;
        }
        let updated = intermediate.transform(block_timestamp, tick);
        if block_timestamp.wrapping_sub(self.get(index).block_timestamp) < min_interval {
            return ObservationWrite { intermediate: updated, ..unchanged };
        }
        let cardinality_updated =
            if cardinality_next > cardinality && index == cardinality.saturating_sub(1) { cardinality_next } else { cardinality };
        if cardinality_updated == 0 {
            return ObservationWrite { intermediate: updated, ..unchanged };
        }
        let index_updated = (index + 1) % cardinality_updated;
        ObservationWrite {
            intermediate: updated,
            index: index_updated,
            cardinality: cardinality_updated,
            slot: Some((index_updated, updated)),
        }
    }

    pub fn commit(&mut self, write: &ObservationWrite) {
        if let Some((index, observation)) = write.slot {
            self.set(index, observation);
        }
    }

    /// Record `tick` at `block_timestamp`. Returns the updated intermediate, index and cardinality.
    #[allow(clippy::too_many_arguments)]
    pub fn write(
        &mut self,
        intermediate: Observation,
        index: u32,
        block_timestamp: u32,
        tick: i32,
        cardinality: u32,
        cardinality_next: u32,
        min_interval: u32,
    ) -> (Observation, u32, u32) {
        let write =
            self.prepare_write(intermediate, index, block_timestamp, tick, cardinality, cardinality_next, min_interval);
        self.commit(&write);
        (write.intermediate, write.index, write.cardinality)
    }

    /// [`write`](Self::write) against an [`ObservationState`], updating it in place.
    pub fn record(&mut self, state: &mut ObservationState, block_timestamp: u32, tick: i32, min_interval: u32) {
        let (intermediate, index, cardinality) = self.write(
            state.intermediate,
            state.index,
            block_timestamp,
            tick,
            state.cardinality,
            state.cardinality_next,
            min_interval,
        );
        state.intermediate = intermediate;
        state.index = index;
        state.cardinality = cardinality;
    }

    /// Reserve slots up to `next`; the new slots are marked so their first write is not free.
    pub fn grow(&mut self, current: u32, next: u32) -> Result<u32> {
        if current == 0 {
            return Err(SwapError::OracleCardinalityZero);
        }
        let next = next.min(MAX_CARDINALITY);
        if next <= current {
            return Ok(current);
        }
        for i in current..next {
            let mut slot = self.get(i);
            slot.block_timestamp = 1;
            self.set(i, slot);
        }
        Ok(next)
    }
}

/// Read view of a ring with one write staged on top.
#[derive(Debug, Clone, Copy)]
pub struct PendingRing<'a> {
    pub base: &'a ObservationStorage,
    pub pending: Option<(u32, Observation)>,
}

impl ObservationRing for PendingRing<'_> {
    fn observation(&self, index: u32) -> Observation {
        match self.pending {
            Some((i, obs)) if i == index => obs,
            _ => self.base.get(index),
        }
    }
}
