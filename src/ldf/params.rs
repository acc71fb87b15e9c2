//! Packed LDF parameter words.
//!
//! Each distribution reads its parameters from a 32-byte big-endian word. Every layout is written
//! out once here, next to the struct that owns it, and nowhere else in the crate touches the bytes.
//! Unused trailing bytes are zero on encode and ignored on decode.

use ethers::types::U256;

use super::shift::ShiftMode;
use crate::error::{Result, SwapError};
use crate::math::{full_math::mul_div, max_usable_tick, min_usable_tick, round_tick_single, Q96};
use crate::types::conversions::{read_i16, read_i24, read_u32, read_u8, write_i16, write_i24, write_u32, write_u8};

pub const ALPHA_BASE: u64 = 100_000_000;

/// `alpha * 2^96 / ALPHA_BASE`
pub fn alpha_x96(alpha: u32) -> Result<U256> {
    mul_div(U256::from(alpha), Q96, U256::from(ALPHA_BASE))
}

/// Resolve a dynamic anchor: `round(twap + offset)` clamped so `length` ticks still fit the usable range.
pub fn resolve_min_tick(
    shift_mode: ShiftMode,
    min_tick_or_offset: i32,
    length: i32,
    twap_tick: i32,
    tick_spacing: i32,
) -> i32 {
    if shift_mode == ShiftMode::Static {
        return min_tick_or_offset;
    }
    let min_tick = round_tick_single(twap_tick + min_tick_or_offset, tick_spacing);
    let min_usable = min_usable_tick(tick_spacing);
    let max_usable = max_usable_tick(tick_spacing);
    if min_tick < min_usable {
        min_usable
    } else if min_tick > max_usable - length * tick_spacing {
        max_usable - length * tick_spacing
    } else {
        min_tick
    }
}

/// `| shiftMode 1 | tickLowerOrOffset 3 | tickUpperOrOffset 3 |`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformParams {
    pub shift_mode: ShiftMode,
    pub tick_lower_or_offset: i32,
    pub tick_upper_or_offset: i32,
}

impl UniformParams {
    pub fn decode(word: &[u8; 32]) -> Result<Self> {
        Ok(Self {
            shift_mode: ShiftMode::try_from(read_u8(word, 0))?,
            tick_lower_or_offset: read_i24(word, 1),
            tick_upper_or_offset: read_i24(word, 4),
        })
    }

    pub fn encode(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        write_u8(&mut word, 0, self.shift_mode as u8);
        write_i24(&mut word, 1, self.tick_lower_or_offset);
        write_i24(&mut word, 4, self.tick_upper_or_offset);
        word
    }

    /// Tick bounds for the given TWAP. Dynamic bounds are each rounded to the grid.
    pub fn ticks(&self, twap_tick: i32, tick_spacing: i32) -> (i32, i32) {
        if self.shift_mode != ShiftMode::Static {
            (
                round_tick_single(twap_tick + self.tick_lower_or_offset, tick_spacing),
                round_tick_single(twap_tick + self.tick_upper_or_offset, tick_spacing),
            )
        } else {
            (self.tick_lower_or_offset, self.tick_upper_or_offset)
        }
    }
}

/// `| shiftMode 1 | minTickOrOffset 3 | length 2 | alpha 4 |`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometricParams {
    pub shift_mode: ShiftMode,
    pub min_tick_or_offset: i32,
    pub length: i32,
    pub alpha: u32,
}

impl GeometricParams {
    pub fn decode(word: &[u8; 32]) -> Result<Self> {
        Ok(Self {
            shift_mode: ShiftMode::try_from(read_u8(word, 0))?,
            min_tick_or_offset: read_i24(word, 1),
            length: read_i16(word, 4),
            alpha: read_u32(word, 6),
        })
    }

    pub fn encode(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        self.write(&mut word);
        word
    }

    fn write(&self, word: &mut [u8; 32]) {
        write_u8(word, 0, self.shift_mode as u8);
        write_i24(word, 1, self.min_tick_or_offset);
        write_i16(word, 4, self.length);
        write_u32(word, 6, self.alpha);
    }

    pub fn min_tick(&self, twap_tick: i32, tick_spacing: i32) -> i32 {
        resolve_min_tick(self.shift_mode, self.min_tick_or_offset, self.length, twap_tick, tick_spacing)
    }
}

/// `| shiftMode 1 | minTickOrOffset 3 | length 2 | alpha 4 | weightCarpet 4 |`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CarpetedGeometricParams {
    pub geometric: GeometricParams,
    pub weight_carpet: u32,
}

impl CarpetedGeometricParams {
    pub fn decode(word: &[u8; 32]) -> Result<Self> {
        Ok(Self { geometric: GeometricParams::decode(word)?, weight_carpet: read_u32(word, 10) })
    }

    pub fn encode(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        self.geometric.write(&mut word);
        write_u32(&mut word, 10, self.weight_carpet);
        word
    }
}

/// `| shiftMode 1 | minTickOrOffset 3 | length0 2 | alpha0 4 | weight0 4 | length1 2 | alpha1 4 | weight1 4 |`
///
/// Distribution 1 sits at `minTick`, distribution 0 directly to its right.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DoubleGeometricParams {
    pub shift_mode: ShiftMode,
    pub min_tick_or_offset: i32,
    pub length0: i32,
    pub alpha0: u32,
    pub weight0: u32,
    pub length1: i32,
    pub alpha1: u32,
    pub weight1: u32,
}

impl DoubleGeometricParams {
    pub fn decode(word: &[u8; 32]) -> Result<Self> {
        Ok(Self {
            shift_mode: ShiftMode::try_from(read_u8(word, 0))?,
            min_tick_or_offset: read_i24(word, 1),
            length0: read_i16(word, 4),
            alpha0: read_u32(word, 6),
            weight0: read_u32(word, 10),
            length1: read_i16(word, 14),
            alpha1: read_u32(word, 16),
            weight1: read_u32(word, 20),
        })
    }

    pub fn encode(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        self.write(&mut word);
        word
    }

    fn write(&self, word: &mut [u8; 32]) {
        write_u8(word, 0, self.shift_mode as u8);
        write_i24(word, 1, self.min_tick_or_offset);
        write_i16(word, 4, self.length0);
        write_u32(word, 6, self.alpha0);
        write_u32(word, 10, self.weight0);
        write_i16(word, 14, self.length1);
        write_u32(word, 16, self.alpha1);
        write_u32(word, 20, self.weight1);
    }

    pub fn min_tick(&self, twap_tick: i32, tick_spacing: i32) -> i32 {
        resolve_min_tick(
            self.shift_mode,
            self.min_tick_or_offset,
            self.length0 + self.length1,
            twap_tick,
            tick_spacing,
        )
    }
}

/// Double geometric layout followed by `| weightCarpet 4 |` at bytes 24..28.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CarpetedDoubleGeometricParams {
    pub double: DoubleGeometricParams,
    pub weight_carpet: u32,
}

impl CarpetedDoubleGeometricParams {
    pub fn decode(word: &[u8; 32]) -> Result<Self> {
        Ok(Self { double: DoubleGeometricParams::decode(word)?, weight_carpet: read_u32(word, 24) })
    }

    pub fn encode(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        self.double.write(&mut word);
        write_u32(&mut word, 24, self.weight_carpet);
        word
    }
}

/// `| shiftMode 1 | minTick 3 | length 2 | alpha 4 | altAlpha 4 | altThreshold 3 | altThresholdDirection 1 |`
///
/// The min tick is always static. `alt_threshold_direction == true` switches to the alternative
/// alpha when the TWAP is at or below the threshold, otherwise when it is at or above.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuyTheDipParams {
    pub shift_mode: ShiftMode,
    pub min_tick: i32,
    pub length: i32,
    pub alpha: u32,
    pub alt_alpha: u32,
    pub alt_threshold: i32,
    pub alt_threshold_direction: bool,
}

impl BuyTheDipParams {
    pub fn decode(word: &[u8; 32]) -> Result<Self> {
        Ok(Self {
            shift_mode: ShiftMode::try_from(read_u8(word, 0))?,
            min_tick: read_i24(word, 1),
            length: read_i16(word, 4),
            alpha: read_u32(word, 6),
            alt_alpha: read_u32(word, 10),
            alt_threshold: read_i24(word, 14),
            alt_threshold_direction: read_u8(word, 17) != 0,
        })
    }

    pub fn encode(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        write_u8(&mut word, 0, self.shift_mode as u8);
        write_i24(&mut word, 1, self.min_tick);
        write_i16(&mut word, 4, self.length);
        write_u32(&mut word, 6, self.alpha);
        write_u32(&mut word, 10, self.alt_alpha);
        write_i24(&mut word, 14, self.alt_threshold);
        write_u8(&mut word, 17, self.alt_threshold_direction as u8);
        word
    }

    pub fn should_use_alt_alpha(&self, twap_tick: i32) -> bool {
        if self.alt_threshold_direction {
            twap_tick <= self.alt_threshold
        } else {
            twap_tick >= self.alt_threshold
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleDistribution {
    Uniform = 0,
    Geometric = 1,
}

/// `| distributionType 1 | oracleIsTickLower 1 | oracleTickOffset 2 | nonOracleTick 3 | alpha 4 |`
///
/// One bound is derived from the external floor price (plus `oracle_tick_offset`), the other is fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OracleUniGeoParams {
    pub distribution: OracleDistribution,
    pub oracle_is_tick_lower: bool,
    pub oracle_tick_offset: i32,
    pub non_oracle_tick: i32,
    pub alpha: u32,
}

/// Number of meaningful bytes in an [`OracleUniGeoParams`] word.
pub const ORACLE_UNI_GEO_PARAMS_LEN: usize = 11;

impl OracleUniGeoParams {
    pub fn decode(word: &[u8; 32]) -> Result<Self> {
        let distribution = match read_u8(word, 0) {
            0 => OracleDistribution::Uniform,
            1 => OracleDistribution::Geometric,
            other => return Err(SwapError::InvalidParams(format!("distribution type {}", other))),
        };
        Ok(Self {
            distribution,
            oracle_is_tick_lower: read_u8(word, 1) != 0,
            oracle_tick_offset: read_i16(word, 2),
            non_oracle_tick: read_i24(word, 4),
            alpha: read_u32(word, 7),
        })
    }

    pub fn encode(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        write_u8(&mut word, 0, self.distribution as u8);
        write_u8(&mut word, 1, self.oracle_is_tick_lower as u8);
        write_i16(&mut word, 2, self.oracle_tick_offset);
        write_i24(&mut word, 4, self.non_oracle_tick);
        write_u32(&mut word, 7, self.alpha);
        word
    }

    /// `(tickLower, tickUpper)` given the rounded oracle tick.
    pub fn bounds(&self, oracle_tick: i32) -> (i32, i32) {
        let anchored = oracle_tick + self.oracle_tick_offset;
        if self.oracle_is_tick_lower {
            (anchored, self.non_oracle_tick)
        } else {
            (self.non_oracle_tick, anchored)
        }
    }
}
