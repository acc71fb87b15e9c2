//! LDF carry-over state.
//!
//! On chain this is an opaque 32-byte word; inside the crate it is a sum type and the
//! word form only exists at the persistence edge (`decode` / `encode`).
//! Wire layout: `| initialized 1 | tick 3 | extra.. |`.

use super::params::ORACLE_UNI_GEO_PARAMS_LEN;
use super::LdfKind;
use crate::types::conversions::{read_i24, write_i24};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LdfState {
    #[default]
    Uninitialized,
    /// Last anchor tick (min tick, or tick lower for the uniform shape).
    Anchor { last_min_tick: i32 },
    /// Last TWAP tick seen by the buy-the-dip distribution.
    BuyTheDip { last_twap_tick: i32 },
    /// Last oracle-derived tick and the raw params that produced it.
    OracleUniGeo { last_oracle_tick: i32, last_params: [u8; ORACLE_UNI_GEO_PARAMS_LEN] },
}

impl LdfState {
    pub fn decode(kind: LdfKind, word: &[u8; 32]) -> Self {
        if word[0] != 1 {
            return LdfState::Uninitialized;
        }
        let tick = read_i24(word, 1);
        match kind {
            LdfKind::BuyTheDipGeometric => LdfState::BuyTheDip { last_twap_tick: tick },
            LdfKind::OracleUniGeo => {
                let mut last_params = [0u8; ORACLE_UNI_GEO_PARAMS_LEN];
                last_params.copy_from_slice(&word[4..4 + ORACLE_UNI_GEO_PARAMS_LEN]);
                LdfState::OracleUniGeo { last_oracle_tick: tick, last_params }
            }
            _ => LdfState::Anchor { last_min_tick: tick },
        }
    }

    pub fn encode(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        match self {
            LdfState::Uninitialized => {}
            LdfState::Anchor { last_min_tick: tick } | LdfState::BuyTheDip { last_twap_tick: tick } => {
                word[0] = 1;
                write_i24(&mut word, 1, *tick);
            }
            LdfState::OracleUniGeo { last_oracle_tick, last_params } => {
                word[0] = 1;
                write_i24(&mut word, 1, *last_oracle_tick);
                word[4..4 + ORACLE_UNI_GEO_PARAMS_LEN].copy_from_slice(last_params);
            }
        }
        word
    }

    pub fn is_initialized(&self) -> bool {
        !matches!(self, LdfState::Uninitialized)
    }

    /// Last anchor tick, if this is an anchor state.
    pub fn last_min_tick(&self) -> Option<i32> {
        match self {
            LdfState::Anchor { last_min_tick } => Some(*last_min_tick),
            _ => None,
        }
    }
}
