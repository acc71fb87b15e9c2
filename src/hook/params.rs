//! Packed hook parameters.
//!
//! Layout (big-endian, 43 bytes):
//!
//! ```text
//! | feeMin 3 | feeMax 3 | feeQuadraticMultiplier 3 | feeTwapSecondsAgo 3 | maxAmAmmFee 3 |
//! | surgeFeeHalfLife 3 | surgeFeeAutostartThreshold 2 | vaultSurgeThreshold0 2 | vaultSurgeThreshold1 2 |
//! | rebalanceThreshold 2 | rebalanceMaxSlippage 2 | rebalanceTwapSecondsAgo 2 | rebalanceOrderTTL 2 |
//! | amAmmEnabled 1 | oracleMinInterval 4 | minRentMultiplier 6 |
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Result, SwapError};
use crate::fees::DynamicFeeParams;
use crate::types::conversions::{read_u16, read_u24, read_u32, read_u8, read_uint, write_uint};

pub const HOOK_PARAMS_LEN: usize = 43;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookParams {
    pub fee_min: u32,
    pub fee_max: u32,
    pub fee_quadratic_multiplier: u32,
    pub fee_twap_seconds_ago: u32,
    pub max_am_amm_fee: u32,
    pub surge_fee_half_life: u32,
    pub surge_fee_autostart_threshold: u16,
    pub vault_surge_threshold0: u16,
    pub vault_surge_threshold1: u16,
    pub rebalance_threshold: u16,
    pub rebalance_max_slippage: u16,
    pub rebalance_twap_seconds_ago: u16,
    #[serde(rename = "rebalanceOrderTTL")]
    pub rebalance_order_ttl: u16,
    pub am_amm_enabled: bool,
    pub oracle_min_interval: u32,
    pub min_rent_multiplier: u64,
}

impl HookParams {
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HOOK_PARAMS_LEN {
            return Err(SwapError::InvalidParams(format!(
                "hook params need {} bytes, got {}",
                HOOK_PARAMS_LEN,
                bytes.len()
            )));
        }
        Ok(Self {
            fee_min: read_u24(bytes, 0),
            fee_max: read_u24(bytes, 3),
            fee_quadratic_multiplier: read_u24(bytes, 6),
            fee_twap_seconds_ago: read_u24(bytes, 9),
            max_am_amm_fee: read_u24(bytes, 12),
            surge_fee_half_life: read_u24(bytes, 15),
            surge_fee_autostart_threshold: read_u16(bytes, 18),
            vault_surge_threshold0: read_u16(bytes, 20),
            vault_surge_threshold1: read_u16(bytes, 22),
            rebalance_threshold: read_u16(bytes, 24),
            rebalance_max_slippage: read_u16(bytes, 26),
            rebalance_twap_seconds_ago: read_u16(bytes, 28),
            rebalance_order_ttl: read_u16(bytes, 30),
            am_amm_enabled: read_u8(bytes, 32) != 0,
            oracle_min_interval: read_u32(bytes, 33),
            min_rent_multiplier: read_uint(bytes, 37, 6),
        })
    }

    pub fn encode(&self) -> [u8; HOOK_PARAMS_LEN] {
        let mut out = [0u8; HOOK_PARAMS_LEN];
        write_uint(&mut out, 0, 3, self.fee_min as u64);
        write_uint(&mut out, 3, 3, self.fee_max as u64);
        write_uint(&mut out, 6, 3, self.fee_quadratic_multiplier as u64);
        write_uint(&mut out, 9, 3, self.fee_twap_seconds_ago as u64);
        write_uint(&mut out, 12, 3, self.max_am_amm_fee as u64);
        write_uint(&mut out, 15, 3, self.surge_fee_half_life as u64);
        write_uint(&mut out, 18, 2, self.surge_fee_autostart_threshold as u64);
        write_uint(&mut out, 20, 2, self.vault_surge_threshold0 as u64);
        write_uint(&mut out, 22, 2, self.vault_surge_threshold1 as u64);
        write_uint(&mut out, 24, 2, self.rebalance_threshold as u64);
        write_uint(&mut out, 26, 2, self.rebalance_max_slippage as u64);
        write_uint(&mut out, 28, 2, self.rebalance_twap_seconds_ago as u64);
        write_uint(&mut out, 30, 2, self.rebalance_order_ttl as u64);
        out[32] = self.am_amm_enabled as u8;
        write_uint(&mut out, 33, 4, self.oracle_min_interval as u64);
        write_uint(&mut out, 37, 6, self.min_rent_multiplier & 0xffff_ffff_ffff);
        out
    }

    pub fn dynamic_fee(&self) -> DynamicFeeParams {
        DynamicFeeParams {
            fee_min: self.fee_min,
            fee_max: self.fee_max,
            fee_quadratic_multiplier: self.fee_quadratic_multiplier,
            surge_fee_half_life: self.surge_fee_half_life,
        }
    }
}
