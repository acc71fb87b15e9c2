//! Persisted pool snapshots.
//!
//! A pool travels as two versioned JSON documents: [`StaticExtra`] (configuration that changes only
//! with a new pool epoch) and [`Extra`] (runtime state refreshed from chain). Packed words and wide
//! integers both travel as `0x`-prefixed hex.

use std::sync::Arc;

use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SwapError};
use crate::hook::params::HookParams;
use crate::hook::vault::{RawTokenRatios, Vault, VaultSharePrices};
use crate::hook::{AmAmm, BunniState, HookState, Slot0};
use crate::ldf::LdfType;
use crate::oracle::{ObservationState, ObservationStorage};
use crate::registry::Registry;
use crate::types::conversions::{decode_idle_balance, encode_idle_balance, word_from_hex, word_to_hex};

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticExtra {
    pub version: u32,
    pub pool: Address,
    pub hook: Address,
    pub ldf: Address,
    #[serde(default)]
    pub hooklet: Address,
    /// Hooklet-specific config, handed to the registry as-is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hooklet_extra: Option<serde_json::Value>,
    /// Floor price for oracle-anchored LDFs (WAD).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floor_price_wad: Option<U256>,
    pub tick_spacing: i32,
    pub ldf_type: LdfType,
    pub ldf_params: String,
    pub hook_params: String,
    #[serde(default)]
    pub twap_seconds_ago: u32,
    pub currency0_decimals: u8,
    pub currency1_decimals: u8,
    #[serde(default)]
    pub raw_token_ratios0: RawTokenRatios,
    #[serde(default)]
    pub raw_token_ratios1: RawTokenRatios,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extra {
    pub version: u32,
    /// Block time the state was read at.
    #[serde(default)]
    pub block_timestamp: u32,
    pub slot0: Slot0,
    pub raw_balance0: U256,
    pub raw_balance1: U256,
    #[serde(default)]
    pub reserve0: U256,
    #[serde(default)]
    pub reserve1: U256,
    /// Tagged idle-balance word.
    pub idle_balance: String,
    pub ldf_state: String,
    pub observation_state: ObservationState,
    pub observations: ObservationStorage,
    #[serde(default)]
    pub vaults: [Vault; 2],
    #[serde(default)]
    pub vault_share_prices: VaultSharePrices,
    #[serde(default)]
    pub pool_manager_reserves: [U256; 2],
    #[serde(default)]
    pub am_amm: AmAmm,
    #[serde(default)]
    pub hook_fee_modifier: u32,
    #[serde(default)]
    pub curator_fee_rate: u32,
    #[serde(default)]
    pub rebalance_order_deadline: u32,
}

/// A decoded pool: its identity, the documents it came from and the state quotes run against.
#[derive(Debug, Clone)]
pub struct PoolSnapshot {
    pub static_extra: StaticExtra,
    pub state: HookState,
}

fn check_version(version: u32, what: &str) -> Result<()> {
    if version != SNAPSHOT_VERSION {
        return Err(SwapError::Decode(format!("{} version {} (expected {})", what, version, SNAPSHOT_VERSION)));
    }
    Ok(())
}

impl PoolSnapshot {
    pub fn address(&self) -> Address {
        self.static_extra.pool
    }

    pub fn from_json(extra: &str, static_extra: &str, registry: &Registry) -> Result<Self> {
        let extra: Extra = serde_json::from_str(extra)?;
        let static_extra: StaticExtra = serde_json::from_str(static_extra)?;
        Self::from_documents(extra, static_extra, registry)
    }

    pub fn from_documents(extra: Extra, static_extra: StaticExtra, registry: &Registry) -> Result<Self> {
        check_version(extra.version, "extra")?;
        check_version(static_extra.version, "static extra")?;
        registry.ensure_hook(&static_extra.hook)?;

        let ldf = registry.resolve_ldf(&static_extra.ldf, static_extra.floor_price_wad)?;
        let hooklet = registry.resolve_hooklet(&static_extra.hooklet, static_extra.hooklet_extra.as_ref())?;

        let ldf_params = word_from_hex(&static_extra.ldf_params)?;
        if !ldf.is_valid_params(&ldf_params, static_extra.tick_spacing, static_extra.twap_seconds_ago) {
            return Err(SwapError::InvalidParams(format!("ldf params {} rejected", static_extra.ldf_params)));
        }
        let hook_params = HookParams::decode(&hex::decode(static_extra.hook_params.trim_start_matches("0x"))?)?;
        let ldf_state = ldf.decode_state(&word_from_hex(&extra.ldf_state)?);
        let idle_balance = decode_idle_balance(&word_from_hex(&extra.idle_balance)?);

        let state = HookState {
            tick_spacing: static_extra.tick_spacing,
            slot0: extra.slot0,
            bunni_state: BunniState {
                raw_balance0: extra.raw_balance0,
                raw_balance1: extra.raw_balance1,
                reserve0: extra.reserve0,
                reserve1: extra.reserve1,
                idle_balance,
                ldf_type: static_extra.ldf_type,
                ldf_params,
                twap_seconds_ago: static_extra.twap_seconds_ago,
                currency0_decimals: static_extra.currency0_decimals,
                currency1_decimals: static_extra.currency1_decimals,
                raw_token_ratios0: static_extra.raw_token_ratios0,
                raw_token_ratios1: static_extra.raw_token_ratios1,
            },
            ldf,
            ldf_state,
            hook_params,
            observation_state: extra.observation_state,
            observations: Arc::new(extra.observations),
            vaults: extra.vaults,
            vault_share_prices: extra.vault_share_prices,
            pool_manager_reserves: extra.pool_manager_reserves,
            am_amm: extra.am_amm,
            hook_fee_modifier: extra.hook_fee_modifier,
            curator_fee_rate: extra.curator_fee_rate,
            rebalance_order_deadline: extra.rebalance_order_deadline,
            block_timestamp: extra.block_timestamp,
            hooklet,
        };

        Ok(Self { static_extra, state })
    }

    /// Runtime document for the current state.
    pub fn extra(&self) -> Result<Extra> {
        let state = &self.state;
        let bunni = &state.bunni_state;
        Ok(Extra {
            version: SNAPSHOT_VERSION,
            block_timestamp: state.block_timestamp,
            slot0: state.slot0,
            raw_balance0: bunni.raw_balance0,
            raw_balance1: bunni.raw_balance1,
            reserve0: bunni.reserve0,
            reserve1: bunni.reserve1,
            idle_balance: word_to_hex(&encode_idle_balance(&bunni.idle_balance)?),
            ldf_state: word_to_hex(&state.ldf_state.encode()),
            observation_state: state.observation_state,
            observations: (*state.observations).clone(),
            vaults: state.vaults,
            vault_share_prices: state.vault_share_prices,
            pool_manager_reserves: state.pool_manager_reserves,
            am_amm: state.am_amm,
            hook_fee_modifier: state.hook_fee_modifier,
            curator_fee_rate: state.curator_fee_rate,
            rebalance_order_deadline: state.rebalance_order_deadline,
        })
    }

    /// `(extra, static_extra)` JSON documents.
    pub fn to_json(&self) -> Result<(String, String)> {
        Ok((serde_json::to_string(&self.extra()?)?, serde_json::to_string(&self.static_extra)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ldf::params::UniformParams;
    use crate::ldf::{LdfKind, LdfState, ShiftMode};
    use crate::math::Q96;

    fn registry() -> Registry {
        Registry::new().with_hook(Address::repeat_byte(0xbb)).with_ldf(Address::repeat_byte(0x01), LdfKind::Uniform)
    }

    fn documents() -> (Extra, StaticExtra) {
        let params = UniformParams { shift_mode: ShiftMode::Static, tick_lower_or_offset: -100, tick_upper_or_offset: 100 };
        let hook_params = HookParams { fee_min: 3_000, fee_max: 3_000, surge_fee_half_life: 60, ..Default::default() };
        let mut observations = ObservationStorage::default();
        let observation_state = observations.initialize(1_000, 0);
        let static_extra = StaticExtra {
            version: SNAPSHOT_VERSION,
            pool: Address::repeat_byte(0x55),
            hook: Address::repeat_byte(0xbb),
            ldf: Address::repeat_byte(0x01),
            hooklet: Address::zero(),
            hooklet_extra: None,
            floor_price_wad: None,
            tick_spacing: 10,
            ldf_type: LdfType::Static,
            ldf_params: word_to_hex(&params.encode()),
            hook_params: format!("0x{}", hex::encode(hook_params.encode())),
            twap_seconds_ago: 0,
            currency0_decimals: 18,
            currency1_decimals: 6,
            raw_token_ratios0: RawTokenRatios::default(),
            raw_token_ratios1: RawTokenRatios::default(),
        };
        let extra = Extra {
            version: SNAPSHOT_VERSION,
            block_timestamp: 2_000,
            slot0: Slot0 { sqrt_price_x96: Q96, tick: 0, last_swap_timestamp: 1_000, last_surge_timestamp: 0 },
            raw_balance0: U256::exp10(18),
            raw_balance1: U256::exp10(18),
            reserve0: U256::zero(),
            reserve1: U256::zero(),
            idle_balance: word_to_hex(&[0u8; 32]),
            ldf_state: word_to_hex(&LdfState::Uninitialized.encode()),
            observation_state,
            observations,
            vaults: [Vault::default(); 2],
            vault_share_prices: VaultSharePrices::default(),
            pool_manager_reserves: [U256::zero(); 2],
            am_amm: AmAmm::default(),
            hook_fee_modifier: 0,
            curator_fee_rate: 0,
            rebalance_order_deadline: 0,
        };
        (extra, static_extra)
    }

    #[test]
    fn test_json_round_trip() {
        let (extra, static_extra) = documents();
        let extra_json = serde_json::to_string(&extra).unwrap();
        let static_json = serde_json::to_string(&static_extra).unwrap();
        let snapshot = PoolSnapshot::from_json(&extra_json, &static_json, &registry()).unwrap();
        assert_eq!(snapshot.address(), Address::repeat_byte(0x55));

        let (extra_again, static_again) = snapshot.to_json().unwrap();
        let reparsed = PoolSnapshot::from_json(&extra_again, &static_again, &registry()).unwrap();
        assert_eq!(reparsed.extra().unwrap(), extra);
        assert_eq!(reparsed.static_extra, static_extra);
    }

    #[test]
    fn test_rejects_wrong_version() {
        let (mut extra, static_extra) = documents();
        extra.version = 2;
        let err = PoolSnapshot::from_documents(extra, static_extra, &registry()).unwrap_err();
        assert!(matches!(err, SwapError::Decode(_)));
    }

    #[test]
    fn test_rejects_unknown_ldf_and_bad_params() {
        let (extra, mut static_extra) = documents();
        static_extra.ldf = Address::repeat_byte(0x09);
        assert!(matches!(
            PoolSnapshot::from_documents(extra.clone(), static_extra, &registry()),
            Err(SwapError::UnknownAddress(_))
        ));

        let (_, mut static_extra) = documents();
        // ticks off the spacing grid
        let params = UniformParams { shift_mode: ShiftMode::Static, tick_lower_or_offset: -105, tick_upper_or_offset: 100 };
        static_extra.ldf_params = word_to_hex(&params.encode());
        assert!(matches!(
            PoolSnapshot::from_documents(extra, static_extra, &registry()),
            Err(SwapError::InvalidParams(_))
        ));
    }

    #[test]
    fn test_snapshot_quotes() {
        let (extra, static_extra) = documents();
        let snapshot = PoolSnapshot::from_documents(extra, static_extra, &registry()).unwrap();
        let result = snapshot.state.quote(true, true, U256::exp10(15)).unwrap();
        assert!(result.amount_out > U256::zero());
    }
}
