//! # Hook State Machine
//!
//! One quote runs against an immutable [`HookState`]: it updates the oracle in memory, queries the
//! LDF, runs the swap engine, charges fees and settles balances against the vaults. Everything the
//! swap changes is returned as a [`SwapInfo`] delta; [`apply_delta`] is the only way state moves.

pub mod hooklet;
pub mod idle_balance;
pub mod params;
pub mod vault;

use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use ethers::types::{Address, I256, U256};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SwapError};
use crate::fees::{compute_dynamic_swap_fee, compute_surge_fee, split_exact_in, split_exact_out, FeeConfig, FeeSplit};
use crate::ldf::{Ldf, LdfState, LdfType};
use crate::math::{get_tick_at_sqrt_price, MAX_SQRT_PRICE, MIN_SQRT_PRICE};
use crate::metrics;
use crate::oracle::{ObservationRing, ObservationState, ObservationStorage, ObservationWrite, PendingRing};
use crate::swap_engine::{compute_swap, query_ldf, LdfContext, SwapInput};

use hooklet::Hooklet;
use idle_balance::{compute_idle_balance, IdleBalance};
use params::HookParams;
use vault::{
    apply_signed, should_surge_from_vaults, update_raw_balance_if_needed, update_vault_reserve_via_claim_tokens,
    RawTokenRatios, TokenBalances, Vault, VaultSharePrices,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot0 {
    pub sqrt_price_x96: U256,
    pub tick: i32,
    pub last_swap_timestamp: u32,
    pub last_surge_timestamp: u32,
}

/// Balances and distribution config the hook keeps per pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BunniState {
    pub raw_balance0: U256,
    pub raw_balance1: U256,
    /// Vault shares.
    pub reserve0: U256,
    pub reserve1: U256,
    pub idle_balance: IdleBalance,
    pub ldf_type: LdfType,
    pub ldf_params: [u8; 32],
    pub twap_seconds_ago: u32,
    pub currency0_decimals: u8,
    pub currency1_decimals: u8,
    pub raw_token_ratios0: RawTokenRatios,
    pub raw_token_ratios1: RawTokenRatios,
}

/// Auction manager and the fees it set, per direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmAmm {
    pub manager: Address,
    pub swap_fee_0_for_1: u32,
    pub swap_fee_1_for_0: u32,
}

/// Everything a quote reads. Cheap to clone: the observation ring is shared until a commit writes it.
#[derive(Debug, Clone)]
pub struct HookState {
    pub tick_spacing: i32,
    pub slot0: Slot0,
    pub bunni_state: BunniState,
    pub ldf: Ldf,
    pub ldf_state: LdfState,
    pub hook_params: HookParams,
    pub observation_state: ObservationState,
    pub observations: Arc<ObservationStorage>,
    pub vaults: [Vault; 2],
    pub vault_share_prices: VaultSharePrices,
    pub pool_manager_reserves: [U256; 2],
    pub am_amm: AmAmm,
    pub hook_fee_modifier: u32,
    pub curator_fee_rate: u32,
    pub rebalance_order_deadline: u32,
    /// Timestamp quotes are evaluated at; zero means wall-clock time.
    pub block_timestamp: u32,
    pub hooklet: Arc<dyn Hooklet>,
}

/// State changes produced by one swap. `None` leaves the field untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SwapInfo {
    pub slot0: Option<Slot0>,
    pub raw_balance0: Option<U256>,
    pub raw_balance1: Option<U256>,
    pub reserve0: Option<U256>,
    pub reserve1: Option<U256>,
    pub idle_balance: Option<IdleBalance>,
    pub ldf_state: Option<LdfState>,
    pub vault_share_prices: Option<VaultSharePrices>,
    pub pool_manager_reserve0: Option<U256>,
    pub pool_manager_reserve1: Option<U256>,
    pub observation_write: Option<ObservationWrite>,
    pub rebalance_order_deadline: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapResult {
    /// What the swapper pays, fees included.
    pub amount_in: U256,
    /// What the swapper receives, fees excluded.
    pub amount_out: U256,
    pub fees: FeeSplit,
    pub sqrt_price_x96_after: U256,
    pub tick_after: i32,
    pub should_surge: bool,
    pub rebalance_triggered: bool,
    #[serde(skip)]
    pub info: SwapInfo,
}

/// Quote a swap against `state` without changing it.
pub fn quote(zero_for_one: bool, exact_in: bool, amount_specified: U256, state: &HookState) -> Result<SwapResult> {
    let started = Instant::now();
    let result = QuoteContext::new(state).run(zero_for_one, exact_in, amount_specified);
    match &result {
        Ok(r) => {
            metrics::record_quote_latency_us(started.elapsed());
            if r.should_surge {
                metrics::increment_surge();
            }
            if r.rebalance_triggered {
                metrics::increment_rebalance_trigger();
            }
        }
        Err(e) => {
            debug!("quote failed (zero_for_one={}, exact_in={}, amount={}): {}", zero_for_one, exact_in, amount_specified, e);
            metrics::increment_quote_failure(e.kind());
        }
    }
    result
}

/// `state` with `delta` committed.
pub fn apply_delta(state: &HookState, delta: &SwapInfo) -> HookState {
    let mut next = state.clone();
    next.apply(delta);
    next
}

impl HookState {
    pub fn quote(&self, zero_for_one: bool, exact_in: bool, amount_specified: U256) -> Result<SwapResult> {
        quote(zero_for_one, exact_in, amount_specified, self)
    }

    /// Commit every field `delta` carries.
    pub fn apply(&mut self, delta: &SwapInfo) {
        if let Some(slot0) = delta.slot0 {
            self.slot0 = slot0;
        }
        let bunni = &mut self.bunni_state;
        if let Some(v) = delta.raw_balance0 {
            bunni.raw_balance0 = v;
        }
        if let Some(v) = delta.raw_balance1 {
            bunni.raw_balance1 = v;
        }
        if let Some(v) = delta.reserve0 {
            bunni.reserve0 = v;
        }
        if let Some(v) = delta.reserve1 {
            bunni.reserve1 = v;
        }
        if let Some(idle) = delta.idle_balance {
            bunni.idle_balance = idle;
        }
        if let Some(ldf_state) = delta.ldf_state {
            self.ldf_state = ldf_state;
        }
        if let Some(prices) = delta.vault_share_prices {
            self.vault_share_prices = prices;
        }
        if let Some(v) = delta.pool_manager_reserve0 {
            self.pool_manager_reserves[0] = v;
        }
        if let Some(v) = delta.pool_manager_reserve1 {
            self.pool_manager_reserves[1] = v;
        }
        if let Some(write) = &delta.observation_write {
            self.observation_state = write.apply_to(&self.observation_state);
            if write.slot.is_some() {
                Arc::make_mut(&mut self.observations).commit(write);
            }
        }
        if let Some(deadline) = delta.rebalance_order_deadline {
            self.rebalance_order_deadline = deadline;
        }
    }

    fn now(&self) -> u32 {
        if self.block_timestamp != 0 {
            return self.block_timestamp;
        }
        SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as u32).unwrap_or_default()
    }
}

/// Per-quote scratch space. The oracle write is computed on first use and reused afterwards.
struct QuoteContext<'a> {
    state: &'a HookState,
    now: u32,
    oracle_update: Option<ObservationWrite>,
}

fn to_i256(v: U256) -> Result<I256> {
    I256::try_from(v).map_err(|_| SwapError::Overflow)
}

impl<'a> QuoteContext<'a> {
    fn new(state: &'a HookState) -> Self {
        Self { state, now: state.now(), oracle_update: None }
    }

    fn oracle_write(&mut self, tick: i32) -> ObservationWrite {
        let state = self.state;
        let now = self.now;
        *self.oracle_update.get_or_insert_with(|| {
            let obs = &state.observation_state;
            state.observations.prepare_write(
                obs.intermediate,
                obs.index,
                now,
                tick,
                obs.cardinality,
                obs.cardinality_next,
                state.hook_params.oracle_min_interval,
            )
        })
    }

    fn run(&mut self, zero_for_one: bool, exact_in: bool, amount_specified: U256) -> Result<SwapResult> {
        let state = self.state;
        let now = self.now;
        let params = &state.hook_params;
        let bunni = &state.bunni_state;

        let hooklet_override = state.hooklet.before_swap(zero_for_one);
        let mut slot0 = state.slot0;
        if let Some(sqrt_price_x96) = hooklet_override.sqrt_price_x96 {
            slot0.sqrt_price_x96 = sqrt_price_x96;
            slot0.tick = get_tick_at_sqrt_price(sqrt_price_x96)?;
        }

        let sqrt_price_limit_x96 = if zero_for_one { MIN_SQRT_PRICE + 1 } else { MAX_SQRT_PRICE - 1 };
        if slot0.sqrt_price_x96.is_zero()
            || (zero_for_one && sqrt_price_limit_x96 >= slot0.sqrt_price_x96)
            || (!zero_for_one && sqrt_price_limit_x96 <= slot0.sqrt_price_x96)
            || amount_specified.is_zero()
            || amount_specified > U256::from(i128::MAX as u128)
        {
            return Err(SwapError::InvalidSwap);
        }

        let balance0 = bunni
            .raw_balance0
            .checked_add(state.vaults[0].reserves_in_underlying(bunni.reserve0)?)
            .ok_or(SwapError::Overflow)?;
        let balance1 = bunni
            .raw_balance1
            .checked_add(state.vaults[1].reserves_in_underlying(bunni.reserve1)?)
            .ok_or(SwapError::Overflow)?;

        // oracle and TWAPs
        let oracle_write = self.oracle_write(slot0.tick);
        let observation_state = oracle_write.apply_to(&state.observation_state);
        let ring = PendingRing { base: &state.observations, pending: oracle_write.slot };
        let use_ldf_twap = bunni.twap_seconds_ago != 0;
        let use_fee_twap = hooklet_override.fee.is_none() && params.fee_twap_seconds_ago != 0;
        let (arithmetic_mean_tick, fee_mean_tick) = match (use_ldf_twap, use_fee_twap) {
            (true, true) => {
                let [now_cumulative, ldf_cumulative, fee_cumulative] = ring.observe_triple(
                    &observation_state.intermediate,
                    now,
                    [0, bunni.twap_seconds_ago, params.fee_twap_seconds_ago],
                    slot0.tick,
                    observation_state.index,
                    observation_state.cardinality,
                )?;
                (
                    (now_cumulative.wrapping_sub(ldf_cumulative) / bunni.twap_seconds_ago as i64) as i32,
                    (now_cumulative.wrapping_sub(fee_cumulative) / params.fee_twap_seconds_ago as i64) as i32,
                )
            }
            (true, false) => (ring.twap(&observation_state, now, bunni.twap_seconds_ago, slot0.tick)?, 0),
            (false, true) => (0, ring.twap(&observation_state, now, params.fee_twap_seconds_ago, slot0.tick)?),
            (false, false) => (0, 0),
        };

        // liquidity at the current price
        let ldf_state =
            if bunni.ldf_type == LdfType::DynamicAndStateful { state.ldf_state } else { LdfState::Uninitialized };
        let ctx = LdfContext { ldf: &state.ldf, params: bunni.ldf_params, tick_spacing: state.tick_spacing };
        let liquidity = query_ldf(
            &ctx,
            slot0.sqrt_price_x96,
            slot0.tick,
            arithmetic_mean_tick,
            ldf_state,
            balance0,
            balance1,
            &bunni.idle_balance,
        )?;

        let output_active_balance = if zero_for_one { liquidity.active_balance1 } else { liquidity.active_balance0 };
        if output_active_balance.is_zero() {
            return Err(SwapError::InsufficientOutput);
        }
        if liquidity.total_liquidity.is_zero() || (!exact_in && output_active_balance < amount_specified) {
            return Err(SwapError::RequestedOutputExceedsBalance);
        }

        let ldf_surge = liquidity.should_surge && bunni.ldf_type != LdfType::Static;
        let new_ldf_state = (bunni.ldf_type == LdfType::DynamicAndStateful).then_some(liquidity.new_state);
        let new_idle_balance = if ldf_surge {
            Some(compute_idle_balance(liquidity.active_balance0, liquidity.active_balance1, balance0, balance1)?)
        } else {
            None
        };

        let (vault_surge, new_vault_share_prices) = should_surge_from_vaults(
            &state.vaults,
            [bunni.reserve0, bunni.reserve1],
            [bunni.currency0_decimals, bunni.currency1_decimals],
            [params.vault_surge_threshold0, params.vault_surge_threshold1],
            &state.vault_share_prices,
        )?;
        let should_surge = ldf_surge || vault_surge;

        let swap = compute_swap(
            &ctx,
            &SwapInput {
                sqrt_price_x96: slot0.sqrt_price_x96,
                tick: slot0.tick,
                total_liquidity: liquidity.total_liquidity,
                liquidity_density_of_rounded_tick_x96: liquidity.liquidity_density_of_rounded_tick_x96,
                current_active_balance0: liquidity.active_balance0,
                current_active_balance1: liquidity.active_balance1,
                arithmetic_mean_tick,
                zero_for_one,
                exact_in,
                amount_specified,
                sqrt_price_limit_x96,
                ldf_state,
            },
        )?;

        if !exact_in && swap.output_amount < amount_specified {
            return Err(SwapError::InsufficientOutput);
        }
        if (zero_for_one && swap.sqrt_price_x96 > slot0.sqrt_price_x96)
            || (!zero_for_one && swap.sqrt_price_x96 < slot0.sqrt_price_x96)
            || swap.output_amount.is_zero()
            || swap.input_amount.is_zero()
        {
            return Err(SwapError::InvalidSwap);
        }

        let last_surge_timestamp = if should_surge {
            let autostart = params.surge_fee_autostart_threshold as u32;
            if now.wrapping_sub(slot0.last_swap_timestamp) >= autostart {
                slot0.last_swap_timestamp.wrapping_add(autostart)
            } else {
                now
            }
        } else {
            slot0.last_surge_timestamp
        };
        let new_slot0 = Slot0 {
            sqrt_price_x96: swap.sqrt_price_x96,
            tick: swap.tick,
            last_swap_timestamp: now,
            last_surge_timestamp,
        };

        // fees
        let am_amm_fee = (params.am_amm_enabled && !state.am_amm.manager.is_zero()).then(|| {
            U256::from(if zero_for_one { state.am_amm.swap_fee_0_for_1 } else { state.am_amm.swap_fee_1_for_0 })
        });
        let surge_fee = compute_surge_fee(now, last_surge_timestamp, params.surge_fee_half_life)?;
        let base_swap_fee = match hooklet_override.fee {
            Some(fee) => fee.max(surge_fee),
            None => {
                let mut fee_params = params.dynamic_fee();
                if !use_fee_twap {
                    fee_params.fee_quadratic_multiplier = 0;
                }
                compute_dynamic_swap_fee(now, swap.sqrt_price_x96, fee_mean_tick, last_surge_timestamp, &fee_params)?
            }
        };
        let fee_config = FeeConfig {
            base_swap_fee,
            am_amm_fee,
            surge_fee,
            hook_fee_modifier: U256::from(state.hook_fee_modifier),
            curator_fee_rate: U256::from(state.curator_fee_rate),
        };

        // amounts the swapper sees, and what the hook itself settles
        let (amount_in, amount_out, fees, hook_input, hook_output) = if exact_in {
            let fees = split_exact_in(swap.output_amount, &fee_config)?;
            let output = swap.output_amount.checked_sub(fees.total()).ok_or(SwapError::InsufficientOutput)?;
            let mut hook_output = output + fees.hook_fee_amount + fees.curator_fee_amount;
            if am_amm_fee.is_some() {
                hook_output += fees.swap_fee_amount;
            }
            (amount_specified.max(swap.input_amount), output, fees, swap.input_amount, hook_output)
        } else {
            let fees = split_exact_out(swap.input_amount, &fee_config)?;
            let input = swap.input_amount.checked_add(fees.total()).ok_or(SwapError::Overflow)?;
            let mut hook_input = input - fees.hook_fee_amount - fees.curator_fee_amount;
            if am_amm_fee.is_some() {
                hook_input -= fees.swap_fee_amount;
            }
            (input, amount_specified.min(swap.output_amount), fees, hook_input, swap.output_amount)
        };

        // settle raw balances against the vaults
        let (in_idx, out_idx) = if zero_for_one { (0, 1) } else { (1, 0) };
        let mut raw = [bunni.raw_balance0, bunni.raw_balance1];
        let mut reserves = [bunni.reserve0, bunni.reserve1];
        let mut pool_manager_reserves = state.pool_manager_reserves;

        raw[in_idx] = raw[in_idx].checked_add(hook_input).ok_or(SwapError::Overflow)?;
        if state.vaults[out_idx].is_set() && raw[out_idx] < hook_output {
            let change = update_vault_reserve_via_claim_tokens(
                &state.vaults[out_idx],
                to_i256(hook_output - raw[out_idx])?,
                pool_manager_reserves[out_idx],
            )?;
            raw[out_idx] = apply_signed(raw[out_idx], change.raw_balance_change)?;
            reserves[out_idx] = apply_signed(reserves[out_idx], change.reserve_change)?;
            pool_manager_reserves[out_idx] = change.pool_manager_reserve;
        }
        raw[out_idx] = raw[out_idx].checked_sub(hook_output).ok_or(SwapError::InsufficientOutput)?;

        if !should_surge {
            let ratios = [bunni.raw_token_ratios0, bunni.raw_token_ratios1];
            for i in 0..2 {
                if !state.vaults[i].is_set() {
                    continue;
                }
                let updated = update_raw_balance_if_needed(
                    &state.vaults[i],
                    TokenBalances {
                        raw_balance: raw[i],
                        reserve: reserves[i],
                        pool_manager_reserve: pool_manager_reserves[i],
                    },
                    &ratios[i],
                )?;
                raw[i] = updated.raw_balance;
                reserves[i] = updated.reserve;
                pool_manager_reserves[i] = updated.pool_manager_reserve;
            }
        }

        let deadline = state.rebalance_order_deadline;
        let rebalance_triggered =
            params.rebalance_threshold != 0 && (should_surge || (deadline != 0 && now > deadline));
        if should_surge || rebalance_triggered {
            debug!(
                "swap at tick {} -> {}: surge={} (ldf={}, vault={}), rebalance={}",
                slot0.tick, swap.tick, should_surge, ldf_surge, vault_surge, rebalance_triggered
            );
        }

        state.hooklet.after_swap();

        let info = SwapInfo {
            slot0: Some(new_slot0),
            raw_balance0: Some(raw[0]),
            raw_balance1: Some(raw[1]),
            reserve0: Some(reserves[0]),
            reserve1: Some(reserves[1]),
            idle_balance: new_idle_balance,
            ldf_state: new_ldf_state,
            vault_share_prices: new_vault_share_prices,
            pool_manager_reserve0: Some(pool_manager_reserves[0]),
            pool_manager_reserve1: Some(pool_manager_reserves[1]),
            observation_write: self.oracle_update,
            rebalance_order_deadline: should_surge.then_some(0),
        };

        Ok(SwapResult {
            amount_in,
            amount_out,
            fees,
            sqrt_price_x96_after: swap.sqrt_price_x96,
            tick_after: swap.tick,
            should_surge,
            rebalance_triggered,
            info,
        })
    }
}
