//! # Fee Engine
//!
//! Surge fee, dynamic swap fee and the split of a swap fee between LPs, the hook and the curator.
//! All rates are in units of [`SWAP_FEE_BASE`] unless noted otherwise.

use ethers::types::U256;

use crate::error::{Result, SwapError};
use crate::math::{dist, exp_wad, get_sqrt_price_at_tick, mul_div, mul_div_up, mul_wad_up, LN2_WAD};

/// 1e6
pub const SWAP_FEE_BASE: U256 = U256([1_000_000, 0, 0, 0]);
/// 1e12
pub const SWAP_FEE_BASE_SQUARED: U256 = U256([1_000_000_000_000, 0, 0, 0]);
/// Upper bound on the post-swap / mean sqrt price ratio fed to the quadratic term (2.88e20).
pub const MAX_SWAP_FEE_RATIO: U256 = U256([11_298_838_894_356_725_760, 15, 0, 0]);
/// Base of the hook fee modifier.
pub const MODIFIER_BASE: U256 = U256([1_000_000, 0, 0, 0]);
/// Base of the curator fee rate.
pub const CURATOR_FEE_BASE: U256 = U256([100_000, 0, 0, 0]);
/// Fee applied to the second swap step across a freshly located segment.
pub const EPSILON_FEE: u32 = 30;

/// Fee that decays by half every `half_life` seconds after `last_surge_timestamp`.
///
/// `SWAP_FEE_BASE * exp(-dt * ln2 / half_life)`, rounded up.
pub fn compute_surge_fee(block_timestamp: u32, last_surge_timestamp: u32, half_life: u32) -> Result<U256> {
    let elapsed = U256::from(block_timestamp.wrapping_sub(last_surge_timestamp));
    let exponent = mul_div(elapsed, LN2_WAD, U256::from(half_life))?;
    if exponent.bits() > 127 {
        return Ok(U256::zero());
    }
    let decay = exp_wad(-(exponent.as_u128() as i128))?;
    mul_wad_up(SWAP_FEE_BASE, decay)
}

/// Base fee parameters taken from the hook params.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DynamicFeeParams {
    pub fee_min: u32,
    pub fee_max: u32,
    pub fee_quadratic_multiplier: u32,
    pub surge_fee_half_life: u32,
}

/// Quadratic fee in the distance between the post-swap price and the mean price, floored by the
/// surge fee and clamped to `[fee_min, fee_max]`.
pub fn compute_dynamic_swap_fee(
    block_timestamp: u32,
    post_swap_sqrt_price_x96: U256,
    arithmetic_mean_tick: i32,
    last_surge_timestamp: u32,
    params: &DynamicFeeParams,
) -> Result<U256> {
    let surge_fee = compute_surge_fee(block_timestamp, last_surge_timestamp, params.surge_fee_half_life)?;
    let fee_min = U256::from(params.fee_min);
    let fee_max = U256::from(params.fee_max);

    if params.fee_quadratic_multiplier == 0 || params.fee_min == params.fee_max {
        return Ok(fee_min.max(surge_fee));
    }

    let mean_sqrt_price_x96 = get_sqrt_price_at_tick(arithmetic_mean_tick)?;
    let ratio = mul_div(post_swap_sqrt_price_x96, SWAP_FEE_BASE, mean_sqrt_price_x96)?.min(MAX_SWAP_FEE_RATIO);
    // sqrt price ratio to price ratio
    let ratio = mul_div(ratio, ratio, SWAP_FEE_BASE)?;
    let delta = dist(ratio, SWAP_FEE_BASE);
    let delta_squared = delta.checked_mul(delta).ok_or(SwapError::Overflow)?;
    let quadratic_term = mul_div_up(U256::from(params.fee_quadratic_multiplier), delta_squared, SWAP_FEE_BASE_SQUARED)?;

    let fee = quadratic_term.checked_add(fee_min).ok_or(SwapError::Overflow)?.min(fee_max);
    Ok(surge_fee.max(fee))
}

/// Everything that decides how a swap fee is split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeConfig {
    /// Fee the hook would charge on its own (dynamic or hooklet override).
    pub base_swap_fee: U256,
    /// Manager fee when the am-AMM auction is active for this swap.
    pub am_amm_fee: Option<U256>,
    /// Surge fee at the time of the swap; floors the am-AMM fee.
    pub surge_fee: U256,
    /// Hook share of the swap fee, base [`MODIFIER_BASE`].
    pub hook_fee_modifier: U256,
    /// Curator share of the swap fee, base [`CURATOR_FEE_BASE`].
    pub curator_fee_rate: U256,
}

impl FeeConfig {
    /// Fee rate charged to the swapper.
    pub fn swap_fee(&self) -> U256 {
        match self.am_amm_fee {
            Some(am_amm_fee) => am_amm_fee.max(self.surge_fee),
            None => self.base_swap_fee,
        }
    }
}

/// Fee amounts for one swap, in units of the unspecified token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeSplit {
    /// Rate actually charged.
    pub swap_fee: U256,
    /// LP share, or the am-AMM manager's share when the auction is active.
    pub swap_fee_amount: U256,
    pub hook_fee_amount: U256,
    pub curator_fee_amount: U256,
}

impl FeeSplit {
    pub fn total(&self) -> U256 {
        self.swap_fee_amount + self.hook_fee_amount + self.curator_fee_amount
    }
}

fn hook_and_curator(fee_amount: U256, config: &FeeConfig) -> Result<(U256, U256)> {
    Ok((
        mul_div_up(fee_amount, config.hook_fee_modifier, MODIFIER_BASE)?,
        mul_div_up(fee_amount, config.curator_fee_rate, CURATOR_FEE_BASE)?,
    ))
}

fn checked_sub(a: U256, b: U256) -> Result<U256> {
    a.checked_sub(b).ok_or(SwapError::Overflow)
}

/// Fees taken out of `output_amount` for an exact-input swap.
pub fn split_exact_in(output_amount: U256, config: &FeeConfig) -> Result<FeeSplit> {
    let mut swap_fee = config.swap_fee();
    let mut swap_fee_amount = mul_div_up(output_amount, swap_fee, SWAP_FEE_BASE)?;

    let (hook_fee_amount, curator_fee_amount) = match config.am_amm_fee {
        Some(am_amm_fee) => {
            let base_fee_amount = mul_div_up(output_amount, config.base_swap_fee, SWAP_FEE_BASE)?;
            let shares = hook_and_curator(base_fee_amount, config)?;
            if swap_fee != am_amm_fee {
                // surge fee won: hook and curator shares come out of it
                let (hook_rate, curator_rate) = hook_and_curator(config.base_swap_fee, config)?;
                let adjusted = sub_or_zero(sub_or_zero(swap_fee, hook_rate), curator_rate);
                swap_fee = am_amm_fee.max(adjusted);
                swap_fee_amount = mul_div_up(output_amount, swap_fee, SWAP_FEE_BASE)?;
            }
            shares
        }
        None => {
            let shares = hook_and_curator(swap_fee_amount, config)?;
            swap_fee_amount = checked_sub(checked_sub(swap_fee_amount, shares.0)?, shares.1)?;
            shares
        }
    };

    Ok(FeeSplit { swap_fee, swap_fee_amount, hook_fee_amount, curator_fee_amount })
}

/// Fees added on top of `input_amount` for an exact-output swap.
pub fn split_exact_out(input_amount: U256, config: &FeeConfig) -> Result<FeeSplit> {
    let swap_fee = config.swap_fee();
    let mut swap_fee_amount = mul_div_up(input_amount, swap_fee, checked_sub(SWAP_FEE_BASE, swap_fee)?)?;

    let (hook_fee_amount, curator_fee_amount) = match config.am_amm_fee {
        Some(_) => {
            let base_fee_amount = mul_div_up(
                input_amount,
                config.base_swap_fee,
                checked_sub(SWAP_FEE_BASE, config.base_swap_fee)?,
            )?;
            hook_and_curator(base_fee_amount, config)?
        }
        None => {
            let shares = hook_and_curator(swap_fee_amount, config)?;
            swap_fee_amount = checked_sub(checked_sub(swap_fee_amount, shares.0)?, shares.1)?;
            shares
        }
    };

    Ok(FeeSplit { swap_fee, swap_fee_amount, hook_fee_amount, curator_fee_amount })
}

fn sub_or_zero(a: U256, b: U256) -> U256 {
    a.saturating_sub(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base: u64) -> FeeConfig {
        FeeConfig {
            base_swap_fee: U256::from(base),
            am_amm_fee: None,
            surge_fee: U256::zero(),
            hook_fee_modifier: U256::from(100_000u64),
            curator_fee_rate: U256::from(1_000u64),
        }
    }

    #[test]
    fn test_surge_fee_halves_at_half_life() {
        assert_eq!(compute_surge_fee(1_000, 1_000, 60).unwrap(), SWAP_FEE_BASE);
        let half = compute_surge_fee(1_060, 1_000, 60).unwrap();
        assert!(dist(half, U256::from(500_000u64)) <= U256::one(), "got {}", half);
        let quarter = compute_surge_fee(1_120, 1_000, 60).unwrap();
        assert!(dist(quarter, U256::from(250_000u64)) <= U256::one(), "got {}", quarter);
        // long after the surge the fee is gone
        assert_eq!(compute_surge_fee(u32::MAX, 0, 1).unwrap(), U256::zero());
    }

    #[test]
    fn test_dynamic_fee_bounds() {
        let params = DynamicFeeParams { fee_min: 100, fee_max: 10_000, fee_quadratic_multiplier: 500_000, surge_fee_half_life: 60 };
        let at_mean = get_sqrt_price_at_tick(0).unwrap();
        // long after any surge, a swap at the mean price pays the minimum
        let fee = compute_dynamic_swap_fee(1_000_000, at_mean, 0, 0, &params).unwrap();
        assert_eq!(fee, U256::from(100u64));
        // far away from the mean the fee saturates at the maximum
        let far = get_sqrt_price_at_tick(20_000).unwrap();
        let fee = compute_dynamic_swap_fee(1_000_000, far, 0, 0, &params).unwrap();
        assert_eq!(fee, U256::from(10_000u64));
        // a fresh surge dominates
        let fee = compute_dynamic_swap_fee(1_000, at_mean, 0, 1_000, &params).unwrap();
        assert_eq!(fee, SWAP_FEE_BASE);
    }

    #[test]
    fn test_split_conserves_total() {
        let output = U256::from(123_456_789u64);
        let cfg = config(3_000);
        let split = split_exact_in(output, &cfg).unwrap();
        assert_eq!(split.total(), mul_div_up(output, cfg.base_swap_fee, SWAP_FEE_BASE).unwrap());
        assert!(split.hook_fee_amount > U256::zero() && split.curator_fee_amount > U256::zero());

        let split = split_exact_out(output, &cfg).unwrap();
        let expected = mul_div_up(output, cfg.base_swap_fee, SWAP_FEE_BASE - cfg.base_swap_fee).unwrap();
        assert_eq!(split.total(), expected);
    }

    #[test]
    fn test_am_amm_fee_floored_by_surge() {
        let mut cfg = config(3_000);
        cfg.am_amm_fee = Some(U256::from(1_000u64));
        cfg.surge_fee = U256::from(50_000u64);
        assert_eq!(cfg.swap_fee(), U256::from(50_000u64));
        let split = split_exact_in(U256::from(1_000_000u64), &cfg).unwrap();
        // surge share is reduced by the hook and curator cut of the base fee
        assert!(split.swap_fee < U256::from(50_000u64));
        assert!(split.swap_fee >= U256::from(1_000u64));

        cfg.surge_fee = U256::zero();
        let split = split_exact_in(U256::from(1_000_000u64), &cfg).unwrap();
        assert_eq!(split.swap_fee, U256::from(1_000u64));
        assert_eq!(split.swap_fee_amount, U256::from(1_000u64));
    }
}
