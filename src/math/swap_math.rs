// Single constant-liquidity swap step (SwapMath equivalent)
use ethers::types::U256;

use super::full_math::{mul_div, mul_div_up};
use super::sqrt_price_math::{
    get_amount0_delta, get_amount1_delta, get_next_sqrt_price_from_input, get_next_sqrt_price_from_output,
};
use crate::error::Result;

/// Fee denominator for `fee_pips`
pub const MAX_SWAP_FEE: u32 = 1_000_000;

/// Result of one step: where the price ends and how much was exchanged.
/// `amount_in` includes the step fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapStep {
    pub sqrt_price_next_x96: U256,
    pub amount_in: U256,
    pub amount_out: U256,
    pub fee_amount: U256,
}

/// The price the step should aim for: the next boundary unless the limit comes first.
pub fn get_sqrt_price_target(zero_for_one: bool, sqrt_price_next_x96: U256, sqrt_price_limit_x96: U256) -> U256 {
    let limit_first = if zero_for_one {
        sqrt_price_next_x96 < sqrt_price_limit_x96
    } else {
        sqrt_price_next_x96 > sqrt_price_limit_x96
    };
    if limit_first {
        sqrt_price_limit_x96
    } else {
        sqrt_price_next_x96
    }
}

/// Swap within a single segment of constant `liquidity`, from the current price toward the target.
pub fn compute_swap_step(
    exact_in: bool,
    sqrt_price_current_x96: U256,
    sqrt_price_target_x96: U256,
    liquidity: U256,
    amount_remaining: U256,
    fee_pips: u32,
) -> Result<SwapStep> {
    let zero_for_one = sqrt_price_current_x96 >= sqrt_price_target_x96;
    let fee = U256::from(fee_pips);
    let fee_complement = U256::from(MAX_SWAP_FEE - fee_pips.min(MAX_SWAP_FEE));
    let base = U256::from(MAX_SWAP_FEE);

    let sqrt_price_next_x96;
    let mut amount_in;
    let mut amount_out;
    let fee_amount;

    if exact_in {
        let remaining_less_fee = mul_div(amount_remaining, fee_complement, base)?;
        amount_in = if zero_for_one {
            get_amount0_delta(sqrt_price_target_x96, sqrt_price_current_x96, liquidity, true)?
        } else {
            get_amount1_delta(sqrt_price_current_x96, sqrt_price_target_x96, liquidity, true)?
        };
        if remaining_less_fee >= amount_in {
            sqrt_price_next_x96 = sqrt_price_target_x96;
            fee_amount = if fee_pips >= MAX_SWAP_FEE {
                amount_in
            } else {
                mul_div_up(amount_in, fee, fee_complement)?
            };
        } else {
            amount_in = remaining_less_fee;
            sqrt_price_next_x96 = get_next_sqrt_price_from_input(
                sqrt_price_current_x96,
                liquidity,
                remaining_less_fee,
                zero_for_one,
            )?;
            fee_amount = amount_remaining - amount_in;
        }
        amount_out = if zero_for_one {
            get_amount1_delta(sqrt_price_next_x96, sqrt_price_current_x96, liquidity, false)?
        } else {
            get_amount0_delta(sqrt_price_current_x96, sqrt_price_next_x96, liquidity, false)?
        };
    } else {
        amount_out = if zero_for_one {
            get_amount1_delta(sqrt_price_target_x96, sqrt_price_current_x96, liquidity, false)?
        } else {
            get_amount0_delta(sqrt_price_current_x96, sqrt_price_target_x96, liquidity, false)?
        };
        if amount_remaining >= amount_out {
            sqrt_price_next_x96 = sqrt_price_target_x96;
        } else {
            amount_out = amount_remaining;
            sqrt_price_next_x96 = get_next_sqrt_price_from_output(
                sqrt_price_current_x96,
                liquidity,
                amount_remaining,
                zero_for_one,
            )?;
        }
        amount_in = if zero_for_one {
            get_amount0_delta(sqrt_price_next_x96, sqrt_price_current_x96, liquidity, true)?
        } else {
            get_amount1_delta(sqrt_price_current_x96, sqrt_price_next_x96, liquidity, true)?
        };
        fee_amount = mul_div_up(amount_in, fee, fee_complement.max(U256::one()))?;
    }

    Ok(SwapStep {
        sqrt_price_next_x96,
        amount_in: amount_in + fee_amount,
        amount_out,
        fee_amount,
    })
}
