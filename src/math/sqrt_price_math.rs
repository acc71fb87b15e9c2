// Token amount <-> sqrt price movement for a constant liquidity segment
use ethers::types::U256;

use super::full_math::{div_up, full_mul_div, full_mul_div_up, Q96};
use crate::error::{Result, SwapError};

/// 2^160 - 1
const MAX_U160: U256 = U256([u64::MAX, u64::MAX, u32::MAX as u64, 0]);

fn liquidity_x96(liquidity: U256) -> Result<U256> {
    if liquidity.bits() > 160 {
        return Err(SwapError::Overflow);
    }
    Ok(liquidity << 96)
}

fn to_u160(v: U256) -> Result<U256> {
    if v > MAX_U160 {
        Err(SwapError::Overflow)
    } else {
        Ok(v)
    }
}

/// Next sqrt price after adding (or removing) `amount` of token0, rounded up.
pub fn get_next_sqrt_price_from_amount0_rounding_up(
    sqrt_price_x96: U256,
    liquidity: U256,
    amount: U256,
    add: bool,
) -> Result<U256> {
    if amount.is_zero() {
        return Ok(sqrt_price_x96);
    }
    let numerator1 = liquidity_x96(liquidity)?;

    if add {
        if let Some(product) = amount.checked_mul(sqrt_price_x96) {
            if let Some(denominator) = numerator1.checked_add(product) {
                return to_u160(full_mul_div_up(numerator1, sqrt_price_x96, denominator)?);
            }
        }
        if sqrt_price_x96.is_zero() {
            return Err(SwapError::InvalidSwap);
        }
        let denominator = (numerator1 / sqrt_price_x96)
            .checked_add(amount)
            .ok_or(SwapError::Overflow)?;
        to_u160(div_up(numerator1, denominator)?)
    } else {
        let product = amount.checked_mul(sqrt_price_x96).ok_or(SwapError::Overflow)?;
        if numerator1 <= product {
            return Err(SwapError::Overflow);
        }
        to_u160(full_mul_div_up(numerator1, sqrt_price_x96, numerator1 - product)?)
    }
}

/// Next sqrt price after adding (or removing) `amount` of token1, rounded down.
pub fn get_next_sqrt_price_from_amount1_rounding_down(
    sqrt_price_x96: U256,
    liquidity: U256,
    amount: U256,
    add: bool,
) -> Result<U256> {
    if liquidity.is_zero() {
        return Err(SwapError::InvalidSwap);
    }
    if add {
        let quotient = if amount <= MAX_U160 {
            (amount << 96) / liquidity
        } else {
            full_mul_div(amount, Q96, liquidity)?
        };
        to_u160(sqrt_price_x96.checked_add(quotient).ok_or(SwapError::Overflow)?)
    } else {
        let quotient = if amount <= MAX_U160 {
            div_up(amount << 96, liquidity)?
        } else {
            full_mul_div_up(amount, Q96, liquidity)?
        };
        if sqrt_price_x96 <= quotient {
            return Err(SwapError::Overflow);
        }
        Ok(sqrt_price_x96 - quotient)
    }
}

pub fn get_next_sqrt_price_from_input(
    sqrt_price_x96: U256,
    liquidity: U256,
    amount_in: U256,
    zero_for_one: bool,
) -> Result<U256> {
    if sqrt_price_x96.is_zero() || liquidity.is_zero() {
        return Err(SwapError::InvalidSwap);
    }
    if zero_for_one {
        get_next_sqrt_price_from_amount0_rounding_up(sqrt_price_x96, liquidity, amount_in, true)
    } else {
        get_next_sqrt_price_from_amount1_rounding_down(sqrt_price_x96, liquidity, amount_in, true)
    }
}

pub fn get_next_sqrt_price_from_output(
    sqrt_price_x96: U256,
    liquidity: U256,
    amount_out: U256,
    zero_for_one: bool,
) -> Result<U256> {
    if sqrt_price_x96.is_zero() || liquidity.is_zero() {
        return Err(SwapError::InvalidSwap);
    }
    if zero_for_one {
        get_next_sqrt_price_from_amount1_rounding_down(sqrt_price_x96, liquidity, amount_out, false)
    } else {
        get_next_sqrt_price_from_amount0_rounding_up(sqrt_price_x96, liquidity, amount_out, false)
    }
}

/// Amount of token0 between two sqrt prices for `liquidity`.
pub fn get_amount0_delta(
    sqrt_price_a_x96: U256,
    sqrt_price_b_x96: U256,
    liquidity: U256,
    round_up: bool,
) -> Result<U256> {
    let (lower, upper) = if sqrt_price_a_x96 > sqrt_price_b_x96 {
        (sqrt_price_b_x96, sqrt_price_a_x96)
    } else {
        (sqrt_price_a_x96, sqrt_price_b_x96)
    };
    if lower.is_zero() {
        return Err(SwapError::InvalidSwap);
    }
    let numerator1 = liquidity_x96(liquidity)?;
    let numerator2 = upper - lower;
    if round_up {
        div_up(full_mul_div_up(numerator1, numerator2, upper)?, lower)
    } else {
        Ok(full_mul_div(numerator1, numerator2, upper)? / lower)
    }
}

/// Amount of token1 between two sqrt prices for `liquidity`.
pub fn get_amount1_delta(
    sqrt_price_a_x96: U256,
    sqrt_price_b_x96: U256,
    liquidity: U256,
    round_up: bool,
) -> Result<U256> {
    let diff = if sqrt_price_a_x96 > sqrt_price_b_x96 {
        sqrt_price_a_x96 - sqrt_price_b_x96
    } else {
        sqrt_price_b_x96 - sqrt_price_a_x96
    };
    if round_up {
        full_mul_div_up(liquidity, diff, Q96)
    } else {
        full_mul_div(liquidity, diff, Q96)
    }
}
