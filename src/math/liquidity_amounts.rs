use ethers::types::U256;

use super::full_math::{div_up, full_mul_div, full_mul_div_up, Q96};
use crate::error::{Result, SwapError};

pub fn get_amount0_for_liquidity(
    sqrt_price_a_x96: U256,
    sqrt_price_b_x96: U256,
    liquidity: U256,
    round_up: bool,
) -> Result<U256> {
    let (a, b) = if sqrt_price_a_x96 > sqrt_price_b_x96 {
        (sqrt_price_b_x96, sqrt_price_a_x96)
    } else {
        (sqrt_price_a_x96, sqrt_price_b_x96)
    };
    if a.is_zero() || liquidity.bits() > 160 {
        return Err(SwapError::Overflow);
    }
    let shifted = liquidity << 96;
    if round_up {
        div_up(full_mul_div_up(shifted, b - a, b)?, a)
    } else {
        Ok(full_mul_div(shifted, b - a, b)? / a)
    }
}

pub fn get_amount1_for_liquidity(
    sqrt_price_a_x96: U256,
    sqrt_price_b_x96: U256,
    liquidity: U256,
    round_up: bool,
) -> Result<U256> {
    let (a, b) = if sqrt_price_a_x96 > sqrt_price_b_x96 {
        (sqrt_price_b_x96, sqrt_price_a_x96)
    } else {
        (sqrt_price_a_x96, sqrt_price_b_x96)
    };
    if round_up {
        full_mul_div_up(liquidity, b - a, Q96)
    } else {
        full_mul_div(liquidity, b - a, Q96)
    }
}

/// Token amounts held by `liquidity` in `[a, b)` at the current price.
pub fn get_amounts_for_liquidity(
    sqrt_price_x96: U256,
    sqrt_price_a_x96: U256,
    sqrt_price_b_x96: U256,
    liquidity: U256,
    round_up: bool,
) -> Result<(U256, U256)> {
    let (a, b) = if sqrt_price_a_x96 > sqrt_price_b_x96 {
        (sqrt_price_b_x96, sqrt_price_a_x96)
    } else {
        (sqrt_price_a_x96, sqrt_price_b_x96)
    };
    if sqrt_price_x96 <= a {
        Ok((get_amount0_for_liquidity(a, b, liquidity, round_up)?, U256::zero()))
    } else if sqrt_price_x96 < b {
        Ok((
            get_amount0_for_liquidity(sqrt_price_x96, b, liquidity, round_up)?,
            get_amount1_for_liquidity(a, sqrt_price_x96, liquidity, round_up)?,
        ))
    } else {
        Ok((U256::zero(), get_amount1_for_liquidity(a, b, liquidity, round_up)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::tick_math::get_sqrt_price_at_tick;

    #[test]
    fn test_amounts_by_price_position() {
        let a = get_sqrt_price_at_tick(-10).unwrap();
        let b = get_sqrt_price_at_tick(10).unwrap();
        let l = U256::exp10(18);
        let below = get_amounts_for_liquidity(get_sqrt_price_at_tick(-20).unwrap(), a, b, l, true).unwrap();
        assert!(below.0 > U256::zero() && below.1.is_zero());
        let above = get_amounts_for_liquidity(b, a, b, l, true).unwrap();
        assert!(above.0.is_zero() && above.1 > U256::zero());
        let inside = get_amounts_for_liquidity(Q96, a, b, l, true).unwrap();
        assert!(inside.0 > U256::zero() && inside.1 > U256::zero());
        assert!(inside.0 < below.0);
    }
}
