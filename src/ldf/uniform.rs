//! Uniform distribution over `[tick_lower, tick_upper)`.
//!
//! The same shape also backs the carpets of the carpeted distributions; a carpet receives an
//! absolute liquidity instead of a Q96 share, which changes how the input is scaled.

use ethers::types::U256;

use super::params::UniformParams;
use super::{Distribution, LdfQuery, LdfQueryInput, LdfState, LdfSwap, LdfSwapInput, ShiftMode};
use crate::error::{Result, SwapError};
use crate::math::sqrt_price_math::{
    get_amount0_delta, get_amount1_delta, get_next_sqrt_price_from_amount0_rounding_up,
    get_next_sqrt_price_from_amount1_rounding_down,
};
use crate::math::{
    div_up, full_mul_div, full_mul_x96_up, get_sqrt_price_at_tick, get_tick_at_sqrt_price, max_usable_tick,
    min_usable_tick, round_tick_single, Q96,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformShape {
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub tick_spacing: i32,
    /// Liquidity arguments are absolute amounts rather than Q96 shares.
    pub is_carpet: bool,
}

impl UniformShape {
    pub fn new(tick_lower: i32, tick_upper: i32, tick_spacing: i32) -> Result<Self> {
        if tick_spacing <= 0 {
            return Err(SwapError::InvalidParams(format!("tick spacing {}", tick_spacing)));
        }
        Ok(Self { tick_lower, tick_upper, tick_spacing, is_carpet: false })
    }

    pub fn carpet(tick_lower: i32, tick_upper: i32, tick_spacing: i32) -> Self {
        Self { tick_lower, tick_upper, tick_spacing, is_carpet: true }
    }

    fn length(&self) -> i32 {
        (self.tick_upper - self.tick_lower) / self.tick_spacing
    }

    /// Per-tick liquidity and whether the result still needs scaling by total liquidity.
    fn per_tick_liquidity(&self, total_liquidity: U256) -> Result<(U256, bool)> {
        let length = U256::from(self.length() as u64);
        if self.is_carpet {
            Ok((div_up(total_liquidity, length)?, false))
        } else {
            Ok((div_up(Q96, length)?, true))
        }
    }
}

impl Distribution for UniformShape {
    fn tick_spacing(&self) -> i32 {
        self.tick_spacing
    }

    fn liquidity_density_x96(&self, rounded_tick: i32) -> Result<U256> {
        if rounded_tick < self.tick_lower || rounded_tick >= self.tick_upper {
            return Ok(U256::zero());
        }
        Ok(Q96 / U256::from(self.length() as u64))
    }

    fn cumulative_amount0(&self, rounded_tick: i32, total_liquidity: U256) -> Result<U256> {
        if rounded_tick >= self.tick_upper || self.tick_lower >= self.tick_upper {
            return Ok(U256::zero());
        }
        let rounded_tick = rounded_tick.max(self.tick_lower);
        let (liquidity, scaled) = self.per_tick_liquidity(total_liquidity)?;
        let amount = get_amount0_delta(
            get_sqrt_price_at_tick(rounded_tick)?,
            get_sqrt_price_at_tick(self.tick_upper)?,
            liquidity,
            true,
        )?;
        if scaled {
            full_mul_x96_up(total_liquidity, amount)
        } else {
            Ok(amount)
        }
    }

    fn cumulative_amount1(&self, rounded_tick: i32, total_liquidity: U256) -> Result<U256> {
        if rounded_tick < self.tick_lower || self.tick_lower >= self.tick_upper {
            return Ok(U256::zero());
        }
        let rounded_tick = rounded_tick.min(self.tick_upper - self.tick_spacing);
        let (liquidity, scaled) = self.per_tick_liquidity(total_liquidity)?;
        let amount = get_amount1_delta(
            get_sqrt_price_at_tick(self.tick_lower)?,
            get_sqrt_price_at_tick(rounded_tick + self.tick_spacing)?,
            liquidity,
            true,
        )?;
        if scaled {
            full_mul_x96_up(total_liquidity, amount)
        } else {
            Ok(amount)
        }
    }

    fn inverse_cumulative_amount0(&self, cumulative_amount0: U256, total_liquidity: U256) -> Result<Option<i32>> {
        if cumulative_amount0.is_zero() {
            return Ok(Some(self.tick_upper));
        }
        if self.tick_lower >= self.tick_upper || total_liquidity.is_zero() {
            return Ok(None);
        }
        let (liquidity, scaled) = self.per_tick_liquidity(total_liquidity)?;
        if liquidity.is_zero() {
            return Ok(None);
        }
        let amount = if scaled { full_mul_div(cumulative_amount0, Q96, total_liquidity)? } else { cumulative_amount0 };
        let sqrt_price = match get_next_sqrt_price_from_amount0_rounding_up(
            get_sqrt_price_at_tick(self.tick_upper)?,
            liquidity,
            amount,
            true,
        ) {
            Ok(p) => p,
            Err(_) => return Ok(None),
        };
        let tick = match get_tick_at_sqrt_price(sqrt_price) {
            Ok(t) => t,
            Err(_) => return Ok(None),
        };
        let rounded_tick = round_tick_single(tick, self.tick_spacing);
        if rounded_tick < self.tick_lower || rounded_tick > self.tick_upper {
            return Ok(None);
        }
        if rounded_tick == self.tick_upper {
            return Ok(Some(self.tick_upper - self.tick_spacing));
        }
        Ok(Some(rounded_tick))
    }

    fn inverse_cumulative_amount1(&self, cumulative_amount1: U256, total_liquidity: U256) -> Result<Option<i32>> {
        if cumulative_amount1.is_zero() {
            return Ok(Some(self.tick_lower - self.tick_spacing));
        }
        if self.tick_lower >= self.tick_upper || total_liquidity.is_zero() {
            return Ok(None);
        }
        let (liquidity, scaled) = self.per_tick_liquidity(total_liquidity)?;
        if liquidity.is_zero() {
            return Ok(None);
        }
        let amount = if scaled { full_mul_div(cumulative_amount1, Q96, total_liquidity)? } else { cumulative_amount1 };
        let sqrt_price = match get_next_sqrt_price_from_amount1_rounding_down(
            get_sqrt_price_at_tick(self.tick_lower)?,
            liquidity,
            amount,
            true,
        ) {
            Ok(p) => p,
            Err(_) => return Ok(None),
        };
        let mut tick = match get_tick_at_sqrt_price(sqrt_price) {
            Ok(t) => t,
            Err(_) => return Ok(None),
        };
        // exactly at the upper bound the last in-range tick is the answer
        if tick == self.tick_upper {
            tick -= 1;
        }
        let rounded_tick = round_tick_single(tick, self.tick_spacing);
        if rounded_tick < self.tick_lower - self.tick_spacing || rounded_tick >= self.tick_upper {
            return Ok(None);
        }
        if rounded_tick == self.tick_lower - self.tick_spacing {
            return Ok(Some(self.tick_lower));
        }
        Ok(Some(rounded_tick))
    }
}

/// Decode params, apply the shift rule and build the shape. The stored anchor is `tick_lower`.
fn resolve(
    params: &[u8; 32],
    twap_tick: i32,
    tick_spacing: i32,
    state: &LdfState,
) -> Result<(UniformShape, LdfState, bool)> {
    let p = UniformParams::decode(params)?;
    let (mut tick_lower, mut tick_upper) = p.ticks(twap_tick, tick_spacing);
    let mut should_surge = false;
    if let (Some(last), true) = (state.last_min_tick(), p.shift_mode != ShiftMode::Static) {
        let tick_length = tick_upper - tick_lower;
        tick_lower = min_usable_tick(tick_spacing).max(p.shift_mode.enforce(tick_lower, last));
        tick_upper = max_usable_tick(tick_spacing).min(tick_lower + tick_length);
        should_surge = tick_lower != last;
    }
    let shape = UniformShape::new(tick_lower, tick_upper, tick_spacing)?;
    Ok((shape, LdfState::Anchor { last_min_tick: tick_lower }, should_surge))
}

pub fn query(input: &LdfQueryInput) -> Result<LdfQuery> {
    let (shape, new_state, should_surge) = resolve(&input.params, input.twap_tick, input.tick_spacing, &input.state)?;
    super::finish_query(&shape, input.rounded_tick, new_state, should_surge)
}

pub fn compute_swap(input: &LdfSwapInput) -> Result<LdfSwap> {
    let (shape, _, _) = resolve(&input.params, input.twap_tick, input.tick_spacing, &input.state)?;
    shape.compute_swap(
        input.inverse_cumulative_amount_input,
        input.total_liquidity,
        input.zero_for_one,
        input.exact_in,
    )
}

pub fn is_valid_params(params: &[u8; 32], tick_spacing: i32, twap_seconds_ago: u32) -> bool {
    let p = match UniformParams::decode(params) {
        Ok(p) => p,
        Err(_) => return false,
    };
    if p.shift_mode != ShiftMode::Static && twap_seconds_ago == 0 {
        return false;
    }
    let (lower, upper) = if p.shift_mode == ShiftMode::Static {
        (p.tick_lower_or_offset, p.tick_upper_or_offset)
    } else {
        // offsets must stay on the grid so the window keeps its width
        if p.tick_lower_or_offset % tick_spacing != 0 || p.tick_upper_or_offset % tick_spacing != 0 {
            return false;
        }
        return p.tick_lower_or_offset < p.tick_upper_or_offset;
    };
    lower % tick_spacing == 0
        && upper % tick_spacing == 0
        && lower < upper
        && lower >= min_usable_tick(tick_spacing)
        && upper <= max_usable_tick(tick_spacing)
}
