//! Two adjacent geometric distributions mixed by weight.
//!
//! Distribution 1 covers `[min_tick, min_tick + length1 * ts)`, distribution 0 the
//! `length0` ticks right after it.

use ethers::types::U256;

use super::geometric::{is_valid_shape, GeometricShape};
use super::params::{alpha_x96, DoubleGeometricParams};
use super::{shift_anchor, Distribution, LdfQuery, LdfQueryInput, LdfState, LdfSwap, LdfSwapInput};
use crate::error::{Result, SwapError};
use crate::math::mul_div;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DoubleGeometricShape {
    pub min_tick: i32,
    pub tick_spacing: i32,
    pub ldf0: GeometricShape,
    pub ldf1: GeometricShape,
    pub weight0: U256,
    pub weight1: U256,
}

impl DoubleGeometricShape {
    pub fn from_params(p: &DoubleGeometricParams, min_tick: i32, tick_spacing: i32) -> Result<Self> {
        if p.weight0 == 0 && p.weight1 == 0 {
            return Err(SwapError::InvalidParams("both weights are zero".to_string()));
        }
        Ok(Self {
            min_tick,
            tick_spacing,
            ldf0: GeometricShape::new(min_tick + p.length1 * tick_spacing, p.length0, alpha_x96(p.alpha0)?, tick_spacing)?,
            ldf1: GeometricShape::new(min_tick, p.length1, alpha_x96(p.alpha1)?, tick_spacing)?,
            weight0: U256::from(p.weight0),
            weight1: U256::from(p.weight1),
        })
    }

    pub fn length(&self) -> i32 {
        self.ldf0.length + self.ldf1.length
    }

    pub fn max_tick(&self) -> i32 {
        self.ldf0.max_tick()
    }

    fn split(&self, total_liquidity: U256) -> Result<(U256, U256)> {
        let total_weight = self.weight0 + self.weight1;
        Ok((
            mul_div(total_liquidity, self.weight0, total_weight)?,
            mul_div(total_liquidity, self.weight1, total_weight)?,
        ))
    }
}

impl Distribution for DoubleGeometricShape {
    fn tick_spacing(&self) -> i32 {
        self.tick_spacing
    }

    fn liquidity_density_x96(&self, rounded_tick: i32) -> Result<U256> {
        let weighted0 = self.ldf0.liquidity_density_x96(rounded_tick)? * self.weight0;
        let weighted1 = self.ldf1.liquidity_density_x96(rounded_tick)? * self.weight1;
        Ok((weighted0 + weighted1) / (self.weight0 + self.weight1))
    }

    fn cumulative_amount0(&self, rounded_tick: i32, total_liquidity: U256) -> Result<U256> {
        let (total0, total1) = self.split(total_liquidity)?;
        Ok(self.ldf0.cumulative_amount0(rounded_tick, total0)? + self.ldf1.cumulative_amount0(rounded_tick, total1)?)
    }

    fn cumulative_amount1(&self, rounded_tick: i32, total_liquidity: U256) -> Result<U256> {
        let (total0, total1) = self.split(total_liquidity)?;
        Ok(self.ldf0.cumulative_amount1(rounded_tick, total0)? + self.ldf1.cumulative_amount1(rounded_tick, total1)?)
    }

    fn inverse_cumulative_amount0(&self, cumulative_amount0: U256, total_liquidity: U256) -> Result<Option<i32>> {
        let (total0, total1) = self.split(total_liquidity)?;
        let ldf0_amount = self.ldf0.cumulative_amount0(self.ldf0.min_tick, total0)?;
        if cumulative_amount0 <= ldf0_amount {
            return self.ldf0.inverse_cumulative_amount0(cumulative_amount0, total0);
        }
        self.ldf1.inverse_cumulative_amount0(cumulative_amount0 - ldf0_amount, total1)
    }

    fn inverse_cumulative_amount1(&self, cumulative_amount1: U256, total_liquidity: U256) -> Result<Option<i32>> {
        let (total0, total1) = self.split(total_liquidity)?;
        let ldf1_amount = self.ldf1.cumulative_amount1(self.ldf0.min_tick, total1)?;
        if cumulative_amount1 <= ldf1_amount {
            return self.ldf1.inverse_cumulative_amount1(cumulative_amount1, total1);
        }
        self.ldf0.inverse_cumulative_amount1(cumulative_amount1 - ldf1_amount, total0)
    }
}

fn resolve(
    params: &[u8; 32],
    twap_tick: i32,
    tick_spacing: i32,
    state: &LdfState,
) -> Result<(DoubleGeometricShape, LdfState, bool)> {
    let p = DoubleGeometricParams::decode(params)?;
    let (min_tick, should_surge) = shift_anchor(p.min_tick(twap_tick, tick_spacing), p.shift_mode, state);
    let shape = DoubleGeometricShape::from_params(&p, min_tick, tick_spacing)?;
    Ok((shape, LdfState::Anchor { last_min_tick: min_tick }, should_surge))
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

pub(crate) fn is_valid_double(p: &DoubleGeometricParams, tick_spacing: i32, twap_seconds_ago: u32) -> bool {
    if p.weight0 == 0 || p.weight1 == 0 {
        return false;
    }
    is_valid_shape(p.shift_mode, p.min_tick_or_offset, p.length1, p.alpha1, tick_spacing, twap_seconds_ago)
        && is_valid_shape(
            p.shift_mode,
            p.min_tick_or_offset + p.length1 * tick_spacing,
            p.length0,
            p.alpha0,
            tick_spacing,
            twap_seconds_ago,
        )
        && crate::math::min_usable_tick(tick_spacing) + (p.length0 + p.length1) * tick_spacing
            <= crate::math::max_usable_tick(tick_spacing)
}

pub fn is_valid_params(params: &[u8; 32], tick_spacing: i32, twap_seconds_ago: u32) -> bool {
    match DoubleGeometricParams::decode(params) {
        Ok(p) => is_valid_double(&p, tick_spacing, twap_seconds_ago),
        Err(_) => false,
    }
}
