//! A geometric or double geometric main region with uniform "carpets" covering the rest of the
//! usable tick range, so the pool always has some liquidity at every price.
//!
//! `weight_carpet` (WAD) is the share of liquidity given to the carpets; it is split between the
//! left and right carpet in proportion to their tick counts.

use ethers::types::U256;

use super::double_geometric::{is_valid_double, DoubleGeometricShape};
use super::geometric::{is_valid_shape, GeometricShape};
use super::params::{CarpetedDoubleGeometricParams, CarpetedGeometricParams};
use super::uniform::UniformShape;
use super::{shift_anchor, Distribution, LdfQuery, LdfQueryInput, LdfState, LdfSwap, LdfSwapInput};
use crate::error::Result;
use crate::math::{div_up, max_usable_tick, min_usable_tick, mul_div, mul_wad, Q96, WAD};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CarpetedShape<M> {
    pub main: M,
    pub min_tick: i32,
    pub length: i32,
    pub weight_carpet: U256,
    pub tick_spacing: i32,
}

struct CarpetSplit {
    left: U256,
    main: U256,
    right: U256,
}

impl<M: Distribution> CarpetedShape<M> {
    pub fn new(main: M, min_tick: i32, length: i32, weight_carpet: u32, tick_spacing: i32) -> Self {
        Self { main, min_tick, length, weight_carpet: U256::from(weight_carpet), tick_spacing }
    }

    fn max_tick(&self) -> i32 {
        self.min_tick + self.length * self.tick_spacing
    }

    fn carpeted_ticks(&self) -> i32 {
        (max_usable_tick(self.tick_spacing) - min_usable_tick(self.tick_spacing)) / self.tick_spacing - self.length
    }

    fn left_carpet(&self) -> UniformShape {
        UniformShape::carpet(min_usable_tick(self.tick_spacing), self.min_tick, self.tick_spacing)
    }

    fn right_carpet(&self) -> UniformShape {
        UniformShape::carpet(self.max_tick(), max_usable_tick(self.tick_spacing), self.tick_spacing)
    }

    fn split(&self, total_liquidity: U256) -> Result<CarpetSplit> {
        let carpeted = self.carpeted_ticks();
        if carpeted <= 0 {
            return Ok(CarpetSplit { left: U256::zero(), main: total_liquidity, right: U256::zero() });
        }
        let main = mul_wad(total_liquidity, WAD - self.weight_carpet)?;
        let carpet = total_liquidity - main;
        let right_ticks = (max_usable_tick(self.tick_spacing) - self.min_tick) / self.tick_spacing - self.length;
        let right = mul_div(carpet, U256::from(right_ticks.max(0) as u64), U256::from(carpeted as u64))?;
        Ok(CarpetSplit { left: carpet - right, main, right })
    }
}

impl<M: Distribution> Distribution for CarpetedShape<M> {
    fn tick_spacing(&self) -> i32 {
        self.tick_spacing
    }

    fn liquidity_density_x96(&self, rounded_tick: i32) -> Result<U256> {
        if rounded_tick >= self.min_tick && rounded_tick < self.max_tick() {
            return mul_wad(self.main.liquidity_density_x96(rounded_tick)?, WAD - self.weight_carpet);
        }
        let carpeted = self.carpeted_ticks();
        if carpeted <= 0 {
            return Ok(U256::zero());
        }
        let carpet = Q96 - mul_wad(Q96, WAD - self.weight_carpet)?;
        div_up(carpet, U256::from(carpeted as u64))
    }

    fn cumulative_amount0(&self, rounded_tick: i32, total_liquidity: U256) -> Result<U256> {
        let split = self.split(total_liquidity)?;
        Ok(self.left_carpet().cumulative_amount0(rounded_tick, split.left)?
            + self.main.cumulative_amount0(rounded_tick, split.main)?
            + self.right_carpet().cumulative_amount0(rounded_tick, split.right)?)
    }

    fn cumulative_amount1(&self, rounded_tick: i32, total_liquidity: U256) -> Result<U256> {
        let split = self.split(total_liquidity)?;
        Ok(self.left_carpet().cumulative_amount1(rounded_tick, split.left)?
            + self.main.cumulative_amount1(rounded_tick, split.main)?
            + self.right_carpet().cumulative_amount1(rounded_tick, split.right)?)
    }

    /// Consumes the right carpet first, then the main region, then the left carpet.
    fn inverse_cumulative_amount0(&self, cumulative_amount0: U256, total_liquidity: U256) -> Result<Option<i32>> {
        if cumulative_amount0.is_zero() {
            return Ok(Some(max_usable_tick(self.tick_spacing)));
        }
        let split = self.split(total_liquidity)?;
        let right_carpet = self.right_carpet();
        let right_amount = right_carpet.cumulative_amount0(self.max_tick(), split.right)?;
        if cumulative_amount0 <= right_amount && !split.right.is_zero() {
            return right_carpet.inverse_cumulative_amount0(cumulative_amount0, split.right);
        }
        let remainder = cumulative_amount0 - right_amount;
        let main_amount = self.main.cumulative_amount0(self.min_tick, split.main)?;
        if remainder <= main_amount {
            return self.main.inverse_cumulative_amount0(remainder, split.main);
        }
        if split.left.is_zero() {
            return Ok(None);
        }
        self.left_carpet().inverse_cumulative_amount0(remainder - main_amount, split.left)
    }

    /// Consumes the left carpet first, then the main region, then the right carpet.
    fn inverse_cumulative_amount1(&self, cumulative_amount1: U256, total_liquidity: U256) -> Result<Option<i32>> {
        if cumulative_amount1.is_zero() {
            return Ok(Some(min_usable_tick(self.tick_spacing) - self.tick_spacing));
        }
        let split = self.split(total_liquidity)?;
        let left_carpet = self.left_carpet();
        let left_amount = left_carpet.cumulative_amount1(self.min_tick, split.left)?;
        if cumulative_amount1 <= left_amount && !split.left.is_zero() {
            return left_carpet.inverse_cumulative_amount1(cumulative_amount1, split.left);
        }
        let remainder = cumulative_amount1 - left_amount;
        let main_amount = self.main.cumulative_amount1(self.max_tick(), split.main)?;
        if remainder <= main_amount {
            return self.main.inverse_cumulative_amount1(remainder, split.main);
        }
        if split.right.is_zero() {
            return Ok(None);
        }
        self.right_carpet().inverse_cumulative_amount1(remainder - main_amount, split.right)
    }
}

fn resolve_geometric(
    params: &[u8; 32],
    twap_tick: i32,
    tick_spacing: i32,
    state: &LdfState,
) -> Result<(CarpetedShape<GeometricShape>, LdfState, bool)> {
    let p = CarpetedGeometricParams::decode(params)?;
    let g = &p.geometric;
    let (min_tick, should_surge) = shift_anchor(g.min_tick(twap_tick, tick_spacing), g.shift_mode, state);
    let main = GeometricShape::from_params(g, min_tick, tick_spacing)?;
    let shape = CarpetedShape::new(main, min_tick, g.length, p.weight_carpet, tick_spacing);
    Ok((shape, LdfState::Anchor { last_min_tick: min_tick }, should_surge))
}

fn resolve_double(
    params: &[u8; 32],
    twap_tick: i32,
    tick_spacing: i32,
    state: &LdfState,
) -> Result<(CarpetedShape<DoubleGeometricShape>, LdfState, bool)> {
    let p = CarpetedDoubleGeometricParams::decode(params)?;
    let d = &p.double;
    let (min_tick, should_surge) = shift_anchor(d.min_tick(twap_tick, tick_spacing), d.shift_mode, state);
    let main = DoubleGeometricShape::from_params(d, min_tick, tick_spacing)?;
    let shape = CarpetedShape::new(main, min_tick, d.length0 + d.length1, p.weight_carpet, tick_spacing);
    Ok((shape, LdfState::Anchor { last_min_tick: min_tick }, should_surge))
}

pub fn query_geometric(input: &LdfQueryInput) -> Result<LdfQuery> {
    let (shape, new_state, should_surge) =
        resolve_geometric(&input.params, input.twap_tick, input.tick_spacing, &input.state)?;
    super::finish_query(&shape, input.rounded_tick, new_state, should_surge)
}

pub fn compute_swap_geometric(input: &LdfSwapInput) -> Result<LdfSwap> {
    let (shape, _, _) = resolve_geometric(&input.params, input.twap_tick, input.tick_spacing, &input.state)?;
    shape.compute_swap(
        input.inverse_cumulative_amount_input,
        input.total_liquidity,
        input.zero_for_one,
        input.exact_in,
    )
}

pub fn query_double(input: &LdfQueryInput) -> Result<LdfQuery> {
    let (shape, new_state, should_surge) =
        resolve_double(&input.params, input.twap_tick, input.tick_spacing, &input.state)?;
    super::finish_query(&shape, input.rounded_tick, new_state, should_surge)
}

pub fn compute_swap_double(input: &LdfSwapInput) -> Result<LdfSwap> {
    let (shape, _, _) = resolve_double(&input.params, input.twap_tick, input.tick_spacing, &input.state)?;
    shape.compute_swap(
        input.inverse_cumulative_amount_input,
        input.total_liquidity,
        input.zero_for_one,
        input.exact_in,
    )
}

pub fn is_valid_geometric_params(params: &[u8; 32], tick_spacing: i32, twap_seconds_ago: u32) -> bool {
    match CarpetedGeometricParams::decode(params) {
        Ok(p) => {
            let g = p.geometric;
            is_valid_shape(g.shift_mode, g.min_tick_or_offset, g.length, g.alpha, tick_spacing, twap_seconds_ago)
        }
        Err(_) => false,
    }
}

pub fn is_valid_double_params(params: &[u8; 32], tick_spacing: i32, twap_seconds_ago: u32) -> bool {
    match CarpetedDoubleGeometricParams::decode(params) {
        Ok(p) => is_valid_double(&p.double, tick_spacing, twap_seconds_ago),
        Err(_) => false,
    }
}
