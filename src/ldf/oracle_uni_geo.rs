//! Uniform or geometric distribution with one bound pinned to an external floor price.
//!
//! The floor price (WAD, token1 per token0) is converted to a rounded tick on every call. The
//! state remembers that tick and the raw params, and any change to either triggers a surge.

use ethers::types::U256;

use super::geometric::GeometricShape;
use super::params::{alpha_x96, OracleDistribution, OracleUniGeoParams, ORACLE_UNI_GEO_PARAMS_LEN};
use super::uniform::UniformShape;
use super::{Distribution, LdfQuery, LdfQueryInput, LdfState, LdfSwap, LdfSwapInput};
use crate::error::{Result, SwapError};
use crate::math::{full_mul_div, get_tick_at_sqrt_price, max_usable_tick, min_usable_tick, round_tick_single, sqrt, WAD};

/// Rounded tick of a WAD floor price.
pub fn floor_price_to_rounded_tick(floor_price_wad: U256, tick_spacing: i32) -> Result<i32> {
    if floor_price_wad.is_zero() {
        return Err(SwapError::InvalidParams("zero floor price".to_string()));
    }
    let price_x192 = full_mul_div(floor_price_wad, U256::one() << 192, WAD)?;
    let tick = get_tick_at_sqrt_price(sqrt(price_x192))?;
    Ok(round_tick_single(tick, tick_spacing))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OracleShape {
    Uniform(UniformShape),
    Geometric(GeometricShape),
}

impl Distribution for OracleShape {
    fn tick_spacing(&self) -> i32 {
        match self {
            OracleShape::Uniform(s) => s.tick_spacing,
            OracleShape::Geometric(s) => s.tick_spacing,
        }
    }

    fn liquidity_density_x96(&self, rounded_tick: i32) -> Result<U256> {
        match self {
            OracleShape::Uniform(s) => s.liquidity_density_x96(rounded_tick),
            OracleShape::Geometric(s) => s.liquidity_density_x96(rounded_tick),
        }
    }

    fn cumulative_amount0(&self, rounded_tick: i32, total_liquidity: U256) -> Result<U256> {
        match self {
            OracleShape::Uniform(s) => s.cumulative_amount0(rounded_tick, total_liquidity),
            OracleShape::Geometric(s) => s.cumulative_amount0(rounded_tick, total_liquidity),
        }
    }

    fn cumulative_amount1(&self, rounded_tick: i32, total_liquidity: U256) -> Result<U256> {
        match self {
            OracleShape::Uniform(s) => s.cumulative_amount1(rounded_tick, total_liquidity),
            OracleShape::Geometric(s) => s.cumulative_amount1(rounded_tick, total_liquidity),
        }
    }

    fn inverse_cumulative_amount0(&self, cumulative_amount0: U256, total_liquidity: U256) -> Result<Option<i32>> {
        match self {
            OracleShape::Uniform(s) => s.inverse_cumulative_amount0(cumulative_amount0, total_liquidity),
            OracleShape::Geometric(s) => s.inverse_cumulative_amount0(cumulative_amount0, total_liquidity),
        }
    }

    fn inverse_cumulative_amount1(&self, cumulative_amount1: U256, total_liquidity: U256) -> Result<Option<i32>> {
        match self {
            OracleShape::Uniform(s) => s.inverse_cumulative_amount1(cumulative_amount1, total_liquidity),
            OracleShape::Geometric(s) => s.inverse_cumulative_amount1(cumulative_amount1, total_liquidity),
        }
    }
}

fn resolve(
    params: &[u8; 32],
    tick_spacing: i32,
    state: &LdfState,
    floor_price_wad: U256,
) -> Result<(OracleShape, LdfState, bool)> {
    let p = OracleUniGeoParams::decode(params)?;
    let oracle_tick = floor_price_to_rounded_tick(floor_price_wad, tick_spacing)?;
    let (lower, upper) = p.bounds(oracle_tick);
    let lower = lower.max(min_usable_tick(tick_spacing));
    let upper = upper.min(max_usable_tick(tick_spacing));
    if lower >= upper {
        return Err(SwapError::InvalidParams(format!("empty oracle range [{}, {})", lower, upper)));
    }
    let shape = match p.distribution {
        OracleDistribution::Uniform => OracleShape::Uniform(UniformShape::new(lower, upper, tick_spacing)?),
        OracleDistribution::Geometric => OracleShape::Geometric(GeometricShape::new(
            lower,
            (upper - lower) / tick_spacing,
            alpha_x96(p.alpha)?,
            tick_spacing,
        )?),
    };

    let mut last_params = [0u8; ORACLE_UNI_GEO_PARAMS_LEN];
    last_params.copy_from_slice(&params[..ORACLE_UNI_GEO_PARAMS_LEN]);
    let should_surge = match state {
        LdfState::OracleUniGeo { last_oracle_tick, last_params: prev } => {
            *last_oracle_tick != oracle_tick || *prev != last_params
        }
        _ => false,
    };
    Ok((shape, LdfState::OracleUniGeo { last_oracle_tick: oracle_tick, last_params }, should_surge))
}

pub fn query(input: &LdfQueryInput, floor_price_wad: U256) -> Result<LdfQuery> {
    let (shape, new_state, should_surge) = resolve(&input.params, input.tick_spacing, &input.state, floor_price_wad)?;
    super::finish_query(&shape, input.rounded_tick, new_state, should_surge)
}

pub fn compute_swap(input: &LdfSwapInput, floor_price_wad: U256) -> Result<LdfSwap> {
    let (shape, _, _) = resolve(&input.params, input.tick_spacing, &input.state, floor_price_wad)?;
    shape.compute_swap(
        input.inverse_cumulative_amount_input,
        input.total_liquidity,
        input.zero_for_one,
        input.exact_in,
    )
}

pub fn is_valid_params(params: &[u8; 32], tick_spacing: i32) -> bool {
    match OracleUniGeoParams::decode(params) {
        Ok(p) => {
            p.non_oracle_tick % tick_spacing == 0
                && p.oracle_tick_offset % tick_spacing == 0
                && (p.distribution == OracleDistribution::Uniform || p.alpha as u64 != super::params::ALPHA_BASE)
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(distribution: OracleDistribution) -> [u8; 32] {
        OracleUniGeoParams {
            distribution,
            oracle_is_tick_lower: true,
            oracle_tick_offset: 0,
            non_oracle_tick: 6_000,
            alpha: 90_000_000,
        }
        .encode()
    }

    #[test]
    fn test_floor_price_tick() {
        // price 1.0 sits at tick 0
        assert_eq!(floor_price_to_rounded_tick(WAD, 60).unwrap(), 0);
        // price 0.5 is about tick -6932
        assert_eq!(floor_price_to_rounded_tick(WAD / 2, 60).unwrap(), -6960);
    }

    #[test]
    fn test_floor_change_surges() {
        let first = query(
            &LdfQueryInput {
                rounded_tick: 60,
                twap_tick: 0,
                spot_price_tick: 0,
                tick_spacing: 60,
                params: params(OracleDistribution::Uniform),
                state: LdfState::Uninitialized,
            },
            WAD,
        )
        .unwrap();
        assert!(!first.should_surge);
        assert_eq!(first.liquidity_density_x96, crate::math::Q96 / U256::from(100u64));

        let input = LdfQueryInput {
            rounded_tick: 60,
            twap_tick: 0,
            spot_price_tick: 0,
            tick_spacing: 60,
            params: params(OracleDistribution::Uniform),
            state: first.new_state,
        };
        assert!(!query(&input, WAD).unwrap().should_surge);
        assert!(query(&input, WAD * U256::from(2u64)).unwrap().should_surge);
        let geometric = LdfQueryInput { params: params(OracleDistribution::Geometric), ..input };
        assert!(query(&geometric, WAD).unwrap().should_surge);
    }
}
