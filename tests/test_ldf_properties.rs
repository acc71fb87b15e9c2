//! Integration tests for liquidity density functions
//!
//! Tests cover:
//! - Cumulative amount monotonicity across every built-in shape
//! - Inverse cumulative lookups landing next to the tick they came from
//! - Densities returned by `Ldf::query` summing to one over the range
//! - Parameter validation through the `Ldf` dispatch

use bunni_v2_sdk::ldf::params::{alpha_x96, DoubleGeometricParams, GeometricParams, UniformParams};
use bunni_v2_sdk::ldf::{
    CarpetedShape, Distribution, DoubleGeometricShape, GeometricShape, Ldf, LdfQueryInput, LdfState, ShiftMode,
    UniformShape,
};
use bunni_v2_sdk::math::{dist, min_usable_tick, Q96};
use ethers::types::U256;
use itertools::Itertools;

const TICK_SPACING: i32 = 60;

fn shapes() -> Vec<(&'static str, Box<dyn Distribution>)> {
    let double = DoubleGeometricParams {
        shift_mode: ShiftMode::Static,
        min_tick_or_offset: -600,
        length0: 10,
        alpha0: 150_000_000,
        weight0: 1,
        length1: 10,
        alpha1: 50_000_000,
        weight1: 3,
    };
    let carpet_main = GeometricShape::new(-600, 20, alpha_x96(120_000_000).unwrap(), TICK_SPACING).unwrap();
    let shapes: Vec<(&'static str, Box<dyn Distribution>)> = vec![
        ("uniform", Box::new(UniformShape::new(-600, 600, TICK_SPACING).unwrap())),
        ("geometric_up", Box::new(GeometricShape::new(-600, 20, alpha_x96(150_000_000).unwrap(), TICK_SPACING).unwrap())),
        ("geometric_down", Box::new(GeometricShape::new(-600, 20, alpha_x96(50_000_000).unwrap(), TICK_SPACING).unwrap())),
        ("double_geometric", Box::new(DoubleGeometricShape::from_params(&double, -600, TICK_SPACING).unwrap())),
        ("carpeted", Box::new(CarpetedShape::new(carpet_main, -600, 20, 1_000_000_000, TICK_SPACING))),
    ];
    shapes
}

fn query_input(params: [u8; 32], rounded_tick: i32) -> LdfQueryInput {
    LdfQueryInput {
        rounded_tick,
        twap_tick: 0,
        spot_price_tick: rounded_tick,
        tick_spacing: TICK_SPACING,
        params,
        state: LdfState::Uninitialized,
    }
}

/// Token0 to the right of a tick only shrinks as the tick moves right; token1 to the left only grows
#[test]
fn test_cumulative_amounts_are_monotone() {
    let total = U256::exp10(24);
    for (name, shape) in shapes() {
        let ticks: Vec<i32> = (-900..=900).step_by(TICK_SPACING as usize).collect();
        for (a, b) in ticks.iter().tuple_windows() {
            let (a0, b0) = (shape.cumulative_amount0(*a, total).unwrap(), shape.cumulative_amount0(*b, total).unwrap());
            let (a1, b1) = (shape.cumulative_amount1(*a, total).unwrap(), shape.cumulative_amount1(*b, total).unwrap());
            assert!(b0 <= a0, "{}: amount0 rose between {} and {}", name, a, b);
            assert!(b1 >= a1, "{}: amount1 fell between {} and {}", name, a, b);
        }
    }
}

/// Inverting a cumulative amount lands within one spacing of the tick it was read at
#[test]
fn test_inverse_cumulative_brackets_amount() {
    let total = U256::exp10(24);
    for (name, shape) in shapes() {
        for tick in [-300, -120, 0, 120, 300] {
            let amount0 = shape.cumulative_amount0(tick, total).unwrap();
            let found = shape.inverse_cumulative_amount0(amount0, total).unwrap().expect("amount0 within range");
            assert!(
                (tick - 2 * TICK_SPACING..=tick + TICK_SPACING).contains(&found),
                "{}: amount0 at {} inverted to {}",
                name,
                tick,
                found
            );

            let amount1 = shape.cumulative_amount1(tick, total).unwrap();
            let found = shape.inverse_cumulative_amount1(amount1, total).unwrap().expect("amount1 within range");
            assert!(
                (tick - TICK_SPACING..=tick + 2 * TICK_SPACING).contains(&found),
                "{}: amount1 at {} inverted to {}",
                name,
                tick,
                found
            );
        }
    }
}

/// More of a token than the whole shape holds cannot be located
#[test]
fn test_inverse_rejects_amounts_beyond_total() {
    let total = U256::exp10(24);
    for (name, shape) in shapes() {
        let all0 = shape.cumulative_amount0(min_usable_tick(TICK_SPACING), total).unwrap();
        assert_eq!(shape.inverse_cumulative_amount0(all0 * U256::from(3u64), total).unwrap(), None, "{}", name);
    }
}

/// Per-tick densities from `Ldf::query` add up to one unit of liquidity over the range
#[test]
fn test_query_densities_sum_to_one() {
    let uniform = UniformParams { shift_mode: ShiftMode::Static, tick_lower_or_offset: -600, tick_upper_or_offset: 600 };
    let geometric = GeometricParams { shift_mode: ShiftMode::Static, min_tick_or_offset: -300, length: 10, alpha: 150_000_000 };
    let cases = [(Ldf::Uniform, uniform.encode()), (Ldf::Geometric, geometric.encode())];

    for (ldf, params) in cases {
        assert!(ldf.is_valid_params(&params, TICK_SPACING, 0), "{:?}", ldf);
        let sum = (-600..600)
            .step_by(TICK_SPACING as usize)
            .map(|tick| ldf.query(&query_input(params, tick)).unwrap().liquidity_density_x96)
            .fold(U256::zero(), |acc, d| acc + d);
        assert!(dist(sum, Q96) < U256::from(1_000_000u64), "{:?}: density sum {}", ldf, sum);

        let outside = ldf.query(&query_input(params, 1_200)).unwrap();
        assert!(outside.liquidity_density_x96.is_zero(), "{:?}", ldf);
    }
}

/// Shapes pointing the other way put their liquidity at the other end
#[test]
fn test_alpha_direction_via_query() {
    let up = GeometricParams { shift_mode: ShiftMode::Static, min_tick_or_offset: -600, length: 20, alpha: 150_000_000 };
    let down = GeometricParams { alpha: 50_000_000, ..up };
    let density = |p: &GeometricParams, tick| Ldf::Geometric.query(&query_input(p.encode(), tick)).unwrap().liquidity_density_x96;

    assert!(density(&up, 540) > density(&up, -600));
    assert!(density(&down, 540) < density(&down, -600));
}

/// Malformed parameter words are rejected for every kind that checks them
#[test]
fn test_invalid_params_rejected() {
    let misaligned = UniformParams { shift_mode: ShiftMode::Static, tick_lower_or_offset: -605, tick_upper_or_offset: 600 };
    assert!(!Ldf::Uniform.is_valid_params(&misaligned.encode(), TICK_SPACING, 0));

    let flat = GeometricParams { shift_mode: ShiftMode::Static, min_tick_or_offset: -600, length: 20, alpha: 100_000_000 };
    assert!(!Ldf::Geometric.is_valid_params(&flat.encode(), TICK_SPACING, 0));

    let unweighted = DoubleGeometricParams {
        shift_mode: ShiftMode::Static,
        min_tick_or_offset: -600,
        length0: 10,
        alpha0: 150_000_000,
        weight0: 0,
        length1: 10,
        alpha1: 50_000_000,
        weight1: 0,
    };
    assert!(!Ldf::DoubleGeometric.is_valid_params(&unweighted.encode(), TICK_SPACING, 0));
}
