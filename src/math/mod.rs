//! Fixed-point arithmetic that mirrors the on-chain VM bit for bit.
//!
//! Every rounding direction is part of the function name; callers pick floor or ceiling
//! explicitly and overflow is always reported as [`SwapError::Overflow`](crate::error::SwapError).

pub mod fixed_point;
pub mod full_math;
pub mod liquidity_amounts;
pub mod sqrt_price_math;
pub mod swap_math;
pub mod tick_math;

pub use fixed_point::{exp_wad, ln_q96, ln_q96_up, rpow, sdiv_wad, LN2_WAD};
pub use full_math::{
    dist, div_up, full_mul_div, full_mul_div_up, full_mul_x96, full_mul_x96_up, mul_div, mul_div_up, mul_wad,
    mul_wad_up, round_up_full_mul_div_result, sub_relu, Q96, WAD,
};
pub use tick_math::{
    get_sqrt_price_at_tick, get_tick_at_sqrt_price, max_usable_tick, min_usable_tick, round_tick, round_tick_single,
    PricePoint, MAX_SQRT_PRICE, MAX_TICK, MIN_SQRT_PRICE, MIN_TICK,
};

use ethers::types::U256;

/// Floor square root.
pub fn sqrt(x: U256) -> U256 {
    x.integer_sqrt()
}
