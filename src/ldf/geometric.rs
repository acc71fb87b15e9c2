//! Geometric distribution: `length` rounded ticks starting at `min_tick`, density ratio `alpha`
//! between neighbouring ticks.
//!
//! `alpha > 1` puts the bulk of the liquidity at the right end, `alpha < 1` at the left end.
//! `alpha == 1` is degenerate and rejected by [`is_valid_params`].

use ethers::types::U256;

use super::params::{alpha_x96, GeometricParams};
use super::{shift_anchor, Distribution, LdfQuery, LdfQueryInput, LdfState, LdfSwap, LdfSwapInput, ShiftMode};
use crate::error::{Result, SwapError};
use crate::math::{
    dist, full_mul_div, full_mul_div_up, full_mul_x96_up, get_sqrt_price_at_tick, ln_q96, ln_q96_up, max_usable_tick,
    min_usable_tick, mul_div, mul_div_up, rpow, sdiv_wad, Q96,
};
use crate::math::tick_math::x_wad_to_rounded_tick;

const WAD_I: i128 = 1_000_000_000_000_000_000;

/// Smallest per-tick density a valid distribution may assign inside its range (`Q96 / 1000`).
pub const MIN_LIQUIDITY_DENSITY: U256 = U256([5_460_236_245_818_027_278, 4_294_967, 0, 0]);

pub(crate) fn sub(a: U256, b: U256) -> Result<U256> {
    a.checked_sub(b).ok_or(SwapError::Overflow)
}

pub(crate) fn mul(a: U256, b: U256) -> Result<U256> {
    a.checked_mul(b).ok_or(SwapError::Overflow)
}

fn sqrt_at(tick: i32) -> Result<U256> {
    get_sqrt_price_at_tick(tick)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometricShape {
    pub min_tick: i32,
    pub length: i32,
    pub alpha_x96: U256,
    pub tick_spacing: i32,
}

impl GeometricShape {
    pub fn new(min_tick: i32, length: i32, alpha_x96: U256, tick_spacing: i32) -> Result<Self> {
        if tick_spacing <= 0 || length <= 0 {
            return Err(SwapError::InvalidParams(format!("length {} spacing {}", length, tick_spacing)));
        }
        if alpha_x96 == Q96 || alpha_x96.is_zero() {
            return Err(SwapError::InvalidParams("alpha must differ from 1".to_string()));
        }
        Ok(Self { min_tick, length, alpha_x96, tick_spacing })
    }

    pub fn from_params(p: &GeometricParams, min_tick: i32, tick_spacing: i32) -> Result<Self> {
        Self::new(min_tick, p.length, alpha_x96(p.alpha)?, tick_spacing)
    }

    pub fn max_tick(&self) -> i32 {
        self.min_tick + self.length * self.tick_spacing
    }

    fn alpha_inv_x96(&self) -> Result<U256> {
        mul_div(Q96, Q96, self.alpha_x96)
    }

    fn pow(&self, base: U256, n: i32) -> Result<U256> {
        rpow(base, n as u64, Q96)
    }
}

impl Distribution for GeometricShape {
    fn tick_spacing(&self) -> i32 {
        self.tick_spacing
    }

    fn liquidity_density_x96(&self, rounded_tick: i32) -> Result<U256> {
        if rounded_tick < self.min_tick || rounded_tick >= self.max_tick() {
            return Ok(U256::zero());
        }
        let x = (rounded_tick - self.min_tick) / self.tick_spacing;
        let alpha = self.alpha_x96;
        if alpha > Q96 {
            let alpha_inv = self.alpha_inv_x96()?;
            full_mul_div(
                self.pow(alpha_inv, self.length - x)?,
                alpha - Q96,
                sub(Q96, self.pow(alpha_inv, self.length)?)?,
            )
        } else {
            mul_div(Q96 - alpha, self.pow(alpha, x)?, sub(Q96, self.pow(alpha, self.length)?)?)
        }
    }

    fn cumulative_amount0(&self, rounded_tick: i32, total_liquidity: U256) -> Result<U256> {
        if rounded_tick >= self.max_tick() {
            return Ok(U256::zero());
        }
        let ts = self.tick_spacing;
        let length = self.length;
        let x = if rounded_tick < self.min_tick { 0 } else { (rounded_tick - self.min_tick) / ts };
        let s = sqrt_at(-ts)?;
        let alpha = self.alpha_x96;

        let density = if alpha > Q96 {
            let alpha_inv = self.alpha_inv_x96()?;
            let positive = alpha_inv > s;
            let a = self.pow(alpha_inv, length - x)?;
            let b = sqrt_at(-ts * (length - x))?;
            let (numerator, denominator) =
                if positive { (sub(a, b)?, alpha_inv - s) } else { (sub(b, a)?, s - alpha_inv) };
            let term1 = mul_div_up(sub(Q96, alpha_inv)?, numerator, denominator)?;
            let term2 = mul_div_up(term1, sqrt_at(-ts * x)?, sub(Q96, self.pow(alpha_inv, length)?)?)?;
            mul_div_up(term2, Q96 - s, sqrt_at(self.min_tick)?)?
        } else {
            let base = mul_div(alpha, s, Q96)?;
            let alpha_pow_length = self.pow(alpha, length)?;
            let head = full_mul_div_up(self.pow(alpha, x)?, sqrt_at(-ts * x)?, Q96)?;
            let tail = full_mul_div_up(alpha_pow_length, sqrt_at(-ts * length)?, Q96)?;
            let numerator = mul(sub(head, tail)?, Q96 - alpha)?;
            let denominator = mul(sub(Q96, base)?, sub(Q96, alpha_pow_length)?)?;
            full_mul_div_up(full_mul_div_up(Q96 - s, numerator, denominator)?, Q96, sqrt_at(self.min_tick)?)?
        };
        full_mul_x96_up(density, total_liquidity)
    }

    fn cumulative_amount1(&self, rounded_tick: i32, total_liquidity: U256) -> Result<U256> {
        if rounded_tick < self.min_tick {
            return Ok(U256::zero());
        }
        let ts = self.tick_spacing;
        let length = self.length;
        let x = if rounded_tick >= self.max_tick() { length - 1 } else { (rounded_tick - self.min_tick) / ts };
        let big_s = sqrt_at(ts)?;
        let alpha = self.alpha_x96;
        let base = mul_div(alpha, big_s, Q96)?;

        let density = if alpha > Q96 {
            let alpha_inv = self.alpha_inv_x96()?;
            let alpha_inv_pow_length = self.pow(alpha_inv, length)?;
            let anchor = full_mul_div_up(self.pow(alpha_inv, length - x - 1)?, sqrt_at((x + 1) * ts)?, Q96)?;
            let term1 = mul_div_up(Q96, sub(anchor, alpha_inv_pow_length)?, sub(Q96, alpha_inv_pow_length)?)?;
            let term2 = mul_div_up(term1, alpha - Q96, sub(base, Q96)?)?;
            mul_div_up(term2, big_s - Q96, sqrt_at(-self.min_tick)?)?
        } else {
            let anchor = full_mul_div_up(self.pow(alpha, x + 1)?, sqrt_at(ts * (x + 1))?, Q96)?;
            let numerator = mul(dist(Q96, anchor), Q96 - alpha)?;
            let denominator = mul(dist(Q96, base), sub(Q96, self.pow(alpha, length)?)?)?;
            mul_div_up(full_mul_div_up(big_s - Q96, numerator, denominator)?, sqrt_at(self.min_tick)?, Q96)?
        };
        full_mul_x96_up(density, total_liquidity)
    }

    fn inverse_cumulative_amount0(&self, cumulative_amount0: U256, total_liquidity: U256) -> Result<Option<i32>> {
        if cumulative_amount0.is_zero() {
            return Ok(Some(self.max_tick()));
        }
        if total_liquidity.is_zero() {
            return Ok(None);
        }
        let ts = self.tick_spacing;
        let length = self.length;
        let alpha = self.alpha_x96;
        let density = full_mul_div_up(cumulative_amount0, Q96, total_liquidity)?;
        let s = sqrt_at(-ts)?;
        let base = mul_div(alpha, s, Q96)?;
        let ln_base = ln_q96(base)?;

        let mut x_wad = if alpha > Q96 {
            let alpha_inv = self.alpha_inv_x96()?;
            let alpha_inv_pow_length = self.pow(alpha_inv, length)?;
            let positive = alpha_inv > s;
            let term1 = mul_div_up(density, sqrt_at(self.min_tick)?, Q96 - s)?;
            let term2 = mul_div_up(term1, sub(Q96, alpha_inv_pow_length)?, Q96)?;
            let spread = if positive { alpha_inv - s } else { s - alpha_inv };
            let tmp = mul_div_up(term2, spread, sub(Q96, alpha_inv)?)?;
            let sqrt_length = sqrt_at(-ts * length)?;
            if !positive && sqrt_length <= tmp {
                // past the far end of the range
                let last = self.min_tick + (length - 1) * ts;
                return Ok((cumulative_amount0 <= self.cumulative_amount0(last, total_liquidity)?).then_some(last));
            }
            let tmp = if positive {
                tmp.checked_add(sqrt_length).ok_or(SwapError::Overflow)?
            } else {
                sqrt_length - tmp
            };
            let ln_alpha = ln_q96_up(alpha)?;
            sdiv_wad(ln_q96_up(tmp)? + length as i128 * ln_alpha, ln_base)?
        } else {
            let alpha_pow_length = self.pow(alpha, length)?;
            let denominator = mul(sub(Q96, alpha_pow_length)?, sub(Q96, base)?)?;
            let numerator =
                full_mul_div_up(mul_div_up(density, sqrt_at(self.min_tick)?, Q96)?, denominator, Q96 - s)?;
            let base_power = (numerator / (Q96 - alpha))
                .checked_add(self.pow(base, length)?)
                .ok_or(SwapError::Overflow)?;
            sdiv_wad(ln_q96_up(base_power)?, ln_base)?
        };

        if x_wad < 0 {
            if cumulative_amount0 > self.cumulative_amount0(self.min_tick, total_liquidity)? {
                return Ok(None);
            }
            x_wad = 0;
        }
        let rounded_tick = x_wad_to_rounded_tick(x_wad, self.min_tick, ts, false);
        if rounded_tick < self.min_tick || rounded_tick > self.max_tick() {
            return Ok(None);
        }
        if rounded_tick == self.max_tick() {
            return Ok(Some(self.max_tick() - ts));
        }
        Ok(Some(rounded_tick))
    }

    fn inverse_cumulative_amount1(&self, cumulative_amount1: U256, total_liquidity: U256) -> Result<Option<i32>> {
        if cumulative_amount1.is_zero() {
            return Ok(Some(self.min_tick - self.tick_spacing));
        }
        if total_liquidity.is_zero() {
            return Ok(None);
        }
        let ts = self.tick_spacing;
        let length = self.length;
        let alpha = self.alpha_x96;
        let density = full_mul_div(cumulative_amount1, Q96, total_liquidity)?;
        let big_s = sqrt_at(ts)?;
        let base = mul_div(alpha, big_s, Q96)?;
        let ln_base = ln_q96_up(base)?;

        let mut x_wad = if alpha > Q96 {
            let alpha_inv = self.alpha_inv_x96()?;
            let alpha_inv_pow_length = self.pow(alpha_inv, length)?;
            let term1 = mul_div(density, sqrt_at(-self.min_tick)?, big_s - Q96)?;
            let term2 = mul_div(term1, sub(base, Q96)?, alpha - Q96)?;
            let numerator = mul_div(term2, sub(Q96, alpha_inv_pow_length)?, Q96)?;
            let sum = numerator.checked_add(alpha_inv_pow_length).ok_or(SwapError::Overflow)?;
            if sum.is_zero() {
                return Ok(None);
            }
            sdiv_wad(ln_q96(sum)? + length as i128 * ln_q96(alpha)?, ln_base)? - WAD_I
        } else {
            let denominator = mul(dist(Q96, base), sub(Q96, self.pow(alpha, length)?)?)?;
            let scaled = full_mul_div(density, Q96, sqrt_at(self.min_tick)?)?;
            let numerator = full_mul_div(scaled, denominator, big_s - Q96)?;
            let quotient = numerator / (Q96 - alpha);
            if Q96 > base && Q96 <= quotient {
                return Ok((cumulative_amount1 <= self.cumulative_amount1(self.min_tick, total_liquidity)?)
                    .then_some(self.min_tick));
            }
            let base_power = if Q96 > base {
                Q96 - quotient
            } else {
                Q96.checked_add(quotient).ok_or(SwapError::Overflow)?
            };
            sdiv_wad(ln_q96(base_power)?, ln_base)? - WAD_I
        };

        let last_x_wad = (length - 1) as i128 * WAD_I;
        if x_wad > last_x_wad {
            let last = self.min_tick + (length - 1) * ts;
            if cumulative_amount1 > self.cumulative_amount1(last, total_liquidity)? {
                return Ok(None);
            }
            x_wad = last_x_wad;
        }
        let rounded_tick = x_wad_to_rounded_tick(x_wad, self.min_tick, ts, true);
        if rounded_tick < self.min_tick - ts || rounded_tick >= self.max_tick() {
            return Ok(None);
        }
        if rounded_tick == self.min_tick - ts {
            return Ok(Some(self.min_tick));
        }
        Ok(Some(rounded_tick))
    }
}

fn resolve(params: &[u8; 32], twap_tick: i32, tick_spacing: i32, state: &LdfState) -> Result<(GeometricShape, LdfState, bool)> {
    let p = GeometricParams::decode(params)?;
    let (min_tick, should_surge) = shift_anchor(p.min_tick(twap_tick, tick_spacing), p.shift_mode, state);
    let shape = GeometricShape::from_params(&p, min_tick, tick_spacing)?;
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

/// Range and density checks shared by every geometric-based distribution.
pub(crate) fn is_valid_shape(
    shift_mode: ShiftMode,
    min_tick_or_offset: i32,
    length: i32,
    alpha: u32,
    tick_spacing: i32,
    twap_seconds_ago: u32,
) -> bool {
    if length <= 0 || min_tick_or_offset % tick_spacing != 0 {
        return false;
    }
    if shift_mode != ShiftMode::Static && twap_seconds_ago == 0 {
        return false;
    }
    let min_usable = min_usable_tick(tick_spacing);
    let max_usable = max_usable_tick(tick_spacing);
    let min_tick = if shift_mode == ShiftMode::Static { min_tick_or_offset } else { min_usable };
    if min_tick < min_usable || min_tick + length * tick_spacing > max_usable {
        return false;
    }
    let alpha_x96 = match alpha_x96(alpha) {
        Ok(a) => a,
        Err(_) => return false,
    };
    let shape = match GeometricShape::new(min_tick, length, alpha_x96, tick_spacing) {
        Ok(s) => s,
        Err(_) => return false,
    };
    // the thinnest tick sits at one of the two ends
    let ends = [min_tick, min_tick + (length - 1) * tick_spacing];
    ends.iter().all(|t| matches!(shape.liquidity_density_x96(*t), Ok(d) if d >= MIN_LIQUIDITY_DENSITY))
}

pub fn is_valid_params(params: &[u8; 32], tick_spacing: i32, twap_seconds_ago: u32) -> bool {
    match GeometricParams::decode(params) {
        Ok(p) => is_valid_shape(p.shift_mode, p.min_tick_or_offset, p.length, p.alpha, tick_spacing, twap_seconds_ago),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(alpha: u32) -> GeometricShape {
        GeometricShape::new(-300, 10, alpha_x96(alpha).unwrap(), 60).unwrap()
    }

    #[test]
    fn test_density_sums_to_one() {
        for alpha in [50_000_000u32, 150_000_000] {
            let s = shape(alpha);
            let mut sum = U256::zero();
            for i in 0..10 {
                sum += s.liquidity_density_x96(-300 + i * 60).unwrap();
            }
            let err = dist(sum, Q96);
            assert!(err < U256::from(1_000_000u64), "alpha {} sum {} off by {}", alpha, sum, err);
        }
    }

    #[test]
    fn test_density_direction_follows_alpha() {
        let s = shape(150_000_000);
        assert!(s.liquidity_density_x96(240).unwrap() > s.liquidity_density_x96(-300).unwrap());
        let s = shape(50_000_000);
        assert!(s.liquidity_density_x96(240).unwrap() < s.liquidity_density_x96(-300).unwrap());
        assert!(s.liquidity_density_x96(300).unwrap().is_zero());
    }

    #[test]
    fn test_cumulative_amounts_are_monotone() {
        let total = U256::exp10(24);
        for alpha in [50_000_000u32, 150_000_000] {
            let s = shape(alpha);
            let mut prev0 = U256::MAX;
            let mut prev1 = U256::zero();
            for t in (-360..=360).step_by(60) {
                let a0 = s.cumulative_amount0(t, total).unwrap();
                let a1 = s.cumulative_amount1(t, total).unwrap();
                assert!(a0 <= prev0, "amount0 rose at {}", t);
                assert!(a1 >= prev1, "amount1 fell at {}", t);
                prev0 = a0;
                prev1 = a1;
            }
            assert!(s.cumulative_amount0(300, total).unwrap().is_zero());
            assert!(s.cumulative_amount1(-360, total).unwrap().is_zero());
        }
    }

    #[test]
    fn test_inverse_amount0_brackets_input() {
        let total = U256::exp10(24);
        let s = shape(150_000_000);
        let target = s.cumulative_amount0(0, total).unwrap();
        let tick = s.inverse_cumulative_amount0(target, total).unwrap().expect("within range");
        assert!((-60..=0).contains(&tick), "tick {}", tick);
        let beyond = s.cumulative_amount0(-300, total).unwrap() * U256::from(3u64);
        assert_eq!(s.inverse_cumulative_amount0(beyond, total).unwrap(), None);
    }

    #[test]
    fn test_inverse_amount1_brackets_input() {
        let total = U256::exp10(24);
        let s = shape(50_000_000);
        let target = s.cumulative_amount1(0, total).unwrap();
        let tick = s.inverse_cumulative_amount1(target, total).unwrap().expect("within range");
        assert!((0..=60).contains(&tick), "tick {}", tick);
        assert_eq!(s.inverse_cumulative_amount1(U256::zero(), total).unwrap(), Some(-360));
    }

    #[test]
    fn test_alpha_one_is_rejected() {
        assert!(GeometricShape::new(0, 10, Q96, 60).is_err());
        let params = GeometricParams { shift_mode: ShiftMode::Static, min_tick_or_offset: 0, length: 10, alpha: 100_000_000 }.encode();
        assert!(!is_valid_params(&params, 60, 0));
        let params = GeometricParams { shift_mode: ShiftMode::Static, min_tick_or_offset: 0, length: 10, alpha: 120_000_000 }.encode();
        assert!(is_valid_params(&params, 60, 0));
    }

    #[test]
    fn test_anchor_surge() {
        let params = GeometricParams { shift_mode: ShiftMode::Both, min_tick_or_offset: -120, length: 4, alpha: 120_000_000 }.encode();
        let (shape, state, surge) = resolve(&params, 600, 60, &LdfState::Anchor { last_min_tick: 480 }).unwrap();
        assert_eq!(shape.min_tick, 480);
        assert_eq!(state, LdfState::Anchor { last_min_tick: 480 });
        assert!(!surge);
        let (_, _, surge) = resolve(&params, 900, 60, &LdfState::Anchor { last_min_tick: 480 }).unwrap();
        assert!(surge);
    }
}
