//! Static geometric distribution that switches to an alternative alpha once the TWAP crosses a
//! threshold. Crossing the threshold in either direction triggers a surge.

use super::geometric::{is_valid_shape, GeometricShape};
use super::params::{alpha_x96, BuyTheDipParams};
use super::{Distribution, LdfQuery, LdfQueryInput, LdfState, LdfSwap, LdfSwapInput, ShiftMode};
use crate::error::Result;

fn resolve(params: &[u8; 32], twap_tick: i32, tick_spacing: i32, state: &LdfState) -> Result<(GeometricShape, LdfState, bool)> {
    let p = BuyTheDipParams::decode(params)?;
    let use_alt = p.should_use_alt_alpha(twap_tick);
    let should_surge = match state {
        LdfState::BuyTheDip { last_twap_tick } => use_alt != p.should_use_alt_alpha(*last_twap_tick),
        _ => false,
    };
    let alpha = if use_alt { p.alt_alpha } else { p.alpha };
    let shape = GeometricShape::new(p.min_tick, p.length, alpha_x96(alpha)?, tick_spacing)?;
    Ok((shape, LdfState::BuyTheDip { last_twap_tick: twap_tick }, should_surge))
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

/// Both alphas must describe a valid static geometric shape, and the switch needs a TWAP.
pub fn is_valid_params(params: &[u8; 32], tick_spacing: i32, twap_seconds_ago: u32) -> bool {
    let p = match BuyTheDipParams::decode(params) {
        Ok(p) => p,
        Err(_) => return false,
    };
    twap_seconds_ago != 0
        && p.alpha != p.alt_alpha
        && is_valid_shape(ShiftMode::Static, p.min_tick, p.length, p.alpha, tick_spacing, 0)
        && is_valid_shape(ShiftMode::Static, p.min_tick, p.length, p.alt_alpha, tick_spacing, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ldf::LdfKind;

    fn params() -> [u8; 32] {
        BuyTheDipParams {
            shift_mode: ShiftMode::Static,
            min_tick: -600,
            length: 20,
            alpha: 120_000_000,
            alt_alpha: 80_000_000,
            alt_threshold: -300,
            alt_threshold_direction: true,
        }
        .encode()
    }

    fn input(twap_tick: i32, state: LdfState) -> LdfQueryInput {
        LdfQueryInput { rounded_tick: -60, twap_tick, spot_price_tick: twap_tick, tick_spacing: 60, params: params(), state }
    }

    #[test]
    fn test_alpha_switch_surges_once() {
        let first = query(&input(0, LdfState::Uninitialized)).unwrap();
        assert!(!first.should_surge);
        assert_eq!(first.new_state, LdfState::BuyTheDip { last_twap_tick: 0 });

        let dipped = query(&input(-400, first.new_state)).unwrap();
        assert!(dipped.should_surge);
        let still_dipped = query(&input(-500, dipped.new_state)).unwrap();
        assert!(!still_dipped.should_surge);
        // alt alpha below one moves liquidity toward the left end
        assert_ne!(first.liquidity_density_x96, dipped.liquidity_density_x96);
    }

    #[test]
    fn test_state_word_is_twap_tick() {
        let q = query(&input(-400, LdfState::Uninitialized)).unwrap();
        let word = q.new_state.encode();
        assert_eq!(LdfState::decode(LdfKind::BuyTheDipGeometric, &word), q.new_state);
    }

    #[test]
    fn test_validity() {
        assert!(is_valid_params(&params(), 60, 3600));
        assert!(!is_valid_params(&params(), 60, 0));
    }
}
