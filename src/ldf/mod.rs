//! # Liquidity Density Functions
//!
//! An LDF decides how a pool's total liquidity is spread over ticks. Every distribution answers
//! the same questions:
//!
//! - **density**: share of total liquidity (Q96) placed at a rounded tick
//! - **cumulative amounts**: token0 held to the right of a tick, token1 held to the left of it
//! - **inverse cumulative amounts**: the rounded tick at which a given cumulative amount is reached
//!
//! The set of distributions is fixed per protocol version, so dispatch is a closed enum ([`Ldf`])
//! with one extension slot ([`Ldf::Custom`]) for distributions defined outside this crate.
//!
//! ## Shapes
//!
//! The closed-form math lives in shape types implementing [`Distribution`]:
//! [`UniformShape`], [`GeometricShape`], [`DoubleGeometricShape`] and [`CarpetedShape`]
//! (which wraps a geometric or double geometric main region with uniform carpets on both sides).
//! The `Ldf` variants decode their params and state into one of these shapes and apply
//! shift-mode and surge bookkeeping.

use std::fmt;
use std::sync::Arc;

use ethers::types::U256;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SwapError};
use crate::math::Q96;

pub mod buy_the_dip;
pub mod carpeted;
pub mod double_geometric;
pub mod geometric;
pub mod oracle_uni_geo;
pub mod params;
pub mod shift;
pub mod state;
pub mod uniform;

pub use carpeted::CarpetedShape;
pub use double_geometric::DoubleGeometricShape;
pub use geometric::GeometricShape;
pub use shift::ShiftMode;
pub use state::LdfState;
pub use uniform::UniformShape;

/// How the hook treats an LDF's state and surge signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum LdfType {
    #[default]
    Static = 0,
    DynamicNotStateful = 1,
    DynamicAndStateful = 2,
}

impl TryFrom<u8> for LdfType {
    type Error = SwapError;

    fn try_from(v: u8) -> Result<Self> {
        match v {
            0 => Ok(LdfType::Static),
            1 => Ok(LdfType::DynamicNotStateful),
            2 => Ok(LdfType::DynamicAndStateful),
            other => Err(SwapError::InvalidParams(format!("ldf type {}", other))),
        }
    }
}

/// Identifies a distribution without its runtime data; used by the registry and state decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LdfKind {
    Uniform,
    Geometric,
    DoubleGeometric,
    CarpetedGeometric,
    CarpetedDoubleGeometric,
    BuyTheDipGeometric,
    OracleUniGeo,
    Custom,
}

/// Inputs to [`Ldf::query`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LdfQueryInput {
    pub rounded_tick: i32,
    pub twap_tick: i32,
    pub spot_price_tick: i32,
    pub tick_spacing: i32,
    pub params: [u8; 32],
    pub state: LdfState,
}

/// Result of [`Ldf::query`]; densities are per unit of total liquidity, in Q96.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LdfQuery {
    pub liquidity_density_x96: U256,
    pub cumulative_amount0_density_x96: U256,
    pub cumulative_amount1_density_x96: U256,
    pub new_state: LdfState,
    pub should_surge: bool,
}

/// Inputs to [`Ldf::compute_swap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LdfSwapInput {
    pub inverse_cumulative_amount_input: U256,
    pub total_liquidity: U256,
    pub zero_for_one: bool,
    pub exact_in: bool,
    pub twap_tick: i32,
    pub spot_price_tick: i32,
    pub tick_spacing: i32,
    pub params: [u8; 32],
    pub state: LdfState,
}

/// Result of an inverse-cumulative search. `success == false` means the amount exceeds what the
/// distribution can provide in that direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LdfSwap {
    pub success: bool,
    pub rounded_tick: i32,
    pub cumulative_amount0: U256,
    pub cumulative_amount1: U256,
    pub swap_liquidity: U256,
}

impl LdfSwap {
    pub fn failed() -> Self {
        Self::default()
    }
}

/// Closed-form liquidity shape over rounded ticks.
pub trait Distribution {
    fn tick_spacing(&self) -> i32;

    fn liquidity_density_x96(&self, rounded_tick: i32) -> Result<U256>;

    /// Token0 held in ticks at or to the right of `rounded_tick`.
    fn cumulative_amount0(&self, rounded_tick: i32, total_liquidity: U256) -> Result<U256>;

    /// Token1 held in ticks at or to the left of `rounded_tick`.
    fn cumulative_amount1(&self, rounded_tick: i32, total_liquidity: U256) -> Result<U256>;

    /// `None` when the amount is more than the shape holds.
    fn inverse_cumulative_amount0(&self, cumulative_amount0: U256, total_liquidity: U256) -> Result<Option<i32>>;

    fn inverse_cumulative_amount1(&self, cumulative_amount1: U256, total_liquidity: U256) -> Result<Option<i32>>;

    /// Density at `rounded_tick`, token0 density right of it and token1 density left of it.
    fn query(&self, rounded_tick: i32) -> Result<(U256, U256, U256)> {
        let ts = self.tick_spacing();
        Ok((
            self.liquidity_density_x96(rounded_tick)?,
            self.cumulative_amount0(rounded_tick + ts, Q96)?,
            self.cumulative_amount1(rounded_tick - ts, Q96)?,
        ))
    }

    /// Locate the rounded tick where `input` would be fully consumed and report the cumulative
    /// amounts on both sides of it.
    fn compute_swap(&self, input: U256, total_liquidity: U256, zero_for_one: bool, exact_in: bool) -> Result<LdfSwap> {
        let ts = self.tick_spacing();
        let (rounded_tick, cumulative_amount0, cumulative_amount1);
        if exact_in == zero_for_one {
            rounded_tick = match self.inverse_cumulative_amount0(input, total_liquidity)? {
                Some(t) => t,
                None => return Ok(LdfSwap::failed()),
            };
            cumulative_amount0 = if exact_in {
                self.cumulative_amount0(rounded_tick + ts, total_liquidity)?
            } else {
                self.cumulative_amount0(rounded_tick, total_liquidity)?
            };
            cumulative_amount1 = if exact_in {
                self.cumulative_amount1(rounded_tick, total_liquidity)?
            } else {
                self.cumulative_amount1(rounded_tick - ts, total_liquidity)?
            };
        } else {
            rounded_tick = match self.inverse_cumulative_amount1(input, total_liquidity)? {
                Some(t) => t,
                None => return Ok(LdfSwap::failed()),
            };
            cumulative_amount1 = if exact_in {
                self.cumulative_amount1(rounded_tick - ts, total_liquidity)?
            } else {
                self.cumulative_amount1(rounded_tick, total_liquidity)?
            };
            cumulative_amount0 = if exact_in {
                self.cumulative_amount0(rounded_tick, total_liquidity)?
            } else {
                self.cumulative_amount0(rounded_tick + ts, total_liquidity)?
            };
        }
        let density = self.liquidity_density_x96(rounded_tick)?;
        let swap_liquidity = density.full_mul(total_liquidity) >> 96;
        let swap_liquidity = U256::try_from(swap_liquidity).map_err(|_| SwapError::Overflow)?;
        Ok(LdfSwap { success: true, rounded_tick, cumulative_amount0, cumulative_amount1, swap_liquidity })
    }
}

/// Distribution implemented outside the crate.
pub trait CustomLdf: Send + Sync + fmt::Debug {
    fn query(&self, input: &LdfQueryInput) -> Result<LdfQuery>;

    fn compute_swap(&self, input: &LdfSwapInput) -> Result<LdfSwap>;

    fn decode_state(&self, word: &[u8; 32]) -> LdfState {
        LdfState::decode(LdfKind::Custom, word)
    }

    fn is_valid_params(&self, _params: &[u8; 32], _tick_spacing: i32, _twap_seconds_ago: u32) -> bool {
        true
    }
}

/// Every distribution the engine can quote against.
#[derive(Clone)]
pub enum Ldf {
    Uniform,
    Geometric,
    DoubleGeometric,
    CarpetedGeometric,
    CarpetedDoubleGeometric,
    BuyTheDipGeometric,
    /// Bounds anchored to an external floor price (WAD, token1 per token0).
    OracleUniGeo { floor_price_wad: U256 },
    Custom(Arc<dyn CustomLdf>),
}

impl fmt::Debug for Ldf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ldf::OracleUniGeo { floor_price_wad } => {
                f.debug_struct("OracleUniGeo").field("floor_price_wad", floor_price_wad).finish()
            }
            Ldf::Custom(inner) => f.debug_tuple("Custom").field(inner).finish(),
            other => write!(f, "{:?}", other.kind()),
        }
    }
}

impl Ldf {
    pub fn kind(&self) -> LdfKind {
        match self {
            Ldf::Uniform => LdfKind::Uniform,
            Ldf::Geometric => LdfKind::Geometric,
            Ldf::DoubleGeometric => LdfKind::DoubleGeometric,
            Ldf::CarpetedGeometric => LdfKind::CarpetedGeometric,
            Ldf::CarpetedDoubleGeometric => LdfKind::CarpetedDoubleGeometric,
            Ldf::BuyTheDipGeometric => LdfKind::BuyTheDipGeometric,
            Ldf::OracleUniGeo { .. } => LdfKind::OracleUniGeo,
            Ldf::Custom(_) => LdfKind::Custom,
        }
    }

    pub fn decode_state(&self, word: &[u8; 32]) -> LdfState {
        match self {
            Ldf::Custom(inner) => inner.decode_state(word),
            other => LdfState::decode(other.kind(), word),
        }
    }

    pub fn query(&self, input: &LdfQueryInput) -> Result<LdfQuery> {
        match self {
            Ldf::Uniform => uniform::query(input),
            Ldf::Geometric => geometric::query(input),
            Ldf::DoubleGeometric => double_geometric::query(input),
            Ldf::CarpetedGeometric => carpeted::query_geometric(input),
            Ldf::CarpetedDoubleGeometric => carpeted::query_double(input),
            Ldf::BuyTheDipGeometric => buy_the_dip::query(input),
            Ldf::OracleUniGeo { floor_price_wad } => oracle_uni_geo::query(input, *floor_price_wad),
            Ldf::Custom(inner) => inner.query(input),
        }
    }

    /// Whether `params` describe a usable distribution for a pool with this spacing and TWAP window.
    pub fn is_valid_params(&self, params: &[u8; 32], tick_spacing: i32, twap_seconds_ago: u32) -> bool {
        if tick_spacing <= 0 {
            return false;
        }
        match self {
            Ldf::Uniform => uniform::is_valid_params(params, tick_spacing, twap_seconds_ago),
            Ldf::Geometric => geometric::is_valid_params(params, tick_spacing, twap_seconds_ago),
            Ldf::DoubleGeometric => double_geometric::is_valid_params(params, tick_spacing, twap_seconds_ago),
            Ldf::CarpetedGeometric => carpeted::is_valid_geometric_params(params, tick_spacing, twap_seconds_ago),
            Ldf::CarpetedDoubleGeometric => carpeted::is_valid_double_params(params, tick_spacing, twap_seconds_ago),
            Ldf::BuyTheDipGeometric => buy_the_dip::is_valid_params(params, tick_spacing, twap_seconds_ago),
            Ldf::OracleUniGeo { .. } => oracle_uni_geo::is_valid_params(params, tick_spacing),
            Ldf::Custom(inner) => inner.is_valid_params(params, tick_spacing, twap_seconds_ago),
        }
    }

    pub fn compute_swap(&self, input: &LdfSwapInput) -> Result<LdfSwap> {
        match self {
            Ldf::Uniform => uniform::compute_swap(input),
            Ldf::Geometric => geometric::compute_swap(input),
            Ldf::DoubleGeometric => double_geometric::compute_swap(input),
            Ldf::CarpetedGeometric => carpeted::compute_swap_geometric(input),
            Ldf::CarpetedDoubleGeometric => carpeted::compute_swap_double(input),
            Ldf::BuyTheDipGeometric => buy_the_dip::compute_swap(input),
            Ldf::OracleUniGeo { floor_price_wad } => oracle_uni_geo::compute_swap(input, *floor_price_wad),
            Ldf::Custom(inner) => inner.compute_swap(input),
        }
    }
}

/// Apply the shift-mode rule against the stored anchor and report whether the anchor moved.
pub(crate) fn shift_anchor(min_tick: i32, shift_mode: ShiftMode, state: &LdfState) -> (i32, bool) {
    match state.last_min_tick() {
        Some(last) => {
            let tick = shift_mode.enforce(min_tick, last);
            (tick, tick != last)
        }
        None => (min_tick, false),
    }
}

/// Package a shape query with the anchor state it should persist.
pub(crate) fn finish_query<D: Distribution>(
    shape: &D,
    rounded_tick: i32,
    new_state: LdfState,
    should_surge: bool,
) -> Result<LdfQuery> {
    let (liquidity_density_x96, cumulative_amount0_density_x96, cumulative_amount1_density_x96) =
        shape.query(rounded_tick)?;
    Ok(LdfQuery {
        liquidity_density_x96,
        cumulative_amount0_density_x96,
        cumulative_amount1_density_x96,
        new_state,
        should_surge,
    })
}
