//! Hooklets: per-pool callbacks that may override the swap fee or the starting price.

use std::fmt;

use ethers::types::U256;
use serde::{Deserialize, Serialize};

/// What a hooklet asks the hook to change before a swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BeforeSwapOverride {
    /// Replaces the dynamic fee (still floored by the surge fee).
    pub fee: Option<U256>,
    /// Replaces the pool's sqrt price for this swap.
    pub sqrt_price_x96: Option<U256>,
}

pub trait Hooklet: Send + Sync + fmt::Debug {
    fn before_swap(&self, zero_for_one: bool) -> BeforeSwapOverride;

    fn after_swap(&self) {}
}

/// Hooklet that never overrides anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooklet;

impl Hooklet for NoopHooklet {
    fn before_swap(&self, _zero_for_one: bool) -> BeforeSwapOverride {
        BeforeSwapOverride::default()
    }
}

/// Static per-direction fee overrides, loaded from the pool's hooklet config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeOverrideHooklet {
    #[serde(default)]
    pub fee_0_for_1: Option<u32>,
    #[serde(default)]
    pub fee_1_for_0: Option<u32>,
    #[serde(default)]
    pub sqrt_price_x96: Option<U256>,
}

impl Hooklet for FeeOverrideHooklet {
    fn before_swap(&self, zero_for_one: bool) -> BeforeSwapOverride {
        let fee = if zero_for_one { self.fee_0_for_1 } else { self.fee_1_for_0 };
        BeforeSwapOverride { fee: fee.map(U256::from), sqrt_price_x96: self.sqrt_price_x96 }
    }
}
