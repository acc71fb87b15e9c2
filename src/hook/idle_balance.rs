//! Idle balance: the part of one token's balance parked outside the active distribution.

use ethers::types::U256;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SwapError};
use crate::math::{sub_relu, WAD};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdleBalance {
    pub amount: U256,
    pub is_token0: bool,
}

impl Default for IdleBalance {
    fn default() -> Self {
        Self { amount: U256::zero(), is_token0: true }
    }
}

impl IdleBalance {
    /// Subtract the idle part from whichever balance it belongs to.
    pub fn exclude_from(&self, balance0: U256, balance1: U256) -> (U256, U256) {
        if self.is_token0 {
            (sub_relu(balance0, self.amount), balance1)
        } else {
            (balance0, sub_relu(balance1, self.amount))
        }
    }
}

/// Idle balance after a distribution shift: the token whose surplus over its active balance is the
/// larger share of its total balance gets tagged. Ties go to token0.
pub fn compute_idle_balance(
    active_balance0: U256,
    active_balance1: U256,
    balance0: U256,
    balance1: U256,
) -> Result<IdleBalance> {
    let extra0 = sub_relu(balance0, active_balance0);
    let extra1 = sub_relu(balance1, active_balance1);
    let proportion = |extra: U256, balance: U256| -> Result<U256> {
        if balance.is_zero() {
            return Ok(U256::zero());
        }
        Ok(extra.checked_mul(WAD).ok_or(SwapError::Overflow)? / balance)
    };
    let idle = if proportion(extra0, balance0)? >= proportion(extra1, balance1)? {
        IdleBalance { amount: extra0, is_token0: true }
    } else {
        IdleBalance { amount: extra1, is_token0: false }
    };
    if idle.amount.bit(255) {
        return Err(SwapError::Overflow);
    }
    Ok(idle)
}
