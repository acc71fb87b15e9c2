//! Yield-bearing vault snapshots and the reserve bookkeeping built on them.
//!
//! Rates are WAD-scaled: `redeem_rate` converts shares to underlying, `deposit_rate` underlying to
//! shares minted, `withdraw_rate` underlying to shares burned.

use ethers::types::{Address, I256, U256};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SwapError};
use crate::math::{dist, mul_div, mul_div_up, WAD};

/// Base of the raw token ratios.
pub const RAW_TOKEN_RATIO_BASE: U256 = U256([1_000_000, 0, 0, 0]);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vault {
    pub address: Address,
    pub decimals: u8,
    pub deposit_rate: U256,
    pub withdraw_rate: U256,
    pub redeem_rate: U256,
    pub max_deposit: U256,
    pub max_withdraw: U256,
}

impl Vault {
    pub fn is_set(&self) -> bool {
        !self.address.is_zero()
    }

    /// Underlying value of `reserve` shares. Without a vault the reserve is already underlying.
    pub fn reserves_in_underlying(&self, reserve: U256) -> Result<U256> {
        if !self.is_set() {
            return Ok(reserve);
        }
        mul_div_up(reserve, self.redeem_rate, WAD)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultSharePrices {
    pub initialized: bool,
    pub share_price0: U256,
    pub share_price1: U256,
}

/// Current share prices, and whether either moved by more than `1 / threshold` since `previous`.
pub fn should_surge_from_vaults(
    vaults: &[Vault; 2],
    reserves: [U256; 2],
    currency_decimals: [u8; 2],
    thresholds: [u16; 2],
    previous: &VaultSharePrices,
) -> Result<(bool, Option<VaultSharePrices>)> {
    if !vaults[0].is_set() && !vaults[1].is_set() {
        return Ok((false, None));
    }

    let mut prices = [U256::zero(); 2];
    for i in 0..2 {
        if reserves[i].is_zero() {
            continue;
        }
        let rescale = (18 + vaults[i].decimals as i32 - currency_decimals[i] as i32).max(0) as usize;
        let underlying = vaults[i].reserves_in_underlying(reserves[i])?;
        prices[i] = mul_div_up(underlying, U256::exp10(rescale), reserves[i])?;
    }

    let moved = |i: usize, previous_price: U256| {
        // a zero threshold divides to zero like the checked-in bytecode does
        let tolerance = previous_price.checked_div(U256::from(thresholds[i])).unwrap_or_default();
        dist(prices[i], previous_price) > tolerance
    };
    let should_surge = previous.initialized && (moved(0, previous.share_price0) || moved(1, previous.share_price1));
    if should_surge {
        debug!("vault share price surge: {:?} -> {:?}", (previous.share_price0, previous.share_price1), prices);
    }

    Ok((
        should_surge,
        Some(VaultSharePrices { initialized: true, share_price0: prices[0], share_price1: prices[1] }),
    ))
}

/// Effect of moving underlying between the pool's raw balance and its vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReserveChange {
    pub reserve_change: I256,
    pub raw_balance_change: I256,
    pub pool_manager_reserve: U256,
}

fn to_i256(v: U256) -> Result<I256> {
    I256::try_from(v).map_err(|_| SwapError::Overflow)
}

/// `balance + delta`, failing when the result would be negative.
pub fn apply_signed(balance: U256, delta: I256) -> Result<U256> {
    let updated = to_i256(balance)?.checked_add(delta).ok_or(SwapError::Overflow)?;
    if updated.is_negative() {
        return Err(SwapError::Overflow);
    }
    Ok(updated.into_raw())
}

/// Settle `raw_balance_change` through the vault: a negative change deposits surplus raw balance,
/// a positive one withdraws from the vault. `pool_manager_reserve` is the claim-token balance the
/// deposit draws from and the withdrawal refills.
pub fn update_vault_reserve_via_claim_tokens(
    vault: &Vault,
    raw_balance_change: I256,
    pool_manager_reserve: U256,
) -> Result<ReserveChange> {
    let abs_amount = raw_balance_change.unsigned_abs();
    if raw_balance_change.is_negative() {
        let amount = abs_amount.min(vault.max_deposit).min(pool_manager_reserve);
        if amount.is_zero() {
            return Ok(ReserveChange { reserve_change: I256::zero(), raw_balance_change: I256::zero(), pool_manager_reserve });
        }
        let shares = mul_div_up(amount, vault.deposit_rate, WAD)?;
        Ok(ReserveChange {
            reserve_change: to_i256(shares)?,
            raw_balance_change: -to_i256(amount)?,
            pool_manager_reserve: pool_manager_reserve - amount,
        })
    } else if raw_balance_change.is_positive() {
        if abs_amount > vault.max_withdraw {
            return Err(SwapError::WithdrawExceedsMax);
        }
        let shares = mul_div_up(abs_amount, vault.withdraw_rate, WAD)?;
        Ok(ReserveChange {
            reserve_change: -to_i256(shares)?,
            raw_balance_change: to_i256(abs_amount)?,
            pool_manager_reserve: pool_manager_reserve.checked_add(abs_amount).ok_or(SwapError::Overflow)?,
        })
    } else {
        Ok(ReserveChange { reserve_change: I256::zero(), raw_balance_change: I256::zero(), pool_manager_reserve })
    }
}

/// Raw-balance band for one token, all in units of [`RAW_TOKEN_RATIO_BASE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTokenRatios {
    pub min: u32,
    pub target: u32,
    pub max: u32,
}

/// Balances of one token after a possible top-up or deposit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenBalances {
    pub raw_balance: U256,
    pub reserve: U256,
    pub pool_manager_reserve: U256,
}

/// Move the raw balance back to `target` when it left the `[min, max]` band.
pub fn update_raw_balance_if_needed(vault: &Vault, balances: TokenBalances, ratios: &RawTokenRatios) -> Result<TokenBalances> {
    let reserve_in_underlying = vault.reserves_in_underlying(balances.reserve)?;
    let total = balances.raw_balance.checked_add(reserve_in_underlying).ok_or(SwapError::Overflow)?;
    let max_raw = mul_div(total, U256::from(ratios.max), RAW_TOKEN_RATIO_BASE)?;
    let min_raw = mul_div(total, U256::from(ratios.min), RAW_TOKEN_RATIO_BASE)?;

    if balances.raw_balance >= min_raw && balances.raw_balance <= max_raw {
        return Ok(balances);
    }

    let target_raw = mul_div(total, U256::from(ratios.target), RAW_TOKEN_RATIO_BASE)?;
    let delta = to_i256(target_raw)? - to_i256(balances.raw_balance)?;
    debug!("raw balance {} outside [{}, {}], moving toward {}", balances.raw_balance, min_raw, max_raw, target_raw);

    let change = update_vault_reserve_via_claim_tokens(vault, delta, balances.pool_manager_reserve)?;
    Ok(TokenBalances {
        raw_balance: apply_signed(balances.raw_balance, change.raw_balance_change)?,
        reserve: apply_signed(balances.reserve, change.reserve_change)?,
        pool_manager_reserve: change.pool_manager_reserve,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vault() -> Vault {
        Vault {
            address: Address::repeat_byte(0x11),
            decimals: 18,
            deposit_rate: WAD,
            withdraw_rate: WAD,
            redeem_rate: WAD * U256::from(2u64),
            max_deposit: U256::from(1_000_000u64),
            max_withdraw: U256::from(1_000_000u64),
        }
    }

    #[test]
    fn test_reserves_in_underlying() {
        assert_eq!(vault().reserves_in_underlying(U256::from(10u64)).unwrap(), U256::from(20u64));
        assert_eq!(Vault::default().reserves_in_underlying(U256::from(10u64)).unwrap(), U256::from(10u64));
    }

    #[test]
    fn test_share_price_surge() {
        let vaults = [vault(), Vault::default()];
        let reserves = [U256::from(1_000u64), U256::zero()];
        let (surge, prices) = should_surge_from_vaults(&vaults, reserves, [18, 18], [100, 100], &VaultSharePrices::default()).unwrap();
        let prices = prices.unwrap();
        assert!(!surge);
        assert_eq!(prices.share_price0, WAD * U256::from(2u64));

        // a 5% jump against a 1% tolerance surges
        let mut moved = vaults;
        moved[0].redeem_rate = WAD * U256::from(21u64) / U256::from(10u64);
        let (surge, _) = should_surge_from_vaults(&moved, reserves, [18, 18], [100, 100], &prices).unwrap();
        assert!(surge);
        let (surge, _) = should_surge_from_vaults(&vaults, reserves, [18, 18], [100, 100], &prices).unwrap();
        assert!(!surge);
    }

    #[test]
    fn test_claim_token_bounds() {
        let v = vault();
        let change = update_vault_reserve_via_claim_tokens(&v, I256::from(-500), U256::from(200u64)).unwrap();
        assert_eq!(change.raw_balance_change, I256::from(-200));
        assert_eq!(change.pool_manager_reserve, U256::zero());

        let err = update_vault_reserve_via_claim_tokens(&v, I256::from(2_000_000), U256::zero());
        assert_eq!(err, Err(SwapError::WithdrawExceedsMax));
    }

    #[test]
    fn test_surplus_deposit_clamped_to_max() {
        let v = vault();
        let change =
            update_vault_reserve_via_claim_tokens(&v, I256::from(-5_000_000), U256::from(3_000_000u64)).unwrap();
        assert_eq!(change.raw_balance_change, I256::from(-1_000_000));
        assert_eq!(change.pool_manager_reserve, U256::from(2_000_000u64));
    }

    #[test]
    fn test_raw_balance_top_up() {
        let v = Vault { redeem_rate: WAD, ..vault() };
        let ratios = RawTokenRatios { min: 50_000, target: 100_000, max: 200_000 };
        let balances = TokenBalances { raw_balance: U256::from(10u64), reserve: U256::from(990u64), pool_manager_reserve: U256::zero() };
        let updated = update_raw_balance_if_needed(&v, balances, &ratios).unwrap();
        assert_eq!(updated.raw_balance, U256::from(100u64));
        assert_eq!(updated.reserve, U256::from(900u64));
        assert_eq!(updated.pool_manager_reserve, U256::from(90u64));

        let inside = TokenBalances { raw_balance: U256::from(100u64), ..balances };
        assert_eq!(update_raw_balance_if_needed(&v, inside, &ratios).unwrap(), inside);
    }
}
