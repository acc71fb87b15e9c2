//! 256-bit mul-div family with 512-bit intermediates and explicit rounding.
//!
//! `mul_div*` require the product itself to fit in 256 bits (the on-chain `mulDiv` reverts otherwise).
//! `full_mul_div*` only require the final quotient to fit.

use ethers::types::{U256, U512};

use crate::error::{Result, SwapError};

/// 2^96
pub const Q96: U256 = U256([0, 1 << 32, 0, 0]);
/// 1e18
pub const WAD: U256 = U256([1_000_000_000_000_000_000, 0, 0, 0]);

fn narrow(v: U512) -> Result<U256> {
    U256::try_from(v).map_err(|_| SwapError::Overflow)
}

/// `floor(a * b / d)`. Fails if `a * b` overflows 256 bits or `d == 0`.
pub fn mul_div(a: U256, b: U256, d: U256) -> Result<U256> {
    if d.is_zero() {
        return Err(SwapError::Overflow);
    }
    let product = a.checked_mul(b).ok_or(SwapError::Overflow)?;
    Ok(product / d)
}

/// `ceil(a * b / d)`. Same failure conditions as [`mul_div`].
pub fn mul_div_up(a: U256, b: U256, d: U256) -> Result<U256> {
    if d.is_zero() {
        return Err(SwapError::Overflow);
    }
    let product = a.checked_mul(b).ok_or(SwapError::Overflow)?;
    let q = product / d;
    if (product % d).is_zero() {
        Ok(q)
    } else {
        Ok(q + U256::one())
    }
}

/// `floor(a * b / d)` with a 512-bit product.
pub fn full_mul_div(a: U256, b: U256, d: U256) -> Result<U256> {
    if d.is_zero() {
        return Err(SwapError::Overflow);
    }
    narrow(a.full_mul(b) / U512::from(d))
}

/// `ceil(a * b / d)` with a 512-bit product.
pub fn full_mul_div_up(a: U256, b: U256, d: U256) -> Result<U256> {
    if d.is_zero() {
        return Err(SwapError::Overflow);
    }
    let product = a.full_mul(b);
    let d = U512::from(d);
    let q = narrow(product / d)?;
    if (product % d).is_zero() {
        Ok(q)
    } else {
        q.checked_add(U256::one()).ok_or(SwapError::Overflow)
    }
}

/// Rounds a previously computed `floor(a * b / d)` up when the division was inexact.
pub fn round_up_full_mul_div_result(a: U256, b: U256, d: U256, result: U256) -> Result<U256> {
    if d.is_zero() {
        return Err(SwapError::Overflow);
    }
    if (a.full_mul(b) % U512::from(d)).is_zero() {
        Ok(result)
    } else {
        result.checked_add(U256::one()).ok_or(SwapError::Overflow)
    }
}

/// `floor(a * b / 2^96)`
pub fn full_mul_x96(a: U256, b: U256) -> Result<U256> {
    narrow(a.full_mul(b) >> 96)
}

/// `ceil(a * b / 2^96)`
pub fn full_mul_x96_up(a: U256, b: U256) -> Result<U256> {
    let product = a.full_mul(b);
    let q = narrow(product >> 96)?;
    if (product & U512::from(Q96 - U256::one())).is_zero() {
        Ok(q)
    } else {
        q.checked_add(U256::one()).ok_or(SwapError::Overflow)
    }
}

/// `ceil(a / b)`. Fails on a zero divisor.
pub fn div_up(a: U256, b: U256) -> Result<U256> {
    if b.is_zero() {
        return Err(SwapError::DomainError);
    }
    let q = a / b;
    if (a % b).is_zero() {
        Ok(q)
    } else {
        Ok(q + U256::one())
    }
}

/// `max(a - b, 0)`
pub fn sub_relu(a: U256, b: U256) -> U256 {
    a.saturating_sub(b)
}

/// `|a - b|`
pub fn dist(a: U256, b: U256) -> U256 {
    if a > b {
        a - b
    } else {
        b - a
    }
}

/// `ceil(x * y / 1e18)`. Fails if `x * y` overflows.
pub fn mul_wad_up(x: U256, y: U256) -> Result<U256> {
    mul_div_up(x, y, WAD)
}

/// `floor(x * y / 1e18)`. Fails if `x * y` overflows.
pub fn mul_wad(x: U256, y: U256) -> Result<U256> {
    mul_div(x, y, WAD)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_q96_is_two_pow_96() {
        assert_eq!(Q96, U256::one() << 96);
        assert_eq!(WAD, U256::exp10(18));
    }

    #[test]
    fn test_mul_div_rounding() {
        let a = U256::from(7u64);
        let b = U256::from(3u64);
        let d = U256::from(2u64);
        assert_eq!(mul_div(a, b, d).unwrap(), U256::from(10u64));
        assert_eq!(mul_div_up(a, b, d).unwrap(), U256::from(11u64));
        assert_eq!(mul_div_up(U256::from(4u64), b, d).unwrap(), U256::from(6u64));
    }

    #[test]
    fn test_mul_div_rejects_256_bit_overflow() {
        let big = U256::MAX;
        assert_eq!(mul_div(big, U256::from(2u64), U256::from(4u64)), Err(SwapError::Overflow));
        // the 512-bit path succeeds on the same inputs
        assert_eq!(
            full_mul_div(big, U256::from(2u64), U256::from(4u64)).unwrap(),
            big / U256::from(2u64)
        );
    }

    #[test]
    fn test_full_mul_div_up_and_zero_divisor() {
        let r = full_mul_div_up(U256::MAX, U256::from(3u64), U256::from(6u64)).unwrap();
        assert_eq!(r, U256::MAX / U256::from(2u64) + U256::one());
        assert_eq!(full_mul_div(U256::one(), U256::one(), U256::zero()), Err(SwapError::Overflow));
        assert_eq!(full_mul_div(U256::MAX, U256::MAX, U256::one()), Err(SwapError::Overflow));
    }

    #[test]
    fn test_full_mul_x96() {
        let x = U256::from(123_456_789u64);
        assert_eq!(full_mul_x96(x, Q96).unwrap(), x);
        assert_eq!(full_mul_x96_up(x, Q96).unwrap(), x);
        assert_eq!(full_mul_x96(U256::one(), U256::one()).unwrap(), U256::zero());
        assert_eq!(full_mul_x96_up(U256::one(), U256::one()).unwrap(), U256::one());
        // remainder only in bits 32..96
        let v = U256::one() << 40;
        assert_eq!(full_mul_x96_up(v, U256::one()).unwrap(), U256::one());
    }

    #[test]
    fn test_round_up_result() {
        let r = round_up_full_mul_div_result(U256::from(5u64), U256::from(3u64), U256::from(4u64), U256::from(3u64));
        assert_eq!(r.unwrap(), U256::from(4u64));
        let r = round_up_full_mul_div_result(U256::from(4u64), U256::from(3u64), U256::from(4u64), U256::from(3u64));
        assert_eq!(r.unwrap(), U256::from(3u64));
    }

    #[test]
    fn test_helpers() {
        assert_eq!(sub_relu(U256::from(3u64), U256::from(5u64)), U256::zero());
        assert_eq!(dist(U256::from(3u64), U256::from(5u64)), U256::from(2u64));
        assert_eq!(div_up(U256::from(7u64), U256::from(2u64)).unwrap(), U256::from(4u64));
        assert_eq!(div_up(U256::one(), U256::zero()), Err(SwapError::DomainError));
        assert_eq!(mul_wad_up(U256::one(), U256::one()).unwrap(), U256::one());
        assert_eq!(mul_wad(U256::one(), U256::one()).unwrap(), U256::zero());
    }
}
