//! Exponentials, logarithms and powers in WAD / Q96 fixed point.
//!
//! Signed intermediates are held as two's-complement `U256` words so that the wrapping
//! multiply/add semantics match the 256-bit VM exactly; `sar` and `sdiv` provide the
//! arithmetic shift and truncating signed division.

use ethers::types::U256;

use super::full_math::WAD;
use crate::error::{Result, SwapError};

pub const LN2_WAD: U256 = U256([693_147_180_559_945_309, 0, 0, 0]);

const EXP_MIN_X: i128 = -42_139_678_854_452_767_551;
const EXP_MAX_X: i128 = 135_305_999_368_893_231_589;

mod word {
    use ethers::types::U256;

    pub fn from_i128(v: i128) -> U256 {
        if v < 0 {
            neg(U256::from(v.unsigned_abs()))
        } else {
            U256::from(v as u128)
        }
    }

    pub fn dec(s: &str) -> U256 {
        // constants below are all valid decimal literals
        U256::from_dec_str(s).unwrap_or_default()
    }

    pub fn is_neg(x: U256) -> bool {
        x.bit(255)
    }

    pub fn neg(x: U256) -> U256 {
        (!x).overflowing_add(U256::one()).0
    }

    pub fn abs(x: U256) -> U256 {
        if is_neg(x) {
            neg(x)
        } else {
            x
        }
    }

    pub fn add(a: U256, b: U256) -> U256 {
        a.overflowing_add(b).0
    }

    pub fn sub(a: U256, b: U256) -> U256 {
        a.overflowing_sub(b).0
    }

    pub fn mul(a: U256, b: U256) -> U256 {
        a.overflowing_mul(b).0
    }

    pub fn shl(a: U256, n: usize) -> U256 {
        if n >= 256 {
            U256::zero()
        } else {
            a << n
        }
    }

    pub fn sar(x: U256, n: usize) -> U256 {
        if is_neg(x) {
            !((!x) >> n)
        } else {
            x >> n
        }
    }

    /// Truncating signed division; `b` must be non-zero.
    pub fn sdiv(a: U256, b: U256) -> U256 {
        let q = abs(a) / abs(b);
        if is_neg(a) != is_neg(b) {
            neg(q)
        } else {
            q
        }
    }

    pub fn to_i128(x: U256) -> Option<i128> {
        let m = abs(x);
        if m.bits() > 127 {
            return None;
        }
        let m = m.low_u128() as i128;
        Some(if is_neg(x) { -m } else { m })
    }
}

/// `x^n` in fixed point with scale `b`, rounding each step half up.
pub fn rpow(x: U256, n: u64, b: U256) -> Result<U256> {
    if x.is_zero() {
        return Ok(if n == 0 { b } else { U256::zero() });
    }
    let mut z = if n & 1 == 0 { b } else { x };
    let half = b >> 1;
    let mut x = x;
    let mut y = n >> 1;
    while y != 0 {
        if x.bits() > 128 {
            return Err(SwapError::Overflow);
        }
        let xx = x * x;
        let xx_round = xx.checked_add(half).ok_or(SwapError::Overflow)?;
        x = xx_round / b;
        if y & 1 == 1 {
            let (zx, mul_overflow) = z.overflowing_mul(x);
            let (zx_round, add_overflow) = zx.overflowing_add(half);
            if (mul_overflow || add_overflow) && !x.is_zero() {
                return Err(SwapError::Overflow);
            }
            z = zx_round / b;
        }
        y >>= 1;
    }
    Ok(z)
}

/// `e^(x / 1e18) * 1e18`. Returns zero below the underflow bound and fails above the overflow bound.
pub fn exp_wad(x: i128) -> Result<U256> {
    if x <= EXP_MIN_X {
        return Ok(U256::zero());
    }
    if x >= EXP_MAX_X {
        return Err(SwapError::Overflow);
    }
    let ln2_scaled = word::dec("54916777467707473351141471128");

    let mut x = word::sdiv(word::shl(word::from_i128(x), 78), U256::from(3_814_697_265_625u64));
    let k = word::sar(
        word::add(word::sdiv(word::shl(x, 96), ln2_scaled), U256::one() << 95),
        96,
    );
    x = word::sub(x, word::mul(k, ln2_scaled));

    let mut y = word::add(x, word::dec("1346386616545796478920950773328"));
    y = word::add(word::sar(word::mul(y, x), 96), word::dec("57155421227552351082224309758442"));
    let mut p = word::sub(word::add(y, x), word::dec("94201549194550492254356042504812"));
    p = word::add(word::sar(word::mul(p, y), 96), word::dec("28719021644029726153956944680412240"));
    p = word::add(word::mul(p, x), word::dec("4385272521454847904659076985693276") << 96);

    let mut q = word::sub(x, word::dec("2855989394907223263936484059900"));
    q = word::add(word::sar(word::mul(q, x), 96), word::dec("50020603652535783019961831881945"));
    q = word::sub(word::sar(word::mul(q, x), 96), word::dec("533845033583426703283633433725380"));
    q = word::add(word::sar(word::mul(q, x), 96), word::dec("3604857256930695427073651918091429"));
    q = word::sub(word::sar(word::mul(q, x), 96), word::dec("14423608567350463180887372962807573"));
    q = word::add(word::sar(word::mul(q, x), 96), word::dec("26449188498355588339934803723976023"));

    if q.is_zero() {
        return Err(SwapError::DomainError);
    }
    let r = word::sdiv(p, q);
    let k = word::to_i128(k).ok_or(SwapError::Overflow)?;
    let shift = 195 - k;
    if !(0..256).contains(&shift) {
        return Err(SwapError::Overflow);
    }
    let scaled = word::mul(r, word::dec("3822833074963236453042738258902158003155416615667"));
    Ok(scaled >> shift as usize)
}

/// Un-normalized natural log; the result is `ln(x / 2^96) * 5^18 * 2^192`.
fn ln_scaled(x: U256) -> Result<U256> {
    if x.is_zero() || word::is_neg(x) {
        return Err(SwapError::DomainError);
    }
    let log2 = x.bits() - 1;
    let r = 255 - log2;
    let x = word::shl(x, r) >> 159;

    let mut p = word::add(x, word::dec("3273285459638523848632254066296"));
    p = word::add(word::sar(word::mul(p, x), 96), word::dec("24828157081833163892658089445524"));
    p = word::add(word::sar(word::mul(p, x), 96), word::dec("43456485725739037958740375743393"));
    p = word::sub(word::sar(word::mul(p, x), 96), word::dec("11111509109440967052023855526967"));
    p = word::sub(word::sar(word::mul(p, x), 96), word::dec("45023709667254063763336534515857"));
    p = word::sub(word::sar(word::mul(p, x), 96), word::dec("14706773417378608786704636184526"));
    p = word::sub(word::mul(p, x), word::dec("795164235651350426258249787498") << 96);

    let mut q = word::add(x, word::dec("5573035233440673466300451813936"));
    q = word::add(word::sar(word::mul(q, x), 96), word::dec("71694874799317883764090561454958"));
    q = word::add(word::sar(word::mul(q, x), 96), word::dec("283447036172924575727196451306956"));
    q = word::add(word::sar(word::mul(q, x), 96), word::dec("401686690394027663651624208769553"));
    q = word::add(word::sar(word::mul(q, x), 96), word::dec("204048457590392012362485061816622"));
    q = word::add(word::sar(word::mul(q, x), 96), word::dec("31853899698501571402653359427138"));
    q = word::add(word::sar(word::mul(q, x), 96), word::dec("909429971244387300277376558375"));

    let mut p = word::sdiv(p, q);
    p = word::mul(p, word::dec("1677202110996718588342820967067443963516166"));
    let k = word::sub(U256::from(159u64), U256::from(r));
    p = word::add(
        p,
        word::mul(
            word::dec("16597577552685614221487285958193947469193820559219878177908093499208371"),
            k,
        ),
    );
    Ok(p)
}

fn ln_divisor() -> U256 {
    U256::from(3_814_697_265_625u64) << 96
}

/// `floor(ln(x / 2^96) * 2^96)`: natural log of a Q96 input, returned in Q96. Fails for `x <= 0` (read as signed).
pub fn ln_q96(x: U256) -> Result<i128> {
    let p = ln_scaled(x)?;
    let d = ln_divisor();
    let m = word::abs(p);
    let mut q = m / d;
    if word::is_neg(p) && !(m % d).is_zero() {
        q += U256::one();
    }
    let q = word::to_i128(q).ok_or(SwapError::Overflow)?;
    Ok(if word::is_neg(p) { -q } else { q })
}

/// Ceiling counterpart of [`ln_q96`].
pub fn ln_q96_up(x: U256) -> Result<i128> {
    let p = ln_scaled(x)?;
    let d = ln_divisor();
    let m = word::abs(p);
    let mut q = m / d;
    if !word::is_neg(p) && !(m % d).is_zero() {
        q += U256::one();
    }
    let q = word::to_i128(q).ok_or(SwapError::Overflow)?;
    Ok(if word::is_neg(p) { -q } else { q })
}

/// `trunc(x * 1e18 / y)` on signed operands.
pub fn sdiv_wad(x: i128, y: i128) -> Result<i128> {
    if y == 0 {
        return Err(SwapError::DomainError);
    }
    let num = U256::from(x.unsigned_abs()) * WAD;
    let q = num / U256::from(y.unsigned_abs());
    if q.bits() > 127 {
        return Err(SwapError::Overflow);
    }
    let q = q.low_u128() as i128;
    Ok(if (x < 0) != (y < 0) { -q } else { q })
}
