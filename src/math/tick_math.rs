// Tick <-> sqrt price conversion and tick-spacing helpers
use ethers::types::U256;

use crate::error::{Result, SwapError};

pub const MIN_TICK: i32 = -887272;
pub const MAX_TICK: i32 = 887272;
pub const MIN_SQRT_PRICE: U256 = U256([4295128739, 0, 0, 0]); // sqrt(1.0001^-887272) * 2^96
pub const MAX_SQRT_PRICE: U256 = U256([6743328256752651558, 17280870778742802505, 4294805859, 0]); // sqrt(1.0001^887272) * 2^96

/// A price on the pool's grid: the sqrt price and the tick it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricePoint {
    pub sqrt_price_x96: U256,
    pub tick: i32,
}

impl PricePoint {
    pub fn from_tick(tick: i32) -> Result<Self> {
        Ok(Self { sqrt_price_x96: get_sqrt_price_at_tick(tick)?, tick })
    }

    pub fn from_sqrt_price(sqrt_price_x96: U256) -> Result<Self> {
        Ok(Self { sqrt_price_x96, tick: get_tick_at_sqrt_price(sqrt_price_x96)? })
    }
}

const fn q128(l0: u64, l1: u64) -> U256 {
    U256([l0, l1, 0, 0])
}

const TICK_FACTORS: [(u32, U256); 19] = [
    (0x2, q128(6459403834229662010, 18444899583751176498)),
    (0x4, q128(17226890335427755468, 18443055278223354162)),
    (0x8, q128(2032852871939366096, 18439367220385604838)),
    (0x10, q128(14545316742740207172, 18431993317065449817)),
    (0x20, q128(5129152022828963008, 18417254355718160513)),
    (0x40, q128(4894419605888772193, 18387811781193591352)),
    (0x80, q128(1280255884321894483, 18329067761203520168)),
    (0x100, q128(15924666964335305636, 18212142134806087854)),
    (0x200, q128(8010504389359918676, 17980523815641551639)),
    (0x400, q128(10668036004952895731, 17526086738831147013)),
    (0x800, q128(4878133418470705625, 16651378430235024244)),
    (0x1000, q128(9537173718739605541, 15030750278693429944)),
    (0x2000, q128(9972618978014552549, 12247334978882834399)),
    (0x4000, q128(10428997489610666743, 8131365268884726200)),
    (0x8000, q128(9305304367709015974, 3584323654723342297)),
    (0x10000, q128(14301143598189091785, 696457651847595233)),
    (0x20000, q128(7393154844743099908, 26294789957452057)),
    (0x40000, q128(2209338891292245656, 37481735321082)),
    (0x80000, q128(10518117631919034274, 76158723)),
];

/// Calculate sqrt price from tick (TickMath.getSqrtPriceAtTick equivalent)
pub fn get_sqrt_price_at_tick(tick: i32) -> Result<U256> {
    let abs_tick = tick.unsigned_abs();
    if abs_tick > MAX_TICK as u32 {
        return Err(SwapError::TickOutOfRange);
    }

    let mut ratio = if abs_tick & 1 != 0 {
        q128(12262481743371124737, 18445821805675392311)
    } else {
        U256([0, 0, 1, 0])
    };
    for (bit, factor) in TICK_FACTORS.iter() {
        if abs_tick & bit != 0 {
            // both operands < 2^129, the product cannot wrap
            ratio = ratio.overflowing_mul(*factor).0 >> 128;
        }
    }

    if tick > 0 {
        ratio = U256::MAX / ratio;
    }

    let rounding = if ratio.low_u64() & 0xffff_ffff != 0 { U256::one() } else { U256::zero() };
    Ok((ratio >> 32) + rounding)
}

/// Calculate tick from sqrt price: the greatest tick whose sqrt price is `<= sqrt_price_x96`.
/// Binary search over the exact forward function, so both directions always agree.
pub fn get_tick_at_sqrt_price(sqrt_price_x96: U256) -> Result<i32> {
    if sqrt_price_x96 < MIN_SQRT_PRICE || sqrt_price_x96 >= MAX_SQRT_PRICE {
        return Err(SwapError::TickOutOfRange);
    }

    let mut low = MIN_TICK;
    let mut high = MAX_TICK;
    while high - low > 1 {
        let mid = low + (high - low) / 2;
        if get_sqrt_price_at_tick(mid)? <= sqrt_price_x96 {
            low = mid;
        } else {
            high = mid;
        }
    }
    Ok(low)
}

/// Floor `tick` to the spacing grid.
pub fn round_tick_single(tick: i32, tick_spacing: i32) -> i32 {
    let mut compressed = tick / tick_spacing;
    if tick < 0 && tick % tick_spacing != 0 {
        compressed -= 1;
    }
    compressed * tick_spacing
}

/// Returns the grid tick at or below `tick` and the next grid tick above it.
pub fn round_tick(tick: i32, tick_spacing: i32) -> (i32, i32) {
    let rounded = round_tick_single(tick, tick_spacing);
    (rounded, rounded + tick_spacing)
}

/// Snap to the grid, either down (floor) or up (ceiling).
pub fn round_tick_dir(tick: i32, tick_spacing: i32, round_up: bool) -> i32 {
    let floor = round_tick_single(tick, tick_spacing);
    if round_up && floor != tick {
        floor + tick_spacing
    } else {
        floor
    }
}

pub fn min_usable_tick(tick_spacing: i32) -> i32 {
    (MIN_TICK / tick_spacing) * tick_spacing
}

pub fn max_usable_tick(tick_spacing: i32) -> i32 {
    (MAX_TICK / tick_spacing) * tick_spacing
}

/// Convert a WAD-scaled fractional tick count into a grid tick offset from `min_tick`.
pub fn x_wad_to_rounded_tick(x_wad: i128, min_tick: i32, tick_spacing: i32, round_up: bool) -> i32 {
    const WAD: i128 = 1_000_000_000_000_000_000;
    let mut x = x_wad / WAD;
    let rem = x_wad % WAD;
    if round_up && x_wad > 0 && rem != 0 {
        x += 1;
    } else if !round_up && x_wad < 0 && rem != 0 {
        x -= 1;
    }
    (x as i32) * tick_spacing + min_tick
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_sqrt_price_at_tick_bounds() {
        assert_eq!(get_sqrt_price_at_tick(MIN_TICK - 1), Err(SwapError::TickOutOfRange));
        assert_eq!(get_sqrt_price_at_tick(MAX_TICK + 1), Err(SwapError::TickOutOfRange));
        assert_eq!(get_sqrt_price_at_tick(MIN_TICK).unwrap(), MIN_SQRT_PRICE);
        assert_eq!(get_sqrt_price_at_tick(MAX_TICK).unwrap(), MAX_SQRT_PRICE);
    }

    #[test]
    fn test_get_sqrt_price_at_tick_values() {
        assert_eq!(get_sqrt_price_at_tick(0).unwrap(), U256::one() << 96);
        assert_eq!(
            get_sqrt_price_at_tick(MIN_TICK + 1).unwrap(),
            U256::from(4295343490u64),
        );
        assert_eq!(
            get_sqrt_price_at_tick(50).unwrap(),
            U256::from(79426470787362580746886972461u128),
        );
        assert_eq!(
            get_sqrt_price_at_tick(1000).unwrap(),
            U256::from(83290069058676223003182343270u128),
        );
        assert_eq!(
            get_sqrt_price_at_tick(150000).unwrap(),
            U256::from(143194173941309278083010301478497u128),
        );
    }

    #[test]
    fn test_tick_round_trip() {
        for tick in [MIN_TICK, -500_000, -1001, -1, 0, 1, 77, 12_345, 500_000, MAX_TICK - 1] {
            let price = get_sqrt_price_at_tick(tick).unwrap();
            assert_eq!(get_tick_at_sqrt_price(price).unwrap(), tick);
            assert_eq!(get_tick_at_sqrt_price(price + U256::one()).unwrap(), tick);
            if tick > MIN_TICK {
                assert_eq!(get_tick_at_sqrt_price(price - U256::one()).unwrap(), tick - 1);
            }
        }
        assert_eq!(get_tick_at_sqrt_price(MAX_SQRT_PRICE), Err(SwapError::TickOutOfRange));
        assert_eq!(get_tick_at_sqrt_price(MIN_SQRT_PRICE - U256::one()), Err(SwapError::TickOutOfRange));
    }

    #[test]
    fn test_rounding_helpers() {
        assert_eq!(round_tick_single(15, 10), 10);
        assert_eq!(round_tick_single(-15, 10), -20);
        assert_eq!(round_tick_single(-20, 10), -20);
        assert_eq!(round_tick(-1, 10), (-10, 0));
        assert_eq!(round_tick_dir(11, 10, true), 20);
        assert_eq!(round_tick_dir(20, 10, true), 20);
        assert_eq!(min_usable_tick(10), -887270);
        assert_eq!(max_usable_tick(60), 887220);
    }

    #[test]
    fn test_x_wad_to_rounded_tick() {
        const WAD: i128 = 1_000_000_000_000_000_000;
        assert_eq!(x_wad_to_rounded_tick(WAD / 2, 100, 10, false), 100);
        assert_eq!(x_wad_to_rounded_tick(WAD / 2, 100, 10, true), 110);
        assert_eq!(x_wad_to_rounded_tick(-WAD / 2, 100, 10, false), 90);
        assert_eq!(x_wad_to_rounded_tick(-WAD / 2, 100, 10, true), 100);
        assert_eq!(x_wad_to_rounded_tick(3 * WAD, 0, 10, true), 30);
    }
}
