use ethers::types::{I256, U256};

use crate::error::{Result, SwapError};
use crate::hook::idle_balance::IdleBalance;
use crate::hook::vault::VaultSharePrices;
use crate::oracle::{Observation, ObservationState};

// Big-endian field access for packed parameter words

pub fn read_u8(word: &[u8], offset: usize) -> u8 {
    word[offset]
}

pub fn read_uint(word: &[u8], offset: usize, len: usize) -> u64 {
    word[offset..offset + len].iter().fold(0u64, |acc, b| (acc << 8) | *b as u64)
}

pub fn write_uint(word: &mut [u8], offset: usize, len: usize, value: u64) {
    for i in 0..len {
        word[offset + len - 1 - i] = (value >> (8 * i)) as u8;
    }
}

/// Sign-extend the low `bits` of `value`.
pub fn sign_extend(value: u64, bits: u32) -> i64 {
    let shift = 64 - bits;
    ((value << shift) as i64) >> shift
}

pub fn read_i24(word: &[u8], offset: usize) -> i32 {
    sign_extend(read_uint(word, offset, 3), 24) as i32
}

pub fn read_i16(word: &[u8], offset: usize) -> i32 {
    sign_extend(read_uint(word, offset, 2), 16) as i32
}

pub fn read_u16(word: &[u8], offset: usize) -> u16 {
    read_uint(word, offset, 2) as u16
}

pub fn read_u24(word: &[u8], offset: usize) -> u32 {
    read_uint(word, offset, 3) as u32
}

pub fn read_u32(word: &[u8], offset: usize) -> u32 {
    read_uint(word, offset, 4) as u32
}

pub fn write_u8(word: &mut [u8], offset: usize, value: u8) {
    word[offset] = value;
}

pub fn write_i24(word: &mut [u8], offset: usize, value: i32) {
    write_uint(word, offset, 3, (value as u32 & 0x00ff_ffff) as u64);
}

pub fn write_i16(word: &mut [u8], offset: usize, value: i32) {
    write_uint(word, offset, 2, (value as u32 & 0xffff) as u64);
}

pub fn write_u32(word: &mut [u8], offset: usize, value: u32) {
    write_uint(word, offset, 4, value as u64);
}

// Hex words at the JSON edge

pub fn word_from_hex(s: &str) -> Result<[u8; 32]> {
    let raw = hex::decode(s.trim_start_matches("0x"))?;
    if raw.len() > 32 {
        return Err(SwapError::Decode(format!("word longer than 32 bytes: {}", raw.len())));
    }
    // shorter input is left-padded like an ABI word
    let mut word = [0u8; 32];
    word[32 - raw.len()..].copy_from_slice(&raw);
    Ok(word)
}

pub fn word_to_hex(word: &[u8; 32]) -> String {
    format!("0x{}", hex::encode(word))
}

// Storage slots (low bits first)

fn bits(word: U256, offset: usize, width: usize) -> u64 {
    debug_assert!(width <= 64);
    let mask = if width == 64 { u64::MAX } else { (1u64 << width) - 1 };
    (word >> offset).low_u64() & mask
}

/// `| blockTimestamp u32 | prevTick i24 | tickCumulative i56 | initialized bool |`
pub fn decode_observation_word(word: U256) -> Observation {
    Observation {
        block_timestamp: bits(word, 0, 32) as u32,
        prev_tick: sign_extend(bits(word, 32, 24), 24) as i32,
        tick_cumulative: sign_extend(bits(word, 56, 56), 56),
        initialized: bits(word, 112, 8) != 0,
    }
}

pub fn encode_observation_word(obs: &Observation) -> U256 {
    let mut word = U256::from(obs.block_timestamp);
    word |= U256::from(obs.prev_tick as u32 & 0x00ff_ffff) << 32;
    word |= U256::from(obs.tick_cumulative as u64 & 0x00ff_ffff_ffff_ffff) << 56;
    word |= U256::from(obs.initialized as u8) << 112;
    word
}

/// Slot 0: `| index u32 | cardinality u32 | cardinalityNext u32 |`, slot 1: the intermediate observation.
pub fn decode_observation_state(slot0: U256, slot1: U256) -> ObservationState {
    ObservationState {
        index: bits(slot0, 0, 32) as u32,
        cardinality: bits(slot0, 32, 32) as u32,
        cardinality_next: bits(slot0, 64, 32) as u32,
        intermediate: decode_observation_word(slot1),
    }
}

/// `| initialized u8 | sharePrice0 u120 | sharePrice1 u120 |`
pub fn decode_vault_share_prices(word: U256) -> VaultSharePrices {
    let mask120 = (U256::one() << 120) - U256::one();
    VaultSharePrices {
        initialized: bits(word, 0, 8) != 0,
        share_price0: (word >> 8) & mask120,
        share_price1: (word >> 128) & mask120,
    }
}

pub fn encode_vault_share_prices(prices: &VaultSharePrices) -> Result<U256> {
    let mask120 = (U256::one() << 120) - U256::one();
    if prices.share_price0 > mask120 || prices.share_price1 > mask120 {
        return Err(SwapError::Overflow);
    }
    Ok(U256::from(prices.initialized as u8) | (prices.share_price0 << 8) | (prices.share_price1 << 128))
}

/// Curator fee rate, low 16 bits.
pub fn decode_curator_fee_rate(word: U256) -> u32 {
    bits(word, 0, 16) as u32
}

/// Hook fee modifier, low 32 bits.
pub fn decode_hook_fee_modifier(word: U256) -> u32 {
    bits(word, 0, 32) as u32
}

/// am-AMM manager payload: `| swapFee0For1 3 | swapFee1For0 3 |` (big-endian).
pub fn decode_am_amm_payload(payload: &[u8]) -> Result<(u32, u32)> {
    if payload.len() < 6 {
        return Err(SwapError::Decode(format!("am-AMM payload too short: {}", payload.len())));
    }
    Ok((read_u24(payload, 0), read_u24(payload, 3)))
}

/// Idle balance word: amount in the low 255 bits, top bit set when the balance is token1.
pub fn decode_idle_balance(word: &[u8; 32]) -> IdleBalance {
    let mut raw = *word;
    let is_token0 = raw[0] & 0x80 == 0;
    raw[0] &= 0x7f;
    IdleBalance { amount: U256::from_big_endian(&raw), is_token0 }
}

pub fn encode_idle_balance(idle: &IdleBalance) -> Result<[u8; 32]> {
    if idle.amount.bit(255) {
        return Err(SwapError::Overflow);
    }
    let mut word = [0u8; 32];
    idle.amount.to_big_endian(&mut word);
    if !idle.is_token0 {
        word[0] |= 0x80;
    }
    Ok(word)
}

// Tick values arriving as ABI int256
pub fn i256_to_i32(value: I256) -> Result<i32> {
    let as_i128 = i128::try_from(value).map_err(|_| SwapError::Overflow)?;
    i32::try_from(as_i128).map_err(|_| SwapError::Overflow)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_extension() {
        assert_eq!(sign_extend(0x800000, 24), -8_388_608);
        assert_eq!(sign_extend(0x7fffff, 24), 8_388_607);
        assert_eq!(sign_extend(0xffff, 16), -1);
        let mut word = [0u8; 32];
        write_i24(&mut word, 5, -887_272);
        assert_eq!(read_i24(&word, 5), -887_272);
        write_i16(&mut word, 9, -2);
        assert_eq!(&word[9..11], &[0xff, 0xfe]);
    }

    #[test]
    fn test_observation_word() {
        let obs = Observation { block_timestamp: 1_700_000_000, prev_tick: -42, tick_cumulative: -9_876_543_210, initialized: true };
        let word = encode_observation_word(&obs);
        assert_eq!(decode_observation_word(word), obs);
    }

    #[test]
    fn test_idle_balance_tag() {
        let idle = IdleBalance { amount: U256::from(12345u64), is_token0: false };
        let word = encode_idle_balance(&idle).unwrap();
        assert_eq!(word[0], 0x80);
        assert_eq!(decode_idle_balance(&word), idle);
        let zero = decode_idle_balance(&[0u8; 32]);
        assert!(zero.is_token0 && zero.amount.is_zero());
    }

    #[test]
    fn test_vault_share_prices_word() {
        let prices = VaultSharePrices {
            initialized: true,
            share_price0: U256::exp10(18),
            share_price1: U256::exp10(30),
        };
        let word = encode_vault_share_prices(&prices).unwrap();
        assert_eq!(decode_vault_share_prices(word), prices);
    }

    #[test]
    fn test_hex_words() {
        let word = word_from_hex("0x0102").unwrap();
        assert_eq!(word[30], 1);
        assert_eq!(word[31], 2);
        assert_eq!(word_from_hex(&word_to_hex(&word)).unwrap(), word);
        assert!(word_from_hex("zz").is_err());
    }

    #[test]
    fn test_am_amm_payload() {
        let payload = [0x00, 0x0b, 0xb8, 0x00, 0x01, 0xf4];
        assert_eq!(decode_am_amm_payload(&payload).unwrap(), (3000, 500));
    }
}
