//! Integration tests for quoting through the hook
//!
//! Tests cover:
//! - Quotes leaving state untouched until the delta is committed
//! - Fee conservation between the swapper, the pool and the hook
//! - Exact-input and exact-output quotes agreeing with each other
//! - Snapshot documents surviving a JSON round trip
//! - Batch routing over the snapshot cache

use bunni_v2_sdk::cache::SnapshotCache;
use bunni_v2_sdk::hook::params::HookParams;
use bunni_v2_sdk::hook::vault::{Vault, VaultSharePrices};
use bunni_v2_sdk::hook::{AmAmm, Slot0};
use bunni_v2_sdk::ldf::params::UniformParams;
use bunni_v2_sdk::ldf::{LdfKind, LdfState, LdfType, ShiftMode};
use bunni_v2_sdk::math::{mul_div_up, Q96};
use bunni_v2_sdk::oracle::ObservationStorage;
use bunni_v2_sdk::pools::{Extra, StaticExtra, SNAPSHOT_VERSION};
use bunni_v2_sdk::router::{QuoteRequest, Router};
use bunni_v2_sdk::settings::Quoter;
use bunni_v2_sdk::types::conversions::word_to_hex;
use bunni_v2_sdk::{apply_delta, quote, PoolSnapshot, Registry, SwapError};
use ethers::types::{Address, U256};

const HOOK: Address = Address::repeat_byte(0xbb);
const UNIFORM_LDF: Address = Address::repeat_byte(0x01);

fn registry() -> Registry {
    Registry::new().with_hook(HOOK).with_ldf(UNIFORM_LDF, LdfKind::Uniform)
}

/// A uniform pool over [-100, 100) at price 1 holding `balance` of each token.
fn documents(pool: Address, balance: U256) -> (Extra, StaticExtra) {
    let params = UniformParams { shift_mode: ShiftMode::Static, tick_lower_or_offset: -100, tick_upper_or_offset: 100 };
    let hook_params = HookParams { fee_min: 3_000, fee_max: 3_000, surge_fee_half_life: 60, ..Default::default() };
    let mut observations = ObservationStorage::default();
    let observation_state = observations.initialize(1_000, 0);
    let static_extra = StaticExtra {
        version: SNAPSHOT_VERSION,
        pool,
        hook: HOOK,
        ldf: UNIFORM_LDF,
        hooklet: Address::zero(),
        hooklet_extra: None,
        floor_price_wad: None,
        tick_spacing: 10,
        ldf_type: LdfType::Static,
        ldf_params: word_to_hex(&params.encode()),
        hook_params: format!("0x{}", hex::encode(hook_params.encode())),
        twap_seconds_ago: 0,
        currency0_decimals: 18,
        currency1_decimals: 18,
        raw_token_ratios0: Default::default(),
        raw_token_ratios1: Default::default(),
    };
    let extra = Extra {
        version: SNAPSHOT_VERSION,
        block_timestamp: 2_000,
        slot0: Slot0 { sqrt_price_x96: Q96, tick: 0, last_swap_timestamp: 1_000, last_surge_timestamp: 0 },
        raw_balance0: balance,
        raw_balance1: balance,
        reserve0: U256::zero(),
        reserve1: U256::zero(),
        idle_balance: word_to_hex(&[0u8; 32]),
        ldf_state: word_to_hex(&LdfState::Uninitialized.encode()),
        observation_state,
        observations,
        vaults: [Vault::default(); 2],
        vault_share_prices: VaultSharePrices::default(),
        pool_manager_reserves: [U256::zero(); 2],
        am_amm: AmAmm::default(),
        hook_fee_modifier: 0,
        curator_fee_rate: 0,
        rebalance_order_deadline: 0,
    };
    (extra, static_extra)
}

fn snapshot(pool: Address, balance: U256) -> PoolSnapshot {
    let (extra, static_extra) = documents(pool, balance);
    PoolSnapshot::from_documents(extra, static_extra, &registry()).unwrap()
}

fn quoter(max_candidate_pools: usize) -> Quoter {
    Quoter { max_candidate_pools, block_timestamp: 0, parallel_threshold: 1 }
}

/// Quoting is pure; committing the delta moves price, balances and the oracle
#[test]
fn test_quote_is_pure_until_delta_committed() {
    let pool = snapshot(Address::repeat_byte(0x11), U256::exp10(18));
    let amount = U256::exp10(16);

    let first = quote(true, true, amount, &pool.state).unwrap();
    let again = quote(true, true, amount, &pool.state).unwrap();
    assert_eq!(first, again);
    assert_eq!(pool.state.slot0.sqrt_price_x96, Q96);

    let next = apply_delta(&pool.state, &first.info);
    assert_eq!(next.slot0.sqrt_price_x96, first.sqrt_price_x96_after);
    assert_eq!(next.slot0.tick, first.tick_after);
    assert!(next.slot0.sqrt_price_x96 < Q96);
    assert_eq!(next.bunni_state.raw_balance0, U256::exp10(18) + first.amount_in);
    assert_eq!(next.observation_state.intermediate.block_timestamp, 2_000);
    assert_eq!(pool.state.observation_state.intermediate.block_timestamp, 1_000);

    // same trade after the first one lands gets a worse price
    let second = quote(true, true, amount, &next).unwrap();
    assert!(second.amount_out < first.amount_out);
}

/// Exact-in fees are charged on the gross output and split without creating or losing units
#[test]
fn test_exact_in_fee_conservation() {
    let mut pool = snapshot(Address::repeat_byte(0x12), U256::exp10(18));
    pool.state.hook_fee_modifier = 100_000;
    pool.state.curator_fee_rate = 1_000;
    let balance1 = pool.state.bunni_state.raw_balance1;

    let result = pool.state.quote(true, true, U256::exp10(15)).unwrap();
    let fees = result.fees;
    assert_eq!(fees.swap_fee, U256::from(3_000u64));
    assert!(!fees.hook_fee_amount.is_zero());
    assert!(!fees.curator_fee_amount.is_zero());

    let gross = result.amount_out + fees.total();
    assert_eq!(fees.total(), mul_div_up(gross, fees.swap_fee, U256::from(1_000_000u64)).unwrap());

    // hook and curator shares leave the pool with the swapper's output; the LP share stays
    pool.state.apply(&result.info);
    assert_eq!(
        pool.state.bunni_state.raw_balance1,
        balance1 - result.amount_out - fees.hook_fee_amount - fees.curator_fee_amount
    );
}

/// Exact-out fees are charged on the input; the pool keeps only the LP share of them
#[test]
fn test_exact_out_fee_conservation() {
    let mut pool = snapshot(Address::repeat_byte(0x15), U256::exp10(18));
    pool.state.hook_fee_modifier = 100_000;
    pool.state.curator_fee_rate = 1_000;
    let (balance0, balance1) = (pool.state.bunni_state.raw_balance0, pool.state.bunni_state.raw_balance1);

    let amount_out = U256::exp10(15);
    let result = pool.state.quote(false, false, amount_out).unwrap();
    let fees = result.fees;
    assert_eq!(result.amount_out, amount_out);
    assert!(!fees.hook_fee_amount.is_zero());
    assert!(!fees.curator_fee_amount.is_zero());

    pool.state.apply(&result.info);
    assert_eq!(pool.state.bunni_state.raw_balance0, balance0 - amount_out);
    assert_eq!(
        pool.state.bunni_state.raw_balance1,
        balance1 + result.amount_in - fees.hook_fee_amount - fees.curator_fee_amount
    );
}

/// Asking for the output of an exact-in quote costs about the same input
#[test]
fn test_exact_out_inverts_exact_in() {
    let pool = snapshot(Address::repeat_byte(0x13), U256::exp10(18));
    let amount_in = U256::exp10(16);
    let exact_in = pool.state.quote(false, true, amount_in).unwrap();
    let exact_out = pool.state.quote(false, false, exact_in.amount_out).unwrap();

    assert_eq!(exact_out.amount_out, exact_in.amount_out);
    // exact-in charges the fee on output, exact-out on input; on a price-1 pool they part by
    // about amount_in^2 * fee / liquidity, well under amount_in / 1e6 here
    let tolerance = amount_in / U256::from(1_000_000u64);
    let diff = if exact_out.amount_in > amount_in { exact_out.amount_in - amount_in } else { amount_in - exact_out.amount_in };
    assert!(diff <= tolerance, "exact-out input {} vs exact-in {}", exact_out.amount_in, amount_in);
}

/// A snapshot written back to JSON decodes to a pool that quotes identically
#[test]
fn test_json_round_trip_quotes_identically() {
    let pool = snapshot(Address::repeat_byte(0x14), U256::exp10(18));
    let (extra, static_extra) = pool.to_json().unwrap();
    let reloaded = PoolSnapshot::from_json(&extra, &static_extra, &registry()).unwrap();

    let amount = U256::exp10(15);
    assert_eq!(pool.state.quote(true, false, amount).unwrap(), reloaded.state.quote(true, false, amount).unwrap());

    let unknown_hook = static_extra.replace(&format!("{:?}", HOOK), &format!("{:?}", Address::repeat_byte(0xcc)));
    assert!(matches!(
        PoolSnapshot::from_json(&extra, &unknown_hook, &registry()),
        Err(SwapError::UnknownAddress(_))
    ));
}

/// The deeper pool wins both directions; unknown pools are reported, not fatal
#[test]
fn test_router_picks_best_pool() {
    let shallow = Address::repeat_byte(0x21);
    let deep = Address::repeat_byte(0x22);
    let missing = Address::repeat_byte(0x23);
    let cache = SnapshotCache::new(16);
    cache.insert(snapshot(shallow, U256::exp10(18)));
    cache.insert(snapshot(deep, U256::exp10(20)));
    let router = Router::new(cache, quoter(64));

    let amount = U256::exp10(16);
    let requests = vec![
        QuoteRequest { pools: vec![shallow, deep, missing], zero_for_one: true, exact_in: true, amount_specified: amount },
        QuoteRequest { pools: vec![shallow, deep], zero_for_one: false, exact_in: false, amount_specified: amount },
    ];
    let outcomes = router.quote_batch(&requests);
    assert_eq!(outcomes.len(), 2);

    let best = outcomes[0].best.as_ref().expect("exact-in quote");
    assert_eq!(best.pool, deep);
    assert_eq!(outcomes[0].failures, vec![(missing, SwapError::UnknownAddress(missing))]);

    let best = outcomes[1].best.as_ref().expect("exact-out quote");
    assert_eq!(best.pool, deep);
    assert_eq!(best.result.amount_out, amount);
    assert!(outcomes[1].failures.is_empty());
}

/// Candidates past the cap are never quoted
#[test]
fn test_router_caps_candidates() {
    let shallow = Address::repeat_byte(0x31);
    let deep = Address::repeat_byte(0x32);
    let cache = SnapshotCache::new(16);
    cache.insert(snapshot(shallow, U256::exp10(18)));
    cache.insert(snapshot(deep, U256::exp10(20)));
    let router = Router::new(cache, quoter(1));

    let request = QuoteRequest { pools: vec![shallow, deep], zero_for_one: true, exact_in: true, amount_specified: U256::exp10(16) };
    let outcome = router.quote_request(&request);
    assert_eq!(outcome.best.map(|q| q.pool), Some(shallow));
}

/// Committing a routed quote through the cache changes what the next request sees
#[test]
fn test_commit_through_cache_moves_next_quote() {
    let pool = Address::repeat_byte(0x41);
    let cache = SnapshotCache::new(16);
    cache.insert(snapshot(pool, U256::exp10(18)));
    let router = Router::new(cache, quoter(64));

    let request = QuoteRequest { pools: vec![pool], zero_for_one: true, exact_in: true, amount_specified: U256::exp10(16) };
    let first = router.quote_request(&request).best.expect("quote");
    router.cache().commit(&pool, &first.result.info).unwrap();

    let second = router.quote_request(&request).best.expect("quote");
    assert!(second.result.amount_out < first.result.amount_out);
    assert_eq!(router.cache().snapshot(&pool).unwrap().state.slot0.sqrt_price_x96, first.result.sqrt_price_x96_after);
}
