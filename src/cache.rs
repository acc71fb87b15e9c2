use crate::error::{Result, SwapError};
use crate::hook::SwapInfo;
use crate::metrics;
use crate::pools::PoolSnapshot;
use dashmap::DashMap;
use ethers::prelude::Address;
use log::debug;
use std::sync::Arc;

/// Committed pool snapshots, shared across quoting threads.
///
/// Reads clone a snapshot out so quotes never hold a shard lock; commits apply a delta under the
/// entry lock, which serializes writers per pool.
#[derive(Debug, Clone)]
pub struct SnapshotCache {
    pools: Arc<DashMap<Address, PoolSnapshot>>,
    max_size: usize,
}

impl SnapshotCache {
    pub fn new(max_size: usize) -> Self {
        Self { pools: Arc::new(DashMap::new()), max_size }
    }

    pub fn from_settings(settings: &crate::settings::Settings) -> Self {
        Self::new(settings.cache.max_pools)
    }

    pub fn insert(&self, snapshot: PoolSnapshot) {
        self.pools.insert(snapshot.address(), snapshot);
        self.maybe_evict();
        metrics::set_cache_size(self.pools.len() as f64);
    }

    pub fn snapshot(&self, address: &Address) -> Option<PoolSnapshot> {
        match self.pools.get(address) {
            Some(entry) => {
                metrics::increment_cache_hit();
                Some(entry.value().clone())
            }
            None => {
                metrics::increment_cache_miss();
                None
            }
        }
    }

    /// Apply `delta` to the cached pool. Fails if the pool is not cached.
    pub fn commit(&self, address: &Address, delta: &SwapInfo) -> Result<()> {
        let mut entry = self.pools.get_mut(address).ok_or(SwapError::UnknownAddress(*address))?;
        entry.state.apply(delta);
        Ok(())
    }

    pub fn remove(&self, address: &Address) -> Option<PoolSnapshot> {
        self.pools.remove(address).map(|(_, snapshot)| snapshot)
    }

    pub fn addresses(&self) -> Vec<Address> {
        self.pools.iter().map(|entry| *entry.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    // Drops arbitrary entries down to the cap; callers re-insert what they still need
    fn maybe_evict(&self) {
        if self.pools.len() <= self.max_size {
            return;
        }
        let to_remove = self.pools.len() - self.max_size;
        let victims: Vec<Address> = self.pools.iter().take(to_remove).map(|entry| *entry.key()).collect();
        for address in &victims {
            self.pools.remove(address);
        }
        debug!("evicted {} snapshots (size: {})", victims.len(), self.pools.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hook::hooklet::NoopHooklet;
    use crate::hook::params::HookParams;
    use crate::hook::vault::{Vault, VaultSharePrices};
    use crate::hook::{AmAmm, BunniState, HookState, Slot0};
    use crate::ldf::params::UniformParams;
    use crate::ldf::{Ldf, LdfState, LdfType, ShiftMode};
    use crate::math::Q96;
    use crate::oracle::ObservationStorage;
    use crate::pools::{StaticExtra, SNAPSHOT_VERSION};
    use crate::types::conversions::word_to_hex;
    use ethers::types::U256;

    fn snapshot(pool: Address) -> PoolSnapshot {
        let params = UniformParams { shift_mode: ShiftMode::Static, tick_lower_or_offset: -100, tick_upper_or_offset: 100 };
        let mut observations = ObservationStorage::default();
        let observation_state = observations.initialize(1_000, 0);
        PoolSnapshot {
            static_extra: StaticExtra {
                version: SNAPSHOT_VERSION,
                pool,
                hook: Address::zero(),
                ldf: Address::zero(),
                hooklet: Address::zero(),
                hooklet_extra: None,
                floor_price_wad: None,
                tick_spacing: 10,
                ldf_type: LdfType::Static,
                ldf_params: word_to_hex(&params.encode()),
                hook_params: String::new(),
                twap_seconds_ago: 0,
                currency0_decimals: 18,
                currency1_decimals: 18,
                raw_token_ratios0: Default::default(),
                raw_token_ratios1: Default::default(),
            },
            state: HookState {
                tick_spacing: 10,
                slot0: Slot0 { sqrt_price_x96: Q96, tick: 0, last_swap_timestamp: 1_000, last_surge_timestamp: 0 },
                bunni_state: BunniState {
                    raw_balance0: U256::exp10(18),
                    raw_balance1: U256::exp10(18),
                    ldf_params: params.encode(),
                    currency0_decimals: 18,
                    currency1_decimals: 18,
                    ..Default::default()
                },
                ldf: Ldf::Uniform,
                ldf_state: LdfState::Uninitialized,
                hook_params: HookParams { fee_min: 500, fee_max: 500, surge_fee_half_life: 60, ..Default::default() },
                observation_state,
                observations: Arc::new(observations),
                vaults: [Vault::default(); 2],
                vault_share_prices: VaultSharePrices::default(),
                pool_manager_reserves: [U256::zero(); 2],
                am_amm: AmAmm::default(),
                hook_fee_modifier: 0,
                curator_fee_rate: 0,
                rebalance_order_deadline: 0,
                block_timestamp: 2_000,
                hooklet: Arc::new(NoopHooklet),
            },
        }
    }

    #[test]
    fn test_quote_then_commit() {
        let cache = SnapshotCache::new(10);
        let pool = Address::repeat_byte(0x10);
        cache.insert(snapshot(pool));

        let before = cache.snapshot(&pool).unwrap();
        let result = before.state.quote(true, true, U256::exp10(15)).unwrap();
        // quoting a clone leaves the cache alone
        assert_eq!(cache.snapshot(&pool).unwrap().state.slot0, before.state.slot0);

        cache.commit(&pool, &result.info).unwrap();
        let after = cache.snapshot(&pool).unwrap();
        assert_eq!(after.state.slot0.sqrt_price_x96, result.sqrt_price_x96_after);
        assert!(cache.commit(&Address::repeat_byte(0x99), &result.info).is_err());
    }

    #[test]
    fn test_eviction_caps_size() {
        let cache = SnapshotCache::new(3);
        for i in 0..5u8 {
            cache.insert(snapshot(Address::repeat_byte(i + 1)));
        }
        assert_eq!(cache.len(), 3);
        assert!(cache.snapshot(&Address::repeat_byte(0x42)).is_none());
    }
}
