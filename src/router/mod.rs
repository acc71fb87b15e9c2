//! # Router Module
//!
//! Batch quoting over cached pools. Every request is quoted against each of its candidate pools on
//! a cloned snapshot; pools that fail are dropped from that request's candidate set and the best
//! remaining quote wins.

use ethers::prelude::Address;
use ethers::types::U256;
use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug_span;

use crate::cache::SnapshotCache;
use crate::error::SwapError;
use crate::hook::SwapResult;
use crate::settings::Quoter;

/// One swap to price across a set of candidate pools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    pub pools: Vec<Address>,
    pub zero_for_one: bool,
    pub exact_in: bool,
    pub amount_specified: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolQuote {
    pub pool: Address,
    pub result: SwapResult,
}

/// Best quote for a request and the pools that could not quote it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QuoteOutcome {
    pub best: Option<PoolQuote>,
    pub failures: Vec<(Address, SwapError)>,
}

impl QuoteOutcome {
    fn from_quotes(exact_in: bool, quotes: Vec<(Address, Result<SwapResult, SwapError>)>) -> Self {
        let mut outcome = QuoteOutcome::default();
        for (pool, quote) in quotes {
            match quote {
                Ok(result) => {
                    let better = match &outcome.best {
                        None => true,
                        // more out for exact-in, less in for exact-out
                        Some(best) if exact_in => result.amount_out > best.result.amount_out,
                        Some(best) => result.amount_in < best.result.amount_in,
                    };
                    if better {
                        outcome.best = Some(PoolQuote { pool, result });
                    }
                }
                Err(e) => outcome.failures.push((pool, e)),
            }
        }
        outcome
    }
}

#[derive(Debug, Clone)]
pub struct Router {
    cache: SnapshotCache,
    settings: Quoter,
}

impl Router {
    pub fn new(cache: SnapshotCache, settings: Quoter) -> Self {
        Self { cache, settings }
    }

    pub fn cache(&self) -> &SnapshotCache {
        &self.cache
    }

    /// Quote every request in parallel. Output order matches `requests`.
    pub fn quote_batch(&self, requests: &[QuoteRequest]) -> Vec<QuoteOutcome> {
        let span = debug_span!("quote_batch", requests = requests.len());
        let _guard = span.enter();
        requests.par_iter().map(|request| self.quote_request(request)).collect()
    }

    pub fn quote_request(&self, request: &QuoteRequest) -> QuoteOutcome {
        let candidates = &request.pools[..request.pools.len().min(self.settings.max_candidate_pools)];
        if candidates.len() < request.pools.len() {
            debug!("dropping {} candidate pools over the cap", request.pools.len() - candidates.len());
        }
        let quote_one = |pool: &Address| (*pool, self.quote_pool(pool, request));
        let quotes: Vec<_> = if candidates.len() < self.settings.parallel_threshold {
            candidates.iter().map(quote_one).collect()
        } else {
            candidates.par_iter().map(quote_one).collect()
        };
        QuoteOutcome::from_quotes(request.exact_in, quotes)
    }

    fn quote_pool(&self, pool: &Address, request: &QuoteRequest) -> Result<SwapResult, SwapError> {
        let mut snapshot = self.cache.snapshot(pool).ok_or(SwapError::UnknownAddress(*pool))?;
        if self.settings.block_timestamp != 0 {
            snapshot.state.block_timestamp = self.settings.block_timestamp;
        }
        snapshot.state.quote(request.zero_for_one, request.exact_in, request.amount_specified)
    }
}
