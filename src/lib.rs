//! # Bunni v2 SDK
//!
//! Off-chain swap quoting for Bunni v2 pools: Uniswap v4 pools whose liquidity is shaped by a
//! liquidity density function (LDF) and managed by the Bunni hook.
//!
//! ## Overview
//!
//! The SDK reproduces the hook's swap path with the same fixed-point arithmetic the contracts use,
//! so quotes match on-chain execution to the unit. It covers:
//!
//! - **Math**: 256/512-bit mul-div with explicit rounding, tick and sqrt-price conversion
//! - **LDFs**: uniform, geometric, double geometric, carpeted, buy-the-dip and oracle-anchored shapes
//! - **Oracle**: truncated TWAP oracle over a wrapping observation ring
//! - **Hook**: dynamic and surge fees, am-AMM overrides, vault settlement, rebalance triggers
//!
//! ## Quoting model
//!
//! A quote never mutates pool state. [`hook::quote`] returns a [`hook::SwapResult`] whose `info`
//! field is a delta; the caller commits it with [`hook::apply_delta`] (or
//! [`cache::SnapshotCache::commit`]) once the swap is known to have happened.

// Core
/// Fixed-point and tick math
pub mod math;
/// Liquidity density functions
pub mod ldf;
/// TWAP oracle
pub mod oracle;
/// Swap computation against an LDF
pub mod swap_engine;
/// Swap fee model
pub mod fees;
/// Hook state machine
pub mod hook;

// Edges
/// Address registry for hooks, LDFs and hooklets
pub mod registry;
/// Versioned JSON pool snapshots
pub mod pools;
/// Concurrent snapshot cache
pub mod cache;
/// Batch quoting across pools
pub mod router;
/// Storage-word codecs
pub mod types;

// Infrastructure
/// Error types
pub mod error;
/// Metrics and observability
pub mod metrics;
/// Configuration management
pub mod settings;

// Re-exports for convenience
pub use cache::SnapshotCache;
pub use error::{Result, SwapError};
pub use hook::{apply_delta, quote, HookState, SwapInfo, SwapResult};
pub use ldf::Ldf;
pub use pools::PoolSnapshot;
pub use registry::Registry;
pub use router::Router;
pub use settings::Settings;
