//! # Quote Pool
//!
//! Loads one pool snapshot (`extra` + `static extra` JSON documents) and a registry file, quotes a
//! single swap and prints the result as JSON.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin quote_pool -- \
//!     --registry registry.json --extra extra.json --static-extra static.json \
//!     --zero-for-one --amount 1000000000000000000
//! ```

use anyhow::{Context, Result};
use bunni_v2_sdk::{metrics, PoolSnapshot, Registry, Settings};
use clap::Parser;
use ethers::types::U256;
use log::info;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "quote_pool")]
#[command(about = "Quote a swap against a Bunni v2 pool snapshot", long_about = None)]
#[command(version)]
struct Cli {
    /// Registry JSON (hooks, LDFs, hooklets)
    #[arg(long)]
    registry: PathBuf,

    /// Runtime state document
    #[arg(long)]
    extra: PathBuf,

    /// Static configuration document
    #[arg(long)]
    static_extra: PathBuf,

    /// Sell token0 for token1 (default: token1 for token0)
    #[arg(long)]
    zero_for_one: bool,

    /// Treat the amount as the exact output instead of the exact input
    #[arg(long)]
    exact_out: bool,

    /// Amount in token base units
    #[arg(long)]
    amount: String,

    /// Evaluate at this block timestamp instead of the snapshot's
    #[arg(long)]
    block_timestamp: Option<u32>,
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    let settings = Settings::new().context("loading settings")?;

    #[cfg(feature = "observability")]
    let _prometheus = metrics::init_observability(&settings.logging)?;
    #[cfg(not(feature = "observability"))]
    {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(settings.logging.level.as_str()))
            .init();
        metrics::describe_metrics();
    }

    let registry_json = fs::read_to_string(&cli.registry)
        .with_context(|| format!("reading registry {}", cli.registry.display()))?;
    let extra = fs::read_to_string(&cli.extra).with_context(|| format!("reading {}", cli.extra.display()))?;
    let static_extra =
        fs::read_to_string(&cli.static_extra).with_context(|| format!("reading {}", cli.static_extra.display()))?;

    let registry = Registry::from_json(&registry_json).context("parsing registry")?;
    let mut snapshot = PoolSnapshot::from_json(&extra, &static_extra, &registry).context("decoding snapshot")?;

    if let Some(ts) = cli.block_timestamp {
        snapshot.state.block_timestamp = ts;
    } else if settings.quoter.block_timestamp != 0 {
        snapshot.state.block_timestamp = settings.quoter.block_timestamp;
    }

    let amount = U256::from_dec_str(cli.amount.trim()).with_context(|| format!("invalid amount {:?}", cli.amount))?;
    info!(
        "quoting pool {:?}: zero_for_one={} exact_in={} amount={}",
        snapshot.address(),
        cli.zero_for_one,
        !cli.exact_out,
        amount
    );

    let result = snapshot.state.quote(cli.zero_for_one, !cli.exact_out, amount).context("quote failed")?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
