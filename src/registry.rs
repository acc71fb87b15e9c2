//! Address book for hooks, LDFs and hooklets.
//!
//! Built once at startup (from code or a JSON file) and passed by reference wherever snapshots are
//! decoded. Nothing is registered implicitly.

use std::collections::HashMap;
use std::sync::Arc;

use ethers::types::{Address, U256};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SwapError};
use crate::hook::hooklet::{FeeOverrideHooklet, Hooklet, NoopHooklet};
use crate::ldf::{CustomLdf, Ldf, LdfKind};

/// Hooklet implementations the registry can build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookletKind {
    Noop,
    FeeOverride,
}

/// Serializable form of a [`Registry`], minus custom LDFs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryConfig {
    #[serde(default)]
    pub hooks: Vec<Address>,
    #[serde(default)]
    pub ldfs: HashMap<Address, LdfKind>,
    #[serde(default)]
    pub hooklets: HashMap<Address, HookletKind>,
}

#[derive(Debug, Clone, Default)]
pub struct Registry {
    hooks: Vec<Address>,
    ldfs: HashMap<Address, LdfKind>,
    custom_ldfs: HashMap<Address, Arc<dyn CustomLdf>>,
    hooklets: HashMap<Address, HookletKind>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: RegistryConfig) -> Self {
        Self { hooks: config.hooks, ldfs: config.ldfs, custom_ldfs: HashMap::new(), hooklets: config.hooklets }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: RegistryConfig = serde_json::from_str(json)?;
        Ok(Self::from_config(config))
    }

    pub fn with_hook(mut self, hook: Address) -> Self {
        if !self.hooks.contains(&hook) {
            self.hooks.push(hook);
        }
        self
    }

    /// Register a built-in distribution. `LdfKind::Custom` needs [`with_custom_ldf`](Self::with_custom_ldf).
    pub fn with_ldf(mut self, address: Address, kind: LdfKind) -> Self {
        self.ldfs.insert(address, kind);
        self
    }

    pub fn with_custom_ldf(mut self, address: Address, ldf: Arc<dyn CustomLdf>) -> Self {
        self.ldfs.insert(address, LdfKind::Custom);
        self.custom_ldfs.insert(address, ldf);
        self
    }

    pub fn with_hooklet(mut self, address: Address, kind: HookletKind) -> Self {
        self.hooklets.insert(address, kind);
        self
    }

    pub fn is_known_hook(&self, hook: &Address) -> bool {
        self.hooks.contains(hook)
    }

    pub fn ensure_hook(&self, hook: &Address) -> Result<()> {
        if self.is_known_hook(hook) {
            return Ok(());
        }
        warn!("unknown hook {:?}", hook);
        Err(SwapError::UnknownAddress(*hook))
    }

    pub fn ldf_kind(&self, address: &Address) -> Option<LdfKind> {
        self.ldfs.get(address).copied()
    }

    /// Build the distribution registered at `address`. The floor price only matters for the
    /// oracle-anchored kind.
    pub fn resolve_ldf(&self, address: &Address, floor_price_wad: Option<U256>) -> Result<Ldf> {
        let kind = self.ldf_kind(address).ok_or_else(|| {
            warn!("unknown LDF {:?}", address);
            SwapError::UnknownAddress(*address)
        })?;
        Ok(match kind {
            LdfKind::Uniform => Ldf::Uniform,
            LdfKind::Geometric => Ldf::Geometric,
            LdfKind::DoubleGeometric => Ldf::DoubleGeometric,
            LdfKind::CarpetedGeometric => Ldf::CarpetedGeometric,
            LdfKind::CarpetedDoubleGeometric => Ldf::CarpetedDoubleGeometric,
            LdfKind::BuyTheDipGeometric => Ldf::BuyTheDipGeometric,
            LdfKind::OracleUniGeo => Ldf::OracleUniGeo {
                floor_price_wad: floor_price_wad
                    .ok_or_else(|| SwapError::InvalidParams("oracle LDF without floor price".to_string()))?,
            },
            LdfKind::Custom => Ldf::Custom(
                self.custom_ldfs.get(address).cloned().ok_or(SwapError::UnknownAddress(*address))?,
            ),
        })
    }

    /// Build the hooklet at `address`. The zero address means no hooklet.
    pub fn resolve_hooklet(&self, address: &Address, extra: Option<&serde_json::Value>) -> Result<Arc<dyn Hooklet>> {
        if address.is_zero() {
            return Ok(Arc::new(NoopHooklet));
        }
        let kind = self.hooklets.get(address).copied().ok_or_else(|| {
            warn!("unknown hooklet {:?}", address);
            SwapError::UnknownAddress(*address)
        })?;
        Ok(match kind {
            HookletKind::Noop => Arc::new(NoopHooklet),
            HookletKind::FeeOverride => {
                let config = match extra {
                    Some(value) => FeeOverrideHooklet::deserialize(value)?,
                    None => FeeOverrideHooklet::default(),
                };
                Arc::new(config)
            }
        })
    }

    pub fn hooklet_kind(&self, address: &Address) -> Option<HookletKind> {
        self.hooklets.get(address).copied()
    }

    pub fn to_config(&self) -> RegistryConfig {
        RegistryConfig { hooks: self.hooks.clone(), ldfs: self.ldfs.clone(), hooklets: self.hooklets.clone() }
    }
}
