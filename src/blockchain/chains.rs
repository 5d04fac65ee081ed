// src/blockchain/chains.rs

//! Registry of the chains the server can talk to.
//!
//! Built-in chains are fixed at construction; custom chains can be added,
//! updated and removed at runtime. Lookups never fail, mutations validate
//! their input completely before touching the registry.

use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::info;
use url::Url;

use crate::blockchain::error::{EffectError, EffectResult};
use crate::blockchain::models::{Chain, ChainUpdate, NativeCurrency};

pub const MAINNET_CHAIN_ID: u64 = 1;

fn builtin(id: u64, name: &str, rpc_url: &str, explorer: Option<&str>, currency: NativeCurrency) -> Chain {
    Chain {
        id,
        name: name.to_string(),
        native_currency: currency,
        rpc_urls: vec![rpc_url.to_string()],
        block_explorer_url: explorer.map(str::to_string),
        custom: false,
    }
}

lazy_static! {
    static ref BUILTIN_CHAINS: Vec<Chain> = vec![
        builtin(1, "Ethereum", "https://eth.merkle.io", Some("https://etherscan.io"), NativeCurrency::ether()),
        builtin(
            11155111,
            "Sepolia",
            "https://sepolia.drpc.org",
            Some("https://sepolia.etherscan.io"),
            NativeCurrency { name: "Sepolia Ether".to_string(), symbol: "ETH".to_string(), decimals: 18 },
        ),
        builtin(10, "OP Mainnet", "https://mainnet.optimism.io", Some("https://optimistic.etherscan.io"), NativeCurrency::ether()),
        builtin(
            137,
            "Polygon",
            "https://polygon-rpc.com",
            Some("https://polygonscan.com"),
            NativeCurrency { name: "POL".to_string(), symbol: "POL".to_string(), decimals: 18 },
        ),
        builtin(42161, "Arbitrum One", "https://arb1.arbitrum.io/rpc", Some("https://arbiscan.io"), NativeCurrency::ether()),
        builtin(8453, "Base", "https://mainnet.base.org", Some("https://basescan.org"), NativeCurrency::ether()),
        builtin(31337, "Anvil", "http://127.0.0.1:8545", None, NativeCurrency::ether()),
    ];
}

/// Checks shared by `add_chain` and `update_chain`.
fn validate_rpc_url(rpc_url: &str) -> EffectResult<()> {
    if !(rpc_url.starts_with("http://") || rpc_url.starts_with("https://")) {
        return Err(EffectError::validation(format!(
            "Invalid rpcUrl '{}': must start with http:// or https://",
            rpc_url
        )));
    }
    Url::parse(rpc_url)
        .map_err(|e| EffectError::validation(format!("Invalid rpcUrl '{}': {}", rpc_url, e)))?;
    Ok(())
}

fn validate_name(name: &str) -> EffectResult<()> {
    if name.trim().is_empty() {
        return Err(EffectError::validation("Chain name must not be empty"));
    }
    Ok(())
}

fn validate_currency(currency: &NativeCurrency) -> EffectResult<()> {
    if currency.name.trim().is_empty() {
        return Err(EffectError::validation("nativeCurrency.name must not be empty"));
    }
    if currency.symbol.trim().is_empty() {
        return Err(EffectError::validation("nativeCurrency.symbol must not be empty"));
    }
    Ok(())
}

fn validate_explorer(url: &str) -> EffectResult<()> {
    Url::parse(url)
        .map(|_| ())
        .map_err(|e| EffectError::validation(format!("Invalid blockExplorerUrl '{}': {}", url, e)))
}

#[derive(Debug, Default)]
struct CustomChains {
    chains: Vec<Chain>,
}

#[derive(Debug)]
pub struct ChainRegistry {
    builtins: Vec<Chain>,
    custom: RwLock<CustomChains>,
}

impl Default for ChainRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ChainRegistry {
    pub fn new() -> Self {
        Self {
            builtins: BUILTIN_CHAINS.clone(),
            custom: RwLock::new(CustomChains::default()),
        }
    }

    /// Build a registry whose built-in RPC URLs are replaced by `overrides`
    /// (chain id -> URL). Overrides for unknown chains are ignored.
    pub fn with_rpc_overrides(overrides: &HashMap<u64, String>) -> EffectResult<Self> {
        let mut registry = Self::new();
        for chain in registry.builtins.iter_mut() {
            if let Some(url) = overrides.get(&chain.id) {
                validate_rpc_url(url)?;
                chain.rpc_urls = vec![url.clone()];
            }
        }
        Ok(registry)
    }

    fn read(&self) -> RwLockReadGuard<'_, CustomChains> {
        self.custom.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, CustomChains> {
        self.custom.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_builtin(&self, id: u64) -> bool {
        self.builtins.iter().any(|c| c.id == id)
    }

    pub fn add_chain(
        &self,
        id: i64,
        name: &str,
        rpc_url: &str,
        native_currency: NativeCurrency,
        block_explorer_url: Option<&str>,
    ) -> EffectResult<Chain> {
        if id <= 0 {
            return Err(EffectError::validation(format!(
                "Invalid chain id {}: must be a positive integer",
                id
            )));
        }
        let id = id as u64;
        validate_name(name)?;
        validate_rpc_url(rpc_url)?;
        validate_currency(&native_currency)?;
        if let Some(url) = block_explorer_url {
            validate_explorer(url)?;
        }

        let chain = Chain {
            id,
            name: name.trim().to_string(),
            native_currency,
            rpc_urls: vec![rpc_url.to_string()],
            block_explorer_url: block_explorer_url.map(str::to_string),
            custom: true,
        };

        let mut custom = self.write();
        if self.is_builtin(id) || custom.chains.iter().any(|c| c.id == id) {
            return Err(EffectError::conflict(format!(
                "Chain {} already exists; use update_chain to modify a custom chain",
                id
            )));
        }
        custom.chains.push(chain.clone());
        info!("Added custom chain {} ({})", chain.name, chain.id);
        Ok(chain)
    }

    pub fn update_chain(&self, id: u64, update: ChainUpdate) -> EffectResult<Chain> {
        let mut custom = self.write();
        if self.is_builtin(id) {
            return Err(EffectError::conflict(format!(
                "Chain {} is built-in and cannot be modified",
                id
            )));
        }
        let existing = custom
            .chains
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| EffectError::not_found(format!("Chain {} does not exist", id)))?;

        if let Some(name) = &update.name {
            validate_name(name)?;
        }
        if let Some(url) = &update.rpc_url {
            validate_rpc_url(url)?;
        }
        if let Some(currency) = &update.native_currency {
            validate_currency(currency)?;
        }
        if let Some(url) = &update.block_explorer_url {
            validate_explorer(url)?;
        }

        if let Some(name) = update.name {
            existing.name = name.trim().to_string();
        }
        if let Some(url) = update.rpc_url {
            existing.rpc_urls = vec![url];
        }
        if let Some(currency) = update.native_currency {
            existing.native_currency = currency;
        }
        if let Some(url) = update.block_explorer_url {
            existing.block_explorer_url = Some(url);
        }
        info!("Updated custom chain {}", id);
        Ok(existing.clone())
    }

    /// Remove a custom chain. `current_chain_id` is the chain the wallet is on.
    pub fn remove_chain(&self, id: u64, current_chain_id: u64) -> EffectResult<Chain> {
        if id == current_chain_id {
            return Err(EffectError::conflict(format!(
                "Chain {} is the current chain; switch to another chain before removing it",
                id
            )));
        }
        if self.is_builtin(id) {
            return Err(EffectError::conflict(format!(
                "Chain {} is built-in and cannot be removed",
                id
            )));
        }
        let mut custom = self.write();
        let index = custom
            .chains
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| EffectError::not_found(format!("Chain {} does not exist", id)))?;
        let removed = custom.chains.remove(index);
        info!("Removed custom chain {} ({})", removed.name, removed.id);
        Ok(removed)
    }

    pub fn get_chain(&self, id: u64) -> Option<Chain> {
        self.builtins
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .or_else(|| self.read().chains.iter().find(|c| c.id == id).cloned())
    }

    /// Built-ins first, then custom chains in insertion order.
    pub fn get_all_chains(&self) -> Vec<Chain> {
        let mut all = self.builtins.clone();
        all.extend(self.read().chains.iter().cloned());
        all
    }

    pub fn clear_custom(&self) {
        self.write().chains.clear();
    }
}
