//! Per-process wiring of the registries, the wallet store and the effects.
//!
//! The server builds one `Container` at startup. Tests build their own with
//! `Container::isolated` and capability doubles, so no state is shared between
//! them.

use anyhow::{bail, Context, Result};
use secrecy::ExposeSecret;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::blockchain::{
    chains::ChainRegistry,
    client::{ChainClientFactory, LocalSigner, MockConnector},
    evm_client::{DevNodeConnector, EvmClientFactory, LocalKeySigner},
    models::WalletMode,
    services::{contract::ContractRegistry, transactions::TransactionEffects, wallet::WalletEffects},
    wallet_store::WalletStore,
};
use crate::config::Config;

/// The capabilities the effects delegate I/O and signing to.
#[derive(Clone)]
pub struct Capabilities {
    pub clients: Arc<dyn ChainClientFactory>,
    pub connector: Arc<dyn MockConnector>,
    pub signer: Arc<dyn LocalSigner>,
}

impl Capabilities {
    /// ethers-backed adapters for a running server.
    pub fn from_config(config: &Config) -> Result<Self> {
        let connector = DevNodeConnector::new(&config.mock_rpc_url, config.mock_chain_id)?;
        Ok(Self {
            clients: Arc::new(EvmClientFactory::new()),
            connector: Arc::new(connector),
            signer: Arc::new(LocalKeySigner),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ContainerSettings {
    pub default_mode: WalletMode,
    pub default_chain_id: u64,
    pub rpc_overrides: HashMap<u64, String>,
}

impl Default for ContainerSettings {
    fn default() -> Self {
        Self {
            default_mode: WalletMode::Mock,
            default_chain_id: 1,
            rpc_overrides: HashMap::new(),
        }
    }
}

impl From<&Config> for ContainerSettings {
    fn from(config: &Config) -> Self {
        Self {
            default_mode: config.wallet_mode,
            default_chain_id: config.default_chain_id,
            rpc_overrides: config.chain_rpc_urls.clone(),
        }
    }
}

pub struct Container {
    chains: Arc<ChainRegistry>,
    contracts: Arc<ContractRegistry>,
    wallet: Arc<WalletEffects>,
    transactions: Arc<TransactionEffects>,
}

impl Container {
    pub fn new(capabilities: Capabilities, settings: ContainerSettings) -> Result<Self> {
        let chains = Arc::new(
            ChainRegistry::with_rpc_overrides(&settings.rpc_overrides)
                .context("Invalid chain RPC URL override")?,
        );
        if chains.get_chain(settings.default_chain_id).is_none() {
            bail!("Default chain {} is not a known chain", settings.default_chain_id);
        }
        let contracts = Arc::new(ContractRegistry::with_builtins()?);
        let store = Arc::new(WalletStore::new(settings.default_mode, settings.default_chain_id));

        let wallet = Arc::new(WalletEffects::new(
            store,
            chains.clone(),
            capabilities.clients.clone(),
            capabilities.connector,
            capabilities.signer,
        ));
        let transactions = Arc::new(TransactionEffects::new(
            wallet.clone(),
            chains.clone(),
            contracts.clone(),
            capabilities.clients,
        ));

        Ok(Self {
            chains,
            contracts,
            wallet,
            transactions,
        })
    }

    /// A self-contained container with default settings.
    pub fn isolated(capabilities: Capabilities) -> Result<Self> {
        Self::new(capabilities, ContainerSettings::default())
    }

    /// Build the server's container and apply the startup imports from `config`.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let container = Self::new(Capabilities::from_config(config)?, ContainerSettings::from(config))?;

        if let Some(path) = &config.contracts_file {
            container.contracts.load_file(path)?;
        }
        for input in &config.private_keys {
            match container.wallet.import_private_key(input.expose_secret()).await {
                Ok(imported) => info!("Imported startup key for {}", imported.address),
                Err(e) => warn!("Skipping a PRIVATE_KEYS entry: {}", e),
            }
        }
        Ok(container)
    }

    pub fn chains(&self) -> &ChainRegistry {
        &self.chains
    }

    pub fn contracts(&self) -> &ContractRegistry {
        &self.contracts
    }

    pub fn wallet(&self) -> &WalletEffects {
        &self.wallet
    }

    pub fn transactions(&self) -> &TransactionEffects {
        &self.transactions
    }

    /// Return to the freshly constructed state. Stored keys are zeroed first.
    pub async fn reset(&self) {
        self.wallet.reset().await;
        self.chains.clear_custom();
        self.contracts.clear_loaded();
        info!("Container reset");
    }
}
