// src/blockchain/services/wallet.rs

//! Wallet effects: the connect/disconnect state machine, signing and sending.
//!
//! Mock mode talks to the injected `MockConnector`; private-key mode signs with
//! the `LocalSigner` using keys held by the `WalletStore`. Chain reads go
//! through the `ChainClientFactory` for the current chain.

use ethers::types::{
    transaction::eip2718::TypedTransaction, transaction::eip712::TypedData, Address, Bytes,
    TransactionRequest, U256,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::blockchain::{
    chains::ChainRegistry,
    client::{ChainClient, ChainClientFactory, LocalSigner, MockConnector},
    error::{EffectError, EffectResult},
    models::{BalanceResponse, Chain, CurrentAccount, ImportedWallet, TransactionResponse, WalletMode},
    wallet_store::{is_mock_address, load_private_key, WalletState, WalletStore, MOCK_ADDRESSES},
};
use crate::utils::{parse_address, to_checksum_string};

pub struct WalletEffects {
    store: Arc<WalletStore>,
    chains: Arc<ChainRegistry>,
    clients: Arc<dyn ChainClientFactory>,
    connector: Arc<dyn MockConnector>,
    signer: Arc<dyn LocalSigner>,
}

impl WalletEffects {
    pub fn new(
        store: Arc<WalletStore>,
        chains: Arc<ChainRegistry>,
        clients: Arc<dyn ChainClientFactory>,
        connector: Arc<dyn MockConnector>,
        signer: Arc<dyn LocalSigner>,
    ) -> Self {
        Self {
            store,
            chains,
            clients,
            connector,
            signer,
        }
    }

    fn chain_for(&self, chain_id: u64) -> EffectResult<Chain> {
        self.chains
            .get_chain(chain_id)
            .ok_or_else(|| EffectError::not_found(format!("Chain {} does not exist", chain_id)))
    }

    pub async fn current_chain(&self) -> EffectResult<Chain> {
        let chain_id = self.store.lock().await.chain_id;
        self.chain_for(chain_id)
    }

    /// Client bound to the current chain.
    pub async fn current_client(&self) -> EffectResult<(Chain, Arc<dyn ChainClient>)> {
        let chain = self.current_chain().await?;
        let client = self.clients.client(&chain)?;
        Ok((chain, client))
    }

    pub async fn connected_address(&self) -> EffectResult<Option<Address>> {
        self.store.lock().await.connected_address()
    }

    /// `explicit` if given, else the connected address.
    pub async fn resolve_account(&self, explicit: Option<&str>, field: &str) -> EffectResult<Address> {
        if let Some(address) = explicit {
            return parse_address(address, field);
        }
        self.connected_address().await?.ok_or_else(|| {
            EffectError::validation(format!(
                "No {} given and no wallet connected; connect a wallet or pass an address",
                field
            ))
        })
    }

    pub async fn connect_wallet(&self, address: &str) -> EffectResult<CurrentAccount> {
        let mut state = self.store.lock().await;
        let mode = state.mode;
        match mode {
            WalletMode::Mock => {
                if !is_mock_address(address) {
                    return Err(EffectError::validation(format!(
                        "Address {} is not a mock account. Available mock accounts: {}",
                        address,
                        MOCK_ADDRESSES.join(", ")
                    )));
                }
                let parsed = parse_address(address, "address")?;
                let session = self.connector.connect(parsed).await?;
                state.chain_id = session.chain_id;
            }
            WalletMode::PrivateKey => {
                let parsed = parse_address(address, "address")?;
                if !state.has_key(&parsed) {
                    return Err(EffectError::validation(format!(
                        "No imported private key for {}; import it first with import_private_key",
                        address
                    )));
                }
            }
        }
        state.connected = Some(address.to_string());
        info!("Connected {} wallet {} on chain {}", state.mode, address, state.chain_id);
        Ok(self.account_of(&state))
    }

    pub async fn disconnect_wallet(&self) -> CurrentAccount {
        let mut state = self.store.lock().await;
        self.disconnect_locked(&mut state).await;
        self.account_of(&state)
    }

    /// Disconnect, drop every key and restore the default mode and chain under
    /// a single guard. The mock connector forgets its account and chain too.
    pub async fn reset(&self) {
        let mut state = self.store.lock().await;
        self.disconnect_locked(&mut state).await;
        self.connector.reset().await;
        self.store.restore_defaults(&mut state);
        info!("Wallet reset to {} mode on chain {}", state.mode, state.chain_id);
    }

    async fn disconnect_locked(&self, state: &mut WalletState) {
        if state.mode == WalletMode::Mock && state.connected.is_some() {
            if let Err(e) = self.connector.disconnect().await {
                warn!("Mock connector disconnect failed: {}", e);
            }
        }
        if let Some(previous) = state.connected.take() {
            info!("Disconnected wallet {}", previous);
        }
    }

    fn account_of(&self, state: &WalletState) -> CurrentAccount {
        CurrentAccount {
            is_connected: state.connected.is_some(),
            address: state.connected.clone(),
            chain_id: state.chain_id,
            wallet_mode: state.mode,
            connector: match state.mode {
                WalletMode::Mock => Some(self.connector.name().to_string()),
                WalletMode::PrivateKey => None,
            },
        }
    }

    pub async fn get_current_account(&self) -> CurrentAccount {
        let state = self.store.lock().await;
        self.account_of(&state)
    }

    pub async fn get_balance(&self, address: Option<&str>) -> EffectResult<BalanceResponse> {
        let owner = self.resolve_account(address, "address").await?;
        let (chain, client) = self.current_client().await?;
        let amount = client.get_balance(owner).await?;
        Ok(BalanceResponse {
            address: to_checksum_string(&owner),
            amount,
            symbol: chain.native_currency.symbol,
            decimals: chain.native_currency.decimals,
        })
    }

    pub async fn sign_message(&self, message: &str) -> EffectResult<String> {
        let state = self.store.lock().await;
        let account = require_connected(&state)?;
        let mode = state.mode;
        match mode {
            WalletMode::PrivateKey => {
                let key = state.key(&account).ok_or_else(|| missing_key(&account))?;
                self.signer.sign_message(key, message).await
            }
            WalletMode::Mock => {
                drop(state);
                Ok(self.connector.sign_message(account, message).await?)
            }
        }
    }

    pub async fn sign_typed_data(&self, data: &TypedData) -> EffectResult<String> {
        let state = self.store.lock().await;
        let account = require_connected(&state)?;
        let mode = state.mode;
        match mode {
            WalletMode::PrivateKey => {
                let key = state.key(&account).ok_or_else(|| missing_key(&account))?;
                self.signer.sign_typed_data(key, data).await
            }
            WalletMode::Mock => {
                drop(state);
                Ok(self.connector.sign_typed_data(account, data).await?)
            }
        }
    }

    /// Switch wallet mode. A real change disconnects the current wallet first.
    pub async fn set_wallet_type(&self, mode: WalletMode) -> CurrentAccount {
        let mut state = self.store.lock().await;
        if state.mode != mode {
            self.disconnect_locked(&mut state).await;
            info!("Wallet mode switched from {} to {}", state.mode, mode);
            state.mode = mode;
        }
        self.account_of(&state)
    }

    pub async fn import_private_key(&self, input: &str) -> EffectResult<ImportedWallet> {
        let key = load_private_key(input)?;
        let mut state = self.store.lock().await;
        let address = state.insert_key(key)?;
        info!("Imported private key for {}", to_checksum_string(&address));
        state
            .imported_wallets()
            .into_iter()
            .find(|w| w.address == to_checksum_string(&address))
            .ok_or_else(|| EffectError::not_found("Imported wallet vanished from the store"))
    }

    /// `false` when no key was stored for `address`.
    pub async fn remove_private_key(&self, address: &str) -> EffectResult<bool> {
        let parsed = parse_address(address, "address")?;
        let mut state = self.store.lock().await;
        if state.mode == WalletMode::PrivateKey && state.connected_address()? == Some(parsed) {
            self.disconnect_locked(&mut state).await;
        }
        let removed = state.remove_key(&parsed);
        if removed {
            info!("Removed private key for {}", to_checksum_string(&parsed));
        }
        Ok(removed)
    }

    pub async fn list_imported_wallets(&self) -> Vec<ImportedWallet> {
        self.store.lock().await.imported_wallets()
    }

    pub async fn switch_chain(&self, chain_id: u64) -> EffectResult<Chain> {
        let chain = self.chain_for(chain_id)?;
        let mut state = self.store.lock().await;
        if state.mode == WalletMode::Mock {
            self.connector.switch_chain(chain_id).await?;
        }
        state.chain_id = chain_id;
        info!("Switched to chain {} ({})", chain.name, chain.id);
        Ok(chain)
    }

    /// Remove a custom chain unless it is the current one.
    pub async fn remove_chain(&self, chain_id: u64) -> EffectResult<Chain> {
        let state = self.store.lock().await;
        self.chains.remove_chain(chain_id, state.chain_id)
    }

    pub async fn send_transaction(
        &self,
        to: &str,
        value: Option<U256>,
        data: Option<Bytes>,
    ) -> EffectResult<TransactionResponse> {
        let to = parse_address(to, "recipient")?;
        self.send(to, value, data).await
    }

    /// Build, sign and broadcast a transaction from the connected wallet.
    pub(crate) async fn send(
        &self,
        to: Address,
        value: Option<U256>,
        data: Option<Bytes>,
    ) -> EffectResult<TransactionResponse> {
        let (mode, from, chain_id) = {
            let state = self.store.lock().await;
            (state.mode, require_connected(&state)?, state.chain_id)
        };

        let mut request = TransactionRequest::new().from(from).to(to);
        if let Some(value) = value {
            request = request.value(value);
        }
        if let Some(data) = data {
            request = request.data(data);
        }
        let tx: TypedTransaction = request.into();

        let hash = match mode {
            WalletMode::Mock => self.connector.send_transaction(tx).await?,
            WalletMode::PrivateKey => {
                let chain = self.chain_for(chain_id)?;
                let client = self.clients.client(&chain)?;
                let filled = client.fill_transaction(tx).await?;
                let raw = {
                    let state = self.store.lock().await;
                    let key = state.key(&from).ok_or_else(|| missing_key(&from))?;
                    self.signer.sign_transaction(key, chain_id, &filled).await?
                };
                client.send_raw_transaction(raw).await?
            }
        };
        debug!("Broadcast transaction {:?} from {:?}", hash, from);
        Ok(TransactionResponse {
            tx_hash: format!("{:?}", hash),
        })
    }
}

fn require_connected(state: &WalletState) -> EffectResult<Address> {
    state
        .connected_address()?
        .ok_or_else(|| EffectError::validation("No wallet connected; call connect_wallet first"))
}

fn missing_key(address: &Address) -> EffectError {
    EffectError::validation(format!(
        "No imported private key for {}",
        to_checksum_string(address)
    ))
}
