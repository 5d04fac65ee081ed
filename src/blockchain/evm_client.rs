// src/blockchain/evm_client.rs

use async_trait::async_trait;
use dashmap::DashMap;
use ethers::{
    abi::Token,
    providers::{Http, Middleware, Provider, ProviderError, RpcError},
    signers::{LocalWallet, Signer},
    types::{
        transaction::{eip2718::TypedTransaction, eip712::TypedData},
        Address, Bytes, TransactionRequest, H256, U256,
    },
};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crate::blockchain::{
    client::{ChainClient, ChainClientFactory, LocalSigner, MockConnector},
    error::{ClientError, EffectError},
    models::{Chain, ChainReceipt, ChainTransaction, ConnectorSession, ContractCall},
    wallet_store::PrivateKey,
};

fn classify(err: ProviderError) -> ClientError {
    if let Some(rpc) = err.as_error_response() {
        if rpc.message.contains("revert") {
            return ClientError::Reverted(rpc.message.clone());
        }
        return ClientError::Transport(rpc.message.clone());
    }
    ClientError::Transport(err.to_string())
}

fn create_provider(chain: &Chain) -> Result<Provider<Http>, EffectError> {
    let url = chain.rpc_url().ok_or_else(|| {
        EffectError::validation(format!("Chain {} has no RPC URL configured", chain.id))
    })?;
    Provider::<Http>::try_from(url)
        .map_err(|e| EffectError::validation(format!("Invalid RPC URL '{}': {}", url, e)))
}

/// `ChainClient` over an ethers HTTP provider.
#[derive(Clone)]
pub struct EvmClient {
    provider: Arc<Provider<Http>>,
}

impl EvmClient {
    pub fn new(chain: &Chain) -> Result<Self, EffectError> {
        Ok(Self {
            provider: Arc::new(create_provider(chain)?),
        })
    }
}

#[async_trait]
impl ChainClient for EvmClient {
    async fn get_balance(&self, address: Address) -> Result<U256, ClientError> {
        self.provider.get_balance(address, None).await.map_err(classify)
    }

    async fn estimate_gas(&self, tx: &TypedTransaction) -> Result<U256, ClientError> {
        self.provider.estimate_gas(tx, None).await.map_err(classify)
    }

    async fn get_gas_price(&self) -> Result<U256, ClientError> {
        self.provider.get_gas_price().await.map_err(classify)
    }

    async fn get_transaction(&self, hash: H256) -> Result<ChainTransaction, ClientError> {
        let tx = self
            .provider
            .get_transaction(hash)
            .await
            .map_err(classify)?
            .ok_or_else(|| ClientError::NotFound(format!("Transaction {:?} not found", hash)))?;
        Ok(ChainTransaction {
            hash: tx.hash,
            block_number: tx.block_number.map(|n| n.as_u64()),
            from: tx.from,
            to: tx.to,
            value: tx.value,
        })
    }

    async fn get_transaction_receipt(&self, hash: H256) -> Result<ChainReceipt, ClientError> {
        let receipt = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(classify)?
            .ok_or_else(|| ClientError::NotFound(format!("Receipt for {:?} not found", hash)))?;
        Ok(ChainReceipt {
            transaction_hash: receipt.transaction_hash,
            block_number: receipt.block_number.map(|n| n.as_u64()),
            from: receipt.from,
            to: receipt.to,
            contract_address: receipt.contract_address,
            gas_used: receipt.gas_used.unwrap_or_default(),
            effective_gas_price: receipt.effective_gas_price.unwrap_or_default(),
            status: receipt.status.map(|s| s.as_u64()),
        })
    }

    async fn resolve_ens_address(&self, name: &str) -> Result<Option<Address>, ClientError> {
        match self.provider.resolve_name(name).await {
            Ok(address) if address.is_zero() => Ok(None),
            Ok(address) => Ok(Some(address)),
            Err(ProviderError::EnsError(_)) | Err(ProviderError::EnsNotOwned(_)) => Ok(None),
            Err(e) => Err(classify(e)),
        }
    }

    async fn simulate_call(&self, call: &ContractCall) -> Result<Vec<Token>, ClientError> {
        let data = call
            .function
            .encode_input(&call.args)
            .map_err(|e| ClientError::Transport(format!("Failed to encode call: {}", e)))?;
        let mut request = TransactionRequest::new().to(call.address).data(data);
        if let Some(from) = call.from {
            request = request.from(from);
        }
        if let Some(value) = call.value {
            request = request.value(value);
        }
        let tx: TypedTransaction = request.into();
        let output = self.provider.call(&tx, None).await.map_err(classify)?;
        call.function
            .decode_output(&output)
            .map_err(|e| ClientError::Decode(format!("Failed to decode output: {}", e)))
    }

    async fn fill_transaction(&self, mut tx: TypedTransaction) -> Result<TypedTransaction, ClientError> {
        self.provider
            .fill_transaction(&mut tx, None)
            .await
            .map_err(classify)?;
        Ok(tx)
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<H256, ClientError> {
        let pending = self.provider.send_raw_transaction(raw).await.map_err(classify)?;
        Ok(pending.tx_hash())
    }
}

/// Builds `EvmClient`s and caches one per chain id.
#[derive(Default)]
pub struct EvmClientFactory {
    clients: DashMap<u64, (String, Arc<EvmClient>)>,
}

impl EvmClientFactory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChainClientFactory for EvmClientFactory {
    fn client(&self, chain: &Chain) -> Result<Arc<dyn ChainClient>, EffectError> {
        let url = chain.rpc_url().unwrap_or_default().to_string();
        if let Some(cached) = self.clients.get(&chain.id) {
            // A chain whose RPC URL was updated gets a new client.
            if cached.0 == url {
                return Ok(cached.1.clone());
            }
        }
        let client = Arc::new(EvmClient::new(chain)?);
        self.clients.insert(chain.id, (url, client.clone()));
        Ok(client)
    }

    fn fresh_client(&self, chain: &Chain) -> Result<Arc<dyn ChainClient>, EffectError> {
        Ok(Arc::new(EvmClient::new(chain)?))
    }
}

fn local_wallet(key: &PrivateKey) -> Result<LocalWallet, EffectError> {
    LocalWallet::from_bytes(key.expose())
        .map_err(|e| EffectError::validation(format!("Invalid private key: {}", e)))
}

fn signature_hex(signature: ethers::types::Signature) -> String {
    format!("0x{}", hex::encode(signature.to_vec()))
}

/// Signs with imported keys in-process.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalKeySigner;

#[async_trait]
impl LocalSigner for LocalKeySigner {
    async fn sign_message(&self, key: &PrivateKey, message: &str) -> Result<String, EffectError> {
        let wallet = local_wallet(key)?;
        let signature = wallet
            .sign_message(message)
            .await
            .map_err(|e| EffectError::Transport(format!("Signing failed: {}", e)))?;
        Ok(signature_hex(signature))
    }

    async fn sign_typed_data(&self, key: &PrivateKey, data: &TypedData) -> Result<String, EffectError> {
        let wallet = local_wallet(key)?;
        let signature = wallet
            .sign_typed_data(data)
            .await
            .map_err(|e| EffectError::validation(format!("Cannot sign typed data: {}", e)))?;
        Ok(signature_hex(signature))
    }

    async fn sign_transaction(
        &self,
        key: &PrivateKey,
        chain_id: u64,
        tx: &TypedTransaction,
    ) -> Result<Bytes, EffectError> {
        let wallet = local_wallet(key)?.with_chain_id(chain_id);
        let mut tx = tx.clone();
        tx.set_chain_id(chain_id);
        let signature = wallet
            .sign_transaction(&tx)
            .await
            .map_err(|e| EffectError::Transport(format!("Signing failed: {}", e)))?;
        Ok(tx.rlp_signed(&signature))
    }
}

#[derive(Debug, Default)]
struct ConnectorState {
    account: Option<Address>,
    chain_id: Option<u64>,
}

/// Mock-mode connector backed by a development node with unlocked accounts.
///
/// Connecting is local; signing and sending go through the node's
/// `eth_sign` / `eth_signTypedData_v4` / `eth_sendTransaction`.
pub struct DevNodeConnector {
    provider: Provider<Http>,
    chain_id: u64,
    state: Mutex<ConnectorState>,
}

impl DevNodeConnector {
    pub fn new(rpc_url: &str, chain_id: u64) -> anyhow::Result<Self> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| anyhow::anyhow!("Failed to create mock connector provider: {}", e))?;
        Ok(Self {
            provider,
            chain_id,
            state: Mutex::new(ConnectorState::default()),
        })
    }

    fn state(&self) -> std::sync::MutexGuard<'_, ConnectorState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// The node only signs for the account the connector is connected to.
    fn ensure_connected(&self, account: Address) -> Result<(), ClientError> {
        match self.state().account {
            Some(connected) if connected == account => Ok(()),
            _ => Err(ClientError::Transport(format!(
                "Mock connector is not connected to {:?}",
                account
            ))),
        }
    }
}

#[async_trait]
impl MockConnector for DevNodeConnector {
    fn name(&self) -> &str {
        "Mock Connector"
    }

    async fn connect(&self, account: Address) -> Result<ConnectorSession, ClientError> {
        let mut state = self.state();
        let chain_id = state.chain_id.unwrap_or(self.chain_id);
        state.account = Some(account);
        state.chain_id = Some(chain_id);
        debug!("Mock connector connected {:?} on chain {}", account, chain_id);
        Ok(ConnectorSession { chain_id })
    }

    async fn disconnect(&self) -> Result<(), ClientError> {
        self.state().account = None;
        Ok(())
    }

    async fn reset(&self) {
        *self.state() = ConnectorState::default();
        debug!("Mock connector reset to chain {}", self.chain_id);
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<(), ClientError> {
        self.state().chain_id = Some(chain_id);
        Ok(())
    }

    async fn sign_message(&self, account: Address, message: &str) -> Result<String, ClientError> {
        self.ensure_connected(account)?;
        let signature = self
            .provider
            .sign(message.as_bytes().to_vec(), &account)
            .await
            .map_err(classify)?;
        Ok(signature_hex(signature))
    }

    async fn sign_typed_data(&self, account: Address, data: &TypedData) -> Result<String, ClientError> {
        self.ensure_connected(account)?;
        let payload = serde_json::to_value(data)
            .map_err(|e| ClientError::Transport(format!("Failed to encode typed data: {}", e)))?;
        self.provider
            .request::<_, String>("eth_signTypedData_v4", (account, payload))
            .await
            .map_err(classify)
    }

    async fn send_transaction(&self, tx: TypedTransaction) -> Result<H256, ClientError> {
        if let Some(from) = tx.from() {
            self.ensure_connected(*from)?;
        }
        let pending = self.provider.send_transaction(tx, None).await.map_err(|e| {
            warn!("Mock connector failed to send transaction: {}", e);
            classify(e)
        })?;
        Ok(pending.tx_hash())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    const ACCOUNT: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    fn connector() -> DevNodeConnector {
        DevNodeConnector::new("http://127.0.0.1:8545", 31337).unwrap()
    }

    #[tokio::test]
    async fn reset_forgets_the_switched_chain() {
        let connector = connector();
        let account = Address::from_str(ACCOUNT).unwrap();
        assert_eq!(connector.connect(account).await.unwrap().chain_id, 31337);

        connector.switch_chain(10).await.unwrap();
        assert_eq!(connector.connect(account).await.unwrap().chain_id, 10);

        connector.reset().await;
        assert!(connector.state().account.is_none());
        assert_eq!(connector.connect(account).await.unwrap().chain_id, 31337);
    }

    #[tokio::test]
    async fn signing_needs_the_connected_account() {
        let connector = connector();
        let account = Address::from_str(ACCOUNT).unwrap();
        let err = connector.sign_message(account, "hello").await.unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));

        connector.connect(account).await.unwrap();
        connector.disconnect().await.unwrap();
        assert!(connector.sign_message(account, "hello").await.is_err());
    }
}
