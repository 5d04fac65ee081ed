//! Capability interfaces the effects depend on.
//!
//! The container is assembled from implementations of these traits: the ethers
//! adapters in `evm_client` for the real server, hand-written doubles in tests.

use async_trait::async_trait;
use ethers::abi::Token;
use ethers::types::{transaction::eip2718::TypedTransaction, transaction::eip712::TypedData};
use ethers::types::{Address, Bytes, H256, U256};
use std::sync::Arc;

use crate::blockchain::error::{ClientError, EffectError};
use crate::blockchain::models::{
    Chain, ChainReceipt, ChainTransaction, ConnectorSession, ContractCall,
};
use crate::blockchain::wallet_store::PrivateKey;

/// Read/simulate/broadcast access to a single chain.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn get_balance(&self, address: Address) -> Result<U256, ClientError>;

    async fn estimate_gas(&self, tx: &TypedTransaction) -> Result<U256, ClientError>;

    async fn get_gas_price(&self) -> Result<U256, ClientError>;

    /// `ClientError::NotFound` when the chain does not know the hash.
    async fn get_transaction(&self, hash: H256) -> Result<ChainTransaction, ClientError>;

    /// `ClientError::NotFound` when no receipt exists (yet).
    async fn get_transaction_receipt(&self, hash: H256) -> Result<ChainReceipt, ClientError>;

    async fn resolve_ens_address(&self, name: &str) -> Result<Option<Address>, ClientError>;

    /// Dry-run a contract function and decode its outputs.
    async fn simulate_call(&self, call: &ContractCall) -> Result<Vec<Token>, ClientError>;

    /// Fill nonce, gas and fee fields for `from`.
    async fn fill_transaction(&self, tx: TypedTransaction) -> Result<TypedTransaction, ClientError>;

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<H256, ClientError>;
}

/// Produces chain clients bound to a chain record.
pub trait ChainClientFactory: Send + Sync {
    /// A client for `chain`, possibly shared with earlier callers.
    fn client(&self, chain: &Chain) -> Result<Arc<dyn ChainClient>, EffectError>;

    /// A newly constructed client for `chain`, never taken from a cache.
    fn fresh_client(&self, chain: &Chain) -> Result<Arc<dyn ChainClient>, EffectError>;
}

/// The development connector backing mock wallet mode.
#[async_trait]
pub trait MockConnector: Send + Sync {
    fn name(&self) -> &str;

    async fn connect(&self, account: Address) -> Result<ConnectorSession, ClientError>;

    async fn disconnect(&self) -> Result<(), ClientError>;

    /// Forget the connected account and any chain switched to since construction.
    async fn reset(&self);

    async fn switch_chain(&self, chain_id: u64) -> Result<(), ClientError>;

    async fn sign_message(&self, account: Address, message: &str) -> Result<String, ClientError>;

    async fn sign_typed_data(&self, account: Address, data: &TypedData) -> Result<String, ClientError>;

    async fn send_transaction(&self, tx: TypedTransaction) -> Result<H256, ClientError>;
}

/// Local signing with an imported private key. Never performs network I/O.
#[async_trait]
pub trait LocalSigner: Send + Sync {
    async fn sign_message(&self, key: &PrivateKey, message: &str) -> Result<String, EffectError>;

    async fn sign_typed_data(&self, key: &PrivateKey, data: &TypedData) -> Result<String, EffectError>;

    /// RLP-encoded signed transaction ready for `send_raw_transaction`.
    async fn sign_transaction(
        &self,
        key: &PrivateKey,
        chain_id: u64,
        tx: &TypedTransaction,
    ) -> Result<Bytes, EffectError>;
}
