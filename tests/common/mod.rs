//! Capability doubles shared by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use ethers::abi::Token;
use ethers::types::{
    transaction::eip2718::TypedTransaction, transaction::eip712::TypedData, Address, Bytes, H256, U256,
};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use evm_wallet_mcp::blockchain::{
    client::{ChainClient, ChainClientFactory, MockConnector},
    error::{ClientError, EffectError},
    evm_client::LocalKeySigner,
    models::{Chain, ChainReceipt, ChainTransaction, ConnectorSession, ContractCall},
};
use evm_wallet_mcp::container::{Capabilities, Container};

/// Anvil's first development key; derives to the first mock address.
pub const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const DEV_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
/// Anvil's second development key.
pub const SECOND_KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
pub const SECOND_ADDRESS: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";

pub const SENT_HASH: u64 = 0xabc;

pub fn addr(s: &str) -> Address {
    Address::from_str(s).unwrap()
}

pub fn hash(n: u64) -> H256 {
    H256::from_low_u64_be(n)
}

pub fn hash_str(n: u64) -> String {
    format!("{:?}", hash(n))
}

/// In-memory chain: every answer is configured by the test.
pub struct FakeChainClient {
    pub balances: Mutex<HashMap<Address, U256>>,
    pub gas: Mutex<U256>,
    pub gas_price: Mutex<U256>,
    pub transactions: Mutex<HashMap<H256, ChainTransaction>>,
    pub receipts: Mutex<HashMap<H256, ChainReceipt>>,
    pub ens: Mutex<HashMap<String, Address>>,
    pub call_results: Mutex<HashMap<String, Result<Vec<Token>, ClientError>>>,
    pub calls: Mutex<Vec<ContractCall>>,
    pub sent_raw: Mutex<Vec<Bytes>>,
    /// When set, lookups fail with this transport error.
    pub transport_failure: Mutex<Option<String>>,
}

impl Default for FakeChainClient {
    fn default() -> Self {
        Self {
            balances: Mutex::new(HashMap::new()),
            gas: Mutex::new(U256::from(21_000u64)),
            gas_price: Mutex::new(U256::from(20_000_000_000u64)),
            transactions: Mutex::new(HashMap::new()),
            receipts: Mutex::new(HashMap::new()),
            ens: Mutex::new(HashMap::new()),
            call_results: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            sent_raw: Mutex::new(Vec::new()),
            transport_failure: Mutex::new(None),
        }
    }
}

impl FakeChainClient {
    pub fn respond(&self, function: &str, result: Result<Vec<Token>, ClientError>) {
        self.call_results.lock().unwrap().insert(function.to_string(), result);
    }

    fn check_transport(&self) -> Result<(), ClientError> {
        match self.transport_failure.lock().unwrap().clone() {
            Some(msg) => Err(ClientError::Transport(msg)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ChainClient for FakeChainClient {
    async fn get_balance(&self, address: Address) -> Result<U256, ClientError> {
        self.check_transport()?;
        Ok(self.balances.lock().unwrap().get(&address).copied().unwrap_or_default())
    }

    async fn estimate_gas(&self, _tx: &TypedTransaction) -> Result<U256, ClientError> {
        self.check_transport()?;
        Ok(*self.gas.lock().unwrap())
    }

    async fn get_gas_price(&self) -> Result<U256, ClientError> {
        self.check_transport()?;
        Ok(*self.gas_price.lock().unwrap())
    }

    async fn get_transaction(&self, hash: H256) -> Result<ChainTransaction, ClientError> {
        self.check_transport()?;
        self.transactions
            .lock()
            .unwrap()
            .get(&hash)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("transaction {:?} not found", hash)))
    }

    async fn get_transaction_receipt(&self, hash: H256) -> Result<ChainReceipt, ClientError> {
        self.check_transport()?;
        self.receipts
            .lock()
            .unwrap()
            .get(&hash)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("receipt {:?} not found", hash)))
    }

    async fn resolve_ens_address(&self, name: &str) -> Result<Option<Address>, ClientError> {
        self.check_transport()?;
        Ok(self.ens.lock().unwrap().get(name).copied())
    }

    async fn simulate_call(&self, call: &ContractCall) -> Result<Vec<Token>, ClientError> {
        self.calls.lock().unwrap().push(call.clone());
        self.call_results
            .lock()
            .unwrap()
            .get(&call.function.name)
            .cloned()
            .unwrap_or_else(|| Err(ClientError::Transport("no response configured".to_string())))
    }

    async fn fill_transaction(&self, mut tx: TypedTransaction) -> Result<TypedTransaction, ClientError> {
        self.check_transport()?;
        tx.set_nonce(0u64);
        tx.set_gas(*self.gas.lock().unwrap());
        tx.set_gas_price(*self.gas_price.lock().unwrap());
        Ok(tx)
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<H256, ClientError> {
        self.check_transport()?;
        self.sent_raw.lock().unwrap().push(raw);
        Ok(hash(SENT_HASH))
    }
}

/// Hands out one shared fake client and counts how clients were requested.
pub struct FakeFactory {
    pub client: Arc<FakeChainClient>,
    pub cached_calls: AtomicUsize,
    pub fresh_calls: AtomicUsize,
    pub fresh_chain_ids: Mutex<Vec<u64>>,
}

impl FakeFactory {
    pub fn new(client: Arc<FakeChainClient>) -> Self {
        Self {
            client,
            cached_calls: AtomicUsize::new(0),
            fresh_calls: AtomicUsize::new(0),
            fresh_chain_ids: Mutex::new(Vec::new()),
        }
    }

    pub fn fresh_count(&self) -> usize {
        self.fresh_calls.load(Ordering::SeqCst)
    }
}

impl ChainClientFactory for FakeFactory {
    fn client(&self, _chain: &Chain) -> Result<Arc<dyn ChainClient>, EffectError> {
        self.cached_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.client.clone())
    }

    fn fresh_client(&self, chain: &Chain) -> Result<Arc<dyn ChainClient>, EffectError> {
        self.fresh_calls.fetch_add(1, Ordering::SeqCst);
        self.fresh_chain_ids.lock().unwrap().push(chain.id);
        Ok(self.client.clone())
    }
}

pub const MOCK_SIGNATURE: &str = "0xmocksignature";
/// Chain the fake connector reports until told to switch.
pub const CONNECTOR_CHAIN_ID: u64 = 31337;

/// Records what the wallet asked of the connector.
pub struct FakeConnector {
    pub account: Mutex<Option<Address>>,
    pub chain_id: Mutex<u64>,
    pub switched: Mutex<Vec<u64>>,
    pub sent: Mutex<Vec<TypedTransaction>>,
}

impl Default for FakeConnector {
    fn default() -> Self {
        Self {
            account: Mutex::new(None),
            chain_id: Mutex::new(CONNECTOR_CHAIN_ID),
            switched: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl MockConnector for FakeConnector {
    fn name(&self) -> &str {
        "Fake Connector"
    }

    async fn connect(&self, account: Address) -> Result<ConnectorSession, ClientError> {
        *self.account.lock().unwrap() = Some(account);
        Ok(ConnectorSession {
            chain_id: *self.chain_id.lock().unwrap(),
        })
    }

    async fn disconnect(&self) -> Result<(), ClientError> {
        *self.account.lock().unwrap() = None;
        Ok(())
    }

    async fn reset(&self) {
        *self.account.lock().unwrap() = None;
        *self.chain_id.lock().unwrap() = CONNECTOR_CHAIN_ID;
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<(), ClientError> {
        self.switched.lock().unwrap().push(chain_id);
        *self.chain_id.lock().unwrap() = chain_id;
        Ok(())
    }

    async fn sign_message(&self, _account: Address, _message: &str) -> Result<String, ClientError> {
        Ok(MOCK_SIGNATURE.to_string())
    }

    async fn sign_typed_data(&self, _account: Address, _data: &TypedData) -> Result<String, ClientError> {
        Ok(MOCK_SIGNATURE.to_string())
    }

    async fn send_transaction(&self, tx: TypedTransaction) -> Result<H256, ClientError> {
        self.sent.lock().unwrap().push(tx);
        Ok(hash(SENT_HASH))
    }
}

pub struct Harness {
    pub container: Container,
    pub client: Arc<FakeChainClient>,
    pub factory: Arc<FakeFactory>,
    pub connector: Arc<FakeConnector>,
}

/// A fresh container over fakes: mock mode, chain 1, nothing imported.
pub fn harness() -> Harness {
    let client = Arc::new(FakeChainClient::default());
    let factory = Arc::new(FakeFactory::new(client.clone()));
    let connector = Arc::new(FakeConnector::default());
    let capabilities = Capabilities {
        clients: factory.clone(),
        connector: connector.clone(),
        signer: Arc::new(LocalKeySigner),
    };
    Harness {
        container: Container::isolated(capabilities).unwrap(),
        client,
        factory,
        connector,
    }
}
