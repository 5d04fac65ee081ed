// src/blockchain/models.rs
use chrono::{DateTime, Utc};
use ethers::abi::{Function, Token};
use ethers::types::{Address, H256, U256};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::blockchain::error::EffectError;
use crate::utils::serialize_u256_dec;

// --- Chain Models ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

impl NativeCurrency {
    pub fn ether() -> Self {
        Self {
            name: "Ether".to_string(),
            symbol: "ETH".to_string(),
            decimals: 18,
        }
    }
}

/// A network the server knows how to reach.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chain {
    pub id: u64,
    pub name: String,
    pub native_currency: NativeCurrency,
    pub rpc_urls: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_explorer_url: Option<String>,
    /// Whether the chain was added at runtime (built-ins are immutable)
    #[serde(default)]
    pub custom: bool,
}

impl Chain {
    pub fn rpc_url(&self) -> Option<&str> {
        self.rpc_urls.first().map(String::as_str)
    }
}

/// Fields accepted by `update_chain`. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainUpdate {
    pub name: Option<String>,
    pub rpc_url: Option<String>,
    pub native_currency: Option<NativeCurrency>,
    pub block_explorer_url: Option<String>,
}

// --- Wallet Models ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum WalletMode {
    #[default]
    #[serde(rename = "mock")]
    Mock,
    #[serde(rename = "privateKey")]
    PrivateKey,
}

impl fmt::Display for WalletMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalletMode::Mock => write!(f, "mock"),
            WalletMode::PrivateKey => write!(f, "privateKey"),
        }
    }
}

impl FromStr for WalletMode {
    type Err = EffectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', '_'], "").as_str() {
            "mock" => Ok(WalletMode::Mock),
            "privatekey" => Ok(WalletMode::PrivateKey),
            other => Err(EffectError::validation(format!(
                "Unknown wallet type '{}'. Expected 'mock' or 'privateKey'",
                other
            ))),
        }
    }
}

/// Snapshot returned by `get_current_account`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentAccount {
    pub is_connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub chain_id: u64,
    pub wallet_mode: WalletMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connector: Option<String>,
}

/// An entry of the private-key store, without its secret.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportedWallet {
    pub address: String,
    pub imported_at: DateTime<Utc>,
    pub connected: bool,
}

/// What the mock connector reports after connecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectorSession {
    pub chain_id: u64,
}

// --- Balance Models ---

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub address: String,
    /// Balance in the smallest unit of the native currency
    #[serde(serialize_with = "serialize_u256_dec")]
    pub amount: U256,
    pub symbol: String,
    pub decimals: u8,
}

// --- Fee Estimation Models ---

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateFeesResponse {
    #[serde(serialize_with = "serialize_u256_dec")]
    pub estimated_gas: U256,
    #[serde(serialize_with = "serialize_u256_dec")]
    pub gas_price: U256,
    #[serde(serialize_with = "serialize_u256_dec")]
    pub total_fee: U256,
    pub total_fee_formatted: String,
    pub denom: String,
}

// --- Transaction Models ---

/// A transaction as reported by the chain client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainTransaction {
    pub hash: H256,
    pub block_number: Option<u64>,
    pub from: Address,
    pub to: Option<Address>,
    pub value: U256,
}

/// A receipt as reported by the chain client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainReceipt {
    pub transaction_hash: H256,
    pub block_number: Option<u64>,
    pub from: Address,
    pub to: Option<Address>,
    pub contract_address: Option<Address>,
    pub gas_used: U256,
    pub effective_gas_price: U256,
    /// 1 for success, 0 for failure, absent on pre-byzantium chains
    pub status: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TransactionStatus {
    NotFound {
        hash: String,
    },
    Pending {
        hash: String,
    },
    #[serde(rename_all = "camelCase")]
    Confirmed {
        hash: String,
        block_number: u64,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptSummary {
    pub transaction_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    pub from: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<String>,
    pub success: Option<bool>,
    #[serde(serialize_with = "serialize_u256_dec")]
    pub gas_used: U256,
    #[serde(serialize_with = "serialize_u256_dec")]
    pub effective_gas_price: U256,
    #[serde(serialize_with = "serialize_u256_dec")]
    pub cost: U256,
    pub cost_formatted: String,
    pub symbol: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResponse {
    pub tx_hash: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnsResolution {
    pub name: String,
    pub address: Option<String>,
}

// --- Contract Models ---

/// Where the ABI of a resolved contract came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractSource {
    Builtin,
    Loaded,
    Explicit,
}

/// A dry-run contract call handed to the chain client.
#[derive(Debug, Clone)]
pub struct ContractCall {
    pub address: Address,
    pub function: Function,
    pub args: Vec<Token>,
    pub from: Option<Address>,
    pub value: Option<U256>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractReadResponse {
    pub contract: String,
    pub function: String,
    pub source: ContractSource,
    pub result: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub success: bool,
    pub will_revert: bool,
    pub contract: String,
    pub function: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalanceResponse {
    pub token: String,
    pub owner: String,
    #[serde(serialize_with = "serialize_u256_dec")]
    pub amount: U256,
    pub formatted: String,
    pub symbol: Option<String>,
    pub decimals: u8,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NftOwnerResponse {
    pub token: String,
    pub token_id: String,
    pub owner: String,
}
