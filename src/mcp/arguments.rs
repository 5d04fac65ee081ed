// src/mcp/arguments.rs

//! Typed, validated arguments for each tool.
//!
//! Field names follow the tool schemas in `tools.rs` (camelCase on the wire).

use serde::Deserialize;
use serde_json::Value;
use validator::Validate;

use crate::blockchain::models::{ChainUpdate, NativeCurrency};
use crate::utils::{validate_address, validate_decimal_amount, validate_hex_data, validate_tx_hash};

#[derive(Debug, Deserialize, Validate)]
pub struct AddressArgs {
    #[validate(custom = "validate_address")]
    pub address: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct OptionalAddressArgs {
    #[validate(custom = "validate_address")]
    pub address: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SignMessageArgs {
    #[validate(length(min = 1, message = "message must not be empty"))]
    pub message: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignTypedDataArgs {
    pub domain: Value,
    pub types: Value,
    #[validate(length(min = 1, message = "primaryType must not be empty"))]
    pub primary_type: String,
    pub message: Value,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SetWalletTypeArgs {
    #[serde(rename = "type")]
    #[validate(length(min = 1))]
    pub wallet_type: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ImportPrivateKeyArgs {
    #[validate(length(min = 1, message = "privateKey must not be empty"))]
    pub private_key: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SendTransactionArgs {
    #[validate(custom = "validate_address")]
    pub to: String,
    #[validate(custom = "validate_decimal_amount")]
    pub value: Option<String>,
    #[validate(custom = "validate_hex_data")]
    pub data: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct EstimateGasArgs {
    #[validate(custom = "validate_address")]
    pub to: String,
    #[validate(custom = "validate_decimal_amount")]
    pub value: Option<String>,
    #[validate(custom = "validate_hex_data")]
    pub data: Option<String>,
    #[validate(custom = "validate_address")]
    pub from: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChainIdArgs {
    #[validate(range(min = 1, message = "chainId must be a positive integer"))]
    pub chain_id: i64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NativeCurrencyArgs {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,
    #[validate(length(min = 1, message = "symbol must not be empty"))]
    pub symbol: String,
    #[validate(range(min = 0, max = 255, message = "decimals must be between 0 and 255"))]
    pub decimals: i64,
}

impl From<NativeCurrencyArgs> for NativeCurrency {
    fn from(args: NativeCurrencyArgs) -> Self {
        NativeCurrency {
            name: args.name,
            symbol: args.symbol,
            // Range checked by validation.
            decimals: args.decimals.clamp(0, u8::MAX as i64) as u8,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddChainArgs {
    // Sign and range are checked by the chain registry.
    pub chain_id: i64,
    pub name: String,
    #[validate(url(message = "rpcUrl must be a URL"))]
    pub rpc_url: String,
    #[validate]
    pub native_currency: NativeCurrencyArgs,
    #[validate(url(message = "blockExplorerUrl must be a URL"))]
    pub block_explorer_url: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateChainArgs {
    #[validate(range(min = 1, message = "chainId must be a positive integer"))]
    pub chain_id: i64,
    pub name: Option<String>,
    #[validate(url(message = "rpcUrl must be a URL"))]
    pub rpc_url: Option<String>,
    #[validate]
    pub native_currency: Option<NativeCurrencyArgs>,
    #[validate(url(message = "blockExplorerUrl must be a URL"))]
    pub block_explorer_url: Option<String>,
}

impl UpdateChainArgs {
    pub fn into_update(self) -> (u64, ChainUpdate) {
        (
            self.chain_id as u64,
            ChainUpdate {
                name: self.name,
                rpc_url: self.rpc_url,
                native_currency: self.native_currency.map(NativeCurrency::from),
                block_explorer_url: self.block_explorer_url,
            },
        )
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct HashArgs {
    #[validate(custom = "validate_tx_hash")]
    pub hash: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct EnsArgs {
    #[validate(length(min = 3, message = "name must be an ENS name such as vitalik.eth"))]
    pub name: String,
}

/// Shared by `read_contract`, `write_contract` and `simulate_transaction`.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ContractCallArgs {
    #[validate(length(min = 1, message = "contract must not be empty"))]
    pub contract: String,
    #[validate(custom = "validate_address")]
    pub address: Option<String>,
    #[validate(length(min = 1, message = "functionName must not be empty"))]
    pub function_name: String,
    #[serde(default)]
    pub args: Vec<Value>,
    #[validate(custom = "validate_decimal_amount")]
    pub value: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoadContractsArgs {
    #[validate(length(min = 1, message = "path must not be empty"))]
    pub path: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TokenBalanceArgs {
    #[validate(length(min = 1))]
    pub token: String,
    #[validate(custom = "validate_address")]
    pub owner: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NftOwnerArgs {
    #[validate(length(min = 1))]
    pub token: String,
    #[validate(custom = "validate_decimal_amount")]
    pub token_id: String,
}
