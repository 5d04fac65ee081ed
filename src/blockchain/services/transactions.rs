// src/blockchain/services/transactions.rs

use ethers::abi::Token;
use ethers::types::{transaction::eip2718::TypedTransaction, TransactionRequest, U256};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::blockchain::{
    chains::{ChainRegistry, MAINNET_CHAIN_ID},
    client::{ChainClient, ChainClientFactory},
    error::{ClientError, EffectError, EffectResult},
    models::{
        ContractCall, ContractReadResponse, EnsResolution, EstimateFeesResponse, NftOwnerResponse,
        ReceiptSummary, SimulationResult, TokenBalanceResponse, TransactionResponse, TransactionStatus,
    },
    services::{
        contract::{encode_args, tokens_to_json, BuiltinStandard, ContractRegistry, ResolvedContract},
        wallet::WalletEffects,
    },
};
use crate::utils::{format_units, parse_address, parse_amount, parse_hex_data, parse_tx_hash, to_checksum_string};

/// Substrings that mark a failed call as a revert. Only used when the client
/// did not already report a structured `Reverted` error.
const REVERT_MARKERS: [&str; 2] = ["revert", "execution reverted"];

pub fn is_revert_message(message: &str) -> bool {
    REVERT_MARKERS.iter().any(|m| message.contains(m))
}

fn checked_fee(gas: U256, price: U256) -> EffectResult<U256> {
    gas.checked_mul(price)
        .ok_or_else(|| EffectError::validation("Fee does not fit in 256 bits"))
}

/// A contract reference as it arrives from a tool call.
#[derive(Debug, Clone, Default)]
pub struct ContractTarget<'a> {
    pub contract: &'a str,
    pub address: Option<&'a str>,
    pub function: &'a str,
    pub args: &'a [Value],
}

pub struct TransactionEffects {
    wallet: Arc<WalletEffects>,
    chains: Arc<ChainRegistry>,
    contracts: Arc<ContractRegistry>,
    clients: Arc<dyn ChainClientFactory>,
}

impl TransactionEffects {
    pub fn new(
        wallet: Arc<WalletEffects>,
        chains: Arc<ChainRegistry>,
        contracts: Arc<ContractRegistry>,
        clients: Arc<dyn ChainClientFactory>,
    ) -> Self {
        Self {
            wallet,
            chains,
            contracts,
            clients,
        }
    }

    pub async fn estimate_gas(
        &self,
        to: &str,
        value: Option<&str>,
        data: Option<&str>,
        from: Option<&str>,
    ) -> EffectResult<EstimateFeesResponse> {
        let to = parse_address(to, "recipient")?;
        let from = self.wallet.resolve_account(from, "from address").await?;
        let mut request = TransactionRequest::new().from(from).to(to);
        if let Some(value) = value {
            request = request.value(parse_amount(value, "value")?);
        }
        if let Some(data) = data {
            request = request.data(parse_hex_data(data, "data")?);
        }
        let tx: TypedTransaction = request.into();

        let (chain, client) = self.wallet.current_client().await?;
        let estimated_gas = client.estimate_gas(&tx).await?;
        let gas_price = client.get_gas_price().await?;
        let total_fee = checked_fee(estimated_gas, gas_price)?;
        Ok(EstimateFeesResponse {
            estimated_gas,
            gas_price,
            total_fee,
            total_fee_formatted: format_units(total_fee, chain.native_currency.decimals),
            denom: chain.native_currency.symbol,
        })
    }

    pub async fn get_transaction_status(&self, hash: &str) -> EffectResult<TransactionStatus> {
        let parsed = parse_tx_hash(hash)?;
        let (_, client) = self.wallet.current_client().await?;
        let hash = hash.to_string();
        match client.get_transaction(parsed).await {
            Ok(tx) => Ok(match tx.block_number {
                Some(block_number) => TransactionStatus::Confirmed { hash, block_number },
                None => TransactionStatus::Pending { hash },
            }),
            Err(ClientError::NotFound(_)) => Ok(TransactionStatus::NotFound { hash }),
            Err(e) => Err(e.into()),
        }
    }

    /// `None` while the chain has no receipt for `hash`.
    pub async fn get_transaction_receipt(&self, hash: &str) -> EffectResult<Option<ReceiptSummary>> {
        let parsed = parse_tx_hash(hash)?;
        let (chain, client) = self.wallet.current_client().await?;
        let receipt = match client.get_transaction_receipt(parsed).await {
            Ok(receipt) => receipt,
            Err(ClientError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let cost = checked_fee(receipt.gas_used, receipt.effective_gas_price)?;
        Ok(Some(ReceiptSummary {
            transaction_hash: format!("{:?}", receipt.transaction_hash),
            block_number: receipt.block_number,
            from: to_checksum_string(&receipt.from),
            to: receipt.to.as_ref().map(to_checksum_string),
            contract_address: receipt.contract_address.as_ref().map(to_checksum_string),
            success: receipt.status.map(|s| s == 1),
            gas_used: receipt.gas_used,
            effective_gas_price: receipt.effective_gas_price,
            cost,
            cost_formatted: format_units(cost, chain.native_currency.decimals),
            symbol: chain.native_currency.symbol,
        }))
    }

    /// Resolve an ENS name. Only allowed while the wallet is on mainnet.
    pub async fn resolve_ens_name(&self, name: &str) -> EffectResult<EnsResolution> {
        let current = self.wallet.current_chain().await?;
        if current.id != MAINNET_CHAIN_ID {
            return Err(EffectError::validation(format!(
                "ENS resolution requires Ethereum mainnet (chain {}); current chain is {}. Switch chains first",
                MAINNET_CHAIN_ID, current.id
            )));
        }
        let mainnet = self
            .chains
            .get_chain(MAINNET_CHAIN_ID)
            .ok_or_else(|| EffectError::not_found("Ethereum mainnet is not configured"))?;
        let client = self.clients.fresh_client(&mainnet)?;
        let address = client.resolve_ens_address(name).await?;
        Ok(EnsResolution {
            name: name.to_string(),
            address: address.as_ref().map(to_checksum_string),
        })
    }

    async fn prepare(
        &self,
        target: &ContractTarget<'_>,
        default_standard: Option<BuiltinStandard>,
    ) -> EffectResult<(ResolvedContract, Arc<dyn ChainClient>, ContractCall)> {
        let (chain, client) = self.wallet.current_client().await?;
        let resolved = self
            .contracts
            .resolve(target.contract, target.address, chain.id, default_standard)?;
        let function = resolved.function(target.function, target.args.len())?.clone();
        let args = encode_args(&function, target.args)?;
        let call = ContractCall {
            address: resolved.address,
            function,
            args,
            from: self.wallet.connected_address().await?,
            value: None,
        };
        Ok((resolved, client, call))
    }

    /// Dry-run a contract function and classify the outcome.
    pub async fn simulate_transaction(
        &self,
        target: ContractTarget<'_>,
        value: Option<&str>,
    ) -> EffectResult<SimulationResult> {
        let (resolved, client, mut call) = self.prepare(&target, None).await?;
        call.value = value.map(|v| parse_amount(v, "value")).transpose()?;
        let contract = to_checksum_string(&resolved.address);
        let function = call.function.name.clone();

        let outcome = client.simulate_call(&call).await;
        let result = match outcome {
            Ok(tokens) => SimulationResult {
                success: true,
                will_revert: false,
                contract,
                function,
                result: Some(tokens_to_json(&tokens)),
                error: None,
            },
            Err(err) => {
                let will_revert = match &err {
                    ClientError::Reverted(_) => true,
                    other => is_revert_message(other.message()),
                };
                SimulationResult {
                    success: false,
                    will_revert,
                    contract,
                    function,
                    result: None,
                    error: Some(err.message().to_string()),
                }
            }
        };
        info!(
            "Simulated {}.{}: success={} will_revert={}",
            result.contract, result.function, result.success, result.will_revert
        );
        Ok(result)
    }

    pub async fn read_contract(&self, target: ContractTarget<'_>) -> EffectResult<ContractReadResponse> {
        let (resolved, client, call) = self.prepare(&target, None).await?;
        let tokens = client.simulate_call(&call).await?;
        Ok(ContractReadResponse {
            contract: to_checksum_string(&resolved.address),
            function: call.function.name.clone(),
            source: resolved.source,
            result: tokens_to_json(&tokens),
        })
    }

    /// Encode the call and send it from the connected wallet.
    pub async fn write_contract(
        &self,
        target: ContractTarget<'_>,
        value: Option<&str>,
    ) -> EffectResult<TransactionResponse> {
        let (resolved, _, call) = self.prepare(&target, None).await?;
        let value = value.map(|v| parse_amount(v, "value")).transpose()?;
        let data = call
            .function
            .encode_input(&call.args)
            .map_err(|e| EffectError::validation(format!("Cannot encode call: {}", e)))?;
        debug!(
            "Writing {}.{} ({} bytes of calldata)",
            to_checksum_string(&resolved.address),
            call.function.name,
            data.len()
        );
        self.wallet.send(resolved.address, value, Some(data.into())).await
    }

    fn view_call(resolved: &ResolvedContract, function: &str, args: Vec<Token>) -> EffectResult<ContractCall> {
        Ok(ContractCall {
            address: resolved.address,
            function: resolved.function(function, args.len())?.clone(),
            args,
            from: None,
            value: None,
        })
    }

    async fn call_view(
        &self,
        client: &Arc<dyn ChainClient>,
        resolved: &ResolvedContract,
        function: &str,
        args: Vec<Token>,
    ) -> EffectResult<Vec<Token>> {
        let call = Self::view_call(resolved, function, args)?;
        Ok(client.simulate_call(&call).await?)
    }

    pub async fn get_token_balance(&self, token: &str, owner: Option<&str>) -> EffectResult<TokenBalanceResponse> {
        let owner = self.wallet.resolve_account(owner, "owner").await?;
        let (chain, client) = self.wallet.current_client().await?;
        let resolved = self
            .contracts
            .resolve(token, None, chain.id, Some(BuiltinStandard::Erc20))?;

        let amount = match self
            .call_view(&client, &resolved, "balanceOf", vec![Token::Address(owner)])
            .await?
            .first()
        {
            Some(Token::Uint(amount)) => *amount,
            other => {
                return Err(EffectError::Transport(format!(
                    "Unexpected balanceOf result: {:?}",
                    other
                )))
            }
        };
        let decimals = match self.call_view(&client, &resolved, "decimals", vec![]).await?.first() {
            Some(Token::Uint(d)) if *d <= U256::from(u8::MAX) => d.as_u32() as u8,
            other => {
                return Err(EffectError::Transport(format!(
                    "Unexpected decimals result: {:?}",
                    other
                )))
            }
        };
        // symbol() is optional in ERC-20; only a revert or unreadable output is tolerated.
        let symbol_call = Self::view_call(&resolved, "symbol", vec![])?;
        let symbol = match client.simulate_call(&symbol_call).await {
            Ok(tokens) => match tokens.first() {
                Some(Token::String(s)) => Some(s.clone()),
                _ => None,
            },
            Err(e @ (ClientError::Reverted(_) | ClientError::Decode(_))) => {
                warn!("Token {} has no readable symbol: {}", token, e);
                None
            }
            Err(e) => return Err(e.into()),
        };

        Ok(TokenBalanceResponse {
            token: to_checksum_string(&resolved.address),
            owner: to_checksum_string(&owner),
            amount,
            formatted: format_units(amount, decimals),
            symbol,
            decimals,
        })
    }

    pub async fn get_nft_owner(&self, token: &str, token_id: &str) -> EffectResult<NftOwnerResponse> {
        let id = parse_amount(token_id, "token id")?;
        let (chain, client) = self.wallet.current_client().await?;
        let resolved = self
            .contracts
            .resolve(token, None, chain.id, Some(BuiltinStandard::Erc721))?;
        let owner = match self
            .call_view(&client, &resolved, "ownerOf", vec![Token::Uint(id)])
            .await?
            .first()
        {
            Some(Token::Address(owner)) => *owner,
            other => {
                return Err(EffectError::Transport(format!(
                    "Unexpected ownerOf result: {:?}",
                    other
                )))
            }
        };
        Ok(NftOwnerResponse {
            token: to_checksum_string(&resolved.address),
            token_id: id.to_string(),
            owner: to_checksum_string(&owner),
        })
    }
}
