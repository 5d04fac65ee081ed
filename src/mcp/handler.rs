//! # MCP Handler Module
//!
//! Implements the Model Context Protocol for the wallet server: `initialize`,
//! `tools/list` and `tools/call`. Each tool validates its arguments, calls into
//! the container's effects and renders a text summary next to the structured
//! result.
//!
//! ## Tools
//!
//! - Wallet: `connect_wallet`, `disconnect_wallet`, `get_current_account`,
//!   `get_balance`, `sign_message`, `sign_typed_data`, `set_wallet_type`,
//!   `import_private_key`, `remove_private_key`, `list_imported_wallets`,
//!   `send_transaction`
//! - Chains: `get_chains`, `get_chain`, `add_chain`, `update_chain`,
//!   `remove_chain`, `switch_chain`
//! - Transactions: `estimate_gas`, `get_transaction_status`,
//!   `get_transaction_receipt`, `resolve_ens_name`, `simulate_transaction`
//! - Contracts: `list_contracts`, `load_contracts`, `read_contract`,
//!   `write_contract`, `get_token_balance`, `get_nft_owner`

use ethers::types::transaction::eip712::TypedData;
use serde_json::{json, Value};
use tracing::{error, info};

use crate::{
    blockchain::{
        error::EffectError,
        models::{NativeCurrency, TransactionStatus, WalletMode},
        services::transactions::ContractTarget,
        wallet_store::expand_home,
    },
    mcp::{
        arguments::*,
        protocol::{error_codes, Request, Response},
        tools::tool_definitions,
    },
    utils::{self, format_units, parse_amount, parse_hex_data},
    AppState,
};

// Helper: produce a result Value that always contains a text content array
// and preserves structured data for JSON-friendly clients.
fn make_texty_result(text: String, payload: Value) -> Value {
    let content = json!([{ "type": "text", "text": text }]);
    match payload {
        Value::Object(mut map) => {
            // Do not overwrite if caller already set content
            if !map.contains_key("content") {
                map.insert("content".into(), content);
            }
            Value::Object(map)
        }
        other => json!({
            "data": other,
            "content": content
        }),
    }
}

/// Map a core error onto a JSON-RPC error, keeping its message.
pub fn effect_error(req_id: &Value, err: EffectError) -> Response {
    let code = match &err {
        EffectError::Validation(_) | EffectError::NotFound(_) | EffectError::Conflict(_) => {
            error_codes::INVALID_PARAMS
        }
        EffectError::Transport(_) => {
            error!("Chain client failure: {}", err);
            error_codes::INTERNAL_ERROR
        }
    };
    Response::error(req_id.clone(), code, err.to_string())
}

fn ok(req_id: &Value, text: String, payload: Value) -> Result<Response, Response> {
    Ok(Response::success(req_id.clone(), make_texty_result(text, payload)))
}

/// This is the main dispatcher for all incoming MCP requests.
pub async fn handle_mcp_request(req: Request, state: AppState) -> Option<Response> {
    info!("Handling MCP request for method: {}", req.method);

    if req.is_notification() {
        return None;
    }

    let response = match req.method.as_str() {
        "initialize" => handle_initialize(&req),
        "tools/list" => handle_tools_list(&req),
        "tools/call" => handle_tool_call(req, state).await,
        _ => Response::error(
            req.id,
            error_codes::METHOD_NOT_FOUND,
            format!("Method not found: {}", req.method),
        ),
    };

    Some(response)
}

/// Handles a 'tools/call' request by dispatching it to the correct tool logic.
async fn handle_tool_call(req: Request, state: AppState) -> Response {
    let params = match req.params.as_ref() {
        Some(p) => p,
        None => {
            return Response::error(
                req.id,
                error_codes::INVALID_PARAMS,
                "Missing 'params' object".into(),
            )
        }
    };

    let tool_name = match params.get("name").and_then(|n| n.as_str()) {
        Some(name) => name,
        None => {
            return Response::error(
                req.id,
                error_codes::INVALID_PARAMS,
                "Missing 'name' field in params".into(),
            )
        }
    };

    let empty_args = json!({});
    let args = params.get("arguments").unwrap_or(&empty_args);
    let req_id = &req.id;
    let container = state.container.as_ref();
    let wallet = container.wallet();
    let fail = |e: EffectError| effect_error(req_id, e);

    let res: Result<Response, Response> = match tool_name {
        // --- Wallet ---
        "connect_wallet" => {
            (async {
                let a: AddressArgs = utils::parse_args(args, req_id)?;
                let account = wallet.connect_wallet(&a.address).await.map_err(fail)?;
                ok(
                    req_id,
                    format!("Connected {} on chain {} ({} mode)", a.address, account.chain_id, account.wallet_mode),
                    json!(account),
                )
            })
            .await
        }
        "disconnect_wallet" => {
            let account = wallet.disconnect_wallet().await;
            ok(req_id, "Wallet disconnected".to_string(), json!(account))
        }
        "get_current_account" => {
            let account = wallet.get_current_account().await;
            let text = match &account.address {
                Some(address) => format!(
                    "Connected: {} on chain {} ({} mode)",
                    address, account.chain_id, account.wallet_mode
                ),
                None => format!(
                    "No wallet connected. Current chain {} ({} mode)",
                    account.chain_id, account.wallet_mode
                ),
            };
            ok(req_id, text, json!(account))
        }
        "get_balance" => {
            (async {
                let a: OptionalAddressArgs = utils::parse_args(args, req_id)?;
                let balance = wallet.get_balance(a.address.as_deref()).await.map_err(fail)?;
                ok(
                    req_id,
                    format!(
                        "Balance of {}: {} {}",
                        balance.address,
                        format_units(balance.amount, balance.decimals),
                        balance.symbol
                    ),
                    json!(balance),
                )
            })
            .await
        }
        "sign_message" => {
            (async {
                let a: SignMessageArgs = utils::parse_args(args, req_id)?;
                let signature = wallet.sign_message(&a.message).await.map_err(fail)?;
                ok(req_id, format!("Signature: {}", signature), json!({ "signature": signature }))
            })
            .await
        }
        "sign_typed_data" => {
            (async {
                let a: SignTypedDataArgs = utils::parse_args(args, req_id)?;
                let typed: TypedData = serde_json::from_value(json!({
                    "domain": a.domain,
                    "types": a.types,
                    "primaryType": a.primary_type,
                    "message": a.message,
                }))
                .map_err(|e| fail(EffectError::validation(format!("Invalid typed data: {}", e))))?;
                let signature = wallet.sign_typed_data(&typed).await.map_err(fail)?;
                ok(req_id, format!("Signature: {}", signature), json!({ "signature": signature }))
            })
            .await
        }
        "set_wallet_type" => {
            (async {
                let a: SetWalletTypeArgs = utils::parse_args(args, req_id)?;
                let mode: WalletMode = a.wallet_type.parse().map_err(fail)?;
                let account = wallet.set_wallet_type(mode).await;
                ok(req_id, format!("Wallet mode set to {}", mode), json!(account))
            })
            .await
        }
        "import_private_key" => {
            (async {
                let a: ImportPrivateKeyArgs = utils::parse_args(args, req_id)?;
                let imported = wallet.import_private_key(&a.private_key).await.map_err(fail)?;
                ok(
                    req_id,
                    format!("Imported private key for {}", imported.address),
                    json!(imported),
                )
            })
            .await
        }
        "remove_private_key" => {
            (async {
                let a: AddressArgs = utils::parse_args(args, req_id)?;
                let removed = wallet.remove_private_key(&a.address).await.map_err(fail)?;
                let text = if removed {
                    format!("Removed private key for {}", a.address)
                } else {
                    format!("No private key stored for {}", a.address)
                };
                ok(req_id, text, json!({ "address": a.address, "removed": removed }))
            })
            .await
        }
        "list_imported_wallets" => {
            let wallets = wallet.list_imported_wallets().await;
            let text = if wallets.is_empty() {
                "No imported wallets".to_string()
            } else {
                wallets
                    .iter()
                    .map(|w| {
                        if w.connected {
                            format!("{} (connected)", w.address)
                        } else {
                            w.address.clone()
                        }
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            };
            ok(req_id, text, json!({ "wallets": wallets }))
        }
        "send_transaction" => {
            (async {
                let a: SendTransactionArgs = utils::parse_args(args, req_id)?;
                let value = a.value.as_deref().map(|v| parse_amount(v, "value")).transpose().map_err(fail)?;
                let data = a.data.as_deref().map(|d| parse_hex_data(d, "data")).transpose().map_err(fail)?;
                let sent = wallet.send_transaction(&a.to, value, data).await.map_err(fail)?;
                ok(req_id, format!("Transaction sent: {}", sent.tx_hash), json!(sent))
            })
            .await
        }

        // --- Chains ---
        "get_chains" => {
            let chains = container.chains().get_all_chains();
            let text = chains
                .iter()
                .map(|c| format!("{} ({}){}", c.name, c.id, if c.custom { " [custom]" } else { "" }))
                .collect::<Vec<_>>()
                .join("\n");
            ok(req_id, text, json!({ "chains": chains }))
        }
        "get_chain" => {
            (async {
                let a: ChainIdArgs = utils::parse_args(args, req_id)?;
                let chain = container.chains().get_chain(a.chain_id as u64).ok_or_else(|| {
                    fail(EffectError::not_found(format!("Chain {} does not exist", a.chain_id)))
                })?;
                ok(req_id, format!("{} ({})", chain.name, chain.id), json!(chain))
            })
            .await
        }
        "add_chain" => {
            (async {
                let a: AddChainArgs = utils::parse_args(args, req_id)?;
                let chain = container
                    .chains()
                    .add_chain(
                        a.chain_id,
                        &a.name,
                        &a.rpc_url,
                        NativeCurrency::from(a.native_currency),
                        a.block_explorer_url.as_deref(),
                    )
                    .map_err(fail)?;
                ok(req_id, format!("Added chain {} ({})", chain.name, chain.id), json!(chain))
            })
            .await
        }
        "update_chain" => {
            (async {
                let a: UpdateChainArgs = utils::parse_args(args, req_id)?;
                let (id, update) = a.into_update();
                let chain = container.chains().update_chain(id, update).map_err(fail)?;
                ok(req_id, format!("Updated chain {} ({})", chain.name, chain.id), json!(chain))
            })
            .await
        }
        "remove_chain" => {
            (async {
                let a: ChainIdArgs = utils::parse_args(args, req_id)?;
                let chain = wallet.remove_chain(a.chain_id as u64).await.map_err(fail)?;
                ok(req_id, format!("Removed chain {} ({})", chain.name, chain.id), json!(chain))
            })
            .await
        }
        "switch_chain" => {
            (async {
                let a: ChainIdArgs = utils::parse_args(args, req_id)?;
                let chain = wallet.switch_chain(a.chain_id as u64).await.map_err(fail)?;
                ok(req_id, format!("Switched to {} ({})", chain.name, chain.id), json!(chain))
            })
            .await
        }

        // --- Transactions ---
        "estimate_gas" => {
            (async {
                let a: EstimateGasArgs = utils::parse_args(args, req_id)?;
                let fees = container
                    .transactions()
                    .estimate_gas(&a.to, a.value.as_deref(), a.data.as_deref(), a.from.as_deref())
                    .await
                    .map_err(fail)?;
                ok(
                    req_id,
                    format!(
                        "Estimated gas {} at {} wei: {} {}",
                        fees.estimated_gas, fees.gas_price, fees.total_fee_formatted, fees.denom
                    ),
                    json!(fees),
                )
            })
            .await
        }
        "get_transaction_status" => {
            (async {
                let a: HashArgs = utils::parse_args(args, req_id)?;
                let status = container
                    .transactions()
                    .get_transaction_status(&a.hash)
                    .await
                    .map_err(fail)?;
                let text = match &status {
                    TransactionStatus::NotFound { hash } => format!("Transaction {} not found", hash),
                    TransactionStatus::Pending { hash } => format!("Transaction {} is pending", hash),
                    TransactionStatus::Confirmed { hash, block_number } => {
                        format!("Transaction {} confirmed in block {}", hash, block_number)
                    }
                };
                ok(req_id, text, json!(status))
            })
            .await
        }
        "get_transaction_receipt" => {
            (async {
                let a: HashArgs = utils::parse_args(args, req_id)?;
                let receipt = container
                    .transactions()
                    .get_transaction_receipt(&a.hash)
                    .await
                    .map_err(fail)?;
                match receipt {
                    Some(r) => {
                        let outcome = match r.success {
                            Some(true) => "succeeded",
                            Some(false) => "failed",
                            None => "has no status",
                        };
                        ok(
                            req_id,
                            format!(
                                "Transaction {} {} (fee {} {})",
                                r.transaction_hash, outcome, r.cost_formatted, r.symbol
                            ),
                            json!({ "receipt": r }),
                        )
                    }
                    None => ok(
                        req_id,
                        format!("No receipt for {} yet", a.hash),
                        json!({ "receipt": null }),
                    ),
                }
            })
            .await
        }
        "resolve_ens_name" => {
            (async {
                let a: EnsArgs = utils::parse_args(args, req_id)?;
                let resolved = container
                    .transactions()
                    .resolve_ens_name(&a.name)
                    .await
                    .map_err(fail)?;
                let text = match &resolved.address {
                    Some(address) => format!("{} resolves to {}", resolved.name, address),
                    None => format!("{} does not resolve to an address", resolved.name),
                };
                ok(req_id, text, json!(resolved))
            })
            .await
        }
        "simulate_transaction" => {
            (async {
                let a: ContractCallArgs = utils::parse_args(args, req_id)?;
                let sim = container
                    .transactions()
                    .simulate_transaction(contract_target(&a), a.value.as_deref())
                    .await
                    .map_err(fail)?;
                let text = if sim.success {
                    format!("Simulation of {} succeeded", sim.function)
                } else if sim.will_revert {
                    format!(
                        "Simulation of {} would revert: {}",
                        sim.function,
                        sim.error.clone().unwrap_or_default()
                    )
                } else {
                    format!(
                        "Simulation of {} failed: {}",
                        sim.function,
                        sim.error.clone().unwrap_or_default()
                    )
                };
                ok(req_id, text, json!(sim))
            })
            .await
        }

        // --- Contracts ---
        "list_contracts" => {
            let names = container.contracts().names();
            ok(req_id, names.join("\n"), json!({ "contracts": names }))
        }
        "load_contracts" => {
            (async {
                let a: LoadContractsArgs = utils::parse_args(args, req_id)?;
                let path = expand_home(&a.path);
                let names = container.contracts().load_file(&path).map_err(|e| {
                    Response::error(req_id.clone(), error_codes::INVALID_PARAMS, format!("{:#}", e))
                })?;
                ok(
                    req_id,
                    format!("Loaded {} contract(s) from {}", names.len(), path.display()),
                    json!({ "loaded": names }),
                )
            })
            .await
        }
        "read_contract" => {
            (async {
                let a: ContractCallArgs = utils::parse_args(args, req_id)?;
                let read = container
                    .transactions()
                    .read_contract(contract_target(&a))
                    .await
                    .map_err(fail)?;
                ok(req_id, format!("{} returned {}", read.function, read.result), json!(read))
            })
            .await
        }
        "write_contract" => {
            (async {
                let a: ContractCallArgs = utils::parse_args(args, req_id)?;
                let sent = container
                    .transactions()
                    .write_contract(contract_target(&a), a.value.as_deref())
                    .await
                    .map_err(fail)?;
                ok(
                    req_id,
                    format!("write {}.{} sent: {}", a.contract, a.function_name, sent.tx_hash),
                    json!(sent),
                )
            })
            .await
        }
        "get_token_balance" => {
            (async {
                let a: TokenBalanceArgs = utils::parse_args(args, req_id)?;
                let balance = container
                    .transactions()
                    .get_token_balance(&a.token, a.owner.as_deref())
                    .await
                    .map_err(fail)?;
                ok(
                    req_id,
                    format!(
                        "{} holds {} {}",
                        balance.owner,
                        balance.formatted,
                        balance.symbol.clone().unwrap_or_else(|| balance.token.clone())
                    ),
                    json!(balance),
                )
            })
            .await
        }
        "get_nft_owner" => {
            (async {
                let a: NftOwnerArgs = utils::parse_args(args, req_id)?;
                let owner = container
                    .transactions()
                    .get_nft_owner(&a.token, &a.token_id)
                    .await
                    .map_err(fail)?;
                ok(
                    req_id,
                    format!("Token {} of {} is owned by {}", owner.token_id, owner.token, owner.owner),
                    json!(owner),
                )
            })
            .await
        }
        _ => Err(Response::error(
            req_id.clone(),
            error_codes::METHOD_NOT_FOUND,
            format!("Tool not found: {}", tool_name),
        )),
    };

    res.unwrap_or_else(|err_resp| err_resp)
}

fn contract_target(args: &ContractCallArgs) -> ContractTarget<'_> {
    ContractTarget {
        contract: &args.contract,
        address: args.address.as_deref(),
        function: &args.function_name,
        args: &args.args,
    }
}

/// Handles the 'initialize' request.
fn handle_initialize(req: &Request) -> Response {
    let server_info = json!({
        "name": "evm_mcp",
        "version": env!("CARGO_PKG_VERSION")
    });
    let capabilities = json!({ "tools": { "listChanged": false } });
    let instructions = "EVM wallet MCP server: connect a mock or private-key wallet, manage chains, \
        estimate fees, track transactions, resolve ENS names and read, write or simulate contract calls.";

    Response::success(
        req.id.clone(),
        json!({
            "serverInfo": server_info,
            "protocolVersion": "2025-06-18",
            "capabilities": capabilities,
            "instructions": instructions
        }),
    )
}

/// Handles the 'tools/list' request by returning a JSON definition of all available tools.
fn handle_tools_list(req: &Request) -> Response {
    Response::success(req.id.clone(), json!({ "tools": tool_definitions() }))
}
