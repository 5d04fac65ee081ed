// src/mcp/tools.rs

use serde_json::{json, Value};

/// JSON definitions of every tool, as returned by `tools/list`.
pub fn tool_definitions() -> Value {
    let contract_call = json!({
        "type": "object",
        "properties": {
            "contract": {"type": "string", "description": "Loaded contract name, built-in standard tag ('erc20', 'erc721', optionally prefixed 'builtin:')."},
            "address": {"type": "string", "description": "Explicit 0x... contract address. Required for built-in tags."},
            "functionName": {"type": "string", "description": "Function to call."},
            "args": {"type": "array", "description": "Function arguments in ABI order. Integers as decimal strings."},
            "value": {"type": "string", "description": "Native value to attach, in the smallest unit."}
        },
        "required": ["contract", "functionName"],
        "additionalProperties": false
    });
    let native_currency = json!({
        "type": "object",
        "properties": {
            "name": {"type": "string"},
            "symbol": {"type": "string"},
            "decimals": {"type": "integer", "minimum": 0, "maximum": 255}
        },
        "required": ["name", "symbol", "decimals"]
    });

    json!([
        // --- Wallet ---
        {
            "name": "connect_wallet",
            "description": "Connect a wallet. In mock mode the address must be one of the development accounts; in private-key mode it must have an imported key.",
            "inputSchema": {
                "type": "object",
                "properties": {"address": {"type": "string", "description": "The 0x... address to connect."}},
                "required": ["address"],
                "additionalProperties": false
            }
        },
        {
            "name": "disconnect_wallet",
            "description": "Disconnect the current wallet.",
            "inputSchema": { "type": "object", "properties": {}, "additionalProperties": false }
        },
        {
            "name": "get_current_account",
            "description": "Show the connected address, current chain and wallet mode.",
            "inputSchema": { "type": "object", "properties": {}, "additionalProperties": false }
        },
        {
            "name": "get_balance",
            "description": "Get the native balance of an address (defaults to the connected wallet) on the current chain.",
            "inputSchema": {
                "type": "object",
                "properties": {"address": {"type": "string", "description": "The 0x... address to check."}},
                "additionalProperties": false
            }
        },
        {
            "name": "sign_message",
            "description": "Sign a plain-text message with the connected wallet.",
            "inputSchema": {
                "type": "object",
                "properties": {"message": {"type": "string"}},
                "required": ["message"],
                "additionalProperties": false
            }
        },
        {
            "name": "sign_typed_data",
            "description": "Sign EIP-712 typed data with the connected wallet.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "domain": {"type": "object"},
                    "types": {"type": "object"},
                    "primaryType": {"type": "string"},
                    "message": {"type": "object"}
                },
                "required": ["domain", "types", "primaryType", "message"],
                "additionalProperties": false
            }
        },
        {
            "name": "set_wallet_type",
            "description": "Switch between 'mock' and 'privateKey' wallet modes. Switching modes disconnects the current wallet.",
            "inputSchema": {
                "type": "object",
                "properties": {"type": {"type": "string", "enum": ["mock", "privateKey"]}},
                "required": ["type"],
                "additionalProperties": false
            }
        },
        {
            "name": "import_private_key",
            "description": "Import a private key: a 0x-prefixed key, a path to a key file, or the name of an environment variable holding the key.",
            "inputSchema": {
                "type": "object",
                "properties": {"privateKey": {"type": "string"}},
                "required": ["privateKey"],
                "additionalProperties": false
            }
        },
        {
            "name": "remove_private_key",
            "description": "Remove an imported private key.",
            "inputSchema": {
                "type": "object",
                "properties": {"address": {"type": "string"}},
                "required": ["address"],
                "additionalProperties": false
            }
        },
        {
            "name": "list_imported_wallets",
            "description": "List the addresses of imported private keys.",
            "inputSchema": { "type": "object", "properties": {}, "additionalProperties": false }
        },
        {
            "name": "send_transaction",
            "description": "Send native value and/or calldata from the connected wallet on the current chain.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "to": {"type": "string"},
                    "value": {"type": "string", "description": "Amount in the smallest unit (wei)."},
                    "data": {"type": "string", "description": "0x-prefixed calldata."}
                },
                "required": ["to"],
                "additionalProperties": false
            }
        },
        // --- Chains ---
        {
            "name": "get_chains",
            "description": "List built-in and custom chains.",
            "inputSchema": { "type": "object", "properties": {}, "additionalProperties": false }
        },
        {
            "name": "get_chain",
            "description": "Get a chain by id.",
            "inputSchema": {
                "type": "object",
                "properties": {"chainId": {"type": "integer"}},
                "required": ["chainId"],
                "additionalProperties": false
            }
        },
        {
            "name": "add_chain",
            "description": "Add a custom EVM chain.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "chainId": {"type": "integer"},
                    "name": {"type": "string"},
                    "rpcUrl": {"type": "string"},
                    "nativeCurrency": native_currency,
                    "blockExplorerUrl": {"type": "string"}
                },
                "required": ["chainId", "name", "rpcUrl", "nativeCurrency"],
                "additionalProperties": false
            }
        },
        {
            "name": "update_chain",
            "description": "Update fields of a custom chain.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "chainId": {"type": "integer"},
                    "name": {"type": "string"},
                    "rpcUrl": {"type": "string"},
                    "nativeCurrency": native_currency,
                    "blockExplorerUrl": {"type": "string"}
                },
                "required": ["chainId"],
                "additionalProperties": false
            }
        },
        {
            "name": "remove_chain",
            "description": "Remove a custom chain. The current chain cannot be removed.",
            "inputSchema": {
                "type": "object",
                "properties": {"chainId": {"type": "integer"}},
                "required": ["chainId"],
                "additionalProperties": false
            }
        },
        {
            "name": "switch_chain",
            "description": "Switch the current chain.",
            "inputSchema": {
                "type": "object",
                "properties": {"chainId": {"type": "integer"}},
                "required": ["chainId"],
                "additionalProperties": false
            }
        },
        // --- Transactions ---
        {
            "name": "estimate_gas",
            "description": "Estimate gas and total fee for a transaction on the current chain.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "to": {"type": "string"},
                    "value": {"type": "string"},
                    "data": {"type": "string"},
                    "from": {"type": "string", "description": "Defaults to the connected wallet."}
                },
                "required": ["to"],
                "additionalProperties": false
            }
        },
        {
            "name": "get_transaction_status",
            "description": "Report whether a transaction is not_found, pending or confirmed.",
            "inputSchema": {
                "type": "object",
                "properties": {"hash": {"type": "string"}},
                "required": ["hash"],
                "additionalProperties": false
            }
        },
        {
            "name": "get_transaction_receipt",
            "description": "Get a transaction receipt with its fee, or null if none exists yet.",
            "inputSchema": {
                "type": "object",
                "properties": {"hash": {"type": "string"}},
                "required": ["hash"],
                "additionalProperties": false
            }
        },
        {
            "name": "resolve_ens_name",
            "description": "Resolve an ENS name to an address. Requires the current chain to be Ethereum mainnet.",
            "inputSchema": {
                "type": "object",
                "properties": {"name": {"type": "string"}},
                "required": ["name"],
                "additionalProperties": false
            }
        },
        {
            "name": "simulate_transaction",
            "description": "Dry-run a contract function and report whether it would revert.",
            "inputSchema": contract_call.clone()
        },
        // --- Contracts ---
        {
            "name": "list_contracts",
            "description": "List built-in standards and loaded contract names.",
            "inputSchema": { "type": "object", "properties": {}, "additionalProperties": false }
        },
        {
            "name": "load_contracts",
            "description": "Load contract definitions from a JSON file.",
            "inputSchema": {
                "type": "object",
                "properties": {"path": {"type": "string"}},
                "required": ["path"],
                "additionalProperties": false
            }
        },
        {
            "name": "read_contract",
            "description": "Call a view function and return the decoded result.",
            "inputSchema": contract_call.clone()
        },
        {
            "name": "write_contract",
            "description": "Send a transaction calling a contract function from the connected wallet.",
            "inputSchema": contract_call
        },
        {
            "name": "get_token_balance",
            "description": "ERC-20 balance of an owner (defaults to the connected wallet). The token may be a loaded name or an address.",
            "inputSchema": {
                "type": "object",
                "properties": {"token": {"type": "string"}, "owner": {"type": "string"}},
                "required": ["token"],
                "additionalProperties": false
            }
        },
        {
            "name": "get_nft_owner",
            "description": "Owner of an ERC-721 token. The token may be a loaded name or an address.",
            "inputSchema": {
                "type": "object",
                "properties": {"token": {"type": "string"}, "tokenId": {"type": "string"}},
                "required": ["token", "tokenId"],
                "additionalProperties": false
            }
        }
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn tool_names_are_unique_and_have_schemas() {
        let tools = tool_definitions();
        let tools = tools.as_array().unwrap();
        let mut names = HashSet::new();
        for tool in tools {
            let name = tool["name"].as_str().unwrap();
            assert!(names.insert(name.to_string()), "duplicate tool {}", name);
            assert_eq!(tool["inputSchema"]["type"], "object");
        }
        assert!(names.contains("simulate_transaction"));
    }
}
