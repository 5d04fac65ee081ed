// src/blockchain/services/contract.rs

//! Contract registry and reference resolution.
//!
//! A contract reference is resolved to an address + ABI pair in a fixed order:
//! built-in standard tags, then loaded definitions, then (when the caller names a
//! default standard) a bare address. Resolution never touches the network.

use anyhow::{Context, Result};
use ethers::abi::{parse_abi, Abi, Function, ParamType, Token};
use ethers::types::{Address, I256, U256};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::str::FromStr;
use std::sync::RwLock;
use tracing::{info, warn};

use crate::blockchain::error::{EffectError, EffectResult};
use crate::blockchain::models::ContractSource;
use crate::utils::{is_address, parse_address, to_checksum_string};

const ERC20_ABI: &[&str] = &[
    "function name() view returns (string)",
    "function symbol() view returns (string)",
    "function decimals() view returns (uint8)",
    "function totalSupply() view returns (uint256)",
    "function balanceOf(address owner) view returns (uint256)",
    "function allowance(address owner, address spender) view returns (uint256)",
    "function transfer(address to, uint256 amount) returns (bool)",
    "function approve(address spender, uint256 amount) returns (bool)",
    "function transferFrom(address from, address to, uint256 amount) returns (bool)",
    "event Transfer(address indexed from, address indexed to, uint256 value)",
    "event Approval(address indexed owner, address indexed spender, uint256 value)",
];

const ERC721_ABI: &[&str] = &[
    "function name() view returns (string)",
    "function symbol() view returns (string)",
    "function tokenURI(uint256 tokenId) view returns (string)",
    "function balanceOf(address owner) view returns (uint256)",
    "function ownerOf(uint256 tokenId) view returns (address)",
    "function getApproved(uint256 tokenId) view returns (address)",
    "function isApprovedForAll(address owner, address operator) view returns (bool)",
    "function approve(address to, uint256 tokenId)",
    "function setApprovalForAll(address operator, bool approved)",
    "function transferFrom(address from, address to, uint256 tokenId)",
    "function safeTransferFrom(address from, address to, uint256 tokenId)",
    "function safeTransferFrom(address from, address to, uint256 tokenId, bytes data)",
    "event Transfer(address indexed from, address indexed to, uint256 indexed tokenId)",
];

/// Token interfaces bundled with the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinStandard {
    Erc20,
    Erc721,
}

impl BuiltinStandard {
    pub const ALL: [BuiltinStandard; 2] = [BuiltinStandard::Erc20, BuiltinStandard::Erc721];

    pub fn tag(&self) -> &'static str {
        match self {
            BuiltinStandard::Erc20 => "erc20",
            BuiltinStandard::Erc721 => "erc721",
        }
    }

    /// Accepts `erc20`, `ERC-20`, `builtin:erc20` and similar spellings.
    pub fn from_tag(identifier: &str) -> Option<Self> {
        let lowered = identifier.trim().to_lowercase();
        let bare = lowered.strip_prefix("builtin:").unwrap_or(&lowered).replace(['-', '_'], "");
        match bare.as_str() {
            "erc20" => Some(BuiltinStandard::Erc20),
            "erc721" => Some(BuiltinStandard::Erc721),
            _ => None,
        }
    }

    fn human_readable(&self) -> &'static [&'static str] {
        match self {
            BuiltinStandard::Erc20 => ERC20_ABI,
            BuiltinStandard::Erc721 => ERC721_ABI,
        }
    }
}

/// A named contract loaded from a definitions file.
#[derive(Debug, Clone)]
pub struct ContractEntry {
    pub name: String,
    pub abi: Abi,
    pub addresses: BTreeMap<u64, Address>,
}

#[derive(Debug, Clone)]
pub struct ResolvedContract {
    pub address: Address,
    pub abi: Abi,
    pub source: ContractSource,
}

impl ResolvedContract {
    /// Find `name`, preferring the overload taking `arg_count` inputs.
    pub fn function(&self, name: &str, arg_count: usize) -> EffectResult<&Function> {
        let overloads = self.abi.functions_by_name(name).map_err(|_| {
            EffectError::not_found(format!(
                "Function '{}' not found in the ABI of {}",
                name,
                to_checksum_string(&self.address)
            ))
        })?;
        overloads
            .iter()
            .find(|f| f.inputs.len() == arg_count)
            .or_else(|| overloads.first())
            .ok_or_else(|| EffectError::not_found(format!("Function '{}' not found in ABI", name)))
    }
}

#[derive(Debug, Deserialize)]
struct DefinitionsFile {
    contracts: Vec<DefinitionEntry>,
}

#[derive(Debug, Deserialize)]
struct DefinitionEntry {
    name: String,
    abi: Value,
    #[serde(default)]
    addresses: HashMap<String, String>,
}

/// Parse a contract-definitions document into registry entries.
pub fn parse_definitions(source: &str) -> Result<Vec<ContractEntry>> {
    let file: DefinitionsFile =
        serde_json::from_str(source).context("Invalid contract definitions JSON")?;
    let mut entries = Vec::with_capacity(file.contracts.len());
    for def in file.contracts {
        let abi: Abi = serde_json::from_value(def.abi)
            .with_context(|| format!("Invalid ABI for contract '{}'", def.name))?;
        let mut addresses = BTreeMap::new();
        for (chain_id, address) in def.addresses {
            let chain_id: u64 = chain_id
                .parse()
                .with_context(|| format!("Invalid chain id '{}' for contract '{}'", chain_id, def.name))?;
            let address = parse_address(&address, "contract address")
                .with_context(|| format!("Invalid address for contract '{}' on chain {}", def.name, chain_id))?;
            addresses.insert(chain_id, address);
        }
        entries.push(ContractEntry {
            name: def.name,
            abi,
            addresses,
        });
    }
    Ok(entries)
}

pub struct ContractRegistry {
    builtins: HashMap<BuiltinStandard, Abi>,
    loaded: RwLock<BTreeMap<String, ContractEntry>>,
}

impl ContractRegistry {
    pub fn with_builtins() -> Result<Self> {
        let mut builtins = HashMap::new();
        for standard in BuiltinStandard::ALL {
            let abi = parse_abi(standard.human_readable())
                .with_context(|| format!("Failed to parse built-in {} ABI", standard.tag()))?;
            builtins.insert(standard, abi);
        }
        Ok(Self {
            builtins,
            loaded: RwLock::new(BTreeMap::new()),
        })
    }

    pub fn builtin_abi(&self, standard: BuiltinStandard) -> EffectResult<Abi> {
        self.builtins
            .get(&standard)
            .cloned()
            .ok_or_else(|| EffectError::not_found(format!("Built-in {} ABI is missing", standard.tag())))
    }

    /// Add entries, replacing earlier loaded entries of the same name. Entries
    /// named like a built-in tag are skipped. Returns the names registered.
    pub fn register(&self, entries: Vec<ContractEntry>) -> Vec<String> {
        let mut loaded = self.loaded.write().unwrap_or_else(|p| p.into_inner());
        let mut names = Vec::new();
        for entry in entries {
            if BuiltinStandard::from_tag(&entry.name).is_some() {
                warn!("Skipping contract '{}': name collides with a built-in standard", entry.name);
                continue;
            }
            names.push(entry.name.clone());
            loaded.insert(entry.name.clone(), entry);
        }
        names
    }

    pub fn load_file(&self, path: &Path) -> Result<Vec<String>> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read contract definitions {}", path.display()))?;
        let entries = parse_definitions(&content)?;
        let names = self.register(entries);
        info!("Loaded {} contract definitions from {}", names.len(), path.display());
        Ok(names)
    }

    /// Built-in tags first, then loaded names in lexical order.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = BuiltinStandard::ALL.iter().map(|s| s.tag().to_string()).collect();
        names.extend(self.loaded.read().unwrap_or_else(|p| p.into_inner()).keys().cloned());
        names
    }

    pub fn entry(&self, name: &str) -> Option<ContractEntry> {
        self.loaded.read().unwrap_or_else(|p| p.into_inner()).get(name).cloned()
    }

    pub fn clear_loaded(&self) {
        self.loaded.write().unwrap_or_else(|p| p.into_inner()).clear();
    }

    pub fn resolve(
        &self,
        identifier: &str,
        explicit_address: Option<&str>,
        chain_id: u64,
        default_standard: Option<BuiltinStandard>,
    ) -> EffectResult<ResolvedContract> {
        resolve(self, identifier, explicit_address, chain_id, default_standard)
    }
}

/// Resolve a contract reference against `registry`.
pub fn resolve(
    registry: &ContractRegistry,
    identifier: &str,
    explicit_address: Option<&str>,
    chain_id: u64,
    default_standard: Option<BuiltinStandard>,
) -> EffectResult<ResolvedContract> {
    let explicit = explicit_address
        .map(|a| parse_address(a, "contract address"))
        .transpose()?;

    if let Some(standard) = BuiltinStandard::from_tag(identifier) {
        let address = explicit.ok_or_else(|| {
            EffectError::validation(format!(
                "Built-in {} contract requires an address",
                standard.tag()
            ))
        })?;
        return Ok(ResolvedContract {
            address,
            abi: registry.builtin_abi(standard)?,
            source: ContractSource::Builtin,
        });
    }

    if let Some(entry) = registry.entry(identifier) {
        let address = match explicit.or_else(|| entry.addresses.get(&chain_id).copied()) {
            Some(address) => address,
            None => {
                return Err(EffectError::not_found(format!(
                    "Contract '{}' has no address on chain {}",
                    identifier, chain_id
                )))
            }
        };
        return Ok(ResolvedContract {
            address,
            abi: entry.abi,
            source: ContractSource::Loaded,
        });
    }

    if let Some(standard) = default_standard {
        if is_address(identifier.trim()) {
            return Ok(ResolvedContract {
                address: parse_address(identifier.trim(), "contract address")?,
                abi: registry.builtin_abi(standard)?,
                source: ContractSource::Explicit,
            });
        }
    }

    Err(EffectError::not_found(format!("Contract '{}' not found", identifier)))
}

/// Convert JSON arguments into ABI tokens for `function`.
pub fn encode_args(function: &Function, args: &[Value]) -> EffectResult<Vec<Token>> {
    if function.inputs.len() != args.len() {
        return Err(EffectError::validation(format!(
            "Function '{}' expects {} argument(s), got {}",
            function.name,
            function.inputs.len(),
            args.len()
        )));
    }
    function
        .inputs
        .iter()
        .zip(args)
        .map(|(param, value)| {
            json_to_token(&param.kind, value).map_err(|msg| {
                EffectError::validation(format!("Invalid argument '{}': {}", param.name, msg))
            })
        })
        .collect()
}

fn json_to_token(kind: &ParamType, value: &Value) -> Result<Token, String> {
    match kind {
        ParamType::Address => {
            let s = value.as_str().ok_or("address must be a string")?;
            if !is_address(s) {
                return Err(format!("'{}' is not an address", s));
            }
            Address::from_str(s).map(Token::Address).map_err(|e| e.to_string())
        }
        ParamType::Uint(_) => {
            let text = scalar_text(value)?;
            U256::from_dec_str(&text)
                .or_else(|_| U256::from_str(&text))
                .map(Token::Uint)
                .map_err(|_| format!("'{}' is not an unsigned integer", text))
        }
        ParamType::Int(_) => {
            let text = scalar_text(value)?;
            I256::from_dec_str(&text)
                .map(|n| Token::Int(n.into_raw()))
                .map_err(|_| format!("'{}' is not an integer", text))
        }
        ParamType::Bool => match value {
            Value::Bool(b) => Ok(Token::Bool(*b)),
            Value::String(s) if s == "true" || s == "false" => Ok(Token::Bool(s == "true")),
            _ => Err("bool must be true or false".to_string()),
        },
        ParamType::String => value
            .as_str()
            .map(|s| Token::String(s.to_string()))
            .ok_or_else(|| "string argument must be a string".to_string()),
        ParamType::Bytes => decode_hex(value).map(Token::Bytes),
        ParamType::FixedBytes(size) => {
            let bytes = decode_hex(value)?;
            if bytes.len() != *size {
                return Err(format!("expected {} bytes, got {}", size, bytes.len()));
            }
            Ok(Token::FixedBytes(bytes))
        }
        ParamType::Array(inner) => {
            let items = value.as_array().ok_or("array argument must be a JSON array")?;
            items
                .iter()
                .map(|item| json_to_token(inner, item))
                .collect::<Result<Vec<_>, _>>()
                .map(Token::Array)
        }
        ParamType::FixedArray(inner, len) => {
            let items = value.as_array().ok_or("array argument must be a JSON array")?;
            if items.len() != *len {
                return Err(format!("expected {} elements, got {}", len, items.len()));
            }
            items
                .iter()
                .map(|item| json_to_token(inner, item))
                .collect::<Result<Vec<_>, _>>()
                .map(Token::FixedArray)
        }
        ParamType::Tuple(components) => {
            let items = value.as_array().ok_or("tuple argument must be a JSON array")?;
            if items.len() != components.len() {
                return Err(format!("expected {} tuple fields, got {}", components.len(), items.len()));
            }
            components
                .iter()
                .zip(items)
                .map(|(kind, item)| json_to_token(kind, item))
                .collect::<Result<Vec<_>, _>>()
                .map(Token::Tuple)
        }
    }
}

fn scalar_text(value: &Value) -> Result<String, String> {
    match value {
        Value::String(s) => Ok(s.trim().to_string()),
        Value::Number(n) if n.is_u64() || n.is_i64() => Ok(n.to_string()),
        _ => Err("numeric argument must be an integer or a decimal string".to_string()),
    }
}

fn decode_hex(value: &Value) -> Result<Vec<u8>, String> {
    let s = value.as_str().ok_or("bytes argument must be a 0x hex string")?;
    let body = s.strip_prefix("0x").ok_or("bytes argument must start with 0x")?;
    hex::decode(body).map_err(|e| e.to_string())
}

/// Render decoded outputs: a single output unwraps, several become an array.
pub fn tokens_to_json(tokens: &[Token]) -> Value {
    match tokens {
        [] => Value::Null,
        [single] => token_to_json(single),
        many => Value::Array(many.iter().map(token_to_json).collect()),
    }
}

pub fn token_to_json(token: &Token) -> Value {
    match token {
        Token::Address(a) => json!(to_checksum_string(a)),
        Token::Uint(n) => json!(n.to_string()),
        Token::Int(n) => json!(I256::from_raw(*n).to_string()),
        Token::Bool(b) => json!(b),
        Token::String(s) => json!(s),
        Token::Bytes(b) | Token::FixedBytes(b) => json!(format!("0x{}", hex::encode(b))),
        Token::Array(items) | Token::FixedArray(items) | Token::Tuple(items) => {
            Value::Array(items.iter().map(token_to_json).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";
    const OTHER: &str = "0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512";

    fn registry_with(name: &str, chain_id: u64, address: &str) -> ContractRegistry {
        let registry = ContractRegistry::with_builtins().unwrap();
        let doc = json!({
            "contracts": [{
                "name": name,
                "abi": [{
                    "type": "function",
                    "name": "counter",
                    "inputs": [],
                    "outputs": [{"name": "", "type": "uint256"}],
                    "stateMutability": "view"
                }],
                "addresses": { chain_id.to_string(): address }
            }]
        });
        registry.register(parse_definitions(&doc.to_string()).unwrap());
        registry
    }

    #[test]
    fn builtin_tag_requires_explicit_address() {
        let registry = ContractRegistry::with_builtins().unwrap();
        let err = registry.resolve("builtin:erc20", None, 1, None).unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("requires an address"));

        let resolved = registry.resolve("ERC20", Some(TOKEN), 1, None).unwrap();
        assert_eq!(resolved.source, ContractSource::Builtin);
        assert!(resolved.abi.function("balanceOf").is_ok());
    }

    #[test]
    fn builtin_wins_over_loaded_entry_with_same_name() {
        let registry = ContractRegistry::with_builtins().unwrap();
        let doc = json!({"contracts": [{"name": "erc20", "abi": [], "addresses": {"1": OTHER}}]});
        let registered = registry.register(parse_definitions(&doc.to_string()).unwrap());
        assert!(registered.is_empty());

        let resolved = registry.resolve("erc20", Some(TOKEN), 1, None).unwrap();
        assert_eq!(resolved.source, ContractSource::Builtin);
        assert_eq!(resolved.address, Address::from_str(TOKEN).unwrap());
        assert!(resolved.abi.function("transfer").is_ok());
    }

    #[test]
    fn loaded_entry_uses_chain_mapping_or_explicit_address() {
        let registry = registry_with("Counter", 31337, TOKEN);

        let resolved = registry.resolve("Counter", None, 31337, None).unwrap();
        assert_eq!(resolved.source, ContractSource::Loaded);
        assert_eq!(resolved.address, Address::from_str(TOKEN).unwrap());

        let overridden = registry.resolve("Counter", Some(OTHER), 31337, None).unwrap();
        assert_eq!(overridden.address, Address::from_str(OTHER).unwrap());

        let err = registry.resolve("Counter", None, 1, None).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn unknown_identifier_is_not_found_unless_default_standard_applies() {
        let registry = ContractRegistry::with_builtins().unwrap();
        assert!(registry.resolve("Nope", None, 1, None).unwrap_err().is_not_found());
        assert!(registry.resolve(TOKEN, None, 1, None).unwrap_err().is_not_found());

        let adhoc = registry.resolve(TOKEN, None, 1, Some(BuiltinStandard::Erc20)).unwrap();
        assert_eq!(adhoc.source, ContractSource::Explicit);
        assert!(adhoc.abi.function("decimals").is_ok());
    }

    #[test]
    fn resolution_is_repeatable() {
        let registry = registry_with("Counter", 1, TOKEN);
        let a = registry.resolve("Counter", None, 1, None).unwrap();
        let b = registry.resolve("Counter", None, 1, None).unwrap();
        assert_eq!(a.address, b.address);
        assert_eq!(a.source, b.source);
        assert_eq!(
            registry.resolve("Missing", None, 1, None).unwrap_err(),
            registry.resolve("Missing", None, 1, None).unwrap_err()
        );
    }

    #[test]
    fn rejects_malformed_definitions() {
        assert!(parse_definitions("{}").is_err());
        let bad_address = json!({"contracts": [{"name": "X", "abi": [], "addresses": {"1": "0x12"}}]});
        assert!(parse_definitions(&bad_address.to_string()).is_err());
        let bad_chain = json!({"contracts": [{"name": "X", "abi": [], "addresses": {"main": TOKEN}}]});
        assert!(parse_definitions(&bad_chain.to_string()).is_err());
    }

    #[test]
    fn picks_overload_by_argument_count() {
        let registry = ContractRegistry::with_builtins().unwrap();
        let resolved = registry.resolve("erc721", Some(TOKEN), 1, None).unwrap();
        assert_eq!(resolved.function("safeTransferFrom", 4).unwrap().inputs.len(), 4);
        assert_eq!(resolved.function("safeTransferFrom", 3).unwrap().inputs.len(), 3);
        assert!(resolved.function("mint", 0).unwrap_err().is_not_found());
    }

    #[test]
    fn encodes_json_arguments() {
        let registry = ContractRegistry::with_builtins().unwrap();
        let resolved = registry.resolve("erc20", Some(TOKEN), 1, None).unwrap();
        let transfer = resolved.function("transfer", 2).unwrap();

        let tokens = encode_args(transfer, &[json!(OTHER), json!(1000)]).unwrap();
        assert_eq!(tokens[1], Token::Uint(U256::from(1000u64)));
        let tokens = encode_args(transfer, &[json!(OTHER), json!("25")]).unwrap();
        assert_eq!(tokens[1], Token::Uint(U256::from(25u64)));

        assert!(encode_args(transfer, &[json!(OTHER)]).unwrap_err().is_validation());
        assert!(encode_args(transfer, &[json!("bob"), json!("1")]).unwrap_err().is_validation());
        assert!(encode_args(transfer, &[json!(OTHER), json!(-1)]).unwrap_err().is_validation());
    }

    #[test]
    fn renders_tokens_as_json() {
        let address = Address::from_str(TOKEN).unwrap();
        assert_eq!(tokens_to_json(&[]), Value::Null);
        assert_eq!(tokens_to_json(&[Token::Uint(U256::from(7u64))]), json!("7"));
        assert_eq!(
            tokens_to_json(&[Token::Address(address), Token::Bool(true)]),
            json!([TOKEN, true])
        );
        assert_eq!(token_to_json(&Token::Bytes(vec![0xde, 0xad])), json!("0xdead"));
        assert_eq!(token_to_json(&Token::Int(I256::from_dec_str("-3").unwrap().into_raw())), json!("-3"));
    }
}
