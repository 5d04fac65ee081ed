// src/config.rs

use anyhow::{Context, Result};
use secrecy::SecretString;
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use crate::blockchain::models::WalletMode;
use crate::blockchain::wallet_store::expand_home;

pub const DEFAULT_MOCK_RPC_URL: &str = "http://127.0.0.1:8545";
pub const DEFAULT_MOCK_CHAIN_ID: u64 = 31337;

// All configuration, loaded once at startup from the environment (and .env).
#[derive(Debug)]
pub struct Config {
    // Server settings
    pub port: u16,

    /// Chain the wallet starts on; must be a known chain.
    pub default_chain_id: u64,
    /// Per-chain RPC URL overrides for the built-in chains.
    pub chain_rpc_urls: HashMap<u64, String>,

    // Wallet settings
    pub wallet_mode: WalletMode,
    /// Import inputs (raw key, key file path or env var name) imported at startup.
    pub private_keys: Vec<SecretString>,
    pub contracts_file: Option<PathBuf>,

    // Mock connector
    pub mock_rpc_url: String,
    pub mock_chain_id: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            default_chain_id: 1,
            chain_rpc_urls: HashMap::new(),
            wallet_mode: WalletMode::Mock,
            private_keys: Vec::new(),
            contracts_file: None,
            mock_rpc_url: DEFAULT_MOCK_RPC_URL.to_string(),
            mock_chain_id: DEFAULT_MOCK_CHAIN_ID,
        }
    }
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        // Load variables from the .env file into the environment
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let port = match lookup("PORT") {
            Some(v) => v.trim().parse().context("PORT must be a valid number")?,
            None => defaults.port,
        };

        let default_chain_id = match lookup("DEFAULT_CHAIN_ID") {
            Some(v) => v
                .trim()
                .parse()
                .context("DEFAULT_CHAIN_ID must be a valid number")?,
            None => defaults.default_chain_id,
        };

        let chain_rpc_urls = match lookup("CHAIN_RPC_URLS") {
            Some(raw) if !raw.trim().is_empty() => {
                let by_key: HashMap<String, String> = serde_json::from_str(&raw)
                    .context("CHAIN_RPC_URLS must be a JSON map of chain_id -> RPC URL")?;
                by_key
                    .into_iter()
                    .map(|(id, url)| {
                        let id = id
                            .trim()
                            .parse::<u64>()
                            .with_context(|| format!("Invalid chain id '{}' in CHAIN_RPC_URLS", id))?;
                        Ok((id, url))
                    })
                    .collect::<Result<HashMap<_, _>>>()?
            }
            _ => HashMap::new(),
        };

        let wallet_mode = match lookup("WALLET_MODE") {
            Some(v) => v.parse::<WalletMode>().map_err(anyhow::Error::msg)?,
            None => defaults.wallet_mode,
        };

        let private_keys = lookup("PRIVATE_KEYS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| SecretString::new(s.to_string()))
                    .collect()
            })
            .unwrap_or_default();

        let contracts_file = lookup("CONTRACTS_FILE")
            .filter(|p| !p.trim().is_empty())
            .map(|p| expand_home(p.trim()));

        let mock_rpc_url = lookup("MOCK_RPC_URL").unwrap_or(defaults.mock_rpc_url);
        let mock_chain_id = match lookup("MOCK_CHAIN_ID") {
            Some(v) => v.trim().parse().context("MOCK_CHAIN_ID must be a valid number")?,
            None => defaults.mock_chain_id,
        };

        Ok(Config {
            port,
            default_chain_id,
            chain_rpc_urls,
            wallet_mode,
            private_keys,
            contracts_file,
            mock_rpc_url,
            mock_chain_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.default_chain_id, 1);
        assert_eq!(config.wallet_mode, WalletMode::Mock);
        assert!(config.chain_rpc_urls.is_empty());
        assert!(config.private_keys.is_empty());
        assert_eq!(config.mock_chain_id, 31337);
    }

    #[test]
    fn parses_all_variables() {
        let config = Config::from_lookup(lookup_from(&[
            ("PORT", "9000"),
            ("DEFAULT_CHAIN_ID", "11155111"),
            ("CHAIN_RPC_URLS", r#"{"1":"https://eth.example.com"}"#),
            ("WALLET_MODE", "private_key"),
            ("PRIVATE_KEYS", " DEV_KEY , ~/keys/dev ,"),
            ("CONTRACTS_FILE", "/etc/contracts.json"),
            ("MOCK_CHAIN_ID", "1337"),
        ]))
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.default_chain_id, 11155111);
        assert_eq!(config.chain_rpc_urls.get(&1).map(String::as_str), Some("https://eth.example.com"));
        assert_eq!(config.wallet_mode, WalletMode::PrivateKey);
        let keys: Vec<&str> = config.private_keys.iter().map(|k| k.expose_secret().as_str()).collect();
        assert_eq!(keys, vec!["DEV_KEY", "~/keys/dev"]);
        assert_eq!(config.contracts_file, Some(PathBuf::from("/etc/contracts.json")));
        assert_eq!(config.mock_chain_id, 1337);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(Config::from_lookup(lookup_from(&[("PORT", "eighty")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("CHAIN_RPC_URLS", "not json")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("CHAIN_RPC_URLS", r#"{"one":"https://x"}"#)])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("WALLET_MODE", "ledger")])).is_err());
    }
}
