//! Wallet store: connection state and imported private keys.
//!
//! All state lives behind a single async mutex. Commands that change state hold
//! the guard for their whole duration, so a connect can never interleave with a
//! disconnect or a mode switch.

use chrono::{DateTime, Utc};
use ethers::core::k256::ecdsa::SigningKey;
use ethers::types::Address;
use ethers::utils::secret_key_to_address;
use secrecy::{ExposeSecret, SecretString};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use tokio::sync::{Mutex, MutexGuard};
use zeroize::{Zeroize, Zeroizing};

use crate::blockchain::error::{EffectError, EffectResult};
use crate::blockchain::models::{ImportedWallet, WalletMode};
use crate::utils::{is_hex_of_len, to_checksum_string};

/// Fixed development accounts usable in mock mode.
pub const MOCK_ADDRESSES: [&str; 3] = [
    "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266",
    "0x70997970C51812dc3A010C7d01b50e0d17dc79C8",
    "0x3C44CdDdB6a900fa2b585dd299e03d12FA4293BC",
];

pub fn is_mock_address(address: &str) -> bool {
    MOCK_ADDRESSES.iter().any(|m| m.eq_ignore_ascii_case(address))
}

/// 32 bytes of secp256k1 secret key material, zeroed on drop.
pub struct PrivateKey(Zeroizing<[u8; 32]>);

impl PrivateKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub fn expose(&self) -> &[u8; 32] {
        &self.0
    }

    /// Overwrite the key material with zeros in place.
    pub fn wipe(&mut self) {
        self.0.zeroize();
    }

    pub fn is_wiped(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    pub fn address(&self) -> EffectResult<Address> {
        let signing_key = SigningKey::from_slice(self.expose())
            .map_err(|_| EffectError::validation("Private key is not a valid secp256k1 secret"))?;
        Ok(secret_key_to_address(&signing_key))
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(<redacted>)")
    }
}

/// Where a private key passed to `import_private_key` comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    Raw,
    File(PathBuf),
    EnvVar(String),
}

impl KeySource {
    /// `0x` prefix wins, then anything path-like, else an environment variable name.
    pub fn classify(input: &str) -> Self {
        let input = input.trim();
        if input.starts_with("0x") {
            KeySource::Raw
        } else if input.contains('/') || input.starts_with('~') {
            KeySource::File(expand_home(input))
        } else {
            KeySource::EnvVar(input.to_string())
        }
    }

    pub fn describe(&self) -> String {
        match self {
            KeySource::Raw => "raw key".to_string(),
            KeySource::File(path) => format!("file {}", path.display()),
            KeySource::EnvVar(name) => format!("environment variable {}", name),
        }
    }
}

pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest.trim_start_matches('/'));
        }
    }
    PathBuf::from(path)
}

/// Turn an import input into key material.
///
/// Keys read from a file or an environment variable may omit the `0x` prefix.
pub fn load_private_key(input: &str) -> EffectResult<PrivateKey> {
    let source = KeySource::classify(input);
    let secret: SecretString = match &source {
        KeySource::Raw => SecretString::new(input.trim().to_string()),
        KeySource::File(path) => {
            let content = std::fs::read_to_string(path).map_err(|e| {
                EffectError::validation(format!(
                    "Could not read private key file {}: {}",
                    path.display(),
                    e
                ))
            })?;
            SecretString::new(content.trim().to_string())
        }
        KeySource::EnvVar(name) => {
            let value = std::env::var(name).map_err(|_| {
                EffectError::validation(format!(
                    "'{}' is not a 0x-prefixed private key, a file path, or a set environment variable",
                    name
                ))
            })?;
            SecretString::new(value.trim().to_string())
        }
    };

    let text = secret.expose_secret();
    let normalized = if source != KeySource::Raw && !text.starts_with("0x") {
        Zeroizing::new(format!("0x{}", text))
    } else {
        Zeroizing::new(text.clone())
    };
    if !is_hex_of_len(&normalized, 64) {
        return Err(EffectError::validation(format!(
            "Invalid private key from {}: expected 0x followed by 64 hex characters",
            source.describe()
        )));
    }

    let mut bytes = Zeroizing::new([0u8; 32]);
    hex::decode_to_slice(&normalized[2..], bytes.as_mut_slice())
        .map_err(|_| EffectError::validation("Invalid private key: not valid hex"))?;
    let key = PrivateKey::from_bytes(*bytes);
    key.address()?;
    Ok(key)
}

struct StoredKey {
    key: PrivateKey,
    imported_at: DateTime<Utc>,
}

/// Connection state plus the private-key store.
pub struct WalletState {
    pub mode: WalletMode,
    /// Connected address exactly as the caller supplied it
    pub connected: Option<String>,
    pub chain_id: u64,
    keys: BTreeMap<Address, StoredKey>,
}

impl WalletState {
    fn new(mode: WalletMode, chain_id: u64) -> Self {
        Self {
            mode,
            connected: None,
            chain_id,
            keys: BTreeMap::new(),
        }
    }

    pub fn connected_address(&self) -> EffectResult<Option<Address>> {
        self.connected
            .as_deref()
            .map(|a| crate::utils::parse_address(a, "connected address"))
            .transpose()
    }

    pub fn has_key(&self, address: &Address) -> bool {
        self.keys.contains_key(address)
    }

    pub(crate) fn key(&self, address: &Address) -> Option<&PrivateKey> {
        self.keys.get(address).map(|stored| &stored.key)
    }

    /// Insert or silently replace the key stored for its address.
    pub fn insert_key(&mut self, key: PrivateKey) -> EffectResult<Address> {
        let address = key.address()?;
        if let Some(mut previous) = self.keys.insert(
            address,
            StoredKey {
                key,
                imported_at: Utc::now(),
            },
        ) {
            previous.key.wipe();
        }
        Ok(address)
    }

    /// Zero the stored key, then drop the entry. `false` when absent.
    pub fn remove_key(&mut self, address: &Address) -> bool {
        match self.keys.get_mut(address) {
            Some(stored) => {
                stored.key.wipe();
                self.keys.remove(address);
                true
            }
            None => false,
        }
    }

    pub fn imported_wallets(&self) -> Vec<ImportedWallet> {
        let connected = self.connected_address().ok().flatten();
        self.keys
            .iter()
            .map(|(address, stored)| ImportedWallet {
                address: to_checksum_string(address),
                imported_at: stored.imported_at,
                connected: self.mode == WalletMode::PrivateKey && connected == Some(*address),
            })
            .collect()
    }

    fn wipe_all_keys(&mut self) {
        for stored in self.keys.values_mut() {
            stored.key.wipe();
        }
        self.keys.clear();
    }
}

pub struct WalletStore {
    state: Mutex<WalletState>,
    default_mode: WalletMode,
    default_chain_id: u64,
}

impl WalletStore {
    pub fn new(default_mode: WalletMode, default_chain_id: u64) -> Self {
        Self {
            state: Mutex::new(WalletState::new(default_mode, default_chain_id)),
            default_mode,
            default_chain_id,
        }
    }

    pub async fn lock(&self) -> MutexGuard<'_, WalletState> {
        self.state.lock().await
    }

    /// Back to the initial disconnected state with an empty key store.
    pub fn restore_defaults(&self, state: &mut WalletState) {
        state.wipe_all_keys();
        state.connected = None;
        state.mode = self.default_mode;
        state.chain_id = self.default_chain_id;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    // Anvil's first development key; its address is MOCK_ADDRESSES[0].
    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn classifies_inputs_in_precedence_order() {
        assert_eq!(KeySource::classify(DEV_KEY), KeySource::Raw);
        assert!(matches!(KeySource::classify("/tmp/key.txt"), KeySource::File(_)));
        assert!(matches!(KeySource::classify("~/keys/dev"), KeySource::File(_)));
        assert!(matches!(KeySource::classify("keys/dev"), KeySource::File(_)));
        assert_eq!(KeySource::classify("DEV_PRIVATE_KEY"), KeySource::EnvVar("DEV_PRIVATE_KEY".to_string()));
    }

    #[test]
    fn derives_address_from_raw_key() {
        let key = load_private_key(DEV_KEY).unwrap();
        assert_eq!(to_checksum_string(&key.address().unwrap()), MOCK_ADDRESSES[0]);
    }

    #[test]
    fn reads_trimmed_key_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "  {}  ", DEV_KEY.trim_start_matches("0x")).unwrap();
        let key = load_private_key(file.path().to_str().unwrap()).unwrap();
        assert_eq!(to_checksum_string(&key.address().unwrap()), MOCK_ADDRESSES[0]);
    }

    #[test]
    fn rejects_malformed_keys() {
        assert!(load_private_key("0x1234").unwrap_err().is_validation());
        assert!(load_private_key(&format!("0x{}", "zz".repeat(32))).unwrap_err().is_validation());
        assert!(load_private_key(&format!("0x{}", "00".repeat(32))).unwrap_err().is_validation());
        assert!(load_private_key("EVM_WALLET_MCP_SURELY_UNSET_VAR").unwrap_err().is_validation());
        assert!(load_private_key("/definitely/not/here.key").unwrap_err().is_validation());
    }

    #[test]
    fn wipe_zeroes_material() {
        let mut key = load_private_key(DEV_KEY).unwrap();
        assert!(!key.is_wiped());
        key.wipe();
        assert!(key.is_wiped());
        assert_eq!(format!("{:?}", key), "PrivateKey(<redacted>)");
    }

    #[tokio::test]
    async fn reimport_overwrites_and_remove_is_idempotent() {
        let store = WalletStore::new(WalletMode::PrivateKey, 1);
        let mut state = store.lock().await;
        let first = state.insert_key(load_private_key(DEV_KEY).unwrap()).unwrap();
        let second = state.insert_key(load_private_key(DEV_KEY).unwrap()).unwrap();
        assert_eq!(first, second);
        assert_eq!(state.imported_wallets().len(), 1);

        assert!(state.remove_key(&first));
        assert!(!state.remove_key(&first));
        assert!(state.imported_wallets().is_empty());
    }

    #[tokio::test]
    async fn reset_restores_defaults() {
        let store = WalletStore::new(WalletMode::Mock, 1);
        let mut state = store.lock().await;
        state.insert_key(load_private_key(DEV_KEY).unwrap()).unwrap();
        state.mode = WalletMode::PrivateKey;
        state.connected = Some(MOCK_ADDRESSES[0].to_string());
        state.chain_id = 10;

        store.restore_defaults(&mut state);
        assert_eq!(state.mode, WalletMode::Mock);
        assert!(state.connected.is_none());
        assert_eq!(state.chain_id, 1);
        assert!(state.imported_wallets().is_empty());
    }
}
