// src/blockchain/mod.rs

pub mod chains;
pub mod client;
pub mod error;
pub mod evm_client;
pub mod models;
pub mod services;
pub mod wallet_store;

// Re-export commonly used types
pub use error::{ClientError, EffectError, EffectResult};
pub use ethers::types::{Address, H256, U256};
