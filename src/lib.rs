#![recursion_limit = "256"]
// src/lib.rs

use std::sync::Arc;

// Re-export commonly used types
pub use ethers::types::{Address, H256, U256};

pub mod api;
pub mod blockchain;
pub mod config;
pub mod container;
pub mod mcp;
pub mod utils;

/// Application state shared across all request handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::Config>,
    /// Registries, wallet store and effects for this process
    pub container: Arc<container::Container>,
}

impl AppState {
    pub fn new(config: config::Config, container: container::Container) -> Self {
        Self {
            config: Arc::new(config),
            container: Arc::new(container),
        }
    }
}
