// src/blockchain/error.rs

use thiserror::Error;

/// Errors surfaced by the wallet, chain, contract and transaction effects.
///
/// Messages are written for the caller: validation errors name the rule that was
/// violated, transport errors carry the chain client's message unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EffectError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Transport(String),
}

impl EffectError {
    pub fn validation(msg: impl Into<String>) -> Self {
        EffectError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        EffectError::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        EffectError::Conflict(msg.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, EffectError::Validation(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, EffectError::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, EffectError::Conflict(_))
    }
}

/// Failures reported by an injected chain client.
///
/// `NotFound` and `Reverted` are structured signals. `Decode` means the node
/// answered but the return data does not match the ABI. Anything the adapter
/// cannot classify is a `Transport` failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Reverted(String),
    #[error("{0}")]
    Decode(String),
    #[error("{0}")]
    Transport(String),
}

impl ClientError {
    pub fn message(&self) -> &str {
        match self {
            ClientError::NotFound(m)
            | ClientError::Reverted(m)
            | ClientError::Decode(m)
            | ClientError::Transport(m) => m,
        }
    }
}

impl From<ClientError> for EffectError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::NotFound(msg) => EffectError::NotFound(msg),
            ClientError::Reverted(msg) | ClientError::Decode(msg) | ClientError::Transport(msg) => {
                EffectError::Transport(msg)
            }
        }
    }
}

pub type EffectResult<T> = Result<T, EffectError>;
