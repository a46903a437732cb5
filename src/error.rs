//! Error types for StakeBridge

use std::fmt;

/// Failure kinds surfaced by the bridge. Every remote failure is returned to
/// the immediate caller with enough structure to decide whether to retry; the
/// bridge itself never retries.
#[derive(Debug, Clone)]
pub enum BridgeError {
    /// The chain id has not yet been learned from the consensus engine.
    /// Retryable once startup completes.
    ChainNotReady,
    /// The key-management subsystem has no account for the given address.
    SignerNotFound(String),
    /// A signature slot exists but no signer address was supplied.
    AddressRequired,
    /// Structurally invalid envelope or transaction. Not retryable without
    /// changing the input.
    ValidationError(String),
    /// Network/RPC failure talking to a collaborator. Retryable.
    TransportError(String),
    /// A binary payload did not match the expected shape. Indicates
    /// protocol/version skew; not retried.
    DecodeError(String),
    /// The engine accepted the transport but refused the transaction before
    /// it entered a block. Carries the engine-provided code and log.
    ExecutionRejected { code: u32, log: String },
    /// A proposal-store operation failed. Recoverable by the caller.
    PersistenceError(String),
    /// Malformed caller-supplied input (hex, identifiers, indices).
    InvalidInput(String),
    CryptoError(String),
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BridgeError::ChainNotReady => {
                write!(f, "Chain id not yet known; wait for the engine to finish starting up")
            }
            BridgeError::SignerNotFound(msg) => write!(f, "Signer not found: {}", msg),
            BridgeError::AddressRequired => {
                write!(f, "Address is required to sign this transaction")
            }
            BridgeError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            BridgeError::TransportError(msg) => write!(f, "Transport error: {}", msg),
            BridgeError::DecodeError(msg) => write!(f, "Decode error: {}", msg),
            BridgeError::ExecutionRejected { code, log } => {
                write!(f, "Execution rejected by engine (code {}): {}", code, log)
            }
            BridgeError::PersistenceError(msg) => write!(f, "Persistence error: {}", msg),
            BridgeError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            BridgeError::CryptoError(msg) => write!(f, "Cryptographic error: {}", msg),
        }
    }
}

impl std::error::Error for BridgeError {}

impl From<Box<bincode::ErrorKind>> for BridgeError {
    fn from(err: Box<bincode::ErrorKind>) -> Self {
        BridgeError::DecodeError(err.to_string())
    }
}

impl From<rusqlite::Error> for BridgeError {
    fn from(err: rusqlite::Error) -> Self {
        BridgeError::PersistenceError(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, BridgeError>;
