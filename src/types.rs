//! Account addresses, signer principals and key derivation for StakeBridge

use crate::error::BridgeError;
use serde::{Deserialize, Serialize};

/// Length of an account address in bytes.
pub const ADDRESS_LEN: usize = 20;

/// Length of a validator public key in bytes.
pub const VALIDATOR_PUBKEY_LEN: usize = 32;

/// Type alias for a fixed-length account address.
pub type Address = [u8; ADDRESS_LEN];

/// Type alias for a validator public key.
pub type ValidatorPubKey = [u8; VALIDATOR_PUBKEY_LEN];

/// Application realm under which signing principals are registered.
const SIGNER_REALM: &str = "sigs";

/// Module prefix of the account-sequence namespace in application state.
const SEQUENCE_NAMESPACE: &str = "nonce";

/// Convert an address to a hex string for display.
pub fn address_to_hex(addr: &Address) -> String {
    hex::encode(addr)
}

/// Parse a hex string (optionally `0x`-prefixed) into an address.
pub fn address_from_hex(hex_str: &str) -> Result<Address, BridgeError> {
    let stripped = hex_str.strip_prefix("0x").unwrap_or(hex_str);
    let bytes = hex::decode(stripped)
        .map_err(|e| BridgeError::InvalidInput(format!("Invalid hex address: {}", e)))?;
    if bytes.len() != ADDRESS_LEN {
        return Err(BridgeError::InvalidInput(format!(
            "Address must be {} bytes, got {}",
            ADDRESS_LEN,
            bytes.len()
        )));
    }
    bytes
        .try_into()
        .map_err(|_| BridgeError::InvalidInput("Failed to convert bytes into address".to_string()))
}

/// Parse a hex string into a validator public key.
pub fn validator_pubkey_from_hex(hex_str: &str) -> Result<ValidatorPubKey, BridgeError> {
    let stripped = hex_str.strip_prefix("0x").unwrap_or(hex_str);
    let bytes = hex::decode(stripped)
        .map_err(|e| BridgeError::InvalidInput(format!("Invalid hex public key: {}", e)))?;
    if bytes.len() != VALIDATOR_PUBKEY_LEN {
        return Err(BridgeError::InvalidInput(format!(
            "Validator public key must be {} bytes, got {}",
            VALIDATOR_PUBKEY_LEN,
            bytes.len()
        )));
    }
    bytes.try_into().map_err(|_| {
        BridgeError::InvalidInput("Failed to convert bytes into public key".to_string())
    })
}

/// A signing principal: an account address registered under a permission
/// realm. The ordered set of these tokens authorizing a transaction is the
/// signer set.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SignerToken {
    pub realm: String,
    pub address: Address,
}

impl SignerToken {
    /// Deterministically map an account address to its signing principal.
    pub fn from_address(address: &Address) -> Self {
        SignerToken {
            realm: SIGNER_REALM.to_string(),
            address: *address,
        }
    }

    /// Canonical byte encoding used in state keys: `realm/<address bytes>`.
    fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.realm.len() + 1 + ADDRESS_LEN);
        out.extend_from_slice(self.realm.as_bytes());
        out.push(b'/');
        out.extend_from_slice(&self.address);
        out
    }
}

/// Composite application-state key holding the sequence counter for a signer
/// set: the `nonce` module prefix joined with the sorted canonical encoding
/// of every signer. Sorting makes the key independent of caller ordering.
pub fn sequence_key(signers: &[SignerToken]) -> Vec<u8> {
    let mut sorted: Vec<&SignerToken> = signers.iter().collect();
    sorted.sort();

    let mut key = Vec::new();
    key.extend_from_slice(SEQUENCE_NAMESPACE.as_bytes());
    for signer in sorted {
        key.push(b'/');
        key.extend_from_slice(&signer.canonical_bytes());
    }
    key
}
