//! Signing delegation for StakeBridge
//!
//! Byte-level signing belongs to an external key-management capability. The
//! adapter here builds a canonical signing vessel (a minimal external-chain
//! compatible transaction shell that is never broadcast), asks the key
//! manager to sign it under a fixed auxiliary chain id, and attaches the
//! returned signature back onto the envelope through its `Signable`
//! capability. A `LocalKeyStore` backed by secp256k1 is provided for
//! co-located deployments and tests.

use crate::error::{BridgeError, Result};
use crate::types::{Address, ADDRESS_LEN};
use crate::wire;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use secp256k1::{All, Message, PublicKey, Secp256k1, SecretKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;

/// A thread-safe, lazily initialized Secp256k1 context.
/// This prevents repeated, unnecessary context creation.
static SECP256K1_CONTEXT: Lazy<Secp256k1<All>> = Lazy::new(Secp256k1::new);

/// Auxiliary chain-scope identifier used only for the signing vessel.
pub const DEFAULT_AUX_CHAIN_ID: u64 = 15;

/// The optional signing capability of a wrapped transaction: canonical
/// signable bytes out, a completed signature back in. Dispatch is on the
/// presence of this capability, never on concrete type inspection.
pub trait Signable: Send {
    fn sign_bytes(&self) -> Result<Vec<u8>>;
    fn attach_signature(&mut self, address: &Address, signature: Vec<u8>) -> Result<()>;
}

/// An account located by the key-management subsystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub address: Address,
}

/// The canonical signing vessel: an external-chain compatible transaction
/// shell carrying the signable bytes as its payload. Value, gas and
/// recipient are zeroed; the shell is never broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigningShell {
    pub nonce: u64,
    pub recipient: Address,
    pub value: u64,
    pub gas_price: u64,
    pub gas_limit: u64,
    pub payload: Vec<u8>,
}

impl SigningShell {
    pub fn new(payload: Vec<u8>) -> Self {
        SigningShell {
            nonce: 0,
            recipient: [0u8; ADDRESS_LEN],
            value: 0,
            gas_price: 0,
            gas_limit: 0,
            payload,
        }
    }

    /// Bytes the key manager actually signs: the shell plus the auxiliary
    /// chain id, so signatures cannot be replayed under another scope.
    pub fn signing_payload(&self, aux_chain_id: u64) -> Result<Vec<u8>> {
        wire::encode(&(self, aux_chain_id))
    }
}

/// A signed vessel as returned by the key manager.
#[derive(Debug, Clone)]
pub struct SignedShell {
    pub shell: SigningShell,
    pub signature: Vec<u8>,
}

/// Boundary to the external key-management subsystem.
#[async_trait]
pub trait KeyManager: Send + Sync {
    /// Locate the account for an address; `SignerNotFound` when absent.
    async fn find_account(&self, address: &Address) -> Result<Account>;

    /// Produce a signature over the shell under the auxiliary chain id.
    async fn sign_shell(
        &self,
        account: &Account,
        shell: &SigningShell,
        aux_chain_id: u64,
    ) -> Result<SignedShell>;
}

/// Delegates envelope signing to a [`KeyManager`].
pub struct SigningAdapter {
    keys: Arc<dyn KeyManager>,
    aux_chain_id: u64,
}

impl SigningAdapter {
    pub fn new(keys: Arc<dyn KeyManager>, aux_chain_id: u64) -> Self {
        SigningAdapter { keys, aux_chain_id }
    }

    /// Sign a wrapped transaction in place.
    ///
    /// When the envelope exposes no signing capability this is a no-op (some
    /// transactions are unsigned by design). Otherwise a missing signer
    /// address is `AddressRequired`, an unknown account is `SignerNotFound`,
    /// and any failure leaves the envelope unusable for broadcast.
    pub async fn sign(
        &self,
        envelope: &mut crate::envelope::Envelope,
        address: &Address,
    ) -> Result<()> {
        let signable = match envelope.signable_mut() {
            Some(signable) => signable,
            None => return Ok(()),
        };
        if *address == [0u8; ADDRESS_LEN] {
            return Err(BridgeError::AddressRequired);
        }

        let payload = signable.sign_bytes()?;
        let account = self.keys.find_account(address).await?;
        let shell = SigningShell::new(payload);
        let signed = self
            .keys
            .sign_shell(&account, &shell, self.aux_chain_id)
            .await?;

        signable.attach_signature(address, signed.signature)
    }
}

#[derive(Debug, Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generates a new random KeyPair using the OS random number generator.
    pub fn generate() -> Self {
        let secret_key = SecretKey::new(&mut OsRng);
        let public_key = PublicKey::from_secret_key(&SECP256K1_CONTEXT, &secret_key);
        KeyPair {
            secret_key,
            public_key,
        }
    }

    /// Creates a KeyPair from raw secret key bytes.
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self> {
        let secret_key = SecretKey::from_slice(bytes)
            .map_err(|e| BridgeError::CryptoError(format!("Invalid secret key bytes: {}", e)))?;
        let public_key = PublicKey::from_secret_key(&SECP256K1_CONTEXT, &secret_key);
        Ok(KeyPair {
            secret_key,
            public_key,
        })
    }

    /// The account address: the first 20 bytes of the SHA-256 digest of the
    /// compressed public key.
    pub fn address(&self) -> Address {
        let digest = Sha256::digest(self.public_key.serialize());
        let mut address = [0u8; ADDRESS_LEN];
        address.copy_from_slice(&digest[..ADDRESS_LEN]);
        address
    }

    /// Signs a message (hashed with SHA-256 first) and returns the compact
    /// signature bytes.
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        let digest = Sha256::digest(message);
        let message = Message::from_digest_slice(&digest)
            .map_err(|e| BridgeError::CryptoError(format!("Failed to create message: {}", e)))?;
        let signature = SECP256K1_CONTEXT.sign_ecdsa(&message, &self.secret_key);
        Ok(signature.serialize_compact().to_vec())
    }
}

/// In-process key manager holding secp256k1 key pairs. Suitable when the
/// bridge co-locates with its key material; production deployments point the
/// adapter at an external subsystem instead.
#[derive(Default)]
pub struct LocalKeyStore {
    keys: HashMap<Address, KeyPair>,
}

impl LocalKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a key pair, returning the address it answers for.
    pub fn insert(&mut self, keypair: KeyPair) -> Address {
        let address = keypair.address();
        self.keys.insert(address, keypair);
        address
    }
}

#[async_trait]
impl KeyManager for LocalKeyStore {
    async fn find_account(&self, address: &Address) -> Result<Account> {
        if !self.keys.contains_key(address) {
            return Err(BridgeError::SignerNotFound(hex::encode(address)));
        }
        Ok(Account { address: *address })
    }

    async fn sign_shell(
        &self,
        account: &Account,
        shell: &SigningShell,
        aux_chain_id: u64,
    ) -> Result<SignedShell> {
        let keypair = self
            .keys
            .get(&account.address)
            .ok_or_else(|| BridgeError::SignerNotFound(hex::encode(account.address)))?;

        let signature = keypair.sign(&shell.signing_payload(aux_chain_id)?)?;
        Ok(SignedShell {
            shell: shell.clone(),
            signature,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_address_is_20_bytes_and_stable() {
        let keypair = KeyPair::generate();
        assert_eq!(keypair.address().len(), ADDRESS_LEN);
        assert_eq!(keypair.address(), keypair.address());
    }

    #[test]
    fn test_shell_zeroes_economic_fields() {
        let shell = SigningShell::new(vec![1, 2, 3]);
        assert_eq!(shell.nonce, 0);
        assert_eq!(shell.value, 0);
        assert_eq!(shell.gas_price, 0);
        assert_eq!(shell.gas_limit, 0);
        assert_eq!(shell.recipient, [0u8; ADDRESS_LEN]);
    }

    #[test]
    fn test_signing_payload_binds_aux_chain_id() {
        let shell = SigningShell::new(vec![9; 8]);
        let a = shell.signing_payload(15).unwrap();
        let b = shell.signing_payload(16).unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_unknown_account_is_signer_not_found() {
        let store = LocalKeyStore::new();
        let result = store.find_account(&[4u8; ADDRESS_LEN]).await;
        assert!(matches!(result, Err(BridgeError::SignerNotFound(_))));
    }

    #[tokio::test]
    async fn test_local_store_signs_shell() {
        let mut store = LocalKeyStore::new();
        let address = store.insert(KeyPair::generate());

        let account = store.find_account(&address).await.unwrap();
        let shell = SigningShell::new(vec![7; 32]);
        let signed = store
            .sign_shell(&account, &shell, DEFAULT_AUX_CHAIN_ID)
            .await
            .unwrap();
        assert_eq!(signed.signature.len(), 64);
    }
}
