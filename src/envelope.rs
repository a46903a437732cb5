//! Transaction envelope layers and the envelope builder
//!
//! A domain transaction is wrapped onion-style in a fixed order: the nonce
//! layer (sequence + signer set), then the chain-scope layer (chain id +
//! height bound), then the authentication layer (signature slots). The
//! receiving state machine unwraps in reverse order, and an unsigned envelope
//! must fail to unwrap. Each layer is an immutable struct owning its inner
//! value rather than a decorator hierarchy.

use crate::engine::EngineClient;
use crate::error::{BridgeError, Result};
use crate::sequence::SequenceResolver;
use crate::signing::{KeyManager, Signable, SigningAdapter};
use crate::tx::Tx;
use crate::types::{Address, SignerToken};
use crate::wire;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Innermost layer: replay protection via the per-signer-set sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NonceLayer {
    pub sequence: u32,
    pub signers: Vec<SignerToken>,
    pub tx: Tx,
}

/// Middle layer: scopes the transaction to one chain, with an optional
/// expiry height (0 means no expiry).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainLayer {
    pub chain_id: String,
    pub expires_at: u64,
    pub nonce: NonceLayer,
}

/// One authentication slot per signer. The signature is attached by the
/// signing adapter after the envelope is fully wrapped and validated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureSlot {
    pub signer: SignerToken,
    pub signature: Option<Vec<u8>>,
}

/// Outermost layer: the fully wrapped transaction, ready for broadcast once
/// every slot carries a signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub slots: Vec<SignatureSlot>,
    pub chain: ChainLayer,
}

impl Envelope {
    /// Local structural validation: required fields present, amounts
    /// non-negative, addresses well-formed. Never contacts the network.
    pub fn validate_basic(&self) -> Result<()> {
        if self.chain.chain_id.is_empty() {
            return Err(BridgeError::ValidationError(
                "Chain id must not be empty".to_string(),
            ));
        }
        if self.chain.nonce.sequence == 0 {
            return Err(BridgeError::ValidationError(
                "Sequence must be at least 1".to_string(),
            ));
        }
        if self.chain.nonce.signers.is_empty() {
            return Err(BridgeError::ValidationError(
                "Signer set must not be empty".to_string(),
            ));
        }
        if self.slots.len() != self.chain.nonce.signers.len() {
            return Err(BridgeError::ValidationError(format!(
                "Expected {} signature slots, found {}",
                self.chain.nonce.signers.len(),
                self.slots.len()
            )));
        }
        self.chain.nonce.tx.validate()
    }

    /// The signing capability of this envelope, when present. An envelope
    /// with no signature slots is unsigned by design (e.g. a read wrapped
    /// defensively) and signing it is a no-op.
    pub fn signable_mut(&mut self) -> Option<&mut dyn Signable> {
        if self.slots.is_empty() {
            return None;
        }
        Some(self)
    }

    /// Unwrap the authentication layer, refusing envelopes whose slots are
    /// not all signed. Successive layers are then reached through the
    /// returned value: authentication → chain-scope → nonce → inner tx.
    pub fn open_signed(self) -> Result<ChainLayer> {
        for slot in &self.slots {
            if slot.signature.is_none() {
                return Err(BridgeError::ValidationError(format!(
                    "Unsigned envelope: no signature for {}",
                    hex::encode(slot.signer.address)
                )));
            }
        }
        Ok(self.chain)
    }

    pub fn tx(&self) -> &Tx {
        &self.chain.nonce.tx
    }
}

impl Signable for Envelope {
    /// Canonical signable bytes: the wire encoding of everything beneath the
    /// authentication layer, so the signature covers sequence, signer set,
    /// chain scope and the inner transaction.
    fn sign_bytes(&self) -> Result<Vec<u8>> {
        wire::encode(&self.chain)
    }

    fn attach_signature(&mut self, address: &Address, signature: Vec<u8>) -> Result<()> {
        let slot = self
            .slots
            .iter_mut()
            .find(|slot| slot.signer.address == *address)
            .ok_or_else(|| {
                BridgeError::ValidationError(format!(
                    "No signature slot for address {}",
                    hex::encode(address)
                ))
            })?;
        slot.signature = Some(signature);
        Ok(())
    }
}

/// Builds broadcast-ready envelopes: resolves the sequence, applies the
/// protocol layers in order, validates locally and delegates signing.
pub struct EnvelopeBuilder {
    resolver: SequenceResolver,
    signing: SigningAdapter,
    chain_id: Option<String>,
}

impl EnvelopeBuilder {
    pub fn new(
        engine: Arc<dyn EngineClient>,
        keys: Arc<dyn KeyManager>,
        chain_id: Option<String>,
        aux_chain_id: u64,
    ) -> Self {
        EnvelopeBuilder {
            resolver: SequenceResolver::new(engine),
            signing: SigningAdapter::new(keys, aux_chain_id),
            chain_id: chain_id.filter(|id| !id.is_empty()),
        }
    }

    /// Wrap, validate and sign a domain transaction.
    ///
    /// `requested_sequence` of 0 means "resolve the current remote sequence
    /// and use current + 1"; any other value is used verbatim so callers may
    /// pre-fetch for batching. Fails fast with `ChainNotReady` before any
    /// network call when the chain id is unknown. A signing failure aborts
    /// the build; no partial envelope is returned.
    pub async fn build(
        &self,
        tx: Tx,
        signer_address: &Address,
        requested_sequence: u32,
    ) -> Result<Envelope> {
        let chain_id = self.chain_id.clone().ok_or(BridgeError::ChainNotReady)?;

        let signers = vec![SignerToken::from_address(signer_address)];
        let sequence = if requested_sequence == 0 {
            self.resolver.resolve(&signers).await? + 1
        } else {
            requested_sequence
        };

        let slots = signers
            .iter()
            .map(|signer| SignatureSlot {
                signer: signer.clone(),
                signature: None,
            })
            .collect();

        let mut envelope = Envelope {
            slots,
            chain: ChainLayer {
                chain_id,
                expires_at: 0,
                nonce: NonceLayer {
                    sequence,
                    signers,
                    tx,
                },
            },
        };

        envelope.validate_basic()?;
        self.signing.sign(&mut envelope, signer_address).await?;
        Ok(envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx::{AcceptSlotTx, ProposeSlotTx};
    use crate::types::ADDRESS_LEN;

    fn addr(byte: u8) -> Address {
        [byte; ADDRESS_LEN]
    }

    fn sample_envelope(sequence: u32) -> Envelope {
        let signer = SignerToken::from_address(&addr(1));
        Envelope {
            slots: vec![SignatureSlot {
                signer: signer.clone(),
                signature: None,
            }],
            chain: ChainLayer {
                chain_id: "bridge-test".to_string(),
                expires_at: 0,
                nonce: NonceLayer {
                    sequence,
                    signers: vec![signer],
                    tx: Tx::ProposeSlot(ProposeSlotTx {
                        validator: addr(1),
                        amount: 1000,
                        proposed_roi: 500,
                    }),
                },
            },
        }
    }

    #[test]
    fn test_validate_basic_accepts_well_formed_envelope() {
        assert!(sample_envelope(1).validate_basic().is_ok());
    }

    #[test]
    fn test_validate_basic_rejects_zero_sequence() {
        let result = sample_envelope(0).validate_basic();
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Sequence must be at least 1"));
    }

    #[test]
    fn test_validate_basic_rejects_empty_chain_id() {
        let mut envelope = sample_envelope(1);
        envelope.chain.chain_id.clear();
        assert!(envelope.validate_basic().is_err());
    }

    #[test]
    fn test_validate_basic_rejects_invalid_inner_tx() {
        let mut envelope = sample_envelope(1);
        envelope.chain.nonce.tx = Tx::AcceptSlot(AcceptSlotTx {
            amount: -1,
            slot_id: "slot".to_string(),
        });
        assert!(envelope.validate_basic().is_err());
    }

    #[test]
    fn test_open_refuses_unsigned_envelope() {
        let result = sample_envelope(1).open_signed();
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Unsigned envelope"));
    }

    #[test]
    fn test_unwrap_order_is_auth_chain_nonce_tx() {
        let mut envelope = sample_envelope(4);
        envelope
            .attach_signature(&addr(1), vec![0xaa; 64])
            .unwrap();

        // Auth layer comes off first...
        let chain = envelope.open_signed().unwrap();
        assert_eq!(chain.chain_id, "bridge-test");
        // ...then the chain scope, exposing the nonce layer...
        let nonce = chain.nonce;
        assert_eq!(nonce.sequence, 4);
        assert_eq!(nonce.signers.len(), 1);
        // ...then the inner transaction.
        assert!(matches!(nonce.tx, Tx::ProposeSlot(_)));
    }

    #[test]
    fn test_sign_bytes_exclude_signatures() {
        let unsigned = sample_envelope(2);
        let mut signed = unsigned.clone();
        signed.attach_signature(&addr(1), vec![0xbb; 64]).unwrap();

        // The signable payload covers the chain layer only, so attaching a
        // signature must not change it.
        assert_eq!(
            unsigned.sign_bytes().unwrap(),
            signed.sign_bytes().unwrap()
        );
    }

    #[test]
    fn test_sign_bytes_cover_inner_transaction() {
        let propose = sample_envelope(2);
        let mut accept = sample_envelope(2);
        accept.chain.nonce.tx = Tx::AcceptSlot(AcceptSlotTx {
            amount: 1000,
            slot_id: "slot-1".to_string(),
        });

        // The chain-layer encoding is the only signable payload, and it must
        // change whenever the inner transaction does.
        assert_ne!(
            propose.sign_bytes().unwrap(),
            accept.sign_bytes().unwrap()
        );
    }

    #[test]
    fn test_envelope_without_slots_has_no_signing_capability() {
        let mut envelope = sample_envelope(1);
        envelope.slots.clear();
        assert!(envelope.signable_mut().is_none());
    }
}
