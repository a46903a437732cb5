//! Domain transaction types for StakeBridge
//!
//! These are the inner transactions carried by an envelope: stake candidacy
//! and slot operations plus governance proposals. They are plain data; the
//! protocol layers (nonce, chain scope, authentication) live in [`crate::envelope`].

use crate::error::BridgeError;
use crate::types::{Address, ValidatorPubKey, ADDRESS_LEN};
use primitive_types::U256;
use serde::{Deserialize, Serialize};

/// A domain transaction that can be wrapped into an envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Tx {
    DeclareCandidacy(DeclareCandidacyTx),
    WithdrawCandidacy(WithdrawCandidacyTx),
    EditCandidacy(EditCandidacyTx),
    ProposeSlot(ProposeSlotTx),
    AcceptSlot(AcceptSlotTx),
    WithdrawSlot(WithdrawSlotTx),
    CancelSlot(CancelSlotTx),
    GovernancePropose(GovernanceProposeTx),
}

impl Tx {
    /// Structural validation: required fields present, amounts non-negative,
    /// addresses well-formed. Performed locally, never contacts the network.
    pub fn validate(&self) -> Result<(), BridgeError> {
        match self {
            Tx::DeclareCandidacy(_) => Ok(()),
            Tx::WithdrawCandidacy(tx) => require_address("validator address", &tx.address),
            Tx::EditCandidacy(tx) => require_address("new address", &tx.new_address),
            Tx::ProposeSlot(tx) => {
                require_address("validator address", &tx.validator)?;
                require_non_negative("amount", tx.amount)?;
                require_non_negative("proposed ROI", tx.proposed_roi)
            }
            Tx::AcceptSlot(tx) => {
                require_slot_id(&tx.slot_id)?;
                require_non_negative("amount", tx.amount)
            }
            Tx::WithdrawSlot(tx) => {
                require_slot_id(&tx.slot_id)?;
                require_non_negative("amount", tx.amount)
            }
            Tx::CancelSlot(tx) => {
                require_address("validator address", &tx.validator)?;
                require_slot_id(&tx.slot_id)
            }
            Tx::GovernancePropose(tx) => tx.validate(),
        }
    }
}

fn require_address(what: &str, address: &Address) -> Result<(), BridgeError> {
    if *address == [0u8; ADDRESS_LEN] {
        return Err(BridgeError::ValidationError(format!(
            "{} must not be the zero address",
            what
        )));
    }
    Ok(())
}

fn require_non_negative(what: &str, value: i64) -> Result<(), BridgeError> {
    if value < 0 {
        return Err(BridgeError::ValidationError(format!(
            "{} must be non-negative, got {}",
            what, value
        )));
    }
    Ok(())
}

fn require_slot_id(slot_id: &str) -> Result<(), BridgeError> {
    if slot_id.is_empty() {
        return Err(BridgeError::ValidationError(
            "Slot id must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Register a new validator candidate under a consensus public key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclareCandidacyTx {
    pub pub_key: ValidatorPubKey,
}

/// Withdraw an existing candidacy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawCandidacyTx {
    pub address: Address,
}

/// Move a candidacy to a new owner address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditCandidacyTx {
    pub new_address: Address,
}

/// Open a staking slot with a proposed return-on-investment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposeSlotTx {
    pub validator: Address,
    pub amount: i64,
    pub proposed_roi: i64,
}

/// Delegate an amount into an open slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptSlotTx {
    pub amount: i64,
    pub slot_id: String,
}

/// Withdraw a delegated amount from a slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawSlotTx {
    pub amount: i64,
    pub slot_id: String,
}

/// Cancel an open slot entirely
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelSlotTx {
    pub validator: Address,
    pub slot_id: String,
}

/// Governance fund-transfer proposal. The amount is a decimal string and is
/// kept that way end to end; it is validated by parsing into a 256-bit
/// unsigned integer, never narrowed to a native float.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovernanceProposeTx {
    pub proposer: Address,
    pub from: Address,
    pub to: Address,
    pub amount: String,
    pub reason: String,
}

impl GovernanceProposeTx {
    pub fn validate(&self) -> Result<(), BridgeError> {
        require_address("proposer address", &self.proposer)?;
        require_address("from address", &self.from)?;
        require_address("to address", &self.to)?;
        U256::from_dec_str(&self.amount).map_err(|e| {
            BridgeError::ValidationError(format!(
                "Amount must be a decimal string: {:?}",
                e
            ))
        })?;
        Ok(())
    }
}
