//! Typed records decoded from application-state queries

use crate::types::{Address, ValidatorPubKey};
use serde::{Deserialize, Serialize};

/// A validator candidate as stored by the stake module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub pub_key: ValidatorPubKey,
    pub owner_address: Address,
    pub shares: u64,
    pub voting_power: u64,
    pub state: String,
}

/// A staking commitment unit with its proposed return-on-investment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub id: String,
    pub owner_address: Address,
    pub total_amount: i64,
    pub available_amount: i64,
    pub proposed_roi: i64,
    pub state: String,
}

/// One delegator's stake inside a slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotDelegate {
    pub delegator_address: Address,
    pub slot_id: String,
    pub amount: i64,
}
