//! Consensus engine boundary for StakeBridge
//!
//! The engine orders and finalizes transactions and exposes a query/broadcast
//! RPC. This module defines the trait the bridge consumes and the response
//! records that cross it; concrete transports are wired in by the embedding
//! process, and tests substitute mocks.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Node status reported by the engine once it has finished starting up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStatus {
    pub chain_id: String,
    pub latest_height: u64,
}

/// Raw result of a state query: the value bytes and the height actually
/// served. An empty value with a successful transport is a valid outcome
/// ("no data at this height"), not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub value: Vec<u8>,
    pub height: u64,
}

/// Result of a synchronous commit broadcast: the call blocks until the
/// transaction is both accepted into a block and executed. Check-stage and
/// deliver-stage verdicts are reported separately, exactly as the engine
/// produced them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitResponse {
    pub hash: String,
    pub height: u64,
    pub check_code: u32,
    pub check_log: String,
    pub deliver_code: u32,
    pub deliver_log: String,
}

/// Block metadata as served by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockInfo {
    pub height: u64,
    pub hash: String,
    pub time: String,
    pub tx_hashes: Vec<String>,
}

/// A committed transaction as served by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxInfo {
    pub hash: String,
    pub height: u64,
    pub index: u32,
    pub raw: Vec<u8>,
    pub deliver_code: u32,
    pub deliver_log: String,
}

/// Client boundary to the consensus engine. Every method is a blocking round
/// trip from the caller's perspective; no timeouts or retries are applied
/// here — callers needing bounded latency impose their own deadlines.
#[async_trait]
pub trait EngineClient: Send + Sync {
    /// Report the engine's chain id and latest height. Consulted once at
    /// startup to learn the chain id.
    async fn status(&self) -> Result<EngineStatus>;

    /// Read-only query against a named application-state path. `height` of 0
    /// requests the latest state; `trusted` skips proof verification.
    /// Transport failure is an error; an empty `value` is not.
    async fn abci_query(
        &self,
        path: &str,
        key: &[u8],
        height: u64,
        trusted: bool,
    ) -> Result<QueryResponse>;

    /// Submit wire-encoded transaction bytes and block until the engine has
    /// included and executed them (one or more consensus rounds).
    async fn broadcast_tx_commit(&self, raw: Vec<u8>) -> Result<CommitResponse>;

    /// Fetch block metadata at a height.
    async fn block(&self, height: u64) -> Result<BlockInfo>;

    /// Fetch a committed transaction by hex hash.
    async fn tx(&self, hash: &str) -> Result<TxInfo>;
}
