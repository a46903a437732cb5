//! Synchronous commit broadcast
//!
//! The finished envelope is wire-encoded and submitted in "commit" mode: the
//! call blocks until the transaction is both accepted into a block and
//! executed, giving the caller a definitive verdict in one round trip at the
//! cost of waiting out one or more consensus rounds.

use crate::engine::{CommitResponse, EngineClient};
use crate::envelope::Envelope;
use crate::error::{BridgeError, Result};
use crate::wire;
use std::sync::Arc;

pub struct BroadcastClient {
    engine: Arc<dyn EngineClient>,
}

impl BroadcastClient {
    pub fn new(engine: Arc<dyn EngineClient>) -> Self {
        BroadcastClient { engine }
    }

    /// Serialize and submit an envelope for synchronous commit.
    ///
    /// A check-stage rejection means the transaction never entered a block
    /// and surfaces as `ExecutionRejected` with the engine's code and log.
    /// Deliver-stage results are returned verbatim inside the response; no
    /// retry is attempted here — a sequence-related failure should prompt
    /// the caller to re-resolve and rebuild rather than resubmit.
    pub async fn broadcast_commit(&self, envelope: &Envelope) -> Result<CommitResponse> {
        let raw = wire::encode(envelope)?;
        let response = self.engine.broadcast_tx_commit(raw).await?;

        if response.check_code != 0 {
            return Err(BridgeError::ExecutionRejected {
                code: response.check_code,
                log: response.check_log,
            });
        }
        Ok(response)
    }
}
