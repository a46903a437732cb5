//! Remote account-sequence resolution
//!
//! The sequence counter for a signer set lives in the application state's
//! key-value namespace. Every envelope build re-queries it; correctness is
//! preferred over latency, so there is no local cache.

use crate::engine::EngineClient;
use crate::error::Result;
use crate::types::{sequence_key, SignerToken};
use crate::wire;
use std::sync::Arc;

/// State path serving raw key-value reads.
const KEY_QUERY_PATH: &str = "/key";

pub struct SequenceResolver {
    engine: Arc<dyn EngineClient>,
}

impl SequenceResolver {
    pub fn new(engine: Arc<dyn EngineClient>) -> Self {
        SequenceResolver { engine }
    }

    /// Resolve the current sequence for a signer set.
    ///
    /// An empty value with a successful transport means the signer set has
    /// never transacted and resolves to 0 — a valid outcome, not an error.
    /// A non-empty value that fails to decode indicates corrupt remote state
    /// and is fatal to the operation.
    pub async fn resolve(&self, signers: &[SignerToken]) -> Result<u32> {
        let key = sequence_key(signers);
        let response = self.engine.abci_query(KEY_QUERY_PATH, &key, 0, false).await?;

        if response.value.is_empty() {
            return Ok(0);
        }
        wire::decode::<u32>(&response.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{BlockInfo, CommitResponse, EngineStatus, QueryResponse, TxInfo};
    use crate::error::BridgeError;
    use crate::types::{Address, ADDRESS_LEN};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Engine stub serving a fixed value for any key query.
    struct FixedValueEngine {
        value: Vec<u8>,
        queried_keys: Mutex<Vec<Vec<u8>>>,
    }

    impl FixedValueEngine {
        fn new(value: Vec<u8>) -> Self {
            FixedValueEngine {
                value,
                queried_keys: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl EngineClient for FixedValueEngine {
        async fn status(&self) -> Result<EngineStatus> {
            unimplemented!("not used by sequence resolution")
        }

        async fn abci_query(
            &self,
            _path: &str,
            key: &[u8],
            _height: u64,
            _trusted: bool,
        ) -> Result<QueryResponse> {
            self.queried_keys.lock().unwrap().push(key.to_vec());
            Ok(QueryResponse {
                value: self.value.clone(),
                height: 42,
            })
        }

        async fn broadcast_tx_commit(&self, _raw: Vec<u8>) -> Result<CommitResponse> {
            unimplemented!("not used by sequence resolution")
        }

        async fn block(&self, _height: u64) -> Result<BlockInfo> {
            unimplemented!("not used by sequence resolution")
        }

        async fn tx(&self, _hash: &str) -> Result<TxInfo> {
            unimplemented!("not used by sequence resolution")
        }
    }

    fn signer_set() -> Vec<SignerToken> {
        let address: Address = [7u8; ADDRESS_LEN];
        vec![SignerToken::from_address(&address)]
    }

    #[tokio::test]
    async fn test_absent_record_resolves_to_zero() {
        let engine = Arc::new(FixedValueEngine::new(Vec::new()));
        let resolver = SequenceResolver::new(engine.clone());

        let sequence = resolver.resolve(&signer_set()).await.unwrap();
        assert_eq!(sequence, 0);

        let keys = engine.queried_keys.lock().unwrap();
        assert_eq!(keys.len(), 1);
        assert!(keys[0].starts_with(b"nonce/"));
    }

    #[tokio::test]
    async fn test_existing_record_decodes() {
        let encoded = wire::encode(&3u32).unwrap();
        let resolver = SequenceResolver::new(Arc::new(FixedValueEngine::new(encoded)));

        let sequence = resolver.resolve(&signer_set()).await.unwrap();
        assert_eq!(sequence, 3);
    }

    #[tokio::test]
    async fn test_corrupt_record_is_decode_error() {
        let resolver = SequenceResolver::new(Arc::new(FixedValueEngine::new(vec![0xde])));

        let result = resolver.resolve(&signer_set()).await;
        assert!(matches!(result, Err(BridgeError::DecodeError(_))));
    }
}
