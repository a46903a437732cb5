//! End-to-end envelope construction and query flows
//!
//! Drives the service through scripted engines that record what actually
//! crossed the boundary, then inspects the recorded wire bytes: layer order,
//! resolved sequence, learned chain id and attached signatures.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use stakebridge::engine::{
    BlockInfo, CommitResponse, EngineClient, EngineStatus, QueryResponse, TxInfo,
};
use stakebridge::envelope::Envelope;
use stakebridge::error::{BridgeError, Result};
use stakebridge::governance::{InMemoryStore, Proposal, ProposalStore, SqliteStore};
use stakebridge::query::QueryResult;
use stakebridge::service::BridgeService;
use stakebridge::signing::{KeyPair, LocalKeyStore, DEFAULT_AUX_CHAIN_ID};
use stakebridge::state::Candidate;
use stakebridge::tx::Tx;
use stakebridge::types::{Address, ADDRESS_LEN};
use stakebridge::wire;

/// Engine that serves a fixed remote sequence and captures broadcast bytes.
struct RecordingEngine {
    remote_sequence: u32,
    validator: Option<Candidate>,
    broadcasts: Mutex<Vec<Vec<u8>>>,
    calls: AtomicUsize,
}

impl RecordingEngine {
    fn new(remote_sequence: u32) -> Self {
        RecordingEngine {
            remote_sequence,
            validator: None,
            broadcasts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    fn recorded(&self) -> Vec<Vec<u8>> {
        self.broadcasts.lock().unwrap().clone()
    }
}

#[async_trait]
impl EngineClient for RecordingEngine {
    async fn status(&self) -> Result<EngineStatus> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(EngineStatus {
            chain_id: "bridge-e2e".to_string(),
            latest_height: 12,
        })
    }

    async fn abci_query(
        &self,
        path: &str,
        _key: &[u8],
        _height: u64,
        _trusted: bool,
    ) -> Result<QueryResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let value = match path {
            "/key" => wire::encode(&self.remote_sequence)?,
            "/validator" => match &self.validator {
                Some(candidate) => wire::encode(candidate)?,
                None => Vec::new(),
            },
            _ => Vec::new(),
        };
        Ok(QueryResponse { value, height: 12 })
    }

    async fn broadcast_tx_commit(&self, raw: Vec<u8>) -> Result<CommitResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.broadcasts.lock().unwrap().push(raw);
        Ok(CommitResponse {
            hash: "e2e".to_string(),
            height: 13,
            check_code: 0,
            check_log: String::new(),
            deliver_code: 0,
            deliver_log: String::new(),
        })
    }

    async fn block(&self, height: u64) -> Result<BlockInfo> {
        Err(BridgeError::TransportError(format!(
            "no block at height {}",
            height
        )))
    }

    async fn tx(&self, hash: &str) -> Result<TxInfo> {
        Err(BridgeError::TransportError(format!(
            "no transaction {}",
            hash
        )))
    }
}

fn addr(byte: u8) -> Address {
    [byte; ADDRESS_LEN]
}

#[tokio::test]
async fn test_propose_slot_builds_signed_envelope_with_next_sequence() {
    let engine = Arc::new(RecordingEngine::new(3));
    let mut keys = LocalKeyStore::new();
    let signer = keys.insert(KeyPair::generate());

    let service = BridgeService::connect(
        engine.clone(),
        Arc::new(keys),
        Arc::new(InMemoryStore::new()),
        DEFAULT_AUX_CHAIN_ID,
    )
    .await
    .unwrap();
    assert_eq!(service.chain_id(), Some("bridge-e2e"));

    let commit = service.propose_slot(&signer, 50_000, 800, 0).await.unwrap();
    assert_eq!(commit.deliver_code, 0);

    // Decode what actually went over the wire and unwrap layer by layer.
    let recorded = engine.recorded();
    assert_eq!(recorded.len(), 1);
    let envelope: Envelope = wire::decode(&recorded[0]).unwrap();

    assert_eq!(envelope.slots.len(), 1);
    assert!(envelope.slots[0].signature.is_some(), "envelope must be signed");
    assert_eq!(envelope.slots[0].signer.address, signer);

    let chain = envelope.open_signed().unwrap();
    assert_eq!(chain.chain_id, "bridge-e2e");
    // Remote sequence was 3, so the envelope carries 4.
    assert_eq!(chain.nonce.sequence, 4);
    match chain.nonce.tx {
        Tx::ProposeSlot(tx) => {
            assert_eq!(tx.validator, signer);
            assert_eq!(tx.amount, 50_000);
            assert_eq!(tx.proposed_roi, 800);
        }
        other => panic!("Unexpected inner transaction: {:?}", other),
    }
}

#[tokio::test]
async fn test_explicit_sequence_is_used_verbatim() {
    let engine = Arc::new(RecordingEngine::new(3));
    let mut keys = LocalKeyStore::new();
    let signer = keys.insert(KeyPair::generate());

    let service = BridgeService::connect(
        engine.clone(),
        Arc::new(keys),
        Arc::new(InMemoryStore::new()),
        DEFAULT_AUX_CHAIN_ID,
    )
    .await
    .unwrap();

    service.propose_slot(&signer, 1_000, 100, 9).await.unwrap();

    let envelope: Envelope = wire::decode(&engine.recorded()[0]).unwrap();
    assert_eq!(envelope.chain.nonce.sequence, 9);
}

#[tokio::test]
async fn test_chain_not_ready_fails_before_any_engine_call() {
    let engine = Arc::new(RecordingEngine::new(3));
    let mut keys = LocalKeyStore::new();
    let signer = keys.insert(KeyPair::generate());

    // No connect: the chain id was never learned.
    let service = BridgeService::new(
        engine.clone(),
        Arc::new(keys),
        Arc::new(InMemoryStore::new()),
        None,
        DEFAULT_AUX_CHAIN_ID,
    );

    let result = service.propose_slot(&signer, 1_000, 100, 0).await;
    assert!(matches!(result, Err(BridgeError::ChainNotReady)));
    assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_validator_query_decodes_or_reports_no_data() {
    let mut engine = RecordingEngine::new(0);
    let candidate = Candidate {
        pub_key: [7u8; 32],
        owner_address: addr(4),
        shares: 12_000,
        voting_power: 120,
        state: "active".to_string(),
    };
    engine.validator = Some(candidate.clone());

    let keys = LocalKeyStore::new();
    let service = BridgeService::connect(
        Arc::new(engine),
        Arc::new(keys),
        Arc::new(InMemoryStore::new()),
        DEFAULT_AUX_CHAIN_ID,
    )
    .await
    .unwrap();

    let result = service.query_validator(&addr(4), 0).await.unwrap();
    let (value, height) = result.into_data().unwrap();
    assert_eq!(value, candidate);
    assert_eq!(height, 12);

    // An engine with nothing stored reports NoData at the served height.
    let empty = BridgeService::connect(
        Arc::new(RecordingEngine::new(0)),
        Arc::new(LocalKeyStore::new()),
        Arc::new(InMemoryStore::new()),
        DEFAULT_AUX_CHAIN_ID,
    )
    .await
    .unwrap();
    let result = empty.query_validator(&addr(4), 0).await.unwrap();
    assert_eq!(result, QueryResult::NoData { height: 12 });
}

#[tokio::test]
async fn test_sqlite_store_survives_reopen_with_case_insensitive_ids() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bridge.db");
    let path = path.to_str().unwrap();

    {
        let store = SqliteStore::open(path).unwrap();
        store
            .save(&Proposal {
                id: "deadbeef".to_string(),
                proposer: addr(1),
                block_height: 5,
                from: addr(2),
                to: addr(3),
                amount: "42".to_string(),
                reason: "ops".to_string(),
                created_at: "2024-03-01T00:00:00Z".to_string(),
                result: String::new(),
                result_msg: String::new(),
                result_block_height: 0,
                result_at: String::new(),
            })
            .unwrap();
    }

    // Reopen from disk; lookups stay case-insensitive and canonicalized.
    let store = SqliteStore::open(path).unwrap();
    let stored = store.get_by_id("DeadBeef").unwrap().unwrap();
    assert_eq!(stored.id, "DEADBEEF");
    assert_eq!(stored.amount, "42");
}
