//! The bridge service: every client-facing operation in one place
//!
//! One RPC invocation maps to one method call here, run on the server's
//! worker pool. Writes flow caller → envelope builder (sequence resolution,
//! signing) → broadcast client → engine; reads flow caller → state query
//! client → engine. The chain id is learned once during `connect` and held
//! immutably for the process lifetime — concurrent builds for the same
//! signer are intentionally not serialized (colliding sequences are rejected
//! by the engine and the caller rebuilds).

use crate::broadcast::BroadcastClient;
use crate::engine::{BlockInfo, CommitResponse, EngineClient, TxInfo};
use crate::envelope::EnvelopeBuilder;
use crate::error::{BridgeError, Result};
use crate::governance::{Proposal, ProposalStore, Vote};
use crate::query::{QueryResult, StateQueryClient};
use crate::sequence::SequenceResolver;
use crate::signing::KeyManager;
use crate::state::{Candidate, Slot, SlotDelegate};
use crate::tx::{
    AcceptSlotTx, CancelSlotTx, DeclareCandidacyTx, EditCandidacyTx, GovernanceProposeTx,
    ProposeSlotTx, Tx, WithdrawCandidacyTx, WithdrawSlotTx,
};
use crate::types::{Address, SignerToken, ValidatorPubKey};
use std::sync::Arc;

/// State paths served by the stake module.
const VALIDATORS_PATH: &str = "/validators";
const VALIDATOR_PATH: &str = "/validator";
const SLOTS_PATH: &str = "/slots";
const SLOT_PATH: &str = "/slot";
const DELEGATOR_PATH: &str = "/delegator";

/// Key queried on list paths that take no meaningful key.
const LIST_KEY: [u8; 1] = [0];

pub struct BridgeService {
    engine: Arc<dyn EngineClient>,
    store: Arc<dyn ProposalStore>,
    builder: EnvelopeBuilder,
    broadcaster: BroadcastClient,
    queries: StateQueryClient,
    resolver: SequenceResolver,
    chain_id: Option<String>,
}

impl BridgeService {
    /// Construct with an already-known chain id (or `None`, in which case
    /// every envelope build fails fast with `ChainNotReady`).
    pub fn new(
        engine: Arc<dyn EngineClient>,
        keys: Arc<dyn KeyManager>,
        store: Arc<dyn ProposalStore>,
        chain_id: Option<String>,
        aux_chain_id: u64,
    ) -> Self {
        BridgeService {
            builder: EnvelopeBuilder::new(
                engine.clone(),
                keys,
                chain_id.clone(),
                aux_chain_id,
            ),
            broadcaster: BroadcastClient::new(engine.clone()),
            queries: StateQueryClient::new(engine.clone()),
            resolver: SequenceResolver::new(engine.clone()),
            store,
            chain_id,
            engine,
        }
    }

    /// Construct by learning the chain id from the engine. This is the
    /// startup initialization phase; the id is immutable afterwards.
    pub async fn connect(
        engine: Arc<dyn EngineClient>,
        keys: Arc<dyn KeyManager>,
        store: Arc<dyn ProposalStore>,
        aux_chain_id: u64,
    ) -> Result<Self> {
        let status = engine.status().await?;
        tracing::info!(chain_id = %status.chain_id, latest_height = status.latest_height, "bridge.connected");
        Ok(Self::new(
            engine,
            keys,
            store,
            Some(status.chain_id),
            aux_chain_id,
        ))
    }

    pub fn chain_id(&self) -> Option<&str> {
        self.chain_id.as_deref()
    }

    /// Highest state height served to this process so far.
    pub fn last_observed_height(&self) -> u64 {
        self.queries.last_observed_height()
    }

    // ------------------------------------------------------------------
    // Chain reads
    // ------------------------------------------------------------------

    pub async fn get_block(&self, height: u64) -> Result<BlockInfo> {
        self.engine.block(height).await
    }

    pub async fn get_transaction(&self, hash: &str) -> Result<TxInfo> {
        let stripped = hash.strip_prefix("0x").unwrap_or(hash);
        if hex::decode(stripped).is_err() {
            return Err(BridgeError::InvalidInput(format!(
                "Transaction hash must be hex, got {:?}",
                hash
            )));
        }
        self.engine.tx(stripped).await
    }

    pub async fn get_transaction_from_block(&self, height: u64, index: usize) -> Result<TxInfo> {
        let block = self.engine.block(height).await?;
        let hash = block.tx_hashes.get(index).ok_or_else(|| {
            BridgeError::InvalidInput(format!(
                "No transaction in block {} at index {}",
                height, index
            ))
        })?;
        self.engine.tx(hash).await
    }

    /// The current remote sequence for an address's signer set.
    pub async fn get_sequence(&self, address: &Address) -> Result<u32> {
        let signers = vec![SignerToken::from_address(address)];
        self.resolver.resolve(&signers).await
    }

    // ------------------------------------------------------------------
    // Stake and governance writes
    // ------------------------------------------------------------------

    async fn submit(&self, tx: Tx, from: &Address, sequence: u32) -> Result<CommitResponse> {
        let envelope = self.builder.build(tx, from, sequence).await?;
        let result = self.broadcaster.broadcast_commit(&envelope).await?;
        tracing::info!(
            hash = %result.hash,
            height = result.height,
            deliver_code = result.deliver_code,
            "bridge.broadcast"
        );
        Ok(result)
    }

    pub async fn declare_candidacy(
        &self,
        from: &Address,
        pub_key: ValidatorPubKey,
        sequence: u32,
    ) -> Result<CommitResponse> {
        self.submit(Tx::DeclareCandidacy(DeclareCandidacyTx { pub_key }), from, sequence)
            .await
    }

    pub async fn withdraw_candidacy(&self, from: &Address, sequence: u32) -> Result<CommitResponse> {
        self.submit(
            Tx::WithdrawCandidacy(WithdrawCandidacyTx { address: *from }),
            from,
            sequence,
        )
        .await
    }

    pub async fn edit_candidacy(
        &self,
        from: &Address,
        new_address: Address,
        sequence: u32,
    ) -> Result<CommitResponse> {
        self.submit(
            Tx::EditCandidacy(EditCandidacyTx { new_address }),
            from,
            sequence,
        )
        .await
    }

    pub async fn propose_slot(
        &self,
        from: &Address,
        amount: i64,
        proposed_roi: i64,
        sequence: u32,
    ) -> Result<CommitResponse> {
        self.submit(
            Tx::ProposeSlot(ProposeSlotTx {
                validator: *from,
                amount,
                proposed_roi,
            }),
            from,
            sequence,
        )
        .await
    }

    pub async fn accept_slot(
        &self,
        from: &Address,
        amount: i64,
        slot_id: String,
        sequence: u32,
    ) -> Result<CommitResponse> {
        self.submit(Tx::AcceptSlot(AcceptSlotTx { amount, slot_id }), from, sequence)
            .await
    }

    pub async fn withdraw_slot(
        &self,
        from: &Address,
        amount: i64,
        slot_id: String,
        sequence: u32,
    ) -> Result<CommitResponse> {
        self.submit(
            Tx::WithdrawSlot(WithdrawSlotTx { amount, slot_id }),
            from,
            sequence,
        )
        .await
    }

    pub async fn cancel_slot(
        &self,
        from: &Address,
        slot_id: String,
        sequence: u32,
    ) -> Result<CommitResponse> {
        self.submit(
            Tx::CancelSlot(CancelSlotTx {
                validator: *from,
                slot_id,
            }),
            from,
            sequence,
        )
        .await
    }

    /// Submit a governance fund-transfer proposal, signed by the proposer.
    /// Once committed, the proposal is recorded in the store under the
    /// commit hash with its result fields empty.
    pub async fn propose_governance(
        &self,
        proposer: &Address,
        from: Address,
        to: Address,
        amount: String,
        reason: String,
        sequence: u32,
    ) -> Result<CommitResponse> {
        let result = self
            .submit(
                Tx::GovernancePropose(GovernanceProposeTx {
                    proposer: *proposer,
                    from,
                    to,
                    amount: amount.clone(),
                    reason: reason.clone(),
                }),
                proposer,
                sequence,
            )
            .await?;

        let proposal = Proposal::submitted(
            &result.hash,
            proposer,
            result.height,
            from,
            to,
            amount,
            reason,
        );
        self.store.save(&proposal)?;
        Ok(result)
    }

    // ------------------------------------------------------------------
    // State queries
    // ------------------------------------------------------------------

    pub async fn query_validators(&self, height: u64) -> Result<QueryResult<Vec<Candidate>>> {
        self.queries
            .query_parsed(VALIDATORS_PATH, &LIST_KEY, height)
            .await
    }

    pub async fn query_validator(
        &self,
        address: &Address,
        height: u64,
    ) -> Result<QueryResult<Candidate>> {
        self.queries
            .query_parsed(VALIDATOR_PATH, address, height)
            .await
    }

    pub async fn query_slots(&self, height: u64) -> Result<QueryResult<Vec<Slot>>> {
        self.queries.query_parsed(SLOTS_PATH, &LIST_KEY, height).await
    }

    pub async fn query_slot(&self, slot_id: &str, height: u64) -> Result<QueryResult<Slot>> {
        self.queries
            .query_parsed(SLOT_PATH, slot_id.as_bytes(), height)
            .await
    }

    pub async fn query_delegator(
        &self,
        address: &Address,
        height: u64,
    ) -> Result<QueryResult<Vec<SlotDelegate>>> {
        self.queries
            .query_parsed(DELEGATOR_PATH, address, height)
            .await
    }

    // ------------------------------------------------------------------
    // Governance store reads
    // ------------------------------------------------------------------

    pub fn list_proposals(&self) -> Result<Vec<Proposal>> {
        self.store.list_all()
    }

    pub fn get_proposal(&self, id: &str) -> Result<Option<Proposal>> {
        self.store.get_by_id(id)
    }

    pub fn list_votes(&self, proposal_id: &str) -> Result<Vec<Vote>> {
        self.store.list_votes(proposal_id)
    }

    pub fn get_vote(&self, proposal_id: &str, voter: &Address) -> Result<Option<Vote>> {
        self.store.get_vote(proposal_id, voter)
    }
}
