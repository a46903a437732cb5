//! Governance proposal and vote persistence
//!
//! Proposals are created on submission, mutated exactly once when the vote
//! concludes, and never deleted. Identifiers are case-insensitive and
//! canonicalized to upper-case before every write and lookup. Each write runs
//! inside a single all-or-nothing database transaction, and every failure
//! surfaces as a recoverable `PersistenceError` rather than aborting the
//! process.

use crate::error::{BridgeError, Result};
use crate::types::{address_from_hex, address_to_hex, Address};
use chrono::Utc;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// A governance fund-transfer proposal. The result fields stay empty/zero
/// until the resolving authority records the outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: String,
    pub proposer: Address,
    pub block_height: u64,
    pub from: Address,
    pub to: Address,
    /// Decimal string; never narrowed to a native float.
    pub amount: String,
    pub reason: String,
    pub created_at: String,
    pub result: String,
    pub result_msg: String,
    pub result_block_height: u64,
    pub result_at: String,
}

impl Proposal {
    /// A freshly submitted proposal: creation timestamp stamped now (RFC
    /// 3339), result fields left empty until the vote concludes.
    pub fn submitted(
        id: &str,
        proposer: &Address,
        block_height: u64,
        from: Address,
        to: Address,
        amount: String,
        reason: String,
    ) -> Self {
        Proposal {
            id: id.to_string(),
            proposer: *proposer,
            block_height,
            from,
            to,
            amount,
            reason,
            created_at: Utc::now().to_rfc3339(),
            result: String::new(),
            result_msg: String::new(),
            result_block_height: 0,
            result_at: String::new(),
        }
    }
}

/// A vote on a proposal. Immutable once cast; at most one per
/// (proposal id, voter).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub proposal_id: String,
    pub voter: Address,
    pub block_height: u64,
    pub answer: String,
    pub created_at: String,
}

/// Canonical form of a proposal identifier.
pub fn canonical_id(id: &str) -> String {
    id.to_uppercase()
}

/// Boundary contract for governance persistence. Implementations must treat
/// identifiers case-insensitively and keep each write atomic.
pub trait ProposalStore: Send + Sync {
    fn save(&self, proposal: &Proposal) -> Result<()>;
    fn get_by_id(&self, id: &str) -> Result<Option<Proposal>>;
    fn list_all(&self) -> Result<Vec<Proposal>>;
    fn update_result(
        &self,
        id: &str,
        outcome: &str,
        msg: &str,
        block_height: u64,
        result_at: &str,
    ) -> Result<()>;
    fn save_vote(&self, vote: &Vote) -> Result<()>;
    fn get_vote(&self, proposal_id: &str, voter: &Address) -> Result<Option<Vote>>;
    fn list_votes(&self, proposal_id: &str) -> Result<Vec<Vote>>;
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| BridgeError::PersistenceError(format!("Failed to open database: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS governance_proposal (
                id TEXT PRIMARY KEY,
                proposer TEXT NOT NULL,
                block_height INTEGER NOT NULL,
                from_address TEXT NOT NULL,
                to_address TEXT NOT NULL,
                amount TEXT NOT NULL,
                reason TEXT NOT NULL,
                created_at TEXT NOT NULL,
                result TEXT NOT NULL DEFAULT '',
                result_msg TEXT NOT NULL DEFAULT '',
                result_block_height INTEGER NOT NULL DEFAULT 0,
                result_at TEXT NOT NULL DEFAULT ''
            )",
            [],
        )
        .map_err(|e| {
            BridgeError::PersistenceError(format!("Failed to create proposal table: {}", e))
        })?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS governance_vote (
                proposal_id TEXT NOT NULL,
                voter TEXT NOT NULL,
                block_height INTEGER NOT NULL,
                answer TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE(proposal_id, voter)
            )",
            [],
        )
        .map_err(|e| {
            BridgeError::PersistenceError(format!("Failed to create vote table: {}", e))
        })?;

        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| BridgeError::PersistenceError("Mutex poisoned".to_string()))
    }
}

fn parse_address(column: &str, value: &str) -> Result<Address> {
    address_from_hex(value)
        .map_err(|e| BridgeError::PersistenceError(format!("Corrupt {} column: {}", column, e)))
}

impl ProposalStore for SqliteStore {
    fn save(&self, proposal: &Proposal) -> Result<()> {
        let conn = self.lock()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| BridgeError::PersistenceError(format!("Failed to start transaction: {}", e)))?;

        tx.execute(
            "INSERT INTO governance_proposal
                (id, proposer, block_height, from_address, to_address, amount, reason, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                canonical_id(&proposal.id),
                address_to_hex(&proposal.proposer),
                proposal.block_height as i64,
                address_to_hex(&proposal.from),
                address_to_hex(&proposal.to),
                proposal.amount,
                proposal.reason,
                proposal.created_at,
            ],
        )
        .map_err(|e| BridgeError::PersistenceError(format!("Failed to save proposal: {}", e)))?;

        tx.commit()
            .map_err(|e| BridgeError::PersistenceError(format!("Failed to commit transaction: {}", e)))
    }

    fn get_by_id(&self, id: &str) -> Result<Option<Proposal>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, proposer, block_height, from_address, to_address, amount, reason,
                        created_at, result, result_msg, result_block_height, result_at
                 FROM governance_proposal WHERE id = ?1",
            )
            .map_err(|e| BridgeError::PersistenceError(format!("Failed to prepare query: {}", e)))?;

        let mut rows = stmt
            .query(params![canonical_id(id)])
            .map_err(|e| BridgeError::PersistenceError(format!("Failed to query proposal: {}", e)))?;

        match rows
            .next()
            .map_err(|e| BridgeError::PersistenceError(format!("Failed to read row: {}", e)))?
        {
            Some(row) => Ok(Some(proposal_from_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_all(&self) -> Result<Vec<Proposal>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, proposer, block_height, from_address, to_address, amount, reason,
                        created_at, result, result_msg, result_block_height, result_at
                 FROM governance_proposal",
            )
            .map_err(|e| BridgeError::PersistenceError(format!("Failed to prepare query: {}", e)))?;

        let mut rows = stmt
            .query([])
            .map_err(|e| BridgeError::PersistenceError(format!("Failed to query proposals: {}", e)))?;

        let mut proposals = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| BridgeError::PersistenceError(format!("Failed to read row: {}", e)))?
        {
            proposals.push(proposal_from_row(row)?);
        }
        Ok(proposals)
    }

    fn update_result(
        &self,
        id: &str,
        outcome: &str,
        msg: &str,
        block_height: u64,
        result_at: &str,
    ) -> Result<()> {
        let conn = self.lock()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| BridgeError::PersistenceError(format!("Failed to start transaction: {}", e)))?;

        let updated = tx
            .execute(
                "UPDATE governance_proposal
                 SET result = ?1, result_msg = ?2, result_block_height = ?3, result_at = ?4
                 WHERE id = ?5",
                params![outcome, msg, block_height as i64, result_at, canonical_id(id)],
            )
            .map_err(|e| BridgeError::PersistenceError(format!("Failed to update result: {}", e)))?;

        if updated == 0 {
            return Err(BridgeError::PersistenceError(format!(
                "No proposal with id {}",
                canonical_id(id)
            )));
        }

        tx.commit()
            .map_err(|e| BridgeError::PersistenceError(format!("Failed to commit transaction: {}", e)))
    }

    fn save_vote(&self, vote: &Vote) -> Result<()> {
        let conn = self.lock()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| BridgeError::PersistenceError(format!("Failed to start transaction: {}", e)))?;

        tx.execute(
            "INSERT INTO governance_vote (proposal_id, voter, block_height, answer, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                canonical_id(&vote.proposal_id),
                address_to_hex(&vote.voter),
                vote.block_height as i64,
                vote.answer,
                vote.created_at,
            ],
        )
        .map_err(|e| BridgeError::PersistenceError(format!("Failed to save vote: {}", e)))?;

        tx.commit()
            .map_err(|e| BridgeError::PersistenceError(format!("Failed to commit transaction: {}", e)))
    }

    fn get_vote(&self, proposal_id: &str, voter: &Address) -> Result<Option<Vote>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT proposal_id, voter, block_height, answer, created_at
                 FROM governance_vote WHERE proposal_id = ?1 AND voter = ?2",
            )
            .map_err(|e| BridgeError::PersistenceError(format!("Failed to prepare query: {}", e)))?;

        let mut rows = stmt
            .query(params![canonical_id(proposal_id), address_to_hex(voter)])
            .map_err(|e| BridgeError::PersistenceError(format!("Failed to query vote: {}", e)))?;

        match rows
            .next()
            .map_err(|e| BridgeError::PersistenceError(format!("Failed to read row: {}", e)))?
        {
            Some(row) => Ok(Some(vote_from_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_votes(&self, proposal_id: &str) -> Result<Vec<Vote>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT proposal_id, voter, block_height, answer, created_at
                 FROM governance_vote WHERE proposal_id = ?1",
            )
            .map_err(|e| BridgeError::PersistenceError(format!("Failed to prepare query: {}", e)))?;

        let mut rows = stmt
            .query(params![canonical_id(proposal_id)])
            .map_err(|e| BridgeError::PersistenceError(format!("Failed to query votes: {}", e)))?;

        let mut votes = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| BridgeError::PersistenceError(format!("Failed to read row: {}", e)))?
        {
            votes.push(vote_from_row(row)?);
        }
        Ok(votes)
    }
}

fn proposal_from_row(row: &rusqlite::Row<'_>) -> Result<Proposal> {
    let id: String = row.get(0)?;
    let proposer: String = row.get(1)?;
    let block_height: i64 = row.get(2)?;
    let from: String = row.get(3)?;
    let to: String = row.get(4)?;
    let amount: String = row.get(5)?;
    let reason: String = row.get(6)?;
    let created_at: String = row.get(7)?;
    let result: String = row.get(8)?;
    let result_msg: String = row.get(9)?;
    let result_block_height: i64 = row.get(10)?;
    let result_at: String = row.get(11)?;

    Ok(Proposal {
        id,
        proposer: parse_address("proposer", &proposer)?,
        block_height: block_height as u64,
        from: parse_address("from_address", &from)?,
        to: parse_address("to_address", &to)?,
        amount,
        reason,
        created_at,
        result,
        result_msg,
        result_block_height: result_block_height as u64,
        result_at,
    })
}

fn vote_from_row(row: &rusqlite::Row<'_>) -> Result<Vote> {
    let proposal_id: String = row.get(0)?;
    let voter: String = row.get(1)?;
    let block_height: i64 = row.get(2)?;
    let answer: String = row.get(3)?;
    let created_at: String = row.get(4)?;

    Ok(Vote {
        proposal_id,
        voter: parse_address("voter", &voter)?,
        block_height: block_height as u64,
        answer,
        created_at,
    })
}

/// Simple in-memory store useful for tests and ephemeral runs. Enforces the
/// same contract as the SQLite store, including duplicate-vote rejection.
#[derive(Default)]
pub struct InMemoryStore {
    proposals: Mutex<Vec<Proposal>>,
    votes: Mutex<Vec<Vote>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProposalStore for InMemoryStore {
    fn save(&self, proposal: &Proposal) -> Result<()> {
        let mut proposals = self
            .proposals
            .lock()
            .map_err(|_| BridgeError::PersistenceError("Mutex poisoned".to_string()))?;
        let id = canonical_id(&proposal.id);
        if proposals.iter().any(|p| p.id == id) {
            return Err(BridgeError::PersistenceError(format!(
                "Proposal {} already exists",
                id
            )));
        }
        let mut stored = proposal.clone();
        stored.id = id;
        proposals.push(stored);
        Ok(())
    }

    fn get_by_id(&self, id: &str) -> Result<Option<Proposal>> {
        let proposals = self
            .proposals
            .lock()
            .map_err(|_| BridgeError::PersistenceError("Mutex poisoned".to_string()))?;
        let id = canonical_id(id);
        Ok(proposals.iter().find(|p| p.id == id).cloned())
    }

    fn list_all(&self) -> Result<Vec<Proposal>> {
        let proposals = self
            .proposals
            .lock()
            .map_err(|_| BridgeError::PersistenceError("Mutex poisoned".to_string()))?;
        Ok(proposals.clone())
    }

    fn update_result(
        &self,
        id: &str,
        outcome: &str,
        msg: &str,
        block_height: u64,
        result_at: &str,
    ) -> Result<()> {
        let mut proposals = self
            .proposals
            .lock()
            .map_err(|_| BridgeError::PersistenceError("Mutex poisoned".to_string()))?;
        let id = canonical_id(id);
        let proposal = proposals
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| BridgeError::PersistenceError(format!("No proposal with id {}", id)))?;
        proposal.result = outcome.to_string();
        proposal.result_msg = msg.to_string();
        proposal.result_block_height = block_height;
        proposal.result_at = result_at.to_string();
        Ok(())
    }

    fn save_vote(&self, vote: &Vote) -> Result<()> {
        let mut votes = self
            .votes
            .lock()
            .map_err(|_| BridgeError::PersistenceError("Mutex poisoned".to_string()))?;
        let id = canonical_id(&vote.proposal_id);
        if votes.iter().any(|v| v.proposal_id == id && v.voter == vote.voter) {
            return Err(BridgeError::PersistenceError(format!(
                "Vote by {} on {} already exists",
                address_to_hex(&vote.voter),
                id
            )));
        }
        let mut stored = vote.clone();
        stored.proposal_id = id;
        votes.push(stored);
        Ok(())
    }

    fn get_vote(&self, proposal_id: &str, voter: &Address) -> Result<Option<Vote>> {
        let votes = self
            .votes
            .lock()
            .map_err(|_| BridgeError::PersistenceError("Mutex poisoned".to_string()))?;
        let id = canonical_id(proposal_id);
        Ok(votes
            .iter()
            .find(|v| v.proposal_id == id && v.voter == *voter)
            .cloned())
    }

    fn list_votes(&self, proposal_id: &str) -> Result<Vec<Vote>> {
        let votes = self
            .votes
            .lock()
            .map_err(|_| BridgeError::PersistenceError("Mutex poisoned".to_string()))?;
        let id = canonical_id(proposal_id);
        Ok(votes.iter().filter(|v| v.proposal_id == id).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ADDRESS_LEN;

    fn addr(byte: u8) -> Address {
        [byte; ADDRESS_LEN]
    }

    fn sample_proposal(id: &str) -> Proposal {
        Proposal {
            id: id.to_string(),
            proposer: addr(1),
            block_height: 7,
            from: addr(2),
            to: addr(3),
            amount: "1000000000000000000".to_string(),
            reason: "community fund".to_string(),
            created_at: "2024-01-01T00:00:00Z".to_string(),
            result: String::new(),
            result_msg: String::new(),
            result_block_height: 0,
            result_at: String::new(),
        }
    }

    fn sample_vote(proposal_id: &str, voter: Address) -> Vote {
        Vote {
            proposal_id: proposal_id.to_string(),
            voter,
            block_height: 9,
            answer: "Y".to_string(),
            created_at: "2024-01-02T00:00:00Z".to_string(),
        }
    }

    fn stores() -> Vec<Box<dyn ProposalStore>> {
        vec![
            Box::new(SqliteStore::open(":memory:").unwrap()),
            Box::new(InMemoryStore::new()),
        ]
    }

    #[test]
    fn test_submitted_proposal_is_stamped_rfc3339_with_empty_result() {
        let proposal = Proposal::submitted(
            "abc1",
            &addr(1),
            7,
            addr(2),
            addr(3),
            "42".to_string(),
            "ops".to_string(),
        );
        assert!(chrono::DateTime::parse_from_rfc3339(&proposal.created_at).is_ok());
        assert_eq!(proposal.result, "");
        assert_eq!(proposal.result_block_height, 0);
        assert_eq!(proposal.result_at, "");
    }

    #[test]
    fn test_proposal_ids_are_case_insensitive() {
        for store in stores() {
            store.save(&sample_proposal("abc123")).unwrap();

            let upper = store.get_by_id("ABC123").unwrap().unwrap();
            let lower = store.get_by_id("abc123").unwrap().unwrap();
            assert_eq!(upper, lower);
            assert_eq!(upper.id, "ABC123");
        }
    }

    #[test]
    fn test_missing_proposal_is_none_not_error() {
        for store in stores() {
            assert!(store.get_by_id("nope").unwrap().is_none());
        }
    }

    #[test]
    fn test_result_is_recorded_once() {
        for store in stores() {
            store.save(&sample_proposal("p1")).unwrap();
            store
                .update_result("p1", "approved", "quorum reached", 42, "2024-01-03T00:00:00Z")
                .unwrap();

            let stored = store.get_by_id("P1").unwrap().unwrap();
            assert_eq!(stored.result, "approved");
            assert_eq!(stored.result_block_height, 42);

            assert!(store
                .update_result("missing", "approved", "", 1, "")
                .is_err());
        }
    }

    #[test]
    fn test_duplicate_vote_is_rejected() {
        for store in stores() {
            store.save(&sample_proposal("p1")).unwrap();
            store.save_vote(&sample_vote("p1", addr(5))).unwrap();

            let result = store.save_vote(&sample_vote("P1", addr(5)));
            assert!(matches!(result, Err(BridgeError::PersistenceError(_))));

            // A different voter is still fine.
            store.save_vote(&sample_vote("p1", addr(6))).unwrap();
            assert_eq!(store.list_votes("p1").unwrap().len(), 2);
        }
    }

    #[test]
    fn test_get_vote_is_case_insensitive() {
        for store in stores() {
            store.save(&sample_proposal("p1")).unwrap();
            store.save_vote(&sample_vote("p1", addr(5))).unwrap();

            let vote = store.get_vote("P1", &addr(5)).unwrap().unwrap();
            assert_eq!(vote.answer, "Y");
            assert!(store.get_vote("p1", &addr(9)).unwrap().is_none());
        }
    }

    #[test]
    fn test_list_all_round_trips_fields() {
        for store in stores() {
            store.save(&sample_proposal("alpha")).unwrap();
            store.save(&sample_proposal("beta")).unwrap();

            let all = store.list_all().unwrap();
            assert_eq!(all.len(), 2);
            let alpha = all.iter().find(|p| p.id == "ALPHA").unwrap();
            assert_eq!(alpha.amount, "1000000000000000000");
            assert_eq!(alpha.proposer, addr(1));
            assert_eq!(alpha.result, "");
        }
    }
}
