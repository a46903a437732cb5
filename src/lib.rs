//! StakeBridge - the client-facing bridge of a delegated-staking chain node
//!
//! Accepts stake and governance operations from callers, wraps them into
//! signed transaction envelopes, relays them to the consensus engine, and
//! serves height-indexed reads of the application state.
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Transactions & Envelopes
//! - [`tx`] - Stake and governance transaction payloads
//! - [`envelope`] - Nonce/chain/signature envelope layering and building
//! - [`sequence`] - Remote sequence (replay counter) resolution
//! - [`signing`] - Key management and signature production (secp256k1)
//!
//! ## Engine Integration
//! - [`engine`] - Consensus engine client boundary
//! - [`broadcast`] - Synchronous broadcast-and-commit submission
//! - [`query`] - Height-indexed application-state queries
//! - [`state`] - Typed records decoded from state queries
//!
//! ## Governance
//! - [`governance`] - Proposal and vote persistence (SQLite)
//!
//! ## Service & API
//! - [`service`] - The bridge operation surface
//! - [`rpc`] - HTTP API (axum)
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types
//! - [`types`] - Addresses, signer tokens and key derivation
//! - [`wire`] - Canonical byte encoding (bincode)

#![forbid(unsafe_code)]

// ============================================================================
// Transactions & Envelopes
// ============================================================================
pub mod envelope;
pub mod sequence;
pub mod signing;
pub mod tx;

// ============================================================================
// Engine Integration
// ============================================================================
pub mod broadcast;
pub mod engine;
pub mod query;
pub mod state;

// ============================================================================
// Governance
// ============================================================================
pub mod governance;

// ============================================================================
// Service & API
// ============================================================================
pub mod rpc;
pub mod service;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;
pub mod types;
pub mod wire;
