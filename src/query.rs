//! Height-indexed state query client
//!
//! Reads go against a named application-state path with a raw key and a
//! height (0 requests the latest state). Queries are marked trusted — proof
//! verification is skipped, which is acceptable for a co-located engine.
//! An empty value on a successful transport is the distinct `NoData`
//! outcome, never conflated with a transport failure.

use crate::engine::EngineClient;
use crate::error::Result;
use crate::wire;
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Outcome of a typed state query. `height` is always the height actually
/// served by the engine, which may differ from the requested height when 0
/// (latest) was passed.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult<T> {
    Data { value: T, height: u64 },
    NoData { height: u64 },
}

impl<T> QueryResult<T> {
    pub fn height(&self) -> u64 {
        match self {
            QueryResult::Data { height, .. } => *height,
            QueryResult::NoData { height } => *height,
        }
    }

    pub fn into_data(self) -> Option<(T, u64)> {
        match self {
            QueryResult::Data { value, height } => Some((value, height)),
            QueryResult::NoData { .. } => None,
        }
    }
}

pub struct StateQueryClient {
    engine: Arc<dyn EngineClient>,
    /// Highest height this client has seen served, monotone per process.
    last_height: AtomicU64,
}

impl StateQueryClient {
    pub fn new(engine: Arc<dyn EngineClient>) -> Self {
        StateQueryClient {
            engine,
            last_height: AtomicU64::new(0),
        }
    }

    /// Raw read: value bytes plus the height actually served. Transport
    /// failures propagate immediately; empty bytes are a valid result.
    pub async fn get(&self, path: &str, key: &[u8], height: u64) -> Result<(Vec<u8>, u64)> {
        let response = self.engine.abci_query(path, key, height, true).await?;
        self.last_height
            .fetch_max(response.height, Ordering::Relaxed);
        Ok((response.value, response.height))
    }

    /// Typed read: decode the value into `T`, or report `NoData` when the
    /// engine served nothing at that height. A decode failure is fatal — it
    /// indicates protocol or version skew, not a retryable condition.
    pub async fn query_parsed<T: DeserializeOwned>(
        &self,
        path: &str,
        key: &[u8],
        height: u64,
    ) -> Result<QueryResult<T>> {
        let (bytes, served_height) = self.get(path, key, height).await?;
        if bytes.is_empty() {
            return Ok(QueryResult::NoData {
                height: served_height,
            });
        }
        let value = wire::decode::<T>(&bytes)?;
        Ok(QueryResult::Data {
            value,
            height: served_height,
        })
    }

    /// The highest height this client has observed being served.
    pub fn last_observed_height(&self) -> u64 {
        self.last_height.load(Ordering::Relaxed)
    }
}
