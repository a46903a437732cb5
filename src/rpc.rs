//! HTTP RPC surface for StakeBridge
//!
//! Exposes the bridge operations upward: chain reads, stake and governance
//! writes, height-indexed state queries and governance store reads. Handlers
//! are thin — they parse caller input, delegate to [`BridgeService`] and map
//! the error taxonomy onto HTTP statuses.

use axum::{
    extract::{Path, Query, Request, State},
    http::{self, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::engine::CommitResponse;
use crate::error::BridgeError;
use crate::query::QueryResult;
use crate::service::BridgeService;
use crate::types::{address_from_hex, address_to_hex, validator_pubkey_from_hex, Address};

// ============================================================================
// API Error Handling
// ============================================================================

#[derive(Debug)]
pub struct ApiError(BridgeError);

impl From<BridgeError> for ApiError {
    fn from(err: BridgeError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            BridgeError::ChainNotReady => StatusCode::SERVICE_UNAVAILABLE,
            BridgeError::SignerNotFound(_)
            | BridgeError::AddressRequired
            | BridgeError::ValidationError(_)
            | BridgeError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            BridgeError::TransportError(_) => StatusCode::BAD_GATEWAY,
            BridgeError::ExecutionRejected { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            BridgeError::DecodeError(_)
            | BridgeError::PersistenceError(_)
            | BridgeError::CryptoError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(ErrorResponse { error: self.0.to_string() })).into_response()
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
struct HeightQuery {
    #[serde(default)]
    height: u64,
}

/// Uniform reply for height-indexed state queries. `data` is `null` when the
/// engine served no value at that height — a valid outcome, not an error.
#[derive(Serialize)]
pub struct StateQueryReply<T> {
    pub height: u64,
    pub data: Option<T>,
}

impl<T> From<QueryResult<T>> for StateQueryReply<T> {
    fn from(result: QueryResult<T>) -> Self {
        match result {
            QueryResult::Data { value, height } => StateQueryReply {
                height,
                data: Some(value),
            },
            QueryResult::NoData { height } => StateQueryReply { height, data: None },
        }
    }
}

#[derive(Serialize)]
struct SequenceResponse {
    address: String,
    sequence: u32,
}

#[derive(Deserialize)]
struct DeclareCandidacyRequest {
    from: String,
    pub_key: String,
    #[serde(default)]
    sequence: u32,
}

#[derive(Deserialize)]
struct WithdrawCandidacyRequest {
    from: String,
    #[serde(default)]
    sequence: u32,
}

#[derive(Deserialize)]
struct EditCandidacyRequest {
    from: String,
    new_address: String,
    #[serde(default)]
    sequence: u32,
}

#[derive(Deserialize)]
struct ProposeSlotRequest {
    from: String,
    amount: i64,
    proposed_roi: i64,
    #[serde(default)]
    sequence: u32,
}

#[derive(Deserialize)]
struct SlotAmountRequest {
    from: String,
    amount: i64,
    slot_id: String,
    #[serde(default)]
    sequence: u32,
}

#[derive(Deserialize)]
struct CancelSlotRequest {
    from: String,
    slot_id: String,
    #[serde(default)]
    sequence: u32,
}

#[derive(Deserialize)]
struct GovernanceProposeRequest {
    proposer: String,
    from: String,
    to: String,
    amount: String,
    reason: String,
    #[serde(default)]
    sequence: u32,
}

fn parse_address(value: &str) -> Result<Address, ApiError> {
    address_from_hex(value).map_err(ApiError)
}

// ============================================================================
// Middleware
// ============================================================================

/// Request logging middleware. Logs method, path, status and duration.
async fn logging_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    tracing::info!(
        method = %method,
        path = %path,
        status = %response.status().as_u16(),
        duration_ms = %start.elapsed().as_millis(),
        "rpc.request"
    );

    response
}

// ============================================================================
// RPC Server
// ============================================================================

/// Build the RPC router with all endpoints (for testing)
pub fn build_rpc_router(service: Arc<BridgeService>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(vec![http::Method::GET, http::Method::POST, http::Method::OPTIONS])
        .allow_headers(vec![http::header::CONTENT_TYPE])
        .allow_credentials(true);

    Router::new()
        // Chain reads
        .route("/chain/block/:height", get(get_block))
        .route("/chain/block/:height/tx/:index", get(get_transaction_from_block))
        .route("/chain/tx/:hash", get(get_transaction))
        // Stake writes
        .route("/stake/sequence/:address", get(get_sequence))
        .route("/stake/candidacy/declare", post(declare_candidacy))
        .route("/stake/candidacy/withdraw", post(withdraw_candidacy))
        .route("/stake/candidacy/edit", post(edit_candidacy))
        .route("/stake/slot/propose", post(propose_slot))
        .route("/stake/slot/accept", post(accept_slot))
        .route("/stake/slot/withdraw", post(withdraw_slot))
        .route("/stake/slot/cancel", post(cancel_slot))
        // State queries
        .route("/stake/validators", get(query_validators))
        .route("/stake/validator/:address", get(query_validator))
        .route("/stake/slots", get(query_slots))
        .route("/stake/slot/:id", get(query_slot))
        .route("/stake/delegator/:address", get(query_delegator))
        // Governance
        .route("/governance/propose", post(propose_governance))
        .route("/governance/proposals", get(list_proposals))
        .route("/governance/proposal/:id", get(get_proposal))
        .route("/governance/proposal/:id/votes", get(list_votes))
        .route("/governance/proposal/:id/vote/:voter", get(get_vote))
        // System
        .route("/health", get(health_check))
        .layer(middleware::from_fn(logging_middleware))
        .with_state(service)
        .layer(cors)
}

/// Run the RPC server until the listener fails.
pub async fn run_rpc_server(
    service: Arc<BridgeService>,
    port: u16,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = build_rpc_router(service);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(%addr, "rpc.listening");
    axum::serve(listener, app).await?;
    Ok(())
}

// ============================================================================
// Route Handlers
// ============================================================================

async fn health_check(State(service): State<Arc<BridgeService>>) -> Response {
    match service.chain_id() {
        Some(chain_id) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "healthy",
                "chain_id": chain_id,
                "observed_height": service.last_observed_height(),
            })),
        )
            .into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "starting",
                "chain_id": serde_json::Value::Null,
                "observed_height": service.last_observed_height(),
            })),
        )
            .into_response(),
    }
}

async fn get_block(
    State(service): State<Arc<BridgeService>>,
    Path(height): Path<u64>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(service.get_block(height).await?))
}

async fn get_transaction(
    State(service): State<Arc<BridgeService>>,
    Path(hash): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(service.get_transaction(&hash).await?))
}

async fn get_transaction_from_block(
    State(service): State<Arc<BridgeService>>,
    Path((height, index)): Path<(u64, usize)>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(service.get_transaction_from_block(height, index).await?))
}

async fn get_sequence(
    State(service): State<Arc<BridgeService>>,
    Path(address): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let parsed = parse_address(&address)?;
    let sequence = service.get_sequence(&parsed).await?;
    Ok(Json(SequenceResponse {
        address: address_to_hex(&parsed),
        sequence,
    }))
}

async fn declare_candidacy(
    State(service): State<Arc<BridgeService>>,
    Json(req): Json<DeclareCandidacyRequest>,
) -> Result<Json<CommitResponse>, ApiError> {
    let from = parse_address(&req.from)?;
    let pub_key = validator_pubkey_from_hex(&req.pub_key).map_err(ApiError)?;
    Ok(Json(
        service.declare_candidacy(&from, pub_key, req.sequence).await?,
    ))
}

async fn withdraw_candidacy(
    State(service): State<Arc<BridgeService>>,
    Json(req): Json<WithdrawCandidacyRequest>,
) -> Result<Json<CommitResponse>, ApiError> {
    let from = parse_address(&req.from)?;
    Ok(Json(service.withdraw_candidacy(&from, req.sequence).await?))
}

async fn edit_candidacy(
    State(service): State<Arc<BridgeService>>,
    Json(req): Json<EditCandidacyRequest>,
) -> Result<Json<CommitResponse>, ApiError> {
    let from = parse_address(&req.from)?;
    let new_address = parse_address(&req.new_address)?;
    Ok(Json(
        service.edit_candidacy(&from, new_address, req.sequence).await?,
    ))
}

async fn propose_slot(
    State(service): State<Arc<BridgeService>>,
    Json(req): Json<ProposeSlotRequest>,
) -> Result<Json<CommitResponse>, ApiError> {
    let from = parse_address(&req.from)?;
    Ok(Json(
        service
            .propose_slot(&from, req.amount, req.proposed_roi, req.sequence)
            .await?,
    ))
}

async fn accept_slot(
    State(service): State<Arc<BridgeService>>,
    Json(req): Json<SlotAmountRequest>,
) -> Result<Json<CommitResponse>, ApiError> {
    let from = parse_address(&req.from)?;
    Ok(Json(
        service
            .accept_slot(&from, req.amount, req.slot_id, req.sequence)
            .await?,
    ))
}

async fn withdraw_slot(
    State(service): State<Arc<BridgeService>>,
    Json(req): Json<SlotAmountRequest>,
) -> Result<Json<CommitResponse>, ApiError> {
    let from = parse_address(&req.from)?;
    Ok(Json(
        service
            .withdraw_slot(&from, req.amount, req.slot_id, req.sequence)
            .await?,
    ))
}

async fn cancel_slot(
    State(service): State<Arc<BridgeService>>,
    Json(req): Json<CancelSlotRequest>,
) -> Result<Json<CommitResponse>, ApiError> {
    let from = parse_address(&req.from)?;
    Ok(Json(
        service.cancel_slot(&from, req.slot_id, req.sequence).await?,
    ))
}

async fn propose_governance(
    State(service): State<Arc<BridgeService>>,
    Json(req): Json<GovernanceProposeRequest>,
) -> Result<Json<CommitResponse>, ApiError> {
    let proposer = parse_address(&req.proposer)?;
    let from = parse_address(&req.from)?;
    let to = parse_address(&req.to)?;
    Ok(Json(
        service
            .propose_governance(&proposer, from, to, req.amount, req.reason, req.sequence)
            .await?,
    ))
}

async fn query_validators(
    State(service): State<Arc<BridgeService>>,
    Query(params): Query<HeightQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let result = service.query_validators(params.height).await?;
    Ok(Json(StateQueryReply::from(result)))
}

async fn query_validator(
    State(service): State<Arc<BridgeService>>,
    Path(address): Path<String>,
    Query(params): Query<HeightQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let parsed = parse_address(&address)?;
    let result = service.query_validator(&parsed, params.height).await?;
    Ok(Json(StateQueryReply::from(result)))
}

async fn query_slots(
    State(service): State<Arc<BridgeService>>,
    Query(params): Query<HeightQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let result = service.query_slots(params.height).await?;
    Ok(Json(StateQueryReply::from(result)))
}

async fn query_slot(
    State(service): State<Arc<BridgeService>>,
    Path(id): Path<String>,
    Query(params): Query<HeightQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let result = service.query_slot(&id, params.height).await?;
    Ok(Json(StateQueryReply::from(result)))
}

async fn query_delegator(
    State(service): State<Arc<BridgeService>>,
    Path(address): Path<String>,
    Query(params): Query<HeightQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let parsed = parse_address(&address)?;
    let result = service.query_delegator(&parsed, params.height).await?;
    Ok(Json(StateQueryReply::from(result)))
}

async fn list_proposals(
    State(service): State<Arc<BridgeService>>,
) -> Result<impl IntoResponse, ApiError> {
    let proposals = service.list_proposals()?;
    Ok(Json(serde_json::json!({
        "count": proposals.len(),
        "proposals": proposals,
    })))
}

async fn get_proposal(
    State(service): State<Arc<BridgeService>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    match service.get_proposal(&id)? {
        Some(proposal) => Ok(Json(proposal).into_response()),
        None => Ok((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Proposal {} not found", id),
            }),
        )
            .into_response()),
    }
}

async fn list_votes(
    State(service): State<Arc<BridgeService>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let votes = service.list_votes(&id)?;
    Ok(Json(serde_json::json!({
        "count": votes.len(),
        "votes": votes,
    })))
}

async fn get_vote(
    State(service): State<Arc<BridgeService>>,
    Path((id, voter)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let voter = parse_address(&voter)?;
    match service.get_vote(&id, &voter)? {
        Some(vote) => Ok(Json(vote).into_response()),
        None => Ok((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("No vote on {} by {}", id, address_to_hex(&voter)),
            }),
        )
            .into_response()),
    }
}
