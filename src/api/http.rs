use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::blockchain::CursorHandle;
use crate::error::IndexerError;
use crate::models::Transaction;
use crate::shutdown::ShutdownHandle;
use crate::storage::Storage;

#[derive(Debug, Serialize, Deserialize)]
pub struct CurrentBlockResponse {
    pub current_block: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubscribeResponse {
    pub status: String,
    pub address: String,
}

#[derive(Debug, Deserialize)]
pub struct AddressQuery {
    pub address: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

fn error_response(status: StatusCode, error: &str, message: String) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            message,
        }),
    )
}

fn require_address(query: AddressQuery) -> Result<String, (StatusCode, Json<ErrorResponse>)> {
    match query.address {
        Some(address) if !address.trim().is_empty() => Ok(address),
        _ => Err(error_response(
            StatusCode::BAD_REQUEST,
            "invalid_parameter",
            "Address parameter is required".to_string(),
        )),
    }
}

/// Application state shared across handlers
pub struct AppState<S> {
    pub storage: Arc<S>,
    pub cursor: CursorHandle,
}

impl<S> AppState<S> {
    pub fn new(storage: Arc<S>, cursor: CursorHandle) -> Self {
        Self { storage, cursor }
    }
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            cursor: self.cursor.clone(),
        }
    }
}

pub fn router<S: Storage + 'static>(state: AppState<S>) -> Router {
    Router::new()
        .route("/current_block", get(get_current_block::<S>))
        .route("/subscribe", post(subscribe::<S>))
        .route("/transactions", get(get_transactions::<S>))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// HTTP API server
pub struct ApiServer<S> {
    state: AppState<S>,
    pub host: String,
    pub port: u16,
}

impl<S: Storage + 'static> ApiServer<S> {
    pub fn new(state: AppState<S>, host: &str, port: u16) -> Self {
        Self {
            state,
            host: host.to_string(),
            port,
        }
    }

    /// Serve until `shutdown` fires
    pub async fn start(self, shutdown: ShutdownHandle) -> Result<(), IndexerError> {
        let addr = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| IndexerError::Server(format!("Failed to bind to {}: {}", addr, e)))?;

        log::info!("HTTP API server listening on {}", addr);

        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(async move { shutdown.wait().await })
            .await
            .map_err(|e| IndexerError::Server(format!("Server error: {}", e)))
    }
}

/// GET /current_block - highest fully processed block
pub async fn get_current_block<S: Storage>(State(state): State<AppState<S>>) -> Json<CurrentBlockResponse> {
    Json(CurrentBlockResponse {
        current_block: state.cursor.get(),
    })
}

/// POST /subscribe?address=0x...
pub async fn subscribe<S: Storage>(
    State(state): State<AppState<S>>,
    Query(query): Query<AddressQuery>,
) -> ApiResult<SubscribeResponse> {
    let address = require_address(query)?;

    match state.storage.subscribe(&address) {
        Ok(()) => {
            log::info!("Subscribed address {}", address);
            Ok(Json(SubscribeResponse {
                status: "subscribed".to_string(),
                address,
            }))
        }
        Err(e) => {
            log::error!("Failed to subscribe {}: {}", address, e);
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "storage_error",
                format!("Failed to subscribe address: {}", e),
            ))
        }
    }
}

/// GET /transactions?address=0x... - matched transactions in chain order
pub async fn get_transactions<S: Storage>(
    State(state): State<AppState<S>>,
    Query(query): Query<AddressQuery>,
) -> ApiResult<Vec<Transaction>> {
    let address = require_address(query)?;

    match state.storage.list(&address) {
        Ok(transactions) => Ok(Json(transactions)),
        Err(e) => {
            log::error!("Failed to get transactions for {}: {}", address, e);
            Ok(Json(Vec::new()))
        }
    }
}
