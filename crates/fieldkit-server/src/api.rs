//! HTTP API routes and handlers.
//!
//! This module contains all HTTP endpoint implementations organized by domain:
//! - `weather` - Forecast lookups and zipcode history
//! - `bluetooth` - BLE scan sessions, discovery view, connecting
//! - `wifi` - Wi-Fi scan cycles and network detail
//! - `barcodes` - Barcode scan history
//! - `detail` - Detail payload validation
//! - `health` - Service health checks
//! - `error` - API error types
//! - `openapi` - OpenAPI specification generation

use axum::routing::get;
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::SharedState;

pub mod barcodes;
pub mod bluetooth;
pub mod detail;
pub mod error;
pub mod health;
pub mod openapi;
pub mod weather;
pub mod wifi;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use openapi::get_openapi_json;

/// Creates the combined API router with all endpoints.
///
/// # Route Structure
///
/// ```text
/// /health                      - Health check
/// /api
/// ├── /weather                 - Forecast by zipcode, by position, history
/// ├── /bluetooth/scan          - Start/stop a scan session
/// ├── /bluetooth/devices       - Discovery view, detail, connect
/// ├── /wifi/networks           - Scan cycle and network detail
/// ├── /barcodes                - Barcode history
/// ├── /detail                  - Detail payload validation
/// └── /openapi.json            - OpenAPI specification
/// ```
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .nest("/health", health::router())
        .nest(
            "/api",
            Router::new()
                .nest("/weather", weather::router())
                .nest("/bluetooth", bluetooth::router())
                .nest("/wifi", wifi::router())
                .nest("/barcodes", barcodes::router())
                .nest("/detail", detail::router())
                // OpenAPI spec at /api/openapi.json
                .route("/openapi.json", get(openapi::get_openapi_spec)),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
