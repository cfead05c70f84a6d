//! Detail payload endpoints.
//!
//! A list view hands its selection to a detail view as JSON. These endpoints
//! check such a payload and return it typed, or `null` when none was given.

use axum::extract::Query;
use axum::routing::get;
use axum::{Json, Router};
use fieldkit_core::detail::{decode, DetailPayload};
use fieldkit_core::{DeviceDetail, NetworkDetail};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::api::error::{ApiResult, ErrorResponse};
use crate::state::SharedState;

/// Creates the detail router.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/device", get(decode_device))
        .route("/network", get(decode_network))
}

/// Query parameters carrying a detail payload.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct DetailQuery {
    /// JSON-encoded payload.
    #[param(example = r#"{"id":"C4:7C:8D:6A:3E:21","name":"Heart Rate Monitor","services":[],"characteristics":[]}"#)]
    pub data: Option<String>,
}

fn decode_query<T: DetailPayload>(query: &DetailQuery) -> ApiResult<Json<Option<T>>> {
    Ok(Json(decode(query.data.as_deref())?))
}

/// Check a device detail payload.
#[utoipa::path(
    get,
    path = "/api/detail/device",
    tag = "detail",
    operation_id = "decodeDeviceDetail",
    summary = "Validate a device detail payload",
    description = "Parses a device payload, rejecting unknown fields, bad ids \
        and characteristics that belong to no listed service. An absent or \
        blank payload yields null.",
    params(DetailQuery),
    responses(
        (status = 200, description = "Payload accepted", body = DeviceDetail),
        (status = 400, description = "Payload malformed or invalid", body = ErrorResponse)
    )
)]
pub async fn decode_device(
    Query(query): Query<DetailQuery>,
) -> ApiResult<Json<Option<DeviceDetail>>> {
    decode_query(&query)
}

/// Check a network detail payload.
#[utoipa::path(
    get,
    path = "/api/detail/network",
    tag = "detail",
    operation_id = "decodeNetworkDetail",
    summary = "Validate a network detail payload",
    description = "Parses a network payload, rejecting unknown fields, a BSSID \
        that is not a MAC address and a blank SSID. An absent or blank payload \
        yields null.",
    params(DetailQuery),
    responses(
        (status = 200, description = "Payload accepted", body = NetworkDetail),
        (status = 400, description = "Payload malformed or invalid", body = ErrorResponse)
    )
)]
pub async fn decode_network(
    Query(query): Query<DetailQuery>,
) -> ApiResult<Json<Option<NetworkDetail>>> {
    decode_query(&query)
}
