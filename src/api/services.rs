use axum::{
    Json,
    body::Body,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use std::collections::BTreeMap;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{
    models::{HealthResponse, QrRequest, QrResponse},
    state::AppState,
    utils::{parse_content_type, png_data_uri},
    validation::validate_request,
};
use crate::api::error::ApiError;
use crate::qr;
use crate::queue::UploadJob;

/// QR generation endpoint (POST /generate-qr/)
///
/// ## Flow:
/// 1. Validate Content-Type (application/json)
/// 2. Read body (gzip already undone by RequestDecompressionLayer), enforce size limit
/// 3. Deserialize and validate the request
/// 4. Encode the url as a PNG QR code
/// 5. Generate a UUIDv4 id and build the data URI
/// 6. Hand the PNG to the upload broker; workers write `qr_codes/<id>.png`
/// 7. Return 200 with `{qr_image, id}`
///
/// The upload outcome is never reported to the caller. A job that no worker
/// accepts is logged and counted, and the response is still a success.
pub async fn generate_qr(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Result<impl IntoResponse, ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::InvalidPayload("missing Content-Type header".into()))?;
    parse_content_type(content_type)?;

    let body_bytes = read_body(body, state.config.server.max_request_bytes).await?;

    let request: QrRequest = serde_json::from_slice(&body_bytes)?;
    validate_request(&request).map_err(|e| ApiError::InvalidPayload(e.to_string()))?;

    let png = qr::encode_png(&request.url, &state.config.qr)?;
    state.metrics.qr_generated();

    let id = Uuid::new_v4();
    let qr_image = png_data_uri(&png);
    debug!(%id, png_bytes = png.len(), "QR code generated");

    // Bytes is refcounted: the job and the response share the PNG buffer.
    // Scheduling never waits; a saturated backlog drops the upload.
    match state.broker.enqueue(UploadJob::new(id, png)) {
        Ok(seq) => {
            state.metrics.upload_enqueued();
            debug!(%id, seq, "Upload queued");
        }
        Err(e) => {
            state.metrics.upload_dropped();
            warn!(%id, error = %e, "Upload dropped; image will not be persisted");
        }
    }

    let response = QrResponse {
        qr_image,
        id: id.to_string(),
    };

    Ok((StatusCode::OK, Json(response)))
}

/// Reads the request body, refusing to buffer more than `max_size` bytes
async fn read_body(body: Body, max_size: usize) -> Result<bytes::Bytes, ApiError> {
    let data = Limited::new(body, max_size)
        .collect()
        .await
        .map_err(|err| {
            if err.downcast_ref::<LengthLimitError>().is_some() {
                ApiError::PayloadTooLarge(max_size)
            } else {
                ApiError::InvalidPayload(format!("failed to read body: {err}"))
            }
        })?
        .to_bytes();

    Ok(data)
}

/// Health check endpoint (GET /health)
///
/// Components:
/// - api: Axum HTTP server
/// - upload_broker: unhealthy once any worker channel is closed
/// - storage: unhealthy when a metadata lookup errors or times out
///
/// Returns 503 Service Unavailable if any component is unhealthy.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let status_of = |healthy: bool| {
        let status = if healthy { "healthy" } else { "unhealthy" };
        status.to_string()
    };

    let mut components = BTreeMap::new();
    components.insert("api".to_string(), status_of(true));
    components.insert(
        "upload_broker".to_string(),
        status_of(state.broker.health_check()),
    );
    components.insert(
        "storage".to_string(),
        status_of(state.storage.health_check().await),
    );

    let all_healthy = components.values().all(|status| status == "healthy");

    let status_code = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: status_of(all_healthy),
        components,
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    (status_code, Json(response))
}
