//! Request and response bodies for the QR endpoints.
//!
//! `POST /generate-qr/` accepts a [`QrRequest`]:
//!
//! ```json
//! { "url": "https://example.com/landing" }
//! ```
//!
//! and answers with a [`QrResponse`] carrying the PNG inline plus the id under
//! which the image is persisted (`qr_codes/<id>.png`):
//!
//! ```json
//! {
//!   "qr_image": "data:image/png;base64,iVBORw0KGgo...",
//!   "id": "6f1c1a3e-2b8f-4d7a-9e55-0c2f4b9d1a77"
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct QrRequest {
    /// Text to encode. Any string is accepted, not only URLs.
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct QrResponse {
    pub qr_image: String,
    pub id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub components: BTreeMap<String, String>,
    pub version: String,
}
