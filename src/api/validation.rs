use thiserror::Error;

use super::models::QrRequest;

#[derive(Debug, Error)]
pub enum RequestValidationError {
    #[error("url must not be empty")]
    EmptyUrl,
}

/// Structural checks only; the url is encoded as given, whatever its scheme
pub fn validate_request(request: &QrRequest) -> Result<(), RequestValidationError> {
    if request.url.trim().is_empty() {
        return Err(RequestValidationError::EmptyUrl);
    }

    Ok(())
}
