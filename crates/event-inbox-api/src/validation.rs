//! Delivery URL validation.

use crate::error::ApiError;

/// Validate a delivery URL: parseable, absolute, http(s), with a host.
///
/// Internal-range blocking is deliberately not applied here; endpoints are
/// registered by operators, and local sinks are a supported deployment.
pub fn validate_delivery_url(raw: &str) -> Result<(), ApiError> {
    let parsed = url::Url::parse(raw)
        .map_err(|e| ApiError::Validation(format!("invalid delivery_url: {e}")))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(ApiError::Validation(format!(
                "unsupported delivery_url scheme: {scheme}"
            )));
        }
    }

    if parsed.host_str().is_none() {
        return Err(ApiError::Validation(
            "delivery_url must have a host".to_string(),
        ));
    }

    Ok(())
}
