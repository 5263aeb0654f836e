//! Destination error classification
//!
//! Maps raw failures from any destination into a small taxonomy of
//! user-facing categories with retry and fallback hints. Raw transport
//! errors and status codes never reach the UI directly.

use crate::error::ExportError;
use export_types::Destination;
use serde::{Deserialize, Serialize};

/// User-facing classification of a destination failure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassifiedError {
    pub title: String,
    pub message: String,
    pub can_retry: bool,
    /// Always true: falling back to a local CSV export has no external
    /// dependency and cannot fail for destination-side reasons
    pub can_fallback: bool,
}

/// Classify a raw failure against the deterministic mapping table
pub fn classify(error: &ExportError, destination: Destination) -> ClassifiedError {
    match error {
        ExportError::Api { status, .. } => classify_status(*status, destination),
        ExportError::Http(e) if e.is_timeout() => ClassifiedError {
            title: "Request timed out".to_string(),
            message: format!(
                "{} did not answer in time. The service may be slow right now.",
                destination
            ),
            can_retry: true,
            can_fallback: true,
        },
        ExportError::Http(e) if e.is_connect() => ClassifiedError {
            title: "Connection failed".to_string(),
            message: format!(
                "Could not reach {}. Check your network connection and try again.",
                destination
            ),
            can_retry: true,
            can_fallback: true,
        },
        ExportError::Http(_) => ClassifiedError {
            title: "Connection failed".to_string(),
            message: format!("The request to {} failed before completing.", destination),
            can_retry: true,
            can_fallback: true,
        },
        _ => ClassifiedError {
            title: "Export failed".to_string(),
            message: format!("The export to {} failed unexpectedly.", destination),
            can_retry: true,
            can_fallback: true,
        },
    }
}

fn classify_status(status: u16, destination: Destination) -> ClassifiedError {
    match status {
        401 => ClassifiedError {
            title: "Authentication failed".to_string(),
            message: format!(
                "{} rejected the API key. Reconnect the integration in settings.",
                destination
            ),
            can_retry: false,
            can_fallback: true,
        },
        402 => ClassifiedError {
            title: "No remaining credits".to_string(),
            message: format!(
                "The {} account has no remaining credits for this operation.",
                destination
            ),
            can_retry: false,
            can_fallback: true,
        },
        429 => ClassifiedError {
            title: "Rate limited".to_string(),
            message: format!(
                "{} is rate limiting requests. Wait a moment and retry.",
                destination
            ),
            can_retry: true,
            can_fallback: true,
        },
        500..=599 => ClassifiedError {
            title: "Destination unavailable".to_string(),
            message: format!(
                "{} is currently unavailable (status {}). Try again shortly.",
                destination, status
            ),
            can_retry: true,
            can_fallback: true,
        },
        _ => ClassifiedError {
            title: "Export failed".to_string(),
            message: format!("{} returned an unexpected response (status {}).", destination, status),
            can_retry: true,
            can_fallback: true,
        },
    }
}
