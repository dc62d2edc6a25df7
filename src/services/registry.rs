//! Client for the government-registry lookup gateway.
//!
//! Only called for values that already passed the local format rules. The
//! gateway answers `{ "valid": bool, "message"?: string }`; error bodies
//! come in several shapes and are read best-effort.

use chrono::Utc;
use log::{info, warn};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

use crate::config::Config;
use crate::verification::rules::IdentifierKind;
use crate::verification::{RegistryConfirmation, RegistryOutcome};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry lookups are not configured")]
    NotConfigured,
    #[error("registry request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("registry returned {status}: {message}")]
    Api { status: u16, message: String },
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    valid: bool,
    message: Option<String>,
}

/// Pulls a human message out of an error body: `message`, `error.message`,
/// `error` as a string, `errors[0].message`, then `detail`.
pub fn extract_error_message(body: &Value) -> Option<String> {
    let candidates = [
        body.get("message"),
        body.get("error").and_then(|e| e.get("message")),
        body.get("error"),
        body.get("errors").and_then(|e| e.get(0)).and_then(|e| e.get("message")),
        body.get("detail"),
    ];
    candidates
        .into_iter()
        .flatten()
        .find_map(|v| v.as_str().map(str::trim).filter(|s| !s.is_empty()))
        .map(str::to_string)
}

fn message_from_text(text: &str, fallback: &str) -> String {
    serde_json::from_str::<Value>(text)
        .ok()
        .and_then(|body| extract_error_message(&body))
        .unwrap_or_else(|| fallback.to_string())
}

pub struct RegistryService;

impl RegistryService {
    fn client() -> Result<Client, RegistryError> {
        Ok(Client::builder()
            .timeout(Duration::from_secs(Config::registry_timeout_secs()))
            .build()?)
    }

    fn base_url() -> Result<String, RegistryError> {
        Config::registry_base_url()
            .map(|url| url.trim_end_matches('/').to_string())
            .ok_or(RegistryError::NotConfigured)
    }

    /// Asks the registry whether `value` is a registered identifier of `kind`.
    /// A definite answer becomes `confirmed` or `rejected`; transport and
    /// server failures are returned as errors for the caller to record.
    pub async fn confirm(kind: IdentifierKind, value: &str) -> Result<RegistryConfirmation, RegistryError> {
        let url = format!("{}/verify/{}", Self::base_url()?, kind);

        let mut request = Self::client()?.post(&url).json(&json!({ "value": value }));
        if let Some(key) = Config::registry_api_key() {
            request = request.header("x-api-key", key);
        }

        let res = request.send().await?;
        let status = res.status();
        let text = res.text().await?;

        if status.is_success() {
            let body: LookupResponse = serde_json::from_str(&text).map_err(|e| RegistryError::Api {
                status: status.as_u16(),
                message: format!("unreadable registry response: {}", e),
            })?;
            let outcome = if body.valid { RegistryOutcome::Confirmed } else { RegistryOutcome::Rejected };
            info!("registry {} lookup: {:?}", kind, outcome);
            return Ok(RegistryConfirmation { outcome, message: body.message, checked_at: Utc::now() });
        }

        // The registry knows the identifier format but not this value.
        if status == StatusCode::NOT_FOUND || status == StatusCode::UNPROCESSABLE_ENTITY {
            return Ok(RegistryConfirmation {
                outcome: RegistryOutcome::Rejected,
                message: Some(message_from_text(&text, "not found in registry")),
                checked_at: Utc::now(),
            });
        }

        let message = message_from_text(&text, "registry error");
        warn!("registry {} lookup failed with {}: {}", kind, status, message);
        Err(RegistryError::Api { status: status.as_u16(), message })
    }
}
