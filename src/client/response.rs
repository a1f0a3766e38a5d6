//! Response pipeline
//!
//! Classifies every response before the caller sees it:
//! - 401 clears the credential and sends the user to the entry point
//! - transport failures become [`Error::ServiceUnreachable`]
//! - other non-success statuses become [`Error::Api`] with the backend's message

use std::sync::Arc;

use reqwest::{Response, StatusCode};
use serde_json::Value;
use tracing::{error, warn};

use crate::auth::CredentialStore;
use crate::location::EntryRedirect;
use crate::{Error, Result};

/// Response classification
pub struct ResponsePipeline {
    store: Arc<dyn CredentialStore>,
    redirect: Arc<EntryRedirect>,
}

impl ResponsePipeline {
    /// Pipeline that clears `store` and uses `redirect` on authorization failure
    pub fn new(store: Arc<dyn CredentialStore>, redirect: Arc<EntryRedirect>) -> Self {
        Self { store, redirect }
    }

    /// Inspect the result of a dispatched request
    pub async fn inspect(&self, result: reqwest::Result<Response>) -> Result<Response> {
        let response = result.map_err(classify_transport)?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            warn!(url = %response.url().path(), "Credential rejected, clearing it");
            self.store.clear();
            self.redirect.now();
            return Err(Error::Unauthorized);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        Ok(response)
    }
}

/// Connection and timeout failures mean the backend is unreachable; anything
/// else stays a plain HTTP error.
fn classify_transport(e: reqwest::Error) -> Error {
    if e.is_connect() || e.is_timeout() {
        error!(error = %e, "Backend service unavailable");
        Error::ServiceUnreachable(e.to_string())
    } else {
        Error::Http(e)
    }
}

/// Pull `message` or `error` out of a JSON error body
fn error_message(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(json) => ["message", "error"]
            .iter()
            .find_map(|k| json.get(*k).and_then(Value::as_str))
            .map_or_else(String::new, str::to_string),
        Err(_) => body.trim().to_string(),
    }
}
