//! Request pipeline
//!
//! Every outgoing request waits on the exchange gate, then picks up whatever
//! credential the store holds at that moment.

use std::sync::Arc;

use reqwest::Request;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use tracing::{debug, warn};

use crate::auth::{CredentialStore, ExchangeGate, ExchangeOutcome};
use crate::{Error, Result};

/// Gate-aware credential attachment
pub struct RequestPipeline {
    gate: Arc<ExchangeGate>,
    store: Arc<dyn CredentialStore>,
}

impl RequestPipeline {
    /// Pipeline over `gate` and `store`
    pub fn new(gate: Arc<ExchangeGate>, store: Arc<dyn CredentialStore>) -> Self {
        Self { gate, store }
    }

    /// Wait for the gate, then attach the stored credential if there is one.
    ///
    /// A failed exchange does not fail the request; it goes out without a
    /// credential and the backend decides.
    pub async fn prepare(&self, mut request: Request) -> Result<Request> {
        if let ExchangeOutcome::Failure(reason) = self.gate.ready().await {
            debug!(reason = %reason, "Exchange failed earlier, request proceeds unauthenticated");
        }

        let attached = match self.store.get() {
            Some(credential) => {
                let mut value = HeaderValue::from_str(&credential.bearer_header()).map_err(|_| {
                    warn!("Stored credential is not a valid header value");
                    Error::Internal("Stored credential is not a valid header value".to_string())
                })?;
                value.set_sensitive(true);
                request.headers_mut().insert(AUTHORIZATION, value);
                true
            }
            None => false,
        };

        debug!(
            method = %request.method(),
            path = %request.url().path(),
            authenticated = attached,
            "Dispatching request"
        );
        Ok(request)
    }
}
