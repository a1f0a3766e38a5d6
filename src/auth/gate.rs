//! Exchange gate
//!
//! One-shot gate around the code exchange. An armed gate holds a single
//! memoized future; `ready()` hands every caller a clone of it, so the
//! exchange body runs exactly once no matter how many callers race on the
//! first poll. Once resolved the outcome never changes for the lifetime of
//! the gate.
//!
//! ```text
//! Idle ──first poll──▶ Exchanging ──▶ Resolved(Success | Failure)
//!  └──────── no code / credential present ──▶ Resolved(NotAttempted)
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::exchange::{CodeExchanger, ExchangeFailure};
use super::storage::{Credential, CredentialStore};
use crate::location::{CodeCleanup, EntryRedirect};

/// Result of the one-time exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeOutcome {
    /// Credential obtained and stored
    Success(Credential),
    /// Exchange attempted and failed
    Failure(ExchangeFailure),
    /// No code, or a credential already existed
    NotAttempted,
}

impl ExchangeOutcome {
    /// Whether the exchange produced a credential
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Observable gate state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateState {
    /// Armed, nobody has awaited yet
    Idle,
    /// Exchange in flight
    Exchanging,
    /// Terminal
    Resolved(ExchangeOutcome),
}

/// Collaborators an armed gate needs to commit its outcome
pub struct GateContext {
    /// Receives the credential on success
    pub store: Arc<dyn CredentialStore>,
    /// Removes the code from the visible URL
    pub cleanup: Arc<CodeCleanup>,
    /// Sends the user back to the entry point on failure
    pub redirect: Arc<EntryRedirect>,
    /// Upper bound for the exchange call
    pub timeout: Duration,
    /// Pause before the failure redirect
    pub failure_redirect_delay: Duration,
}

enum Inner {
    Resolved(ExchangeOutcome),
    Armed {
        outcome: Shared<BoxFuture<'static, ExchangeOutcome>>,
        started: Arc<AtomicBool>,
    },
}

/// One-shot credential exchange gate
pub struct ExchangeGate {
    inner: Inner,
}

impl ExchangeGate {
    /// Gate that never exchanges
    #[must_use]
    pub fn not_attempted() -> Self {
        Self {
            inner: Inner::Resolved(ExchangeOutcome::NotAttempted),
        }
    }

    /// Gate that exchanges `code` on first poll
    pub fn armed(code: String, exchanger: Arc<dyn CodeExchanger>, ctx: GateContext) -> Self {
        let started = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&started);

        let outcome = async move {
            flag.store(true, Ordering::Release);
            info!("Exchanging authorization code for credential");

            let outcome = match tokio::time::timeout(ctx.timeout, exchanger.exchange(&code)).await
            {
                Ok(Ok(credential)) => {
                    // Commit before publishing so no request sees Success without it
                    ctx.store.set(&credential);
                    info!("Code exchange succeeded");
                    ExchangeOutcome::Success(credential)
                }
                Ok(Err(failure)) => {
                    warn!(reason = %failure, "Code exchange failed");
                    ExchangeOutcome::Failure(failure)
                }
                Err(_) => {
                    warn!(timeout = ?ctx.timeout, "Code exchange timed out");
                    ExchangeOutcome::Failure(ExchangeFailure::Timeout(ctx.timeout))
                }
            };

            // The code is spent either way
            ctx.cleanup.strip_once();

            if let ExchangeOutcome::Failure(_) = outcome {
                debug!(delay = ?ctx.failure_redirect_delay, "Scheduling redirect to entry point");
                ctx.redirect.after(ctx.failure_redirect_delay);
            }

            outcome
        }
        .boxed()
        .shared();

        Self {
            inner: Inner::Armed { outcome, started },
        }
    }

    /// Wait for the outcome. Free once resolved.
    pub async fn ready(&self) -> ExchangeOutcome {
        match &self.inner {
            Inner::Resolved(outcome) => outcome.clone(),
            Inner::Armed { outcome, .. } => outcome.clone().await,
        }
    }

    /// Current state without waiting
    pub fn state(&self) -> GateState {
        match &self.inner {
            Inner::Resolved(outcome) => GateState::Resolved(outcome.clone()),
            Inner::Armed { outcome, started } => match outcome.peek() {
                Some(resolved) => GateState::Resolved(resolved.clone()),
                None if started.load(Ordering::Acquire) => GateState::Exchanging,
                None => GateState::Idle,
            },
        }
    }

    /// Start the exchange on a background task so it makes progress before
    /// the first request. Returns `None` when there is nothing to drive.
    pub fn drive(&self) -> Option<JoinHandle<ExchangeOutcome>> {
        match &self.inner {
            Inner::Resolved(_) => None,
            Inner::Armed { outcome, .. } => Some(tokio::spawn(outcome.clone())),
        }
    }
}
