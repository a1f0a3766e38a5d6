//! Credential acquisition
//!
//! Turns the one-time authorization code that arrives on the page URL after
//! an external login into a stored bearer credential.
//!
//! Features:
//! - Single-slot credential storage (file-backed or in-memory)
//! - Startup detection of the `code` query parameter
//! - One-shot exchange gate shared by every outgoing request

mod detect;
mod exchange;
mod gate;
mod storage;

pub use detect::{CodeDetector, Detection};
pub use exchange::{CodeExchanger, ExchangeFailure, HttpCodeExchanger};
pub use gate::{ExchangeGate, ExchangeOutcome, GateContext, GateState};
pub use storage::{Credential, CredentialStore, FileCredentialStore, MemoryCredentialStore};
