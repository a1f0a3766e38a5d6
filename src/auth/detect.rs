//! Authorization code detection at startup

use tracing::{debug, info};

use super::storage::CredentialStore;
use crate::location::{CodeCleanup, PageLocation};

/// What the page looked like when the client started
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    /// One-time authorization code from the query string
    pub code: Option<String>,
    /// Whether a credential was already stored
    pub has_existing_credential: bool,
}

impl Detection {
    /// A code is present and nothing is stored yet
    #[must_use]
    pub fn needs_exchange(&self) -> bool {
        self.code.is_some() && !self.has_existing_credential
    }
}

/// Reads the authorization code off the initial page URL
#[derive(Debug, Clone)]
pub struct CodeDetector {
    param: String,
}

impl CodeDetector {
    /// Detector for the query parameter `param`
    pub fn new(param: impl Into<String>) -> Self {
        Self {
            param: param.into(),
        }
    }

    /// Inspect the location once.
    ///
    /// When a code arrives but a credential is already stored, no exchange
    /// is needed and the code is stripped from the URL right away.
    pub fn detect(
        &self,
        location: &dyn PageLocation,
        store: &dyn CredentialStore,
        cleanup: &CodeCleanup,
    ) -> Detection {
        let url = location.current();
        let code = url
            .query_pairs()
            .find(|(k, _)| k == self.param.as_str())
            .map(|(_, v)| v.into_owned())
            .filter(|v| !v.is_empty());
        let has_existing_credential = store.get().is_some();

        debug!(
            code_present = code.is_some(),
            has_existing_credential, "Checked page for authorization code"
        );

        if code.is_some() && has_existing_credential {
            info!("Credential already stored, discarding authorization code");
            cleanup.strip_once();
        }

        Detection {
            code,
            has_existing_credential,
        }
    }
}
