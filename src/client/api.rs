//! Typed backend contract
//!
//! Auth endpoints plus the dashboard data reads. Risk, affordability and
//! similar results are computed by the backend and passed through as JSON.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use url::Url;

use super::ApiClient;
use crate::{Error, Result};

/// `GET /auth/status` body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthStatus {
    /// Whether the backend recognises the caller
    pub authenticated: bool,
    /// Account email when authenticated
    #[serde(default)]
    pub email: Option<String>,
}

/// Onboarding profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    /// Display name
    pub full_name: String,
    /// Monthly salary
    pub salary: f64,
    /// Monthly rent
    pub monthly_rent: f64,
    /// Other recurring monthly expenses
    pub other_expenses: f64,
    /// City of residence
    pub city: String,
    /// Outstanding loan repayments per month
    pub existing_loans: f64,
}

/// Envelope the profile endpoints answer with
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProfileResponse {
    /// Whether the backend accepted the request
    pub success: bool,
    /// Stored profile
    pub data: Option<UserProfile>,
    /// Backend message on failure
    pub message: Option<String>,
}

/// `GET /api/emails/sync` body
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SyncResult {
    /// Whether the sync ran
    pub success: bool,
    /// Summary for the user
    pub message: Option<String>,
}

/// One chatbot turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `user` or `assistant`
    pub role: String,
    /// Message text
    pub content: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RecordsResponse {
    records: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChatResponse {
    reply: Option<String>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
    history: &'a [ChatMessage],
}

const FALLBACK_CHAT_REPLY: &str = "Sorry, I could not generate a response.";

impl ApiClient {
    /// Ask the backend whether the caller is signed in
    pub async fn auth_status(&self) -> Result<AuthStatus> {
        self.get_json("/auth/status").await
    }

    /// End the server session, then drop the local credential and return to
    /// the entry point
    pub async fn logout(&self) -> Result<()> {
        self.send::<()>(Method::GET, "/auth/logout", None).await?;
        info!("Logged out");
        self.sign_out_locally();
        Ok(())
    }

    /// Where the browser goes to start an external login
    pub fn login_url(&self) -> Result<Url> {
        self.endpoint("/auth/login")
    }

    /// Liveness probe. Unreachable or unhealthy backends report `false`.
    pub async fn health(&self) -> Result<bool> {
        match self.probe("/api/health").await {
            Ok(response) => Ok(response.status().is_success()),
            Err(Error::Http(e)) if e.is_connect() || e.is_timeout() => {
                warn!(error = %e, "Health probe could not reach backend");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Pre-flight the backend, then navigate to the login URL
    pub async fn begin_login(&self) -> Result<Url> {
        if !self.health().await? {
            return Err(Error::ServiceUnreachable(
                "backend failed liveness probe".to_string(),
            ));
        }
        let url = self.login_url()?;
        self.location().assign(url.as_str());
        Ok(url)
    }

    /// Stored onboarding profile
    pub async fn user_profile(&self) -> Result<Option<UserProfile>> {
        let response: ProfileResponse = self.get_json("/api/user/profile").await?;
        Ok(if response.success { response.data } else { None })
    }

    /// Save the onboarding profile
    pub async fn save_user_profile(&self, profile: &UserProfile) -> Result<ProfileResponse> {
        let response: ProfileResponse = self.post_json("/api/user/profile", profile).await?;
        if !response.success {
            return Err(Error::Api {
                status: 200,
                message: response
                    .message
                    .unwrap_or_else(|| "Failed to save profile".to_string()),
            });
        }
        Ok(response)
    }

    /// BNPL records detected for the user
    pub async fn bnpl_records(&self) -> Result<Vec<Value>> {
        let response: RecordsResponse = self.get_json("/api/bnpl/records").await?;
        Ok(response.records)
    }

    /// Backend-computed risk analysis
    pub async fn risk_score(&self) -> Result<Value> {
        self.get_json("/api/risk-score").await
    }

    /// Backend-computed affordability analysis
    pub async fn affordability(&self) -> Result<Value> {
        self.get_json("/api/affordability").await
    }

    /// Re-scan the mailbox for BNPL messages
    pub async fn sync_emails(&self) -> Result<SyncResult> {
        self.get_json("/api/emails/sync").await
    }

    /// Send a chatbot message with the conversation so far
    pub async fn chat(&self, message: &str, history: &[ChatMessage]) -> Result<String> {
        let response: ChatResponse = self
            .post_json("/api/chat", &ChatRequest { message, history })
            .await?;
        Ok(response
            .reply
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| FALLBACK_CHAT_REPLY.to_string()))
    }
}
