//! Dashboard API client
//!
//! [`ApiClient`] is built once per page lifetime. Construction runs code
//! detection, arms or pre-resolves the exchange gate, and wires both
//! pipelines; every request afterwards goes through them.

mod api;
mod request;
mod response;

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use url::Url;

pub use api::{AuthStatus, ChatMessage, ProfileResponse, SyncResult, UserProfile};
pub use request::RequestPipeline;
pub use response::ResponsePipeline;

use crate::auth::{
    CodeDetector, CodeExchanger, Credential, CredentialStore, Detection, ExchangeGate,
    ExchangeOutcome, GateContext, HttpCodeExchanger,
};
use crate::config::Config;
use crate::location::{CodeCleanup, EntryRedirect, PageLocation};
use crate::{Error, Result};

/// Path of the code exchange endpoint
pub const EXCHANGE_PATH: &str = "/auth/exchange-code";

/// Dashboard API client
pub struct ApiClient {
    http: Client,
    base_url: Url,
    detection: Detection,
    gate: Arc<ExchangeGate>,
    store: Arc<dyn CredentialStore>,
    location: Arc<dyn PageLocation>,
    redirect: Arc<EntryRedirect>,
    requests: RequestPipeline,
    responses: ResponsePipeline,
}

impl ApiClient {
    /// Build the client with the HTTP code exchanger
    pub fn bootstrap(
        config: &Config,
        store: Arc<dyn CredentialStore>,
        location: Arc<dyn PageLocation>,
    ) -> Result<Self> {
        let http = build_http_client(config.api.request_timeout, config.api.redirect_limit)?;
        let base_url = config.api.resolve_base_url(&location.current())?;
        let exchanger = Arc::new(HttpCodeExchanger::new(
            http.clone(),
            join_path(&base_url, EXCHANGE_PATH)?,
        ));
        Self::assemble(config, http, base_url, store, location, exchanger)
    }

    /// Build the client with a custom exchanger
    pub fn bootstrap_with(
        config: &Config,
        store: Arc<dyn CredentialStore>,
        location: Arc<dyn PageLocation>,
        exchanger: Arc<dyn CodeExchanger>,
    ) -> Result<Self> {
        let http = build_http_client(config.api.request_timeout, config.api.redirect_limit)?;
        let base_url = config.api.resolve_base_url(&location.current())?;
        Self::assemble(config, http, base_url, store, location, exchanger)
    }

    fn assemble(
        config: &Config,
        http: Client,
        base_url: Url,
        store: Arc<dyn CredentialStore>,
        location: Arc<dyn PageLocation>,
        exchanger: Arc<dyn CodeExchanger>,
    ) -> Result<Self> {
        config.validate()?;

        let cleanup = Arc::new(CodeCleanup::new(
            Arc::clone(&location),
            config.auth.code_param.clone(),
        ));
        let redirect = Arc::new(EntryRedirect::new(
            Arc::clone(&location),
            config.auth.entry_point.clone(),
        ));

        let detection = CodeDetector::new(config.auth.code_param.clone()).detect(
            location.as_ref(),
            store.as_ref(),
            &cleanup,
        );

        let gate = match detection.code.clone().filter(|_| detection.needs_exchange()) {
            Some(code) => {
                let gate = ExchangeGate::armed(
                    code,
                    exchanger,
                    GateContext {
                        store: Arc::clone(&store),
                        cleanup,
                        redirect: Arc::clone(&redirect),
                        timeout: config.auth.exchange_timeout,
                        failure_redirect_delay: config.auth.failure_redirect_delay,
                    },
                );
                // Start right away when a runtime is available; otherwise the
                // first request drives it.
                if tokio::runtime::Handle::try_current().is_ok() {
                    gate.drive();
                }
                gate
            }
            None => ExchangeGate::not_attempted(),
        };
        let gate = Arc::new(gate);

        info!(
            base_url = %base_url,
            exchange_armed = detection.needs_exchange(),
            "API client ready"
        );

        Ok(Self {
            requests: RequestPipeline::new(Arc::clone(&gate), Arc::clone(&store)),
            responses: ResponsePipeline::new(Arc::clone(&store), Arc::clone(&redirect)),
            http,
            base_url,
            detection,
            gate,
            store,
            location,
            redirect,
        })
    }

    /// Backend base URL
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// What the detector saw at startup
    #[must_use]
    pub fn detection(&self) -> &Detection {
        &self.detection
    }

    /// The exchange gate
    #[must_use]
    pub fn gate(&self) -> &ExchangeGate {
        &self.gate
    }

    /// Stored credential, if any
    pub fn credential(&self) -> Option<Credential> {
        self.store.get()
    }

    /// Page location the client navigates
    pub fn location(&self) -> &Arc<dyn PageLocation> {
        &self.location
    }

    /// Wait for the gate and report the exchange as a `Result`.
    /// `Ok(None)` means no exchange was needed.
    pub async fn exchange_result(&self) -> Result<Option<Credential>> {
        match self.gate.ready().await {
            ExchangeOutcome::Success(credential) => Ok(Some(credential)),
            ExchangeOutcome::Failure(reason) => Err(Error::ExchangeFailed(reason)),
            ExchangeOutcome::NotAttempted => Ok(None),
        }
    }

    /// Absolute URL for a backend path
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        join_path(&self.base_url, path)
    }

    /// Send a request through both pipelines
    pub async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Response> {
        let mut builder = self.http.request(method, self.endpoint(path)?);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let request = self.requests.prepare(builder.build()?).await?;
        self.responses.inspect(self.http.execute(request).await).await
    }

    /// GET `path` and decode the JSON body
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send::<()>(Method::GET, path, None).await?;
        decode(response).await
    }

    /// POST `body` as JSON to `path` and decode the JSON reply
    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let response = self.send(Method::POST, path, Some(body)).await?;
        decode(response).await
    }

    /// Forget the local credential and return to the entry point
    pub fn sign_out_locally(&self) {
        self.store.clear();
        self.redirect.now();
    }

    /// Bare GET outside the pipelines, used for probes that must not touch
    /// credential state
    async fn probe(&self, path: &str) -> Result<Response> {
        let url = self.endpoint(path)?;
        debug!(url = %url, "Probing");
        Ok(self.http.get(url).send().await?)
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Append `path` to `base`, keeping any path prefix on the base URL
fn join_path(base: &Url, path: &str) -> Result<Url> {
    let joined = format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Ok(Url::parse(&joined)?)
}

fn build_http_client(timeout: Duration, redirect_limit: usize) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_nodelay(true)
        .redirect(reqwest::redirect::Policy::limited(redirect_limit))
        .build()
        .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {e}")))
}
