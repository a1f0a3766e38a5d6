//! Guardian Client Library
//!
//! API-access layer for the BNPL Guardian dashboard. Every request carries
//! the user's bearer credential once it is known; the credential itself is
//! obtained by exchanging the one-time authorization code that the external
//! login appends to the page URL.
//!
//! # Features
//!
//! - **Exchange gate**: the code is exchanged at most once, however many
//!   requests race to start it, and every request waits for the outcome
//! - **Request pipeline**: attaches `Authorization: Bearer` when a credential is stored
//! - **Response pipeline**: clears the credential on 401 and tells "logged out"
//!   apart from "backend down"
//! - **URL cleanup**: the `code` parameter leaves the visible URL exactly once

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod location;

pub use client::ApiClient;
pub use error::{Error, ErrorKind, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    let installed = match format {
        Some("json") => subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        _ => subscriber.with(fmt::layer().with_writer(std::io::stderr)).try_init(),
    };

    installed.map_err(|e| Error::Internal(format!("Failed to install tracing subscriber: {e}")))
}
