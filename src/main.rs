//! Guardian Client - dashboard API client CLI
//!
//! Boots the client on a page URL (running code detection and the exchange
//! gate), then issues one request through the pipelines.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::error;

use guardian_client::{
    ApiClient, Error, ErrorKind,
    auth::{CredentialStore, FileCredentialStore},
    cli::{Cli, Command},
    config::Config,
    location::{LocationEvent, MemoryLocation, PageLocation},
    setup_tracing,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {e}");
            return ExitCode::FAILURE;
        }
    };

    let location = match MemoryLocation::parse(&cli.page_url) {
        Ok(location) => Arc::new(location),
        Err(e) => {
            eprintln!("❌ Invalid page URL '{}': {e}", cli.page_url);
            return ExitCode::FAILURE;
        }
    };

    let store = match open_store(&config, &location.current()) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("❌ {e}");
            return ExitCode::FAILURE;
        }
    };

    let client = match ApiClient::bootstrap(&config, store, location.clone()) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("❌ {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = client.exchange_result().await {
        eprintln!("⚠️  {}", e.user_message());
        // Let the scheduled entry-point redirect land before reporting
        tokio::time::sleep(config.auth.failure_redirect_delay).await;
    }

    let code = run_command(&client, cli.command.unwrap_or(Command::Status)).await;
    report_location(&location);
    code
}

fn open_store(config: &Config, page: &url::Url) -> guardian_client::Result<Arc<dyn CredentialStore>> {
    let dir = config.storage.resolve_directory()?;
    let origin = page.origin().ascii_serialization();
    Ok(Arc::new(FileCredentialStore::new(
        &dir,
        &origin,
        &config.storage.key,
    )?))
}

async fn run_command(client: &ApiClient, command: Command) -> ExitCode {
    let result = match command {
        Command::Status => client.auth_status().await.map(|status| {
            if status.authenticated {
                println!(
                    "✅ Authenticated{}",
                    status.email.map(|e| format!(" as {e}")).unwrap_or_default()
                );
            } else {
                println!("Not authenticated");
            }
        }),
        Command::Health => client.health().await.map(|healthy| {
            if healthy {
                println!("✅ Backend is up");
            } else {
                println!("❌ Backend unavailable");
            }
        }),
        Command::LoginUrl { check } => {
            let url = if check {
                client.begin_login().await
            } else {
                client.login_url()
            };
            url.map(|u| println!("{u}"))
        }
        Command::Logout => client.logout().await.map(|()| println!("Logged out")),
        Command::Whoami => {
            if client.credential().is_some() {
                println!("Credential stored");
            } else {
                println!("No credential stored");
            }
            Ok(())
        }
        Command::Get { path } => client
            .get_json::<serde_json::Value>(&path)
            .await
            .and_then(|body| {
                println!("{}", serde_json::to_string_pretty(&body)?);
                Ok(())
            }),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report_error(&e),
    }
}

fn report_error(e: &Error) -> ExitCode {
    error!(error = %e, kind = ?e.kind(), "Request failed");
    match e.kind() {
        ErrorKind::ServiceUnreachable | ErrorKind::Unauthorized | ErrorKind::ExchangeFailed => {
            eprintln!("❌ {}", e.user_message());
        }
        ErrorKind::Other => eprintln!("❌ {e}"),
    }
    ExitCode::FAILURE
}

/// Show where the page ended up after cleanup and redirects
fn report_location(location: &MemoryLocation) {
    for event in location.events() {
        match event {
            LocationEvent::Replaced(url) => println!("↺ URL is now {url}"),
            LocationEvent::Navigated(url) => println!("→ Navigated to {url}"),
        }
    }
}
