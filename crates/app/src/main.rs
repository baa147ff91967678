//! Tollgate command-line client.
//!
//! Settings come from `--config FILE` (or an optional `tollgate.toml`) and
//! `TOLLGATE_*` variables. When `TOLLGATE_EMAIL` and `TOLLGATE_PASSWORD` are
//! set and no session was restored, the client logs in first.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tollgate_application::{AuthGateway, GatewayError, SessionEvent};
use tollgate_domain::{ClientSettings, Credentials};
use tollgate_infrastructure::{FileTokenRepository, build_gateway, load_settings};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_PATH: &str = "/products";

/// Tollgate - call the shop API with a refreshing session.
#[derive(Debug, Parser)]
#[command(name = "tollgate")]
#[command(version)]
struct Args {
    /// Settings file (toml, yaml or json)
    #[arg(long, global = true, env = "TOLLGATE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
enum Command {
    /// GET a path and print the response
    Get {
        /// Request path, relative to the base URL
        #[arg(default_value = DEFAULT_PATH)]
        path: String,
    },

    /// Show the session status
    Status,

    /// Log out and clear the stored session
    Logout,
}

impl Args {
    fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Get {
            path: DEFAULT_PATH.to_string(),
        })
    }
}

/// The CLI keeps its session between runs unless told otherwise.
fn with_default_session_dir(mut settings: ClientSettings) -> ClientSettings {
    if settings.session_dir.is_none() {
        settings.session_dir = FileTokenRepository::default_dir();
    }
    settings
}

fn credentials_from_env() -> Option<Credentials> {
    let email = std::env::var("TOLLGATE_EMAIL").ok()?;
    let password = std::env::var("TOLLGATE_PASSWORD").ok()?;
    Some(Credentials::new(email, password))
}

fn report(error: GatewayError) -> Box<dyn std::error::Error> {
    if error.requires_sign_in() {
        warn!("sign in again: set TOLLGATE_EMAIL and TOLLGATE_PASSWORD, then retry");
    }
    error.into()
}

async fn ensure_session(gateway: &AuthGateway) -> Result<(), GatewayError> {
    match gateway.restore_session().await {
        Ok(true) => return Ok(()),
        Ok(false) => {}
        Err(e) => warn!(error = %e, "could not restore session"),
    }
    if let Some(credentials) = credentials_from_env() {
        gateway.login(&credentials).await?;
    }
    Ok(())
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let settings = with_default_session_dir(load_settings(args.config.as_deref())?);
    let gateway = build_gateway(&settings)?;

    let mut events = gateway.coordinator().events().subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                SessionEvent::SessionExpired { reason } => {
                    warn!(%reason, "session expired");
                }
                other => info!(event = ?other, "session event"),
            }
        }
    });

    ensure_session(&gateway).await.map_err(report)?;

    match args.command() {
        Command::Status => {
            println!("{}", gateway.store().status().display_message());
        }
        Command::Logout => {
            gateway.logout().await;
            println!("Logged out");
        }
        Command::Get { path } => {
            let response = gateway.get(&path).await.map_err(report)?;
            println!("{} ({} ms)", response.status, response.duration.as_millis());
            match response.json_body::<serde_json::Value>() {
                Ok(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                Err(_) => println!("{}", response.text()),
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    info!("Starting Tollgate v{}", env!("CARGO_PKG_VERSION"));
    run(args).await
}
