//! Helyx - Storefront account service
//! Mission: Registration, sessions, and password recovery behind `/api/auth`
//!
//! Usage:
//!   helyx                       # serve (default)
//!   helyx --bind 127.0.0.1:3000 serve
//!   helyx deactivate alice@example.com
//!   helyx activate alice@example.com
//!   helyx resets alice@example.com
//!
//! Environment: see `AuthConfig::from_env` and `MailConfig::from_env`.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::path::Path;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use helyx_backend::{
    api::create_router,
    auth::{AuthDb, AuthState, ResetLedger, UserStore},
    config::AuthConfig,
    email::{MailConfig, Notifier, NotifierConfig},
};

#[derive(Parser, Debug)]
#[command(name = "helyx")]
#[command(about = "Helyx storefront account service")]
struct Args {
    /// Address the HTTP server listens on
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:3000")]
    bind: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server
    Serve,
    /// Soft-disable an account; existing sessions stop working immediately
    Deactivate { email: String },
    /// Re-enable a deactivated account
    Activate { email: String },
    /// List reset-token rows for an account (token values are not printed)
    Resets { email: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    init_tracing();

    let args = Args::parse();
    let config = AuthConfig::from_env()?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(&args.bind, config).await,
        Command::Deactivate { email } => set_active(&config, &email, false),
        Command::Activate { email } => set_active(&config, &email, true),
        Command::Resets { email } => list_resets(&config, &email),
    }
}

async fn serve(bind: &str, config: AuthConfig) -> Result<()> {
    info!("🚀 Helyx account service starting");

    let db = AuthDb::open(&config.db_path)?;

    let http_client = reqwest::Client::builder()
        .timeout(config.email_send_timeout)
        .build()
        .context("Failed to build HTTP client")?;
    let mailer = MailConfig::from_env().build(http_client);
    let notifier = Notifier::spawn(
        mailer,
        NotifierConfig {
            frontend_url: config.frontend_url.clone(),
            reset_ttl_minutes: config.reset_ttl.num_minutes(),
            send_timeout: config.email_send_timeout,
        },
    );

    let state = AuthState::new(&config, db, notifier)?;
    info!(
        session_ttl_hours = config.session_ttl.num_hours(),
        reset_ttl_minutes = config.reset_ttl.num_minutes(),
        bcrypt_cost = config.bcrypt_cost,
        cookie_secure = config.cookie_secure,
        "🔐 Auth configured"
    );

    let metrics = match setup_metrics() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("⚠️ Prometheus exporter unavailable, /metrics disabled: {:#}", e);
            None
        }
    };

    let app = create_router(state, metrics);

    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    info!("🎯 API server listening on {}", bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("👋 Server stopped");
    Ok(())
}

fn set_active(config: &AuthConfig, email: &str, active: bool) -> Result<()> {
    let users = UserStore::new(AuthDb::open(&config.db_path)?);
    if !users.set_active(email, active)? {
        bail!("No account registered for {}", email);
    }

    let state = if active { "activated" } else { "deactivated" };
    info!("✅ Account {} {}", email, state);
    Ok(())
}

fn list_resets(config: &AuthConfig, email: &str) -> Result<()> {
    let db = AuthDb::open(&config.db_path)?;
    let users = UserStore::new(db.clone());
    let resets = ResetLedger::new(db, config.reset_ttl);

    let account = users
        .find_active_by_email(email)?
        .with_context(|| format!("No active account for {}", email))?;

    let now = Utc::now();
    for row in resets.tokens_for_account(&account.id)? {
        println!(
            "#{:<6} created {}  expires {}  {}",
            row.id,
            row.created_at.to_rfc3339(),
            row.expires_at.to_rfc3339(),
            if row.used {
                "used"
            } else if row.is_live_at(now) {
                "live"
            } else {
                "expired"
            }
        );
    }
    Ok(())
}

fn setup_metrics() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    metrics::describe_counter!("auth_register_total", "Accounts registered");
    metrics::describe_counter!("auth_login_total", "Login attempts by outcome");
    metrics::describe_counter!(
        "auth_password_reset_requested_total",
        "Forgot-password requests with a valid email"
    );
    metrics::describe_counter!(
        "auth_password_reset_total",
        "Reset-password attempts by outcome"
    );
    metrics::describe_counter!(
        "auth_email_send_total",
        "Notification deliveries by kind and outcome"
    );

    Ok(handle)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "helyx_backend=debug,helyx=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_env() {
    // 1) Standard dotenv search (cwd + parents)
    let _ = dotenv();

    // 2) Also try the crate directory when started from elsewhere
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    let candidate = manifest_dir.join(".env");
    if candidate.exists() {
        let _ = dotenv::from_path(&candidate);
    }
}
