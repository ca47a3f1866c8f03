//! Dorma - hostel management service
//!
//! Opens (or creates) the SQLite database, seeds the first Admin account
//! when the users table is empty, and serves the TCP protocol until
//! ctrl-c.

use std::path::PathBuf;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dorma_core::{Database, Role, User, UserRepository};
use dorma_net::{auth, Server};

mod config;

use config::Config;

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    tracing::info!("Starting Dorma");

    let config_path = parse_config_arg();
    let config = match Config::load(config_path.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    let db_path = match config.resolve_database_path() {
        Ok(p) => p,
        Err(e) => {
            tracing::error!("Failed to resolve database path: {}", e);
            std::process::exit(1);
        }
    };

    let db = match Database::open(&db_path) {
        Ok(db) => db,
        Err(e) => {
            tracing::error!("Failed to open database {}: {}", db_path.display(), e);
            std::process::exit(1);
        }
    };
    tracing::info!(path = %db_path.display(), version = db.schema_version(), "Database ready");

    if let Err(e) = seed_admin(&db, &config) {
        tracing::error!("Failed to seed admin account: {}", e);
        std::process::exit(1);
    }

    let server = match Server::start(config.port, db, config.session_hours).await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to start server: {}", e);
            std::process::exit(1);
        }
    };
    tracing::info!(addr = %server.addr(), "Serving");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutting down");
    server.shutdown().await;
}

/// Create the first Admin account on an empty database
fn seed_admin(db: &Database, config: &Config) -> dorma_core::Result<()> {
    if db.count_users()? > 0 {
        return Ok(());
    }
    let user = User::new(
        Role::Admin,
        config.seed_admin_email.clone(),
        auth::hash_password(&config.seed_admin_password)?,
    );
    db.create_user(&user)?;
    tracing::info!(email = %config.seed_admin_email, "Seeded initial admin account");
    Ok(())
}

/// `--config <path>` is the only flag
fn parse_config_arg() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}
