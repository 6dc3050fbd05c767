use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{info, warn};

use permittree_blob::StateBlobStore;
use permittree_server::api::AppState;
use permittree_server::auth::AuthProvider;
use permittree_server::auth::config::AuthFileConfig;
use permittree_server::auth::password::hash_password;
use permittree_server::auth::users::validate_password;
use permittree_server::config::{PermitTreeConfig, resolve_path};
use permittree_workflow::{ReminderTask, WorkflowBuilder};

/// Environment variable holding the JWT signing secret.
const JWT_SECRET_ENV: &str = "PERMITTREE_JWT_SECRET";

/// PermitTree permit system HTTP server.
#[derive(Parser, Debug)]
#[command(name = "permittree-server", about = "HTTP API server for the PermitTree permit system")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "permittree.toml")]
    config: String,

    /// Override the bind host.
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port.
    #[arg(long)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Hash a password for use in auth.toml. Reads the password from stdin.
    HashPassword,
    /// Run database migrations for configured state and audit backends, then exit.
    Migrate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Some(Commands::HashPassword) = cli.command {
        return run_hash_password();
    }

    // Load configuration from TOML file, or use defaults if the file does not exist.
    let config_exists = Path::new(&cli.config).exists();
    let config: PermitTreeConfig = if config_exists {
        let contents = std::fs::read_to_string(&cli.config)?;
        toml::from_str(&contents)?
    } else {
        toml::from_str("")?
    };
    let config_dir = Path::new(&cli.config)
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();

    permittree_server::telemetry::init();

    if !config_exists {
        info!(path = %cli.config, "config file not found, using defaults");
    }

    if let Some(Commands::Migrate) = cli.command {
        return run_migrate(&config).await;
    }

    let workflow_config = config.workflow_config(&config_dir)?;
    let office = workflow_config.office.clone();

    // Build the state store.
    let store = permittree_server::state_factory::create_state(&config.state).await?;
    info!(backend = %config.state.backend, "state store ready");

    // Build the audit store if enabled.
    let audit_store = if config.audit.enabled {
        let store = permittree_server::audit_factory::create_audit_store(&config.audit).await?;
        info!(backend = %config.audit.backend, "audit store initialized");
        Some(store)
    } else {
        None
    };

    // Build the auth provider if enabled.
    let auth_provider = if config.auth.enabled {
        let auth_path = resolve_path(
            &config_dir,
            config.auth.config_path.as_deref().unwrap_or("auth.toml"),
        );
        let mut auth_config: AuthFileConfig = if auth_path.exists() {
            let auth_contents = std::fs::read_to_string(&auth_path).map_err(|e| {
                format!("failed to read auth config at {}: {e}", auth_path.display())
            })?;
            toml::from_str(&auth_contents)
                .map_err(|e| format!("failed to parse auth config: {e}"))?
        } else {
            warn!(path = %auth_path.display(), "auth config not found, no accounts will be seeded");
            AuthFileConfig::default()
        };
        if let Some(expiry) = config.auth.jwt_expiry_seconds {
            auth_config.settings.jwt_expiry_seconds = expiry;
        }
        if let Some(allow) = config.auth.allow_registration {
            auth_config.settings.allow_registration = allow;
        }

        let env_secret = std::env::var(JWT_SECRET_ENV).ok();
        let provider =
            AuthProvider::from_config(&auth_config, env_secret.as_deref(), Arc::clone(&store))?;
        provider.seed(&auth_config).await?;
        info!(
            registration = auth_config.settings.allow_registration,
            "auth provider initialized"
        );
        Some(Arc::new(provider))
    } else {
        warn!("authentication is disabled, every request acts as an administrator");
        None
    };

    // Build the workflow.
    let mut builder = WorkflowBuilder::new()
        .state(Arc::clone(&store))
        .blobs(Arc::new(StateBlobStore::new(Arc::clone(&store), office.clone())))
        .config(workflow_config);
    if let Some(ref audit) = audit_store {
        builder = builder.audit(Arc::clone(audit));
    }
    let workflow = Arc::new(builder.build()?);
    info!(office = %office, "workflow ready");

    // Spawn the payment reminder task.
    let reminders = if config.background.enabled {
        let every = Duration::from_secs(config.background.reminder_interval_seconds.max(1));
        let (task, shutdown_tx) = ReminderTask::new(Arc::clone(&workflow), every);
        Some((tokio::spawn(task.run()), shutdown_tx))
    } else {
        info!("background processing disabled");
        None
    };

    let state = AppState {
        workflow,
        audit: audit_store,
        auth: auth_provider,
    };
    let app = permittree_server::api::router(state);

    // Resolve the bind address (CLI overrides take precedence).
    let host = cli.host.unwrap_or(config.server.host);
    let port = cli.port.unwrap_or(config.server.port);
    let addr = format!("{host}:{port}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "permittree-server listening");

    // Serve with graceful shutdown on SIGINT / SIGTERM.
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop the reminder task (with configurable timeout).
    if let Some((handle, shutdown_tx)) = reminders {
        let shutdown_timeout = Duration::from_secs(config.server.shutdown_timeout_seconds);
        // The task may already have exited; a closed channel is fine.
        let _ = shutdown_tx.send(()).await;
        if tokio::time::timeout(shutdown_timeout, handle).await.is_err() {
            warn!(
                timeout_secs = config.server.shutdown_timeout_seconds,
                "shutdown timeout exceeded waiting for the reminder task"
            );
        }
    }

    info!("permittree-server shut down");
    Ok(())
}

/// Run the `migrate` subcommand: initialize database schemas for configured backends and exit.
async fn run_migrate(config: &PermitTreeConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!(backend = %config.state.backend, "running state backend migrations...");
    let _store = permittree_server::state_factory::create_state(&config.state).await?;
    info!(backend = %config.state.backend, "state backend migrations complete");

    if config.audit.enabled {
        info!(backend = %config.audit.backend, "running audit backend migrations...");
        let _audit = permittree_server::audit_factory::create_audit_store(&config.audit).await?;
        info!(backend = %config.audit.backend, "audit backend migrations complete");
    } else {
        info!("audit disabled, skipping audit migrations");
    }

    info!("all migrations complete");
    Ok(())
}

/// Run the `hash-password` subcommand: read a password from stdin, print its
/// argon2 hash to stdout.
fn run_hash_password() -> Result<(), Box<dyn std::error::Error>> {
    let mut password = String::new();
    std::io::Read::read_to_string(&mut std::io::stdin(), &mut password)?;
    let password = password.trim_end_matches(['\r', '\n']);
    validate_password(password)?;

    let hash = hash_password(password).map_err(|e| format!("hashing failed: {e}"))?;
    println!("{hash}");
    Ok(())
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM, then return to trigger graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("received SIGINT"); }
        () = terminate => { info!("received SIGTERM"); }
    }
}
