//! Grant store administration CLI
//!
//! Operates directly on the configured storage backend (`STORAGE_BACKEND`,
//! `DATABASE_URL`) to manage OAuth clients, revoke grants and purge expired
//! artifacts.
//!
//! ## Usage Examples
//!
//! ```bash
//! # Register a confidential client; a secret is generated and printed once
//! grant-store-admin client create --id c1 --redirect-uri https://app.example.com/cb --scope openid
//!
//! # Grant a client access to a tenant
//! grant-store-admin client tenant add c1 tenant-a
//!
//! # Revoke every token issued from a grant
//! grant-store-admin revoke refresh req-1234
//!
//! # Run the purge janitor every minute until Ctrl+C
//! grant-store-admin purge --interval 1m
//! ```

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use grant_store::config::Config;
use grant_store::oauth::{
    Client, ClientFilter, ClientRegistry, RevocationCoordinator, generate_client_id,
    generate_client_secret, token_signature,
};
use grant_store::storage::{
    OAuthStorage, create_storage_backend, parse_storage_backend, purge_expired,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::prelude::*;

/// Main CLI application structure
#[derive(Parser)]
#[command(
    name = "grant-store-admin",
    about = "OAuth grant store administration",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage OAuth clients
    #[command(subcommand)]
    Client(ClientCommands),
    /// Revoke artifacts by request ID
    #[command(subcommand)]
    Revoke(RevokeCommands),
    /// Remove expired artifacts
    Purge(PurgeArgs),
    /// Print the storage signature of a token
    Signature {
        token: String,
    },
}

#[derive(Subcommand)]
enum ClientCommands {
    /// Register a new client
    Create(CreateArgs),
    /// Show a client
    Get { client_id: String },
    /// List clients
    List(ListArgs),
    /// Delete a client
    Delete { client_id: String },
    /// Disable a client without deleting it
    Disable { client_id: String },
    /// Re-enable a disabled client
    Enable { client_id: String },
    /// Add or remove scopes
    #[command(subcommand)]
    Scope(AccessCommands),
    /// Add or remove tenant access
    #[command(subcommand)]
    Tenant(AccessCommands),
}

#[derive(Subcommand)]
enum AccessCommands {
    Add { client_id: String, values: Vec<String> },
    Remove { client_id: String, values: Vec<String> },
}

#[derive(Subcommand)]
enum RevokeCommands {
    /// Revoke refresh tokens and every sibling artifact of the grant
    Refresh { request_id: String },
    /// Revoke access tokens of the grant
    Access { request_id: String },
    /// Remove every artifact of the grant
    Request { request_id: String },
}

#[derive(Args)]
struct CreateArgs {
    /// Client ID; generated when omitted
    #[arg(long)]
    id: Option<String>,

    /// Human-readable name
    #[arg(long)]
    name: Option<String>,

    /// Client secret; generated for confidential clients when omitted
    #[arg(long, env = "GRANT_STORE_CLIENT_SECRET", hide_env_values = true)]
    secret: Option<String>,

    /// Redirect URI (repeatable)
    #[arg(long = "redirect-uri")]
    redirect_uris: Vec<String>,

    /// Grant type (repeatable)
    #[arg(long = "grant-type")]
    grant_types: Vec<String>,

    /// Response type (repeatable)
    #[arg(long = "response-type")]
    response_types: Vec<String>,

    /// Scope (repeatable)
    #[arg(long)]
    scope: Vec<String>,

    /// Tenant the client may access (repeatable)
    #[arg(long)]
    tenant: Vec<String>,

    #[arg(long)]
    owner: Option<String>,

    /// Register a public client without a secret
    #[arg(long)]
    public: bool,
}

#[derive(Args)]
struct ListArgs {
    #[arg(long)]
    owner: Option<String>,
    #[arg(long)]
    tenant: Option<String>,
    #[arg(long)]
    scope: Option<String>,
    #[arg(long)]
    limit: Option<usize>,
}

#[derive(Args)]
struct PurgeArgs {
    /// Keep purging on this interval (e.g. `5m`) until interrupted; defaults
    /// to `PURGE_INTERVAL` when given without a value
    #[arg(long, num_args = 0..=1, default_missing_value = "")]
    interval: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "grant_store=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    if let Commands::Signature { token } = &cli.command {
        println!("{}", token_signature(token));
        return Ok(());
    }

    let config = Config::new()?;
    tracing::debug!(version = %config.version, backend = %config.storage_backend, "starting");

    let backend =
        parse_storage_backend(&config.storage_backend, config.database_url.as_deref())?;
    let storage = create_storage_backend(backend).await?;

    match cli.command {
        Commands::Client(command) => {
            let registry = ClientRegistry::new(storage)
                .with_secret_min_length(*config.secret_min_length.as_ref());
            run_client_command(&registry, command, cli.pretty).await
        }
        Commands::Revoke(command) => {
            let coordinator = RevocationCoordinator::new(storage);
            let report = match command {
                RevokeCommands::Refresh { request_id } => {
                    coordinator.revoke_refresh_token(&request_id).await?
                }
                RevokeCommands::Access { request_id } => {
                    coordinator.revoke_access_token(&request_id).await?
                }
                RevokeCommands::Request { request_id } => {
                    coordinator.revoke_request(&request_id).await?
                }
            };
            let deleted: serde_json::Map<String, serde_json::Value> = report
                .deleted
                .iter()
                .map(|(kind, count)| (kind.to_string(), (*count).into()))
                .collect();
            print_json(
                &serde_json::json!({ "request_id": report.request_id, "deleted": deleted }),
                cli.pretty,
            )
        }
        Commands::Purge(args) => {
            let interval = match args.interval {
                None => None,
                Some(value) if value.is_empty() => Some(*config.purge_interval.as_ref()),
                Some(value) => Some(
                    *grant_store::config::PurgeInterval::try_from(value)?.as_ref(),
                ),
            };
            match interval {
                None => purge_once(storage.as_ref()).await,
                Some(interval) => run_janitor(storage, interval).await,
            }
        }
        Commands::Signature { .. } => Ok(()),
    }
}

async fn run_client_command(
    registry: &ClientRegistry,
    command: ClientCommands,
    pretty: bool,
) -> Result<()> {
    let client = match command {
        ClientCommands::Create(args) => {
            let mut client = Client::new(args.id.unwrap_or_else(generate_client_id));
            client.name = args.name.unwrap_or_default();
            client.redirect_uris = args.redirect_uris;
            client.grant_types = args.grant_types;
            client.response_types = args.response_types;
            client.enable_scope_access(args.scope);
            client.enable_tenant_access(args.tenant);
            client.owner = args.owner.unwrap_or_default();
            client.public = args.public;

            let secret = match (args.public, args.secret) {
                (true, secret) => secret,
                (false, Some(secret)) => Some(secret),
                (false, None) => Some(generate_client_secret()),
            };
            client.secret = secret.clone().unwrap_or_default();

            let mut created = registry.create_client(client).await?;
            // Only the cleartext leaves the process, and only once.
            created.secret = secret.unwrap_or_default();
            return print_json(&created, pretty);
        }
        ClientCommands::Get { client_id } => registry.get_client(&client_id).await?,
        ClientCommands::List(args) => {
            let filter = ClientFilter {
                owner: args.owner,
                tenant: args.tenant,
                scope: args.scope,
                limit: args.limit,
                ..Default::default()
            };
            let clients: Vec<Client> = registry
                .list_clients(&filter)
                .await?
                .into_iter()
                .map(redact)
                .collect();
            return print_json(&clients, pretty);
        }
        ClientCommands::Delete { client_id } => {
            registry.delete_client(&client_id).await?;
            return print_json(&serde_json::json!({ "deleted": client_id }), pretty);
        }
        ClientCommands::Disable { client_id } => registry.disable_client(&client_id).await?,
        ClientCommands::Enable { client_id } => registry.enable_client(&client_id).await?,
        ClientCommands::Scope(AccessCommands::Add { client_id, values }) => {
            registry.enable_scope_access(&client_id, &values).await?
        }
        ClientCommands::Scope(AccessCommands::Remove { client_id, values }) => {
            registry.disable_scope_access(&client_id, &values).await?
        }
        ClientCommands::Tenant(AccessCommands::Add { client_id, values }) => {
            registry.enable_tenant_access(&client_id, &values).await?
        }
        ClientCommands::Tenant(AccessCommands::Remove { client_id, values }) => {
            registry.disable_tenant_access(&client_id, &values).await?
        }
    };
    print_json(&redact(client), pretty)
}

/// Stored hashes are never printed.
fn redact(mut client: Client) -> Client {
    client.secret.clear();
    client
}

fn print_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<()> {
    let output = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", output);
    Ok(())
}

async fn purge_once(storage: &dyn OAuthStorage) -> Result<()> {
    let purged = purge_expired(storage).await?;
    let total: usize = purged.values().sum();
    tracing::info!(total, ?purged, "expired artifacts purged");
    Ok(())
}

async fn run_janitor(storage: Arc<dyn OAuthStorage>, interval: Duration) -> Result<()> {
    let token = CancellationToken::new();

    {
        let inner_token = token.clone();

        let ctrl_c = async {
            if let Err(err) = signal::ctrl_c().await {
                tracing::error!("failed to install Ctrl+C handler: {}", err);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                }
                Err(err) => {
                    tracing::error!("failed to install signal handler: {}", err);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::spawn(async move {
            tokio::select! {
                () = inner_token.cancelled() => { },
                _ = terminate => {},
                _ = ctrl_c => {},
            }

            inner_token.cancel();
        });
    }

    tracing::info!(?interval, "purge janitor started");
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            () = token.cancelled() => break,
            _ = ticker.tick() => {
                if let Err(err) = purge_once(storage.as_ref()).await {
                    tracing::error!("purge sweep failed: {}", err);
                }
            }
        }
    }
    tracing::info!("purge janitor stopped");
    Ok(())
}
