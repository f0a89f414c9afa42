use std::fs;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use gatehouse::cli::hooks::{self, HookKind};
use gatehouse::cli::{self, AdminCommands, HookCommands, PrincipalCommands};
use gatehouse::config::{DEFAULT_TIMEOUT_SECS, HookConfig, ServerConfig};
use gatehouse::server::{AppState, create_router};
use gatehouse::store::{SqliteStore, Store};

#[derive(Parser)]
#[command(name = "gatehouse")]
#[command(about = "A Git server that authorizes every push", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Administrative commands
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },

    /// Start the server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(long, short, default_value = "8080")]
        port: u16,

        /// Data directory for database and repositories
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// URL the git hooks use to reach this server (e.g., "http://10.0.0.5:8080").
        /// Defaults to the bind address.
        #[arg(long)]
        public_base_url: Option<String>,

        /// Seconds a hook waits for an authorization answer
        #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
        hook_timeout_secs: u64,
    },

    /// Git hooks (invoked by git during a push)
    #[command(hide = true)]
    Hooks {
        #[command(subcommand)]
        command: HookCommands,
    },
}

fn init_logging() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("gatehouse=info".parse()?))
        .init();
    Ok(())
}

async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let token_file = config.admin_token_path();
    let secret_file = config.hook_secret_path();
    if !token_file.exists() || !secret_file.exists() {
        bail!(
            "Server not initialized. Run 'gatehouse admin init' first to create the database, admin token and hook secret."
        );
    }

    let store = SqliteStore::new(config.db_path())?;
    if !store.has_admin_token()? {
        bail!(
            "Server not initialized. Run 'gatehouse admin init' first to create the database, admin token and hook secret."
        );
    }

    let secret = fs::read_to_string(&secret_file)
        .with_context(|| format!("failed to read {}", secret_file.display()))?
        .trim()
        .to_string();
    if secret.is_empty() {
        bail!("Hook secret at {} is empty", secret_file.display());
    }

    let hook_config = HookConfig {
        server_url: config.server_url(),
        secret,
        timeout_secs: config.hook_timeout_secs,
    };
    let hook_binary = std::env::current_exe().context("failed to locate the gatehouse binary")?;

    info!("Admin token available at {}", token_file.display());
    info!("Hooks will call back to {}", hook_config.server_url);

    let state = Arc::new(AppState::new(
        Arc::new(store),
        config.data_dir.clone(),
        hook_config,
        hook_binary,
    ));

    let app = create_router(state);
    let addr = config.socket_addr()?;

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Hooks { command } => {
            hooks::init_logging();
            let kind = match command {
                HookCommands::PreReceive => HookKind::PreReceive,
                HookCommands::Update {
                    ref_name,
                    old_sha,
                    new_sha,
                } => HookKind::Update(vec![ref_name, old_sha, new_sha]),
                HookCommands::PostReceive => HookKind::PostReceive,
            };
            let code = hooks::run(kind).await;
            // A blocking stdin read may still be parked on the runtime.
            std::process::exit(i32::from(code));
        }
        Commands::Admin { command } => {
            init_logging()?;
            match command {
                AdminCommands::Init {
                    data_dir,
                    non_interactive,
                } => cli::run_init(data_dir, non_interactive)?,
                AdminCommands::Principal {
                    command:
                        PrincipalCommands::Add {
                            data_dir,
                            uid,
                            display_name,
                            non_interactive,
                        },
                } => cli::run_principal_add(&data_dir, uid, display_name, non_interactive)?,
                AdminCommands::Grant {
                    data_dir,
                    principal,
                    space,
                    allow,
                    deny,
                } => cli::run_grant(&data_dir, &principal, &space, &allow, &deny)?,
            }
        }
        Commands::Serve {
            host,
            port,
            data_dir,
            public_base_url,
            hook_timeout_secs,
        } => {
            init_logging()?;
            serve(ServerConfig {
                host,
                port,
                data_dir: data_dir.into(),
                public_base_url,
                hook_timeout_secs,
            })
            .await?;
        }
    }

    Ok(())
}
