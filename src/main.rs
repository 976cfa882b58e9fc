// Installs AU print server printers into CUPS and prints to them.

use actix_web::{middleware, web, App, HttpServer};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use auprint::command::{CommandRunner, SystemRunner};
use auprint::credentials::{default_secret_store, CredentialStore};
use auprint::flow::{InteractiveFlow, TerminalPrompter};
use auprint::{routes, AppError, AppState, Config};

#[derive(Parser)]
#[command(name = "auprint")]
#[command(version)]
#[command(about = "Manages installed printers at AU")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Pick a printer in a building and install it (default)
    Install,

    /// Update the password used by every installed printer
    UpdatePasswords,

    /// Show installed and available printers
    List,

    /// Remove an installed printer
    Remove {
        /// Share name (5341-101) or display name (turing-101)
        printer: String,
    },

    /// Print a file on an installed printer
    Print {
        /// Share name (5341-101) or display name (turing-101)
        printer: String,
        file: PathBuf,
    },

    /// Forget the cached AUID and password
    Logout,

    /// Run the HTTP login endpoint
    Serve,
}

// ============================================================================
// Shutdown Handling
// ============================================================================

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

async fn serve(config: Config) -> std::io::Result<()> {
    let bind_addr = config.bind_addr();
    let state = AppState::new(config);

    let server = HttpServer::new(move || {
        App::new()
            // Middleware
            .wrap(middleware::Logger::default())
            .wrap(middleware::NormalizePath::trim())
            // Application state
            .app_data(web::Data::new(state.clone()))
            .service(routes::login)
            .service(routes::list_printers)
    })
    .bind(bind_addr.clone())?
    .shutdown_timeout(5)
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(async move { server.await });

    info!("auprint server started on {}:{}", bind_addr.0, bind_addr.1);

    shutdown_signal().await;

    info!("Initiating graceful shutdown...");
    server_handle.stop(true).await;

    server_task
        .await
        .map_err(|e| std::io::Error::other(format!("Server task error: {}", e)))??;

    info!("Graceful shutdown complete");
    Ok(())
}

async fn run(cli: Cli, config: Config) -> Result<(), AppError> {
    let command = cli.command.unwrap_or(Commands::Install);

    let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner::new(config.commands.timeout));
    let store = CredentialStore::new(&config.storage, default_secret_store());

    if let Commands::Logout = command {
        store.clear()?;
        println!("Forgot cached credentials");
        return Ok(());
    }

    let mut flow = InteractiveFlow::new(&config, runner, &store, TerminalPrompter);
    let session = flow.login().await?;

    match command {
        Commands::Install => {
            flow.install_printer(&session).await?;
        }
        Commands::UpdatePasswords => {
            flow.update_passwords(&session).await?;
        }
        Commands::List => {
            flow.list_printers(&session).await;
        }
        Commands::Remove { printer } => {
            flow.remove_printer(&session, &printer).await?;
        }
        Commands::Print { printer, file } => {
            flow.print_file(&session, &printer, file).await?;
        }
        Commands::Logout | Commands::Serve => {}
    }

    Ok(())
}

#[actix_web::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {}", e);
            return std::process::ExitCode::FAILURE;
        }
    };

    if let Some(Commands::Serve) = cli.command {
        return match serve(config).await {
            Ok(()) => std::process::ExitCode::SUCCESS,
            Err(e) => {
                error!("Server error: {}", e);
                std::process::ExitCode::FAILURE
            }
        };
    }

    match run(cli, config).await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            std::process::ExitCode::FAILURE
        }
    }
}
