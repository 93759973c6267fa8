//! Latch CLI - a headless host for the session manager.
//!
//! Session state lives in `session.json` next to the config file, so it
//! survives between invocations the way browser storage survives reloads.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use latch_session::{
    AuthClient, FileStore, LogoutSignal, RecordingNavigator, ReqwestCookieWriter, SessionConfig,
    SessionManager,
};
use reqwest::cookie::Jar;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Latch - client session manager
#[derive(Parser, Debug)]
#[command(name = "latch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Config file (default: <config dir>/latch/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Session storage file (default: <config dir>/latch/session.json)
    #[arg(long, global = true)]
    storage: Option<PathBuf>,

    /// Override the backend URL from the config file
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve and persist the client identity
    Init,

    /// Log in to an existing account
    Login {
        /// Account email
        #[arg(short, long)]
        email: String,
        /// Account password (prompted when omitted)
        #[arg(short, long, env = "LATCH_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Create an account and log in
    Register {
        /// Account email
        #[arg(short, long)]
        email: String,
        /// Account password (prompted when omitted)
        #[arg(short, long, env = "LATCH_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// End the session
    Logout {
        /// Reason recorded with the logout signal
        #[arg(short, long)]
        reason: Option<String>,
    },

    /// Show the current session state
    Status,

    /// Manage the config file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Print the effective configuration
    Show,

    /// Write the effective configuration to disk
    Save,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let config = load_config(&cli);

    match cli.command {
        Commands::Config { ref command } => handle_config(command, &cli, &config),
        Commands::Init => handle_init(&connect(&cli, config)?).await,
        Commands::Login {
            ref email,
            ref password,
        } => handle_auth(&connect(&cli, config)?, email, password.clone(), false).await,
        Commands::Register {
            ref email,
            ref password,
        } => handle_auth(&connect(&cli, config)?, email, password.clone(), true).await,
        Commands::Logout { ref reason } => {
            handle_logout(&connect(&cli, config)?, reason.as_deref()).await
        }
        Commands::Status => {
            handle_status(&connect(&cli, config)?);
            Ok(())
        }
    }
}

/// A session manager wired to disk storage and a reqwest cookie jar.
struct Host {
    session: SessionManager,
    navigator: Arc<RecordingNavigator>,
}

fn load_config(cli: &Cli) -> SessionConfig {
    let mut config = match &cli.config {
        Some(path) => SessionConfig::load_from(path),
        None => SessionConfig::load(),
    };
    if let Some(url) = &cli.api_url {
        config.api_url.clone_from(url);
    }
    config
}

fn connect(cli: &Cli, config: SessionConfig) -> anyhow::Result<Host> {
    let storage = match &cli.storage {
        Some(path) => FileStore::open(path.clone()),
        None => FileStore::open_default(),
    }
    .context("failed to open session storage")?;
    tracing::debug!(path = ?storage.path(), "Using session storage");

    let api_url: reqwest::Url = config
        .api_url
        .parse()
        .with_context(|| format!("invalid api url: {}", config.api_url))?;

    let jar = Arc::new(Jar::default());
    let client = AuthClient::with_cookie_jar(&config, jar.clone())?;
    let navigator = Arc::new(RecordingNavigator::new());

    let session = SessionManager::builder(config)
        .client(client)
        .storage(Arc::new(storage))
        .cookie_writer(Arc::new(ReqwestCookieWriter::new(jar, api_url)))
        .navigator(navigator.clone())
        .build()?;

    Ok(Host { session, navigator })
}

/// Handle the "init" command - resolve the client identity.
async fn handle_init(host: &Host) -> anyhow::Result<()> {
    let identity = host.session.init().await;
    let kind = if identity.is_fallback() {
        "generated"
    } else {
        "network address"
    };
    println!("Client identity: {identity} ({kind})");
    Ok(())
}

/// Handle the "login" and "register" commands.
async fn handle_auth(
    host: &Host,
    email: &str,
    password: Option<String>,
    register: bool,
) -> anyhow::Result<()> {
    let password = match password {
        Some(p) => p,
        None => prompt_password()?,
    };
    if password.is_empty() {
        anyhow::bail!("password cannot be empty");
    }

    let identity = host.session.init().await;

    let result = if register {
        host.session.register(email, &password, &identity).await
    } else {
        host.session.login(email, &password, &identity).await
    };
    result.with_context(|| {
        if register {
            "registration failed"
        } else {
            "login failed"
        }
    })?;

    println!("Logged in as {email}");
    Ok(())
}

/// Handle the "logout" command - emit the logout signal and wait for the
/// session manager to finish.
async fn handle_logout(host: &Host, reason: Option<&str>) -> anyhow::Result<()> {
    host.session.init().await;

    if !host.session.is_logged_in() {
        println!("Not logged in.");
        return Ok(());
    }

    let signal = match reason {
        Some(reason) => LogoutSignal::with_message(reason),
        None => LogoutSignal::default(),
    };
    host.session.signal_bus().emit(&signal);

    host.navigator.wait_for(1).await;
    println!("Logged out.");
    Ok(())
}

/// Handle the "status" command.
fn handle_status(host: &Host) {
    let session = &host.session;

    match session.client_identity() {
        Some(identity) => println!("Client identity: {identity}"),
        None => println!("Client identity: (not resolved)"),
    }
    println!("State:           {:?}", session.auth_state());
    println!(
        "Session token:   {}",
        session.session_token().as_deref().map_or("(none)", mask)
    );
    println!(
        "JWT:             {}",
        session.jwt().as_deref().map_or("(none)", mask)
    );
}

/// Handle the "config" command.
fn handle_config(
    command: &ConfigCommands,
    cli: &Cli,
    config: &SessionConfig,
) -> anyhow::Result<()> {
    match command {
        ConfigCommands::Show => {
            println!("{}", serde_json::to_string_pretty(config)?);
        }
        ConfigCommands::Save => {
            let path = match &cli.config {
                Some(path) => {
                    config.save_to(path)?;
                    path.clone()
                }
                None => config.save()?,
            };
            println!("Saved configuration to {}", path.display());
        }
    }
    Ok(())
}

/// Keeps only a short prefix of a secret for display.
fn mask(secret: &str) -> &str {
    let end = secret
        .char_indices()
        .nth(6)
        .map_or(secret.len(), |(i, _)| i);
    &secret[..end]
}

/// Read a password from stdin.
fn prompt_password() -> anyhow::Result<String> {
    print!("Password: ");
    io::stdout().flush()?;
    let mut password = String::new();
    io::stdin().read_line(&mut password)?;
    Ok(password.trim_end_matches(['\r', '\n']).to_string())
}
