// Bizdesk CLI
//
// Design Decision: Use clap derive for ergonomic argument parsing.
// Design Decision: Support text/json/yaml output formats for scripting.
// Design Decision: One session store per process, settled from the credentials file before any command runs.
// Design Decision: Logs go to stderr so json/yaml output stays parseable.

mod client;
mod commands;
mod credentials;
mod output;
mod session;

use anyhow::{Context, Result};
use bizdesk_core::telemetry::{init_telemetry, TelemetryConfig};
use bizdesk_core::RouteTable;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "bizdesk")]
#[command(about = "Bizdesk CLI - Sign in and open business pages")]
#[command(version)]
pub struct Cli {
    /// API base URL
    #[arg(long, env = "BIZDESK_API_URL", default_value = "http://localhost:9000")]
    pub api_url: String,

    /// Output format
    #[arg(long, short, default_value = "text", value_parser = ["text", "json", "yaml"])]
    pub output: String,

    /// Suppress non-essential output
    #[arg(long, short)]
    pub quiet: bool,

    /// Credentials file (default: ~/.bizdesk/credentials.json)
    #[arg(long, env = "BIZDESK_CREDENTIALS")]
    pub credentials: Option<PathBuf>,

    /// Route table YAML (default: built-in business routes)
    #[arg(long, env = "BIZDESK_ROUTES")]
    pub routes: Option<PathBuf>,

    /// Seconds to wait for the saved session to be validated
    #[arg(long, default_value = "10")]
    pub timeout: u64,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in and save the session
    Login {
        /// Username
        username: String,

        /// Password (read from stdin if omitted)
        #[arg(long, env = "BIZDESK_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// Page to continue to after signing in
        #[arg(long)]
        redirect: Option<String>,
    },

    /// Sign out and forget the saved session
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Open a page, following the access gates
    Open {
        /// Page path, e.g. /customers
        path: String,
    },

    /// List pages and whether the current session may open them
    Routes,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let _telemetry_guard = init_telemetry(
        TelemetryConfig::for_service("bizdesk-cli", env!("CARGO_PKG_VERSION"))
            .with_default_filter("warn"),
    );

    let output_format = output::OutputFormat::from_str(&cli.output);

    let routes = match &cli.routes {
        Some(path) => RouteTable::from_yaml_file(path)
            .with_context(|| format!("Failed to load routes from {}", path.display()))?,
        None => RouteTable::business_default(),
    };
    let credentials = match cli.credentials {
        Some(path) => credentials::CredentialsFile::at(path),
        None => credentials::CredentialsFile::from_env()?,
    };

    let shell = session::Shell::start(
        client::Client::new(&cli.api_url),
        credentials,
        routes,
        Duration::from_secs(cli.timeout),
    )
    .await?;

    match cli.command {
        Commands::Login {
            username,
            password,
            redirect,
        } => {
            let password = commands::auth::read_password(password)?;
            commands::auth::login(
                &shell,
                output_format,
                cli.quiet,
                &username,
                &password,
                redirect.as_deref(),
            )
            .await
        }
        Commands::Logout => commands::auth::logout(&shell, output_format, cli.quiet).await,
        Commands::Whoami => commands::auth::whoami(&shell, output_format).await,
        Commands::Open { path } => commands::pages::open(&shell, output_format, &path).await,
        Commands::Routes => commands::pages::routes(&shell, output_format).await,
    }
}
