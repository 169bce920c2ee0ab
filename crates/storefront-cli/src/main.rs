//! Storefront CLI - sign in and call the storefront API from a terminal.

mod commands;
mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;
use storefront_auth::Method;
use storefront_config::{init_logging, Config, Paths};
use tracing::debug;

/// Storefront CLI - exercise the session lifecycle and API gateway.
#[derive(Parser)]
#[command(name = "storefront")]
#[command(about = "Storefront CLI for signing in and calling the backend API")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: output::OutputFormat,

    /// Log level (trace, debug, info, warn, error). Overrides the config file.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Config file (defaults to ~/.storefront/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a token and print its claims (no signature check)
    Decode {
        /// Compact token
        token: String,
    },

    /// Sign in with username and password
    Login {
        #[arg(short, long)]
        username: String,
        /// Password; prompted for when absent
        #[arg(short, long, env = "STOREFRONT_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Perform one API call through the gateway
    Call {
        /// Action path relative to the API base URL, e.g. products/42
        action: String,
        #[arg(short = 'X', long, default_value = "GET", value_parser = parse_method)]
        method: Method,
        /// JSON request body
        #[arg(short, long)]
        body: Option<String>,
        /// Send a file as a raw binary body
        #[arg(long, conflicts_with = "body")]
        binary: Option<PathBuf>,
        /// Sign in first as this user
        #[arg(short, long)]
        username: Option<String>,
        #[arg(short, long, env = "STOREFRONT_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Print the effective configuration
    Config,
}

fn parse_method(raw: &str) -> Result<Method, String> {
    Method::from_str(&raw.to_ascii_uppercase()).map_err(|e| e.to_string())
}

fn load_config(path: Option<&PathBuf>, log_level: Option<&String>) -> anyhow::Result<Config> {
    let mut config = match path {
        Some(path) => {
            let mut config = Config::load_from_file(path)?;
            config.load_from_env();
            config.validate()?;
            config
        }
        None => Config::load(&Paths::new()?)?,
    };
    if let Some(level) = log_level {
        config.log_level = level.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_ref(), cli.log_level.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            output::print_error(&format!("{:#}", e), &cli.format);
            std::process::exit(1);
        }
    };

    if let Err(e) = init_logging("storefront-cli", &config) {
        eprintln!("Warning: logging disabled: {}", e);
    }
    debug!(api = %config.api_base_url, "Configuration loaded");

    let result = match cli.command {
        Commands::Decode { token } => commands::decode_token(&token, &cli.format),
        Commands::Login { username, password } => {
            commands::login(&config, &username, password, &cli.format).await
        }
        Commands::Call {
            action,
            method,
            body,
            binary,
            username,
            password,
        } => {
            let args = commands::CallArgs {
                action,
                method,
                body,
                binary,
                username,
                password,
            };
            commands::call(&config, args, &cli.format).await
        }
        Commands::Config => commands::show_config(&config, &cli.format),
    };

    if let Err(e) = result {
        output::print_error(&format!("{:#}", e), &cli.format);
        std::process::exit(1);
    }
}
