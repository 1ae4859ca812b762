//! cli
//!
//! Command-line interface layer for ghcommit.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Resolve configuration (defaults, file, environment, flags)
//! - Delegate to command handlers
//!
//! # Architecture
//!
//! The CLI layer is thin. It turns flags and local files into a
//! [`crate::core::types::CommitRequest`] and hands it to the
//! [`crate::engine::CommitEngine`]; all branch mutations flow through the
//! engine.

pub mod args;
pub mod commands;
pub mod logging;

pub use args::{Cli, Command, Shell};

use anyhow::{anyhow, bail, Context, Result};
use std::io::{self, Write};

use crate::core::config::Config;
use crate::store::github::parse_github_url;

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<()> {
    let cli = Cli::parse_args();
    logging::init(cli.debug).map_err(|e| anyhow!("failed to initialize logging: {}", e))?;

    // Completion needs no repository.
    if let Command::Completion { shell } = cli.command {
        return commands::completion(shell);
    }

    let config = load_config(&cli)?;
    commands::dispatch(cli.command, &config)
}

/// Load the config file and environment, then apply command-line overrides.
pub fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    apply_overrides(&mut config, cli)?;

    if cli.ask_secret {
        let username = config
            .auth
            .username
            .clone()
            .context("--ask-secret needs a username (auth.username or GH_USER)")?;
        eprint!("Secret for {}: ", username);
        io::stderr().flush()?;
        let secret = rpassword::read_password().context("failed to read secret")?;
        if secret.is_empty() {
            bail!("secret cannot be empty");
        }
        config.auth.password = Some(secret);
        config.auth.token = None;
    }

    config.validate()?;
    tracing::debug!(
        owner = %config.owner,
        repo = %config.repo,
        api_base = %config.api_base,
        "configuration loaded"
    );
    Ok(config)
}

/// Apply flag values over whatever the file and environment provided.
pub fn apply_overrides(config: &mut Config, cli: &Cli) -> Result<()> {
    if let Some(remote) = &cli.remote {
        let (owner, repo) =
            parse_github_url(remote).ok_or_else(|| anyhow!("not a GitHub remote URL: {}", remote))?;
        config.owner = owner;
        config.repo = repo;
    }
    if let Some(owner) = &cli.owner {
        config.owner = owner.clone();
    }
    if let Some(repo) = &cli.repo {
        config.repo = repo.clone();
    }
    if let Some(api_base) = &cli.api_base {
        config.api_base = api_base.clone();
    }
    Ok(())
}
