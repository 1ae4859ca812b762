//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands and override the config file
//! and environment:
//! - `--config <path>`: Read this config file
//! - `--owner`, `--repo`, `--remote <url>`: Target repository
//! - `--api-base <url>`: API base URL (GitHub Enterprise)
//! - `--ask-secret`: Prompt for the basic-auth secret
//! - `--debug`: Enable debug logging

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// ghcommit - commit many files to a GitHub branch as one atomic commit
#[derive(Parser, Debug)]
#[command(name = "ghcommit")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file to read instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Repository owner (user or organization)
    #[arg(long, global = true)]
    pub owner: Option<String>,

    /// Repository name
    #[arg(long, global = true)]
    pub repo: Option<String>,

    /// GitHub remote URL to take owner and repo from
    #[arg(long, global = true, value_name = "URL", conflicts_with_all = ["owner", "repo"])]
    pub remote: Option<String>,

    /// API base URL
    #[arg(long, global = true, value_name = "URL")]
    pub api_base: Option<String>,

    /// Prompt for the basic-auth secret instead of reading it from the environment
    #[arg(long, global = true)]
    pub ask_secret: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Commit local files to a branch as one commit
    #[command(
        name = "commit",
        long_about = "Commit local files to a branch as one commit.\n\n\
            Every --add and --add-exec names a repository path and the local file \
            whose contents it should hold. All files land in a single new commit \
            whose parent is the branch head read at the start; paths not named are \
            left unchanged.\n\n\
            If the branch moves while the commit is being built, nothing is written \
            to the branch and the command fails with a conflict. Re-run it to commit \
            against the new head.",
        after_help = "\
EXAMPLES:
    # Publish two files to the default branch
    ghcommit commit -m \"Add post\" --add posts/1.md=out/1.md --add index.md=out/index.md

    # Commit an executable script to gh-pages
    ghcommit commit -b gh-pages -m \"Deploy\" --add-exec bin/build=./build.sh"
    )]
    Commit {
        /// Commit message
        #[arg(short, long)]
        message: String,

        /// Branch to commit to (defaults to the configured branch)
        #[arg(short, long)]
        branch: Option<String>,

        /// Add or replace a file: REPO_PATH=LOCAL_FILE
        #[arg(long = "add", value_name = "PATH=FILE", value_parser = parse_mapping)]
        add: Vec<FileMapping>,

        /// Add or replace an executable file: REPO_PATH=LOCAL_FILE
        #[arg(long = "add-exec", value_name = "PATH=FILE", value_parser = parse_mapping)]
        add_exec: Vec<FileMapping>,

        /// Overwrite the branch even if it moved (may discard commits)
        #[arg(long)]
        force: bool,

        /// Give up if the commit has not finished after this many seconds
        #[arg(long, value_name = "SECS")]
        deadline_secs: Option<u64>,
    },

    /// Print a file from the head of a branch
    #[command(name = "get")]
    Get {
        /// Repository path of the file
        path: String,

        /// Branch to read (defaults to the configured branch)
        #[arg(short, long)]
        branch: Option<String>,

        /// Write the content to this file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Generate shell completion scripts
    #[command(
        name = "completion",
        after_help = "\
EXAMPLES:
    # Bash (add to ~/.bashrc)
    ghcommit completion bash >> ~/.bashrc

    # Fish
    ghcommit completion fish > ~/.config/fish/completions/ghcommit.fish"
    )]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// A repository path paired with the local file supplying its content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMapping {
    pub repo_path: String,
    pub local: PathBuf,
}

fn parse_mapping(s: &str) -> Result<FileMapping, String> {
    match s.split_once('=') {
        Some((repo_path, local)) if !repo_path.is_empty() && !local.is_empty() => {
            Ok(FileMapping {
                repo_path: repo_path.to_string(),
                local: PathBuf::from(local),
            })
        }
        _ => Err(format!("expected REPO_PATH=LOCAL_FILE, got '{}'", s)),
    }
}

/// Supported shells for completion
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}
