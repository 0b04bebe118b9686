//! CLI module for rabify
//!
//! Argument parsing for the dynamic inventory binary.

pub mod commands;

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Enrich an inventory with admin addresses and config context from NetBox
///
/// Loads an inventory, runs the plugin configured in the plugin file over it
/// and prints the result in Ansible dynamic inventory form.
#[derive(Parser, Debug, Clone)]
#[command(name = "rabify")]
#[command(version)]
#[command(about = "NetBox admin-address inventory plugin", long_about = None)]
pub struct Cli {
    /// Path to the inventory file (YAML tree or `--list` JSON)
    #[arg(short = 'i', long, env = "RABIFY_INVENTORY")]
    pub inventory: PathBuf,

    /// Path to the plugin file (`plugin: rabify`)
    #[arg(short = 'c', long, env = "RABIFY_CONFIG")]
    pub config: PathBuf,

    /// Print the whole inventory (default)
    #[arg(long, conflicts_with = "host")]
    pub list: bool,

    /// Print the variables of a single host
    #[arg(long, value_name = "NAME")]
    pub host: Option<String>,

    /// Output format
    #[arg(long, default_value = "json")]
    pub output: OutputFormat,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, env = "RABIFY_LOG_JSON")]
    pub log_json: bool,
}

/// Output format for CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON
    #[default]
    Json,
    /// YAML
    Yaml,
}

/// What to print after the plugin ran
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    List,
    Host(String),
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Get the effective verbosity level (0-3)
    pub fn verbosity(&self) -> u8 {
        self.verbose.min(3)
    }

    pub fn mode(&self) -> Mode {
        match &self.host {
            Some(host) => Mode::Host(host.clone()),
            None => Mode::List,
        }
    }
}
