//! rabify - NetBox admin-address inventory plugin
//!
//! Entry point for the dynamic inventory binary. Inventory output goes to
//! stdout, logs go to stderr.

mod cli;

use anyhow::Result;
use cli::Cli;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    init_logging(cli.verbosity(), cli.log_json);

    let output = cli::commands::execute(&cli).await?;
    println!("{}", output);

    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbosity: u8, json: bool) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(verbosity >= 3)
                    .with_writer(std::io::stderr),
            )
            .with(env_filter)
            .init();
    }
}
