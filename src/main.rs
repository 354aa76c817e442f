//! Follows the logs of every pod matching a name.
//!
//! Usage:
//!     podmux <pod-name>
//!
//! Lines from all pods are printed to stdout as they arrive, application
//! messages go to stderr.

use std::io::IsTerminal;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use podmux::{Config, Fleet, Kubectl};

const USAGE: &str = "usage: podmux <pod-name>\nexample: podmux api";

/// Tail the logs of every pod whose name starts with a prefix
#[derive(Parser, Debug)]
#[command(name = "podmux", version, about)]
struct Cli {
    /// Pod name prefix; follows every pod named `<NAME>-...`
    name: String,
}

fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .init();
}

async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "unable to listen for interrupts");
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if e.kind() == ErrorKind::MissingRequiredArgument => {
            println!("{}", USAGE);
            return ExitCode::from(1);
        }
        Err(e) => e.exit(),
    };

    setup_logging();

    let config = match Config::from_env(cli.name) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::from(1);
        }
    };

    let fleet = Fleet::new(Kubectl::new(config.kubectl.clone()), config.fragment.clone())
        .sink_capacity(config.sink_capacity)
        .line_format(config.format);

    tokio::select! {
        res = fleet.run(tokio::io::stdout()) => match res {
            Ok(report) => {
                tracing::info!(
                    pods = report.pods.len(),
                    ended_ok = report.ended_ok,
                    ended_err = report.ended_err,
                    lines = report.lines_written,
                    "all log streams ended"
                );
                ExitCode::SUCCESS
            }
            Err(e) => {
                tracing::error!("{}", e);
                ExitCode::from(1)
            }
        },
        _ = interrupted() => {
            tracing::info!("interrupted");
            ExitCode::SUCCESS
        }
    }
}
