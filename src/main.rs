// src/main.rs

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use depsolve::config::{Options, DEFAULT_METADATA_EXPIRE};
use depsolve::dispatch::{self, ErrorResponse, Request};
use depsolve::repository::RepositoryClient;
use depsolve::Error;
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{debug, error};

#[derive(Parser)]
#[command(name = "depsolve")]
#[command(author, version, about = "Query rpm-md repositories and resolve package dependencies", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Read the request from FILE instead of stdin
    #[arg(short, long, value_name = "FILE")]
    request: Option<PathBuf>,

    /// Target base architecture (defaults to the host)
    #[arg(long)]
    arch: Option<String>,

    /// Seconds before cached metadata is considered stale
    #[arg(long, default_value_t = DEFAULT_METADATA_EXPIRE.as_secs())]
    metadata_expire: u64,

    /// Do not pull in weak (Recommends) dependencies
    #[arg(long)]
    no_weak_deps: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn read_request(path: Option<&PathBuf>) -> Result<Vec<u8>> {
    match path {
        Some(path) => {
            fs::read(path).with_context(|| format!("Failed to read request from {}", path.display()))
        }
        None => {
            let mut buf = Vec::new();
            io::stdin()
                .read_to_end(&mut buf)
                .context("Failed to read request from stdin")?;
            Ok(buf)
        }
    }
}

fn write_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, value).context("Failed to serialize response")?;
    writeln!(stdout)?;
    Ok(())
}

/// Run one request; a library error becomes the error envelope
fn run(cli: &Cli) -> Result<ExitCode> {
    let options = Options {
        arch: cli.arch.clone(),
        metadata_expire: Duration::from_secs(cli.metadata_expire),
        install_weak_deps: !cli.no_weak_deps,
    };

    let raw = read_request(cli.request.as_ref())?;
    let outcome = Request::from_slice(&raw).and_then(|request| {
        debug!("Request command: {}", request.command);
        let transport = RepositoryClient::new()?;
        dispatch::handle(&request, &options, &transport)
    });

    match outcome {
        Ok(response) => {
            write_json(&response)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            report(&err);
            write_json(&ErrorResponse::from(&err))?;
            Ok(ExitCode::from(err.exit_code()))
        }
    }
}

fn report(err: &Error) {
    error!("{}: {}", err.kind(), err.reason());
}

fn main() -> ExitCode {
    // Logs go to stderr; stdout carries exactly one JSON document
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if let Some(Commands::Completions { shell }) = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "depsolve", &mut io::stdout());
        return ExitCode::SUCCESS;
    }

    match run(&cli) {
        Ok(code) => code,
        Err(err) => {
            error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}
