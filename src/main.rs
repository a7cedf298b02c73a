//! finiq CLI entrypoint

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use finiq::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    // Local overrides first; dotenvy never replaces variables already set
    let env_files = [
        (".env.local", dotenvy::from_filename(".env.local")),
        (".env", dotenvy::dotenv()),
    ];

    // Logs go to stderr so stdout carries only the report
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    for (name, result) in &env_files {
        if let Some(problem) = env_file_problem(result) {
            warn!(file = *name, error = %problem, "Ignoring env file");
        }
    }

    let cli = Cli::parse();
    cli.execute().await
}

/// A missing env file is normal; anything else is worth a warning
fn env_file_problem(result: &Result<PathBuf, dotenvy::Error>) -> Option<&dotenvy::Error> {
    match result {
        Err(e) if !e.not_found() => Some(e),
        _ => None,
    }
}
