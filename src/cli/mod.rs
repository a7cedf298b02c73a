//! Command-line interface for finiq.
//!
//! Provides commands for generating funding-strategy reports, inspecting
//! fingerprints, managing the result cache and checking configuration.

use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;

use crate::adapters::{Adapter, LlmAdapter};
use crate::cache::CacheStore;
use crate::config::{self, ResolvedConfig};
use crate::core::Orchestrator;

/// finiq - Cached funding-strategy pipeline
#[derive(Parser, Debug)]
#[command(name = "finiq")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a funding-strategy report for a startup
    Generate {
        /// Request JSON file (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Skip the cache for both lookup and store
        #[arg(long)]
        no_cache: bool,

        /// Print the report as single-line JSON
        #[arg(long)]
        compact: bool,
    },

    /// Print the cache key of a request
    Fingerprint {
        /// Request JSON file (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Manage the result cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },

    /// Show resolved configuration (debug)
    Config,

    /// Check generation providers and cache backends
    Health,
}

#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Show backend availability and entry counts
    Stats,

    /// Remove cached reports
    Clear {
        /// Glob over fingerprints, e.g. "v1:*" (default: everything)
        #[arg(short, long)]
        pattern: Option<String>,
    },
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Generate {
                input,
                no_cache,
                compact,
            } => generate(input, no_cache, compact).await,
            Commands::Fingerprint { input } => show_fingerprint(input),
            Commands::Cache { command } => match command {
                CacheCommands::Stats => cache_stats().await,
                CacheCommands::Clear { pattern } => cache_clear(pattern).await,
            },
            Commands::Config => show_config(),
            Commands::Health => health().await,
        }
    }
}

/// Build the orchestrator described by configuration
fn build_orchestrator(cfg: &ResolvedConfig) -> Result<Orchestrator> {
    let pipeline = cfg.pipeline()?;
    let adapter = LlmAdapter::from_env(pipeline.params_by_action());
    let cache = CacheStore::from_settings(&cfg.cache);

    Ok(Orchestrator::new(Arc::new(adapter), Arc::new(cache), pipeline))
}

/// Read the raw request from a file or piped stdin
fn read_request(input_file: Option<PathBuf>) -> Result<Value> {
    let text = if let Some(path) = input_file {
        std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read input file: {}", path.display()))?
    } else if !io::stdin().is_terminal() {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read from stdin")?;
        buffer
    } else {
        anyhow::bail!("No input provided. Use --input <file> or pipe JSON to stdin");
    };

    parse_request(&text)
}

fn parse_request(text: &str) -> Result<Value> {
    if text.trim().is_empty() {
        anyhow::bail!("Input is empty");
    }

    let value: Value = serde_json::from_str(text).context("Input is not valid JSON")?;
    if !value.is_object() {
        anyhow::bail!("Input must be a JSON object");
    }
    Ok(value)
}

/// Generate a report and print it to stdout
async fn generate(input_file: Option<PathBuf>, no_cache: bool, compact: bool) -> Result<()> {
    let request = read_request(input_file)?;
    let orchestrator = build_orchestrator(config::config()?)?;

    let report = if no_cache {
        orchestrator.run_uncached(&request).await?
    } else {
        orchestrator.run(&request).await?
    };

    let output = if compact {
        serde_json::to_string(&report)?
    } else {
        serde_json::to_string_pretty(&report)?
    };
    println!("{}", output);

    let meta = &report.metadata;
    if meta.cached {
        eprintln!(
            "\n[Served from cache in {:.3}s, originally generated in {:.2}s]",
            meta.cache_retrieval_time_seconds.unwrap_or_default(),
            meta.execution_time_seconds
        );
    } else {
        eprintln!("\n[Generated in {:.2}s]", meta.execution_time_seconds);
    }

    Ok(())
}

/// Print the fingerprint a request would be cached under
fn show_fingerprint(input_file: Option<PathBuf>) -> Result<()> {
    let request = read_request(input_file)?;
    let cfg = config::config()?;

    let record = crate::domain::normalize(&request);
    let key = crate::core::fingerprint(&record, &cfg.cache.version);

    println!("{}", key);
    eprintln!("canonical: {}", crate::core::canonical_json(&record));
    Ok(())
}

async fn cache_stats() -> Result<()> {
    let cfg = config::config()?;
    let cache = CacheStore::from_settings(&cfg.cache);
    let stats = cache.stats().await;

    println!("Cache version: {}", stats.version);
    println!();
    println!("Primary (redis):");
    if stats.primary_available {
        println!("  Connected: {}", stats.primary_connected);
        match stats.primary_entry_count {
            Some(count) => println!("  Entries:   {}", count),
            None => println!("  Entries:   (unknown)"),
        }
    } else {
        println!("  (not configured)");
    }
    println!();
    println!("Fallback (files):");
    println!("  Directory: {}", cfg.cache.dir.display());
    println!("  Entries:   {}", stats.fallback_entry_count);
    println!("  Size:      {} bytes", stats.fallback_size_bytes);

    Ok(())
}

async fn cache_clear(pattern: Option<String>) -> Result<()> {
    let cfg = config::config()?;
    let cache = CacheStore::from_settings(&cfg.cache);

    let removed = cache.clear(pattern.as_deref()).await;
    println!(
        "Removed {} cached report(s) matching '{}'",
        removed,
        pattern.as_deref().unwrap_or("*")
    );
    Ok(())
}

/// Show the resolved configuration (for debugging)
fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("finiq configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:       {}", cfg.home.display());
    println!("  Cache dir:  {}", cfg.cache.dir.display());
    println!();
    println!("Cache:");
    println!("  Version:    {}", cfg.cache.version);
    println!("  TTL:        {}s", cfg.cache.ttl.as_secs());
    match &cfg.cache.redis {
        Some(redis) => {
            println!("  Redis:      {}", redact_url(&redis.url));
            println!("  Key prefix: {}", redis.key_prefix);
            println!("  Timeout:    {}ms", redis.timeout.as_millis());
            println!("  Cool-down:  {}s", redis.cooldown.as_secs());
        }
        None => println!("  Redis:      (not configured, file cache only)"),
    }
    println!();
    println!("Safety limits:");
    println!("  Step timeout:     {}s", cfg.safety.step_timeout_seconds);
    println!("  Max prompt size:  {} bytes", cfg.safety.max_prompt_bytes);
    println!("  Max reply size:   {} bytes", cfg.safety.max_output_bytes);
    println!();
    println!("Steps:");
    for step in &cfg.pipeline()?.steps {
        println!(
            "  {:<20} temperature {:.1}, max_tokens {}, timeout {}s",
            step.kind.key(),
            step.params.temperature,
            step.params.max_tokens,
            step.timeout(&cfg.safety).as_secs()
        );
    }

    Ok(())
}

async fn health() -> Result<()> {
    let cfg = config::config()?;
    let pipeline = cfg.pipeline()?;
    let adapter = LlmAdapter::from_env(pipeline.params_by_action());
    let cache = CacheStore::from_settings(&cfg.cache);

    let providers: Vec<&str> = adapter.providers().iter().map(|p| p.name.as_str()).collect();
    let adapter_health = adapter.health_check().await;
    match &adapter_health {
        Ok(()) => println!("Generation: ok ({})", providers.join(" -> ")),
        Err(e) => println!("Generation: unavailable ({})", e),
    }

    let stats = cache.stats().await;
    match (stats.primary_available, stats.primary_connected) {
        (false, _) => println!("Cache:      file only ({})", cfg.cache.dir.display()),
        (true, true) => println!("Cache:      redis connected, file fallback ready"),
        (true, false) => println!("Cache:      redis unreachable, using file fallback"),
    }

    adapter_health
}

/// Hide credentials in a connection URL
fn redact_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_request_requires_object() {
        assert!(parse_request("{\"startupName\": \"Acme\"}").is_ok());
        assert!(parse_request("[1, 2]").is_err());
        assert!(parse_request("   ").is_err());
        assert!(parse_request("{oops").is_err());
    }

    #[test]
    fn test_redact_url() {
        assert_eq!(redact_url("redis://:secret@cache:6379/0"), "redis://***@cache:6379/0");
        assert_eq!(redact_url("redis://127.0.0.1:6379"), "redis://127.0.0.1:6379");
    }

    #[test]
    fn test_cli_parses_cache_clear() {
        let cli = Cli::parse_from(["finiq", "cache", "clear", "--pattern", "v1:*"]);
        match cli.command {
            Commands::Cache {
                command: CacheCommands::Clear { pattern },
            } => assert_eq!(pattern.as_deref(), Some("v1:*")),
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
