//! Command line entry points
//!
//! - `serve`: run the HTTP gateway
//! - `query`: answer one query through the full pipeline and print the JSON result

pub mod query;
pub mod serve;

use clap::{Parser, Subcommand};

use crate::config::AppConfig;

/// LLM Cache Gateway - exact and semantic caching in front of LLM providers
#[derive(Parser)]
#[command(name = "llm-cache-gateway")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP server
    Serve,

    /// Run a single query and print the response as JSON
    Query(query::QueryArgs),
}

/// Load and validate configuration, failing on any error
pub(crate) fn load_config() -> anyhow::Result<AppConfig> {
    let config = AppConfig::load()?;
    config.validate()?;
    Ok(config)
}
