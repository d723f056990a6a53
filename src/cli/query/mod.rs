//! Query command - one request through caches and providers

use clap::Args;
use uuid::Uuid;

use crate::api::types::QueryResponse;
use crate::infrastructure::logging;
use crate::infrastructure::services::QueryOptions;

#[derive(Debug, Args)]
pub struct QueryArgs {
    /// Query text
    pub query: String,

    /// Provider to call on a cache miss
    #[arg(long)]
    pub provider: Option<String>,

    /// Model override; defaults to the provider's default model
    #[arg(long)]
    pub model: Option<String>,

    /// Skip cache lookups (the answer is still cached)
    #[arg(long)]
    pub no_cache: bool,

    /// Minimum similarity for a semantic hit
    #[arg(long)]
    pub threshold: Option<f32>,

    #[arg(long)]
    pub max_tokens: Option<u32>,

    #[arg(long)]
    pub temperature: Option<f32>,
}

impl QueryArgs {
    fn options(&self) -> QueryOptions {
        QueryOptions {
            use_cache: !self.no_cache,
            similarity_threshold: self.threshold,
            provider: self.provider.clone(),
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

pub async fn run(args: QueryArgs) -> anyhow::Result<()> {
    let config = super::load_config()?;
    logging::init_logging(&config.logging);

    let state = crate::create_app_state_with_config(&config).await?;
    let outcome = state
        .query_service
        .process_query(&args.query, args.options())
        .await?;

    let response = QueryResponse::new(Uuid::new_v4(), outcome);
    println!("{}", serde_json::to_string_pretty(&response)?);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_cache_flag_disables_lookup() {
        let args = QueryArgs {
            query: "q".into(),
            provider: None,
            model: None,
            no_cache: true,
            threshold: Some(0.9),
            max_tokens: None,
            temperature: None,
        };

        let options = args.options();
        assert!(!options.use_cache);
        assert_eq!(options.similarity_threshold, Some(0.9));
    }
}
