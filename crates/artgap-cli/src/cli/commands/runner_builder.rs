use super::super::args::PipelineArgs;
use artgap_core::config::{PipelineConfig, Provider};
use artgap_core::errors::ConfigError;
use artgap_core::stages::{LlmOracle, RuleOracle};
use std::sync::Arc;
use tracing::info;

pub(crate) struct Runner {
    pub config: PipelineConfig,
    pub oracle: Arc<dyn RuleOracle>,
}

/// Config file first, then flag/env overrides, then validation.
pub(crate) fn resolve_config(
    args: &PipelineArgs,
    rule_concurrency: Option<usize>,
) -> Result<PipelineConfig, ConfigError> {
    let mut config = PipelineConfig::load(args.config.as_deref())?;
    if let Some(provider) = &args.provider {
        config.provider = provider.parse::<Provider>()?;
    }
    if let Some(base_url) = &args.base_url {
        config.base_url = base_url.trim_end_matches('/').to_string();
    }
    if let Some(n) = args.max_concurrent_requests {
        config.max_concurrent_requests = n;
    }
    if let Some(n) = rule_concurrency {
        config.rule_concurrency = n;
    }
    config.validate()?;
    Ok(config)
}

pub(crate) fn build_runner(
    args: &PipelineArgs,
    rule_concurrency: Option<usize>,
) -> Result<Runner, ConfigError> {
    let config = resolve_config(args, rule_concurrency)?;
    let oracle = LlmOracle::from_config(&config, args.api_key.as_deref())?;
    info!(
        provider = ?config.provider,
        base_url = %config.base_url,
        max_concurrent_requests = config.max_concurrent_requests,
        rule_concurrency = config.rule_concurrency,
        "pipeline configured"
    );
    Ok(Runner {
        config,
        oracle: Arc::new(oracle),
    })
}
