//! Arguments shared by the commands that call the model.

use std::path::PathBuf;

pub const DEFAULT_OUT_DIR: &str = "results";

#[derive(clap::Args, Clone, Debug)]
pub struct PipelineArgs {
    /// Pipeline config (YAML). Built-in defaults when omitted.
    #[arg(long, env = "ARTGAP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output directory for summaries, raw outputs and reports
    #[arg(long, default_value = DEFAULT_OUT_DIR)]
    pub out: PathBuf,

    /// Model backend: openai | fake (overrides config)
    #[arg(long, env = "ARTGAP_PROVIDER")]
    pub provider: Option<String>,

    /// OpenAI-compatible API root (overrides config)
    #[arg(long, env = "ARTGAP_BASE_URL")]
    pub base_url: Option<String>,

    /// API key. Falls back to the variable named by `api_key_env` in the config.
    #[arg(long, hide = true)]
    pub api_key: Option<String>,

    /// Upper bound on in-flight model requests (overrides config)
    #[arg(long, env = "ARTGAP_MAX_CONCURRENT_REQUESTS")]
    pub max_concurrent_requests: Option<usize>,
}
