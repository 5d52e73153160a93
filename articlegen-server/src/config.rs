//! Server configuration.

use std::path::PathBuf;
use std::time::Duration;

use articlegen_core::llm::{
    AzureSettings, DEFAULT_AZURE_API_VERSION, DEFAULT_AZURE_DEPLOYMENT, DEFAULT_AZURE_ENDPOINT,
};
use articlegen_core::store::DEFAULT_CONFIG_PATH;
use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "articlegen-server", about = "Research article generator web UI")]
pub struct ServerConfig {
    /// HTTP listen address (host:port)
    #[arg(long, env = "ARTICLEGEN_LISTEN", default_value = "127.0.0.1:8501")]
    pub listen_addr: String,

    /// Prompt configuration file
    #[arg(long, env = "ARTICLEGEN_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config_path: PathBuf,

    /// Azure OpenAI resource endpoint
    #[arg(long, env = "AZURE_OPENAI_ENDPOINT", default_value = DEFAULT_AZURE_ENDPOINT)]
    pub azure_endpoint: String,

    /// Azure OpenAI deployment name
    #[arg(long, env = "AZURE_OPENAI_DEPLOYMENT", default_value = DEFAULT_AZURE_DEPLOYMENT)]
    pub azure_deployment: String,

    /// Azure OpenAI API version
    #[arg(long, env = "AZURE_OPENAI_API_VERSION", default_value = DEFAULT_AZURE_API_VERSION)]
    pub azure_api_version: String,

    /// Fallback API key when the form field is left blank
    #[arg(long, env = "AZURE_OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Skip the connectivity check before running the pipeline
    #[arg(long)]
    pub skip_probe: bool,

    /// Forget a session after this many idle seconds
    #[arg(long, env = "ARTICLEGEN_SESSION_TTL", default_value_t = 3600)]
    pub session_ttl_secs: u64,

    /// Most sessions kept at once; the least recently used goes first
    #[arg(long, env = "ARTICLEGEN_MAX_SESSIONS", default_value_t = 1024)]
    pub max_sessions: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8501".to_string(),
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
            azure_endpoint: DEFAULT_AZURE_ENDPOINT.to_string(),
            azure_deployment: DEFAULT_AZURE_DEPLOYMENT.to_string(),
            azure_api_version: DEFAULT_AZURE_API_VERSION.to_string(),
            api_key: None,
            skip_probe: false,
            session_ttl_secs: 3600,
            max_sessions: 1024,
        }
    }
}

impl ServerConfig {
    pub fn azure(&self) -> AzureSettings {
        AzureSettings {
            endpoint: self.azure_endpoint.clone(),
            deployment: self.azure_deployment.clone(),
            api_version: self.azure_api_version.clone(),
        }
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    /// Key from the form if given, else the configured fallback.
    pub fn resolve_api_key(&self, submitted: Option<&str>) -> String {
        submitted
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .or(self.api_key.as_deref())
            .unwrap_or_default()
            .to_string()
    }
}
