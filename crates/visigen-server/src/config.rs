use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use http::HeaderValue;
use visigen_ai::config::{API_KEY_ENV, DEFAULT_MODEL};
use visigen_ai::pipeline::{DEFAULT_MAX_ROUNDS, PipelineConfig};
use visigen_ai::{ConfigError, GeminiConfig};

pub const DEFAULT_BIND: &str = "127.0.0.1:8000";
pub const DEFAULT_ALLOWED_ORIGIN: &str = "http://localhost:5173";

#[derive(Debug, thiserror::Error)]
pub enum ServerConfigError {
    #[error(transparent)]
    Generation(#[from] ConfigError),
    #[error("allowed origin '{0}' is not a valid header value")]
    InvalidOrigin(String),
    #[error("at least one allowed origin is required")]
    NoOrigins,
    #[error("max rounds must be at least 1")]
    ZeroRounds,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "visigen-server", about = "HTTP API turning physics word problems into 3D scenes")]
pub struct ServerArgs {
    /// API key for the Gemini generation service.
    #[arg(long, env = API_KEY_ENV, hide_env_values = true)]
    pub api_key: Option<String>,

    #[arg(long, env = "VISIGEN_BIND", default_value = DEFAULT_BIND)]
    pub bind: SocketAddr,

    /// Browser origins allowed to call the API, comma separated.
    #[arg(
        long,
        env = "VISIGEN_ALLOWED_ORIGINS",
        value_delimiter = ',',
        default_value = DEFAULT_ALLOWED_ORIGIN
    )]
    pub allowed_origins: Vec<String>,

    #[arg(long, env = "VISIGEN_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Upper bound for a single generation call.
    #[arg(long, env = "VISIGEN_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    #[arg(long, env = "VISIGEN_MAX_ROUNDS", default_value_t = DEFAULT_MAX_ROUNDS)]
    pub max_rounds: usize,

    /// Pause between scene rounds.
    #[arg(long, env = "VISIGEN_RETRY_DELAY_MS", default_value_t = 2000)]
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub bind: SocketAddr,
    pub origins: Vec<HeaderValue>,
    pub gemini: GeminiConfig,
    pub pipeline: PipelineConfig,
}

impl ServerArgs {
    pub fn into_settings(self) -> Result<ServerSettings, ServerConfigError> {
        let gemini = GeminiConfig::new(self.api_key)?
            .with_model(self.model)?
            .with_timeout(Duration::from_secs(self.request_timeout_secs))?;

        if self.max_rounds == 0 {
            return Err(ServerConfigError::ZeroRounds);
        }

        Ok(ServerSettings {
            bind: self.bind,
            origins: parse_origins(&self.allowed_origins)?,
            gemini,
            pipeline: PipelineConfig {
                max_rounds: self.max_rounds,
                retry_delay: Duration::from_millis(self.retry_delay_ms),
            },
        })
    }
}

pub fn parse_origins(origins: &[String]) -> Result<Vec<HeaderValue>, ServerConfigError> {
    let origins = origins
        .iter()
        .map(|origin| origin.trim().trim_end_matches('/'))
        .filter(|origin| !origin.is_empty())
        .map(|origin| {
            if !(origin.starts_with("http://") || origin.starts_with("https://")) {
                return Err(ServerConfigError::InvalidOrigin(origin.to_string()));
            }
            HeaderValue::from_str(origin)
                .map_err(|_| ServerConfigError::InvalidOrigin(origin.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if origins.is_empty() {
        return Err(ServerConfigError::NoOrigins);
    }
    Ok(origins)
}
