//! Runtime configuration, read from the environment.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::PipelineError;

/// Default backend HTTP endpoint.
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8188";

/// Default backend WebSocket endpoint.
pub const DEFAULT_WS_URL: &str = "ws://127.0.0.1:8188";

/// Default workflow template location.
pub const DEFAULT_TEMPLATE_PATH: &str = "pulid_api.json";

/// Default staging directory for the normalized face image.
pub const DEFAULT_INPUT_DIR: &str = "/tmp/inputs";

/// Default directory the backend writes artifacts into.
pub const DEFAULT_OUTPUT_DIR: &str = "/tmp/outputs";

/// Default backend temp directory, wiped alongside the others.
pub const DEFAULT_BACKEND_TEMP_DIR: &str = "ComfyUI/temp";

/// Default upper bound on one graph execution.
pub const DEFAULT_EXECUTION_TIMEOUT_SECS: u64 = 600;

/// Everything the pipeline needs to know about its environment.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Backend HTTP base URL.
    pub api_url: String,
    /// Backend WebSocket base URL.
    pub ws_url: String,
    /// Workflow template file, re-read for every request.
    pub template_path: PathBuf,
    /// Optional model catalog file; `None` uses the built-in catalog.
    pub catalog_path: Option<PathBuf>,
    /// Staging directory for the face image.
    pub input_dir: PathBuf,
    /// Directory the backend writes artifacts into.
    pub output_dir: PathBuf,
    /// Backend temp directory.
    pub backend_temp_dir: PathBuf,
    /// Upper bound on one graph execution.
    pub execution_timeout: Duration,
}

impl PipelineConfig {
    /// Build a config from environment variables, falling back to the
    /// documented defaults. `dotenvy` loading is the binary's job.
    pub fn from_env() -> Result<Self, PipelineError> {
        let execution_timeout = match std::env::var("EXECUTION_TIMEOUT_SECS") {
            Ok(raw) => {
                let secs: u64 = raw.parse().map_err(|_| {
                    PipelineError::Config(format!(
                        "EXECUTION_TIMEOUT_SECS must be an integer, got '{raw}'"
                    ))
                })?;
                Duration::from_secs(secs)
            }
            Err(_) => Duration::from_secs(DEFAULT_EXECUTION_TIMEOUT_SECS),
        };

        Ok(Self {
            api_url: env_or("COMFYUI_API_URL", DEFAULT_API_URL),
            ws_url: env_or("COMFYUI_WS_URL", DEFAULT_WS_URL),
            template_path: env_or("WORKFLOW_TEMPLATE_PATH", DEFAULT_TEMPLATE_PATH).into(),
            catalog_path: std::env::var("MODEL_CATALOG_PATH").ok().map(PathBuf::from),
            input_dir: env_or("INPUT_DIR", DEFAULT_INPUT_DIR).into(),
            output_dir: env_or("OUTPUT_DIR", DEFAULT_OUTPUT_DIR).into(),
            backend_temp_dir: env_or("BACKEND_TEMP_DIR", DEFAULT_BACKEND_TEMP_DIR).into(),
            execution_timeout,
        })
    }

    /// The three working directories wiped before every request, in
    /// reset order: staged input, raw output, backend temp.
    pub fn working_dirs(&self) -> [&std::path::Path; 3] {
        [&self.input_dir, &self.output_dir, &self.backend_temp_dir]
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
