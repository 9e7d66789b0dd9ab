use std::path::PathBuf;

use facegen_comfyui::api::ComfyUIApiError;
use facegen_comfyui::client::ComfyUIClientError;
use facegen_comfyui::execution::ExecutionError;
use facegen_comfyui::startup::StartupError;
use facegen_core::error::CoreError;

/// All the ways one request (or startup) can fail.
///
/// Every variant aborts the request as a whole; nothing is retried and
/// there is no partial-success mode.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Image decode or encode failure during staging or normalization.
    #[error("Image codec failure: {0}")]
    Codec(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    /// A backend REST call failed.
    #[error("Backend API call failed: {0}")]
    Api(#[from] ComfyUIApiError),

    /// Opening the progress channel failed.
    #[error(transparent)]
    Connection(#[from] ComfyUIClientError),

    /// The backend reported a failure (or hung) while executing.
    #[error(transparent)]
    Execution(#[from] ExecutionError),

    /// The backend never became ready.
    #[error(transparent)]
    Startup(#[from] StartupError),
}

impl PipelineError {
    /// Wrap an io error with the path it concerns.
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
