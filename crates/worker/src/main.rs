//! Worker binary: wires config and tracing, prepares the backend once,
//! then runs a single generation request described by a JSON file and
//! prints the resulting artifact paths.

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use facegen_core::params::GenerationRequest;
use facegen_pipeline::config::PipelineConfig;
use facegen_pipeline::runner::GenerationPipeline;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "facegen_worker=debug,facegen_pipeline=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let request_path = std::env::args()
        .nth(1)
        .context("Usage: facegen-worker <request.json>")?;
    let raw = std::fs::read_to_string(&request_path)
        .with_context(|| format!("Failed to read request file {request_path}"))?;
    let request: GenerationRequest =
        serde_json::from_str(&raw).context("Request file is not a valid generation request")?;

    let config = PipelineConfig::from_env()?;
    let pipeline = GenerationPipeline::new(config)?;

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, cancelling");
            ctrl_c_cancel.cancel();
        }
    });

    pipeline.prepare(&cancel).await?;

    let artifacts = pipeline.run(&request, &cancel).await?;
    for path in &artifacts {
        println!("{}", path.display());
    }

    Ok(())
}
