//! The per-request orchestration sequence.
//!
//! [`GenerationPipeline`] owns the backend clients and the loaded
//! catalog, validates the binding table against the template at
//! startup, and drives each request through: pre-flight reset → input
//! staging → template binding → submission → bounded wait → artifact
//! collection → output normalization.

use std::path::PathBuf;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use facegen_comfyui::api::ComfyUIApi;
use facegen_comfyui::client::ComfyUIClient;
use facegen_comfyui::execution::{await_completion, ExecutionError};
use facegen_comfyui::startup::{wait_until_ready, ReadyProbe};
use facegen_core::catalog::ModelCatalog;
use facegen_core::params::{resolve_seed, GenerationRequest};
use facegen_core::workflow::{BindingTable, WorkflowBindings, WorkflowTemplate};

use crate::collect::collect_artifacts;
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::normalize::normalize_outputs;
use crate::staging::stage_face_image;
use crate::workspace::reset_dirs;

/// One backend instance, one request at a time.
///
/// The pre-flight reset wipes directories shared with the backend, so
/// overlapping requests would corrupt each other; an async mutex
/// serializes them.
#[derive(Debug)]
pub struct GenerationPipeline {
    config: PipelineConfig,
    api: ComfyUIApi,
    client: ComfyUIClient,
    catalog: ModelCatalog,
    bindings: BindingTable,
    in_flight: Mutex<()>,
}

impl GenerationPipeline {
    /// Build the pipeline and validate its configuration.
    ///
    /// Loads the catalog (file or built-in) and checks every binding
    /// coordinate against the template, so a drifted template fails
    /// here rather than mid-request.
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        let catalog = match &config.catalog_path {
            Some(path) => ModelCatalog::load(path)?,
            None => ModelCatalog::builtin(),
        };

        let bindings = BindingTable::default();
        WorkflowTemplate::load(&config.template_path)?.validate_bindings(&bindings)?;

        Ok(Self {
            api: ComfyUIApi::new(config.api_url.clone()),
            client: ComfyUIClient::new(config.ws_url.clone()),
            catalog,
            bindings,
            in_flight: Mutex::new(()),
            config,
        })
    }

    /// One-time startup preparation, before the first request.
    ///
    /// Waits for the backend to answer, then asks it to make every
    /// catalog checkpoint available.
    pub async fn prepare(&self, cancel: &CancellationToken) -> Result<(), PipelineError> {
        wait_until_ready(&self.api, &ReadyProbe::default(), cancel).await?;

        let weights: Vec<String> = self.catalog.checkpoints().map(str::to_string).collect();
        tracing::info!(count = weights.len(), "Preparing checkpoint weights");
        self.api.prepare_weights(&weights).await?;

        Ok(())
    }

    /// Run one request to completion and return its artifact paths.
    pub async fn run(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<PathBuf>, PipelineError> {
        let _guard = self.in_flight.lock().await;

        request.validate()?;
        let seed = resolve_seed(request.seed);

        // Resolve bindings before touching any shared state: an
        // unknown checkpoint model must fail without wiping anything.
        let workflow_bindings = WorkflowBindings::resolve(request, seed, &self.catalog)?;

        // Pre-flight reset: nothing from a previous request survives.
        self.api.clear_queue().await?;
        reset_dirs(&self.config.working_dirs())?;

        stage_face_image(&request.face_image, &self.config.input_dir)?;

        // Fresh template per request; the blueprint is never mutated.
        let template = WorkflowTemplate::load(&self.config.template_path)?;
        let bound = template.bind(&self.bindings, &workflow_bindings)?;

        // Connect before submitting so the completion message for our
        // client id cannot be missed.
        let mut conn = self.client.connect().await?;
        let submitted = self
            .api
            .submit_workflow(bound.as_json(), &conn.client_id)
            .await?;
        tracing::info!(
            prompt_id = %submitted.prompt_id,
            queue_position = submitted.number,
            seed,
            "Workflow submitted",
        );

        let outcome = await_completion(
            &mut conn,
            &submitted.prompt_id,
            self.config.execution_timeout,
            cancel,
        )
        .await;

        if let Err(ExecutionError::Timeout(_) | ExecutionError::Cancelled) = &outcome {
            // The backend is still grinding on an execution nobody
            // will collect; stop it.
            if let Err(e) = self.api.interrupt().await {
                tracing::warn!(error = %e, "Failed to interrupt abandoned execution");
            }
        }
        outcome?;

        let files = collect_artifacts(&self.config.output_dir)?;
        let files = normalize_outputs(files, request.output_format, request.output_quality)?;

        tracing::info!(count = files.len(), "Request complete");
        Ok(files)
    }
}
