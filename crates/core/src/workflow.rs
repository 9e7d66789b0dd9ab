//! Workflow template parsing and parameter binding.
//!
//! A workflow template is a ComfyUI prompt-format JSON object: each key
//! is a node id and each value is an object with `class_type` and
//! `inputs` fields. The template is an immutable blueprint — it is
//! re-read from disk for every request and [`WorkflowTemplate::bind`]
//! deep-copies it before substituting values, so no bindings can leak
//! between requests.
//!
//! The fields the binder writes are addressed through a
//! [`BindingTable`] of `(node id, input name)` coordinates known at
//! compile time. [`WorkflowTemplate::validate_bindings`] checks the
//! table against the template once at startup, so a drifted template
//! surfaces as [`CoreError::TemplateIntegrity`] before the first
//! request instead of silently mid-pipeline.

use std::path::Path;

use serde_json::{Map, Value};

use crate::catalog::ModelCatalog;
use crate::error::CoreError;
use crate::params::GenerationRequest;

/// Denylist prefix always prepended to the user's negative prompt.
/// Present regardless of user input; cannot be disabled.
pub const NEGATIVE_PROMPT_PREFIX: &str = "nsfw, nude, ";

// ---------------------------------------------------------------------------
// Binding table
// ---------------------------------------------------------------------------

/// Coordinates of one bindable input field in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeField {
    /// Node id (object key in the template JSON).
    pub node_id: &'static str,
    /// Input name within the node's `inputs` object.
    pub field: &'static str,
}

impl NodeField {
    const fn new(node_id: &'static str, field: &'static str) -> Self {
        Self { node_id, field }
    }
}

/// The complete set of fields the binder writes, one coordinate per
/// logical parameter.
#[derive(Debug, Clone)]
pub struct BindingTable {
    pub checkpoint: NodeField,
    pub positive_prompt: NodeField,
    pub negative_prompt: NodeField,
    pub face_method: NodeField,
    pub seed: NodeField,
    pub width: NodeField,
    pub height: NodeField,
    pub batch_size: NodeField,
}

impl BindingTable {
    /// Coordinates for the PuLID face-generation graph.
    pub fn pulid() -> Self {
        Self {
            checkpoint: NodeField::new("4", "ckpt_name"),
            positive_prompt: NodeField::new("22", "text"),
            negative_prompt: NodeField::new("23", "text"),
            face_method: NodeField::new("33", "method"),
            seed: NodeField::new("3", "seed"),
            width: NodeField::new("5", "width"),
            height: NodeField::new("5", "height"),
            batch_size: NodeField::new("5", "batch_size"),
        }
    }

    /// Every coordinate in the table, for validation sweeps.
    pub fn entries(&self) -> [NodeField; 8] {
        [
            self.checkpoint,
            self.positive_prompt,
            self.negative_prompt,
            self.face_method,
            self.seed,
            self.width,
            self.height,
            self.batch_size,
        ]
    }
}

impl Default for BindingTable {
    fn default() -> Self {
        Self::pulid()
    }
}

// ---------------------------------------------------------------------------
// Resolved bindings
// ---------------------------------------------------------------------------

/// The concrete values bound into the graph for one request.
///
/// All request-level policy (catalog resolution, denylist prefix,
/// method token, seed resolution) is applied when this value is built,
/// so [`WorkflowTemplate::bind`] is a pure field substitution.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowBindings {
    pub checkpoint: String,
    pub prompt: String,
    pub negative_prompt: String,
    pub face_method: &'static str,
    pub seed: u32,
    pub width: u32,
    pub height: u32,
    pub batch_size: u32,
}

impl WorkflowBindings {
    /// Resolve a validated request into bindable values.
    ///
    /// `seed` is the already-resolved seed (see
    /// [`crate::params::resolve_seed`]) so two calls with the same
    /// arguments always produce identical bindings.
    pub fn resolve(
        request: &GenerationRequest,
        seed: u32,
        catalog: &ModelCatalog,
    ) -> Result<Self, CoreError> {
        let model_id = request
            .checkpoint_model
            .as_deref()
            .unwrap_or_else(|| catalog.default_model());
        let checkpoint = catalog.checkpoint_for(model_id)?;

        Ok(Self {
            checkpoint: checkpoint.to_string(),
            prompt: request.prompt.clone(),
            negative_prompt: format!("{NEGATIVE_PROMPT_PREFIX}{}", request.negative_prompt),
            face_method: request.face_style.method_token(),
            seed,
            width: request.width,
            height: request.height,
            batch_size: request.number_of_images,
        })
    }
}

// ---------------------------------------------------------------------------
// Template
// ---------------------------------------------------------------------------

/// A parsed workflow template: the node map, unmodified.
#[derive(Debug, Clone)]
pub struct WorkflowTemplate {
    nodes: Map<String, Value>,
}

/// A template with one request's parameters substituted. A fresh value
/// per request, never shared.
#[derive(Debug, Clone)]
pub struct BoundWorkflow {
    nodes: Value,
}

impl BoundWorkflow {
    /// The graph JSON in the shape the backend's submit endpoint expects.
    pub fn as_json(&self) -> &Value {
        &self.nodes
    }
}

impl WorkflowTemplate {
    /// Parse a template from its JSON value.
    ///
    /// Requires a non-empty object whose every node carries an `inputs`
    /// object. `class_type` is the backend's concern and is not
    /// interpreted here.
    pub fn parse(json: Value) -> Result<Self, CoreError> {
        let nodes = match json {
            Value::Object(map) => map,
            _ => {
                return Err(CoreError::Validation(
                    "Workflow template must be a JSON object".to_string(),
                ))
            }
        };
        if nodes.is_empty() {
            return Err(CoreError::Validation(
                "Workflow template must contain at least one node".to_string(),
            ));
        }
        for (node_id, node) in &nodes {
            if !node.get("inputs").is_some_and(Value::is_object) {
                return Err(CoreError::Validation(format!(
                    "Node '{node_id}' is missing an 'inputs' object"
                )));
            }
        }
        Ok(Self { nodes })
    }

    /// Read and parse a template file. Called fresh for every request.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CoreError::Internal(format!(
                "Failed to read workflow template {}: {e}",
                path.display()
            ))
        })?;
        let json: Value = serde_json::from_str(&raw).map_err(|e| {
            CoreError::Validation(format!(
                "Workflow template {} is not valid JSON: {e}",
                path.display()
            ))
        })?;
        Self::parse(json)
    }

    /// Check that every coordinate the binder writes exists in this
    /// template. Run once at startup.
    pub fn validate_bindings(&self, table: &BindingTable) -> Result<(), CoreError> {
        for target in table.entries() {
            self.input_slot(target)?;
        }
        Ok(())
    }

    /// Substitute one request's values into a deep copy of the template.
    ///
    /// The template itself is never mutated. Every write targets a
    /// field that must already exist; a missing field is a template
    /// integrity fault.
    pub fn bind(
        &self,
        table: &BindingTable,
        bindings: &WorkflowBindings,
    ) -> Result<BoundWorkflow, CoreError> {
        let mut nodes = self.nodes.clone();

        set_input(&mut nodes, table.checkpoint, bindings.checkpoint.clone().into())?;
        set_input(&mut nodes, table.positive_prompt, bindings.prompt.clone().into())?;
        set_input(
            &mut nodes,
            table.negative_prompt,
            bindings.negative_prompt.clone().into(),
        )?;
        set_input(&mut nodes, table.face_method, bindings.face_method.into())?;
        set_input(&mut nodes, table.seed, bindings.seed.into())?;
        set_input(&mut nodes, table.width, bindings.width.into())?;
        set_input(&mut nodes, table.height, bindings.height.into())?;
        set_input(&mut nodes, table.batch_size, bindings.batch_size.into())?;

        Ok(BoundWorkflow {
            nodes: Value::Object(nodes),
        })
    }

    /// Borrow the input slot addressed by `target`, or explain which
    /// part of the coordinate is missing.
    fn input_slot(&self, target: NodeField) -> Result<&Value, CoreError> {
        let node = self.nodes.get(target.node_id).ok_or_else(|| {
            CoreError::TemplateIntegrity(format!(
                "Node '{}' not found in template",
                target.node_id
            ))
        })?;
        node.get("inputs")
            .and_then(|inputs| inputs.get(target.field))
            .ok_or_else(|| {
                CoreError::TemplateIntegrity(format!(
                    "Node '{}' has no input field '{}'",
                    target.node_id, target.field
                ))
            })
    }
}

/// Overwrite an existing input field in a node map.
fn set_input(
    nodes: &mut Map<String, Value>,
    target: NodeField,
    value: Value,
) -> Result<(), CoreError> {
    let node = nodes.get_mut(target.node_id).ok_or_else(|| {
        CoreError::TemplateIntegrity(format!("Node '{}' not found in template", target.node_id))
    })?;
    let inputs = node
        .get_mut("inputs")
        .and_then(Value::as_object_mut)
        .ok_or_else(|| {
            CoreError::TemplateIntegrity(format!(
                "Node '{}' is missing an 'inputs' object",
                target.node_id
            ))
        })?;
    match inputs.get_mut(target.field) {
        Some(slot) => {
            *slot = value;
            Ok(())
        }
        None => Err(CoreError::TemplateIntegrity(format!(
            "Node '{}' has no input field '{}'",
            target.node_id, target.field
        ))),
    }
}
