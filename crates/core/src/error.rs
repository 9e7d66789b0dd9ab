#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A request parameter failed validation before reaching the binder.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A node/field the binder addresses is absent from the loaded
    /// template. A configuration defect, not a request fault.
    #[error("Template integrity fault: {0}")]
    TemplateIntegrity(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
