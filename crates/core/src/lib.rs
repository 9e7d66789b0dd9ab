//! Domain logic for the face-conditioned generation pipeline.
//!
//! Pure request/workflow semantics with no backend I/O: parameter
//! validation, the model catalog, workflow template parsing, and the
//! typed binding table that turns a validated request into a bound
//! graph ready for submission.

pub mod catalog;
pub mod error;
pub mod params;
pub mod workflow;
