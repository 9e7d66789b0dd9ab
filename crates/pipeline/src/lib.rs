//! Request orchestration for the face-conditioned generation pipeline.
//!
//! One request flows through: pre-flight reset → input staging →
//! template binding → backend execution → artifact collection →
//! output normalization. [`runner::GenerationPipeline`] drives the
//! whole sequence.

pub mod collect;
pub mod config;
pub mod error;
pub mod normalize;
pub mod runner;
pub mod staging;
pub mod workspace;

pub use error::PipelineError;
