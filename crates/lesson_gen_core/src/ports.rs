//! crates/lesson_gen_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the concrete model provider behind it.

use async_trait::async_trait;

use crate::domain::{
    GenerateLessonRequest, GenerateLessonResponse, ImproveLessonRequest, ImproveLessonResponse,
};
use crate::prompt::OutputSchema;

//=========================================================================================
// Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., network, SDK).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// Failures of a prompt flow invocation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LessonError {
    /// The input was rejected before any provider call.
    #[error("Validation error: {0}")]
    Validation(String),
    /// The provider failed, timed out, or returned output that does not fit the schema.
    #[error("Generation error: {0}")]
    Generation(String),
}

impl From<PortError> for LessonError {
    fn from(e: PortError) -> Self {
        LessonError::Generation(e.to_string())
    }
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Sends a rendered prompt, constrained by `schema`, and returns the raw model text.
    async fn invoke(&self, prompt: &str, schema: &OutputSchema) -> PortResult<String>;
}

#[async_trait]
pub trait LessonGenerationService: Send + Sync {
    /// Generates a structured lesson for a topic.
    async fn generate_lesson(
        &self,
        request: &GenerateLessonRequest,
    ) -> Result<GenerateLessonResponse, LessonError>;
}

#[async_trait]
pub trait LessonImprovementService: Send + Sync {
    /// Rewrites a lesson according to free-form feedback.
    async fn improve_lesson(
        &self,
        request: &ImproveLessonRequest,
    ) -> Result<ImproveLessonResponse, LessonError>;
}
