//! crates/lesson_gen_core/src/flows.rs
//!
//! The two prompt flows of the application. They share no state; each owns its
//! own `PromptFlow` over a shared `ModelProvider`.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{
    GenerateLessonRequest, GenerateLessonResponse, ImproveLessonRequest, ImproveLessonResponse,
};
use crate::ports::{LessonError, LessonGenerationService, LessonImprovementService, ModelProvider};
use crate::prompt::{FlowInput, FlowOutput, PromptFlow, PromptTemplate};

const GENERATE_LESSON_PROMPT: &str = r#"You are a helpful assistant that creates lessons on any topic.

Generate a lesson about the following topic: {{{topic}}}

The lesson should be structured with a title, an introduction, multiple sections with titles and content, and a summary."#;

const IMPROVE_LESSON_PROMPT: &str = r#"You are an expert teacher who can improve lessons based on feedback.

Here is the lesson to improve:
{{lesson}}

Here is the feedback to use to improve the lesson:
{{feedback}}

Improve the lesson based on the feedback. Return the improved lesson."#;

//=========================================================================================
// Input / Output Contracts
//=========================================================================================

impl FlowInput for GenerateLessonRequest {
    fn check(&self) -> Result<(), LessonError> {
        if self.topic.trim().is_empty() {
            return Err(LessonError::Validation("Please enter a topic.".to_string()));
        }
        Ok(())
    }
}

impl FlowOutput for GenerateLessonResponse {}

impl FlowInput for ImproveLessonRequest {}

impl FlowOutput for ImproveLessonResponse {
    fn check(&self) -> Result<(), LessonError> {
        if self.improved_lesson.trim().is_empty() {
            return Err(LessonError::Generation(
                "The improved lesson was empty.".to_string(),
            ));
        }
        Ok(())
    }
}

//=========================================================================================
// Generate Lesson From Topic
//=========================================================================================

/// Topic → structured `Lesson`.
pub struct GenerateLessonFlow {
    flow: PromptFlow<GenerateLessonRequest, GenerateLessonResponse>,
}

impl GenerateLessonFlow {
    pub fn new(provider: Arc<dyn ModelProvider>) -> Self {
        Self {
            flow: PromptFlow::new(
                "generateLessonPrompt",
                PromptTemplate::new(GENERATE_LESSON_PROMPT),
                "The generated lesson in a structured format.",
                provider,
            ),
        }
    }
}

#[async_trait]
impl LessonGenerationService for GenerateLessonFlow {
    async fn generate_lesson(
        &self,
        request: &GenerateLessonRequest,
    ) -> Result<GenerateLessonResponse, LessonError> {
        self.flow.run(request).await
    }
}

//=========================================================================================
// Improve Lesson With Feedback
//=========================================================================================

/// (lesson text, feedback text) → improved lesson text.
pub struct ImproveLessonFlow {
    flow: PromptFlow<ImproveLessonRequest, ImproveLessonResponse>,
}

impl ImproveLessonFlow {
    pub fn new(provider: Arc<dyn ModelProvider>) -> Self {
        Self {
            flow: PromptFlow::new(
                "improveLessonWithFeedbackPrompt",
                PromptTemplate::new(IMPROVE_LESSON_PROMPT),
                "The improved lesson.",
                provider,
            ),
        }
    }
}

#[async_trait]
impl LessonImprovementService for ImproveLessonFlow {
    async fn improve_lesson(
        &self,
        request: &ImproveLessonRequest,
    ) -> Result<ImproveLessonResponse, LessonError> {
        self.flow.run(request).await
    }
}
