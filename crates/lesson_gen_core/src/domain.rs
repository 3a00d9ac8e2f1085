//! crates/lesson_gen_core/src/domain.rs
//!
//! Defines the core data structures for the application: the lesson shape
//! produced by the model provider, the request payloads for the two prompt
//! flows, and the client-side record that tracks one generation request.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

//=========================================================================================
// Lesson Shape
//=========================================================================================

/// One titled section of a lesson. Order within a lesson is display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LessonSection {
    /// Title of the lesson section.
    pub title: String,
    /// Content of the lesson section.
    pub content: String,
}

/// A structured lesson: title, introduction, ordered sections and a summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Lesson {
    /// The title of the lesson.
    pub title: String,
    /// A brief introduction to the lesson.
    pub introduction: String,
    /// The sections of the lesson.
    pub sections: Vec<LessonSection>,
    /// A summary of the lesson.
    pub summary: String,
}

impl Lesson {
    /// True when the provider returned a lesson with no usable content at all.
    pub fn is_empty(&self) -> bool {
        self.title.trim().is_empty()
            && self.introduction.trim().is_empty()
            && self.summary.trim().is_empty()
            && self.sections.is_empty()
    }
}

//=========================================================================================
// Flow Payloads
//=========================================================================================

/// Input of the "generate lesson from topic" flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateLessonRequest {
    /// The topic for which to generate a lesson.
    pub topic: String,
}

impl GenerateLessonRequest {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
        }
    }
}

/// Output of the "generate lesson from topic" flow.
///
/// The provider is told the lesson is required, but parsing stays lenient: a
/// well-formed response without a lesson parses, and the tracker decides what
/// an absent lesson means.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GenerateLessonResponse {
    /// The generated lesson in a structured format.
    #[schemars(with = "Lesson")]
    pub lesson: Option<Lesson>,
}

/// Input of the "improve lesson with feedback" flow. Both fields are free-form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImproveLessonRequest {
    /// The lesson to improve.
    pub lesson: String,
    /// The feedback to use to improve the lesson.
    pub feedback: String,
}

/// Output of the "improve lesson with feedback" flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImproveLessonResponse {
    /// The improved lesson.
    pub improved_lesson: String,
}

//=========================================================================================
// Generation Records
//=========================================================================================

/// Lifecycle status of a generation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LessonStatus {
    Pending,
    Generated,
    Failed,
}

impl LessonStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, LessonStatus::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LessonStatus::Pending => "pending",
            LessonStatus::Generated => "generated",
            LessonStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for LessonStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status and lesson held together so only the three legal combinations exist.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RecordState {
    Pending,
    Generated(Lesson),
    Failed,
}

/// One tracked generation request.
///
/// Created `Pending`, resolved exactly once to `Generated` or `Failed`, and
/// never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "RecordView", try_from = "RecordView")]
pub struct GeneratedLessonRecord {
    pub id: Uuid,
    pub topic: String,
    pub created_at: DateTime<Utc>,
    state: RecordState,
}

impl GeneratedLessonRecord {
    /// Creates a pending record with a fresh time-ordered id.
    pub fn pending(topic: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            topic: topic.into(),
            created_at: Utc::now(),
            state: RecordState::Pending,
        }
    }

    pub fn status(&self) -> LessonStatus {
        match self.state {
            RecordState::Pending => LessonStatus::Pending,
            RecordState::Generated(_) => LessonStatus::Generated,
            RecordState::Failed => LessonStatus::Failed,
        }
    }

    pub fn lesson(&self) -> Option<&Lesson> {
        match &self.state {
            RecordState::Generated(lesson) => Some(lesson),
            _ => None,
        }
    }

    /// Moves a pending record to `Generated`. Returns false if already terminal.
    pub fn mark_generated(&mut self, lesson: Lesson) -> bool {
        if self.status().is_terminal() {
            return false;
        }
        self.state = RecordState::Generated(lesson);
        true
    }

    /// Moves a pending record to `Failed`. Returns false if already terminal.
    pub fn mark_failed(&mut self) -> bool {
        if self.status().is_terminal() {
            return false;
        }
        self.state = RecordState::Failed;
        true
    }
}

/// Wire shape of a record: `status` plus a nullable `lesson`.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordView {
    id: Uuid,
    topic: String,
    created_at: DateTime<Utc>,
    status: LessonStatus,
    lesson: Option<Lesson>,
}

impl From<GeneratedLessonRecord> for RecordView {
    fn from(record: GeneratedLessonRecord) -> Self {
        let status = record.status();
        let lesson = match record.state {
            RecordState::Generated(lesson) => Some(lesson),
            _ => None,
        };
        Self {
            id: record.id,
            topic: record.topic,
            created_at: record.created_at,
            status,
            lesson,
        }
    }
}

impl TryFrom<RecordView> for GeneratedLessonRecord {
    type Error = String;

    fn try_from(view: RecordView) -> Result<Self, Self::Error> {
        let state = match (view.status, view.lesson) {
            (LessonStatus::Pending, None) => RecordState::Pending,
            (LessonStatus::Failed, None) => RecordState::Failed,
            (LessonStatus::Generated, Some(lesson)) => RecordState::Generated(lesson),
            (status, lesson) => {
                return Err(format!(
                    "record with status '{}' cannot {} a lesson",
                    status,
                    if lesson.is_some() { "carry" } else { "omit" }
                ))
            }
        };
        Ok(Self {
            id: view.id,
            topic: view.topic,
            created_at: view.created_at,
            state,
        })
    }
}
