pub mod domain;
pub mod flows;
pub mod ports;
pub mod prompt;
pub mod tracker;

pub use domain::{
    GenerateLessonRequest, GenerateLessonResponse, GeneratedLessonRecord, ImproveLessonRequest,
    ImproveLessonResponse, Lesson, LessonSection, LessonStatus,
};
pub use flows::{GenerateLessonFlow, ImproveLessonFlow};
pub use ports::{
    LessonError, LessonGenerationService, LessonImprovementService, ModelProvider, PortError,
    PortResult,
};
pub use prompt::{OutputSchema, PromptFlow, PromptTemplate};
pub use tracker::{LessonTracker, Notification, PendingGeneration, TopicInput, TrackerEvent};
