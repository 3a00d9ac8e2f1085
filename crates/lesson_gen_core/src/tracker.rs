//! crates/lesson_gen_core/src/tracker.rs
//!
//! The request tracker: one instance per UI session. It turns a submitted topic
//! into a `Pending` record, runs the generation in the background, and resolves
//! the record exactly once to `Generated` or `Failed`. Every failure is handled
//! here; nothing propagates further up.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::{GenerateLessonRequest, GeneratedLessonRecord, Lesson, LessonStatus};
use crate::ports::{LessonError, LessonGenerationService};

const EVENT_CHANNEL_CAPACITY: usize = 64;
const MAX_QUEUED_NOTIFICATIONS: usize = 20;

//=========================================================================================
// Notifications and Events
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationVariant {
    Destructive,
}

/// A non-blocking, user-visible message (a "toast").
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub variant: NotificationVariant,
}

impl Notification {
    pub fn missing_topic() -> Self {
        Self {
            title: "Error".to_string(),
            description: "Please enter a topic.".to_string(),
            variant: NotificationVariant::Destructive,
        }
    }

    pub fn generation_failed() -> Self {
        Self {
            title: "Failed to generate lesson".to_string(),
            description: "An error occurred while generating the lesson. Please try again."
                .to_string(),
            variant: NotificationVariant::Destructive,
        }
    }
}

/// Something a UI should re-render for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerEvent {
    RecordAdded(GeneratedLessonRecord),
    RecordUpdated(GeneratedLessonRecord),
    Notification(Notification),
}

//=========================================================================================
// The Tracker
//=========================================================================================

struct TrackerInner {
    generator: Arc<dyn LessonGenerationService>,
    /// Newest first.
    records: Mutex<Vec<GeneratedLessonRecord>>,
    notifications: Mutex<VecDeque<Notification>>,
    events: broadcast::Sender<TrackerEvent>,
    timeout: Option<Duration>,
}

/// Session-scoped, in-memory history of generation requests.
#[derive(Clone)]
pub struct LessonTracker {
    inner: Arc<TrackerInner>,
}

/// A submission that was accepted; the generation runs in the background.
pub struct PendingGeneration {
    pub record: GeneratedLessonRecord,
    handle: JoinHandle<LessonStatus>,
}

impl PendingGeneration {
    /// Waits for the record's terminal status.
    pub async fn wait(self) -> LessonStatus {
        self.handle.await.unwrap_or(LessonStatus::Failed)
    }
}

impl LessonTracker {
    pub fn new(generator: Arc<dyn LessonGenerationService>) -> Self {
        Self::with_timeout(generator, None)
    }

    /// A tracker whose provider calls fail after `timeout`, if one is given.
    pub fn with_timeout(
        generator: Arc<dyn LessonGenerationService>,
        timeout: Option<Duration>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(TrackerInner {
                generator,
                records: Mutex::new(Vec::new()),
                notifications: Mutex::new(VecDeque::new()),
                events,
                timeout,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.inner.events.subscribe()
    }

    /// All records, newest first.
    pub async fn history(&self) -> Vec<GeneratedLessonRecord> {
        self.inner.records.lock().await.clone()
    }

    pub async fn get(&self, id: Uuid) -> Option<GeneratedLessonRecord> {
        self.inner
            .records
            .lock()
            .await
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }

    /// Drains the notifications raised since the last call.
    pub async fn take_notifications(&self) -> Vec<Notification> {
        self.inner.notifications.lock().await.drain(..).collect()
    }

    /// Number of live event subscribers (open sockets).
    pub fn listener_count(&self) -> usize {
        self.inner.events.receiver_count()
    }

    /// Submits a topic for generation on behalf of the page.
    ///
    /// A blank topic creates no record and raises a validation notification.
    /// Otherwise a `Pending` record is prepended and the generation starts.
    pub async fn submit(&self, topic: &str) -> Result<PendingGeneration, LessonError> {
        let result = self.try_submit(topic).await;
        if matches!(result, Err(LessonError::Validation(_))) {
            self.inner.notify(Notification::missing_topic()).await;
        }
        result
    }

    /// Like `submit`, but a rejected topic is only reported to the caller.
    pub async fn try_submit(&self, topic: &str) -> Result<PendingGeneration, LessonError> {
        if topic.trim().is_empty() {
            return Err(LessonError::Validation(
                Notification::missing_topic().description,
            ));
        }

        let record = GeneratedLessonRecord::pending(topic);
        self.inner.records.lock().await.insert(0, record.clone());
        let _ = self.inner.events.send(TrackerEvent::RecordAdded(record.clone()));
        info!(record_id = %record.id, topic = %record.topic, "Lesson generation submitted");

        let inner = self.inner.clone();
        let id = record.id;
        let request = GenerateLessonRequest::new(record.topic.clone());
        let handle = tokio::spawn(async move {
            let worker = inner.clone();
            match tokio::spawn(async move { worker.run_generation(id, request).await }).await {
                Ok(status) => status,
                // A panicking generator still resolves its record.
                Err(e) => {
                    error!(record_id = %id, error = %e, "Lesson generation task aborted");
                    inner.resolve(id, None).await
                }
            }
        });

        Ok(PendingGeneration { record, handle })
    }
}

impl TrackerInner {
    async fn enqueue(&self, notification: Notification) {
        let mut queue = self.notifications.lock().await;
        if queue.len() == MAX_QUEUED_NOTIFICATIONS {
            queue.pop_front();
        }
        queue.push_back(notification);
    }

    async fn notify(&self, notification: Notification) {
        self.enqueue(notification.clone()).await;
        let _ = self.events.send(TrackerEvent::Notification(notification));
    }

    async fn run_generation(&self, id: Uuid, request: GenerateLessonRequest) -> LessonStatus {
        let call = self.generator.generate_lesson(&request);
        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.unwrap_or_else(|_| {
                Err(LessonError::Generation(format!(
                    "provider did not respond within {:?}",
                    limit
                )))
            }),
            None => call.await,
        };

        let outcome = result.and_then(|response| match response.lesson {
            Some(lesson) if !lesson.is_empty() => Ok(lesson),
            _ => Err(LessonError::Generation(
                "The generated lesson was empty.".to_string(),
            )),
        });

        match outcome {
            Ok(lesson) => self.resolve(id, Some(lesson)).await,
            Err(e) => {
                error!(record_id = %id, topic = %request.topic, error = %e, "Lesson generation failed");
                self.resolve(id, None).await
            }
        }
    }

    /// Applies the terminal transition for `id`. A second resolution is ignored.
    async fn resolve(&self, id: Uuid, lesson: Option<Lesson>) -> LessonStatus {
        let updated = {
            let mut records = self.records.lock().await;
            let Some(record) = records.iter_mut().find(|r| r.id == id) else {
                warn!(record_id = %id, "Generation finished for an unknown record");
                return LessonStatus::Failed;
            };
            let changed = match lesson {
                Some(lesson) => record.mark_generated(lesson),
                None => record.mark_failed(),
            };
            if !changed {
                warn!(record_id = %id, status = %record.status(), "Record already resolved");
                return record.status();
            }
            record.clone()
        };

        let status = updated.status();
        info!(record_id = %id, status = %status, "Lesson generation resolved");
        // Queued before the update goes out, so a re-render triggered by the
        // update already finds the notification.
        let failure = (status == LessonStatus::Failed).then(Notification::generation_failed);
        if let Some(notification) = &failure {
            self.enqueue(notification.clone()).await;
        }
        let _ = self.events.send(TrackerEvent::RecordUpdated(updated));
        if let Some(notification) = failure {
            let _ = self.events.send(TrackerEvent::Notification(notification));
        }
        status
    }
}

//=========================================================================================
// Topic Input
//=========================================================================================

/// The topic text field. It is cleared only when a submission is accepted.
#[derive(Debug, Clone, Default)]
pub struct TopicInput {
    value: String,
}

impl TopicInput {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Submit control disabled state: nothing but whitespace typed.
    pub fn is_blank(&self) -> bool {
        self.value.trim().is_empty()
    }

    pub async fn submit(&mut self, tracker: &LessonTracker) -> Result<PendingGeneration, LessonError> {
        let pending = tracker.submit(&self.value).await?;
        self.value.clear();
        Ok(pending)
    }
}
