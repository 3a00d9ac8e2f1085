//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the per-browser session trackers.

use crate::config::Config;
use lesson_gen_core::{
    ports::{LessonGenerationService, LessonImprovementService},
    tracker::LessonTracker,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

/// Identifies one browser session; carried in the session cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub Uuid);

struct Session {
    tracker: LessonTracker,
    last_seen: Instant,
}

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
pub struct AppState {
    pub config: Arc<Config>,
    pub generator: Arc<dyn LessonGenerationService>,
    pub improver: Arc<dyn LessonImprovementService>,
    /// One tracker per browser session. In memory only; lost on restart.
    sessions: Mutex<HashMap<SessionId, Session>>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        generator: Arc<dyn LessonGenerationService>,
        improver: Arc<dyn LessonImprovementService>,
    ) -> Self {
        Self {
            config,
            generator,
            improver,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the session's tracker if it has one. Read-only routes use this,
    /// so they never allocate state for a client that drops its cookie.
    pub async fn find_tracker(&self, session: SessionId) -> Option<LessonTracker> {
        let mut sessions = self.sessions.lock().await;
        sessions.get_mut(&session).map(|entry| {
            entry.last_seen = Instant::now();
            entry.tracker.clone()
        })
    }

    /// Returns the session's tracker, creating an empty one on first use.
    pub async fn tracker_for(&self, session: SessionId) -> LessonTracker {
        let mut sessions = self.sessions.lock().await;
        if let Some(entry) = sessions.get_mut(&session) {
            entry.last_seen = Instant::now();
            return entry.tracker.clone();
        }

        self.evict_idle(&mut sessions);
        info!(session_id = %session.0, "Starting new lesson history");
        let tracker =
            LessonTracker::with_timeout(self.generator.clone(), self.config.generation_timeout);
        sessions.insert(
            session,
            Session {
                tracker: tracker.clone(),
                last_seen: Instant::now(),
            },
        );
        tracker
    }

    /// Drops sessions idle for longer than the configured limit. A session with
    /// an open socket is kept.
    fn evict_idle(&self, sessions: &mut HashMap<SessionId, Session>) {
        let limit = self.config.session_idle_timeout;
        let before = sessions.len();
        sessions.retain(|_, entry| {
            entry.last_seen.elapsed() < limit || entry.tracker.listener_count() > 0
        });
        if sessions.len() < before {
            debug!(
                evicted = before - sessions.len(),
                remaining = sessions.len(),
                "Evicted idle sessions"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lesson_gen_core::{
        domain::{
            GenerateLessonRequest, GenerateLessonResponse, ImproveLessonRequest,
            ImproveLessonResponse,
        },
        ports::LessonError,
    };

    struct Unused;

    #[async_trait]
    impl LessonGenerationService for Unused {
        async fn generate_lesson(
            &self,
            _request: &GenerateLessonRequest,
        ) -> Result<GenerateLessonResponse, LessonError> {
            Err(LessonError::Generation("unused".to_string()))
        }
    }

    #[async_trait]
    impl LessonImprovementService for Unused {
        async fn improve_lesson(
            &self,
            _request: &ImproveLessonRequest,
        ) -> Result<ImproveLessonResponse, LessonError> {
            Err(LessonError::Generation("unused".to_string()))
        }
    }

    fn state(idle_secs: &str) -> AppState {
        let config = Config::from_lookup(|name| match name {
            "OPENAI_API_KEY" => Some("sk-test".to_string()),
            "SESSION_IDLE_SECS" => Some(idle_secs.to_string()),
            _ => None,
        })
        .unwrap();
        AppState::new(Arc::new(config), Arc::new(Unused), Arc::new(Unused))
    }

    fn new_session() -> SessionId {
        SessionId(Uuid::new_v4())
    }

    #[tokio::test]
    async fn lookups_do_not_create_sessions() {
        let state = state("3600");
        for _ in 0..100 {
            assert!(state.find_tracker(new_session()).await.is_none());
        }
        assert!(state.sessions.lock().await.is_empty());
    }

    #[tokio::test]
    async fn tracker_is_reused_within_a_session() {
        let state = state("3600");
        let session = new_session();

        let tracker = state.tracker_for(session).await;
        tracker.try_submit("Tides").await.unwrap();

        let again = state.find_tracker(session).await.unwrap();
        assert_eq!(again.history().await.len(), 1);
        assert_eq!(state.sessions.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn idle_sessions_are_evicted_unless_listening() {
        let state = state("0");
        let idle = new_session();
        let listening = new_session();

        state.tracker_for(idle).await;
        let _events = state.tracker_for(listening).await.subscribe();
        state.tracker_for(new_session()).await;

        let sessions = state.sessions.lock().await;
        assert!(!sessions.contains_key(&idle));
        assert!(sessions.contains_key(&listening));
        assert_eq!(sessions.len(), 2);
    }
}
