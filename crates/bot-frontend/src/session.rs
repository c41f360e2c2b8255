//! In-memory run sessions, keyed by user id. Last write wins.

use dashmap::DashMap;
use shared_types::Test;

/// State of one user's in-chat test run.
#[derive(Debug, Clone)]
pub struct RunSession {
    pub test: Test,
    /// Index into `test.questions` for the next question to ask.
    pub question_index: usize,
    /// Accumulated score from answer weights.
    pub score: i64,
    /// Result ids voted for by picked answers.
    pub picked_results: Vec<uuid::Uuid>,
    pub source_chat_id: Option<i64>,
}

impl RunSession {
    pub fn new(test: Test, source_chat_id: Option<i64>) -> Self {
        Self {
            test,
            question_index: 0,
            score: 0,
            picked_results: Vec::new(),
            source_chat_id,
        }
    }
}

/// Shared session map. Starting a new run replaces whatever run the user
/// had in flight.
#[derive(Default)]
pub struct SessionStore {
    sessions: DashMap<i64, RunSession>,
}

impl SessionStore {
    pub fn start(&self, user_id: i64, session: RunSession) {
        self.sessions.insert(user_id, session);
    }

    pub fn take(&self, user_id: i64) -> Option<RunSession> {
        self.sessions.remove(&user_id).map(|(_, session)| session)
    }

    pub fn put_back(&self, user_id: i64, session: RunSession) {
        self.sessions.insert(user_id, session);
    }

    pub fn end(&self, user_id: i64) {
        self.sessions.remove(&user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shared_types::{LeadSettings, TestType};
    use uuid::Uuid;

    fn test_named(slug: &str) -> Test {
        Test {
            id: Uuid::new_v4(),
            slug: slug.into(),
            title: slug.into(),
            test_type: TestType::Single,
            description: None,
            is_public: true,
            bg_color: None,
            created_by: 1,
            created_by_username: None,
            created_at: Utc::now(),
            lead: LeadSettings::default(),
            questions: vec![],
            answers: vec![],
            results: vec![],
        }
    }

    #[test]
    fn restart_replaces_the_previous_run() {
        let store = SessionStore::default();
        store.start(42, RunSession::new(test_named("first"), None));
        store.start(42, RunSession::new(test_named("second"), Some(-1)));

        let session = store.take(42).unwrap();
        assert_eq!(session.test.slug, "second");
        assert_eq!(session.source_chat_id, Some(-1));
        assert!(store.take(42).is_none());
    }
}
