//! # Core Domain Entities
//!
//! The entity clusters of the platform:
//!
//! - **Authoring**: `Test`, `Question`, `Answer`, `ResultCard`
//! - **Telemetry**: `TestResponse`, `TestEvent`, `RunLog`
//! - **Admin**: `AdminUser`, `AdminToken`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Kind of test the creator tool produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestType {
    /// One question, one answer picked.
    Single,
    /// Card-draw test: question-less answers, one card drawn.
    Cards,
    /// Ordered multi-question test.
    Multi,
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single => write!(f, "single"),
            Self::Cards => write!(f, "cards"),
            Self::Multi => write!(f, "multi"),
        }
    }
}

impl FromStr for TestType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "single" => Ok(Self::Single),
            "cards" => Ok(Self::Cards),
            "multi" => Ok(Self::Multi),
            _ => Err(UnknownVariant("test type")),
        }
    }
}

/// Fine-grained funnel event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    ScreenOpen,
    Answer,
    LeadFormSubmit,
    SiteClick,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ScreenOpen => write!(f, "screen_open"),
            Self::Answer => write!(f, "answer"),
            Self::LeadFormSubmit => write!(f, "lead_form_submit"),
            Self::SiteClick => write!(f, "site_click"),
        }
    }
}

impl FromStr for EventType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "screen_open" => Ok(Self::ScreenOpen),
            "answer" => Ok(Self::Answer),
            "lead_form_submit" => Ok(Self::LeadFormSubmit),
            "site_click" => Ok(Self::SiteClick),
            _ => Err(UnknownVariant("event type")),
        }
    }
}

/// Coarse run-log event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunEventType {
    Open,
    Complete,
}

impl fmt::Display for RunEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Complete => write!(f, "complete"),
        }
    }
}

impl FromStr for RunEventType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "complete" => Ok(Self::Complete),
            _ => Err(UnknownVariant("run event type")),
        }
    }
}

/// Admin account visibility scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdminScope {
    /// Sees every test on the platform.
    All,
    /// Sees only tests created by the bound owner username.
    Owner,
}

impl fmt::Display for AdminScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Owner => write!(f, "owner"),
        }
    }
}

impl FromStr for AdminScope {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "owner" => Ok(Self::Owner),
            _ => Err(UnknownVariant("admin scope")),
        }
    }
}

/// Parse error for the string-backed enums above.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unsupported {0}")]
pub struct UnknownVariant(pub &'static str);

/// Lead-capture configuration of a test.
///
/// A response's `lead_*` fields may only be populated when the matching
/// collection flag here is enabled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadSettings {
    #[serde(default)]
    pub lead_enabled: bool,
    #[serde(default)]
    pub lead_collect_name: bool,
    #[serde(default)]
    pub lead_collect_phone: bool,
    #[serde(default)]
    pub lead_collect_email: bool,
    #[serde(default)]
    pub lead_collect_site: bool,
    #[serde(default)]
    pub lead_site_url: Option<String>,
}

/// A test aggregate as stored and as served by the public API.
///
/// `questions` carry their own answers in display order; `answers` holds the
/// question-less answers of card-draw tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Test {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    #[serde(rename = "type")]
    pub test_type: TestType,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub bg_color: Option<String>,
    pub created_by: i64,
    #[serde(default)]
    pub created_by_username: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub lead: LeadSettings,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub answers: Vec<Answer>,
    #[serde(default)]
    pub results: Vec<ResultCard>,
}

/// An ordered question belonging to a test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,
    pub test_id: Uuid,
    pub order_num: i64,
    pub text: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub answers: Vec<Answer>,
}

/// An answer option. Belongs to a question (quiz flow) and/or maps to a
/// result card; card-draw tests use question-less answers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub id: Uuid,
    pub test_id: Uuid,
    #[serde(default)]
    pub question_id: Option<Uuid>,
    #[serde(default)]
    pub result_id: Option<Uuid>,
    pub order_num: i64,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub weight: Option<i64>,
    #[serde(default)]
    pub is_correct: Option<bool>,
    #[serde(default)]
    pub explanation_title: Option<String>,
    #[serde(default)]
    pub explanation_text: Option<String>,
}

/// An ordered outcome card of a test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultCard {
    pub id: Uuid,
    pub test_id: Uuid,
    pub order_num: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub min_score: Option<i64>,
    #[serde(default)]
    pub max_score: Option<i64>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// One completed run of a test. Survives test deletion via nullable FK.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResponse {
    pub id: Uuid,
    #[serde(default)]
    pub test_id: Option<Uuid>,
    pub test_slug: String,
    pub user_id: i64,
    #[serde(default)]
    pub user_username: Option<String>,
    #[serde(default)]
    pub result_title: Option<String>,
    /// Free-form answer map, keyed by question id or order number.
    #[serde(default)]
    pub answers: BTreeMap<String, String>,
    #[serde(default)]
    pub lead_name: Option<String>,
    #[serde(default)]
    pub lead_phone: Option<String>,
    #[serde(default)]
    pub lead_email: Option<String>,
    #[serde(default)]
    pub lead_site: Option<String>,
    #[serde(default)]
    pub lead_form_submitted: bool,
    #[serde(default)]
    pub lead_site_clicked: bool,
    pub created_at: DateTime<Utc>,
}

/// A granular funnel event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestEvent {
    pub id: Uuid,
    #[serde(default)]
    pub test_id: Option<Uuid>,
    pub test_slug: String,
    pub user_id: i64,
    pub event_type: EventType,
    #[serde(default)]
    pub question_index: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Coarse open/complete record with source-chat attribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunLog {
    pub id: Uuid,
    #[serde(default)]
    pub test_id: Option<Uuid>,
    pub test_slug: String,
    pub user_id: i64,
    pub event_type: RunEventType,
    #[serde(default)]
    pub source_chat_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Admin account. The password hash is `salt$hexdigest`
/// (PBKDF2-HMAC-SHA256) and never serialized outward.
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub scope: AdminScope,
    pub owner_username: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AdminUser {
    /// Username the admin's visibility is scoped to, if any.
    pub fn scope_owner(&self) -> Option<&str> {
        match self.scope {
            AdminScope::All => None,
            // The built-in "admin" account keeps full visibility.
            AdminScope::Owner if self.username == "admin" => None,
            AdminScope::Owner => Some(
                self.owner_username
                    .as_deref()
                    .unwrap_or(self.username.as_str()),
            ),
        }
    }
}

/// Server-side bearer token for an admin session.
#[derive(Debug, Clone)]
pub struct AdminToken {
    pub id: Uuid,
    pub admin_id: Uuid,
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl AdminToken {
    /// Whether the token is still usable at `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires) => expires > now,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_round_trips_through_str() {
        for raw in ["single", "cards", "multi"] {
            let parsed: TestType = raw.parse().unwrap();
            assert_eq!(parsed.to_string(), raw);
        }
        assert!("quiz".parse::<TestType>().is_err());
    }

    #[test]
    fn event_type_rejects_unknown_kind() {
        assert_eq!("answer".parse::<EventType>(), Ok(EventType::Answer));
        assert!("page_view".parse::<EventType>().is_err());
    }

    #[test]
    fn test_serializes_type_field_name() {
        let test = Test {
            id: Uuid::nil(),
            slug: "my-test".into(),
            title: "My test".into(),
            test_type: TestType::Single,
            description: None,
            is_public: true,
            bg_color: None,
            created_by: 42,
            created_by_username: None,
            created_at: Utc::now(),
            lead: LeadSettings::default(),
            questions: vec![],
            answers: vec![],
            results: vec![],
        };
        let json = serde_json::to_value(&test).unwrap();
        assert_eq!(json["type"], "single");
        assert_eq!(json["lead_enabled"], false);
    }

    #[test]
    fn expired_token_is_rejected() {
        let now = Utc::now();
        let token = AdminToken {
            id: Uuid::new_v4(),
            admin_id: Uuid::new_v4(),
            token: "t".into(),
            created_at: now,
            expires_at: Some(now - chrono::Duration::seconds(1)),
        };
        assert!(!token.is_valid_at(now));
    }

    #[test]
    fn owner_scope_falls_back_to_username() {
        let admin = AdminUser {
            id: Uuid::new_v4(),
            username: "acme".into(),
            password_hash: String::new(),
            scope: AdminScope::Owner,
            owner_username: None,
            created_at: Utc::now(),
        };
        assert_eq!(admin.scope_owner(), Some("acme"));
    }
}
