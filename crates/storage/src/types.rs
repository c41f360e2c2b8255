//! Input payloads and aggregation outputs of the store.
//!
//! The `New*`/`*Patch` types deserialize straight from API request bodies;
//! the funnel/stats types serialize straight into API responses.

use serde::{Deserialize, Serialize};
use shared_types::{LeadSettings, TestType};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Payload for creating a test with its nested content.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTest {
    /// Explicit slug; when absent one is derived from the title.
    #[serde(default)]
    pub slug: Option<String>,
    pub title: String,
    #[serde(rename = "type")]
    pub test_type: TestType,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub bg_color: Option<String>,
    #[serde(flatten)]
    pub lead: LeadSettings,
    #[serde(default)]
    pub questions: Vec<NewQuestion>,
    /// Question-less answers (card-draw tests).
    #[serde(default)]
    pub answers: Vec<NewAnswer>,
    #[serde(default)]
    pub results: Vec<NewResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewQuestion {
    #[serde(default)]
    pub order_num: Option<i64>,
    pub text: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub answers: Vec<NewAnswer>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAnswer {
    #[serde(default)]
    pub order_num: Option<i64>,
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
    /// Index into the sibling `results` list of the same payload; resolved
    /// to the stored result id at insert time.
    #[serde(default)]
    pub result_index: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewResult {
    #[serde(default)]
    pub order_num: Option<i64>,
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

/// Partial update; `None` fields are left untouched. Nested collections,
/// when present, replace the stored ones wholesale.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TestPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_public: Option<bool>,
    #[serde(default)]
    pub bg_color: Option<String>,
    #[serde(default)]
    pub lead_enabled: Option<bool>,
    #[serde(default)]
    pub lead_collect_name: Option<bool>,
    #[serde(default)]
    pub lead_collect_phone: Option<bool>,
    #[serde(default)]
    pub lead_collect_email: Option<bool>,
    #[serde(default)]
    pub lead_collect_site: Option<bool>,
    #[serde(default)]
    pub lead_site_url: Option<String>,
    #[serde(default)]
    pub questions: Option<Vec<NewQuestion>>,
    #[serde(default)]
    pub answers: Option<Vec<NewAnswer>>,
    #[serde(default)]
    pub results: Option<Vec<NewResult>>,
}

/// Payload for recording a completed run.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewResponse {
    #[serde(default)]
    pub user_id: i64,
    #[serde(default)]
    pub user_username: Option<String>,
    #[serde(default)]
    pub result_title: Option<String>,
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
}

/// Partial lead update for an existing response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LeadPatch {
    #[serde(default)]
    pub lead_name: Option<String>,
    #[serde(default)]
    pub lead_phone: Option<String>,
    #[serde(default)]
    pub lead_email: Option<String>,
    #[serde(default)]
    pub lead_site: Option<String>,
    #[serde(default)]
    pub lead_form_submitted: Option<bool>,
    #[serde(default)]
    pub lead_site_clicked: Option<bool>,
}

/// Per-question step of the conversion funnel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunnelStep {
    pub question_index: i64,
    pub count: i64,
}

/// Aggregated funnel for one test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Funnel {
    pub screen_opens: i64,
    pub answers: Vec<FunnelStep>,
    pub lead_form_submits: i64,
    pub site_clicks: i64,
}

/// Platform-wide usage counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub tests_created: i64,
    pub tests_completed: i64,
    pub tests_opened: i64,
    pub daily_created_users: i64,
    pub daily_opened_users: i64,
    pub daily_completed_users: i64,
    pub monthly_created_users: i64,
    pub monthly_opened_users: i64,
    pub monthly_completed_users: i64,
}

/// Scope restriction applied to admin queries.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdminFilter<'a> {
    /// Restrict to tests created by this username.
    pub owner: Option<&'a str>,
}

impl<'a> AdminFilter<'a> {
    pub fn for_owner(owner: Option<&'a str>) -> Self {
        Self { owner }
    }
}

/// Resolved result-id mapping used while inserting nested answers.
#[derive(Debug, Default)]
pub(crate) struct ResultIds(pub Vec<Uuid>);

impl ResultIds {
    pub(crate) fn resolve(&self, index: Option<usize>) -> Option<Uuid> {
        index.and_then(|i| self.0.get(i).copied())
    }
}
