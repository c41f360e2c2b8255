//! Telemetry: responses, funnel events, run logs, and usage counters.

use chrono::{Datelike, NaiveDate};
use rusqlite::{params, Connection, OptionalExtension};
use shared_types::{EventType, RunEventType, RunLog, TestEvent, TestResponse};
use uuid::Uuid;

use super::{now_ms, opt_uuid_from, ts_from_ms, uuid_from, Store};
use crate::error::StorageError;
use crate::types::{Funnel, FunnelStep, LeadPatch, NewResponse, StatsSnapshot};

const RESPONSE_COLUMNS: &str = "id, test_id, test_slug, user_id, user_username, result_title, \
     answers_json, lead_name, lead_phone, lead_email, lead_site, lead_form_submitted, \
     lead_site_clicked, created_at";

impl Store {
    /// Record a completed run. Lead fields are rejected unless the test's
    /// matching collection flags are enabled.
    pub fn create_response(
        &self,
        slug: &str,
        input: NewResponse,
    ) -> Result<TestResponse, StorageError> {
        self.with_tx(|tx| {
            let test_id = lookup_test_id(tx, slug)?.ok_or(StorageError::NotFound("test"))?;
            let test = super::tests_repo::load_test(tx, test_id)?
                .ok_or(StorageError::NotFound("test"))?;

            let offered = [
                (input.lead_name.is_some(), test.lead.lead_collect_name, "name"),
                (
                    input.lead_phone.is_some(),
                    test.lead.lead_collect_phone,
                    "phone",
                ),
                (
                    input.lead_email.is_some(),
                    test.lead.lead_collect_email,
                    "email",
                ),
                (input.lead_site.is_some(), test.lead.lead_collect_site, "site"),
            ];
            for (provided, collected, field) in offered {
                if provided && !(test.lead.lead_enabled && collected) {
                    return Err(StorageError::InvalidInput(format!(
                        "lead_{field} is not collected by this test"
                    )));
                }
            }
            let lead_form_submitted = offered.iter().any(|(provided, _, _)| *provided);

            let id = Uuid::new_v4();
            let created_at = now_ms();
            let answers_json = serde_json::to_string(&input.answers)
                .map_err(|e| StorageError::InvalidInput(format!("answers: {e}")))?;
            tx.execute(
                "INSERT INTO test_responses (id, test_id, test_slug, user_id, user_username, \
                 result_title, answers_json, lead_name, lead_phone, lead_email, lead_site, \
                 lead_form_submitted, lead_site_clicked, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, 0, ?13)",
                params![
                    id.to_string(),
                    test_id.to_string(),
                    slug,
                    input.user_id,
                    input.user_username,
                    input.result_title,
                    answers_json,
                    input.lead_name,
                    input.lead_phone,
                    input.lead_email,
                    input.lead_site,
                    lead_form_submitted,
                    created_at,
                ],
            )?;
            load_response(tx, id)?.ok_or(StorageError::NotFound("response"))
        })
    }

    /// Attach lead details to an existing response.
    pub fn update_response_lead(
        &self,
        response_id: Uuid,
        patch: LeadPatch,
    ) -> Result<TestResponse, StorageError> {
        self.with_tx(|tx| {
            if load_response(tx, response_id)?.is_none() {
                return Err(StorageError::NotFound("response"));
            }
            let id_str = response_id.to_string();

            macro_rules! set_field {
                ($field:ident, $column:literal) => {
                    if let Some(value) = &patch.$field {
                        tx.execute(
                            concat!(
                                "UPDATE test_responses SET ",
                                $column,
                                " = ?1 WHERE id = ?2"
                            ),
                            params![value, id_str],
                        )?;
                    }
                };
            }
            set_field!(lead_name, "lead_name");
            set_field!(lead_phone, "lead_phone");
            set_field!(lead_email, "lead_email");
            set_field!(lead_site, "lead_site");
            set_field!(lead_form_submitted, "lead_form_submitted");
            set_field!(lead_site_clicked, "lead_site_clicked");

            load_response(tx, response_id)?.ok_or(StorageError::NotFound("response"))
        })
    }

    /// Responses for one test, newest first.
    pub fn list_responses(&self, test_id: Uuid) -> Result<Vec<TestResponse>, StorageError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RESPONSE_COLUMNS} FROM test_responses WHERE test_id = ?1 \
                 ORDER BY created_at DESC, rowid DESC"
            ))?;
            let rows = stmt.query_map(params![test_id.to_string()], response_row)?;
            rows.map(|row| row?.try_into())
                .collect::<Result<Vec<_>, _>>()
        })
    }

    /// Record a granular funnel event. Unknown slugs are kept with a
    /// detached test id so late events survive deletion.
    pub fn record_event(
        &self,
        slug: &str,
        user_id: i64,
        event_type: EventType,
        question_index: Option<i64>,
    ) -> Result<TestEvent, StorageError> {
        self.with_tx(|tx| {
            let test_id = lookup_test_id(tx, slug)?;
            let id = Uuid::new_v4();
            let created_at = now_ms();
            tx.execute(
                "INSERT INTO test_events (id, test_id, test_slug, user_id, event_type, \
                 question_index, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    id.to_string(),
                    test_id.map(|t| t.to_string()),
                    slug,
                    user_id,
                    event_type.to_string(),
                    question_index,
                    created_at,
                ],
            )?;
            Ok(TestEvent {
                id,
                test_id,
                test_slug: slug.to_string(),
                user_id,
                event_type,
                question_index,
                created_at: ts_from_ms(created_at)?,
            })
        })
    }

    /// Record a coarse open/complete run log with source-chat attribution.
    pub fn record_run(
        &self,
        slug: &str,
        user_id: i64,
        event_type: RunEventType,
        source_chat_id: Option<i64>,
    ) -> Result<RunLog, StorageError> {
        self.with_tx(|tx| {
            let test_id = lookup_test_id(tx, slug)?;
            let id = Uuid::new_v4();
            let created_at = now_ms();
            tx.execute(
                "INSERT INTO run_logs (id, test_id, test_slug, user_id, event_type, \
                 source_chat_id, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    id.to_string(),
                    test_id.map(|t| t.to_string()),
                    slug,
                    user_id,
                    event_type.to_string(),
                    source_chat_id,
                    created_at,
                ],
            )?;
            Ok(RunLog {
                id,
                test_id,
                test_slug: slug.to_string(),
                user_id,
                event_type,
                source_chat_id,
                created_at: ts_from_ms(created_at)?,
            })
        })
    }

    /// Conversion funnel for one test: screen opens, per-question answer
    /// counts (always at least one step), lead submits, and site clicks.
    pub fn funnel(&self, test_id: Uuid) -> Result<Funnel, StorageError> {
        self.with_conn(|conn| {
            let slug: String = conn
                .query_row(
                    "SELECT slug FROM tests WHERE id = ?1",
                    params![test_id.to_string()],
                    |r| r.get(0),
                )
                .optional()?
                .ok_or(StorageError::NotFound("test"))?;
            let question_count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM questions WHERE test_id = ?1",
                params![test_id.to_string()],
                |r| r.get(0),
            )?;

            let count_events = |event_type: EventType| -> Result<i64, StorageError> {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM test_events WHERE test_slug = ?1 AND event_type = ?2",
                    params![slug, event_type.to_string()],
                    |r| r.get(0),
                )?)
            };

            let steps = 1..=question_count.max(1);
            let mut answers = Vec::new();
            for question_index in steps {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM test_events WHERE test_slug = ?1 \
                     AND event_type = ?2 AND question_index = ?3",
                    params![slug, EventType::Answer.to_string(), question_index],
                    |r| r.get(0),
                )?;
                answers.push(FunnelStep {
                    question_index,
                    count,
                });
            }

            Ok(Funnel {
                screen_opens: count_events(EventType::ScreenOpen)?,
                answers,
                lead_form_submits: count_events(EventType::LeadFormSubmit)?,
                site_clicks: count_events(EventType::SiteClick)?,
            })
        })
    }

    /// Platform-wide counters: all-time totals plus distinct active users
    /// for `day` and for the month containing it.
    pub fn stats(&self, day: NaiveDate) -> Result<StatsSnapshot, StorageError> {
        self.with_conn(|conn| {
            let (day_start, day_end) = day_range_ms(day)?;
            let (month_start, month_end) = month_range_ms(day)?;

            let total = |sql: &str| -> Result<i64, StorageError> {
                Ok(conn.query_row(sql, [], |r| r.get(0))?)
            };
            let runs_in =
                |event: RunEventType, start: i64, end: i64| -> Result<i64, StorageError> {
                    Ok(conn.query_row(
                        "SELECT COUNT(DISTINCT user_id) FROM run_logs \
                         WHERE event_type = ?1 AND created_at >= ?2 AND created_at < ?3",
                        params![event.to_string(), start, end],
                        |r| r.get(0),
                    )?)
                };
            let creators_in = |start: i64, end: i64| -> Result<i64, StorageError> {
                Ok(conn.query_row(
                    "SELECT COUNT(DISTINCT created_by) FROM tests \
                     WHERE created_at >= ?1 AND created_at < ?2",
                    params![start, end],
                    |r| r.get(0),
                )?)
            };

            Ok(StatsSnapshot {
                tests_created: total("SELECT COUNT(*) FROM tests")?,
                tests_completed: total(
                    "SELECT COUNT(*) FROM run_logs WHERE event_type = 'complete'",
                )?,
                tests_opened: total("SELECT COUNT(*) FROM run_logs WHERE event_type = 'open'")?,
                daily_created_users: creators_in(day_start, day_end)?,
                daily_opened_users: runs_in(RunEventType::Open, day_start, day_end)?,
                daily_completed_users: runs_in(RunEventType::Complete, day_start, day_end)?,
                monthly_created_users: creators_in(month_start, month_end)?,
                monthly_opened_users: runs_in(RunEventType::Open, month_start, month_end)?,
                monthly_completed_users: runs_in(RunEventType::Complete, month_start, month_end)?,
            })
        })
    }
}

fn lookup_test_id(conn: &Connection, slug: &str) -> Result<Option<Uuid>, StorageError> {
    let id: Option<String> = conn
        .query_row("SELECT id FROM tests WHERE slug = ?1", params![slug], |r| {
            r.get(0)
        })
        .optional()?;
    id.as_deref().map(uuid_from).transpose()
}

fn day_range_ms(day: NaiveDate) -> Result<(i64, i64), StorageError> {
    let next = day
        .succ_opt()
        .ok_or_else(|| StorageError::InvalidInput("date out of range".into()))?;
    Ok((midnight_ms(day), midnight_ms(next)))
}

fn month_range_ms(day: NaiveDate) -> Result<(i64, i64), StorageError> {
    let start = NaiveDate::from_ymd_opt(day.year(), day.month(), 1)
        .ok_or_else(|| StorageError::InvalidInput("date out of range".into()))?;
    let end = match day.month() {
        12 => NaiveDate::from_ymd_opt(day.year() + 1, 1, 1),
        m => NaiveDate::from_ymd_opt(day.year(), m + 1, 1),
    }
    .ok_or_else(|| StorageError::InvalidInput("date out of range".into()))?;
    Ok((midnight_ms(start), midnight_ms(end)))
}

fn midnight_ms(day: NaiveDate) -> i64 {
    day.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp_millis())
        .unwrap_or(0)
}

struct ResponseRow(
    (
        String,
        Option<String>,
        String,
        i64,
        Option<String>,
        Option<String>,
        String,
        Option<String>,
        Option<String>,
        Option<String>,
        Option<String>,
        bool,
        bool,
        i64,
    ),
);

fn response_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<ResponseRow> {
    Ok(ResponseRow((
        r.get(0)?,
        r.get(1)?,
        r.get(2)?,
        r.get(3)?,
        r.get(4)?,
        r.get(5)?,
        r.get(6)?,
        r.get(7)?,
        r.get(8)?,
        r.get(9)?,
        r.get(10)?,
        r.get(11)?,
        r.get(12)?,
        r.get(13)?,
    )))
}

impl TryFrom<ResponseRow> for TestResponse {
    type Error = StorageError;

    fn try_from(row: ResponseRow) -> Result<Self, Self::Error> {
        let (
            id,
            test_id,
            test_slug,
            user_id,
            user_username,
            result_title,
            answers_json,
            lead_name,
            lead_phone,
            lead_email,
            lead_site,
            lead_form_submitted,
            lead_site_clicked,
            created_at,
        ) = row.0;
        Ok(TestResponse {
            id: uuid_from(&id)?,
            test_id: opt_uuid_from(test_id.as_deref())?,
            test_slug,
            user_id,
            user_username,
            result_title,
            answers: serde_json::from_str(&answers_json)
                .map_err(|e| StorageError::corrupt(format!("answers json: {e}")))?,
            lead_name,
            lead_phone,
            lead_email,
            lead_site,
            lead_form_submitted,
            lead_site_clicked,
            created_at: ts_from_ms(created_at)?,
        })
    }
}

fn load_response(conn: &Connection, id: Uuid) -> Result<Option<TestResponse>, StorageError> {
    conn.query_row(
        &format!("SELECT {RESPONSE_COLUMNS} FROM test_responses WHERE id = ?1"),
        params![id.to_string()],
        response_row,
    )
    .optional()?
    .map(TestResponse::try_from)
    .transpose()
}
