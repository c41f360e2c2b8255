//! Test CRUD: aggregates with nested questions/answers/results.

use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Transaction};
use shared_types::{Answer, LeadSettings, Question, ResultCard, Test};
use uuid::Uuid;

use super::{dense_order, now_ms, opt_uuid_from, ts_from_ms, uuid_from, Store};
use crate::error::StorageError;
use crate::slug::{slugify, unique_slug, UniqueSlugError};
use crate::types::{AdminFilter, NewAnswer, NewQuestion, NewResult, NewTest, ResultIds, TestPatch};

const TEST_COLUMNS: &str = "id, slug, title, test_type, description, is_public, bg_color, \
     created_by, created_by_username, lead_enabled, lead_collect_name, lead_collect_phone, \
     lead_collect_email, lead_collect_site, lead_site_url, created_at";

impl Store {
    /// Create a test with its nested content. When no slug is supplied one
    /// is derived from the title via the uniqueness loop; an explicit slug
    /// that is already in use fails with [`StorageError::SlugTaken`].
    pub fn create_test(
        &self,
        created_by: i64,
        created_by_username: Option<&str>,
        input: NewTest,
    ) -> Result<Test, StorageError> {
        self.with_tx(|tx| {
            let slug = match input.slug.as_deref().filter(|s| !s.is_empty()) {
                Some(explicit) => {
                    if slug_taken_in(tx, explicit)? {
                        return Err(StorageError::SlugTaken);
                    }
                    explicit.to_string()
                }
                None => unique_slug(&slugify(&input.title), |candidate| {
                    slug_taken_in(tx, candidate)
                })
                .map_err(|e| match e {
                    UniqueSlugError::Lookup(inner) => inner,
                    UniqueSlugError::Exhausted => {
                        StorageError::InvalidInput("could not derive a unique slug".into())
                    }
                })?,
            };

            let id = Uuid::new_v4();
            let created_at = now_ms();
            tx.execute(
                "INSERT INTO tests (id, slug, title, test_type, description, is_public, bg_color, \
                 created_by, created_by_username, lead_enabled, lead_collect_name, \
                 lead_collect_phone, lead_collect_email, lead_collect_site, lead_site_url, \
                 created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                params![
                    id.to_string(),
                    slug,
                    input.title,
                    input.test_type.to_string(),
                    input.description,
                    input.is_public,
                    input.bg_color,
                    created_by,
                    created_by_username,
                    input.lead.lead_enabled,
                    input.lead.lead_collect_name,
                    input.lead.lead_collect_phone,
                    input.lead.lead_collect_email,
                    input.lead.lead_collect_site,
                    input.lead.lead_site_url,
                    created_at,
                ],
            )
            .map_err(map_unique_violation)?;

            let result_ids = insert_results(tx, id, input.results)?;
            insert_questions(tx, id, input.questions, &result_ids)?;
            insert_card_answers(tx, id, input.answers, &result_ids)?;

            load_test(tx, id)?.ok_or(StorageError::NotFound("test"))
        })
    }

    pub fn get_test(&self, id: Uuid) -> Result<Test, StorageError> {
        self.with_conn(|conn| load_test(conn, id)?.ok_or(StorageError::NotFound("test")))
    }

    /// Fetch a test, honoring an admin visibility filter.
    pub fn get_test_scoped(
        &self,
        id: Uuid,
        filter: AdminFilter<'_>,
    ) -> Result<Test, StorageError> {
        let test = self.get_test(id)?;
        match filter.owner {
            Some(owner) if test.created_by_username.as_deref() != Some(owner) => {
                Err(StorageError::NotFound("test"))
            }
            _ => Ok(test),
        }
    }

    pub fn get_test_by_slug(&self, slug: &str) -> Result<Test, StorageError> {
        self.with_conn(|conn| {
            let id: Option<String> = conn
                .query_row("SELECT id FROM tests WHERE slug = ?1", params![slug], |r| {
                    r.get(0)
                })
                .optional()?;
            match id {
                Some(id) => load_test(conn, uuid_from(&id)?)?.ok_or(StorageError::NotFound("test")),
                None => Err(StorageError::NotFound("test")),
            }
        })
    }

    /// All tests, newest first, optionally restricted to one owner.
    pub fn list_tests(&self, filter: AdminFilter<'_>) -> Result<Vec<Test>, StorageError> {
        self.with_conn(|conn| {
            let ids: Vec<String> = match filter.owner {
                Some(owner) => {
                    let mut stmt = conn.prepare(
                        "SELECT id FROM tests WHERE created_by_username = ?1 \
                         ORDER BY created_at DESC, rowid DESC",
                    )?;
                    let rows = stmt.query_map(params![owner], |r| r.get(0))?;
                    rows.collect::<Result<_, _>>()?
                }
                None => {
                    let mut stmt =
                        conn.prepare("SELECT id FROM tests ORDER BY created_at DESC, rowid DESC")?;
                    let rows = stmt.query_map([], |r| r.get(0))?;
                    rows.collect::<Result<_, _>>()?
                }
            };
            let mut tests = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(test) = load_test(conn, uuid_from(&id)?)? {
                    tests.push(test);
                }
            }
            Ok(tests)
        })
    }

    /// Partial update. Nested collections, when present, replace the stored
    /// ones wholesale; answers bound to replaced results are detached by the
    /// `ON DELETE SET NULL` foreign key.
    pub fn update_test(&self, id: Uuid, patch: TestPatch) -> Result<Test, StorageError> {
        self.with_tx(|tx| {
            if load_test(tx, id)?.is_none() {
                return Err(StorageError::NotFound("test"));
            }
            let id_str = id.to_string();

            macro_rules! set_field {
                ($field:ident, $column:literal) => {
                    if let Some(value) = &patch.$field {
                        tx.execute(
                            concat!("UPDATE tests SET ", $column, " = ?1 WHERE id = ?2"),
                            params![value, id_str],
                        )?;
                    }
                };
            }
            set_field!(title, "title");
            set_field!(description, "description");
            set_field!(is_public, "is_public");
            set_field!(bg_color, "bg_color");
            set_field!(lead_enabled, "lead_enabled");
            set_field!(lead_collect_name, "lead_collect_name");
            set_field!(lead_collect_phone, "lead_collect_phone");
            set_field!(lead_collect_email, "lead_collect_email");
            set_field!(lead_collect_site, "lead_collect_site");
            set_field!(lead_site_url, "lead_site_url");

            let result_ids = match patch.results {
                Some(results) => {
                    tx.execute("DELETE FROM results WHERE test_id = ?1", params![id_str])?;
                    insert_results(tx, id, results)?
                }
                None => ResultIds::default(),
            };
            if let Some(questions) = patch.questions {
                tx.execute("DELETE FROM questions WHERE test_id = ?1", params![id_str])?;
                tx.execute(
                    "DELETE FROM answers WHERE test_id = ?1 AND question_id IS NOT NULL",
                    params![id_str],
                )?;
                insert_questions(tx, id, questions, &result_ids)?;
            }
            if let Some(answers) = patch.answers {
                tx.execute(
                    "DELETE FROM answers WHERE test_id = ?1 AND question_id IS NULL",
                    params![id_str],
                )?;
                insert_card_answers(tx, id, answers, &result_ids)?;
            }

            load_test(tx, id)?.ok_or(StorageError::NotFound("test"))
        })
    }

    /// Delete a test; content cascades, telemetry detaches.
    pub fn delete_test(&self, id: Uuid) -> Result<(), StorageError> {
        self.with_tx(|tx| {
            let affected = tx.execute("DELETE FROM tests WHERE id = ?1", params![id.to_string()])?;
            if affected == 0 {
                return Err(StorageError::NotFound("test"));
            }
            Ok(())
        })
    }

    pub fn slug_taken(&self, slug: &str) -> Result<bool, StorageError> {
        self.with_conn(|conn| slug_taken_in(conn, slug))
    }
}

fn map_unique_violation(err: rusqlite::Error) -> StorageError {
    match err.sqlite_error_code() {
        Some(ErrorCode::ConstraintViolation) => StorageError::SlugTaken,
        _ => StorageError::Sql(err),
    }
}

pub(super) fn slug_taken_in(conn: &Connection, slug: &str) -> Result<bool, StorageError> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM tests WHERE slug = ?1)",
        params![slug],
        |r| r.get(0),
    )?;
    Ok(exists != 0)
}

fn insert_results(
    tx: &Transaction<'_>,
    test_id: Uuid,
    results: Vec<NewResult>,
) -> Result<ResultIds, StorageError> {
    let mut ids = ResultIds::default();
    for (order_num, result) in dense_order(results, |r| r.order_num) {
        let id = Uuid::new_v4();
        tx.execute(
            "INSERT INTO results (id, test_id, order_num, title, description, min_score, \
             max_score, image_url) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                id.to_string(),
                test_id.to_string(),
                order_num,
                result.title,
                result.description,
                result.min_score,
                result.max_score,
                result.image_url,
            ],
        )?;
        ids.0.push(id);
    }
    Ok(ids)
}

fn insert_questions(
    tx: &Transaction<'_>,
    test_id: Uuid,
    questions: Vec<NewQuestion>,
    result_ids: &ResultIds,
) -> Result<(), StorageError> {
    for (order_num, question) in dense_order(questions, |q| q.order_num) {
        let question_id = Uuid::new_v4();
        tx.execute(
            "INSERT INTO questions (id, test_id, order_num, text, image_url) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                question_id.to_string(),
                test_id.to_string(),
                order_num,
                question.text,
                question.image_url,
            ],
        )?;
        insert_answers(tx, test_id, Some(question_id), question.answers, result_ids)?;
    }
    Ok(())
}

fn insert_card_answers(
    tx: &Transaction<'_>,
    test_id: Uuid,
    answers: Vec<NewAnswer>,
    result_ids: &ResultIds,
) -> Result<(), StorageError> {
    insert_answers(tx, test_id, None, answers, result_ids)
}

fn insert_answers(
    tx: &Transaction<'_>,
    test_id: Uuid,
    question_id: Option<Uuid>,
    answers: Vec<NewAnswer>,
    result_ids: &ResultIds,
) -> Result<(), StorageError> {
    for (order_num, answer) in dense_order(answers, |a| a.order_num) {
        let result_id = result_ids.resolve(answer.result_index);
        tx.execute(
            "INSERT INTO answers (id, test_id, question_id, result_id, order_num, text, \
             image_url, weight, is_correct, explanation_title, explanation_text) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                Uuid::new_v4().to_string(),
                test_id.to_string(),
                question_id.map(|q| q.to_string()),
                result_id.map(|r| r.to_string()),
                order_num,
                answer.text,
                answer.image_url,
                answer.weight,
                answer.is_correct,
                answer.explanation_title,
                answer.explanation_text,
            ],
        )?;
    }
    Ok(())
}

struct TestRow {
    id: String,
    slug: String,
    title: String,
    test_type: String,
    description: Option<String>,
    is_public: bool,
    bg_color: Option<String>,
    created_by: i64,
    created_by_username: Option<String>,
    lead_enabled: bool,
    lead_collect_name: bool,
    lead_collect_phone: bool,
    lead_collect_email: bool,
    lead_collect_site: bool,
    lead_site_url: Option<String>,
    created_at: i64,
}

pub(super) fn load_test(conn: &Connection, id: Uuid) -> Result<Option<Test>, StorageError> {
    let row = conn
        .query_row(
            &format!("SELECT {TEST_COLUMNS} FROM tests WHERE id = ?1"),
            params![id.to_string()],
            |r| {
                Ok(TestRow {
                    id: r.get(0)?,
                    slug: r.get(1)?,
                    title: r.get(2)?,
                    test_type: r.get(3)?,
                    description: r.get(4)?,
                    is_public: r.get(5)?,
                    bg_color: r.get(6)?,
                    created_by: r.get(7)?,
                    created_by_username: r.get(8)?,
                    lead_enabled: r.get(9)?,
                    lead_collect_name: r.get(10)?,
                    lead_collect_phone: r.get(11)?,
                    lead_collect_email: r.get(12)?,
                    lead_collect_site: r.get(13)?,
                    lead_site_url: r.get(14)?,
                    created_at: r.get(15)?,
                })
            },
        )
        .optional()?;
    let Some(row) = row else { return Ok(None) };

    let test_id = uuid_from(&row.id)?;
    let questions = load_questions(conn, test_id)?;
    let answers = load_answers(conn, "test_id = ?1 AND question_id IS NULL", &row.id)?;
    let results = load_results(conn, test_id)?;

    Ok(Some(Test {
        id: test_id,
        slug: row.slug,
        title: row.title,
        test_type: row
            .test_type
            .parse()
            .map_err(|_| StorageError::corrupt(format!("test type: {}", row.test_type)))?,
        description: row.description,
        is_public: row.is_public,
        bg_color: row.bg_color,
        created_by: row.created_by,
        created_by_username: row.created_by_username,
        created_at: ts_from_ms(row.created_at)?,
        lead: LeadSettings {
            lead_enabled: row.lead_enabled,
            lead_collect_name: row.lead_collect_name,
            lead_collect_phone: row.lead_collect_phone,
            lead_collect_email: row.lead_collect_email,
            lead_collect_site: row.lead_collect_site,
            lead_site_url: row.lead_site_url,
        },
        questions,
        answers,
        results,
    }))
}

fn load_questions(conn: &Connection, test_id: Uuid) -> Result<Vec<Question>, StorageError> {
    let mut stmt = conn.prepare(
        "SELECT id, test_id, order_num, text, image_url FROM questions \
         WHERE test_id = ?1 ORDER BY order_num",
    )?;
    let rows = stmt.query_map(params![test_id.to_string()], |r| {
        Ok((
            r.get::<_, String>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, i64>(2)?,
            r.get::<_, String>(3)?,
            r.get::<_, Option<String>>(4)?,
        ))
    })?;

    let mut questions = Vec::new();
    for row in rows {
        let (id, test_id_str, order_num, text, image_url) = row?;
        let question_id = uuid_from(&id)?;
        let answers = load_answers(conn, "question_id = ?1", &id)?;
        questions.push(Question {
            id: question_id,
            test_id: uuid_from(&test_id_str)?,
            order_num,
            text,
            image_url,
            answers,
        });
    }
    Ok(questions)
}

fn load_answers(
    conn: &Connection,
    where_clause: &str,
    param: &str,
) -> Result<Vec<Answer>, StorageError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, test_id, question_id, result_id, order_num, text, image_url, weight, \
         is_correct, explanation_title, explanation_text FROM answers \
         WHERE {where_clause} ORDER BY order_num"
    ))?;
    let rows = stmt.query_map(params![param], |r| {
        Ok((
            r.get::<_, String>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, Option<String>>(2)?,
            r.get::<_, Option<String>>(3)?,
            r.get::<_, i64>(4)?,
            r.get::<_, Option<String>>(5)?,
            r.get::<_, Option<String>>(6)?,
            r.get::<_, Option<i64>>(7)?,
            r.get::<_, Option<bool>>(8)?,
            r.get::<_, Option<String>>(9)?,
            r.get::<_, Option<String>>(10)?,
        ))
    })?;

    let mut answers = Vec::new();
    for row in rows {
        let (
            id,
            test_id,
            question_id,
            result_id,
            order_num,
            text,
            image_url,
            weight,
            is_correct,
            explanation_title,
            explanation_text,
        ) = row?;
        answers.push(Answer {
            id: uuid_from(&id)?,
            test_id: uuid_from(&test_id)?,
            question_id: opt_uuid_from(question_id.as_deref())?,
            result_id: opt_uuid_from(result_id.as_deref())?,
            order_num,
            text,
            image_url,
            weight,
            is_correct,
            explanation_title,
            explanation_text,
        });
    }
    Ok(answers)
}

fn load_results(conn: &Connection, test_id: Uuid) -> Result<Vec<ResultCard>, StorageError> {
    let mut stmt = conn.prepare(
        "SELECT id, test_id, order_num, title, description, min_score, max_score, image_url \
         FROM results WHERE test_id = ?1 ORDER BY order_num",
    )?;
    let rows = stmt.query_map(params![test_id.to_string()], |r| {
        Ok((
            r.get::<_, String>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, i64>(2)?,
            r.get::<_, String>(3)?,
            r.get::<_, Option<String>>(4)?,
            r.get::<_, Option<i64>>(5)?,
            r.get::<_, Option<i64>>(6)?,
            r.get::<_, Option<String>>(7)?,
        ))
    })?;

    let mut results = Vec::new();
    for row in rows {
        let (id, test_id, order_num, title, description, min_score, max_score, image_url) = row?;
        results.push(ResultCard {
            id: uuid_from(&id)?,
            test_id: uuid_from(&test_id)?,
            order_num,
            title,
            description,
            min_score,
            max_score,
            image_url,
        });
    }
    Ok(results)
}
