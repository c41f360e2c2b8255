//! SQLite schema. Applied idempotently on every open.
//!
//! Timestamps are Unix milliseconds. Content rows cascade with their test;
//! responses, events, and run logs detach (`ON DELETE SET NULL`) so
//! telemetry survives deletion.

pub(crate) const SCHEMA: &str = r#"
PRAGMA journal_mode=WAL;
PRAGMA synchronous=NORMAL;
PRAGMA foreign_keys=ON;

CREATE TABLE IF NOT EXISTS tests (
  id TEXT PRIMARY KEY,
  slug TEXT NOT NULL UNIQUE,
  title TEXT NOT NULL,
  test_type TEXT NOT NULL,
  description TEXT,
  is_public INTEGER NOT NULL DEFAULT 0,
  bg_color TEXT,
  created_by INTEGER NOT NULL,
  created_by_username TEXT,
  lead_enabled INTEGER NOT NULL DEFAULT 0,
  lead_collect_name INTEGER NOT NULL DEFAULT 0,
  lead_collect_phone INTEGER NOT NULL DEFAULT 0,
  lead_collect_email INTEGER NOT NULL DEFAULT 0,
  lead_collect_site INTEGER NOT NULL DEFAULT 0,
  lead_site_url TEXT,
  created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS questions (
  id TEXT PRIMARY KEY,
  test_id TEXT NOT NULL REFERENCES tests(id) ON DELETE CASCADE,
  order_num INTEGER NOT NULL,
  text TEXT NOT NULL,
  image_url TEXT
);
CREATE INDEX IF NOT EXISTS ix_questions_test_id ON questions(test_id);

CREATE TABLE IF NOT EXISTS results (
  id TEXT PRIMARY KEY,
  test_id TEXT NOT NULL REFERENCES tests(id) ON DELETE CASCADE,
  order_num INTEGER NOT NULL,
  title TEXT NOT NULL,
  description TEXT,
  min_score INTEGER,
  max_score INTEGER,
  image_url TEXT
);
CREATE INDEX IF NOT EXISTS ix_results_test_id ON results(test_id);

CREATE TABLE IF NOT EXISTS answers (
  id TEXT PRIMARY KEY,
  test_id TEXT NOT NULL REFERENCES tests(id) ON DELETE CASCADE,
  question_id TEXT REFERENCES questions(id) ON DELETE CASCADE,
  result_id TEXT REFERENCES results(id) ON DELETE SET NULL,
  order_num INTEGER NOT NULL,
  text TEXT,
  image_url TEXT,
  weight INTEGER,
  is_correct INTEGER,
  explanation_title TEXT,
  explanation_text TEXT
);
CREATE INDEX IF NOT EXISTS ix_answers_test_id ON answers(test_id);
CREATE INDEX IF NOT EXISTS ix_answers_question_id ON answers(question_id);

CREATE TABLE IF NOT EXISTS test_responses (
  id TEXT PRIMARY KEY,
  test_id TEXT REFERENCES tests(id) ON DELETE SET NULL,
  test_slug TEXT NOT NULL,
  user_id INTEGER NOT NULL DEFAULT 0,
  user_username TEXT,
  result_title TEXT,
  answers_json TEXT NOT NULL DEFAULT '{}',
  lead_name TEXT,
  lead_phone TEXT,
  lead_email TEXT,
  lead_site TEXT,
  lead_form_submitted INTEGER NOT NULL DEFAULT 0,
  lead_site_clicked INTEGER NOT NULL DEFAULT 0,
  created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS ix_test_responses_test_slug ON test_responses(test_slug);

CREATE TABLE IF NOT EXISTS test_events (
  id TEXT PRIMARY KEY,
  test_id TEXT REFERENCES tests(id) ON DELETE SET NULL,
  test_slug TEXT NOT NULL,
  user_id INTEGER NOT NULL DEFAULT 0,
  event_type TEXT NOT NULL,
  question_index INTEGER,
  created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS ix_test_events_test_slug ON test_events(test_slug);

CREATE TABLE IF NOT EXISTS run_logs (
  id TEXT PRIMARY KEY,
  test_id TEXT REFERENCES tests(id) ON DELETE SET NULL,
  test_slug TEXT NOT NULL,
  user_id INTEGER NOT NULL DEFAULT 0,
  event_type TEXT NOT NULL,
  source_chat_id INTEGER,
  created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS ix_run_logs_test_slug ON run_logs(test_slug);

CREATE TABLE IF NOT EXISTS admin_users (
  id TEXT PRIMARY KEY,
  username TEXT NOT NULL UNIQUE,
  password_hash TEXT NOT NULL,
  scope TEXT NOT NULL DEFAULT 'all',
  owner_username TEXT,
  created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS admin_tokens (
  id TEXT PRIMARY KEY,
  admin_id TEXT NOT NULL REFERENCES admin_users(id) ON DELETE CASCADE,
  token TEXT NOT NULL UNIQUE,
  created_at INTEGER NOT NULL,
  expires_at INTEGER
);
CREATE INDEX IF NOT EXISTS ix_admin_tokens_admin_id ON admin_tokens(admin_id);
"#;
