//! SQL migration definitions for the blogsmith run index.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a set of SQL statements executed within a transaction.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: workflows, tone_profiles",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- One row per workflow run
CREATE TABLE IF NOT EXISTS workflows (
    id          TEXT PRIMARY KEY,
    keywords    TEXT NOT NULL,
    status      TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_workflows_status ON workflows(status);

-- Tone profiles cached by reference-document content hash
CREATE TABLE IF NOT EXISTS tone_profiles (
    content_hash TEXT NOT NULL,
    model_id     TEXT NOT NULL,
    profile_json TEXT NOT NULL,
    created_at   TEXT NOT NULL,
    PRIMARY KEY (content_hash, model_id)
);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
