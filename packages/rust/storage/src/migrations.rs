//! SQL migration definitions for the session database.
//!
//! Migrations are applied in order on open. A migration records its own
//! version in `schema_migrations` as its last statement.

pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Initial schema: sessions",
            sql: r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- seq preserves first-insertion order; re-saving a session keeps its seq.
CREATE TABLE IF NOT EXISTS sessions (
    seq          INTEGER PRIMARY KEY AUTOINCREMENT,
    id           TEXT NOT NULL UNIQUE,
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL,
    payload_json TEXT NOT NULL
);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
        Migration {
            version: 2,
            description: "Session labels for listings",
            sql: r#"
ALTER TABLE sessions ADD COLUMN label TEXT;

INSERT INTO schema_migrations (version) VALUES (2);
"#,
        },
    ]
}
