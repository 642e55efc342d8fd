//! Database schema and migrations for sharebox.
//!
//! Migrations are applied in order and recorded in `schema_version`.
//! Every statement is create-if-absent so a partially initialized store
//! can be brought up to date without touching existing rows.

/// Database migrations.
pub const MIGRATIONS: &[&str] = &[
    // v1: file records
    r#"
CREATE TABLE IF NOT EXISTS files (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id            INTEGER NOT NULL,
    external_file_ref   TEXT NOT NULL,          -- handle into the chat platform's file storage
    display_name        TEXT NOT NULL,
    file_category       TEXT NOT NULL,
    public_uuid         TEXT NOT NULL UNIQUE,
    created_at          TEXT NOT NULL,
    password_hash       TEXT,                   -- hex SHA-256, never plaintext
    is_protected        INTEGER NOT NULL DEFAULT 0,
    CHECK (is_protected = (password_hash IS NOT NULL))
);
"#,
    // v2: failed password attempts per (user, file)
    r#"
CREATE TABLE IF NOT EXISTS password_attempts (
    owner_id            INTEGER NOT NULL,
    public_uuid         TEXT NOT NULL,
    attempts            INTEGER NOT NULL DEFAULT 0 CHECK (attempts >= 0),
    last_attempt_at     TEXT,
    PRIMARY KEY (owner_id, public_uuid)
);
"#,
    // v3: lookup indexes
    r#"
CREATE INDEX IF NOT EXISTS idx_files_owner_id ON files(owner_id);
CREATE INDEX IF NOT EXISTS idx_password_attempts_public_uuid ON password_attempts(public_uuid);
"#,
];
