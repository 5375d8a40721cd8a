//! SQL schema for the IdeaFrame SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    user_id       TEXT PRIMARY KEY,
    login         TEXT NOT NULL UNIQUE,
    display_name  TEXT NOT NULL,
    email         TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    created_at    TEXT NOT NULL
);

-- weight is derived from value/speed/cost and rewritten on every score change.
-- Rows are never physically deleted; is_deleted hides them from every read.
CREATE TABLE IF NOT EXISTS initiatives (
    initiative_id TEXT PRIMARY KEY,
    title         TEXT NOT NULL,
    description   TEXT,
    author_id     TEXT NOT NULL REFERENCES users(user_id),
    assignee_id   TEXT REFERENCES users(user_id),
    value         INTEGER CHECK (value BETWEEN 1 AND 5),
    speed         INTEGER CHECK (speed BETWEEN 1 AND 5),
    cost          INTEGER CHECK (cost BETWEEN 1 AND 5),
    weight        REAL NOT NULL DEFAULT 0,
    is_deleted    INTEGER NOT NULL DEFAULT 0,
    created_at    TEXT NOT NULL,   -- RFC 3339 UTC, fixed microsecond width
    updated_at    TEXT NOT NULL
);

-- No vote is the absence of a row; 0 is never stored.
CREATE TABLE IF NOT EXISTS initiative_votes (
    initiative_id TEXT NOT NULL REFERENCES initiatives(initiative_id),
    user_id       TEXT NOT NULL REFERENCES users(user_id),
    value         INTEGER NOT NULL CHECK (value IN (-1, 1)),
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL,
    PRIMARY KEY (initiative_id, user_id)
);

CREATE TABLE IF NOT EXISTS comments (
    comment_id    TEXT PRIMARY KEY,
    initiative_id TEXT NOT NULL REFERENCES initiatives(initiative_id),
    author_id     TEXT NOT NULL REFERENCES users(user_id),
    text          TEXT NOT NULL,
    created_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS initiatives_author_idx   ON initiatives(author_id);
CREATE INDEX IF NOT EXISTS initiatives_assignee_idx ON initiatives(assignee_id);
CREATE INDEX IF NOT EXISTS initiatives_weight_idx   ON initiatives(weight, created_at);
CREATE INDEX IF NOT EXISTS comments_initiative_idx  ON comments(initiative_id, created_at);

PRAGMA user_version = 1;
";
