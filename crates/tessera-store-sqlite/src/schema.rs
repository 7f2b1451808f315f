//! SQL schema for the tessera SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS registrants (
    registrant_id    INTEGER PRIMARY KEY AUTOINCREMENT,
    fiscal_code      TEXT NOT NULL UNIQUE,  -- upper-case, 16 characters
    given_name       TEXT NOT NULL,
    family_name      TEXT NOT NULL,
    birth_date       TEXT NOT NULL,         -- YYYY-MM-DD
    birth_place      TEXT NOT NULL DEFAULT '',
    residence_place  TEXT NOT NULL DEFAULT '',
    residence_street TEXT NOT NULL DEFAULT '',
    phone            TEXT NOT NULL DEFAULT '',
    registered_on    TEXT NOT NULL,         -- YYYY-MM-DD, local zone
    user_type        TEXT NOT NULL DEFAULT 'member',  -- 'member' | 'cardholder'
    activity         TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS guardianships (
    guardian_id  INTEGER NOT NULL REFERENCES registrants(registrant_id) ON DELETE CASCADE,
    dependent_id INTEGER NOT NULL REFERENCES registrants(registrant_id) ON DELETE CASCADE,
    PRIMARY KEY (guardian_id, dependent_id),
    CHECK (guardian_id != dependent_id)
);

CREATE TABLE IF NOT EXISTS ticket_groups (
    group_id    INTEGER PRIMARY KEY AUTOINCREMENT,
    ticket      INTEGER NOT NULL CHECK (ticket BETWEEN 0 AND 100),
    name        TEXT NOT NULL,
    assigned_at TEXT NOT NULL,   -- RFC 3339 with the local offset
    assigned_on TEXT NOT NULL    -- local calendar date of assigned_at
);

CREATE TABLE IF NOT EXISTS group_members (
    group_id      INTEGER NOT NULL REFERENCES ticket_groups(group_id) ON DELETE CASCADE,
    registrant_id INTEGER NOT NULL REFERENCES registrants(registrant_id) ON DELETE CASCADE,
    assigned_at   TEXT NOT NULL,
    PRIMARY KEY (group_id, registrant_id)
);

CREATE INDEX IF NOT EXISTS registrants_name_idx       ON registrants(family_name, given_name);
CREATE INDEX IF NOT EXISTS guardianships_dependent_idx ON guardianships(dependent_id);
CREATE INDEX IF NOT EXISTS ticket_groups_day_idx       ON ticket_groups(assigned_on, ticket);
CREATE INDEX IF NOT EXISTS group_members_registrant_idx ON group_members(registrant_id);

PRAGMA user_version = 1;
";
