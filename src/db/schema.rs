//! Database schema definitions
//!
//! Timestamps are UTC milliseconds since the Unix epoch.

pub const CREATE_USERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    role TEXT NOT NULL,
    created_at BIGINT NOT NULL
)
"#;

// owner_username is a display copy; owner_id is the join key
pub const CREATE_TICKETS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS tickets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    owner_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
    owner_username TEXT NOT NULL,
    state TEXT NOT NULL,
    priority TEXT NOT NULL DEFAULT '',
    created_at BIGINT NOT NULL,
    closed_at BIGINT
)
"#;

pub const CREATE_HISTORY_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS ticket_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ticket_id INTEGER NOT NULL REFERENCES tickets(id) ON DELETE CASCADE,
    changed_by TEXT NOT NULL,
    field_name TEXT NOT NULL,
    old_value TEXT NOT NULL,
    new_value TEXT NOT NULL,
    changed_at BIGINT NOT NULL
)
"#;

pub const CREATE_SESSIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    token TEXT PRIMARY KEY,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    created_at BIGINT NOT NULL,
    expires_at BIGINT NOT NULL
)
"#;

// === INDEXES (stats bucketing and ranking) ===

pub const CREATE_INDEX_TICKETS_CREATED: &str =
    "CREATE INDEX IF NOT EXISTS idx_tickets_created ON tickets(created_at)";

pub const CREATE_INDEX_TICKETS_CLOSED: &str =
    "CREATE INDEX IF NOT EXISTS idx_tickets_closed ON tickets(closed_at) WHERE closed_at IS NOT NULL";

pub const CREATE_INDEX_TICKETS_OWNER: &str =
    "CREATE INDEX IF NOT EXISTS idx_tickets_owner ON tickets(owner_id)";

// === UTILITY INDEXES ===

// History listing (ticket_id filter, newest first)
pub const CREATE_INDEX_HISTORY_TICKET: &str =
    "CREATE INDEX IF NOT EXISTS idx_history_ticket ON ticket_history(ticket_id, changed_at DESC)";

pub const CREATE_INDEX_SESSIONS_USER: &str =
    "CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id)";

/// Statements run in order by `Database::run_migrations`
pub const MIGRATIONS: &[&str] = &[
    CREATE_USERS_TABLE,
    CREATE_TICKETS_TABLE,
    CREATE_HISTORY_TABLE,
    CREATE_SESSIONS_TABLE,
    CREATE_INDEX_TICKETS_CREATED,
    CREATE_INDEX_TICKETS_CLOSED,
    CREATE_INDEX_TICKETS_OWNER,
    CREATE_INDEX_HISTORY_TICKET,
    CREATE_INDEX_SESSIONS_USER,
];
