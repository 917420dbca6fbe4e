pub const SCHEMA: &str = r#"
-- Users are created by an administrator; identity is otherwise external
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    top_subjects TEXT NOT NULL DEFAULT '[]',  -- JSON array, supplied externally
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

-- Tokens are auth credentials; non-admin tokens must belong to a user
CREATE TABLE IF NOT EXISTS tokens (
    id TEXT PRIMARY KEY,
    token_hash TEXT NOT NULL,          -- argon2id hash with embedded salt
    token_lookup TEXT NOT NULL,        -- 8 chars for fast lookup
    is_admin INTEGER NOT NULL DEFAULT 0,
    user_id TEXT REFERENCES users(id) ON DELETE CASCADE,
    created_at TEXT DEFAULT (datetime('now')),
    expires_at TEXT,            -- NULL = never
    last_used_at TEXT
);

-- Uploaded documents; rating and num_reviews are derived from reviews
CREATE TABLE IF NOT EXISTS resources (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    subject TEXT NOT NULL,
    topic TEXT NOT NULL DEFAULT '',
    description TEXT,
    file_key TEXT NOT NULL UNIQUE,
    file_size INTEGER NOT NULL,
    file_sha256 TEXT NOT NULL,
    rating REAL NOT NULL DEFAULT 0,
    num_reviews INTEGER NOT NULL DEFAULT 0,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

-- At most one review per (resource, user)
CREATE TABLE IF NOT EXISTS reviews (
    id TEXT PRIMARY KEY,
    resource_id TEXT NOT NULL REFERENCES resources(id) ON DELETE CASCADE,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
    comment TEXT NOT NULL DEFAULT '',
    created_at TEXT DEFAULT (datetime('now')),

    UNIQUE(resource_id, user_id)
);

-- One row per user; derived columns are rewritten with every counter change
CREATE TABLE IF NOT EXISTS contributions (
    user_id TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
    resources_uploaded INTEGER NOT NULL DEFAULT 0 CHECK (resources_uploaded >= 0),
    resources_downloaded INTEGER NOT NULL DEFAULT 0 CHECK (resources_downloaded >= 0),
    reviews_written INTEGER NOT NULL DEFAULT 0 CHECK (reviews_written >= 0),
    total_points INTEGER NOT NULL DEFAULT 0,
    level INTEGER NOT NULL DEFAULT 1,
    badges TEXT NOT NULL DEFAULT '[]',   -- JSON array
    version INTEGER NOT NULL DEFAULT 0,  -- optimistic concurrency
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

-- Create indexes
CREATE UNIQUE INDEX IF NOT EXISTS idx_tokens_lookup ON tokens(token_lookup);
CREATE INDEX IF NOT EXISTS idx_tokens_user ON tokens(user_id);
CREATE INDEX IF NOT EXISTS idx_resources_user ON resources(user_id, created_at);
CREATE INDEX IF NOT EXISTS idx_resources_subject ON resources(subject);
CREATE INDEX IF NOT EXISTS idx_reviews_resource ON reviews(resource_id);
CREATE INDEX IF NOT EXISTS idx_reviews_user ON reviews(user_id, created_at);
CREATE INDEX IF NOT EXISTS idx_contributions_points ON contributions(total_points DESC);
"#;
