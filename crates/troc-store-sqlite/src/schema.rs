//! SQL schema for the Troc SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! the `PRAGMA user_version` number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    user_id     TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    picture_url TEXT,
    wishlist    TEXT NOT NULL    -- JSON array of category codes
);

CREATE TABLE IF NOT EXISTS products (
    product_id      TEXT PRIMARY KEY,
    owner_id        TEXT NOT NULL REFERENCES users(user_id),
    category        INTEGER NOT NULL,
    title           TEXT NOT NULL,
    description     TEXT NOT NULL,
    requires_return INTEGER NOT NULL,
    updated_at      TEXT NOT NULL    -- ISO 8601 UTC; server-assigned
);

-- Attitude facts are strictly append-only, deduplicated per
-- (user, product, kind) by the composite primary key.
-- No foreign key on product_id: a swipe queued against a concurrently
-- deleted product must still record its facts.
CREATE TABLE IF NOT EXISTS attitudes (
    user_id     TEXT NOT NULL REFERENCES users(user_id),
    product_id  TEXT NOT NULL,
    kind        TEXT NOT NULL,   -- 'dismiss' | 'interested' | 'willing_to_pay'
    recorded_at TEXT NOT NULL,
    PRIMARY KEY (user_id, product_id, kind)
);

-- At most one match per unordered user pair, ever.
-- user_lo/user_hi are the lexicographically ordered pair.
CREATE TABLE IF NOT EXISTS matches (
    match_id   TEXT PRIMARY KEY,
    user_lo    TEXT NOT NULL REFERENCES users(user_id),
    user_hi    TEXT NOT NULL REFERENCES users(user_id),
    created_at TEXT NOT NULL,
    UNIQUE (user_lo, user_hi),
    CHECK  (user_lo < user_hi)
);

CREATE TABLE IF NOT EXISTS messages (
    message_id TEXT PRIMARY KEY,
    match_id   TEXT NOT NULL REFERENCES matches(match_id),
    sender_id  TEXT NOT NULL REFERENCES users(user_id),
    content    TEXT NOT NULL,
    sent_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS products_owner_idx    ON products(owner_id);
CREATE INDEX IF NOT EXISTS products_updated_idx  ON products(updated_at);
CREATE INDEX IF NOT EXISTS attitudes_product_idx ON attitudes(product_id);
CREATE INDEX IF NOT EXISTS matches_lo_idx        ON matches(user_lo);
CREATE INDEX IF NOT EXISTS matches_hi_idx        ON matches(user_hi);
CREATE INDEX IF NOT EXISTS messages_match_idx    ON messages(match_id);
CREATE INDEX IF NOT EXISTS messages_sent_idx     ON messages(sent_at);

PRAGMA user_version = 1;
";
