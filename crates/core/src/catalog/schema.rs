use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::version::{ENCODED_THRESHOLD, VERSION_KEY};

/// Create the catalog tables the tool reads and writes.
///
/// Real catalogs are created by the photo manager itself; this is used for
/// fresh fixture catalogs.
pub fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS meta (
            id      INTEGER PRIMARY KEY AUTOINCREMENT,
            name    TEXT UNIQUE NOT NULL,
            data    TEXT
        );

        CREATE TABLE IF NOT EXISTS rolls (
            id      INTEGER PRIMARY KEY AUTOINCREMENT,
            time    INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS photos (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            time                INTEGER NOT NULL,
            base_uri            TEXT NOT NULL,
            filename            TEXT NOT NULL,
            description         TEXT NOT NULL,
            roll_id             INTEGER,
            default_version_id  INTEGER NOT NULL DEFAULT 1,
            rating              INTEGER NULL
        );

        CREATE INDEX IF NOT EXISTS idx_photos_uri ON photos(base_uri, filename);

        CREATE TABLE IF NOT EXISTS tags (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            name            TEXT UNIQUE,
            category_id     INTEGER,
            is_category     BOOLEAN,
            sort_priority   INTEGER,
            icon            TEXT
        );

        CREATE TABLE IF NOT EXISTS photo_tags (
            photo_id    INTEGER,
            tag_id      INTEGER,
            UNIQUE (photo_id, tag_id)
        );

        CREATE INDEX IF NOT EXISTS idx_photo_tags_tag ON photo_tags(tag_id);
        ",
    )?;

    let existing: Option<String> = conn
        .query_row(
            "SELECT data FROM meta WHERE name = ?1",
            params![VERSION_KEY],
            |row| row.get(0),
        )
        .optional()?;
    if existing.is_none() {
        conn.execute(
            "INSERT INTO meta (name, data) VALUES (?1, ?2)",
            params![VERSION_KEY, ENCODED_THRESHOLD.to_string()],
        )?;
    }
    Ok(())
}
