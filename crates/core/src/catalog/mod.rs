pub mod schema;

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::domain::*;
use crate::error::{Error, Result};
use crate::wildcard::UriFilter;

const PHOTO_COLUMNS: &str = "id, time, base_uri, filename, description, rating, roll_id";

/// SQLite expression for the stored URI of a photo.
const URI_EXPR: &str = "(base_uri || filename)";

/// Selects which photos a query returns.
#[derive(Debug, Clone, PartialEq)]
pub enum PhotoFilter {
    All,
    /// `uri LIKE pattern [ESCAPE c]`.
    UriLike(UriFilter),
    /// Set membership by photo id.
    IdIn(Vec<i64>),
    /// Photos carrying the given tag.
    TagId(i64),
}

/// New escaped/normalized URI fields for one photo.
#[derive(Debug, Clone, PartialEq)]
pub struct UriUpdate {
    pub id: i64,
    pub base_uri: String,
    pub filename: String,
}

/// Handle on an F-Spot photo catalog.
pub struct Catalog {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Catalog {
    /// Open an existing catalog. Never creates one.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::CatalogNotFound(path.to_path_buf()));
        }
        let conn = Connection::open(path)?;
        Self::configure(&conn)?;
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Create a fresh catalog at `path` (or open and complete an existing one).
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::configure(&conn)?;
        schema::initialize(&conn)?;
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Open an in-memory catalog (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::configure(&conn)?;
        schema::initialize(&conn)?;
        Ok(Self { conn, path: None })
    }

    fn configure(conn: &Connection) -> Result<()> {
        // File paths are case-sensitive; SQLite's LIKE is not by default.
        conn.pragma_update(None, "case_sensitive_like", true)?;
        Ok(())
    }

    /// Location of the catalog file, `None` for in-memory catalogs.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    // ── Meta ─────────────────────────────────────────────────────────

    pub fn meta_value(&self, name: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT data FROM meta WHERE name = ?1",
                params![name],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?;
        Ok(value.flatten())
    }

    pub fn set_meta_value(&self, name: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO meta (name, data) VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET data = excluded.data",
            params![name, value],
        )?;
        Ok(())
    }

    pub fn delete_meta_value(&self, name: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM meta WHERE name = ?1", params![name])?;
        Ok(())
    }

    // ── Photos ───────────────────────────────────────────────────────

    pub fn insert_photo(&self, photo: &NewPhoto) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO photos (time, base_uri, filename, description, rating)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                photo.time,
                photo.base_uri,
                photo.filename,
                photo.description,
                photo.rating,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn list_photos(&self) -> Result<Vec<Photo>> {
        self.find_photos(&PhotoFilter::All)
    }

    pub fn get_photo(&self, id: i64) -> Result<Option<Photo>> {
        Ok(self.find_photos(&PhotoFilter::IdIn(vec![id]))?.pop())
    }

    /// Run a photo query, results ordered by id.
    pub fn find_photos(&self, filter: &PhotoFilter) -> Result<Vec<Photo>> {
        match filter {
            PhotoFilter::All => self.query_photos(
                &format!("SELECT {PHOTO_COLUMNS} FROM photos ORDER BY id"),
                &[],
            ),
            PhotoFilter::UriLike(uri_filter) => {
                let sql = match uri_filter.escape {
                    Some(escape) => format!(
                        "SELECT {PHOTO_COLUMNS} FROM photos
                         WHERE {URI_EXPR} LIKE ?1 ESCAPE '{escape}' ORDER BY id"
                    ),
                    None => format!(
                        "SELECT {PHOTO_COLUMNS} FROM photos
                         WHERE {URI_EXPR} LIKE ?1 ORDER BY id"
                    ),
                };
                self.query_photos(&sql, params![uri_filter.pattern])
            }
            PhotoFilter::IdIn(ids) => {
                let mut photos = Vec::with_capacity(ids.len());
                // Process in chunks to respect SQLite variable limits
                for chunk in ids.chunks(500) {
                    let placeholders: String = (0..chunk.len())
                        .map(|i| format!("?{}", i + 1))
                        .collect::<Vec<_>>()
                        .join(",");
                    let params: Vec<&dyn rusqlite::types::ToSql> = chunk
                        .iter()
                        .map(|id| id as &dyn rusqlite::types::ToSql)
                        .collect();
                    photos.extend(self.query_photos(
                        &format!(
                            "SELECT {PHOTO_COLUMNS} FROM photos WHERE id IN ({placeholders})"
                        ),
                        &params,
                    )?);
                }
                photos.sort_by_key(|p| p.id);
                photos.dedup_by_key(|p| p.id);
                Ok(photos)
            }
            PhotoFilter::TagId(tag_id) => self.query_photos(
                &format!(
                    "SELECT {PHOTO_COLUMNS} FROM photos
                     WHERE id IN (SELECT photo_id FROM photo_tags WHERE tag_id = ?1)
                     ORDER BY id"
                ),
                params![tag_id],
            ),
        }
    }

    fn query_photos(&self, sql: &str, params: &[&dyn rusqlite::types::ToSql]) -> Result<Vec<Photo>> {
        let mut stmt = self.conn.prepare(sql)?;
        let photos = stmt
            .query_map(params, photo_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(photos)
    }

    /// Rewrite URI fields of several photos in a single transaction.
    /// Nothing is written if any update fails.
    pub fn update_uris_batch(&mut self, updates: &[UriUpdate]) -> Result<usize> {
        let what = "photo URI updates";
        let tx = self.conn.transaction().map_err(commit_failed(what))?;
        {
            let mut stmt = tx
                .prepare("UPDATE photos SET base_uri = ?1, filename = ?2 WHERE id = ?3")
                .map_err(commit_failed(what))?;
            for update in updates {
                stmt.execute(params![update.base_uri, update.filename, update.id])
                    .map_err(commit_failed(what))?;
            }
        }
        tx.commit().map_err(commit_failed(what))?;
        Ok(updates.len())
    }

    /// Set ratings for several photos in a single transaction.
    pub fn update_ratings_batch(&mut self, ratings: &[(i64, i64)]) -> Result<usize> {
        let what = "rating updates";
        let tx = self.conn.transaction().map_err(commit_failed(what))?;
        {
            let mut stmt = tx
                .prepare("UPDATE photos SET rating = ?1 WHERE id = ?2")
                .map_err(commit_failed(what))?;
            for (id, rating) in ratings {
                stmt.execute(params![rating, id])
                    .map_err(commit_failed(what))?;
            }
        }
        tx.commit().map_err(commit_failed(what))?;
        Ok(ratings.len())
    }

    // ── Tags ─────────────────────────────────────────────────────────

    /// First tag whose name matches `pattern` with SQL `LIKE`, ignoring
    /// ASCII case even though the connection's `LIKE` is case-sensitive.
    pub fn find_tag_like(&self, pattern: &str) -> Result<Option<Tag>> {
        let tag = self
            .conn
            .query_row(
                "SELECT id, name, category_id, is_category, sort_priority, icon
                 FROM tags WHERE lower(name) LIKE lower(?1) ORDER BY id LIMIT 1",
                params![pattern],
                tag_from_row,
            )
            .optional()?;
        Ok(tag)
    }

    pub fn find_tag(&self, name: &str) -> Result<Option<Tag>> {
        let tag = self
            .conn
            .query_row(
                "SELECT id, name, category_id, is_category, sort_priority, icon
                 FROM tags WHERE name = ?1",
                params![name],
                tag_from_row,
            )
            .optional()?;
        Ok(tag)
    }

    /// Look a tag up by exact name, creating a top-level tag if none exists.
    pub fn find_or_create_tag(&self, name: &str) -> Result<Tag> {
        if let Some(tag) = self.find_tag(name)? {
            return Ok(tag);
        }
        self.conn.execute(
            "INSERT INTO tags (name, category_id, is_category, sort_priority, icon)
             VALUES (?1, 0, 0, 0, '')",
            params![name],
        )?;
        Ok(Tag {
            id: self.conn.last_insert_rowid(),
            name: name.to_string(),
            category_id: 0,
            is_category: false,
            sort_priority: 0,
            icon: String::new(),
        })
    }

    pub fn tags_for_photo(&self, photo_id: i64) -> Result<Vec<Tag>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.id, t.name, t.category_id, t.is_category, t.sort_priority, t.icon
             FROM tags t
             JOIN photo_tags pt ON pt.tag_id = t.id
             WHERE pt.photo_id = ?1
             ORDER BY t.name",
        )?;
        let tags = stmt
            .query_map(params![photo_id], tag_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(tags)
    }

    /// Attach a tag to several photos in a single transaction.
    /// Returns how many associations were created.
    pub fn add_photo_tags(&mut self, tag_id: i64, photo_ids: &[i64]) -> Result<usize> {
        let what = "tag additions";
        let tx = self.conn.transaction().map_err(commit_failed(what))?;
        let mut added = 0;
        {
            let mut stmt = tx
                .prepare("INSERT OR IGNORE INTO photo_tags (photo_id, tag_id) VALUES (?1, ?2)")
                .map_err(commit_failed(what))?;
            for photo_id in photo_ids {
                added += stmt
                    .execute(params![photo_id, tag_id])
                    .map_err(commit_failed(what))?;
            }
        }
        tx.commit().map_err(commit_failed(what))?;
        Ok(added)
    }

    /// Detach a tag from several photos in a single transaction.
    /// Returns how many associations were removed.
    pub fn remove_photo_tags(&mut self, tag_id: i64, photo_ids: &[i64]) -> Result<usize> {
        let what = "tag removals";
        let tx = self.conn.transaction().map_err(commit_failed(what))?;
        let mut removed = 0;
        {
            let mut stmt = tx
                .prepare("DELETE FROM photo_tags WHERE photo_id = ?1 AND tag_id = ?2")
                .map_err(commit_failed(what))?;
            for photo_id in photo_ids {
                removed += stmt
                    .execute(params![photo_id, tag_id])
                    .map_err(commit_failed(what))?;
            }
        }
        tx.commit().map_err(commit_failed(what))?;
        Ok(removed)
    }
}

fn commit_failed(what: &'static str) -> impl Fn(rusqlite::Error) -> Error {
    move |source| Error::CommitFailed { what, source }
}

fn photo_from_row(row: &Row<'_>) -> rusqlite::Result<Photo> {
    Ok(Photo {
        id: row.get(0)?,
        time: row.get::<_, Option<i64>>(1)?.unwrap_or(0),
        base_uri: row.get(2)?,
        filename: row.get(3)?,
        description: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        rating: row.get::<_, Option<i64>>(5)?.unwrap_or(0),
        roll_id: row.get(6)?,
    })
}

fn tag_from_row(row: &Row<'_>) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get(0)?,
        name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        category_id: row.get::<_, Option<i64>>(2)?.unwrap_or(0),
        is_category: row.get::<_, Option<bool>>(3)?.unwrap_or(false),
        sort_priority: row.get::<_, Option<i64>>(4)?.unwrap_or(0),
        icon: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
    })
}
