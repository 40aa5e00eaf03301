use std::path::PathBuf;

use serde::Serialize;

use crate::uri;

/// A row of the `photos` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Photo {
    pub id: i64,
    pub time: i64,
    /// `file://` URI of the containing directory, possibly escaped.
    pub base_uri: String,
    /// File name, possibly escaped.
    pub filename: String,
    pub description: String,
    pub rating: i64,
    pub roll_id: Option<i64>,
}

impl Photo {
    /// Stored URI as the catalog sees it: `base_uri` followed by `filename`.
    pub fn uri(&self) -> String {
        format!("{}{}", self.base_uri, self.filename)
    }

    /// Unescaped filesystem path.
    ///
    /// `file:///photos/2011/Your%20photos/179.jpg` → `/photos/2011/Your photos/179.jpg`
    pub fn path(&self) -> PathBuf {
        uri::to_fs_path(&self.base_uri, &self.filename)
    }

    /// Whether the file still exists on disk.
    pub fn exists(&self) -> bool {
        self.path().exists()
    }
}

/// A row of the `tags` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub category_id: i64,
    pub is_category: bool,
    pub sort_priority: i64,
    pub icon: String,
}

/// Fields needed to insert a photo row (fixtures and tests).
#[derive(Debug, Clone, Default)]
pub struct NewPhoto {
    pub time: i64,
    pub base_uri: String,
    pub filename: String,
    pub description: String,
    pub rating: i64,
}

impl NewPhoto {
    pub fn new(base_uri: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            base_uri: base_uri.into(),
            filename: filename.into(),
            ..Self::default()
        }
    }
}
