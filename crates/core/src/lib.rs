pub mod backup;
pub mod catalog;
pub mod corrupt;
pub mod domain;
pub mod error;
pub mod normalize;
pub mod uri;
pub mod version;
pub mod wildcard;

use std::path::Path;

use tracing::{debug, info};

use backup::{Backup, BackupState};
use catalog::{Catalog, PhotoFilter};
use corrupt::{CorruptionProgress, JpegChecker};
use domain::{Photo, Tag};
use error::{Error, Result};
use normalize::{NormalizeReport, Normalizer};
use version::{SchemaEra, SchemaVersion};

/// Highest rating the photo manager displays.
pub const MAX_RATING: i64 = 5;

/// Behaviour switches for a [`Controller`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    /// Copy the catalog file before the first write of the run.
    pub backup: bool,
    /// Normalize stored URIs before translating path queries.
    pub normalize: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            backup: true,
            normalize: true,
        }
    }
}

/// The main entry point: one catalog, one run.
///
/// Mutating operations back the catalog up first; path queries normalize
/// stored URIs first. Both happen at most once per controller.
pub struct Controller {
    catalog: Catalog,
    options: Options,
    backup: Backup,
    normalizer: Normalizer,
    version: Option<SchemaVersion>,
    checker: JpegChecker,
}

impl Controller {
    /// Open an existing catalog file.
    pub fn open(path: &Path, options: Options) -> Result<Self> {
        let catalog = Catalog::open(path)?;
        Ok(Self::from_catalog(catalog, options))
    }

    pub fn from_catalog(catalog: Catalog, options: Options) -> Self {
        let backup = Backup::new(catalog.path(), options.backup);
        Self {
            catalog,
            options,
            backup,
            normalizer: Normalizer::new(),
            version: None,
            checker: JpegChecker::new(),
        }
    }

    /// Replace the corruption checker.
    pub fn with_checker(mut self, checker: JpegChecker) -> Self {
        self.checker = checker;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn options(&self) -> Options {
        self.options
    }

    /// Turn the normalization precondition of path queries on or off.
    pub fn set_normalize(&mut self, normalize: bool) {
        self.options.normalize = normalize;
    }

    pub fn backup_state(&self) -> &BackupState {
        self.backup.state()
    }

    // ── Preconditions ────────────────────────────────────────────────

    /// Catalog format version, read once and cached.
    pub fn schema_version(&mut self) -> Result<SchemaVersion> {
        if let Some(version) = self.version {
            return Ok(version);
        }
        let version = version::detect(&self.catalog)?;
        debug!(%version, era = %version.era(), "detected catalog version");
        self.version = Some(version);
        Ok(version)
    }

    pub fn schema_era(&mut self) -> Result<SchemaEra> {
        Ok(self.schema_version()?.era())
    }

    /// Back the catalog up unless that already happened in this run.
    pub fn ensure_backup(&mut self) -> Result<()> {
        self.backup.ensure()?;
        Ok(())
    }

    /// Normalize stored URIs unless disabled or already done in this run.
    pub fn ensure_normalized(&mut self) -> Result<NormalizeReport> {
        if !self.options.normalize {
            return Ok(NormalizeReport::default());
        }
        self.normalize()
    }

    /// Run the normalization passes that have not run yet.
    pub fn normalize(&mut self) -> Result<NormalizeReport> {
        let era = self.schema_era()?;
        if self.normalizer.is_done(era) {
            return Ok(NormalizeReport::default());
        }
        self.normalizer.run(&mut self.catalog, era, &mut self.backup)
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// All photos in the catalog.
    pub fn photos(&self) -> Result<Vec<Photo>> {
        self.catalog.list_photos()
    }

    pub fn tags_for(&self, photo: &Photo) -> Result<Vec<Tag>> {
        self.catalog.tags_for_photo(photo.id)
    }

    /// Photos whose URI matches a `*`/`?` pattern.
    pub fn find_by_path(&mut self, pattern: &str) -> Result<Vec<Photo>> {
        self.ensure_normalized()?;
        let era = self.schema_era()?;
        let filter = wildcard::translate(pattern, era);
        debug!(pattern, like = %filter.pattern, "translated path pattern");
        self.catalog.find_photos(&PhotoFilter::UriLike(filter))
    }

    /// Photos carrying the first tag whose name matches `name` with SQL `LIKE`.
    pub fn find_by_tag(&self, name: &str) -> Result<Vec<Photo>> {
        let tag = self
            .catalog
            .find_tag_like(name)?
            .ok_or_else(|| Error::TagNotFound(name.to_string()))?;
        self.catalog.find_photos(&PhotoFilter::TagId(tag.id))
    }

    /// Photos among `photos` whose file is gone from disk.
    pub fn find_missing_on_disk(&self, photos: &[Photo]) -> Result<Vec<Photo>> {
        let ids: Vec<i64> = photos.iter().filter(|p| !p.exists()).map(|p| p.id).collect();
        self.catalog.find_photos(&PhotoFilter::IdIn(ids))
    }

    /// Photos among `photos` whose file fails the corruption check.
    /// Files missing from disk are skipped.
    pub fn find_corrupted(
        &self,
        photos: &[Photo],
        mut progress_cb: Option<&mut dyn FnMut(CorruptionProgress)>,
    ) -> Result<Vec<Photo>> {
        self.checker.check_available()?;

        if let Some(ref mut cb) = progress_cb {
            cb(CorruptionProgress::Start {
                total: photos.len(),
            });
        }

        let mut ids = Vec::new();
        for photo in photos {
            let path = photo.path();
            if !path.exists() {
                debug!(path = %path.display(), "skipping corruption check of missing file");
                continue;
            }
            let corrupted = self.checker.is_corrupted(&path)?;
            if corrupted {
                ids.push(photo.id);
            }
            if let Some(ref mut cb) = progress_cb {
                cb(CorruptionProgress::Checked { path, corrupted });
            }
        }

        if let Some(ref mut cb) = progress_cb {
            cb(CorruptionProgress::Complete {
                corrupted: ids.len(),
            });
        }

        self.catalog.find_photos(&PhotoFilter::IdIn(ids))
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Set `rating` on `photos`. With `safe`, photos rated higher keep their
    /// rating. Returns how many photos changed.
    pub fn change_rating(&mut self, rating: i64, safe: bool, photos: &[Photo]) -> Result<usize> {
        if !(0..=MAX_RATING).contains(&rating) {
            return Err(Error::InvalidRating(rating));
        }
        self.ensure_backup()?;

        let updates: Vec<(i64, i64)> = photos
            .iter()
            .filter(|p| !(safe && rating < p.rating))
            .filter(|p| p.rating != rating)
            .map(|p| (p.id, rating))
            .collect();
        let changed = self.catalog.update_ratings_batch(&updates)?;
        info!(rating, count = changed, "set rating");
        Ok(changed)
    }

    /// Tag `photos` with `name`, creating the tag if needed. Photos already
    /// carrying a tag of that name in any letter case are left alone.
    pub fn add_tag(&mut self, name: &str, photos: &[Photo]) -> Result<usize> {
        self.ensure_backup()?;

        let wanted = name.to_lowercase();
        let mut ids = Vec::with_capacity(photos.len());
        for photo in photos {
            let already = self
                .catalog
                .tags_for_photo(photo.id)?
                .iter()
                .any(|t| t.name.to_lowercase() == wanted);
            if !already {
                ids.push(photo.id);
            }
        }
        if ids.is_empty() {
            return Ok(0);
        }

        let tag = self.catalog.find_or_create_tag(name)?;
        let added = self.catalog.add_photo_tags(tag.id, &ids)?;
        info!(tag = name, count = added, "added tag");
        Ok(added)
    }

    /// Remove tag `name` from `photos`. Fails with `TagNotSet` if none of
    /// them carries it.
    pub fn remove_tag(&mut self, name: &str, photos: &[Photo]) -> Result<usize> {
        self.ensure_backup()?;

        let tag = self
            .catalog
            .find_tag(name)?
            .ok_or_else(|| Error::TagNotSet(name.to_string()))?;
        let ids: Vec<i64> = photos.iter().map(|p| p.id).collect();
        let removed = self.catalog.remove_photo_tags(tag.id, &ids)?;
        if removed == 0 {
            return Err(Error::TagNotSet(name.to_string()));
        }
        info!(tag = name, count = removed, "removed tag");
        Ok(removed)
    }
}
