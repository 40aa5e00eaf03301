//! One-time rewriting of stored photo URIs into the form the catalog's era
//! expects.

use tracing::{info, warn};

use crate::backup::Backup;
use crate::catalog::{Catalog, UriUpdate};
use crate::domain::Photo;
use crate::error::Result;
use crate::uri::{self, URI_SEPARATOR};
use crate::version::SchemaEra;

/// Records changed by a [`Normalizer::run`] call.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NormalizeReport {
    /// Base URIs that gained their trailing separator.
    pub separators_fixed: usize,
    /// Records whose fields were rewritten into canonical escaped form.
    pub reencoded: usize,
    /// Records left alone because a field could not be decoded.
    pub skipped: usize,
}

impl NormalizeReport {
    /// True when no record was touched or skipped.
    pub fn is_empty(&self) -> bool {
        self.separators_fixed == 0 && self.reencoded == 0 && self.skipped == 0
    }
}

/// Which passes have already completed in this run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NormalizationState {
    pub separators_done: bool,
    pub encoding_done: bool,
}

#[derive(Debug, Default)]
pub struct Normalizer {
    state: NormalizationState,
}

impl Normalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> NormalizationState {
        self.state
    }

    /// True once every pass required by `era` has completed.
    pub fn is_done(&self, era: SchemaEra) -> bool {
        self.state.separators_done && (!era.is_encoded() || self.state.encoding_done)
    }

    /// Run the passes that have not completed yet. Each pass backs the
    /// catalog up before its first write and commits as a single transaction.
    pub fn run(
        &mut self,
        catalog: &mut Catalog,
        era: SchemaEra,
        backup: &mut Backup,
    ) -> Result<NormalizeReport> {
        let mut report = NormalizeReport::default();

        if !self.state.separators_done {
            let updates = plan_separator_fixes(&catalog.list_photos()?);
            if !updates.is_empty() {
                backup.ensure()?;
                report.separators_fixed = catalog.update_uris_batch(&updates)?;
                info!(
                    count = report.separators_fixed,
                    "added missing trailing separator to base URIs"
                );
            }
            self.state.separators_done = true;
        }

        if era.is_encoded() && !self.state.encoding_done {
            let plan = plan_reencoding(&catalog.list_photos()?);
            report.skipped = plan.skipped;
            if !plan.updates.is_empty() {
                backup.ensure()?;
                report.reencoded = catalog.update_uris_batch(&plan.updates)?;
                info!(count = report.reencoded, "percent-encoded photo URIs");
            }
            self.state.encoding_done = true;
        }

        Ok(report)
    }
}

/// Updates appending the separator to every base URI lacking it.
pub fn plan_separator_fixes(photos: &[Photo]) -> Vec<UriUpdate> {
    photos
        .iter()
        .filter(|p| !p.base_uri.ends_with(URI_SEPARATOR))
        .map(|p| UriUpdate {
            id: p.id,
            base_uri: format!("{}{}", p.base_uri, URI_SEPARATOR),
            filename: p.filename.clone(),
        })
        .collect()
}

/// Outcome of planning the encoding pass.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReencodePlan {
    pub updates: Vec<UriUpdate>,
    pub skipped: usize,
}

/// Updates rewriting records into canonical escaped form.
///
/// A record is a candidate when its base URI path or its file name carries
/// no escape sequence. Both fields are recomputed together from their
/// decoded text; the record is updated if either differs from what is stored.
pub fn plan_reencoding(photos: &[Photo]) -> ReencodePlan {
    let mut plan = ReencodePlan::default();

    for photo in photos {
        let (_, base_path) = uri::split_base_uri(&photo.base_uri);
        if uri::is_encoded(base_path) && uri::is_encoded(&photo.filename) {
            continue;
        }

        let canonical = uri::canonical_base_uri(&photo.base_uri)
            .and_then(|base| Ok((base, uri::canonical_filename(&photo.filename)?)));
        let (base_uri, filename) = match canonical {
            Ok(fields) => fields,
            Err(err) => {
                warn!(photo_id = photo.id, error = %err, "skipping photo with undecodable URI");
                plan.skipped += 1;
                continue;
            }
        };

        if base_uri != photo.base_uri || filename != photo.filename {
            plan.updates.push(UriUpdate {
                id: photo.id,
                base_uri,
                filename,
            });
        }
    }

    plan
}
