use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::info;

use crate::error::{Error, Result};

/// Backup state for one run of the tool.
#[derive(Debug, Clone, PartialEq)]
pub enum BackupState {
    /// No copy taken yet.
    Pending,
    /// Copy taken at the given path.
    Taken(PathBuf),
    /// Copying failed; mutating operations are refused for the rest of the run.
    Failed,
    /// Backups switched off, or nothing on disk to copy.
    Disabled,
}

/// Takes at most one timestamped copy of the catalog file per run.
#[derive(Debug)]
pub struct Backup {
    source: Option<PathBuf>,
    state: BackupState,
}

impl Backup {
    /// `source` is the catalog file; `None` (in-memory catalog) or
    /// `enabled == false` disables backups.
    pub fn new(source: Option<&Path>, enabled: bool) -> Self {
        let state = if enabled && source.is_some() {
            BackupState::Pending
        } else {
            BackupState::Disabled
        };
        Self {
            source: source.map(Path::to_path_buf),
            state,
        }
    }

    pub fn state(&self) -> &BackupState {
        &self.state
    }

    /// Make sure the catalog has been backed up before the first write.
    /// Returns the backup path if one exists.
    pub fn ensure(&mut self) -> Result<Option<&Path>> {
        match self.state {
            BackupState::Pending => {}
            BackupState::Failed => return Err(Error::BackupUnavailable),
            BackupState::Disabled | BackupState::Taken(_) => {
                return Ok(self.taken_path());
            }
        }

        let Some(source) = self.source.as_deref() else {
            self.state = BackupState::Disabled;
            return Ok(None);
        };
        let target = backup_path(source, Local::now());
        match std::fs::copy(source, &target) {
            Ok(_) => {
                info!(path = %target.display(), "catalog backup created");
                self.state = BackupState::Taken(target);
                Ok(self.taken_path())
            }
            Err(source) => {
                self.state = BackupState::Failed;
                Err(Error::Backup {
                    path: target,
                    source,
                })
            }
        }
    }

    fn taken_path(&self) -> Option<&Path> {
        match &self.state {
            BackupState::Taken(path) => Some(path),
            _ => None,
        }
    }
}

/// `<catalog>~<YYYYMMDDHHMMSS>`
pub fn backup_path(source: &Path, at: DateTime<Local>) -> PathBuf {
    let mut name = source.as_os_str().to_os_string();
    name.push(format!("~{}", at.format("%Y%m%d%H%M%S")));
    PathBuf::from(name)
}
