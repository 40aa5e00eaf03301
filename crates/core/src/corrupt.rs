use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::{Error, Result};

/// Default external checker.
pub const JPEGINFO: &str = "jpeginfo";

/// Progress callback events for a corruption scan.
pub enum CorruptionProgress {
    /// Starting scan with total count.
    Start { total: usize },
    /// A file was checked.
    Checked { path: PathBuf, corrupted: bool },
    /// Scan completed.
    Complete { corrupted: usize },
}

/// Runs `jpeginfo -c <file>` and treats any output without `[OK]` as corruption.
#[derive(Debug, Clone)]
pub struct JpegChecker {
    program: OsString,
}

impl Default for JpegChecker {
    fn default() -> Self {
        Self {
            program: OsString::from(JPEGINFO),
        }
    }
}

impl JpegChecker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use another executable with the same command line and output.
    pub fn with_program(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn missing(&self) -> Error {
        Error::MissingBinary(self.program.to_string_lossy().into_owned())
    }

    /// Fail early with `MissingBinary` if the checker cannot be started.
    pub fn check_available(&self) -> Result<()> {
        Command::new(&self.program)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|_| ())
            .map_err(|_| self.missing())
    }

    pub fn is_corrupted(&self, path: &Path) -> Result<bool> {
        let output = Command::new(&self.program)
            .arg("-c")
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .map_err(|_| self.missing())?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(!stdout.contains("[OK]"))
    }
}
