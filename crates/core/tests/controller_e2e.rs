use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use spotfix_core::backup::BackupState;
use spotfix_core::catalog::Catalog;
use spotfix_core::domain::{NewPhoto, Photo};
use spotfix_core::error::Error;
use spotfix_core::version::VERSION_KEY;
use spotfix_core::{Controller, Options};

const ENCODED_VERSION: &str = "18";
const LEGACY_VERSION: &str = "17";

/// A catalog on disk next to a `tests/` directory holding `bee.jpg`,
/// plus three records whose files do not exist:
/// - raw (unescaped) base URI with non-ASCII text and a space,
/// - the same directory already escaped,
/// - a raw file name with spaces and accents.
/// None of the base URIs carries its trailing separator.
struct Fixture {
    tmp: tempfile::TempDir,
    db_path: PathBuf,
}

impl Fixture {
    fn new(version: &str) -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let photos_dir = tmp.path().join("tests");
        fs::create_dir_all(&photos_dir).unwrap();
        fs::write(photos_dir.join("bee.jpg"), b"jpeg").unwrap();

        let db_path = tmp.path().join("photos.db");
        let catalog = Catalog::create(&db_path).unwrap();
        catalog.set_meta_value(VERSION_KEY, version).unwrap();
        for (base_uri, filename) in [
            (format!("file://{}", photos_dir.display()), "bee.jpg"),
            ("file:///éΩƂ/spa ce".to_string(), "file1.jpg"),
            ("file:///%C3%A9%CE%A9%C6%82/spa%20ce".to_string(), "file2.jpg"),
            ("file:///Photos/2011".to_string(), "file3 éè with spaces.jpg"),
        ] {
            catalog
                .insert_photo(&NewPhoto::new(base_uri, filename))
                .unwrap();
        }

        Self { tmp, db_path }
    }

    fn base_path(&self) -> &Path {
        self.tmp.path()
    }

    fn controller(&self, options: Options) -> Controller {
        Controller::open(&self.db_path, options).unwrap()
    }

    fn backups(&self) -> Vec<PathBuf> {
        fs::read_dir(self.tmp.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.to_string_lossy().contains("photos.db~"))
            .collect()
    }
}

fn no_backup() -> Options {
    Options {
        backup: false,
        ..Options::default()
    }
}

/// Log output captured by a thread-local subscriber.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    /// Record `INFO` and above on this thread until the guard drops.
    fn install(&self) -> tracing::subscriber::DefaultGuard {
        let sink = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(move || sink.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    /// Drain the captured lines.
    fn take(&self) -> Vec<String> {
        let bytes = std::mem::take(&mut *self.0.lock().unwrap());
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn filenames(photos: &[Photo]) -> Vec<String> {
    photos.iter().map(|p| p.filename.clone()).collect()
}

fn bee(controller: &Controller) -> Photo {
    controller
        .photos()
        .unwrap()
        .into_iter()
        .find(|p| p.filename == "bee.jpg")
        .unwrap()
}

// ── find_by_path ─────────────────────────────────────────────────

#[test]
fn test_find_by_path_encoded_era_sequencing() {
    let fixture = Fixture::new(ENCODED_VERSION);
    let mut fm = fixture.controller(no_backup());
    fm.set_normalize(false);

    assert!(fm.find_by_path("tests").unwrap().is_empty());
    assert!(!fm.find_by_path("*tests*").unwrap().is_empty());
    let base = format!("{}*", fixture.base_path().display());
    assert!(!fm.find_by_path(&base).unwrap().is_empty());
    // The base URI has no trailing separator yet.
    assert!(fm.find_by_path("*tests/bee*").unwrap().is_empty());
    assert_eq!(fm.find_by_path("file*").unwrap().len(), 4);
    assert_eq!(
        filenames(&fm.find_by_path("*file?.jpg").unwrap()),
        vec!["file1.jpg", "file2.jpg"]
    );
    // Only the record stored escaped matches an escaped query.
    assert_eq!(filenames(&fm.find_by_path("*spa ce*").unwrap()), vec!["file2.jpg"]);
    assert_eq!(filenames(&fm.find_by_path("*Ω*").unwrap()), vec!["file2.jpg"]);

    fm.set_normalize(true);
    assert_eq!(filenames(&fm.find_by_path("*tests/bee*").unwrap()), vec!["bee.jpg"]);
    assert_eq!(
        filenames(&fm.find_by_path("*spa ce*").unwrap()),
        vec!["file1.jpg", "file2.jpg"]
    );
    assert_eq!(
        filenames(&fm.find_by_path("*Ω*").unwrap()),
        vec!["file1.jpg", "file2.jpg"]
    );
    assert_eq!(
        filenames(&fm.find_by_path("*éè with*").unwrap()),
        vec!["file3%20%C3%A9%C3%A8%20with%20spaces.jpg"]
    );
}

#[test]
fn test_find_by_path_three_files() {
    let tmp = tempfile::tempdir().unwrap();
    let db_path = tmp.path().join("photos.db");
    let catalog = Catalog::create(&db_path).unwrap();
    catalog.set_meta_value(VERSION_KEY, ENCODED_VERSION).unwrap();
    for filename in ["file1.jpg", "file2.jpg", "file3 éè with spaces.jpg"] {
        catalog
            .insert_photo(&NewPhoto::new("file:///Photos/2011/", filename))
            .unwrap();
    }

    let mut fm = Controller::open(&db_path, no_backup()).unwrap();
    assert_eq!(fm.find_by_path("file*").unwrap().len(), 3);
    assert_eq!(
        filenames(&fm.find_by_path("*file?.jpg").unwrap()),
        vec!["file1.jpg", "file2.jpg"]
    );
    // An exact path names exactly one record, whatever its stored escaping.
    let exact = fm
        .find_by_path("/Photos/2011/file3 éè with spaces.jpg")
        .unwrap();
    assert_eq!(exact.len(), 1);
    assert_eq!(
        exact[0].path(),
        PathBuf::from("/Photos/2011/file3 éè with spaces.jpg")
    );
}

#[test]
fn test_find_by_path_legacy_era() {
    let fixture = Fixture::new(LEGACY_VERSION);
    let mut fm = fixture.controller(no_backup());

    assert!(!fm.find_by_path("*tests*").unwrap().is_empty());
    assert_eq!(filenames(&fm.find_by_path("*tests/bee*").unwrap()), vec!["bee.jpg"]);
    // Legacy catalogs are never escaped: the raw record matches a raw query.
    assert_eq!(filenames(&fm.find_by_path("*spa ce*").unwrap()), vec!["file1.jpg"]);
    assert_eq!(
        filenames(&fm.find_by_path("*file? éè*").unwrap()),
        vec!["file3 éè with spaces.jpg"]
    );

    let photos = fm.photos().unwrap();
    assert!(photos.iter().all(|p| p.base_uri.ends_with('/')));
    assert!(photos.iter().any(|p| p.base_uri == "file:///éΩƂ/spa ce/"));
}

#[test]
fn test_find_by_path_requires_version() {
    let fixture = Fixture::new(ENCODED_VERSION);
    let mut fm = fixture.controller(no_backup());
    fm.catalog().delete_meta_value(VERSION_KEY).unwrap();

    let err = fm.find_by_path("*").unwrap_err();
    assert!(matches!(err, Error::MetadataMissing(_)));
    // Queries that do not depend on the version still work.
    assert_eq!(fm.photos().unwrap().len(), 4);
}

#[test]
fn test_malformed_version() {
    let fixture = Fixture::new("eighteen");
    let mut fm = fixture.controller(no_backup());
    assert!(matches!(
        fm.normalize().unwrap_err(),
        Error::MetadataMalformed { .. }
    ));
}

// ── normalize ────────────────────────────────────────────────────

#[test]
fn test_normalize_is_idempotent() {
    let fixture = Fixture::new(ENCODED_VERSION);
    let mut fm = fixture.controller(no_backup());

    let first = fm.normalize().unwrap();
    assert_eq!(first.separators_fixed, 4);
    assert_eq!(first.reencoded, 2);
    assert_eq!(first.skipped, 0);

    let second = fm.normalize().unwrap();
    assert_eq!(second.separators_fixed, 0);
    assert_eq!(second.reencoded, 0);

    for photo in fm.photos().unwrap() {
        assert!(photo.base_uri.ends_with('/'));
    }
    let uris: Vec<String> = fm.photos().unwrap().iter().map(|p| p.uri()).collect();
    assert!(uris.contains(&"file:///%C3%A9%CE%A9%C6%82/spa%20ce/file1.jpg".to_string()));
    assert!(uris.contains(&"file:///Photos/2011/file3%20%C3%A9%C3%A8%20with%20spaces.jpg".to_string()));
}

#[test]
fn test_normalize_logs_one_line_per_changed_pass() {
    let fixture = Fixture::new(ENCODED_VERSION);
    let mut fm = fixture.controller(no_backup());
    let logs = CapturedLogs::default();
    let _guard = logs.install();

    fm.normalize().unwrap();
    let first = logs.take();
    assert_eq!(first.len(), 2, "{first:?}");
    assert!(first.iter().all(|line| line.contains("INFO")));
    assert!(first[0].contains("trailing separator") && first[0].contains("count=4"));
    assert!(first[1].contains("percent-encoded") && first[1].contains("count=2"));

    fm.normalize().unwrap();
    assert!(logs.take().is_empty());
}

#[test]
fn test_normalize_without_changes_logs_nothing() {
    let fixture = Fixture::new(ENCODED_VERSION);
    fixture.controller(no_backup()).normalize().unwrap();

    let mut fm = fixture.controller(no_backup());
    let logs = CapturedLogs::default();
    let _guard = logs.install();
    let report = fm.normalize().unwrap();

    assert!(report.is_empty());
    assert!(logs.take().is_empty());
}

#[test]
fn test_normalize_legacy_logs_separator_pass_only() {
    let fixture = Fixture::new(LEGACY_VERSION);
    let mut fm = fixture.controller(no_backup());
    let logs = CapturedLogs::default();
    let _guard = logs.install();

    fm.normalize().unwrap();
    let lines = logs.take();
    assert_eq!(lines.len(), 1, "{lines:?}");
    assert!(lines[0].contains("trailing separator"));
}

#[test]
fn test_normalize_keeps_decoded_paths() {
    let fixture = Fixture::new(ENCODED_VERSION);
    let mut fm = fixture.controller(no_backup());
    let before: Vec<PathBuf> = fm.photos().unwrap().iter().map(Photo::path).collect();

    fm.normalize().unwrap();

    let after: Vec<PathBuf> = fm.photos().unwrap().iter().map(Photo::path).collect();
    assert_eq!(before, after);
}

#[test]
fn test_normalize_persists_across_runs() {
    let fixture = Fixture::new(ENCODED_VERSION);
    fixture.controller(no_backup()).normalize().unwrap();

    // A new run finds nothing left to do.
    let report = fixture.controller(no_backup()).normalize().unwrap();
    assert_eq!(report.separators_fixed + report.reencoded, 0);
}

// ── Backups ──────────────────────────────────────────────────────

#[test]
fn test_single_backup_per_run() {
    let fixture = Fixture::new(ENCODED_VERSION);
    let mut fm = fixture.controller(Options::default());
    let photos = fm.photos().unwrap();

    fm.change_rating(3, false, &photos).unwrap();
    fm.add_tag("Family", &photos).unwrap();
    fm.normalize().unwrap();
    fm.change_rating(1, false, &photos).unwrap();

    let backups = fixture.backups();
    assert_eq!(backups.len(), 1);
    assert!(matches!(fm.backup_state(), BackupState::Taken(path) if path == &backups[0]));

    // The copy holds the catalog as it was before the first write.
    let original = Catalog::open(&backups[0]).unwrap();
    assert!(original.list_photos().unwrap().iter().all(|p| p.rating == 0));
}

#[test]
fn test_read_only_run_takes_no_backup() {
    let fixture = Fixture::new(LEGACY_VERSION);
    let fm = fixture.controller(Options::default());
    fm.photos().unwrap();
    fm.find_missing_on_disk(&fm.photos().unwrap()).unwrap();
    assert!(fixture.backups().is_empty());
    assert_eq!(fm.backup_state(), &BackupState::Pending);
}

#[test]
fn test_no_backup_option() {
    let fixture = Fixture::new(ENCODED_VERSION);
    let mut fm = fixture.controller(no_backup());
    let photos = fm.photos().unwrap();
    fm.change_rating(2, false, &photos).unwrap();
    assert!(fixture.backups().is_empty());
}

#[cfg(unix)]
#[test]
fn test_failed_backup_blocks_mutations_only() {
    let fixture = Fixture::new(ENCODED_VERSION);
    let mut fm = fixture.controller(Options::default());
    // The open connection keeps working on the unlinked file, the copy cannot.
    fs::remove_file(&fixture.db_path).unwrap();
    let photos = fm.photos().unwrap();

    assert!(matches!(
        fm.change_rating(2, false, &photos).unwrap_err(),
        Error::Backup { .. }
    ));
    assert!(matches!(
        fm.add_tag("Family", &photos).unwrap_err(),
        Error::BackupUnavailable
    ));
    assert_eq!(fm.photos().unwrap().len(), 4);
    assert!(fm.photos().unwrap().iter().all(|p| p.rating == 0));
}

// ── Ratings ──────────────────────────────────────────────────────

#[test]
fn test_change_rating() {
    let fixture = Fixture::new(ENCODED_VERSION);
    let mut fm = fixture.controller(no_backup());
    assert_eq!(bee(&fm).rating, 0);

    let photos = fm.photos().unwrap();
    assert_eq!(fm.change_rating(1, false, &photos).unwrap(), 4);
    assert_eq!(bee(&fm).rating, 1);

    // Safe: a lower rating does not overwrite.
    let photos = fm.photos().unwrap();
    assert_eq!(fm.change_rating(0, true, &photos).unwrap(), 0);
    assert_eq!(bee(&fm).rating, 1);

    // Not safe.
    assert_eq!(fm.change_rating(0, false, &photos).unwrap(), 4);
    assert_eq!(bee(&fm).rating, 0);
}

#[test]
fn test_change_rating_rejects_out_of_range() {
    let fixture = Fixture::new(ENCODED_VERSION);
    let mut fm = fixture.controller(Options::default());
    let photos = fm.photos().unwrap();
    assert!(matches!(
        fm.change_rating(6, false, &photos).unwrap_err(),
        Error::InvalidRating(6)
    ));
    assert!(fixture.backups().is_empty());
}

// ── Tags ─────────────────────────────────────────────────────────

#[test]
fn test_add_tag_ignores_case_duplicates() {
    let fixture = Fixture::new(ENCODED_VERSION);
    let mut fm = fixture.controller(no_backup());
    let photo = bee(&fm);
    assert!(fm.tags_for(&photo).unwrap().is_empty());

    assert_eq!(fm.add_tag("Family", std::slice::from_ref(&photo)).unwrap(), 1);
    let names: Vec<String> = fm.tags_for(&photo).unwrap().into_iter().map(|t| t.name).collect();
    assert_eq!(names, vec!["Family"]);

    assert_eq!(fm.add_tag("family", std::slice::from_ref(&photo)).unwrap(), 0);
    assert_eq!(fm.tags_for(&photo).unwrap().len(), 1);
}

#[test]
fn test_remove_tag() {
    let fixture = Fixture::new(ENCODED_VERSION);
    let mut fm = fixture.controller(no_backup());
    let photo = bee(&fm);
    let one = std::slice::from_ref(&photo);

    assert!(matches!(
        fm.remove_tag("Landscape", one).unwrap_err(),
        Error::TagNotSet(_)
    ));
    fm.add_tag("Landscape", one).unwrap();
    assert_eq!(fm.remove_tag("Landscape", one).unwrap(), 1);
    assert!(fm.tags_for(&photo).unwrap().is_empty());
    assert!(matches!(
        fm.remove_tag("Landscape", one).unwrap_err(),
        Error::TagNotSet(_)
    ));
}

#[test]
fn test_find_by_tag() {
    let fixture = Fixture::new(ENCODED_VERSION);
    let mut fm = fixture.controller(no_backup());
    let photo = bee(&fm);
    fm.add_tag("Family", std::slice::from_ref(&photo)).unwrap();

    assert_eq!(filenames(&fm.find_by_tag("Family").unwrap()), vec!["bee.jpg"]);
    assert_eq!(filenames(&fm.find_by_tag("Fam%").unwrap()), vec!["bee.jpg"]);
    assert!(matches!(
        fm.find_by_tag("Holidays").unwrap_err(),
        Error::TagNotFound(_)
    ));
}

#[test]
fn test_find_by_path_accepts_file_uri() {
    for version in [ENCODED_VERSION, LEGACY_VERSION] {
        let fixture = Fixture::new(version);
        let mut fm = fixture.controller(no_backup());
        assert_eq!(
            filenames(&fm.find_by_path("file:///Photos/2011/*").unwrap()).len(),
            1,
            "version {version}"
        );
        assert_eq!(
            fm.find_by_path("file:///Photos/2011/*").unwrap(),
            fm.find_by_path("/Photos/2011/*").unwrap()
        );
    }
}

#[test]
fn test_find_by_tag_ignores_case() {
    let fixture = Fixture::new(ENCODED_VERSION);
    let mut fm = fixture.controller(no_backup());
    let photo = bee(&fm);
    fm.add_tag("Family", std::slice::from_ref(&photo)).unwrap();

    assert_eq!(filenames(&fm.find_by_tag("family").unwrap()), vec!["bee.jpg"]);
    assert_eq!(filenames(&fm.find_by_tag("FAM%").unwrap()), vec!["bee.jpg"]);
    // Path matching on the same connection stays case-sensitive.
    assert!(fm.find_by_path("*BEE.JPG").unwrap().is_empty());
}

// ── Missing / corrupted ──────────────────────────────────────────

#[test]
fn test_find_missing_on_disk() {
    let fixture = Fixture::new(ENCODED_VERSION);
    let fm = fixture.controller(no_backup());
    let photos = fm.photos().unwrap();

    let missing = fm.find_missing_on_disk(&photos).unwrap();
    assert_eq!(missing.len(), photos.len() - 1);
    assert!(missing.iter().all(|p| p.filename != "bee.jpg"));
}

#[test]
fn test_find_missing_on_disk_after_normalize() {
    let fixture = Fixture::new(ENCODED_VERSION);
    let mut fm = fixture.controller(no_backup());
    fm.normalize().unwrap();
    let photos = fm.photos().unwrap();
    assert_eq!(fm.find_missing_on_disk(&photos).unwrap().len(), photos.len() - 1);
}

#[cfg(unix)]
#[test]
fn test_find_corrupted() {
    use spotfix_core::corrupt::{CorruptionProgress, JpegChecker};
    use std::os::unix::fs::PermissionsExt;

    let fixture = Fixture::new(ENCODED_VERSION);
    let photos_dir = fixture.base_path().join("tests");
    fs::write(photos_dir.join("bee-corrupted.jpg"), b"jpe").unwrap();
    {
        let catalog = Catalog::open(&fixture.db_path).unwrap();
        catalog
            .insert_photo(&NewPhoto::new(
                format!("file://{}/", photos_dir.display()),
                "bee-corrupted.jpg",
            ))
            .unwrap();
    }

    let script = fixture.base_path().join("fake-jpeginfo");
    fs::write(
        &script,
        "#!/bin/sh\ncase \"$2\" in *corrupted*) echo \"$2 ERROR\" ;; *) echo \"$2 [OK]\" ;; esac\n",
    )
    .unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

    let fm = fixture
        .controller(no_backup())
        .with_checker(JpegChecker::with_program(&script));
    let photos = fm.photos().unwrap();

    let mut checked = 0;
    let mut total = 0;
    let corrupted = fm
        .find_corrupted(
            &photos,
            Some(&mut |progress| match progress {
                CorruptionProgress::Start { total: t } => total = t,
                CorruptionProgress::Checked { .. } => checked += 1,
                CorruptionProgress::Complete { corrupted } => assert_eq!(corrupted, 1),
            }),
        )
        .unwrap();

    assert_eq!(filenames(&corrupted), vec!["bee-corrupted.jpg"]);
    assert_eq!(total, 5);
    // Only the two files present on disk are checked.
    assert_eq!(checked, 2);
}

#[test]
fn test_find_corrupted_missing_binary() {
    use spotfix_core::corrupt::JpegChecker;

    let fixture = Fixture::new(ENCODED_VERSION);
    let fm = fixture
        .controller(no_backup())
        .with_checker(JpegChecker::with_program("/nonexistent/jpeginfo"));
    let photos = fm.photos().unwrap();
    assert!(matches!(
        fm.find_corrupted(&photos, None).unwrap_err(),
        Error::MissingBinary(_)
    ));
}
