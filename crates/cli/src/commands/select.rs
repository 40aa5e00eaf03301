use std::collections::HashSet;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use spotfix_core::{corrupt::CorruptionProgress, domain::Photo, Controller};

/// Apply the selectors in order, each one narrowing the previous result.
/// Without any selector every photo is selected.
pub fn run(
    fm: &mut Controller,
    path: Option<&str>,
    tag: Option<&str>,
    missing: bool,
    corrupted: bool,
) -> Result<Vec<Photo>> {
    let mut selected = None;
    if let Some(pattern) = path {
        selected = Some(narrow(selected, fm.find_by_path(pattern)?));
    }
    if let Some(name) = tag {
        selected = Some(narrow(selected, fm.find_by_tag(name)?));
    }

    let mut photos = match selected {
        Some(photos) => photos,
        None => fm.photos()?,
    };
    if missing {
        photos = fm.find_missing_on_disk(&photos)?;
    }
    if corrupted {
        photos = find_corrupted(fm, &photos)?;
    }
    Ok(photos)
}

/// Keep the photos of `found` that are also in `current`.
fn narrow(current: Option<Vec<Photo>>, found: Vec<Photo>) -> Vec<Photo> {
    let Some(current) = current else {
        return found;
    };
    let ids: HashSet<i64> = current.iter().map(|p| p.id).collect();
    found.into_iter().filter(|p| ids.contains(&p.id)).collect()
}

fn find_corrupted(fm: &Controller, photos: &[Photo]) -> Result<Vec<Photo>> {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("=>-"),
    );

    let corrupted = fm.find_corrupted(
        photos,
        Some(&mut |progress| match progress {
            CorruptionProgress::Start { total } => {
                pb.set_length(total as u64);
                pb.set_position(0);
                pb.set_message("Checking JPEG files...");
            }
            CorruptionProgress::Checked { path, corrupted } => {
                pb.inc(1);
                if corrupted {
                    pb.println(format!("corrupted: {}", path.display()));
                }
            }
            CorruptionProgress::Complete { corrupted } => {
                pb.finish_with_message(format!("{corrupted} corrupted"));
            }
        }),
    )?;
    Ok(corrupted)
}
