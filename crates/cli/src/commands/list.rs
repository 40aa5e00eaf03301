use anyhow::Result;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use serde_json::json;
use spotfix_core::{catalog::PhotoFilter, domain::Photo, Controller};

/// Print the unescaped path of each photo, one per line.
pub fn paths(fm: &Controller, photos: &[Photo]) -> Result<()> {
    for photo in refresh(fm, photos)? {
        println!("{}", photo.path().display());
    }
    Ok(())
}

pub fn table(fm: &Controller, photos: &[Photo]) -> Result<()> {
    let photos = refresh(fm, photos)?;

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("ID"),
        Cell::new("Rating"),
        Cell::new("Tags"),
        Cell::new("Path"),
    ]);

    for photo in &photos {
        let tags = tag_names(fm, photo)?;
        table.add_row(vec![
            Cell::new(photo.id),
            Cell::new(stars(photo.rating)),
            Cell::new(tags.join(", ")),
            Cell::new(photo.path().display()),
        ]);
    }

    println!("{table}");
    println!("  {} photos", photos.len());
    Ok(())
}

pub fn json(fm: &Controller, photos: &[Photo]) -> Result<()> {
    let mut records = Vec::new();
    for photo in refresh(fm, photos)? {
        let mut record = serde_json::to_value(&photo)?;
        record["path"] = json!(photo.path().to_string_lossy());
        record["tags"] = json!(tag_names(fm, &photo)?);
        records.push(record);
    }
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}

/// Re-read the selection so earlier actions in the same run show up.
fn refresh(fm: &Controller, photos: &[Photo]) -> Result<Vec<Photo>> {
    let ids = photos.iter().map(|p| p.id).collect();
    Ok(fm.catalog().find_photos(&PhotoFilter::IdIn(ids))?)
}

fn tag_names(fm: &Controller, photo: &Photo) -> Result<Vec<String>> {
    Ok(fm.tags_for(photo)?.into_iter().map(|t| t.name).collect())
}

fn stars(rating: i64) -> String {
    let filled = rating.clamp(0, spotfix_core::MAX_RATING) as usize;
    let empty = spotfix_core::MAX_RATING as usize - filled;
    format!("{}{}", "★".repeat(filled), "☆".repeat(empty))
}
