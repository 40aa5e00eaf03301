use anyhow::Result;
use spotfix_core::{domain::Photo, Controller};

pub fn run(fm: &mut Controller, rating: i64, safe: bool, photos: &[Photo]) -> Result<()> {
    let changed = fm.change_rating(rating, safe, photos)?;
    println!("Rating set to {rating} on {changed} of {} photos.", photos.len());
    Ok(())
}
