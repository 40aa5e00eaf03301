use anyhow::Result;
use spotfix_core::{domain::Photo, Controller};

pub fn add(fm: &mut Controller, name: &str, photos: &[Photo]) -> Result<()> {
    let added = fm.add_tag(name, photos)?;
    println!("Tag '{name}' added to {added} photos.");
    Ok(())
}

pub fn remove(fm: &mut Controller, name: &str, photos: &[Photo]) -> Result<()> {
    let removed = fm.remove_tag(name, photos)?;
    println!("Tag '{name}' removed from {removed} photos.");
    Ok(())
}
