use anyhow::Result;
use spotfix_core::Controller;

pub fn run(fm: &mut Controller) -> Result<()> {
    let report = fm.normalize()?;
    if report.is_empty() {
        println!("Catalog paths already normalized.");
        return Ok(());
    }
    println!(
        "Normalized catalog: {} separators fixed, {} paths re-encoded, {} skipped",
        report.separators_fixed, report.reencoded, report.skipped
    );
    Ok(())
}
