mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser};
use spotfix_core::{Controller, Options};
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// spotfix: maintenance tool for F-Spot photo catalogs
#[derive(Parser)]
#[command(name = "spotfix", version, about)]
struct Cli {
    /// Path to the F-Spot database
    #[arg(long, default_value_t = default_database_path())]
    database: String,

    /// Logging level (error, warn, info, debug, trace); RUST_LOG overrides it
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Do not back up the database before modifying it
    #[arg(long)]
    no_backup: bool,

    /// Do not normalize stored paths before running path queries
    #[arg(long)]
    no_normalize: bool,

    #[command(flatten)]
    find: FindArgs,

    #[command(flatten)]
    action: ActionArgs,
}

/// Selectors narrow the photo set; with none, every photo is selected.
#[derive(Args)]
struct FindArgs {
    /// Find by path, `*` and `?` wildcards allowed
    #[arg(long, value_name = "PATTERN")]
    find_path: Option<String>,

    /// Find by tag name
    #[arg(long, value_name = "NAME")]
    find_tag: Option<String>,

    /// Find photos missing on disk
    #[arg(long)]
    find_missing: bool,

    /// Find corrupted JPEG files (requires jpeginfo)
    #[arg(long)]
    find_corrupted: bool,
}

#[derive(Args)]
struct ActionArgs {
    /// List paths of the selected photos
    #[arg(long)]
    list: bool,

    /// List the selected photos as a table with ratings and tags
    #[arg(long)]
    long: bool,

    /// List the selected photos as JSON
    #[arg(long)]
    json: bool,

    /// Change rating of the selected photos
    #[arg(long, value_name = "N")]
    rating: Option<i64>,

    /// Change rating only if superior to current
    #[arg(long, requires = "rating")]
    safe_rating: bool,

    /// Tag the selected photos
    #[arg(long, value_name = "NAME")]
    add_tag: Option<String>,

    /// Untag the selected photos
    #[arg(long, value_name = "NAME")]
    remove_tag: Option<String>,

    /// Rewrite stored paths into canonical form now and report what changed
    #[arg(long)]
    normalize: bool,
}

impl ActionArgs {
    /// Actions that work on the selected photos.
    fn selects(&self) -> bool {
        self.list
            || self.long
            || self.json
            || self.rating.is_some()
            || self.add_tag.is_some()
            || self.remove_tag.is_some()
    }

    fn any(&self) -> bool {
        self.selects() || self.normalize
    }
}

fn default_database_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home)
        .join(".config")
        .join("f-spot")
        .join("photos.db")
        .to_string_lossy()
        .to_string()
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let options = Options {
        backup: !cli.no_backup,
        normalize: !cli.no_normalize,
    };
    let mut fm = Controller::open(&PathBuf::from(&cli.database), options)?;

    if cli.action.normalize {
        commands::normalize::run(&mut fm)?;
    }

    let action = &cli.action;
    if action.selects() {
        let photos = commands::select::run(
            &mut fm,
            cli.find.find_path.as_deref(),
            cli.find.find_tag.as_deref(),
            cli.find.find_missing,
            cli.find.find_corrupted,
        )?;

        if let Some(rating) = action.rating {
            commands::rating::run(&mut fm, rating, action.safe_rating, &photos)?;
        }
        if let Some(name) = &action.add_tag {
            commands::tags::add(&mut fm, name, &photos)?;
        }
        if let Some(name) = &action.remove_tag {
            commands::tags::remove(&mut fm, name, &photos)?;
        }

        if action.json {
            commands::list::json(&fm, &photos)?;
        } else if action.long {
            commands::list::table(&fm, &photos)?;
        } else if action.list {
            commands::list::paths(&fm, &photos)?;
        }
    }

    if !action.any() {
        warn!("No action was specified.");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("spotfix").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_no_action() {
        let cli = parse(&["--find-missing"]);
        assert!(!cli.action.selects());
        assert!(!cli.action.any());
    }

    #[test]
    fn test_normalize_alone_selects_nothing() {
        let cli = parse(&["--normalize"]);
        assert!(!cli.action.selects());
        assert!(cli.action.any());
    }

    #[test]
    fn test_each_photo_action_selects() {
        for args in [
            &["--list"][..],
            &["--long"][..],
            &["--json"][..],
            &["--rating", "3"][..],
            &["--add-tag", "Family"][..],
            &["--remove-tag", "Family"][..],
        ] {
            let cli = parse(args);
            assert!(cli.action.selects(), "{args:?}");
            assert!(cli.action.any(), "{args:?}");
        }
    }

    #[test]
    fn test_safe_rating_requires_rating() {
        assert!(Cli::try_parse_from(["spotfix", "--safe-rating"]).is_err());
    }
}
