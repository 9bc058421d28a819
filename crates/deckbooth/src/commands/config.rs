use anyhow::Result;
use colored::Colorize;

use crate::config::Config;

/// Write a default config file for editing. Refuses to clobber an existing
/// one unless forced.
pub fn init(force: bool) -> Result<()> {
    let path = Config::path()?;
    if path.exists() && !force {
        anyhow::bail!(
            "Config already exists at {} (use --force to overwrite)",
            path.display()
        );
    }
    let written = Config::default().save()?;
    println!(
        "{} {}",
        "Wrote default config to".green().bold(),
        written.display()
    );
    println!("Edit it to set decks_dir, media paths, and the engine candidates.");
    Ok(())
}

/// Print where the config file lives.
pub fn path() -> Result<()> {
    let path = Config::path()?;
    if path.exists() {
        println!("{}", path.display());
    } else {
        println!("{} {}", path.display(), "(not created yet)".yellow());
    }
    Ok(())
}
