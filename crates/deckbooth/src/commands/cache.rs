use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;

use crate::catalog;
use crate::catalog::thumbs::{self, ThumbnailCache};
use crate::config::{self, Config};
use crate::engine::SystemEngine;

fn resolve_dir(dir: Option<PathBuf>, config: &Config) -> Result<PathBuf> {
    let dir = dir
        .or_else(|| config.decks_dir.clone())
        .ok_or_else(|| anyhow::anyhow!("No deck directory given (argument or config decks_dir)"))?;
    if !dir.is_dir() {
        anyhow::bail!("Deck directory not found: {}", dir.display());
    }
    Ok(dir)
}

/// Run the cache status command: one line per deck, plus totals.
pub fn status(dir: Option<PathBuf>) -> Result<()> {
    let config = Config::load_or_default();
    let dir = resolve_dir(dir, &config)?;
    let cache_dir = config::cache_dir()?;
    let cache = ThumbnailCache::load(&cache_dir);
    let decks = catalog::scan(&dir)?;

    println!("Cache directory: {}", cache_dir.display());
    println!(
        "{} deck(s) in {}, {} record entry(ies)\n",
        decks.len(),
        dir.display(),
        cache.len()
    );

    let mut cached = 0;
    for deck in &decks {
        let filename = deck
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let state = match thumbs::content_hash(deck) {
            Err(e) => format!("unreadable ({e})").red(),
            Ok(hash) => match cache.recorded_hash(&filename) {
                Some(recorded) if recorded == hash => {
                    cached += 1;
                    "cached".green()
                }
                Some(_) => "stale".yellow(),
                None => "missing".yellow(),
            },
        };
        println!("  {state:>10}  {filename}");
    }

    if cached == decks.len() {
        println!("\n{}", "All thumbnails are up to date.".green().bold());
    } else {
        println!(
            "\n{} of {} up to date. Run {} to regenerate.",
            cached,
            decks.len(),
            "deckbooth cache rebuild".bold()
        );
    }
    Ok(())
}

/// Run the cache rebuild command: drop the record and export every
/// thumbnail again through the presentation engine.
pub fn rebuild(dir: Option<PathBuf>) -> Result<()> {
    let config = Config::load_or_default();
    let dir = resolve_dir(dir, &config)?;
    let cache_dir = config::cache_dir()?;
    std::fs::create_dir_all(&cache_dir)
        .with_context(|| format!("Failed to create {}", cache_dir.display()))?;

    let engine = SystemEngine::locate(&config.engine);
    let decks = catalog::scan(&dir)?;
    if decks.is_empty() {
        println!("{}", "No decks found. Nothing to rebuild.".yellow());
        return Ok(());
    }

    let mut cache = ThumbnailCache::load(&cache_dir);
    cache.clear();

    let mut failures = 0;
    for (i, deck) in decks.iter().enumerate() {
        let filename = deck
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        print!("[{}/{}] {filename} ... ", i + 1, decks.len());
        match cache.get_or_build(deck, &engine) {
            Ok(_) => println!("{}", "ok".green()),
            Err(e) => {
                failures += 1;
                println!("{}", "failed".red());
                eprintln!("    {e}");
            }
        }
    }
    cache.flush();

    if failures == 0 {
        println!(
            "\n{}",
            format!("Rebuilt {} thumbnail(s).", decks.len()).green().bold()
        );
        Ok(())
    } else {
        anyhow::bail!("{failures} of {} thumbnail export(s) failed", decks.len())
    }
}
