//! Deck catalog: enumerates slide-deck files in a directory and materializes
//! one thumbnail per deck through the cache, one deck per scheduling tick so
//! the loading screen can show incremental progress.

pub mod thumbs;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::engine::PresentationEngine;
use thumbs::ThumbnailCache;

/// File extensions recognized as slide decks (lowercase, without dot).
pub const DECK_EXTENSIONS: &[&str] = &["ppt", "pptx", "odp", "key"];

/// One deck known to the catalog.
#[derive(Debug)]
pub struct DeckEntry {
    pub filename: String,
    pub path: PathBuf,
    /// First-slide preview; `None` when export failed and the deck was
    /// skipped for this pass.
    pub thumbnail: Option<image::DynamicImage>,
}

impl DeckEntry {
    /// Filename without extension, for tile labels.
    pub fn display_name(&self) -> &str {
        self.filename
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(&self.filename)
    }
}

/// The fully loaded catalog, in filename order.
#[derive(Debug, Default)]
pub struct Catalog {
    pub entries: Vec<DeckEntry>,
}

impl Catalog {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Progress of one catalog pass, yielded once per processed deck.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub processed: usize,
    pub total: usize,
}

impl Progress {
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        ((self.processed * 100) / self.total) as u8
    }
}

/// List deck files directly inside `dir`, sorted by filename.
pub fn scan(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut decks: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && has_deck_extension(path))
        .collect();
    decks.sort_by_key(|path| path.file_name().map(|n| n.to_os_string()));
    Ok(decks)
}

fn has_deck_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy().to_lowercase();
            DECK_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Lazy, finite, non-restartable catalog pass. Each [`Iterator::next`]
/// processes exactly one deck; the caller steps it once per frame. After the
/// final event the cache record has been flushed exactly once and
/// [`CatalogLoader::finish`] yields the catalog.
pub struct CatalogLoader<E> {
    decks: Vec<PathBuf>,
    next_index: usize,
    cache: ThumbnailCache,
    engine: E,
    thumbnails: HashMap<String, image::DynamicImage>,
    flushed: bool,
}

impl<E: PresentationEngine> CatalogLoader<E> {
    pub fn begin(deck_dir: &Path, cache_dir: &Path, engine: E) -> std::io::Result<Self> {
        let decks = scan(deck_dir)?;
        tracing::info!(decks = decks.len(), dir = %deck_dir.display(), "catalog pass started");
        Ok(Self {
            decks,
            next_index: 0,
            cache: ThumbnailCache::load(cache_dir),
            engine,
            thumbnails: HashMap::new(),
            flushed: false,
        })
    }

    pub fn total(&self) -> usize {
        self.decks.len()
    }

    pub fn is_complete(&self) -> bool {
        self.next_index >= self.decks.len()
    }

    /// Consume the loader into the finished catalog. Flushes the cache record
    /// if the pass produced no events (empty directory).
    pub fn finish(mut self) -> Catalog {
        if !self.flushed {
            self.cache.flush();
        }
        let entries = self
            .decks
            .iter()
            .map(|path| {
                let filename = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let thumbnail = self.thumbnails.remove(&filename);
                DeckEntry {
                    filename,
                    path: path.clone(),
                    thumbnail,
                }
            })
            .collect();
        Catalog { entries }
    }
}

impl<E: PresentationEngine> Iterator for CatalogLoader<E> {
    type Item = Progress;

    fn next(&mut self) -> Option<Progress> {
        let deck = self.decks.get(self.next_index)?.clone();
        let filename = deck
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        match self.cache.get_or_build(&deck, &self.engine) {
            Ok(img) => {
                self.thumbnails.insert(filename, img);
            }
            // Skip this deck, keep the pass going.
            Err(e) => tracing::warn!(deck = %filename, error = %e, "deck skipped"),
        }

        self.next_index += 1;
        if self.next_index == self.decks.len() {
            self.cache.flush();
            self.flushed = true;
        }
        Some(Progress {
            processed: self.next_index,
            total: self.decks.len(),
        })
    }
}
