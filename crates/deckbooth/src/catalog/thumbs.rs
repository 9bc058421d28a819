//! Content-hash-keyed thumbnail cache for slide decks.
//!
//! Each deck's first slide is exported once per content hash by the external
//! engine and stored next to a JSON record mapping `filename -> hash`. A
//! record entry is only trusted while the matching image file still exists;
//! otherwise the deck is treated as a miss and re-exported.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::engine::{EngineError, PresentationEngine};

/// Exported thumbnail resolution, 16:9 to match the tile aspect.
pub const THUMB_WIDTH: u32 = 640;
pub const THUMB_HEIGHT: u32 = 360;

const RECORD_FILE: &str = "thumbnail_cache.json";
/// Hash prefix length used in thumbnail file names.
const HASH_TAG_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum ThumbError {
    #[error("thumbnail generation failed for {deck}")]
    Generation {
        deck: String,
        #[source]
        source: EngineError,
    },

    #[error("deck {deck} is unreadable")]
    DeckUnreadable {
        deck: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read cache record {path}")]
    CacheRead {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to write cache record {path}")]
    CacheWrite {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
}

pub struct ThumbnailCache {
    cache_dir: PathBuf,
    /// `filename -> last known content hash`, persisted as JSON.
    record: BTreeMap<String, String>,
    dirty: bool,
}

impl ThumbnailCache {
    /// Load the cache record from `cache_dir`. A missing record starts empty;
    /// an unreadable or corrupt one is logged and likewise treated as empty,
    /// so at worst every thumbnail is regenerated.
    pub fn load(cache_dir: &Path) -> Self {
        let record = match Self::read_record(&cache_dir.join(RECORD_FILE)) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(error = %e, "starting with empty thumbnail cache");
                BTreeMap::new()
            }
        };
        Self {
            cache_dir: cache_dir.to_path_buf(),
            record,
            dirty: false,
        }
    }

    fn read_record(path: &Path) -> Result<BTreeMap<String, String>, ThumbError> {
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = std::fs::read_to_string(path).map_err(|e| ThumbError::CacheRead {
            path: path.to_path_buf(),
            source: e.into(),
        })?;
        serde_json::from_str(&contents).map_err(|e| ThumbError::CacheRead {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    /// Number of decks with a recorded hash.
    pub fn len(&self) -> usize {
        self.record.len()
    }

    pub fn is_empty(&self) -> bool {
        self.record.is_empty()
    }

    /// Recorded hash for `filename`, if any.
    pub fn recorded_hash(&self, filename: &str) -> Option<&str> {
        self.record.get(filename).map(String::as_str)
    }

    /// Drop every record entry so the next pass regenerates everything.
    pub fn clear(&mut self) {
        if !self.record.is_empty() {
            self.record.clear();
            self.dirty = true;
        }
    }

    /// Return the thumbnail for `deck`, exporting it through `engine` only on
    /// a miss. A hit requires both an unchanged content hash and the image
    /// file still present on disk.
    pub fn get_or_build(
        &mut self,
        deck: &Path,
        engine: &dyn PresentationEngine,
    ) -> Result<image::DynamicImage, ThumbError> {
        let filename = deck
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let hash = content_hash(deck).map_err(|e| ThumbError::DeckUnreadable {
            deck: filename.clone(),
            source: e,
        })?;
        let thumb_path = self.thumb_path(deck, &hash);

        if self.record.get(&filename) == Some(&hash) && thumb_path.exists() {
            if let Ok(img) = image::open(&thumb_path) {
                tracing::debug!(deck = %filename, "thumbnail cache hit");
                return Ok(img);
            }
            // Undecodable file on disk counts as a miss.
            tracing::warn!(deck = %filename, "cached thumbnail is corrupt, regenerating");
        }

        engine
            .export_slide(deck, 1, THUMB_WIDTH, THUMB_HEIGHT, &thumb_path)
            .map_err(|source| ThumbError::Generation {
                deck: filename.clone(),
                source,
            })?;
        let img = image::open(&thumb_path).map_err(|e| ThumbError::Generation {
            deck: filename.clone(),
            source: EngineError::ExportFailed {
                deck: filename.clone(),
                status: format!("unreadable export: {e}"),
            },
        })?;

        self.record.insert(filename, hash);
        self.dirty = true;
        Ok(img)
    }

    /// Persist the record if it changed. Called once per catalog pass, not
    /// per deck, to bound I/O. A write failure discards the update and the
    /// next pass re-exports; it is never fatal.
    pub fn flush(&mut self) {
        if !self.dirty {
            return;
        }
        match self.write_record() {
            Ok(()) => self.dirty = false,
            Err(e) => tracing::warn!(error = %e, "thumbnail cache record not saved"),
        }
    }

    fn write_record(&self) -> Result<(), ThumbError> {
        let path = self.cache_dir.join(RECORD_FILE);
        let wrap = |e: anyhow::Error| ThumbError::CacheWrite {
            path: path.clone(),
            source: e,
        };
        std::fs::create_dir_all(&self.cache_dir).map_err(|e| wrap(e.into()))?;
        let json = serde_json::to_string_pretty(&self.record).map_err(|e| wrap(e.into()))?;
        std::fs::write(&path, json).map_err(|e| wrap(e.into()))
    }

    /// Thumbnail image path keyed by deck stem and content hash. Files for
    /// superseded hashes are left behind; clearing the cache directory or
    /// `cache rebuild` covers cleanup.
    fn thumb_path(&self, deck: &Path, hash: &str) -> PathBuf {
        let stem = deck
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tag = &hash[..HASH_TAG_LEN.min(hash.len())];
        self.cache_dir.join(format!("{stem}_thumb_{tag}.jpg"))
    }
}

/// SHA-256 of the file contents, streamed in chunks, as lowercase hex.
pub fn content_hash(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        use std::fmt::Write;
        let _ = write!(hex, "{byte:02x}");
    }
    Ok(hex)
}
