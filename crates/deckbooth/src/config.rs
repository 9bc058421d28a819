use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::picker::GridGeometry;

const FILENAME: &str = "config.yaml";
const APP_DIR: &str = "deckbooth";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory scanned for slide decks. CLI argument takes precedence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decks_dir: Option<PathBuf>,

    #[serde(default)]
    pub grid: GridConfig,

    /// Seconds without input in the main menu before the attention clip
    /// starts.
    #[serde(default = "default_inactivity_secs")]
    pub inactivity_timeout_secs: f32,

    #[serde(default)]
    pub media: MediaConfig,

    #[serde(default)]
    pub engine: EngineConfig,
}

fn default_inactivity_secs() -> f32 {
    5.0
}

// Matches what an empty YAML document deserializes to.
impl Default for Config {
    fn default() -> Self {
        Self {
            decks_dir: None,
            grid: GridConfig::default(),
            inactivity_timeout_secs: default_inactivity_secs(),
            media: MediaConfig::default(),
            engine: EngineConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    #[serde(default = "default_tiles_per_row")]
    pub tiles_per_row: usize,

    #[serde(default = "default_rows_per_page")]
    pub rows_per_page: usize,
}

fn default_tiles_per_row() -> usize {
    4
}

fn default_rows_per_page() -> usize {
    3
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            tiles_per_row: default_tiles_per_row(),
            rows_per_page: default_rows_per_page(),
        }
    }
}

impl GridConfig {
    pub fn geometry(&self) -> GridGeometry {
        GridGeometry {
            tiles_per_row: self.tiles_per_row.max(1),
            rows_per_page: self.rows_per_page.max(1),
        }
    }
}

/// Paths to the kiosk's media assets, all optional: the kiosk renders plain
/// backgrounds and skips clips whose material is missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Looping background music while minimized.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_music: Option<PathBuf>,

    /// Full-screen image behind the overlay mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay_image: Option<PathBuf>,

    /// Captioned clip played after the inactivity timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attention_video: Option<VideoConfig>,

    /// Clip played by main-menu tile 2.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_video: Option<VideoConfig>,
}

/// One pre-rendered clip: a directory of numbered frames plus an optional
/// audio track.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoConfig {
    pub frames_dir: PathBuf,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<PathBuf>,

    #[serde(default = "default_fps")]
    pub fps: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

fn default_fps() -> f32 {
    30.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Candidate engine binaries, probed in order.
    #[serde(default = "default_candidates")]
    pub candidates: Vec<PathBuf>,

    /// Arguments for opening a deck in slideshow mode. `{deck}` is replaced
    /// with the deck path.
    #[serde(default = "default_slideshow_args")]
    pub slideshow_args: Vec<String>,

    /// Arguments for exporting one slide as an image. Placeholders: `{deck}`,
    /// `{out}`, `{slide}`, `{width}`, `{height}`.
    #[serde(default = "default_export_args")]
    pub export_args: Vec<String>,

    /// Process-name substring used for liveness polling. Defaults to the
    /// located binary's file stem.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_name: Option<String>,

    /// Companion input-forwarder command, spawned fire-and-forget alongside
    /// each slideshow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub companion: Option<Vec<String>>,
}

fn default_candidates() -> Vec<PathBuf> {
    [
        r"C:\Program Files\Microsoft Office\root\Office16\POWERPNT.EXE",
        r"C:\Program Files (x86)\Microsoft Office\root\Office16\POWERPNT.EXE",
        r"C:\Program Files\Microsoft Office\Office15\POWERPNT.EXE",
        "/usr/bin/soffice",
        "/usr/local/bin/soffice",
    ]
    .iter()
    .map(PathBuf::from)
    .collect()
}

fn default_slideshow_args() -> Vec<String> {
    vec!["/s".to_string(), "{deck}".to_string()]
}

fn default_export_args() -> Vec<String> {
    vec![
        "/export".to_string(),
        "{deck}".to_string(),
        "{out}".to_string(),
        "{width}".to_string(),
        "{height}".to_string(),
    ]
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            candidates: default_candidates(),
            slideshow_args: default_slideshow_args(),
            export_args: default_export_args(),
            process_name: None,
            companion: None,
        }
    }
}

/// Directory holding exported thumbnails and the cache record.
pub fn cache_dir() -> Result<PathBuf> {
    dirs::cache_dir()
        .map(|d| d.join(APP_DIR))
        .ok_or_else(|| anyhow::anyhow!("Could not determine cache directory"))
}

impl Config {
    pub fn path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|d| d.join(APP_DIR).join(FILENAME))
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))
    }

    pub fn load() -> Result<Self> {
        let path = Self::path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                anyhow::anyhow!("No config found at {}", path.display())
            } else {
                anyhow::anyhow!("Failed to read config: {e}")
            }
        })?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, format!("# deckbooth configuration\n{yaml}"))?;
        Ok(())
    }

    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_secs_f32(self.inactivity_timeout_secs.max(0.1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.grid.tiles_per_row, 4);
        assert_eq!(config.grid.rows_per_page, 3);
        assert_eq!(config.grid.geometry().page_size(), 12);
        assert!((config.inactivity_timeout_secs - 5.0).abs() < f32::EPSILON);
        assert!(config.decks_dir.is_none());
        assert!(!config.engine.candidates.is_empty());
    }

    #[test]
    fn default_matches_empty_document() {
        let parsed: Config = serde_yaml::from_str("{}").unwrap();
        let built = Config::default();
        assert_eq!(built.grid.tiles_per_row, parsed.grid.tiles_per_row);
        assert_eq!(built.engine.candidates, parsed.engine.candidates);
        assert!(
            (built.inactivity_timeout_secs - parsed.inactivity_timeout_secs).abs() < f32::EPSILON
        );
    }

    #[test]
    fn save_writes_commented_yaml_that_loads_back() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("deckbooth").join("config.yaml");
        let mut config = Config::default();
        config.decks_dir = Some(PathBuf::from("/srv/decks"));
        config.grid.tiles_per_row = 5;
        config.save_to(&path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("# deckbooth configuration\n"));

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.decks_dir.as_deref(), Some(Path::new("/srv/decks")));
        assert_eq!(loaded.grid.tiles_per_row, 5);
    }

    #[test]
    fn partial_document_overrides_only_named_keys() {
        let yaml = "
decks_dir: /srv/decks
grid:
  tiles_per_row: 5
inactivity_timeout_secs: 12.5
engine:
  process_name: impress
";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.decks_dir.as_deref(), Some(Path::new("/srv/decks")));
        assert_eq!(config.grid.tiles_per_row, 5);
        assert_eq!(config.grid.rows_per_page, 3, "unnamed key keeps default");
        assert_eq!(config.engine.process_name.as_deref(), Some("impress"));
        assert_eq!(config.inactivity_timeout(), Duration::from_secs_f32(12.5));
    }

    #[test]
    fn video_config_round_trips() {
        let yaml = "
media:
  attention_video:
    frames_dir: media/attract
    audio: media/attract.mp3
    fps: 24
    caption: Press any button to continue
";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        let video = config.media.attention_video.as_ref().unwrap();
        assert_eq!(video.frames_dir, PathBuf::from("media/attract"));
        assert!((video.fps - 24.0).abs() < f32::EPSILON);
        assert_eq!(
            video.caption.as_deref(),
            Some("Press any button to continue")
        );

        let serialized = serde_yaml::to_string(&config).unwrap();
        let reparsed: Config = serde_yaml::from_str(&serialized).unwrap();
        assert!(reparsed.media.attention_video.is_some());
    }

    #[test]
    fn zero_grid_dimensions_are_clamped() {
        let yaml = "
grid:
  tiles_per_row: 0
  rows_per_page: 0
";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.grid.geometry().page_size(), 1);
    }
}
