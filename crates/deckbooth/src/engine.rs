//! External presentation engine integration.
//!
//! The engine is a separate program (PowerPoint, Impress, ...) that deckbooth
//! only ever drives through two operations: export a slide as an image, and
//! open a deck in fullscreen slideshow mode. Slideshow lifetime belongs to the
//! engine and the user; the supervisor observes it by process name and never
//! force-kills it.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use thiserror::Error;

use crate::config::EngineConfig;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("presentation engine not found (tried {tried} candidate paths)")]
    NotFound { tried: usize },

    #[error("failed to spawn {what}: {source}")]
    Spawn {
        what: String,
        #[source]
        source: std::io::Error,
    },

    #[error("slide export of {deck} produced no output at {out}")]
    ExportMissing { deck: String, out: PathBuf },

    #[error("slide export of {deck} exited with {status}")]
    ExportFailed { deck: String, status: String },
}

/// The two capabilities the core depends on. Split out as a trait so the
/// catalog loader and the tests can run against a fake engine.
pub trait PresentationEngine {
    /// Export slide `slide` of `deck` as an image of `width`x`height` pixels
    /// at `out`. Blocks until the export finished.
    fn export_slide(
        &self,
        deck: &Path,
        slide: u32,
        width: u32,
        height: u32,
        out: &Path,
    ) -> Result<(), EngineError>;

    /// Open `deck` in fullscreen slideshow mode. Fire-and-forget: the spawned
    /// process is not tracked through a handle.
    fn open_slideshow(&self, deck: &Path) -> Result<(), EngineError>;
}

/// Engine binary located among the configured candidate paths, driven through
/// argument templates (`{deck}`, `{out}`, `{slide}`, `{width}`, `{height}`).
pub struct SystemEngine {
    binary: Option<PathBuf>,
    tried: usize,
    slideshow_args: Vec<String>,
    export_args: Vec<String>,
}

impl SystemEngine {
    /// Probe the configured candidate paths. A missing engine is not fatal
    /// here: every operation will report [`EngineError::NotFound`] instead,
    /// so the menu keeps working without thumbnails or launches.
    pub fn locate(config: &EngineConfig) -> Self {
        let binary = config.candidates.iter().find(|p| p.exists()).cloned();
        match &binary {
            Some(path) => tracing::info!(engine = %path.display(), "presentation engine located"),
            None => tracing::warn!(
                tried = config.candidates.len(),
                "no presentation engine found; decks cannot be launched"
            ),
        }
        Self {
            binary,
            tried: config.candidates.len(),
            slideshow_args: config.slideshow_args.clone(),
            export_args: config.export_args.clone(),
        }
    }

    /// Process name to look for when polling liveness, derived from the
    /// binary file stem unless overridden in the config.
    pub fn process_name(&self, config: &EngineConfig) -> String {
        if let Some(name) = &config.process_name {
            return name.to_lowercase();
        }
        self.binary
            .as_deref()
            .and_then(Path::file_stem)
            .map(|s| s.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    }

    fn binary(&self) -> Result<&Path, EngineError> {
        self.binary
            .as_deref()
            .ok_or(EngineError::NotFound { tried: self.tried })
    }
}

fn fill_template(args: &[String], vars: &[(&str, String)]) -> Vec<String> {
    args.iter()
        .map(|arg| {
            let mut filled = arg.clone();
            for (key, value) in vars {
                filled = filled.replace(key, value);
            }
            filled
        })
        .collect()
}

impl PresentationEngine for SystemEngine {
    fn export_slide(
        &self,
        deck: &Path,
        slide: u32,
        width: u32,
        height: u32,
        out: &Path,
    ) -> Result<(), EngineError> {
        let binary = self.binary()?;
        let args = fill_template(
            &self.export_args,
            &[
                ("{deck}", deck.display().to_string()),
                ("{out}", out.display().to_string()),
                ("{slide}", slide.to_string()),
                ("{width}", width.to_string()),
                ("{height}", height.to_string()),
            ],
        );
        let status = Command::new(binary)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|source| EngineError::Spawn {
                what: format!("engine export for {}", deck.display()),
                source,
            })?;
        if !status.success() {
            return Err(EngineError::ExportFailed {
                deck: deck.display().to_string(),
                status: status.to_string(),
            });
        }
        if !out.exists() {
            return Err(EngineError::ExportMissing {
                deck: deck.display().to_string(),
                out: out.to_path_buf(),
            });
        }
        Ok(())
    }

    fn open_slideshow(&self, deck: &Path) -> Result<(), EngineError> {
        let binary = self.binary()?;
        let args = fill_template(
            &self.slideshow_args,
            &[("{deck}", deck.display().to_string())],
        );
        Command::new(binary)
            .args(&args)
            .spawn()
            .map(drop)
            .map_err(|source| EngineError::Spawn {
                what: format!("slideshow for {}", deck.display()),
                source,
            })
    }
}

/// Process-existence check by name substring. A capability trait so the
/// supervisor can be driven by a fake in tests, or swapped for a handle-based
/// implementation on a platform with proper process handles.
pub trait ProcessProbe {
    /// Whether any running process name contains `name_substring`
    /// (case-insensitive). Probe failures report `false`: the conservative
    /// answer that hands control back to the kiosk.
    fn is_running(&mut self, name_substring: &str) -> bool;
}

pub struct SysinfoProbe {
    system: sysinfo::System,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        Self {
            system: sysinfo::System::new(),
        }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessProbe for SysinfoProbe {
    fn is_running(&mut self, name_substring: &str) -> bool {
        if name_substring.is_empty() {
            return false;
        }
        self.system
            .refresh_processes(sysinfo::ProcessesToUpdate::All, true);
        self.system.processes().values().any(|process| {
            process
                .name()
                .to_string_lossy()
                .to_lowercase()
                .contains(name_substring)
        })
    }
}

/// Supervises one slideshow session: spawns the engine plus the companion
/// input-forwarder, then observes engine liveness. It does not own either
/// process; the companion self-terminates when it sees the engine gone.
pub struct Supervisor<E, P> {
    engine: E,
    probe: P,
    process_name: String,
    companion: Option<Vec<String>>,
    active: bool,
    ended: bool,
}

impl<E: PresentationEngine, P: ProcessProbe> Supervisor<E, P> {
    pub fn new(engine: E, probe: P, process_name: String, companion: Option<Vec<String>>) -> Self {
        Self {
            engine,
            probe,
            process_name,
            companion,
            active: false,
            ended: false,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Start the engine in slideshow mode and the companion forwarder.
    /// A companion spawn failure is logged and ignored; the slideshow is
    /// already up and keyboard input still reaches it.
    pub fn launch(&mut self, deck: &Path) -> Result<(), EngineError> {
        self.engine.open_slideshow(deck)?;
        tracing::info!(deck = %deck.display(), "slideshow launched");
        if let Some(cmd) = &self.companion {
            if let Some((program, args)) = cmd.split_first() {
                match Command::new(program).args(args).spawn() {
                    // Dropping the child leaves it running; it exits on its own.
                    Ok(_) => tracing::debug!(companion = %program, "input forwarder started"),
                    Err(e) => {
                        tracing::warn!(companion = %program, error = %e, "input forwarder failed to start")
                    }
                }
            }
        }
        self.active = true;
        self.ended = false;
        Ok(())
    }

    /// Whether the engine process is still running. On the falling edge of an
    /// active session the session is cleared and [`Supervisor::session_ended`]
    /// arms exactly once.
    pub fn poll(&mut self) -> bool {
        let running = self.probe.is_running(&self.process_name);
        if self.active && !running {
            tracing::info!("slideshow engine exited");
            self.active = false;
            self.ended = true;
        }
        running
    }

    /// True exactly once after the active session's engine was observed to
    /// have exited. The caller restores its own window to the foreground.
    pub fn session_ended(&mut self) -> bool {
        std::mem::take(&mut self.ended)
    }
}
