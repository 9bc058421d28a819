//! Playback collaborators: a frame-iteration contract for video sequences
//! and a rodio-backed audio output.
//!
//! Decoding is not this application's business. Video material is consumed
//! through [`FrameSource`], fed here by pre-rendered numbered frame images;
//! audio goes through a single output sink. Missing files or a missing audio
//! device degrade silently so the kiosk keeps running.

use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rodio::{OutputStream, OutputStreamBuilder, Sink, Source};

/// Target playback rate for frame sources.
pub const TARGET_FPS: f32 = 30.0;

/// Iterates decoded frames of a video sequence at a target rate.
pub trait FrameSource {
    /// The next frame, or `None` at the natural end of the stream.
    fn next_frame(&mut self) -> Option<image::RgbaImage>;

    fn fps(&self) -> f32 {
        TARGET_FPS
    }

    fn frame_interval(&self) -> Duration {
        Duration::from_secs_f32(1.0 / self.fps().max(1.0))
    }
}

/// Frame source over a directory of numbered image files (`0001.jpg`, ...),
/// played in filename order.
pub struct ImageSequenceSource {
    frames: Vec<PathBuf>,
    next_index: usize,
    fps: f32,
}

impl ImageSequenceSource {
    pub fn open(dir: &Path, fps: f32) -> std::io::Result<Self> {
        let mut frames: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .map(|ext| {
                        let ext = ext.to_string_lossy().to_lowercase();
                        matches!(ext.as_str(), "jpg" | "jpeg" | "png")
                    })
                    .unwrap_or(false)
            })
            .collect();
        frames.sort();
        Ok(Self {
            frames,
            next_index: 0,
            fps,
        })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl FrameSource for ImageSequenceSource {
    fn next_frame(&mut self) -> Option<image::RgbaImage> {
        while self.next_index < self.frames.len() {
            let path = &self.frames[self.next_index];
            self.next_index += 1;
            match image::open(path) {
                Ok(img) => return Some(img.into_rgba8()),
                // One bad frame should not end the clip.
                Err(e) => tracing::warn!(frame = %path.display(), error = %e, "undecodable frame"),
            }
        }
        None
    }

    fn fps(&self) -> f32 {
        self.fps
    }
}

/// Single audio output: background-music loop or a one-shot video track.
/// Construction failure (no device) yields a disabled output that accepts
/// every call and does nothing.
pub struct AudioOutput {
    /// Kept alive for the lifetime of the application.
    _stream: Option<OutputStream>,
    sink: Option<Sink>,
}

impl AudioOutput {
    pub fn new() -> Self {
        match OutputStreamBuilder::open_default_stream() {
            Ok(stream) => {
                let sink = Sink::connect_new(stream.mixer());
                Self {
                    _stream: Some(stream),
                    sink: Some(sink),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "audio unavailable, continuing silent");
                Self::disabled()
            }
        }
    }

    pub fn disabled() -> Self {
        Self {
            _stream: None,
            sink: None,
        }
    }

    /// Play `path` in an endless loop, replacing whatever was playing.
    pub fn play_looping(&self, path: &Path) {
        self.append(path, true);
    }

    /// Play `path` once, replacing whatever was playing.
    pub fn play(&self, path: &Path) {
        self.append(path, false);
    }

    fn append(&self, path: &Path, looping: bool) {
        let Some(sink) = &self.sink else { return };
        let file = match std::fs::File::open(path) {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!(audio = %path.display(), error = %e, "audio file unavailable");
                return;
            }
        };
        let decoder = match rodio::Decoder::new(BufReader::new(file)) {
            Ok(decoder) => decoder,
            Err(e) => {
                tracing::warn!(audio = %path.display(), error = %e, "audio file undecodable");
                return;
            }
        };
        sink.stop();
        if looping {
            sink.append(decoder.repeat_infinite());
        } else {
            sink.append(decoder);
        }
        sink.play();
    }

    pub fn stop(&self) {
        if let Some(sink) = &self.sink {
            sink.stop();
        }
    }
}

impl Default for AudioOutput {
    fn default() -> Self {
        Self::new()
    }
}
