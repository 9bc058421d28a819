use eframe::egui;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::catalog::{Catalog, CatalogLoader, Progress};
use crate::config::{Config, VideoConfig};
use crate::engine::{Supervisor, SysinfoProbe, SystemEngine};
use crate::input::{self, Dir, InputEvent};
use crate::media::{AudioOutput, FrameSource, ImageSequenceSource};
use crate::picker::{GridGeometry, NavCommand, PickerAction, PickerState, ToolbarFocus};
use crate::theme::Theme;

/// Number of tiles on the main menu.
pub const MENU_TILES: usize = 4;

const MENU_LABELS: [&str; MENU_TILES] = ["Minimize", "Showcase", "Information", "Presentations"];

/// Window size while minimized: a slim banner at the top of the screen.
const MINIMIZED_SIZE: egui::Vec2 = egui::vec2(560.0, 50.0);

/// How often the engine process is polled during a slideshow session.
const SUPERVISOR_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    /// Catalog pass in progress; input is ignored.
    Loading,
    MainMenu,
    /// Thumbnail grid deck picker.
    Picker,
    /// Fullscreen informational image.
    Overlay,
    /// Slim banner window; background music runs.
    Minimized,
}

/// Side effects requested by the control machine, executed by the shell.
/// The machine itself never touches audio, processes, or the window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModeCommand {
    PlayAttention,
    PlayFeature,
    StopVideo,
    StartBgm,
    StopBgm,
    /// Launch the deck at this absolute catalog index.
    LaunchDeck(usize),
    Minimize,
    RestoreFullscreen,
    Quit,
}

/// The kiosk's mode machine. Pure: consumes normalized input events and an
/// explicit clock, emits [`ModeCommand`]s. Pointer hit-testing stays in the
/// shell; the machine only sees its outcome through [`ControlState::activate_tile`]
/// and the picker pick methods.
pub struct ControlState {
    mode: AppMode,
    /// Selected main-menu tile, bounded to `0..MENU_TILES`, no wraparound.
    pub menu_selected: usize,
    pub picker: PickerState,
    idle_timeout: Duration,
    last_activity: Instant,
    /// A clip (attention or feature) is on screen above the current mode.
    video_active: bool,
}

impl ControlState {
    pub fn new(geometry: GridGeometry, idle_timeout: Duration, now: Instant) -> Self {
        Self {
            mode: AppMode::Loading,
            menu_selected: 0,
            picker: PickerState::new(geometry, 0),
            idle_timeout,
            last_activity: now,
            video_active: false,
        }
    }

    pub fn mode(&self) -> AppMode {
        self.mode
    }

    pub fn video_active(&self) -> bool {
        self.video_active
    }

    /// Catalog pass finished: leave loading mode and start the idle clock.
    pub fn finish_loading(&mut self, catalog_size: usize, now: Instant) {
        self.picker = PickerState::new(self.picker.geometry(), catalog_size);
        self.mode = AppMode::MainMenu;
        self.last_activity = now;
    }

    /// The clip reached its natural end.
    pub fn video_finished(&mut self, now: Instant) {
        self.video_active = false;
        self.last_activity = now;
    }

    /// Called once per frame. Fires the attention clip after the idle
    /// timeout. Idle is only evaluated in the main menu and minimized modes;
    /// dwell time in the picker or overlay is never interrupted. A running
    /// slideshow session also suppresses it.
    pub fn tick(&mut self, now: Instant, session_active: bool) -> Vec<ModeCommand> {
        if session_active || self.video_active {
            return Vec::new();
        }
        if now.duration_since(self.last_activity) < self.idle_timeout {
            return Vec::new();
        }
        match self.mode {
            AppMode::MainMenu => {
                self.video_active = true;
                self.last_activity = now;
                vec![ModeCommand::PlayAttention]
            }
            AppMode::Minimized => {
                self.mode = AppMode::MainMenu;
                self.video_active = true;
                self.last_activity = now;
                vec![
                    ModeCommand::StopBgm,
                    ModeCommand::RestoreFullscreen,
                    ModeCommand::PlayAttention,
                ]
            }
            _ => Vec::new(),
        }
    }

    pub fn handle_event(&mut self, event: InputEvent, now: Instant) -> Vec<ModeCommand> {
        self.last_activity = now;

        // Any input dismisses a running clip and does nothing else.
        if self.video_active {
            self.video_active = false;
            return vec![ModeCommand::StopVideo];
        }

        match self.mode {
            AppMode::Loading => Vec::new(),
            AppMode::MainMenu => self.handle_menu_event(event, now),
            AppMode::Picker => self.handle_picker_event(event),
            AppMode::Overlay => {
                // Waits for one confirming input; other keys only count as
                // activity.
                if event.is_confirm()
                    || event.is_cancel()
                    || matches!(event, InputEvent::PointerDown { .. })
                {
                    self.mode = AppMode::MainMenu;
                }
                Vec::new()
            }
            AppMode::Minimized => {
                self.mode = AppMode::MainMenu;
                vec![ModeCommand::StopBgm, ModeCommand::RestoreFullscreen]
            }
        }
    }

    fn handle_menu_event(&mut self, event: InputEvent, now: Instant) -> Vec<ModeCommand> {
        match event {
            InputEvent::DirectionalPress(Dir::Left) => {
                self.menu_selected = self.menu_selected.saturating_sub(1);
                Vec::new()
            }
            InputEvent::DirectionalPress(Dir::Right) => {
                self.menu_selected = (self.menu_selected + 1).min(MENU_TILES - 1);
                Vec::new()
            }
            event if event.is_confirm() => self.activate_tile(self.menu_selected, now),
            event if event.is_cancel() => vec![ModeCommand::Quit],
            _ => Vec::new(),
        }
    }

    /// Activate one main-menu tile, from keyboard confirm or a pointer hit.
    pub fn activate_tile(&mut self, tile: usize, now: Instant) -> Vec<ModeCommand> {
        self.last_activity = now;
        self.menu_selected = tile.min(MENU_TILES - 1);
        match self.menu_selected {
            0 => {
                self.mode = AppMode::Minimized;
                vec![ModeCommand::Minimize, ModeCommand::StartBgm]
            }
            1 => {
                self.video_active = true;
                vec![ModeCommand::PlayFeature]
            }
            2 => {
                self.mode = AppMode::Overlay;
                Vec::new()
            }
            _ => {
                self.picker.reset();
                self.mode = AppMode::Picker;
                Vec::new()
            }
        }
    }

    fn handle_picker_event(&mut self, event: InputEvent) -> Vec<ModeCommand> {
        let command = match event {
            InputEvent::DirectionalPress(Dir::Left) => NavCommand::Left,
            InputEvent::DirectionalPress(Dir::Right) => NavCommand::Right,
            InputEvent::DirectionalPress(Dir::Up) => NavCommand::Up,
            InputEvent::DirectionalPress(Dir::Down) => NavCommand::Down,
            event if event.is_confirm() => NavCommand::Select,
            event if event.is_cancel() => {
                self.mode = AppMode::MainMenu;
                return Vec::new();
            }
            _ => return Vec::new(),
        };
        let action = self.picker.apply(command);
        self.picker_outcome(action)
    }

    /// Pointer hit on a picker tile: select it and confirm in one step.
    pub fn pick_tile(&mut self, index: usize, now: Instant) -> Vec<ModeCommand> {
        self.last_activity = now;
        if index >= self.picker.catalog_size() {
            return Vec::new();
        }
        self.picker.selected = index;
        self.picker.toolbar = ToolbarFocus::None;
        let action = self.picker.apply(NavCommand::Select);
        self.picker_outcome(action)
    }

    /// Pointer hit on a picker toolbar button.
    pub fn pick_toolbar(&mut self, button: ToolbarFocus, now: Instant) -> Vec<ModeCommand> {
        self.last_activity = now;
        if button == ToolbarFocus::None {
            return Vec::new();
        }
        self.picker.toolbar = button;
        let action = self.picker.apply(NavCommand::Select);
        self.picker_outcome(action)
    }

    fn picker_outcome(&mut self, action: PickerAction) -> Vec<ModeCommand> {
        match action {
            PickerAction::None => Vec::new(),
            PickerAction::LaunchDeck(index) => vec![ModeCommand::LaunchDeck(index)],
            PickerAction::ReturnHome => {
                self.mode = AppMode::MainMenu;
                Vec::new()
            }
        }
    }
}

struct Toast {
    message: String,
    start: Instant,
}

impl Toast {
    fn new(message: String) -> Self {
        Self {
            message,
            start: Instant::now(),
        }
    }

    fn opacity(&self) -> f32 {
        let elapsed = self.start.elapsed().as_secs_f32();
        let duration = 3.0;
        let fade_start = 2.0;
        if elapsed < fade_start {
            1.0
        } else if elapsed < duration {
            1.0 - (elapsed - fade_start) / (duration - fade_start)
        } else {
            0.0
        }
    }

    fn is_expired(&self) -> bool {
        self.start.elapsed().as_secs_f32() >= 3.0
    }
}

/// A clip being shown: frames from a [`FrameSource`] paced by its own clock,
/// uploaded to one reused texture.
struct ActiveVideo {
    source: Box<dyn FrameSource>,
    caption: Option<String>,
    texture: Option<egui::TextureHandle>,
    next_frame_at: Instant,
    has_audio: bool,
}

impl ActiveVideo {
    fn open(config: &VideoConfig, audio: &AudioOutput) -> Option<Self> {
        let source = match ImageSequenceSource::open(&config.frames_dir, config.fps) {
            Ok(source) if !source.is_empty() => {
                tracing::debug!(
                    dir = %config.frames_dir.display(),
                    frames = source.len(),
                    "clip opened"
                );
                source
            }
            Ok(_) => {
                tracing::warn!(dir = %config.frames_dir.display(), "clip directory has no frames");
                return None;
            }
            Err(e) => {
                tracing::warn!(dir = %config.frames_dir.display(), error = %e, "clip unavailable");
                return None;
            }
        };
        let has_audio = if let Some(track) = &config.audio {
            audio.play(track);
            true
        } else {
            false
        };
        Some(Self {
            source: Box::new(source),
            caption: config.caption.clone(),
            texture: None,
            next_frame_at: Instant::now(),
            has_audio,
        })
    }

    /// Advance to the next frame when due. `false` means the clip ended.
    fn advance(&mut self, ctx: &egui::Context, now: Instant) -> bool {
        if now < self.next_frame_at {
            return true;
        }
        match self.source.next_frame() {
            Some(frame) => {
                let size = [frame.width() as usize, frame.height() as usize];
                let image = egui::ColorImage::from_rgba_unmultiplied(size, frame.as_raw());
                match &mut self.texture {
                    Some(texture) => texture.set(image, egui::TextureOptions::LINEAR),
                    None => {
                        self.texture =
                            Some(ctx.load_texture("clip_frame", image, egui::TextureOptions::LINEAR))
                    }
                }
                self.next_frame_at = now + self.source.frame_interval();
                true
            }
            None => false,
        }
    }
}

pub struct KioskApp {
    config: Config,
    theme: Theme,
    control: ControlState,
    loader: Option<CatalogLoader<SystemEngine>>,
    progress: Option<Progress>,
    catalog: Catalog,
    /// One texture slot per catalog entry, uploaded on first paint.
    tile_textures: Vec<Option<egui::TextureHandle>>,
    overlay_texture: Option<egui::TextureHandle>,
    overlay_loaded: bool,
    supervisor: Supervisor<SystemEngine, SysinfoProbe>,
    last_poll: Instant,
    audio: AudioOutput,
    video: Option<ActiveVideo>,
    toast: Option<Toast>,
}

impl KioskApp {
    fn new(
        config: Config,
        loader: CatalogLoader<SystemEngine>,
        supervisor: Supervisor<SystemEngine, SysinfoProbe>,
    ) -> Self {
        let now = Instant::now();
        let control = ControlState::new(config.grid.geometry(), config.inactivity_timeout(), now);
        Self {
            config,
            theme: Theme::kiosk(),
            control,
            loader: Some(loader),
            progress: None,
            catalog: Catalog::default(),
            tile_textures: Vec::new(),
            overlay_texture: None,
            overlay_loaded: false,
            supervisor,
            last_poll: now,
            audio: AudioOutput::new(),
            video: None,
            toast: None,
        }
    }

    /// One catalog step per frame so the progress text stays live.
    fn step_loader(&mut self, now: Instant) {
        let Some(loader) = &mut self.loader else { return };
        match loader.next() {
            Some(progress) => self.progress = Some(progress),
            None => {
                let loader = match self.loader.take() {
                    Some(loader) => loader,
                    None => return,
                };
                self.catalog = loader.finish();
                self.tile_textures = (0..self.catalog.len()).map(|_| None).collect();
                tracing::info!(decks = self.catalog.len(), "catalog ready");
                self.control.finish_loading(self.catalog.len(), now);
            }
        }
    }

    fn execute(&mut self, commands: Vec<ModeCommand>, viewport_cmds: &mut Vec<egui::ViewportCommand>, ctx: &egui::Context) {
        for command in commands {
            match command {
                ModeCommand::PlayAttention => {
                    self.start_clip(self.config.media.attention_video.clone())
                }
                ModeCommand::PlayFeature => self.start_clip(self.config.media.feature_video.clone()),
                ModeCommand::StopVideo => self.stop_clip(),
                ModeCommand::StartBgm => {
                    if let Some(track) = &self.config.media.background_music {
                        self.audio.play_looping(track);
                    }
                }
                ModeCommand::StopBgm => self.audio.stop(),
                ModeCommand::LaunchDeck(index) => self.launch_deck(index),
                ModeCommand::Minimize => {
                    viewport_cmds.push(egui::ViewportCommand::Fullscreen(false));
                    viewport_cmds.push(egui::ViewportCommand::Decorations(false));
                    viewport_cmds.push(egui::ViewportCommand::InnerSize(MINIMIZED_SIZE));
                    let monitor = ctx.input(|i| i.viewport().monitor_size);
                    if let Some(monitor) = monitor {
                        viewport_cmds.push(egui::ViewportCommand::OuterPosition(egui::pos2(
                            (monitor.x - MINIMIZED_SIZE.x) / 2.0,
                            0.0,
                        )));
                    }
                }
                ModeCommand::RestoreFullscreen => {
                    viewport_cmds.push(egui::ViewportCommand::Fullscreen(true));
                    viewport_cmds.push(egui::ViewportCommand::Focus);
                }
                ModeCommand::Quit => viewport_cmds.push(egui::ViewportCommand::Close),
            }
        }
    }

    fn start_clip(&mut self, config: Option<VideoConfig>) {
        let Some(config) = config else {
            // No material configured: nothing to show.
            self.control.video_finished(Instant::now());
            return;
        };
        match ActiveVideo::open(&config, &self.audio) {
            Some(video) => self.video = Some(video),
            None => self.control.video_finished(Instant::now()),
        }
    }

    fn stop_clip(&mut self) {
        if let Some(video) = self.video.take() {
            if video.has_audio {
                self.audio.stop();
            }
        }
    }

    fn launch_deck(&mut self, index: usize) {
        let Some(entry) = self.catalog.entries.get(index) else {
            return;
        };
        let path = entry.path.clone();
        match self.supervisor.launch(&path) {
            Ok(()) => {
                self.last_poll = Instant::now();
                self.toast = None;
            }
            Err(e) => {
                tracing::error!(deck = %path.display(), error = %e, "launch failed");
                self.toast = Some(Toast::new(format!(
                    "Could not open {}",
                    entry.display_name()
                )));
            }
        }
    }

    fn advance_video(&mut self, ctx: &egui::Context, now: Instant) {
        let Some(video) = &mut self.video else { return };
        if video.advance(ctx, now) {
            return;
        }
        let had_audio = video.has_audio;
        self.video = None;
        if had_audio {
            self.audio.stop();
        }
        self.control.video_finished(now);
    }

    // --- layout ---

    /// Main-menu tiles: one centered row.
    fn menu_tile_rects(rect: egui::Rect) -> [egui::Rect; MENU_TILES] {
        let tile_w = (rect.width() * 0.18).min(320.0);
        let tile_h = tile_w * 0.6;
        let gap = tile_w * 0.15;
        let total_w = tile_w * MENU_TILES as f32 + gap * (MENU_TILES - 1) as f32;
        let left = rect.center().x - total_w / 2.0;
        let top = rect.center().y - tile_h / 2.0;
        std::array::from_fn(|i| {
            egui::Rect::from_min_size(
                egui::pos2(left + i as f32 * (tile_w + gap), top),
                egui::vec2(tile_w, tile_h),
            )
        })
    }

    /// Picker grid area (above) and toolbar area (below).
    fn picker_areas(rect: egui::Rect) -> (egui::Rect, egui::Rect) {
        let toolbar_h = (rect.height() * 0.1).clamp(48.0, 96.0);
        let grid = egui::Rect::from_min_max(
            rect.min,
            egui::pos2(rect.max.x, rect.max.y - toolbar_h),
        );
        let toolbar = egui::Rect::from_min_max(
            egui::pos2(rect.min.x, rect.max.y - toolbar_h),
            rect.max,
        );
        (grid, toolbar)
    }

    fn picker_tile_rect(grid: egui::Rect, geometry: GridGeometry, slot: usize) -> egui::Rect {
        let margin = 24.0;
        let inner = grid.shrink(margin);
        let cols = geometry.tiles_per_row as f32;
        let rows = geometry.rows_per_page as f32;
        let gap = 16.0;
        let tile_w = (inner.width() - gap * (cols - 1.0)) / cols;
        let tile_h = (inner.height() - gap * (rows - 1.0)) / rows;
        let col = (slot % geometry.tiles_per_row) as f32;
        let row = (slot / geometry.tiles_per_row) as f32;
        egui::Rect::from_min_size(
            egui::pos2(
                inner.left() + col * (tile_w + gap),
                inner.top() + row * (tile_h + gap),
            ),
            egui::vec2(tile_w, tile_h),
        )
    }

    fn toolbar_button_rects(toolbar: egui::Rect) -> [egui::Rect; 3] {
        let button_w = (toolbar.width() * 0.16).min(260.0);
        let button_h = toolbar.height() * 0.7;
        let gap = button_w * 0.25;
        let total_w = button_w * 3.0 + gap * 2.0;
        let left = toolbar.center().x - total_w / 2.0;
        let top = toolbar.center().y - button_h / 2.0;
        std::array::from_fn(|i| {
            egui::Rect::from_min_size(
                egui::pos2(left + i as f32 * (button_w + gap), top),
                egui::vec2(button_w, button_h),
            )
        })
    }

    /// Translate a pointer press into the machine's vocabulary, using the
    /// same layout math the painter uses.
    fn pointer_commands(&mut self, pos: egui::Pos2, rect: egui::Rect, now: Instant) -> Vec<ModeCommand> {
        // While a clip covers the screen the press dismisses it and must not
        // reach the tiles hidden underneath.
        if self.control.video_active() {
            return self
                .control
                .handle_event(InputEvent::PointerDown { x: pos.x, y: pos.y }, now);
        }
        match self.control.mode() {
            AppMode::MainMenu => {
                for (i, tile) in Self::menu_tile_rects(rect).iter().enumerate() {
                    if tile.contains(pos) {
                        return self.control.activate_tile(i, now);
                    }
                }
                self.control.handle_event(InputEvent::PointerDown { x: pos.x, y: pos.y }, now)
            }
            AppMode::Picker => {
                let (grid, toolbar) = Self::picker_areas(rect);
                let geometry = self.control.picker.geometry();
                let start = self.control.picker.page_start();
                let end = self.control.picker.page_end();
                for index in start..end {
                    let tile = Self::picker_tile_rect(grid, geometry, index - start);
                    if tile.contains(pos) {
                        return self.control.pick_tile(index, now);
                    }
                }
                let buttons = [
                    ToolbarFocus::PrevPage,
                    ToolbarFocus::ReturnHome,
                    ToolbarFocus::NextPage,
                ];
                for (button_rect, button) in Self::toolbar_button_rects(toolbar).iter().zip(buttons) {
                    if button_rect.contains(pos) {
                        return self.control.pick_toolbar(button, now);
                    }
                }
                self.control.handle_event(InputEvent::PointerDown { x: pos.x, y: pos.y }, now)
            }
            _ => self.control.handle_event(InputEvent::PointerDown { x: pos.x, y: pos.y }, now),
        }
    }

    // --- painting ---

    fn draw_loading(&self, ui: &egui::Ui, rect: egui::Rect) {
        let painter = ui.painter();
        let title = painter.layout_no_wrap(
            "Preparing presentations".to_string(),
            egui::FontId::proportional(self.theme.title_size * 0.6),
            self.theme.foreground,
        );
        let title_pos = egui::pos2(
            rect.center().x - title.rect.width() / 2.0,
            rect.center().y - title.rect.height(),
        );
        painter.galley(title_pos, title, self.theme.foreground);

        let percent = self.progress.map(|p| p.percent()).unwrap_or(0);
        let text = painter.layout_no_wrap(
            format!("{percent}%"),
            egui::FontId::monospace(self.theme.label_size),
            self.theme.tile_border,
        );
        let pos = egui::pos2(
            rect.center().x - text.rect.width() / 2.0,
            rect.center().y + 24.0,
        );
        painter.galley(pos, text, self.theme.tile_border);
    }

    fn draw_main_menu(&self, ui: &egui::Ui, rect: egui::Rect) {
        let painter = ui.painter();
        let title = painter.layout_no_wrap(
            "Welcome".to_string(),
            egui::FontId::proportional(self.theme.title_size),
            self.theme.foreground,
        );
        let title_pos = egui::pos2(
            rect.center().x - title.rect.width() / 2.0,
            rect.top() + rect.height() * 0.12,
        );
        painter.galley(title_pos, title, self.theme.foreground);

        for (i, tile) in Self::menu_tile_rects(rect).iter().enumerate() {
            let selected = i == self.control.menu_selected;
            painter.rect_filled(*tile, 8.0, self.theme.tile_color(selected));
            if selected {
                painter.rect_stroke(
                    tile.expand(3.0),
                    8.0,
                    egui::Stroke::new(3.0, self.theme.tile_border),
                    egui::StrokeKind::Outside,
                );
            }
            let label = painter.layout_no_wrap(
                MENU_LABELS[i].to_string(),
                egui::FontId::proportional(self.theme.label_size),
                self.theme.foreground,
            );
            let pos = egui::pos2(
                tile.center().x - label.rect.width() / 2.0,
                tile.center().y - label.rect.height() / 2.0,
            );
            painter.galley(pos, label, self.theme.foreground);
        }
    }

    fn draw_picker(&mut self, ui: &egui::Ui, ctx: &egui::Context, rect: egui::Rect) {
        let (grid, toolbar) = Self::picker_areas(rect);
        let geometry = self.control.picker.geometry();
        let start = self.control.picker.page_start();
        let end = self.control.picker.page_end();
        let on_toolbar = self.control.picker.toolbar != ToolbarFocus::None;

        if self.catalog.is_empty() {
            let painter = ui.painter();
            let message = painter.layout_no_wrap(
                "No presentations found".to_string(),
                egui::FontId::proportional(self.theme.label_size),
                Theme::with_opacity(self.theme.foreground, 0.8),
            );
            let pos = egui::pos2(
                grid.center().x - message.rect.width() / 2.0,
                grid.center().y - message.rect.height() / 2.0,
            );
            painter.galley(pos, message, self.theme.foreground);
        }

        for index in start..end {
            let tile = Self::picker_tile_rect(grid, geometry, index - start);
            let selected = !on_toolbar && index == self.control.picker.selected;
            let painter = ui.painter();
            painter.rect_filled(tile, 6.0, self.theme.tile_color(selected));

            if let Some(texture) = self.tile_texture(ctx, index) {
                let image_rect = tile.shrink(4.0);
                painter.image(
                    texture.id(),
                    image_rect,
                    egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                    egui::Color32::WHITE,
                );
            }
            if selected {
                painter.rect_stroke(
                    tile.expand(3.0),
                    6.0,
                    egui::Stroke::new(3.0, self.theme.tile_border),
                    egui::StrokeKind::Outside,
                );
            }

            if let Some(entry) = self.catalog.entries.get(index) {
                let painter = ui.painter();
                let label = painter.layout_no_wrap(
                    entry.display_name().to_string(),
                    egui::FontId::proportional(self.theme.hint_size),
                    self.theme.foreground,
                );
                let label_h = label.rect.height() + 6.0;
                let label_rect = egui::Rect::from_min_max(
                    egui::pos2(tile.left(), tile.bottom() - label_h),
                    tile.max,
                );
                painter.rect_filled(label_rect, 0.0, self.theme.caption_background);
                let pos = egui::pos2(
                    tile.center().x - label.rect.width() / 2.0,
                    label_rect.top() + 3.0,
                );
                painter.galley(pos, label, self.theme.foreground);
            }
        }

        let page = self.control.picker.page + 1;
        let pages = self.control.picker.page_count();
        let labels = [
            "< Previous".to_string(),
            "Main Menu".to_string(),
            "Next >".to_string(),
        ];
        let focus = [
            ToolbarFocus::PrevPage,
            ToolbarFocus::ReturnHome,
            ToolbarFocus::NextPage,
        ];
        let painter = ui.painter();
        for ((button_rect, label), button) in Self::toolbar_button_rects(toolbar)
            .iter()
            .zip(labels)
            .zip(focus)
        {
            let focused = self.control.picker.toolbar == button;
            painter.rect_filled(*button_rect, 6.0, self.theme.toolbar_color(focused));
            if focused {
                painter.rect_stroke(
                    button_rect.expand(2.0),
                    6.0,
                    egui::Stroke::new(2.0, self.theme.tile_border),
                    egui::StrokeKind::Outside,
                );
            }
            let galley = painter.layout_no_wrap(
                label,
                egui::FontId::proportional(self.theme.hint_size),
                self.theme.foreground,
            );
            let pos = egui::pos2(
                button_rect.center().x - galley.rect.width() / 2.0,
                button_rect.center().y - galley.rect.height() / 2.0,
            );
            painter.galley(pos, galley, self.theme.foreground);
        }

        let counter = painter.layout_no_wrap(
            format!("{page} / {pages}"),
            egui::FontId::monospace(self.theme.hint_size),
            Theme::with_opacity(self.theme.foreground, 0.7),
        );
        let pos = egui::pos2(
            toolbar.right() - counter.rect.width() - 24.0,
            toolbar.center().y - counter.rect.height() / 2.0,
        );
        painter.galley(pos, counter, self.theme.foreground);
    }

    /// Upload the thumbnail for `index` on first use.
    fn tile_texture(&mut self, ctx: &egui::Context, index: usize) -> Option<&egui::TextureHandle> {
        if self.tile_textures.get(index)?.is_none() {
            let thumbnail = self.catalog.entries.get(index)?.thumbnail.as_ref()?;
            let rgba = thumbnail.to_rgba8();
            let size = [rgba.width() as usize, rgba.height() as usize];
            let image = egui::ColorImage::from_rgba_unmultiplied(size, rgba.as_raw());
            let texture = ctx.load_texture(
                format!("thumb_{index}"),
                image,
                egui::TextureOptions::LINEAR,
            );
            self.tile_textures[index] = Some(texture);
        }
        self.tile_textures[index].as_ref()
    }

    fn draw_overlay(&mut self, ui: &egui::Ui, ctx: &egui::Context, rect: egui::Rect) {
        if !self.overlay_loaded {
            self.overlay_loaded = true;
            if let Some(path) = &self.config.media.overlay_image {
                match image::open(path) {
                    Ok(img) => {
                        let rgba = img.to_rgba8();
                        let size = [rgba.width() as usize, rgba.height() as usize];
                        let image =
                            egui::ColorImage::from_rgba_unmultiplied(size, rgba.as_raw());
                        self.overlay_texture = Some(ctx.load_texture(
                            "overlay",
                            image,
                            egui::TextureOptions::LINEAR,
                        ));
                    }
                    Err(e) => {
                        tracing::warn!(image = %path.display(), error = %e, "overlay image unavailable")
                    }
                }
            }
        }
        let painter = ui.painter();
        match &self.overlay_texture {
            Some(texture) => {
                painter.image(
                    texture.id(),
                    rect,
                    egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                    egui::Color32::WHITE,
                );
            }
            None => {
                let text = painter.layout_no_wrap(
                    "Touch the screen to return".to_string(),
                    egui::FontId::proportional(self.theme.caption_size),
                    self.theme.foreground,
                );
                let pos = egui::pos2(
                    rect.center().x - text.rect.width() / 2.0,
                    rect.center().y - text.rect.height() / 2.0,
                );
                painter.galley(pos, text, self.theme.foreground);
            }
        }
    }

    fn draw_minimized(&self, ui: &egui::Ui, rect: egui::Rect) {
        let painter = ui.painter();
        let hint = painter.layout_no_wrap(
            "Touch here to open the presentation menu".to_string(),
            egui::FontId::proportional(self.theme.hint_size),
            self.theme.foreground,
        );
        let pos = egui::pos2(
            rect.center().x - hint.rect.width() / 2.0,
            rect.center().y - hint.rect.height() / 2.0,
        );
        painter.galley(pos, hint, self.theme.foreground);
    }

    fn draw_video(&self, ui: &egui::Ui, rect: egui::Rect) {
        let Some(video) = &self.video else { return };
        let painter = ui.painter();
        painter.rect_filled(rect, 0.0, self.theme.background);
        if let Some(texture) = &video.texture {
            let tex_size = texture.size_vec2();
            let scale = (rect.width() / tex_size.x).min(rect.height() / tex_size.y);
            let size = tex_size * scale;
            let frame_rect = egui::Rect::from_center_size(rect.center(), size);
            painter.image(
                texture.id(),
                frame_rect,
                egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                egui::Color32::WHITE,
            );
        }
        if let Some(caption) = &video.caption {
            let galley = painter.layout_no_wrap(
                caption.clone(),
                egui::FontId::proportional(self.theme.caption_size),
                self.theme.foreground,
            );
            let band_h = galley.rect.height() + 24.0;
            let band = egui::Rect::from_min_max(
                egui::pos2(rect.left(), rect.bottom() - band_h),
                rect.max,
            );
            painter.rect_filled(band, 0.0, self.theme.caption_background);
            let pos = egui::pos2(
                rect.center().x - galley.rect.width() / 2.0,
                band.top() + 12.0,
            );
            painter.galley(pos, galley, self.theme.foreground);
        }
    }

    fn draw_toast(&mut self, ui: &egui::Ui, rect: egui::Rect) {
        let expired = self.toast.as_ref().is_some_and(|t| t.is_expired());
        if expired {
            self.toast = None;
        }
        let Some(toast) = &self.toast else { return };
        let opacity = toast.opacity();
        let painter = ui.painter();
        let galley = painter.layout_no_wrap(
            toast.message.clone(),
            egui::FontId::proportional(self.theme.label_size),
            Theme::with_opacity(self.theme.foreground, opacity),
        );
        let toast_rect = egui::Rect::from_center_size(
            egui::pos2(rect.center().x, rect.bottom() - 80.0),
            galley.rect.size() + egui::vec2(32.0, 16.0),
        );
        painter.rect_filled(
            toast_rect,
            8.0,
            Theme::with_opacity(self.theme.toolbar_fill, opacity),
        );
        let pos = egui::pos2(
            toast_rect.center().x - galley.rect.width() / 2.0,
            toast_rect.center().y - galley.rect.height() / 2.0,
        );
        painter.galley(pos, galley, Theme::with_opacity(self.theme.foreground, opacity));
    }
}

impl eframe::App for KioskApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        let mut viewport_cmds: Vec<egui::ViewportCommand> = Vec::new();

        if self.control.mode() == AppMode::Loading {
            self.step_loader(now);
        }

        // Observe a running slideshow session. Input is swallowed while the
        // engine holds the screen.
        let session_active = if self.supervisor.is_active() {
            if now.duration_since(self.last_poll) >= SUPERVISOR_POLL_INTERVAL {
                self.last_poll = now;
                self.supervisor.poll();
            }
            if self.supervisor.session_ended() {
                viewport_cmds.push(egui::ViewportCommand::Focus);
                viewport_cmds.push(egui::ViewportCommand::Fullscreen(true));
            }
            self.supervisor.is_active()
        } else {
            false
        };

        let events = input::collect(ctx);
        let screen = ctx.screen_rect();
        if !session_active {
            for event in events {
                let commands = match event {
                    InputEvent::PointerDown { x, y } => {
                        self.pointer_commands(egui::pos2(x, y), screen, now)
                    }
                    event => self.control.handle_event(event, now),
                };
                self.execute(commands, &mut viewport_cmds, ctx);
            }
            let idle_commands = self.control.tick(now, session_active);
            self.execute(idle_commands, &mut viewport_cmds, ctx);
        }

        self.advance_video(ctx, now);

        let background = self.theme.background;
        egui::CentralPanel::default()
            .frame(egui::Frame::new().fill(background).inner_margin(0.0))
            .show(ctx, |ui| {
                let rect = ui.max_rect();
                if self.control.video_active() && self.video.is_some() {
                    self.draw_video(ui, rect);
                } else {
                    match self.control.mode() {
                        AppMode::Loading => self.draw_loading(ui, rect),
                        AppMode::MainMenu => self.draw_main_menu(ui, rect),
                        AppMode::Picker => self.draw_picker(ui, ctx, rect),
                        AppMode::Overlay => self.draw_overlay(ui, ctx, rect),
                        AppMode::Minimized => self.draw_minimized(ui, rect),
                    }
                }
                self.draw_toast(ui, rect);
            });

        for cmd in viewport_cmds {
            ctx.send_viewport_cmd(cmd);
        }

        // Keep ticking: clip pacing, the idle clock, and session polling all
        // need frames without input.
        let delay = if self.video.is_some() {
            self.video
                .as_ref()
                .map(|v| v.source.frame_interval())
                .unwrap_or(Duration::from_millis(33))
        } else if self.control.mode() == AppMode::Loading {
            Duration::ZERO
        } else if session_active {
            SUPERVISOR_POLL_INTERVAL
        } else {
            Duration::from_millis(250)
        };
        ctx.request_repaint_after(delay);
    }
}

pub fn run(dir: Option<PathBuf>, windowed: bool) -> anyhow::Result<()> {
    let config = Config::load_or_default();

    let decks_dir = dir
        .or_else(|| config.decks_dir.clone())
        .ok_or_else(|| anyhow::anyhow!("No deck directory given (argument or config decks_dir)"))?;
    if !decks_dir.is_dir() {
        anyhow::bail!("Deck directory not found: {}", decks_dir.display());
    }

    let cache_dir = crate::config::cache_dir()?;
    std::fs::create_dir_all(&cache_dir)?;

    let loader_engine = SystemEngine::locate(&config.engine);
    let loader = CatalogLoader::begin(&decks_dir, &cache_dir, loader_engine)?;

    let session_engine = SystemEngine::locate(&config.engine);
    let process_name = session_engine.process_name(&config.engine);
    let supervisor = Supervisor::new(
        session_engine,
        SysinfoProbe::new(),
        process_name,
        config.engine.companion.clone(),
    );

    let title = "deckbooth";
    let viewport = if windowed {
        egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 720.0])
            .with_title(title)
    } else {
        egui::ViewportBuilder::default()
            .with_fullscreen(true)
            .with_title(title)
    };

    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };

    eframe::run_native(
        title,
        options,
        Box::new(move |_cc| Ok(Box::new(KioskApp::new(config, loader, supervisor)))),
    )
    .map_err(|e| anyhow::anyhow!("{e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::KeyAction;

    fn geometry() -> GridGeometry {
        GridGeometry {
            tiles_per_row: 4,
            rows_per_page: 3,
        }
    }

    fn loaded_state(catalog_size: usize, now: Instant) -> ControlState {
        let mut state = ControlState::new(geometry(), Duration::from_secs(5), now);
        state.finish_loading(catalog_size, now);
        state
    }

    fn confirm() -> InputEvent {
        InputEvent::KeyDown(KeyAction::Confirm)
    }

    fn cancel() -> InputEvent {
        InputEvent::KeyDown(KeyAction::Cancel)
    }

    fn left() -> InputEvent {
        InputEvent::DirectionalPress(Dir::Left)
    }

    fn right() -> InputEvent {
        InputEvent::DirectionalPress(Dir::Right)
    }

    #[test]
    fn loading_ignores_input() {
        let now = Instant::now();
        let mut state = ControlState::new(geometry(), Duration::from_secs(5), now);
        assert!(state.handle_event(confirm(), now).is_empty());
        assert_eq!(state.mode(), AppMode::Loading);
        state.finish_loading(3, now);
        assert_eq!(state.mode(), AppMode::MainMenu);
    }

    #[test]
    fn menu_selection_is_bounded() {
        let now = Instant::now();
        let mut state = loaded_state(3, now);
        state.handle_event(left(), now);
        assert_eq!(state.menu_selected, 0, "no wraparound on the left edge");
        for _ in 0..10 {
            state.handle_event(right(), now);
        }
        assert_eq!(state.menu_selected, MENU_TILES - 1);
    }

    #[test]
    fn tile_activations() {
        let now = Instant::now();

        let mut state = loaded_state(3, now);
        assert_eq!(
            state.activate_tile(0, now),
            vec![ModeCommand::Minimize, ModeCommand::StartBgm]
        );
        assert_eq!(state.mode(), AppMode::Minimized);

        let mut state = loaded_state(3, now);
        assert_eq!(state.activate_tile(1, now), vec![ModeCommand::PlayFeature]);
        assert_eq!(state.mode(), AppMode::MainMenu);
        assert!(state.video_active());

        let mut state = loaded_state(3, now);
        assert!(state.activate_tile(2, now).is_empty());
        assert_eq!(state.mode(), AppMode::Overlay);

        let mut state = loaded_state(3, now);
        assert!(state.activate_tile(3, now).is_empty());
        assert_eq!(state.mode(), AppMode::Picker);
    }

    #[test]
    fn idle_timeout_fires_once_and_resets_on_input() {
        let start = Instant::now();
        let mut state = loaded_state(3, start);

        assert!(state.tick(start + Duration::from_secs(4), false).is_empty());

        let fired = state.tick(start + Duration::from_secs(5), false);
        assert_eq!(fired, vec![ModeCommand::PlayAttention]);
        assert!(state.video_active());

        // Clip running: the clock does not fire again.
        assert!(state.tick(start + Duration::from_secs(60), false).is_empty());

        // Input dismisses the clip and restarts the clock.
        let dismissed = state.handle_event(confirm(), start + Duration::from_secs(61));
        assert_eq!(dismissed, vec![ModeCommand::StopVideo]);
        assert!(state.tick(start + Duration::from_secs(65), false).is_empty());
        assert_eq!(
            state.tick(start + Duration::from_secs(66), false),
            vec![ModeCommand::PlayAttention]
        );
    }

    #[test]
    fn idle_timeout_suppressed_during_session() {
        let start = Instant::now();
        let mut state = loaded_state(3, start);
        assert!(state.tick(start + Duration::from_secs(30), true).is_empty());
    }

    #[test]
    fn idle_never_fires_in_picker_or_overlay() {
        let start = Instant::now();
        let mut state = loaded_state(3, start);
        state.activate_tile(3, start);
        assert!(state.tick(start + Duration::from_secs(60), false).is_empty());

        let mut state = loaded_state(3, start);
        state.activate_tile(2, start);
        assert!(state.tick(start + Duration::from_secs(60), false).is_empty());
    }

    #[test]
    fn minimized_idle_restores_and_plays_attention() {
        let start = Instant::now();
        let mut state = loaded_state(3, start);
        state.activate_tile(0, start);
        let commands = state.tick(start + Duration::from_secs(5), false);
        assert_eq!(
            commands,
            vec![
                ModeCommand::StopBgm,
                ModeCommand::RestoreFullscreen,
                ModeCommand::PlayAttention,
            ]
        );
        assert_eq!(state.mode(), AppMode::MainMenu);
        assert!(state.video_active());
    }

    #[test]
    fn natural_clip_end_restarts_idle_clock() {
        let start = Instant::now();
        let mut state = loaded_state(3, start);
        state.tick(start + Duration::from_secs(5), false);
        state.video_finished(start + Duration::from_secs(20));
        assert!(state.tick(start + Duration::from_secs(24), false).is_empty());
        assert_eq!(
            state.tick(start + Duration::from_secs(25), false),
            vec![ModeCommand::PlayAttention]
        );
    }

    #[test]
    fn escape_quits_from_main_menu_only() {
        let now = Instant::now();
        let mut state = loaded_state(3, now);
        assert_eq!(state.handle_event(cancel(), now), vec![ModeCommand::Quit]);

        let mut state = loaded_state(3, now);
        state.activate_tile(3, now);
        assert!(state.handle_event(cancel(), now).is_empty());
        assert_eq!(state.mode(), AppMode::MainMenu, "picker cancel returns home");
    }

    #[test]
    fn picker_entry_resets_navigation_state() {
        let now = Instant::now();
        let mut state = loaded_state(30, now);
        state.activate_tile(3, now);
        state.handle_event(right(), now);
        state.handle_event(right(), now);
        assert_eq!(state.picker.selected, 2);
        state.handle_event(cancel(), now);

        state.activate_tile(3, now);
        assert_eq!(state.picker.selected, 0);
        assert_eq!(state.picker.page, 0);
    }

    #[test]
    fn picker_confirm_launches_selected_deck() {
        let now = Instant::now();
        let mut state = loaded_state(5, now);
        state.activate_tile(3, now);
        state.handle_event(right(), now);
        assert_eq!(
            state.handle_event(confirm(), now),
            vec![ModeCommand::LaunchDeck(1)]
        );
    }

    #[test]
    fn pointer_pick_launches_directly() {
        let now = Instant::now();
        let mut state = loaded_state(5, now);
        state.activate_tile(3, now);
        assert_eq!(state.pick_tile(3, now), vec![ModeCommand::LaunchDeck(3)]);
        assert!(state.pick_tile(99, now).is_empty(), "out of range is a no-op");
    }

    #[test]
    fn pointer_toolbar_return_home() {
        let now = Instant::now();
        let mut state = loaded_state(5, now);
        state.activate_tile(3, now);
        assert!(state.pick_toolbar(ToolbarFocus::ReturnHome, now).is_empty());
        assert_eq!(state.mode(), AppMode::MainMenu);
    }

    #[test]
    fn minimized_returns_on_any_input() {
        let now = Instant::now();
        for event in [
            confirm(),
            cancel(),
            left(),
            InputEvent::KeyDown(KeyAction::Other),
            InputEvent::PointerDown { x: 1.0, y: 1.0 },
            InputEvent::ButtonPress(5),
        ] {
            let mut state = loaded_state(3, now);
            state.activate_tile(0, now);
            let commands = state.handle_event(event, now);
            assert_eq!(
                commands,
                vec![ModeCommand::StopBgm, ModeCommand::RestoreFullscreen]
            );
            assert_eq!(state.mode(), AppMode::MainMenu);
        }
    }

    #[test]
    fn overlay_waits_for_a_confirming_input() {
        let now = Instant::now();
        let mut state = loaded_state(3, now);
        state.activate_tile(2, now);

        state.handle_event(InputEvent::KeyDown(KeyAction::Other), now);
        assert_eq!(state.mode(), AppMode::Overlay, "plain keys do not dismiss");
        state.handle_event(left(), now);
        assert_eq!(state.mode(), AppMode::Overlay);

        state.handle_event(confirm(), now);
        assert_eq!(state.mode(), AppMode::MainMenu);

        let mut state = loaded_state(3, now);
        state.activate_tile(2, now);
        state.handle_event(InputEvent::PointerDown { x: 5.0, y: 5.0 }, now);
        assert_eq!(state.mode(), AppMode::MainMenu, "touch dismisses");
    }

    fn shell_app() -> (KioskApp, tempfile::TempDir, tempfile::TempDir) {
        let decks = tempfile::TempDir::new().unwrap();
        let cache = tempfile::TempDir::new().unwrap();
        let config = Config::default();
        let loader = CatalogLoader::begin(
            decks.path(),
            cache.path(),
            SystemEngine::locate(&config.engine),
        )
        .unwrap();
        let engine = SystemEngine::locate(&config.engine);
        let process_name = engine.process_name(&config.engine);
        let supervisor = Supervisor::new(engine, SysinfoProbe::new(), process_name, None);
        (KioskApp::new(config, loader, supervisor), decks, cache)
    }

    #[test]
    fn pointer_during_clip_dismisses_it_without_activating_tiles() {
        let (mut app, _decks, _cache) = shell_app();
        let now = Instant::now();
        app.control.finish_loading(6, now);
        assert_eq!(
            app.control.activate_tile(1, now),
            vec![ModeCommand::PlayFeature]
        );
        assert!(app.control.video_active());

        // Press the center of the picker tile, which sits under the clip.
        let screen = egui::Rect::from_min_size(egui::pos2(0.0, 0.0), egui::vec2(1280.0, 720.0));
        let press = KioskApp::menu_tile_rects(screen)[3].center();
        let commands = app.pointer_commands(press, screen, now);
        assert_eq!(commands, vec![ModeCommand::StopVideo]);
        assert_eq!(
            app.control.mode(),
            AppMode::MainMenu,
            "no tile activates underneath the clip"
        );
        assert!(!app.control.video_active());

        // With the clip gone the same press opens the picker.
        assert!(app.pointer_commands(press, screen, now).is_empty());
        assert_eq!(app.control.mode(), AppMode::Picker);
    }
}
