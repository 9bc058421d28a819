use eframe::egui::Color32;

/// Fixed kiosk palette. The display runs unattended on one screen, so there
/// is no light/dark switching; contrast is tuned for a projector at distance.
#[derive(Debug, Clone)]
pub struct Theme {
    pub background: Color32,
    pub foreground: Color32,
    pub tile_fill: Color32,
    pub tile_selected: Color32,
    pub tile_border: Color32,
    pub toolbar_fill: Color32,
    pub toolbar_focused: Color32,
    pub caption_background: Color32,
    pub title_size: f32,
    pub label_size: f32,
    pub caption_size: f32,
    pub hint_size: f32,
}

impl Theme {
    pub fn kiosk() -> Self {
        Self {
            background: Color32::BLACK,
            foreground: Color32::WHITE,
            tile_fill: Color32::from_rgb(0x00, 0x00, 0x96),
            tile_selected: Color32::from_rgb(0xC8, 0x00, 0x00),
            tile_border: Color32::from_rgb(0xFF, 0xD7, 0x00),
            toolbar_fill: Color32::from_rgb(0x32, 0x32, 0x32),
            toolbar_focused: Color32::from_rgb(0xC8, 0x00, 0x00),
            caption_background: Color32::from_rgba_unmultiplied(0, 0, 0, 0xB4),
            title_size: 64.0,
            label_size: 28.0,
            caption_size: 36.0,
            hint_size: 18.0,
        }
    }

    /// Apply opacity to a color
    pub fn with_opacity(color: Color32, opacity: f32) -> Color32 {
        Color32::from_rgba_unmultiplied(color.r(), color.g(), color.b(), (opacity * 255.0) as u8)
    }

    pub fn tile_color(&self, selected: bool) -> Color32 {
        if selected {
            self.tile_selected
        } else {
            self.tile_fill
        }
    }

    pub fn toolbar_color(&self, focused: bool) -> Color32 {
        if focused {
            self.toolbar_focused
        } else {
            self.toolbar_fill
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::kiosk()
    }
}
