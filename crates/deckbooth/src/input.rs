//! Normalized input events.
//!
//! The state machines never look at raw window events; they consume this
//! stream, which folds keyboard, pointer, and (forwarded) controller input
//! into one shape. Controller-to-key mapping during a slideshow is the
//! companion process's business and does not pass through here.

use eframe::egui;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dir {
    Up,
    Down,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Confirm,
    Cancel,
    /// Any other key; counts as activity but nothing else.
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    KeyDown(KeyAction),
    PointerDown { x: f32, y: f32 },
    DirectionalPress(Dir),
    ButtonPress(u8),
}

impl InputEvent {
    /// Confirm from keyboard or the primary controller button.
    pub fn is_confirm(&self) -> bool {
        matches!(
            self,
            InputEvent::KeyDown(KeyAction::Confirm) | InputEvent::ButtonPress(0)
        )
    }

    /// Cancel from keyboard or the secondary controller button.
    pub fn is_cancel(&self) -> bool {
        matches!(
            self,
            InputEvent::KeyDown(KeyAction::Cancel) | InputEvent::ButtonPress(1)
        )
    }
}

/// Map one raw egui event into the normalized stream, if it is recognized.
pub fn map_event(event: &egui::Event) -> Option<InputEvent> {
    match event {
        egui::Event::Key {
            key,
            pressed: true,
            repeat: false,
            ..
        } => Some(match key {
            egui::Key::ArrowUp => InputEvent::DirectionalPress(Dir::Up),
            egui::Key::ArrowDown => InputEvent::DirectionalPress(Dir::Down),
            egui::Key::ArrowLeft => InputEvent::DirectionalPress(Dir::Left),
            egui::Key::ArrowRight => InputEvent::DirectionalPress(Dir::Right),
            egui::Key::Enter | egui::Key::Space => InputEvent::KeyDown(KeyAction::Confirm),
            egui::Key::Escape => InputEvent::KeyDown(KeyAction::Cancel),
            _ => InputEvent::KeyDown(KeyAction::Other),
        }),
        egui::Event::PointerButton {
            pos,
            button: egui::PointerButton::Primary,
            pressed: true,
            ..
        } => Some(InputEvent::PointerDown { x: pos.x, y: pos.y }),
        _ => None,
    }
}

/// Drain this frame's raw input into normalized events.
pub fn collect(ctx: &egui::Context) -> Vec<InputEvent> {
    ctx.input(|i| i.events.iter().filter_map(map_event).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(key: egui::Key, pressed: bool, repeat: bool) -> egui::Event {
        egui::Event::Key {
            key,
            physical_key: None,
            pressed,
            repeat,
            modifiers: egui::Modifiers::default(),
        }
    }

    #[test]
    fn arrows_become_directional_presses() {
        assert_eq!(
            map_event(&key(egui::Key::ArrowLeft, true, false)),
            Some(InputEvent::DirectionalPress(Dir::Left))
        );
        assert_eq!(
            map_event(&key(egui::Key::ArrowDown, true, false)),
            Some(InputEvent::DirectionalPress(Dir::Down))
        );
    }

    #[test]
    fn releases_and_repeats_are_ignored() {
        assert_eq!(map_event(&key(egui::Key::Enter, false, false)), None);
        assert_eq!(map_event(&key(egui::Key::ArrowUp, true, true)), None);
    }

    #[test]
    fn confirm_and_cancel_mapping() {
        assert!(map_event(&key(egui::Key::Enter, true, false))
            .unwrap()
            .is_confirm());
        assert!(map_event(&key(egui::Key::Space, true, false))
            .unwrap()
            .is_confirm());
        assert!(map_event(&key(egui::Key::Escape, true, false))
            .unwrap()
            .is_cancel());
        assert!(InputEvent::ButtonPress(0).is_confirm());
        assert!(InputEvent::ButtonPress(1).is_cancel());
        assert!(!InputEvent::ButtonPress(7).is_confirm());
    }

    #[test]
    fn unrecognized_keys_still_count_as_activity() {
        assert_eq!(
            map_event(&key(egui::Key::H, true, false)),
            Some(InputEvent::KeyDown(KeyAction::Other))
        );
    }

    #[test]
    fn pointer_press_carries_position() {
        let event = egui::Event::PointerButton {
            pos: egui::pos2(12.0, 34.0),
            button: egui::PointerButton::Primary,
            pressed: true,
            modifiers: egui::Modifiers::default(),
        };
        assert_eq!(
            map_event(&event),
            Some(InputEvent::PointerDown { x: 12.0, y: 34.0 })
        );
    }
}
