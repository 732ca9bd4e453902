//! Conversions from crossterm events into [`InputEvent`]s.

use crossterm::event as ct;

use crate::input::InputEvent;
use crate::input::KeyCode;
use crate::input::KeyEvent;
use crate::input::KeyModifiers;
use crate::input::MouseButton;
use crate::input::MouseEvent;
use crate::input::MouseEventKind;

/// Converts a terminal event. Key releases and repeats, focus and resize events map to `None`;
/// hosts handle resizes by re-rendering.
pub fn input_event_from_crossterm(ev: ct::Event) -> Option<InputEvent> {
    match ev {
        ct::Event::Key(key) if key.kind == ct::KeyEventKind::Press => {
            key_event_from_crossterm(key).map(InputEvent::Key)
        }
        ct::Event::Paste(text) => Some(InputEvent::Paste(text)),
        ct::Event::Mouse(mouse) => mouse_event_from_crossterm(mouse).map(InputEvent::Mouse),
        _ => None,
    }
}

pub fn key_event_from_crossterm(key: ct::KeyEvent) -> Option<KeyEvent> {
    let code = match key.code {
        ct::KeyCode::Char(c) => KeyCode::Char(c),
        ct::KeyCode::Enter => KeyCode::Enter,
        ct::KeyCode::Backspace => KeyCode::Backspace,
        ct::KeyCode::Delete => KeyCode::Delete,
        ct::KeyCode::Tab | ct::KeyCode::BackTab => KeyCode::Tab,
        ct::KeyCode::Esc => KeyCode::Esc,
        ct::KeyCode::Left => KeyCode::Left,
        ct::KeyCode::Right => KeyCode::Right,
        ct::KeyCode::Up => KeyCode::Up,
        ct::KeyCode::Down => KeyCode::Down,
        ct::KeyCode::Home => KeyCode::Home,
        ct::KeyCode::End => KeyCode::End,
        ct::KeyCode::PageUp => KeyCode::PageUp,
        ct::KeyCode::PageDown => KeyCode::PageDown,
        _ => return None,
    };
    Some(KeyEvent::new(code).with_modifiers(modifiers(key.modifiers)))
}

/// Converts a mouse event. Horizontal wheel and plain moves are not used by the table.
pub fn mouse_event_from_crossterm(mouse: ct::MouseEvent) -> Option<MouseEvent> {
    let kind = match mouse.kind {
        ct::MouseEventKind::Down(b) => MouseEventKind::Down(button(b)),
        ct::MouseEventKind::Drag(b) => MouseEventKind::Drag(button(b)),
        ct::MouseEventKind::Up(b) => MouseEventKind::Up(button(b)),
        ct::MouseEventKind::ScrollUp => MouseEventKind::ScrollUp,
        ct::MouseEventKind::ScrollDown => MouseEventKind::ScrollDown,
        _ => return None,
    };
    Some(
        MouseEvent::new(mouse.column, mouse.row, kind)
            .with_modifiers(modifiers(mouse.modifiers)),
    )
}

fn modifiers(m: ct::KeyModifiers) -> KeyModifiers {
    KeyModifiers {
        shift: m.contains(ct::KeyModifiers::SHIFT),
        ctrl: m.contains(ct::KeyModifiers::CONTROL),
        alt: m.contains(ct::KeyModifiers::ALT),
    }
}

fn button(b: ct::MouseButton) -> MouseButton {
    match b {
        ct::MouseButton::Left => MouseButton::Left,
        ct::MouseButton::Right => MouseButton::Right,
        ct::MouseButton::Middle => MouseButton::Middle,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ctrl_s_keeps_its_modifier() {
        let ev = ct::Event::Key(ct::KeyEvent::new(
            ct::KeyCode::Char('s'),
            ct::KeyModifiers::CONTROL,
        ));
        let Some(InputEvent::Key(key)) = input_event_from_crossterm(ev) else {
            panic!("expected a key event");
        };
        assert_eq!(key.code, KeyCode::Char('s'));
        assert!(key.modifiers.ctrl);
        assert_eq!(key.typed_char(), None);
    }

    #[test]
    fn releases_are_dropped() {
        let mut key = ct::KeyEvent::new(ct::KeyCode::Enter, ct::KeyModifiers::NONE);
        key.kind = ct::KeyEventKind::Release;
        assert_eq!(input_event_from_crossterm(ct::Event::Key(key)), None);
    }

    #[test]
    fn shift_click_maps_coordinates() {
        let ev = ct::Event::Mouse(ct::MouseEvent {
            kind: ct::MouseEventKind::Down(ct::MouseButton::Left),
            column: 7,
            row: 3,
            modifiers: ct::KeyModifiers::SHIFT,
        });
        let expected = MouseEvent::new(7, 3, MouseEventKind::Down(MouseButton::Left))
            .with_modifiers(KeyModifiers::shift());
        assert_eq!(input_event_from_crossterm(ev), Some(InputEvent::Mouse(expected)));
    }
}
