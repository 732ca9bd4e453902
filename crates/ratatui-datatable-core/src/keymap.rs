use crate::input::KeyCode;
use crate::input::KeyEvent;
use crate::input::KeyModifiers;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Binding {
    pub keys: Vec<KeyEvent>,
    pub help_key: String,
    pub help_desc: String,
}

impl Binding {
    pub fn new(
        help_key: impl Into<String>,
        help_desc: impl Into<String>,
        keys: Vec<KeyEvent>,
    ) -> Self {
        Self {
            keys,
            help_key: help_key.into(),
            help_desc: help_desc.into(),
        }
    }

    pub fn matches(&self, event: &KeyEvent) -> bool {
        self.keys.iter().any(|k| key_event_matches(k, event))
    }
}

pub fn key_event_matches(pattern: &KeyEvent, event: &KeyEvent) -> bool {
    pattern.code == event.code && modifiers_match(pattern.modifiers, event.modifiers)
}

fn modifiers_match(pattern: KeyModifiers, event: KeyModifiers) -> bool {
    pattern.shift == event.shift && pattern.ctrl == event.ctrl && pattern.alt == event.alt
}

pub fn key_char(c: char) -> KeyEvent {
    KeyEvent::new(KeyCode::Char(c))
}

pub fn key_ctrl(c: char) -> KeyEvent {
    KeyEvent::new(KeyCode::Char(c)).with_modifiers(KeyModifiers {
        shift: false,
        ctrl: true,
        alt: false,
    })
}

fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code)
}

/// Key bindings of a data table.
///
/// Only `commit` and `cancel` are consulted while a cell editor is open; every other key goes to
/// the editor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableKeymap {
    pub up: Binding,
    pub down: Binding,
    pub left: Binding,
    pub right: Binding,
    pub commit: Binding,
    pub cancel: Binding,
    pub toggle_select: Binding,
    pub toggle_expand: Binding,
    pub sort: Binding,
    pub next_page: Binding,
    pub previous_page: Binding,
    pub first_page: Binding,
    pub last_page: Binding,
    pub add_row: Binding,
    pub save_row: Binding,
    pub delete_row: Binding,
}

impl Default for TableKeymap {
    fn default() -> Self {
        Self {
            up: Binding::new("↑", "up", vec![key(KeyCode::Up)]),
            down: Binding::new("↓", "down", vec![key(KeyCode::Down)]),
            left: Binding::new("←", "left", vec![key(KeyCode::Left)]),
            right: Binding::new("→", "right", vec![key(KeyCode::Right)]),
            commit: Binding::new("enter", "edit/commit", vec![key(KeyCode::Enter)]),
            cancel: Binding::new("esc", "cancel", vec![key(KeyCode::Esc)]),
            toggle_select: Binding::new("space", "select row", vec![key_char(' ')]),
            toggle_expand: Binding::new("e", "expand", vec![key_char('e')]),
            sort: Binding::new("s", "sort", vec![key_char('s')]),
            next_page: Binding::new(
                "pgdn/]",
                "next page",
                vec![key(KeyCode::PageDown), key_char(']')],
            ),
            previous_page: Binding::new(
                "pgup/[",
                "prev page",
                vec![key(KeyCode::PageUp), key_char('[')],
            ),
            first_page: Binding::new("home", "first page", vec![key(KeyCode::Home)]),
            last_page: Binding::new("end", "last page", vec![key(KeyCode::End)]),
            add_row: Binding::new("a", "add row", vec![key_char('a')]),
            save_row: Binding::new("ctrl-s", "save row", vec![key_ctrl('s')]),
            delete_row: Binding::new("del", "delete row", vec![key(KeyCode::Delete)]),
        }
    }
}

impl TableKeymap {
    /// Bindings in the order they are listed in help text.
    pub fn bindings(&self) -> [&Binding; 16] {
        [
            &self.up,
            &self.down,
            &self.left,
            &self.right,
            &self.commit,
            &self.cancel,
            &self.toggle_select,
            &self.toggle_expand,
            &self.sort,
            &self.next_page,
            &self.previous_page,
            &self.first_page,
            &self.last_page,
            &self.add_row,
            &self.save_row,
            &self.delete_row,
        ]
    }

    /// One-line help, e.g. `enter edit/commit · esc cancel`.
    pub fn help_line(&self) -> String {
        self.bindings()
            .iter()
            .map(|b| format!("{} {}", b.help_key, b.help_desc))
            .collect::<Vec<_>>()
            .join(" · ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_matches_exact_modifiers() {
        let b = Binding::new("q", "quit", vec![key_char('q')]);
        assert!(b.matches(&key_char('q')));
        assert!(!b.matches(&key_ctrl('q')));
    }

    #[test]
    fn save_needs_ctrl() {
        let keymap = TableKeymap::default();
        assert!(keymap.save_row.matches(&key_ctrl('s')));
        assert!(!keymap.save_row.matches(&key_char('s')));
        assert!(keymap.sort.matches(&key_char('s')));
    }
}
