use super::column::EditorDescriptor;
use super::column::EditorKind;
use super::column::EditorOption;
use super::filter::stringify;
use super::filter::values_equal;
use crate::input::KeyCode;
use crate::input::KeyEvent;
use serde_json::Number;
use serde_json::Value;
use std::collections::BTreeSet;

/// Input state of an open cell editor.
#[derive(Clone, Debug, PartialEq)]
pub enum EditorBuffer {
    /// Free text: text, textarea, date and date-range editors.
    Text { draft: String, multiline: bool },
    /// Numeric draft, parsed on every read.
    Number { draft: String },
    /// Checkbox and switch.
    Toggle(bool),
    /// Dropdown and radio editors: at most one option.
    Choice {
        options: Vec<EditorOption>,
        index: Option<usize>,
    },
    /// Checkbox/switch groups: any subset of the options.
    Multi {
        options: Vec<EditorOption>,
        cursor: usize,
        chosen: BTreeSet<usize>,
    },
}

impl EditorBuffer {
    /// Seeds a buffer from the cell's current value.
    pub fn open(editor: &EditorDescriptor, current: Option<&Value>) -> Self {
        match editor.kind {
            EditorKind::Text | EditorKind::Date | EditorKind::DateRange => EditorBuffer::Text {
                draft: stringify(current),
                multiline: false,
            },
            EditorKind::Textarea => EditorBuffer::Text {
                draft: stringify(current),
                multiline: true,
            },
            EditorKind::Number => EditorBuffer::Number {
                draft: stringify(current),
            },
            EditorKind::Checkbox | EditorKind::Switch => {
                EditorBuffer::Toggle(matches!(current, Some(Value::Bool(true))))
            }
            EditorKind::Dropdown | EditorKind::Radio | EditorKind::RadioGroup => {
                let index = current.and_then(|cur| {
                    editor
                        .options
                        .iter()
                        .position(|o| values_equal(&o.value, cur))
                });
                EditorBuffer::Choice {
                    options: editor.options.clone(),
                    index,
                }
            }
            EditorKind::CheckboxGroup | EditorKind::SwitchGroup => {
                let chosen = match current {
                    Some(Value::Array(items)) => editor
                        .options
                        .iter()
                        .enumerate()
                        .filter(|(_, o)| items.iter().any(|v| values_equal(&o.value, v)))
                        .map(|(i, _)| i)
                        .collect(),
                    _ => BTreeSet::new(),
                };
                EditorBuffer::Multi {
                    options: editor.options.clone(),
                    cursor: 0,
                    chosen,
                }
            }
        }
    }

    /// Pending value. `Err` carries a parse message for drafts that are not values yet.
    pub fn value(&self) -> Result<Value, String> {
        match self {
            EditorBuffer::Text { draft, .. } => Ok(Value::String(draft.clone())),
            EditorBuffer::Number { draft } => {
                let trimmed = draft.trim();
                if trimmed.is_empty() {
                    return Ok(Value::Null);
                }
                if let Ok(i) = trimmed.parse::<i64>() {
                    return Ok(Value::Number(i.into()));
                }
                trimmed
                    .parse::<f64>()
                    .ok()
                    .and_then(Number::from_f64)
                    .map(Value::Number)
                    .ok_or_else(|| "Must be a number".to_string())
            }
            EditorBuffer::Toggle(on) => Ok(Value::Bool(*on)),
            EditorBuffer::Choice { options, index } => Ok(index
                .and_then(|i| options.get(i))
                .map(|o| o.value.clone())
                .unwrap_or(Value::Null)),
            EditorBuffer::Multi {
                options, chosen, ..
            } => Ok(Value::Array(
                chosen
                    .iter()
                    .filter_map(|i| options.get(*i))
                    .map(|o| o.value.clone())
                    .collect(),
            )),
        }
    }

    /// Whether the editor consumes `key` (as opposed to letting the grid navigate).
    pub fn captures(&self, key: &KeyEvent) -> bool {
        match self {
            EditorBuffer::Text { .. } | EditorBuffer::Number { .. } => {
                key.typed_char().is_some()
                    || matches!(
                        key.code,
                        KeyCode::Backspace
                            | KeyCode::Delete
                            | KeyCode::Left
                            | KeyCode::Right
                            | KeyCode::Home
                            | KeyCode::End
                    )
            }
            EditorBuffer::Toggle(_) => matches!(key.code, KeyCode::Char(' ')),
            EditorBuffer::Choice { .. } | EditorBuffer::Multi { .. } => matches!(
                key.code,
                KeyCode::Char(' ') | KeyCode::Left | KeyCode::Right
            ),
        }
    }

    /// Applies one key. Returns `true` when the pending value may have changed.
    pub fn handle_key(&mut self, key: &KeyEvent) -> bool {
        if !self.captures(key) {
            return false;
        }
        match self {
            EditorBuffer::Text { draft, .. } | EditorBuffer::Number { draft } => match key.code {
                KeyCode::Char(c) => {
                    draft.push(c);
                    true
                }
                KeyCode::Backspace | KeyCode::Delete => draft.pop().is_some(),
                _ => false,
            },
            EditorBuffer::Toggle(on) => {
                *on = !*on;
                true
            }
            EditorBuffer::Choice { options, index } => {
                if options.is_empty() {
                    return false;
                }
                let last = options.len() - 1;
                let next = match (key.code.clone(), *index) {
                    (KeyCode::Left, Some(i)) => i.saturating_sub(1),
                    (KeyCode::Left, None) => last,
                    (KeyCode::Right, Some(i)) | (KeyCode::Char(' '), Some(i)) => {
                        if i >= last { 0 } else { i + 1 }
                    }
                    _ => 0,
                };
                let changed = *index != Some(next);
                *index = Some(next);
                changed
            }
            EditorBuffer::Multi {
                options,
                cursor,
                chosen,
            } => {
                if options.is_empty() {
                    return false;
                }
                match key.code {
                    KeyCode::Left => {
                        *cursor = cursor.saturating_sub(1);
                        false
                    }
                    KeyCode::Right => {
                        *cursor = (*cursor + 1).min(options.len() - 1);
                        false
                    }
                    _ => {
                        if !chosen.remove(&*cursor) {
                            chosen.insert(*cursor);
                        }
                        true
                    }
                }
            }
        }
    }

    /// Accepts pasted text into text-like drafts.
    pub fn paste(&mut self, text: &str) -> bool {
        match self {
            EditorBuffer::Text { draft, multiline } => {
                if *multiline {
                    draft.push_str(text);
                } else {
                    draft.extend(text.chars().filter(|c| *c != '\n' && *c != '\r'));
                }
                true
            }
            EditorBuffer::Number { draft } => {
                draft.push_str(text.trim());
                true
            }
            _ => false,
        }
    }

    /// Single-line rendering of the editor state.
    pub fn display(&self) -> String {
        match self {
            EditorBuffer::Text { draft, .. } | EditorBuffer::Number { draft } => draft.clone(),
            EditorBuffer::Toggle(true) => "[x]".to_string(),
            EditorBuffer::Toggle(false) => "[ ]".to_string(),
            EditorBuffer::Choice { options, index } => {
                let label = index
                    .and_then(|i| options.get(i))
                    .map(|o| o.label.as_str())
                    .unwrap_or("-");
                format!("< {label} >")
            }
            EditorBuffer::Multi {
                options,
                cursor,
                chosen,
            } => options
                .iter()
                .enumerate()
                .map(|(i, o)| {
                    let mark = if chosen.contains(&i) { "x" } else { " " };
                    let focus = if i == *cursor { ">" } else { "" };
                    format!("{focus}[{mark}]{}", o.label)
                })
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}
