use super::filter::FilterFn;
use super::row::Row;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

pub const SELECT_COLUMN_ID: &str = "__select";
pub const EXPAND_COLUMN_ID: &str = "__expand";
pub const ACTIONS_COLUMN_ID: &str = "__actions";

/// Column identity. For data columns this is the field path string.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnId(String);

impl ColumnId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn select() -> Self {
        Self::new(SELECT_COLUMN_ID)
    }

    pub fn expand() -> Self {
        Self::new(EXPAND_COLUMN_ID)
    }

    pub fn actions() -> Self {
        Self::new(ACTIONS_COLUMN_ID)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reserved ids belong to structural columns (selection, expander, actions).
    pub fn is_reserved(&self) -> bool {
        matches!(
            self.0.as_str(),
            SELECT_COLUMN_ID | EXPAND_COLUMN_ID | ACTIONS_COLUMN_ID
        )
    }
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ColumnId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinSide {
    Left,
    Right,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// The closed set of editors a column can use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EditorKind {
    Text,
    Number,
    Textarea,
    Date,
    DateRange,
    Dropdown,
    Checkbox,
    Radio,
    Switch,
    CheckboxGroup,
    RadioGroup,
    SwitchGroup,
}

/// A selectable option for choice editors and select filters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EditorOption {
    pub label: String,
    pub value: Value,
}

impl EditorOption {
    pub fn new(label: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RuleKind {
    Required,
    Pattern { pattern: String },
    MinLength { min: usize },
    MaxLength { max: usize },
    Min { min: f64 },
    Max { max: f64 },
    Email,
    /// Value must differ from the same field in every other row.
    Unique,
}

/// One declarative validation rule. `message` overrides the default text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(flatten)]
    pub kind: RuleKind,
    #[serde(default)]
    pub message: Option<String>,
}

impl Rule {
    pub fn new(kind: RuleKind) -> Self {
        Self {
            kind,
            message: None,
        }
    }

    pub fn required() -> Self {
        Self::new(RuleKind::Required)
    }

    pub fn unique() -> Self {
        Self::new(RuleKind::Unique)
    }

    pub fn pattern(pattern: impl Into<String>) -> Self {
        Self::new(RuleKind::Pattern {
            pattern: pattern.into(),
        })
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EditorDescriptor {
    pub kind: EditorKind,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub options: Vec<EditorOption>,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl EditorDescriptor {
    pub fn new(kind: EditorKind) -> Self {
        Self {
            kind,
            disabled: false,
            options: Vec::new(),
            rules: Vec::new(),
        }
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn with_options(mut self, options: Vec<EditorOption>) -> Self {
        self.options = options;
        self
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterKind {
    #[default]
    Text,
    Select,
    MultiSelect,
    Range,
    Checkbox,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilterDescriptor {
    #[serde(default)]
    pub kind: FilterKind,
    #[serde(default)]
    pub predicate: FilterFn,
    #[serde(default)]
    pub options: Vec<EditorOption>,
}

impl FilterDescriptor {
    pub fn text(predicate: FilterFn) -> Self {
        Self {
            kind: FilterKind::Text,
            predicate,
            options: Vec::new(),
        }
    }
}

/// Reads a cell value out of a row. Overrides the field path when present.
#[derive(Clone)]
pub struct CellAccessor(pub Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>);

/// Formats a cell for display.
#[derive(Clone)]
pub struct CellRenderer(pub Arc<dyn Fn(Option<&Value>, &Row) -> String + Send + Sync>);

/// Returns `true` when a cell must not enter edit mode.
#[derive(Clone)]
pub struct CellPredicate(pub Arc<dyn Fn(&Row) -> bool + Send + Sync>);

impl CellAccessor {
    pub fn new(f: impl Fn(&Value) -> Option<Value> + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }
}

impl CellRenderer {
    pub fn new(f: impl Fn(Option<&Value>, &Row) -> String + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }
}

impl CellPredicate {
    pub fn new(f: impl Fn(&Row) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }
}

macro_rules! opaque_debug {
    ($($ty:ident),*) => {
        $(impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(concat!(stringify!($ty), "(..)"))
            }
        })*
    };
}

opaque_debug!(CellAccessor, CellRenderer, CellPredicate);

/// Host-authored column configuration.
///
/// Closures (`accessor`, `renderer`, `disabled`) are skipped by serde, so a list of settings can be
/// loaded from JSON and the closures attached afterwards.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnSetting {
    pub title: String,
    pub field: String,
    #[serde(skip)]
    pub accessor: Option<CellAccessor>,
    #[serde(default)]
    pub sort: Option<SortDirection>,
    #[serde(default)]
    pub pin: Option<PinSide>,
    #[serde(default = "default_true")]
    pub draggable: bool,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub width: Option<u16>,
    #[serde(default)]
    pub min_width: Option<u16>,
    #[serde(default)]
    pub max_width: Option<u16>,
    #[serde(default)]
    pub align: CellAlign,
    #[serde(skip)]
    pub renderer: Option<CellRenderer>,
    #[serde(skip)]
    pub disabled: Option<CellPredicate>,
    #[serde(default)]
    pub editor: Option<EditorDescriptor>,
    #[serde(default)]
    pub filter: Option<FilterDescriptor>,
    #[serde(default)]
    pub group_title: Option<String>,
    #[serde(default)]
    pub order: Option<u32>,
}

fn default_true() -> bool {
    true
}

impl ColumnSetting {
    pub fn new(title: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            field: field.into(),
            accessor: None,
            sort: None,
            pin: None,
            draggable: true,
            hidden: false,
            width: None,
            min_width: None,
            max_width: None,
            align: CellAlign::Left,
            renderer: None,
            disabled: None,
            editor: None,
            filter: None,
            group_title: None,
            order: None,
        }
    }

    pub fn with_editor(mut self, editor: EditorDescriptor) -> Self {
        self.editor = Some(editor);
        self
    }

    pub fn with_filter(mut self, filter: FilterDescriptor) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_width(mut self, width: u16) -> Self {
        self.width = Some(width);
        self
    }

    pub fn with_group(mut self, group_title: impl Into<String>) -> Self {
        self.group_title = Some(group_title.into());
        self
    }

    pub fn with_order(mut self, order: u32) -> Self {
        self.order = Some(order);
        self
    }

    pub fn with_sort(mut self, sort: SortDirection) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn with_pin(mut self, pin: PinSide) -> Self {
        self.pin = Some(pin);
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn with_disabled(mut self, f: impl Fn(&Row) -> bool + Send + Sync + 'static) -> Self {
        self.disabled = Some(CellPredicate::new(f));
        self
    }

    pub fn with_renderer(
        mut self,
        f: impl Fn(Option<&Value>, &Row) -> String + Send + Sync + 'static,
    ) -> Self {
        self.renderer = Some(CellRenderer::new(f));
        self
    }

    pub fn with_accessor(
        mut self,
        f: impl Fn(&Value) -> Option<Value> + Send + Sync + 'static,
    ) -> Self {
        self.accessor = Some(CellAccessor::new(f));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn settings_load_from_json() {
        let raw = json!([
            {
                "title": "Last name",
                "field": "name.last",
                "sort": "desc",
                "editor": {
                    "kind": "text",
                    "rules": [{ "kind": "required" }, { "kind": "unique", "message": "taken" }]
                },
                "filter": { "predicate": "includes-string-sensitive" }
            }
        ]);
        let settings: Vec<ColumnSetting> = serde_json::from_value(raw).unwrap();
        let s = &settings[0];
        assert_eq!(s.field, "name.last");
        assert!(s.draggable);
        assert_eq!(s.sort, Some(SortDirection::Desc));
        let editor = s.editor.as_ref().unwrap();
        assert_eq!(editor.rules[1].kind, RuleKind::Unique);
        assert_eq!(editor.rules[1].message.as_deref(), Some("taken"));
        assert_eq!(
            s.filter.as_ref().unwrap().predicate,
            FilterFn::IncludesStringSensitive
        );
    }

    #[test]
    fn reserved_ids_are_recognized() {
        assert!(ColumnId::select().is_reserved());
        assert!(ColumnId::actions().is_reserved());
        assert!(!ColumnId::new("name").is_reserved());
    }
}
