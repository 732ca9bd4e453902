//! Turns host [`ColumnSetting`]s into column definitions and the initial [`ColumnState`].

use super::column::CellAccessor;
use super::column::CellAlign;
use super::column::CellPredicate;
use super::column::CellRenderer;
use super::column::ColumnId;
use super::column::ColumnSetting;
use super::column::EditorDescriptor;
use super::column::FilterDescriptor;
use super::column::PinSide;
use super::column::SortDirection;
use super::error::ConfigError;
use super::path::FieldPath;
use super::row::Row;
use super::rules::RuleSet;
use super::state::ColumnPinning;
use super::state::ColumnState;
use super::state::SortEntry;
use serde_json::Value;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::collections::HashSet;

/// Widths used when laying out columns, in terminal cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SizingOptions {
    /// Floor for columns without an explicit width. Columns keep it even if that overflows.
    pub min_flex_width: u16,
    pub selection_width: u16,
    pub expander_width: u16,
    pub actions_width: u16,
}

impl Default for SizingOptions {
    fn default() -> Self {
        Self {
            min_flex_width: 12,
            selection_width: 4,
            expander_width: 3,
            actions_width: 10,
        }
    }
}

/// Which structural (reserved) columns the table shows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StructuralColumns {
    pub selection: bool,
    pub expander: bool,
    pub actions: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    Data,
    Select,
    Expand,
    Actions,
}

/// A compiled, render-ready column.
#[derive(Clone, Debug)]
pub struct ColumnDef {
    pub id: ColumnId,
    pub kind: ColumnKind,
    pub title: String,
    pub path: Option<FieldPath>,
    pub accessor: Option<CellAccessor>,
    pub renderer: Option<CellRenderer>,
    pub disabled: Option<CellPredicate>,
    pub editor: Option<EditorDescriptor>,
    pub rules: RuleSet,
    pub filter: Option<FilterDescriptor>,
    pub group: Option<String>,
    pub align: CellAlign,
    pub draggable: bool,
    pub width: Option<u16>,
    pub min_width: Option<u16>,
    pub max_width: Option<u16>,
}

impl ColumnDef {
    fn structural(kind: ColumnKind) -> Self {
        let (id, title) = match kind {
            ColumnKind::Select => (ColumnId::select(), ""),
            ColumnKind::Expand => (ColumnId::expand(), ""),
            ColumnKind::Actions => (ColumnId::actions(), "Actions"),
            ColumnKind::Data => (ColumnId::new(""), ""),
        };
        Self {
            id,
            kind,
            title: title.to_string(),
            path: None,
            accessor: None,
            renderer: None,
            disabled: None,
            editor: None,
            rules: RuleSet::default(),
            filter: None,
            group: None,
            align: CellAlign::Left,
            draggable: false,
            width: None,
            min_width: None,
            max_width: None,
        }
    }

    pub fn is_structural(&self) -> bool {
        self.kind != ColumnKind::Data
    }

    /// Cell value for `row`: the accessor when given, otherwise the field path.
    pub fn value<'a>(&self, row: &'a Row) -> Option<Cow<'a, Value>> {
        if let Some(accessor) = &self.accessor {
            return (accessor.0)(&row.data).map(Cow::Owned);
        }
        self.path.as_ref()?.get(&row.data).map(Cow::Borrowed)
    }

    /// Resolved per-row disable predicate.
    pub fn is_disabled_for(&self, row: &Row) -> bool {
        self.disabled.as_ref().is_some_and(|p| (p.0)(row))
    }

    pub fn is_editable(&self) -> bool {
        self.kind == ColumnKind::Data && self.editor.as_ref().is_some_and(|e| !e.disabled)
    }
}

/// One top-level header slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HeaderNode {
    Leaf(ColumnId),
    Group {
        title: String,
        children: Vec<ColumnId>,
    },
}

#[derive(Clone, Debug, Default)]
pub struct CompiledColumns {
    /// Structural columns plus data leaves in header order.
    pub defs: Vec<ColumnDef>,
    pub header: Vec<HeaderNode>,
    pub initial: ColumnState,
}

impl CompiledColumns {
    pub fn def(&self, id: &ColumnId) -> Option<&ColumnDef> {
        self.defs.iter().find(|d| &d.id == id)
    }

    pub fn data_defs(&self) -> impl Iterator<Item = &ColumnDef> {
        self.defs.iter().filter(|d| !d.is_structural())
    }

    pub fn has_groups(&self) -> bool {
        self.header
            .iter()
            .any(|n| matches!(n, HeaderNode::Group { .. }))
    }
}

/// Compiles `settings` for a table `viewport_width` cells wide.
pub fn compile(
    settings: &[ColumnSetting],
    structural: StructuralColumns,
    sizing: &SizingOptions,
    viewport_width: u16,
) -> Result<CompiledColumns, ConfigError> {
    let mut seen = HashSet::new();
    for s in settings {
        if !seen.insert(s.field.as_str()) {
            return Err(ConfigError::DuplicateField(s.field.clone()));
        }
    }

    let mut leaves = Vec::with_capacity(settings.len());
    for s in settings {
        leaves.push(compile_leaf(s)?);
    }

    let header = group_header(&leaves);
    let mut by_id: BTreeMap<ColumnId, ColumnDef> =
        leaves.into_iter().map(|d| (d.id.clone(), d)).collect();

    let mut defs = Vec::with_capacity(by_id.len() + 3);
    if structural.selection {
        defs.push(ColumnDef::structural(ColumnKind::Select));
    }
    if structural.expander {
        defs.push(ColumnDef::structural(ColumnKind::Expand));
    }
    for node in &header {
        let ids: &[ColumnId] = match node {
            HeaderNode::Leaf(id) => std::slice::from_ref(id),
            HeaderNode::Group { children, .. } => children,
        };
        for id in ids {
            if let Some(def) = by_id.remove(id) {
                defs.push(def);
            }
        }
    }
    if structural.actions {
        defs.push(ColumnDef::structural(ColumnKind::Actions));
    }

    let initial = initial_state(settings, &defs, structural, sizing, viewport_width);
    Ok(CompiledColumns {
        defs,
        header,
        initial,
    })
}

fn compile_leaf(s: &ColumnSetting) -> Result<ColumnDef, ConfigError> {
    let path = FieldPath::parse(&s.field).map_err(|source| ConfigError::InvalidPath {
        path: s.field.clone(),
        source,
    })?;
    let rules = match &s.editor {
        Some(editor) => RuleSet::compile(&s.field, &editor.rules)?,
        None => RuleSet::default(),
    };
    Ok(ColumnDef {
        id: ColumnId::new(s.field.clone()),
        kind: ColumnKind::Data,
        title: s.title.clone(),
        path: Some(path),
        accessor: s.accessor.clone(),
        renderer: s.renderer.clone(),
        disabled: s.disabled.clone(),
        editor: s.editor.clone(),
        rules,
        filter: s.filter.clone(),
        group: s.group_title.clone(),
        align: s.align,
        draggable: s.draggable,
        width: s.width,
        min_width: s.min_width,
        max_width: s.max_width,
    })
}

/// Gathers leaves sharing a group title under one node at the first member's position.
fn group_header(leaves: &[ColumnDef]) -> Vec<HeaderNode> {
    let mut header: Vec<HeaderNode> = Vec::new();
    for leaf in leaves {
        let Some(title) = &leaf.group else {
            header.push(HeaderNode::Leaf(leaf.id.clone()));
            continue;
        };
        let existing = header.iter_mut().find_map(|n| match n {
            HeaderNode::Group {
                title: t,
                children,
            } if t == title => Some(children),
            _ => None,
        });
        match existing {
            Some(children) => children.push(leaf.id.clone()),
            None => header.push(HeaderNode::Group {
                title: title.clone(),
                children: vec![leaf.id.clone()],
            }),
        }
    }
    header
}

fn initial_state(
    settings: &[ColumnSetting],
    defs: &[ColumnDef],
    structural: StructuralColumns,
    sizing: &SizingOptions,
    viewport_width: u16,
) -> ColumnState {
    let declared = |id: &ColumnId| settings.iter().position(|s| s.field == id.as_str());
    let setting = |id: &ColumnId| settings.iter().find(|s| s.field == id.as_str());

    // user columns: explicit `order` ascending, then declaration order
    let mut user: Vec<&ColumnDef> = defs.iter().filter(|d| !d.is_structural()).collect();
    user.sort_by_key(|d| {
        let order = setting(&d.id).and_then(|s| s.order);
        (order.is_none(), order, declared(&d.id))
    });
    let mut user = user.into_iter();
    let order: Vec<ColumnId> = defs
        .iter()
        .filter_map(|d| {
            if d.is_structural() {
                Some(d.id.clone())
            } else {
                user.next().map(|u| u.id.clone())
            }
        })
        .collect();

    let mut visibility = BTreeMap::new();
    for s in settings.iter().filter(|s| s.hidden) {
        visibility.insert(ColumnId::new(s.field.clone()), false);
    }

    let mut pinning = ColumnPinning::default();
    if structural.selection {
        pinning.left.push(ColumnId::select());
    }
    if structural.expander {
        pinning.left.push(ColumnId::expand());
    }
    if structural.actions {
        pinning.right.push(ColumnId::actions());
    }
    for id in order.iter().filter(|id| !id.is_reserved()) {
        match setting(id).and_then(|s| s.pin) {
            Some(PinSide::Left) => pinning.left.push(id.clone()),
            Some(PinSide::Right) => pinning.right.push(id.clone()),
            None => {}
        }
    }

    let sorting = settings
        .iter()
        .filter_map(|s| {
            s.sort.map(|dir| SortEntry {
                column: ColumnId::new(s.field.clone()),
                desc: dir == SortDirection::Desc,
            })
        })
        .collect();

    let sizing = compute_sizing(
        defs,
        &visibility,
        sizing,
        viewport_width,
        &BTreeMap::new(),
    );

    ColumnState {
        visibility,
        sizing,
        pinning,
        order,
        sorting,
        filters: Vec::new(),
    }
}

/// Lays out column widths.
///
/// Structural columns take their fixed width, columns with an explicit width (or a `fixed` entry,
/// e.g. after a manual resize) take that, and the remaining visible columns split what is left,
/// floored at the flex minimum. Hidden columns get zero.
pub fn compute_sizing(
    defs: &[ColumnDef],
    visibility: &BTreeMap<ColumnId, bool>,
    sizing: &SizingOptions,
    viewport_width: u16,
    fixed: &BTreeMap<ColumnId, u16>,
) -> BTreeMap<ColumnId, u16> {
    let visible = |d: &ColumnDef| visibility.get(&d.id).copied().unwrap_or(true);
    let clamp = |d: &ColumnDef, w: u16| {
        let w = w.max(d.min_width.unwrap_or(0));
        match d.max_width {
            Some(max) => w.min(max),
            None => w,
        }
    };

    let mut out = BTreeMap::new();
    let mut used: u32 = 0;
    let mut flex = Vec::new();
    for d in defs {
        if !visible(d) {
            out.insert(d.id.clone(), 0);
            continue;
        }
        let w = match d.kind {
            ColumnKind::Select => Some(sizing.selection_width),
            ColumnKind::Expand => Some(sizing.expander_width),
            ColumnKind::Actions => Some(sizing.actions_width),
            ColumnKind::Data => fixed
                .get(&d.id)
                .copied()
                .or(d.width)
                .map(|w| clamp(d, w)),
        };
        match w {
            Some(w) => {
                used += w as u32;
                out.insert(d.id.clone(), w);
            }
            None => flex.push(d),
        }
    }

    if !flex.is_empty() {
        let leftover = (viewport_width as u32).saturating_sub(used);
        let share = (leftover / flex.len() as u32).min(u16::MAX as u32) as u16;
        for d in flex {
            let floor = sizing.min_flex_width.max(d.min_width.unwrap_or(0));
            let w = share.max(floor);
            let w = match d.max_width {
                Some(max) => w.min(max),
                None => w,
            };
            out.insert(d.id.clone(), w);
        }
    }
    out
}
