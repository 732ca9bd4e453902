use super::arbiter::KeyboardArbiter;
use super::arbiter::Registration;
use super::column::ColumnId;
use super::column::ColumnSetting;
use super::column::PinSide;
use super::commit::CommitActor;
use super::commit::CommitReply;
use super::commit::CommitRequest;
use super::commit::PendingCommit;
use super::commit::ThreadCommitActor;
use super::commit::apply_commit;
use super::compile::ColumnDef;
use super::compile::ColumnKind;
use super::compile::CompiledColumns;
use super::compile::SizingOptions;
use super::compile::StructuralColumns;
use super::compile::compile;
use super::compile::compute_sizing;
use super::editor::EditorBuffer;
use super::error::CommitError;
use super::error::ConfigError;
use super::feedback::SettingsFeedback;
use super::filter::FilterFn;
use super::filter::stringify;
use super::model::RowModel;
use super::model::client_model;
use super::model::server_model;
use super::nav;
use super::nav::Direction;
use super::nav::GridPos;
use super::path::FieldPath;
use super::row::Row;
use super::row::RowId;
use super::row::RowStore;
use super::server::FetchRequest;
use super::server::FetchToken;
use super::server::ServerFetchParams;
use super::server::ServerFetchResult;
use super::server::ServerOptions;
use super::server::ServerOrchestrator;
use super::state::ColumnState;
use super::state::Pagination;
use crate::input::InputEvent;
use crate::input::KeyEvent;
use crate::keymap::TableKeymap;
use serde_json::Value;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

/// Address of one cell, keyed by row identity rather than position.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellRef {
    pub row: RowId,
    pub column: ColumnId,
}

impl CellRef {
    pub fn new(row: RowId, column: impl Into<ColumnId>) -> Self {
        Self {
            row,
            column: column.into(),
        }
    }
}

/// Lines shown under an expanded row.
#[derive(Clone)]
pub struct RowDetail(pub Arc<dyn Fn(&Row) -> Vec<String> + Send + Sync>);

impl RowDetail {
    pub fn new(f: impl Fn(&Row) -> Vec<String> + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }
}

impl fmt::Debug for RowDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RowDetail(..)")
    }
}

/// Feature flags and behavior of a [`DataTable`].
#[derive(Clone, Debug)]
pub struct DataTableOptions {
    pub enable_editing: bool,
    pub enable_adding: bool,
    pub enable_deleting: bool,
    pub enable_selection: bool,
    pub enable_expansion: bool,
    pub enable_pinning: bool,
    pub enable_sorting: bool,
    pub enable_multi_sort: bool,
    /// Third sort toggle removes the sort instead of going back to ascending.
    pub enable_sort_removal: bool,
    pub enable_filtering: bool,
    pub enable_global_filter: bool,
    pub enable_dragging: bool,
    pub enable_resizing: bool,
    pub page_index: usize,
    pub page_size: usize,
    /// When set, deleting flags the row through this field instead of removing it.
    pub soft_delete_field: Option<String>,
    pub server_mode: bool,
    pub server: ServerOptions,
    pub settings_debounce: Duration,
    pub sizing: SizingOptions,
    /// Width used for the initial layout, until the view reports the real one.
    pub viewport_width: u16,
    /// Soft cap: above this many rows the body shows a message instead.
    pub max_rows: Option<usize>,
    pub double_click_window: Duration,
    pub row_detail: Option<RowDetail>,
    pub keymap: TableKeymap,
}

impl Default for DataTableOptions {
    fn default() -> Self {
        Self {
            enable_editing: false,
            enable_adding: false,
            enable_deleting: false,
            enable_selection: false,
            enable_expansion: false,
            enable_pinning: true,
            enable_sorting: true,
            enable_multi_sort: false,
            enable_sort_removal: true,
            enable_filtering: true,
            enable_global_filter: true,
            enable_dragging: true,
            enable_resizing: true,
            page_index: 0,
            page_size: 10,
            soft_delete_field: None,
            server_mode: false,
            server: ServerOptions::default(),
            settings_debounce: Duration::from_millis(500),
            sizing: SizingOptions::default(),
            viewport_width: 120,
            max_rows: None,
            double_click_window: Duration::from_millis(400),
            row_detail: None,
            keymap: TableKeymap::default(),
        }
    }
}

/// Notifications for the host, drained with [`DataTable::drain_events`].
#[derive(Clone, Debug)]
pub enum TableEvent {
    /// Every saved row after a committed mutation.
    Changed(Vec<Value>),
    RowClicked { row: RowId, data: Value },
    RowDoubleClicked { row: RowId, data: Value },
    ColumnSettingsChanged(Vec<ColumnSetting>),
    PageIndexChanged(usize),
    PageSizeChanged(usize),
    SelectedRowsChanged(BTreeSet<RowId>),
    ActiveRowChanged(Option<RowId>),
    FetchRequested(FetchRequest),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DataTableAction {
    None,
    Redraw,
    EditStarted(CellRef),
    SelectionChanged,
}

/// Per-row buttons in the actions column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RowAction {
    Save,
    Cancel,
    Delete,
}

#[derive(Debug)]
struct EditSession {
    cell: CellRef,
    buffer: EditorBuffer,
}

#[derive(Debug)]
struct InFlight {
    cell: CellRef,
    request: CommitRequest,
    pending: PendingCommit,
}

/// The grid engine: columns, rows, editing, selection, paging and host notifications.
///
/// `DataTable` is headless. Draw it with [`DataTableView`](super::view::DataTableView) and drive
/// it from your loop with [`handle_event`](Self::handle_event) and [`tick`](Self::tick).
pub struct DataTable {
    options: DataTableOptions,
    settings: Vec<ColumnSetting>,
    compiled: CompiledColumns,
    config_error: Option<ConfigError>,
    soft_delete: Option<FieldPath>,
    state: ColumnState,
    manual_sizes: BTreeMap<ColumnId, u16>,
    viewport_width: u16,
    pagination: Pagination,
    global_filter: String,
    rows: RowStore,
    model: RowModel,
    selected_rows: BTreeSet<RowId>,
    disabled_rows: BTreeSet<RowId>,
    expanded: BTreeSet<RowId>,
    active_row: Option<RowId>,
    selected_cell: Option<CellRef>,
    editing: Option<EditSession>,
    cell_errors: BTreeMap<CellRef, String>,
    in_flight: Vec<InFlight>,
    actor: Box<dyn CommitActor>,
    server: Option<ServerOrchestrator>,
    feedback: SettingsFeedback,
    registration: Option<Registration>,
    last_click: Option<(RowId, Instant)>,
    events: Vec<TableEvent>,
}

impl fmt::Debug for DataTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataTable")
            .field("rows", &self.rows.len())
            .field("columns", &self.compiled.defs.len())
            .field("config_error", &self.config_error)
            .field("pagination", &self.pagination)
            .field("selected_cell", &self.selected_cell)
            .field("editing", &self.editing.as_ref().map(|e| &e.cell))
            .finish()
    }
}

impl DataTable {
    pub fn new(settings: Vec<ColumnSetting>, data: Vec<Value>, options: DataTableOptions) -> Self {
        let viewport_width = options.viewport_width;
        let (compiled, config_error) = compile_or_report(&settings, &options, viewport_width);
        let soft_delete = options
            .soft_delete_field
            .as_deref()
            .and_then(|field| match FieldPath::parse(field) {
                Ok(path) => Some(path),
                Err(err) => {
                    log::warn!("ignoring soft delete field `{field}`: {err}");
                    None
                }
            });
        let mut state = compiled.initial.clone();
        if !options.enable_multi_sort {
            state.sorting.truncate(1);
        }
        let feedback = SettingsFeedback::new(settings.clone(), &state, options.settings_debounce);
        let server = options
            .server_mode
            .then(|| ServerOrchestrator::new(options.server));
        let mut rows = RowStore::new();
        if server.is_none() {
            rows.replace_all(data);
        }
        let pagination = Pagination {
            page_index: options.page_index,
            page_size: options.page_size.max(1),
        };

        let mut table = Self {
            options,
            settings,
            compiled,
            config_error,
            soft_delete,
            state,
            manual_sizes: BTreeMap::new(),
            viewport_width,
            pagination,
            global_filter: String::new(),
            rows,
            model: RowModel::default(),
            selected_rows: BTreeSet::new(),
            disabled_rows: BTreeSet::new(),
            expanded: BTreeSet::new(),
            active_row: None,
            selected_cell: None,
            editing: None,
            cell_errors: BTreeMap::new(),
            in_flight: Vec::new(),
            actor: Box::new(ThreadCommitActor),
            server,
            feedback,
            registration: None,
            last_click: None,
            events: Vec::new(),
        };
        table.refresh();
        if let Some(server) = table.server.as_mut() {
            let params = server_params(&table.state, table.pagination, &table.global_filter);
            let request = server.fetch_now(params);
            table.events.push(TableEvent::FetchRequested(request));
        }
        table
    }

    /// Replaces the commit actor (threaded by default).
    pub fn with_commit_actor(mut self, actor: impl CommitActor + 'static) -> Self {
        self.actor = Box::new(actor);
        self
    }

    /// Joins `arbiter`. From now on the table only reacts to keys while it is the active one.
    pub fn attach_arbiter(&mut self, arbiter: &KeyboardArbiter) {
        self.registration = Some(arbiter.register());
    }

    pub fn registration(&self) -> Option<&Registration> {
        self.registration.as_ref()
    }

    pub fn options(&self) -> &DataTableOptions {
        &self.options
    }

    pub fn drain_events(&mut self) -> Vec<TableEvent> {
        std::mem::take(&mut self.events)
    }

    /// Replaces every row. Selection, active row, selected and editing cell are reset.
    pub fn set_data_source(&mut self, data: Vec<Value>) {
        self.rows.replace_all(data);
        self.reset_row_state();
        self.refresh();
    }

    /// Installs host settings as the new baseline.
    pub fn set_column_settings(&mut self, settings: Vec<ColumnSetting>) {
        let (compiled, config_error) =
            compile_or_report(&settings, &self.options, self.viewport_width);
        self.compiled = compiled;
        self.config_error = config_error;
        self.state = self.compiled.initial.clone();
        if !self.options.enable_multi_sort {
            self.state.sorting.truncate(1);
        }
        self.manual_sizes.clear();
        self.editing = None;
        self.cell_errors.clear();
        self.feedback.rebaseline(settings.clone(), &self.state);
        self.settings = settings;
        self.refresh();
    }

    /// Re-lays out flexible columns for a new width.
    pub fn set_viewport_width(&mut self, width: u16) {
        if width == self.viewport_width {
            return;
        }
        self.viewport_width = width;
        self.resize_columns();
    }

    pub fn set_page_index(&mut self, index: usize) -> bool {
        let index = index.min(self.pagination.last_index(self.total_rows()));
        if index == self.pagination.page_index {
            return false;
        }
        self.pagination.page_index = index;
        self.events.push(TableEvent::PageIndexChanged(index));
        self.finish_edit();
        self.selected_cell = None;
        if let Some(server) = self.server.as_mut() {
            let params = server_params(&self.state, self.pagination, &self.global_filter);
            let request = server.fetch_now(params);
            self.events.push(TableEvent::FetchRequested(request));
            return true;
        }
        self.refresh();
        true
    }

    pub fn set_page_size(&mut self, size: usize, now: Instant) -> bool {
        let size = size.max(1);
        if size == self.pagination.page_size {
            return false;
        }
        self.pagination.page_size = size;
        self.events.push(TableEvent::PageSizeChanged(size));
        self.query_changed(now);
        true
    }

    pub fn first_page(&mut self) -> bool {
        self.pagination.can_previous() && self.set_page_index(0)
    }

    pub fn previous_page(&mut self) -> bool {
        self.pagination.can_previous() && self.set_page_index(self.pagination.page_index - 1)
    }

    pub fn next_page(&mut self) -> bool {
        let total = self.total_rows();
        self.pagination.can_next(total) && self.set_page_index(self.pagination.page_index + 1)
    }

    pub fn last_page(&mut self) -> bool {
        let total = self.total_rows();
        self.pagination.can_next(total) && self.set_page_index(self.pagination.last_index(total))
    }

    /// Applies a server response. Responses to superseded requests are ignored.
    pub fn apply_fetch(&mut self, token: FetchToken, result: ServerFetchResult) -> bool {
        let Some(server) = self.server.as_mut() else {
            return false;
        };
        let Some(rows) = server.accept(token, result) else {
            return false;
        };
        self.rows.replace_all(rows);
        self.reset_row_state();
        self.refresh();
        true
    }

    /// The host failed or gave up on a fetch.
    pub fn abandon_fetch(&mut self, token: FetchToken) {
        if let Some(server) = self.server.as_mut() {
            server.abandon(token);
        }
    }

    /// Advances timers and collects commit replies. Returns `true` when a redraw is due.
    pub fn tick(&mut self, now: Instant) -> bool {
        let mut changed = self.poll_commits();
        if let Some(server) = self.server.as_mut() {
            if let Some(request) = server.poll(now) {
                self.events.push(TableEvent::FetchRequested(request));
                changed = true;
            }
        }
        if let Some(settings) = self.feedback.poll(&self.state, now) {
            self.events.push(TableEvent::ColumnSettingsChanged(settings));
        }
        changed
    }

    pub fn config_error(&self) -> Option<&ConfigError> {
        self.config_error.as_ref()
    }

    pub fn columns(&self) -> &CompiledColumns {
        &self.compiled
    }

    pub fn column_state(&self) -> &ColumnState {
        &self.state
    }

    pub fn column_settings(&self) -> &[ColumnSetting] {
        &self.settings
    }

    /// Visible column definitions in display order.
    pub fn display_columns(&self) -> Vec<&ColumnDef> {
        self.state
            .display_order()
            .iter()
            .filter_map(|id| self.compiled.def(id))
            .collect()
    }

    /// Columns arrow keys move between.
    pub fn selectable_columns(&self) -> Vec<ColumnId> {
        self.display_columns()
            .into_iter()
            .filter(|d| !d.is_structural())
            .map(|d| d.id.clone())
            .collect()
    }

    pub fn rows(&self) -> &RowStore {
        &self.rows
    }

    pub fn row(&self, id: RowId) -> Option<&Row> {
        self.rows.get(id)
    }

    /// Host-facing data: saved rows without internal fields.
    pub fn data(&self) -> Vec<Value> {
        self.rows.sanitized()
    }

    pub fn model(&self) -> &RowModel {
        &self.model
    }

    pub fn page_rows(&self) -> impl Iterator<Item = &Row> {
        self.model.page.iter().filter_map(|id| self.rows.get(*id))
    }

    pub fn pagination(&self) -> Pagination {
        self.pagination
    }

    /// Rows counted for paging (the server's `total` in server mode).
    pub fn total_rows(&self) -> usize {
        match &self.server {
            Some(server) => server.total(),
            None => self.model.total,
        }
    }

    pub fn page_count(&self) -> usize {
        self.pagination.page_count(self.total_rows())
    }

    pub fn can_previous_page(&self) -> bool {
        self.pagination.can_previous()
    }

    pub fn can_next_page(&self) -> bool {
        self.pagination.can_next(self.total_rows())
    }

    pub fn is_server_mode(&self) -> bool {
        self.server.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.server.as_ref().is_some_and(ServerOrchestrator::is_loading)
    }

    pub fn exceeds_row_cap(&self) -> bool {
        self.options
            .max_rows
            .is_some_and(|cap| self.rows.len() > cap)
    }

    pub fn global_filter(&self) -> &str {
        &self.global_filter
    }

    pub fn selected_rows(&self) -> &BTreeSet<RowId> {
        &self.selected_rows
    }

    pub fn disabled_rows(&self) -> &BTreeSet<RowId> {
        &self.disabled_rows
    }

    pub fn is_expanded(&self, id: RowId) -> bool {
        self.expanded.contains(&id)
    }

    pub fn active_row(&self) -> Option<RowId> {
        self.active_row
    }

    pub fn selected_cell(&self) -> Option<&CellRef> {
        self.selected_cell.as_ref()
    }

    pub fn editing_cell(&self) -> Option<&CellRef> {
        self.editing.as_ref().map(|e| &e.cell)
    }

    pub fn editor(&self) -> Option<&EditorBuffer> {
        self.editing.as_ref().map(|e| &e.buffer)
    }

    pub fn cell_error(&self, cell: &CellRef) -> Option<&str> {
        self.cell_errors.get(cell).map(String::as_str)
    }

    /// Validation messages on `row`, in column order.
    pub fn row_errors(&self, row: RowId) -> impl Iterator<Item = (&ColumnId, &str)> {
        self.cell_errors
            .iter()
            .filter(move |(cell, _)| cell.row == row)
            .map(|(cell, msg)| (&cell.column, msg.as_str()))
    }

    /// Message of the editing cell, or of the selected cell.
    pub fn current_error(&self) -> Option<&str> {
        let cell = self.editing_cell().or(self.selected_cell.as_ref())?;
        self.cell_error(cell)
    }

    pub fn has_pending_commits(&self) -> bool {
        !self.in_flight.is_empty()
    }

    /// Cell value as currently shown, including optimistic in-flight commits.
    pub fn cell_value<'a>(&'a self, row: &'a Row, def: &ColumnDef) -> Option<Cow<'a, Value>> {
        let pending = self
            .in_flight
            .iter()
            .rev()
            .find(|f| f.cell.row == row.id && f.cell.column == def.id);
        match pending {
            Some(f) => Some(Cow::Borrowed(&f.request.val)),
            None => def.value(row),
        }
    }

    /// Display text of a cell.
    pub fn cell_text(&self, row: &Row, def: &ColumnDef) -> String {
        let value = self.cell_value(row, def);
        match &def.renderer {
            Some(renderer) => (renderer.0)(value.as_deref(), row),
            None => stringify(value.as_deref()),
        }
    }

    pub fn row_detail(&self, row: &Row) -> Vec<String> {
        match &self.options.row_detail {
            Some(detail) => (detail.0)(row),
            None => Vec::new(),
        }
    }

    pub fn toggle_sort(&mut self, column: &ColumnId, multi: bool, now: Instant) -> bool {
        if !self.options.enable_sorting
            || self.compiled.def(column).is_none_or(ColumnDef::is_structural)
        {
            return false;
        }
        let multi = multi && self.options.enable_multi_sort;
        self.state
            .toggle_sort(column, multi, self.options.enable_sort_removal);
        self.feedback.note_change(now);
        self.query_changed(now);
        true
    }

    /// Sets the filter of `column`; empty values clear it.
    pub fn set_column_filter(&mut self, column: &ColumnId, value: Value, now: Instant) -> bool {
        if !self.options.enable_filtering {
            return false;
        }
        let Some(def) = self.compiled.def(column) else {
            return false;
        };
        let predicate = def
            .filter
            .as_ref()
            .map(|f| f.predicate)
            .unwrap_or(FilterFn::IncludesString);
        self.state.set_filter(column, value, predicate);
        self.query_changed(now);
        true
    }

    pub fn set_global_filter(&mut self, query: impl Into<String>, now: Instant) -> bool {
        if !self.options.enable_global_filter {
            return false;
        }
        let query = query.into();
        if query == self.global_filter {
            return false;
        }
        self.global_filter = query;
        self.query_changed(now);
        true
    }

    pub fn set_column_visibility(
        &mut self,
        column: &ColumnId,
        visible: bool,
        now: Instant,
    ) -> bool {
        if column.is_reserved() || self.compiled.def(column).is_none() {
            return false;
        }
        if self.state.is_visible(column) == visible {
            return false;
        }
        self.state.visibility.insert(column.clone(), visible);
        self.resize_columns();
        self.feedback.note_change(now);
        true
    }

    pub fn set_column_pin(
        &mut self,
        column: &ColumnId,
        side: Option<PinSide>,
        now: Instant,
    ) -> bool {
        if !self.options.enable_pinning
            || column.is_reserved()
            || self.compiled.def(column).is_none()
        {
            return false;
        }
        if self.state.pinning.side(column) == side {
            return false;
        }
        self.state.pinning.set(column, side);
        self.feedback.note_change(now);
        true
    }

    /// Drag reorder: moves `from` to the slot of `to`.
    pub fn move_column(&mut self, from: &ColumnId, to: &ColumnId, now: Instant) -> bool {
        if !self.options.enable_dragging {
            return false;
        }
        if !self.compiled.def(from).is_some_and(|d| d.draggable) {
            return false;
        }
        if !self.state.move_column(from, to) {
            return false;
        }
        self.feedback.note_change(now);
        true
    }

    pub fn resize_column(&mut self, column: &ColumnId, width: u16, now: Instant) -> bool {
        if !self.options.enable_resizing || column.is_reserved() {
            return false;
        }
        if self.compiled.def(column).is_none() {
            return false;
        }
        self.manual_sizes.insert(column.clone(), width.max(1));
        self.resize_columns();
        self.feedback.note_change(now);
        true
    }

    /// Prepends a new row and opens its first cell for editing.
    pub fn add_row(&mut self) -> Option<RowId> {
        if !self.options.enable_adding || self.config_error.is_some() {
            return None;
        }
        self.finish_edit();
        let id = self.rows.add();
        if self.pagination.page_index != 0 {
            self.pagination.page_index = 0;
            self.events.push(TableEvent::PageIndexChanged(0));
        }
        self.refresh();
        if let Some(column) = self.selectable_columns().into_iter().next() {
            let cell = CellRef::new(id, column);
            self.selected_cell = Some(cell.clone());
            self.begin_edit(&cell);
        }
        Some(id)
    }

    /// Deletes a row, or flags it when a soft delete field is configured.
    pub fn delete_row(&mut self, id: RowId) -> bool {
        if !self.options.enable_deleting {
            return false;
        }
        let Some(row) = self.rows.get(id) else {
            return false;
        };
        let was_new = row.is_new;
        let deleted = match (&self.soft_delete, was_new) {
            (Some(field), false) => self.rows.soft_delete(id, field),
            _ => self.rows.remove(id).is_some(),
        };
        if !deleted {
            return false;
        }
        self.forget_row(id);
        self.refresh();
        if !was_new {
            self.events.push(TableEvent::Changed(self.rows.sanitized()));
        }
        true
    }

    /// Whether the new row `id` passes every validation rule.
    pub fn can_save_row(&self, id: RowId) -> bool {
        let Some(row) = self.rows.get(id) else {
            return false;
        };
        if self.cell_errors.keys().any(|cell| cell.row == id) {
            return false;
        }
        self.compiled
            .data_defs()
            .filter(|d| d.is_editable() && !d.rules.is_empty())
            .all(|def| {
                let cell = CellRef::new(id, def.id.clone());
                let value = match self.editing.as_ref().filter(|e| e.cell == cell) {
                    Some(session) => match session.buffer.value() {
                        Ok(v) => Some(Cow::Owned(v)),
                        Err(_) => return false,
                    },
                    None => self.cell_value(row, def),
                };
                self.validate(&cell, value.as_deref()).is_ok()
            })
    }

    /// Saves a new row: commits an open editor on it, waits out its running commits, then
    /// clears its `is_new` flag.
    pub fn save_row(&mut self, id: RowId) -> bool {
        if !self.rows.get(id).is_some_and(|r| r.is_new) {
            return false;
        }
        if self.editing.as_ref().is_some_and(|e| e.cell.row == id) && !self.commit_edit() {
            return false;
        }
        if !self.can_save_row(id) {
            return false;
        }
        self.settle_row_commits(id);
        self.rows.mark_saved(id);
        log::debug!("saved new row {id}");
        self.events.push(TableEvent::Changed(self.rows.sanitized()));
        self.refresh();
        true
    }

    /// Cancels a row: new rows are discarded, saved rows just drop an open edit.
    pub fn cancel_row(&mut self, id: RowId) -> bool {
        let Some(row) = self.rows.get(id) else {
            return false;
        };
        if row.is_new {
            self.rows.remove(id);
            self.forget_row(id);
            self.refresh();
            return true;
        }
        if self.editing.as_ref().is_some_and(|e| e.cell.row == id) {
            self.cancel_edit();
            return true;
        }
        false
    }

    pub fn row_action(&mut self, id: RowId, action: RowAction) -> bool {
        match action {
            RowAction::Save => self.save_row(id),
            RowAction::Cancel => self.cancel_row(id),
            RowAction::Delete => self.delete_row(id),
        }
    }

    pub fn toggle_row_selected(&mut self, id: RowId) -> bool {
        if !self.options.enable_selection
            || self.disabled_rows.contains(&id)
            || !self.rows.contains(id)
        {
            return false;
        }
        if !self.selected_rows.remove(&id) {
            self.selected_rows.insert(id);
        }
        self.emit_selection();
        true
    }

    /// Selects every enabled filtered row, or deselects them when all already are.
    pub fn toggle_select_all(&mut self) -> bool {
        if !self.options.enable_selection {
            return false;
        }
        let selectable: Vec<RowId> = self
            .model
            .filtered
            .iter()
            .copied()
            .filter(|id| !self.disabled_rows.contains(id))
            .collect();
        if selectable.is_empty() {
            return false;
        }
        if selectable.iter().all(|id| self.selected_rows.contains(id)) {
            for id in &selectable {
                self.selected_rows.remove(id);
            }
        } else {
            self.selected_rows.extend(selectable);
        }
        self.emit_selection();
        true
    }

    /// Whether every enabled filtered row is selected.
    pub fn all_selected(&self) -> bool {
        let mut selectable = self
            .model
            .filtered
            .iter()
            .filter(|id| !self.disabled_rows.contains(id))
            .peekable();
        selectable.peek().is_some() && selectable.all(|id| self.selected_rows.contains(id))
    }

    pub fn set_selected_rows(&mut self, ids: impl IntoIterator<Item = RowId>) {
        let next: BTreeSet<RowId> = ids.into_iter().filter(|id| self.rows.contains(*id)).collect();
        if next != self.selected_rows {
            self.selected_rows = next;
            self.emit_selection();
        }
    }

    /// Rows whose selection state cannot be changed by the user.
    pub fn set_disabled_rows(&mut self, ids: impl IntoIterator<Item = RowId>) {
        self.disabled_rows = ids.into_iter().collect();
    }

    pub fn set_active_row(&mut self, id: Option<RowId>) {
        let id = id.filter(|id| self.rows.contains(*id));
        if id != self.active_row {
            self.active_row = id;
            self.events.push(TableEvent::ActiveRowChanged(id));
        }
    }

    pub fn toggle_expanded(&mut self, id: RowId) -> bool {
        if !self.options.enable_expansion || !self.rows.contains(id) {
            return false;
        }
        if !self.expanded.remove(&id) {
            self.expanded.insert(id);
        }
        true
    }

    pub fn select_cell(&mut self, cell: Option<CellRef>) {
        if self.editing.as_ref().is_some_and(|e| Some(&e.cell) != cell.as_ref()) {
            self.finish_edit();
        }
        self.selected_cell = cell;
    }

    /// A pointer click on a body cell.
    pub fn click_cell(&mut self, cell: CellRef, now: Instant) -> DataTableAction {
        let Some(row) = self.rows.get(cell.row) else {
            return DataTableAction::None;
        };
        let data = row.data.clone();
        let double = self.last_click.is_some_and(|(id, at)| {
            id == cell.row && now.saturating_duration_since(at) <= self.options.double_click_window
        });
        self.events.push(TableEvent::RowClicked {
            row: cell.row,
            data: data.clone(),
        });
        if double {
            self.events.push(TableEvent::RowDoubleClicked {
                row: cell.row,
                data,
            });
            self.last_click = None;
        } else {
            self.last_click = Some((cell.row, now));
        }
        self.set_active_row(Some(cell.row));

        let kind = self.compiled.def(&cell.column).map(|d| d.kind);
        match kind {
            Some(ColumnKind::Select) => {
                if self.toggle_row_selected(cell.row) {
                    DataTableAction::SelectionChanged
                } else {
                    DataTableAction::Redraw
                }
            }
            Some(ColumnKind::Expand) => {
                self.toggle_expanded(cell.row);
                DataTableAction::Redraw
            }
            Some(ColumnKind::Data) => {
                if self.editing_cell() == Some(&cell) {
                    return DataTableAction::None;
                }
                self.select_cell(Some(cell.clone()));
                if self.begin_edit(&cell) {
                    DataTableAction::EditStarted(cell)
                } else {
                    DataTableAction::Redraw
                }
            }
            Some(ColumnKind::Actions) | None => DataTableAction::Redraw,
        }
    }

    /// Whether `cell` may enter editing.
    pub fn is_cell_editable(&self, cell: &CellRef) -> bool {
        let Some(row) = self.rows.get(cell.row) else {
            return false;
        };
        let Some(def) = self.compiled.def(&cell.column) else {
            return false;
        };
        (self.options.enable_editing || row.is_new)
            && def.is_editable()
            && !def.is_disabled_for(row)
    }

    /// Opens an editor on `cell`. Any other open editor is committed if valid, else cancelled.
    pub fn begin_edit(&mut self, cell: &CellRef) -> bool {
        if self.editing_cell() == Some(cell) {
            return true;
        }
        if !self.is_cell_editable(cell) {
            return false;
        }
        self.finish_edit();
        let (Some(row), Some(def)) = (self.rows.get(cell.row), self.compiled.def(&cell.column))
        else {
            return false;
        };
        let Some(editor) = def.editor.as_ref() else {
            return false;
        };
        let current = self.cell_value(row, def);
        let buffer = EditorBuffer::open(editor, current.as_deref());
        self.editing = Some(EditSession {
            cell: cell.clone(),
            buffer,
        });
        self.selected_cell = Some(cell.clone());
        true
    }

    /// Feeds a key to the open editor; revalidates when the value may have changed.
    pub fn edit_key(&mut self, key: &KeyEvent) -> bool {
        let Some(session) = self.editing.as_mut() else {
            return false;
        };
        if !session.buffer.handle_key(key) {
            return false;
        }
        self.revalidate_editing();
        true
    }

    pub fn edit_paste(&mut self, text: &str) -> bool {
        let Some(session) = self.editing.as_mut() else {
            return false;
        };
        if !session.buffer.paste(text) {
            return false;
        }
        self.revalidate_editing();
        true
    }

    /// Commits the open editor when its value is valid. An invalid value keeps the editor open.
    pub fn commit_edit(&mut self) -> bool {
        let Some(session) = self.editing.as_ref() else {
            return false;
        };
        let cell = session.cell.clone();
        let value = match session.buffer.value() {
            Ok(value) => value,
            Err(msg) => {
                self.cell_errors.insert(cell, msg);
                return false;
            }
        };
        if let Err(msg) = self.validate(&cell, Some(&value)) {
            self.cell_errors.insert(cell, msg);
            return false;
        }
        self.cell_errors.remove(&cell);
        self.editing = None;
        self.dispatch_commit(cell, value);
        true
    }

    /// Closes the open editor without touching the row.
    pub fn cancel_edit(&mut self) -> bool {
        let Some(session) = self.editing.take() else {
            return false;
        };
        self.cell_errors.remove(&session.cell);
        true
    }

    pub fn handle_event(&mut self, event: InputEvent, now: Instant) -> DataTableAction {
        match event {
            InputEvent::Key(key) => {
                if !self.accepts_keys() {
                    return DataTableAction::None;
                }
                self.handle_key(key, now)
            }
            InputEvent::Paste(text) => {
                if self.edit_paste(&text) {
                    DataTableAction::Redraw
                } else {
                    DataTableAction::None
                }
            }
            InputEvent::Mouse(_) => DataTableAction::None,
        }
    }

    fn accepts_keys(&self) -> bool {
        self.registration
            .as_ref()
            .is_none_or(Registration::accepts_keys)
    }

    fn handle_key(&mut self, key: KeyEvent, now: Instant) -> DataTableAction {
        let keymap = self.options.keymap.clone();
        if self.editing.is_some() {
            if keymap.commit.matches(&key) {
                self.commit_edit();
                return DataTableAction::Redraw;
            }
            if keymap.cancel.matches(&key) {
                self.cancel_edit();
                return DataTableAction::Redraw;
            }
            if keymap.save_row.matches(&key) {
                let row = self.editing.as_ref().map(|e| e.cell.row);
                return redraw_if(row.is_some_and(|row| self.save_row(row)));
            }
            return if self.edit_key(&key) {
                DataTableAction::Redraw
            } else {
                DataTableAction::None
            };
        }

        let direction = if keymap.up.matches(&key) {
            Some(Direction::Up)
        } else if keymap.down.matches(&key) {
            Some(Direction::Down)
        } else if keymap.left.matches(&key) {
            Some(Direction::Left)
        } else if keymap.right.matches(&key) {
            Some(Direction::Right)
        } else {
            None
        };
        if let Some(direction) = direction {
            return self.navigate(direction);
        }

        if keymap.commit.matches(&key) {
            let Some(cell) = self.selected_cell.clone() else {
                return DataTableAction::None;
            };
            if !self.begin_edit(&cell) {
                return DataTableAction::Redraw;
            }
            self.set_active_row(Some(cell.row));
            return DataTableAction::EditStarted(cell);
        }
        if keymap.cancel.matches(&key) {
            return match self.selected_cell.take() {
                Some(_) => DataTableAction::Redraw,
                None => DataTableAction::None,
            };
        }
        if keymap.toggle_select.matches(&key) {
            let Some(row) = self.selected_cell.as_ref().map(|c| c.row) else {
                return DataTableAction::None;
            };
            return if self.toggle_row_selected(row) {
                DataTableAction::SelectionChanged
            } else {
                DataTableAction::None
            };
        }
        if keymap.toggle_expand.matches(&key) {
            let Some(row) = self.selected_cell.as_ref().map(|c| c.row) else {
                return DataTableAction::None;
            };
            return redraw_if(self.toggle_expanded(row));
        }
        if keymap.sort.matches(&key) {
            let Some(column) = self.selected_cell.as_ref().map(|c| c.column.clone()) else {
                return DataTableAction::None;
            };
            return redraw_if(self.toggle_sort(&column, false, now));
        }
        if keymap.next_page.matches(&key) {
            return redraw_if(self.next_page());
        }
        if keymap.previous_page.matches(&key) {
            return redraw_if(self.previous_page());
        }
        if keymap.first_page.matches(&key) {
            return redraw_if(self.first_page());
        }
        if keymap.last_page.matches(&key) {
            return redraw_if(self.last_page());
        }
        if keymap.add_row.matches(&key) {
            return match self.add_row() {
                Some(_) => DataTableAction::Redraw,
                None => DataTableAction::None,
            };
        }
        if keymap.save_row.matches(&key) {
            let Some(row) = self.selected_cell.as_ref().map(|c| c.row) else {
                return DataTableAction::None;
            };
            return redraw_if(self.save_row(row));
        }
        if keymap.delete_row.matches(&key) {
            let Some(row) = self.selected_cell.as_ref().map(|c| c.row) else {
                return DataTableAction::None;
            };
            return redraw_if(self.delete_row(row));
        }
        DataTableAction::None
    }

    fn navigate(&mut self, direction: Direction) -> DataTableAction {
        let columns = self.selectable_columns();
        let page = &self.model.page;
        let from = match &self.selected_cell {
            Some(cell) => {
                let row = page.iter().position(|id| *id == cell.row);
                let col = columns.iter().position(|c| *c == cell.column);
                match (row, col) {
                    (Some(row), Some(col)) => {
                        nav::step(GridPos { row, col }, direction, page.len(), columns.len())
                    }
                    _ => None,
                }
            }
            None => (!page.is_empty() && !columns.is_empty()).then_some(GridPos { row: 0, col: 0 }),
        };
        let Some(to) = from else {
            return DataTableAction::None;
        };
        let (Some(row), Some(column)) = (page.get(to.row).copied(), columns.get(to.col).cloned())
        else {
            return DataTableAction::None;
        };
        let next = CellRef::new(row, column);
        if self.selected_cell.as_ref() == Some(&next) {
            return DataTableAction::None;
        }
        self.select_cell(Some(next));
        DataTableAction::Redraw
    }

    fn refresh(&mut self) {
        self.model = match &self.server {
            Some(server) => server_model(&self.rows, server.total()),
            None => client_model(
                &self.rows,
                &self.compiled,
                &self.state,
                &self.global_filter,
                self.pagination,
            ),
        };
        if self.server.is_none() {
            let last = self.pagination.last_index(self.model.total);
            if self.pagination.page_index > last {
                self.pagination.page_index = last;
                self.events.push(TableEvent::PageIndexChanged(last));
                self.model = client_model(
                    &self.rows,
                    &self.compiled,
                    &self.state,
                    &self.global_filter,
                    self.pagination,
                );
            }
        }
    }

    /// Sort, filter or page size changed: back to the first page, then refetch or recompute.
    fn query_changed(&mut self, now: Instant) {
        if self.pagination.page_index != 0 {
            self.pagination.page_index = 0;
            self.events.push(TableEvent::PageIndexChanged(0));
        }
        if let Some(server) = self.server.as_mut() {
            let params = server_params(&self.state, self.pagination, &self.global_filter);
            server.params_changed(params, now);
            return;
        }
        self.refresh();
    }

    fn resize_columns(&mut self) {
        self.state.sizing = compute_sizing(
            &self.compiled.defs,
            &self.state.visibility,
            &self.options.sizing,
            self.viewport_width,
            &self.manual_sizes,
        );
    }

    fn reset_row_state(&mut self) {
        self.selected_rows.clear();
        self.expanded.clear();
        self.selected_cell = None;
        self.editing = None;
        self.cell_errors.clear();
        self.last_click = None;
        if self.active_row.take().is_some() {
            self.events.push(TableEvent::ActiveRowChanged(None));
        }
    }

    /// Drops every reference to a row that left the table.
    fn forget_row(&mut self, id: RowId) {
        let was_selected = self.selected_rows.remove(&id);
        self.expanded.remove(&id);
        self.cell_errors.retain(|cell, _| cell.row != id);
        if self.editing.as_ref().is_some_and(|e| e.cell.row == id) {
            self.editing = None;
        }
        if self.selected_cell.as_ref().is_some_and(|c| c.row == id) {
            self.selected_cell = None;
        }
        if self.active_row == Some(id) {
            self.set_active_row(None);
        }
        if was_selected {
            self.emit_selection();
        }
    }

    fn emit_selection(&mut self) {
        self.events
            .push(TableEvent::SelectedRowsChanged(self.selected_rows.clone()));
    }

    /// Leaves the open editor: commits a valid value, cancels otherwise.
    fn finish_edit(&mut self) {
        if self.editing.is_some() && !self.commit_edit() {
            self.cancel_edit();
        }
    }

    fn revalidate_editing(&mut self) {
        let Some(session) = self.editing.as_ref() else {
            return;
        };
        let cell = session.cell.clone();
        let result = match session.buffer.value() {
            Ok(value) => self.validate(&cell, Some(&value)),
            Err(msg) => Err(msg),
        };
        match result {
            Ok(()) => {
                self.cell_errors.remove(&cell);
            }
            Err(msg) => {
                self.cell_errors.insert(cell, msg);
            }
        }
    }

    /// Runs the column's rules. Uniqueness compares against every other row.
    fn validate(&self, cell: &CellRef, value: Option<&Value>) -> Result<(), String> {
        let Some(def) = self.compiled.def(&cell.column) else {
            return Ok(());
        };
        if def.rules.is_empty() {
            return Ok(());
        }
        let others: Vec<Option<Cow<'_, Value>>> = if def.rules.is_unique() {
            self.rows
                .iter()
                .filter(|r| r.id != cell.row)
                .map(|r| self.cell_value(r, def))
                .collect()
        } else {
            Vec::new()
        };
        def.rules.validate(value, others.iter().map(|v| v.as_deref()))
    }

    fn dispatch_commit(&mut self, cell: CellRef, value: Value) {
        let Some(row) = self.rows.get(cell.row) else {
            return;
        };
        let Some(path) = self.compiled.def(&cell.column).and_then(|d| d.path.clone()) else {
            return;
        };
        let request = CommitRequest {
            row_data: row.data.clone(),
            accessor: path,
            val: value,
        };
        let pending = self.actor.commit(request.clone());
        self.in_flight.push(InFlight {
            cell,
            request,
            pending,
        });
        self.poll_commits();
    }

    fn poll_commits(&mut self) -> bool {
        let mut resolved = Vec::new();
        let mut idx = 0;
        while idx < self.in_flight.len() {
            match self.in_flight[idx].pending.try_recv() {
                Some(reply) => {
                    let flight = self.in_flight.remove(idx);
                    resolved.push((flight, reply));
                }
                None => idx += 1,
            }
        }
        if resolved.is_empty() {
            return false;
        }
        for (flight, reply) in resolved {
            self.settle_commit(&flight, reply);
        }
        self.refresh();
        true
    }

    /// Resolves every commit still running for `id` in place, so the row data is final.
    /// Replies that arrive later for these commits are dropped with their receivers.
    fn settle_row_commits(&mut self, id: RowId) {
        let (settled, waiting): (Vec<InFlight>, Vec<InFlight>) =
            std::mem::take(&mut self.in_flight)
                .into_iter()
                .partition(|f| f.cell.row == id);
        self.in_flight = waiting;
        for mut flight in settled {
            let reply = flight
                .pending
                .try_recv()
                .unwrap_or_else(|| apply_commit(&flight.request));
            self.settle_commit(&flight, reply);
        }
    }

    fn settle_commit(&mut self, flight: &InFlight, reply: Result<CommitReply, CommitError>) {
        let reply = match reply {
            Ok(CommitReply::Error(msg)) => {
                log::warn!(
                    "commit of {} failed in worker: {msg}; applying inline",
                    flight.cell.column
                );
                apply_commit(&flight.request)
            }
            Err(err) => {
                log::warn!(
                    "commit of {} failed: {err}; applying inline",
                    flight.cell.column
                );
                apply_commit(&flight.request)
            }
            Ok(reply) => Ok(reply),
        };
        match reply {
            Ok(CommitReply::UpdatedRow(updated)) => self.apply_updated(flight, &updated),
            Ok(CommitReply::Unchanged) => {}
            Ok(CommitReply::Error(msg)) => log::warn!("commit dropped: {msg}"),
            Err(err) => log::warn!("commit dropped: {err}"),
        }
    }

    /// Copies the committed field from the reply into the live row.
    fn apply_updated(&mut self, flight: &InFlight, updated: &Value) {
        let id = flight.cell.row;
        let Some(row) = self.rows.get(id) else {
            log::debug!("row {id} is gone; dropping commit");
            return;
        };
        let is_new = row.is_new;
        let mut data = row.data.clone();
        let value = flight
            .request
            .accessor
            .get(updated)
            .cloned()
            .unwrap_or(Value::Null);
        if let Err(err) = flight.request.accessor.set(&mut data, value) {
            log::warn!("could not apply commit to {id}: {err}");
            return;
        }
        if self.rows.replace_data(id, data) && !is_new {
            self.events.push(TableEvent::Changed(self.rows.sanitized()));
        }
    }
}

pub(super) fn redraw_if(changed: bool) -> DataTableAction {
    if changed {
        DataTableAction::Redraw
    } else {
        DataTableAction::None
    }
}

fn compile_or_report(
    settings: &[ColumnSetting],
    options: &DataTableOptions,
    viewport_width: u16,
) -> (CompiledColumns, Option<ConfigError>) {
    let structural = StructuralColumns {
        selection: options.enable_selection,
        expander: options.enable_expansion,
        actions: options.enable_adding || options.enable_deleting,
    };
    match compile(settings, structural, &options.sizing, viewport_width) {
        Ok(compiled) => (compiled, None),
        Err(err) => {
            log::warn!("column configuration rejected: {err}");
            (CompiledColumns::default(), Some(err))
        }
    }
}

fn server_params(
    state: &ColumnState,
    pagination: Pagination,
    global_filter: &str,
) -> ServerFetchParams {
    ServerFetchParams {
        page_index: pagination.page_index,
        page_size: pagination.page_size,
        sorting: state.sorting.clone(),
        column_filters: state.filters.clone(),
        global_filter: global_filter.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatable::column::EditorDescriptor;
    use crate::datatable::column::EditorKind;
    use crate::datatable::column::Rule;
    use crate::datatable::commit::InlineCommitActor;
    use crate::input::KeyCode;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::mpsc;

    fn key(code: KeyCode) -> InputEvent {
        InputEvent::Key(KeyEvent::new(code))
    }

    fn people() -> Vec<Value> {
        vec![
            json!({"first": "Jane", "last": "Doe"}),
            json!({"first": "John", "last": "Roe"}),
        ]
    }

    fn editable_settings() -> Vec<ColumnSetting> {
        vec![
            ColumnSetting::new("Last", "last").with_editor(
                EditorDescriptor::new(EditorKind::Text)
                    .with_rule(Rule::required())
                    .with_rule(Rule::unique()),
            ),
            ColumnSetting::new("First", "first")
                .with_editor(EditorDescriptor::new(EditorKind::Text)),
        ]
    }

    fn table(options: DataTableOptions) -> DataTable {
        DataTable::new(editable_settings(), people(), options).with_commit_actor(InlineCommitActor)
    }

    /// Worker that always reports failure.
    struct FailingActor;

    impl CommitActor for FailingActor {
        fn commit(&self, _req: CommitRequest) -> PendingCommit {
            PendingCommit::Ready(Some(Ok(CommitReply::Error("worker crashed".to_string()))))
        }
    }

    /// Holds every commit until the test answers it.
    #[derive(Clone, Default)]
    struct ManualActor {
        queued: Rc<RefCell<Vec<(CommitRequest, mpsc::Sender<CommitReply>)>>>,
    }

    impl CommitActor for ManualActor {
        fn commit(&self, req: CommitRequest) -> PendingCommit {
            let (tx, rx) = mpsc::channel();
            self.queued.borrow_mut().push((req, tx));
            PendingCommit::Waiting(rx)
        }
    }

    fn edit_first_name(t: &mut DataTable, id: RowId, now: Instant) {
        t.click_cell(CellRef::new(id, "first"), now);
        t.handle_event(key(KeyCode::Char('!')), now);
        t.handle_event(key(KeyCode::Enter), now);
    }

    fn changed_payloads(events: &[TableEvent]) -> Vec<usize> {
        events
            .iter()
            .filter_map(|e| match e {
                TableEvent::Changed(rows) => Some(rows.len()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn duplicate_fields_become_a_stored_error() {
        let settings = vec![ColumnSetting::new("A", "a"), ColumnSetting::new("B", "a")];
        let t = DataTable::new(settings, people(), DataTableOptions::default());
        assert!(matches!(t.config_error(), Some(ConfigError::DuplicateField(_))));
        assert!(t.display_columns().is_empty());
    }

    #[test]
    fn editing_commits_and_reports_changes() {
        let mut t = table(DataTableOptions {
            enable_editing: true,
            ..Default::default()
        });
        let now = Instant::now();
        let id = t.model().page[0];
        let cell = CellRef::new(id, "first");
        assert_eq!(
            t.click_cell(cell.clone(), now),
            DataTableAction::EditStarted(cell.clone())
        );
        t.handle_event(key(KeyCode::Char('!')), now);
        t.handle_event(key(KeyCode::Enter), now);
        assert!(t.editing_cell().is_none());
        assert_eq!(t.row(id).unwrap().data["first"], json!("Jane!"));
        let events = t.drain_events();
        assert_eq!(changed_payloads(&events), vec![2]);
    }

    #[test]
    fn saving_a_new_row_waits_for_its_worker_commit() {
        let options = DataTableOptions {
            enable_adding: true,
            ..Default::default()
        };
        let mut t = DataTable::new(editable_settings(), people(), options);
        let now = Instant::now();
        let id = t.add_row().unwrap();
        assert_eq!(t.editing_cell(), Some(&CellRef::new(id, "last")));
        for c in "Poe".chars() {
            t.handle_event(key(KeyCode::Char(c)), now);
        }
        t.drain_events();

        assert!(t.save_row(id));
        assert_eq!(t.row(id).unwrap().data["last"], json!("Poe"));
        let payloads: Vec<Vec<Value>> = t
            .drain_events()
            .into_iter()
            .filter_map(|e| match e {
                TableEvent::Changed(rows) => Some(rows),
                _ => None,
            })
            .collect();
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].len(), 3);
        assert!(payloads[0].iter().any(|r| r["last"] == json!("Poe")));

        t.tick(now);
        assert!(changed_payloads(&t.drain_events()).is_empty());
    }

    #[test]
    fn failed_worker_commit_is_applied_inline() {
        let mut t = table(DataTableOptions {
            enable_editing: true,
            ..Default::default()
        })
        .with_commit_actor(FailingActor);
        let now = Instant::now();
        let id = t.model().page[0];
        edit_first_name(&mut t, id, now);
        assert_eq!(t.row(id).unwrap().data["first"], json!("Jane!"));
        assert_eq!(changed_payloads(&t.drain_events()), vec![2]);
    }

    #[test]
    fn late_reply_for_a_deleted_row_is_dropped() {
        let actor = ManualActor::default();
        let mut t = table(DataTableOptions {
            enable_editing: true,
            enable_deleting: true,
            ..Default::default()
        })
        .with_commit_actor(actor.clone());
        let now = Instant::now();
        let id = t.model().page[0];
        edit_first_name(&mut t, id, now);
        assert_eq!(actor.queued.borrow().len(), 1);
        assert!(changed_payloads(&t.drain_events()).is_empty());

        assert!(t.delete_row(id));
        assert_eq!(changed_payloads(&t.drain_events()), vec![1]);

        let (req, tx) = actor.queued.borrow_mut().remove(0);
        tx.send(apply_commit(&req).unwrap()).unwrap();
        t.tick(now);
        assert!(changed_payloads(&t.drain_events()).is_empty());
        assert!(t.row(id).is_none());
        assert_eq!(t.rows().len(), 1);
    }

    #[test]
    fn disconnected_worker_falls_back_to_inline_commit() {
        let actor = ManualActor::default();
        let mut t = table(DataTableOptions {
            enable_editing: true,
            ..Default::default()
        })
        .with_commit_actor(actor.clone());
        let now = Instant::now();
        let id = t.model().page[0];
        edit_first_name(&mut t, id, now);
        t.drain_events();

        actor.queued.borrow_mut().clear();
        t.tick(now);
        assert_eq!(t.row(id).unwrap().data["first"], json!("Jane!"));
        assert_eq!(changed_payloads(&t.drain_events()), vec![2]);
    }

    #[test]
    fn escape_cancels_without_mutation() {
        let mut t = table(DataTableOptions {
            enable_editing: true,
            ..Default::default()
        });
        let now = Instant::now();
        let id = t.model().page[0];
        t.click_cell(CellRef::new(id, "first"), now);
        t.handle_event(key(KeyCode::Char('x')), now);
        t.handle_event(key(KeyCode::Esc), now);
        assert_eq!(t.row(id).unwrap().data["first"], json!("Jane"));
        assert!(changed_payloads(&t.drain_events()).is_empty());
    }

    #[test]
    fn editing_is_refused_when_disabled() {
        let mut t = table(DataTableOptions::default());
        let id = t.model().page[0];
        assert!(!t.begin_edit(&CellRef::new(id, "first")));

        let settings = vec![
            ColumnSetting::new("First", "first")
                .with_editor(EditorDescriptor::new(EditorKind::Text))
                .with_disabled(|row| row.data["first"] == json!("Jane")),
        ];
        let mut t = DataTable::new(
            settings,
            people(),
            DataTableOptions {
                enable_editing: true,
                ..Default::default()
            },
        );
        let jane = t.model().page[0];
        let john = t.model().page[1];
        assert!(!t.begin_edit(&CellRef::new(jane, "first")));
        assert!(t.begin_edit(&CellRef::new(john, "first")));
    }

    #[test]
    fn switching_cells_cancels_an_invalid_edit() {
        let mut t = table(DataTableOptions {
            enable_editing: true,
            ..Default::default()
        });
        let now = Instant::now();
        let id = t.model().page[0];
        t.click_cell(CellRef::new(id, "last"), now);
        for _ in 0..3 {
            t.handle_event(key(KeyCode::Backspace), now);
        }
        assert_eq!(t.current_error(), Some("This field is required"));
        t.click_cell(CellRef::new(id, "first"), now);
        assert_eq!(t.row(id).unwrap().data["last"], json!("Doe"));
        assert_eq!(t.cell_error(&CellRef::new(id, "last")), None);
    }

    #[test]
    fn enter_selects_and_arrows_clamp() {
        let mut t = table(DataTableOptions::default());
        let now = Instant::now();
        t.handle_event(key(KeyCode::Right), now);
        let first = t.model().page[0];
        assert_eq!(t.selected_cell(), Some(&CellRef::new(first, "last")));
        t.handle_event(key(KeyCode::Right), now);
        t.handle_event(key(KeyCode::Right), now);
        assert_eq!(t.selected_cell(), Some(&CellRef::new(first, "first")));
        t.handle_event(key(KeyCode::Down), now);
        let second = t.model().page[1];
        assert_eq!(t.selected_cell(), Some(&CellRef::new(second, "first")));
        t.drain_events();
        t.handle_event(key(KeyCode::Enter), now);
        assert_eq!(t.editing_cell(), None);
        assert_eq!(t.active_row(), None);
        assert!(
            !t.drain_events()
                .iter()
                .any(|e| matches!(e, TableEvent::ActiveRowChanged(_)))
        );
        t.handle_event(key(KeyCode::Esc), now);
        assert_eq!(t.selected_cell(), None);
    }

    #[test]
    fn enter_promotes_the_row_only_when_an_editor_opens() {
        let mut t = table(DataTableOptions {
            enable_editing: true,
            ..Default::default()
        });
        let now = Instant::now();
        t.handle_event(key(KeyCode::Right), now);
        let first = t.model().page[0];
        let cell = CellRef::new(first, "last");
        assert_eq!(
            t.handle_event(key(KeyCode::Enter), now),
            DataTableAction::EditStarted(cell.clone())
        );
        assert_eq!(t.editing_cell(), Some(&cell));
        assert_eq!(t.active_row(), Some(first));
    }

    #[test]
    fn keys_are_ignored_while_another_table_is_active() {
        let arbiter = KeyboardArbiter::default();
        let mut a = table(DataTableOptions::default());
        let mut b = table(DataTableOptions::default());
        a.attach_arbiter(&arbiter);
        b.attach_arbiter(&arbiter);
        let now = Instant::now();
        let b_id = b.registration().unwrap().id();
        arbiter.focus(b_id, now);
        assert_eq!(a.handle_event(key(KeyCode::Down), now), DataTableAction::None);
        assert_eq!(b.handle_event(key(KeyCode::Down), now), DataTableAction::Redraw);
    }

    #[test]
    fn data_source_replacement_resets_row_state() {
        let mut t = table(DataTableOptions {
            enable_selection: true,
            ..Default::default()
        });
        let now = Instant::now();
        let id = t.model().page[0];
        t.toggle_row_selected(id);
        t.click_cell(CellRef::new(id, "first"), now);
        let before: Vec<RowId> = t.rows().iter().map(|r| r.id).collect();
        t.set_data_source(people());
        assert!(t.selected_rows().is_empty());
        assert_eq!(t.selected_cell(), None);
        assert_eq!(t.active_row(), None);
        assert!(t.rows().iter().all(|r| !before.contains(&r.id)));
    }

    #[test]
    fn double_click_within_window() {
        let mut t = table(DataTableOptions::default());
        let now = Instant::now();
        let id = t.model().page[0];
        t.click_cell(CellRef::new(id, "first"), now);
        t.click_cell(CellRef::new(id, "first"), now + Duration::from_millis(100));
        let doubles = t
            .drain_events()
            .iter()
            .filter(|e| matches!(e, TableEvent::RowDoubleClicked { .. }))
            .count();
        assert_eq!(doubles, 1);
    }

    #[test]
    fn column_settings_feedback_is_debounced() {
        let mut t = table(DataTableOptions::default());
        let now = Instant::now();
        t.toggle_sort(&ColumnId::new("first"), false, now);
        t.tick(now + Duration::from_millis(100));
        assert!(!t
            .drain_events()
            .iter()
            .any(|e| matches!(e, TableEvent::ColumnSettingsChanged(_))));
        t.tick(now + Duration::from_millis(600));
        let settings = t
            .drain_events()
            .into_iter()
            .find_map(|e| match e {
                TableEvent::ColumnSettingsChanged(s) => Some(s),
                _ => None,
            })
            .unwrap();
        let first = settings.iter().find(|s| s.field == "first").unwrap();
        assert!(first.sort.is_some());
    }
}
