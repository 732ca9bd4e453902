use super::column::CellAlign;
use super::column::ColumnId;
use super::column::PinSide;
use super::column::SortDirection;
use super::compile::ColumnKind;
use super::row::Row;
use super::row::RowId;
use super::table::CellRef;
use super::table::DataTable;
use super::table::DataTableAction;
use super::table::RowAction;
use super::table::redraw_if;
use crate::input::InputEvent;
use crate::input::MouseButton;
use crate::input::MouseEvent;
use crate::input::MouseEventKind;
use crate::render;
use crate::theme::Theme;
use crate::viewport::ViewportState;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Modifier;
use ratatui::style::Style;
use std::time::Instant;
use unicode_width::UnicodeWidthStr;
use virtualizer::Align;
use virtualizer::VirtualItem;
use virtualizer::Virtualizer;
use virtualizer::VirtualizerOptions;

/// When the body switches from laying out every row to a windowed renderer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VirtualizePolicy {
    Never,
    Always,
    /// Window once the filtered row count reaches this many rows, whatever the page size.
    AtLeast(usize),
}

impl Default for VirtualizePolicy {
    fn default() -> Self {
        Self::AtLeast(100)
    }
}

impl VirtualizePolicy {
    pub fn applies(self, rows: usize) -> bool {
        match self {
            VirtualizePolicy::Never => false,
            VirtualizePolicy::Always => true,
            VirtualizePolicy::AtLeast(n) => rows >= n,
        }
    }
}

/// Options for [`DataTableView`].
///
/// Styles left at `Style::default()` fall back to the [`Theme`] passed to `render`.
#[derive(Clone, Debug)]
pub struct DataTableViewOptions {
    pub virtualize: VirtualizePolicy,
    pub overscan_rows: usize,
    pub show_footer: bool,
    pub show_scrollbar_y: bool,
    /// Lines scrolled per mouse wheel step.
    pub wheel_lines: u16,
    pub style: Style,
    pub header_style: Style,
    pub grid_line_style: Style,
    pub scrollbar_style: Style,
    pub cursor_style: Style,
    pub editing_style: Style,
    pub selected_style: Style,
    pub active_style: Style,
    pub empty_message: String,
    pub row_cap_message: String,
    pub loading_message: String,
}

impl Default for DataTableViewOptions {
    fn default() -> Self {
        Self {
            virtualize: VirtualizePolicy::default(),
            overscan_rows: 2,
            show_footer: true,
            show_scrollbar_y: true,
            wheel_lines: 3,
            style: Style::default(),
            header_style: Style::default().add_modifier(Modifier::BOLD),
            grid_line_style: Style::default(),
            scrollbar_style: Style::default(),
            cursor_style: Style::default().add_modifier(Modifier::REVERSED),
            editing_style: Style::default().add_modifier(Modifier::UNDERLINED),
            selected_style: Style::default().add_modifier(Modifier::BOLD),
            active_style: Style::default().add_modifier(Modifier::ITALIC),
            empty_message: "No data".to_string(),
            row_cap_message: "Too many rows to display".to_string(),
            loading_message: "Loading…".to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PagerButton {
    First,
    Previous,
    Next,
    Last,
}

/// A column as placed on screen in the last frame.
#[derive(Clone, Debug)]
struct ColumnSlot {
    id: ColumnId,
    kind: ColumnKind,
    align: CellAlign,
    full_width: u16,
    x: u16,
    width: u16,
    clip_left: u32,
}

#[derive(Clone, Copy, Debug)]
struct RowSlot {
    id: RowId,
    y: u16,
    height: u16,
}

/// Where things landed in the last frame, for mouse hit-testing.
#[derive(Clone, Debug, Default)]
struct HitLayout {
    area: Rect,
    header_y: Option<u16>,
    columns: Vec<ColumnSlot>,
    separators: Vec<u16>,
    rows: Vec<RowSlot>,
    actions: Vec<(Rect, RowId, RowAction)>,
    buttons: Vec<(Rect, PagerButton)>,
}

impl HitLayout {
    fn column_at(&self, x: u16) -> Option<&ColumnSlot> {
        self.columns
            .iter()
            .find(|c| x >= c.x && x < c.x + c.width)
    }

    fn row_at(&self, y: u16) -> Option<RowId> {
        self.rows
            .iter()
            .find(|r| y >= r.y && y < r.y + r.height)
            .map(|r| r.id)
    }
}

#[derive(Clone, Copy)]
struct TableStyles {
    base: Style,
    header: Style,
    grid_line: Style,
    scrollbar: Style,
    cursor: Style,
    editing: Style,
    selected: Style,
    active: Style,
    new_row: Style,
    muted: Style,
    accent: Style,
    danger: Style,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct RowHeights {
    base: u16,
    error: u16,
    detail: u16,
}

impl RowHeights {
    fn total(self) -> u16 {
        self.base
            .saturating_add(self.error)
            .saturating_add(self.detail)
    }
}

struct BodyContext<'a> {
    area: Rect,
    buf: &'a mut Buffer,
    columns: &'a [ColumnSlot],
    separators: &'a [u16],
    styles: &'a TableStyles,
    rows: Vec<RowSlot>,
    actions: Vec<(Rect, RowId, RowAction)>,
}

/// Column before placement.
struct Placed {
    id: ColumnId,
    kind: ColumnKind,
    align: CellAlign,
    width: u16,
    sep: bool,
}

impl Placed {
    fn span(&self) -> u32 {
        self.width as u32 + u32::from(self.sep)
    }
}

/// Renders a [`DataTable`]: grouped header, pinned and scrolled columns, a full or windowed body
/// and a pager footer.
///
/// The view keeps only scroll offsets and the last frame's layout; all table state lives in the
/// `DataTable`. Route mouse input through [`handle_event`](Self::handle_event) so clicks can be
/// mapped back to cells.
pub struct DataTableView {
    pub state: ViewportState,
    options: DataTableViewOptions,
    row_v: Virtualizer,
    row_items: Vec<VirtualItem>,
    page_ids: Vec<RowId>,
    last_focus: Option<CellRef>,
    page_index: Option<usize>,
    layout: HitLayout,
}

impl Default for DataTableView {
    fn default() -> Self {
        let options = DataTableViewOptions::default();
        let row_v = row_virtualizer(0, options.overscan_rows);
        Self {
            state: ViewportState::default(),
            options,
            row_v,
            row_items: Vec::new(),
            page_ids: Vec::new(),
            last_focus: None,
            page_index: None,
            layout: HitLayout::default(),
        }
    }
}

impl DataTableView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: DataTableViewOptions) -> Self {
        let mut v = Self::default();
        v.set_options(options);
        v
    }

    pub fn options(&self) -> &DataTableViewOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: DataTableViewOptions) {
        self.options = options;
        self.row_v = row_virtualizer(self.page_ids.len(), self.options.overscan_rows);
    }

    /// Area of the last frame.
    pub fn area(&self) -> Rect {
        self.layout.area
    }

    pub fn scroll_y_by(&mut self, delta: i32) {
        self.state.scroll_y_by(delta);
        self.row_v.set_scroll_offset(self.state.y as u64);
    }

    pub fn scroll_x_by(&mut self, delta: i32) {
        self.state.scroll_x_by(delta);
    }

    /// Mouse events are hit-tested against the last frame; everything else goes to the table.
    pub fn handle_event(
        &mut self,
        table: &mut DataTable,
        event: InputEvent,
        now: Instant,
    ) -> DataTableAction {
        match event {
            InputEvent::Mouse(mouse) => self.handle_mouse(table, mouse, now),
            other => table.handle_event(other, now),
        }
    }

    pub fn handle_mouse(
        &mut self,
        table: &mut DataTable,
        event: MouseEvent,
        now: Instant,
    ) -> DataTableAction {
        match event.kind {
            MouseEventKind::Down(MouseButton::Left) => self.click(table, event, now),
            MouseEventKind::ScrollDown if self.contains(event.x, event.y) => {
                self.scroll_y_by(self.options.wheel_lines as i32);
                DataTableAction::Redraw
            }
            MouseEventKind::ScrollUp if self.contains(event.x, event.y) => {
                self.scroll_y_by(-(self.options.wheel_lines as i32));
                DataTableAction::Redraw
            }
            _ => DataTableAction::None,
        }
    }

    fn contains(&self, x: u16, y: u16) -> bool {
        let a = self.layout.area;
        x >= a.x && x < a.right() && y >= a.y && y < a.bottom()
    }

    fn click(&mut self, table: &mut DataTable, event: MouseEvent, now: Instant) -> DataTableAction {
        if let Some(reg) = table.registration() {
            reg.arbiter().pointer_down(event.x, event.y, now);
        }
        let (x, y) = (event.x, event.y);
        if !self.contains(x, y) {
            return DataTableAction::None;
        }
        let inside = |r: &Rect| x >= r.x && x < r.right() && y >= r.y && y < r.bottom();

        if let Some((_, button)) = self.layout.buttons.iter().find(|(r, _)| inside(r)) {
            let changed = match button {
                PagerButton::First => table.first_page(),
                PagerButton::Previous => table.previous_page(),
                PagerButton::Next => table.next_page(),
                PagerButton::Last => table.last_page(),
            };
            return redraw_if(changed);
        }
        if let Some((_, row, action)) = self.layout.actions.iter().find(|(r, _, _)| inside(r)) {
            return redraw_if(table.row_action(*row, *action));
        }
        let Some(column) = self.layout.column_at(x).cloned() else {
            return DataTableAction::None;
        };
        if self.layout.header_y == Some(y) {
            return match column.kind {
                ColumnKind::Select if table.toggle_select_all() => {
                    DataTableAction::SelectionChanged
                }
                ColumnKind::Data => {
                    redraw_if(table.toggle_sort(&column.id, event.modifiers.shift, now))
                }
                _ => DataTableAction::None,
            };
        }
        match self.layout.row_at(y) {
            Some(row) => table.click_cell(CellRef::new(row, column.id), now),
            None => DataTableAction::None,
        }
    }

    pub fn render(&mut self, table: &mut DataTable, area: Rect, buf: &mut Buffer, theme: &Theme) {
        self.layout = HitLayout {
            area,
            ..HitLayout::default()
        };
        if area.width == 0 || area.height == 0 {
            return;
        }
        if let Some(reg) = table.registration() {
            reg.arbiter().set_bounds(reg.id(), area);
        }

        let (content, scrollbar_x) = if self.options.show_scrollbar_y && area.width >= 2 {
            (
                Rect::new(area.x, area.y, area.width - 1, area.height),
                Some(area.right() - 1),
            )
        } else {
            (area, None)
        };
        table.set_viewport_width(content.width);
        let table: &DataTable = table;

        let styles = self.styles(theme);
        buf.set_style(content, styles.base);

        let header_h = if table.columns().has_groups() { 2u16 } else { 1u16 };
        let header_h = header_h.min(content.height);
        let footer_h = u16::from(self.options.show_footer && content.height > header_h);
        let header = Rect::new(content.x, content.y, content.width, header_h);
        let body = Rect::new(
            content.x,
            content.y + header_h,
            content.width,
            content.height - header_h - footer_h,
        );
        let footer = Rect::new(content.x, body.bottom(), content.width, footer_h);

        let focus = table.selected_cell().cloned();
        let focus_moved = focus != self.last_focus;
        self.last_focus = focus.clone();
        let focus = focus.filter(|_| focus_moved);
        let page_index = table.pagination().page_index;
        if self.page_index != Some(page_index) {
            self.page_index = Some(page_index);
            self.state.to_top();
        }

        self.state.viewport_h = body.height;
        if let Some(err) = table.config_error() {
            self.state.content_h = 0;
            self.state.clamp();
            let msg = format!(" Invalid column configuration: {err}");
            render::render_str_clipped(body.x, body.y, 0, body.width, buf, &msg, styles.danger);
        } else {
            self.place_columns(table, content, focus.as_ref().map(|c| &c.column));
            self.render_header(table, header, buf, &styles);
            let message = if table.exceeds_row_cap() {
                Some(&self.options.row_cap_message)
            } else if table.model().page.is_empty() {
                if table.is_loading() {
                    Some(&self.options.loading_message)
                } else {
                    Some(&self.options.empty_message)
                }
            } else {
                None
            };
            match message {
                Some(msg) => {
                    let msg = format!(" {msg}");
                    render::render_str_clipped(
                        body.x,
                        body.y,
                        0,
                        body.width,
                        buf,
                        &msg,
                        styles.muted,
                    );
                    self.page_ids.clear();
                    self.state.content_h = 0;
                    self.state.clamp();
                }
                None => self.render_body(table, body, buf, &styles, focus.map(|c| c.row)),
            }
        }

        if footer.height > 0 {
            self.render_footer(table, footer, buf, &styles);
        }

        if let Some(sb_x) = scrollbar_x {
            render::render_scrollbar(
                Rect::new(sb_x, body.y, 1, body.height),
                buf,
                &ViewportState {
                    x: 0,
                    y: self.state.y,
                    viewport_w: 1,
                    viewport_h: body.height,
                    content_w: 1,
                    content_h: self.state.content_h,
                },
                styles.scrollbar,
            );
        }
    }

    fn styles(&self, theme: &Theme) -> TableStyles {
        let o = &self.options;
        TableStyles {
            base: if o.style == Style::default() {
                theme.text_primary
            } else {
                o.style
            },
            header: o.header_style.patch(theme.header),
            grid_line: if o.grid_line_style == Style::default() {
                theme.text_muted
            } else {
                o.grid_line_style
            },
            scrollbar: o.scrollbar_style,
            cursor: o.cursor_style.patch(theme.accent),
            editing: o.editing_style.patch(theme.accent),
            selected: o.selected_style,
            active: o.active_style,
            new_row: theme.highlight,
            muted: theme.text_muted,
            accent: theme.accent,
            danger: theme.danger,
        }
    }

    /// Lays out pinned-left, scrolled center and pinned-right sections. Selection and expander
    /// columns lead the left section; the actions column closes the right one.
    fn place_columns(&mut self, table: &DataTable, area: Rect, focus: Option<&ColumnId>) {
        let state = table.column_state();
        let mut lead = Vec::new();
        let mut left = Vec::new();
        let mut center = Vec::new();
        let mut right = Vec::new();
        let mut trail = Vec::new();
        for def in table.display_columns() {
            let placed = Placed {
                id: def.id.clone(),
                kind: def.kind,
                align: def.align,
                width: state.width(&def.id),
                sep: true,
            };
            match (def.kind, state.pinning.side(&def.id)) {
                (ColumnKind::Select | ColumnKind::Expand, _) => lead.push(placed),
                (ColumnKind::Actions, _) => trail.push(placed),
                (ColumnKind::Data, Some(PinSide::Left)) => left.push(placed),
                (ColumnKind::Data, Some(PinSide::Right)) => right.push(placed),
                (ColumnKind::Data, None) => center.push(placed),
            }
        }
        lead.append(&mut left);
        right.append(&mut trail);
        let last = [&mut right, &mut center, &mut lead]
            .into_iter()
            .find_map(|section| section.last_mut());
        if let Some(last) = last {
            last.sep = false;
        }

        let span = |cols: &[Placed]| cols.iter().map(Placed::span).sum::<u32>();
        let left_w = span(&lead).min(area.width as u32) as u16;
        let right_w = span(&right).min(area.width.saturating_sub(left_w) as u32) as u16;
        let center_w = area.width - left_w - right_w;

        self.state.viewport_w = center_w;
        self.state.content_w = span(&center);
        if let Some(focus) = focus {
            let mut start = 0u32;
            for col in &center {
                if &col.id == focus {
                    let end = start + col.width as u32;
                    if start < self.state.x {
                        self.state.x = start;
                    } else if end > self.state.x + center_w as u32 {
                        self.state.x = end.saturating_sub(center_w as u32);
                    }
                    break;
                }
                start += col.span();
            }
        }
        self.state.clamp();

        let layout = &mut self.layout;
        layout.columns.clear();
        layout.separators.clear();
        let sections = [
            (&lead, Rect::new(area.x, area.y, left_w, area.height), 0u64),
            (
                &center,
                Rect::new(area.x + left_w, area.y, center_w, area.height),
                self.state.x as u64,
            ),
            (
                &right,
                Rect::new(area.x + left_w + center_w, area.y, right_w, area.height),
                0u64,
            ),
        ];
        for (cols, section, scroll) in sections {
            let mut start = 0u64;
            for col in cols.iter() {
                if let Some((x, width, clip_left)) =
                    clip_span(section, scroll, start, col.width as u32)
                {
                    layout.columns.push(ColumnSlot {
                        id: col.id.clone(),
                        kind: col.kind,
                        align: col.align,
                        full_width: col.width,
                        x,
                        width,
                        clip_left,
                    });
                }
                if col.sep {
                    let rel = (start + col.width as u64) as i64 - scroll as i64;
                    if rel >= 0 && rel < section.width as i64 {
                        layout.separators.push(section.x + rel as u16);
                    }
                }
                start += col.span() as u64;
            }
        }
    }

    fn render_header(
        &mut self,
        table: &DataTable,
        area: Rect,
        buf: &mut Buffer,
        styles: &TableStyles,
    ) {
        if area.height == 0 {
            return;
        }
        buf.set_style(area, styles.header);
        let leaf_y = area.bottom() - 1;
        self.layout.header_y = Some(leaf_y);

        if area.height > 1 {
            self.render_group_line(table, area.y, buf, styles);
        }

        let state = table.column_state();
        for slot in &self.layout.columns {
            let Some(def) = table.columns().def(&slot.id) else {
                continue;
            };
            let label = match slot.kind {
                ColumnKind::Select if table.all_selected() => "[x]".to_string(),
                ColumnKind::Select => "[ ]".to_string(),
                ColumnKind::Expand => String::new(),
                ColumnKind::Actions => def.title.clone(),
                ColumnKind::Data => {
                    let mut label = def.title.clone();
                    if let Some(dir) = state.sort_of(&slot.id) {
                        label.push(' ');
                        label.push(match dir {
                            SortDirection::Asc => '▲',
                            SortDirection::Desc => '▼',
                        });
                        if state.sorting.len() > 1 {
                            let pos = state.sorting.iter().position(|s| s.column == slot.id);
                            if let Some(pos) = pos {
                                label.push_str(&(pos + 1).to_string());
                            }
                        }
                    }
                    label
                }
            };
            let label = align_text(&label, slot.align, slot.full_width);
            render::render_str_clipped(
                slot.x,
                leaf_y,
                slot.clip_left,
                slot.width,
                buf,
                &label,
                styles.header,
            );
        }
        for y in area.y..area.bottom() {
            for &x in &self.layout.separators {
                buf.set_stringn(x, y, "│", 1, styles.grid_line);
            }
        }
    }

    /// Group titles over runs of adjacent columns sharing a group.
    fn render_group_line(&self, table: &DataTable, y: u16, buf: &mut Buffer, styles: &TableStyles) {
        let group_of = |slot: &ColumnSlot| {
            table
                .columns()
                .def(&slot.id)
                .and_then(|d| d.group.clone())
        };
        let flush = |run: Option<(String, u16, u16)>, buf: &mut Buffer| {
            if let Some((title, x, end)) = run {
                render::render_str_clipped(x, y, 0, end - x, buf, &title, styles.header);
            }
        };
        let mut run: Option<(String, u16, u16)> = None;
        for slot in &self.layout.columns {
            let group = group_of(slot);
            let end = slot.x + slot.width;
            if let (Some((title, _, run_end)), Some(g)) = (run.as_mut(), group.as_ref()) {
                if *title == *g {
                    *run_end = end;
                    continue;
                }
            }
            flush(run.take(), buf);
            run = group.map(|g| (g, slot.x, end));
        }
        flush(run, buf);
    }

    fn render_body(
        &mut self,
        table: &DataTable,
        area: Rect,
        buf: &mut Buffer,
        styles: &TableStyles,
        focus_row: Option<RowId>,
    ) {
        let page: Vec<&Row> = table.page_rows().collect();
        let display = table.display_columns();
        let data_ids: Vec<&ColumnId> = display
            .iter()
            .filter(|d| d.kind == ColumnKind::Data)
            .map(|d| &d.id)
            .collect();
        let focus_index = focus_row.and_then(|id| page.iter().position(|r| r.id == id));
        let windowed = self.options.virtualize.applies(table.model().total);

        let mut ctx = BodyContext {
            area,
            buf,
            columns: &self.layout.columns,
            separators: &self.layout.separators,
            styles,
            rows: Vec::new(),
            actions: Vec::new(),
        };

        if windowed {
            let ids: Vec<RowId> = page.iter().map(|r| r.id).collect();
            if ids != self.page_ids {
                self.page_ids = ids;
                self.row_v = row_virtualizer(self.page_ids.len(), self.options.overscan_rows);
            }
            self.row_v.set_viewport_size(area.height as u32);
            self.row_v.set_scroll_offset(self.state.y as u64);
            if let Some(idx) = focus_index {
                self.row_v.scroll_to_index(idx, Align::Auto);
            }
            self.row_v.collect_virtual_items(&mut self.row_items);
            for item in &self.row_items {
                if let Some(row) = page.get(item.index) {
                    let h = row_heights(table, row, &data_ids, false).total() as u32;
                    if h != item.size {
                        self.row_v.measure(item.index, h);
                    }
                }
            }
            self.row_v.collect_virtual_items(&mut self.row_items);

            let scroll = self.row_v.scroll_offset();
            for item in &self.row_items {
                let Some(row) = page.get(item.index) else {
                    continue;
                };
                let heights = row_heights(table, row, &data_ids, false);
                let top = item.start as i64 - scroll as i64;
                draw_row(&mut ctx, table, row, top, heights);
            }
            self.state.content_h = self.row_v.total_size().min(u32::MAX as u64) as u32;
            self.state.y = scroll.min(u32::MAX as u64) as u32;
            self.state.clamp();
        } else {
            self.page_ids.clear();
            let heights: Vec<RowHeights> = page
                .iter()
                .map(|row| row_heights(table, row, &data_ids, true))
                .collect();
            let total: u32 = heights.iter().map(|h| h.total() as u32).sum();
            self.state.content_h = total;
            if let Some(idx) = focus_index {
                let start: u32 = heights[..idx].iter().map(|h| h.total() as u32).sum();
                let end = start + heights[idx].total() as u32;
                if start < self.state.y {
                    self.state.y = start;
                } else if end > self.state.y + area.height as u32 {
                    self.state.y = end.saturating_sub(area.height as u32);
                }
            }
            self.state.clamp();

            let mut start = 0i64;
            for (row, h) in page.iter().zip(heights) {
                let top = start - self.state.y as i64;
                if top >= area.height as i64 {
                    break;
                }
                if top + h.total() as i64 > 0 {
                    draw_row(&mut ctx, table, row, top, h);
                }
                start += h.total() as i64;
            }
        }

        let BodyContext { rows, actions, .. } = ctx;
        self.layout.rows = rows;
        self.layout.actions = actions;
    }

    fn render_footer(
        &mut self,
        table: &DataTable,
        area: Rect,
        buf: &mut Buffer,
        styles: &TableStyles,
    ) {
        let mut x = area.x;
        let can_prev = table.can_previous_page();
        let can_next = table.can_next_page();
        let button_style = |enabled: bool| if enabled { styles.accent } else { styles.muted };
        let mut buttons = Vec::new();

        for (label, button, enabled) in [
            ("«", PagerButton::First, can_prev),
            ("‹", PagerButton::Previous, can_prev),
        ] {
            let rect = put_text(buf, area, &mut x, label, button_style(enabled));
            if enabled && rect.width > 0 {
                buttons.push((rect, button));
            }
            put_text(buf, area, &mut x, " ", styles.base);
        }
        let page = table.pagination().page_index + 1;
        let pages = table.page_count().max(1);
        put_text(buf, area, &mut x, &format!("Page {page} of {pages} "), styles.base);
        for (label, button, enabled) in [
            ("›", PagerButton::Next, can_next),
            ("»", PagerButton::Last, can_next),
        ] {
            let rect = put_text(buf, area, &mut x, label, button_style(enabled));
            if enabled && rect.width > 0 {
                buttons.push((rect, button));
            }
            put_text(buf, area, &mut x, " ", styles.base);
        }
        let total = table.total_rows();
        let noun = if total == 1 { "row" } else { "rows" };
        put_text(buf, area, &mut x, &format!(" {total} {noun}"), styles.muted);
        if table.is_loading() {
            let loading = format!("  {}", self.options.loading_message);
            put_text(buf, area, &mut x, &loading, styles.accent);
        }
        if let Some(err) = table.current_error() {
            put_text(buf, area, &mut x, &format!("  ⚠ {err}"), styles.danger);
        }
        self.layout.buttons = buttons;
    }
}

fn row_virtualizer(count: usize, overscan: usize) -> Virtualizer {
    let mut opts = VirtualizerOptions::new(count, |_| 1);
    opts.overscan = overscan;
    Virtualizer::new(opts)
}

fn row_heights(
    table: &DataTable,
    row: &Row,
    data_ids: &[&ColumnId],
    with_detail: bool,
) -> RowHeights {
    let base = data_ids
        .iter()
        .filter_map(|id| table.columns().def(id))
        .map(|def| {
            let cell = CellRef::new(row.id, def.id.clone());
            if table.editing_cell() == Some(&cell) {
                1
            } else {
                table.cell_text(row, def).split('\n').count()
            }
        })
        .max()
        .unwrap_or(1)
        .clamp(1, u16::MAX as usize) as u16;
    let error = u16::from(table.row_errors(row.id).next().is_some());
    let detail = if with_detail && table.is_expanded(row.id) {
        table.row_detail(row).len().min(u16::MAX as usize) as u16
    } else {
        0
    };
    RowHeights {
        base,
        error,
        detail,
    }
}

fn line_y(area: Rect, top: i64, line: u16) -> Option<u16> {
    let rel = top + line as i64;
    (rel >= 0 && rel < area.height as i64).then(|| area.y + rel as u16)
}

fn draw_row(
    ctx: &mut BodyContext<'_>,
    table: &DataTable,
    row: &Row,
    top: i64,
    heights: RowHeights,
) {
    let area = ctx.area;
    let vis_top = top.max(0);
    let vis_bottom = (top + heights.total() as i64).min(area.height as i64);
    if vis_bottom <= vis_top {
        return;
    }
    ctx.rows.push(RowSlot {
        id: row.id,
        y: area.y + vis_top as u16,
        height: (vis_bottom - vis_top) as u16,
    });

    let styles = ctx.styles;
    let mut row_style = styles.base;
    if row.is_new {
        row_style = row_style.patch(styles.new_row);
    }
    if table.selected_rows().contains(&row.id) {
        row_style = row_style.patch(styles.selected);
    }
    if table.active_row() == Some(row.id) {
        row_style = row_style.patch(styles.active);
    }
    for line in 0..heights.base {
        if let Some(y) = line_y(area, top, line) {
            ctx.buf.set_style(Rect::new(area.x, y, area.width, 1), row_style);
            for &x in ctx.separators {
                ctx.buf.set_stringn(x, y, "│", 1, styles.grid_line);
            }
        }
    }

    for slot in ctx.columns {
        let cell = CellRef::new(row.id, slot.id.clone());
        let mut style = row_style;
        let lines: Vec<String> = match slot.kind {
            ColumnKind::Select => {
                let mark = if table.disabled_rows().contains(&row.id) {
                    style = style.patch(styles.muted);
                    "[-]"
                } else if table.selected_rows().contains(&row.id) {
                    "[x]"
                } else {
                    "[ ]"
                };
                vec![mark.to_string()]
            }
            ColumnKind::Expand => {
                let mark = if table.is_expanded(row.id) { "▾" } else { "▸" };
                vec![mark.to_string()]
            }
            ColumnKind::Actions => {
                draw_actions(ctx, table, row, slot, top, row_style);
                continue;
            }
            ColumnKind::Data => {
                let Some(def) = table.columns().def(&slot.id) else {
                    continue;
                };
                match table.editor().filter(|_| table.editing_cell() == Some(&cell)) {
                    Some(editor) => {
                        style = style.patch(styles.editing);
                        vec![editor.display()]
                    }
                    None => {
                        if table.selected_cell() == Some(&cell) {
                            style = style.patch(styles.cursor);
                        }
                        table
                            .cell_text(row, def)
                            .split('\n')
                            .map(str::to_string)
                            .collect()
                    }
                }
            }
        };
        if table.cell_error(&cell).is_some() {
            style = style.patch(styles.danger);
        }
        for line in 0..heights.base {
            let Some(y) = line_y(area, top, line) else {
                continue;
            };
            ctx.buf.set_style(Rect::new(slot.x, y, slot.width, 1), style);
            let Some(text) = lines.get(line as usize) else {
                continue;
            };
            let text = align_text(text, slot.align, slot.full_width);
            render::render_str_clipped(
                slot.x,
                y,
                slot.clip_left,
                slot.width,
                ctx.buf,
                &text,
                style,
            );
        }
    }

    if heights.error > 0 {
        if let Some(y) = line_y(area, top, heights.base) {
            let msg = table
                .row_errors(row.id)
                .map(|(col, msg)| {
                    let title = table.columns().def(col).map(|d| d.title.as_str()).unwrap_or("");
                    format!("{title}: {msg}")
                })
                .collect::<Vec<_>>()
                .join("; ");
            let msg = format!("  ⚠ {msg}");
            render::render_str_clipped(area.x, y, 0, area.width, ctx.buf, &msg, styles.danger);
        }
    }

    if heights.detail > 0 {
        for (i, text) in table.row_detail(row).iter().enumerate() {
            let line = heights.base + heights.error + i as u16;
            if let Some(y) = line_y(area, top, line) {
                let text = format!("    {text}");
                render::render_str_clipped(area.x, y, 0, area.width, ctx.buf, &text, styles.muted);
            }
        }
    }
}

/// Save/cancel for new rows, delete for saved ones.
fn draw_actions(
    ctx: &mut BodyContext<'_>,
    table: &DataTable,
    row: &Row,
    slot: &ColumnSlot,
    top: i64,
    style: Style,
) {
    let Some(y) = line_y(ctx.area, top, 0) else {
        return;
    };
    let styles = ctx.styles;
    let buttons = if row.is_new {
        let save = if table.can_save_row(row.id) {
            styles.accent
        } else {
            styles.muted
        };
        vec![
            ("Save", RowAction::Save, save),
            ("✕", RowAction::Cancel, styles.danger),
        ]
    } else if table.options().enable_deleting {
        vec![("Delete", RowAction::Delete, styles.danger)]
    } else {
        Vec::new()
    };
    let mut offset = 0u32;
    for (label, action, button_style) in buttons {
        let w = label.width() as u32;
        if offset >= slot.clip_left && offset + w <= slot.clip_left + slot.width as u32 {
            let x = slot.x + (offset - slot.clip_left) as u16;
            let rect = Rect::new(x, y, w as u16, 1);
            let button_style = style.patch(button_style);
            render::render_str_clipped(x, y, 0, rect.width, ctx.buf, label, button_style);
            ctx.actions.push((rect, row.id, action));
        }
        offset += w + 1;
    }
}

/// Screen x, visible width and left clip of `[start, start + size)` inside a scrolled section.
fn clip_span(section: Rect, scroll: u64, start: u64, size: u32) -> Option<(u16, u16, u32)> {
    let rel = start as i64 - scroll as i64;
    if rel >= section.width as i64 {
        return None;
    }
    let clip_left = (-rel).max(0) as u32;
    let x = rel.max(0) as u16;
    let visible = size
        .saturating_sub(clip_left)
        .min((section.width - x) as u32) as u16;
    (visible > 0).then_some((section.x + x, visible, clip_left))
}

fn align_text(text: &str, align: CellAlign, width: u16) -> String {
    let pad = (width as usize).saturating_sub(text.width());
    let lead = match align {
        CellAlign::Left => 0,
        CellAlign::Center => pad / 2,
        CellAlign::Right => pad,
    };
    if lead == 0 {
        return text.to_string();
    }
    format!("{}{text}", " ".repeat(lead))
}

fn put_text(buf: &mut Buffer, area: Rect, x: &mut u16, text: &str, style: Style) -> Rect {
    let w = (text.width().min(u16::MAX as usize) as u16).min(area.right().saturating_sub(*x));
    render::render_str_clipped(*x, area.y, 0, w, buf, text, style);
    let rect = Rect::new(*x, area.y, w, 1);
    *x += w;
    rect
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatable::column::ColumnSetting;
    use crate::datatable::commit::InlineCommitActor;
    use crate::datatable::table::DataTableOptions;
    use crate::datatable::table::TableEvent;
    use serde_json::Value;
    use serde_json::json;

    fn line(buf: &Buffer, y: u16) -> String {
        (0..buf.area.width)
            .map(|x| buf.cell((x, y)).unwrap().symbol().to_string())
            .collect()
    }

    fn people(n: usize) -> Vec<Value> {
        (0..n)
            .map(|i| json!({"name": format!("p{i}"), "city": format!("c{i}")}))
            .collect()
    }

    fn table(data: Vec<Value>, options: DataTableOptions) -> DataTable {
        let settings = vec![
            ColumnSetting::new("Name", "name"),
            ColumnSetting::new("City", "city"),
        ];
        DataTable::new(settings, data, options).with_commit_actor(InlineCommitActor)
    }

    fn draw(view: &mut DataTableView, t: &mut DataTable, w: u16, h: u16) -> Buffer {
        let area = Rect::new(0, 0, w, h);
        let mut buf = Buffer::empty(area);
        view.render(t, area, &mut buf, &Theme::default());
        buf
    }

    fn left_click(x: u16, y: u16) -> MouseEvent {
        MouseEvent::new(x, y, MouseEventKind::Down(MouseButton::Left))
    }

    #[test]
    fn renders_header_rows_and_footer() {
        let mut t = table(people(3), DataTableOptions::default());
        let mut view = DataTableView::new();
        let buf = draw(&mut view, &mut t, 40, 6);
        assert!(line(&buf, 0).starts_with("Name"));
        assert!(line(&buf, 0).contains("City"));
        assert!(line(&buf, 1).starts_with("p0"));
        assert!(line(&buf, 3).starts_with("p2"));
        assert!(line(&buf, 5).contains("Page 1 of 1"));
        assert!(line(&buf, 5).contains("3 rows"));
    }

    #[test]
    fn short_circuit_messages_replace_the_body() {
        let mut t = table(Vec::new(), DataTableOptions::default());
        let mut view = DataTableView::new();
        let buf = draw(&mut view, &mut t, 40, 5);
        assert!(line(&buf, 1).contains("No data"));

        let mut t = table(
            people(5),
            DataTableOptions {
                max_rows: Some(4),
                ..Default::default()
            },
        );
        let buf = draw(&mut view, &mut t, 40, 5);
        assert!(line(&buf, 1).contains("Too many rows"));

        let settings = vec![ColumnSetting::new("A", "a"), ColumnSetting::new("B", "a")];
        let mut t = DataTable::new(settings, people(2), DataTableOptions::default());
        let buf = draw(&mut view, &mut t, 60, 5);
        assert!(line(&buf, 1).contains("Invalid column configuration"));
    }

    #[test]
    fn windowed_body_draws_only_visible_rows() {
        let mut t = table(
            people(500),
            DataTableOptions {
                page_size: 500,
                ..Default::default()
            },
        );
        let mut view = DataTableView::with_options(DataTableViewOptions {
            virtualize: VirtualizePolicy::Always,
            ..Default::default()
        });
        let buf = draw(&mut view, &mut t, 40, 6);
        assert!(line(&buf, 1).starts_with("p0"));
        assert!(line(&buf, 4).starts_with("p3"));
        assert_eq!(view.state.content_h, 500);

        view.scroll_y_by(100);
        let buf = draw(&mut view, &mut t, 40, 6);
        assert!(line(&buf, 1).starts_with("p100"));
    }

    #[test]
    fn default_policy_counts_filtered_rows_not_the_page() {
        let options = DataTableOptions {
            page_size: 10,
            ..Default::default()
        };
        let mut large = table(people(150), options.clone());
        let mut view = DataTableView::new();
        let buf = draw(&mut view, &mut large, 40, 6);
        assert!(line(&buf, 1).starts_with("p0"));
        assert_eq!(view.page_ids.len(), 10);

        let mut small = table(people(50), options);
        let mut view = DataTableView::new();
        draw(&mut view, &mut small, 40, 6);
        assert!(view.page_ids.is_empty());
    }

    #[test]
    fn header_click_sorts_and_body_click_selects() {
        let mut t = table(people(3), DataTableOptions::default());
        let mut view = DataTableView::new();
        draw(&mut view, &mut t, 40, 6);
        let now = Instant::now();

        let action = view.handle_mouse(&mut t, left_click(1, 0), now);
        assert_eq!(action, DataTableAction::Redraw);
        assert_eq!(
            t.column_state().sort_of(&ColumnId::new("name")),
            Some(SortDirection::Asc)
        );
        let buf = draw(&mut view, &mut t, 40, 6);
        assert!(line(&buf, 0).starts_with("Name ▲"));

        view.handle_mouse(&mut t, left_click(1, 2), now);
        let clicked = t
            .drain_events()
            .into_iter()
            .any(|e| matches!(e, TableEvent::RowClicked { data, .. } if data["name"] == "p1"));
        assert!(clicked);
        assert_eq!(t.selected_cell().map(|c| c.column.as_str()), Some("name"));
    }

    #[test]
    fn footer_buttons_page_and_disable_at_edges() {
        let mut t = table(
            people(5),
            DataTableOptions {
                page_size: 2,
                ..Default::default()
            },
        );
        let mut view = DataTableView::new();
        let buf = draw(&mut view, &mut t, 40, 6);
        let footer = line(&buf, 5);
        assert!(footer.contains("Page 1 of 3"));
        let first = footer.chars().position(|c| c == '«').unwrap() as u16;
        assert_eq!(
            view.handle_mouse(&mut t, left_click(first, 5), Instant::now()),
            DataTableAction::None
        );
        let next = footer.chars().position(|c| c == '›').unwrap() as u16;
        view.handle_mouse(&mut t, left_click(next, 5), Instant::now());
        assert_eq!(t.pagination().page_index, 1);
        let buf = draw(&mut view, &mut t, 40, 6);
        assert!(line(&buf, 1).starts_with("p2"));
    }

    #[test]
    fn right_pinned_column_sticks_to_the_edge() {
        let settings = vec![
            ColumnSetting::new("Name", "name").with_width(10),
            ColumnSetting::new("City", "city")
                .with_width(10)
                .with_pin(PinSide::Right),
        ];
        let mut t = DataTable::new(settings, people(2), DataTableOptions::default());
        let mut view = DataTableView::new();
        let buf = draw(&mut view, &mut t, 31, 4);
        assert!(line(&buf, 0).starts_with("Name"));
        assert_eq!(buf.cell((20, 0)).unwrap().symbol(), "C");
        assert_eq!(buf.cell((10, 0)).unwrap().symbol(), "│");
    }

    #[test]
    fn policy_thresholds() {
        assert!(!VirtualizePolicy::default().applies(99));
        assert!(VirtualizePolicy::default().applies(100));
        assert!(!VirtualizePolicy::Never.applies(10_000));
        assert!(VirtualizePolicy::Always.applies(0));
    }
}
