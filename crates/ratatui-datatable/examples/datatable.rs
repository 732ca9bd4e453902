use crossterm::event::DisableMouseCapture;
use crossterm::event::EnableMouseCapture;
use crossterm::terminal::EnterAlternateScreen;
use crossterm::terminal::LeaveAlternateScreen;
use crossterm::terminal::disable_raw_mode;
use crossterm::terminal::enable_raw_mode;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::Rect;
use ratatui::text::Span;
use ratatui::widgets::Block;
use ratatui::widgets::Borders;
use ratatui_datatable::crossterm_input::input_event_from_crossterm;
use ratatui_datatable::datatable::ColumnSetting;
use ratatui_datatable::datatable::DataTable;
use ratatui_datatable::datatable::DataTableOptions;
use ratatui_datatable::datatable::DataTableView;
use ratatui_datatable::datatable::EditorDescriptor;
use ratatui_datatable::datatable::EditorKind;
use ratatui_datatable::datatable::EditorOption;
use ratatui_datatable::datatable::FetchRequest;
use ratatui_datatable::datatable::KeyboardArbiter;
use ratatui_datatable::datatable::PinSide;
use ratatui_datatable::datatable::RowDetail;
use ratatui_datatable::datatable::Rule;
use ratatui_datatable::datatable::ServerFetchResult;
use ratatui_datatable::datatable::TableEvent;
use ratatui_datatable::input::InputEvent;
use ratatui_datatable::input::KeyCode;
use ratatui_datatable::theme::Theme;
use serde_json::Value;
use serde_json::json;
use simplelog::Config;
use simplelog::LevelFilter;
use simplelog::WriteLogger;
use std::fs::File;
use std::io;
use std::time::Duration;
use std::time::Instant;

const LOG_FILE: &str = "datatable.log";

struct Pane {
    title: &'static str,
    table: DataTable,
    view: DataTableView,
}

fn main() -> io::Result<()> {
    if let Err(err) = WriteLogger::init(
        LevelFilter::Debug,
        Config::default(),
        File::create(LOG_FILE)?,
    ) {
        eprintln!("logging disabled: {err}");
    }

    let arbiter = KeyboardArbiter::default();
    let mut panes = [people_pane(&arbiter), orders_pane(&arbiter)];
    let orders = order_rows();

    let mut stdout = io::stdout();
    enable_raw_mode()?;
    crossterm::execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    let theme = Theme::default();

    let res = run(&mut terminal, &theme, &arbiter, &mut panes, &orders);

    disable_raw_mode()?;
    crossterm::execute!(
        terminal.backend_mut(),
        DisableMouseCapture,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;
    res
}

fn run<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    theme: &Theme,
    arbiter: &KeyboardArbiter,
    panes: &mut [Pane; 2],
    orders: &[Value],
) -> io::Result<()> {
    if let Some(id) = panes[0].table.registration().map(|r| r.id()) {
        arbiter.focus(id, Instant::now());
    }

    loop {
        let now = Instant::now();
        for pane in panes.iter_mut() {
            pane.table.tick(now);
            drain(&mut pane.table, orders);
        }

        terminal.draw(|f| {
            let area = f.area();
            let status_h = 1;
            let body_h = area.height.saturating_sub(status_h);
            let top_h = body_h / 2;
            let areas = [
                Rect::new(area.x, area.y, area.width, top_h),
                Rect::new(area.x, area.y + top_h, area.width, body_h - top_h),
            ];
            for (pane, pane_area) in panes.iter_mut().zip(areas) {
                let focused = pane
                    .table
                    .registration()
                    .is_some_and(|r| arbiter.active() == Some(r.id()));
                let block = Block::default()
                    .title(pane.title)
                    .borders(Borders::ALL)
                    .border_style(if focused { theme.accent } else { theme.text_muted });
                let inner = block.inner(pane_area);
                f.render_widget(block, pane_area);
                pane.view
                    .render(&mut pane.table, inner, f.buffer_mut(), theme);
            }

            let status = Rect::new(area.x, area.y + body_h, area.width, status_h);
            let help = format!(
                "tab switch table · ctrl-c quit · {}",
                panes[0].table.options().keymap.help_line()
            );
            let span = Span::styled(help, theme.text_muted);
            f.buffer_mut()
                .set_span(status.x, status.y, &span, status.width);
        })?;

        if !crossterm::event::poll(Duration::from_millis(50))? {
            continue;
        }
        let Some(ev) = input_event_from_crossterm(crossterm::event::read()?) else {
            continue;
        };
        let now = Instant::now();
        if let InputEvent::Key(key) = &ev {
            if key.modifiers.ctrl && key.code == KeyCode::Char('c') {
                return Ok(());
            }
            if key.code == KeyCode::Tab {
                cycle_focus(arbiter, panes, now);
                continue;
            }
        }
        for pane in panes.iter_mut() {
            pane.view.handle_event(&mut pane.table, ev.clone(), now);
        }
    }
}

fn cycle_focus(arbiter: &KeyboardArbiter, panes: &[Pane; 2], now: Instant) {
    let ids: Vec<_> = panes
        .iter()
        .filter_map(|p| p.table.registration().map(|r| r.id()))
        .collect();
    let next = match arbiter.active() {
        Some(active) => ids
            .iter()
            .position(|id| *id == active)
            .map_or(0, |i| (i + 1) % ids.len()),
        None => 0,
    };
    if let Some(id) = ids.get(next) {
        arbiter.focus(*id, now);
    }
}

fn drain(table: &mut DataTable, orders: &[Value]) {
    for event in table.drain_events() {
        match event {
            TableEvent::FetchRequested(request) => {
                let token = request.token;
                let result = serve(orders, &request);
                log::info!("{token}: serving {} of {} rows", result.rows.len(), result.total);
                table.apply_fetch(token, result);
            }
            TableEvent::Changed(rows) => log::info!("data changed: {} rows", rows.len()),
            TableEvent::RowClicked { row, .. } => log::debug!("clicked {row}"),
            TableEvent::RowDoubleClicked { row, data } => {
                log::info!("double clicked {row}: {data}")
            }
            TableEvent::ColumnSettingsChanged(settings) => {
                log::info!("column settings changed ({} columns)", settings.len())
            }
            other => log::debug!("{other:?}"),
        }
    }
}

/// Pretends to be a backend: filters, sorts and pages the fixed order list.
fn serve(orders: &[Value], request: &FetchRequest) -> ServerFetchResult {
    let params = &request.params;
    let needle = params.global_filter.to_lowercase();
    let mut rows: Vec<Value> = orders
        .iter()
        .filter(|row| needle.is_empty() || row.to_string().to_lowercase().contains(&needle))
        .cloned()
        .collect();
    if let Some(sort) = params.sorting.first() {
        let key = sort.column.as_str();
        rows.sort_by(|a, b| {
            let ord = a[key].to_string().cmp(&b[key].to_string());
            if sort.desc { ord.reverse() } else { ord }
        });
    }
    let total = rows.len();
    let start = params.page_index * params.page_size;
    let rows = rows.into_iter().skip(start).take(params.page_size).collect();
    ServerFetchResult { rows, total }
}

fn people_pane(arbiter: &KeyboardArbiter) -> Pane {
    let text_required = EditorDescriptor::new(EditorKind::Text).with_rule(Rule::required());
    let columns = vec![
        ColumnSetting::new("Name", "name")
            .with_editor(text_required.clone().with_rule(Rule::unique()))
            .with_pin(PinSide::Left)
            .with_group("Person"),
        ColumnSetting::new("Email", "contact.email")
            .with_editor(
                EditorDescriptor::new(EditorKind::Text)
                    .with_rule(Rule::pattern(r"^[^@\s]+@[^@\s]+$").with_message("not an email")),
            )
            .with_group("Person"),
        ColumnSetting::new("Age", "age").with_editor(EditorDescriptor::new(EditorKind::Number)),
        ColumnSetting::new("Team", "team").with_editor(
            EditorDescriptor::new(EditorKind::Dropdown).with_options(vec![
                EditorOption::new("Core", "core"),
                EditorOption::new("Infra", "infra"),
                EditorOption::new("Design", "design"),
            ]),
        ),
        ColumnSetting::new("Active", "active")
            .with_editor(EditorDescriptor::new(EditorKind::Switch)),
    ];
    let data = (0..240)
        .map(|i| {
            json!({
                "name": format!("person {i:03}"),
                "contact": { "email": format!("p{i}@example.com") },
                "age": 20 + (i * 7) % 45,
                "team": ["core", "infra", "design"][i % 3],
                "active": i % 4 != 0,
            })
        })
        .collect();
    let options = DataTableOptions {
        enable_editing: true,
        enable_adding: true,
        enable_deleting: true,
        enable_selection: true,
        enable_expansion: true,
        enable_multi_sort: true,
        page_size: 50,
        row_detail: Some(RowDetail::new(|row| {
            vec![format!("raw: {}", row.data)]
        })),
        ..DataTableOptions::default()
    };
    let mut table = DataTable::new(columns, data, options);
    table.attach_arbiter(arbiter);
    Pane {
        title: "People (local, editable)",
        table,
        view: DataTableView::new(),
    }
}

fn orders_pane(arbiter: &KeyboardArbiter) -> Pane {
    let columns = vec![
        ColumnSetting::new("Order", "id").with_width(10),
        ColumnSetting::new("Customer", "customer"),
        ColumnSetting::new("Status", "status"),
        ColumnSetting::new("Total", "total").with_pin(PinSide::Right),
    ];
    let options = DataTableOptions {
        server_mode: true,
        enable_multi_sort: false,
        page_size: 20,
        ..DataTableOptions::default()
    };
    let mut table = DataTable::new(columns, Vec::new(), options);
    table.attach_arbiter(arbiter);
    Pane {
        title: "Orders (server paged)",
        table,
        view: DataTableView::new(),
    }
}

fn order_rows() -> Vec<Value> {
    (0..1_000)
        .map(|i| {
            json!({
                "id": format!("ORD-{i:04}"),
                "customer": format!("customer {}", i % 37),
                "status": ["open", "shipped", "returned"][i % 3],
                "total": format!("{:.2}", (i as f64) * 3.75),
            })
        })
        .collect()
}
