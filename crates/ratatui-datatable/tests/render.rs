use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui_datatable::DataTable;
use ratatui_datatable::DataTableOptions;
use ratatui_datatable::DataTableView;
use ratatui_datatable::Theme;
use ratatui_datatable::datatable::ColumnSetting;
use ratatui_datatable::datatable::PinSide;
use serde_json::json;

fn line(buf: &Buffer, y: u16) -> String {
    (0..buf.area.width)
        .map(|x| buf.cell((x, y)).map_or(" ", |c| c.symbol()).to_string())
        .collect()
}

#[test]
fn grouped_header_and_pinned_columns() {
    let columns = vec![
        ColumnSetting::new("First", "name.first").with_group("Name"),
        ColumnSetting::new("Last", "name.last").with_group("Name"),
        ColumnSetting::new("Id", "id").with_width(4).with_pin(PinSide::Left),
    ];
    let data = vec![
        json!({"id": 1, "name": {"first": "Ada", "last": "Lovelace"}}),
        json!({"id": 2, "name": {"first": "Alan", "last": "Turing"}}),
    ];
    let mut table = DataTable::new(columns, data, DataTableOptions::default());
    let mut view = DataTableView::new();
    let area = Rect::new(0, 0, 40, 6);
    let mut buf = Buffer::empty(area);
    view.render(&mut table, area, &mut buf, &Theme::default());

    assert!(line(&buf, 0).contains("Name"));
    assert!(line(&buf, 1).starts_with("Id"));
    assert!(line(&buf, 1).contains("First"));
    assert!(line(&buf, 2).starts_with("1"));
    assert!(line(&buf, 2).contains("Ada"));
    assert!(line(&buf, 3).contains("Turing"));
    assert!(line(&buf, 5).contains("2 rows"));
}
