//! Client-side row model: filter, sort, paginate.

use super::compile::CompiledColumns;
use super::filter::compare_values;
use super::filter::global_matches;
use super::row::Row;
use super::row::RowId;
use super::row::RowStore;
use super::state::ColumnState;
use super::state::Pagination;
use std::cmp::Ordering;

/// Row ids after the pipeline ran.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RowModel {
    /// Rows passing every filter, sorted. New rows come first and skip filtering.
    pub filtered: Vec<RowId>,
    /// The current page of `filtered`.
    pub page: Vec<RowId>,
    /// Row count used for page math.
    pub total: usize,
}

/// Runs filter → sort → paginate over `rows`.
pub fn client_model(
    rows: &RowStore,
    columns: &CompiledColumns,
    state: &ColumnState,
    global_filter: &str,
    pagination: Pagination,
) -> RowModel {
    let (mut fresh, mut saved): (Vec<&Row>, Vec<&Row>) = rows.iter().partition(|r| r.is_new);
    saved.retain(|row| {
        passes_filters(row, columns, state) && passes_global(row, columns, state, global_filter)
    });
    if !state.sorting.is_empty() {
        saved.sort_by(|a, b| compare_rows(a, b, columns, state));
    }
    fresh.append(&mut saved);

    let filtered: Vec<RowId> = fresh.into_iter().map(|r| r.id).collect();
    let total = filtered.len();
    let page = filtered[pagination.range(total)].to_vec();
    RowModel {
        filtered,
        page,
        total,
    }
}

/// Server mode: the store already holds exactly one page.
pub fn server_model(rows: &RowStore, total: usize) -> RowModel {
    let ids: Vec<RowId> = rows.iter().map(|r| r.id).collect();
    RowModel {
        filtered: ids.clone(),
        page: ids,
        total,
    }
}

fn passes_filters(row: &Row, columns: &CompiledColumns, state: &ColumnState) -> bool {
    state.filters.iter().all(|f| {
        let Some(def) = columns.def(&f.column) else {
            return true;
        };
        let cell = def.value(row);
        f.predicate.matches(cell.as_deref(), &f.value)
    })
}

fn passes_global(row: &Row, columns: &CompiledColumns, state: &ColumnState, query: &str) -> bool {
    if query.is_empty() {
        return true;
    }
    let cells: Vec<_> = columns
        .data_defs()
        .filter(|d| state.is_visible(&d.id))
        .map(|d| d.value(row))
        .collect();
    global_matches(cells.iter().map(|c| c.as_deref()), query)
}

fn compare_rows(a: &Row, b: &Row, columns: &CompiledColumns, state: &ColumnState) -> Ordering {
    for entry in &state.sorting {
        let Some(def) = columns.def(&entry.column) else {
            continue;
        };
        let va = def.value(a);
        let vb = def.value(b);
        let (va, vb) = (va.as_deref(), vb.as_deref());
        let absent = |v: Option<&serde_json::Value>| v.is_none_or(serde_json::Value::is_null);
        let ord = match (absent(va), absent(vb)) {
            (false, false) if entry.desc => compare_values(vb, va),
            _ => compare_values(va, vb),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatable::column::ColumnId;
    use crate::datatable::column::ColumnSetting;
    use crate::datatable::compile::compile;
    use crate::datatable::compile::SizingOptions;
    use crate::datatable::compile::StructuralColumns;
    use crate::datatable::filter::FilterFn;
    use serde_json::json;
    use serde_json::Value;

    fn fixture() -> (RowStore, CompiledColumns) {
        let mut store = RowStore::new();
        store.replace_all(vec![
            json!({"name": "b", "age": 3}),
            json!({"name": "A", "age": null}),
            json!({"name": "c", "age": 1}),
        ]);
        let settings = vec![
            ColumnSetting::new("Name", "name"),
            ColumnSetting::new("Age", "age"),
        ];
        let compiled = compile(
            &settings,
            StructuralColumns::default(),
            &SizingOptions::default(),
            80,
        )
        .unwrap();
        (store, compiled)
    }

    fn names(store: &RowStore, ids: &[RowId]) -> Vec<Value> {
        ids.iter()
            .filter_map(|id| store.get(*id))
            .map(|r| r.data["name"].clone())
            .collect()
    }

    #[test]
    fn sorts_with_nulls_last_in_both_directions() {
        let (store, compiled) = fixture();
        let mut state = compiled.initial.clone();
        let age = ColumnId::new("age");
        state.toggle_sort(&age, false, true);
        let m = client_model(&store, &compiled, &state, "", Pagination::default());
        assert_eq!(names(&store, &m.page), vec![json!("c"), json!("b"), json!("A")]);

        state.toggle_sort(&age, false, true);
        let m = client_model(&store, &compiled, &state, "", Pagination::default());
        assert_eq!(names(&store, &m.page), vec![json!("b"), json!("c"), json!("A")]);
    }

    #[test]
    fn new_rows_skip_filters_and_lead() {
        let (mut store, compiled) = fixture();
        let fresh = store.add();
        let mut state = compiled.initial.clone();
        state.set_filter(&ColumnId::new("name"), json!("a"), FilterFn::IncludesString);
        let m = client_model(&store, &compiled, &state, "", Pagination::default());
        assert_eq!(m.filtered.len(), 2);
        assert_eq!(m.filtered[0], fresh);
    }

    #[test]
    fn global_filter_searches_visible_columns() {
        let (store, compiled) = fixture();
        let m = client_model(&store, &compiled, &compiled.initial, "C", Pagination::default());
        assert_eq!(names(&store, &m.filtered), vec![json!("c")]);
    }

    #[test]
    fn pages_slice_the_filtered_rows() {
        let (store, compiled) = fixture();
        let p = Pagination {
            page_index: 1,
            page_size: 2,
        };
        let m = client_model(&store, &compiled, &compiled.initial, "", p);
        assert_eq!(m.total, 3);
        assert_eq!(m.page.len(), 1);
    }
}
