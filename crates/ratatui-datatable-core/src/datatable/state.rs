use super::column::ColumnId;
use super::column::PinSide;
use super::column::SortDirection;
use super::filter::FilterFn;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortEntry {
    pub column: ColumnId,
    pub desc: bool,
}

impl SortEntry {
    pub fn direction(&self) -> SortDirection {
        if self.desc {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColumnFilter {
    pub column: ColumnId,
    pub value: Value,
    #[serde(default)]
    pub predicate: FilterFn,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ColumnPinning {
    pub left: Vec<ColumnId>,
    pub right: Vec<ColumnId>,
}

impl ColumnPinning {
    pub fn side(&self, id: &ColumnId) -> Option<PinSide> {
        if self.left.contains(id) {
            Some(PinSide::Left)
        } else if self.right.contains(id) {
            Some(PinSide::Right)
        } else {
            None
        }
    }

    /// Moves `id` to `side` (or unpins it). Reserved columns stay where they are.
    pub fn set(&mut self, id: &ColumnId, side: Option<PinSide>) {
        if id.is_reserved() {
            return;
        }
        self.left.retain(|c| c != id);
        self.right.retain(|c| c != id);
        match side {
            Some(PinSide::Left) => self.left.push(id.clone()),
            Some(PinSide::Right) => self.right.push(id.clone()),
            None => {}
        }
    }
}

/// Runtime column layout and query state.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ColumnState {
    /// Absent entries are visible.
    pub visibility: BTreeMap<ColumnId, bool>,
    pub sizing: BTreeMap<ColumnId, u16>,
    pub pinning: ColumnPinning,
    pub order: Vec<ColumnId>,
    pub sorting: Vec<SortEntry>,
    pub filters: Vec<ColumnFilter>,
}

impl ColumnState {
    pub fn is_visible(&self, id: &ColumnId) -> bool {
        self.visibility.get(id).copied().unwrap_or(true)
    }

    /// Rendered width; hidden columns always report zero.
    pub fn width(&self, id: &ColumnId) -> u16 {
        if !self.is_visible(id) {
            return 0;
        }
        self.sizing.get(id).copied().unwrap_or(0)
    }

    pub fn sort_of(&self, id: &ColumnId) -> Option<SortDirection> {
        self.sorting
            .iter()
            .find(|s| &s.column == id)
            .map(SortEntry::direction)
    }

    pub fn filter_of(&self, id: &ColumnId) -> Option<&ColumnFilter> {
        self.filters.iter().find(|f| &f.column == id)
    }

    /// Visible columns in display order: left pinned, center, right pinned.
    pub fn display_order(&self) -> Vec<ColumnId> {
        let pinned_left = self
            .pinning
            .left
            .iter()
            .filter(|id| self.order.contains(id));
        let center = self
            .order
            .iter()
            .filter(|id| self.pinning.side(id).is_none());
        let pinned_right = self
            .pinning
            .right
            .iter()
            .filter(|id| self.order.contains(id));
        pinned_left
            .chain(center)
            .chain(pinned_right)
            .filter(|id| self.is_visible(id))
            .cloned()
            .collect()
    }

    /// Applies a sort toggle to `column`.
    ///
    /// Without `multi` the column replaces any other sort. Each toggle cycles
    /// asc → desc → (removed, when `removal` is set, otherwise asc again).
    pub fn toggle_sort(&mut self, column: &ColumnId, multi: bool, removal: bool) {
        let current = self.sort_of(column);
        let next = match current {
            None => Some(false),
            Some(SortDirection::Asc) => Some(true),
            Some(SortDirection::Desc) if removal => None,
            Some(SortDirection::Desc) => Some(false),
        };

        if !multi {
            self.sorting.clear();
        }
        // in multi mode a direction change keeps the column's priority slot
        let slot = self.sorting.iter().position(|s| &s.column == column);
        match (slot, next) {
            (Some(idx), Some(desc)) => self.sorting[idx].desc = desc,
            (Some(idx), None) => {
                self.sorting.remove(idx);
            }
            (None, Some(desc)) => self.sorting.push(SortEntry {
                column: column.clone(),
                desc,
            }),
            (None, None) => {}
        }
    }

    /// Sets (or clears, for empty values) the filter on `column`.
    pub fn set_filter(&mut self, column: &ColumnId, value: Value, predicate: FilterFn) {
        self.filters.retain(|f| &f.column != column);
        if !super::filter::is_empty_filter(&value) {
            self.filters.push(ColumnFilter {
                column: column.clone(),
                value,
                predicate,
            });
        }
    }

    /// Moves `from` to the position of `to`. Reserved columns never move.
    pub fn move_column(&mut self, from: &ColumnId, to: &ColumnId) -> bool {
        if from == to || from.is_reserved() || to.is_reserved() {
            return false;
        }
        let (Some(src), Some(dst)) = (
            self.order.iter().position(|c| c == from),
            self.order.iter().position(|c| c == to),
        ) else {
            return false;
        };
        let id = self.order.remove(src);
        self.order.insert(dst, id);
        true
    }
}

/// Paging state plus derived affordances.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pagination {
    pub page_index: usize,
    pub page_size: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page_index: 0,
            page_size: 10,
        }
    }
}

impl Pagination {
    /// Number of pages for `total` rows; never less than one.
    pub fn page_count(&self, total: usize) -> usize {
        let size = self.page_size.max(1);
        total.div_ceil(size).max(1)
    }

    pub fn last_index(&self, total: usize) -> usize {
        self.page_count(total) - 1
    }

    pub fn can_previous(&self) -> bool {
        self.page_index > 0
    }

    pub fn can_next(&self, total: usize) -> bool {
        self.page_index < self.last_index(total)
    }

    /// Row range of the current page within `total` rows.
    pub fn range(&self, total: usize) -> std::ops::Range<usize> {
        let size = self.page_size.max(1);
        let start = self.page_index.saturating_mul(size).min(total);
        let end = start.saturating_add(size).min(total);
        start..end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ColumnId {
        ColumnId::new(s)
    }

    #[test]
    fn sort_cycles_on_a_single_column() {
        let mut state = ColumnState::default();
        state.toggle_sort(&id("a"), false, true);
        assert_eq!(state.sort_of(&id("a")), Some(SortDirection::Asc));
        state.toggle_sort(&id("a"), false, true);
        assert_eq!(state.sort_of(&id("a")), Some(SortDirection::Desc));
        state.toggle_sort(&id("a"), false, true);
        assert!(state.sorting.is_empty());

        state.toggle_sort(&id("a"), false, false);
        state.toggle_sort(&id("a"), false, false);
        state.toggle_sort(&id("a"), false, false);
        assert_eq!(state.sort_of(&id("a")), Some(SortDirection::Asc));
    }

    #[test]
    fn sorting_another_column_replaces_the_first() {
        let mut state = ColumnState::default();
        state.toggle_sort(&id("a"), false, true);
        state.toggle_sort(&id("b"), false, true);
        assert_eq!(state.sorting.len(), 1);
        assert_eq!(state.sorting[0].column, id("b"));

        state.toggle_sort(&id("a"), true, true);
        assert_eq!(state.sorting.len(), 2);
    }

    #[test]
    fn pagination_affordances() {
        let mut p = Pagination {
            page_index: 0,
            page_size: 2,
        };
        assert_eq!(p.page_count(10), 5);
        assert_eq!(p.range(10), 0..2);
        assert!(!p.can_previous());
        assert!(p.can_next(10));

        p.page_index = 4;
        assert!(p.can_previous());
        assert!(!p.can_next(10));
        assert_eq!(p.range(10), 8..10);
    }

    #[test]
    fn reserved_columns_do_not_move() {
        let mut state = ColumnState {
            order: vec![id("__select"), id("a"), id("b")],
            ..Default::default()
        };
        assert!(!state.move_column(&id("a"), &id("__select")));
        assert!(state.move_column(&id("b"), &id("a")));
        assert_eq!(state.order, vec![id("__select"), id("b"), id("a")]);
    }
}
