//! Reports the effective column layout back to the host as updated [`ColumnSetting`]s.

use super::column::ColumnId;
use super::column::ColumnSetting;
use super::column::PinSide;
use super::column::SortDirection;
use super::debounce::Debouncer;
use super::state::ColumnState;
use std::time::Duration;
use std::time::Instant;

/// The derived part of one setting; what the dedupe compares.
#[derive(Clone, Debug, PartialEq, Eq)]
struct LayoutEntry {
    field: String,
    width: Option<u16>,
    pin: Option<PinSide>,
    sort: Option<SortDirection>,
    order: Option<u32>,
    hidden: bool,
}

/// Overwrites the derived fields of `baseline` from `state`; everything else is kept.
pub fn fold_settings(baseline: &[ColumnSetting], state: &ColumnState) -> Vec<ColumnSetting> {
    let user_order: Vec<&ColumnId> = state.order.iter().filter(|id| !id.is_reserved()).collect();
    baseline
        .iter()
        .map(|setting| {
            let id = ColumnId::new(setting.field.clone());
            let mut out = setting.clone();
            out.hidden = !state.is_visible(&id);
            if !out.hidden {
                if let Some(width) = state.sizing.get(&id) {
                    out.width = Some(*width);
                }
            }
            out.pin = state.pinning.side(&id);
            out.sort = state.sort_of(&id);
            if let Some(pos) = user_order.iter().position(|c| **c == id) {
                out.order = Some(pos as u32);
            }
            out
        })
        .collect()
}

fn layout(settings: &[ColumnSetting]) -> Vec<LayoutEntry> {
    settings
        .iter()
        .map(|s| LayoutEntry {
            field: s.field.clone(),
            width: s.width,
            pin: s.pin,
            sort: s.sort,
            order: s.order,
            hidden: s.hidden,
        })
        .collect()
}

/// Debounced, deduplicated column-settings feedback.
#[derive(Debug)]
pub struct SettingsFeedback {
    baseline: Vec<ColumnSetting>,
    last: Vec<LayoutEntry>,
    debouncer: Debouncer<()>,
}

impl SettingsFeedback {
    /// Starts from the layout at mount, which is never reported.
    pub fn new(baseline: Vec<ColumnSetting>, state: &ColumnState, delay: Duration) -> Self {
        let last = layout(&fold_settings(&baseline, state));
        Self {
            baseline,
            last,
            debouncer: Debouncer::new(delay),
        }
    }

    pub fn baseline(&self) -> &[ColumnSetting] {
        &self.baseline
    }

    /// Host-supplied settings become the new baseline, not a delta.
    pub fn rebaseline(&mut self, baseline: Vec<ColumnSetting>, state: &ColumnState) {
        self.last = layout(&fold_settings(&baseline, state));
        self.baseline = baseline;
        self.debouncer.cancel();
    }

    pub fn note_change(&mut self, now: Instant) {
        self.debouncer.schedule((), now);
    }

    pub fn is_pending(&self) -> bool {
        self.debouncer.is_pending()
    }

    /// Returns the folded settings when the window has elapsed and the layout differs.
    pub fn poll(&mut self, state: &ColumnState, now: Instant) -> Option<Vec<ColumnSetting>> {
        self.debouncer.poll(now)?;
        let folded = fold_settings(&self.baseline, state);
        let next = layout(&folded);
        if next == self.last {
            return None;
        }
        self.last = next;
        Some(folded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_for(fields: &[&str]) -> ColumnState {
        ColumnState {
            order: fields.iter().map(|f| ColumnId::new(*f)).collect(),
            sizing: fields.iter().map(|f| (ColumnId::new(*f), 20)).collect(),
            ..Default::default()
        }
    }

    fn baseline() -> Vec<ColumnSetting> {
        vec![
            ColumnSetting::new("A", "a").with_width(20).with_order(0),
            ColumnSetting::new("B", "b").with_width(20).with_order(1),
        ]
    }

    #[test]
    fn mount_reports_nothing_and_unchanged_layout_is_deduped() {
        let t0 = Instant::now();
        let mut state = state_for(&["a", "b"]);
        let mut fb = SettingsFeedback::new(baseline(), &state, Duration::from_millis(500));

        fb.note_change(t0);
        assert!(fb.poll(&state, t0 + Duration::from_secs(1)).is_none());

        state.toggle_sort(&ColumnId::new("b"), false, true);
        fb.note_change(t0);
        assert!(fb.poll(&state, t0 + Duration::from_millis(100)).is_none());
        let out = fb.poll(&state, t0 + Duration::from_secs(1)).unwrap();
        assert_eq!(out[1].sort, Some(SortDirection::Asc));
        assert_eq!(out[0].title, "A");

        fb.note_change(t0 + Duration::from_secs(2));
        assert!(fb.poll(&state, t0 + Duration::from_secs(3)).is_none());
    }

    #[test]
    fn hidden_columns_keep_their_width() {
        let mut state = state_for(&["a", "b"]);
        state.visibility.insert(ColumnId::new("a"), false);
        state.sizing.insert(ColumnId::new("a"), 99);
        state.move_column(&ColumnId::new("b"), &ColumnId::new("a"));
        let folded = fold_settings(&baseline(), &state);
        assert!(folded[0].hidden);
        assert_eq!(folded[0].width, Some(20));
        assert_eq!(folded[0].order, Some(1));
        assert_eq!(folded[1].order, Some(0));
    }
}
