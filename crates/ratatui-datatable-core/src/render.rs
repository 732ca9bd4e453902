use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Style;
use unicode_width::UnicodeWidthChar;

use crate::viewport::ViewportState;

const TAB_WIDTH: usize = 4;

/// Draws a vertical scrollbar for `state` into a one column wide `area`.
pub fn render_scrollbar(area: Rect, buf: &mut Buffer, state: &ViewportState, style: Style) {
    buf.set_style(area, style);
    if area.height == 0 {
        return;
    }
    if state.content_h <= state.viewport_h as u32 || state.content_h == 0 {
        for dy in 0..area.height {
            buf.set_stringn(area.x, area.y + dy, " ", 1, style);
        }
        return;
    }

    let track_h = area.height as f64;
    let thumb_h = ((state.viewport_h as f64 / state.content_h as f64) * track_h)
        .round()
        .clamp(1.0, track_h) as u16;

    let max_y = state
        .content_h
        .saturating_sub(state.viewport_h as u32)
        .max(1) as f64;
    let thumb_top = ((state.y as f64 / max_y) * (track_h - thumb_h as f64))
        .round()
        .clamp(0.0, (track_h - thumb_h as f64).max(0.0)) as u16;

    for dy in 0..area.height {
        let ch = if dy >= thumb_top && dy < thumb_top + thumb_h {
            "█"
        } else {
            " "
        };
        buf.set_stringn(area.x, area.y + dy, ch, 1, style);
    }
}

/// Writes `input` at `(x, y)`, skipping its first `start_col` display columns and stopping after
/// `max_cols`. Wide characters cut by either edge are dropped; tabs expand to spaces.
pub fn render_str_clipped(
    x: u16,
    y: u16,
    start_col: u32,
    max_cols: u16,
    buf: &mut Buffer,
    input: &str,
    style: Style,
) {
    if max_cols == 0 {
        return;
    }

    let start_col = start_col as usize;
    let max_cols = max_cols as usize;
    let mut col = 0usize;
    let mut out_cols = 0usize;
    let mut tmp = [0u8; 4];

    let mut put = |symbol: &str, out_cols: usize| {
        if let Some(cell) = buf.cell_mut((x + out_cols as u16, y)) {
            cell.set_style(style);
            cell.set_symbol(symbol);
        }
    };

    for ch in input.chars() {
        if ch == '\t' {
            for _ in 0..TAB_WIDTH {
                col += 1;
                if col <= start_col {
                    continue;
                }
                if out_cols >= max_cols {
                    return;
                }
                put(" ", out_cols);
                out_cols += 1;
            }
            continue;
        }

        let w = UnicodeWidthChar::width(ch).unwrap_or(0);
        if w == 0 {
            continue;
        }
        let starts_at = col;
        col += w;
        if starts_at < start_col {
            continue;
        }
        if out_cols + w > max_cols {
            return;
        }
        put(ch.encode_utf8(&mut tmp), out_cols);
        out_cols += 1;
        if w == 2 {
            put("", out_cols);
            out_cols += 1;
        }
    }
}
