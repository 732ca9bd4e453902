//! Editable, virtualized data table for ratatui.
//!
//! This crate re-exports [`ratatui_datatable_core`]; see [`datatable::DataTable`] for the table
//! model and [`datatable::DataTableView`] for rendering. Enable the `crossterm` feature to get
//! `crossterm_input` for converting terminal events.
//!
//! Run the demo with `cargo run -p ratatui-datatable --example datatable --features crossterm`.

#[cfg(feature = "crossterm")]
pub use ratatui_datatable_core::crossterm_input;
pub use ratatui_datatable_core::datatable;
pub use ratatui_datatable_core::input;
pub use ratatui_datatable_core::keymap;
pub use ratatui_datatable_core::render;
pub use ratatui_datatable_core::theme;
pub use ratatui_datatable_core::viewport;

pub use ratatui_datatable_core::datatable::DataTable;
pub use ratatui_datatable_core::datatable::DataTableOptions;
pub use ratatui_datatable_core::datatable::DataTableView;
pub use ratatui_datatable_core::theme::Theme;
