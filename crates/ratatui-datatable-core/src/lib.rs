//! `ratatui-datatable-core` is the headless engine behind an editable, virtualized data table for
//! ratatui.
//!
//! Most users should depend on the facade crate `ratatui-datatable`. Use this crate directly if
//! you want the table together with the small input/render primitives it is built on.
//!
//! ## Design goals
//!
//! - Event-loop agnostic: you feed input and a clock (`Instant`) and render when asked.
//! - No async runtime: timers are polled from [`datatable::DataTable::tick`], server fetches are
//!   emitted as events and answered by the host.
//! - Host state is reported through [`datatable::TableEvent`]s drained after each update.
//!
//! ## Getting started
//!
//! ```no_run
//! use ratatui_datatable_core::datatable::{ColumnSetting, DataTable, DataTableOptions};
//! use serde_json::json;
//!
//! let table = DataTable::new(
//!     vec![ColumnSetting::new("Name", "name"), ColumnSetting::new("Age", "age")],
//!     vec![json!({"name": "Ada", "age": 36})],
//!     DataTableOptions::default(),
//! );
//! assert_eq!(table.total_rows(), 1);
//! ```
//!
//! Useful entry points:
//! - [`datatable::DataTable`]: columns, rows, editing, selection, paging.
//! - [`datatable::DataTableView`]: renders a table and hit-tests mouse input.
//! - [`datatable::KeyboardArbiter`]: decides which of several tables receives keys.
pub mod theme;

#[cfg(feature = "crossterm")]
pub mod crossterm_input;

pub mod datatable;
pub mod input;
pub mod keymap;
pub mod render;
pub mod viewport;
