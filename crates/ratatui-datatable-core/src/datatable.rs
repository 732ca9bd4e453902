//! Editable data table: column compilation, row model, editing, selection, server paging and a
//! ratatui renderer.
//!
//! The pieces compose bottom-up:
//! - [`compile`] turns host [`ColumnSetting`]s into [`ColumnDef`]s and the initial
//!   [`ColumnState`].
//! - [`model`] runs filter → sort → paginate over the [`RowStore`].
//! - [`table::DataTable`] owns all of it and exposes the operations hosts and the view call.
//! - [`view::DataTableView`] draws a table and maps mouse input back onto it.
//!
//! Cross-instance keyboard ownership is handled by [`KeyboardArbiter`]; edits are persisted
//! through a [`CommitActor`].

pub mod arbiter;
pub mod column;
pub mod commit;
pub mod compile;
pub mod debounce;
pub mod editor;
pub mod error;
pub mod feedback;
pub mod filter;
pub mod model;
pub mod nav;
pub mod path;
pub mod row;
pub mod rules;
pub mod server;
pub mod state;
pub mod table;
pub mod view;

pub use arbiter::ArbiterOptions;
pub use arbiter::KeyboardArbiter;
pub use arbiter::Registration;
pub use column::CellAccessor;
pub use column::CellAlign;
pub use column::CellPredicate;
pub use column::CellRenderer;
pub use column::ColumnId;
pub use column::ColumnSetting;
pub use column::EditorDescriptor;
pub use column::EditorKind;
pub use column::EditorOption;
pub use column::FilterDescriptor;
pub use column::FilterKind;
pub use column::PinSide;
pub use column::Rule;
pub use column::RuleKind;
pub use column::SortDirection;
pub use commit::CommitActor;
pub use commit::CommitReply;
pub use commit::CommitRequest;
pub use commit::InlineCommitActor;
pub use commit::ThreadCommitActor;
pub use compile::ColumnDef;
pub use compile::SizingOptions;
pub use error::CommitError;
pub use error::ConfigError;
pub use error::PathError;
pub use filter::FilterFn;
pub use path::FieldPath;
pub use row::Row;
pub use row::RowId;
pub use row::RowStore;
pub use server::FetchRequest;
pub use server::FetchToken;
pub use server::ServerFetchParams;
pub use server::ServerFetchResult;
pub use server::ServerOptions;
pub use state::ColumnState;
pub use state::Pagination;
pub use table::CellRef;
pub use table::DataTable;
pub use table::DataTableAction;
pub use table::DataTableOptions;
pub use table::RowAction;
pub use table::RowDetail;
pub use table::TableEvent;
pub use view::DataTableView;
pub use view::DataTableViewOptions;
pub use view::VirtualizePolicy;
