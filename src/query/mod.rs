//! Query Builder Engine.
//!
//! ```text
//! QuerySpec mutations ─► render ─► RenderedQuery ─► SqlEditor (derived | overridden) ─► execute
//! ```
//!
//! A [`QuerySpec`] is validated against a table schema snapshot as it is
//! edited, rendered deterministically, and executed through a
//! [`SqlEditor`] that also accepts hand-written SQL.

pub mod editor;
pub mod inspect;
pub mod render;
pub mod spec;
pub mod value;

pub use editor::{SqlEditor, SqlText};
pub use inspect::{
    count_rows_sql, describe_columns, distinct_sample_sql, distinct_values, row_count,
    table_description, ColumnOverview, TableDescription, TableOverview,
};
pub use render::{render, render_checked, RenderedQuery};
pub use spec::{Combine, Operator, OrderBy, Predicate, QuerySpec};
pub use value::PredicateValue;
