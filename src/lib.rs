//! A SQL generation engine for SQLite.
//!
//! This crate compiles two kinds of language-agnostic trees into SQL
//! text plus bound arguments: a [`relation::Relation`] (sources,
//! joins, filters, groupings, orderings, limits, CTEs, and
//! selections) into `SELECT`/`DELETE`/`UPDATE` statements, and a
//! [`schema`] definition into `CREATE`/`ALTER` statements. It never
//! opens a connection or executes anything itself — callers supply
//! schema lookups through the [`Database`] trait and run the rendered
//! SQL with whatever driver they already use.

pub mod alias;
pub mod arguments;
pub mod context;
pub mod database;
pub mod error;
pub mod expr;
pub mod ident;
pub mod prefetch;
pub mod qualified;
pub mod query;
pub mod region;
pub mod relation;
pub mod schema;

pub use database::Database;
pub use error::{Error, Reason, Result, WithErrorInfo};
pub use ident::Value;
pub use prefetch::{render_prefetch, PrefetchPlan, PrefetchStrategy};
pub use query::{
    render_delete, render_select, render_select_single, render_update, single_result_provable,
    Assignment, RowAdapter, SelectPlan,
};
pub use region::{regions_for, DatabaseRegion};
pub use relation::{AssociationKind, ChildRelation, Cte, PivotKey, Relation, Source};
