//! The external collaborator this crate consumes for schema lookups.
//! The concrete SQLite connection, statement cache, and
//! transaction discipline all live outside this crate; generation only
//! ever calls through this trait.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::schema::ColumnType;

/// Metadata about one column, as reported by the live schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub affinity: ColumnType,
    pub is_not_null: bool,
}

/// The primary key of a table, including SQLite's hidden-`rowid` case.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PrimaryKeyInfo {
    pub columns: Vec<String>,
    pub column_infos: Vec<ColumnInfo>,
    pub is_rowid: bool,
    pub rowid_column: Option<String>,
}

impl PrimaryKeyInfo {
    pub fn is_single_column(&self) -> bool {
        self.columns.len() == 1
    }
}

/// One declared index (including the implicit index backing a unique
/// constraint).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

/// Schema lookups the generator needs from a live (or simulated)
/// SQLite connection. Every method is synchronous; serializing calls
/// against the caller's transaction is the caller's responsibility.
pub trait Database {
    fn table_exists(&self, name: &str) -> bool;

    /// Resolves a user-supplied table name to its canonical (on-disk)
    /// spelling, e.g. to fold case for a case-insensitive match.
    fn canonical_table_name(&self, name: &str) -> Result<String>;

    fn primary_key(&self, table: &str) -> Result<PrimaryKeyInfo>;

    fn columns(&self, table: &str) -> Result<Vec<ColumnInfo>>;

    /// Whether `columns` (as a set) matches the primary key or some
    /// declared unique index of `table`.
    fn has_unique_key(&self, table: &str, columns: &[String]) -> Result<bool>;

    fn indexes(&self, table: &str) -> Result<Vec<IndexInfo>>;
}
