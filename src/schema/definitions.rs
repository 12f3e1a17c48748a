//! The declarative schema model: tables, columns,
//! constraints, indexes, and alterations, as plain data the
//! [`super::generator`] compiles into SQL.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::ident::Value;

/// SQLite's documented type affinities, plus `ANY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Text,
    Numeric,
    Integer,
    Real,
    Blob,
    Any,
}

impl ColumnType {
    pub fn to_sql(self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Numeric => "NUMERIC",
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Blob => "BLOB",
            ColumnType::Any => "ANY",
        }
    }
}

/// SQLite's `ON CONFLICT` policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictResolution {
    Abort,
    Rollback,
    Fail,
    Ignore,
    Replace,
}

impl ConflictResolution {
    pub fn to_sql(self) -> &'static str {
        match self {
            ConflictResolution::Abort => "ABORT",
            ConflictResolution::Rollback => "ROLLBACK",
            ConflictResolution::Fail => "FAIL",
            ConflictResolution::Ignore => "IGNORE",
            ConflictResolution::Replace => "REPLACE",
        }
    }
}

/// SQLite's foreign-key action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForeignKeyAction {
    NoAction,
    Restrict,
    SetNull,
    SetDefault,
    Cascade,
}

impl ForeignKeyAction {
    pub fn to_sql(self) -> &'static str {
        match self {
            ForeignKeyAction::NoAction => "NO ACTION",
            ForeignKeyAction::Restrict => "RESTRICT",
            ForeignKeyAction::SetNull => "SET NULL",
            ForeignKeyAction::SetDefault => "SET DEFAULT",
            ForeignKeyAction::Cascade => "CASCADE",
        }
    }
}

/// A `PRIMARY KEY [ON CONFLICT r] [AUTOINCREMENT]` clause attached
/// directly to a column.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColumnPrimaryKey {
    pub conflict: Option<ConflictResolution>,
    pub autoincrement: bool,
}

/// A `NOT NULL`/`UNIQUE` clause with an optional `ON CONFLICT` policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConflictClause {
    pub conflict: Option<ConflictResolution>,
}

/// The value on the right-hand side of `DEFAULT`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ColumnDefault {
    Value(Value),
    Expr(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeneratedStorage {
    Stored,
    Virtual,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedColumn {
    pub expr: String,
    pub storage: GeneratedStorage,
}

/// A column-level `REFERENCES` clause.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnForeignKey {
    pub table: String,
    pub column: Option<String>,
    pub on_delete: Option<ForeignKeyAction>,
    pub on_update: Option<ForeignKeyAction>,
    pub deferred: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    pub column_type: Option<ColumnType>,
    pub primary_key: Option<ColumnPrimaryKey>,
    pub not_null: Option<ConflictClause>,
    pub unique: Option<ConflictClause>,
    pub checks: Vec<String>,
    pub foreign_keys: Vec<ColumnForeignKey>,
    pub default: Option<ColumnDefault>,
    pub collation: Option<String>,
    pub generated: Option<GeneratedColumn>,
    /// `indexed()`/`indexed(unique: true)` on a single column: requests
    /// an auto-generated `CREATE INDEX` alongside the table.
    pub indexed: Option<bool>,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        ColumnDefinition {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// A table-level `PRIMARY KEY(col, ...)` constraint (used for
/// composite primary keys; a single-column PK is usually expressed
/// inline on the column instead).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrimaryKeyConstraint {
    pub columns: Vec<String>,
    pub conflict: Option<ConflictResolution>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniqueConstraint {
    pub columns: Vec<String>,
    pub conflict: Option<ConflictResolution>,
}

/// The association form of a foreign key, e.g. `belongsTo("author",
/// in: "person")`: expands to one or more columns at generation time,
/// resolved against the live schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKeyDefinition {
    /// The name used to derive synthesized column names, e.g.
    /// `"author"` -> `authorId`.
    pub name: String,
    /// Explicit destination table; defaults to `name` when absent.
    pub destination_table: Option<String>,
    /// Explicit destination columns; when absent, resolved against the
    /// destination table's primary key.
    pub destination_columns: Option<Vec<String>>,
    /// `Some(unique)` requests an auto index over the synthesized
    /// column(s), unique iff `unique`.
    pub indexed: Option<bool>,
    pub on_delete: Option<ForeignKeyAction>,
    pub on_update: Option<ForeignKeyAction>,
    pub deferred: bool,
}

impl ForeignKeyDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        ForeignKeyDefinition {
            name: name.into(),
            destination_table: None,
            destination_columns: None,
            indexed: None,
            on_delete: None,
            on_update: None,
            deferred: false,
        }
    }

    pub fn destination_table_name(&self) -> &str {
        self.destination_table.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableDefinition {
    pub name: String,
    pub temporary: bool,
    pub if_not_exists: bool,
    pub strict: bool,
    pub without_rowid: bool,
    pub columns: Vec<ColumnDefinition>,
    pub primary_key: Option<PrimaryKeyConstraint>,
    pub uniques: Vec<UniqueConstraint>,
    pub foreign_keys: Vec<ForeignKeyDefinition>,
    pub checks: Vec<String>,
    /// Opaque, verbatim table-level constraints appended after the
    /// structured ones.
    pub literals: Vec<String>,
}

impl TableDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        TableDefinition {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Serializes this definition to JSON, e.g. for storing alongside a
    /// migration or shipping it to a caller in another process.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(crate::error::Error::propagated)
    }

    /// Parses a definition previously produced by [`TableDefinition::to_json`].
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(crate::error::Error::propagated)
    }
}

/// A declarative index, independent of any table definition (used for
/// standalone `CREATE INDEX`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub table: String,
    pub name: Option<String>,
    pub columns: Vec<String>,
    pub unique: bool,
    pub if_not_exists: bool,
    pub condition: Option<String>,
}

impl IndexDefinition {
    pub fn new(table: impl Into<String>, columns: Vec<String>) -> Self {
        IndexDefinition {
            table: table.into(),
            name: None,
            columns,
            unique: false,
            if_not_exists: false,
            condition: None,
        }
    }
}

/// One incremental change to an existing table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TableAlteration {
    Add(ColumnDefinition),
    AddLiteral(String),
    Rename { from: String, to: String },
    Drop(String),
}

/// `CREATE VIEW`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewDefinition {
    pub name: String,
    pub temporary: bool,
    pub if_not_exists: bool,
    pub columns: Option<Vec<String>>,
}

/// `CREATE VIRTUAL TABLE ... USING module(args...)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualTableDefinition {
    pub name: String,
    pub if_not_exists: bool,
    pub schema_name: Option<String>,
    pub module: String,
    pub arguments: Vec<String>,
    /// An extra statement the module requires alongside its own
    /// creation (e.g. seeding a shadow/content table), run together
    /// with the `CREATE VIRTUAL TABLE` inside one savepoint.
    pub post_step: Option<String>,
}
