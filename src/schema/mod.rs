//! The declarative schema model and its SQL generator (component I).

mod definitions;
mod generator;

pub use definitions::{
    ColumnDefault, ColumnDefinition, ColumnForeignKey, ColumnPrimaryKey, ColumnType,
    ConflictClause, ConflictResolution, ForeignKeyAction, ForeignKeyDefinition, GeneratedColumn,
    GeneratedStorage, IndexDefinition, PrimaryKeyConstraint, TableAlteration, TableDefinition,
    UniqueConstraint, ViewDefinition, VirtualTableDefinition,
};
pub use generator::{
    alter_table_sql, alter_table_sql_many, create_index_sql, create_table_sql, create_view_sql,
    create_virtual_table_sql, drop_index_sql,
};
