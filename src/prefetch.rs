//! Prefetch planning for to-many associations (component H): renders
//! the follow-up `SELECT` used to fetch a to-many/bridge association
//! for a batch of already-fetched parent rows, grouped in memory by
//! pivot key rather than joined.

use std::rc::Rc;

use itertools::Itertools;

use crate::database::Database;
use crate::error::{Error, Result};
use crate::expr::{Expr, Selection};
use crate::ident::{quote_ident, Value};
use crate::qualified::PrefetchDescriptor;
use crate::query::{self, RowAdapter};
use crate::relation::Relation;

/// Which shape the membership filter took. A single pivot column
/// renders as an ordinary `IN (?, ?, ...)` list; a composite key needs
/// a row-value comparison against a `VALUES` table instead, since
/// SQLite has no row-value literal list syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefetchStrategy {
    LiteralList,
    RowValues,
}

/// A rendered prefetch query plus the bookkeeping a caller needs to
/// regroup its rows by parent.
#[derive(Debug, Clone)]
pub struct PrefetchPlan {
    pub sql: String,
    pub arguments: Vec<Value>,
    pub strategy: PrefetchStrategy,
    /// The `grdb_<col>`-prefixed pivot columns appended to the
    /// selection, in the same order as the descriptor's
    /// `pivot.child_columns`; group rows by reading these back.
    pub pivot_aliases: Vec<String>,
    pub row_adapter: Option<RowAdapter>,
}

fn pivot_alias(column: &str) -> String {
    format!("grdb_{column}")
}

fn literal_list_filter(column: &str, keys: &[Vec<Value>]) -> Result<Expr> {
    let collection = keys
        .iter()
        .map(|row| {
            row.first()
                .cloned()
                .map(Expr::Literal)
                .ok_or_else(|| Error::invalid_input("prefetch key row is empty"))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Expr::In {
        expr: Box::new(Expr::BareColumn(column.to_string())),
        collection,
        negated: false,
    })
}

fn row_values_filter(columns: &[String], keys: &[Vec<Value>]) -> Result<Expr> {
    for row in keys {
        if row.len() != columns.len() {
            return Err(Error::invalid_input(
                "prefetch key row width does not match the pivot's child columns",
            ));
        }
    }
    let lhs = format!("({})", columns.iter().map(|c| quote_ident(c)).join(", "));
    let rows_sql = keys
        .iter()
        .map(|row| format!("({})", row.iter().map(|_| "?").join(", ")))
        .join(", ");
    let args = keys.iter().flatten().cloned().collect();
    Ok(Expr::SqlLiteral {
        sql: format!("{lhs} IN (VALUES {rows_sql})"),
        args,
    })
}

/// Renders the `SELECT` that fetches a to-many association for the
/// batch of parent pivot-key values in `keys`. `keys` must already be
/// deduplicated by the caller; an empty `keys` folds to the `0 = 1`
/// no-op filter rather than issuing a query with no parents.
pub fn render_prefetch(
    descriptor: &PrefetchDescriptor,
    keys: &[Vec<Value>],
    db: Rc<dyn Database>,
) -> Result<PrefetchPlan> {
    let columns = &descriptor.pivot.child_columns;
    let (filter, strategy) = if keys.is_empty() {
        (
            Expr::SqlLiteral {
                sql: "0 = 1".to_string(),
                args: Vec::new(),
            },
            PrefetchStrategy::LiteralList,
        )
    } else if columns.len() == 1 {
        (literal_list_filter(&columns[0], keys)?, PrefetchStrategy::LiteralList)
    } else {
        (row_values_filter(columns, keys)?, PrefetchStrategy::RowValues)
    };

    let pivot_aliases: Vec<String> = columns.iter().map(|c| pivot_alias(c)).collect();
    let mut relation = descriptor.relation.clone().filtered(filter);
    for (column, alias) in columns.iter().zip(pivot_aliases.iter()) {
        relation
            .selection
            .push(Selection::Aliased(Box::new(Expr::BareColumn(column.clone())), alias.clone()));
    }

    let plan = query::render_select(&relation, db)?;
    Ok(PrefetchPlan {
        sql: plan.sql,
        arguments: plan.arguments,
        strategy,
        pivot_aliases,
        row_adapter: plan.row_adapter,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::database::{ColumnInfo, IndexInfo, PrimaryKeyInfo};
    use crate::qualified::PrefetchDescriptor;
    use crate::relation::{AssociationKind, PivotKey};
    use crate::schema::ColumnType;

    struct FakeDb;
    impl Database for FakeDb {
        fn table_exists(&self, _name: &str) -> bool {
            true
        }
        fn canonical_table_name(&self, name: &str) -> Result<String> {
            Ok(name.to_string())
        }
        fn primary_key(&self, _table: &str) -> Result<PrimaryKeyInfo> {
            Ok(PrimaryKeyInfo {
                columns: vec!["id".to_string()],
                column_infos: vec![],
                is_rowid: true,
                rowid_column: Some("id".to_string()),
            })
        }
        fn columns(&self, _table: &str) -> Result<Vec<ColumnInfo>> {
            Ok(vec![ColumnInfo {
                name: "id".to_string(),
                affinity: ColumnType::Integer,
                is_not_null: true,
            }])
        }
        fn has_unique_key(&self, _table: &str, _columns: &[String]) -> Result<bool> {
            Ok(false)
        }
        fn indexes(&self, _table: &str) -> Result<Vec<IndexInfo>> {
            Ok(Vec::new())
        }
    }

    fn descriptor() -> PrefetchDescriptor {
        PrefetchDescriptor {
            association: "reviews".to_string(),
            kind: AssociationKind::All,
            pivot: PivotKey {
                parent_columns: vec!["id".to_string()],
                child_columns: vec!["bookId".to_string()],
            },
            parent_alias: crate::alias::TableAlias::from_table("book", None),
            relation: Relation::from_table("review"),
        }
    }

    #[test]
    fn single_column_pivot_uses_a_literal_list() {
        let descriptor = descriptor();
        let keys = vec![vec![Value::Integer(1)], vec![Value::Integer(2)]];
        let plan = render_prefetch(&descriptor, &keys, Rc::new(FakeDb)).unwrap();
        assert_eq!(plan.strategy, PrefetchStrategy::LiteralList);
        assert!(plan.sql.contains(r#""bookId" IN (?, ?)"#));
        assert!(plan.sql.contains(r#""bookId" AS "grdb_bookId""#));
        assert_eq!(plan.arguments, vec![Value::Integer(1), Value::Integer(2)]);
    }

    #[test]
    fn empty_keys_fold_to_a_no_op_filter() {
        let descriptor = descriptor();
        let plan = render_prefetch(&descriptor, &[], Rc::new(FakeDb)).unwrap();
        assert!(plan.sql.contains("0 = 1"));
        assert!(plan.arguments.is_empty());
    }
}
