//! Coarse read-set descriptions for a rendered query (used by a
//! change-observer layer outside this crate to decide whether a write
//! could affect a previously-run `SELECT`). This crate only computes
//! the region; watching for writes and invalidating caches is the
//! caller's job.

use std::rc::Rc;

use crate::alias::TableAlias;
use crate::database::Database;
use crate::error::Result;
use crate::expr::{Expr, Selection};
use crate::ident::Value;
use crate::qualified::{self, QualifiedRelation, QualifiedSource};
use crate::relation::{AssociationKind, Relation};

/// One table's contribution to a query's read-set. `rowids`, when
/// present, further restricts the region to a finite set of row-ids
/// the `WHERE` clause provably limits the scan to.
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseRegion {
    /// The query reads every column of `table` (a `SELECT *` or
    /// similar wildcard selection touched it).
    FullTable {
        table: String,
        rowids: Option<Vec<Value>>,
    },
    /// The query reads only `columns` of `table`.
    Columns {
        table: String,
        columns: Vec<String>,
        rowids: Option<Vec<Value>>,
    },
}

impl DatabaseRegion {
    pub fn table(&self) -> &str {
        match self {
            DatabaseRegion::FullTable { table, .. } => table,
            DatabaseRegion::Columns { table, .. } => table,
        }
    }

    pub fn rowids(&self) -> Option<&[Value]> {
        match self {
            DatabaseRegion::FullTable { rowids, .. } => rowids.as_deref(),
            DatabaseRegion::Columns { rowids, .. } => rowids.as_deref(),
        }
    }
}

fn columns_touched_in(expr: &crate::expr::Expr, alias: &crate::alias::TableAlias, out: &mut Vec<String>) {
    use crate::expr::Expr;
    match expr {
        Expr::Column(a, name) => {
            if a == alias {
                out.push(name.clone());
            }
        }
        Expr::Binary(_, l, r) => {
            columns_touched_in(l, alias, out);
            columns_touched_in(r, alias, out);
        }
        Expr::And(xs) | Expr::Or(xs) => {
            for x in xs {
                columns_touched_in(x, alias, out);
            }
        }
        Expr::Not(x) | Expr::Unary(_, x) | Expr::CountDistinct(x) | Expr::Collate(x, _) => {
            columns_touched_in(x, alias, out)
        }
        Expr::Function { args, .. } => {
            for a in args {
                columns_touched_in(a, alias, out);
            }
        }
        Expr::Between { expr, low, high } => {
            columns_touched_in(expr, alias, out);
            columns_touched_in(low, alias, out);
            columns_touched_in(high, alias, out);
        }
        Expr::In { expr, collection, .. } => {
            columns_touched_in(expr, alias, out);
            for c in collection {
                columns_touched_in(c, alias, out);
            }
        }
        Expr::Is { lhs, rhs, .. } | Expr::Equal { lhs, rhs, .. } => {
            columns_touched_in(lhs, alias, out);
            columns_touched_in(rhs, alias, out);
        }
        Expr::TableMatch { pattern, .. } => columns_touched_in(pattern, alias, out),
        _ => {}
    }
}

fn literal_value(expr: &Expr) -> Option<Value> {
    match expr {
        Expr::Literal(v) => Some(v.clone()),
        _ => None,
    }
}

fn is_rowid_column(expr: &Expr, alias: &TableAlias, rowid_col: &str) -> bool {
    matches!(expr, Expr::Column(a, name) if a == alias && name == rowid_col)
}

fn intersect(existing: Vec<Value>, found: Vec<Value>) -> Vec<Value> {
    existing.into_iter().filter(|v| found.contains(v)).collect()
}

/// Walks `filter` for a finite set of row-ids the source alias's rowid
/// column is restricted to, i.e. `rowid = ?` or `rowid IN (?, ?, ...)`,
/// possibly `AND`-combined with other conditions (intersected).
/// Returns `None` when no such restriction is found.
fn finite_rowids(filter: &Expr, alias: &TableAlias, rowid_col: &str) -> Option<Vec<Value>> {
    match filter {
        Expr::Equal { lhs, rhs, negated: false } => {
            if is_rowid_column(lhs, alias, rowid_col) {
                literal_value(rhs).map(|v| vec![v])
            } else if is_rowid_column(rhs, alias, rowid_col) {
                literal_value(lhs).map(|v| vec![v])
            } else {
                None
            }
        }
        Expr::In { expr, collection, negated: false } => {
            if is_rowid_column(expr, alias, rowid_col) {
                collection.iter().map(literal_value).collect()
            } else {
                None
            }
        }
        Expr::And(xs) => {
            let mut found: Option<Vec<Value>> = None;
            for x in xs {
                if let Some(v) = finite_rowids(x, alias, rowid_col) {
                    found = Some(match found {
                        Some(existing) => intersect(existing, v),
                        None => v,
                    });
                }
            }
            found
        }
        _ => None,
    }
}

fn region_for_table(
    table: &str,
    alias: &crate::alias::TableAlias,
    q: &QualifiedRelation,
    single_table: bool,
    db: &dyn Database,
) -> Result<DatabaseRegion> {
    let wants_all = q.selection.iter().any(|s| match s {
        Selection::All => true,
        Selection::QualifiedAll(a) => a == alias,
        _ => false,
    });

    // A finite row-id restriction only narrows the read-set for a
    // single-table statement: once other tables are joined in, the
    // `WHERE` clause may only ever see a subset of this alias's rows
    // after the join, not before.
    let rowids = if single_table {
        let pk = db.primary_key(table)?;
        pk.rowid_column
            .as_deref()
            .and_then(|rowid_col| q.filter.as_ref().and_then(|f| finite_rowids(f, alias, rowid_col)))
    } else {
        None
    };

    if wants_all {
        return Ok(DatabaseRegion::FullTable {
            table: table.to_string(),
            rowids,
        });
    }

    let mut columns = Vec::new();
    for sel in &q.selection {
        if let Selection::Aliased(e, _) | Selection::Expr(e) = sel {
            columns_touched_in(e, alias, &mut columns);
        }
    }
    if let Some(filter) = &q.filter {
        columns_touched_in(filter, alias, &mut columns);
    }
    for join in &q.joins {
        columns_touched_in(&join.on, alias, &mut columns);
    }
    columns.sort();
    columns.dedup();

    if columns.is_empty() {
        // The table participates (e.g. via a join) but no column of it
        // is ever read; still report it so the caller doesn't miss
        // invalidation on primary-key changes affecting row presence.
        let pk = db.primary_key(table)?;
        columns = pk.columns;
    }
    Ok(DatabaseRegion::Columns {
        table: table.to_string(),
        columns,
        rowids,
    })
}

/// Every table region `relation` reads, covering its main join chain
/// plus any prefetched (`all`/bridge) children, unioned in unless
/// `relation` is provably empty (a `LIMIT 0`).
pub fn regions_for(relation: &Relation, db: Rc<dyn Database>) -> Result<Vec<DatabaseRegion>> {
    let q = qualified::qualify(relation)?;
    let single_table = q.joins.is_empty();
    let mut regions = Vec::new();
    if let QualifiedSource::Table(name) = &q.source {
        regions.push(region_for_table(name, &q.alias, &q, single_table, db.as_ref())?);
    }
    for join in &q.joins {
        if let QualifiedSource::Table(name) = &join.source {
            regions.push(region_for_table(name, &join.alias, &q, false, db.as_ref())?);
        }
    }

    let provably_empty = relation.limit == Some(0);
    if !provably_empty {
        for child in &relation.children {
            if matches!(child.kind, AssociationKind::All | AssociationKind::Bridge) {
                regions.extend(regions_for(&child.relation, Rc::clone(&db))?);
            }
        }
    }

    Ok(regions)
}
