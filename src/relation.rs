//! The user-facing relation tree: sources, joins, filters,
//! groupings, orderings, limits, CTEs, and selections, before any
//! alias-qualification has happened.

use std::rc::Rc;

use crate::alias::TableAlias;
use crate::expr::{Expr, Ordering, Selection};

/// How a child relation relates to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationKind {
    /// A required to-one association, rendered as an `INNER JOIN`.
    OneRequired,
    /// An optional to-one association, rendered as a `LEFT JOIN`.
    OneOptional,
    /// A to-many association, fetched separately and grouped in memory
    /// rather than joined.
    All,
    /// A many-to-many association via a join table; also prefetched
    /// rather than joined.
    Bridge,
}

/// The parent/child column pair linking a prefetched association.
#[derive(Debug, Clone)]
pub struct PivotKey {
    pub parent_columns: Vec<String>,
    pub child_columns: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ChildRelation {
    pub association: String,
    pub kind: AssociationKind,
    pub pivot: PivotKey,
    pub relation: Relation,
}

#[derive(Debug, Clone)]
pub enum Source {
    Table {
        name: String,
        alias: Option<TableAlias>,
    },
    SubQuery(Box<Relation>),
}

/// A common table expression: a name, optional explicit column list,
/// the subquery it wraps, and whether it is part of a `WITH RECURSIVE`.
#[derive(Debug, Clone)]
pub struct Cte {
    pub name: String,
    pub columns: Option<Vec<String>>,
    pub relation: Relation,
    pub recursive: bool,
}

#[derive(Debug, Clone)]
pub struct Relation {
    pub source: Source,
    pub selection: Vec<Selection>,
    pub filter: Option<Expr>,
    pub children: Vec<ChildRelation>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub ordering: Vec<Ordering>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub distinct: bool,
    pub ctes: Vec<Rc<Cte>>,
}

impl Relation {
    pub fn from_table(name: impl Into<String>) -> Self {
        Relation {
            source: Source::Table {
                name: name.into(),
                alias: None,
            },
            selection: vec![Selection::All],
            filter: None,
            children: Vec::new(),
            group_by: Vec::new(),
            having: None,
            ordering: Vec::new(),
            limit: None,
            offset: None,
            distinct: false,
            ctes: Vec::new(),
        }
    }

    pub fn from_subquery(relation: Relation) -> Self {
        Relation {
            source: Source::SubQuery(Box::new(relation)),
            selection: vec![Selection::All],
            filter: None,
            children: Vec::new(),
            group_by: Vec::new(),
            having: None,
            ordering: Vec::new(),
            limit: None,
            offset: None,
            distinct: false,
            ctes: Vec::new(),
        }
    }

    pub fn with_alias(mut self, alias: TableAlias) -> Self {
        if let Source::Table { alias: slot, .. } = &mut self.source {
            *slot = Some(alias);
        }
        self
    }

    pub fn filtered(mut self, filter: Expr) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => Expr::and(vec![existing, filter]),
            None => filter,
        });
        self
    }

    pub fn selecting(mut self, selection: Vec<Selection>) -> Self {
        self.selection = selection;
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn limited(mut self, limit: i64, offset: Option<i64>) -> Self {
        self.limit = Some(limit);
        self.offset = offset;
        self
    }

    pub fn ordered(mut self, ordering: Vec<Ordering>) -> Self {
        self.ordering.extend(ordering);
        self
    }

    pub fn grouped(mut self, group_by: Vec<Expr>, having: Option<Expr>) -> Self {
        self.group_by = group_by;
        self.having = having;
        self
    }

    pub fn joining(mut self, child: ChildRelation) -> Self {
        self.children.push(child);
        self
    }

    pub fn table_name(&self) -> Option<&str> {
        match &self.source {
            Source::Table { name, .. } => Some(name),
            Source::SubQuery(_) => None,
        }
    }
}
