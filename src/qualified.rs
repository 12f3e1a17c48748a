//! Alias qualification (component F): walks a [`Relation`] tree,
//! assigns every source a [`TableAlias`], flattens one-to-one
//! associations into a single join chain, and sets aside to-many
//! associations as prefetch descriptors for component H.

use std::rc::Rc;

use crate::alias::TableAlias;
use crate::expr::{Expr, Ordering, Selection};
use crate::relation::{AssociationKind, ChildRelation, Cte, PivotKey, Relation, Source};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
}

#[derive(Debug, Clone)]
pub enum QualifiedSource {
    Table(String),
    SubQuery(Box<QualifiedRelation>),
}

#[derive(Debug, Clone)]
pub struct QualifiedJoin {
    pub kind: JoinKind,
    pub alias: TableAlias,
    pub source: QualifiedSource,
    pub on: Expr,
}

/// A to-many or bridge association, resolved separately from the main
/// join chain.
#[derive(Debug, Clone)]
pub struct PrefetchDescriptor {
    pub association: String,
    pub kind: AssociationKind,
    pub pivot: PivotKey,
    pub parent_alias: TableAlias,
    pub relation: Relation,
}

#[derive(Debug, Clone)]
pub struct QualifiedRelation {
    pub source: QualifiedSource,
    pub alias: TableAlias,
    pub joins: Vec<QualifiedJoin>,
    /// Every alias participating in the `FROM`/`JOIN` chain, root first.
    pub all_aliases: Vec<TableAlias>,
    pub selection: Vec<Selection>,
    pub filter: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub ordering: Vec<Ordering>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub distinct: bool,
    pub ctes: Vec<Rc<Cte>>,
    pub prefetches: Vec<PrefetchDescriptor>,
}

fn alias_for_source(source: &Source) -> Result<TableAlias> {
    match source {
        Source::Table { name, alias } => {
            let alias = alias.clone().unwrap_or_else(|| TableAlias::new(None));
            alias.set_table_name(name)?;
            Ok(alias)
        }
        Source::SubQuery(_) => Ok(TableAlias::new(None)),
    }
}

fn qualify_source(source: &Source, _alias: &TableAlias) -> Result<QualifiedSource> {
    match source {
        Source::Table { name, .. } => Ok(QualifiedSource::Table(name.clone())),
        Source::SubQuery(inner) => Ok(QualifiedSource::SubQuery(Box::new(qualify(inner)?))),
    }
}

fn pivot_condition(parent_alias: &TableAlias, child_alias: &TableAlias, pivot: &PivotKey) -> Expr {
    let pairs = pivot
        .parent_columns
        .iter()
        .zip(pivot.child_columns.iter())
        .map(|(p, c)| {
            Expr::eq(
                Expr::Column(child_alias.clone(), c.clone()),
                Expr::Column(parent_alias.clone(), p.clone()),
            )
        })
        .collect();
    Expr::and(pairs)
}

/// Flattens one join and its own one-to-one grandchildren into `joins`,
/// appending the join's (and grandchildren's) qualified selection and
/// ordering to the parent's in insertion order.
fn flatten_join(
    child: &ChildRelation,
    parent_alias: &TableAlias,
    joins: &mut Vec<QualifiedJoin>,
    all_aliases: &mut Vec<TableAlias>,
    prefetches: &mut Vec<PrefetchDescriptor>,
    selection: &mut Vec<Selection>,
    ordering: &mut Vec<Ordering>,
) -> Result<()> {
    match child.kind {
        AssociationKind::All | AssociationKind::Bridge => {
            prefetches.push(PrefetchDescriptor {
                association: child.association.clone(),
                kind: child.kind,
                pivot: child.pivot.clone(),
                parent_alias: parent_alias.clone(),
                relation: child.relation.clone(),
            });
            return Ok(());
        }
        AssociationKind::OneRequired | AssociationKind::OneOptional => {}
    }

    let child_alias = alias_for_source(&child.relation.source)?;
    let mut on = pivot_condition(parent_alias, &child_alias, &child.pivot);
    if let Some(filter) = &child.relation.filter {
        on = Expr::and(vec![on, filter.clone().qualify(&child_alias)]);
    }

    let kind = match child.kind {
        AssociationKind::OneRequired => JoinKind::Inner,
        AssociationKind::OneOptional => JoinKind::Left,
        _ => unreachable!(),
    };

    joins.push(QualifiedJoin {
        kind,
        alias: child_alias.clone(),
        source: qualify_source(&child.relation.source, &child_alias)?,
        on,
    });
    all_aliases.push(child_alias.clone());

    for sel in &child.relation.selection {
        selection.push(sel.clone().qualify(&child_alias));
    }
    for ord in &child.relation.ordering {
        ordering.push(ord.clone().qualify(&child_alias));
    }

    for grandchild in &child.relation.children {
        flatten_join(
            grandchild,
            &child_alias,
            joins,
            all_aliases,
            prefetches,
            selection,
            ordering,
        )?;
    }
    Ok(())
}

/// An inner join cannot be null-extended by a preceding left join, so
/// once a left join appears in the flattened chain every join after it
/// must also be a left join.
fn reject_inner_join_after_left(joins: &[QualifiedJoin]) -> Result<()> {
    let mut seen_left = false;
    for join in joins {
        match join.kind {
            JoinKind::Left => seen_left = true,
            JoinKind::Inner if seen_left => {
                return Err(Error::invalid_input(
                    "an inner join cannot follow a left join in the same statement",
                ));
            }
            JoinKind::Inner => {}
        }
    }
    Ok(())
}

/// Qualifies `relation`, producing a single flattened join chain plus
/// a separate list of prefetch descriptors for its to-many children.
pub fn qualify(relation: &Relation) -> Result<QualifiedRelation> {
    let alias = alias_for_source(&relation.source)?;
    let source = qualify_source(&relation.source, &alias)?;

    let mut joins = Vec::new();
    let mut all_aliases = vec![alias.clone()];
    let mut prefetches = Vec::new();
    let mut selection: Vec<Selection> = relation
        .selection
        .iter()
        .cloned()
        .map(|s| s.qualify(&alias))
        .collect();
    let mut ordering: Vec<Ordering> = relation
        .ordering
        .iter()
        .cloned()
        .map(|o| o.qualify(&alias))
        .collect();
    for child in &relation.children {
        flatten_join(
            child,
            &alias,
            &mut joins,
            &mut all_aliases,
            &mut prefetches,
            &mut selection,
            &mut ordering,
        )?;
    }
    reject_inner_join_after_left(&joins)?;

    let filter = relation.filter.clone().map(|f| f.qualify(&alias));
    let group_by = relation
        .group_by
        .iter()
        .cloned()
        .map(|e| e.qualify(&alias))
        .collect();
    let having = relation.having.clone().map(|e| e.qualify(&alias));

    Ok(QualifiedRelation {
        source,
        alias,
        joins,
        all_aliases,
        selection,
        filter,
        group_by,
        having,
        ordering,
        limit: relation.limit,
        offset: relation.offset,
        distinct: relation.distinct,
        ctes: relation.ctes.clone(),
        prefetches,
    })
}
