//! Query rendering (component G): turns a qualified relation into a
//! complete `SELECT`, `DELETE`, or `UPDATE` statement, plus the row
//! adapter a caller needs to split a joined row back into nested
//! records.

use std::rc::Rc;

use itertools::Itertools;

use crate::alias::TableAlias;
use crate::arguments::Arguments;
use crate::context::GenerationContext;
use crate::database::Database;
use crate::error::{Error, Result};
use crate::expr::{self, Expr, Selection};
use crate::ident::{quote_ident, Value};
use crate::qualified::{self, JoinKind, QualifiedJoin, QualifiedRelation, QualifiedSource};
use crate::relation::{AssociationKind, ChildRelation, Cte, Relation, Source};
use crate::schema::ConflictResolution;

/// Describes how to slice one row of a joined `SELECT` back into nested
/// records: the `[start, end)` column range this relation's own
/// selection occupies, plus one nested adapter per one-to-one child,
/// keyed by association name, offset past its parent's range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowAdapter {
    pub start: usize,
    pub end: usize,
    pub scopes: Vec<(String, RowAdapter)>,
}

#[derive(Debug, Clone)]
pub struct SelectPlan {
    pub sql: String,
    pub arguments: Vec<Value>,
    pub row_adapter: Option<RowAdapter>,
}

fn root_ctx(db: Rc<dyn Database>) -> GenerationContext {
    GenerationContext::root(db, Arguments::bindable())
}

fn cte_entries(
    ctes: &[Rc<Cte>],
    ctx: &GenerationContext,
) -> Result<Vec<(Rc<Cte>, usize)>> {
    ctes.iter()
        .map(|cte| {
            let qualified = qualified::qualify(&cte.relation)?;
            let count = match &cte.columns {
                Some(columns) => columns.len(),
                None => selection_column_count(&qualified, ctx)?,
            };
            Ok((cte.clone(), count))
        })
        .collect()
}

fn table_name_of(source: &QualifiedSource) -> Option<&str> {
    match source {
        QualifiedSource::Table(name) => Some(name),
        QualifiedSource::SubQuery(_) => None,
    }
}

fn selection_column_count(q: &QualifiedRelation, ctx: &GenerationContext) -> Result<usize> {
    let mut total = 0;
    for sel in &q.selection {
        total += match sel {
            Selection::All => wildcard_column_count(&q.alias, &q.source, ctx)?,
            Selection::QualifiedAll(alias) => {
                let source = chain_source_for_alias(q, alias).ok_or_else(|| {
                    Error::invalid_input("qualified wildcard refers to an alias outside this relation")
                })?;
                wildcard_column_count(alias, source, ctx)?
            }
            _ => 1,
        };
    }
    Ok(total)
}

fn chain_source_for_alias<'a>(q: &'a QualifiedRelation, alias: &TableAlias) -> Option<&'a QualifiedSource> {
    if *alias == q.alias {
        return Some(&q.source);
    }
    q.joins.iter().find(|j| j.alias == *alias).map(|j| &j.source)
}

fn wildcard_column_count(_alias: &TableAlias, source: &QualifiedSource, ctx: &GenerationContext) -> Result<usize> {
    match source {
        QualifiedSource::Table(name) => ctx.column_count(name),
        QualifiedSource::SubQuery(inner) => selection_column_count(inner, ctx),
    }
}

fn render_join_source(source: &QualifiedSource, ctx: &GenerationContext) -> Result<String> {
    match source {
        QualifiedSource::Table(name) => Ok(quote_ident(name)),
        QualifiedSource::SubQuery(inner) => {
            let (sql, _) = render_nested(inner, ctx)?;
            Ok(format!("({sql})"))
        }
    }
}

fn render_with_alias(sql_source: String, alias: &TableAlias, ctx: &GenerationContext) -> String {
    match ctx.alias_name(alias) {
        Some(name) => format!("{sql_source} {}", quote_ident(&name)),
        None => sql_source,
    }
}

fn render_join(join: &QualifiedJoin, ctx: &GenerationContext) -> Result<String> {
    let keyword = match join.kind {
        JoinKind::Inner => "JOIN",
        JoinKind::Left => "LEFT JOIN",
    };
    let source = render_join_source(&join.source, ctx)?;
    let source = render_with_alias(source, &join.alias, ctx);
    let on = expr::render(&join.on, ctx)?;
    Ok(format!("{keyword} {source} ON {on}"))
}

fn render_from_chain(q: &QualifiedRelation, ctx: &GenerationContext) -> Result<String> {
    let source = render_join_source(&q.source, ctx)?;
    let source = render_with_alias(source, &q.alias, ctx);
    let mut clause = format!("FROM {source}");
    for join in &q.joins {
        clause.push(' ');
        clause.push_str(&render_join(join, ctx)?);
    }
    Ok(clause)
}

fn render_with_clause(ctes: &[Rc<Cte>], ctx: &GenerationContext) -> Result<String> {
    if ctes.is_empty() {
        return Ok(String::new());
    }
    let recursive = ctes.iter().any(|c| c.recursive);
    let mut rendered = Vec::with_capacity(ctes.len());
    for cte in ctes {
        let qualified = qualified::qualify(&cte.relation)?;
        let (sql, _) = render_nested(&qualified, ctx)?;
        let columns = cte
            .columns
            .as_ref()
            .map(|cols| format!(" ({})", cols.iter().map(|c| quote_ident(c)).join(", ")))
            .unwrap_or_default();
        rendered.push(format!("{}{} AS ({sql})", quote_ident(&cte.name), columns));
    }
    let keyword = if recursive { "WITH RECURSIVE" } else { "WITH" };
    Ok(format!("{keyword} {} ", rendered.join(", ")))
}

/// Renders a nested `SELECT` (used for subqueries, CTE bodies, and the
/// body of an outer `render_select`) against a child scope of `ctx`.
fn render_nested(q: &QualifiedRelation, ctx: &GenerationContext) -> Result<(String, GenerationContext)> {
    let child = ctx.subquery_context(&q.all_aliases, cte_entries(&q.ctes, ctx)?)?;
    let with_clause = render_with_clause(&q.ctes, &child)?;
    let from_clause = render_from_chain(q, &child)?;

    let selection = q
        .selection
        .iter()
        .map(|s| expr::render_selection(s, &child))
        .collect::<Result<Vec<_>>>()?;
    if selection.is_empty() {
        return Err(Error::invalid_input("a relation must select at least one column"));
    }
    let distinct = if q.distinct { "DISTINCT " } else { "" };

    let mut sql = format!("{with_clause}SELECT {distinct}{} {from_clause}", selection.join(", "));

    if let Some(filter) = &q.filter {
        sql.push_str(" WHERE ");
        sql.push_str(&expr::render(filter, &child)?);
    }
    if !q.group_by.is_empty() {
        let rendered = q
            .group_by
            .iter()
            .map(|e| expr::render(e, &child))
            .collect::<Result<Vec<_>>>()?;
        sql.push_str(" GROUP BY ");
        sql.push_str(&rendered.join(", "));
        if let Some(having) = &q.having {
            sql.push_str(" HAVING ");
            sql.push_str(&expr::render(having, &child)?);
        }
    }
    if !q.ordering.is_empty() {
        let rendered = q
            .ordering
            .iter()
            .map(|o| expr::render_ordering(o, &child))
            .collect::<Result<Vec<_>>>()?;
        sql.push_str(" ORDER BY ");
        sql.push_str(&rendered.join(", "));
    }
    if let Some(limit) = q.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
        if let Some(offset) = q.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
    }

    Ok((sql, child))
}

/// The number of SQL columns `relation`'s own selection contributes,
/// before any one-to-one child is flattened in alongside it.
fn own_selection_width(relation: &Relation, ctx: &GenerationContext) -> Result<usize> {
    let mut total = 0;
    for sel in &relation.selection {
        total += match sel {
            Selection::All | Selection::QualifiedAll(_) => match &relation.source {
                Source::Table { name, .. } => ctx.column_count(name)?,
                Source::SubQuery(inner) => own_selection_width(inner, ctx)?,
            },
            _ => 1,
        };
    }
    Ok(total)
}

/// Builds the adapter for one flattened one-to-one child, recursing
/// into its own one-to-one grandchildren. Returns the adapter plus the
/// running column offset just past everything it (and its
/// grandchildren) contributed, for the next sibling to continue from.
fn child_row_adapter(child: &ChildRelation, ctx: &GenerationContext, start: usize) -> Result<(RowAdapter, usize)> {
    let width = own_selection_width(&child.relation, ctx)?;
    let end = start + width;
    let mut offset = end;
    let mut scopes = Vec::new();
    for grandchild in &child.relation.children {
        if matches!(grandchild.kind, AssociationKind::All | AssociationKind::Bridge) {
            continue;
        }
        let (adapter, next_offset) = child_row_adapter(grandchild, ctx, offset)?;
        scopes.push((grandchild.association.clone(), adapter));
        offset = next_offset;
    }
    Ok((RowAdapter { start, end, scopes }, offset))
}

/// Builds the row adapter for a top-level relation: `None` when it has
/// no one-to-one joins (the caller can read the row as-is), otherwise a
/// range covering the source's own columns plus one nested scope per
/// joined association, in insertion order.
fn build_row_adapter(relation: &Relation, q: &QualifiedRelation, ctx: &GenerationContext) -> Result<Option<RowAdapter>> {
    if q.joins.is_empty() {
        return Ok(None);
    }
    let width = own_selection_width(relation, ctx)?;
    let mut offset = width;
    let mut scopes = Vec::new();
    for child in &relation.children {
        if matches!(child.kind, AssociationKind::All | AssociationKind::Bridge) {
            continue;
        }
        let (adapter, next_offset) = child_row_adapter(child, ctx, offset)?;
        scopes.push((child.association.clone(), adapter));
        offset = next_offset;
    }
    if scopes.is_empty() {
        return Ok(None);
    }
    Ok(Some(RowAdapter {
        start: 0,
        end: width,
        scopes,
    }))
}

/// Renders `relation` as a top-level `SELECT` statement against `db`.
pub fn render_select(relation: &Relation, db: Rc<dyn Database>) -> Result<SelectPlan> {
    render_select_inner(relation, db, false)
}

/// Renders `relation` as a top-level `SELECT`, appending `LIMIT 1` when
/// the caller only wants a single result and the query doesn't already
/// provably yield at most one row (see [`single_result_provable`]).
pub fn render_select_single(relation: &Relation, db: Rc<dyn Database>) -> Result<SelectPlan> {
    render_select_inner(relation, db, true)
}

fn render_select_inner(relation: &Relation, db: Rc<dyn Database>, single_result: bool) -> Result<SelectPlan> {
    let mut q = qualified::qualify(relation)?;
    log::debug!("rendering select over {:?} with {} join(s)", q.alias, q.joins.len());
    if single_result && q.limit.is_none() && !is_single_result_provable(&q, db.as_ref())? {
        log::debug!("appending LIMIT 1, result not provably singular");
        q.limit = Some(1);
    }
    let ctx = root_ctx(db);
    let (sql, child) = render_nested(&q, &ctx)?;
    let row_adapter = build_row_adapter(relation, &q, &child)?;
    Ok(SelectPlan {
        sql,
        arguments: ctx.sink().values(),
        row_adapter,
    })
}

/// Renders the body of a scalar subquery, e.g. the right-hand side of
/// `x IN (...)`. Shares `ctx`'s sink.
pub fn render_subquery_select(relation: &Relation, ctx: &GenerationContext) -> Result<String> {
    let q = qualified::qualify(relation)?;
    let (sql, _) = render_nested(&q, ctx)?;
    Ok(sql)
}

/// Renders the body of an `EXISTS (...)` subquery: `FROM`/`JOIN`/`WHERE`
/// only, selecting the constant `1`.
pub fn render_exists(relation: &Relation, ctx: &GenerationContext) -> Result<String> {
    let q = qualified::qualify(relation)?;
    let child = ctx.subquery_context(&q.all_aliases, Vec::new())?;
    let from_clause = render_from_chain(&q, &child)?;
    let mut sql = format!("SELECT 1 {from_clause}");
    if let Some(filter) = &q.filter {
        sql.push_str(" WHERE ");
        sql.push_str(&expr::render(filter, &child)?);
    }
    Ok(sql)
}

/// How a relation's `GROUP BY` (if any) relates to its source table's
/// declared keys, decided up front so `DELETE`/`UPDATE` know whether a
/// grouped target can be rewritten safely or must be rejected outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupingKind {
    /// No `GROUP BY`.
    None,
    /// Every group expression is a plain column of the source alias,
    /// and together they match a declared unique key.
    Unique,
    /// Grouped by something other than a unique key of the source.
    NonUnique,
}

fn classify_grouping(q: &QualifiedRelation, db: &dyn Database) -> Result<GroupingKind> {
    if q.group_by.is_empty() {
        return Ok(GroupingKind::None);
    }
    let table_name = match table_name_of(&q.source) {
        Some(name) => name,
        None => return Ok(GroupingKind::NonUnique),
    };
    let mut columns = Vec::new();
    for expr in &q.group_by {
        match expr {
            Expr::Column(alias, name) if *alias == q.alias => columns.push(name.clone()),
            _ => return Ok(GroupingKind::NonUnique),
        }
    }
    if db.has_unique_key(table_name, &columns)? {
        Ok(GroupingKind::Unique)
    } else {
        Ok(GroupingKind::NonUnique)
    }
}

/// Builds `pk IN (SELECT pk FROM <same join chain> WHERE ...)`, the
/// rewrite `render_delete`/`render_update` need whenever one-to-one
/// joins are present: SQLite cannot target a join directly.
fn primary_key_predicate_sql(q: &QualifiedRelation, ctx: &GenerationContext) -> Result<String> {
    let table_name = table_name_of(&q.source)
        .ok_or_else(|| Error::invalid_input("a DELETE/UPDATE target must be a table, not a subquery"))?;
    let pk = ctx.db().primary_key(table_name)?;
    if pk.columns.is_empty() {
        return Err(Error::schema(format!("table \"{table_name}\" has no primary key")));
    }

    let selection = pk
        .columns
        .iter()
        .map(|c| Selection::Expr(Box::new(Expr::Column(q.alias.clone(), c.clone()))))
        .collect();
    let subquery = QualifiedRelation {
        selection,
        ..q.clone()
    };
    let (subquery_sql, _) = render_nested(&subquery, ctx)?;

    let lhs = if pk.columns.len() == 1 {
        quote_ident(&pk.columns[0])
    } else {
        format!("({})", pk.columns.iter().map(|c| quote_ident(c)).join(", "))
    };
    Ok(format!("{lhs} IN ({subquery_sql})"))
}

/// Renders `relation` as a `DELETE FROM` statement. A relation with
/// one-to-one joins is rewritten as `DELETE ... WHERE pk IN (subquery)`
/// since SQLite cannot `DELETE` across a join directly.
pub fn render_delete(relation: &Relation, db: Rc<dyn Database>) -> Result<SelectPlan> {
    let q = qualified::qualify(relation)?;
    let table_name = table_name_of(&q.source)
        .ok_or_else(|| Error::invalid_input("a DELETE target must be a table, not a subquery"))?
        .to_string();
    let ctx = root_ctx(db);
    let grouping = classify_grouping(&q, ctx.db().as_ref())?;
    if grouping == GroupingKind::NonUnique {
        return Err(Error::unsupported(
            "cannot DELETE a relation grouped by anything other than a unique key",
        ));
    }

    let mut sql = format!("DELETE FROM {}", quote_ident(&table_name));
    if q.joins.is_empty() && grouping == GroupingKind::None {
        log::debug!("deleting from \"{table_name}\" directly, no join rewrite needed");
        let child = ctx.subquery_context(std::slice::from_ref(&q.alias), Vec::new())?;
        if let Some(filter) = &q.filter {
            sql.push_str(" WHERE ");
            sql.push_str(&expr::render(filter, &child)?);
        }
    } else {
        log::debug!("rewriting delete through {} join(s) as a primary key subquery", q.joins.len());
        let predicate = primary_key_predicate_sql(&q, &ctx)?;
        sql.push_str(" WHERE ");
        sql.push_str(&predicate);
    }

    Ok(SelectPlan {
        sql,
        arguments: ctx.sink().values(),
        row_adapter: None,
    })
}

/// One `SET column = expr` assignment.
#[derive(Debug, Clone)]
pub struct Assignment {
    pub column: String,
    pub value: Expr,
}

/// Renders `relation` as an `UPDATE [OR conflict] ... SET ...` statement,
/// with the same join/grouping rewrite rule as [`render_delete`].
pub fn render_update(
    relation: &Relation,
    assignments: Vec<Assignment>,
    conflict: Option<ConflictResolution>,
    db: Rc<dyn Database>,
) -> Result<SelectPlan> {
    if assignments.is_empty() {
        return Err(Error::invalid_input("an UPDATE requires at least one assignment"));
    }
    let q = qualified::qualify(relation)?;
    let table_name = table_name_of(&q.source)
        .ok_or_else(|| Error::invalid_input("an UPDATE target must be a table, not a subquery"))?
        .to_string();
    log::debug!("rendering update of \"{table_name}\" with {} assignment(s)", assignments.len());
    let ctx = root_ctx(db);
    let grouping = classify_grouping(&q, ctx.db().as_ref())?;
    if grouping == GroupingKind::NonUnique {
        return Err(Error::unsupported(
            "cannot UPDATE a relation grouped by anything other than a unique key",
        ));
    }
    let child = ctx.subquery_context(std::slice::from_ref(&q.alias), Vec::new())?;

    let set_clause = assignments
        .iter()
        .map(|a| Ok(format!("{} = {}", quote_ident(&a.column), expr::render(&a.value, &child)?)))
        .collect::<Result<Vec<_>>>()?
        .join(", ");

    let or_clause = conflict.map(|c| format!("OR {} ", c.to_sql())).unwrap_or_default();
    let mut sql = format!("UPDATE {or_clause}{} SET {set_clause}", quote_ident(&table_name));
    if q.joins.is_empty() && grouping == GroupingKind::None {
        if let Some(filter) = &q.filter {
            sql.push_str(" WHERE ");
            sql.push_str(&expr::render(filter, &child)?);
        }
    } else {
        let predicate = primary_key_predicate_sql(&q, &ctx)?;
        sql.push_str(" WHERE ");
        sql.push_str(&predicate);
    }

    Ok(SelectPlan {
        sql,
        arguments: ctx.sink().values(),
        row_adapter: None,
    })
}

/// Whether `relation`'s filter already pins its root alias down to at
/// most one row via an equality match on its primary key or some
/// declared unique index, or its selection is a single scalar
/// aggregate over an ungrouped source, making an explicit `LIMIT 1`
/// redundant.
pub fn single_result_provable(relation: &Relation, db: &dyn Database) -> Result<bool> {
    let q = qualified::qualify(relation)?;
    is_single_result_provable(&q, db)
}

const AGGREGATE_FUNCTIONS: &[&str] = &["COUNT", "SUM", "AVG", "MIN", "MAX", "TOTAL", "GROUP_CONCAT"];

fn is_aggregate_selection(selection: &[Selection]) -> bool {
    selection.iter().all(|s| match s {
        Selection::Expr(expr) => is_aggregate_expr(expr),
        _ => false,
    })
}

fn is_aggregate_expr(expr: &Expr) -> bool {
    match expr {
        Expr::CountAll | Expr::CountDistinct(_) => true,
        Expr::Function { name, args, .. } => {
            AGGREGATE_FUNCTIONS.contains(&name.to_ascii_uppercase().as_str()) && args.len() <= 2
        }
        _ => false,
    }
}

fn is_single_result_provable(q: &QualifiedRelation, db: &dyn Database) -> Result<bool> {
    if !q.joins.is_empty() {
        return Ok(false);
    }
    let table_name = match table_name_of(&q.source) {
        Some(name) => name,
        None => return Ok(false),
    };
    if let Some(filter) = &q.filter {
        let mut equated = Vec::new();
        collect_equated_columns(filter, &q.alias, &mut equated);
        if !equated.is_empty() && db.has_unique_key(table_name, &equated)? {
            return Ok(true);
        }
    }
    Ok(q.group_by.is_empty() && is_aggregate_selection(&q.selection))
}

fn collect_equated_columns(expr: &Expr, alias: &TableAlias, out: &mut Vec<String>) {
    match expr {
        Expr::And(xs) => {
            for x in xs {
                collect_equated_columns(x, alias, out);
            }
        }
        Expr::Equal {
            lhs,
            rhs,
            negated: false,
        } => {
            if let Expr::Column(a, name) = lhs.as_ref() {
                if a == alias {
                    out.push(name.clone());
                    return;
                }
            }
            if let Expr::Column(a, name) = rhs.as_ref() {
                if a == alias {
                    out.push(name.clone());
                }
            }
        }
        _ => {}
    }
}
