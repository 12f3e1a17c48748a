//! Expression, ordering, and selection trees, and their renderer
//! (component E). Every node has one contract: render into a
//! [`GenerationContext`], returning SQL text and (through the
//! context's shared sink) contributing bound arguments in emission
//! order.

use itertools::Itertools;

use crate::alias::TableAlias;
use crate::context::GenerationContext;
use crate::error::{Error, Result};
use crate::ident::{quote_ident, quote_qualified, render_literal, Value};
use crate::query;
use crate::relation::Relation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Concat,
    Lt,
    Lte,
    Gt,
    Gte,
    Like,
    Glob,
    Regexp,
}

impl BinaryOp {
    fn token(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Concat => "||",
            BinaryOp::Lt => "<",
            BinaryOp::Lte => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Gte => ">=",
            BinaryOp::Like => "LIKE",
            BinaryOp::Glob => "GLOB",
            BinaryOp::Regexp => "REGEXP",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    BitNot,
}

impl UnaryOp {
    fn token(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::BitNot => "~",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Value),
    /// A column not yet associated with a source; qualification
    /// rewrites this to [`Expr::Column`].
    BareColumn(String),
    Column(TableAlias, String),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Function {
        name: String,
        args: Vec<Expr>,
        distinct: bool,
    },
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
    },
    In {
        expr: Box<Expr>,
        collection: Vec<Expr>,
        negated: bool,
    },
    InSubquery {
        expr: Box<Expr>,
        subquery: Box<Relation>,
        negated: bool,
    },
    Is {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        negated: bool,
    },
    Equal {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        negated: bool,
    },
    CountAll,
    CountDistinct(Box<Expr>),
    Collate(Box<Expr>, String),
    /// The primary key of the relation carrying `alias`, resolved
    /// against the schema at render time. `None` before qualification.
    FastPrimaryKey(Option<TableAlias>),
    TableMatch {
        alias: TableAlias,
        pattern: Box<Expr>,
    },
    Exists(Box<Relation>),
    /// An opaque fragment of SQL with embedded `?` placeholders; `args`
    /// is consumed in order as each placeholder is resolved.
    SqlLiteral { sql: String, args: Vec<Value> },
}

impl Expr {
    pub fn and(mut exprs: Vec<Expr>) -> Expr {
        if exprs.len() == 1 {
            return exprs.pop().unwrap();
        }
        Expr::And(exprs)
    }

    pub fn or(mut exprs: Vec<Expr>) -> Expr {
        if exprs.len() == 1 {
            return exprs.pop().unwrap();
        }
        Expr::Or(exprs)
    }

    pub fn eq(lhs: Expr, rhs: Expr) -> Expr {
        Expr::Equal {
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            negated: false,
        }
    }

    /// Qualifies every unqualified column reference and fast-primary-key
    /// token in this tree with `alias`. Idempotent: nodes that already
    /// carry a qualifier (or a different kind of literal) are left
    /// untouched.
    pub fn qualify(self, alias: &TableAlias) -> Expr {
        match self {
            Expr::BareColumn(name) => Expr::Column(alias.clone(), name),
            Expr::Column(a, name) => Expr::Column(a, name),
            Expr::FastPrimaryKey(None) => Expr::FastPrimaryKey(Some(alias.clone())),
            Expr::FastPrimaryKey(Some(a)) => Expr::FastPrimaryKey(Some(a)),
            Expr::Binary(op, l, r) => {
                Expr::Binary(op, Box::new(l.qualify(alias)), Box::new(r.qualify(alias)))
            }
            Expr::And(xs) => Expr::And(xs.into_iter().map(|x| x.qualify(alias)).collect()),
            Expr::Or(xs) => Expr::Or(xs.into_iter().map(|x| x.qualify(alias)).collect()),
            Expr::Not(x) => Expr::Not(Box::new(x.qualify(alias))),
            Expr::Unary(op, x) => Expr::Unary(op, Box::new(x.qualify(alias))),
            Expr::Function {
                name,
                args,
                distinct,
            } => Expr::Function {
                name,
                args: args.into_iter().map(|a| a.qualify(alias)).collect(),
                distinct,
            },
            Expr::Between { expr, low, high } => Expr::Between {
                expr: Box::new(expr.qualify(alias)),
                low: Box::new(low.qualify(alias)),
                high: Box::new(high.qualify(alias)),
            },
            Expr::In {
                expr,
                collection,
                negated,
            } => Expr::In {
                expr: Box::new(expr.qualify(alias)),
                collection: collection.into_iter().map(|x| x.qualify(alias)).collect(),
                negated,
            },
            Expr::InSubquery {
                expr,
                subquery,
                negated,
            } => Expr::InSubquery {
                expr: Box::new(expr.qualify(alias)),
                subquery,
                negated,
            },
            Expr::Is { lhs, rhs, negated } => Expr::Is {
                lhs: Box::new(lhs.qualify(alias)),
                rhs: Box::new(rhs.qualify(alias)),
                negated,
            },
            Expr::Equal { lhs, rhs, negated } => Expr::Equal {
                lhs: Box::new(lhs.qualify(alias)),
                rhs: Box::new(rhs.qualify(alias)),
                negated,
            },
            Expr::CountDistinct(x) => Expr::CountDistinct(Box::new(x.qualify(alias))),
            Expr::Collate(x, name) => Expr::Collate(Box::new(x.qualify(alias)), name),
            Expr::TableMatch { alias: a, pattern } => Expr::TableMatch {
                alias: a,
                pattern: Box::new(pattern.qualify(alias)),
            },
            other @ (Expr::Literal(_)
            | Expr::CountAll
            | Expr::Exists(_)
            | Expr::SqlLiteral { .. }) => other,
        }
    }

    fn is_compound(&self) -> bool {
        matches!(self, Expr::And(_) | Expr::Or(_) | Expr::Between { .. })
    }
}

fn render_operand(expr: &Expr, ctx: &GenerationContext) -> Result<String> {
    let sql = render(expr, ctx)?;
    if expr.is_compound() {
        Ok(format!("({sql})"))
    } else {
        Ok(sql)
    }
}

/// Renders `expr` into SQL text, appending any bound values to
/// `ctx`'s sink in left-to-right order as they're encountered.
pub fn render(expr: &Expr, ctx: &GenerationContext) -> Result<String> {
    Ok(match expr {
        Expr::Literal(value) => render_value(value, ctx)?,
        Expr::BareColumn(name) => quote_ident(name),
        Expr::Column(alias, name) => quote_qualified(ctx.qualifier(alias).as_deref(), name),
        Expr::Binary(op, lhs, rhs) => {
            format!(
                "{} {} {}",
                render_operand(lhs, ctx)?,
                op.token(),
                render_operand(rhs, ctx)?
            )
        }
        Expr::And(xs) => render_associative(xs, "AND", ctx)?,
        Expr::Or(xs) => render_associative(xs, "OR", ctx)?,
        Expr::Not(x) => format!("NOT {}", render_operand(x, ctx)?),
        Expr::Unary(op, x) => format!("{}{}", op.token(), render_operand(x, ctx)?),
        Expr::Function {
            name,
            args,
            distinct,
        } => {
            let rendered_args = args.iter().map(|a| render(a, ctx)).collect::<Result<Vec<_>>>()?;
            let prefix = if *distinct { "DISTINCT " } else { "" };
            format!("{name}({prefix}{})", rendered_args.join(", "))
        }
        Expr::Between { expr, low, high } => format!(
            "{} BETWEEN {} AND {}",
            render_operand(expr, ctx)?,
            render_operand(low, ctx)?,
            render_operand(high, ctx)?
        ),
        Expr::In {
            expr,
            collection,
            negated,
        } => {
            let keyword = if *negated { "NOT IN" } else { "IN" };
            if collection.is_empty() {
                // `x IN ()` is invalid SQL; fold to a constant instead.
                (if *negated { "1" } else { "0" }).to_string()
            } else {
                let items = collection
                    .iter()
                    .map(|x| render(x, ctx))
                    .collect::<Result<Vec<_>>>()?;
                format!("{} {keyword} ({})", render_operand(expr, ctx)?, items.join(", "))
            }
        }
        Expr::InSubquery {
            expr,
            subquery,
            negated,
        } => {
            let keyword = if *negated { "NOT IN" } else { "IN" };
            let sub_sql = query::render_subquery_select(subquery, ctx)?;
            format!("{} {keyword} ({sub_sql})", render_operand(expr, ctx)?)
        }
        Expr::Is { lhs, rhs, negated } => {
            let keyword = if *negated { "IS NOT" } else { "IS" };
            format!(
                "{} {keyword} {}",
                render_operand(lhs, ctx)?,
                render_operand(rhs, ctx)?
            )
        }
        Expr::Equal { lhs, rhs, negated } => {
            let keyword = if *negated { "<>" } else { "=" };
            format!(
                "{} {keyword} {}",
                render_operand(lhs, ctx)?,
                render_operand(rhs, ctx)?
            )
        }
        Expr::CountAll => "COUNT(*)".to_string(),
        Expr::CountDistinct(x) => format!("COUNT(DISTINCT {})", render(x, ctx)?),
        Expr::Collate(x, name) => format!("{} COLLATE {}", render_operand(x, ctx)?, quote_ident(name)),
        Expr::FastPrimaryKey(alias) => render_fast_primary_key(alias.as_ref(), ctx)?,
        Expr::TableMatch { alias, pattern } => format!(
            "{} MATCH {}",
            ctx.qualifier(alias)
                .map(|q| format!("{}.", quote_ident(&q)))
                .unwrap_or_default(),
            render(pattern, ctx)?
        ),
        Expr::Exists(relation) => format!("EXISTS ({})", query::render_exists(relation, ctx)?),
        Expr::SqlLiteral { sql, args } => render_sql_literal(sql, args, ctx)?,
    })
}

fn render_associative(xs: &[Expr], keyword: &str, ctx: &GenerationContext) -> Result<String> {
    let rendered = xs
        .iter()
        .map(|x| render_operand(x, ctx))
        .collect::<Result<Vec<_>>>()?;
    Ok(rendered.into_iter().join(&format!(" {keyword} ")))
}

fn render_value(value: &Value, ctx: &GenerationContext) -> Result<String> {
    if ctx.sink().is_raw() {
        return render_literal(value);
    }
    if !ctx.sink().append_argument(value.clone()) {
        return Err(Error::raw_arguments_mode(
            "cannot bind a value while rendering in raw-arguments mode",
        ));
    }
    Ok("?".to_string())
}

fn render_sql_literal(sql: &str, args: &[Value], ctx: &GenerationContext) -> Result<String> {
    if args.is_empty() {
        return Ok(sql.to_string());
    }
    if !ctx.sink().is_raw() {
        if !ctx.sink().append_arguments(args.iter().cloned()) {
            return Err(Error::raw_arguments_mode(
                "cannot bind values inside an SQL literal in raw-arguments mode",
            ));
        }
        return Ok(sql.to_string());
    }

    let mut rendered = String::with_capacity(sql.len());
    let mut args = args.iter();
    for ch in sql.chars() {
        if ch == '?' {
            let value = args.next().ok_or_else(|| {
                Error::invalid_input("fewer captured values than `?` placeholders in SQL literal")
            })?;
            rendered.push_str(&render_literal(value)?);
        } else {
            rendered.push(ch);
        }
    }
    Ok(rendered)
}

fn render_fast_primary_key(alias: Option<&TableAlias>, ctx: &GenerationContext) -> Result<String> {
    let alias = alias.ok_or_else(|| {
        Error::invalid_input("fast primary key token used before qualification")
    })?;
    let table_name = alias.table_name().ok_or_else(|| {
        Error::invalid_input("fast primary key token requires a table-backed alias")
    })?;
    let pk = ctx.db().primary_key(&table_name)?;
    if pk.columns.len() != 1 {
        return Err(Error::unsupported(format!(
            "table \"{table_name}\" has a composite primary key; it cannot be used as a scalar expression"
        )));
    }
    render(&Expr::Column(alias.clone(), pk.columns[0].clone()), ctx)
}

/// One of the SQL-level sort directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
    AscNullsLast,
    DescNullsFirst,
}

impl SortDirection {
    fn token(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
            SortDirection::AscNullsLast => "ASC NULLS LAST",
            SortDirection::DescNullsFirst => "DESC NULLS FIRST",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Ordering {
    By(Expr, SortDirection),
    Collated(Expr, String, SortDirection),
    Literal(String),
}

impl Ordering {
    pub fn qualify(self, alias: &TableAlias) -> Ordering {
        match self {
            Ordering::By(e, dir) => Ordering::By(e.qualify(alias), dir),
            Ordering::Collated(e, collation, dir) => {
                Ordering::Collated(e.qualify(alias), collation, dir)
            }
            Ordering::Literal(sql) => Ordering::Literal(sql),
        }
    }
}

pub fn render_ordering(ordering: &Ordering, ctx: &GenerationContext) -> Result<String> {
    Ok(match ordering {
        Ordering::By(expr, dir) => format!("{} {}", render(expr, ctx)?, dir.token()),
        Ordering::Collated(expr, collation, dir) => format!(
            "{} COLLATE {} {}",
            render(expr, ctx)?,
            quote_ident(collation),
            dir.token()
        ),
        Ordering::Literal(sql) => sql.clone(),
    })
}

/// One item of a `SELECT` list.
#[derive(Debug, Clone)]
pub enum Selection {
    All,
    QualifiedAll(TableAlias),
    Aliased(Box<Expr>, String),
    Expr(Box<Expr>),
    Literal(String),
}

impl Selection {
    pub fn qualify(self, alias: &TableAlias) -> Selection {
        match self {
            Selection::All => Selection::QualifiedAll(alias.clone()),
            Selection::QualifiedAll(a) => Selection::QualifiedAll(a),
            Selection::Aliased(e, name) => Selection::Aliased(Box::new(e.qualify(alias)), name),
            Selection::Expr(e) => Selection::Expr(Box::new(e.qualify(alias))),
            Selection::Literal(sql) => Selection::Literal(sql),
        }
    }

    /// How many SQL columns this selection item contributes. `All`
    /// must be resolved against the schema by the caller before this
    /// is meaningful; it is reported as `None` here.
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Selection::All | Selection::QualifiedAll(_))
    }
}

pub fn render_selection(selection: &Selection, ctx: &GenerationContext) -> Result<String> {
    Ok(match selection {
        Selection::All => "*".to_string(),
        Selection::QualifiedAll(alias) => match ctx.qualifier(alias) {
            Some(q) => format!("{}.*", quote_ident(&q)),
            None => "*".to_string(),
        },
        Selection::Aliased(expr, name) => {
            format!("{} AS {}", render(expr, ctx)?, quote_ident(name))
        }
        Selection::Expr(expr) => render(expr, ctx)?,
        Selection::Literal(sql) => sql.clone(),
    })
}

/// `COUNT(x)` rendering rules: `COUNT(*)` is fine, but
/// `COUNT(alias.*)` and `COUNT(<selection literal>)` must fail.
pub fn render_count_arg(selection: &Selection, ctx: &GenerationContext) -> Result<String> {
    match selection {
        Selection::All => Ok("*".to_string()),
        Selection::QualifiedAll(alias) => {
            if ctx.qualifier(alias).is_some() {
                Err(Error::unsupported(
                    "COUNT(alias.*) is not valid SQL; use COUNT(*) or a specific column",
                ))
            } else {
                Ok("*".to_string())
            }
        }
        Selection::Literal(_) => Err(Error::unsupported(
            "an opaque selection literal cannot be used as a COUNT argument",
        )),
        Selection::Aliased(expr, _) | Selection::Expr(expr) => render(expr, ctx),
    }
}
