//! Generation context (component D): a per-subquery scope holding the
//! database handle, the shared argument sink, this frame's alias
//! resolution, and its CTEs, nesting via a parent link.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::alias::{self, TableAlias};
use crate::arguments::Arguments;
use crate::database::Database;
use crate::error::Result;
use crate::relation::Cte;

struct RegisteredCte {
    cte: Rc<Cte>,
    column_count: usize,
}

#[derive(Clone)]
pub struct GenerationContext(Rc<Inner>);

struct Inner {
    db: Rc<dyn Database>,
    sink: Arguments,
    resolved_names: HashMap<TableAlias, String>,
    own_aliases: HashSet<TableAlias>,
    own_ctes: HashMap<String, RegisteredCte>,
    parent: Option<GenerationContext>,
}

impl GenerationContext {
    /// The outermost context for a render pass: no aliases, no CTEs,
    /// no parent.
    pub fn root(db: Rc<dyn Database>, sink: Arguments) -> Self {
        GenerationContext(Rc::new(Inner {
            db,
            sink,
            resolved_names: HashMap::new(),
            own_aliases: HashSet::new(),
            own_ctes: HashMap::new(),
            parent: None,
        }))
    }

    pub fn db(&self) -> &Rc<dyn Database> {
        &self.0.db
    }

    pub fn sink(&self) -> &Arguments {
        &self.0.sink
    }

    /// Builds a child frame for a nested (sub)query: disambiguates
    /// `aliases` into this frame's resolved names, registers `ctes`,
    /// and shares this context's sink.
    pub fn subquery_context(
        &self,
        aliases: &[TableAlias],
        ctes: Vec<(Rc<Cte>, usize)>,
    ) -> Result<GenerationContext> {
        let resolved_names = alias::disambiguate(aliases)?;
        let own_aliases = aliases.iter().cloned().collect();
        let own_ctes = ctes
            .into_iter()
            .map(|(cte, column_count)| {
                (
                    cte.name.to_lowercase(),
                    RegisteredCte { cte, column_count },
                )
            })
            .collect();

        Ok(GenerationContext(Rc::new(Inner {
            db: self.0.db.clone(),
            sink: self.0.sink.clone(),
            resolved_names,
            own_aliases,
            own_ctes,
            parent: Some(self.clone()),
        })))
    }

    /// The SQL qualifier for `alias`. `None` means the column
    /// should render unqualified.
    pub fn qualifier(&self, alias: &TableAlias) -> Option<String> {
        if alias.has_user_name() {
            return Some(alias.identity_name());
        }
        if !self.0.own_aliases.contains(alias) {
            return Some(self.resolved_name(alias));
        }
        if self.0.own_aliases.len() == 1 {
            return None;
        }
        Some(self.resolved_name(alias))
    }

    /// This frame's resolved name for `alias`, walking up the parent
    /// chain, falling back to the alias's identity name.
    pub fn resolved_name(&self, alias: &TableAlias) -> String {
        if let Some(name) = self.0.resolved_names.get(alias) {
            return name.clone();
        }
        if let Some(parent) = &self.0.parent {
            return parent.resolved_name(alias);
        }
        alias.identity_name()
    }

    /// The alias to print after `FROM tbl`, or `None` when the
    /// resolved name already matches the table name (`FROM t` rather
    /// than `FROM t t`).
    pub fn alias_name(&self, alias: &TableAlias) -> Option<String> {
        let resolved = self.resolved_name(alias);
        match alias.table_name() {
            Some(table_name) if resolved.eq_ignore_ascii_case(&table_name) => None,
            _ => Some(resolved),
        }
    }

    /// The number of columns a source with this name would yield:
    /// checked against this frame's CTEs first, then parent frames,
    /// finally the live schema.
    pub fn column_count(&self, table_name: &str) -> Result<usize> {
        let key = table_name.to_lowercase();
        if let Some(registered) = self.0.own_ctes.get(&key) {
            return Ok(registered.column_count);
        }
        if let Some(parent) = &self.0.parent {
            return parent.column_count(table_name);
        }
        Ok(self.0.db.columns(table_name)?.len())
    }

    /// Looks up a registered CTE's relation by name, walking up the
    /// parent chain.
    pub fn lookup_cte(&self, name: &str) -> Option<Rc<Cte>> {
        let key = name.to_lowercase();
        if let Some(registered) = self.0.own_ctes.get(&key) {
            return Some(registered.cte.clone());
        }
        self.0.parent.as_ref().and_then(|p| p.lookup_cte(name))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::database::{ColumnInfo, IndexInfo, PrimaryKeyInfo};
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
                column_infos: vec![ColumnInfo {
                    name: "id".to_string(),
                    affinity: ColumnType::Integer,
                    is_not_null: true,
                }],
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

    #[test]
    fn qualifier_omitted_for_sole_alias() {
        let ctx = GenerationContext::root(Rc::new(FakeDb), Arguments::bindable());
        let alias = TableAlias::from_table("player", None);
        let ctx = ctx.subquery_context(&[alias.clone()], Vec::new()).unwrap();
        assert_eq!(ctx.qualifier(&alias), None);
    }

    #[test]
    fn qualifier_present_when_multiple_aliases() {
        let ctx = GenerationContext::root(Rc::new(FakeDb), Arguments::bindable());
        let a = TableAlias::from_table("person", None);
        let b = TableAlias::from_table("team", None);
        let ctx = ctx
            .subquery_context(&[a.clone(), b.clone()], Vec::new())
            .unwrap();
        assert_eq!(ctx.qualifier(&a).as_deref(), Some("person"));
        assert_eq!(ctx.qualifier(&b).as_deref(), Some("team"));
    }

    #[test]
    fn qualifier_uses_user_name_regardless_of_frame() {
        let ctx = GenerationContext::root(Rc::new(FakeDb), Arguments::bindable());
        let author = TableAlias::from_table("person", Some("author".to_string()));
        let ctx = ctx.subquery_context(&[author.clone()], Vec::new()).unwrap();
        assert_eq!(ctx.qualifier(&author).as_deref(), Some("author"));
    }
}
