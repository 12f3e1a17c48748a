//! Table-alias identity and disambiguation (component C).
//!
//! A [`TableAlias`] is a small union-find node: merging two aliases turns
//! one into a [`Proxy`](AliasState::Proxy) pointing at the other, and
//! identity (equality, hashing) is always computed against the root of
//! the proxy chain, with path compression on lookup.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::error::{Error, Result};

#[derive(Clone)]
pub struct TableAlias(Rc<RefCell<AliasState>>);

enum AliasState {
    Undefined {
        user_name: Option<String>,
    },
    Table {
        table_name: String,
        user_name: Option<String>,
    },
    Proxy(TableAlias),
}

impl TableAlias {
    /// An alias not yet bound to any table.
    pub fn new(user_name: Option<String>) -> Self {
        TableAlias(Rc::new(RefCell::new(AliasState::Undefined { user_name })))
    }

    /// An alias bound to a table from the outset.
    pub fn from_table(table_name: impl Into<String>, user_name: Option<String>) -> Self {
        TableAlias(Rc::new(RefCell::new(AliasState::Table {
            table_name: table_name.into(),
            user_name,
        })))
    }

    /// Follows the proxy chain to its root, compressing the path as it
    /// goes. The result is always a non-proxy alias.
    pub fn root(&self) -> TableAlias {
        let proxied = match &*self.0.borrow() {
            AliasState::Proxy(inner) => Some(inner.clone()),
            _ => None,
        };
        match proxied {
            Some(inner) => {
                let root = inner.root();
                *self.0.borrow_mut() = AliasState::Proxy(root.clone());
                root
            }
            None => self.clone(),
        }
    }

    pub fn has_user_name(&self) -> bool {
        self.user_name().is_some()
    }

    pub fn user_name(&self) -> Option<String> {
        match &*self.root().0.borrow() {
            AliasState::Undefined { user_name } | AliasState::Table { user_name, .. } => {
                user_name.clone()
            }
            AliasState::Proxy(_) => unreachable!("root is never a proxy"),
        }
    }

    pub fn table_name(&self) -> Option<String> {
        match &*self.root().0.borrow() {
            AliasState::Table { table_name, .. } => Some(table_name.clone()),
            _ => None,
        }
    }

    /// The name used to group aliases during disambiguation: the
    /// user-provided name if there is one, else the table name, else a
    /// generic placeholder for an alias that is still undefined.
    pub fn identity_name(&self) -> String {
        match self.user_name() {
            Some(name) => name,
            None => self.table_name().unwrap_or_else(|| "alias".to_string()),
        }
    }

    /// Undefined -> Table. Table: requires case-insensitive equality
    /// with the existing table name. Proxy: forwarded via `root()`.
    pub fn set_table_name(&self, table_name: &str) -> Result<()> {
        let root = self.root();
        let mut state = root.0.borrow_mut();
        match &mut *state {
            AliasState::Undefined { user_name } => {
                *state = AliasState::Table {
                    table_name: table_name.to_string(),
                    user_name: user_name.clone(),
                };
                Ok(())
            }
            AliasState::Table {
                table_name: existing,
                ..
            } => {
                if existing.eq_ignore_ascii_case(table_name) {
                    Ok(())
                } else {
                    Err(Error::invalid_input(format!(
                        "alias already refers to table \"{existing}\", cannot rebind to \"{table_name}\""
                    )))
                }
            }
            AliasState::Proxy(_) => unreachable!("root is never a proxy"),
        }
    }

    /// Makes `self`'s root a proxy for `other`'s root, propagating a
    /// user name across if needed. No-op if the two already share a
    /// root.
    pub fn become_proxy(&self, other: &TableAlias) -> Result<()> {
        let self_root = self.root();
        let other_root = other.root();
        if Rc::ptr_eq(&self_root.0, &other_root.0) {
            return Ok(());
        }

        let self_user_name = self_root.user_name();
        if let Some(name) = self_user_name {
            let mut other_state = other_root.0.borrow_mut();
            match &mut *other_state {
                AliasState::Undefined { user_name } | AliasState::Table { user_name, .. } => {
                    match user_name {
                        Some(existing) if existing != &name => {
                            return Err(Error::invalid_input(format!(
                                "cannot merge aliases with conflicting user names \"{existing}\" and \"{name}\""
                            )));
                        }
                        Some(_) => {}
                        None => *user_name = Some(name),
                    }
                }
                AliasState::Proxy(_) => unreachable!("root is never a proxy"),
            }
        }

        *self_root.0.borrow_mut() = AliasState::Proxy(other_root);
        Ok(())
    }
}

impl fmt::Debug for TableAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let root = self.root();
        match &*root.0.borrow() {
            AliasState::Undefined { user_name } => {
                f.debug_struct("Undefined").field("user_name", user_name).finish()
            }
            AliasState::Table {
                table_name,
                user_name,
            } => f
                .debug_struct("Table")
                .field("table_name", table_name)
                .field("user_name", user_name)
                .finish(),
            AliasState::Proxy(_) => unreachable!("root is never a proxy"),
        }
    }
}

impl PartialEq for TableAlias {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.root().0, &other.root().0)
    }
}

impl Eq for TableAlias {}

impl Hash for TableAlias {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Rc::as_ptr(&self.root().0) as usize).hash(state);
    }
}

/// `merge(lhs, rhs)`: `Some(common)` iff both roots are `Table` with
/// equal (case-insensitive) table names and compatible user names.
/// Performs `lhs.root().become_proxy(rhs.root())` as a side effect when
/// it succeeds; leaves both aliases unchanged when it doesn't.
pub fn merge(lhs: &TableAlias, rhs: &TableAlias) -> Option<TableAlias> {
    let lhs_root = lhs.root();
    let rhs_root = rhs.root();
    if lhs_root == rhs_root {
        return Some(lhs_root);
    }

    let lhs_table = lhs_root.table_name()?;
    let rhs_table = rhs_root.table_name()?;
    if !lhs_table.eq_ignore_ascii_case(&rhs_table) {
        return None;
    }

    if let (Some(a), Some(b)) = (lhs_root.user_name(), rhs_root.user_name()) {
        if a != b {
            return None;
        }
    }

    lhs_root.become_proxy(&rhs_root).ok()?;
    Some(rhs_root)
}

/// Strips trailing ASCII digits, e.g. `"person2"` -> `"person"`. Falls
/// back to the original string if it is made up entirely of digits.
fn digitless_radical(s: &str) -> String {
    let trimmed = s.trim_end_matches(|c: char| c.is_ascii_digit());
    if trimmed.is_empty() {
        s.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Assigns unique, disambiguated SQL names to a set of aliases with
/// unique identities. Aliases absent from the returned map keep
/// their identity name as-is.
pub fn disambiguate(aliases: &[TableAlias]) -> Result<HashMap<TableAlias, String>> {
    let unique: HashSet<TableAlias> = aliases.iter().cloned().collect();
    if unique.len() != aliases.len() {
        return Err(Error::invalid_input(
            "disambiguate requires a list of aliases with unique identities",
        ));
    }

    let mut group_order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<TableAlias>> = HashMap::new();
    for alias in aliases {
        let key = alias.identity_name().to_lowercase();
        if !groups.contains_key(&key) {
            group_order.push(key.clone());
        }
        groups.entry(key).or_default().push(alias.clone());
    }

    for key in &group_order {
        let members = &groups[key];
        if members.len() > 1 {
            let named = members.iter().filter(|a| a.has_user_name()).count();
            if named > 1 {
                return Err(Error::invalid_input(format!(
                    "ambiguous alias: more than one user-named alias refers to \"{key}\""
                )));
            }
        }
    }

    let mut reserved: HashSet<String> = group_order.iter().cloned().collect();
    let mut resolved = HashMap::new();

    for key in &group_order {
        let members = groups.remove(key).unwrap();
        if members.len() == 1 {
            continue;
        }
        for member in members {
            if member.has_user_name() {
                continue;
            }
            let radical = digitless_radical(&member.identity_name());
            let mut n = 1usize;
            loop {
                let candidate = format!("{radical}{n}");
                let candidate_key = candidate.to_lowercase();
                if !reserved.contains(&candidate_key) {
                    reserved.insert(candidate_key);
                    resolved.insert(member, candidate);
                    break;
                }
                n += 1;
            }
        }
    }

    Ok(resolved)
}
