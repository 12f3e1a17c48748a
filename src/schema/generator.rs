//! Schema SQL synthesis (component I): compiles the declarative model
//! in [`super::definitions`] into `CREATE`/`ALTER`/`DROP` statements.
//! All of it renders in raw-literal mode: DDL carries no bound
//! parameters, so `DEFAULT` values are inlined via
//! [`crate::ident::render_literal`].

use itertools::Itertools;

use crate::database::Database;
use crate::error::{Error, Result};
use crate::ident::{quote_ident, render_literal};

use super::definitions::{
    ColumnDefault, ColumnDefinition, ConflictClause, ForeignKeyDefinition, IndexDefinition,
    TableAlteration, TableDefinition, ViewDefinition, VirtualTableDefinition,
};

fn conflict_suffix(clause: &Option<crate::schema::ConflictResolution>) -> String {
    match clause {
        Some(r) => format!(" ON CONFLICT {}", r.to_sql()),
        None => String::new(),
    }
}

fn render_column(col: &ColumnDefinition) -> Result<String> {
    let mut sql = quote_ident(&col.name);
    if let Some(ty) = col.column_type {
        sql.push(' ');
        sql.push_str(ty.to_sql());
    }
    if let Some(pk) = &col.primary_key {
        sql.push_str(" PRIMARY KEY");
        sql.push_str(&conflict_suffix(&pk.conflict));
        if pk.autoincrement {
            sql.push_str(" AUTOINCREMENT");
        }
    }
    if let Some(ConflictClause { conflict }) = &col.not_null {
        sql.push_str(" NOT NULL");
        sql.push_str(&conflict_suffix(conflict));
    }
    if let Some(ConflictClause { conflict }) = &col.unique {
        sql.push_str(" UNIQUE");
        sql.push_str(&conflict_suffix(conflict));
    }
    for check in &col.checks {
        sql.push_str(&format!(" CHECK ({check})"));
    }
    if let Some(default) = &col.default {
        let rendered = match default {
            ColumnDefault::Value(v) => render_literal(v)?,
            ColumnDefault::Expr(e) => format!("({e})"),
        };
        sql.push_str(&format!(" DEFAULT {rendered}"));
    }
    if let Some(collation) = &col.collation {
        sql.push_str(&format!(" COLLATE {}", quote_ident(collation)));
    }
    if let Some(generated) = &col.generated {
        let storage = match generated.storage {
            super::definitions::GeneratedStorage::Stored => "STORED",
            super::definitions::GeneratedStorage::Virtual => "VIRTUAL",
        };
        sql.push_str(&format!(" GENERATED ALWAYS AS ({}) {storage}", generated.expr));
    }
    for fk in &col.foreign_keys {
        sql.push_str(&format!(" REFERENCES {}", quote_ident(&fk.table)));
        if let Some(column) = &fk.column {
            sql.push_str(&format!("({})", quote_ident(column)));
        }
        if let Some(action) = fk.on_delete {
            sql.push_str(&format!(" ON DELETE {}", action.to_sql()));
        }
        if let Some(action) = fk.on_update {
            sql.push_str(&format!(" ON UPDATE {}", action.to_sql()));
        }
        if fk.deferred {
            sql.push_str(" DEFERRABLE INITIALLY DEFERRED");
        }
    }
    Ok(sql)
}

/// The local column(s) a `belongsTo`-style [`ForeignKeyDefinition`]
/// expands to, along with the destination columns they reference.
struct ResolvedForeignKey {
    local_columns: Vec<ColumnDefinition>,
    destination_columns: Vec<String>,
}

fn uppercase_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// The columns that make up `table`'s own declared primary key: the
/// table-level composite constraint if there is one, else whichever
/// column(s) carry an inline `PRIMARY KEY`.
fn forward_primary_key_columns(table: &TableDefinition) -> Vec<String> {
    if let Some(pk) = &table.primary_key {
        return pk.columns.clone();
    }
    table
        .columns
        .iter()
        .filter(|c| c.primary_key.is_some())
        .map(|c| c.name.clone())
        .collect()
}

fn resolve_foreign_key(
    fk: &ForeignKeyDefinition,
    table: &TableDefinition,
    db: &dyn Database,
) -> Result<ResolvedForeignKey> {
    let destination_table = fk.destination_table_name();
    let self_referential = destination_table.eq_ignore_ascii_case(&table.name);

    // A self-reference points at the table being created, which has no
    // persisted schema yet: derive its primary key from this very
    // definition (the "forward" primary key) instead of asking `db`.
    let (destination_columns, affinity_of): (Vec<String>, Box<dyn Fn(&str) -> Option<crate::schema::ColumnType>>) =
        if self_referential {
            let columns = fk
                .destination_columns
                .clone()
                .unwrap_or_else(|| forward_primary_key_columns(table));
            let table_columns = table.columns.clone();
            let lookup = move |name: &str| {
                table_columns
                    .iter()
                    .find(|c| c.name.eq_ignore_ascii_case(name))
                    .and_then(|c| c.column_type)
            };
            (columns, Box::new(lookup))
        } else {
            let pk = db.primary_key(destination_table)?;
            let columns = fk.destination_columns.clone().unwrap_or(pk.columns);
            let dest_types = db.columns(destination_table)?;
            let lookup = move |name: &str| {
                dest_types
                    .iter()
                    .find(|c| c.name.eq_ignore_ascii_case(name))
                    .map(|c| c.affinity)
            };
            (columns, Box::new(lookup))
        };

    if destination_columns.is_empty() {
        return Err(Error::schema(format!(
            "table \"{destination_table}\" has no primary key to derive a foreign key from"
        )));
    }

    let local_columns = destination_columns
        .iter()
        .map(|dest_col| {
            let affinity = affinity_of(dest_col);
            let local_name = if destination_columns.len() == 1 {
                format!("{}Id", fk.name)
            } else {
                format!("{}{}", fk.name, uppercase_first(dest_col))
            };
            ColumnDefinition {
                column_type: affinity,
                not_null: Some(ConflictClause::default()),
                ..ColumnDefinition::new(local_name)
            }
        })
        .collect();

    Ok(ResolvedForeignKey {
        local_columns,
        destination_columns,
    })
}

fn render_foreign_key_constraint(
    fk: &ForeignKeyDefinition,
    resolved: &ResolvedForeignKey,
) -> String {
    let local = resolved
        .local_columns
        .iter()
        .map(|c| quote_ident(&c.name))
        .join(", ");
    let destination = resolved
        .destination_columns
        .iter()
        .map(|c| quote_ident(c))
        .join(", ");
    let mut sql = format!(
        "FOREIGN KEY ({local}) REFERENCES {}({destination})",
        quote_ident(fk.destination_table_name())
    );
    if let Some(action) = fk.on_delete {
        sql.push_str(&format!(" ON DELETE {}", action.to_sql()));
    }
    if let Some(action) = fk.on_update {
        sql.push_str(&format!(" ON UPDATE {}", action.to_sql()));
    }
    if fk.deferred {
        sql.push_str(" DEFERRABLE INITIALLY DEFERRED");
    }
    sql
}

fn auto_index_name(table: &str, columns: &[String]) -> String {
    format!("{table}_on_{}", columns.iter().join("_"))
}

/// `belongsTo`'s auto-index carries an `index_` prefix distinguishing
/// it from a plain column's `indexed()` auto-index name.
fn belongs_to_auto_index_name(table: &str, columns: &[String]) -> String {
    format!("index_{}", auto_index_name(table, columns))
}

/// `CREATE TABLE`, expanding `belongsTo`-style foreign keys into
/// synthesized columns and a table-level `FOREIGN KEY` constraint, and
/// collecting any auto-index requests (from `indexed()` columns or
/// `ForeignKeyDefinition::indexed`) the caller should also emit.
pub fn create_table_sql(table: &TableDefinition, db: &dyn Database) -> Result<(String, Vec<IndexDefinition>)> {
    log::debug!(
        "generating CREATE TABLE for \"{}\" ({} column(s), {} foreign key(s))",
        table.name,
        table.columns.len(),
        table.foreign_keys.len()
    );
    let mut lines = Vec::new();
    let mut auto_indexes = Vec::new();

    for col in &table.columns {
        lines.push(render_column(col)?);
        if let Some(unique) = col.indexed {
            let mut index = IndexDefinition::new(&table.name, vec![col.name.clone()]);
            index.unique = unique;
            index.name = Some(auto_index_name(&table.name, &index.columns));
            auto_indexes.push(index);
        }
    }

    for fk in &table.foreign_keys {
        let resolved = resolve_foreign_key(fk, table, db)?;
        for col in &resolved.local_columns {
            lines.push(render_column(col)?);
        }
        lines.push(render_foreign_key_constraint(fk, &resolved));
        if let Some(unique) = fk.indexed {
            let columns: Vec<String> = resolved.local_columns.iter().map(|c| c.name.clone()).collect();
            let mut index = IndexDefinition::new(&table.name, columns.clone());
            index.unique = unique;
            index.name = Some(belongs_to_auto_index_name(&table.name, &columns));
            auto_indexes.push(index);
        }
    }

    if let Some(pk) = &table.primary_key {
        lines.push(format!(
            "PRIMARY KEY ({}){}",
            pk.columns.iter().map(|c| quote_ident(c)).join(", "),
            conflict_suffix(&pk.conflict)
        ));
    }
    for unique in &table.uniques {
        lines.push(format!(
            "UNIQUE ({}){}",
            unique.columns.iter().map(|c| quote_ident(c)).join(", "),
            conflict_suffix(&unique.conflict)
        ));
    }
    for check in &table.checks {
        lines.push(format!("CHECK ({check})"));
    }
    lines.extend(table.literals.iter().cloned());

    if lines.is_empty() {
        return Err(Error::invalid_input(format!(
            "table \"{}\" has no columns", table.name
        )));
    }

    let mut sql = "CREATE ".to_string();
    if table.temporary {
        sql.push_str("TEMPORARY ");
    }
    sql.push_str("TABLE ");
    if table.if_not_exists {
        sql.push_str("IF NOT EXISTS ");
    }
    sql.push_str(&quote_ident(&table.name));
    sql.push_str(" (\n  ");
    sql.push_str(&lines.join(",\n  "));
    sql.push_str("\n)");
    if table.without_rowid {
        sql.push_str(" WITHOUT ROWID");
    }
    if table.strict {
        sql.push_str(" STRICT");
    }

    Ok((sql, auto_indexes))
}

pub fn create_index_sql(index: &IndexDefinition) -> String {
    let mut sql = "CREATE ".to_string();
    if index.unique {
        sql.push_str("UNIQUE ");
    }
    sql.push_str("INDEX ");
    if index.if_not_exists {
        sql.push_str("IF NOT EXISTS ");
    }
    let name = index
        .name
        .clone()
        .unwrap_or_else(|| auto_index_name(&index.table, &index.columns));
    sql.push_str(&quote_ident(&name));
    sql.push_str(" ON ");
    sql.push_str(&quote_ident(&index.table));
    sql.push_str(&format!(
        " ({})",
        index.columns.iter().map(|c| quote_ident(c)).join(", ")
    ));
    if let Some(condition) = &index.condition {
        sql.push_str(&format!(" WHERE {condition}"));
    }
    sql
}

pub fn drop_index_sql(name: &str) -> String {
    format!("DROP INDEX {}", quote_ident(name))
}

/// `ALTER TABLE`, plus the `CREATE INDEX` for an added column that
/// carries `indexed()` (mirroring `create_table_sql`'s auto-index
/// collection for the initial `CREATE TABLE`).
pub fn alter_table_sql(
    table_name: &str,
    alteration: &TableAlteration,
) -> Result<(String, Option<IndexDefinition>)> {
    let table = quote_ident(table_name);
    let sql = match alteration {
        TableAlteration::Add(column) => {
            format!("ALTER TABLE {table} ADD COLUMN {}", render_column(column)?)
        }
        TableAlteration::AddLiteral(literal) => {
            format!("ALTER TABLE {table} ADD COLUMN {literal}")
        }
        TableAlteration::Rename { from, to } => format!(
            "ALTER TABLE {table} RENAME COLUMN {} TO {}",
            quote_ident(from),
            quote_ident(to)
        ),
        TableAlteration::Drop(column) => format!("ALTER TABLE {table} DROP COLUMN {}", quote_ident(column)),
    };

    let auto_index = match alteration {
        TableAlteration::Add(column) => column.indexed.map(|unique| {
            let mut index = IndexDefinition::new(table_name, vec![column.name.clone()]);
            index.unique = unique;
            index.name = Some(auto_index_name(table_name, &index.columns));
            index
        }),
        _ => None,
    };

    Ok((sql, auto_index))
}

/// Composes several alterations to the same table into one `;`-joined
/// statement, collecting every added column's auto-index along the
/// way, in the same order as `alterations`.
pub fn alter_table_sql_many(
    table_name: &str,
    alterations: &[TableAlteration],
) -> Result<(String, Vec<IndexDefinition>)> {
    let mut statements = Vec::with_capacity(alterations.len());
    let mut auto_indexes = Vec::new();
    for alteration in alterations {
        let (sql, auto_index) = alter_table_sql(table_name, alteration)?;
        statements.push(sql);
        if let Some(index) = auto_index {
            auto_indexes.push(index);
        }
    }
    Ok((statements.join("; "), auto_indexes))
}

/// `select_sql` is the already-rendered body (produced by the query
/// renderer with a raw-mode sink, since a view's definition cannot
/// carry bound parameters).
pub fn create_view_sql(view: &ViewDefinition, select_sql: &str) -> String {
    let mut sql = "CREATE ".to_string();
    if view.temporary {
        sql.push_str("TEMPORARY ");
    }
    sql.push_str("VIEW ");
    if view.if_not_exists {
        sql.push_str("IF NOT EXISTS ");
    }
    sql.push_str(&quote_ident(&view.name));
    if let Some(columns) = &view.columns {
        sql.push_str(&format!(
            " ({})",
            columns.iter().map(|c| quote_ident(c)).join(", ")
        ));
    }
    sql.push_str(" AS ");
    sql.push_str(select_sql);
    sql
}

/// When `vt.post_step` is set, the statement is wrapped in its own
/// savepoint so the virtual table and its companion step commit or
/// roll back together.
pub fn create_virtual_table_sql(vt: &VirtualTableDefinition) -> String {
    let mut sql = "CREATE VIRTUAL TABLE ".to_string();
    if vt.if_not_exists {
        sql.push_str("IF NOT EXISTS ");
    }
    match &vt.schema_name {
        Some(schema) => sql.push_str(&format!("{}.{}", quote_ident(schema), quote_ident(&vt.name))),
        None => sql.push_str(&quote_ident(&vt.name)),
    }
    sql.push_str(&format!(" USING {}", vt.module));
    if !vt.arguments.is_empty() {
        sql.push_str(&format!("({})", vt.arguments.join(", ")));
    }

    match &vt.post_step {
        None => sql,
        Some(post_step) => {
            let savepoint = quote_ident(&format!("vt_{}", vt.name));
            format!("SAVEPOINT {savepoint}; {sql}; {post_step}; RELEASE {savepoint}")
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::database::{ColumnInfo, IndexInfo, PrimaryKeyInfo};
    use crate::schema::{ColumnForeignKey, ColumnPrimaryKey, ColumnType, PrimaryKeyConstraint};

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

    struct CompositePkDb;
    impl Database for CompositePkDb {
        fn table_exists(&self, _name: &str) -> bool {
            true
        }
        fn canonical_table_name(&self, name: &str) -> Result<String> {
            Ok(name.to_string())
        }
        fn primary_key(&self, _table: &str) -> Result<PrimaryKeyInfo> {
            Ok(PrimaryKeyInfo {
                columns: vec!["courseId".to_string(), "studentId".to_string()],
                column_infos: vec![],
                is_rowid: false,
                rowid_column: None,
            })
        }
        fn columns(&self, _table: &str) -> Result<Vec<ColumnInfo>> {
            Ok(vec![
                ColumnInfo {
                    name: "courseId".to_string(),
                    affinity: ColumnType::Integer,
                    is_not_null: true,
                },
                ColumnInfo {
                    name: "studentId".to_string(),
                    affinity: ColumnType::Integer,
                    is_not_null: true,
                },
            ])
        }
        fn has_unique_key(&self, _table: &str, _columns: &[String]) -> Result<bool> {
            Ok(false)
        }
        fn indexes(&self, _table: &str) -> Result<Vec<IndexInfo>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn composite_destination_pk_synthesizes_camel_case_columns() {
        let mut table = TableDefinition::new("enrollment");
        table.columns.push(ColumnDefinition::new("grade"));
        table.foreign_keys.push(ForeignKeyDefinition::new("course_student"));
        let (sql, _) = create_table_sql(&table, &CompositePkDb).unwrap();
        assert!(sql.contains("\"course_studentCourseId\" INTEGER NOT NULL"));
        assert!(sql.contains("\"course_studentStudentId\" INTEGER NOT NULL"));
        assert!(sql.contains(
            "FOREIGN KEY (\"course_studentCourseId\", \"course_studentStudentId\") \
             REFERENCES \"course_student\"(\"courseId\", \"studentId\")"
        ));
    }

    /// A `Database` that panics on `primary_key`/`columns`, to prove a
    /// self-referential foreign key never queries it: the destination
    /// table is the one currently being built, so it has no persisted
    /// schema a live lookup could answer.
    struct PanicDb;
    impl Database for PanicDb {
        fn table_exists(&self, _name: &str) -> bool {
            true
        }
        fn canonical_table_name(&self, name: &str) -> Result<String> {
            Ok(name.to_string())
        }
        fn primary_key(&self, table: &str) -> Result<PrimaryKeyInfo> {
            panic!("unexpected live schema lookup for self-referential table \"{table}\"")
        }
        fn columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
            panic!("unexpected live schema lookup for self-referential table \"{table}\"")
        }
        fn has_unique_key(&self, _table: &str, _columns: &[String]) -> Result<bool> {
            Ok(false)
        }
        fn indexes(&self, _table: &str) -> Result<Vec<IndexInfo>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn self_referential_foreign_key_resolves_its_own_forward_primary_key() {
        let mut table = TableDefinition::new("employee");
        let mut id = ColumnDefinition::new("id");
        id.column_type = Some(ColumnType::Integer);
        id.primary_key = Some(ColumnPrimaryKey::default());
        table.columns.push(id);
        table.columns.push(ColumnDefinition::new("name"));
        let mut manager_fk = ForeignKeyDefinition::new("manager");
        manager_fk.destination_table = Some("employee".to_string());
        table.foreign_keys.push(manager_fk);

        let (sql, _) = create_table_sql(&table, &PanicDb).unwrap();
        assert!(sql.contains("\"managerId\" INTEGER NOT NULL"));
        assert!(sql.contains("FOREIGN KEY (\"managerId\") REFERENCES \"employee\"(\"id\")"));
    }

    #[test]
    fn self_referential_foreign_key_with_composite_forward_primary_key() {
        let mut table = TableDefinition::new("category");
        table.primary_key = Some(PrimaryKeyConstraint {
            columns: vec!["tenantId".to_string(), "id".to_string()],
            conflict: None,
        });
        table.columns.push(ColumnDefinition::new("tenantId"));
        table.columns.push(ColumnDefinition::new("id"));
        let mut parent_fk = ForeignKeyDefinition::new("parent");
        parent_fk.destination_table = Some("category".to_string());
        table.foreign_keys.push(parent_fk);

        let (sql, _) = create_table_sql(&table, &PanicDb).unwrap();
        assert!(sql.contains("\"parentTenantId\""));
        assert!(sql.contains("\"parentId\""));
        assert!(sql.contains(
            "FOREIGN KEY (\"parentTenantId\", \"parentId\") REFERENCES \"category\"(\"tenantId\", \"id\")"
        ));
    }

    #[test]
    fn renders_a_simple_table() {
        let mut table = TableDefinition::new("book");
        let mut id = ColumnDefinition::new("id");
        id.column_type = Some(ColumnType::Integer);
        id.primary_key = Some(ColumnPrimaryKey::default());
        table.columns.push(id);
        let (sql, indexes) = create_table_sql(&table, &FakeDb).unwrap();
        assert_eq!(sql, "CREATE TABLE \"book\" (\n  \"id\" INTEGER PRIMARY KEY\n)");
        assert!(indexes.is_empty());
    }

    #[test]
    fn expands_belongs_to_into_a_column_and_constraint() {
        let mut table = TableDefinition::new("book");
        table.columns.push(ColumnDefinition::new("title"));
        table.foreign_keys.push(ForeignKeyDefinition::new("author"));
        let (sql, _) = create_table_sql(&table, &FakeDb).unwrap();
        assert!(sql.contains("\"authorId\" INTEGER NOT NULL"));
        assert!(sql.contains("FOREIGN KEY (\"authorId\") REFERENCES \"author\"(\"id\")"));
    }

    #[test]
    fn belongs_to_auto_index_name_carries_the_index_prefix() {
        let mut table = TableDefinition::new("book");
        table.columns.push(ColumnDefinition::new("title"));
        let mut fk = ForeignKeyDefinition::new("author");
        fk.indexed = Some(false);
        table.foreign_keys.push(fk);
        let (_, indexes) = create_table_sql(&table, &FakeDb).unwrap();
        assert_eq!(indexes.len(), 1);
        assert_eq!(indexes[0].name.as_deref(), Some("index_book_on_authorId"));
    }

    #[test]
    fn column_indexed_auto_index_name_has_no_index_prefix() {
        let mut table = TableDefinition::new("book");
        let mut title = ColumnDefinition::new("title");
        title.indexed = Some(false);
        table.columns.push(title);
        let (_, indexes) = create_table_sql(&table, &FakeDb).unwrap();
        assert_eq!(indexes.len(), 1);
        assert_eq!(indexes[0].name.as_deref(), Some("book_on_title"));
    }

    #[test]
    fn column_foreign_key_renders_inline_references() {
        let mut column = ColumnDefinition::new("authorId");
        column.foreign_keys.push(ColumnForeignKey {
            table: "person".to_string(),
            column: Some("id".to_string()),
            on_delete: Some(crate::schema::ForeignKeyAction::Cascade),
            on_update: None,
            deferred: false,
        });
        let sql = render_column(&column).unwrap();
        assert_eq!(sql, "\"authorId\" REFERENCES \"person\"(\"id\") ON DELETE CASCADE");
    }

    #[test]
    fn create_index_uses_explicit_or_derived_name() {
        let index = IndexDefinition::new("book", vec!["authorId".to_string()]);
        assert_eq!(
            create_index_sql(&index),
            "CREATE INDEX \"book_on_authorId\" ON \"book\" (\"authorId\")"
        );
    }

    #[test]
    fn adding_an_indexed_column_also_yields_its_create_index() {
        let mut column = ColumnDefinition::new("email");
        column.indexed = Some(true);
        let (sql, index) = alter_table_sql("person", &TableAlteration::Add(column)).unwrap();
        assert_eq!(sql, "ALTER TABLE \"person\" ADD COLUMN \"email\"");
        let index = index.expect("indexed() column should yield an auto-index");
        assert!(index.unique);
        assert_eq!(
            create_index_sql(&index),
            "CREATE INDEX \"person_on_email\" ON \"person\" (\"email\")"
        );
    }

    #[test]
    fn adding_a_plain_column_yields_no_index() {
        let column = ColumnDefinition::new("nickname");
        let (_, index) = alter_table_sql("person", &TableAlteration::Add(column)).unwrap();
        assert!(index.is_none());
    }

    #[test]
    fn alter_table_sql_many_joins_alterations_and_collects_every_auto_index() {
        let mut email = ColumnDefinition::new("email");
        email.indexed = Some(false);
        let alterations = vec![
            TableAlteration::Add(email),
            TableAlteration::Rename {
                from: "nick".to_string(),
                to: "nickname".to_string(),
            },
            TableAlteration::Drop("legacy_id".to_string()),
        ];
        let (sql, auto_indexes) = alter_table_sql_many("person", &alterations).unwrap();
        assert_eq!(
            sql,
            concat!(
                "ALTER TABLE \"person\" ADD COLUMN \"email\"; ",
                "ALTER TABLE \"person\" RENAME COLUMN \"nick\" TO \"nickname\"; ",
                "ALTER TABLE \"person\" DROP COLUMN \"legacy_id\""
            )
        );
        assert_eq!(auto_indexes.len(), 1);
        assert_eq!(
            create_index_sql(&auto_indexes[0]),
            "CREATE INDEX \"person_on_email\" ON \"person\" (\"email\")"
        );
    }

    #[test]
    fn create_virtual_table_sql_renders_module_and_arguments() {
        let vt = VirtualTableDefinition {
            name: "book_fts".to_string(),
            if_not_exists: true,
            schema_name: None,
            module: "fts5".to_string(),
            arguments: vec!["title".to_string(), "content='book'".to_string()],
            post_step: None,
        };
        assert_eq!(
            create_virtual_table_sql(&vt),
            "CREATE VIRTUAL TABLE IF NOT EXISTS \"book_fts\" USING fts5(title, content='book')"
        );
    }

    #[test]
    fn create_virtual_table_sql_wraps_its_post_step_in_a_savepoint() {
        let vt = VirtualTableDefinition {
            name: "book_fts".to_string(),
            if_not_exists: false,
            schema_name: None,
            module: "fts5".to_string(),
            arguments: vec!["title".to_string()],
            post_step: Some(
                "INSERT INTO \"book_fts\"(\"book_fts\") VALUES ('rebuild')".to_string(),
            ),
        };
        assert_eq!(
            create_virtual_table_sql(&vt),
            concat!(
                "SAVEPOINT \"vt_book_fts\"; ",
                "CREATE VIRTUAL TABLE \"book_fts\" USING fts5(title); ",
                "INSERT INTO \"book_fts\"(\"book_fts\") VALUES ('rebuild'); ",
                "RELEASE \"vt_book_fts\""
            )
        );
    }
}
