//! End-to-end scenarios exercising the relation/schema renderers
//! together, the way a caller actually uses the crate: build a
//! `Relation` or `TableDefinition`, hand it a `Database`, and check
//! the rendered SQL and bound arguments.

use std::rc::Rc;

use sqlitegen::database::{ColumnInfo, Database, IndexInfo, PrimaryKeyInfo};
use sqlitegen::error::Result;
use sqlitegen::expr::{Expr, Selection};
use sqlitegen::ident::Value;
use sqlitegen::relation::{AssociationKind, ChildRelation, Cte, PivotKey, Relation};
use sqlitegen::schema::{
    self, ColumnDefinition, ColumnPrimaryKey, ColumnType, ForeignKeyDefinition, TableDefinition,
    UniqueConstraint,
};

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
        Ok(vec![
            ColumnInfo {
                name: "id".to_string(),
                affinity: ColumnType::Integer,
                is_not_null: true,
            },
            ColumnInfo {
                name: "name".to_string(),
                affinity: ColumnType::Text,
                is_not_null: false,
            },
        ])
    }

    fn has_unique_key(&self, _table: &str, columns: &[String]) -> Result<bool> {
        Ok(columns == ["id".to_string()])
    }

    fn indexes(&self, _table: &str) -> Result<Vec<IndexInfo>> {
        Ok(Vec::new())
    }
}

#[test]
fn filtered_select_binds_its_literal() {
    let relation = Relation::from_table("user").filtered(Expr::eq(
        Expr::BareColumn("id".into()),
        Expr::Literal(Value::Integer(5)),
    ));
    let plan = sqlitegen::render_select(&relation, Rc::new(FakeDb)).unwrap();
    assert_eq!(plan.sql, r#"SELECT * FROM "user" WHERE "id" = ?"#);
    assert_eq!(plan.arguments, vec![Value::Integer(5)]);
}

#[test]
fn two_associations_to_the_same_table_are_disambiguated() {
    let author_join = ChildRelation {
        association: "author".to_string(),
        kind: AssociationKind::OneRequired,
        pivot: PivotKey {
            parent_columns: vec!["authorId".to_string()],
            child_columns: vec!["id".to_string()],
        },
        relation: Relation::from_table("person"),
    };
    let translator_join = ChildRelation {
        association: "translator".to_string(),
        kind: AssociationKind::OneOptional,
        pivot: PivotKey {
            parent_columns: vec!["translatorId".to_string()],
            child_columns: vec!["id".to_string()],
        },
        relation: Relation::from_table("person"),
    };
    let relation = Relation::from_table("book")
        .joining(author_join)
        .joining(translator_join);

    let plan = sqlitegen::render_select(&relation, Rc::new(FakeDb)).unwrap();
    assert_eq!(
        plan.sql,
        concat!(
            r#"SELECT "book".*, "person1".*, "person2".* FROM "book" "#,
            r#"JOIN "person" "person1" ON "person1"."id" = "book"."authorId" "#,
            r#"LEFT JOIN "person" "person2" ON "person2"."id" = "book"."translatorId""#
        )
    );
    assert!(plan.arguments.is_empty());
}

#[test]
fn disambiguated_self_join_concatenates_selection_across_joins() {
    let author_join = ChildRelation {
        association: "author".to_string(),
        kind: AssociationKind::OneOptional,
        pivot: PivotKey {
            parent_columns: vec!["authorId".to_string()],
            child_columns: vec!["id".to_string()],
        },
        relation: Relation::from_table("person"),
    };
    let translator_join = ChildRelation {
        association: "translator".to_string(),
        kind: AssociationKind::OneOptional,
        pivot: PivotKey {
            parent_columns: vec!["translatorId".to_string()],
            child_columns: vec!["id".to_string()],
        },
        relation: Relation::from_table("person"),
    };
    let award_join = ChildRelation {
        association: "awards".to_string(),
        kind: AssociationKind::OneOptional,
        pivot: PivotKey {
            parent_columns: vec!["id".to_string()],
            child_columns: vec!["bookId".to_string()],
        },
        relation: Relation::from_table("award").selecting(vec![Selection::Expr(Box::new(
            Expr::CountDistinct(Box::new(Expr::BareColumn("id".to_string()))),
        ))]),
    };
    let relation = Relation::from_table("book")
        .joining(author_join)
        .joining(translator_join)
        .joining(award_join)
        .filtered(Expr::eq(
            Expr::BareColumn("kind".into()),
            Expr::Literal(Value::Text("novel".into())),
        ));

    let plan = sqlitegen::render_select(&relation, Rc::new(FakeDb)).unwrap();
    assert_eq!(
        plan.sql,
        concat!(
            r#"SELECT "book".*, "person1".*, "person2".*, COUNT(DISTINCT "award"."id") FROM "book" "#,
            r#"LEFT JOIN "person" "person1" ON "person1"."id" = "book"."authorId" "#,
            r#"LEFT JOIN "person" "person2" ON "person2"."id" = "book"."translatorId" "#,
            r#"LEFT JOIN "award" ON "award"."bookId" = "book"."id" "#,
            r#"WHERE "book"."kind" = ?"#
        )
    );
    assert_eq!(plan.arguments, vec![Value::Text("novel".into())]);
}

#[test]
fn deleting_through_a_join_rewrites_to_a_primary_key_subquery() {
    let author_join = ChildRelation {
        association: "author".to_string(),
        kind: AssociationKind::OneRequired,
        pivot: PivotKey {
            parent_columns: vec!["authorId".to_string()],
            child_columns: vec!["id".to_string()],
        },
        relation: Relation::from_table("person"),
    };
    let relation = Relation::from_table("book").joining(author_join).filtered(Expr::eq(
        Expr::BareColumn("title".into()),
        Expr::Literal(Value::Text("Dune".into())),
    ));

    let plan = sqlitegen::render_delete(&relation, Rc::new(FakeDb)).unwrap();
    assert_eq!(
        plan.sql,
        concat!(
            r#"DELETE FROM "book" WHERE "id" IN ("#,
            r#"SELECT "book"."id" FROM "book" JOIN "person" ON "person"."id" = "book"."authorId" "#,
            r#"WHERE "book"."title" = ?)"#
        )
    );
    assert_eq!(plan.arguments, vec![Value::Text("Dune".into())]);
}

#[test]
fn a_cte_can_be_selected_from_by_name() {
    let cte = Rc::new(Cte {
        name: "recent_books".to_string(),
        columns: None,
        relation: Relation::from_table("book").filtered(Expr::eq(
            Expr::BareColumn("year".into()),
            Expr::Literal(Value::Integer(2020)),
        )),
        recursive: false,
    });
    let mut relation = Relation::from_table("recent_books");
    relation.ctes = vec![cte];

    let plan = sqlitegen::render_select(&relation, Rc::new(FakeDb)).unwrap();
    assert_eq!(
        plan.sql,
        concat!(
            r#"WITH "recent_books" AS (SELECT * FROM "book" WHERE "year" = ?) "#,
            r#"SELECT * FROM "recent_books""#
        )
    );
    assert_eq!(plan.arguments, vec![Value::Integer(2020)]);
}

#[test]
fn in_subquery_shares_the_outer_arguments_sink() {
    let subquery = Relation::from_table("review")
        .selecting(vec![Selection::Expr(Box::new(Expr::BareColumn("bookId".into())))])
        .filtered(Expr::eq(
            Expr::BareColumn("rating".into()),
            Expr::Literal(Value::Integer(5)),
        ));
    let relation = Relation::from_table("book").filtered(Expr::InSubquery {
        expr: Box::new(Expr::BareColumn("id".into())),
        subquery: Box::new(subquery),
        negated: false,
    });

    let plan = sqlitegen::render_select(&relation, Rc::new(FakeDb)).unwrap();
    assert_eq!(
        plan.sql,
        concat!(
            r#"SELECT * FROM "book" WHERE "id" IN ("#,
            r#"SELECT "bookId" FROM "review" WHERE "rating" = ?)"#
        )
    );
    assert_eq!(plan.arguments, vec![Value::Integer(5)]);
}

#[test]
fn create_table_expands_belongs_to_and_collects_auto_indexes() {
    let mut table = TableDefinition::new("book");

    let mut id = ColumnDefinition::new("id");
    id.column_type = Some(ColumnType::Integer);
    id.primary_key = Some(ColumnPrimaryKey::default());
    table.columns.push(id);

    let mut title = ColumnDefinition::new("title");
    title.column_type = Some(ColumnType::Text);
    title.not_null = Some(Default::default());
    table.columns.push(title);

    let mut year = ColumnDefinition::new("year");
    year.column_type = Some(ColumnType::Integer);
    year.indexed = Some(false);
    table.columns.push(year);

    let mut author_fk = ForeignKeyDefinition::new("author");
    author_fk.indexed = Some(false);
    table.foreign_keys.push(author_fk);

    table.uniques.push(UniqueConstraint {
        columns: vec!["title".to_string()],
        conflict: None,
    });

    let (sql, auto_indexes) = schema::create_table_sql(&table, &FakeDb).unwrap();
    assert_eq!(
        sql,
        concat!(
            "CREATE TABLE \"book\" (\n",
            "  \"id\" INTEGER PRIMARY KEY,\n",
            "  \"title\" TEXT NOT NULL,\n",
            "  \"year\" INTEGER,\n",
            "  \"authorId\" INTEGER NOT NULL,\n",
            "  FOREIGN KEY (\"authorId\") REFERENCES \"author\"(\"id\"),\n",
            "  UNIQUE (\"title\")\n",
            ")"
        )
    );

    assert_eq!(auto_indexes.len(), 2);
    let index_sqls: Vec<String> = auto_indexes.iter().map(schema::create_index_sql).collect();
    assert!(index_sqls.contains(&"CREATE INDEX \"book_on_year\" ON \"book\" (\"year\")".to_string()));
    assert!(index_sqls.contains(&"CREATE INDEX \"index_book_on_authorId\" ON \"book\" (\"authorId\")".to_string()));
}
