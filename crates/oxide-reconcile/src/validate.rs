//! Declaration validation.
//!
//! Walks the declaration once, in declared order, and reports the first
//! violation. Nothing is emitted for a declaration that fails here, so
//! every later stage may assume quote-free identifiers, non-empty key
//! column lists and unique identities.

use std::collections::HashSet;

use crate::declaration::{
    ClientSpec, ColumnSpec, ForeignKeySpec, KeyKind, KeySpec, TableSpec, ViewSpec,
    PRIMARY_KEY_NAME,
};
use crate::error::{Entity, Result, ValidationError};
use crate::naming;

/// Validates a complete declaration.
///
/// # Errors
///
/// Returns the first [`ValidationError`] encountered in declared order.
pub fn validate(database: &str, tables: &[TableSpec], clients: &[ClientSpec]) -> Result<()> {
    sanitize(Entity::Database, "name", database)?;

    let mut table_ids = Unique::new(Entity::Table, "id");
    let mut table_names = Unique::new(Entity::Table, "name");
    let mut view_names = Unique::new(Entity::View, "name");

    for table in tables {
        validate_table(table, &mut table_ids, &mut table_names)?;
        for view in &table.views {
            validate_view(view, &mut view_names)?;
        }
        for row in table.seed_rows() {
            for column in row.keys() {
                sanitize(Entity::Row, "column", column)?;
            }
        }
    }

    for client in clients {
        validate_client(client)?;
    }
    Ok(())
}

/// First-occurrence tracker for one identity scope.
struct Unique<'a> {
    entity: Entity,
    field: &'static str,
    seen: HashSet<&'a str>,
}

impl<'a> Unique<'a> {
    fn new(entity: Entity, field: &'static str) -> Self {
        Self {
            entity,
            field,
            seen: HashSet::new(),
        }
    }

    fn insert(&mut self, value: &'a str) -> Result<()> {
        if self.seen.insert(value) {
            Ok(())
        } else {
            Err(ValidationError::DuplicateIdentity {
                entity: self.entity,
                field: self.field,
                value: value.to_string(),
            })
        }
    }
}

fn sanitize(entity: Entity, field: &'static str, value: &str) -> Result<()> {
    if naming::is_sanitized(value) {
        Ok(())
    } else {
        Err(ValidationError::SanitizeViolation {
            entity,
            field,
            value: value.to_string(),
        })
    }
}

fn unreserved(entity: Entity, name: &str) -> Result<()> {
    if naming::is_reserved(name) {
        Err(ValidationError::ReservedPrefixViolation {
            entity,
            name: name.to_string(),
        })
    } else {
        Ok(())
    }
}

fn validate_table<'a>(
    table: &'a TableSpec,
    ids: &mut Unique<'a>,
    names: &mut Unique<'a>,
) -> Result<()> {
    sanitize(Entity::Table, "name", &table.name)?;
    unreserved(Entity::Table, &table.name)?;
    sanitize(Entity::Table, "id", &table.id)?;
    ids.insert(&table.id)?;
    if table.id.is_empty() {
        return Err(ValidationError::MissingTableId {
            table: table.name.clone(),
        });
    }
    names.insert(&table.name)?;
    sanitize(Entity::Table, "engine", &table.engine)?;

    let mut column_ids = Unique::new(Entity::Column, "id");
    let mut column_names = Unique::new(Entity::Column, "name");
    for column in &table.columns {
        validate_column(table, column, &mut column_ids, &mut column_names)?;
    }

    let mut key_names = Unique::new(Entity::Key, "name");
    for key in &table.keys {
        validate_key(table, key, &mut key_names)?;
    }

    for foreign_key in &table.foreign_keys {
        validate_foreign_key(table, foreign_key)?;
    }
    Ok(())
}

fn validate_column<'a>(
    table: &TableSpec,
    column: &'a ColumnSpec,
    ids: &mut Unique<'a>,
    names: &mut Unique<'a>,
) -> Result<()> {
    sanitize(Entity::Column, "name", &column.name)?;
    unreserved(Entity::Column, &column.name)?;
    sanitize(Entity::Column, "type", &column.sql_type)?;
    sanitize(Entity::Column, "id", &column.id)?;
    if let Some(default) = &column.default {
        sanitize(Entity::Column, "default", default)?;
    }
    ids.insert(&column.id)?;
    if column.id.is_empty() {
        return Err(ValidationError::MissingColumnId {
            table: table.name.clone(),
            column: column.name.clone(),
        });
    }
    names.insert(&column.name)
}

fn validate_key<'a>(table: &TableSpec, key: &'a KeySpec, names: &mut Unique<'a>) -> Result<()> {
    if key.columns.is_empty() {
        return Err(ValidationError::EmptyKeyColumns {
            table: table.name.clone(),
            key: key.name.clone(),
        });
    }
    for column in &key.columns {
        sanitize(Entity::Key, "column", column)?;
    }
    sanitize(Entity::Key, "name", &key.name)?;
    sanitize(Entity::Key, "type", &key.key_type)?;
    names.insert(&key.name)?;
    if key.kind() == KeyKind::Primary && key.name != PRIMARY_KEY_NAME {
        return Err(ValidationError::InvalidPrimaryKeyName {
            table: table.name.clone(),
            name: key.name.clone(),
        });
    }
    Ok(())
}

fn validate_foreign_key(table: &TableSpec, foreign_key: &ForeignKeySpec) -> Result<()> {
    sanitize(Entity::ForeignKey, "delete", &foreign_key.on_delete)?;
    sanitize(Entity::ForeignKey, "update", &foreign_key.on_update)?;
    sanitize(Entity::ForeignKey, "table", &foreign_key.table)?;
    if foreign_key.columns.is_empty() {
        return Err(ValidationError::EmptyForeignKeyColumns {
            table: table.name.clone(),
            foreign_key: foreign_key.name.clone(),
        });
    }
    for column in &foreign_key.columns {
        sanitize(Entity::ForeignKey, "column", column)?;
    }
    if foreign_key.references.is_empty() {
        return Err(ValidationError::EmptyForeignKeyReferences {
            table: table.name.clone(),
            foreign_key: foreign_key.name.clone(),
        });
    }
    for column in &foreign_key.references {
        sanitize(Entity::ForeignKey, "reference", column)?;
    }
    if foreign_key.columns.len() != foreign_key.references.len() {
        return Err(ValidationError::ForeignKeyArityMismatch {
            table: table.name.clone(),
            foreign_key: foreign_key.name.clone(),
            columns: foreign_key.columns.len(),
            references: foreign_key.references.len(),
        });
    }
    sanitize(Entity::ForeignKey, "name", &foreign_key.name)
}

fn validate_view<'a>(view: &'a ViewSpec, names: &mut Unique<'a>) -> Result<()> {
    sanitize(Entity::View, "name", &view.name)?;
    for column in &view.columns {
        sanitize(Entity::View, "column", column)?;
    }
    names.insert(&view.name)?;

    for join in &view.joins {
        if join.kind().is_none() {
            return Err(ValidationError::InvalidJoinType {
                view: view.name.clone(),
                join_type: join.join_type.clone(),
            });
        }
        sanitize(Entity::Join, "table", &join.table)?;
        sanitize(Entity::Join, "alias", &join.alias)?;
        for condition in &join.on {
            sanitize(Entity::Join, "table", &condition.table)?;
            sanitize(Entity::Join, "column", &condition.column)?;
            sanitize(Entity::Join, "join column", &condition.join_column)?;
        }
        for column in &join.columns {
            sanitize(Entity::Join, "column", &column.name)?;
            sanitize(Entity::Join, "alias", &column.alias)?;
        }
    }
    Ok(())
}

fn validate_client(client: &ClientSpec) -> Result<()> {
    sanitize(Entity::Client, "user", &client.user)?;
    sanitize(Entity::Client, "host", &client.host)?;
    for permission in &client.permissions {
        sanitize(Entity::Permission, "subject", &permission.subject)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::{ForeignKeySpec, JoinSpec, Privilege, RowSpec};

    fn users() -> TableSpec {
        TableSpec::new("t1", "users")
            .column(ColumnSpec::new("c1", "name", "varchar(50)"))
            .column(ColumnSpec::new("c2", "age", "int").nullable())
    }

    fn check(tables: &[TableSpec]) -> Result<()> {
        validate("app", tables, &[])
    }

    #[test]
    fn accepts_a_plain_table() {
        assert_eq!(check(&[users()]), Ok(()));
    }

    #[test]
    fn primary_key_must_be_named_primary() {
        let ok = users().key(KeySpec::primary(&["name"]));
        assert_eq!(check(&[ok]), Ok(()));

        let bad = users().key(KeySpec::new("pk1", "primary key", &["name"]));
        assert_eq!(
            check(&[bad]),
            Err(ValidationError::InvalidPrimaryKeyName {
                table: "users".into(),
                name: "pk1".into(),
            })
        );
    }

    #[test]
    fn first_violation_wins() {
        // The duplicate id comes before the reserved name in declared order.
        let tables = [
            users(),
            TableSpec::new("t1", "orders"),
            TableSpec::new("t3", "_sql_orders"),
        ];
        assert_eq!(
            check(&tables),
            Err(ValidationError::DuplicateIdentity {
                entity: Entity::Table,
                field: "id",
                value: "t1".into(),
            })
        );

        let tables = [
            users(),
            TableSpec::new("t2", "_sql_orders"),
            TableSpec::new("t1", "orders"),
        ];
        assert_eq!(
            check(&tables),
            Err(ValidationError::ReservedPrefixViolation {
                entity: Entity::Table,
                name: "_sql_orders".into(),
            })
        );
    }

    #[test]
    fn reserved_column_prefix_rejected() {
        let table = users().column(ColumnSpec::new("c3", "_sql_tmp", "int"));
        assert!(matches!(
            check(&[table]),
            Err(ValidationError::ReservedPrefixViolation {
                entity: Entity::Column,
                ..
            })
        ));
    }

    #[test]
    fn names_staged_into_the_drop_marker_rejected() {
        assert_eq!(
            check(&[users(), TableSpec::new("t2", "drop_log")]),
            Err(ValidationError::ReservedPrefixViolation {
                entity: Entity::Table,
                name: "drop_log".into(),
            })
        );

        let table = users().column(ColumnSpec::new("c3", "Drop_note", "text"));
        assert_eq!(
            check(&[table]),
            Err(ValidationError::ReservedPrefixViolation {
                entity: Entity::Column,
                name: "Drop_note".into(),
            })
        );

        let table = users().column(ColumnSpec::new("c3", "dropped_at", "datetime"));
        assert_eq!(check(&[table]), Ok(()));
    }

    #[test]
    fn duplicate_column_id_rejected() {
        let table = users().column(ColumnSpec::new("c1", "other", "int"));
        assert_eq!(
            check(&[table]),
            Err(ValidationError::DuplicateIdentity {
                entity: Entity::Column,
                field: "id",
                value: "c1".into(),
            })
        );
    }

    #[test]
    fn empty_column_id_rejected() {
        let table = users().column(ColumnSpec::new("", "other", "int"));
        assert_eq!(
            check(&[table]),
            Err(ValidationError::MissingColumnId {
                table: "users".into(),
                column: "other".into(),
            })
        );
    }

    #[test]
    fn column_trackers_are_scoped_per_table() {
        let other = TableSpec::new("t2", "orders").column(ColumnSpec::new("c1", "name", "text"));
        assert_eq!(check(&[users(), other]), Ok(()));
    }

    #[test]
    fn duplicate_key_name_rejected() {
        let table = users()
            .key(KeySpec::new("idx_name", "key", &["name"]))
            .key(KeySpec::new("idx_name", "unique key", &["age"]));
        assert!(matches!(
            check(&[table]),
            Err(ValidationError::DuplicateIdentity {
                entity: Entity::Key,
                ..
            })
        ));
    }

    #[test]
    fn empty_key_columns_rejected() {
        let table = users().key(KeySpec::new("idx", "key", &[]));
        assert!(matches!(
            check(&[table]),
            Err(ValidationError::EmptyKeyColumns { .. })
        ));
    }

    #[test]
    fn foreign_key_shape_checked() {
        let no_columns = users().foreign_key(ForeignKeySpec::new("fk", &[], "orgs", &["id"]));
        assert!(matches!(
            check(&[no_columns]),
            Err(ValidationError::EmptyForeignKeyColumns { .. })
        ));

        let no_refs = users().foreign_key(ForeignKeySpec::new("fk", &["age"], "orgs", &[]));
        assert!(matches!(
            check(&[no_refs]),
            Err(ValidationError::EmptyForeignKeyReferences { .. })
        ));

        let arity = users().foreign_key(ForeignKeySpec::new("fk", &["age"], "orgs", &["a", "b"]));
        assert!(matches!(
            check(&[arity]),
            Err(ValidationError::ForeignKeyArityMismatch {
                columns: 1,
                references: 2,
                ..
            })
        ));
    }

    #[test]
    fn invalid_join_type_rejected() {
        let view = ViewSpec::new("v", &["name"]).join(JoinSpec::new("full outer", "orgs", "o"));
        let table = users().view(view);
        assert_eq!(
            check(&[table]),
            Err(ValidationError::InvalidJoinType {
                view: "v".into(),
                join_type: "full outer".into(),
            })
        );
    }

    #[test]
    fn every_field_is_sanitized() {
        let bad = "x`y";
        let cases: Vec<(TableSpec, Vec<ClientSpec>)> = vec![
            (TableSpec::new("t1", bad), vec![]),
            (TableSpec::new(bad, "users"), vec![]),
            (users().engine(bad), vec![]),
            (users().column(ColumnSpec::new("c3", bad, "int")), vec![]),
            (users().column(ColumnSpec::new(bad, "c", "int")), vec![]),
            (users().column(ColumnSpec::new("c3", "c", bad)), vec![]),
            (
                users().column(ColumnSpec::new("c3", "c", "int").default_value("'0'")),
                vec![],
            ),
            (users().key(KeySpec::new(bad, "key", &["name"])), vec![]),
            (users().key(KeySpec::new("k", bad, &["name"])), vec![]),
            (users().key(KeySpec::new("k", "key", &[bad])), vec![]),
            (
                users().foreign_key(ForeignKeySpec::new("fk", &["age"], bad, &["id"])),
                vec![],
            ),
            (
                users().foreign_key(ForeignKeySpec::new("fk", &[bad], "orgs", &["id"])),
                vec![],
            ),
            (
                users().foreign_key(ForeignKeySpec::new("fk", &["age"], "orgs", &[bad])),
                vec![],
            ),
            (
                users().foreign_key(ForeignKeySpec::new("fk", &["age"], "orgs", &["id"]).on_delete(bad)),
                vec![],
            ),
            (
                users().foreign_key(ForeignKeySpec::new("fk", &["age"], "orgs", &["id"]).on_update(bad)),
                vec![],
            ),
            (
                users().foreign_key(ForeignKeySpec::new(bad, &["age"], "orgs", &["id"])),
                vec![],
            ),
            (users().view(ViewSpec::new(bad, &["name"])), vec![]),
            (users().view(ViewSpec::new("v", &[bad])), vec![]),
            (
                users().view(ViewSpec::new("v", &["name"]).join(JoinSpec::new("inner", bad, "o"))),
                vec![],
            ),
            (
                users().view(ViewSpec::new("v", &["name"]).join(JoinSpec::new("inner", "orgs", bad))),
                vec![],
            ),
            (
                users().view(
                    ViewSpec::new("v", &["name"])
                        .join(JoinSpec::new("inner", "orgs", "o").on("users", bad, "id")),
                ),
                vec![],
            ),
            (
                users().view(
                    ViewSpec::new("v", &["name"])
                        .join(JoinSpec::new("inner", "orgs", "o").on("users", "age", bad)),
                ),
                vec![],
            ),
            (
                users().view(
                    ViewSpec::new("v", &["name"])
                        .join(JoinSpec::new("inner", "orgs", "o").select("title", bad)),
                ),
                vec![],
            ),
            (
                users().row(RowSpec::from([(bad.to_string(), "1".to_string())])),
                vec![],
            ),
            (users(), vec![ClientSpec::new(bad)]),
            (
                users(),
                vec![ClientSpec::new("app").permission(bad, &[Privilege::Select])],
            ),
        ];

        for (table, clients) in cases {
            let result = validate("app", std::slice::from_ref(&table), &clients);
            assert!(
                matches!(result, Err(ValidationError::SanitizeViolation { .. })),
                "expected sanitize violation for {table:?} / {clients:?}, got {result:?}"
            );
        }

        assert!(matches!(
            validate("a'pp", &[users()], &[]),
            Err(ValidationError::SanitizeViolation {
                entity: Entity::Database,
                ..
            })
        ));
    }

    #[test]
    fn row_values_are_not_sanitized() {
        let table = users().row(RowSpec::from([("name".to_string(), "O'Brien".to_string())]));
        assert_eq!(check(&[table]), Ok(()));
    }

    #[test]
    fn validation_state_does_not_leak_between_calls() {
        assert_eq!(check(&[users()]), Ok(()));
        assert_eq!(check(&[users()]), Ok(()));
    }
}
