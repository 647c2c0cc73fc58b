//! Foreign key removal and creation.
//!
//! Foreign keys are identified by name. A live constraint is compared to
//! the declared one through a signature string built on both sides:
//! local columns, referenced table, referenced columns, delete rule and
//! update rule.

use super::{apply_list, ident_list, literals, live_ident, Target};
use crate::declaration::{ForeignKeySpec, TableSpec};
use crate::plan::Phase;
use crate::script::{quote_ident, Catalog, Expr, Select, Step, Stmt, Var};

/// Signature of the declared constraint, in the shape [`live_signature`] reads.
pub fn signature(foreign_key: &ForeignKeySpec) -> String {
    format!(
        "{}|{}|{}|{}|{}",
        foreign_key.columns.join(","),
        foreign_key.table,
        foreign_key.references.join(","),
        foreign_key.delete_rule(),
        foreign_key.update_rule(),
    )
}

/// `@signature` = signature of the live constraint, or `''` when absent.
fn live_signature(target: Target<'_>, table: &TableSpec, foreign_key: &ForeignKeySpec) -> Select {
    let ordered = |column: &'static str| {
        Expr::qualified("k", column)
            .group_concat_ordered(Expr::qualified("k", "ORDINAL_POSITION"), ",")
    };
    let on = Expr::all(vec![
        Expr::qualified("r", "CONSTRAINT_SCHEMA").eq(Expr::qualified("k", "CONSTRAINT_SCHEMA")),
        Expr::qualified("r", "CONSTRAINT_NAME").eq(Expr::qualified("k", "CONSTRAINT_NAME")),
        Expr::qualified("r", "TABLE_NAME").eq(Expr::qualified("k", "TABLE_NAME")),
    ])
    .unwrap_or(Expr::Int(1));
    let filter = Expr::all(vec![
        Expr::qualified("k", "CONSTRAINT_SCHEMA").eq(Expr::str(target.database())),
        Expr::qualified("k", "TABLE_NAME").eq(Expr::str(&table.name)),
        Expr::qualified("k", "CONSTRAINT_NAME").eq(Expr::str(&foreign_key.name)),
    ])
    .unwrap_or(Expr::Int(1));

    Select::new(vec![Expr::func(
        "concat_ws",
        vec![
            Expr::str("|"),
            ordered("COLUMN_NAME"),
            Expr::func("max", vec![Expr::qualified("k", "REFERENCED_TABLE_NAME")]),
            ordered("REFERENCED_COLUMN_NAME"),
            Expr::func("max", vec![Expr::qualified("r", "DELETE_RULE")]),
            Expr::func("max", vec![Expr::qualified("r", "UPDATE_RULE")]),
        ],
    )])
    .from_as(Catalog::KeyColumnUsage, "k")
    .join_as(Catalog::ReferentialConstraints, "r", on)
    .filter(filter)
    .into_vars(&[Var::SIGNATURE])
}

fn label(action: &str, table: &TableSpec, foreign_key: &str) -> String {
    format!(
        "{action} foreign key {} on {}",
        quote_ident(foreign_key),
        quote_ident(&table.name)
    )
}

/// Phase 7: drop undeclared constraints and those whose definition changed.
pub fn drop_stale(target: Target<'_>, tables: &[TableSpec]) -> Vec<Step> {
    let mut steps = Vec::new();
    for table in tables {
        steps.push(drop_undeclared(target, table));
        for foreign_key in &table.foreign_keys {
            let statement = format!(
                "{}DROP FOREIGN KEY {}",
                target.alter(&table.name),
                quote_ident(&foreign_key.name)
            );
            steps.push(
                Step::new(
                    Phase::DropForeignKeys,
                    label("drop changed", table, &foreign_key.name),
                )
                .select(live_signature(target, table, foreign_key))
                .apply_unless(
                    Expr::Var(Var::SIGNATURE)
                        .one_of(literals(["".to_string(), signature(foreign_key)])),
                    Expr::str(statement),
                ),
            );
        }
    }
    steps
}

fn drop_undeclared(target: Target<'_>, table: &TableSpec) -> Step {
    let clause = Expr::concat(vec![
        Expr::str("DROP FOREIGN KEY "),
        live_ident(Expr::column("CONSTRAINT_NAME")),
    ]);
    let declared = literals(table.foreign_keys.iter().map(|fk| fk.name.as_str()));
    let select = Select::new(vec![clause.group_concat(", ")])
        .from(Catalog::ReferentialConstraints)
        .filter(
            target
                .scoped("CONSTRAINT_SCHEMA")
                .and(Expr::column("TABLE_NAME").eq(Expr::str(&table.name)))
                .and(Expr::column("CONSTRAINT_NAME").not_in(declared)),
        )
        .into_vars(&[Var::LIST]);

    let step = Step::new(
        Phase::DropForeignKeys,
        format!("drop undeclared foreign keys of {}", quote_ident(&table.name)),
    )
    .select(select);
    apply_list(step, Expr::Var(Var::LIST), target.alter(&table.name))
}

/// Phase 11: restore foreign key checks, then add missing constraints.
pub fn create(target: Target<'_>, tables: &[TableSpec]) -> Vec<Step> {
    let mut steps = vec![Step::new(Phase::CreateForeignKeys, "restore foreign key checks")
        .stmt(Stmt::SetSystem(
            "foreign_key_checks",
            Expr::Var(Var::SAVED_FK_CHECKS),
        ))];

    for table in tables {
        for foreign_key in &table.foreign_keys {
            let statement = format!(
                "{}ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {} ON UPDATE {}",
                target.alter(&table.name),
                quote_ident(&foreign_key.name),
                ident_list(&foreign_key.columns),
                target.table(&foreign_key.table),
                ident_list(&foreign_key.references),
                foreign_key.delete_rule(),
                foreign_key.update_rule(),
            );
            steps.push(
                Step::new(
                    Phase::CreateForeignKeys,
                    label("add", table, &foreign_key.name),
                )
                .select(live_signature(target, table, foreign_key))
                .apply_unless(
                    Expr::Var(Var::SIGNATURE).eq(Expr::str(signature(foreign_key))),
                    Expr::str(statement),
                ),
            );
        }
    }
    steps
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orders() -> TableSpec {
        TableSpec::new("t2", "orders").foreign_key(
            ForeignKeySpec::new("fk_user", &["user_id"], "users", &["id"]).on_delete("cascade"),
        )
    }

    fn apply(step: &Step) -> String {
        step.apply.as_ref().map(ToString::to_string).unwrap_or_default()
    }

    #[test]
    fn signature_normalizes_actions() {
        let fk = ForeignKeySpec::new("fk", &["a", "b"], "parent", &["x", "y"])
            .on_delete("set   null")
            .on_update("Cascade");
        assert_eq!(signature(&fk), "a,b|parent|x,y|SET NULL|CASCADE");
    }

    #[test]
    fn live_signature_reads_both_catalogs() {
        let table = orders();
        let select = live_signature(Target::new("app"), &table, &table.foreign_keys[0]).to_string();
        assert!(select.starts_with(
            "SELECT concat_ws('|', group_concat(`k`.`COLUMN_NAME` ORDER BY `k`.`ORDINAL_POSITION` SEPARATOR ','), "
        ));
        assert!(select.contains("AS `k` INNER JOIN `INFORMATION_SCHEMA`.`REFERENTIAL_CONSTRAINTS` AS `r`"));
        assert!(select.contains("(`k`.`CONSTRAINT_NAME` = 'fk_user')"));
        assert!(select.ends_with("INTO @signature"));
    }

    #[test]
    fn changed_constraint_dropped_before_recreate() {
        let steps = drop_stale(Target::new("app"), &[orders()]);
        assert_eq!(steps.len(), 2);
        assert!(steps[0].body[0]
            .to_string()
            .contains("(`CONSTRAINT_NAME` NOT IN ('fk_user'))"));
        assert_eq!(
            apply(&steps[1]),
            "if((@signature IN ('', 'user_id|users|id|CASCADE|RESTRICT')), 'SELECT 0', \
             'ALTER TABLE `app`.`orders` DROP FOREIGN KEY `fk_user`')"
        );
    }

    #[test]
    fn creation_restores_checks_first() {
        let steps = create(Target::new("app"), &[orders()]);
        assert_eq!(steps.len(), 2);
        assert_eq!(
            steps[0].body[0].to_string(),
            "SET foreign_key_checks = @saved_foreign_key_checks;"
        );
        assert!(steps[0].apply.is_none());
        assert_eq!(
            apply(&steps[1]),
            "if((@signature = 'user_id|users|id|CASCADE|RESTRICT'), 'SELECT 0', \
             'ALTER TABLE `app`.`orders` ADD CONSTRAINT `fk_user` FOREIGN KEY (`user_id`) \
             REFERENCES `app`.`users` (`id`) ON DELETE CASCADE ON UPDATE RESTRICT')"
        );
    }
}
