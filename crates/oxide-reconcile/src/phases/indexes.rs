//! Index reconciliation.

use super::columns::indexed;
use super::{apply_list, column_type, comment, ident_list, literals, live_ident, Target};
use crate::declaration::{KeyKind, KeySpec, TableSpec, PRIMARY_KEY_NAME};
use crate::plan::Phase;
use crate::script::{quote_ident, Catalog, Expr, Select, Step, Var};

/// Phase 9: indexes of every table, then pending auto-increment columns.
pub fn reconcile(target: Target<'_>, tables: &[TableSpec]) -> Vec<Step> {
    let mut steps = Vec::new();
    for table in tables {
        steps.push(drop_undeclared(target, table));
        steps.extend(table.keys.iter().map(|key| reconcile_key(target, table, key)));
        steps.extend(
            table
                .columns
                .iter()
                .filter(|column| column.auto_increment)
                .map(|column| {
                    let statement = format!(
                        "{}MODIFY COLUMN {} {} AUTO_INCREMENT{}",
                        target.alter(&table.name),
                        quote_ident(&column.name),
                        column_type(column),
                        comment(&column.id),
                    );
                    let extra = Select::new(vec![Expr::func("max", vec![Expr::column("EXTRA")])])
                        .from(Catalog::Columns)
                        .filter(
                            target
                                .on_table(&table.name)
                                .and(Expr::column("COLUMN_NAME").eq(Expr::str(&column.name))),
                        )
                        .into_vars(&[Var::EXTRA]);
                    let done = Expr::Var(Var::EXTRA)
                        .null()
                        .or(Expr::func(
                            "instr",
                            vec![Expr::Var(Var::EXTRA), Expr::str("auto_increment")],
                        )
                        .gt(Expr::Int(0)))
                        .or(Expr::Var(Var::INDEXED).eq(Expr::Int(0)));
                    Step::new(
                        Phase::Indexes,
                        format!(
                            "auto increment {}.{}",
                            quote_ident(&table.name),
                            quote_ident(&column.name)
                        ),
                    )
                    .select(extra)
                    .select(indexed(target, table, column))
                    .apply_unless(done, Expr::str(statement))
                }),
        );
    }
    steps
}

/// `columns|non_unique` as read back from `STATISTICS`.
pub fn signature(key: &KeySpec) -> String {
    let non_unique = u8::from(!key.kind().is_unique());
    format!("{}|{non_unique}", key.columns.join(","))
}

fn definition(key: &KeySpec) -> String {
    if key.kind() == KeyKind::Primary {
        format!("PRIMARY KEY ({})", ident_list(&key.columns))
    } else {
        format!(
            "{} {} ({})",
            key.key_type,
            quote_ident(&key.name),
            ident_list(&key.columns)
        )
    }
}

fn drop_clause(key: &KeySpec) -> String {
    if key.kind() == KeyKind::Primary {
        "DROP PRIMARY KEY".to_string()
    } else {
        format!("DROP INDEX {}", quote_ident(&key.name))
    }
}

fn reconcile_key(target: Target<'_>, table: &TableSpec, key: &KeySpec) -> Step {
    let live = Select::new(vec![Expr::func(
        "concat_ws",
        vec![
            Expr::str("|"),
            Expr::column("COLUMN_NAME")
                .group_concat_ordered(Expr::column("SEQ_IN_INDEX"), ","),
            Expr::func("max", vec![Expr::column("NON_UNIQUE")]),
        ],
    )])
    .from(Catalog::Statistics)
    .filter(
        target
            .on_table(&table.name)
            .and(Expr::column("INDEX_NAME").eq(Expr::str(&key.name))),
    )
    .into_vars(&[Var::SIGNATURE]);

    let alter = target.alter(&table.name);
    let add = format!("{alter}ADD {}", definition(key));
    let replace = format!("{alter}{}, ADD {}", drop_clause(key), definition(key));
    let signature = Expr::Var(Var::SIGNATURE);

    Step::new(
        Phase::Indexes,
        format!(
            "key {} on {}",
            quote_ident(&key.name),
            quote_ident(&table.name)
        ),
    )
    .select(live)
    .apply_unless(
        signature.clone().eq(Expr::str(self::signature(key))),
        Expr::if_else(
            signature.eq(Expr::str("")),
            Expr::str(add),
            Expr::str(replace),
        ),
    )
}

/// Drops live indexes that are neither declared nor backing a live foreign key.
fn drop_undeclared(target: Target<'_>, table: &TableSpec) -> Step {
    let clause = Expr::if_else(
        Expr::column("INDEX_NAME").eq(Expr::str(PRIMARY_KEY_NAME)),
        Expr::str("DROP PRIMARY KEY"),
        Expr::concat(vec![
            Expr::str("DROP INDEX "),
            live_ident(Expr::column("INDEX_NAME")),
        ]),
    );
    let constraints = Select::new(vec![Expr::column("CONSTRAINT_NAME")])
        .from(Catalog::ReferentialConstraints)
        .filter(
            target
                .scoped("CONSTRAINT_SCHEMA")
                .and(Expr::column("TABLE_NAME").eq(Expr::str(&table.name))),
        );
    let select = Select::new(vec![clause.group_concat_distinct(", ")])
        .from(Catalog::Statistics)
        .filter(
            target
                .on_table(&table.name)
                .and(
                    Expr::column("INDEX_NAME")
                        .not_in(literals(table.keys.iter().map(|key| key.name.as_str()))),
                )
                .and(Expr::column("INDEX_NAME").not_in_select(constraints)),
        )
        .into_vars(&[Var::LIST]);

    let step = Step::new(
        Phase::Indexes,
        format!("drop undeclared keys of {}", quote_ident(&table.name)),
    )
    .select(select);
    apply_list(step, Expr::Var(Var::LIST), target.alter(&table.name))
}
