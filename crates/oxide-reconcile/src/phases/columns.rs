//! Column reconciliation.
//!
//! Columns are tracked by the id stored in their comment, the same way
//! tables are. Missing columns are added under their staging name,
//! undeclared ones are parked under the drop marker, and renames run in
//! two passes. Definitions and positions are corrected afterwards, once
//! stale foreign keys are out of the way.

use super::{apply_list, column_type, comment, literals, live_ident, Target};
use crate::declaration::{normalize_words, ColumnSpec, TableSpec};
use crate::naming::{staged, DROP_MARKER};
use crate::plan::Phase;
use crate::script::{quote_ident, Catalog, Expr, Select, Step, Var};

fn label(action: &str, table: &TableSpec, column: &str) -> String {
    format!(
        "{action} column {}.{}",
        quote_ident(&table.name),
        quote_ident(column)
    )
}

const fn live() -> Expr {
    Expr::Var(Var::LIVE)
}

/// `@live` = current name of the column carrying `id`, or `''`.
fn lookup(target: Target<'_>, table: &TableSpec, id: &str) -> Select {
    Select::new(vec![
        Expr::func("max", vec![Expr::column("COLUMN_NAME")]).or_else(Expr::str(""))
    ])
    .from(Catalog::Columns)
    .filter(
        target
            .on_table(&table.name)
            .and(Expr::column("COLUMN_COMMENT").eq(Expr::str(id))),
    )
    .into_vars(&[Var::LIVE])
}

/// Phase 6: add, park and rename columns of every table.
pub fn reconcile_names(target: Target<'_>, tables: &[TableSpec]) -> Vec<Step> {
    let mut steps = Vec::new();
    for table in tables {
        steps.extend(table.columns.iter().map(|column| add(target, table, column)));
        if !table.columns.is_empty() {
            steps.push(mark_undeclared(target, table));
        }
        steps.extend(table.columns.iter().map(|column| stage(target, table, column)));
        steps.extend(table.columns.iter().map(|column| name(target, table, column)));
    }
    steps
}

fn add(target: Target<'_>, table: &TableSpec, column: &ColumnSpec) -> Step {
    let found = Select::new(vec![Expr::count()])
        .from(Catalog::Columns)
        .filter(
            target
                .on_table(&table.name)
                .and(Expr::column("COLUMN_COMMENT").eq(Expr::str(&column.id))),
        )
        .into_vars(&[Var::FOUND]);
    let statement = format!(
        "{}ADD COLUMN {} {}{}",
        target.alter(&table.name),
        quote_ident(&staged(&column.name)),
        column_type(column),
        comment(&column.id),
    );
    Step::new(Phase::Columns, label("add", table, &column.name))
        .select(found)
        .apply_unless(
            Expr::Var(Var::FOUND).gt(Expr::Int(0)),
            Expr::str(statement),
        )
}

fn mark_undeclared(target: Target<'_>, table: &TableSpec) -> Step {
    let clause = Expr::concat(vec![
        Expr::str("RENAME COLUMN "),
        live_ident(Expr::column("COLUMN_NAME")),
        Expr::str(" TO "),
        live_ident(Expr::concat(vec![
            Expr::str(DROP_MARKER),
            Expr::column("COLUMN_NAME"),
        ])),
    ]);
    let ids = literals(table.columns.iter().map(|column| column.id.as_str()));
    let select = Select::new(vec![clause.group_concat(", ")])
        .from(Catalog::Columns)
        .filter(
            target
                .on_table(&table.name)
                .and(Expr::column("COLUMN_COMMENT").not_in(ids))
                .and(Expr::column("COLUMN_NAME").starts_with(DROP_MARKER).negate()),
        )
        .into_vars(&[Var::LIST]);

    let step = Step::new(
        Phase::Columns,
        format!("mark undeclared columns of {}", quote_ident(&table.name)),
    )
    .select(select);
    apply_list(step, Expr::Var(Var::LIST), target.alter(&table.name))
}

fn stage(target: Target<'_>, table: &TableSpec, column: &ColumnSpec) -> Step {
    let staging = staged(&column.name);
    let statement = Expr::concat(vec![
        Expr::str(format!("{}RENAME COLUMN ", target.alter(&table.name))),
        live_ident(live()),
        Expr::str(format!(" TO {}", quote_ident(&staging))),
    ]);
    Step::new(Phase::Columns, label("stage", table, &column.name))
        .select(lookup(target, table, &column.id))
        .apply_unless(
            live().one_of(literals(["", column.name.as_str(), staging.as_str()])),
            statement,
        )
}

fn name(target: Target<'_>, table: &TableSpec, column: &ColumnSpec) -> Step {
    let staging = staged(&column.name);
    let statement = format!(
        "{}RENAME COLUMN {} TO {}",
        target.alter(&table.name),
        quote_ident(&staging),
        quote_ident(&column.name)
    );
    Step::new(Phase::Columns, label("name", table, &column.name))
        .select(lookup(target, table, &column.id))
        .apply_unless(live().not_eq(Expr::str(staging)), Expr::str(statement))
}

/// Phase 8: rewrite column definitions and order.
///
/// A column is rewritten when any attribute differs from the declaration
/// or when an earlier column of the same table was moved; once one column
/// moves, every following one is re-anchored after its predecessor.
pub fn modify(target: Target<'_>, tables: &[TableSpec]) -> Vec<Step> {
    tables
        .iter()
        .flat_map(|table| {
            (0..table.columns.len()).map(move |index| modify_column(target, table, index))
        })
        .collect()
}

const fn var(var: Var) -> Expr {
    Expr::Var(var)
}

fn contains_auto_increment() -> Expr {
    Expr::func("instr", vec![var(Var::EXTRA), Expr::str("auto_increment")]).gt(Expr::Int(0))
}

fn modify_column(target: Target<'_>, table: &TableSpec, index: usize) -> Step {
    let column = &table.columns[index];
    let position = i64::try_from(index + 1).unwrap_or(i64::MAX);

    let moved = if index == 0 {
        Expr::Int(0)
    } else {
        var(Var::MOVED).or(var(Var::POSITION).not_eq(Expr::Int(position - 1)))
    };
    let live = Select::new(vec![
        Expr::func("max", vec![Expr::column("COLUMN_TYPE")]),
        Expr::func("max", vec![Expr::column("IS_NULLABLE")]),
        Expr::func("max", vec![Expr::column("COLUMN_DEFAULT")]),
        Expr::func("max", vec![Expr::column("EXTRA")]),
        Expr::func("max", vec![Expr::column("ORDINAL_POSITION")]).or_else(Expr::Int(0)),
    ])
    .from(Catalog::Columns)
    .filter(
        target
            .on_table(&table.name)
            .and(Expr::column("COLUMN_NAME").eq(Expr::str(&column.name))),
    )
    .into_vars(&[
        Var::COLUMN_TYPE,
        Var::NULLABLE,
        Var::DEFAULT,
        Var::EXTRA,
        Var::POSITION,
    ]);

    let mut step = Step::new(Phase::ModifyColumns, label("define", table, &column.name))
        .set(Var::MOVED, moved)
        .select(live);
    if column.auto_increment {
        step = step.select(indexed(target, table, column));
    }

    let default_matches = match column
        .default
        .as_deref()
        .filter(|default| !default.eq_ignore_ascii_case("NULL"))
    {
        None => var(Var::DEFAULT).null(),
        Some(default) => Expr::func("lower", vec![var(Var::DEFAULT)])
            .null_safe_eq(Expr::str(default.to_lowercase())),
    };
    let auto_matches = if column.auto_increment {
        contains_auto_increment().or(var(Var::INDEXED).eq(Expr::Int(0)))
    } else {
        contains_auto_increment().negate()
    };
    let unchanged = Expr::all(vec![
        var(Var::MOVED).eq(Expr::Int(0)),
        Expr::func("lower", vec![var(Var::COLUMN_TYPE)])
            .eq(Expr::str(normalize_words(&column.sql_type).to_lowercase())),
        var(Var::NULLABLE).eq(Expr::str(if column.nullable { "YES" } else { "NO" })),
        default_matches,
        auto_matches,
        var(Var::POSITION).eq(Expr::Int(position)),
    ])
    .unwrap_or(Expr::Int(1));
    let missing = var(Var::POSITION).eq(Expr::Int(0));

    let anchor = if index == 0 {
        " FIRST".to_string()
    } else {
        format!(" AFTER {}", quote_ident(&table.columns[index - 1].name))
    };
    let head = format!(
        "{}MODIFY COLUMN {} {}",
        target.alter(&table.name),
        quote_ident(&column.name),
        column_type(column)
    );
    let tail = format!("{}{anchor}", comment(&column.id));
    let statement = if column.auto_increment {
        Expr::concat(vec![
            Expr::str(head),
            Expr::if_else(
                var(Var::INDEXED).gt(Expr::Int(0)),
                Expr::str(" AUTO_INCREMENT"),
                Expr::str(""),
            ),
            Expr::str(tail),
        ])
    } else {
        Expr::str(format!("{head}{tail}"))
    };

    step.apply_unless(missing.or(unchanged), statement)
}

/// `@indexed` = number of indexes `column` leads.
pub fn indexed(target: Target<'_>, table: &TableSpec, column: &ColumnSpec) -> Select {
    Select::new(vec![Expr::count()])
        .from(Catalog::Statistics)
        .filter(
            target
                .on_table(&table.name)
                .and(Expr::column("COLUMN_NAME").eq(Expr::str(&column.name)))
                .and(Expr::column("SEQ_IN_INDEX").eq(Expr::Int(1))),
        )
        .into_vars(&[Var::INDEXED])
}

/// Phase 10: drop the parked columns of every table that declares columns.
pub fn drop_marked(target: Target<'_>, tables: &[TableSpec]) -> Vec<Step> {
    tables
        .iter()
        .filter(|table| !table.columns.is_empty())
        .map(|table| {
            let clause = Expr::concat(vec![
                Expr::str("DROP COLUMN "),
                live_ident(Expr::column("COLUMN_NAME")),
            ]);
            let select = Select::new(vec![clause.group_concat(", ")])
                .from(Catalog::Columns)
                .filter(
                    target
                        .on_table(&table.name)
                        .and(Expr::column("COLUMN_NAME").starts_with(DROP_MARKER)),
                )
                .into_vars(&[Var::LIST]);
            let step = Step::new(
                Phase::DropMarked,
                format!("drop marked columns of {}", quote_ident(&table.name)),
            )
            .select(select);
            apply_list(step, Expr::Var(Var::LIST), target.alter(&table.name))
        })
        .collect()
}
