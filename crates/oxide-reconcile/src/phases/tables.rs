//! Table existence, renames, engines and final removal.
//!
//! A table is found by the id stored in its comment. Renames go through
//! the staging namespace in two passes so that swapping names between
//! tables never collides, and undeclared tables are parked under the
//! drop marker until every dependent step has run.

use super::{apply_list, comment, literals, live_ident, Target};
use crate::declaration::TableSpec;
use crate::naming::{staged, DROP_MARKER, PLACEHOLDER_COLUMN};
use crate::plan::Phase;
use crate::script::{quote_ident, Catalog, Expr, Select, Step, Var};

fn base_tables(target: Target<'_>) -> Expr {
    target
        .scoped("TABLE_SCHEMA")
        .and(Expr::column("TABLE_TYPE").eq(Expr::str("BASE TABLE")))
}

/// `@live` = current name of the table carrying `id`, or `''`.
fn lookup(target: Target<'_>, id: &str) -> Select {
    Select::new(vec![
        Expr::func("max", vec![Expr::column("TABLE_NAME")]).or_else(Expr::str(""))
    ])
    .from(Catalog::Tables)
    .filter(base_tables(target).and(Expr::column("TABLE_COMMENT").eq(Expr::str(id))))
    .into_vars(&[Var::LIVE])
}

const fn live() -> Expr {
    Expr::Var(Var::LIVE)
}

/// Phase 2: create each missing table under its staging name.
pub fn ensure(target: Target<'_>, tables: &[TableSpec]) -> Vec<Step> {
    tables
        .iter()
        .map(|table| {
            let create = format!(
                "CREATE TABLE {} ({} int unsigned NULL) ENGINE={} DEFAULT CHARSET=utf8mb4{}",
                target.table(&staged(&table.name)),
                quote_ident(PLACEHOLDER_COLUMN),
                table.engine,
                comment(&table.id),
            );
            Step::new(
                Phase::Tables,
                format!("ensure table {} ({})", quote_ident(&table.name), table.id),
            )
            .select(lookup(target, &table.id))
            .apply_unless(live().not_eq(Expr::str("")), Expr::str(create))
        })
        .collect()
}

/// Phase 4: park undeclared tables, then rename declared ones in two passes.
pub fn rename(target: Target<'_>, tables: &[TableSpec]) -> Vec<Step> {
    let mut steps = Vec::with_capacity(tables.len() * 2 + 1);
    steps.push(mark_undeclared(target, tables));

    for table in tables {
        let stage = staged(&table.name);
        let statement = Expr::concat(vec![
            Expr::str(format!("RENAME TABLE {}.", quote_ident(target.database()))),
            live_ident(live()),
            Expr::str(format!(" TO {}", target.table(&stage))),
        ]);
        steps.push(
            Step::new(
                Phase::RenameTables,
                format!("stage table {}", quote_ident(&table.name)),
            )
            .select(lookup(target, &table.id))
            .apply_unless(
                live().one_of(literals(["", table.name.as_str(), stage.as_str()])),
                statement,
            ),
        );
    }

    for table in tables {
        let stage = staged(&table.name);
        let statement = format!(
            "RENAME TABLE {} TO {}",
            target.table(&stage),
            target.table(&table.name)
        );
        steps.push(
            Step::new(
                Phase::RenameTables,
                format!("name table {}", quote_ident(&table.name)),
            )
            .select(lookup(target, &table.id))
            .apply_unless(live().not_eq(Expr::str(stage)), Expr::str(statement)),
        );
    }

    steps
}

fn mark_undeclared(target: Target<'_>, tables: &[TableSpec]) -> Step {
    let database = format!("{}.", quote_ident(target.database()));
    let pair = Expr::concat(vec![
        Expr::str(database.clone()),
        live_ident(Expr::column("TABLE_NAME")),
        Expr::str(format!(" TO {database}")),
        live_ident(Expr::concat(vec![
            Expr::str(DROP_MARKER),
            Expr::column("TABLE_NAME"),
        ])),
    ]);
    let filter = base_tables(target)
        .and(Expr::column("TABLE_COMMENT").not_in(literals(tables.iter().map(|t| t.id.as_str()))))
        .and(Expr::column("TABLE_NAME").starts_with(DROP_MARKER).negate());

    let step = Step::new(Phase::RenameTables, "mark undeclared tables").select(
        Select::new(vec![pair.group_concat(", ")])
            .from(Catalog::Tables)
            .filter(filter)
            .into_vars(&[Var::LIST]),
    );
    apply_list(step, Expr::Var(Var::LIST), "RENAME TABLE ".into())
}

/// Phase 5: align each table's storage engine.
pub fn engines(target: Target<'_>, tables: &[TableSpec]) -> Vec<Step> {
    tables
        .iter()
        .map(|table| {
            let engine = Select::new(vec![
                Expr::func("max", vec![Expr::column("ENGINE")]).or_else(Expr::str(""))
            ])
            .from(Catalog::Tables)
            .filter(target.on_table(&table.name))
            .into_vars(&[Var::LIVE]);

            let matches = live().eq(Expr::str("")).or(Expr::func("lower", vec![live()])
                .eq(Expr::str(table.engine.to_lowercase())));

            Step::new(
                Phase::Engines,
                format!("engine of {}", quote_ident(&table.name)),
            )
            .select(engine)
            .apply_unless(
                matches,
                Expr::str(format!(
                    "{}ENGINE={}",
                    target.alter(&table.name),
                    table.engine
                )),
            )
        })
        .collect()
}

/// Phase 10: drop every table parked under the drop marker.
pub fn drop_marked(target: Target<'_>) -> Step {
    let name = Expr::concat(vec![
        Expr::str(format!("{}.", quote_ident(target.database()))),
        live_ident(Expr::column("TABLE_NAME")),
    ]);
    let step = Step::new(Phase::DropMarked, "drop marked tables").select(
        Select::new(vec![name.group_concat(", ")])
            .from(Catalog::Tables)
            .filter(base_tables(target).and(Expr::column("TABLE_NAME").starts_with(DROP_MARKER)))
            .into_vars(&[Var::LIST]),
    );
    apply_list(step, Expr::Var(Var::LIST), "DROP TABLE ".into())
}
