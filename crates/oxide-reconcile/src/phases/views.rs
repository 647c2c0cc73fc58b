//! View removal and creation.
//!
//! MySQL keeps no comment on a view, so a declared view is matched by
//! name. Its live definition, as the server normalizes it, is checked for
//! the declared columns, joins and conditions before it is replaced.

use super::{apply_list, literals, live_ident, Target};
use crate::declaration::{JoinKind, JoinSpec, TableSpec, ViewSpec};
use crate::plan::Phase;
use crate::script::{quote_ident, Catalog, Expr, Select, Step, Var};

/// Phase 3: drop every live view the declaration no longer names.
pub fn drop_undeclared(target: Target<'_>, tables: &[TableSpec]) -> Step {
    let declared = tables
        .iter()
        .flat_map(|table| table.views.iter().map(|view| view.name.as_str()));
    let name = Expr::concat(vec![
        Expr::str(format!("{}.", quote_ident(target.database()))),
        live_ident(Expr::column("TABLE_NAME")),
    ]);
    let select = Select::new(vec![name.group_concat(", ")])
        .from(Catalog::Views)
        .filter(
            target
                .scoped("TABLE_SCHEMA")
                .and(Expr::column("TABLE_NAME").not_in(literals(declared))),
        )
        .into_vars(&[Var::LIST]);

    let step = Step::new(Phase::DropViews, "drop undeclared views").select(select);
    apply_list(step, Expr::Var(Var::LIST), "DROP VIEW ".into())
}

/// Phase 12: create or replace every declared view.
pub fn create(target: Target<'_>, tables: &[TableSpec]) -> Vec<Step> {
    tables
        .iter()
        .flat_map(|table| table.views.iter().map(move |view| replace(target, table, view)))
        .collect()
}

fn replace(target: Target<'_>, table: &TableSpec, view: &ViewSpec) -> Step {
    let columns = Select::new(vec![Expr::column("COLUMN_NAME")
        .group_concat_ordered(Expr::column("ORDINAL_POSITION"), ",")
        .or_else(Expr::str(""))])
    .from(Catalog::Columns)
    .filter(target.on_table(&view.name))
    .into_vars(&[Var::SIGNATURE]);
    let stored = Expr::func("max", vec![Expr::column("VIEW_DEFINITION")]).or_else(Expr::str(""));
    let stored = Select::new(vec![stored])
        .from(Catalog::Views)
        .filter(target.on_table(&view.name))
        .into_vars(&[Var::DEFINITION]);

    let step = Step::new(Phase::Views, format!("view {}", quote_ident(&view.name)))
        .select(columns)
        .select(stored);
    let statement = Expr::str(definition(target, table, view));
    match unchanged(target, table, view) {
        Some(noop) => step.apply_unless(noop, statement),
        None => step.apply(statement),
    }
}

/// Names of the view's columns, in order.
fn column_names(view: &ViewSpec) -> Vec<&str> {
    view.columns
        .iter()
        .map(String::as_str)
        .chain(
            view.joins
                .iter()
                .flat_map(|join| join.columns.iter().map(|column| column.alias.as_str())),
        )
        .collect()
}

/// Whether `@definition` holds `fragment`.
fn mentions(fragment: String) -> Expr {
    Expr::func("locate", vec![Expr::str(fragment), Expr::Var(Var::DEFINITION)]).gt(Expr::Int(0))
}

/// Whether `@definition` holds exactly `count` copies of `needle`.
fn occurs(needle: &str, count: usize) -> Expr {
    let definition = || Expr::Var(Var::DEFINITION);
    let removed = Expr::func(
        "char_length",
        vec![Expr::func(
            "replace",
            vec![definition(), Expr::str(needle), Expr::str("")],
        )],
    );
    let length = i64::try_from(needle.chars().count() * count).unwrap_or(i64::MAX);
    Expr::func("char_length", vec![definition()])
        .minus(removed)
        .eq(Expr::Int(length))
}

/// Condition under which the live view already matches its declaration.
///
/// The server rewrites the stored definition with fully qualified names,
/// lowercase keywords and right joins turned into left joins. Views with a
/// right outer join are therefore always replaced.
fn unchanged(target: Target<'_>, table: &TableSpec, view: &ViewSpec) -> Option<Expr> {
    let base = target.table(&table.name);
    let signature = Expr::str(column_names(view).join(","));
    let mut checks = vec![Expr::Var(Var::SIGNATURE).eq(signature)];
    checks.extend(
        view.columns
            .iter()
            .map(|column| mentions(format!("{base}.{0} AS {0}", quote_ident(column)))),
    );

    let mut conditions = 0;
    for join in &view.joins {
        let alias = quote_ident(&join.alias);
        let joined = format!("join {} {alias}", target.table(&join.table));
        match join.kind()? {
            JoinKind::Inner => {
                checks.push(mentions(joined.clone()));
                checks.push(
                    Expr::func(
                        "locate",
                        vec![Expr::str(format!("left {joined}")), Expr::Var(Var::DEFINITION)],
                    )
                    .eq(Expr::Int(0)),
                );
            }
            JoinKind::LeftOuter => checks.push(mentions(format!("left {joined}"))),
            JoinKind::RightOuter => return None,
        }
        checks.extend(join.columns.iter().map(|column| {
            mentions(format!(
                "{alias}.{} AS {}",
                quote_ident(&column.name),
                quote_ident(&column.alias)
            ))
        }));
        for on in &join.on {
            let left = if on.table == table.name {
                format!("{base}.{}", quote_ident(&on.column))
            } else {
                format!("{}.{}", quote_ident(&on.table), quote_ident(&on.column))
            };
            checks.push(mentions(format!(
                "({left} = {alias}.{})",
                quote_ident(&on.join_column)
            )));
        }
        conditions += join.on.len();
    }
    checks.push(occurs(" join ", view.joins.len()));
    checks.push(occurs("` = `", conditions));
    Expr::all(checks)
}

fn definition(target: Target<'_>, table: &TableSpec, view: &ViewSpec) -> String {
    let base = quote_ident(&table.name);
    let mut projection: Vec<String> = view
        .columns
        .iter()
        .map(|column| format!("{base}.{}", quote_ident(column)))
        .collect();
    for join in &view.joins {
        let alias = quote_ident(&join.alias);
        projection.extend(join.columns.iter().map(|column| {
            format!(
                "{alias}.{} AS {}",
                quote_ident(&column.name),
                quote_ident(&column.alias)
            )
        }));
    }

    let mut sql = format!(
        "CREATE OR REPLACE VIEW {} AS SELECT {} FROM {}",
        target.table(&view.name),
        projection.join(", "),
        target.table(&table.name),
    );
    for join in &view.joins {
        sql.push(' ');
        sql.push_str(&join_clause(target, join));
    }
    sql
}

fn join_clause(target: Target<'_>, join: &JoinSpec) -> String {
    let kind = join.kind().unwrap_or(JoinKind::Inner);
    let alias = quote_ident(&join.alias);
    let mut clause = format!(
        "{} JOIN {} AS {alias}",
        kind.as_sql(),
        target.table(&join.table)
    );
    let conditions: Vec<String> = join
        .on
        .iter()
        .map(|on| {
            format!(
                "{}.{} = {alias}.{}",
                quote_ident(&on.table),
                quote_ident(&on.column),
                quote_ident(&on.join_column)
            )
        })
        .collect();
    if !conditions.is_empty() {
        clause.push_str(" ON ");
        clause.push_str(&conditions.join(" AND "));
    }
    clause
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orders() -> TableSpec {
        TableSpec::new("t2", "orders").view(
            ViewSpec::new("order_details", &["id", "total"]).join(
                JoinSpec::new("left outer", "users", "u")
                    .on("orders", "user_id", "id")
                    .select("name", "user_name"),
            ),
        )
    }

    #[test]
    fn view_definition_joins_declared_tables() {
        let target = Target::new("app");
        let table = orders();
        assert_eq!(
            definition(target, &table, &table.views[0]),
            "CREATE OR REPLACE VIEW `app`.`order_details` AS SELECT `orders`.`id`, \
             `orders`.`total`, `u`.`name` AS `user_name` FROM `app`.`orders` \
             LEFT OUTER JOIN `app`.`users` AS `u` ON `orders`.`user_id` = `u`.`id`"
        );
    }

    #[test]
    fn one_step_per_view() {
        let steps = create(Target::new("app"), &[orders(), TableSpec::new("t1", "users")]);
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].phase, Phase::Views);
        assert_eq!(
            steps[0].body[0].to_string(),
            "SELECT ifnull(group_concat(`COLUMN_NAME` ORDER BY `ORDINAL_POSITION` SEPARATOR ','), '') \
             FROM `INFORMATION_SCHEMA`.`COLUMNS` \
             WHERE ((`TABLE_SCHEMA` = 'app') AND (`TABLE_NAME` = 'order_details')) INTO @signature;"
        );
        assert!(steps[0].body[1]
            .to_string()
            .starts_with("SELECT ifnull(max(`VIEW_DEFINITION`), '') FROM `INFORMATION_SCHEMA`.`VIEWS`"));
    }

    #[test]
    fn matching_definition_is_left_alone() {
        let table = orders();
        let step = replace(Target::new("app"), &table, &table.views[0]);
        let apply = step.apply.as_ref().map(ToString::to_string).unwrap_or_default();
        for check in [
            "(@signature = 'id,total,user_name')",
            "(locate('`app`.`orders`.`id` AS `id`', @definition) > 0)",
            "(locate('`app`.`orders`.`total` AS `total`', @definition) > 0)",
            "(locate('left join `app`.`users` `u`', @definition) > 0)",
            "(locate('`u`.`name` AS `user_name`', @definition) > 0)",
            "(locate('(`app`.`orders`.`user_id` = `u`.`id`)', @definition) > 0)",
            "((char_length(@definition) - char_length(replace(@definition, ' join ', ''))) = 6)",
            "((char_length(@definition) - char_length(replace(@definition, '` = `', ''))) = 5)",
        ] {
            assert!(apply.contains(check), "missing {check} in {apply}");
        }
        assert!(apply.starts_with("if("));
        assert!(apply.contains("'SELECT 0', 'CREATE OR REPLACE VIEW `app`.`order_details`"));
    }

    #[test]
    fn inner_join_must_not_be_stored_as_left_join() {
        let table = TableSpec::new("t2", "orders").view(
            ViewSpec::new("owners", &["id"])
                .join(JoinSpec::new("inner", "users", "u").on("orders", "user_id", "id")),
        );
        let step = replace(Target::new("app"), &table, &table.views[0]);
        let apply = step.apply.as_ref().map(ToString::to_string).unwrap_or_default();
        assert!(apply.contains("(locate('join `app`.`users` `u`', @definition) > 0)"));
        assert!(apply.contains("(locate('left join `app`.`users` `u`', @definition) = 0)"));
        assert!(apply.contains("(@signature = 'id')"));
    }

    #[test]
    fn right_joins_are_always_replaced() {
        let table = TableSpec::new("t2", "orders").view(
            ViewSpec::new("owners", &["id"])
                .join(JoinSpec::new("right outer", "users", "u").on("orders", "user_id", "id")),
        );
        let step = replace(Target::new("app"), &table, &table.views[0]);
        let apply = step.apply.as_ref().map(ToString::to_string).unwrap_or_default();
        assert!(apply.starts_with("'CREATE OR REPLACE VIEW `app`.`owners`"));
    }

    #[test]
    fn drop_keeps_declared_views() {
        let step = drop_undeclared(Target::new("app"), &[orders()]);
        let select = step.body[0].to_string();
        assert!(select.contains("FROM `INFORMATION_SCHEMA`.`VIEWS`"));
        assert!(select.contains("(`TABLE_NAME` NOT IN ('order_details'))"));
    }

    #[test]
    fn drop_all_views_when_none_declared() {
        let step = drop_undeclared(Target::new("app"), &[TableSpec::new("t1", "users")]);
        let select = step.body[0].to_string();
        assert!(select.contains("WHERE ((`TABLE_SCHEMA` = 'app') AND 1)"));
    }
}
