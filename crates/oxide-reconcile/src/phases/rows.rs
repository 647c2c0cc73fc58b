//! Seed rows, inserted only into empty tables.

use super::{ident_list, Target};
use crate::declaration::TableSpec;
use crate::plan::Phase;
use crate::script::{quote_ident, quote_literal, Catalog, Expr, Select, Step, Stmt, Var};

/// Phase 13: one guarded multi-row insert per seeded table.
pub fn seed(target: Target<'_>, tables: &[TableSpec]) -> Vec<Step> {
    tables
        .iter()
        .filter(|table| !table.seed_rows().is_empty())
        .map(|table| {
            let exists = Select::new(vec![Expr::count()])
                .from(Catalog::Tables)
                .filter(target.on_table(&table.name))
                .into_vars(&[Var::FOUND]);
            let count_rows = Expr::if_else(
                Expr::Var(Var::FOUND).gt(Expr::Int(0)),
                Expr::str(format!(
                    "SELECT count(*) FROM {} INTO {}",
                    target.table(&table.name),
                    Var::ROWS
                )),
                Expr::str(format!("SELECT 1 INTO {}", Var::ROWS)),
            );

            Step::new(
                Phase::Rows,
                format!("seed rows of {}", quote_ident(&table.name)),
            )
            .select(exists)
            .set(Var::ROW_QUERY, count_rows)
            .stmt(Stmt::Execute(Var::ROW_QUERY))
            .apply_unless(
                Expr::Var(Var::ROWS).gt(Expr::Int(0)),
                Expr::str(insert(target, table)),
            )
        })
        .collect()
}

/// Column order: declared columns first, then any other row keys by name.
fn row_columns(table: &TableSpec) -> Vec<String> {
    let rows = table.seed_rows();
    let used = |name: &str| rows.iter().any(|row| row.contains_key(name));

    let mut columns: Vec<String> = table
        .columns
        .iter()
        .map(|column| column.name.clone())
        .filter(|name| used(name))
        .collect();
    for row in rows {
        for name in row.keys() {
            if !columns.contains(name) && table.get_column(name).is_none() {
                columns.push(name.clone());
            }
        }
    }
    let declared = columns
        .iter()
        .take_while(|name| table.get_column(name).is_some())
        .count();
    columns[declared..].sort();
    columns
}

fn insert(target: Target<'_>, table: &TableSpec) -> String {
    let columns = row_columns(table);
    let values: Vec<String> = table
        .seed_rows()
        .iter()
        .map(|row| {
            let fields: Vec<String> = columns
                .iter()
                .map(|name| {
                    row.get(name)
                        .map_or_else(|| "DEFAULT".to_string(), |value| quote_literal(value))
                })
                .collect();
            format!("({})", fields.join(", "))
        })
        .collect();
    format!(
        "INSERT INTO {} ({}) VALUES {}",
        target.table(&table.name),
        ident_list(&columns),
        values.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::{ColumnSpec, RowSpec};

    fn roles() -> TableSpec {
        TableSpec::new("t3", "roles")
            .column(ColumnSpec::new("c1", "name", "varchar(20)"))
            .column(ColumnSpec::new("c2", "level", "int").nullable())
            .row(RowSpec::from([
                ("name".to_string(), "admin".to_string()),
                ("level".to_string(), "10".to_string()),
            ]))
            .row(RowSpec::from([("name".to_string(), "o'brien".to_string())]))
    }

    #[test]
    fn unseeded_tables_emit_nothing() {
        assert!(seed(Target::new("app"), &[TableSpec::new("t1", "users")]).is_empty());
    }

    #[test]
    fn rows_use_declared_column_order_and_defaults() {
        assert_eq!(
            insert(Target::new("app"), &roles()),
            "INSERT INTO `app`.`roles` (`name`, `level`) VALUES ('admin', '10'), ('o''brien', DEFAULT)"
        );
    }

    #[test]
    fn undeclared_row_keys_sorted_after_columns() {
        let table = TableSpec::new("t3", "roles")
            .column(ColumnSpec::new("c1", "name", "varchar(20)"))
            .row(RowSpec::from([
                ("zeta".to_string(), "z".to_string()),
                ("alpha".to_string(), "a".to_string()),
                ("name".to_string(), "n".to_string()),
            ]));
        assert_eq!(row_columns(&table), ["name", "alpha", "zeta"]);
    }

    #[test]
    fn insert_only_into_empty_tables() {
        let steps = seed(Target::new("app"), &[roles()]);
        assert_eq!(steps.len(), 1);
        let body: Vec<String> = steps[0].body.iter().map(ToString::to_string).collect();
        assert_eq!(
            body[1],
            "SET @row_qry = if((@found > 0), 'SELECT count(*) FROM `app`.`roles` INTO @rows', 'SELECT 1 INTO @rows');"
        );
        assert_eq!(
            body[2],
            "PREPARE stmt FROM @row_qry; EXECUTE stmt; DEALLOCATE PREPARE stmt;"
        );
        let apply = steps[0].apply.as_ref().map(ToString::to_string).unwrap_or_default();
        assert!(apply.starts_with("if((@rows > 0), 'SELECT 0', 'INSERT INTO `app`.`roles`"));
        assert!(apply.contains("(''o''''brien'', DEFAULT)"));
    }
}
