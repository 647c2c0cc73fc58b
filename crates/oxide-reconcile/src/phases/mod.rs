//! Step emitters, one module per group of reconciliation phases.
//!
//! Every emitter is a pure function from the validated declaration to
//! [`Step`]s. Live state is never consulted here: each step carries the
//! catalog reads and the conditional that decide, at execution time,
//! whether it does anything.

pub mod clients;
pub mod columns;
pub mod database;
pub mod foreign_keys;
pub mod indexes;
pub mod rows;
pub mod tables;
pub mod views;

use crate::declaration::{normalize_words, ColumnSpec};
use crate::script::{quote_ident, quote_literal, Expr, Step};

/// The database every step is scoped to.
#[derive(Debug, Clone, Copy)]
pub struct Target<'a> {
    database: &'a str,
}

impl<'a> Target<'a> {
    pub const fn new(database: &'a str) -> Self {
        Self { database }
    }

    pub const fn database(&self) -> &'a str {
        self.database
    }

    /// `` `db`.`name` ``
    pub fn table(&self, name: &str) -> String {
        format!("{}.{}", quote_ident(self.database), quote_ident(name))
    }

    /// `ALTER TABLE `db`.`name` ` with a trailing space.
    pub fn alter(&self, table: &str) -> String {
        format!("ALTER TABLE {} ", self.table(table))
    }

    /// `column = 'db'`.
    pub fn scoped(&self, column: &'static str) -> Expr {
        Expr::column(column).eq(Expr::str(self.database))
    }

    /// Catalog filter selecting one table of the database.
    pub fn on_table(&self, table: &str) -> Expr {
        self.scoped("TABLE_SCHEMA")
            .and(Expr::column("TABLE_NAME").eq(Expr::str(table)))
    }
}

/// Quotes a name read from the catalog at execution time.
pub fn live_ident(name: Expr) -> Expr {
    Expr::concat(vec![
        Expr::str("`"),
        Expr::func("replace", vec![name, Expr::str("`"), Expr::str("``")]),
        Expr::str("`"),
    ])
}

/// `` `a`, `b` ``
pub fn ident_list(names: &[String]) -> String {
    names
        .iter()
        .map(|name| quote_ident(name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Name list as `IN (..)` candidates.
pub fn literals(names: impl IntoIterator<Item = impl Into<String>>) -> Vec<Expr> {
    names.into_iter().map(Expr::str).collect()
}

/// `type [NOT] NULL [DEFAULT d]` of a column, without its name.
pub fn column_type(column: &ColumnSpec) -> String {
    let mut out = normalize_words(&column.sql_type);
    out.push_str(if column.nullable { " NULL" } else { " NOT NULL" });
    if let Some(default) = &column.default {
        out.push_str(" DEFAULT ");
        out.push_str(default);
    }
    out
}

/// ` COMMENT 'id'`
pub fn comment(id: &str) -> String {
    format!(" COMMENT {}", quote_literal(id))
}

/// Step that runs `prefix || @list` when a catalog aggregation found
/// anything.
pub fn apply_list(step: Step, list: Expr, prefix: String) -> Step {
    step.apply_unless(
        list.clone().null(),
        Expr::concat(vec![Expr::str(prefix), list]),
    )
}
