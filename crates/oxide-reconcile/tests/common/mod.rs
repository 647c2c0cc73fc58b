#![allow(dead_code)]

use oxide_reconcile::prelude::*;
use oxide_reconcile::script::Step;

pub const DATABASE: &str = "app";

/// `t1`/`users` with `c1 name varchar(50) not null` and `c2 age int null`.
pub fn users() -> TableSpec {
    TableSpec::new("t1", "users")
        .column(ColumnSpec::new("c1", "name", "varchar(50)"))
        .column(ColumnSpec::new("c2", "age", "int").nullable())
}

/// The same table as [`users`], renamed.
pub fn accounts() -> TableSpec {
    TableSpec {
        name: "accounts".to_string(),
        ..users()
    }
}

/// `t2`/`orders` referencing `users` through `fk_orders_user`.
pub fn orders() -> TableSpec {
    TableSpec::new("t2", "orders")
        .column(ColumnSpec::new("c1", "id", "int unsigned").auto_increment())
        .column(ColumnSpec::new("c2", "user_id", "int unsigned"))
        .column(ColumnSpec::new("c3", "total", "decimal(10,2)").default_value("0"))
        .key(KeySpec::primary(&["id"]))
        .key(KeySpec::new("ix_user", "index", &["user_id"]))
        .foreign_key(
            ForeignKeySpec::new("fk_orders_user", &["user_id"], "users", &["id"])
                .on_delete("cascade"),
        )
        .view(
            ViewSpec::new("order_owners", &["id", "total"]).join(
                JoinSpec::new("inner", "users", "u")
                    .on("orders", "user_id", "id")
                    .select("name", "owner"),
            ),
        )
}

pub fn plan_for(tables: &[TableSpec], clients: &[ClientSpec]) -> Plan {
    plan(DATABASE, tables, clients)
        .unwrap_or_else(|e| panic!("Declaration should validate: {e}"))
}

pub fn compile_with(tables: &[TableSpec], options: CompileOptions) -> String {
    compile(DATABASE, tables, &[], options)
        .unwrap_or_else(|e| panic!("Declaration should compile: {e}"))
}

/// Rendered corrective expression of a step.
pub fn apply_text(step: &Step) -> String {
    step.apply
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_default()
}

/// Index of the first step whose label equals `label`.
pub fn position(plan: &Plan, label: &str) -> usize {
    plan.steps()
        .iter()
        .position(|step| step.label == label)
        .unwrap_or_else(|| panic!("No step labelled {label}"))
}

/// Every step whose corrective expression mentions `needle`.
pub fn steps_mentioning<'a>(plan: &'a Plan, needle: &str) -> Vec<&'a Step> {
    plan.steps()
        .iter()
        .filter(|step| apply_text(step).contains(needle))
        .collect()
}
