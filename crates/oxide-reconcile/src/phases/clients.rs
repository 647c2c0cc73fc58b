//! Database users and their table privileges.
//!
//! Declared permissions are compared against `TABLE_PRIVILEGES` one
//! subject at a time. Whatever else a client holds in the database,
//! including grants left behind on a renamed or dropped table, is
//! removed from `mysql.tables_priv` and the privilege cache reloaded.

use std::collections::BTreeSet;

use super::{literals, Target};
use crate::declaration::{ClientSpec, PermissionSpec, Privilege};
use crate::plan::Phase;
use crate::script::{quote_ident, Catalog, Expr, Select, Step, Var};

/// Phase 14: every client, in declaration order.
pub fn reconcile(target: Target<'_>, clients: &[ClientSpec]) -> Vec<Step> {
    let mut steps = Vec::new();
    for client in clients {
        steps.push(create_user(client));
        steps.extend(revoke_undeclared(target, client));
        for permission in &client.permissions {
            let (granted, revoked) = partition(permission);
            if !granted.is_empty() {
                steps.push(grant(target, client, permission, &granted));
            }
            if !revoked.is_empty() {
                steps.push(revoke(target, client, permission, &revoked));
            }
        }
    }
    steps
}

/// Declared operations and their complement, both in canonical order.
fn partition(permission: &PermissionSpec) -> (Vec<Privilege>, Vec<Privilege>) {
    let declared: BTreeSet<Privilege> = permission.operations.iter().copied().collect();
    Privilege::ALL
        .into_iter()
        .partition(|privilege| declared.contains(privilege))
}

fn create_user(client: &ClientSpec) -> Step {
    let found = count(
        Catalog::Users,
        Expr::column("User")
            .eq(Expr::str(&client.user))
            .and(Expr::column("Host").eq(Expr::str(&client.host))),
    );
    Step::new(Phase::Clients, format!("user {}", client.account()))
        .select(found)
        .apply_unless(
            Expr::Var(Var::FOUND).gt(Expr::Int(0)),
            Expr::str(format!(
                "CREATE USER {} IDENTIFIED BY RANDOM PASSWORD",
                client.account()
            )),
        )
}

fn privileges(target: Target<'_>, client: &ClientSpec, subject: &str) -> Expr {
    Expr::column("GRANTEE")
        .eq(Expr::str(client.grantee()))
        .and(target.on_table(subject))
}

/// `@granted` = comma-separated privileges the client holds on `subject`.
fn granted(target: Target<'_>, client: &ClientSpec, subject: &str) -> Select {
    Select::new(vec![Expr::column("PRIVILEGE_TYPE")
        .group_concat(",")
        .or_else(Expr::str(""))])
    .from(Catalog::TablePrivileges)
    .filter(privileges(target, client, subject))
    .into_vars(&[Var::GRANTED])
}

fn holds(privilege: Privilege) -> Expr {
    Expr::func(
        "find_in_set",
        vec![Expr::str(privilege.as_sql()), Expr::Var(Var::GRANTED)],
    )
    .gt(Expr::Int(0))
}

fn list(privileges: &[Privilege]) -> String {
    privileges
        .iter()
        .copied()
        .map(Privilege::as_sql)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Count of `@found` rows matching `filter` in `catalog`.
fn count(catalog: Catalog, filter: Expr) -> Select {
    Select::new(vec![Expr::count()])
        .from(catalog)
        .filter(filter)
        .into_vars(&[Var::FOUND])
}

/// Removes table grants on every subject the client is not declared to
/// access, then reloads the privilege cache.
///
/// `REVOKE` names one table per statement and the stale tables are only
/// known at execution time, so the stored grant rows are deleted in one
/// statement instead.
fn revoke_undeclared(target: Target<'_>, client: &ClientSpec) -> [Step; 2] {
    let subjects = literals(client.permissions.iter().map(|p| p.subject.as_str()));
    let stored = Expr::column("User")
        .eq(Expr::str(&client.user))
        .and(Expr::column("Host").eq(Expr::str(&client.host)))
        .and(target.scoped("Db"))
        .and(Expr::column("Table_name").not_in(subjects.clone()));
    let cached = Expr::column("GRANTEE")
        .eq(Expr::str(client.grantee()))
        .and(target.scoped("TABLE_SCHEMA"))
        .and(Expr::column("TABLE_NAME").not_in(subjects));
    let none = || Expr::Var(Var::FOUND).eq(Expr::Int(0));

    let delete = Step::new(
        Phase::Clients,
        format!("revoke undeclared subjects from {}", client.account()),
    )
    .select(count(Catalog::TablesPriv, stored.clone()))
    .apply_unless(
        none(),
        Expr::str(format!("DELETE FROM {} WHERE {stored}", Catalog::TablesPriv)),
    );
    let reload = Step::new(
        Phase::Clients,
        format!("reload privileges of {}", client.account()),
    )
    .select(count(Catalog::TablePrivileges, cached))
    .apply_unless(none(), Expr::str("FLUSH PRIVILEGES"));
    [delete, reload]
}

fn grant(
    target: Target<'_>,
    client: &ClientSpec,
    permission: &PermissionSpec,
    operations: &[Privilege],
) -> Step {
    let complete =
        Expr::all(operations.iter().copied().map(holds).collect()).unwrap_or(Expr::Int(1));
    Step::new(
        Phase::Clients,
        format!(
            "grant {} on {} to {}",
            list(operations),
            quote_ident(&permission.subject),
            client.account()
        ),
    )
    .select(granted(target, client, &permission.subject))
    .apply_unless(
        complete,
        Expr::str(format!(
            "GRANT {} ON {} TO {}",
            list(operations),
            target.table(&permission.subject),
            client.account()
        )),
    )
}

fn revoke(
    target: Target<'_>,
    client: &ClientSpec,
    permission: &PermissionSpec,
    operations: &[Privilege],
) -> Step {
    let mut held = vec![Expr::str(", ")];
    held.extend(operations.iter().map(|&privilege| {
        Expr::if_else(holds(privilege), Expr::str(privilege.as_sql()), Expr::Null)
    }));
    Step::new(
        Phase::Clients,
        format!(
            "revoke {} on {} from {}",
            list(operations),
            quote_ident(&permission.subject),
            client.account()
        ),
    )
    .select(granted(target, client, &permission.subject))
    .set(Var::LIST, Expr::func("concat_ws", held))
    .apply_unless(
        Expr::Var(Var::LIST).eq(Expr::str("")),
        Expr::concat(vec![
            Expr::str("REVOKE "),
            Expr::Var(Var::LIST),
            Expr::str(format!(
                " ON {} FROM {}",
                target.table(&permission.subject),
                client.account()
            )),
        ]),
    )
}
