//! Target database creation.

use super::Target;
use crate::plan::Phase;
use crate::script::{quote_ident, Catalog, Expr, Select, Step, Var};

/// Creates the database when no schema of that name exists.
pub fn ensure(target: Target<'_>) -> Step {
    let found = Select::new(vec![Expr::count()])
        .from(Catalog::Schemata)
        .filter(Expr::column("SCHEMA_NAME").eq(Expr::str(target.database())))
        .into_vars(&[Var::FOUND]);

    Step::new(
        Phase::Database,
        format!("ensure database {}", quote_ident(target.database())),
    )
    .select(found)
    .apply_unless(
        Expr::Var(Var::FOUND).gt(Expr::Int(0)),
        Expr::str(format!(
            "CREATE DATABASE IF NOT EXISTS {}",
            quote_ident(target.database())
        )),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{Script, Tail};

    #[test]
    fn creates_missing_database() {
        let steps = [ensure(Target::new("app"))];
        let text = Script {
            prelude: &[],
            steps: &steps,
            tail: Tail::default(),
        }
        .to_string();
        assert!(text.contains(
            "SELECT count(*) FROM `INFORMATION_SCHEMA`.`SCHEMATA` WHERE (`SCHEMA_NAME` = 'app') INTO @found;"
        ));
        assert!(text.contains(
            "SET @qry = if((@found > 0), 'SELECT 0', 'CREATE DATABASE IF NOT EXISTS `app`');"
        ));
    }
}
