//! MySQL text rendering of the script builder.

use std::fmt::{self, Display, Formatter, Write as _};

use super::{Catalog, Expr, Script, Select, Source, Step, Stmt, Tail, Var};

/// Quotes an identifier with backticks.
#[must_use]
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Quotes a string literal, escaping backslashes and single quotes.
#[must_use]
pub fn quote_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("''"),
            '\0' => out.push_str("\\0"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

fn join<T: Display>(f: &mut Formatter<'_>, items: &[T], sep: &str) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl Display for Var {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

impl Display for Catalog {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "`{}`.`{}`", self.schema(), self.table())
    }
}

impl Display for Source {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.catalog)?;
        if let Some(alias) = self.alias {
            write!(f, " AS {}", quote_ident(alias))?;
        }
        Ok(())
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(value) => f.write_str(&quote_literal(value)),
            Self::Int(n) => write!(f, "{n}"),
            Self::Null => f.write_str("NULL"),
            Self::Var(var) => write!(f, "{var}"),
            Self::System(name) => write!(f, "@@{name}"),
            Self::Column { qualifier, name } => {
                if let Some(qualifier) = qualifier {
                    write!(f, "{}.", quote_ident(qualifier))?;
                }
                f.write_str(&quote_ident(name))
            }
            Self::Star => f.write_str("*"),
            Self::Func { name, args } => {
                write!(f, "{name}(")?;
                join(f, args, ", ")?;
                f.write_char(')')
            }
            Self::GroupConcat {
                distinct,
                expr,
                order_by,
                separator,
            } => {
                f.write_str("group_concat(")?;
                if *distinct {
                    f.write_str("DISTINCT ")?;
                }
                write!(f, "{expr}")?;
                if let Some(order) = order_by {
                    write!(f, " ORDER BY {order}")?;
                }
                write!(f, " SEPARATOR {})", quote_literal(separator))
            }
            Self::If {
                cond,
                then,
                otherwise,
            } => write!(f, "if({cond}, {then}, {otherwise})"),
            Self::Binary { left, op, right } => write!(f, "({left} {} {right})", op.as_str()),
            Self::InList {
                expr,
                list,
                negated,
            } => {
                let not = if *negated { "NOT " } else { "" };
                write!(f, "({expr} {not}IN (")?;
                join(f, list, ", ")?;
                f.write_str("))")
            }
            Self::InSelect {
                expr,
                select,
                negated,
            } => {
                let not = if *negated { "NOT " } else { "" };
                write!(f, "({expr} {not}IN ({select}))")
            }
            Self::IsNull { expr, negated } => {
                let not = if *negated { "NOT " } else { "" };
                write!(f, "({expr} IS {not}NULL)")
            }
            Self::Not(expr) => write!(f, "(NOT {expr})"),
        }
    }
}

impl Display for Select {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("SELECT ")?;
        join(f, &self.columns, ", ")?;
        if let Some(from) = &self.from {
            write!(f, " FROM {from}")?;
        }
        for (source, on) in &self.joins {
            write!(f, " INNER JOIN {source} ON {on}")?;
        }
        if let Some(filter) = &self.filter {
            write!(f, " WHERE {filter}")?;
        }
        if !self.into.is_empty() {
            f.write_str(" INTO ")?;
            join(f, &self.into, ", ")?;
        }
        Ok(())
    }
}

impl Display for Stmt {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Set(var, expr) => write!(f, "SET {var} = {expr};"),
            Self::SetSystem(name, expr) => write!(f, "SET {name} = {expr};"),
            Self::Select(select) => write!(f, "{select};"),
            Self::Execute(var) => {
                write!(f, "PREPARE stmt FROM {var}; EXECUTE stmt; DEALLOCATE PREPARE stmt;")
            }
        }
    }
}

/// Labels are free text; keep them on one comment line.
fn comment_text(label: &str) -> String {
    label
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect()
}

impl Step {
    fn render(&self, f: &mut Formatter<'_>, tail: Tail) -> fmt::Result {
        writeln!(
            f,
            "-- {}. {}",
            self.phase.number(),
            comment_text(&self.label)
        )?;
        for stmt in &self.body {
            writeln!(f, "{stmt}")?;
        }
        let Some(apply) = &self.apply else {
            return Ok(());
        };
        writeln!(f, "{}", Stmt::Set(Var::QUERY, apply.clone()))?;
        if tail.report {
            writeln!(
                f,
                "SELECT {} AS `step`, {} AS `statement`;",
                quote_literal(&self.label),
                Var::QUERY
            )?;
        }
        if tail.execute {
            writeln!(f, "{}", Stmt::Execute(Var::QUERY))?;
        }
        Ok(())
    }
}

impl Display for Script<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for stmt in self.prelude {
            writeln!(f, "{stmt}")?;
        }
        for step in self.steps {
            f.write_char('\n')?;
            step.render(f, self.tail)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::Phase;
    use crate::script::NO_OP;

    #[test]
    fn literals_escape_quotes_and_backslashes() {
        assert_eq!(quote_literal("plain"), "'plain'");
        assert_eq!(quote_literal("o'brien"), "'o''brien'");
        assert_eq!(quote_literal(r"a\b"), r"'a\\b'");
        assert_eq!(quote_ident("users"), "`users`");
        assert_eq!(quote_ident("a`b"), "`a``b`");
    }

    #[test]
    fn nested_literal_is_escaped_per_level() {
        let inner = format!("ALTER TABLE `t` COMMENT {}", quote_literal("c1"));
        let expr = Expr::str(inner);
        assert_eq!(expr.to_string(), "'ALTER TABLE `t` COMMENT ''c1'''");
    }

    #[test]
    fn select_renders_clauses_in_order() {
        let select = Select::new(vec![Expr::column("TABLE_NAME")])
            .from(Catalog::Tables)
            .filter(
                Expr::column("TABLE_SCHEMA")
                    .eq(Expr::str("app"))
                    .and(Expr::column("TABLE_COMMENT").eq(Expr::str("t1"))),
            )
            .into_vars(&[Var::LIVE]);
        assert_eq!(
            select.to_string(),
            "SELECT `TABLE_NAME` FROM `INFORMATION_SCHEMA`.`TABLES` \
             WHERE ((`TABLE_SCHEMA` = 'app') AND (`TABLE_COMMENT` = 't1')) INTO @live"
        );
    }

    #[test]
    fn join_and_group_concat() {
        let select = Select::new(vec![Expr::qualified("k", "COLUMN_NAME")
            .group_concat_ordered(Expr::qualified("k", "ORDINAL_POSITION"), ",")])
        .from_as(Catalog::KeyColumnUsage, "k")
        .join_as(
            Catalog::ReferentialConstraints,
            "r",
            Expr::qualified("r", "CONSTRAINT_NAME").eq(Expr::qualified("k", "CONSTRAINT_NAME")),
        )
        .filter(Expr::qualified("k", "CONSTRAINT_NAME").eq(Expr::str("fk")));
        let text = select.to_string();
        assert!(text.starts_with(
            "SELECT group_concat(`k`.`COLUMN_NAME` ORDER BY `k`.`ORDINAL_POSITION` SEPARATOR ',')"
        ));
        assert!(text.contains(
            "FROM `INFORMATION_SCHEMA`.`KEY_COLUMN_USAGE` AS `k` INNER JOIN \
             `INFORMATION_SCHEMA`.`REFERENTIAL_CONSTRAINTS` AS `r` ON"
        ));
        assert!(text.ends_with("WHERE (`k`.`CONSTRAINT_NAME` = 'fk')"));
    }

    #[test]
    fn in_lists_and_null_checks() {
        let expr = Expr::Var(Var::LIVE).one_of(vec![Expr::str(""), Expr::str("users")]);
        assert_eq!(expr.to_string(), "(@live IN ('', 'users'))");
        let expr = Expr::Var(Var::DEFAULT).null().negate();
        assert_eq!(expr.to_string(), "(NOT (@column_default IS NULL))");
        let expr = Expr::func("char_length", vec![Expr::Var(Var::DEFINITION)]).minus(Expr::Int(1));
        assert_eq!(expr.to_string(), "(char_length(@definition) - 1)");
    }

    #[test]
    fn step_tail_follows_mode() {
        let steps = [Step::new(Phase::Database, "ensure database `app`").apply_unless(
            Expr::Int(1),
            Expr::str("CREATE DATABASE IF NOT EXISTS `app`"),
        )];
        let prelude = [Stmt::SetSystem("foreign_key_checks", Expr::Int(0))];

        let render = |report, execute| {
            Script {
                prelude: &prelude,
                steps: &steps,
                tail: Tail { report, execute },
            }
            .to_string()
        };

        let executed = render(false, true);
        assert!(executed.starts_with("SET foreign_key_checks = 0;\n"));
        assert!(executed.contains(&format!(
            "SET @qry = if(1, '{NO_OP}', 'CREATE DATABASE IF NOT EXISTS `app`');"
        )));
        assert!(executed.contains("PREPARE stmt FROM @qry; EXECUTE stmt; DEALLOCATE PREPARE stmt;"));
        assert!(!executed.contains("AS `step`"));

        let dry = render(true, false);
        assert!(dry.contains("SELECT 'ensure database `app`' AS `step`, @qry AS `statement`;"));
        assert!(!dry.contains("PREPARE"));
    }

    #[test]
    fn labels_stay_on_one_comment_line() {
        let steps = [Step::new(Phase::Tables, "ensure table a\nDROP DATABASE x")];
        let text = Script {
            prelude: &[],
            steps: &steps,
            tail: Tail::default(),
        }
        .to_string();
        assert!(text.contains("-- 2. ensure table a DROP DATABASE x\n"));
    }
}
