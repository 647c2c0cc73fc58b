//! Script builder.
//!
//! Reconciliation steps are assembled as a small typed tree of MySQL
//! statements and expressions, then rendered to text once. Identifier
//! and literal quoting happen only in the renderer, so a dynamic
//! statement embedded as a string literal inside another statement is
//! escaped exactly once per level.

mod render;

pub use render::{quote_ident, quote_literal};

use crate::plan::Phase;

/// A MySQL user variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Var(pub &'static str);

impl Var {
    /// The statement a step computes and then reports or executes.
    pub const QUERY: Self = Self("qry");
    /// A live object name looked up by identity.
    pub const LIVE: Self = Self("live");
    /// An aggregated list of clauses or objects.
    pub const LIST: Self = Self("list");
    /// A counter or flag read from the catalog.
    pub const FOUND: Self = Self("found");
    /// A live definition signature.
    pub const SIGNATURE: Self = Self("signature");
    /// Stored definition of a live view.
    pub const DEFINITION: Self = Self("definition");
    /// A statement executed to count rows of a user table.
    pub const ROW_QUERY: Self = Self("row_qry");
    /// Row count of a seeded table.
    pub const ROWS: Self = Self("rows");
    /// Whether an earlier column of the table moved.
    pub const MOVED: Self = Self("moved");
    /// Live column type.
    pub const COLUMN_TYPE: Self = Self("column_type");
    /// Live column nullability (`YES`/`NO`).
    pub const NULLABLE: Self = Self("nullable");
    /// Live column default.
    pub const DEFAULT: Self = Self("column_default");
    /// Live column extra attributes.
    pub const EXTRA: Self = Self("extra");
    /// Live column ordinal position.
    pub const POSITION: Self = Self("position");
    /// Whether the live column leads an index.
    pub const INDEXED: Self = Self("indexed");
    /// Saved `@@foreign_key_checks`.
    pub const SAVED_FK_CHECKS: Self = Self("saved_foreign_key_checks");
    /// Live privileges of an account on one table.
    pub const GRANTED: Self = Self("granted");
}

/// `INFORMATION_SCHEMA` and `mysql` tables read by the steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Catalog {
    /// `INFORMATION_SCHEMA.SCHEMATA`.
    Schemata,
    /// `INFORMATION_SCHEMA.TABLES`.
    Tables,
    /// `INFORMATION_SCHEMA.COLUMNS`.
    Columns,
    /// `INFORMATION_SCHEMA.STATISTICS`.
    Statistics,
    /// `INFORMATION_SCHEMA.KEY_COLUMN_USAGE`.
    KeyColumnUsage,
    /// `INFORMATION_SCHEMA.REFERENTIAL_CONSTRAINTS`.
    ReferentialConstraints,
    /// `INFORMATION_SCHEMA.VIEWS`.
    Views,
    /// `INFORMATION_SCHEMA.TABLE_PRIVILEGES`.
    TablePrivileges,
    /// `mysql.user`.
    Users,
    /// `mysql.tables_priv`.
    TablesPriv,
}

impl Catalog {
    /// Schema holding the catalog table.
    #[must_use]
    pub const fn schema(self) -> &'static str {
        match self {
            Self::Users | Self::TablesPriv => "mysql",
            _ => "INFORMATION_SCHEMA",
        }
    }

    /// Catalog table name.
    #[must_use]
    pub const fn table(self) -> &'static str {
        match self {
            Self::Schemata => "SCHEMATA",
            Self::Tables => "TABLES",
            Self::Columns => "COLUMNS",
            Self::Statistics => "STATISTICS",
            Self::KeyColumnUsage => "KEY_COLUMN_USAGE",
            Self::ReferentialConstraints => "REFERENTIAL_CONSTRAINTS",
            Self::Views => "VIEWS",
            Self::TablePrivileges => "TABLE_PRIVILEGES",
            Self::Users => "user",
            Self::TablesPriv => "tables_priv",
        }
    }
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    /// `=`
    Eq,
    /// `<>`
    NotEq,
    /// `<=>`
    NullSafeEq,
    /// `>`
    Gt,
    /// `-`
    Sub,
    /// `AND`
    And,
    /// `OR`
    Or,
}

impl BinOp {
    /// SQL spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "<>",
            Self::NullSafeEq => "<=>",
            Self::Gt => ">",
            Self::Sub => "-",
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

/// A SQL expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// String literal.
    Str(String),
    /// Integer literal.
    Int(i64),
    /// `NULL`.
    Null,
    /// User variable.
    Var(Var),
    /// Session system variable, `@@name`.
    System(&'static str),
    /// Column of a catalog table, optionally qualified by an alias.
    Column {
        /// Table alias.
        qualifier: Option<&'static str>,
        /// Column name.
        name: &'static str,
    },
    /// `*` inside `count(*)`.
    Star,
    /// Function call.
    Func {
        /// Function name.
        name: &'static str,
        /// Arguments.
        args: Vec<Expr>,
    },
    /// `group_concat([DISTINCT] expr [ORDER BY ..] SEPARATOR '..')`.
    GroupConcat {
        /// Whether duplicates are removed.
        distinct: bool,
        /// Aggregated expression.
        expr: Box<Expr>,
        /// Ordering of the aggregated values.
        order_by: Option<Box<Expr>>,
        /// Separator literal.
        separator: &'static str,
    },
    /// `if(cond, then, otherwise)`.
    If {
        /// Condition.
        cond: Box<Expr>,
        /// Value when true.
        then: Box<Expr>,
        /// Value otherwise.
        otherwise: Box<Expr>,
    },
    /// Binary operation, always parenthesized.
    Binary {
        /// Left operand.
        left: Box<Expr>,
        /// Operator.
        op: BinOp,
        /// Right operand.
        right: Box<Expr>,
    },
    /// `expr [NOT] IN (a, b, ..)`.
    InList {
        /// Tested expression.
        expr: Box<Expr>,
        /// Candidates; must not be empty.
        list: Vec<Expr>,
        /// `NOT IN` when set.
        negated: bool,
    },
    /// `expr [NOT] IN (SELECT ..)`.
    InSelect {
        /// Tested expression.
        expr: Box<Expr>,
        /// Subquery.
        select: Box<Select>,
        /// `NOT IN` when set.
        negated: bool,
    },
    /// `expr IS [NOT] NULL`.
    IsNull {
        /// Tested expression.
        expr: Box<Expr>,
        /// `IS NOT NULL` when set.
        negated: bool,
    },
    /// `NOT expr`.
    Not(Box<Expr>),
}

impl Expr {
    /// String literal.
    #[must_use]
    pub fn str(value: impl Into<String>) -> Self {
        Self::Str(value.into())
    }

    /// Unqualified catalog column.
    #[must_use]
    pub const fn column(name: &'static str) -> Self {
        Self::Column {
            qualifier: None,
            name,
        }
    }

    /// Catalog column qualified by a table alias.
    #[must_use]
    pub const fn qualified(qualifier: &'static str, name: &'static str) -> Self {
        Self::Column {
            qualifier: Some(qualifier),
            name,
        }
    }

    /// Function call.
    #[must_use]
    pub const fn func(name: &'static str, args: Vec<Self>) -> Self {
        Self::Func { name, args }
    }

    /// `concat(..)`.
    #[must_use]
    pub const fn concat(parts: Vec<Self>) -> Self {
        Self::func("concat", parts)
    }

    /// `count(*)`.
    #[must_use]
    pub fn count() -> Self {
        Self::func("count", vec![Self::Star])
    }

    /// `ifnull(self, fallback)`.
    #[must_use]
    pub fn or_else(self, fallback: Self) -> Self {
        Self::func("ifnull", vec![self, fallback])
    }

    /// `group_concat(self SEPARATOR separator)`.
    #[must_use]
    pub fn group_concat(self, separator: &'static str) -> Self {
        Self::GroupConcat {
            distinct: false,
            expr: Box::new(self),
            order_by: None,
            separator,
        }
    }

    /// `group_concat(DISTINCT self SEPARATOR separator)`.
    #[must_use]
    pub fn group_concat_distinct(self, separator: &'static str) -> Self {
        Self::GroupConcat {
            distinct: true,
            expr: Box::new(self),
            order_by: None,
            separator,
        }
    }

    /// `group_concat(self ORDER BY order SEPARATOR separator)`.
    #[must_use]
    pub fn group_concat_ordered(self, order: Self, separator: &'static str) -> Self {
        Self::GroupConcat {
            distinct: false,
            expr: Box::new(self),
            order_by: Some(Box::new(order)),
            separator,
        }
    }

    /// `if(cond, then, otherwise)`.
    #[must_use]
    pub fn if_else(cond: Self, then: Self, otherwise: Self) -> Self {
        Self::If {
            cond: Box::new(cond),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        }
    }

    fn binary(self, op: BinOp, right: Self) -> Self {
        Self::Binary {
            left: Box::new(self),
            op,
            right: Box::new(right),
        }
    }

    /// `self = right`.
    #[must_use]
    pub fn eq(self, right: Self) -> Self {
        self.binary(BinOp::Eq, right)
    }

    /// `self <> right`.
    #[must_use]
    pub fn not_eq(self, right: Self) -> Self {
        self.binary(BinOp::NotEq, right)
    }

    /// `self <=> right`.
    #[must_use]
    pub fn null_safe_eq(self, right: Self) -> Self {
        self.binary(BinOp::NullSafeEq, right)
    }

    /// `self > right`.
    #[must_use]
    pub fn gt(self, right: Self) -> Self {
        self.binary(BinOp::Gt, right)
    }

    /// `self - right`.
    #[must_use]
    pub fn minus(self, right: Self) -> Self {
        self.binary(BinOp::Sub, right)
    }

    /// `self AND right`.
    #[must_use]
    pub fn and(self, right: Self) -> Self {
        self.binary(BinOp::And, right)
    }

    /// `self OR right`.
    #[must_use]
    pub fn or(self, right: Self) -> Self {
        self.binary(BinOp::Or, right)
    }

    /// Conjunction of all `parts`; `None` when empty.
    #[must_use]
    pub fn all(parts: Vec<Self>) -> Option<Self> {
        parts.into_iter().reduce(Self::and)
    }

    /// `self IN (list)`, or a false constant when `list` is empty.
    #[must_use]
    pub fn one_of(self, list: Vec<Self>) -> Self {
        if list.is_empty() {
            return Self::Int(0);
        }
        Self::InList {
            expr: Box::new(self),
            list,
            negated: false,
        }
    }

    /// `self NOT IN (list)`, or a true constant when `list` is empty.
    #[must_use]
    pub fn not_in(self, list: Vec<Self>) -> Self {
        if list.is_empty() {
            return Self::Int(1);
        }
        Self::InList {
            expr: Box::new(self),
            list,
            negated: true,
        }
    }

    /// `self NOT IN (select)`.
    #[must_use]
    pub fn not_in_select(self, select: Select) -> Self {
        Self::InSelect {
            expr: Box::new(self),
            select: Box::new(select),
            negated: true,
        }
    }

    /// `self IS NULL`.
    #[must_use]
    pub fn null(self) -> Self {
        Self::IsNull {
            expr: Box::new(self),
            negated: false,
        }
    }

    /// `self IS NOT NULL`.
    #[must_use]
    pub fn not_null(self) -> Self {
        Self::IsNull {
            expr: Box::new(self),
            negated: true,
        }
    }


    /// `NOT self`.
    #[must_use]
    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// `left(self, char_length(prefix)) = prefix`.
    #[must_use]
    pub fn starts_with(self, prefix: &str) -> Self {
        let length = i64::try_from(prefix.chars().count()).unwrap_or(i64::MAX);
        Self::func("left", vec![self, Self::Int(length)]).eq(Self::str(prefix))
    }
}

impl From<Var> for Expr {
    fn from(var: Var) -> Self {
        Self::Var(var)
    }
}

/// A catalog table in a FROM or JOIN clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    /// Catalog table.
    pub catalog: Catalog,
    /// Alias used to qualify columns.
    pub alias: Option<&'static str>,
}

impl From<Catalog> for Source {
    fn from(catalog: Catalog) -> Self {
        Self {
            catalog,
            alias: None,
        }
    }
}

/// A catalog query, optionally storing its single row into variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Select {
    /// Projected expressions.
    pub columns: Vec<Expr>,
    /// Variables receiving the projection.
    pub into: Vec<Var>,
    /// FROM source.
    pub from: Option<Source>,
    /// INNER JOINs with their ON expression.
    pub joins: Vec<(Source, Expr)>,
    /// WHERE clause.
    pub filter: Option<Expr>,
}

impl Select {
    /// `SELECT columns`.
    #[must_use]
    pub const fn new(columns: Vec<Expr>) -> Self {
        Self {
            columns,
            into: Vec::new(),
            from: None,
            joins: Vec::new(),
            filter: None,
        }
    }

    /// `INTO @vars`.
    #[must_use]
    pub fn into_vars(mut self, vars: &[Var]) -> Self {
        self.into = vars.to_vec();
        self
    }

    /// `FROM catalog`.
    #[must_use]
    pub fn from(mut self, catalog: Catalog) -> Self {
        self.from = Some(catalog.into());
        self
    }

    /// `FROM catalog AS alias`.
    #[must_use]
    pub fn from_as(mut self, catalog: Catalog, alias: &'static str) -> Self {
        self.from = Some(Source {
            catalog,
            alias: Some(alias),
        });
        self
    }

    /// `INNER JOIN catalog AS alias ON on`.
    #[must_use]
    pub fn join_as(mut self, catalog: Catalog, alias: &'static str, on: Expr) -> Self {
        self.joins.push((
            Source {
                catalog,
                alias: Some(alias),
            },
            on,
        ));
        self
    }

    /// `WHERE filter`.
    #[must_use]
    pub fn filter(mut self, filter: Expr) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// A statement of the emitted script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    /// `SET @var = expr;`
    Set(Var, Expr),
    /// `SET [SESSION] name = expr;` for a system variable.
    SetSystem(&'static str, Expr),
    /// `SELECT ..;`, usually `SELECT .. INTO @var`.
    Select(Select),
    /// Prepare, execute and deallocate the statement held in a variable.
    Execute(Var),
}

/// Mode-dependent tail appended to every applying step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tail {
    /// Surface the computed statement as a result row.
    pub report: bool,
    /// Execute the computed statement.
    pub execute: bool,
}

/// No-op statement a step computes when the live state already matches.
pub const NO_OP: &str = "SELECT 0";

/// One self-contained reconciliation unit.
///
/// The body reads live metadata into variables; `apply` then computes the
/// statement to run (or [`NO_OP`]) into `@qry`. Steps without `apply` only
/// prepare session state and get no tail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Ordering phase.
    pub phase: Phase,
    /// Human-readable label, also used in report rows.
    pub label: String,
    /// Statements preparing the live comparison.
    pub body: Vec<Stmt>,
    /// Expression computing the corrective statement.
    pub apply: Option<Expr>,
}

impl Step {
    /// Creates an empty step.
    #[must_use]
    pub fn new(phase: Phase, label: impl Into<String>) -> Self {
        Self {
            phase,
            label: label.into(),
            body: Vec::new(),
            apply: None,
        }
    }

    /// Appends a body statement.
    #[must_use]
    pub fn stmt(mut self, stmt: Stmt) -> Self {
        self.body.push(stmt);
        self
    }

    /// Appends `SELECT .. INTO ..`.
    #[must_use]
    pub fn select(self, select: Select) -> Self {
        self.stmt(Stmt::Select(select))
    }

    /// Appends `SET @var = expr`.
    #[must_use]
    pub fn set(self, var: Var, expr: Expr) -> Self {
        self.stmt(Stmt::Set(var, expr))
    }

    /// Sets the expression computing the corrective statement.
    #[must_use]
    pub fn apply(mut self, expr: Expr) -> Self {
        self.apply = Some(expr);
        self
    }

    /// Applies `statement` unless `noop` holds at execution time.
    #[must_use]
    pub fn apply_unless(self, noop: Expr, statement: Expr) -> Self {
        self.apply(Expr::if_else(noop, Expr::str(NO_OP), statement))
    }
}

/// A full script ready to render.
#[derive(Debug, Clone, Copy)]
pub struct Script<'a> {
    /// Session setup run before any step.
    pub prelude: &'a [Stmt],
    /// Ordered steps.
    pub steps: &'a [Step],
    /// Tail appended to every applying step.
    pub tail: Tail,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_lists_fold_to_constants() {
        assert_eq!(Expr::column("A").one_of(vec![]), Expr::Int(0));
        assert_eq!(Expr::column("A").not_in(vec![]), Expr::Int(1));
    }

    #[test]
    fn all_folds_conjunctions() {
        assert_eq!(Expr::all(vec![]), None);
        assert_eq!(Expr::all(vec![Expr::Int(1)]), Some(Expr::Int(1)));
        assert_eq!(
            Expr::all(vec![Expr::Int(1), Expr::Int(2)]),
            Some(Expr::Int(1).and(Expr::Int(2)))
        );
    }
}
