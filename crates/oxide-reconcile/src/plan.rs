//! Plan assembly and compilation.
//!
//! [`plan`] validates a declaration and lays out every reconciliation
//! step in dependency order; [`compile`] renders that plan to a single
//! MySQL script. Each phase runs over all tables before the next one
//! starts, so structural dependencies hold across tables:
//!
//! 1. target database
//! 2. tables, created under their staging name when missing
//! 3. undeclared views dropped
//! 4. two-phase table renames, undeclared tables parked
//! 5. storage engines
//! 6. columns added, parked and renamed
//! 7. stale foreign keys dropped
//! 8. column definitions and order
//! 9. indexes, then pending auto-increment columns
//! 10. parked columns and tables dropped
//! 11. foreign keys created
//! 12. views created or replaced when their definition differs
//! 13. seed rows
//! 14. users and privileges

use std::fmt;

use tracing::{debug, info, warn};

use crate::declaration::{ClientSpec, TableSpec};
use crate::error::Result;
use crate::phases::{self, Target};
use crate::script::{Expr, Script, Step, Stmt, Tail, Var};
use crate::validate::validate;

/// Size of the session `group_concat` buffer used by catalog aggregations.
const GROUP_CONCAT_MAX_LEN: i64 = 1_048_576;

/// The ordering phases of a reconciliation script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    /// Ensure the target database exists.
    Database,
    /// Ensure every declared table exists.
    Tables,
    /// Drop views no longer declared.
    DropViews,
    /// Rename tables to their declared names; park undeclared ones.
    RenameTables,
    /// Correct storage engines.
    Engines,
    /// Add, park and rename columns.
    Columns,
    /// Drop undeclared or changed foreign keys.
    DropForeignKeys,
    /// Rewrite column definitions and positions.
    ModifyColumns,
    /// Reconcile indexes.
    Indexes,
    /// Drop parked columns and tables.
    DropMarked,
    /// Create missing foreign keys.
    CreateForeignKeys,
    /// Create or replace views.
    Views,
    /// Insert seed rows into empty tables.
    Rows,
    /// Reconcile users and privileges.
    Clients,
}

impl Phase {
    /// Every phase, in execution order.
    pub const ALL: [Self; 14] = [
        Self::Database,
        Self::Tables,
        Self::DropViews,
        Self::RenameTables,
        Self::Engines,
        Self::Columns,
        Self::DropForeignKeys,
        Self::ModifyColumns,
        Self::Indexes,
        Self::DropMarked,
        Self::CreateForeignKeys,
        Self::Views,
        Self::Rows,
        Self::Clients,
    ];

    /// 1-based position in the script.
    #[must_use]
    pub const fn number(self) -> usize {
        self as usize + 1
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Database => "database",
            Self::Tables => "tables",
            Self::DropViews => "drop views",
            Self::RenameTables => "rename tables",
            Self::Engines => "engines",
            Self::Columns => "columns",
            Self::DropForeignKeys => "drop foreign keys",
            Self::ModifyColumns => "modify columns",
            Self::Indexes => "indexes",
            Self::DropMarked => "drop marked",
            Self::CreateForeignKeys => "create foreign keys",
            Self::Views => "views",
            Self::Rows => "rows",
            Self::Clients => "clients",
        };
        f.write_str(name)
    }
}

/// How the compiled script treats each computed statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompileOptions {
    /// Surface every computed statement as a result row.
    pub report: bool,
    /// Compute statements without executing them.
    pub dry_run: bool,
}

impl CompileOptions {
    /// Execute every statement, without reporting.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            report: false,
            dry_run: false,
        }
    }

    /// Sets report mode.
    #[must_use]
    pub const fn report(mut self, report: bool) -> Self {
        self.report = report;
        self
    }

    /// Sets dry-run mode.
    #[must_use]
    pub const fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    const fn tail(self) -> Tail {
        Tail {
            report: self.report,
            execute: !self.dry_run,
        }
    }
}

/// An ordered, not yet rendered reconciliation script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    prelude: Vec<Stmt>,
    steps: Vec<Step>,
}

impl Plan {
    /// Session setup emitted before the first step.
    #[must_use]
    pub fn prelude(&self) -> &[Stmt] {
        &self.prelude
    }

    /// All steps, in execution order.
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Steps of one phase.
    pub fn phase(&self, phase: Phase) -> impl Iterator<Item = &Step> {
        self.steps.iter().filter(move |step| step.phase == phase)
    }

    /// Renders the script.
    #[must_use]
    pub fn render(&self, options: CompileOptions) -> String {
        Script {
            prelude: &self.prelude,
            steps: &self.steps,
            tail: options.tail(),
        }
        .to_string()
    }
}

fn prelude() -> Vec<Stmt> {
    vec![
        Stmt::Set(Var::SAVED_FK_CHECKS, Expr::System("foreign_key_checks")),
        Stmt::SetSystem("foreign_key_checks", Expr::Int(0)),
        Stmt::SetSystem(
            "SESSION group_concat_max_len",
            Expr::Int(GROUP_CONCAT_MAX_LEN),
        ),
    ]
}

/// Validates the declaration and lays out the reconciliation steps.
///
/// # Errors
///
/// Returns the first [`ValidationError`](crate::ValidationError) found in
/// declaration order; no plan is produced in that case.
pub fn plan(database: &str, tables: &[TableSpec], clients: &[ClientSpec]) -> Result<Plan> {
    if let Err(err) = validate(database, tables, clients) {
        warn!(database = %database, error = %err, "Declaration rejected");
        return Err(err);
    }

    let target = Target::new(database);
    let mut steps = Vec::new();
    let mut emit = |phase: Phase, emitted: Vec<Step>| {
        debug!(phase = %phase, steps = emitted.len(), "Emitted phase");
        steps.extend(emitted);
    };

    emit(Phase::Database, vec![phases::database::ensure(target)]);
    emit(Phase::Tables, phases::tables::ensure(target, tables));
    emit(
        Phase::DropViews,
        vec![phases::views::drop_undeclared(target, tables)],
    );
    emit(Phase::RenameTables, phases::tables::rename(target, tables));
    emit(Phase::Engines, phases::tables::engines(target, tables));
    emit(
        Phase::Columns,
        phases::columns::reconcile_names(target, tables),
    );
    emit(
        Phase::DropForeignKeys,
        phases::foreign_keys::drop_stale(target, tables),
    );
    emit(Phase::ModifyColumns, phases::columns::modify(target, tables));
    emit(Phase::Indexes, phases::indexes::reconcile(target, tables));
    let mut dropped = phases::columns::drop_marked(target, tables);
    dropped.push(phases::tables::drop_marked(target));
    emit(Phase::DropMarked, dropped);
    emit(
        Phase::CreateForeignKeys,
        phases::foreign_keys::create(target, tables),
    );
    emit(Phase::Views, phases::views::create(target, tables));
    emit(Phase::Rows, phases::rows::seed(target, tables));
    emit(
        Phase::Clients,
        phases::clients::reconcile(target, clients),
    );

    info!(
        database = %database,
        tables = tables.len(),
        clients = clients.len(),
        steps = steps.len(),
        "Planned reconciliation"
    );

    Ok(Plan {
        prelude: prelude(),
        steps,
    })
}

/// Compiles a declaration into one idempotent MySQL reconciliation script.
///
/// # Errors
///
/// Returns the first [`ValidationError`](crate::ValidationError) found in
/// declaration order; no text is produced in that case.
pub fn compile(
    database: &str,
    tables: &[TableSpec],
    clients: &[ClientSpec],
    options: CompileOptions,
) -> Result<String> {
    Ok(plan(database, tables, clients)?.render(options))
}
