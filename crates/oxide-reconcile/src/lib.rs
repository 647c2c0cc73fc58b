//! Declarative MySQL schema reconciliation.
//!
//! `oxide-reconcile` compiles a declared schema (tables, columns, keys,
//! foreign keys, views, seed rows) and a list of database users into a
//! single SQL script. Run against a live server, the script brings the
//! database in line with the declaration:
//! - Missing objects are created, differing ones altered, undeclared ones removed
//! - Tables and columns keep their data across renames, tracked by a stable id
//! - Every step re-reads the catalog before acting, so the script can be re-run
//!
//! Compilation is pure. Nothing here connects to a database; all live-state
//! comparison is embedded in the emitted script and evaluated by the server.
//!
//! # Architecture
//!
//! - **Declaration** - The declared schema and clients, deserializable from JSON
//! - **Validator** - Rejects malformed or unsafe declarations before any output
//! - **Script** - A small typed statement tree rendered once to MySQL text
//! - **Phases** - Step emitters, one per group of reconciliation phases
//! - **Plan** - Orders the steps and renders them with the chosen execution tail
//!
//! # Example
//!
//! ```rust
//! use oxide_reconcile::prelude::*;
//!
//! let users = TableSpec::new("t1", "users")
//!     .column(ColumnSpec::new("c1", "name", "varchar(50)"))
//!     .column(ColumnSpec::new("c2", "age", "int").nullable());
//!
//! let script = compile("app", &[users], &[], CompileOptions::new().report(true)).unwrap();
//! assert!(script.contains("CREATE TABLE `app`.`_sql_users`"));
//! ```

pub mod declaration;
pub mod error;
pub mod naming;
mod phases;
pub mod plan;
pub mod script;
pub mod validate;

pub use error::{Entity, Result, ValidationError};
pub use plan::{compile, plan, CompileOptions, Phase, Plan};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::declaration::{
        ClientSpec, ColumnSpec, Declaration, ForeignKeySpec, JoinColumn, JoinCondition, JoinKind,
        JoinSpec, KeyKind, KeySpec, PermissionSpec, Privilege, RowSpec, TableSpec, ViewSpec,
    };
    pub use crate::error::{Entity, Result, ValidationError};
    pub use crate::plan::{compile, plan, CompileOptions, Phase, Plan};
    pub use crate::validate::validate;
}
