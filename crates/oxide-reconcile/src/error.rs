//! Error types for declaration validation.

use std::fmt;

/// The kind of declared object an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    /// The target database.
    Database,
    /// A table.
    Table,
    /// A column.
    Column,
    /// An index.
    Key,
    /// A foreign key.
    ForeignKey,
    /// A view.
    View,
    /// A join inside a view.
    Join,
    /// A seed row.
    Row,
    /// A database user.
    Client,
    /// A permission of a user.
    Permission,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Database => "database",
            Self::Table => "table",
            Self::Column => "column",
            Self::Key => "key",
            Self::ForeignKey => "foreign key",
            Self::View => "view",
            Self::Join => "join",
            Self::Row => "row",
            Self::Client => "client",
            Self::Permission => "permission",
        };
        f.write_str(name)
    }
}

/// A declaration that cannot be compiled.
///
/// Validation stops at the first violation; no script is produced.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// A value contains a backtick or a single quote.
    #[error("{entity} {field} contains a forbidden quoting character: {value}")]
    SanitizeViolation {
        /// Object the value belongs to.
        entity: Entity,
        /// Field holding the value.
        field: &'static str,
        /// The offending value.
        value: String,
    },

    /// A table or column name starts with the staging prefix, or with the
    /// drop marker once staged.
    #[error("{entity} name '{name}' uses the reserved prefix")]
    ReservedPrefixViolation {
        /// Table or column.
        entity: Entity,
        /// The offending name.
        name: String,
    },

    /// An identity (or name) is declared twice in the same scope.
    #[error("duplicate {entity} {field} '{value}'")]
    DuplicateIdentity {
        /// Object kind.
        entity: Entity,
        /// `id` or `name`.
        field: &'static str,
        /// The repeated value.
        value: String,
    },

    /// A key lists no columns.
    #[error("key '{key}' on table '{table}' has no columns")]
    EmptyKeyColumns {
        /// Owning table.
        table: String,
        /// Key name.
        key: String,
    },

    /// A foreign key lists no local columns.
    #[error("foreign key '{foreign_key}' on table '{table}' has no columns")]
    EmptyForeignKeyColumns {
        /// Owning table.
        table: String,
        /// Constraint name.
        foreign_key: String,
    },

    /// A foreign key lists no referenced columns.
    #[error("foreign key '{foreign_key}' on table '{table}' references no columns")]
    EmptyForeignKeyReferences {
        /// Owning table.
        table: String,
        /// Constraint name.
        foreign_key: String,
    },

    /// Local and referenced column counts differ.
    #[error(
        "foreign key '{foreign_key}' on table '{table}' maps {columns} column(s) to {references} reference(s)"
    )]
    ForeignKeyArityMismatch {
        /// Owning table.
        table: String,
        /// Constraint name.
        foreign_key: String,
        /// Number of local columns.
        columns: usize,
        /// Number of referenced columns.
        references: usize,
    },

    /// A primary key is not named `PRIMARY`.
    #[error("primary key on table '{table}' must be named PRIMARY, found '{name}'")]
    InvalidPrimaryKeyName {
        /// Owning table.
        table: String,
        /// Declared name.
        name: String,
    },

    /// A join type outside `inner`, `left outer`, `right outer`.
    #[error("view '{view}' uses unsupported join type '{join_type}'")]
    InvalidJoinType {
        /// View name.
        view: String,
        /// Declared join type.
        join_type: String,
    },

    /// A column without identity.
    #[error("column '{column}' on table '{table}' has no id")]
    MissingColumnId {
        /// Owning table.
        table: String,
        /// Column name.
        column: String,
    },

    /// A table without identity.
    #[error("table '{table}' has no id")]
    MissingTableId {
        /// Table name.
        table: String,
    },
}

/// Result type for validation and compilation.
pub type Result<T> = std::result::Result<T, ValidationError>;
