//! Declared schema and permission types.
//!
//! These are the inputs of one compile call. They describe the desired
//! state of a MySQL database: tables with their columns, keys, foreign
//! keys, views and seed rows, plus the users that may access them.
//!
//! Field names on the wire follow the established declaration format
//! (`null`, `auto`, `foreign-keys`, ...); the descriptive spellings are
//! accepted as aliases.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::script::quote_literal;

/// Storage engine used when a table does not name one.
pub const DEFAULT_ENGINE: &str = "InnoDB";

/// Host part of a client account when none is declared.
pub const DEFAULT_HOST: &str = "%";

/// Key type string that designates the primary key.
pub const PRIMARY_KEY_TYPE: &str = "primary key";

/// The only name MySQL accepts for a primary key.
pub const PRIMARY_KEY_NAME: &str = "PRIMARY";

fn default_engine() -> String {
    DEFAULT_ENGINE.to_string()
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

/// A complete declaration document: target database, tables and clients.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    /// Target database (schema) name.
    #[serde(default)]
    pub database: Option<String>,
    /// Declared tables, in order.
    #[serde(default)]
    pub tables: Vec<TableSpec>,
    /// Declared database users.
    #[serde(default)]
    pub clients: Vec<ClientSpec>,
}

/// A declared table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSpec {
    /// Stable identity, stored as the table comment.
    pub id: String,
    /// Display name; may change between compiles.
    pub name: String,
    /// Storage engine.
    #[serde(default = "default_engine")]
    pub engine: String,
    /// Columns in physical order.
    #[serde(default)]
    pub columns: Vec<ColumnSpec>,
    /// Indexes, matched by name.
    #[serde(default)]
    pub keys: Vec<KeySpec>,
    /// Foreign keys, matched by name.
    #[serde(default, rename = "foreign-keys", alias = "foreignKeys")]
    pub foreign_keys: Vec<ForeignKeySpec>,
    /// Views based on this table.
    #[serde(default)]
    pub views: Vec<ViewSpec>,
    /// Seed rows inserted while the table is empty.
    #[serde(default)]
    pub rows: Option<Vec<RowSpec>>,
}

impl TableSpec {
    /// Creates a table with the default engine and no members.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            engine: default_engine(),
            columns: Vec::new(),
            keys: Vec::new(),
            foreign_keys: Vec::new(),
            views: Vec::new(),
            rows: None,
        }
    }

    /// Sets the storage engine.
    #[must_use]
    pub fn engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = engine.into();
        self
    }

    /// Appends a column.
    #[must_use]
    pub fn column(mut self, column: ColumnSpec) -> Self {
        self.columns.push(column);
        self
    }

    /// Adds a key.
    #[must_use]
    pub fn key(mut self, key: KeySpec) -> Self {
        self.keys.push(key);
        self
    }

    /// Adds a foreign key.
    #[must_use]
    pub fn foreign_key(mut self, foreign_key: ForeignKeySpec) -> Self {
        self.foreign_keys.push(foreign_key);
        self
    }

    /// Appends a view.
    #[must_use]
    pub fn view(mut self, view: ViewSpec) -> Self {
        self.views.push(view);
        self
    }

    /// Appends a seed row.
    #[must_use]
    pub fn row(mut self, row: RowSpec) -> Self {
        self.rows.get_or_insert_with(Vec::new).push(row);
        self
    }

    /// Seed rows, empty when none are declared.
    #[must_use]
    pub fn seed_rows(&self) -> &[RowSpec] {
        self.rows.as_deref().unwrap_or_default()
    }

    /// Looks up a column by name.
    #[must_use]
    pub fn get_column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// A declared column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Stable identity, stored as the column comment.
    pub id: String,
    /// Column name.
    pub name: String,
    /// Raw MySQL type expression, e.g. `int unsigned`.
    #[serde(rename = "type")]
    pub sql_type: String,
    /// Whether NULL is allowed.
    #[serde(default, rename = "null", alias = "nullable")]
    pub nullable: bool,
    /// Default expression. `None` emits no DEFAULT clause.
    #[serde(default)]
    pub default: Option<String>,
    /// Whether the column auto-increments.
    #[serde(default, rename = "auto", alias = "autoIncrement")]
    pub auto_increment: bool,
}

impl ColumnSpec {
    /// Creates a NOT NULL column without default.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            sql_type: sql_type.into(),
            nullable: false,
            default: None,
            auto_increment: false,
        }
    }

    /// Allows NULL values.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Sets the default expression.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Marks the column as auto-increment.
    #[must_use]
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }
}

/// A declared index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySpec {
    /// Index name; also its identity.
    pub name: String,
    /// Index kind as written in DDL, e.g. `primary key`, `unique key`, `key`.
    #[serde(rename = "type")]
    pub key_type: String,
    /// Indexed columns, in order.
    pub columns: Vec<String>,
}

impl KeySpec {
    /// Creates the primary key over `columns`.
    #[must_use]
    pub fn primary(columns: &[&str]) -> Self {
        Self {
            name: PRIMARY_KEY_NAME.to_string(),
            key_type: PRIMARY_KEY_TYPE.to_string(),
            columns: columns.iter().map(ToString::to_string).collect(),
        }
    }

    /// Creates a key of arbitrary kind.
    #[must_use]
    pub fn new(name: impl Into<String>, key_type: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            key_type: key_type.into(),
            columns: columns.iter().map(ToString::to_string).collect(),
        }
    }

    /// Classifies the declared key type.
    #[must_use]
    pub fn kind(&self) -> KeyKind {
        KeyKind::classify(&self.key_type)
    }
}

/// Broad classification of a declared key type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    /// `primary key`.
    Primary,
    /// Any key type mentioning `unique`.
    Unique,
    /// Any other index kind (plain, fulltext, spatial).
    Index,
}

impl KeyKind {
    /// Classifies a key type string, case-insensitively.
    #[must_use]
    pub fn classify(key_type: &str) -> Self {
        let normalized = normalize_words(key_type).to_ascii_lowercase();
        if normalized == PRIMARY_KEY_TYPE {
            Self::Primary
        } else if normalized.split(' ').any(|w| w == "unique") {
            Self::Unique
        } else {
            Self::Index
        }
    }

    /// Whether MySQL reports this kind with `NON_UNIQUE = 0`.
    #[must_use]
    pub const fn is_unique(self) -> bool {
        matches!(self, Self::Primary | Self::Unique)
    }
}

/// A declared foreign key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeySpec {
    /// Constraint name; also its identity.
    pub name: String,
    /// Local columns, in order.
    pub columns: Vec<String>,
    /// Referenced table name.
    pub table: String,
    /// Referenced columns, positionally matching `columns`.
    #[serde(rename = "keys", alias = "references")]
    pub references: Vec<String>,
    /// ON DELETE action.
    #[serde(rename = "delete", alias = "onDelete")]
    pub on_delete: String,
    /// ON UPDATE action.
    #[serde(rename = "update", alias = "onUpdate")]
    pub on_update: String,
}

impl ForeignKeySpec {
    /// Creates a foreign key with `RESTRICT` actions.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        columns: &[&str],
        table: impl Into<String>,
        references: &[&str],
    ) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(ToString::to_string).collect(),
            table: table.into(),
            references: references.iter().map(ToString::to_string).collect(),
            on_delete: "RESTRICT".to_string(),
            on_update: "RESTRICT".to_string(),
        }
    }

    /// Sets the ON DELETE action.
    #[must_use]
    pub fn on_delete(mut self, action: impl Into<String>) -> Self {
        self.on_delete = action.into();
        self
    }

    /// Sets the ON UPDATE action.
    #[must_use]
    pub fn on_update(mut self, action: impl Into<String>) -> Self {
        self.on_update = action.into();
        self
    }

    /// ON DELETE action in the spelling `REFERENTIAL_CONSTRAINTS` uses.
    #[must_use]
    pub fn delete_rule(&self) -> String {
        normalize_words(&self.on_delete).to_ascii_uppercase()
    }

    /// ON UPDATE action in the spelling `REFERENTIAL_CONSTRAINTS` uses.
    #[must_use]
    pub fn update_rule(&self) -> String {
        normalize_words(&self.on_update).to_ascii_uppercase()
    }
}

/// A declared view over its owning table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewSpec {
    /// View name.
    pub name: String,
    /// Projected columns of the base table.
    #[serde(default)]
    pub columns: Vec<String>,
    /// Joins, applied in order.
    #[serde(default)]
    pub joins: Vec<JoinSpec>,
}

impl ViewSpec {
    /// Creates a view projecting `columns` of the base table.
    #[must_use]
    pub fn new(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(ToString::to_string).collect(),
            joins: Vec::new(),
        }
    }

    /// Appends a join.
    #[must_use]
    pub fn join(mut self, join: JoinSpec) -> Self {
        self.joins.push(join);
        self
    }
}

/// A join inside a view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinSpec {
    /// `inner`, `left outer` or `right outer`.
    #[serde(rename = "type")]
    pub join_type: String,
    /// Joined table name.
    pub table: String,
    /// Alias of the joined table.
    pub alias: String,
    /// ON conditions, combined with AND.
    pub on: Vec<JoinCondition>,
    /// Projected columns of the joined table.
    #[serde(default)]
    pub columns: Vec<JoinColumn>,
}

impl JoinSpec {
    /// Creates a join without conditions or projected columns.
    #[must_use]
    pub fn new(
        join_type: impl Into<String>,
        table: impl Into<String>,
        alias: impl Into<String>,
    ) -> Self {
        Self {
            join_type: join_type.into(),
            table: table.into(),
            alias: alias.into(),
            on: Vec::new(),
            columns: Vec::new(),
        }
    }

    /// Adds the condition `` `table`.`column` = `alias`.`join_column` ``.
    #[must_use]
    pub fn on(
        mut self,
        table: impl Into<String>,
        column: impl Into<String>,
        join_column: impl Into<String>,
    ) -> Self {
        self.on.push(JoinCondition {
            table: table.into(),
            column: column.into(),
            join_column: join_column.into(),
        });
        self
    }

    /// Projects `name` of the joined table as `alias`.
    #[must_use]
    pub fn select(mut self, name: impl Into<String>, alias: impl Into<String>) -> Self {
        self.columns.push(JoinColumn {
            name: name.into(),
            alias: alias.into(),
        });
        self
    }

    /// Parses the declared join type.
    #[must_use]
    pub fn kind(&self) -> Option<JoinKind> {
        JoinKind::parse(&self.join_type)
    }
}

/// One equality in a join's ON clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinCondition {
    /// Left-hand table (the base table or an earlier alias).
    pub table: String,
    /// Left-hand column.
    pub column: String,
    /// Column of the joined table.
    #[serde(rename = "join-column", alias = "joinColumn")]
    pub join_column: String,
}

/// A projected column of a joined table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinColumn {
    /// Column of the joined table.
    pub name: String,
    /// Name it takes in the view.
    pub alias: String,
}

/// Supported join kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinKind {
    /// `INNER JOIN`.
    Inner,
    /// `LEFT OUTER JOIN`.
    LeftOuter,
    /// `RIGHT OUTER JOIN`.
    RightOuter,
}

impl JoinKind {
    /// Parses `inner`, `left outer` or `right outer`, case-insensitively.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match normalize_words(value).to_ascii_lowercase().as_str() {
            "inner" => Some(Self::Inner),
            "left outer" => Some(Self::LeftOuter),
            "right outer" => Some(Self::RightOuter),
            _ => None,
        }
    }

    /// SQL keywords preceding `JOIN`.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Inner => "INNER",
            Self::LeftOuter => "LEFT OUTER",
            Self::RightOuter => "RIGHT OUTER",
        }
    }
}

/// A seed row: column name to literal value.
pub type RowSpec = BTreeMap<String, String>;

/// A declared database user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSpec {
    /// User name.
    pub user: String,
    /// Host part of the account.
    #[serde(default = "default_host")]
    pub host: String,
    /// Per-table permissions.
    #[serde(default)]
    pub permissions: Vec<PermissionSpec>,
}

impl ClientSpec {
    /// Creates a client connecting from any host.
    #[must_use]
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            host: default_host(),
            permissions: Vec::new(),
        }
    }

    /// Grants `operations` on `subject`.
    #[must_use]
    pub fn permission(mut self, subject: impl Into<String>, operations: &[Privilege]) -> Self {
        self.permissions.push(PermissionSpec {
            subject: subject.into(),
            operations: operations.to_vec(),
        });
        self
    }

    /// The account as written in `GRANT`/`REVOKE`, each part an escaped
    /// string literal.
    #[must_use]
    pub fn account(&self) -> String {
        format!("{}@{}", quote_literal(&self.user), quote_literal(&self.host))
    }

    /// The account as `TABLE_PRIVILEGES.GRANTEE` spells it, unescaped.
    #[must_use]
    pub fn grantee(&self) -> String {
        format!("'{}'@'{}'", self.user, self.host)
    }
}

/// Operations granted on one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSpec {
    /// Table (or view) name.
    pub subject: String,
    /// Granted operations.
    #[serde(default)]
    pub operations: Vec<Privilege>,
}

/// The table privileges managed by the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Privilege {
    /// `SELECT`.
    #[serde(alias = "SELECT", alias = "select")]
    Select,
    /// `INSERT`.
    #[serde(alias = "INSERT", alias = "insert")]
    Insert,
    /// `UPDATE`.
    #[serde(alias = "UPDATE", alias = "update")]
    Update,
    /// `DELETE`.
    #[serde(alias = "DELETE", alias = "delete")]
    Delete,
}

impl Privilege {
    /// Every managed privilege, in canonical order.
    pub const ALL: [Self; 4] = [Self::Select, Self::Insert, Self::Update, Self::Delete];

    /// Privilege name as `TABLE_PRIVILEGES.PRIVILEGE_TYPE` reports it.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Select => "SELECT",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

/// Collapses runs of whitespace to single spaces and trims the ends.
#[must_use]
pub fn normalize_words(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_kind_classification() {
        assert_eq!(KeyKind::classify("primary key"), KeyKind::Primary);
        assert_eq!(KeyKind::classify("PRIMARY  KEY"), KeyKind::Primary);
        assert_eq!(KeyKind::classify("unique key"), KeyKind::Unique);
        assert_eq!(KeyKind::classify("key"), KeyKind::Index);
        assert_eq!(KeyKind::classify("fulltext key"), KeyKind::Index);
        assert!(KeyKind::Primary.is_unique());
        assert!(!KeyKind::Index.is_unique());
    }

    #[test]
    fn join_kind_parsing() {
        assert_eq!(JoinKind::parse("inner"), Some(JoinKind::Inner));
        assert_eq!(JoinKind::parse("Left  Outer"), Some(JoinKind::LeftOuter));
        assert_eq!(JoinKind::parse("right outer"), Some(JoinKind::RightOuter));
        assert_eq!(JoinKind::parse("full outer"), None);
        assert_eq!(JoinKind::parse("cross"), None);
    }

    #[test]
    fn foreign_key_rules_are_normalized() {
        let fk = ForeignKeySpec::new("fk", &["a"], "t", &["b"])
            .on_delete("set  null")
            .on_update("cascade");
        assert_eq!(fk.delete_rule(), "SET NULL");
        assert_eq!(fk.update_rule(), "CASCADE");
    }

    #[test]
    fn account_quoting() {
        let client = ClientSpec::new("reader");
        assert_eq!(client.account(), "'reader'@'%'");
        assert_eq!(client.grantee(), "'reader'@'%'");
    }

    #[test]
    fn account_parts_are_escaped_literals() {
        let client = ClientSpec {
            host: "@localhost WITH GRANT OPTION #".to_string(),
            ..ClientSpec::new(r"x\")
        };
        assert_eq!(client.account(), r"'x\\'@'@localhost WITH GRANT OPTION #'");
        assert_eq!(client.grantee(), r"'x\'@'@localhost WITH GRANT OPTION #'");
    }

    #[test]
    fn deserializes_original_wire_names() {
        let json = r#"{
            "id": "t1",
            "name": "users",
            "columns": [
                {"id": "c1", "name": "id", "type": "int unsigned", "null": false, "auto": true},
                {"id": "c2", "name": "age", "type": "int", "null": true, "default": "0"}
            ],
            "keys": [{"name": "PRIMARY", "type": "primary key", "columns": ["id"]}],
            "foreign-keys": [{
                "name": "fk_org", "columns": ["org"], "table": "orgs",
                "keys": ["id"], "delete": "cascade", "update": "restrict"
            }]
        }"#;
        let table: TableSpec = serde_json::from_str(json).unwrap();
        assert_eq!(table.engine, DEFAULT_ENGINE);
        assert!(table.columns[0].auto_increment);
        assert!(table.columns[1].nullable);
        assert_eq!(table.columns[1].default.as_deref(), Some("0"));
        assert_eq!(table.foreign_keys[0].references, vec!["id"]);
        assert!(table.rows.is_none());
        assert!(table.seed_rows().is_empty());
    }

    #[test]
    fn deserializes_descriptive_aliases() {
        let json = r#"{
            "user": "app",
            "permissions": [{"subject": "users", "operations": ["Select", "INSERT"]}]
        }"#;
        let client: ClientSpec = serde_json::from_str(json).unwrap();
        assert_eq!(client.host, DEFAULT_HOST);
        assert_eq!(
            client.permissions[0].operations,
            vec![Privilege::Select, Privilege::Insert]
        );

        let column: ColumnSpec = serde_json::from_str(
            r#"{"id": "c", "name": "n", "type": "int", "nullable": true, "autoIncrement": true}"#,
        )
        .unwrap();
        assert!(column.nullable);
        assert!(column.auto_increment);
    }
}
