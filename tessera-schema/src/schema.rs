//! Canonical structural schema.
//!
//! These types are the only shape the migration engine diffs. They carry no
//! presentation metadata; see [`crate::annotations`] for that.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Storage kind of a persisted column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DataKind {
    /// Variable-length string.
    String,
    /// Unbounded text.
    Text,
    /// 32-bit integer.
    Integer,
    /// 64-bit integer.
    BigInteger,
    /// Floating point number.
    Float,
    /// Fixed-precision decimal.
    Decimal,
    /// Boolean.
    Boolean,
    /// Calendar date.
    Date,
    /// Date and time.
    DateTime,
    /// JSON document.
    Json,
    /// UUID.
    Uuid,
    /// Any other storage kind, kept verbatim.
    Other(SmolStr),
}

impl DataKind {
    /// Get the canonical name of this kind.
    pub fn as_str(&self) -> &str {
        match self {
            Self::String => "string",
            Self::Text => "text",
            Self::Integer => "integer",
            Self::BigInteger => "big_integer",
            Self::Float => "float",
            Self::Decimal => "decimal",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::Json => "json",
            Self::Uuid => "uuid",
            Self::Other(name) => name.as_str(),
        }
    }

    /// Parse a kind name. Unknown names become [`DataKind::Other`].
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "string" => Self::String,
            "text" => Self::Text,
            "integer" | "int" => Self::Integer,
            "big_integer" | "bigint" => Self::BigInteger,
            "float" | "double" => Self::Float,
            "decimal" => Self::Decimal,
            "boolean" | "bool" => Self::Boolean,
            "date" => Self::Date,
            "datetime" | "timestamp" => Self::DateTime,
            "json" => Self::Json,
            "uuid" => Self::Uuid,
            _ => Self::Other(SmolStr::new(name)),
        }
    }
}

impl From<String> for DataKind {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<DataKind> for String {
    fn from(value: DataKind) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A literal column default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DefaultValue {
    /// Boolean literal.
    Bool(bool),
    /// Integer literal.
    Integer(i64),
    /// Float literal.
    Float(f64),
    /// String literal or expression.
    String(String),
}

impl fmt::Display for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{}", v),
            Self::Integer(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::String(v) => write!(f, "{:?}", v),
        }
    }
}

/// A persisted column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    /// Column name (its identity).
    pub name: String,
    /// Storage kind.
    pub kind: DataKind,
    /// Whether NULL is allowed.
    #[serde(default)]
    pub nullable: bool,
    /// Default value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultValue>,
    /// Whether values must be unique.
    #[serde(default)]
    pub unique: bool,
    /// Whether the column is part of the primary key.
    #[serde(default)]
    pub primary_key: bool,
    /// Table referenced when this column is a foreign key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<String>,
}

impl ColumnDefinition {
    /// Create a non-null column with no constraints.
    pub fn new(name: impl Into<String>, kind: DataKind) -> Self {
        Self {
            name: name.into(),
            kind,
            nullable: false,
            default: None,
            unique: false,
            primary_key: false,
            references: None,
        }
    }

    /// Allow NULL values.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Set the default value.
    pub fn with_default(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    /// Mark the column unique.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Mark the column as (part of) the primary key.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Make the column a foreign key to `table`.
    pub fn references(mut self, table: impl Into<String>) -> Self {
        self.references = Some(table.into());
        self
    }

    /// Check if the column is a foreign key.
    pub fn is_foreign_key(&self) -> bool {
        self.references.is_some()
    }
}

/// A table index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IndexDefinition {
    /// Index name (its identity within the table).
    pub name: String,
    /// Indexed columns, in order.
    pub columns: Vec<String>,
    /// Whether this is a unique index.
    #[serde(default)]
    pub unique: bool,
}

impl IndexDefinition {
    /// Create a non-unique index.
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            unique: false,
        }
    }

    /// Create a unique index.
    pub fn unique(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            unique: true,
        }
    }
}

/// Kind of association between two tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationKind {
    /// The declaring table holds a foreign key to the target.
    BelongsTo,
    /// The target table holds a foreign key to the declaring table.
    HasMany,
    /// Both tables are linked through a join table.
    BelongsToMany,
}

impl AssociationKind {
    /// Get the canonical name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BelongsTo => "belongs_to",
            Self::HasMany => "has_many",
            Self::BelongsToMany => "belongs_to_many",
        }
    }
}

impl fmt::Display for AssociationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The implicit table behind a many-to-many association.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JoinTable {
    /// Join table name.
    pub name: String,
    /// Column referencing the declaring table.
    pub source_key: String,
    /// Column referencing the target table.
    pub target_key: String,
}

/// A resolved association.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssociationDefinition {
    /// Association kind.
    pub kind: AssociationKind,
    /// Declaring table.
    pub source: String,
    /// Target table.
    pub target: String,
    /// Foreign key column (on the owning table; the source key for join tables).
    pub foreign_key: String,
    /// Join table for many-to-many associations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join: Option<JoinTable>,
}

impl AssociationDefinition {
    /// Create a belongs-to association.
    pub fn belongs_to(
        source: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            kind: AssociationKind::BelongsTo,
            source: source.into(),
            target: target.into(),
            foreign_key: foreign_key.into(),
            join: None,
        }
    }

    /// Create a has-many association.
    pub fn has_many(
        source: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            kind: AssociationKind::HasMany,
            source: source.into(),
            target: target.into(),
            foreign_key: foreign_key.into(),
            join: None,
        }
    }

    /// Create a many-to-many association through a join table.
    pub fn belongs_to_many(
        source: impl Into<String>,
        target: impl Into<String>,
        join: JoinTable,
    ) -> Self {
        Self {
            kind: AssociationKind::BelongsToMany,
            source: source.into(),
            target: target.into(),
            foreign_key: join.source_key.clone(),
            join: Some(join),
        }
    }

    /// The table that physically stores the foreign key column(s).
    pub fn owning_table(&self) -> &str {
        match self.kind {
            AssociationKind::BelongsTo => &self.source,
            AssociationKind::HasMany => &self.target,
            AssociationKind::BelongsToMany => self
                .join
                .as_ref()
                .map(|j| j.name.as_str())
                .unwrap_or(&self.source),
        }
    }

    /// Foreign key columns on the owning table.
    pub fn key_columns(&self) -> Vec<&str> {
        match &self.join {
            Some(join) => vec![join.source_key.as_str(), join.target_key.as_str()],
            None => vec![self.foreign_key.as_str()],
        }
    }

    /// Every table this association depends on.
    pub fn tables(&self) -> BTreeSet<&str> {
        let mut tables = BTreeSet::from([self.source.as_str(), self.target.as_str()]);
        if let Some(join) = &self.join {
            tables.insert(join.name.as_str());
        }
        tables
    }

    /// Check if the association mentions `table` in any role.
    pub fn touches(&self, table: &str) -> bool {
        self.tables().contains(table)
    }
}

impl fmt::Display for AssociationDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.join {
            Some(join) => write!(
                f,
                "{} {} {} through {}",
                self.source, self.kind, self.target, join.name
            ),
            None => write!(
                f,
                "{} {} {} via {}",
                self.source, self.kind, self.target, self.foreign_key
            ),
        }
    }
}

/// Structure of one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Table name (its identity).
    pub name: String,
    /// Columns in declaration order.
    pub columns: Vec<ColumnDefinition>,
    /// Indexes.
    #[serde(default)]
    pub indexes: BTreeSet<IndexDefinition>,
    /// Associations declared by this table.
    #[serde(default)]
    pub associations: BTreeSet<AssociationDefinition>,
}

impl TableSchema {
    /// Create an empty table.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            indexes: BTreeSet::new(),
            associations: BTreeSet::new(),
        }
    }

    /// Append a column.
    pub fn with_column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }

    /// Add an index.
    pub fn with_index(mut self, index: IndexDefinition) -> Self {
        self.indexes.insert(index);
        self
    }

    /// Add an association.
    pub fn with_association(mut self, association: AssociationDefinition) -> Self {
        self.associations.insert(association);
        self
    }

    /// Get a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Get a mutable column by name.
    pub fn column_mut(&mut self, name: &str) -> Option<&mut ColumnDefinition> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    /// Position of a column in declaration order.
    pub fn column_position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Check if a column exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Get an index by name.
    pub fn index(&self, name: &str) -> Option<&IndexDefinition> {
        self.indexes.iter().find(|i| i.name == name)
    }

    /// Primary key column names, in declaration order.
    pub fn primary_key(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Foreign key columns as `(column, referenced table)` pairs.
    pub fn foreign_keys(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns
            .iter()
            .filter_map(|c| c.references.as_deref().map(|t| (c.name.as_str(), t)))
    }

    /// Tables referenced by this table's foreign keys.
    pub fn referenced_tables(&self) -> BTreeSet<&str> {
        self.foreign_keys().map(|(_, table)| table).collect()
    }
}

/// A complete canonical schema, keyed by table name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaDefinition {
    tables: BTreeMap<String, TableSchema>,
}

impl SchemaDefinition {
    /// Create an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a table.
    pub fn insert(&mut self, table: TableSchema) -> Option<TableSchema> {
        self.tables.insert(table.name.clone(), table)
    }

    /// Add a table (builder style).
    pub fn with_table(mut self, table: TableSchema) -> Self {
        self.insert(table);
        self
    }

    /// Remove a table.
    pub fn remove(&mut self, name: &str) -> Option<TableSchema> {
        self.tables.remove(name)
    }

    /// Get a table by name.
    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.get(name)
    }

    /// Get a mutable table by name.
    pub fn table_mut(&mut self, name: &str) -> Option<&mut TableSchema> {
        self.tables.get_mut(name)
    }

    /// Check if a table exists.
    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Iterate tables in lexicographic name order.
    pub fn tables(&self) -> impl Iterator<Item = &TableSchema> {
        self.tables.values()
    }

    /// Iterate `(key, table)` entries in lexicographic key order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &TableSchema)> {
        self.tables.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Table names in lexicographic order.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Number of tables.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Check if the schema has no tables.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Every association declared anywhere in the schema.
    pub fn associations(&self) -> impl Iterator<Item = &AssociationDefinition> {
        self.tables.values().flat_map(|t| t.associations.iter())
    }
}
