//! Presentation metadata and exposed capabilities.
//!
//! Labels, form hints and method exposure are consumed by UI and API
//! generation. They live beside the canonical schema, keyed by the same
//! table and column names, and never take part in diffing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Presentation metadata for one column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnAnnotation {
    /// Display label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Form hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Hidden from generated forms.
    #[serde(default)]
    pub hidden: bool,
    /// Computed field with no backing column.
    #[serde(default)]
    pub computed: bool,
}

/// Presentation metadata for one table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableAnnotations {
    /// Display label for the table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Column annotations keyed by column name.
    #[serde(default)]
    pub columns: BTreeMap<String, ColumnAnnotation>,
}

impl TableAnnotations {
    /// Check if there is nothing to present.
    pub fn is_empty(&self) -> bool {
        self.label.is_none() && self.columns.is_empty()
    }
}

/// Presentation metadata keyed by table name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnotationMap {
    tables: BTreeMap<String, TableAnnotations>,
}

impl AnnotationMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the entry for a table.
    pub fn table_entry(&mut self, table: &str) -> &mut TableAnnotations {
        self.tables.entry(table.to_string()).or_default()
    }

    /// Annotations for a table.
    pub fn table(&self, table: &str) -> Option<&TableAnnotations> {
        self.tables.get(table)
    }

    /// Annotation for a column.
    pub fn column(&self, table: &str, column: &str) -> Option<&ColumnAnnotation> {
        self.tables.get(table).and_then(|t| t.columns.get(column))
    }

    /// Label for a column, if any.
    pub fn label(&self, table: &str, column: &str) -> Option<&str> {
        self.column(table, column).and_then(|c| c.label.as_deref())
    }

    /// Drop tables with no annotations.
    pub fn prune(&mut self) {
        self.tables.retain(|_, t| !t.is_empty());
    }

    /// Number of annotated tables.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Check if the map is empty.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Methods exposed as endpoints, keyed by table name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilityMap {
    tables: BTreeMap<String, Vec<String>>,
}

impl CapabilityMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Expose a method on a table. Duplicates are ignored.
    pub fn expose(&mut self, table: &str, method: &str) {
        let methods = self.tables.entry(table.to_string()).or_default();
        if !methods.iter().any(|m| m == method) {
            methods.push(method.to_string());
        }
    }

    /// Methods exposed on a table.
    pub fn methods(&self, table: &str) -> &[String] {
        self.tables.get(table).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Check if a method is exposed on a table.
    pub fn exposes(&self, table: &str, method: &str) -> bool {
        self.methods(table).iter().any(|m| m == method)
    }

    /// Check if nothing is exposed.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
