//! Structural schema operations.

use std::fmt;

use serde::{Deserialize, Serialize};
use tessera_schema::{AssociationDefinition, ColumnDefinition, IndexDefinition, TableSchema};

use crate::error::{MigrateResult, MigrationError};

/// One structural change to a schema.
///
/// Destructive operations carry the full definition they remove, so every
/// operation has an exact structural inverse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SchemaOperation {
    /// Create a table.
    CreateTable {
        table: String,
        columns: Vec<ColumnDefinition>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        indexes: Vec<IndexDefinition>,
    },
    /// Drop a table.
    DropTable { table: TableSchema },
    /// Insert a column at `index` in the table's column list.
    AddColumn {
        table: String,
        column: ColumnDefinition,
        index: usize,
    },
    /// Remove the column at `index`.
    DropColumn {
        table: String,
        column: ColumnDefinition,
        index: usize,
    },
    /// Change a column's type or constraints.
    AlterColumn {
        table: String,
        column: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        before: Option<ColumnDefinition>,
        after: ColumnDefinition,
    },
    /// Move a column from position `from` to position `to`.
    MoveColumn {
        table: String,
        column: String,
        from: usize,
        to: usize,
    },
    /// Add an index.
    AddIndex { table: String, index: IndexDefinition },
    /// Drop an index.
    DropIndex { table: String, index: IndexDefinition },
    /// Record an association.
    AddAssociation { association: AssociationDefinition },
    /// Remove an association.
    DropAssociation { association: AssociationDefinition },
}

impl SchemaOperation {
    /// Wire name of the operation kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CreateTable { .. } => "create_table",
            Self::DropTable { .. } => "drop_table",
            Self::AddColumn { .. } => "add_column",
            Self::DropColumn { .. } => "drop_column",
            Self::AlterColumn { .. } => "alter_column",
            Self::MoveColumn { .. } => "move_column",
            Self::AddIndex { .. } => "add_index",
            Self::DropIndex { .. } => "drop_index",
            Self::AddAssociation { .. } => "add_association",
            Self::DropAssociation { .. } => "drop_association",
        }
    }

    /// The table the operation targets.
    ///
    /// Association operations target their declaring table.
    pub fn table(&self) -> &str {
        match self {
            Self::CreateTable { table, .. }
            | Self::AddColumn { table, .. }
            | Self::DropColumn { table, .. }
            | Self::AlterColumn { table, .. }
            | Self::MoveColumn { table, .. }
            | Self::AddIndex { table, .. }
            | Self::DropIndex { table, .. } => table,
            Self::DropTable { table } => &table.name,
            Self::AddAssociation { association } | Self::DropAssociation { association } => {
                &association.source
            }
        }
    }

    /// The column the operation targets, if any.
    pub fn column(&self) -> Option<&str> {
        match self {
            Self::AddColumn { column, .. } | Self::DropColumn { column, .. } => {
                Some(&column.name)
            }
            Self::AlterColumn { column, .. } | Self::MoveColumn { column, .. } => Some(column),
            _ => None,
        }
    }

    /// Check if the operation removes a table or column.
    pub fn is_destructive(&self) -> bool {
        matches!(self, Self::DropTable { .. } | Self::DropColumn { .. })
    }

    /// The exact structural inverse of this operation.
    pub fn inverse(&self) -> MigrateResult<SchemaOperation> {
        let inverse = match self {
            Self::CreateTable {
                table,
                columns,
                indexes,
            } => Self::DropTable {
                table: TableSchema {
                    name: table.clone(),
                    columns: columns.clone(),
                    indexes: indexes.iter().cloned().collect(),
                    associations: Default::default(),
                },
            },
            Self::DropTable { table } => {
                if !table.associations.is_empty() {
                    return Err(MigrationError::ungeneratable(
                        self.kind(),
                        &table.name,
                        None,
                        "dropped table still declares associations",
                    ));
                }
                Self::CreateTable {
                    table: table.name.clone(),
                    columns: table.columns.clone(),
                    indexes: table.indexes.iter().cloned().collect(),
                }
            }
            Self::AddColumn {
                table,
                column,
                index,
            } => Self::DropColumn {
                table: table.clone(),
                column: column.clone(),
                index: *index,
            },
            Self::DropColumn {
                table,
                column,
                index,
            } => Self::AddColumn {
                table: table.clone(),
                column: column.clone(),
                index: *index,
            },
            Self::AlterColumn {
                table,
                column,
                before,
                after,
            } => {
                let Some(before) = before else {
                    return Err(MigrationError::ungeneratable(
                        self.kind(),
                        table,
                        Some(column.clone()),
                        "previous column state is missing",
                    ));
                };
                Self::AlterColumn {
                    table: table.clone(),
                    column: column.clone(),
                    before: Some(after.clone()),
                    after: before.clone(),
                }
            }
            Self::MoveColumn {
                table,
                column,
                from,
                to,
            } => Self::MoveColumn {
                table: table.clone(),
                column: column.clone(),
                from: *to,
                to: *from,
            },
            Self::AddIndex { table, index } => Self::DropIndex {
                table: table.clone(),
                index: index.clone(),
            },
            Self::DropIndex { table, index } => Self::AddIndex {
                table: table.clone(),
                index: index.clone(),
            },
            Self::AddAssociation { association } => Self::DropAssociation {
                association: association.clone(),
            },
            Self::DropAssociation { association } => Self::AddAssociation {
                association: association.clone(),
            },
        };
        Ok(inverse)
    }

    /// Short human-readable description.
    pub fn describe(&self) -> String {
        match self {
            Self::CreateTable { table, columns, .. } => {
                format!("Create table {} ({} columns)", table, columns.len())
            }
            Self::DropTable { table } => format!("Drop table {}", table.name),
            Self::AddColumn { table, column, .. } => {
                format!("Add column {}.{} ({})", table, column.name, column.kind)
            }
            Self::DropColumn { table, column, .. } => {
                format!("Drop column {}.{}", table, column.name)
            }
            Self::AlterColumn { table, column, .. } => {
                format!("Alter column {}.{}", table, column)
            }
            Self::MoveColumn {
                table, column, to, ..
            } => format!("Move column {}.{} to position {}", table, column, to),
            Self::AddIndex { table, index } => {
                format!("Add index {} on {}", index.name, table)
            }
            Self::DropIndex { table, index } => {
                format!("Drop index {} on {}", index.name, table)
            }
            Self::AddAssociation { association } => format!("Add association {}", association),
            Self::DropAssociation { association } => {
                format!("Drop association {}", association)
            }
        }
    }
}

impl fmt::Display for SchemaOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}
