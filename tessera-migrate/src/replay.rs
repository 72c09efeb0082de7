//! Applying operations to a schema and replaying history.
//!
//! [`apply`] is the single definition of what an operation means. Replay
//! folds it over stored records, and the diff engine runs the same function
//! over a working copy, so every generated record replays by construction.

use tessera_schema::{ColumnDefinition, IndexDefinition, SchemaDefinition, TableSchema};

use crate::error::{MigrateResult, MigrationError, OperationError};
use crate::history::MigrationRecord;
use crate::operation::SchemaOperation;

type ApplyResult = Result<(), OperationError>;

/// Apply one operation to `schema`.
///
/// The schema is left untouched when the operation is rejected.
pub fn apply(schema: &mut SchemaDefinition, op: &SchemaOperation) -> ApplyResult {
    let kind = op.kind();
    match op {
        SchemaOperation::CreateTable {
            table,
            columns,
            indexes,
        } => {
            if table.is_empty() {
                return Err(OperationError::new(kind, table, "table name is empty"));
            }
            if schema.contains(table) {
                return Err(OperationError::new(kind, table, "table already exists"));
            }
            let mut created = TableSchema::new(table);
            for column in columns {
                check_new_column(schema, &created, column).map_err(|message| {
                    OperationError::new(kind, table, message).with_column(&column.name)
                })?;
                created.columns.push(column.clone());
            }
            for index in indexes {
                check_new_index(&created, index)
                    .map_err(|message| OperationError::new(kind, table, message))?;
                created.indexes.insert(index.clone());
            }
            schema.insert(created);
        }

        SchemaOperation::DropTable { table } => {
            let name = &table.name;
            let existing = schema
                .table(name)
                .ok_or_else(|| OperationError::new(kind, name, "table does not exist"))?;
            if existing != table {
                return Err(OperationError::new(
                    kind,
                    name,
                    "dropped definition does not match the current table",
                ));
            }
            if !existing.associations.is_empty() {
                return Err(OperationError::new(kind, name, "table still declares associations"));
            }
            for other in schema.tables().filter(|t| t.name != *name) {
                let referencing = other
                    .foreign_keys()
                    .find(|(_, target)| *target == name.as_str());
                if let Some((column, _)) = referencing {
                    return Err(OperationError::new(
                        kind,
                        name,
                        format!("table is still referenced by {}.{}", other.name, column),
                    ));
                }
                if let Some(association) = other.associations.iter().find(|a| a.touches(name)) {
                    return Err(OperationError::new(
                        kind,
                        name,
                        format!("table is still used by association {}", association),
                    ));
                }
            }
            schema.remove(name);
        }

        SchemaOperation::AddColumn {
            table,
            column,
            index,
        } => {
            let target = existing_table(schema, op, table)?;
            check_new_column(schema, target, column).map_err(|message| {
                OperationError::new(kind, table, message).with_column(&column.name)
            })?;
            if *index > target.columns.len() {
                return Err(OperationError::new(
                    kind,
                    table,
                    format!(
                        "position {} is past the end of {} columns",
                        index,
                        target.columns.len()
                    ),
                )
                .with_column(&column.name));
            }
            if let Some(target) = schema.table_mut(table) {
                target.columns.insert(*index, column.clone());
            }
        }

        SchemaOperation::DropColumn {
            table,
            column,
            index,
        } => {
            let target = existing_table(schema, op, table)?;
            let err = |message: String| {
                OperationError::new(kind, table, message).with_column(&column.name)
            };
            let position = target
                .column_position(&column.name)
                .ok_or_else(|| err("column does not exist".to_string()))?;
            if position != *index {
                return Err(err(format!(
                    "column is at position {}, not {}",
                    position, index
                )));
            }
            if target.columns[position] != *column {
                return Err(err(
                    "dropped definition does not match the current column".to_string()
                ));
            }
            if let Some(idx) = target
                .indexes
                .iter()
                .find(|i| i.columns.contains(&column.name))
            {
                return Err(err(format!("column is still used by index {}", idx.name)));
            }
            if let Some(association) = schema.associations().find(|a| {
                a.owning_table() == table.as_str()
                    && a.key_columns().contains(&column.name.as_str())
            }) {
                return Err(err(format!(
                    "column is still used by association {}",
                    association
                )));
            }
            if let Some(target) = schema.table_mut(table) {
                target.columns.remove(position);
            }
        }

        SchemaOperation::AlterColumn {
            table,
            column,
            before,
            after,
        } => {
            let target = existing_table(schema, op, table)?;
            let err =
                |message: &str| OperationError::new(kind, table, message).with_column(column);
            let current = target
                .column(column)
                .ok_or_else(|| err("column does not exist"))?;
            if let Some(before) = before {
                if before != current {
                    return Err(err("previous state does not match the current column"));
                }
            }
            if after.name != *column {
                return Err(err("altered definition changes the column name"));
            }
            if let Some(referenced) = &after.references {
                if referenced != table && !schema.contains(referenced) {
                    return Err(err("referenced table does not exist"));
                }
            }
            if let Some(current) = schema.table_mut(table).and_then(|t| t.column_mut(column)) {
                *current = after.clone();
            }
        }

        SchemaOperation::MoveColumn {
            table,
            column,
            from,
            to,
        } => {
            let target = existing_table(schema, op, table)?;
            let err = |message: String| {
                OperationError::new(kind, table, message).with_column(column)
            };
            let position = target
                .column_position(column)
                .ok_or_else(|| err("column does not exist".to_string()))?;
            if position != *from {
                return Err(err(format!(
                    "column is at position {}, not {}",
                    position, from
                )));
            }
            if *to >= target.columns.len() {
                return Err(err(format!(
                    "position {} is past the end of {} columns",
                    to,
                    target.columns.len()
                )));
            }
            if let Some(target) = schema.table_mut(table) {
                let moved = target.columns.remove(position);
                target.columns.insert(*to, moved);
            }
        }

        SchemaOperation::AddIndex { table, index } => {
            let target = existing_table(schema, op, table)?;
            check_new_index(target, index)
                .map_err(|message| OperationError::new(kind, table, message))?;
            if let Some(target) = schema.table_mut(table) {
                target.indexes.insert(index.clone());
            }
        }

        SchemaOperation::DropIndex { table, index } => {
            let target = existing_table(schema, op, table)?;
            if !target.indexes.contains(index) {
                return Err(OperationError::new(
                    kind,
                    table,
                    format!("index {} does not exist", index.name),
                ));
            }
            if let Some(target) = schema.table_mut(table) {
                target.indexes.remove(index);
            }
        }

        SchemaOperation::AddAssociation { association } => {
            let source = &association.source;
            for name in association.tables() {
                if !schema.contains(name) {
                    return Err(OperationError::new(
                        kind,
                        source,
                        format!("association table {} does not exist", name),
                    ));
                }
            }
            let owner = existing_table(schema, op, association.owning_table())?;
            for key in association.key_columns() {
                if !owner.has_column(key) {
                    return Err(OperationError::new(
                        kind,
                        &owner.name,
                        "association key column does not exist",
                    )
                    .with_column(key));
                }
            }
            let declaring = existing_table(schema, op, source)?;
            if declaring.associations.contains(association) {
                return Err(OperationError::new(
                    kind,
                    source,
                    format!("association {} already exists", association),
                ));
            }
            if let Some(declaring) = schema.table_mut(source) {
                declaring.associations.insert(association.clone());
            }
        }

        SchemaOperation::DropAssociation { association } => {
            let source = &association.source;
            let declaring = existing_table(schema, op, source)?;
            if !declaring.associations.contains(association) {
                return Err(OperationError::new(
                    kind,
                    source,
                    format!("association {} does not exist", association),
                ));
            }
            if let Some(declaring) = schema.table_mut(source) {
                declaring.associations.remove(association);
            }
        }
    }
    Ok(())
}

/// Apply a sequence of operations, stopping at the first rejected one.
///
/// Returns the index of the failing operation along with its error.
pub fn apply_all<'a>(
    schema: &mut SchemaDefinition,
    ops: impl IntoIterator<Item = &'a SchemaOperation>,
) -> Result<(), (usize, OperationError)> {
    for (step, op) in ops.into_iter().enumerate() {
        apply(schema, op).map_err(|err| (step, err))?;
    }
    Ok(())
}

/// Reconstruct the schema by folding every record's up-operations, in order,
/// over an empty schema.
pub fn replay<'a>(
    records: impl IntoIterator<Item = &'a MigrationRecord>,
) -> MigrateResult<SchemaDefinition> {
    let mut schema = SchemaDefinition::new();
    let mut count = 0usize;
    for record in records {
        apply_all(&mut schema, &record.up)
            .map_err(|(step, source)| MigrationError::replay(&record.id, step, source))?;
        tracing::debug!(
            migration = %record.id,
            operations = record.up.len(),
            "Replayed migration"
        );
        count += 1;
    }
    tracing::debug!(migrations = count, tables = schema.len(), "Reconstructed schema from history");
    Ok(schema)
}

fn existing_table<'s>(
    schema: &'s SchemaDefinition,
    op: &SchemaOperation,
    table: &str,
) -> Result<&'s TableSchema, OperationError> {
    schema.table(table).ok_or_else(|| {
        let err = OperationError::new(op.kind(), table, "table does not exist");
        match op.column() {
            Some(column) => err.with_column(column),
            None => err,
        }
    })
}

fn check_new_column(
    schema: &SchemaDefinition,
    table: &TableSchema,
    column: &ColumnDefinition,
) -> Result<(), String> {
    if column.name.is_empty() {
        return Err("column name is empty".to_string());
    }
    if table.has_column(&column.name) {
        return Err("column already exists".to_string());
    }
    if let Some(referenced) = &column.references {
        if *referenced != table.name && !schema.contains(referenced) {
            return Err(format!("referenced table {} does not exist", referenced));
        }
    }
    Ok(())
}

fn check_new_index(table: &TableSchema, index: &IndexDefinition) -> Result<(), String> {
    if index.name.is_empty() {
        return Err("index name is empty".to_string());
    }
    if table.index(&index.name).is_some() {
        return Err(format!("index {} already exists", index.name));
    }
    if index.columns.is_empty() {
        return Err(format!("index {} has no columns", index.name));
    }
    if let Some(missing) = index.columns.iter().find(|c| !table.has_column(c)) {
        return Err(format!("index {} covers missing column {}", index.name, missing));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use tessera_schema::{AssociationDefinition, DataKind, JoinTable};

    fn create_users() -> SchemaOperation {
        SchemaOperation::CreateTable {
            table: "Users".into(),
            columns: vec![
                ColumnDefinition::new("username", DataKind::String).primary_key(),
                ColumnDefinition::new("email", DataKind::String),
            ],
            indexes: vec![],
        }
    }

    fn record(id: &str, up: Vec<SchemaOperation>) -> MigrationRecord {
        let created_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        MigrationRecord::new(id, up, Vec::new(), created_at).unwrap()
    }

    #[test]
    fn test_replay_builds_schema() {
        let history = vec![
            record("20240101000000-create-Users", vec![create_users()]),
            record(
                "20240102000000-update-schema",
                vec![SchemaOperation::AddColumn {
                    table: "Users".into(),
                    column: ColumnDefinition::new("isActive", DataKind::Boolean),
                    index: 1,
                }],
            ),
        ];

        let schema = replay(&history).unwrap();
        let users = schema.table("Users").unwrap();
        let names: Vec<_> = users.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["username", "isActive", "email"]);
    }

    #[test]
    fn test_replay_rejects_missing_table() {
        let history = vec![record(
            "20240101000000-update-schema",
            vec![SchemaOperation::AddColumn {
                table: "Users".into(),
                column: ColumnDefinition::new("isActive", DataKind::Boolean),
                index: 0,
            }],
        )];

        let err = replay(&history).unwrap_err();
        match err {
            MigrationError::Replay {
                record,
                step,
                source,
            } => {
                assert_eq!(record, "20240101000000-update-schema");
                assert_eq!(step, 0);
                assert_eq!(source.operation, "add_column");
                assert_eq!(source.table, "Users");
                assert_eq!(source.column.as_deref(), Some("isActive"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_drop_missing_column_rejected() {
        let mut schema = SchemaDefinition::new();
        apply(&mut schema, &create_users()).unwrap();

        let err = apply(
            &mut schema,
            &SchemaOperation::DropColumn {
                table: "Users".into(),
                column: ColumnDefinition::new("phone", DataKind::String),
                index: 2,
            },
        )
        .unwrap_err();
        assert_eq!(err.column.as_deref(), Some("phone"));
    }

    #[test]
    fn test_duplicate_create_rejected() {
        let mut schema = SchemaDefinition::new();
        apply(&mut schema, &create_users()).unwrap();
        let before = schema.clone();

        assert!(apply(&mut schema, &create_users()).is_err());
        assert_eq!(schema, before);
    }

    #[test]
    fn test_alter_with_stale_before_rejected() {
        let mut schema = SchemaDefinition::new();
        apply(&mut schema, &create_users()).unwrap();

        let err = apply(
            &mut schema,
            &SchemaOperation::AlterColumn {
                table: "Users".into(),
                column: "email".into(),
                before: Some(ColumnDefinition::new("email", DataKind::Text)),
                after: ColumnDefinition::new("email", DataKind::Text).nullable(),
            },
        )
        .unwrap_err();
        assert_eq!(err.operation, "alter_column");
    }

    #[test]
    fn test_drop_referenced_table_rejected() {
        let mut schema = SchemaDefinition::new();
        apply(&mut schema, &create_users()).unwrap();
        apply(
            &mut schema,
            &SchemaOperation::CreateTable {
                table: "Posts".into(),
                columns: vec![
                    ColumnDefinition::new("id", DataKind::Integer).primary_key(),
                    ColumnDefinition::new("user_id", DataKind::String).references("Users"),
                ],
                indexes: vec![],
            },
        )
        .unwrap();

        let users = schema.table("Users").unwrap().clone();
        let err = apply(&mut schema, &SchemaOperation::DropTable { table: users }).unwrap_err();
        assert!(err.message.contains("Posts.user_id"));
    }

    #[test]
    fn test_association_requires_key_columns() {
        let mut schema = SchemaDefinition::new();
        apply(&mut schema, &create_users()).unwrap();
        apply(
            &mut schema,
            &SchemaOperation::CreateTable {
                table: "Roles".into(),
                columns: vec![ColumnDefinition::new("id", DataKind::Integer).primary_key()],
                indexes: vec![],
            },
        )
        .unwrap();
        apply(
            &mut schema,
            &SchemaOperation::CreateTable {
                table: "RoleUsers".into(),
                columns: vec![
                    ColumnDefinition::new("user_id", DataKind::String)
                        .primary_key()
                        .references("Users"),
                ],
                indexes: vec![],
            },
        )
        .unwrap();

        let association = AssociationDefinition::belongs_to_many(
            "Users",
            "Roles",
            JoinTable {
                name: "RoleUsers".into(),
                source_key: "user_id".into(),
                target_key: "role_id".into(),
            },
        );
        let err = apply(&mut schema, &SchemaOperation::AddAssociation { association }).unwrap_err();
        assert_eq!(err.table, "RoleUsers");
        assert_eq!(err.column.as_deref(), Some("role_id"));
    }

    #[test]
    fn test_index_over_missing_column_rejected() {
        let mut schema = SchemaDefinition::new();
        apply(&mut schema, &create_users()).unwrap();

        let err = apply(
            &mut schema,
            &SchemaOperation::AddIndex {
                table: "Users".into(),
                index: IndexDefinition::new("users_phone_idx", vec!["phone".into()]),
            },
        )
        .unwrap_err();
        assert!(err.message.contains("phone"));
    }

    #[test]
    fn test_missing_table_error_names_column() {
        let mut schema = SchemaDefinition::new();
        let ops = [
            SchemaOperation::AlterColumn {
                table: "Users".into(),
                column: "email".into(),
                before: None,
                after: ColumnDefinition::new("email", DataKind::Text),
            },
            SchemaOperation::DropColumn {
                table: "Users".into(),
                column: ColumnDefinition::new("email", DataKind::String),
                index: 1,
            },
        ];
        for op in &ops {
            let err = apply(&mut schema, op).unwrap_err();
            assert_eq!(err.table, "Users");
            assert_eq!(err.column.as_deref(), Some("email"));
        }
    }

    #[test]
    fn test_move_column() {
        let mut schema = SchemaDefinition::new();
        apply(&mut schema, &create_users()).unwrap();
        let add_active = SchemaOperation::AddColumn {
            table: "Users".into(),
            column: ColumnDefinition::new("isActive", DataKind::Boolean),
            index: 2,
        };
        apply(&mut schema, &add_active).unwrap();

        let op = SchemaOperation::MoveColumn {
            table: "Users".into(),
            column: "isActive".into(),
            from: 2,
            to: 0,
        };
        apply(&mut schema, &op).unwrap();
        let users = schema.table("Users").unwrap();
        let names: Vec<_> = users.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["isActive", "username", "email"]);

        let err = apply(&mut schema, &op).unwrap_err();
        assert_eq!(err.column.as_deref(), Some("isActive"));

        apply(&mut schema, &op.inverse().unwrap()).unwrap();
        let users = schema.table("Users").unwrap();
        let names: Vec<_> = users.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["username", "email", "isActive"]);
    }
}
