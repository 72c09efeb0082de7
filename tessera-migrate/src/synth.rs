//! Migration synthesis: folding operations and computing inverses.

use std::collections::HashMap;

use tessera_schema::SchemaDefinition;

use crate::error::{MigrateResult, MigrationError};
use crate::operation::SchemaOperation;
use crate::replay::apply_all;

/// Up and down operations for a migration that has not been named yet.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationDraft {
    /// Forward operations.
    pub up: Vec<SchemaOperation>,
    /// Inverse operations, in execution order.
    pub down: Vec<SchemaOperation>,
}

impl MigrationDraft {
    /// Apply `up` then `down` to `base`, checking that `down` restores it.
    ///
    /// Returns the schema after `up`.
    pub fn verify(&self, base: &SchemaDefinition) -> MigrateResult<SchemaDefinition> {
        let mut schema = base.clone();
        apply_all(&mut schema, &self.up).map_err(|(step, e)| {
            MigrationError::invalid_migration(format!("up step {} is rejected: {}", step, e))
        })?;
        let migrated = schema.clone();

        apply_all(&mut schema, &self.down).map_err(|(step, e)| {
            MigrationError::invalid_migration(format!("down step {} is rejected: {}", step, e))
        })?;
        if schema != *base {
            return Err(MigrationError::invalid_migration(
                "down operations do not restore the previous schema",
            ));
        }
        Ok(migrated)
    }
}

/// Packages diff output into reversible migrations.
#[derive(Debug, Clone, Copy, Default)]
pub struct Synthesizer;

impl Synthesizer {
    /// Create a synthesizer.
    pub fn new() -> Self {
        Self
    }

    /// Fold and invert a diff. Returns `None` when there is nothing to do.
    pub fn synthesize(&self, operations: Vec<SchemaOperation>) -> MigrateResult<Option<MigrationDraft>> {
        if operations.is_empty() {
            tracing::debug!("No operations to synthesize");
            return Ok(None);
        }

        let up = fold(operations);
        let down = up
            .iter()
            .rev()
            .map(SchemaOperation::inverse)
            .collect::<MigrateResult<Vec<_>>>()?;

        tracing::debug!(up = up.len(), down = down.len(), "Synthesized migration");
        Ok(Some(MigrationDraft { up, down }))
    }
}

/// Fold the column and index additions that directly follow a `CreateTable`
/// for the same table into it.
///
/// A column is left alone when it references its own table or a table
/// created further down the sequence; those keys break cycles and must stay
/// separate. Folding stops at the first operation that cannot be folded.
pub fn fold(operations: Vec<SchemaOperation>) -> Vec<SchemaOperation> {
    let created: HashMap<String, usize> = operations
        .iter()
        .enumerate()
        .filter_map(|(pos, op)| match op {
            SchemaOperation::CreateTable { table, .. } => Some((table.clone(), pos)),
            _ => None,
        })
        .collect();

    let mut folded = Vec::with_capacity(operations.len());
    let mut iter = operations.into_iter().enumerate().peekable();

    while let Some((pos, op)) = iter.next() {
        let SchemaOperation::CreateTable {
            table,
            mut columns,
            mut indexes,
        } = op
        else {
            folded.push(op);
            continue;
        };

        while let Some((_, next)) = iter.peek() {
            match next {
                SchemaOperation::AddColumn {
                    table: owner,
                    column,
                    index,
                } if *owner == table && *index <= columns.len() => {
                    let blocked = column.references.as_deref().is_some_and(|referenced| {
                        referenced == table
                            || created.get(referenced).is_some_and(|&at| at > pos)
                    });
                    if blocked {
                        break;
                    }
                    columns.insert(*index, column.clone());
                }
                SchemaOperation::AddIndex {
                    table: owner,
                    index,
                } if *owner == table
                    && !indexes.contains(index)
                    && index
                        .columns
                        .iter()
                        .all(|c| columns.iter().any(|col| col.name == *c)) =>
                {
                    indexes.push(index.clone());
                }
                _ => break,
            }
            iter.next();
        }

        indexes.sort();
        folded.push(SchemaOperation::CreateTable {
            table,
            columns,
            indexes,
        });
    }
    folded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::SchemaDiffer;
    use pretty_assertions::assert_eq;
    use tessera_schema::{
        AssociationDefinition, ColumnDefinition, DataKind, IndexDefinition, JoinTable,
        TableSchema,
    };

    fn target() -> SchemaDefinition {
        SchemaDefinition::new()
            .with_table(
                TableSchema::new("Users")
                    .with_column(ColumnDefinition::new("username", DataKind::String).primary_key())
                    .with_column(ColumnDefinition::new("email", DataKind::String))
                    .with_association(AssociationDefinition::belongs_to_many(
                        "Users",
                        "Roles",
                        JoinTable {
                            name: "RoleUsers".into(),
                            source_key: "user_id".into(),
                            target_key: "role_id".into(),
                        },
                    )),
            )
            .with_table(
                TableSchema::new("Roles")
                    .with_column(ColumnDefinition::new("id", DataKind::Integer).primary_key()),
            )
            .with_table(
                TableSchema::new("RoleUsers")
                    .with_column(
                        ColumnDefinition::new("user_id", DataKind::String)
                            .primary_key()
                            .references("Users"),
                    )
                    .with_column(
                        ColumnDefinition::new("role_id", DataKind::Integer)
                            .primary_key()
                            .references("Roles"),
                    )
                    .with_index(IndexDefinition::new(
                        "role_users_role_id_idx",
                        vec!["role_id".into()],
                    )),
            )
    }

    fn synthesize(base: &SchemaDefinition, target: &SchemaDefinition) -> MigrationDraft {
        let diff = SchemaDiffer::new(target.clone())
            .with_base(base.clone())
            .diff()
            .unwrap();
        Synthesizer::new()
            .synthesize(diff.operations)
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_empty_diff_is_no_changes() {
        assert!(Synthesizer::new().synthesize(Vec::new()).unwrap().is_none());
    }

    #[test]
    fn test_join_table_columns_are_folded() {
        let draft = synthesize(&SchemaDefinition::new(), &target());

        let summary: Vec<_> = draft.up.iter().map(|op| op.kind()).collect();
        assert_eq!(
            summary,
            vec!["create_table", "create_table", "create_table", "add_association"]
        );
        match &draft.up[2] {
            SchemaOperation::CreateTable {
                table,
                columns,
                indexes,
            } => {
                assert_eq!(table, "RoleUsers");
                let names: Vec<_> = columns.iter().map(|c| c.name.as_str()).collect();
                assert_eq!(names, vec!["user_id", "role_id"]);
                assert_eq!(indexes.len(), 1);
            }
            other => panic!("unexpected operation {:?}", other),
        }
    }

    #[test]
    fn test_down_is_reversed_inverse() {
        let base = SchemaDefinition::new();
        let draft = synthesize(&base, &target());

        let down: Vec<_> = draft.down.iter().map(|op| (op.kind(), op.table())).collect();
        assert_eq!(
            down,
            vec![
                ("drop_association", "Users"),
                ("drop_table", "RoleUsers"),
                ("drop_table", "Users"),
                ("drop_table", "Roles"),
            ]
        );

        let migrated = draft.verify(&base).unwrap();
        assert_eq!(migrated, target());
    }

    #[test]
    fn test_self_reference_is_not_folded() {
        let folded = fold(vec![
            SchemaOperation::CreateTable {
                table: "Categories".into(),
                columns: vec![ColumnDefinition::new("id", DataKind::Integer).primary_key()],
                indexes: vec![],
            },
            SchemaOperation::AddColumn {
                table: "Categories".into(),
                column: ColumnDefinition::new("parent_id", DataKind::Integer)
                    .nullable()
                    .references("Categories"),
                index: 1,
            },
        ]);
        assert_eq!(folded.len(), 2);
    }

    #[test]
    fn test_forward_reference_is_not_folded() {
        let folded = fold(vec![
            SchemaOperation::CreateTable {
                table: "Authors".into(),
                columns: vec![ColumnDefinition::new("id", DataKind::Integer).primary_key()],
                indexes: vec![],
            },
            SchemaOperation::AddColumn {
                table: "Authors".into(),
                column: ColumnDefinition::new("book_id", DataKind::Integer).references("Books"),
                index: 1,
            },
            SchemaOperation::CreateTable {
                table: "Books".into(),
                columns: vec![ColumnDefinition::new("id", DataKind::Integer).primary_key()],
                indexes: vec![],
            },
        ]);
        assert_eq!(folded.len(), 3);
        assert_eq!(folded[1].kind(), "add_column");
    }

    #[test]
    fn test_alter_without_before_fails() {
        let err = Synthesizer::new()
            .synthesize(vec![SchemaOperation::AlterColumn {
                table: "Users".into(),
                column: "email".into(),
                before: None,
                after: ColumnDefinition::new("email", DataKind::Text),
            }])
            .unwrap_err();
        assert!(matches!(err, MigrationError::UngeneratableInverse { .. }));
    }

    #[test]
    fn test_inverse_law_on_changes() {
        let base = target();
        let mut next = target();
        next.remove("RoleUsers");
        if let Some(users) = next.table_mut("Users") {
            users.associations.clear();
            users.columns[1] = ColumnDefinition::new("email", DataKind::Text).nullable();
            users.columns.push(ColumnDefinition::new("isActive", DataKind::Boolean));
        }

        let draft = synthesize(&base, &next);
        assert_eq!(draft.verify(&base).unwrap(), next);
    }
}
