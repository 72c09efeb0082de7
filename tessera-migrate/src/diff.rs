//! Schema diffing.
//!
//! [`SchemaDiffer`] turns a base schema (replayed from history) into a target
//! schema (extracted from models) with an ordered list of operations:
//!
//! 1. drop associations the target no longer has
//! 2. create new tables in foreign key dependency order
//! 3. alter shared tables (indexes and columns)
//! 4. drop removed tables in reverse dependency order
//! 5. add associations the base did not have
//!
//! Every operation is applied to a working copy of the base as it is
//! emitted, which both computes column positions and guarantees the output
//! replays cleanly.

use std::collections::{BTreeMap, BTreeSet};

use tessera_schema::{ColumnDefinition, SchemaDefinition, TableSchema};

use crate::error::{MigrateResult, MigrationError};
use crate::operation::SchemaOperation;
use crate::replay::apply;

/// An ordered diff between two schemas.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaDiff {
    /// Operations in execution order.
    pub operations: Vec<SchemaOperation>,
}

impl SchemaDiff {
    /// Check if there are any differences.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Number of operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Operations that remove tables or columns.
    pub fn destructive(&self) -> impl Iterator<Item = &SchemaOperation> {
        self.operations.iter().filter(|op| op.is_destructive())
    }

    /// Data loss warnings for destructive operations.
    pub fn warnings(&self) -> Vec<String> {
        self.destructive()
            .map(|op| match op {
                SchemaOperation::DropTable { table } => {
                    format!("Dropping table {} deletes all of its rows", table.name)
                }
                other => format!(
                    "Dropping column {}.{} deletes its data",
                    other.table(),
                    other.column().unwrap_or_default()
                ),
            })
            .collect()
    }

    /// Get a human-readable summary of the diff.
    pub fn summary(&self) -> String {
        const LABELS: [(&str, &str, &str); 10] = [
            ("create_table", "Create", "table"),
            ("drop_table", "Drop", "table"),
            ("add_column", "Add", "column"),
            ("drop_column", "Drop", "column"),
            ("alter_column", "Alter", "column"),
            ("move_column", "Move", "column"),
            ("add_index", "Add", "index"),
            ("drop_index", "Drop", "index"),
            ("add_association", "Add", "association"),
            ("drop_association", "Drop", "association"),
        ];

        let mut parts = Vec::new();
        for (kind, verb, noun) in LABELS {
            let count = self.operations.iter().filter(|op| op.kind() == kind).count();
            if count == 0 {
                continue;
            }
            let noun = match (count, noun) {
                (1, noun) => noun.to_string(),
                (_, "index") => "indexes".to_string(),
                (_, noun) => format!("{}s", noun),
            };
            parts.push(format!("{} {} {}", verb, count, noun));
        }

        if parts.is_empty() {
            "No changes".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// Schema differ.
#[derive(Debug, Clone)]
pub struct SchemaDiffer {
    /// Last-known schema.
    base: SchemaDefinition,
    /// Target schema (desired state).
    target: SchemaDefinition,
}

impl SchemaDiffer {
    /// Create a differ against an empty base.
    pub fn new(target: SchemaDefinition) -> Self {
        Self {
            base: SchemaDefinition::new(),
            target,
        }
    }

    /// Set the base schema.
    pub fn with_base(mut self, base: SchemaDefinition) -> Self {
        self.base = base;
        self
    }

    /// Compute the ordered operations that turn the base into the target.
    pub fn diff(&self) -> MigrateResult<SchemaDiff> {
        validate_target(&self.target)?;

        let mut emitter = Emitter {
            working: self.base.clone(),
            operations: Vec::new(),
        };

        self.drop_associations(&mut emitter)?;
        self.create_tables(&mut emitter)?;
        self.alter_tables(&mut emitter)?;
        self.drop_tables(&mut emitter)?;
        self.add_associations(&mut emitter)?;

        let diff = SchemaDiff {
            operations: emitter.operations,
        };
        tracing::debug!(operations = diff.len(), summary = %diff.summary(), "Computed schema diff");
        Ok(diff)
    }

    fn drop_associations(&self, emitter: &mut Emitter) -> MigrateResult<()> {
        let removed: Vec<_> = self
            .base
            .associations()
            .filter(|a| {
                !self
                    .target
                    .table(&a.source)
                    .is_some_and(|t| t.associations.contains(*a))
            })
            .cloned()
            .collect();

        for association in removed {
            emitter.emit(SchemaOperation::DropAssociation { association })?;
        }
        Ok(())
    }

    fn add_associations(&self, emitter: &mut Emitter) -> MigrateResult<()> {
        let added: Vec<_> = self
            .target
            .associations()
            .filter(|a| {
                !emitter
                    .working
                    .table(&a.source)
                    .is_some_and(|t| t.associations.contains(*a))
            })
            .cloned()
            .collect();

        for association in added {
            emitter.emit(SchemaOperation::AddAssociation { association })?;
        }
        Ok(())
    }

    fn create_tables(&self, emitter: &mut Emitter) -> MigrateResult<()> {
        let new_tables: BTreeSet<&str> = self
            .target
            .table_names()
            .filter(|name| !self.base.contains(name))
            .collect();
        let plan = CreationPlan::new(&self.target, &new_tables);

        for name in &plan.order {
            let Some(table) = self.target.table(name) else {
                continue;
            };
            let deferred = plan.deferred.get(name);

            let columns: Vec<ColumnDefinition> = table
                .columns
                .iter()
                .filter(|c| !c.is_foreign_key())
                .cloned()
                .collect();
            let indexes = table
                .indexes
                .iter()
                .filter(|i| i.columns.iter().all(|c| columns.iter().any(|col| col.name == *c)))
                .cloned()
                .collect();
            emitter.emit(SchemaOperation::CreateTable {
                table: name.clone(),
                columns,
                indexes,
            })?;

            // Keys to other tables first, then self references.
            let (self_refs, other_refs): (Vec<_>, Vec<_>) = table
                .columns
                .iter()
                .filter(|c| c.is_foreign_key())
                .filter(|c| !deferred.is_some_and(|d| d.contains(&c.name)))
                .partition(|c| c.references.as_deref() == Some(name.as_str()));
            for column in other_refs.into_iter().chain(self_refs) {
                emitter.add_column(table, column)?;
            }
            emitter.add_complete_indexes(table)?;
        }

        for name in &plan.order {
            let (Some(table), Some(deferred)) = (self.target.table(name), plan.deferred.get(name))
            else {
                continue;
            };
            for column in table.columns.iter().filter(|c| deferred.contains(&c.name)) {
                emitter.add_column(table, column)?;
            }
            emitter.add_complete_indexes(table)?;
        }
        Ok(())
    }

    fn alter_tables(&self, emitter: &mut Emitter) -> MigrateResult<()> {
        for target in self.target.tables() {
            let Some(current) = emitter.working.table(&target.name).cloned() else {
                continue;
            };
            if !self.base.contains(&target.name) {
                continue;
            }

            for index in current.indexes.iter().filter(|i| !target.indexes.contains(*i)) {
                emitter.emit(SchemaOperation::DropIndex {
                    table: target.name.clone(),
                    index: index.clone(),
                })?;
            }

            for column in current.columns.iter().filter(|c| !target.has_column(&c.name)) {
                emitter.drop_column(&target.name, &column.name)?;
            }

            for column in &target.columns {
                if let Some(before) = current.column(&column.name)
                    && before != column
                {
                    emitter.emit(SchemaOperation::AlterColumn {
                        table: target.name.clone(),
                        column: column.name.clone(),
                        before: Some(before.clone()),
                        after: column.clone(),
                    })?;
                }
            }

            emitter.reorder_columns(target)?;

            for column in target.columns.iter().filter(|c| !current.has_column(&c.name)) {
                emitter.add_column(target, column)?;
            }

            emitter.add_complete_indexes(target)?;
        }
        Ok(())
    }

    fn drop_tables(&self, emitter: &mut Emitter) -> MigrateResult<()> {
        let removed: BTreeSet<&str> = self
            .base
            .table_names()
            .filter(|name| !self.target.contains(name))
            .collect();
        if removed.is_empty() {
            return Ok(());
        }

        // Mirror of creation: plan as if the removed tables were being
        // created, then undo that plan back to front.
        let snapshot = emitter.working.clone();
        let plan = CreationPlan::new(&snapshot, &removed);

        for name in plan.order.iter().rev() {
            let (Some(table), Some(deferred)) = (snapshot.table(name), plan.deferred.get(name))
            else {
                continue;
            };
            for column in table.columns.iter().rev().filter(|c| deferred.contains(&c.name)) {
                let covering: Vec<_> = emitter
                    .working
                    .table(name)
                    .map(|t| {
                        t.indexes
                            .iter()
                            .filter(|i| i.columns.contains(&column.name))
                            .cloned()
                            .collect()
                    })
                    .unwrap_or_default();
                for index in covering {
                    emitter.emit(SchemaOperation::DropIndex {
                        table: name.clone(),
                        index,
                    })?;
                }
                emitter.drop_column(name, &column.name)?;
            }
        }

        for name in plan.order.iter().rev() {
            let Some(table) = emitter.working.table(name).cloned() else {
                continue;
            };
            emitter.emit(SchemaOperation::DropTable { table })?;
        }
        Ok(())
    }
}

/// Accumulates operations while keeping a working copy of the schema.
struct Emitter {
    working: SchemaDefinition,
    operations: Vec<SchemaOperation>,
}

impl Emitter {
    fn emit(&mut self, op: SchemaOperation) -> MigrateResult<()> {
        apply(&mut self.working, &op).map_err(|e| MigrationError::DiffInconsistency {
            table: e.table.clone(),
            column: e.column.clone(),
            message: format!("generated {} was rejected: {}", e.operation, e.message),
        })?;
        tracing::trace!(operation = %op, "Emitted operation");
        self.operations.push(op);
        Ok(())
    }

    /// Add a target column at the position matching the target's column order.
    fn add_column(&mut self, target: &TableSchema, column: &ColumnDefinition) -> MigrateResult<()> {
        let index = match self.working.table(&target.name) {
            Some(current) => target
                .columns
                .iter()
                .take_while(|c| c.name != column.name)
                .filter(|c| current.has_column(&c.name))
                .count(),
            None => 0,
        };
        self.emit(SchemaOperation::AddColumn {
            table: target.name.clone(),
            column: column.clone(),
            index,
        })
    }

    /// Move the columns shared with the target into the target's relative
    /// order, front to back.
    fn reorder_columns(&mut self, target: &TableSchema) -> MigrateResult<()> {
        let Some(current) = self.working.table(&target.name) else {
            return Ok(());
        };
        let desired: Vec<String> = target
            .columns
            .iter()
            .filter(|c| current.has_column(&c.name))
            .map(|c| c.name.clone())
            .collect();

        for (to, name) in desired.into_iter().enumerate() {
            let from = self
                .working
                .table(&target.name)
                .and_then(|t| t.column_position(&name));
            if let Some(from) = from
                && from != to
            {
                self.emit(SchemaOperation::MoveColumn {
                    table: target.name.clone(),
                    column: name,
                    from,
                    to,
                })?;
            }
        }
        Ok(())
    }

    fn drop_column(&mut self, table: &str, column: &str) -> MigrateResult<()> {
        let Some((index, definition)) = self.working.table(table).and_then(|t| {
            t.column_position(column)
                .map(|index| (index, t.columns[index].clone()))
        }) else {
            return Err(MigrationError::inconsistent_column(
                table,
                column,
                "column to drop is missing from the working schema",
            ));
        };
        self.emit(SchemaOperation::DropColumn {
            table: table.to_string(),
            column: definition,
            index,
        })
    }

    /// Add every target index that is missing and whose columns now exist.
    fn add_complete_indexes(&mut self, target: &TableSchema) -> MigrateResult<()> {
        let Some(current) = self.working.table(&target.name) else {
            return Ok(());
        };
        let ready: Vec<_> = target
            .indexes
            .iter()
            .filter(|i| !current.indexes.contains(*i))
            .filter(|i| i.columns.iter().all(|c| current.has_column(c)))
            .cloned()
            .collect();

        for index in ready {
            self.emit(SchemaOperation::AddIndex {
                table: target.name.clone(),
                index,
            })?;
        }
        Ok(())
    }
}

/// Creation order for a set of tables linked by foreign keys.
///
/// Tables are taken in lexicographic order as soon as every table they
/// reference exists. When every remaining table waits on another, the
/// smallest table on a cycle is created first and its keys to the missing
/// tables are deferred until all tables exist.
#[derive(Debug, Default)]
struct CreationPlan {
    order: Vec<String>,
    deferred: BTreeMap<String, BTreeSet<String>>,
}

impl CreationPlan {
    fn new(schema: &SchemaDefinition, tables: &BTreeSet<&str>) -> Self {
        let deps: BTreeMap<&str, BTreeSet<&str>> = tables
            .iter()
            .map(|&name| {
                let refs = schema
                    .table(name)
                    .map(|t| {
                        t.referenced_tables()
                            .into_iter()
                            .filter(|r| *r != name && tables.contains(r))
                            .collect()
                    })
                    .unwrap_or_default();
                (name, refs)
            })
            .collect();

        let mut plan = CreationPlan::default();
        let mut remaining: BTreeSet<&str> = tables.clone();
        let mut created: BTreeSet<&str> = BTreeSet::new();

        while !remaining.is_empty() {
            let ready = remaining
                .iter()
                .copied()
                .find(|name| deps[name].iter().all(|d| created.contains(d)));

            let next = match ready {
                Some(name) => name,
                None => {
                    let Some(name) = remaining
                        .iter()
                        .copied()
                        .find(|name| on_cycle(name, &deps, &remaining))
                    else {
                        break;
                    };
                    let waiting: BTreeSet<String> = schema
                        .table(name)
                        .map(|t| {
                            t.foreign_keys()
                                .filter(|(_, r)| *r != name && remaining.contains(r))
                                .map(|(column, _)| column.to_string())
                                .collect()
                        })
                        .unwrap_or_default();
                    tracing::debug!(table = name, columns = ?waiting, "Deferring cyclic foreign keys");
                    plan.deferred.insert(name.to_string(), waiting);
                    name
                }
            };

            remaining.remove(next);
            created.insert(next);
            plan.order.push(next.to_string());
        }
        plan
    }
}

/// Check if `start` can reach itself through tables in `remaining`.
fn on_cycle(start: &str, deps: &BTreeMap<&str, BTreeSet<&str>>, remaining: &BTreeSet<&str>) -> bool {
    let mut stack: Vec<&str> = deps[start].iter().copied().collect();
    let mut seen = BTreeSet::new();
    while let Some(name) = stack.pop() {
        if name == start {
            return true;
        }
        if !remaining.contains(name) || !seen.insert(name) {
            continue;
        }
        stack.extend(deps[name].iter().copied());
    }
    false
}

/// Reject target schemas that no sequence of operations could produce.
fn validate_target(target: &SchemaDefinition) -> MigrateResult<()> {
    for (key, table) in target.entries() {
        if key.is_empty() || table.name.is_empty() {
            return Err(MigrationError::inconsistent(key, "table name is empty"));
        }
        if key != table.name {
            return Err(MigrationError::inconsistent(
                key,
                format!("table is registered under a different name `{}`", table.name),
            ));
        }

        let mut names = BTreeSet::new();
        for column in &table.columns {
            if column.name.is_empty() {
                return Err(MigrationError::inconsistent(key, "column name is empty"));
            }
            if !names.insert(column.name.as_str()) {
                return Err(MigrationError::inconsistent_column(
                    key,
                    &column.name,
                    "column is declared more than once",
                ));
            }
            if let Some(referenced) = &column.references
                && !target.contains(referenced)
            {
                return Err(MigrationError::inconsistent_column(
                    key,
                    &column.name,
                    format!("references missing table `{}`", referenced),
                ));
            }
        }

        let mut index_names = BTreeSet::new();
        for index in &table.indexes {
            if index.name.is_empty() || !index_names.insert(index.name.as_str()) {
                return Err(MigrationError::inconsistent(
                    key,
                    format!("index name `{}` is empty or duplicated", index.name),
                ));
            }
            if index.columns.is_empty() {
                return Err(MigrationError::inconsistent(
                    key,
                    format!("index `{}` has no columns", index.name),
                ));
            }
            if let Some(missing) = index.columns.iter().find(|c| !names.contains(c.as_str())) {
                return Err(MigrationError::inconsistent_column(
                    key,
                    missing,
                    format!("index `{}` covers a missing column", index.name),
                ));
            }
        }

        for association in &table.associations {
            if association.source != key {
                return Err(MigrationError::inconsistent(
                    key,
                    format!("association {} is declared on the wrong table", association),
                ));
            }
            if let Some(missing) = association.tables().into_iter().find(|t| !target.contains(t)) {
                return Err(MigrationError::inconsistent(
                    key,
                    format!("association {} uses missing table `{}`", association, missing),
                ));
            }
            let owner = association.owning_table();
            for column in association.key_columns() {
                if !target.table(owner).is_some_and(|t| t.has_column(column)) {
                    return Err(MigrationError::inconsistent_column(
                        owner,
                        column,
                        format!("key column of association {} is missing", association),
                    ));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::apply_all;
    use pretty_assertions::assert_eq;
    use tessera_schema::{
        AssociationDefinition, DataKind, DefaultValue, IndexDefinition, JoinTable,
    };

    fn users() -> TableSchema {
        TableSchema::new("Users")
            .with_column(ColumnDefinition::new("username", DataKind::String).primary_key())
            .with_column(ColumnDefinition::new("email", DataKind::String))
    }

    fn roles() -> TableSchema {
        TableSchema::new("Roles")
            .with_column(ColumnDefinition::new("id", DataKind::Integer).primary_key())
            .with_column(ColumnDefinition::new("name", DataKind::String))
    }

    fn role_users() -> TableSchema {
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
    }

    fn membership() -> AssociationDefinition {
        AssociationDefinition::belongs_to_many(
            "Users",
            "Roles",
            JoinTable {
                name: "RoleUsers".into(),
                source_key: "user_id".into(),
                target_key: "role_id".into(),
            },
        )
    }

    fn with_roles() -> SchemaDefinition {
        SchemaDefinition::new()
            .with_table(users().with_association(membership()))
            .with_table(roles())
            .with_table(role_users())
    }

    fn diff(base: &SchemaDefinition, target: &SchemaDefinition) -> SchemaDiff {
        SchemaDiffer::new(target.clone())
            .with_base(base.clone())
            .diff()
            .unwrap()
    }

    fn kinds(diff: &SchemaDiff) -> Vec<(&'static str, String)> {
        diff.operations
            .iter()
            .map(|op| (op.kind(), op.table().to_string()))
            .collect()
    }

    fn assert_sound(base: &SchemaDefinition, target: &SchemaDefinition, diff: &SchemaDiff) {
        let mut schema = base.clone();
        apply_all(&mut schema, &diff.operations).unwrap();
        assert_eq!(&schema, target);
    }

    #[test]
    fn test_create_single_table() {
        let target = SchemaDefinition::new().with_table(users());
        let diff = diff(&SchemaDefinition::new(), &target);

        assert_eq!(
            diff.operations,
            vec![SchemaOperation::CreateTable {
                table: "Users".into(),
                columns: users().columns,
                indexes: vec![],
            }]
        );
        assert_eq!(diff.summary(), "Create 1 table");
    }

    #[test]
    fn test_add_column_with_default() {
        let base = SchemaDefinition::new().with_table(users());
        let is_active =
            ColumnDefinition::new("isActive", DataKind::Boolean).with_default(DefaultValue::Bool(true));
        let target = SchemaDefinition::new().with_table(users().with_column(is_active.clone()));

        let diff = diff(&base, &target);
        assert_eq!(
            diff.operations,
            vec![SchemaOperation::AddColumn {
                table: "Users".into(),
                column: is_active,
                index: 2,
            }]
        );
        assert_sound(&base, &target, &diff);
    }

    #[test]
    fn test_type_change_is_alter() {
        let base = SchemaDefinition::new().with_table(users());
        let mut changed = users();
        changed.columns[1] = ColumnDefinition::new("email", DataKind::Text).nullable();
        let target = SchemaDefinition::new().with_table(changed);

        let diff = diff(&base, &target);
        assert_eq!(kinds(&diff), vec![("alter_column", "Users".to_string())]);
        match &diff.operations[0] {
            SchemaOperation::AlterColumn { before, after, .. } => {
                assert_eq!(before.as_ref().unwrap().kind, DataKind::String);
                assert_eq!(after.kind, DataKind::Text);
            }
            other => panic!("unexpected operation {:?}", other),
        }
    }

    #[test]
    fn test_rename_is_drop_and_add() {
        let base = SchemaDefinition::new().with_table(users());
        let mut renamed = users();
        renamed.columns[1].name = "mail".into();
        let target = SchemaDefinition::new().with_table(renamed);

        let diff = diff(&base, &target);
        assert_eq!(
            kinds(&diff),
            vec![
                ("drop_column", "Users".to_string()),
                ("add_column", "Users".to_string()),
            ]
        );
        assert_sound(&base, &target, &diff);
    }

    #[test]
    fn test_join_table_created_after_both_sides() {
        let target = with_roles();
        let diff = diff(&SchemaDefinition::new(), &target);

        let creates: Vec<_> = diff
            .operations
            .iter()
            .filter(|op| op.kind() == "create_table")
            .map(|op| op.table().to_string())
            .collect();
        assert_eq!(creates, vec!["Roles", "Users", "RoleUsers"]);
        assert_eq!(
            diff.operations.last().map(|op| op.kind()),
            Some("add_association")
        );
        assert_sound(&SchemaDefinition::new(), &target, &diff);
    }

    #[test]
    fn test_dropping_user_drops_join_table_first() {
        let base = with_roles();
        let target = SchemaDefinition::new().with_table(roles());

        let diff = diff(&base, &target);
        assert_eq!(
            kinds(&diff),
            vec![
                ("drop_association", "Users".to_string()),
                ("drop_table", "RoleUsers".to_string()),
                ("drop_table", "Users".to_string()),
            ]
        );
        assert_sound(&base, &target, &diff);
    }

    #[test]
    fn test_identical_schemas_produce_nothing() {
        let schema = with_roles();
        assert!(diff(&schema, &schema).is_empty());
    }

    #[test]
    fn test_self_reference_added_after_create() {
        let categories = TableSchema::new("Categories")
            .with_column(ColumnDefinition::new("id", DataKind::Integer).primary_key())
            .with_column(
                ColumnDefinition::new("parent_id", DataKind::Integer)
                    .nullable()
                    .references("Categories"),
            )
            .with_column(ColumnDefinition::new("name", DataKind::String));
        let target = SchemaDefinition::new().with_table(categories);

        let diff = diff(&SchemaDefinition::new(), &target);
        assert_eq!(
            kinds(&diff),
            vec![
                ("create_table", "Categories".to_string()),
                ("add_column", "Categories".to_string()),
            ]
        );
        match &diff.operations[1] {
            SchemaOperation::AddColumn { index, .. } => assert_eq!(*index, 1),
            other => panic!("unexpected operation {:?}", other),
        }
        assert_sound(&SchemaDefinition::new(), &target, &diff);
    }

    fn cyclic() -> SchemaDefinition {
        SchemaDefinition::new()
            .with_table(
                TableSchema::new("Authors")
                    .with_column(ColumnDefinition::new("id", DataKind::Integer).primary_key())
                    .with_column(
                        ColumnDefinition::new("featured_book_id", DataKind::Integer)
                            .nullable()
                            .references("Books"),
                    )
                    .with_index(IndexDefinition::new(
                        "authors_featured_book_id_idx",
                        vec!["featured_book_id".into()],
                    )),
            )
            .with_table(
                TableSchema::new("Books")
                    .with_column(ColumnDefinition::new("id", DataKind::Integer).primary_key())
                    .with_column(
                        ColumnDefinition::new("author_id", DataKind::Integer).references("Authors"),
                    ),
            )
    }

    #[test]
    fn test_cycle_defers_foreign_key() {
        let target = cyclic();
        let diff = diff(&SchemaDefinition::new(), &target);

        assert_eq!(
            kinds(&diff),
            vec![
                ("create_table", "Authors".to_string()),
                ("create_table", "Books".to_string()),
                ("add_column", "Books".to_string()),
                ("add_column", "Authors".to_string()),
                ("add_index", "Authors".to_string()),
            ]
        );
        assert_sound(&SchemaDefinition::new(), &target, &diff);
    }

    #[test]
    fn test_cycle_drop_mirrors_creation() {
        let base = cyclic();
        let diff = diff(&base, &SchemaDefinition::new());

        assert_eq!(
            kinds(&diff),
            vec![
                ("drop_index", "Authors".to_string()),
                ("drop_column", "Authors".to_string()),
                ("drop_table", "Books".to_string()),
                ("drop_table", "Authors".to_string()),
            ]
        );
        assert_sound(&base, &SchemaDefinition::new(), &diff);
    }

    #[test]
    fn test_index_change_is_drop_and_add() {
        let base = SchemaDefinition::new()
            .with_table(users().with_index(IndexDefinition::new("users_email_idx", vec!["email".into()])));
        let target = SchemaDefinition::new()
            .with_table(users().with_index(IndexDefinition::unique("users_email_idx", vec!["email".into()])));

        let diff = diff(&base, &target);
        assert_eq!(
            kinds(&diff),
            vec![
                ("drop_index", "Users".to_string()),
                ("add_index", "Users".to_string()),
            ]
        );
        assert_sound(&base, &target, &diff);
    }

    #[test]
    fn test_new_foreign_key_on_existing_table() {
        let base = SchemaDefinition::new().with_table(users());
        let target = SchemaDefinition::new()
            .with_table(users().with_column(
                ColumnDefinition::new("team_id", DataKind::Integer).nullable().references("Teams"),
            ))
            .with_table(
                TableSchema::new("Teams")
                    .with_column(ColumnDefinition::new("id", DataKind::Integer).primary_key()),
            );

        let diff = diff(&base, &target);
        assert_eq!(
            kinds(&diff),
            vec![
                ("create_table", "Teams".to_string()),
                ("add_column", "Users".to_string()),
            ]
        );
        assert_sound(&base, &target, &diff);
    }

    #[test]
    fn test_diff_is_deterministic() {
        let target = with_roles();
        let first = diff(&SchemaDefinition::new(), &target);
        let second = diff(&SchemaDefinition::new(), &target);
        assert_eq!(
            serde_json::to_string(&first.operations).unwrap(),
            serde_json::to_string(&second.operations).unwrap()
        );
    }

    #[test]
    fn test_dangling_reference_is_inconsistent() {
        let target = SchemaDefinition::new().with_table(
            TableSchema::new("Posts")
                .with_column(ColumnDefinition::new("user_id", DataKind::Integer).references("Users")),
        );
        let err = SchemaDiffer::new(target).diff().unwrap_err();
        assert!(matches!(
            err,
            MigrationError::DiffInconsistency { ref table, ref column, .. }
                if table == "Posts" && column.as_deref() == Some("user_id")
        ));
    }

    #[test]
    fn test_warnings_for_destructive_changes() {
        let base = with_roles();
        let target = SchemaDefinition::new().with_table(roles());
        let warnings = diff(&base, &target).warnings();
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("RoleUsers"));
    }

    #[test]
    fn test_reorder_with_added_column() {
        let table = |names: &[&str]| {
            names.iter().fold(TableSchema::new("Users"), |table, name| {
                table.with_column(ColumnDefinition::new(*name, DataKind::String))
            })
        };
        let base = SchemaDefinition::new().with_table(table(&["id", "name", "email"]));
        let target = SchemaDefinition::new().with_table(table(&["id", "email", "name", "age"]));

        let diff = diff(&base, &target);
        assert_eq!(
            diff.operations,
            vec![
                SchemaOperation::MoveColumn {
                    table: "Users".into(),
                    column: "email".into(),
                    from: 2,
                    to: 1,
                },
                SchemaOperation::AddColumn {
                    table: "Users".into(),
                    column: ColumnDefinition::new("age", DataKind::String),
                    index: 3,
                },
            ]
        );
        assert_eq!(diff.summary(), "Add 1 column, Move 1 column");
        assert_sound(&base, &target, &diff);
    }
}
