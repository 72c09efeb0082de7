//! Schema extraction: model definitions to canonical schema.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::annotations::{AnnotationMap, CapabilityMap, ColumnAnnotation};
use crate::error::{SchemaError, SchemaResult};
use crate::model::{AssociationDeclaration, ModelDefinition, ModelSet};
use crate::naming::{foreign_key_name, index_name, join_table_name};
use crate::schema::{
    AssociationDefinition, AssociationKind, ColumnDefinition, DataKind, IndexDefinition,
    JoinTable, SchemaDefinition, TableSchema,
};

/// Output of schema extraction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    /// Structural schema, the only input to diffing.
    pub schema: SchemaDefinition,
    /// Presentation metadata keyed by table and column.
    pub annotations: AnnotationMap,
    /// Methods exposed per table.
    pub capabilities: CapabilityMap,
}

/// Turns model definitions into a canonical [`SchemaDefinition`].
///
/// Extraction is deterministic: columns keep declaration order, implicit
/// foreign key columns are appended after declared fields, and associations
/// are resolved in lexicographic model order.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaExtractor;

impl SchemaExtractor {
    /// Create an extractor.
    pub fn new() -> Self {
        Self
    }

    /// Extract the canonical schema and its side tables.
    pub fn extract(&self, models: &ModelSet) -> SchemaResult<Extraction> {
        let by_name = models.by_name()?;

        let mut tables_by_model: BTreeMap<&str, String> = BTreeMap::new();
        let mut seen_tables = HashSet::new();
        for (name, model) in &by_name {
            let table = model.table_name();
            if table.trim().is_empty() {
                return Err(SchemaError::missing_name("table", name.as_str()));
            }
            if !seen_tables.insert(table.to_string()) {
                return Err(SchemaError::duplicate("table", table));
            }
            tables_by_model.insert(name.as_str(), table.to_string());
        }

        let mut extraction = Extraction::default();
        let mut tables: BTreeMap<String, TableSchema> = BTreeMap::new();

        for model in by_name.values() {
            let table = self.declared_table(model, &mut extraction)?;
            tables.insert(table.name.clone(), table);
        }

        let mut builder = AssociationResolver {
            tables_by_model: &tables_by_model,
            tables: &mut tables,
            implicit_joins: BTreeSet::new(),
        };
        let mut ordered: Vec<&ModelDefinition> = by_name.values().copied().collect();
        ordered.sort_by(|a, b| a.name.cmp(&b.name));
        for model in &ordered {
            for association in &model.associations {
                builder.resolve(model, association)?;
            }
        }

        for model in &ordered {
            let Some(table) = tables.get_mut(model.table_name()) else {
                continue;
            };
            for decl in &model.indexes {
                let name = decl
                    .name
                    .clone()
                    .unwrap_or_else(|| index_name(&table.name, &decl.columns, decl.unique));
                if decl.columns.is_empty() {
                    return Err(SchemaError::invalid_index(
                        model.name.as_str(),
                        name,
                        "index has no columns",
                    ));
                }
                if let Some(missing) = decl.columns.iter().find(|c| !table.has_column(c)) {
                    return Err(SchemaError::invalid_index(
                        model.name.as_str(),
                        name,
                        format!("unknown column `{}`", missing),
                    ));
                }
                if table.index(&name).is_some() {
                    return Err(SchemaError::duplicate("index", name));
                }
                table.indexes.insert(IndexDefinition {
                    name,
                    columns: decl.columns.clone(),
                    unique: decl.unique,
                });
            }
        }

        for table in tables.into_values() {
            extraction.schema.insert(table);
        }
        extraction.annotations.prune();

        tracing::debug!(
            tables = extraction.schema.len(),
            annotated = extraction.annotations.len(),
            "Extracted canonical schema"
        );

        Ok(extraction)
    }

    /// Build the table for a model's declared fields, recording presentation
    /// metadata and capabilities on the side.
    fn declared_table(
        &self,
        model: &ModelDefinition,
        extraction: &mut Extraction,
    ) -> SchemaResult<TableSchema> {
        let table_name = model.table_name();
        let mut table = TableSchema::new(table_name);

        let annotations = extraction.annotations.table_entry(table_name);
        annotations.label = model.label.clone();

        let mut seen = HashSet::new();
        for field in &model.fields {
            if field.name.trim().is_empty() {
                return Err(SchemaError::missing_name("field", model.name.as_str()));
            }
            if !seen.insert(field.name.clone()) {
                return Err(SchemaError::invalid_field(
                    model.name.as_str(),
                    field.name.as_str(),
                    "declared more than once",
                ));
            }

            if field.has_presentation() || !field.is_persisted() {
                annotations.columns.insert(
                    field.name.to_string(),
                    ColumnAnnotation {
                        label: field.label.clone(),
                        hint: field.hint.clone(),
                        hidden: field.hidden,
                        computed: !field.is_persisted(),
                    },
                );
            }

            let Some(kind) = field.kind.data_kind() else {
                continue;
            };
            table.columns.push(ColumnDefinition {
                name: field.name.to_string(),
                kind: kind.clone(),
                nullable: field.nullable,
                default: field.default.clone(),
                unique: field.unique,
                primary_key: field.primary_key,
                references: None,
            });
        }

        for method in &model.methods {
            extraction.capabilities.expose(table_name, method);
        }

        Ok(table)
    }
}

/// Resolves association declarations into foreign key columns, join tables
/// and association metadata.
struct AssociationResolver<'a> {
    tables_by_model: &'a BTreeMap<&'a str, String>,
    tables: &'a mut BTreeMap<String, TableSchema>,
    implicit_joins: BTreeSet<String>,
}

impl AssociationResolver<'_> {
    fn resolve(
        &mut self,
        model: &ModelDefinition,
        decl: &AssociationDeclaration,
    ) -> SchemaResult<()> {
        let source = model.table_name().to_string();
        let target = self
            .tables_by_model
            .get(decl.target.as_str())
            .cloned()
            .ok_or_else(|| {
                SchemaError::invalid_association(
                    model.name.as_str(),
                    decl.target.as_str(),
                    "unknown target model",
                )
            })?;

        let association = match decl.kind {
            AssociationKind::BelongsTo => {
                let fk = decl
                    .foreign_key
                    .clone()
                    .unwrap_or_else(|| foreign_key_name(&target));
                self.ensure_key_column(&source, &fk, &target, !decl.required)?;
                AssociationDefinition::belongs_to(&source, &target, fk)
            }
            AssociationKind::HasMany => {
                let fk = decl
                    .foreign_key
                    .clone()
                    .unwrap_or_else(|| foreign_key_name(&source));
                self.ensure_key_column(&target, &fk, &source, !decl.required)?;
                AssociationDefinition::has_many(&source, &target, fk)
            }
            AssociationKind::BelongsToMany => {
                let join = JoinTable {
                    name: decl
                        .through
                        .clone()
                        .unwrap_or_else(|| join_table_name(&source, &target)),
                    source_key: decl
                        .foreign_key
                        .clone()
                        .unwrap_or_else(|| foreign_key_name(&source)),
                    target_key: decl
                        .other_key
                        .clone()
                        .unwrap_or_else(|| foreign_key_name(&target)),
                };
                if join.source_key == join.target_key {
                    return Err(SchemaError::invalid_association(
                        model.name.as_str(),
                        decl.target.as_str(),
                        "join table keys must differ; set `foreign_key` or `other_key`",
                    ));
                }
                self.ensure_join_table(&source, &target, &join)?;
                AssociationDefinition::belongs_to_many(&source, &target, join)
            }
        };

        if let Some(table) = self.tables.get_mut(&source) {
            table.associations.insert(association);
        }
        Ok(())
    }

    fn ensure_join_table(
        &mut self,
        source: &str,
        target: &str,
        join: &JoinTable,
    ) -> SchemaResult<()> {
        if self.implicit_joins.contains(&join.name) {
            // Declared from the other side already; the columns may be in
            // either order but both must be present.
            let table = &self.tables[&join.name];
            for key in [&join.source_key, &join.target_key] {
                if !table.has_column(key) {
                    return Err(SchemaError::invalid_association(
                        source,
                        target,
                        format!("join table `{}` has no column `{}`", join.name, key),
                    ));
                }
            }
            return Ok(());
        }

        if self.tables.contains_key(&join.name) {
            // An explicit model backs the join table.
            self.ensure_key_column(&join.name, &join.source_key, source, false)?;
            self.ensure_key_column(&join.name, &join.target_key, target, false)?;
            return Ok(());
        }

        let mut table = TableSchema::new(&join.name);
        table.columns.push(ColumnDefinition {
            name: join.source_key.clone(),
            kind: self.key_kind(source),
            nullable: false,
            default: None,
            unique: false,
            primary_key: true,
            references: Some(source.to_string()),
        });
        table.columns.push(ColumnDefinition {
            name: join.target_key.clone(),
            kind: self.key_kind(target),
            nullable: false,
            default: None,
            unique: false,
            primary_key: true,
            references: Some(target.to_string()),
        });
        self.tables.insert(join.name.clone(), table);
        self.implicit_joins.insert(join.name.clone());
        Ok(())
    }

    /// Make sure `table.column` exists as a foreign key to `references`.
    ///
    /// An explicitly declared column is kept as declared; it only gains the
    /// reference if it had none.
    fn ensure_key_column(
        &mut self,
        table: &str,
        column: &str,
        references: &str,
        nullable: bool,
    ) -> SchemaResult<()> {
        let kind = self.key_kind(references);
        let Some(owner) = self.tables.get_mut(table) else {
            return Err(SchemaError::invalid_association(
                table,
                references,
                format!("owning table `{}` does not exist", table),
            ));
        };

        match owner.column_mut(column) {
            Some(existing) => {
                if existing.references.is_none() {
                    existing.references = Some(references.to_string());
                } else if existing.references.as_deref() != Some(references) {
                    return Err(SchemaError::invalid_field(
                        table,
                        column,
                        format!(
                            "already references `{}`, cannot also reference `{}`",
                            existing.references.as_deref().unwrap_or_default(),
                            references
                        ),
                    ));
                }
            }
            None => owner.columns.push(ColumnDefinition {
                name: column.to_string(),
                kind,
                nullable,
                default: None,
                unique: false,
                primary_key: false,
                references: Some(references.to_string()),
            }),
        }
        Ok(())
    }

    /// Storage kind for keys pointing at `table`: the kind of its single
    /// primary key column, else integer.
    fn key_kind(&self, table: &str) -> DataKind {
        self.tables
            .get(table)
            .and_then(|t| {
                let pk: Vec<_> = t.columns.iter().filter(|c| c.primary_key).collect();
                match pk.as_slice() {
                    [single] => Some(single.kind.clone()),
                    _ => None,
                }
            })
            .unwrap_or(DataKind::Integer)
    }
}
