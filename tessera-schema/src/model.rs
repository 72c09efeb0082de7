//! Declarative model definitions.
//!
//! Models are the input of schema extraction. They are usually loaded from a
//! TOML model file:
//!
//! ```toml
//! [[model]]
//! name = "Users"
//! methods = ["deactivate"]
//!
//! [[model.field]]
//! name = "username"
//! type = "string"
//! primary_key = true
//! label = "User name"
//!
//! [[model.association]]
//! kind = "belongs_to_many"
//! target = "Roles"
//! ```
//!
//! Fields mix structural attributes (type, nullability, defaults, keys) with
//! presentation hints (labels, form hints, visibility). Only the former reach
//! the canonical schema.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::error::{SchemaError, SchemaResult};
use crate::schema::{AssociationKind, DataKind, DefaultValue};

/// A set of model definitions, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelSet {
    /// Models.
    #[serde(default, rename = "model")]
    pub models: Vec<ModelDefinition>,
}

impl ModelSet {
    /// Create an empty model set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse model definitions from TOML.
    pub fn from_toml_str(content: &str) -> SchemaResult<Self> {
        let set: ModelSet = toml::from_str(content)?;
        tracing::debug!(models = set.models.len(), "Parsed model definitions");
        Ok(set)
    }

    /// Load model definitions from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> SchemaResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| SchemaError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_toml_str(&content)
    }

    /// Add a model (builder style).
    pub fn with_model(mut self, model: ModelDefinition) -> Self {
        self.models.push(model);
        self
    }

    /// Get a model by name.
    pub fn get(&self, name: &str) -> Option<&ModelDefinition> {
        self.models.iter().find(|m| m.name == name)
    }

    /// Models keyed by name, rejecting duplicates.
    pub fn by_name(&self) -> SchemaResult<IndexMap<SmolStr, &ModelDefinition>> {
        let mut map = IndexMap::with_capacity(self.models.len());
        for model in &self.models {
            if model.name.trim().is_empty() {
                return Err(SchemaError::missing_name("model", model.name.as_str()));
            }
            if map.insert(model.name.clone(), model).is_some() {
                return Err(SchemaError::duplicate("model", model.name.as_str()));
            }
        }
        Ok(map)
    }

    /// Number of models.
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Check if there are no models.
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

/// A model (maps to a table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDefinition {
    /// Model name.
    pub name: SmolStr,
    /// Table name override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<SmolStr>,
    /// Display label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Fields in declaration order.
    #[serde(default, rename = "field")]
    pub fields: Vec<FieldDefinition>,
    /// Associations to other models.
    #[serde(default, rename = "association")]
    pub associations: Vec<AssociationDeclaration>,
    /// Secondary indexes.
    #[serde(default, rename = "index")]
    pub indexes: Vec<IndexDeclaration>,
    /// Model methods exposed as endpoints.
    #[serde(default)]
    pub methods: Vec<SmolStr>,
}

impl ModelDefinition {
    /// Create an empty model.
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            table: None,
            label: None,
            fields: Vec::new(),
            associations: Vec::new(),
            indexes: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Override the table name.
    pub fn with_table(mut self, table: impl Into<SmolStr>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Set the display label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Append a field.
    pub fn field(mut self, field: FieldDefinition) -> Self {
        self.fields.push(field);
        self
    }

    /// Append an association.
    pub fn association(mut self, association: AssociationDeclaration) -> Self {
        self.associations.push(association);
        self
    }

    /// Append an index.
    pub fn index(mut self, index: IndexDeclaration) -> Self {
        self.indexes.push(index);
        self
    }

    /// Expose a method.
    pub fn method(mut self, name: impl Into<SmolStr>) -> Self {
        self.methods.push(name.into());
        self
    }

    /// The table this model maps to.
    pub fn table_name(&self) -> &str {
        self.table.as_deref().unwrap_or(self.name.as_str())
    }

    /// Get a field by name.
    pub fn get_field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// The declared type of a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldKind {
    /// Computed at read time; never persisted.
    Virtual,
    /// Persisted with the given storage kind.
    Data(DataKind),
}

impl FieldKind {
    /// Storage kind, or `None` for virtual fields.
    pub fn data_kind(&self) -> Option<&DataKind> {
        match self {
            Self::Virtual => None,
            Self::Data(kind) => Some(kind),
        }
    }
}

impl From<String> for FieldKind {
    fn from(value: String) -> Self {
        if value.eq_ignore_ascii_case("virtual") {
            Self::Virtual
        } else {
            Self::Data(DataKind::parse(&value))
        }
    }
}

impl From<FieldKind> for String {
    fn from(value: FieldKind) -> Self {
        match value {
            FieldKind::Virtual => "virtual".to_string(),
            FieldKind::Data(kind) => kind.into(),
        }
    }
}

impl From<DataKind> for FieldKind {
    fn from(kind: DataKind) -> Self {
        Self::Data(kind)
    }
}

/// A model field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Field name (becomes the column name).
    pub name: SmolStr,
    /// Declared type.
    #[serde(rename = "type")]
    pub kind: FieldKind,
    /// Whether NULL is allowed.
    #[serde(default, alias = "optional")]
    pub nullable: bool,
    /// Default value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultValue>,
    /// Unique constraint.
    #[serde(default)]
    pub unique: bool,
    /// Part of the primary key.
    #[serde(default)]
    pub primary_key: bool,
    /// Display label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Form hint (placeholder or help text).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Hidden from generated forms.
    #[serde(default)]
    pub hidden: bool,
}

impl FieldDefinition {
    /// Create a required field.
    pub fn new(name: impl Into<SmolStr>, kind: impl Into<FieldKind>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            nullable: false,
            default: None,
            unique: false,
            primary_key: false,
            label: None,
            hint: None,
            hidden: false,
        }
    }

    /// Create a virtual (computed) field.
    pub fn virtual_field(name: impl Into<SmolStr>) -> Self {
        Self::new(name, FieldKind::Virtual)
    }

    /// Allow NULL.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Set the default value.
    pub fn default_value(mut self, value: DefaultValue) -> Self {
        self.default = Some(value);
        self
    }

    /// Mark unique.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Mark as primary key.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Set the display label.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the form hint.
    pub fn hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Hide from generated forms.
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Check if the field is persisted.
    pub fn is_persisted(&self) -> bool {
        self.kind.data_kind().is_some()
    }

    /// Check if the field carries any presentation metadata.
    pub fn has_presentation(&self) -> bool {
        self.label.is_some() || self.hint.is_some() || self.hidden
    }
}

/// An association declared on a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociationDeclaration {
    /// Association kind.
    pub kind: AssociationKind,
    /// Target model name.
    pub target: SmolStr,
    /// Foreign key column override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<String>,
    /// Target-side key override for many-to-many join tables.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_key: Option<String>,
    /// Join table name override for many-to-many associations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub through: Option<String>,
    /// Make the foreign key non-null.
    #[serde(default)]
    pub required: bool,
}

impl AssociationDeclaration {
    /// Create an association with default naming.
    pub fn new(kind: AssociationKind, target: impl Into<SmolStr>) -> Self {
        Self {
            kind,
            target: target.into(),
            foreign_key: None,
            other_key: None,
            through: None,
            required: false,
        }
    }

    /// Declare a belongs-to association.
    pub fn belongs_to(target: impl Into<SmolStr>) -> Self {
        Self::new(AssociationKind::BelongsTo, target)
    }

    /// Declare a has-many association.
    pub fn has_many(target: impl Into<SmolStr>) -> Self {
        Self::new(AssociationKind::HasMany, target)
    }

    /// Declare a many-to-many association.
    pub fn belongs_to_many(target: impl Into<SmolStr>) -> Self {
        Self::new(AssociationKind::BelongsToMany, target)
    }

    /// Override the foreign key column.
    pub fn foreign_key(mut self, column: impl Into<String>) -> Self {
        self.foreign_key = Some(column.into());
        self
    }

    /// Override the target-side join key.
    pub fn other_key(mut self, column: impl Into<String>) -> Self {
        self.other_key = Some(column.into());
        self
    }

    /// Override the join table name.
    pub fn through(mut self, table: impl Into<String>) -> Self {
        self.through = Some(table.into());
        self
    }

    /// Make the foreign key required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// A secondary index declared on a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDeclaration {
    /// Index name (generated when absent).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Indexed columns.
    pub columns: Vec<String>,
    /// Unique index.
    #[serde(default)]
    pub unique: bool,
}

impl IndexDeclaration {
    /// Create an index over `columns`.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            name: None,
            columns,
            unique: false,
        }
    }

    /// Create a unique index over `columns`.
    pub fn unique(columns: Vec<String>) -> Self {
        Self {
            name: None,
            columns,
            unique: true,
        }
    }

    /// Set an explicit name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MODELS: &str = r#"
        [[model]]
        name = "Users"
        label = "People"
        methods = ["deactivate"]

        [[model.field]]
        name = "username"
        type = "string"
        primary_key = true
        label = "User name"

        [[model.field]]
        name = "isActive"
        type = "boolean"
        default = true

        [[model.field]]
        name = "displayName"
        type = "virtual"

        [[model.association]]
        kind = "belongs_to_many"
        target = "Roles"

        [[model]]
        name = "Roles"
        table = "roles"

        [[model.field]]
        name = "name"
        type = "string"
        optional = true
    "#;

    #[test]
    fn test_parse_model_file() {
        let set = ModelSet::from_toml_str(MODELS).unwrap();
        assert_eq!(set.len(), 2);

        let users = set.get("Users").unwrap();
        assert_eq!(users.fields.len(), 3);
        assert_eq!(users.methods, vec![SmolStr::new("deactivate")]);
        assert_eq!(users.label.as_deref(), Some("People"));
        assert_eq!(
            users.get_field("isActive").unwrap().default,
            Some(DefaultValue::Bool(true))
        );
        assert!(!users.get_field("displayName").unwrap().is_persisted());
        assert_eq!(
            users.associations[0].kind,
            AssociationKind::BelongsToMany
        );

        let roles = set.get("Roles").unwrap();
        assert_eq!(roles.table_name(), "roles");
        assert!(roles.get_field("name").unwrap().nullable);
    }

    #[test]
    fn test_field_kind_parsing() {
        assert_eq!(FieldKind::from("Virtual".to_string()), FieldKind::Virtual);
        assert_eq!(
            FieldKind::from("integer".to_string()),
            FieldKind::Data(DataKind::Integer)
        );
    }

    #[test]
    fn test_by_name_rejects_duplicates() {
        let set = ModelSet::new()
            .with_model(ModelDefinition::new("Users"))
            .with_model(ModelDefinition::new("Users"));

        let err = set.by_name().unwrap_err();
        assert!(matches!(err, SchemaError::Duplicate { .. }));
    }

    #[test]
    fn test_by_name_rejects_unnamed_model() {
        let set = ModelSet::new().with_model(ModelDefinition::new(" "));
        assert!(matches!(
            set.by_name().unwrap_err(),
            SchemaError::MissingName { kind: "model", .. }
        ));
    }

    #[test]
    fn test_builder_matches_parsed_form() {
        let built = ModelDefinition::new("Roles")
            .with_table("roles")
            .field(FieldDefinition::new("name", DataKind::String).nullable());

        let parsed = ModelSet::from_toml_str(MODELS).unwrap();
        assert_eq!(parsed.get("Roles").unwrap(), &built);
    }

    #[test]
    fn test_load_missing_file() {
        let err = ModelSet::load("/nonexistent/models.toml").unwrap_err();
        assert!(matches!(err, SchemaError::IoError { .. }));
    }
}
