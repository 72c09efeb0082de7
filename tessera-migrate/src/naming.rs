//! Migration IDs.
//!
//! An ID is a sortable UTC timestamp followed by a slug, for example
//! `20240101120000-create-Users`. IDs sort in generation order: a new ID
//! always sorts after every existing one.

use chrono::{DateTime, Utc};

use crate::operation::SchemaOperation;

/// Timestamp formats, from coarsest to finest.
const RESOLUTIONS: [&str; 4] = [
    "%Y%m%d%H%M%S",
    "%Y%m%d%H%M%S%3f",
    "%Y%m%d%H%M%S%6f",
    "%Y%m%d%H%M%S%9f",
];

/// Assigns collision-free, strictly increasing migration IDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdAssigner;

impl IdAssigner {
    /// Create an assigner.
    pub fn new() -> Self {
        Self
    }

    /// Assign an ID for `operations` generated at `now`.
    ///
    /// The timestamp resolution grows from seconds to nanoseconds until the
    /// ID is unused and sorts after every existing ID. If the clock is behind
    /// the newest existing ID, that ID's timestamp is extended instead.
    pub fn assign<S: AsRef<str>>(
        &self,
        operations: &[SchemaOperation],
        name: Option<&str>,
        existing: &[S],
        now: DateTime<Utc>,
    ) -> String {
        let slug = slug_for(operations, name);
        let newest = existing.iter().map(|e| e.as_ref()).max();
        let taken = |id: &str| existing.iter().any(|e| e.as_ref() == id);

        for format in RESOLUTIONS {
            let id = format!("{}-{}", now.format(format), slug);
            if newest.is_none_or(|newest| id.as_str() > newest) && !taken(&id) {
                return id;
            }
        }

        // Every resolution sorts before the newest ID, so the clock is
        // behind it.
        let newest = newest.unwrap_or_default();
        let stamp = newest.split('-').next().unwrap_or(newest);
        tracing::warn!(
            newest,
            now = %now.format(RESOLUTIONS[0]),
            "Clock is behind the newest migration; extending its timestamp"
        );
        format!("{}1-{}", stamp, slug)
    }
}

/// Descriptive slug for a migration.
pub fn slug_for(operations: &[SchemaOperation], name: Option<&str>) -> String {
    if let Some(name) = name {
        let slug = slugify(name);
        if !slug.is_empty() {
            return slug;
        }
    }

    match operations {
        [SchemaOperation::CreateTable { table, .. }] => format!("create-{}", clean(table)),
        [SchemaOperation::DropTable { table }] => format!("drop-{}", clean(&table.name)),
        _ => "update-schema".to_string(),
    }
}

/// Lowercase `name`, keeping ASCII letters and digits and joining words
/// with single dashes.
pub fn slugify(name: &str) -> String {
    clean(name).to_lowercase()
}

fn clean(name: &str) -> String {
    name.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tessera_schema::{ColumnDefinition, DataKind, TableSchema};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
            + chrono::Duration::nanoseconds(123_456_789)
    }

    fn create(table: &str) -> SchemaOperation {
        SchemaOperation::CreateTable {
            table: table.into(),
            columns: vec![ColumnDefinition::new("id", DataKind::Integer)],
            indexes: vec![],
        }
    }

    const NONE: &[&str] = &[];

    #[test]
    fn test_slug_for_single_create() {
        assert_eq!(slug_for(&[create("Users")], None), "create-Users");
        assert_eq!(
            slug_for(&[create("Users"), create("Roles")], None),
            "update-schema"
        );
        let drop = SchemaOperation::DropTable {
            table: TableSchema::new("Users"),
        };
        assert_eq!(slug_for(&[drop], None), "drop-Users");
    }

    #[test]
    fn test_user_name_is_slugified() {
        assert_eq!(slug_for(&[create("Users")], Some("Add Roles!")), "add-roles");
        assert_eq!(slug_for(&[create("Users")], Some("  ")), "create-Users");
    }

    #[test]
    fn test_seconds_resolution_by_default() {
        let id = IdAssigner::new().assign(&[create("Users")], None, NONE, now());
        assert_eq!(id, "20240101120000-create-Users");
    }

    #[test]
    fn test_collision_increases_resolution() {
        let assigner = IdAssigner::new();
        let existing = vec!["20240101120000-create-Users".to_string()];

        let id = assigner.assign(&[create("Users")], None, &existing, now());
        assert_eq!(id, "20240101120000123-create-Users");
        assert!(id.as_str() > existing[0].as_str());
    }

    #[test]
    fn test_same_second_different_slug_sorts_after() {
        let existing = ["20240101120000-update-schema"];
        let id = IdAssigner::new().assign(&[create("Accounts")], None, &existing, now());
        assert_eq!(id, "20240101120000123-create-Accounts");
    }

    #[test]
    fn test_clock_behind_extends_newest() {
        let existing = ["20250101000000-create-Users"];
        let id = IdAssigner::new().assign(&[create("Roles")], None, &existing, now());
        assert_eq!(id, "202501010000001-create-Roles");
        assert!(id.as_str() > existing[0]);
    }

    #[test]
    fn test_ids_stay_monotonic() {
        let assigner = IdAssigner::new();
        let mut ids: Vec<String> = Vec::new();
        for _ in 0..5 {
            let id = assigner.assign(&[create("Users")], None, &ids, now());
            assert!(ids.iter().all(|existing| id > *existing));
            ids.push(id);
        }
    }
}
