//! Deterministic naming of implicit columns, join tables and indexes.

/// Singularize an English table name with simple suffix rules.
pub fn singularize(name: &str) -> String {
    if let Some(stem) = name.strip_suffix("ies") {
        if !stem.is_empty() {
            return format!("{}y", stem);
        }
    }
    for suffix in ["sses", "shes", "ches", "xes"] {
        if name.ends_with(suffix) {
            return name[..name.len() - 2].to_string();
        }
    }
    if name.ends_with("ss") || name.ends_with("us") {
        return name.to_string();
    }
    match name.strip_suffix('s') {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => name.to_string(),
    }
}

/// Convert a `CamelCase` or `mixedCase` name to `snake_case`.
pub fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for ch in name.chars() {
        if ch.is_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
            prev_lower = false;
        } else if ch == '-' || ch == ' ' {
            out.push('_');
            prev_lower = false;
        } else {
            out.push(ch);
            prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        }
    }
    out
}

/// Default foreign key column for references to `table` (`Users` -> `user_id`).
pub fn foreign_key_name(table: &str) -> String {
    format!("{}_id", to_snake_case(&singularize(table)))
}

/// Default join table name for a many-to-many association.
///
/// The two table names are sorted so both sides agree: the first is
/// singularized and the second kept as is (`Users`, `Roles` -> `RoleUsers`).
pub fn join_table_name(a: &str, b: &str) -> String {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    format!("{}{}", singularize(first), second)
}

/// Default index name.
pub fn index_name(table: &str, columns: &[String], unique: bool) -> String {
    let suffix = if unique { "key" } else { "idx" };
    format!(
        "{}_{}_{}",
        to_snake_case(table),
        columns
            .iter()
            .map(|c| to_snake_case(c))
            .collect::<Vec<_>>()
            .join("_"),
        suffix
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_singularize() {
        assert_eq!(singularize("Users"), "User");
        assert_eq!(singularize("Categories"), "Category");
        assert_eq!(singularize("Addresses"), "Address");
        assert_eq!(singularize("Boxes"), "Box");
        assert_eq!(singularize("Status"), "Status");
        assert_eq!(singularize("Person"), "Person");
        assert_eq!(singularize("s"), "s");
    }

    #[test]
    fn test_to_snake_case() {
        assert_eq!(to_snake_case("BlogPost"), "blog_post");
        assert_eq!(to_snake_case("isActive"), "is_active");
        assert_eq!(to_snake_case("user_id"), "user_id");
        assert_eq!(to_snake_case("Api2Key"), "api2_key");
    }

    #[test]
    fn test_foreign_key_name() {
        assert_eq!(foreign_key_name("Users"), "user_id");
        assert_eq!(foreign_key_name("BlogPosts"), "blog_post_id");
    }

    #[test]
    fn test_join_table_name_is_symmetric() {
        assert_eq!(join_table_name("Users", "Roles"), "RoleUsers");
        assert_eq!(join_table_name("Roles", "Users"), "RoleUsers");
        assert_eq!(join_table_name("Posts", "Tags"), "PostTags");
    }

    #[test]
    fn test_index_name() {
        let cols = vec!["email".to_string(), "createdAt".to_string()];
        assert_eq!(index_name("Users", &cols, false), "users_email_created_at_idx");
        assert_eq!(index_name("Users", &cols[..1], true), "users_email_key");
    }
}
