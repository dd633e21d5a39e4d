//! SQL type name to target-language type mapping

use crate::catalog::EnumCatalog;
use std::collections::HashMap;

/// Maps a raw SQL type tag (as produced by the expression analyzer, e.g.
/// `int4`, `text[]`, `mpaa_rating`) to a target-language type string.
#[derive(Debug, Clone)]
pub struct TypeCatalog {
    fallback: String,
    overrides: HashMap<String, String>,
}

impl TypeCatalog {
    pub fn new(fallback: impl Into<String>, overrides: HashMap<String, String>) -> Self {
        Self {
            fallback: fallback.into(),
            overrides,
        }
    }

    /// Map a SQL type tag to its rendered target type, resolving arrays and
    /// enum unions against `enums`.
    pub fn map(&self, sql_type: &str, enums: &EnumCatalog) -> String {
        if let Some(mapped) = self.overrides.get(sql_type) {
            return mapped.clone();
        }

        if let Some(element) = sql_type.strip_suffix("[]") {
            return format!("array<{}>", self.map(element, enums));
        }

        if let Some(labels) = enums.labels(sql_type) {
            return labels
                .iter()
                .map(|label| format!("\"{label}\""))
                .collect::<Vec<_>>()
                .join(" | ");
        }

        match sql_type {
            "null" => "null".to_string(),
            "any" | "unknown" => "any".to_string(),
            "bool" => "boolean".to_string(),
            "text" | "varchar" | "bpchar" | "citext" | "name" | "uuid" | "xml" | "inet"
            | "cidr" | "macaddr" | "macaddr8" | "point" | "line" | "lseg" | "box" | "path"
            | "polygon" | "circle" | "tsvector" | "tsquery" => "string".to_string(),
            "bytea" => "Buffer".to_string(),
            "json" | "jsonb" => "unknown".to_string(),
            "bit" | "varbit" => "string".to_string(),
            "time" | "timetz" | "timestamp" | "timestamptz" | "date" => "Date".to_string(),
            "interval" => "Interval".to_string(),
            "int2" | "int4" | "int8" | "serial2" | "serial4" | "serial8" | "float4" | "float8"
            | "numeric" | "decimal" | "oid" | "money" => "number".to_string(),
            _ if self.is_number(sql_type) => "number".to_string(),
            _ => self.fallback.clone(),
        }
    }

    pub fn is_number(&self, sql_type: &str) -> bool {
        matches!(
            sql_type,
            "int2" | "int4" | "int8" | "serial2" | "serial4" | "serial8" | "float4" | "float8"
                | "numeric" | "decimal" | "oid" | "money"
        )
    }

    pub fn is_text(&self, sql_type: &str) -> bool {
        matches!(
            sql_type,
            "text" | "varchar" | "bpchar" | "citext" | "name"
        )
    }

    pub fn is_time(&self, sql_type: &str) -> bool {
        matches!(sql_type, "time" | "timetz")
    }

    pub fn is_timestamp(&self, sql_type: &str) -> bool {
        matches!(sql_type, "timestamp" | "timestamptz")
    }

    pub fn is_bit(&self, sql_type: &str) -> bool {
        matches!(sql_type, "bit" | "varbit")
    }

    pub fn is_json(&self, sql_type: &str) -> bool {
        matches!(sql_type, "json" | "jsonb")
    }

    pub fn is_array(&self, sql_type: &str) -> bool {
        sql_type.ends_with("[]")
    }

    pub fn element_type<'a>(&self, sql_type: &'a str) -> Option<&'a str> {
        sql_type.strip_suffix("[]")
    }
}

impl Default for TypeCatalog {
    fn default() -> Self {
        Self::new("string", HashMap::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> TypeCatalog {
        TypeCatalog::default()
    }

    #[test]
    fn maps_numeric_family() {
        let enums = EnumCatalog::default();
        assert_eq!(catalog().map("int4", &enums), "number");
        assert_eq!(catalog().map("numeric", &enums), "number");
    }

    #[test]
    fn maps_array_recursively() {
        let enums = EnumCatalog::default();
        assert_eq!(catalog().map("text[]", &enums), "array<string>");
    }

    #[test]
    fn override_wins_over_default() {
        let enums = EnumCatalog::default();
        let mut overrides = HashMap::new();
        overrides.insert("mpaa_rating".to_string(), "Rating".to_string());
        let cat = TypeCatalog::new("string", overrides);
        assert_eq!(cat.map("mpaa_rating", &enums), "Rating");
    }

    #[test]
    fn enum_renders_as_label_union() {
        let mut enums = EnumCatalog::default();
        enums.insert(
            "mpaa_rating".to_string(),
            vec!["G", "PG", "PG-13", "R", "NC-17"]
                .into_iter()
                .map(String::from)
                .collect(),
        );
        assert_eq!(
            catalog().map("mpaa_rating", &enums),
            "\"G\" | \"PG\" | \"PG-13\" | \"R\" | \"NC-17\""
        );
    }

    #[test]
    fn unknown_type_uses_fallback() {
        let enums = EnumCatalog::default();
        assert_eq!(catalog().map("box2d", &enums), "string");
    }
}
