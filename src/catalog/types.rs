//! Schema catalog types
//!
//! The catalog represents the database schema state at the time the
//! [`crate::generator::Generator`] was constructed: base tables, views
//! (materialized by analyzing their source, see `crate::view`), and enum
//! type label lists. It is built once and read-only thereafter.

use indexmap::IndexMap;
use std::sync::Arc;

/// A single column's declared type and nullability.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub sql_type: String,
    pub nullable: bool,
}

impl Column {
    pub fn new(sql_type: impl Into<String>, nullable: bool) -> Self {
        Self {
            sql_type: sql_type.into(),
            nullable,
        }
    }
}

/// A table, view, or synthetic (subquery/CTE/VALUES) relation.
///
/// `columns` preserves insertion order: `SELECT *` expansion depends on
/// catalog order being observable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: IndexMap<String, Column>,
    /// `true` when the whole row may be absent (outer-join side). Forces
    /// every column nullable when the table enters a scope.
    pub nullable: bool,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_column(mut self, name: impl Into<String>, column: Column) -> Self {
        self.columns.insert(name.into(), column);
        self
    }

    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    /// Returns this table's columns as they would appear once lifted into a
    /// scope: if the table itself is nullable, every column is forced
    /// nullable too.
    pub fn columns_in_scope(&self) -> impl Iterator<Item = (&str, Column)> {
        self.columns.iter().map(|(name, col)| {
            let mut col = col.clone();
            if self.nullable {
                col.nullable = true;
            }
            (name.as_str(), col)
        })
    }
}

/// Schema name → table/view name → [`Table`].
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    schemas: IndexMap<String, IndexMap<String, Arc<Table>>>,
}

impl SchemaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_table(&mut self, schema: impl Into<String>, name: impl Into<String>, table: Table) {
        self.schemas
            .entry(schema.into())
            .or_default()
            .insert(name.into(), Arc::new(table));
    }

    pub fn get_table(&self, schema: &str, name: &str) -> Option<Arc<Table>> {
        self.schemas.get(schema)?.get(name).cloned()
    }

    pub fn has_schema(&self, schema: &str) -> bool {
        self.schemas.contains_key(schema)
    }

    pub fn ensure_schema(&mut self, schema: impl Into<String>) {
        self.schemas.entry(schema.into()).or_default();
    }
}

/// Enum type name → ordered label list.
#[derive(Debug, Clone, Default)]
pub struct EnumCatalog {
    enums: IndexMap<String, Vec<String>>,
}

impl EnumCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, type_name: String, labels: Vec<String>) {
        self.enums.insert(type_name, labels);
    }

    pub fn labels(&self, type_name: &str) -> Option<&[String]> {
        self.enums.get(type_name).map(Vec::as_slice)
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.enums.contains_key(type_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_lifts_nullability_into_scope() {
        let table = Table::new()
            .with_column("id", Column::new("int4", false))
            .with_column("name", Column::new("text", true));
        let mut nullable_table = table.clone();
        nullable_table.nullable = true;

        let cols: Vec<_> = nullable_table.columns_in_scope().collect();
        assert!(cols.iter().all(|(_, c)| c.nullable));
    }

    #[test]
    fn schema_catalog_round_trips_tables() {
        let mut catalog = SchemaCatalog::new();
        catalog.insert_table("public", "orders", Table::new().with_column("id", Column::new("int4", false)));
        let table = catalog.get_table("public", "orders").expect("table present");
        assert!(table.get_column("id").is_some());
        assert!(catalog.get_table("public", "missing").is_none());
    }

    #[test]
    fn column_order_is_preserved() {
        let table = Table::new()
            .with_column("b", Column::new("text", false))
            .with_column("a", Column::new("int4", false));
        let names: Vec<_> = table.columns.keys().cloned().collect();
        assert_eq!(names, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn enum_catalog_preserves_label_order() {
        let mut enums = EnumCatalog::new();
        enums.insert(
            "mpaa_rating".to_string(),
            vec!["G", "PG", "PG-13", "R", "NC-17"]
                .into_iter()
                .map(String::from)
                .collect(),
        );
        assert_eq!(
            enums.labels("mpaa_rating").unwrap(),
            &["G", "PG", "PG-13", "R", "NC-17"]
        );
    }
}
