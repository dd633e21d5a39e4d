//! Test harness for building schema catalog state
//!
//! Fluent API for constructing [`SchemaCatalog`]/[`EnumCatalog`] fixtures in
//! tests, without a live database connection.
//!
//! # Example
//!
//! ```rust,ignore
//! use pg_typegen::catalog::builder::CatalogBuilder;
//!
//! let (catalog, enums) = CatalogBuilder::new()
//!     .table("public", "orders", |t| {
//!         t.column("id", "int4", false).column("status", "text", true)
//!     })
//!     .build();
//! ```

use crate::catalog::types::{Column, EnumCatalog, SchemaCatalog, Table};

/// Builder for constructing a [`SchemaCatalog`] and [`EnumCatalog`] in tests.
pub struct CatalogBuilder {
    catalog: SchemaCatalog,
    enums: EnumCatalog,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self {
            catalog: SchemaCatalog::new(),
            enums: EnumCatalog::new(),
        }
    }

    /// Add a table to the catalog. The closure receives a [`TableBuilder`]
    /// to configure columns.
    pub fn table(mut self, schema: &str, name: &str, f: impl FnOnce(TableBuilder) -> TableBuilder) -> Self {
        let builder = f(TableBuilder::new());
        self.catalog.insert_table(schema, name, builder.build());
        self
    }

    /// Add a nullable (outer-joinable) table shorthand, for tests that want
    /// to exercise outer-join nullability flooding without writing a join.
    pub fn nullable_table(mut self, schema: &str, name: &str, f: impl FnOnce(TableBuilder) -> TableBuilder) -> Self {
        let mut table = f(TableBuilder::new()).build();
        table.nullable = true;
        self.catalog.insert_table(schema, name, table);
        self
    }

    pub fn enum_type(mut self, name: &str, labels: &[&str]) -> Self {
        self.enums
            .insert(name.to_string(), labels.iter().map(|l| l.to_string()).collect());
        self
    }

    pub fn build(self) -> (SchemaCatalog, EnumCatalog) {
        (self.catalog, self.enums)
    }
}

impl Default for CatalogBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for constructing a [`Table`] in tests.
#[derive(Default)]
pub struct TableBuilder {
    table: Table,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn column(mut self, name: &str, sql_type: &str, nullable: bool) -> Self {
        self.table.columns.insert(name.to_string(), Column::new(sql_type, nullable));
        self
    }

    pub fn build(self) -> Table {
        self.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_table_with_columns() {
        let (catalog, _) = CatalogBuilder::new()
            .table("public", "orders", |t| {
                t.column("id", "int4", false).column("status", "text", true)
            })
            .build();

        let table = catalog.get_table("public", "orders").expect("table present");
        assert_eq!(table.get_column("id").unwrap().sql_type, "int4");
        assert!(table.get_column("status").unwrap().nullable);
    }

    #[test]
    fn nullable_table_floods_every_column() {
        let (catalog, _) = CatalogBuilder::new()
            .nullable_table("public", "address", |t| t.column("postal_code", "text", false))
            .build();

        let table = catalog.get_table("public", "address").expect("table present");
        assert!(table.nullable);
        let cols: Vec<_> = table.columns_in_scope().collect();
        assert!(cols[0].1.nullable);
    }

    #[test]
    fn enum_type_is_queryable() {
        let (_, enums) = CatalogBuilder::new()
            .enum_type("mpaa_rating", &["G", "PG", "PG-13", "R", "NC-17"])
            .build();
        assert_eq!(enums.labels("mpaa_rating").unwrap().len(), 5);
    }
}
