//! Schema loader: populates a [`SchemaCatalog`]/[`EnumCatalog`] from a live
//! PostgreSQL connection.

use crate::catalog::{Column, EnumCatalog, SchemaCatalog, Table};
use crate::error::AnalyzeError;
use tokio_postgres::Client;
use tracing::debug;

const COLUMNS_QUERY: &str = "
    SELECT c.table_schema, c.table_name, c.column_name,
           CASE WHEN c.data_type = 'ARRAY'
                THEN substring(c.udt_name from 2) || '[]'
                ELSE c.udt_name
           END AS sql_type,
           c.is_nullable = 'YES' AS nullable
    FROM information_schema.columns c
    WHERE c.table_schema NOT IN ('pg_catalog', 'information_schema')
    ORDER BY c.table_schema, c.table_name, c.ordinal_position
";

const VIEWS_QUERY: &str = "
    SELECT schemaname, viewname, definition FROM pg_catalog.pg_views
    WHERE schemaname NOT IN ('pg_catalog', 'information_schema')
    UNION ALL
    SELECT schemaname, matviewname, definition FROM pg_catalog.pg_matviews
    WHERE schemaname NOT IN ('pg_catalog', 'information_schema')
";

const ENUMS_QUERY: &str = "
    SELECT t.typname, e.enumlabel
    FROM pg_catalog.pg_type t
    JOIN pg_catalog.pg_enum e ON e.enumtypid = t.oid
    ORDER BY t.typname, e.enumsortorder
";

/// A view definition pending materialization.
pub struct PendingView {
    pub schema: String,
    pub name: String,
    pub source_sql: String,
}

/// Result of the initial schema load: base tables and enums are already in
/// the catalog; views still need to be analyzed against it.
pub struct LoadedSchema {
    pub catalog: SchemaCatalog,
    pub enums: EnumCatalog,
    pub pending_views: Vec<PendingView>,
}

/// Load base table columns, enum labels, and view/matview source SQL from
/// `client`. Does not materialize views; see `crate::view::materialize_views`.
pub async fn load_schema(client: &Client, default_schema: &str) -> Result<LoadedSchema, AnalyzeError> {
    let mut catalog = SchemaCatalog::new();
    catalog.ensure_schema(default_schema);

    let column_rows = client.query(COLUMNS_QUERY, &[]).await?;
    debug!(rows = column_rows.len(), "loaded column metadata");
    for row in &column_rows {
        let schema: String = row.get(0);
        let table_name: String = row.get(1);
        let column_name: String = row.get(2);
        let sql_type: String = row.get(3);
        let nullable: bool = row.get(4);

        if catalog.get_table(&schema, &table_name).is_none() {
            catalog.insert_table(schema.clone(), table_name.clone(), Table::new());
        }
        // Re-fetch through insert since Table is held behind Arc in the catalog;
        // rebuild the table with the new column appended, then reinsert.
        let mut table = (*catalog.get_table(&schema, &table_name).unwrap()).clone();
        table.columns.insert(column_name, Column::new(sql_type, nullable));
        catalog.insert_table(schema, table_name, table);
    }

    let enum_rows = client.query(ENUMS_QUERY, &[]).await?;
    let mut enums = EnumCatalog::new();
    let mut current: Option<(String, Vec<String>)> = None;
    for row in &enum_rows {
        let type_name: String = row.get(0);
        let label: String = row.get(1);
        match &mut current {
            Some((name, labels)) if *name == type_name => labels.push(label),
            _ => {
                if let Some((name, labels)) = current.take() {
                    enums.insert(name, labels);
                }
                current = Some((type_name, vec![label]));
            }
        }
    }
    if let Some((name, labels)) = current {
        enums.insert(name, labels);
    }

    let view_rows = client.query(VIEWS_QUERY, &[]).await?;
    let pending_views = view_rows
        .iter()
        .map(|row| PendingView {
            schema: row.get(0),
            name: row.get(1),
            source_sql: row.get(2),
        })
        .collect();

    Ok(LoadedSchema {
        catalog,
        enums,
        pending_views,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enum_rows_group_into_ordered_labels() {
        // Pure grouping logic, independent of the DB round trip, exercised
        // the way `load_schema` folds consecutive same-typname rows.
        let rows: Vec<(&str, &str)> = vec![
            ("mpaa_rating", "G"),
            ("mpaa_rating", "PG"),
            ("mpaa_rating", "PG-13"),
        ];
        let mut enums = EnumCatalog::new();
        let mut current: Option<(String, Vec<String>)> = None;
        for (type_name, label) in rows {
            match &mut current {
                Some((name, labels)) if name == type_name => labels.push(label.to_string()),
                _ => {
                    if let Some((name, labels)) = current.take() {
                        enums.insert(name, labels);
                    }
                    current = Some((type_name.to_string(), vec![label.to_string()]));
                }
            }
        }
        if let Some((name, labels)) = current {
            enums.insert(name, labels);
        }
        assert_eq!(enums.labels("mpaa_rating").unwrap(), &["G", "PG", "PG-13"]);
    }
}
