//! View materializer
//!
//! Views are pre-analyzed against the in-progress catalog so that later
//! queries can treat them exactly like base tables.

use crate::catalog::loader::PendingView;
use crate::catalog::{Column, SchemaCatalog, Table};
use crate::error::AnalyzeError;
use std::sync::Arc;

/// Parse and analyze each pending view's source SQL in order, inserting the
/// resulting [`Table`] into `catalog` so subsequent views (and the views'
/// own dependents) can resolve it.
///
/// Views with forward or cyclic dependencies on other unmaterialized views
/// fail with `UnknownTable`, since from this function's viewpoint an
/// unmaterialized view is indistinguishable from a missing table.
pub fn materialize_views(
    catalog: &mut SchemaCatalog,
    default_schema: &str,
    pending: Vec<PendingView>,
) -> Result<(), AnalyzeError> {
    for view in pending {
        let parsed = pg_query::parse(&view.source_sql)
            .map_err(|e| AnalyzeError::Parse(e.to_string()))?;
        let stmt = parsed
            .protobuf
            .stmts
            .first()
            .and_then(|s| s.stmt.clone())
            .ok_or_else(|| AnalyzeError::Parse(format!("empty view definition for {}", view.name)))?;

        let columns = crate::statement::analyze_select_node(
            &stmt,
            Arc::new(catalog.clone()),
            default_schema,
        )?;

        let mut table = Table::new();
        for col in columns {
            let name = col.name.clone().unwrap_or_default();
            table.columns.insert(name, Column::new(col.sql_type, col.nullable));
        }
        catalog.insert_table(view.schema, view.name, table);
    }
    Ok(())
}
