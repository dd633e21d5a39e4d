//! Per-analysis binding environment

use crate::catalog::{Column, SchemaCatalog, Table};
use indexmap::IndexMap;
use std::sync::Arc;

/// The set of tables visible by alias during analysis of one statement or
/// subquery, plus a handle to the read-only schema catalog for resolving
/// unqualified table references.
///
/// Cloning a `Scope` (on descent into a subquery or CTE body) is cheap:
/// `tables` holds `Arc<Table>`, so clone only bumps reference counts except
/// for tables synthesized locally (subquery/CTE/VALUES results), which have
/// no other owner to share with.
#[derive(Clone)]
pub struct Scope {
    tables: IndexMap<String, Arc<Table>>,
    pub catalog: Arc<SchemaCatalog>,
    pub default_schema: String,
}

impl Scope {
    pub fn new(catalog: Arc<SchemaCatalog>, default_schema: impl Into<String>) -> Self {
        Self {
            tables: IndexMap::new(),
            catalog,
            default_schema: default_schema.into(),
        }
    }

    /// Bind `table` under `alias`, applying the table's own nullable flag's
    /// effect on its columns is left to the caller via `nullable_override`
    /// (used by the FROM-clause analyzer for outer-join flooding).
    pub fn bind(&mut self, alias: impl Into<String>, mut table: Table, nullable_override: bool) {
        if nullable_override {
            table.nullable = true;
        }
        self.tables.insert(alias.into(), Arc::new(table));
    }

    pub fn bind_shared(&mut self, alias: impl Into<String>, table: Arc<Table>, nullable_override: bool) {
        if nullable_override && !table.nullable {
            let mut owned = (*table).clone();
            owned.nullable = true;
            self.tables.insert(alias.into(), Arc::new(owned));
        } else {
            self.tables.insert(alias.into(), table);
        }
    }

    pub fn get_table(&self, alias: &str) -> Option<&Arc<Table>> {
        self.tables.get(alias)
    }

    pub fn tables(&self) -> impl Iterator<Item = (&str, &Arc<Table>)> {
        self.tables.iter().map(|(a, t)| (a.as_str(), t))
    }

    /// Resolve a bare column name against every visible table, first match
    /// wins.
    pub fn resolve_column(&self, column: &str) -> Option<Column> {
        for (_, table) in self.tables() {
            if let Some(col) = table.get_column(column) {
                let mut col = col.clone();
                if table.nullable {
                    col.nullable = true;
                }
                return Some(col);
            }
        }
        None
    }

    /// Resolve `alias.column` against exactly the named table.
    pub fn resolve_qualified_column(&self, alias: &str, column: &str) -> Option<Column> {
        let table = self.get_table(alias)?;
        let mut col = table.get_column(column)?.clone();
        if table.nullable {
            col.nullable = true;
        }
        Some(col)
    }
}
