//! FROM-clause analyzer

use crate::catalog::Table;
use crate::error::AnalyzeError;
use crate::scope::Scope;
use pg_query::protobuf::{JoinType, Node, NodeEnum};

/// Analyze every top-level `FROM` item, binding each into a fresh scope
/// cloned from `outer`.
pub fn analyze_from_clause(from_items: &[Node], outer: &Scope) -> Result<Scope, AnalyzeError> {
    let mut scope = outer.clone();
    for item in from_items {
        analyze_from_item(item, &mut scope, false)?;
    }
    Ok(scope)
}

/// Analyze a single FROM item (base table, subquery, or join) and bind its
/// resulting table(s) into `scope`. `nullable_override` is set by an
/// enclosing join when this item sits on the nullable side.
fn analyze_from_item(node: &Node, scope: &mut Scope, nullable_override: bool) -> Result<(), AnalyzeError> {
    match node
        .node
        .as_ref()
        .ok_or_else(|| AnalyzeError::Unsupported("empty FROM item".to_string()))?
    {
        NodeEnum::RangeVar(range_var) => {
            let alias = range_var
                .alias
                .as_ref()
                .map(|a| a.aliasname.clone())
                .unwrap_or_else(|| range_var.relname.clone());

            // An unqualified name may refer to a CTE already bound into this
            // scope, which takes priority over the catalog the way PostgreSQL
            // itself prefers WITH-bindings over same-named relations.
            if range_var.schemaname.is_empty() {
                if let Some(table) = scope.get_table(&range_var.relname).cloned() {
                    scope.bind_shared(alias, table, nullable_override);
                    return Ok(());
                }
            }

            let schema = if range_var.schemaname.is_empty() {
                scope.default_schema.clone()
            } else {
                range_var.schemaname.clone()
            };
            let table = scope
                .catalog
                .get_table(&schema, &range_var.relname)
                .ok_or_else(|| AnalyzeError::UnknownTable(range_var.relname.clone()))?;
            scope.bind_shared(alias, table, nullable_override);
            Ok(())
        }
        NodeEnum::RangeSubselect(sub) => {
            let subquery = sub
                .subquery
                .as_ref()
                .ok_or_else(|| AnalyzeError::Unsupported("subquery with no body".to_string()))?;
            let columns = crate::statement::analyze_select_node(
                subquery,
                scope.catalog.clone(),
                &scope.default_schema,
            )?;
            let alias = sub
                .alias
                .as_ref()
                .map(|a| a.aliasname.clone())
                .ok_or_else(|| AnalyzeError::MissingAlias("subquery in FROM".to_string()))?;

            let mut table = Table::new();
            for col in columns {
                let name = col.name.clone().unwrap_or_default();
                table
                    .columns
                    .insert(name, crate::catalog::Column::new(col.sql_type, col.nullable));
            }
            scope.bind(alias, table, nullable_override);
            Ok(())
        }
        NodeEnum::JoinExpr(join) => analyze_join(join, scope),
        other => Err(AnalyzeError::Unsupported(format!(
            "FROM item kind {other:?}"
        ))),
    }
}

fn analyze_join(join: &pg_query::protobuf::JoinExpr, scope: &mut Scope) -> Result<(), AnalyzeError> {
    let left = join
        .larg
        .as_ref()
        .ok_or_else(|| AnalyzeError::Unsupported("join with no left side".to_string()))?;
    let right = join
        .rarg
        .as_ref()
        .ok_or_else(|| AnalyzeError::Unsupported("join with no right side".to_string()))?;

    let jointype = JoinType::try_from(join.jointype).unwrap_or(JoinType::JoinInner);

    analyze_from_item(left, scope, false)?;

    if matches!(jointype, JoinType::JoinRight | JoinType::JoinFull) {
        flood_existing_tables_nullable(scope);
    }

    let right_nullable = matches!(jointype, JoinType::JoinLeft | JoinType::JoinFull);
    analyze_from_item(right, scope, right_nullable)?;

    Ok(())
}

/// Used when the join's right side is RIGHT/FULL: every table already bound
/// from the left side becomes nullable.
fn flood_existing_tables_nullable(scope: &mut Scope) {
    let aliases: Vec<String> = scope.tables().map(|(a, _)| a.to_string()).collect();
    for alias in aliases {
        if let Some(table) = scope.get_table(&alias) {
            if !table.nullable {
                let table = (**table).clone();
                scope.bind(alias, table, true);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::builder::CatalogBuilder;
    use std::sync::Arc;

    fn parse_from(sql: &str) -> Vec<Node> {
        let result = pg_query::parse(sql).expect("parse");
        let stmt = result.protobuf.stmts[0].stmt.clone().unwrap();
        let NodeEnum::SelectStmt(select) = stmt.node.unwrap() else {
            panic!("expected select");
        };
        select.from_clause
    }

    #[test]
    fn left_join_floods_right_table_nullable() {
        let (catalog, _) = CatalogBuilder::new()
            .table("public", "customer", |t| t.column("first_name", "text", false))
            .table("public", "address", |t| t.column("address", "text", false))
            .build();
        let from_items = parse_from(
            "SELECT 1 FROM customer c LEFT JOIN address a ON true",
        );
        let outer = Scope::new(Arc::new(catalog), "public");
        let scope = analyze_from_clause(&from_items, &outer).unwrap();

        assert!(!scope.get_table("c").unwrap().nullable);
        assert!(scope.get_table("a").unwrap().nullable);
    }

    #[test]
    fn right_join_floods_left_table_nullable() {
        let (catalog, _) = CatalogBuilder::new()
            .table("public", "customer", |t| t.column("first_name", "text", false))
            .table("public", "address", |t| t.column("address", "text", false))
            .build();
        let from_items = parse_from(
            "SELECT 1 FROM customer c RIGHT JOIN address a ON true",
        );
        let outer = Scope::new(Arc::new(catalog), "public");
        let scope = analyze_from_clause(&from_items, &outer).unwrap();

        assert!(scope.get_table("c").unwrap().nullable);
        assert!(!scope.get_table("a").unwrap().nullable);
    }

    #[test]
    fn unknown_table_fails() {
        let catalog = crate::catalog::SchemaCatalog::new();
        let from_items = parse_from("SELECT 1 FROM missing_table");
        let outer = Scope::new(Arc::new(catalog), "public");
        let result = analyze_from_clause(&from_items, &outer);
        assert!(matches!(result, Err(AnalyzeError::UnknownTable(_))));
    }
}
