//! Statement analyzer

use crate::catalog::{Column, SchemaCatalog, Table};
use crate::error::AnalyzeError;
use crate::expr::{self, ParsedExpression};
use crate::from_clause::analyze_from_clause;
use crate::scope::Scope;
use pg_query::protobuf::{Node, NodeEnum, SetOperation};
use std::sync::Arc;

/// Analyze a single top-level statement node, returning its named result
/// columns (empty for DML with no RETURNING).
pub fn analyze_statement(
    node: &Node,
    catalog: Arc<SchemaCatalog>,
    default_schema: &str,
) -> Result<Vec<ParsedExpression>, AnalyzeError> {
    match node
        .node
        .as_ref()
        .ok_or_else(|| AnalyzeError::Unsupported("empty statement".to_string()))?
    {
        NodeEnum::SelectStmt(_) => analyze_select_node(node, catalog, default_schema),
        NodeEnum::InsertStmt(insert) => {
            let scope = Scope::new(catalog, default_schema);
            let mut scope = scope;
            if let Some(relation) = insert.relation.as_ref() {
                bind_relation(relation, &mut scope)?;
            }
            analyze_returning(&insert.returning_list, &scope)
        }
        NodeEnum::UpdateStmt(update) => {
            let mut scope = Scope::new(catalog, default_schema);
            if let Some(relation) = update.relation.as_ref() {
                bind_relation(relation, &mut scope)?;
            }
            if !update.from_clause.is_empty() {
                scope = crate::from_clause::analyze_from_clause(&update.from_clause, &scope)?;
            }
            analyze_returning(&update.returning_list, &scope)
        }
        NodeEnum::DeleteStmt(delete) => {
            let mut scope = Scope::new(catalog, default_schema);
            if let Some(relation) = delete.relation.as_ref() {
                bind_relation(relation, &mut scope)?;
            }
            analyze_returning(&delete.returning_list, &scope)
        }
        other => Err(AnalyzeError::Unsupported(format!(
            "top-level statement kind {other:?}"
        ))),
    }
}

fn bind_relation(relation: &pg_query::protobuf::RangeVar, scope: &mut Scope) -> Result<(), AnalyzeError> {
    let schema = if relation.schemaname.is_empty() {
        scope.default_schema.clone()
    } else {
        relation.schemaname.clone()
    };
    let table = scope
        .catalog
        .get_table(&schema, &relation.relname)
        .ok_or_else(|| AnalyzeError::UnknownTable(relation.relname.clone()))?;
    let alias = relation
        .alias
        .as_ref()
        .map(|a| a.aliasname.clone())
        .unwrap_or_else(|| relation.relname.clone());
    scope.bind_shared(alias, table, false);
    Ok(())
}

fn analyze_returning(returning_list: &[Node], scope: &Scope) -> Result<Vec<ParsedExpression>, AnalyzeError> {
    if returning_list.is_empty() {
        return Ok(Vec::new());
    }
    analyze_target_list(returning_list, scope)
}

/// Analyze a `SelectStmt` node (bare or nested, e.g. inside a SubLink or a
/// RangeSubselect). Handles simple SELECT, set operations, VALUES, and `WITH`.
pub fn analyze_select_node(
    node: &Node,
    catalog: Arc<SchemaCatalog>,
    default_schema: &str,
) -> Result<Vec<ParsedExpression>, AnalyzeError> {
    let NodeEnum::SelectStmt(select) = node
        .node
        .as_ref()
        .ok_or_else(|| AnalyzeError::Unsupported("empty select".to_string()))?
    else {
        return Err(AnalyzeError::Unsupported("expected a SELECT".to_string()));
    };

    let outer = Scope::new(catalog, default_schema);
    analyze_select(select, &outer)
}

fn analyze_select(
    select: &pg_query::protobuf::SelectStmt,
    outer: &Scope,
) -> Result<Vec<ParsedExpression>, AnalyzeError> {
    let mut scope = outer.clone();
    for cte in select
        .with_clause
        .as_ref()
        .map(|w| w.ctes.as_slice())
        .unwrap_or(&[])
    {
        if let Some(NodeEnum::CommonTableExpr(cte)) = cte.node.as_ref() {
            let Some(cte_query) = cte.ctequery.as_ref() else {
                continue;
            };
            let columns = analyze_select(
                match cte_query.node.as_ref() {
                    Some(NodeEnum::SelectStmt(inner)) => inner,
                    _ => {
                        return Err(AnalyzeError::Unsupported(
                            "non-SELECT common table expression".to_string(),
                        ))
                    }
                },
                &scope,
            )?;
            let mut table = Table::new();
            for col in columns {
                let name = col.name.clone().unwrap_or_default();
                table.columns.insert(name, Column::new(col.sql_type, col.nullable));
            }
            scope.bind(cte.ctename.clone(), table, false);
        }
    }

    // A top-level WITH can sit on the same SelectStmt node as a UNION/INTERSECT/
    // EXCEPT or a VALUES list; the CTEs above must be bound before either branch
    // so `larg`/`rarg` (which carry no with_clause of their own) can see them.
    let op = SetOperation::try_from(select.op).unwrap_or(SetOperation::SetopNone);
    if !matches!(op, SetOperation::SetopNone) {
        return analyze_set_operation(select, &scope);
    }

    if !select.values_lists.is_empty() {
        return analyze_values(select);
    }

    let from_scope = if select.from_clause.is_empty() {
        scope
    } else {
        analyze_from_clause(&select.from_clause, &scope)?
    };

    analyze_target_list(&select.target_list, &from_scope)
}

/// Resolve each target-list entry to a named, typed column: star expansion,
/// explicit alias, or inferred name.
fn analyze_target_list(target_list: &[Node], scope: &Scope) -> Result<Vec<ParsedExpression>, AnalyzeError> {
    use indexmap::IndexMap;

    let mut ordered: IndexMap<String, ParsedExpression> = IndexMap::new();

    for item in target_list {
        let Some(NodeEnum::ResTarget(res_target)) = item.node.as_ref() else {
            continue;
        };
        let Some(val) = res_target.val.as_ref() else {
            continue;
        };

        if expr::is_bare_star(val) {
            for (alias, table) in scope.tables() {
                let _ = alias;
                for (name, column) in table.columns_in_scope() {
                    ordered.insert(
                        name.to_string(),
                        ParsedExpression::new(column.sql_type, column.nullable).named(name),
                    );
                }
            }
            continue;
        }

        if let Some(table_alias) = expr::qualified_star_table(val) {
            let table = scope
                .get_table(table_alias)
                .ok_or_else(|| AnalyzeError::UnknownTable(table_alias.to_string()))?;
            for (name, column) in table.columns_in_scope() {
                ordered.insert(
                    name.to_string(),
                    ParsedExpression::new(column.sql_type, column.nullable).named(name),
                );
            }
            continue;
        }

        let parsed = expr::analyze_expr(val, scope)?;
        let name = if !res_target.name.is_empty() {
            res_target.name.clone()
        } else if let Some(inferred) = expr::infer_name(val) {
            inferred
        } else {
            return Err(AnalyzeError::MissingAlias(expr::deparse_for_error(val)));
        };
        ordered.insert(name.clone(), parsed.named(name));
    }

    Ok(ordered.into_values().collect())
}

fn analyze_set_operation(
    select: &pg_query::protobuf::SelectStmt,
    outer: &Scope,
) -> Result<Vec<ParsedExpression>, AnalyzeError> {
    let left = select
        .larg
        .as_ref()
        .ok_or_else(|| AnalyzeError::Unsupported("set operation with no left side".to_string()))?;
    let right = select
        .rarg
        .as_ref()
        .ok_or_else(|| AnalyzeError::Unsupported("set operation with no right side".to_string()))?;

    let left_cols = analyze_select(left, outer)?;
    let right_cols = analyze_select(right, outer)?;

    let mut result = Vec::with_capacity(left_cols.len());
    for (i, left_col) in left_cols.into_iter().enumerate() {
        let right_col = right_cols.get(i).cloned();
        let nullable = left_col.nullable || right_col.as_ref().is_some_and(|c| c.nullable);

        let mut left_variants = if left_col.set_variants.is_empty() {
            vec![left_col.clone()]
        } else {
            left_col.set_variants.clone()
        };
        if let Some(right_col) = right_col {
            let right_variants = if right_col.set_variants.is_empty() {
                vec![right_col]
            } else {
                right_col.set_variants
            };
            left_variants.extend(right_variants);
        }

        let mut merged = ParsedExpression::new(left_col.sql_type, nullable);
        merged.name = left_col.name;
        merged.set_variants = left_variants;
        result.push(merged);
    }

    Ok(result)
}

fn analyze_values(select: &pg_query::protobuf::SelectStmt) -> Result<Vec<ParsedExpression>, AnalyzeError> {
    let scope = Scope::new(Arc::new(SchemaCatalog::new()), "public");
    let width = select.values_lists.first().map_or(0, |row| match row.node.as_ref() {
        Some(NodeEnum::List(list)) => list.items.len(),
        _ => 0,
    });

    let mut columns: Vec<Vec<ParsedExpression>> = vec![Vec::new(); width];
    for row in &select.values_lists {
        let Some(NodeEnum::List(list)) = row.node.as_ref() else {
            continue;
        };
        for (i, value) in list.items.iter().enumerate() {
            if let Some(slot) = columns.get_mut(i) {
                slot.push(expr::analyze_expr(value, &scope)?);
            }
        }
    }

    let mut result = Vec::with_capacity(width);
    for (i, branches) in columns.into_iter().enumerate() {
        let sql_type = branches
            .first()
            .map(|b| b.sql_type.clone())
            .unwrap_or_else(|| "any".to_string());
        let nullable = branches.iter().any(|b| b.nullable);
        let mut col = ParsedExpression::new(sql_type, nullable).named(format!("column{}", i + 1));
        col.branches = branches;
        result.push(col);
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::builder::CatalogBuilder;

    fn parse_and_analyze(sql: &str, catalog: SchemaCatalog) -> Result<Vec<ParsedExpression>, AnalyzeError> {
        let result = pg_query::parse(sql).expect("parse");
        let stmt = result.protobuf.stmts[0].stmt.clone().unwrap();
        analyze_statement(&stmt, Arc::new(catalog), "public")
    }

    #[test]
    fn literal_columns_preserve_order_and_names() {
        let cols = parse_and_analyze(
            "SELECT true a, false b, null c, 42 d, 4.2 e, 'hi' f",
            SchemaCatalog::new(),
        )
        .unwrap();
        let names: Vec<_> = cols.iter().map(|c| c.name.clone().unwrap()).collect();
        assert_eq!(names, vec!["a", "b", "c", "d", "e", "f"]);
        assert_eq!(cols[0].constant_value.as_deref(), Some("true"));
        assert_eq!(cols[2].sql_type, "null");
    }

    #[test]
    fn left_join_nullability_propagates_to_target_list() {
        let (catalog, _) = CatalogBuilder::new()
            .table("public", "customer", |t| t.column("first_name", "text", false))
            .table("public", "address", |t| t.column("address", "text", false))
            .build();
        let cols = parse_and_analyze(
            "SELECT c.first_name, a.address FROM customer c LEFT JOIN address a ON true",
            catalog,
        )
        .unwrap();
        assert!(!cols[0].nullable);
        assert!(cols[1].nullable);
    }

    #[test]
    fn set_operation_accumulates_variants() {
        let cols = parse_and_analyze(
            "SELECT 'a' k, 42 n UNION SELECT 'b' k, null::int4 n",
            SchemaCatalog::new(),
        )
        .unwrap();
        assert_eq!(cols[0].set_variants.len(), 2);
        assert_eq!(cols[1].set_variants.len(), 2);
        assert!(cols[1].nullable);
    }

    #[test]
    fn values_synthesizes_column_names() {
        let cols = parse_and_analyze(
            "VALUES ('foo', 1), ('bar', 2), (null::text, null::int4)",
            SchemaCatalog::new(),
        )
        .unwrap();
        assert_eq!(cols[0].name.as_deref(), Some("column1"));
        assert_eq!(cols[1].name.as_deref(), Some("column2"));
        assert!(cols[0].nullable);
        assert!(cols[1].nullable);
    }

    #[test]
    fn cte_is_queryable_from_the_from_clause() {
        let (catalog, _) = CatalogBuilder::new()
            .table("public", "orders", |t| {
                t.column("id", "int4", false).column("status", "text", true)
            })
            .build();
        let cols = parse_and_analyze(
            "WITH open_orders AS (SELECT id, status FROM orders WHERE status = 'open') \
             SELECT id, status FROM open_orders",
            catalog,
        )
        .unwrap();
        let names: Vec<_> = cols.iter().map(|c| c.name.clone().unwrap()).collect();
        assert_eq!(names, vec!["id", "status"]);
    }

    #[test]
    fn later_cte_can_reference_an_earlier_one() {
        let (catalog, _) = CatalogBuilder::new()
            .table("public", "orders", |t| t.column("id", "int4", false))
            .build();
        let cols = parse_and_analyze(
            "WITH a AS (SELECT id FROM orders), b AS (SELECT id FROM a) \
             SELECT id FROM b",
            catalog,
        )
        .unwrap();
        assert_eq!(cols[0].name.as_deref(), Some("id"));
    }

    #[test]
    fn with_clause_is_visible_to_both_sides_of_a_set_operation() {
        let (catalog, _) = CatalogBuilder::new()
            .table("public", "orders", |t| {
                t.column("id", "int4", false).column("status", "text", true)
            })
            .build();
        let cols = parse_and_analyze(
            "WITH open_orders AS (SELECT id, status FROM orders WHERE status = 'open') \
             SELECT id, status FROM open_orders \
             UNION SELECT id, status FROM open_orders",
            catalog,
        )
        .unwrap();
        let names: Vec<_> = cols.iter().map(|c| c.name.clone().unwrap()).collect();
        assert_eq!(names, vec!["id", "status"]);
    }

    #[test]
    fn star_expansion_preserves_catalog_order() {
        let (catalog, _) = CatalogBuilder::new()
            .table("public", "t", |t| {
                t.column("b", "text", false).column("a", "int4", false)
            })
            .build();
        let cols = parse_and_analyze("SELECT * FROM t", catalog).unwrap();
        let names: Vec<_> = cols.iter().map(|c| c.name.clone().unwrap()).collect();
        assert_eq!(names, vec!["b", "a"]);
    }
}
