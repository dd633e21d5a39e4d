//! Type-string formatter

use crate::catalog::EnumCatalog;
use crate::config::PrettyOptions;
use crate::expr::ParsedExpression;
use crate::typecat::TypeCatalog;

/// A host-supplied closure pairing a column name with its rendered type,
/// e.g. the default `(name, ts) -> format!("\"{name}\": {ts},")`.
pub type ColumnFormatter = Box<dyn Fn(&str, &str) -> String>;

pub fn default_column_formatter() -> ColumnFormatter {
    Box::new(|name, ts_type| format!("\"{name}\": {ts_type},"))
}

pub struct Formatter<'a> {
    pub type_catalog: &'a TypeCatalog,
    pub enums: &'a EnumCatalog,
    pub pretty: &'a PrettyOptions,
    pub column_formatter: &'a ColumnFormatter,
}

impl<'a> Formatter<'a> {
    /// Render a full result-column list into one type string. If every
    /// column carries `set_variants`, the result is a union of object
    /// shapes, one per originating query.
    pub fn format(&self, columns: &[ParsedExpression]) -> String {
        let variant_count = columns
            .iter()
            .map(|c| c.set_variants.len())
            .max()
            .unwrap_or(0);

        if variant_count > 0 {
            let mut shapes = Vec::with_capacity(variant_count);
            for i in 0..variant_count {
                let variant_columns: Vec<ParsedExpression> = columns
                    .iter()
                    .map(|c| c.set_variants.get(i).cloned().unwrap_or_else(|| c.clone()))
                    .collect();
                shapes.push(self.format_object(&variant_columns));
            }
            shapes.join(self.pretty.union_separator.as_str())
        } else {
            self.format_object(columns)
        }
    }

    fn format_object(&self, columns: &[ParsedExpression]) -> String {
        let mut body = String::from("{");
        for (i, col) in columns.iter().enumerate() {
            if i > 0 {
                body.push(' ');
            }
            let name = col.name.clone().unwrap_or_default();
            let rendered = self.render_column_type(col);
            body.push_str(&(self.column_formatter)(&name, &rendered));
        }
        body.push('}');
        body
    }

    fn render_column_type(&self, col: &ParsedExpression) -> String {
        let mut parts: Vec<String> = if !col.branches.is_empty() {
            col.branches.iter().map(|b| self.render_single(b)).collect()
        } else {
            vec![self.render_single(col)]
        };

        if col.nullable && !parts.iter().any(|p| p == "null") {
            parts.push("null".to_string());
        }

        let mut seen = Vec::new();
        parts.retain(|p| {
            if seen.contains(p) {
                false
            } else {
                seen.push(p.clone());
                true
            }
        });

        parts.join(&self.pretty.union_separator)
    }

    fn render_single(&self, col: &ParsedExpression) -> String {
        if let Some(constant) = col.constant_value.as_deref() {
            return constant.to_string();
        }
        self.type_catalog.map(&col.sql_type, self.enums)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::ParsedExpression;

    fn formatter<'a>(
        type_catalog: &'a TypeCatalog,
        enums: &'a EnumCatalog,
        pretty: &'a PrettyOptions,
        fmt: &'a ColumnFormatter,
    ) -> Formatter<'a> {
        Formatter {
            type_catalog,
            enums,
            pretty,
            column_formatter: fmt,
        }
    }

    #[test]
    fn literal_columns_render_exactly() {
        let type_catalog = TypeCatalog::default();
        let enums = EnumCatalog::default();
        let pretty = PrettyOptions::default();
        let fmt = default_column_formatter();
        let f = formatter(&type_catalog, &enums, &pretty, &fmt);

        let columns = vec![
            ParsedExpression::new("bool", false).constant("true").named("a"),
            ParsedExpression::new("bool", false).constant("false").named("b"),
            ParsedExpression::new("null", true).named("c"),
            ParsedExpression::new("int4", false).constant("42").named("d"),
        ];
        let rendered = f.format(&columns);
        assert_eq!(
            rendered,
            "{\"a\": true, \"b\": false, \"c\": null, \"d\": 42,}"
        );
    }

    #[test]
    fn case_without_else_unions_branches_with_null() {
        let type_catalog = TypeCatalog::default();
        let enums = EnumCatalog::default();
        let pretty = PrettyOptions::default();
        let fmt = default_column_formatter();
        let f = formatter(&type_catalog, &enums, &pretty, &fmt);

        let mut col = ParsedExpression::new("int4", true).named("a");
        col.branches = vec![
            ParsedExpression::new("int4", false).constant("1"),
            ParsedExpression::new("int4", false).constant("2"),
        ];
        let rendered = f.render_column_type(&col);
        assert_eq!(rendered, "1 | 2 | null");
    }

    #[test]
    fn set_variants_render_as_union_of_objects() {
        let type_catalog = TypeCatalog::default();
        let enums = EnumCatalog::default();
        let pretty = PrettyOptions::default();
        let fmt = default_column_formatter();
        let f = formatter(&type_catalog, &enums, &pretty, &fmt);

        let mut k = ParsedExpression::new("text", false).named("k");
        k.set_variants = vec![
            ParsedExpression::new("text", false).constant("\"a\""),
            ParsedExpression::new("text", false).constant("\"b\""),
        ];
        let mut n = ParsedExpression::new("int4", false).named("n");
        n.set_variants = vec![
            ParsedExpression::new("int4", false).constant("42"),
            ParsedExpression::new("int4", true).named("n"),
        ];

        let rendered = f.format(&[k, n]);
        assert!(rendered.contains("\"a\""));
        assert!(rendered.contains("\"b\""));
        assert!(rendered.contains(" | "));
    }
}
