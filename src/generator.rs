//! Public entry point: load schema, analyze queries, render types

use crate::catalog::{loader, EnumCatalog, SchemaCatalog};
use crate::config::GeneratorConfig;
use crate::error::AnalyzeError;
use crate::expr::ParamRef;
use crate::formatter::{default_column_formatter, ColumnFormatter, Formatter};
use crate::typecat::TypeCatalog;
use std::sync::Arc;
use tokio_postgres::Client;
use tracing::{info, instrument};

/// A caller-supplied pretty-printer. Receives the rendered type wrapped in a
/// sentinel assignment
/// (`type T = <body>;`) so a real formatter (a bundled Prettier-alike, an
/// `rustfmt`-style tool for a different target language, …) has something
/// syntactically complete to operate on; the result is stripped back to the
/// bare body. The default is the identity function.
pub type PrettyPrint = Box<dyn Fn(&str) -> String>;

pub fn identity_pretty_print() -> PrettyPrint {
    Box::new(|sentinel: &str| sentinel.to_string())
}

fn strip_sentinel(printed: &str) -> String {
    let trimmed = printed.trim();
    let trimmed = trimmed
        .strip_prefix("type T =")
        .map(str::trim_start)
        .unwrap_or(trimmed);
    trimmed.trim_end().trim_end_matches(';').trim().to_string()
}

/// Outcome of analyzing a single SQL source string, which may contain
/// multiple statements. `results` and `params` are parallel, one entry per
/// statement in source order.
pub struct GenerateResult {
    pub results: Vec<String>,
    /// Each statement's `$n` parameter references, in ordinal order.
    pub params: Vec<Vec<ParamRef>>,
}

pub struct Generator {
    catalog: Arc<SchemaCatalog>,
    enums: Arc<EnumCatalog>,
    type_catalog: TypeCatalog,
    config: GeneratorConfig,
    column_formatter: ColumnFormatter,
    pretty_print: PrettyPrint,
}

impl Generator {
    /// Connect to `connection_string`, load the schema, and materialize
    /// views. Fails atomically: no partial catalog is ever returned.
    #[instrument(skip(config))]
    pub async fn connect(connection_string: &str, config: GeneratorConfig) -> Result<Self, AnalyzeError> {
        let (client, connection) = tokio_postgres::connect(connection_string, tokio_postgres::NoTls)
            .await
            .map_err(AnalyzeError::Schema)?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(error = %e, "postgres connection closed with error");
            }
        });

        Self::from_client(&client, config).await
    }

    /// Build a `Generator` from an already-connected client. Useful for
    /// callers that manage their own connection pool.
    pub async fn from_client(client: &Client, config: GeneratorConfig) -> Result<Self, AnalyzeError> {
        let loaded = loader::load_schema(client, &config.default_schema).await?;
        let mut catalog = loaded.catalog;
        crate::view::materialize_views(&mut catalog, &config.default_schema, loaded.pending_views)?;

        info!(schemas = ?catalog.has_schema(&config.default_schema), "schema loaded");

        let type_catalog = TypeCatalog::new(config.fallback_type.clone(), config.type_override_map.clone());

        Ok(Self {
            catalog: Arc::new(catalog),
            enums: Arc::new(loaded.enums),
            type_catalog,
            config,
            column_formatter: default_column_formatter(),
            pretty_print: identity_pretty_print(),
        })
    }

    /// Build a `Generator` directly from pre-populated catalogs, bypassing
    /// schema load entirely. Exists so tests (and downstream integration
    /// suites, via the `test-util` feature) can exercise the full analysis
    /// pipeline without a live database, the way `CatalogBuilder` already
    /// lets unit tests construct catalog fixtures.
    #[cfg(any(test, feature = "test-util"))]
    pub fn for_testing(catalog: SchemaCatalog, enums: EnumCatalog, config: GeneratorConfig) -> Self {
        let type_catalog = TypeCatalog::new(config.fallback_type.clone(), config.type_override_map.clone());
        Self {
            catalog: Arc::new(catalog),
            enums: Arc::new(enums),
            type_catalog,
            config,
            column_formatter: default_column_formatter(),
            pretty_print: identity_pretty_print(),
        }
    }

    /// Install a custom column formatter.
    pub fn with_column_formatter(mut self, formatter: ColumnFormatter) -> Self {
        self.column_formatter = formatter;
        self
    }

    /// Install a custom pretty-printer.
    pub fn with_pretty_print(mut self, pretty_print: PrettyPrint) -> Self {
        self.pretty_print = pretty_print;
        self
    }

    /// Analyze every statement in `sql`, returning one rendered type string
    /// and one parameter list per statement, or an error for the whole batch.
    #[instrument(skip(self, sql))]
    pub fn generate(&self, sql: &str) -> Result<GenerateResult, AnalyzeError> {
        let parsed = pg_query::parse(sql).map_err(|e| AnalyzeError::Parse(e.to_string()))?;

        let mut results = Vec::with_capacity(parsed.protobuf.stmts.len());
        let mut params = Vec::with_capacity(parsed.protobuf.stmts.len());
        for raw in &parsed.protobuf.stmts {
            let Some(stmt) = raw.stmt.as_ref() else {
                continue;
            };
            let columns = crate::statement::analyze_statement(
                stmt,
                self.catalog.clone(),
                &self.config.default_schema,
            )?;

            let formatter = Formatter {
                type_catalog: &self.type_catalog,
                enums: &self.enums,
                pretty: &self.config.pretty_options,
                column_formatter: &self.column_formatter,
            };
            let body = formatter.format(&columns);
            let sentinel = format!("type T = {body};");
            results.push(strip_sentinel(&(self.pretty_print)(&sentinel)));
            params.push(crate::expr::collect_statement_params(stmt));
        }

        Ok(GenerateResult { results, params })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::builder::CatalogBuilder;

    fn test_generator() -> Generator {
        let (catalog, enums) = CatalogBuilder::new()
            .table("public", "customer", |t| t.column("first_name", "text", false))
            .nullable_table("public", "address", |t| {
                t.column("address", "text", false).column("postal_code", "text", true)
            })
            .build();

        Generator {
            catalog: Arc::new(catalog),
            enums: Arc::new(enums),
            type_catalog: TypeCatalog::default(),
            config: GeneratorConfig::default(),
            column_formatter: default_column_formatter(),
            pretty_print: identity_pretty_print(),
        }
    }

    #[test]
    fn generate_renders_literal_columns() {
        let gen = test_generator();
        let result = gen
            .generate("SELECT true a, false b, null c, 42 d, 4.2 e, 'hi' f")
            .unwrap();
        assert_eq!(result.results.len(), 1);
        assert!(result.results[0].contains("\"a\": true"));
        assert!(result.results[0].contains("\"f\": \"hi\""));
    }

    #[test]
    fn generate_handles_multiple_statements_independently() {
        let gen = test_generator();
        let result = gen.generate("SELECT 1 a; SELECT 2 b").unwrap();
        assert_eq!(result.results.len(), 2);
    }

    #[test]
    fn generate_surfaces_unknown_table_error() {
        let gen = test_generator();
        let result = gen.generate("SELECT * FROM no_such_table");
        assert!(matches!(result, Err(AnalyzeError::UnknownTable(_))));
    }

    #[test]
    fn generate_reports_parameter_ordinals_per_statement() {
        let gen = test_generator();
        let result = gen
            .generate("SELECT first_name FROM customer WHERE first_name = $1; SELECT 1")
            .unwrap();
        assert_eq!(result.params.len(), 2);
        assert_eq!(
            result.params[0].iter().map(|p| p.ordinal).collect::<Vec<_>>(),
            vec![1]
        );
        assert!(result.params[1].is_empty());
    }

    #[test]
    fn custom_pretty_print_wraps_and_unwraps_the_sentinel() {
        let mut gen = test_generator();
        gen.pretty_print = Box::new(|sentinel: &str| format!("  {sentinel}  \n"));
        let result = gen.generate("SELECT 1 a").unwrap();
        assert_eq!(result.results[0], "{\"a\": 1,}");
    }
}
