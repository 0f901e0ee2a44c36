//! Database schema tool: read-only exploration of a PostgreSQL catalog.
//!
//! `explore_database_schema` answers three operations against
//! `information_schema`: `list_tables`, `search_tables` and
//! `describe_table`. Every query is fixed; model input only reaches the
//! database as bound parameters, after identifier sanitization. Sessions
//! are opened with `default_transaction_read_only` so nothing can write.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::Row;
use sqlx::postgres::{PgArguments, PgConnectOptions, PgPool, PgPoolOptions, PgRow};
use tracing::debug;
use wikiagent_core::error::ToolError;
use wikiagent_core::memory::MessageLog;
use wikiagent_core::message::Role;
use wikiagent_core::tool::{ParamKind, ToolArguments, ToolDefinition, ToolHandler, ToolParameter};

pub const TOOL_NAME: &str = "explore_database_schema";

const MODULE: &str = "database_schema";
const DEFAULT_SCHEMA: &str = "public";
const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;
const SEARCH_LIMIT: i64 = 100;
const MAX_COLUMNS: i64 = 200;
const DEFAULT_PREVIEW_CHARS: usize = 30;

type PgQuery<'q> = sqlx::query::Query<'q, sqlx::Postgres, PgArguments>;

/// A table as `schema.name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub schema: String,
    pub name: String,
}

impl TableRef {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Split `schema.table`; a bare name lands in `public`.
    fn parse(qualified: &str) -> Self {
        match qualified.split('.').collect::<Vec<_>>().as_slice() {
            [schema, table] if !schema.is_empty() && !table.is_empty() => Self::new(*schema, *table),
            _ => Self::new(DEFAULT_SCHEMA, qualified),
        }
    }
}

/// One column as reported by `information_schema.columns`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub max_length: Option<i32>,
    pub nullable: bool,
    pub default: Option<String>,
}

/// Where schema metadata comes from.
#[async_trait]
pub trait SchemaSource: Send + Sync {
    /// Shown in tool descriptions and output headers.
    fn name(&self) -> &str;

    /// Base tables, optionally in one schema, ordered by schema and name.
    async fn list_tables(&self, schema: Option<&str>, limit: i64) -> Result<Vec<TableRef>, ToolError>;

    /// Columns in ordinal order; empty when the table does not exist.
    async fn describe_table(&self, table: &TableRef) -> Result<Vec<ColumnInfo>, ToolError>;

    /// Base tables whose name contains `pattern` (already LIKE-escaped).
    async fn search_tables(&self, pattern: &str, limit: i64) -> Result<Vec<TableRef>, ToolError>;

    async fn row_count(&self, table: &TableRef) -> Result<i64, ToolError>;
}

/// [`SchemaSource`] over a lazily connected PostgreSQL pool.
pub struct PostgresSchema {
    pool: PgPool,
    timeout: Duration,
}

impl PostgresSchema {
    /// Build the pool without connecting; the first query opens a session.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn connect_lazy(database_url: &str, timeout: Duration) -> Result<Self, ToolError> {
        let options = PgConnectOptions::from_str(database_url)
            .map_err(|e| failed(format!("invalid database URL: {e}")))?
            .options([("default_transaction_read_only", "on")]);

        let pool = PgPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(timeout)
            .connect_lazy_with(options);

        Ok(Self { pool, timeout })
    }

    async fn fetch(&self, query: PgQuery<'_>) -> Result<Vec<PgRow>, ToolError> {
        tokio::time::timeout(self.timeout, query.fetch_all(&self.pool))
            .await
            .map_err(|_| ToolError::Timeout {
                tool_name: TOOL_NAME.into(),
                timeout_secs: self.timeout.as_secs(),
            })?
            .map_err(|e| failed(format!("query failed: {e}")))
    }
}

#[async_trait]
impl SchemaSource for PostgresSchema {
    fn name(&self) -> &str {
        "PostgreSQL"
    }

    async fn list_tables(&self, schema: Option<&str>, limit: i64) -> Result<Vec<TableRef>, ToolError> {
        let query = match schema {
            Some(schema) => sqlx::query(
                "SELECT table_schema::text, table_name::text \
                 FROM information_schema.tables \
                 WHERE table_type = 'BASE TABLE' AND table_schema = $1 \
                 ORDER BY table_schema, table_name \
                 LIMIT $2",
            )
            .bind(schema.to_string())
            .bind(limit),
            None => sqlx::query(
                "SELECT table_schema::text, table_name::text \
                 FROM information_schema.tables \
                 WHERE table_type = 'BASE TABLE' \
                   AND table_schema NOT IN ('pg_catalog', 'information_schema') \
                 ORDER BY table_schema, table_name \
                 LIMIT $1",
            )
            .bind(limit),
        };
        self.fetch(query).await?.iter().map(row_to_table).collect()
    }

    async fn describe_table(&self, table: &TableRef) -> Result<Vec<ColumnInfo>, ToolError> {
        let query = sqlx::query(
            "SELECT column_name::text, data_type::text, character_maximum_length::int4, \
                    is_nullable::text, column_default::text \
             FROM information_schema.columns \
             WHERE table_schema = $1 AND table_name = $2 \
             ORDER BY ordinal_position \
             LIMIT $3",
        )
        .bind(table.schema.clone())
        .bind(table.name.clone())
        .bind(MAX_COLUMNS);

        self.fetch(query)
            .await?
            .iter()
            .map(|row| {
                Ok(ColumnInfo {
                    name: row.try_get(0).map_err(decode)?,
                    data_type: row.try_get(1).map_err(decode)?,
                    max_length: row.try_get(2).map_err(decode)?,
                    nullable: row.try_get::<String, _>(3).map_err(decode)? == "YES",
                    default: row.try_get(4).map_err(decode)?,
                })
            })
            .collect()
    }

    async fn search_tables(&self, pattern: &str, limit: i64) -> Result<Vec<TableRef>, ToolError> {
        let query = sqlx::query(
            "SELECT table_schema::text, table_name::text \
             FROM information_schema.tables \
             WHERE table_type = 'BASE TABLE' \
               AND table_schema NOT IN ('pg_catalog', 'information_schema') \
               AND table_name LIKE '%' || $1 || '%' \
             ORDER BY table_name \
             LIMIT $2",
        )
        .bind(pattern.to_string())
        .bind(limit);
        self.fetch(query).await?.iter().map(row_to_table).collect()
    }

    async fn row_count(&self, table: &TableRef) -> Result<i64, ToolError> {
        // Identifiers cannot be bound; names come from the catalog and are quoted
        let sql = format!(
            "SELECT COUNT(*) FROM {}.{}",
            quote_ident(&table.schema),
            quote_ident(&table.name)
        );
        let rows = self.fetch(sqlx::query(&sql)).await?;
        match rows.first() {
            Some(row) => row.try_get(0).map_err(decode),
            None => Ok(0),
        }
    }
}

fn row_to_table(row: &PgRow) -> Result<TableRef, ToolError> {
    Ok(TableRef {
        schema: row.try_get(0).map_err(decode)?,
        name: row.try_get(1).map_err(decode)?,
    })
}

fn decode(e: sqlx::Error) -> ToolError {
    failed(format!("unexpected catalog row: {e}"))
}

fn failed(reason: String) -> ToolError {
    ToolError::ExecutionFailed {
        tool_name: TOOL_NAME.into(),
        reason,
    }
}

/// Which catalog question to answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SchemaOperation {
    ListTables,
    DescribeTable,
    SearchTables,
}

impl SchemaOperation {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "list_tables" => Some(Self::ListTables),
            "describe_table" => Some(Self::DescribeTable),
            "search_tables" => Some(Self::SearchTables),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::ListTables => "list_tables",
            Self::DescribeTable => "describe_table",
            Self::SearchTables => "search_tables",
        }
    }
}

/// Answers `explore_database_schema`.
pub struct DatabaseSchemaHandler {
    source: Arc<dyn SchemaSource>,
}

impl DatabaseSchemaHandler {
    pub fn new(source: Arc<dyn SchemaSource>) -> Self {
        Self { source }
    }

    /// A handler over PostgreSQL at `database_url`.
    pub fn postgres(database_url: &str, timeout: Duration) -> Result<Self, ToolError> {
        Ok(Self::new(Arc::new(PostgresSchema::connect_lazy(database_url, timeout)?)))
    }

    /// Row counts for each table; a failed count is `None`.
    async fn with_counts(&self, tables: Vec<TableRef>, include: bool) -> Vec<(TableRef, Option<i64>)> {
        let mut out = Vec::with_capacity(tables.len());
        for table in tables {
            let count = if include {
                match self.source.row_count(&table).await {
                    Ok(n) => Some(n),
                    Err(e) => {
                        debug!(table = %table.name, error = %e, "Row count unavailable");
                        None
                    }
                }
            } else {
                None
            };
            out.push((table, count));
        }
        out
    }
}

#[async_trait]
impl ToolHandler for DatabaseSchemaHandler {
    fn tool_definitions(&self) -> Vec<ToolDefinition> {
        vec![
            ToolDefinition::new(
                TOOL_NAME,
                format!(
                    "Explore the {} database schema. Operations: 'list_tables' (tables, optionally in one schema), \
                     'search_tables' (tables whose name contains a term; prefer this on large databases), \
                     'describe_table' (columns and types of one table). Read-only.",
                    self.source.name()
                ),
            )
            .param(
                ToolParameter::string("operation", "Operation: 'list_tables', 'describe_table' or 'search_tables'")
                    .required()
                    .one_of(["list_tables", "describe_table", "search_tables"]),
            )
            .param(ToolParameter::string(
                "table_name",
                "Exact table name (optionally 'schema.table') for describe_table, or a partial name for search_tables",
            ))
            .param(ToolParameter::string("schema_filter", "Only list tables in this schema (list_tables)"))
            .param(ToolParameter::integer("limit", "Maximum tables for list_tables (default 50, maximum 200)"))
            .param(ToolParameter::new(
                "include_row_count",
                ParamKind::Boolean,
                "Count the rows of every listed table (slow on large databases)",
            )),
        ]
    }

    async fn execute(
        &self,
        _tool_name: &str,
        arguments: &ToolArguments,
        log: &MessageLog,
    ) -> Result<String, ToolError> {
        let raw_operation = arguments
            .get_string("operation")
            .filter(|o| !o.trim().is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'operation' argument".into()))?;
        let operation = SchemaOperation::parse(&raw_operation).ok_or_else(|| {
            ToolError::InvalidArguments(format!(
                "unknown operation '{raw_operation}', expected list_tables, describe_table or search_tables"
            ))
        })?;
        let table_name = sanitize_identifier(&arguments.get_str_or("table_name", ""));
        let schema_filter = Some(sanitize_identifier(&arguments.get_str_or("schema_filter", "")))
            .filter(|s| !s.is_empty());
        let limit = arguments.get_int("limit").unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let include_rows = arguments.get_bool("include_row_count").unwrap_or(false);

        if table_name.is_empty() && operation != SchemaOperation::ListTables {
            return Err(ToolError::InvalidArguments(format!(
                "'table_name' is required for {}",
                operation.as_str()
            )));
        }

        log.append_module(MODULE, Role::System, format!("{} {table_name}", operation.as_str()));
        debug!(operation = operation.as_str(), table = %table_name, limit, "Exploring schema");

        let output = match operation {
            SchemaOperation::ListTables => {
                let tables = self.source.list_tables(schema_filter.as_deref(), limit).await?;
                let tables = self.with_counts(tables, include_rows).await;
                format_table_list(self.source.name(), &tables, include_rows, schema_filter.as_deref(), limit)
            }
            SchemaOperation::DescribeTable => {
                let table = TableRef::parse(&table_name);
                let columns = self.source.describe_table(&table).await?;
                format_columns(&table, &columns)
            }
            SchemaOperation::SearchTables => {
                let tables = self.source.search_tables(&like_escape(&table_name), SEARCH_LIMIT).await?;
                let tables = self.with_counts(tables, include_rows).await;
                format_search(&table_name, &tables, include_rows)
            }
        };
        Ok(output)
    }
}

/// Strip quote characters, statement separators and comment markers, then
/// fold to lower case the way PostgreSQL folds unquoted names.
fn sanitize_identifier(raw: &str) -> String {
    raw.replace("--", "")
        .replace("/*", "")
        .replace("*/", "")
        .chars()
        .filter(|c| !matches!(c, '\'' | '"' | ';' | '\\'))
        .collect::<String>()
        .trim()
        .to_lowercase()
}

/// Make `%` and `_` literal inside a LIKE pattern.
fn like_escape(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn row_suffix(count: Option<i64>, include: bool) -> String {
    match (include, count) {
        (false, _) => String::new(),
        (true, Some(n)) => format!(" ({n} rows)"),
        (true, None) => " (row count unavailable)".into(),
    }
}

fn format_table_list(
    provider: &str,
    tables: &[(TableRef, Option<i64>)],
    include_rows: bool,
    schema_filter: Option<&str>,
    limit: i64,
) -> String {
    if tables.is_empty() {
        return match schema_filter {
            Some(schema) => format!("No tables found in schema '{schema}'."),
            None => "No tables found in the database.".into(),
        };
    }

    let mut out = format!("Tables in the {provider} database\n");
    if let Some(schema) = schema_filter {
        out.push_str(&format!("Schema filter: {schema}\n"));
    }
    out.push_str(&format!("Showing {} of at most {limit} tables\n", tables.len()));
    if tables.len() as i64 == limit {
        out.push_str(&format!(
            "\nWarning: the limit of {limit} tables was reached. Use search_tables with a specific term, \
             narrow the list with schema_filter, or raise limit (maximum {MAX_LIMIT}).\n"
        ));
    }

    let mut by_schema: BTreeMap<&str, Vec<&(TableRef, Option<i64>)>> = BTreeMap::new();
    for entry in tables {
        by_schema.entry(entry.0.schema.as_str()).or_default().push(entry);
    }
    for (schema, entries) in by_schema {
        out.push_str(&format!("\nSchema {schema} ({} tables):\n", entries.len()));
        for (table, count) in entries {
            out.push_str(&format!("- {}{}\n", table.name, row_suffix(*count, include_rows)));
        }
    }

    out.push_str("\nNext: describe_table shows the columns of one table; search_tables finds tables by name.");
    out
}

fn format_columns(table: &TableRef, columns: &[ColumnInfo]) -> String {
    if columns.is_empty() {
        return format!(
            "Table '{}.{}' was not found. Try search_tables with '{}' to see similar tables.",
            table.schema, table.name, table.name
        );
    }

    let mut out = format!("Table {}.{} ({} columns)\n\n", table.schema, table.name, columns.len());
    out.push_str("| Column | Type | Length | Nullable | Default |\n");
    out.push_str("|--------|------|--------|----------|---------|\n");
    for column in columns {
        let length = column.max_length.map_or_else(|| "-".to_string(), |n| n.to_string());
        let nullable = if column.nullable { "YES" } else { "NO" };
        let default = column
            .default
            .as_deref()
            .map_or_else(|| "-".to_string(), |d| truncate(d, DEFAULT_PREVIEW_CHARS));
        out.push_str(&format!(
            "| {} | {} | {length} | {nullable} | {default} |\n",
            column.name, column.data_type
        ));
    }
    out.push_str(&format!(
        "\nExample: SELECT * FROM {}.{} LIMIT 5",
        table.schema, table.name
    ));
    out
}

fn format_search(term: &str, tables: &[(TableRef, Option<i64>)], include_rows: bool) -> String {
    if tables.is_empty() {
        return format!("No tables match '{term}'. Use list_tables to see every table.");
    }

    let mut out = format!("Tables matching '{term}' ({}):\n\n", tables.len());
    for (table, count) in tables {
        out.push_str(&format!(
            "- {}.{}{}\n",
            table.schema,
            table.name,
            row_suffix(*count, include_rows)
        ));
    }
    out.push_str("\nNext: describe_table shows the columns of the table you need.");
    out
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(max).collect();
        out.push_str("...");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Canned catalog that records every request.
    #[derive(Default)]
    struct FakeSchema {
        tables: Vec<TableRef>,
        columns: Vec<ColumnInfo>,
        requests: Mutex<Vec<String>>,
    }

    impl FakeSchema {
        fn with_tables(names: &[(&str, &str)]) -> Self {
            Self {
                tables: names.iter().map(|(s, n)| TableRef::new(*s, *n)).collect(),
                ..Self::default()
            }
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SchemaSource for FakeSchema {
        fn name(&self) -> &str {
            "FakeSQL"
        }

        async fn list_tables(&self, schema: Option<&str>, limit: i64) -> Result<Vec<TableRef>, ToolError> {
            self.requests.lock().unwrap().push(format!("list {schema:?} {limit}"));
            Ok(self
                .tables
                .iter()
                .filter(|t| schema.is_none_or(|s| t.schema == s))
                .take(limit as usize)
                .cloned()
                .collect())
        }

        async fn describe_table(&self, table: &TableRef) -> Result<Vec<ColumnInfo>, ToolError> {
            self.requests
                .lock()
                .unwrap()
                .push(format!("describe {}.{}", table.schema, table.name));
            Ok(self.columns.clone())
        }

        async fn search_tables(&self, pattern: &str, limit: i64) -> Result<Vec<TableRef>, ToolError> {
            self.requests.lock().unwrap().push(format!("search {pattern} {limit}"));
            Ok(self.tables.clone())
        }

        async fn row_count(&self, table: &TableRef) -> Result<i64, ToolError> {
            if table.name == "users" {
                Ok(42)
            } else {
                Err(failed("permission denied".into()))
            }
        }
    }

    fn handler(source: Arc<FakeSchema>) -> DatabaseSchemaHandler {
        DatabaseSchemaHandler::new(source)
    }

    fn args(operation: &str) -> ToolArguments {
        ToolArguments::new().with("operation", operation)
    }

    #[test]
    fn definition_requires_operation() {
        let defs = handler(Arc::new(FakeSchema::default())).tool_definitions();
        assert_eq!(defs.len(), 1);
        let schema = defs[0].json_schema();
        assert_eq!(schema["required"], serde_json::json!(["operation"]));
        assert_eq!(schema["properties"]["include_row_count"]["type"], "boolean");
        assert!(defs[0].description.contains("FakeSQL"));
    }

    #[test]
    fn identifiers_are_sanitized() {
        assert_eq!(sanitize_identifier("  Users'; DROP TABLE x;-- "), "users drop table x");
        assert_eq!(sanitize_identifier("sales./*x*/Orders"), "sales.xorders");
        assert_eq!(sanitize_identifier("\"Quoted\""), "quoted");
        assert_eq!(like_escape("order_item%"), "order\\_item\\%");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn qualified_names_split_on_one_dot() {
        assert_eq!(TableRef::parse("sales.orders"), TableRef::new("sales", "orders"));
        assert_eq!(TableRef::parse("orders"), TableRef::new("public", "orders"));
        assert_eq!(TableRef::parse("a.b.c"), TableRef::new("public", "a.b.c"));
    }

    #[tokio::test]
    async fn missing_or_unknown_operation_is_rejected() {
        let h = handler(Arc::new(FakeSchema::default()));
        let log = MessageLog::new();

        let err = h.execute(TOOL_NAME, &ToolArguments::new(), &log).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));

        let err = h.execute(TOOL_NAME, &args("drop_table"), &log).await.unwrap_err();
        assert!(err.to_string().contains("unknown operation 'drop_table'"));
        assert!(log.module(MODULE).is_empty());
    }

    #[tokio::test]
    async fn table_name_required_for_describe_and_search() {
        let source = Arc::new(FakeSchema::default());
        let h = handler(source.clone());
        let log = MessageLog::new();

        for operation in ["describe_table", "search_tables"] {
            let err = h
                .execute(TOOL_NAME, &args(operation).with("table_name", " ';-- "), &log)
                .await
                .unwrap_err();
            assert!(matches!(err, ToolError::InvalidArguments(_)));
        }
        assert!(source.requests().is_empty());
    }

    #[tokio::test]
    async fn list_limit_defaults_and_caps() {
        let source = Arc::new(FakeSchema::with_tables(&[("public", "users")]));
        let h = handler(source.clone());
        let log = MessageLog::new();

        h.execute(TOOL_NAME, &args("list_tables"), &log).await.unwrap();
        h.execute(TOOL_NAME, &args("list_tables").with("limit", "1000"), &log)
            .await
            .unwrap();
        h.execute(TOOL_NAME, &args("list_tables").with("schema_filter", "Sales"), &log)
            .await
            .unwrap();

        assert_eq!(
            source.requests(),
            vec!["list None 50", "list None 200", "list Some(\"sales\") 50"]
        );
        assert_eq!(log.module(MODULE).len(), 3);
    }

    #[tokio::test]
    async fn list_groups_by_schema_and_warns_at_limit() {
        let source = Arc::new(FakeSchema::with_tables(&[
            ("public", "users"),
            ("billing", "invoices"),
            ("public", "orders"),
        ]));
        let h = handler(source);

        let out = h
            .execute(
                TOOL_NAME,
                &args("list_tables").with("limit", 3).with("include_row_count", true),
                &MessageLog::new(),
            )
            .await
            .unwrap();

        assert!(out.starts_with("Tables in the FakeSQL database\n"));
        assert!(out.contains("Showing 3 of at most 3 tables"));
        assert!(out.contains("Warning: the limit of 3 tables was reached"));
        let billing = out.find("Schema billing (1 tables):").unwrap();
        let public = out.find("Schema public (2 tables):").unwrap();
        assert!(billing < public);
        assert!(out.contains("- users (42 rows)\n"));
        assert!(out.contains("- orders (row count unavailable)\n"));
    }

    #[tokio::test]
    async fn empty_list_mentions_the_schema() {
        let h = handler(Arc::new(FakeSchema::default()));
        let out = h
            .execute(TOOL_NAME, &args("list_tables").with("schema_filter", "audit"), &MessageLog::new())
            .await
            .unwrap();
        assert_eq!(out, "No tables found in schema 'audit'.");
    }

    #[tokio::test]
    async fn describe_renders_a_column_table() {
        let source = Arc::new(FakeSchema {
            columns: vec![
                ColumnInfo {
                    name: "id".into(),
                    data_type: "integer".into(),
                    max_length: None,
                    nullable: false,
                    default: Some("nextval('orders_id_seq'::regclass)".into()),
                },
                ColumnInfo {
                    name: "note".into(),
                    data_type: "character varying".into(),
                    max_length: Some(120),
                    nullable: true,
                    default: None,
                },
            ],
            ..FakeSchema::default()
        });
        let h = handler(source.clone());

        let out = h
            .execute(
                TOOL_NAME,
                &args("describe_table").with("table_name", "Sales.Orders"),
                &MessageLog::new(),
            )
            .await
            .unwrap();

        assert_eq!(source.requests(), vec!["describe sales.orders"]);
        assert!(out.starts_with("Table sales.orders (2 columns)"));
        assert!(out.contains("| id | integer | - | NO | nextval('orders_id_seq'::regcl... |"));
        assert!(out.contains("| note | character varying | 120 | YES | - |"));
        assert!(out.ends_with("SELECT * FROM sales.orders LIMIT 5"));
    }

    #[tokio::test]
    async fn describe_missing_table_suggests_search() {
        let h = handler(Arc::new(FakeSchema::default()));
        let out = h
            .execute(TOOL_NAME, &args("describe_table").with("table_name", "ghost"), &MessageLog::new())
            .await
            .unwrap();
        assert!(out.contains("'public.ghost' was not found"));
        assert!(out.contains("search_tables with 'ghost'"));
    }

    #[tokio::test]
    async fn search_escapes_wildcards() {
        let source = Arc::new(FakeSchema::with_tables(&[("public", "order_items")]));
        let h = handler(source.clone());

        let out = h
            .execute(TOOL_NAME, &args("search_tables").with("table_name", "Order_"), &MessageLog::new())
            .await
            .unwrap();

        assert_eq!(source.requests(), vec!["search order\\_ 100"]);
        assert!(out.starts_with("Tables matching 'order_' (1):"));
        assert!(out.contains("- public.order_items\n"));
    }

    #[tokio::test]
    async fn postgres_handler_builds_without_connecting() {
        let h = DatabaseSchemaHandler::postgres("postgres://reader@localhost:1/app", Duration::from_secs(1)).unwrap();
        assert_eq!(h.tool_definitions()[0].name, TOOL_NAME);
    }
}
