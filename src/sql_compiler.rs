//! SQL compiler that converts a query AST into a per-site `UNION ALL` query using sea-query.
//!
//! Every site rule becomes one branch reading that site's table, filtered by the
//! rule's group and tagged with the site id. Branches are unioned, newest first,
//! and capped at the configured result limit.

use crate::ast::{Combinator, NodeType, Operator, QueryNode};
use crate::config::{AppConfig, DEFAULT_RESULT_LIMIT};
use crate::error::BuilderError;
use crate::loader;
use crate::schema::Schema;
use crate::serializer::serialize;
use crate::tree::QueryTree;
use indexmap::IndexMap;
use sea_query::extension::postgres::PgBinOper;
use sea_query::{Expr, Iden, LikeExpr, Order, PostgresQueryBuilder, SelectStatement, SimpleExpr, UnionType};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Configuration for SQL generation
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    /// Maps site ids to table names; unmapped sites use their id
    pub table_mapping: IndexMap<String, String>,
    /// Maximum number of rows returned
    pub result_limit: u64,
    /// Column used to order results, newest first
    pub sort_column: String,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            table_mapping: IndexMap::new(),
            result_limit: DEFAULT_RESULT_LIMIT,
            sort_column: "_id".to_string(),
        }
    }
}

impl From<&AppConfig> for CompilerConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            table_mapping: config.tables.clone(),
            result_limit: config.result_limit,
            ..Default::default()
        }
    }
}

/// Table identifier for sea-query
#[derive(Debug, Clone)]
pub struct TableName(pub String);

impl Iden for TableName {
    fn unquoted(&self, s: &mut dyn fmt::Write) {
        write!(s, "{}", self.0).unwrap();
    }
}

/// Column identifier wrapper
#[derive(Debug, Clone)]
pub struct ColumnName(pub String);

impl Iden for ColumnName {
    fn unquoted(&self, s: &mut dyn fmt::Write) {
        write!(s, "{}", self.0).unwrap();
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompileError {
    pub message: String,
}

impl CompileError {
    fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "compile error: {}", self.message)
    }
}

impl std::error::Error for CompileError {}

impl From<BuilderError> for CompileError {
    fn from(err: BuilderError) -> Self {
        Self::new(err.to_string())
    }
}

/// Result of SQL compilation
#[derive(Debug)]
pub struct CompileResult {
    pub sql: String,
    /// Sites read by the query, in branch order
    pub sites: Vec<String>,
}

/// SQL Compiler that converts query ASTs to SQL queries
pub struct SqlCompiler {
    schema: Arc<Schema>,
    config: CompilerConfig,
}

impl SqlCompiler {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self::from_config(schema, CompilerConfig::default())
    }

    pub fn from_config(schema: Arc<Schema>, config: CompilerConfig) -> Self {
        Self { schema, config }
    }

    /// Set table mapping for site ids
    pub fn set_table_mapping(&mut self, mapping: IndexMap<String, String>) {
        self.config.table_mapping = mapping;
    }

    /// Get the actual table name for a site
    fn table_name(&self, site: &str) -> String {
        self.config
            .table_mapping
            .get(site)
            .cloned()
            .unwrap_or_else(|| site.to_string())
    }

    /// Compile the current state of a tree
    pub fn compile_tree(&self, tree: &QueryTree) -> Result<CompileResult, CompileError> {
        self.compile(&serialize(tree))
    }

    /// Compile a query AST into SQL. The document is validated against the schema first.
    pub fn compile(&self, query: &QueryNode) -> Result<CompileResult, CompileError> {
        loader::validate(&self.schema, query)?;

        let mut sites = Vec::new();
        let mut branches = Vec::new();
        for site_rule in &query.children {
            let site = site_rule
                .value
                .clone()
                .ok_or_else(|| CompileError::new("site rule without a site"))?;
            branches.push(self.compile_site(&site, site_rule)?);
            sites.push(site);
        }

        let mut branches = branches.into_iter();
        let mut select = branches
            .next()
            .ok_or_else(|| CompileError::new("query selects no sites"))?;
        for branch in branches {
            select.union(UnionType::All, branch);
        }
        select
            .order_by(ColumnName(self.config.sort_column.clone()), Order::Desc)
            .limit(self.config.result_limit);

        let sql = select.to_string(PostgresQueryBuilder);
        debug!(sites = sites.len(), "compiled query");

        Ok(CompileResult { sql, sites })
    }

    /// One `SELECT` per site rule
    fn compile_site(&self, site: &str, site_rule: &QueryNode) -> Result<SelectStatement, CompileError> {
        let table = self.table_name(site);

        let mut select = SelectStatement::new();
        select
            .column(ColumnName(self.config.sort_column.clone()))
            .expr_as(Expr::val(site), ColumnName("site".to_string()))
            .expr_as(
                Expr::cust(format!("to_jsonb({}.*)", quote_ident(&table))),
                ColumnName("record".to_string()),
            )
            .from(TableName(table));

        // at most one group, checked by validation
        for group in &site_rule.children {
            if let Some(condition) = self.compile_group(group)? {
                select.and_where(condition);
            }
        }

        Ok(select)
    }

    /// Fold a group's children with its combinator. Empty groups add no constraint.
    fn compile_group(&self, group: &QueryNode) -> Result<Option<SimpleExpr>, CompileError> {
        let combinator = match group.condition.as_deref() {
            Some(condition) => condition.parse::<Combinator>()?,
            None => Combinator::default(),
        };

        let mut conditions = Vec::new();
        for child in &group.children {
            let condition = match child.node_type {
                NodeType::Rule => Some(self.compile_rule(child)?),
                NodeType::Group => self.compile_group(child)?,
                NodeType::Root => return Err(CompileError::new("nested root node")),
            };
            conditions.extend(condition);
        }

        Ok(self.combine_conditions(conditions, combinator))
    }

    /// A rule, ANDed with any refinement groups below it
    fn compile_rule(&self, rule: &QueryNode) -> Result<SimpleExpr, CompileError> {
        let field = rule
            .filter
            .as_deref()
            .ok_or_else(|| CompileError::new("rule without a field"))?;
        let operator = rule
            .operator
            .as_deref()
            .ok_or_else(|| CompileError::new("rule without an operator"))?
            .parse::<Operator>()?;
        let value = rule.value.as_deref().unwrap_or_default();

        let mut conditions = vec![self.compile_comparison(field, operator, value)];
        for group in &rule.children {
            conditions.extend(self.compile_group(group)?);
        }

        self.combine_conditions(conditions, Combinator::And)
            .ok_or_else(|| CompileError::new("empty rule"))
    }

    /// Combine multiple conditions with AND or OR
    fn combine_conditions(&self, conditions: Vec<SimpleExpr>, combinator: Combinator) -> Option<SimpleExpr> {
        conditions.into_iter().reduce(|acc, expr| match combinator {
            Combinator::And => acc.and(expr),
            Combinator::Or => acc.or(expr),
        })
    }

    /// Compile a comparison operation
    fn compile_comparison(&self, field: &str, operator: Operator, value: &str) -> SimpleExpr {
        let col = Expr::col(ColumnName(field.to_string()));

        match operator {
            Operator::Equals => col.eq(value),
            Operator::Contains => {
                col.like(LikeExpr::new(format!("%{}%", escape_like(value))).escape('\\'))
            }
            Operator::Regex => col.binary(PgBinOper::Regex, Expr::val(value)),
            Operator::RegexCaseInsensitive => {
                col.binary(PgBinOper::RegexCaseInsensitive, Expr::val(value))
            }
        }
    }
}

/// Escape `LIKE` wildcards so `contains` matches the literal text
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::tests::sample_schema;

    fn create_test_compiler() -> SqlCompiler {
        let mut compiler = SqlCompiler::new(Arc::new(sample_schema()));
        let mut mapping = IndexMap::new();
        mapping.insert("siteY".to_string(), "site_y_articles".to_string());
        compiler.set_table_mapping(mapping);
        compiler
    }

    fn site(source: &str, rules: Vec<QueryNode>, combinator: Combinator) -> QueryNode {
        QueryNode::site(source, Some(QueryNode::group(combinator, rules)))
    }

    #[test]
    fn test_simple_site_compilation() {
        let compiler = create_test_compiler();
        let query = QueryNode::root(vec![site(
            "siteX",
            vec![QueryNode::rule("title", Operator::Contains, "launch", vec![])],
            Combinator::And,
        )]);

        let result = compiler.compile(&query).unwrap();
        assert_eq!(result.sites, vec!["siteX".to_string()]);
        assert!(result.sql.contains(r#"FROM "siteX""#));
        assert!(result.sql.contains(r#"'siteX' AS "site""#));
        assert!(result.sql.contains(r#"to_jsonb("siteX".*) AS "record""#));
        assert!(result.sql.contains(r#""title" LIKE '%launch%'"#));
        assert!(result.sql.contains(r#"ORDER BY "_id" DESC"#));
        assert!(result.sql.contains("LIMIT 100"));
        assert!(!result.sql.contains("UNION"));
    }

    #[test]
    fn test_multiple_sites_union() {
        let compiler = create_test_compiler();
        let query = QueryNode::root(vec![
            QueryNode::site("siteX", None),
            site(
                "siteY",
                vec![QueryNode::rule("section", Operator::Equals, "uk", vec![])],
                Combinator::And,
            ),
        ]);

        let result = compiler.compile(&query).unwrap();
        assert_eq!(result.sites.len(), 2);
        assert!(result.sql.contains("UNION ALL"));
        assert!(result.sql.contains(r#"FROM "site_y_articles""#));
        assert!(result.sql.contains(r#"'siteY' AS "site""#));
        assert!(result.sql.contains(r#""section" = 'uk'"#));
    }

    #[test]
    fn test_or_group_and_regex_operators() {
        let compiler = create_test_compiler();
        let query = QueryNode::root(vec![site(
            "siteX",
            vec![
                QueryNode::rule("title", Operator::Regex, "^Brexit", vec![]),
                QueryNode::rule("author", Operator::RegexCaseInsensitive, "smith", vec![]),
            ],
            Combinator::Or,
        )]);

        let result = compiler.compile(&query).unwrap();
        assert!(result.sql.contains(r#""title" ~ '^Brexit'"#));
        assert!(result.sql.contains(r#""author" ~* 'smith'"#));
        assert!(result.sql.contains(" OR "));
    }

    #[test]
    fn test_empty_group_adds_no_condition() {
        let compiler = create_test_compiler();
        let query = QueryNode::root(vec![site("siteX", vec![], Combinator::And)]);
        let result = compiler.compile(&query).unwrap();
        assert!(!result.sql.contains("WHERE"));
    }

    #[test]
    fn test_rule_refinement_is_anded() {
        let compiler = create_test_compiler();
        let refined = QueryNode::rule(
            "title",
            Operator::Equals,
            "a",
            vec![QueryNode::group(
                Combinator::Or,
                vec![
                    QueryNode::rule("url", Operator::Contains, "bbc", vec![]),
                    QueryNode::rule("url", Operator::Contains, "cnn", vec![]),
                ],
            )],
        );
        let query = QueryNode::root(vec![site("siteX", vec![refined], Combinator::And)]);
        let result = compiler.compile(&query).unwrap();
        assert!(result.sql.contains(r#""title" = 'a' AND"#));
        assert!(result.sql.contains(r#""url" LIKE '%cnn%'"#));
    }

    #[test]
    fn test_empty_query_is_error() {
        let compiler = create_test_compiler();
        let err = compiler.compile(&QueryNode::root(vec![])).unwrap_err();
        assert!(err.message.contains("no sites"));
    }

    #[test]
    fn test_invalid_document_is_error() {
        let compiler = create_test_compiler();
        let query = QueryNode::root(vec![QueryNode::site("siteZ", None)]);
        let err = compiler.compile(&query).unwrap_err();
        assert!(err.message.contains("invalid query document"));
    }

    #[test]
    fn test_compile_tree_with_custom_limit() {
        let config = CompilerConfig {
            result_limit: 25,
            ..Default::default()
        };
        let compiler = SqlCompiler::from_config(Arc::new(sample_schema()), config);
        let mut tree = QueryTree::new(Arc::new(sample_schema()));
        tree.add_rule(tree.root()).unwrap();

        let result = compiler.compile_tree(&tree).unwrap();
        assert!(result.sql.contains("LIMIT 25"));
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}
