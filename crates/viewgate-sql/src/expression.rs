//! Structural validation of caller-supplied SQL fragments.
//!
//! Column expressions, filters and orderings are parsed with the Databricks
//! dialect into an AST. Only fragments that parse completely are spliced into
//! generated SQL, and they are spliced in their canonical printed form rather
//! than as the text the caller sent.
//!
//! String literals keep their original escapes, so `'O\'Brien'` is printed
//! back exactly as written and reaches the warehouse unchanged.

use regex::Regex;
use sqlparser::ast::{
    Expr, Ident, OrderByExpr, SelectItem, visit_expressions, visit_expressions_mut,
    visit_relations,
};
use sqlparser::dialect::{DatabricksDialect, Dialect};
use sqlparser::parser::{Parser, ParserError, ParserOptions};
use sqlparser::tokenizer::Token;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::any::TypeId;
use std::fmt;
use std::ops::ControlFlow;
use std::sync::OnceLock;
use viewgate_core::UnparsedPolicy;

const AGGREGATES: &[&str] = &["COUNT", "SUM", "AVG", "MIN", "MAX"];

/// Databricks grammar with backslash escapes inside string literals.
///
/// Reports itself as [`DatabricksDialect`] so the parser keeps its
/// Databricks-specific productions.
#[derive(Debug, Default)]
struct SparkDialect(DatabricksDialect);

impl Dialect for SparkDialect {
    fn dialect(&self) -> TypeId {
        self.0.dialect()
    }

    fn is_delimited_identifier_start(&self, ch: char) -> bool {
        self.0.is_delimited_identifier_start(ch)
    }

    fn is_identifier_start(&self, ch: char) -> bool {
        self.0.is_identifier_start(ch)
    }

    fn is_identifier_part(&self, ch: char) -> bool {
        self.0.is_identifier_part(ch)
    }

    fn supports_string_literal_backslash_escape(&self) -> bool {
        true
    }

    fn supports_filter_during_aggregation(&self) -> bool {
        self.0.supports_filter_during_aggregation()
    }

    fn supports_group_by_expr(&self) -> bool {
        self.0.supports_group_by_expr()
    }

    fn supports_lambda_functions(&self) -> bool {
        self.0.supports_lambda_functions()
    }

    fn supports_select_wildcard_except(&self) -> bool {
        self.0.supports_select_wildcard_except()
    }

    fn require_interval_qualifier(&self) -> bool {
        self.0.require_interval_qualifier()
    }

    fn supports_struct_literal(&self) -> bool {
        self.0.supports_struct_literal()
    }

    fn supports_nested_comments(&self) -> bool {
        self.0.supports_nested_comments()
    }

    fn supports_group_by_with_modifier(&self) -> bool {
        self.0.supports_group_by_with_modifier()
    }
}

/// Which grammar a fragment is parsed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpressionKind {
    /// A select-list item, optionally aliased.
    Column,
    /// A boolean WHERE predicate.
    Filter,
    /// One or more comma-separated ORDER BY items.
    Ordering,
}

impl ExpressionKind {
    /// Label used in error messages.
    pub fn label(&self) -> &'static str {
        match self {
            ExpressionKind::Column => "column",
            ExpressionKind::Filter => "where_clause",
            ExpressionKind::Ordering => "order_by",
        }
    }
}

/// A column referenced by an expression.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ColumnRef {
    /// Table or alias prefix, when the reference is qualified.
    pub qualifier: Option<String>,
    pub column: String,
}

impl ColumnRef {
    pub fn bare(column: impl Into<String>) -> Self {
        Self {
            qualifier: None,
            column: column.into(),
        }
    }

    pub fn qualified(qualifier: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            qualifier: Some(qualifier.into()),
            column: column.into(),
        }
    }

    fn is_valid(&self, valid: &HashSet<String>, tables: &HashSet<String>) -> bool {
        if !valid.contains(&self.column.to_lowercase()) {
            return false;
        }
        match &self.qualifier {
            Some(qualifier) => tables.contains(&qualifier.to_lowercase()),
            None => true,
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(qualifier) => write!(f, "{}.{}", qualifier, self.column),
            None => f.write_str(&self.column),
        }
    }
}

#[derive(Debug, Clone)]
enum Ast {
    Item(SelectItem),
    Filter(Expr),
    Ordering(Vec<OrderByExpr>),
}

impl Ast {
    fn for_each_expr(&self, f: &mut dyn FnMut(&Expr)) {
        let mut visit = |expr: &Expr| {
            f(expr);
            ControlFlow::<()>::Continue(())
        };
        let _ = match self {
            Ast::Item(item) => visit_expressions(item, &mut visit),
            Ast::Filter(expr) => visit_expressions(expr, &mut visit),
            Ast::Ordering(items) => visit_expressions(items, &mut visit),
        };
    }

    fn for_each_expr_mut(&mut self, f: &mut dyn FnMut(&mut Expr)) {
        let mut visit = |expr: &mut Expr| {
            f(expr);
            ControlFlow::<()>::Continue(())
        };
        let _ = match self {
            Ast::Item(item) => visit_expressions_mut(item, &mut visit),
            Ast::Filter(expr) => visit_expressions_mut(expr, &mut visit),
            Ast::Ordering(items) => visit_expressions_mut(items, &mut visit),
        };
    }

    fn references_relation(&self) -> bool {
        let found = |_: &sqlparser::ast::ObjectName| ControlFlow::Break(());
        let flow = match self {
            Ast::Item(item) => visit_relations(item, found),
            Ast::Filter(expr) => visit_relations(expr, found),
            Ast::Ordering(items) => visit_relations(items, found),
        };
        if flow.is_break() {
            return true;
        }

        let mut subquery = false;
        self.for_each_expr(&mut |expr: &Expr| {
            if matches!(
                expr,
                Expr::Subquery(_) | Expr::Exists { .. } | Expr::InSubquery { .. }
            ) {
                subquery = true;
            }
        });
        subquery
    }

    fn references(&self) -> BTreeSet<ColumnRef> {
        let mut refs = BTreeSet::new();
        self.for_each_expr(&mut |expr: &Expr| match expr {
            Expr::Identifier(ident) => {
                refs.insert(ColumnRef::bare(ident.value.clone()));
            }
            Expr::CompoundIdentifier(parts) => {
                if let Some((column, qualifier)) = parts.split_last() {
                    let qualifier = qualifier
                        .iter()
                        .map(|p| p.value.as_str())
                        .collect::<Vec<_>>()
                        .join(".");
                    refs.insert(ColumnRef::qualified(qualifier, column.value.clone()));
                }
            }
            _ => {}
        });

        if let Ast::Item(item) = self {
            match item {
                SelectItem::UnnamedExpr(_) | SelectItem::ExprWithAlias { .. } => {}
                wildcard => {
                    let text = wildcard.to_string();
                    let qualifier = text.strip_suffix(".*").map(str::to_string);
                    refs.insert(ColumnRef {
                        qualifier,
                        column: "*".to_string(),
                    });
                }
            }
        }
        refs
    }

    fn is_aggregate(&self) -> bool {
        let mut aggregate = false;
        self.for_each_expr(&mut |expr: &Expr| {
            if let Expr::Function(function) = expr {
                let name = function.name.to_string().to_uppercase();
                if AGGREGATES.contains(&name.as_str()) {
                    aggregate = true;
                }
            }
        });
        aggregate
    }
}

impl fmt::Display for Ast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ast::Item(item) => write!(f, "{item}"),
            Ast::Filter(expr) => write!(f, "{expr}"),
            Ast::Ordering(items) => {
                let rendered: Vec<String> = items.iter().map(ToString::to_string).collect();
                f.write_str(&rendered.join(", "))
            }
        }
    }
}

/// A fragment that parsed completely.
#[derive(Debug, Clone)]
pub struct ParsedExpression {
    kind: ExpressionKind,
    ast: Ast,
    references: BTreeSet<ColumnRef>,
    aggregate: bool,
    subquery: bool,
}

impl ParsedExpression {
    fn new(kind: ExpressionKind, ast: Ast) -> Self {
        let references = ast.references();
        let aggregate = ast.is_aggregate();
        let subquery = ast.references_relation();
        Self {
            kind,
            ast,
            references,
            aggregate,
            subquery,
        }
    }

    pub fn kind(&self) -> ExpressionKind {
        self.kind
    }

    /// Canonical text, printed back from the AST.
    pub fn rendered(&self) -> String {
        self.ast.to_string()
    }

    /// Canonical text without any select-list alias.
    pub fn expression(&self) -> String {
        match &self.ast {
            Ast::Item(SelectItem::ExprWithAlias { expr, .. }) => expr.to_string(),
            other => other.to_string(),
        }
    }

    pub fn alias(&self) -> Option<&str> {
        match &self.ast {
            Ast::Item(SelectItem::ExprWithAlias { alias, .. }) => Some(alias.value.as_str()),
            _ => None,
        }
    }

    pub fn references(&self) -> &BTreeSet<ColumnRef> {
        &self.references
    }

    pub fn is_aggregate(&self) -> bool {
        self.aggregate
    }

    /// True when the fragment contains a subquery or names a relation.
    pub fn has_subquery(&self) -> bool {
        self.subquery
    }

    /// References that are not valid columns or carry an unknown qualifier.
    ///
    /// Comparison is case-insensitive.
    pub fn invalid_references(
        &self,
        valid: &BTreeSet<String>,
        allowed_tables: &BTreeSet<String>,
    ) -> Vec<&ColumnRef> {
        let valid = lowercase_set(valid);
        let tables = lowercase_set(allowed_tables);
        self.references
            .iter()
            .filter(|r| !r.is_valid(&valid, &tables))
            .collect()
    }

    pub fn is_valid_against(
        &self,
        valid: &BTreeSet<String>,
        allowed_tables: &BTreeSet<String>,
    ) -> bool {
        self.invalid_references(valid, allowed_tables).is_empty()
    }

    /// Qualify every unqualified reference to `column` with `qualifier`.
    pub fn qualify_column(&mut self, column: &str, qualifier: &str) {
        self.ast.for_each_expr_mut(&mut |expr: &mut Expr| {
            let replacement = match expr {
                Expr::Identifier(ident) if ident.value.eq_ignore_ascii_case(column) => Some(
                    Expr::CompoundIdentifier(vec![Ident::new(qualifier), ident.clone()]),
                ),
                _ => None,
            };
            if let Some(replacement) = replacement {
                *expr = replacement;
            }
        });
        self.references = self.ast.references();
    }

    /// Rewrite `table.column` qualifiers using `mapping`.
    ///
    /// Mapping keys are matched case-insensitively and must be lowercase.
    pub fn requalify(&mut self, mapping: &HashMap<String, String>) {
        self.ast.for_each_expr_mut(&mut |expr: &mut Expr| {
            if let Expr::CompoundIdentifier(parts) = expr {
                if parts.len() == 2 {
                    if let Some(alias) = mapping.get(&parts[0].value.to_lowercase()) {
                        parts[0] = Ident::new(alias.as_str());
                    }
                }
            }
        });
        self.references = self.ast.references();
    }
}

/// Result of parsing a fragment.
#[derive(Debug, Clone)]
pub enum ParseOutcome {
    Parsed(ParsedExpression),
    /// The fragment is not a single complete expression of the requested kind.
    Unparsed { input: String, reason: String },
}

impl ParseOutcome {
    pub fn is_parsed(&self) -> bool {
        matches!(self, ParseOutcome::Parsed(_))
    }

    /// Column references, or `None` when the fragment did not parse.
    pub fn references(&self) -> Option<&BTreeSet<ColumnRef>> {
        match self {
            ParseOutcome::Parsed(parsed) => Some(parsed.references()),
            ParseOutcome::Unparsed { .. } => None,
        }
    }

    /// Canonical text when parsed, the trimmed input otherwise.
    pub fn rendered(&self) -> String {
        match self {
            ParseOutcome::Parsed(parsed) => parsed.rendered(),
            ParseOutcome::Unparsed { input, .. } => input.trim().to_string(),
        }
    }
}

/// Parses and checks caller-supplied fragments.
pub struct ExpressionValidator {
    dialect: SparkDialect,
    join_key: String,
    policy: UnparsedPolicy,
}

impl Clone for ExpressionValidator {
    fn clone(&self) -> Self {
        Self {
            dialect: SparkDialect::default(),
            join_key: self.join_key.clone(),
            policy: self.policy,
        }
    }
}

impl fmt::Debug for ExpressionValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpressionValidator")
            .field("join_key", &self.join_key)
            .field("policy", &self.policy)
            .finish()
    }
}

impl ExpressionValidator {
    pub fn new(join_key: impl Into<String>, policy: UnparsedPolicy) -> Self {
        Self {
            dialect: SparkDialect::default(),
            join_key: join_key.into(),
            policy,
        }
    }

    pub fn join_key(&self) -> &str {
        &self.join_key
    }

    pub fn policy(&self) -> UnparsedPolicy {
        self.policy
    }

    /// Parse `text` as a single fragment of `kind`.
    ///
    /// The whole input must be consumed, so trailing statements after a `;`
    /// make the fragment unparsed.
    pub fn parse(&self, kind: ExpressionKind, text: &str) -> ParseOutcome {
        match self.parse_ast(kind, text) {
            Ok(ast) => ParseOutcome::Parsed(ParsedExpression::new(kind, ast)),
            Err(e) => ParseOutcome::Unparsed {
                input: text.to_string(),
                reason: e.to_string(),
            },
        }
    }

    pub fn parse_column(&self, text: &str) -> ParseOutcome {
        self.parse(ExpressionKind::Column, text)
    }

    pub fn parse_filter(&self, text: &str) -> ParseOutcome {
        self.parse(ExpressionKind::Filter, text)
    }

    pub fn parse_ordering(&self, text: &str) -> ParseOutcome {
        self.parse(ExpressionKind::Ordering, text)
    }

    fn parse_ast(&self, kind: ExpressionKind, text: &str) -> Result<Ast, ParserError> {
        let mut parser = Parser::new(&self.dialect)
            .with_options(ParserOptions::new().with_unescape(false))
            .try_with_sql(text)?;
        let ast = match kind {
            ExpressionKind::Column => Ast::Item(parser.parse_select_item()?),
            ExpressionKind::Filter => Ast::Filter(parser.parse_expr()?),
            ExpressionKind::Ordering => {
                Ast::Ordering(parser.parse_comma_separated(|p| p.parse_order_by_expr())?)
            }
        };
        parser.expect_token(&Token::EOF)?;
        Ok(ast)
    }

    /// Column references in a column expression, `None` if it does not parse.
    pub fn extract_column_references(&self, expression: &str) -> Option<BTreeSet<ColumnRef>> {
        self.parse_column(expression).references().cloned()
    }

    /// Whether every reference in `expression` is a known column.
    ///
    /// Qualified references must also name one of `allowed_tables`. An
    /// expression with no references is valid. Unparseable expressions are
    /// valid only under [`UnparsedPolicy::Permit`]; subqueries never are.
    pub fn is_valid_reference(
        &self,
        expression: &str,
        valid: &BTreeSet<String>,
        allowed_tables: &BTreeSet<String>,
    ) -> bool {
        match self.parse_column(expression) {
            ParseOutcome::Parsed(parsed) => {
                !parsed.has_subquery() && parsed.is_valid_against(valid, allowed_tables)
            }
            ParseOutcome::Unparsed { .. } => self.policy == UnparsedPolicy::Permit,
        }
    }

    /// Whether the expression calls COUNT, SUM, AVG, MIN or MAX.
    pub fn is_aggregate(&self, expression: &str) -> bool {
        match self.parse_column(expression) {
            ParseOutcome::Parsed(parsed) => parsed.is_aggregate(),
            ParseOutcome::Unparsed { .. } => aggregate_call().is_match(expression),
        }
    }

    /// Non-aggregate select expressions with any alias removed.
    pub fn extract_groupable_columns(&self, columns: &[String]) -> Vec<String> {
        columns
            .iter()
            .filter_map(|column| match self.parse_column(column) {
                ParseOutcome::Parsed(parsed) if parsed.is_aggregate() => None,
                ParseOutcome::Parsed(parsed) => Some(parsed.expression()),
                ParseOutcome::Unparsed { .. } if aggregate_call().is_match(column) => None,
                ParseOutcome::Unparsed { .. } => {
                    Some(trailing_alias().replace(column.trim(), "").to_string())
                }
            })
            .collect()
    }

    /// Qualify unqualified join-key references with `preferred_table`.
    ///
    /// Input that does not parse is returned unchanged.
    pub fn disambiguate_join_key(&self, expression: &str, preferred_table: &str) -> String {
        match self.parse_column(expression) {
            ParseOutcome::Parsed(mut parsed) => {
                parsed.qualify_column(&self.join_key, preferred_table);
                parsed.rendered()
            }
            ParseOutcome::Unparsed { input, .. } => input,
        }
    }

    /// Rewrite view-name qualifiers to their aliases.
    ///
    /// Input that does not parse is returned unchanged.
    pub fn requalify(&self, expression: &str, mapping: &HashMap<String, String>) -> String {
        match self.parse_column(expression) {
            ParseOutcome::Parsed(mut parsed) => {
                parsed.requalify(mapping);
                parsed.rendered()
            }
            ParseOutcome::Unparsed { input, .. } => input,
        }
    }
}

fn lowercase_set(names: &BTreeSet<String>) -> HashSet<String> {
    names.iter().map(|n| n.to_lowercase()).collect()
}

fn aggregate_call() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*(COUNT|SUM|AVG|MIN|MAX)\s*\(").expect("aggregate pattern is valid")
    })
}

fn trailing_alias() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\s+AS\s+\w+\s*$").expect("alias pattern is valid"))
}
