//! Safe SELECT assembly for single-view and joined queries.
//!
//! The builder never performs I/O. Callers resolve the valid column set for
//! each view first (see [`QueryBuilder::join_plan`] for which views a joined
//! request needs) and hand it in. Every identifier in the output has either
//! come from the allow-list or been validated and re-printed by the
//! [`ExpressionValidator`].

use crate::error::{InvalidColumn, SqlError};
use crate::expression::{
    ColumnRef, ExpressionKind, ExpressionValidator, ParseOutcome, ParsedExpression,
};
use crate::filter::{check_reserved_clauses, parse_filter_assignments, unwrap_quoted};
use crate::suggest::{DEFAULT_CUTOFF, MAX_SUGGESTIONS, close_matches};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;
use viewgate_core::config::is_plain_identifier;
use viewgate_core::{UnparsedPolicy, ViewCatalog};

/// A query against one allow-listed view.
#[derive(Debug, Clone, Default)]
pub struct SingleViewRequest {
    pub table: String,
    /// Requested expressions. Empty or `["*"]` selects every valid column.
    pub columns: Vec<String>,
    pub where_clause: Option<String>,
    pub group_by: Vec<String>,
    pub order_by: Vec<String>,
    pub limit: u32,
}

/// A query over a base view inner-joined to other views on the join key.
#[derive(Debug, Clone, Default)]
pub struct JoinedViewRequest {
    pub select_columns: Vec<String>,
    pub from_table: String,
    pub join_tables: Vec<String>,
    pub where_clause: Option<String>,
    pub group_by: Vec<String>,
    pub order_by: Vec<String>,
    pub limit: u32,
}

/// Which views a joined query touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinDescriptor {
    pub from_table: String,
    /// Distinct joined views, self-joins removed.
    pub join_tables: Vec<String>,
    pub join_key: String,
}

/// The generated SQL plus what it touched, for session history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltQuery {
    pub sql: String,
    pub tables: Vec<String>,
    pub columns: Vec<String>,
    pub filters: BTreeMap<String, String>,
    pub join: Option<JoinDescriptor>,
}

/// Views of a joined query with their positional aliases, base first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinPlan {
    entries: Vec<(String, String)>,
}

impl JoinPlan {
    pub fn base(&self) -> &str {
        &self.entries[0].0
    }

    pub fn base_alias(&self) -> &str {
        &self.entries[0].1
    }

    /// All views in join order, base first.
    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(view, _)| view.as_str())
    }

    /// `(view, alias)` pairs in join order.
    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    /// Joined views, excluding the base.
    pub fn joined(&self) -> Vec<String> {
        self.entries[1..].iter().map(|(v, _)| v.clone()).collect()
    }

    /// Lowercased view name to alias.
    fn alias_mapping(&self) -> HashMap<String, String> {
        self.entries
            .iter()
            .map(|(view, alias)| (view.to_lowercase(), alias.clone()))
            .collect()
    }

    /// Names a joined query may use as qualifiers: views and aliases.
    fn qualifiers(&self) -> BTreeSet<String> {
        self.entries
            .iter()
            .flat_map(|(view, alias)| [view.clone(), alias.clone()])
            .collect()
    }
}

/// Positional alias for the `index`-th table of a join.
pub fn alias_for(index: usize) -> String {
    if index < 26 {
        char::from(b'a' + index as u8).to_string()
    } else {
        format!("t{}", index + 1)
    }
}

/// Per-view column sets of a joined query.
struct ViewColumns<'a> {
    /// Lowercased view name or alias to that view's columns.
    by_qualifier: HashMap<String, &'a BTreeSet<String>>,
    /// Lowercased non-key columns present in more than one view, with the
    /// views that carry them.
    ambiguous: HashMap<String, Vec<&'a str>>,
}

impl<'a> ViewColumns<'a> {
    fn new(plan: &'a JoinPlan, columns: &'a BTreeMap<String, BTreeSet<String>>, join_key: &str) -> Self {
        static EMPTY: BTreeSet<String> = BTreeSet::new();

        let mut by_qualifier = HashMap::new();
        let mut owners: HashMap<String, Vec<&'a str>> = HashMap::new();
        for (view, alias) in plan.entries() {
            let view_columns = columns.get(view).unwrap_or(&EMPTY);
            by_qualifier.insert(view.to_lowercase(), view_columns);
            by_qualifier.insert(alias.to_lowercase(), view_columns);
            for column in view_columns {
                owners.entry(column.to_lowercase()).or_default().push(view.as_str());
            }
        }
        owners.retain(|column, views| views.len() > 1 && !column.eq_ignore_ascii_case(join_key));

        Self {
            by_qualifier,
            ambiguous: owners,
        }
    }

    /// First reference that names a column its view lacks, or an unqualified
    /// column that several views share. Names in `exempt` are select-list
    /// aliases and never ambiguous.
    fn misplaced<'p>(
        &self,
        parsed: &'p ParsedExpression,
        exempt: &HashSet<String>,
    ) -> Option<(&'p ColumnRef, Vec<String>)> {
        parsed.references().iter().find_map(|r| {
            let column = r.column.to_lowercase();
            if column == "*" {
                return None;
            }
            match &r.qualifier {
                Some(qualifier) => {
                    let view_columns = *self.by_qualifier.get(&qualifier.to_lowercase())?;
                    if view_columns.iter().any(|c| c.eq_ignore_ascii_case(&r.column)) {
                        None
                    } else {
                        let suggestions =
                            close_matches(&r.column, view_columns, MAX_SUGGESTIONS, DEFAULT_CUTOFF);
                        Some((r, suggestions))
                    }
                }
                None if exempt.contains(&column) => None,
                None => self.ambiguous.get(&column).map(|views| {
                    let suggestions = views.iter().map(|view| format!("{view}.{}", r.column)).collect();
                    (r, suggestions)
                }),
            }
        })
    }
}

/// How validated fragments are adjusted for the FROM clause they land in.
struct Scope<'a> {
    valid: &'a BTreeSet<String>,
    qualifiers: BTreeSet<String>,
    aliases: Option<HashMap<String, String>>,
    join_key: Option<(&'a str, &'a str)>,
    views: Option<ViewColumns<'a>>,
}

impl Scope<'_> {
    /// Per-view check for joined queries; single-view scopes always pass.
    fn misplaced<'p>(
        &self,
        parsed: &'p ParsedExpression,
        exempt: &HashSet<String>,
    ) -> Option<(&'p ColumnRef, Vec<String>)> {
        self.views.as_ref()?.misplaced(parsed, exempt)
    }

    fn adjust(&self, parsed: &mut ParsedExpression) {
        if let Some(mapping) = &self.aliases {
            parsed.requalify(mapping);
        }
        if let Some((key, alias)) = self.join_key {
            parsed.qualify_column(key, alias);
        }
    }
}

/// Assembles validated SELECT statements.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    catalog: Arc<ViewCatalog>,
    validator: ExpressionValidator,
}

impl QueryBuilder {
    pub fn new(catalog: Arc<ViewCatalog>, policy: UnparsedPolicy) -> Self {
        let validator = ExpressionValidator::new(catalog.join_key(), policy);
        Self { catalog, validator }
    }

    pub fn catalog(&self) -> &ViewCatalog {
        &self.catalog
    }

    pub fn validator(&self) -> &ExpressionValidator {
        &self.validator
    }

    /// Fail unless `table` is allow-listed.
    pub fn check_table(&self, table: &str) -> Result<(), SqlError> {
        if self.catalog.is_allowed(table) {
            Ok(())
        } else {
            Err(SqlError::InvalidTable {
                table: table.to_string(),
            })
        }
    }

    /// Validate the views of a joined request and assign aliases.
    ///
    /// Self-joins and repeated join tables are dropped.
    pub fn join_plan(&self, from_table: &str, join_tables: &[String]) -> Result<JoinPlan, SqlError> {
        self.check_table(from_table)?;
        for table in join_tables {
            self.check_table(table)?;
        }

        let mut entries = vec![(from_table.to_string(), alias_for(0))];
        for table in join_tables {
            if entries.iter().any(|(view, _)| view == table) {
                continue;
            }
            entries.push((table.clone(), alias_for(entries.len())));
        }
        Ok(JoinPlan { entries })
    }

    /// Build a query against a single view given its valid columns.
    pub fn build_single(
        &self,
        request: &SingleViewRequest,
        valid: &BTreeSet<String>,
    ) -> Result<BuiltQuery, SqlError> {
        self.check_table(&request.table)?;

        let scope = Scope {
            valid,
            qualifiers: BTreeSet::from([request.table.clone()]),
            aliases: None,
            join_key: None,
            views: None,
        };

        let columns = if is_wildcard(&request.columns) {
            valid.iter().map(|c| quote_identifier(c)).collect()
        } else {
            self.validate_columns(&request.columns, &scope)?
        };

        let filter = self.validate_filter(request.where_clause.as_deref(), &scope)?;
        let tail = self.grouping_and_ordering(&columns, &request.group_by, &request.order_by, &scope)?;

        let mut sql = format!(
            "SELECT {} FROM {}",
            columns.join(", "),
            self.catalog.qualify(&request.table)
        );
        push_clauses(&mut sql, filter.as_deref(), &tail, request.limit);
        debug!(table = %request.table, sql = %sql, "Built single-view query");

        Ok(BuiltQuery {
            sql,
            tables: vec![request.table.clone()],
            columns,
            filters: parse_filter_assignments(filter.as_deref()),
            join: None,
        })
    }

    /// Build a joined query given the valid columns of every planned view.
    ///
    /// Views missing from `columns` contribute no valid columns.
    pub fn build_joined(
        &self,
        request: &JoinedViewRequest,
        columns: &BTreeMap<String, BTreeSet<String>>,
    ) -> Result<BuiltQuery, SqlError> {
        let plan = self.join_plan(&request.from_table, &request.join_tables)?;
        let join_key = self.catalog.join_key();

        let union: BTreeSet<String> = plan
            .tables()
            .filter_map(|view| columns.get(view))
            .flatten()
            .cloned()
            .collect();

        let scope = Scope {
            valid: &union,
            qualifiers: plan.qualifiers(),
            aliases: Some(plan.alias_mapping()),
            join_key: Some((join_key, plan.base_alias())),
            views: Some(ViewColumns::new(&plan, columns, join_key)),
        };

        let select = if is_wildcard(&request.select_columns) {
            joined_wildcard(&plan, columns, join_key)
        } else {
            self.validate_columns(&request.select_columns, &scope)?
        };

        let filter = self.validate_filter(request.where_clause.as_deref(), &scope)?;
        let tail = self.grouping_and_ordering(&select, &request.group_by, &request.order_by, &scope)?;

        let (base, base_alias) = &plan.entries()[0];
        let mut sql = format!(
            "SELECT {} FROM {} AS {}",
            select.join(", "),
            self.catalog.qualify(base),
            base_alias
        );
        for (view, alias) in &plan.entries()[1..] {
            sql.push_str(&format!(
                " INNER JOIN {} AS {alias} ON {base_alias}.{join_key} = {alias}.{join_key}",
                self.catalog.qualify(view)
            ));
        }
        push_clauses(&mut sql, filter.as_deref(), &tail, request.limit);
        debug!(from = %plan.base(), sql = %sql, "Built joined query");

        Ok(BuiltQuery {
            sql,
            tables: plan.tables().map(str::to_string).collect(),
            columns: select,
            filters: parse_filter_assignments(filter.as_deref()),
            join: Some(JoinDescriptor {
                from_table: plan.base().to_string(),
                join_tables: plan.joined(),
                join_key: join_key.to_string(),
            }),
        })
    }

    /// Validate select-list expressions, collecting every invalid one.
    fn validate_columns(&self, requested: &[String], scope: &Scope<'_>) -> Result<Vec<String>, SqlError> {
        self.validate_items(requested, scope, ParsedExpression::rendered)
    }

    /// Validate explicit GROUP BY items. Aliases are dropped.
    fn validate_groups(&self, requested: &[String], scope: &Scope<'_>) -> Result<Vec<String>, SqlError> {
        self.validate_items(requested, scope, ParsedExpression::expression)
    }

    fn validate_items(
        &self,
        requested: &[String],
        scope: &Scope<'_>,
        render: fn(&ParsedExpression) -> String,
    ) -> Result<Vec<String>, SqlError> {
        let mut rendered = Vec::with_capacity(requested.len());
        let mut invalid = Vec::new();

        for column in requested {
            match self.validator.parse(ExpressionKind::Column, column) {
                ParseOutcome::Parsed(mut parsed) => {
                    if parsed.has_subquery() {
                        return Err(SqlError::Subquery {
                            kind: ExpressionKind::Column.label(),
                            expression: column.clone(),
                        });
                    }
                    let bad = parsed.invalid_references(scope.valid, &scope.qualifiers);
                    if let Some(first) = bad.first() {
                        let word = first.column.clone();
                        invalid.push(self.invalid_column(column, &word, scope.valid));
                        continue;
                    }
                    if let Some((_, suggestions)) = scope.misplaced(&parsed, &HashSet::new()) {
                        invalid.push(InvalidColumn {
                            name: column.clone(),
                            suggestions,
                        });
                        continue;
                    }
                    scope.adjust(&mut parsed);
                    rendered.push(render(&parsed));
                }
                ParseOutcome::Unparsed { input, .. } => {
                    if self.validator.policy() == UnparsedPolicy::Permit {
                        rendered.push(input.trim().to_string());
                    } else {
                        invalid.push(self.invalid_column(column, column.trim(), scope.valid));
                    }
                }
            }
        }

        if invalid.is_empty() {
            Ok(rendered)
        } else {
            Err(SqlError::InvalidColumns { columns: invalid })
        }
    }

    fn invalid_column(&self, name: &str, word: &str, valid: &BTreeSet<String>) -> InvalidColumn {
        InvalidColumn {
            name: name.to_string(),
            suggestions: close_matches(word, valid, MAX_SUGGESTIONS, DEFAULT_CUTOFF),
        }
    }

    /// Check and canonicalise the WHERE clause, if any.
    fn validate_filter(
        &self,
        where_clause: Option<&str>,
        scope: &Scope<'_>,
    ) -> Result<Option<String>, SqlError> {
        let Some(raw) = where_clause.filter(|w| !w.trim().is_empty()) else {
            return Ok(None);
        };
        check_reserved_clauses(raw)?;
        let clause = unwrap_quoted(raw);

        match self.validator.parse(ExpressionKind::Filter, &clause) {
            ParseOutcome::Parsed(mut parsed) => {
                if parsed.has_subquery() {
                    return Err(SqlError::Subquery {
                        kind: ExpressionKind::Filter.label(),
                        expression: clause,
                    });
                }
                let bad: Vec<InvalidColumn> = parsed
                    .invalid_references(scope.valid, &scope.qualifiers)
                    .into_iter()
                    .map(|r| self.invalid_column(&r.to_string(), &r.column, scope.valid))
                    .collect();
                if !bad.is_empty() {
                    return Err(SqlError::InvalidColumns { columns: bad });
                }
                if let Some((r, suggestions)) = scope.misplaced(&parsed, &HashSet::new()) {
                    return Err(SqlError::InvalidColumns {
                        columns: vec![InvalidColumn {
                            name: r.to_string(),
                            suggestions,
                        }],
                    });
                }
                scope.adjust(&mut parsed);
                Ok(Some(parsed.rendered()))
            }
            ParseOutcome::Unparsed { reason, .. } => match self.validator.policy() {
                UnparsedPolicy::Permit => Ok(Some(clause)),
                UnparsedPolicy::Reject => Err(SqlError::Unparseable {
                    kind: ExpressionKind::Filter.label(),
                    expression: clause,
                    reason,
                }),
            },
        }
    }

    /// Render the GROUP BY and ORDER BY lists.
    ///
    /// GROUP BY is the explicit list followed by the non-aggregate select
    /// expressions when any select expression aggregates.
    fn grouping_and_ordering(
        &self,
        select: &[String],
        group_by: &[String],
        order_by: &[String],
        scope: &Scope<'_>,
    ) -> Result<Tail, SqlError> {
        let mut groups = self.validate_groups(group_by, scope)?;
        if select.iter().any(|c| self.validator.is_aggregate(c)) {
            for column in self.validator.extract_groupable_columns(select) {
                if !groups.contains(&column) {
                    groups.push(column);
                }
            }
        }

        // Select-list aliases are also valid ORDER BY targets.
        let mut orderable = scope.valid.clone();
        let mut select_aliases = HashSet::new();
        for column in select {
            if let ParseOutcome::Parsed(parsed) = self.validator.parse_column(column) {
                if let Some(alias) = parsed.alias() {
                    orderable.insert(alias.to_string());
                    select_aliases.insert(alias.to_lowercase());
                }
            }
        }

        let mut orders = Vec::with_capacity(order_by.len());
        let mut invalid = Vec::new();
        for item in order_by {
            match self.validator.parse(ExpressionKind::Ordering, item) {
                ParseOutcome::Parsed(mut parsed) => {
                    if parsed.has_subquery() {
                        return Err(SqlError::Subquery {
                            kind: ExpressionKind::Ordering.label(),
                            expression: item.clone(),
                        });
                    }
                    let bad = parsed.invalid_references(&orderable, &scope.qualifiers);
                    if let Some(first) = bad.first() {
                        let word = first.column.clone();
                        invalid.push(self.invalid_column(item, &word, &orderable));
                        continue;
                    }
                    if let Some((_, suggestions)) = scope.misplaced(&parsed, &select_aliases) {
                        invalid.push(InvalidColumn {
                            name: item.clone(),
                            suggestions,
                        });
                        continue;
                    }
                    scope.adjust(&mut parsed);
                    orders.push(parsed.rendered());
                }
                ParseOutcome::Unparsed { input, reason } => match self.validator.policy() {
                    UnparsedPolicy::Permit => orders.push(input.trim().to_string()),
                    UnparsedPolicy::Reject => {
                        return Err(SqlError::Unparseable {
                            kind: ExpressionKind::Ordering.label(),
                            expression: input,
                            reason,
                        });
                    }
                },
            }
        }
        if !invalid.is_empty() {
            return Err(SqlError::InvalidColumns { columns: invalid });
        }

        Ok(Tail { groups, orders })
    }
}

struct Tail {
    groups: Vec<String>,
    orders: Vec<String>,
}

fn push_clauses(sql: &mut String, filter: Option<&str>, tail: &Tail, limit: u32) {
    if let Some(filter) = filter {
        sql.push_str(" WHERE ");
        sql.push_str(filter);
    }
    if !tail.groups.is_empty() {
        sql.push_str(" GROUP BY ");
        sql.push_str(&tail.groups.join(", "));
    }
    if !tail.orders.is_empty() {
        sql.push_str(" ORDER BY ");
        sql.push_str(&tail.orders.join(", "));
    }
    sql.push_str(&format!(" LIMIT {limit}"));
}

fn is_wildcard(columns: &[String]) -> bool {
    columns.is_empty() || (columns.len() == 1 && columns[0].trim() == "*")
}

/// Every column of every planned view, alias-qualified. The join key is
/// taken from the base view only.
fn joined_wildcard(
    plan: &JoinPlan,
    columns: &BTreeMap<String, BTreeSet<String>>,
    join_key: &str,
) -> Vec<String> {
    let mut select = Vec::new();
    for (index, (view, alias)) in plan.entries().iter().enumerate() {
        let Some(view_columns) = columns.get(view) else {
            continue;
        };
        for column in view_columns {
            if index > 0 && column.eq_ignore_ascii_case(join_key) {
                continue;
            }
            select.push(format!("{alias}.{}", quote_identifier(column)));
        }
    }
    select
}

/// Backtick-quote a column name unless it is a plain identifier.
fn quote_identifier(name: &str) -> String {
    if is_plain_identifier(name) {
        name.to_string()
    } else {
        format!("`{}`", name.replace('`', "``"))
    }
}
