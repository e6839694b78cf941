//! The tool surface: names, argument types and startup registration.

use crate::tools::{ParamSpec, ParamType, ToolRegistry, ToolSpec};
use serde::Deserialize;
use serde_json::json;

pub const LIST_AVAILABLE_VIEWS: &str = "list_available_views";
pub const GET_TABLE_VIEWS_METADATA: &str = "get_table_views_metadata";
pub const QUERY_SINGLE_VIEW: &str = "query_single_view";
pub const QUERY_JOINED_VIEWS: &str = "query_joined_views";
pub const LIST_TABLE_RELATIONSHIPS: &str = "list_table_relationships";
pub const FETCH_RECENT_QUERY_CONTEXT: &str = "fetch_recent_query_context";
pub const LIST_AVAILABLE_TOOLS: &str = "list_available_tools";

/// Default for `fetch_recent_query_context.max_queries`.
pub const DEFAULT_RECENT_QUERIES: usize = 3;

/// A list of expressions given either as a JSON array or as one string.
///
/// A single string is split on top-level commas, so `"industry, make"` and
/// `["industry", "make"]` are equivalent while `"COALESCE(a, b)"` stays whole.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpressionList(pub Vec<String>);

impl ExpressionList {
    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl<'de> Deserialize<'de> for ExpressionList {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::{self, Visitor};

        struct ExpressionListVisitor;

        impl<'de> Visitor<'de> for ExpressionListVisitor {
            type Value = ExpressionList;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a string or a list of strings")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(ExpressionList(split_top_level(v)))
            }

            fn visit_unit<E>(self) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(ExpressionList::default())
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: de::SeqAccess<'de>,
            {
                let mut items = Vec::new();
                while let Some(item) = seq.next_element::<String>()? {
                    let item = item.trim();
                    if !item.is_empty() {
                        items.push(item.to_string());
                    }
                }
                Ok(ExpressionList(items))
            }
        }

        deserializer.deserialize_any(ExpressionListVisitor)
    }
}

/// Split on commas outside parentheses and quotes, dropping empty pieces.
fn split_top_level(input: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for ch in input.chars() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"' | '`') => quote = Some(ch),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                parts.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(ch);
    }
    parts.push(current);

    parts
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

fn wildcard() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_max_queries() -> usize {
    DEFAULT_RECENT_QUERIES
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GetTableViewsMetadataArgs {
    pub table_views: Vec<String>,
    #[serde(default)]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuerySingleViewArgs {
    pub table_name: String,
    #[serde(default = "wildcard")]
    pub columns: Vec<String>,
    #[serde(default)]
    pub where_clause: Option<String>,
    #[serde(default)]
    pub group_by: ExpressionList,
    #[serde(default)]
    pub order_by: ExpressionList,
    #[serde(default)]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueryJoinedViewsArgs {
    pub select_columns: Vec<String>,
    pub from_table: String,
    pub join_tables: Vec<String>,
    #[serde(default)]
    pub where_clause: Option<String>,
    #[serde(default)]
    pub group_by: ExpressionList,
    #[serde(default)]
    pub order_by: ExpressionList,
    #[serde(default)]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListTableRelationshipsArgs {
    pub source_table: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FetchRecentQueryContextArgs {
    #[serde(default = "default_max_queries")]
    pub max_queries: usize,
}

impl Default for FetchRecentQueryContextArgs {
    fn default() -> Self {
        Self {
            max_queries: DEFAULT_RECENT_QUERIES,
        }
    }
}

/// Register every tool, in the order `list_available_tools` reports them.
pub fn register_tools(registry: &mut ToolRegistry, default_limit: u32) {
    let limit = || {
        ParamSpec::optional(
            "limit",
            ParamType::Integer,
            Some(json!(default_limit)),
            "Maximum number of rows to return.",
        )
    };
    let where_clause = || {
        ParamSpec::optional(
            "where_clause",
            ParamType::String,
            None,
            "Boolean filter expression, without the WHERE keyword. GROUP BY, ORDER BY and LIMIT have their own parameters.",
        )
    };
    let group_by = || {
        ParamSpec::optional(
            "group_by",
            ParamType::StringOrArray,
            None,
            "Grouping expressions. Derived from the non-aggregate columns when omitted and an aggregate is selected.",
        )
    };
    let order_by = || {
        ParamSpec::optional(
            "order_by",
            ParamType::StringOrArray,
            None,
            "Ordering expressions, optionally followed by ASC or DESC.",
        )
    };

    registry.register(ToolSpec {
        name: LIST_AVAILABLE_VIEWS,
        doc: "List the views available for querying, each with a description and usage notes. \
              Call this first, pick the views relevant to the question, then use \
              get_table_views_metadata to see their columns.",
        params: vec![],
    });

    registry.register(ToolSpec {
        name: GET_TABLE_VIEWS_METADATA,
        doc: "Return column names, descriptions, data types, notes and example values for one or \
              more views from list_available_views. A view that cannot be described yields an \
              error entry without affecting the others.",
        params: vec![
            ParamSpec::required("table_views", ParamType::Array, "Views to describe."),
            limit(),
        ],
    });

    registry.register(ToolSpec {
        name: QUERY_SINGLE_VIEW,
        doc: "Query one view. Columns may be plain names, aggregates such as COUNT(item_id), or \
              aliased expressions. Use [\"*\"] for every column. Every referenced column must \
              exist in the view.",
        params: vec![
            ParamSpec::required("table_name", ParamType::String, "View to query."),
            ParamSpec::optional(
                "columns",
                ParamType::Array,
                Some(json!(["*"])),
                "Select-list expressions.",
            ),
            where_clause(),
            group_by(),
            order_by(),
            limit(),
        ],
    });

    registry.register(ToolSpec {
        name: QUERY_JOINED_VIEWS,
        doc: "Inner-join a base view with other views on the shared item key and return the \
              selected expressions. Views are aliased a, b, c... in the order given, base first; \
              qualify columns with the alias or the view name.",
        params: vec![
            ParamSpec::required(
                "select_columns",
                ParamType::Array,
                "Select-list expressions, e.g. a.item_id or b.amount.",
            ),
            ParamSpec::required("from_table", ParamType::String, "Base view."),
            ParamSpec::required("join_tables", ParamType::Array, "Views joined to the base view."),
            where_clause(),
            group_by(),
            order_by(),
            limit(),
        ],
    });

    registry.register(ToolSpec {
        name: LIST_TABLE_RELATIONSHIPS,
        doc: "List how a view relates to the other views: every view shares the item key and \
              joins one-to-one.",
        params: vec![ParamSpec::required(
            "source_table",
            ParamType::String,
            "View whose relationships to list.",
        )],
    });

    registry.register(ToolSpec {
        name: FETCH_RECENT_QUERY_CONTEXT,
        doc: "Return this session's recently used views, columns, filter values and joins, plus \
              its most recent queries. Use it to continue from earlier questions.",
        params: vec![ParamSpec::optional(
            "max_queries",
            ParamType::Integer,
            Some(json!(DEFAULT_RECENT_QUERIES)),
            "Number of recent queries to include.",
        )],
    });

    registry.register(ToolSpec {
        name: LIST_AVAILABLE_TOOLS,
        doc: "List every tool with its parameters and documentation.",
        params: vec![],
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_expression_list_from_string() {
        let list: ExpressionList = serde_json::from_value(json!("industry, COALESCE(make, 'x, y')")).unwrap();
        assert_eq!(list.0, vec!["industry", "COALESCE(make, 'x, y')"]);
    }

    #[test]
    fn test_expression_list_from_array_and_null() {
        let list: ExpressionList = serde_json::from_value(json!(["make", " ", "model DESC"])).unwrap();
        assert_eq!(list.0, vec!["make", "model DESC"]);

        let list: ExpressionList = serde_json::from_value(json!(null)).unwrap();
        assert!(list.0.is_empty());
    }

    #[test]
    fn test_single_view_defaults() {
        let args: QuerySingleViewArgs =
            serde_json::from_value(json!({ "table_name": "item_details" })).unwrap();
        assert_eq!(args.columns, vec!["*"]);
        assert!(args.group_by.0.is_empty());
        assert_eq!(args.limit, None);
    }

    #[test]
    fn test_unknown_argument_rejected() {
        let result: Result<QuerySingleViewArgs, _> =
            serde_json::from_value(json!({ "table_name": "item_details", "having": "x" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_register_tools() {
        let mut registry = ToolRegistry::new();
        register_tools(&mut registry, 200);
        assert_eq!(
            registry.names(),
            vec![
                LIST_AVAILABLE_VIEWS,
                GET_TABLE_VIEWS_METADATA,
                QUERY_SINGLE_VIEW,
                QUERY_JOINED_VIEWS,
                LIST_TABLE_RELATIONSHIPS,
                FETCH_RECENT_QUERY_CONTEXT,
                LIST_AVAILABLE_TOOLS,
            ]
        );
        let joined = registry.get(QUERY_JOINED_VIEWS).unwrap().definition();
        assert_eq!(
            joined.input_schema["required"],
            json!(["select_columns", "from_table", "join_tables"])
        );
    }
}
