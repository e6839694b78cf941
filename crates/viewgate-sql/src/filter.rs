//! Text-level helpers for caller-supplied WHERE clauses.
//!
//! These run before (or beside) structural parsing. Nothing here decides
//! whether a clause is safe; that is the expression validator's job.

use crate::error::SqlError;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Clause keywords that must arrive through their own parameters.
const RESERVED_CLAUSES: &[(&str, &str, &str)] = &[
    (r"(?i)\bLIMIT\b", "LIMIT", "limit"),
    (r"(?i)\bORDER\s+BY\b", "ORDER BY", "order_by"),
    (r"(?i)\bGROUP\s+BY\b", "GROUP BY", "group_by"),
];

fn reserved_patterns() -> &'static [(Regex, &'static str, &'static str)] {
    static PATTERNS: OnceLock<Vec<(Regex, &'static str, &'static str)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        RESERVED_CLAUSES
            .iter()
            .map(|(pattern, keyword, parameter)| {
                let re = Regex::new(pattern).expect("reserved clause pattern is valid");
                (re, *keyword, *parameter)
            })
            .collect()
    })
}

fn and_separator() -> &'static Regex {
    static AND: OnceLock<Regex> = OnceLock::new();
    AND.get_or_init(|| Regex::new(r"(?i)\s+AND\s+").expect("AND separator pattern is valid"))
}

/// Reject filters that smuggle LIMIT, ORDER BY or GROUP BY.
pub fn check_reserved_clauses(where_clause: &str) -> Result<(), SqlError> {
    for (pattern, keyword, parameter) in reserved_patterns() {
        if pattern.is_match(where_clause) {
            return Err(SqlError::SmuggledClause {
                keyword: keyword.to_string(),
                parameter: parameter.to_string(),
            });
        }
    }
    Ok(())
}

/// Strip one layer of enclosing quotes and un-escape the quotes inside.
///
/// Supports callers that pass the clause as a quoted string literal, such as
/// `"industry = 'Ag'"` or `'industry = \'Ag\''`. A clause whose first and
/// last characters are quotes of two different literals (`'a' = 'b'`) is
/// left alone.
pub fn unwrap_quoted(where_clause: &str) -> String {
    let trimmed = where_clause.trim();
    for quote in ['\'', '"'] {
        let Some(inner) = trimmed
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        else {
            continue;
        };
        if has_unescaped(inner, quote) {
            continue;
        }
        return unescape_quotes(inner).trim().to_string();
    }
    trimmed.to_string()
}

fn has_unescaped(text: &str, quote: char) -> bool {
    let mut escaped = false;
    for c in text.chars() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            return true;
        }
    }
    false
}

fn unescape_quotes(text: &str) -> String {
    text.replace("\\'", "'").replace("\\\"", "\"")
}

/// Best-effort `column = value` extraction from a conjunction.
///
/// Only used to remember recent filter values. OR, parentheses and
/// non-equality predicates are not understood; such parts are skipped.
pub fn parse_filter_assignments(where_clause: Option<&str>) -> BTreeMap<String, String> {
    let mut filters = BTreeMap::new();
    let Some(clause) = where_clause else {
        return filters;
    };

    for part in and_separator().split(clause) {
        let Some((column, value)) = part.split_once('=') else {
            continue;
        };
        let column = column.trim();
        if column.is_empty() || column.ends_with(['!', '<', '>']) {
            continue;
        }
        let value = value
            .trim()
            .trim_matches(|c| c == '\'' || c == '"' || c == '`');
        filters.insert(column.to_string(), value.to_string());
    }
    filters
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_clauses_rejected() {
        for clause in [
            "industry = 'Ag' LIMIT 5",
            "industry = 'Ag' order  by vin",
            "1 = 1 GROUP BY industry",
        ] {
            assert!(
                matches!(
                    check_reserved_clauses(clause),
                    Err(SqlError::SmuggledClause { .. })
                ),
                "{clause} should be rejected"
            );
        }
    }

    #[test]
    fn test_reserved_clauses_word_bounded() {
        assert!(check_reserved_clauses("credit_limit > 10").is_ok());
        assert!(check_reserved_clauses("border_by = 'x'").is_ok());
    }

    #[test]
    fn test_unwrap_quoted() {
        assert_eq!(unwrap_quoted("\"industry = 'Ag'\""), "industry = 'Ag'");
        assert_eq!(unwrap_quoted(r"'industry = \'Ag\''"), "industry = 'Ag'");
        assert_eq!(unwrap_quoted("'a' = 'b'"), "'a' = 'b'");
        assert_eq!(unwrap_quoted("  industry = 'Ag' "), "industry = 'Ag'");
    }

    #[test]
    fn test_parse_filter_assignments() {
        let filters =
            parse_filter_assignments(Some("industry = 'Ag' and state = \"TX\" AND price > 10"));
        assert_eq!(filters.len(), 2);
        assert_eq!(filters["industry"], "Ag");
        assert_eq!(filters["state"], "TX");

        let not_equal = parse_filter_assignments(Some("state != 'TX'"));
        assert!(not_equal.is_empty());

        assert!(parse_filter_assignments(None).is_empty());
    }
}
