//! Statement builder for multi-row inserts, IN-lists and filter clauses.
//!
//! # Invariants
//! - Placeholder count always equals `args.len()`.
//! - An empty IN-list renders as `0 = 1` and matches no rows.
//! - An empty multi-row insert is rejected instead of emitting invalid SQL.

use rusqlite::types::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Predicate rendered for an empty IN-list.
pub const MATCH_NONE: &str = "0 = 1";

/// Escape character used by [`like_contains`] patterns.
pub const LIKE_ESCAPE: char = '\\';

/// Builder input that cannot produce a valid statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementError {
    /// Multi-row insert called with no rows.
    EmptyRows,
    /// A tuple with zero columns.
    EmptyTuple,
    ArityMismatch {
        row: usize,
        expected: usize,
        found: usize,
    },
}

impl Display for StatementError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyRows => write!(f, "multi-value insert requires at least one row"),
            Self::EmptyTuple => write!(f, "multi-value insert rows must have at least one column"),
            Self::ArityMismatch {
                row,
                expected,
                found,
            } => write!(
                f,
                "multi-value insert row {row} has {found} values, expected {expected}"
            ),
        }
    }
}

impl Error for StatementError {}

/// SQL text with the positional arguments bound to its `?` placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlFragment {
    pub sql: String,
    pub args: Vec<Value>,
}

/// Appends a `VALUES` list to `base` with one `(?, ..)` group per row.
///
/// `base` is the statement head, e.g. `INSERT INTO t (a, b)`. Arguments are
/// flattened in row-major order.
///
/// # Errors
/// - `StatementError::EmptyRows` when `rows` is empty.
/// - `StatementError::EmptyTuple` when the first row has no values.
/// - `StatementError::ArityMismatch` when rows differ in width.
pub fn build_multi_value_insert(
    base: &str,
    rows: Vec<Vec<Value>>,
) -> Result<SqlFragment, StatementError> {
    let arity = match rows.first() {
        None => return Err(StatementError::EmptyRows),
        Some(first) if first.is_empty() => return Err(StatementError::EmptyTuple),
        Some(first) => first.len(),
    };

    let group = placeholder_group(arity);
    let mut groups = Vec::with_capacity(rows.len());
    let mut args = Vec::with_capacity(rows.len() * arity);

    for (index, row) in rows.into_iter().enumerate() {
        if row.len() != arity {
            return Err(StatementError::ArityMismatch {
                row: index,
                expected: arity,
                found: row.len(),
            });
        }
        groups.push(group.as_str());
        args.extend(row);
    }

    Ok(SqlFragment {
        sql: format!("{} VALUES {}", base.trim_end(), groups.join(", ")),
        args,
    })
}

/// Renders `column IN (?, ..)` for `values`, or [`MATCH_NONE`] when empty.
pub fn build_in_clause(column: &str, values: Vec<Value>) -> SqlFragment {
    if values.is_empty() {
        return SqlFragment {
            sql: MATCH_NONE.to_string(),
            args: Vec::new(),
        };
    }

    SqlFragment {
        sql: format!("{column} IN {}", placeholder_group(values.len())),
        args: values,
    }
}

/// Builds a bound `%term%` pattern with LIKE wildcards in `term` escaped.
///
/// Pair with `LIKE ? ESCAPE '\'`.
pub fn like_contains(term: &str) -> Value {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | LIKE_ESCAPE) {
            pattern.push(LIKE_ESCAPE);
        }
        pattern.push(ch);
    }
    pattern.push('%');
    Value::Text(pattern)
}

/// Ordered conjunction of predicates and their bound arguments.
///
/// A finder renders its list read and its count read from the same clause.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterClause {
    conditions: Vec<String>,
    args: Vec<Value>,
}

impl FilterClause {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one predicate with its arguments.
    pub fn and(&mut self, condition: impl Into<String>, args: impl IntoIterator<Item = Value>) {
        self.conditions.push(condition.into());
        self.args.extend(args);
    }

    /// Adds a fixed predicate that binds no arguments.
    pub fn and_static(&mut self, condition: &'static str) {
        self.conditions.push(condition.to_string());
    }

    pub fn and_fragment(&mut self, fragment: SqlFragment) {
        self.and(fragment.sql, fragment.args);
    }

    /// Renders ` WHERE a AND b`, or an empty string when no predicate exists.
    pub fn where_sql(&self) -> String {
        if self.conditions.is_empty() {
            return String::new();
        }
        let joined = self
            .conditions
            .iter()
            .map(|condition| format!("({condition})"))
            .collect::<Vec<_>>()
            .join(" AND ");
        format!(" WHERE {joined}")
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }
}

fn placeholder_group(arity: usize) -> String {
    format!("({})", vec!["?"; arity].join(", "))
}

#[cfg(test)]
mod tests {
    use super::{
        build_in_clause, build_multi_value_insert, like_contains, FilterClause, StatementError,
        MATCH_NONE,
    };
    use rusqlite::types::Value;

    fn text(value: &str) -> Value {
        Value::Text(value.to_string())
    }

    #[test]
    fn multi_value_insert_emits_one_group_per_row_in_row_major_order() {
        let rows = vec![
            vec![text("u"), text("r1")],
            vec![text("u"), text("r2")],
            vec![text("u"), text("r3")],
        ];
        let fragment = build_multi_value_insert("INSERT INTO t (a, b)", rows).unwrap();
        assert_eq!(
            fragment.sql,
            "INSERT INTO t (a, b) VALUES (?, ?), (?, ?), (?, ?)"
        );
        assert_eq!(fragment.sql.matches("(?, ?)").count(), 3);
        assert_eq!(
            fragment.args,
            vec![
                text("u"),
                text("r1"),
                text("u"),
                text("r2"),
                text("u"),
                text("r3")
            ]
        );
    }

    #[test]
    fn multi_value_insert_single_row_has_no_trailing_separator() {
        let fragment =
            build_multi_value_insert("INSERT INTO t (a)", vec![vec![Value::Integer(1)]]).unwrap();
        assert_eq!(fragment.sql, "INSERT INTO t (a) VALUES (?)");
        assert!(!fragment.sql.ends_with(','));
    }

    #[test]
    fn multi_value_insert_rejects_empty_and_ragged_rows() {
        assert_eq!(
            build_multi_value_insert("INSERT INTO t (a)", Vec::new()).unwrap_err(),
            StatementError::EmptyRows
        );
        assert_eq!(
            build_multi_value_insert("INSERT INTO t (a)", vec![Vec::new()]).unwrap_err(),
            StatementError::EmptyTuple
        );
        let err = build_multi_value_insert(
            "INSERT INTO t (a, b)",
            vec![vec![text("a"), text("b")], vec![text("c")]],
        )
        .unwrap_err();
        assert_eq!(
            err,
            StatementError::ArityMismatch {
                row: 1,
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn in_clause_expands_placeholders() {
        let fragment = build_in_clause("role_id", vec![text("a"), text("b")]);
        assert_eq!(fragment.sql, "role_id IN (?, ?)");
        assert_eq!(fragment.args.len(), 2);
    }

    #[test]
    fn empty_in_clause_matches_none() {
        let fragment = build_in_clause("role_id", Vec::new());
        assert_eq!(fragment.sql, MATCH_NONE);
        assert!(fragment.args.is_empty());
    }

    #[test]
    fn like_contains_binds_escaped_wildcards() {
        assert_eq!(like_contains("rust"), text("%rust%"));
        assert_eq!(like_contains("50%_off"), text("%50\\%\\_off%"));
    }

    #[test]
    fn filter_clause_renders_conjunction() {
        let mut filter = FilterClause::new();
        assert_eq!(filter.where_sql(), "");

        filter.and_static("deleted_at IS NULL");
        filter.and("email = ?", [text("a@b.c")]);
        filter.and_fragment(build_in_clause("x", vec![text("1")]));
        assert_eq!(
            filter.where_sql(),
            " WHERE (deleted_at IS NULL) AND (email = ?) AND (x IN (?))"
        );
        assert_eq!(filter.args().len(), 2);
    }
}
