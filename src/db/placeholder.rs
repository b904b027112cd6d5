//! Placeholder translation.
//!
//! Callers write one canonical form, `?`, and this module rewrites it into the
//! target dialect's native parameter syntax. The input is never modified; a new
//! SQL string and a new binding list are produced.
//!
//! Every literal `?` counts as a placeholder, including one inside a string
//! literal or comment. This is not a SQL parser.

use crate::models::{DatabaseType, SqlValue};

/// How a dialect expects parameters to be written and bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `?` passed through, bound by position (MySQL, SQLite)
    Positional,
    /// `?` rewritten to `:0, :1, ...`, bound by position (Oracle)
    Ordinal,
    /// `?` rewritten to `@p0, @p1, ...`, bound by name (SQL Server)
    Named,
    /// Caller writes `$1, $2, ...`; nothing is rewritten (PostgreSQL)
    Dollar,
}

impl PlaceholderStyle {
    pub fn for_dialect(db_type: DatabaseType) -> Self {
        match db_type {
            DatabaseType::MySQL | DatabaseType::SQLite => Self::Positional,
            DatabaseType::Oracle => Self::Ordinal,
            DatabaseType::SqlServer => Self::Named,
            DatabaseType::PostgreSQL => Self::Dollar,
        }
    }
}

/// A parameter value ready to bind. `name` is set only for named binding.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundParam {
    pub name: Option<String>,
    pub value: SqlValue,
}

/// The dialect-native form of a canonical query.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedQuery {
    pub sql: String,
    pub params: Vec<BoundParam>,
}

impl TranslatedQuery {
    fn unchanged(sql: &str, params: Vec<BoundParam>) -> Self {
        Self {
            sql: sql.to_string(),
            params,
        }
    }
}

/// Count `?` tokens in a statement.
pub fn count_placeholders(sql: &str) -> usize {
    sql.matches('?').count()
}

/// Translate a canonical `?` query into `style`.
///
/// For [`PlaceholderStyle::Named`], a token count that differs from the
/// parameter count skips translation entirely: the SQL is returned untouched
/// with nothing bound, and the server reports the mismatch.
pub fn translate(sql: &str, params: &[SqlValue], style: PlaceholderStyle) -> TranslatedQuery {
    match style {
        PlaceholderStyle::Positional | PlaceholderStyle::Dollar => {
            TranslatedQuery::unchanged(sql, positional(params))
        }
        PlaceholderStyle::Ordinal => TranslatedQuery {
            sql: rewrite(sql, |i| format!(":{i}")),
            params: positional(params),
        },
        PlaceholderStyle::Named => {
            if params.is_empty() || count_placeholders(sql) != params.len() {
                return TranslatedQuery::unchanged(sql, Vec::new());
            }
            TranslatedQuery {
                sql: rewrite(sql, |i| format!("@p{i}")),
                params: params
                    .iter()
                    .enumerate()
                    .map(|(i, value)| BoundParam {
                        name: Some(format!("p{i}")),
                        value: value.clone(),
                    })
                    .collect(),
            }
        }
    }
}

fn positional(params: &[SqlValue]) -> Vec<BoundParam> {
    params
        .iter()
        .map(|value| BoundParam {
            name: None,
            value: value.clone(),
        })
        .collect()
}

/// Replace the n-th `?` (left to right, from zero) with `token(n)`.
fn rewrite(sql: &str, token: impl Fn(usize) -> String) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    for (i, part) in sql.split('?').enumerate() {
        if i > 0 {
            out.push_str(&token(i - 1));
        }
        out.push_str(part);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(n: i64) -> Vec<SqlValue> {
        (1..=n).map(SqlValue::Int).collect()
    }

    #[test]
    fn test_style_per_dialect() {
        assert_eq!(
            PlaceholderStyle::for_dialect(DatabaseType::MySQL),
            PlaceholderStyle::Positional
        );
        assert_eq!(
            PlaceholderStyle::for_dialect(DatabaseType::SQLite),
            PlaceholderStyle::Positional
        );
        assert_eq!(
            PlaceholderStyle::for_dialect(DatabaseType::Oracle),
            PlaceholderStyle::Ordinal
        );
        assert_eq!(
            PlaceholderStyle::for_dialect(DatabaseType::SqlServer),
            PlaceholderStyle::Named
        );
        assert_eq!(
            PlaceholderStyle::for_dialect(DatabaseType::PostgreSQL),
            PlaceholderStyle::Dollar
        );
    }

    #[test]
    fn test_positional_passes_through() {
        let sql = "SELECT * FROM t WHERE a = ? AND b = ?";
        let q = translate(sql, &ints(2), PlaceholderStyle::Positional);
        assert_eq!(q.sql, sql);
        assert_eq!(q.params.len(), 2);
        assert!(q.params.iter().all(|p| p.name.is_none()));
    }

    #[test]
    fn test_dollar_is_not_translated() {
        let sql = "SELECT * FROM t WHERE a = $1 OR b = ?";
        let q = translate(sql, &ints(1), PlaceholderStyle::Dollar);
        assert_eq!(q.sql, sql);
        assert_eq!(q.params.len(), 1);
    }

    #[test]
    fn test_ordinal_rewrites_left_to_right() {
        let q = translate(
            "INSERT INTO t(a, b, c) VALUES (?, ?, ?)",
            &ints(3),
            PlaceholderStyle::Ordinal,
        );
        assert_eq!(q.sql, "INSERT INTO t(a, b, c) VALUES (:0, :1, :2)");
        assert_eq!(
            q.params.iter().map(|p| p.value.clone()).collect::<Vec<_>>(),
            ints(3)
        );
    }

    #[test]
    fn test_named_binds_p0_to_pn_in_order() {
        let params = vec![SqlValue::Text("x".into()), SqlValue::Int(5)];
        let q = translate(
            "UPDATE t SET a = ? WHERE id = ?",
            &params,
            PlaceholderStyle::Named,
        );
        assert_eq!(q.sql, "UPDATE t SET a = @p0 WHERE id = @p1");
        assert_eq!(q.params[0].name.as_deref(), Some("p0"));
        assert_eq!(q.params[0].value, SqlValue::Text("x".into()));
        assert_eq!(q.params[1].name.as_deref(), Some("p1"));
        assert_eq!(q.params[1].value, SqlValue::Int(5));
    }

    #[test]
    fn test_named_count_mismatch_leaves_query_untouched() {
        let sql = "SELECT * FROM t WHERE a = ? AND b = ?";
        let q = translate(sql, &ints(1), PlaceholderStyle::Named);
        assert_eq!(q.sql, sql);
        assert!(q.params.is_empty());

        let q = translate(sql, &ints(3), PlaceholderStyle::Named);
        assert_eq!(q.sql, sql);
        assert!(q.params.is_empty());
    }

    #[test]
    fn test_named_without_params_is_untouched() {
        let sql = "SELECT 1";
        let q = translate(sql, &[], PlaceholderStyle::Named);
        assert_eq!(q.sql, sql);
        assert!(q.params.is_empty());
    }

    #[test]
    fn test_question_mark_in_literal_counts_as_token() {
        let sql = "SELECT * FROM t WHERE note = 'why?' AND id = ?";
        assert_eq!(count_placeholders(sql), 2);

        // one param but two tokens: skipped
        let q = translate(sql, &ints(1), PlaceholderStyle::Named);
        assert_eq!(q.sql, sql);

        let q = translate(sql, &ints(2), PlaceholderStyle::Named);
        assert_eq!(q.sql, "SELECT * FROM t WHERE note = 'why@p0' AND id = @p1");
    }

    #[test]
    fn test_translation_does_not_mutate_input() {
        let sql = String::from("SELECT ?");
        let _ = translate(&sql, &ints(1), PlaceholderStyle::Ordinal);
        assert_eq!(sql, "SELECT ?");
    }
}
