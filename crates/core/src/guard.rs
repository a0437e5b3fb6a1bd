//! Shape and deny-list guard for generated outlet lookup SQL.
//!
//! A generated query is only ever executed through [`VettedOutletQuery`], which
//! can be constructed solely by passing the guard.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)^```(?:sql)?\s*|\s*```$").expect("valid fence regex"));

static TRAILING_SEMICOLON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r";\s*$").expect("valid semicolon regex"));

static OUTLET_SELECT_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^select\s+city\s*,\s*outlet\s*,\s*open_time\s*,\s*close_time\s+from\s+outlets\b",
    )
    .expect("valid shape regex")
});

/// What may follow `from outlets`: nothing, or a filter, ordering or limit clause.
static OUTLET_TAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\s*$|\s+(?:where|order\s+by|limit)\b)").expect("valid tail regex")
});

static STRING_LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'(?:[^']|'')*'").expect("valid literal regex"));

static DENIED_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    let alternation = DENIED_KEYWORDS.join("|");
    Regex::new(&format!(r"\b(?:{alternation})\b")).expect("valid keyword regex")
});

static SELECT_OR_FROM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:select|from)\b").expect("valid select regex"));

/// Matched as whole words outside string literals.
pub const DENIED_KEYWORDS: &[&str] = &[
    "pragma", "attach", "detach", "insert", "update", "delete", "drop", "alter", "create",
    "replace", "vacuum", "union", "join",
];

/// Matched anywhere outside string literals.
pub const DENIED_PUNCTUATION: &[&str] = &["--", "/*", "*/", ";"];

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GuardError {
    #[error("generated query is empty")]
    Empty,
    #[error("SQL must select city, outlet, open_time, close_time from outlets. Got: {0}")]
    Shape(String),
    #[error("Unsafe SQL generated (`{token}`): {sql}")]
    DeniedToken { token: &'static str, sql: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VettedOutletQuery(String);

impl VettedOutletQuery {
    /// Cleans completion output (code fences, one trailing semicolon) and vets it.
    pub fn from_generated(raw: &str) -> Result<Self, GuardError> {
        Self::vet(&strip_generated(raw))
    }

    pub fn vet(sql: &str) -> Result<Self, GuardError> {
        let sql = sql.trim();
        if sql.is_empty() {
            return Err(GuardError::Empty);
        }

        let lower = STRING_LITERAL.replace_all(&sql.to_ascii_lowercase(), "''").into_owned();
        let Some(prefix) = OUTLET_SELECT_SHAPE.find(&lower) else {
            return Err(GuardError::Shape(sql.to_string()));
        };

        let denied = |token: &'static str| GuardError::DeniedToken { token, sql: sql.to_string() };
        if let Some(token) = DENIED_PUNCTUATION.iter().find(|token| lower.contains(**token)) {
            return Err(denied(*token));
        }
        if let Some(found) = DENIED_KEYWORD.find(&lower) {
            let token = DENIED_KEYWORDS
                .iter()
                .find(|keyword| **keyword == found.as_str())
                .copied()
                .unwrap_or("keyword");
            return Err(denied(token));
        }

        let tail = &lower[prefix.end()..];
        if let Some(nested) = SELECT_OR_FROM.find(tail) {
            return Err(denied(if nested.as_str() == "select" { "select" } else { "from" }));
        }
        if !OUTLET_TAIL.is_match(tail) {
            return Err(GuardError::Shape(sql.to_string()));
        }

        Ok(Self(sql.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub fn strip_generated(raw: &str) -> String {
    let unfenced = CODE_FENCE.replace_all(raw.trim(), "");
    TRAILING_SEMICOLON.replace(unfenced.trim(), "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::{strip_generated, GuardError, VettedOutletQuery};

    #[test]
    fn accepts_the_fixed_four_column_shape() {
        let query = VettedOutletQuery::vet(
            "SELECT city, outlet, open_time, close_time FROM outlets WHERE city = 'Ampang'",
        )
        .expect("plain select should pass");
        assert!(query.as_str().ends_with("'Ampang'"));
    }

    #[test]
    fn strips_code_fences_and_trailing_semicolon() {
        let raw = "```sql\nSELECT city, outlet, open_time, close_time FROM outlets;\n```";
        assert_eq!(
            strip_generated(raw),
            "SELECT city, outlet, open_time, close_time FROM outlets"
        );
        assert!(VettedOutletQuery::from_generated(raw).is_ok());
    }

    #[test]
    fn rejects_other_columns_and_tables() {
        assert!(matches!(
            VettedOutletQuery::vet("SELECT * FROM outlets"),
            Err(GuardError::Shape(_))
        ));
        assert!(matches!(
            VettedOutletQuery::vet("SELECT city, outlet, open_time, close_time FROM chat_sessions"),
            Err(GuardError::Shape(_))
        ));
        assert!(matches!(
            VettedOutletQuery::vet("SELECT name FROM sqlite_master"),
            Err(GuardError::Shape(_))
        ));
    }

    #[test]
    fn rejects_injected_statements_and_comments() {
        let injected = "SELECT city, outlet, open_time, close_time FROM outlets \
                        WHERE outlet = 'Wangsa Maju'; DROP TABLE outlets; --'";
        assert!(matches!(
            VettedOutletQuery::from_generated(injected),
            Err(GuardError::DeniedToken { .. })
        ));

        let union = "SELECT city, outlet, open_time, close_time FROM outlets \
                     UNION SELECT name, sql, type, tbl_name FROM sqlite_master";
        assert!(matches!(
            VettedOutletQuery::vet(union),
            Err(GuardError::DeniedToken { token: "union", .. })
        ));

        let joined = "SELECT city, outlet, open_time, close_time FROM outlets o JOIN products p";
        assert!(matches!(
            VettedOutletQuery::vet(joined),
            Err(GuardError::DeniedToken { token: "join", .. })
        ));
    }

    #[test]
    fn rejects_other_tables_after_outlets() {
        assert!(matches!(
            VettedOutletQuery::vet(
                "SELECT city, outlet, open_time, close_time FROM outlets, chat_sessions"
            ),
            Err(GuardError::Shape(_))
        ));
        assert!(matches!(
            VettedOutletQuery::vet(
                "SELECT city, outlet, open_time, close_time FROM outlets o, chat_sessions s WHERE 1 = 1"
            ),
            Err(GuardError::Shape(_))
        ));
        assert!(matches!(
            VettedOutletQuery::vet(
                "SELECT city, outlet, open_time, close_time FROM outlets \
                 WHERE city IN (SELECT state_json FROM chat_sessions)"
            ),
            Err(GuardError::DeniedToken { token: "select", .. })
        ));
        assert!(matches!(
            VettedOutletQuery::vet(
                "SELECT city, outlet, open_time, close_time FROM outlets GROUP BY city"
            ),
            Err(GuardError::Shape(_))
        ));
    }

    #[test]
    fn keywords_inside_literals_are_allowed() {
        let query = VettedOutletQuery::vet(
            "SELECT city, outlet, open_time, close_time FROM outlets \
             WHERE outlet LIKE '%Update%' OR city = 'Drop; from select' ORDER BY outlet LIMIT 5",
        )
        .expect("literal text should not trip the deny list");
        assert!(query.as_str().contains("'%Update%'"));

        assert!(VettedOutletQuery::vet(
            "SELECT city, outlet, open_time, close_time FROM outlets WHERE city IN ('Ampang', 'Petaling Jaya')"
        )
        .is_ok());
    }

    #[test]
    fn keywords_match_whole_words_only() {
        assert!(VettedOutletQuery::vet(
            "SELECT city, outlet, open_time, close_time FROM outlets WHERE outlet = updated_outlet"
        )
        .is_ok());
        assert!(matches!(
            VettedOutletQuery::vet(
                "SELECT city, outlet, open_time, close_time FROM outlets WHERE city = 'x' OR update"
            ),
            Err(GuardError::DeniedToken { token: "update", .. })
        ));
    }

    #[test]
    fn rejects_empty_output() {
        assert_eq!(VettedOutletQuery::from_generated("```sql\n```"), Err(GuardError::Empty));
    }
}
