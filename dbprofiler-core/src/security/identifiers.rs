//! SQL identifier quoting per engine dialect.
//!
//! Identifiers are only ever interpolated after they have been read back
//! from the live catalog; quoting is the second line, not the first.

use crate::models::DatabaseEngine;

/// Quoting and placeholder rules of one SQL dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// `"ident"` quoting, `$n` placeholders
    Postgres,
    /// `` `ident` `` quoting, `?` placeholders
    MySql,
    /// `"ident"` quoting, `?n` placeholders
    Sqlite,
}

impl Dialect {
    pub fn for_engine(engine: DatabaseEngine) -> Self {
        match engine {
            DatabaseEngine::PostgreSQL => Self::Postgres,
            DatabaseEngine::MySQL => Self::MySql,
            DatabaseEngine::SQLite => Self::Sqlite,
        }
    }

    fn quote_char(self) -> char {
        match self {
            Self::Postgres | Self::Sqlite => '"',
            Self::MySql => '`',
        }
    }

    /// Quotes one identifier, doubling embedded quote characters.
    pub fn quote(self, identifier: &str) -> String {
        quote_identifier(identifier, self.quote_char())
    }

    /// Quotes `schema.table`.
    pub fn qualified(self, schema: &str, table: &str) -> String {
        format!("{}.{}", self.quote(schema), self.quote(table))
    }

    /// Bind placeholder for the 1-based parameter `index`.
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Self::Postgres => format!("${}", index),
            Self::MySql => "?".to_string(),
            Self::Sqlite => format!("?{}", index),
        }
    }

    /// Placeholder for a value destined for a column of `column_type`.
    ///
    /// PostgreSQL parameters are bound as text and cast server-side to the
    /// catalog-reported type; the other engines coerce bound values.
    pub fn value_placeholder(self, index: usize, column_type: &str) -> String {
        match self {
            Self::Postgres => format!("CAST(${} AS {})", index, column_type),
            Self::MySql | Self::Sqlite => self.placeholder(index),
        }
    }
}

/// Wraps `identifier` in `quote`, doubling any embedded `quote`.
pub fn quote_identifier(identifier: &str, quote: char) -> String {
    let mut escaped = String::with_capacity(identifier.len().saturating_add(2));
    escaped.push(quote);
    for ch in identifier.chars() {
        if ch == quote {
            escaped.push(quote);
        }
        escaped.push(ch);
    }
    escaped.push(quote);
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_quote_per_dialect() {
        assert_eq!(Dialect::Postgres.quote("users"), "\"users\"");
        assert_eq!(Dialect::MySql.quote("users"), "`users`");
        assert_eq!(Dialect::Sqlite.quote("my\"table"), "\"my\"\"table\"");
        assert_eq!(Dialect::MySql.quote("a`b"), "`a``b`");
    }

    #[test]
    fn test_qualified_and_placeholders() {
        assert_eq!(
            Dialect::Postgres.qualified("public", "test_table"),
            "\"public\".\"test_table\""
        );
        assert_eq!(Dialect::Postgres.placeholder(2), "$2");
        assert_eq!(Dialect::MySql.placeholder(2), "?");
        assert_eq!(Dialect::Sqlite.placeholder(2), "?2");
        assert_eq!(
            Dialect::Postgres.value_placeholder(1, "character varying(50)"),
            "CAST($1 AS character varying(50))"
        );
        assert_eq!(Dialect::Sqlite.value_placeholder(1, "TEXT"), "?1");
    }

    fn unquote(quoted: &str, quote: char) -> Option<String> {
        let inner = quoted.strip_prefix(quote)?.strip_suffix(quote)?;
        let doubled: String = [quote, quote].iter().collect();
        let single = quote.to_string();
        // Every embedded quote must come in pairs
        if inner.replace(&doubled, "").contains(quote) {
            return None;
        }
        Some(inner.replace(&doubled, &single))
    }

    proptest! {
        #[test]
        fn quoted_identifiers_round_trip(ident in "\\PC{0,40}") {
            for dialect in [Dialect::Postgres, Dialect::MySql, Dialect::Sqlite] {
                let quoted = dialect.quote(&ident);
                prop_assert_eq!(unquote(&quoted, dialect.quote_char()), Some(ident.clone()));
            }
        }

        #[test]
        fn quoted_identifiers_cannot_break_out(ident in "[a-z\"`; -]{0,20}") {
            let quoted = Dialect::Postgres.quote(&ident);
            let inner = &quoted[1..quoted.len() - 1];
            prop_assert!(!inner.replace("\"\"", "").contains('"'));
        }
    }
}
