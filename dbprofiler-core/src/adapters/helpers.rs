//! Helper utilities shared by the sqlx-backed adapters.
//!
//! Maps driver errors onto the crate taxonomy with credential-free context,
//! and normalizes JSON parameters into bindable scalars.

use std::borrow::Cow;

use serde_json::Value;
use sqlx::error::DatabaseError;

use crate::{
    ConnectionDescriptor,
    error::{ConnectionErrorKind, DbProfilerError},
};

/// Classifies a failed connection attempt.
///
/// `database_kind` inspects server-reported errors; transport failures and
/// pool acquire timeouts always mean the host could not be reached.
pub(crate) fn connect_error<F>(
    descriptor: &ConnectionDescriptor,
    error: sqlx::Error,
    database_kind: F,
) -> DbProfilerError
where
    F: Fn(&dyn DatabaseError) -> Option<ConnectionErrorKind>,
{
    let kind = match &error {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut => ConnectionErrorKind::HostUnreachable,
        sqlx::Error::Database(db) => {
            database_kind(db.as_ref()).unwrap_or(ConnectionErrorKind::Unknown)
        }
        _ => ConnectionErrorKind::Unknown,
    };
    DbProfilerError::connection(kind, format!("connecting to {}", descriptor), error)
}

/// Maps a failure that ends the session, if `error` is one.
fn session_error(context: &str, error: sqlx::Error) -> std::result::Result<DbProfilerError, sqlx::Error> {
    match error {
        sqlx::Error::PoolClosed => Ok(DbProfilerError::SessionClosed),
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut => Ok(DbProfilerError::connection(
            ConnectionErrorKind::HostUnreachable,
            context.to_string(),
            error,
        )),
        other => Err(other),
    }
}

/// Maps a failed catalog query.
pub(crate) fn introspection_error(context: impl Into<String>, error: sqlx::Error) -> DbProfilerError {
    let context = context.into();
    match session_error(&context, error) {
        Ok(fatal) => fatal,
        Err(other) => DbProfilerError::introspection(context, other),
    }
}

/// Maps a failed data query or statement.
pub(crate) fn query_error(context: impl Into<String>, error: sqlx::Error) -> DbProfilerError {
    let context = context.into();
    match session_error(&context, error) {
        Ok(fatal) => fatal,
        Err(other) => DbProfilerError::query_failed(format!("{}: {}", context, other)),
    }
}

/// Converts a driver row count into the unsigned model type.
pub(crate) fn non_negative(count: i64, context: &str) -> crate::Result<u64> {
    u64::try_from(count).map_err(|_| {
        DbProfilerError::query_failed(format!("{}: negative count {}", context, count))
    })
}

/// JSON parameter narrowed to something every driver can bind.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum BindValue<'a> {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(Cow<'a, str>),
}

impl<'a> BindValue<'a> {
    pub(crate) fn from_json(value: &'a Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => Self::Int(i),
                (None, Some(f)) => Self::Float(f),
                (None, None) => Self::Text(Cow::Owned(n.to_string())),
            },
            Value::String(s) => Self::Text(Cow::Borrowed(s.as_str())),
            Value::Array(_) | Value::Object(_) => Self::Text(Cow::Owned(value.to_string())),
        }
    }

    /// Text form used by engines that bind every parameter as text.
    pub(crate) fn into_text(self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Bool(b) => Some(b.to_string()),
            Self::Int(i) => Some(i.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::Text(s) => Some(s.into_owned()),
        }
    }
}

/// Parses JSON text, keeping numbers that `f64` cannot hold exactly as
/// their decimal string.
pub(crate) fn parse_exact_json(raw: &str) -> serde_json::Result<Value> {
    let raw = raw.trim();
    let value: Value = serde_json::from_str(raw)?;
    Ok(match value {
        Value::Number(n) if !is_exact(raw, &n) => Value::String(raw.to_string()),
        other => other,
    })
}

fn is_exact(raw: &str, number: &serde_json::Number) -> bool {
    if number.is_i64() || number.is_u64() {
        return true;
    }
    trim_fraction(raw) == trim_fraction(&number.to_string())
}

/// `9.50` and `9.5` are the same number.
fn trim_fraction(digits: &str) -> &str {
    if digits.contains('.') && !digits.contains(['e', 'E']) {
        digits.trim_end_matches('0').trim_end_matches('.')
    } else {
        digits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bind_value_narrowing() {
        assert_eq!(BindValue::from_json(&json!(null)), BindValue::Null);
        assert_eq!(BindValue::from_json(&json!(true)), BindValue::Bool(true));
        assert_eq!(BindValue::from_json(&json!(-7)), BindValue::Int(-7));
        assert_eq!(BindValue::from_json(&json!(2.5)), BindValue::Float(2.5));
        assert_eq!(
            BindValue::from_json(&json!(u64::MAX)),
            BindValue::Float(u64::MAX as f64)
        );
        assert_eq!(
            BindValue::from_json(&json!("x")),
            BindValue::Text(Cow::Borrowed("x"))
        );
        assert_eq!(
            BindValue::from_json(&json!({"a": 1})).into_text(),
            Some("{\"a\":1}".to_string())
        );
    }

    #[test]
    fn test_text_form() {
        assert_eq!(BindValue::Null.into_text(), None);
        assert_eq!(BindValue::Int(42).into_text(), Some("42".to_string()));
        assert_eq!(BindValue::Bool(false).into_text(), Some("false".to_string()));
    }

    #[test]
    fn test_exact_json_numbers() {
        assert_eq!(parse_exact_json("9.50").unwrap(), json!(9.5));
        assert_eq!(parse_exact_json("1000000.00").unwrap(), json!(1_000_000.0));
        assert_eq!(parse_exact_json("-42").unwrap(), json!(-42));
        assert_eq!(parse_exact_json("\"abc\"").unwrap(), json!("abc"));
        assert_eq!(
            parse_exact_json("12345678901234567.89").unwrap(),
            json!("12345678901234567.89")
        );
        assert_eq!(
            parse_exact_json("123456789012345678901234567890").unwrap(),
            json!("123456789012345678901234567890")
        );
        assert!(parse_exact_json("not json").is_err());
    }

    #[test]
    fn test_pool_closed_is_session_error() {
        let error = query_error("counting rows", sqlx::Error::PoolClosed);
        assert!(matches!(error, DbProfilerError::SessionClosed));
    }

    #[test]
    fn test_row_not_found_is_query_error() {
        let error = query_error("counting rows", sqlx::Error::RowNotFound);
        assert!(matches!(error, DbProfilerError::QueryExecution { .. }));
        assert!(!error.is_fatal());

        let error = introspection_error("listing tables", sqlx::Error::RowNotFound);
        assert!(matches!(error, DbProfilerError::Introspection { .. }));
    }

    #[test]
    fn test_connect_error_classification() {
        let descriptor = ConnectionDescriptor::sqlite("/missing.db");
        let error = connect_error(&descriptor, sqlx::Error::PoolTimedOut, |_| None);
        assert_eq!(
            error.connection_kind(),
            Some(ConnectionErrorKind::HostUnreachable)
        );

        let error = connect_error(&descriptor, sqlx::Error::RowNotFound, |_| None);
        assert_eq!(error.connection_kind(), Some(ConnectionErrorKind::Unknown));
    }
}
