//! PostgREST query-string builder and `Content-Range` parsing.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::domain::DateWindow;

/// Query parameters for one table read or conditional write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct RowQuery {
    pairs: Vec<(String, String)>,
}

impl RowQuery {
    /// Start a read projecting `columns`.
    pub(crate) fn select(columns: &str) -> Self {
        Self::default().param("select", columns)
    }

    fn param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.pairs.push((key.to_owned(), value.into()));
        self
    }

    pub(crate) fn eq(self, column: &str, value: impl AsRef<str>) -> Self {
        self.param(column, format!("eq.{}", value.as_ref()))
    }

    pub(crate) fn eq_bool(self, column: &str, value: bool) -> Self {
        self.param(column, format!("eq.{value}"))
    }

    pub(crate) fn eq_timestamp(self, column: &str, value: DateTime<Utc>) -> Self {
        self.param(column, format!("eq.{}", timestamp(value)))
    }

    pub(crate) fn is_null(self, column: &str) -> Self {
        self.param(column, "is.null")
    }

    /// Match a nullable timestamp exactly: `eq.<value>`, or `is.null` when
    /// the value is absent.
    pub(crate) fn eq_optional_timestamp(
        self,
        column: &str,
        value: Option<DateTime<Utc>>,
    ) -> Self {
        match value {
            Some(value) => self.eq_timestamp(column, value),
            None => self.is_null(column),
        }
    }

    pub(crate) fn gte(self, column: &str, value: DateTime<Utc>) -> Self {
        self.param(column, format!("gte.{}", timestamp(value)))
    }

    pub(crate) fn lte(self, column: &str, value: DateTime<Utc>) -> Self {
        self.param(column, format!("lte.{}", timestamp(value)))
    }

    /// Restrict `column` to the window's bounds, when set.
    pub(crate) fn within(self, column: &str, window: &DateWindow) -> Self {
        let query = match window.start() {
            Some(start) => self.gte(column, start),
            None => self,
        };
        match window.end() {
            Some(end) => query.lte(column, end),
            None => query,
        }
    }

    pub(crate) fn order_desc(self, column: &str) -> Self {
        self.param("order", format!("{column}.desc"))
    }

    pub(crate) fn order_asc(self, column: &str) -> Self {
        self.param("order", format!("{column}.asc"))
    }

    pub(crate) fn limit(self, limit: u32) -> Self {
        self.param("limit", limit.to_string())
    }

    pub(crate) fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }
}

/// Timestamp literal with full precision and a `Z` suffix.
pub(crate) fn timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Inclusive `Range` header value for rows `offset..=last_index`.
pub(crate) fn range_header(offset: u64, last_index: u64) -> String {
    format!("{offset}-{last_index}")
}

/// Total from a `Content-Range` value such as `0-9/42` or `*/0`.
/// `None` when the total is unknown (`*`) or malformed.
pub(crate) fn parse_content_range(value: &str) -> Option<u64> {
    let (_, total) = value.trim().rsplit_once('/')?;
    total.parse().ok()
}
