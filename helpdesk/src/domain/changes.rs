//! Realtime change events and explicit subscription handles.
//!
//! The backend pushes one [`ChangeEvent`] per row insert, update or delete.
//! Consumers say what they care about with a [`ChangeFilter`] and receive a
//! [`ChangeSubscription`]; dropping the handle or calling
//! [`ChangeSubscription::unsubscribe`] releases the upstream resources.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

/// Backend tables the client watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Tickets,
    Comments,
    Users,
}

impl Table {
    /// Table name on the backend.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tickets => "tickets",
            Self::Comments => "comments",
            Self::Users => "users",
        }
    }

    /// Parse a backend table name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "tickets" => Some(Self::Tickets),
            "comments" => Some(Self::Comments),
            "users" => Some(Self::Users),
            _ => None,
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row operation reported by a change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    /// Every kind.
    pub const ALL: [ChangeKind; 3] = [ChangeKind::Insert, ChangeKind::Update, ChangeKind::Delete];

    /// Upper-case name used on the realtime wire.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

/// Equality predicate on one column, e.g. `ti_id=eq.<uuid>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnFilter {
    column: String,
    value: String,
}

impl ColumnFilter {
    /// Match rows whose `column` equals `value`.
    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }

    /// Column compared.
    pub fn column(&self) -> &str {
        &self.column
    }

    /// Value the column must equal.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Filter expression in the backend's `column=eq.value` form.
    pub fn to_expression(&self) -> String {
        format!("{}=eq.{}", self.column, self.value)
    }

    fn matches_record(&self, record: Option<&Value>) -> bool {
        let Some(field) = record.and_then(|row| row.get(&self.column)) else {
            return false;
        };
        match field {
            Value::String(text) => text == &self.value,
            Value::Null => false,
            other => other.to_string() == self.value,
        }
    }
}

/// What a subscriber wants to hear about.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChangeFilter {
    table: Table,
    kinds: Vec<ChangeKind>,
    column: Option<ColumnFilter>,
}

impl ChangeFilter {
    /// Every insert, update and delete on `table`.
    pub fn table(table: Table) -> Self {
        Self {
            table,
            kinds: ChangeKind::ALL.to_vec(),
            column: None,
        }
    }

    /// Only events of `kind` on `table`.
    pub fn kind(table: Table, kind: ChangeKind) -> Self {
        Self {
            table,
            kinds: vec![kind],
            column: None,
        }
    }

    /// Restrict to rows whose `column` equals a value.
    #[must_use]
    pub fn with_column(mut self, column: ColumnFilter) -> Self {
        self.column = Some(column);
        self
    }

    /// Table the filter applies to.
    pub const fn watched_table(&self) -> Table {
        self.table
    }

    /// Event kinds accepted; all three unless narrowed.
    pub fn kinds(&self) -> &[ChangeKind] {
        &self.kinds
    }

    /// Row filter, if any.
    pub fn column(&self) -> Option<&ColumnFilter> {
        self.column.as_ref()
    }

    /// Whether `event` passes the filter. Column predicates look at the new
    /// row for inserts and updates and at the old row for deletes.
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        if event.table != self.table || !self.kinds.contains(&event.kind) {
            return false;
        }
        match &self.column {
            None => true,
            Some(column) => column.matches_record(event.record()),
        }
    }
}

/// Row change pushed by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
    /// Row after the change; absent for deletes.
    pub new: Option<Value>,
    /// Row before the change when the backend reports it.
    pub old: Option<Value>,
    pub commit_timestamp: Option<DateTime<Utc>>,
}

impl ChangeEvent {
    /// The row the event is about: the new row, or the old one for deletes.
    pub fn record(&self) -> Option<&Value> {
        match self.kind {
            ChangeKind::Delete => self.old.as_ref(),
            ChangeKind::Insert | ChangeKind::Update => self.new.as_ref().or(self.old.as_ref()),
        }
    }

    /// String value of `column` in [`ChangeEvent::record`].
    pub fn text(&self, column: &str) -> Option<&str> {
        self.record()
            .and_then(|row| row.get(column))
            .and_then(Value::as_str)
    }
}

type Release = Box<dyn FnOnce() + Send + Sync>;

/// Live subscription handle.
///
/// Events arrive in backend order. The release hook runs exactly once, on
/// [`ChangeSubscription::unsubscribe`] or on drop.
pub struct ChangeSubscription {
    events: mpsc::UnboundedReceiver<ChangeEvent>,
    release: Option<Release>,
}

impl ChangeSubscription {
    /// Create a handle plus the sender that feeds it. `release` runs when the
    /// handle is unsubscribed or dropped.
    pub fn channel(
        release: impl FnOnce() + Send + Sync + 'static,
    ) -> (mpsc::UnboundedSender<ChangeEvent>, Self) {
        let (tx, events) = mpsc::unbounded_channel();
        (
            tx,
            Self {
                events,
                release: Some(Box::new(release)),
            },
        )
    }

    /// Wait for the next event. `None` once the upstream has closed.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }

    /// Release the subscription explicitly.
    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        self.events.close();
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for ChangeSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeSubscription")
            .field("released", &self.release.is_none())
            .finish_non_exhaustive()
    }
}

impl Drop for ChangeSubscription {
    fn drop(&mut self) {
        self.release_now();
    }
}
