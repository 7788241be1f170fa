//! Realtime row-change subscriptions.
//!
//! A [`ChangeFeed`] pushes inserted/updated/deleted rows for one table as
//! they happen. Each subscription is scoped: dropping its [`FeedGuard`]
//! releases the underlying channel.

#[cfg(any(test, feature = "testing"))]
mod memory;
mod supabase;

use std::fmt;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::auth::AuthSession;
use crate::{Error, Result};

#[cfg(any(test, feature = "testing"))]
pub use memory::MemoryChangeFeed;
pub use supabase::SupabaseRealtime;

const SUBSCRIPTION_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeEvent {
    Insert,
    Update,
    Delete,
    /// Every event kind.
    All,
}

impl ChangeEvent {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::All => "*",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "INSERT" => Some(Self::Insert),
            "UPDATE" => Some(Self::Update),
            "DELETE" => Some(Self::Delete),
            "*" => Some(Self::All),
            _ => None,
        }
    }

    #[must_use]
    pub fn includes(self, other: Self) -> bool {
        self == Self::All || self == other
    }
}

impl fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which row changes a subscription receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeFilter {
    pub schema: String,
    pub table: String,
    pub event: ChangeEvent,
    /// PostgREST-style row filter such as `user_id=eq.42`.
    pub filter: Option<String>,
}

impl ChangeFilter {
    /// Inserts into a table in the `public` schema.
    #[must_use]
    pub fn inserts(table: impl Into<String>) -> Self {
        Self {
            schema: "public".to_string(),
            table: table.into(),
            event: ChangeEvent::Insert,
            filter: None,
        }
    }

    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Whether a pushed row passes the `column=eq.value` filter.
    #[must_use]
    pub fn matches(&self, change: &RowChange) -> bool {
        if change.table != self.table || !self.event.includes(change.event) {
            return false;
        }
        let Some(filter) = &self.filter else {
            return true;
        };
        let Some((column, expected)) = filter
            .split_once('=')
            .and_then(|(column, rest)| rest.strip_prefix("eq.").map(|value| (column, value)))
        else {
            return true;
        };
        match change.record.get(column) {
            Some(Value::String(actual)) => actual == expected,
            Some(Value::Null) | None => false,
            Some(actual) => actual.to_string() == expected,
        }
    }
}

/// One row change pushed by the feed.
#[derive(Debug, Clone, PartialEq)]
pub struct RowChange {
    pub event: ChangeEvent,
    pub schema: String,
    pub table: String,
    /// The new row; empty object for deletes.
    pub record: Value,
    /// The previous row when the table replicates it.
    pub old_record: Option<Value>,
}

impl RowChange {
    #[must_use]
    pub fn insert(table: impl Into<String>, record: Value) -> Self {
        Self {
            event: ChangeEvent::Insert,
            schema: "public".to_string(),
            table: table.into(),
            record,
            old_record: None,
        }
    }

    /// Deserialize the new row into a model.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.record.clone())?)
    }
}

/// Releases a realtime subscription when dropped.
pub struct FeedGuard {
    releases: Vec<Box<dyn FnOnce() + Send>>,
}

impl FeedGuard {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            releases: vec![Box::new(release)],
        }
    }

    /// Run `release` too when this guard goes away.
    #[must_use]
    pub fn also(mut self, release: impl FnOnce() + Send + 'static) -> Self {
        self.releases.push(Box::new(release));
        self
    }

    /// Release now instead of at drop.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for FeedGuard {
    fn drop(&mut self) {
        for release in self.releases.drain(..).rev() {
            release();
        }
    }
}

impl fmt::Debug for FeedGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedGuard")
            .field("releases", &self.releases.len())
            .finish()
    }
}

/// Stream of row changes plus the guard that keeps it open.
#[derive(Debug)]
pub struct Subscription {
    receiver: mpsc::Receiver<RowChange>,
    guard: FeedGuard,
}

impl Subscription {
    pub const fn new(receiver: mpsc::Receiver<RowChange>, guard: FeedGuard) -> Self {
        Self { receiver, guard }
    }

    /// Next change, or `None` once the feed closed.
    pub async fn next(&mut self) -> Option<RowChange> {
        self.receiver.recv().await
    }

    pub fn into_parts(self) -> (mpsc::Receiver<RowChange>, FeedGuard) {
        (self.receiver, self.guard)
    }
}

fn subscription_channel() -> (mpsc::Sender<RowChange>, mpsc::Receiver<RowChange>) {
    mpsc::channel(SUBSCRIPTION_CAPACITY)
}

fn realtime_error(error: impl fmt::Display) -> Error {
    Error::Realtime(error.to_string())
}

#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Start receiving changes that match `filter`, authorized as the
    /// session user.
    async fn subscribe(&self, session: &AuthSession, filter: ChangeFilter) -> Result<Subscription>;
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn filter_matches_table_event_and_column() {
        let filter = ChangeFilter::inserts("notifications").with_filter("user_id=eq.u1");

        assert!(filter.matches(&RowChange::insert(
            "notifications",
            json!({ "id": "n1", "user_id": "u1" })
        )));
        assert!(!filter.matches(&RowChange::insert(
            "notifications",
            json!({ "id": "n2", "user_id": "u2" })
        )));
        assert!(!filter.matches(&RowChange::insert(
            "deals",
            json!({ "user_id": "u1" })
        )));

        let mut update = RowChange::insert("notifications", json!({ "user_id": "u1" }));
        update.event = ChangeEvent::Update;
        assert!(!filter.matches(&update));
    }

    #[test]
    fn filter_compares_numbers_as_text() {
        let filter = ChangeFilter::inserts("counters").with_filter("owner=eq.42");
        assert!(filter.matches(&RowChange::insert("counters", json!({ "owner": 42 }))));
        assert!(!filter.matches(&RowChange::insert("counters", json!({ "owner": null }))));
    }

    #[test]
    fn event_parsing() {
        assert_eq!(ChangeEvent::parse("insert"), Some(ChangeEvent::Insert));
        assert_eq!(ChangeEvent::parse("*"), Some(ChangeEvent::All));
        assert_eq!(ChangeEvent::parse("TRUNCATE"), None);
        assert!(ChangeEvent::All.includes(ChangeEvent::Delete));
    }

    #[test]
    fn guard_runs_every_release_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let first = Arc::clone(&count);
        let second = Arc::clone(&count);

        let guard = FeedGuard::new(move || {
            first.fetch_add(1, Ordering::SeqCst);
        })
        .also(move || {
            second.fetch_add(10, Ordering::SeqCst);
        });
        assert_eq!(count.load(Ordering::SeqCst), 0);

        guard.unsubscribe();
        assert_eq!(count.load(Ordering::SeqCst), 11);
    }
}
