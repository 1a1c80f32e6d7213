//! Change-feed vocabulary shared by every backend and the collection store.
//!
//! A backend delivers [`FeedMessage`]s into the queue owned by a
//! [`SubscriptionHandle`]. Row changes arrive as loosely-typed [`RawChange`]s
//! and are decoded per resource into the closed [`ChangeEvent`] enum.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::models::RecordId;
use crate::resource::Resource;

/// One row-level change, typed for a resource.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent<R> {
    /// Full post-image of a new row
    Inserted(R),
    /// Full post-image of a changed row
    Updated(R),
    /// Identifier of a deleted row
    Removed(RecordId),
}

impl<R: Resource> ChangeEvent<R> {
    pub fn record_id(&self) -> &RecordId {
        match self {
            Self::Inserted(record) | Self::Updated(record) => record.id(),
            Self::Removed(id) => id,
        }
    }

    pub const fn label(&self) -> &'static str {
        match self {
            Self::Inserted(_) => "inserted",
            Self::Updated(_) => "updated",
            Self::Removed(_) => "removed",
        }
    }
}

/// A change payload that could not be turned into a `ChangeEvent`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed {table} change ({kind}): {reason}")]
pub struct MalformedEvent {
    pub table: &'static str,
    pub kind: String,
    pub reason: String,
}

/// Change kind given to payloads that could not be read as a [`RawChange`].
pub const UNDECODABLE_KIND: &str = "UNDECODABLE";

/// Row change as delivered on the wire (`postgres_changes` data).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawChange {
    #[serde(rename = "type", alias = "eventType")]
    pub kind: String,
    #[serde(default)]
    pub record: Option<Value>,
    #[serde(default)]
    pub old_record: Option<Value>,
}

impl RawChange {
    pub fn insert(record: Value) -> Self {
        Self {
            kind: "INSERT".to_string(),
            record: Some(record),
            old_record: None,
        }
    }

    pub fn update(record: Value) -> Self {
        Self {
            kind: "UPDATE".to_string(),
            record: Some(record),
            old_record: None,
        }
    }

    pub fn delete(id: &RecordId) -> Self {
        Self {
            kind: "DELETE".to_string(),
            record: None,
            old_record: Some(serde_json::json!({ "id": id })),
        }
    }

    /// Stand-in for a change payload that did not have the wire shape.
    ///
    /// Carries the original payload so the store drops it as malformed.
    pub fn undecodable(payload: Value) -> Self {
        Self {
            kind: UNDECODABLE_KIND.to_string(),
            record: Some(payload),
            old_record: None,
        }
    }

    /// Decode into a typed event for `R`.
    pub fn decode<R: Resource>(self) -> Result<ChangeEvent<R>, MalformedEvent> {
        let malformed = |kind: &str, reason: String| MalformedEvent {
            table: R::TABLE,
            kind: kind.to_string(),
            reason,
        };

        match self.kind.to_ascii_uppercase().as_str() {
            "INSERT" => Self::decode_record::<R>(self.record)
                .map(ChangeEvent::Inserted)
                .map_err(|reason| malformed(&self.kind, reason)),
            "UPDATE" => Self::decode_record::<R>(self.record)
                .map(ChangeEvent::Updated)
                .map_err(|reason| malformed(&self.kind, reason)),
            "DELETE" => self
                .old_record
                .as_ref()
                .and_then(|old| old.get("id"))
                .and_then(RecordId::from_json)
                .map(ChangeEvent::Removed)
                .ok_or_else(|| malformed(&self.kind, "old record has no id".to_string())),
            other => Err(malformed(other, "unknown change kind".to_string())),
        }
    }

    fn decode_record<R: Resource>(record: Option<Value>) -> Result<R, String> {
        let record = record.ok_or_else(|| "missing record".to_string())?;
        if record.get("id").and_then(RecordId::from_json).is_none() {
            return Err("record has no id".to_string());
        }
        serde_json::from_value(record).map_err(|error| error.to_string())
    }
}

/// Lifecycle of one change subscription.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SubscriptionStatus {
    /// No subscription has been requested
    #[default]
    Idle,
    /// Channel opened, join not yet acknowledged
    Connecting,
    /// Live updates are flowing
    Subscribed,
    /// Channel could not be established or dropped
    Failed(String),
    /// Channel closed by teardown or by the remote
    Closed,
}

impl SubscriptionStatus {
    pub const fn is_live(&self) -> bool {
        matches!(self, Self::Connecting | Self::Subscribed)
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Connecting => f.write_str("connecting"),
            Self::Subscribed => f.write_str("subscribed"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
            Self::Closed => f.write_str("closed"),
        }
    }
}

/// What a backend pushes into a subscription queue.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessage {
    Status(SubscriptionStatus),
    Change(RawChange),
}

/// Sending side of a subscription, held by the backend.
pub type FeedSender = mpsc::UnboundedSender<FeedMessage>;

/// One open change channel.
///
/// Closing is idempotent and also happens on drop, so a handle can never
/// outlive its owner with the channel still open.
pub struct SubscriptionHandle {
    topic: String,
    messages: mpsc::UnboundedReceiver<FeedMessage>,
    shutdown: Option<oneshot::Sender<()>>,
    open: bool,
}

impl SubscriptionHandle {
    /// Create a handle plus the sender the backend feeds.
    pub fn channel(topic: impl Into<String>) -> (Self, FeedSender) {
        let (sender, messages) = mpsc::unbounded_channel();
        let handle = Self {
            topic: topic.into(),
            messages,
            shutdown: None,
            open: true,
        };
        (handle, sender)
    }

    /// Attach a signal fired once when the handle closes.
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: oneshot::Sender<()>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub const fn is_open(&self) -> bool {
        self.open
    }

    /// Wait for the next message. `None` once the channel is closed and drained.
    pub async fn recv(&mut self) -> Option<FeedMessage> {
        self.messages.recv().await
    }

    /// Take an already-queued message without waiting.
    pub fn try_recv(&mut self) -> Option<FeedMessage> {
        self.messages.try_recv().ok()
    }

    pub fn close(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        self.messages.close();
        tracing::debug!("Closed change channel {}", self.topic);
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("topic", &self.topic)
            .field("open", &self.open)
            .finish_non_exhaustive()
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, CategoryKind};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn category_row(id: &str) -> Value {
        json!({
            "id": id,
            "user_id": "user-1",
            "name": "Food",
            "color": "#10b981",
            "icon": null,
            "type": "expense",
            "created_at": "2024-01-10T00:00:00Z"
        })
    }

    #[test]
    fn decode_insert_and_update() {
        let inserted = RawChange::insert(category_row("c1")).decode::<Category>().unwrap();
        let ChangeEvent::Inserted(category) = inserted else {
            panic!("expected insert");
        };
        assert_eq!(category.kind, CategoryKind::Expense);

        let updated = RawChange::update(category_row("c1")).decode::<Category>().unwrap();
        assert_eq!(updated.label(), "updated");
        assert_eq!(updated.record_id().as_str(), "c1");
    }

    #[test]
    fn decode_delete_reads_old_record_id() {
        let raw: RawChange =
            serde_json::from_value(json!({"type": "DELETE", "old_record": {"id": 99}})).unwrap();
        assert_eq!(
            raw.decode::<Category>().unwrap(),
            ChangeEvent::Removed(RecordId::from(99))
        );
    }

    #[test]
    fn decode_rejects_missing_ids_and_unknown_kinds() {
        let mut row = category_row("c1");
        row.as_object_mut().unwrap().remove("id");
        let error = RawChange::insert(row).decode::<Category>().unwrap_err();
        assert_eq!(error.reason, "record has no id");

        let delete = RawChange {
            kind: "DELETE".to_string(),
            record: None,
            old_record: Some(json!({})),
        };
        assert!(delete.decode::<Category>().is_err());

        let truncate = RawChange {
            kind: "TRUNCATE".to_string(),
            record: None,
            old_record: None,
        };
        let error = truncate.decode::<Category>().unwrap_err();
        assert_eq!(error.kind, "TRUNCATE");
    }

    #[test]
    fn decode_rejects_undecodable_record() {
        let error = RawChange::insert(json!({"id": "c1", "name": 3}))
            .decode::<Category>()
            .unwrap_err();
        assert_eq!(error.table, "categories");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn handle_close_is_idempotent_and_fires_shutdown_once() {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let (handle, sender) = SubscriptionHandle::channel("realtime:test");
        let mut handle = handle.with_shutdown(shutdown_tx);

        sender
            .send(FeedMessage::Status(SubscriptionStatus::Subscribed))
            .unwrap();
        assert_eq!(
            handle.try_recv(),
            Some(FeedMessage::Status(SubscriptionStatus::Subscribed))
        );

        handle.close();
        handle.close();
        assert!(!handle.is_open());
        assert!(sender.is_closed());
        assert_eq!(shutdown_rx.try_recv(), Ok(()));
    }

    #[test]
    fn dropping_handle_closes_channel() {
        let (handle, sender) = SubscriptionHandle::channel("realtime:test");
        drop(handle);
        assert!(sender.is_closed());
    }
}
