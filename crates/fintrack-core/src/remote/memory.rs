//! In-process backend with owner-scoped tables and an echoing change feed.
//!
//! Every successful write is echoed to matching subscribers exactly like the
//! hosted change feed would, which makes it suitable for tests and for the
//! CLI's demo mode. Faults can be injected per operation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;

use super::{channel_topic, ChangeFeed, Mutation, RemoteTable};
use crate::error::{Error, Result};
use crate::models::{RecordId, UserId};
use crate::resource::{Draft, Resource};
use crate::sync::{FeedMessage, FeedSender, RawChange, SubscriptionHandle, SubscriptionStatus};

#[derive(Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    tables: HashMap<&'static str, Vec<Value>>,
    subscribers: Vec<Subscriber>,
    channels_opened: usize,
    faults: Faults,
}

struct Subscriber {
    table: &'static str,
    owner: UserId,
    sender: FeedSender,
}

#[derive(Default)]
struct Faults {
    failing_queries: usize,
    reject_subscriptions: bool,
    drop_subscriptions: bool,
    write_rejection: Option<String>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a row without notifying subscribers (pre-existing data).
    pub fn seed<R: Resource>(&self, record: &R) -> Result<()> {
        let row = serde_json::to_value(record)?;
        self.state().tables.entry(R::TABLE).or_default().push(row);
        Ok(())
    }

    /// Deliver a raw change to every live subscriber of (table, owner).
    ///
    /// Stands in for writes made by another session, or for feed payloads the
    /// store has to cope with.
    pub fn emit(&self, table: &'static str, owner: &UserId, change: &RawChange) -> usize {
        self.state().broadcast(table, owner, change)
    }

    /// Subscription channels still open.
    pub fn open_channels(&self) -> usize {
        let mut state = self.state();
        state.prune_closed();
        state.subscribers.len()
    }

    /// Channels opened over the backend's lifetime.
    pub fn channels_opened(&self) -> usize {
        self.state().channels_opened
    }

    /// Make the next `count` queries fail with a transport error.
    pub fn fail_next_queries(&self, count: usize) {
        self.state().faults.failing_queries = count;
    }

    /// Refuse to open change channels.
    pub fn reject_subscriptions(&self, reject: bool) {
        self.state().faults.reject_subscriptions = reject;
    }

    /// Open channels, then report them as failed and close them.
    pub fn drop_subscriptions(&self, drop: bool) {
        self.state().faults.drop_subscriptions = drop;
    }

    /// Reject every write with an authorization error.
    pub fn reject_writes(&self, reason: Option<&str>) {
        self.state().faults.write_rejection = reason.map(str::to_string);
    }

    fn write_row<R: Resource>(&self, owner: &UserId, mutation: Mutation<R::Draft>) -> Result<R> {
        let mut state = self.state();
        if let Some(reason) = state.faults.write_rejection.clone() {
            return Err(Error::Unauthorized(reason));
        }

        match mutation {
            Mutation::Create(draft) => {
                draft.validate()?;
                let record = R::from_draft(RecordId::generate(), owner.clone(), chrono::Utc::now(), draft);
                let row = serde_json::to_value(&record)?;
                state.tables.entry(R::TABLE).or_default().push(row.clone());
                state.broadcast(R::TABLE, owner, &RawChange::insert(row));
                Ok(record)
            }
            Mutation::Update(id, draft) => {
                draft.validate()?;
                let rows = state.tables.entry(R::TABLE).or_default();
                let position = find_owned(rows, &id, owner)
                    .ok_or_else(|| Error::NotFound(format!("{} {id}", R::TABLE)))?;
                let existing: R = serde_json::from_value(rows[position].clone())?;
                let record = R::from_draft(id, owner.clone(), existing.created_at(), draft);
                let row = serde_json::to_value(&record)?;
                rows[position] = row.clone();
                state.broadcast(R::TABLE, owner, &RawChange::update(row));
                Ok(record)
            }
            Mutation::Delete(id) => {
                let rows = state.tables.entry(R::TABLE).or_default();
                let position = find_owned(rows, &id, owner)
                    .ok_or_else(|| Error::NotFound(format!("{} {id}", R::TABLE)))?;
                let removed: R = serde_json::from_value(rows.remove(position))?;
                state.broadcast(R::TABLE, owner, &RawChange::delete(&id));
                Ok(removed)
            }
        }
    }
}

impl MemoryState {
    fn prune_closed(&mut self) {
        self.subscribers.retain(|subscriber| !subscriber.sender.is_closed());
    }

    fn broadcast(&mut self, table: &'static str, owner: &UserId, change: &RawChange) -> usize {
        self.prune_closed();
        self.subscribers
            .iter()
            .filter(|subscriber| subscriber.table == table && subscriber.owner == *owner)
            .filter(|subscriber| {
                subscriber
                    .sender
                    .send(FeedMessage::Change(change.clone()))
                    .is_ok()
            })
            .count()
    }
}

fn find_owned(rows: &[Value], id: &RecordId, owner: &UserId) -> Option<usize> {
    rows.iter().position(|row| {
        row.get("id").and_then(RecordId::from_json).as_ref() == Some(id)
            && row.get("user_id").and_then(Value::as_str) == Some(owner.as_str())
    })
}

impl RemoteTable for MemoryBackend {
    async fn query<R: Resource>(&self, owner: &UserId) -> Result<Vec<R>> {
        let rows = {
            let mut state = self.state();
            if state.faults.failing_queries > 0 {
                state.faults.failing_queries -= 1;
                return Err(Error::WebSocket(format!(
                    "simulated transport failure querying {}",
                    R::TABLE
                )));
            }
            state.tables.get(R::TABLE).cloned().unwrap_or_default()
        };

        let mut records = rows
            .into_iter()
            .filter(|row| row.get("user_id").and_then(Value::as_str) == Some(owner.as_str()))
            .map(serde_json::from_value::<R>)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        records.sort_by(R::display_order);
        Ok(records)
    }

    async fn write<R: Resource>(&self, owner: &UserId, mutation: Mutation<R::Draft>) -> Result<R> {
        self.write_row(owner, mutation)
    }
}

impl ChangeFeed for MemoryBackend {
    async fn open(&self, table: &'static str, owner: &UserId) -> Result<SubscriptionHandle> {
        let mut state = self.state();
        if state.faults.reject_subscriptions {
            return Err(Error::WebSocket(format!(
                "simulated refusal opening {table} channel"
            )));
        }

        let (handle, sender) = SubscriptionHandle::channel(channel_topic(table, owner));
        state.channels_opened += 1;

        if state.faults.drop_subscriptions {
            let _ = sender.send(FeedMessage::Status(SubscriptionStatus::Failed(
                "simulated channel error".to_string(),
            )));
            return Ok(handle);
        }

        let _ = sender.send(FeedMessage::Status(SubscriptionStatus::Subscribed));
        state.subscribers.push(Subscriber {
            table,
            owner: owner.clone(),
            sender,
        });
        Ok(handle)
    }
}
