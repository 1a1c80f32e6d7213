//! Live, owner-scoped mirror of one remote table.
//!
//! A [`RemoteCollectionStore`] loads an initial snapshot once, opens at most
//! one change channel, and applies every delivered change to its snapshot.
//! Writes go to the backend only; their effect shows up when the change feed
//! echoes them back, so the feed is the single source of truth.

use std::collections::HashSet;

use thiserror::Error;

use crate::models::{RecordId, UserId};
use crate::remote::{ChangeFeed, Mutation, RemoteTable};
use crate::resource::Resource;
use crate::sync::{
    ChangeEvent, FeedMessage, MalformedEvent, RawChange, SubscriptionHandle, SubscriptionStatus,
};

/// Why a write was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationFailure {
    Validation,
    Unauthorized,
    NotFound,
    Transport,
}

/// Failures surfaced at the store boundary. None of them is fatal to the view.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Initial snapshot could not be loaded
    #[error("Could not load {table}: {message}")]
    Load { table: &'static str, message: String },

    /// Change feed could not be established or dropped
    #[error("Live updates for {table} are unavailable: {message}")]
    Subscription { table: &'static str, message: String },

    /// Write rejected; local state is untouched
    #[error("Could not {action} {table}: {message}")]
    Mutation {
        table: &'static str,
        action: &'static str,
        failure: MutationFailure,
        message: String,
    },

    /// Change payload dropped
    #[error(transparent)]
    MalformedEvent(#[from] MalformedEvent),
}

impl StoreError {
    fn mutation(table: &'static str, action: &'static str, error: &crate::Error) -> Self {
        let failure = match error {
            crate::Error::Validation(_) => MutationFailure::Validation,
            crate::Error::Unauthorized(_) => MutationFailure::Unauthorized,
            crate::Error::NotFound(_) => MutationFailure::NotFound,
            _ => MutationFailure::Transport,
        };
        Self::Mutation {
            table,
            action,
            failure,
            message: error.to_string(),
        }
    }
}

/// Outcome of processing one feed message.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreUpdate<R> {
    /// The event changed the snapshot
    Changed(ChangeEvent<R>),
    /// The event was already reflected (redelivery, delete of an absent row)
    Unchanged(ChangeEvent<R>),
    /// Subscription lifecycle moved
    Status(SubscriptionStatus),
    /// Payload could not be decoded and was dropped
    Dropped(MalformedEvent),
}

/// Apply one change to an ordered snapshot. Returns whether anything changed.
///
/// Inserts and updates are upserts: an insert for a known id replaces it, an
/// update for an unknown id inserts it. The record lands at its position in
/// `R::display_order`. Removing an unknown id is a no-op.
pub fn apply_change<R: Resource>(snapshot: &mut Vec<R>, event: ChangeEvent<R>) -> bool {
    match event {
        ChangeEvent::Inserted(record) | ChangeEvent::Updated(record) => {
            let existing = snapshot.iter().position(|row| row.id() == record.id());
            if let Some(index) = existing {
                if snapshot[index] == record {
                    return false;
                }
                snapshot.remove(index);
            }
            let at = snapshot.partition_point(|row| R::display_order(row, &record).is_lt());
            snapshot.insert(at, record);
            true
        }
        ChangeEvent::Removed(id) => {
            let before = snapshot.len();
            snapshot.retain(|row| *row.id() != id);
            snapshot.len() != before
        }
    }
}

/// Bring a freshly queried snapshot into display order without duplicate ids.
fn normalize_snapshot<R: Resource>(mut records: Vec<R>) -> Vec<R> {
    let mut seen = HashSet::new();
    records.retain(|record| seen.insert(record.id().clone()));
    records.sort_by(R::display_order);
    records
}

pub struct RemoteCollectionStore<R: Resource, B> {
    backend: B,
    owner: UserId,
    snapshot: Vec<R>,
    initialized: bool,
    loading: bool,
    subscription: Option<SubscriptionHandle>,
    status: SubscriptionStatus,
    last_error: Option<StoreError>,
    revision: u64,
}

impl<R: Resource, B: RemoteTable + ChangeFeed> RemoteCollectionStore<R, B> {
    /// Create an empty store for `owner`. Nothing is fetched until `initialize`.
    pub fn new(backend: B, owner: UserId) -> Self {
        Self {
            backend,
            owner,
            snapshot: Vec::new(),
            initialized: false,
            loading: false,
            subscription: None,
            status: SubscriptionStatus::Idle,
            last_error: None,
            revision: 0,
        }
    }

    pub const fn owner(&self) -> &UserId {
        &self.owner
    }

    pub fn snapshot(&self) -> &[R] {
        &self.snapshot
    }

    pub fn get(&self, id: &RecordId) -> Option<&R> {
        self.snapshot.iter().find(|record| record.id() == id)
    }

    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub const fn is_loading(&self) -> bool {
        self.loading
    }

    pub const fn subscription_status(&self) -> &SubscriptionStatus {
        &self.status
    }

    pub const fn has_open_subscription(&self) -> bool {
        self.subscription.is_some()
    }

    /// Bumped on every snapshot change.
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Most recent load or subscription failure, for a banner.
    pub const fn last_error(&self) -> Option<&StoreError> {
        self.last_error.as_ref()
    }

    pub fn take_error(&mut self) -> Option<StoreError> {
        self.last_error.take()
    }

    /// Load the owner's rows once.
    ///
    /// Later calls return the current snapshot without querying again. A
    /// failed load leaves the previous (initially empty) snapshot in place.
    pub async fn initialize(&mut self) -> Result<&[R], StoreError> {
        if self.initialized {
            tracing::debug!("{} store already initialized for {}", R::TABLE, self.owner);
            return Ok(&self.snapshot);
        }
        self.initialized = true;
        self.load().await?;
        Ok(&self.snapshot)
    }

    /// Query again regardless of the one-shot guard, replacing the snapshot.
    pub async fn reload(&mut self) -> Result<&[R], StoreError> {
        self.initialized = true;
        self.load().await?;
        Ok(&self.snapshot)
    }

    async fn load(&mut self) -> Result<(), StoreError> {
        self.loading = true;
        let result = self.backend.query::<R>(&self.owner).await;
        self.loading = false;

        match result {
            Ok(records) => {
                self.snapshot = normalize_snapshot(records);
                self.revision += 1;
                tracing::info!(
                    "Loaded {} {} for {}",
                    self.snapshot.len(),
                    R::TABLE,
                    self.owner
                );
                Ok(())
            }
            Err(error) => {
                tracing::error!("Error loading {}: {}", R::TABLE, error);
                let error = StoreError::Load {
                    table: R::TABLE,
                    message: error.to_string(),
                };
                self.last_error = Some(error.clone());
                Err(error)
            }
        }
    }

    /// Open the change channel unless one is already open.
    ///
    /// Never fails: a channel that cannot be opened is logged, recorded as the
    /// last error, and leaves the store serving its current snapshot.
    pub async fn subscribe(&mut self) -> SubscriptionStatus {
        if self.subscription.is_some() {
            tracing::debug!("{} channel already open for {}", R::TABLE, self.owner);
            return self.status.clone();
        }

        match self.backend.open(R::TABLE, &self.owner).await {
            Ok(handle) => {
                tracing::info!("Opened change channel {}", handle.topic());
                self.subscription = Some(handle);
                self.status = SubscriptionStatus::Connecting;
                self.drain_pending();
            }
            Err(error) => self.subscription_failed(error.to_string()),
        }
        self.status.clone()
    }

    /// Apply one typed change. Returns whether the snapshot changed.
    pub fn apply_event(&mut self, event: ChangeEvent<R>) -> bool {
        tracing::debug!("Applying {} {} {}", event.label(), R::TABLE, event.record_id());
        let changed = apply_change(&mut self.snapshot, event);
        if changed {
            self.revision += 1;
        }
        changed
    }

    /// Decode and apply a wire payload; malformed payloads are logged and dropped.
    pub fn apply_raw(&mut self, raw: RawChange) -> StoreUpdate<R> {
        match raw.decode::<R>() {
            Ok(event) => {
                if self.apply_event(event.clone()) {
                    StoreUpdate::Changed(event)
                } else {
                    StoreUpdate::Unchanged(event)
                }
            }
            Err(malformed) => {
                tracing::warn!("Dropping change: {}", malformed);
                StoreUpdate::Dropped(malformed)
            }
        }
    }

    /// Wait for and process the next feed message.
    ///
    /// Returns `None` when no channel is open or the channel has ended.
    pub async fn next_update(&mut self) -> Option<StoreUpdate<R>> {
        let message = self.subscription.as_mut()?.recv().await;
        if let Some(message) = message {
            Some(self.handle_message(message))
        } else {
            self.release_subscription(SubscriptionStatus::Closed);
            None
        }
    }

    /// Process every message already queued, without waiting.
    pub fn drain_pending(&mut self) -> Vec<StoreUpdate<R>> {
        let mut updates = Vec::new();
        while let Some(message) = self.subscription.as_mut().and_then(SubscriptionHandle::try_recv) {
            updates.push(self.handle_message(message));
        }
        updates
    }

    fn handle_message(&mut self, message: FeedMessage) -> StoreUpdate<R> {
        match message {
            FeedMessage::Change(raw) => self.apply_raw(raw),
            FeedMessage::Status(status) => {
                match &status {
                    SubscriptionStatus::Subscribed => {
                        tracing::info!("Subscribed to {} changes for {}", R::TABLE, self.owner);
                        self.status = status.clone();
                    }
                    SubscriptionStatus::Failed(reason) => {
                        self.subscription_failed(reason.clone());
                    }
                    SubscriptionStatus::Closed => {
                        self.release_subscription(SubscriptionStatus::Closed);
                    }
                    SubscriptionStatus::Connecting | SubscriptionStatus::Idle => {
                        self.status = status.clone();
                    }
                }
                StoreUpdate::Status(status)
            }
        }
    }

    fn subscription_failed(&mut self, reason: String) {
        tracing::warn!("Realtime subscription error on {}: {}", R::TABLE, reason);
        self.last_error = Some(StoreError::Subscription {
            table: R::TABLE,
            message: reason.clone(),
        });
        self.release_subscription(SubscriptionStatus::Failed(reason));
    }

    fn release_subscription(&mut self, status: SubscriptionStatus) {
        if let Some(mut handle) = self.subscription.take() {
            handle.close();
        }
        self.status = status;
    }

    /// Close the change channel. Safe to call any number of times.
    pub fn teardown(&mut self) {
        if let Some(mut handle) = self.subscription.take() {
            handle.close();
            self.status = SubscriptionStatus::Closed;
            tracing::info!("Tore down {} subscription for {}", R::TABLE, self.owner);
        }
    }

    /// Send a write to the backend. The snapshot is not touched; the change
    /// arrives through the feed.
    pub async fn mutate(&self, mutation: Mutation<R::Draft>) -> Result<R, StoreError> {
        let action = mutation.label();
        match self.backend.write::<R>(&self.owner, mutation).await {
            Ok(record) => {
                tracing::info!("{} {} {}", action, R::TABLE, record.id());
                Ok(record)
            }
            Err(error) => {
                tracing::warn!("Failed to {} {}: {}", action, R::TABLE, error);
                Err(StoreError::mutation(R::TABLE, action, &error))
            }
        }
    }
}
