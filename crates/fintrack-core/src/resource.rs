//! Resource definitions: what a table looks like to the collection store.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::models::{RecordId, UserId};

/// Direction of the remote `order` clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Ordering key used for the initial query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub field: &'static str,
    pub direction: SortDirection,
}

impl OrderBy {
    pub const fn descending(field: &'static str) -> Self {
        Self {
            field,
            direction: SortDirection::Descending,
        }
    }

    /// PostgREST `order=` value, e.g. `date.desc`.
    pub fn to_query_value(self) -> String {
        let direction = match self.direction {
            SortDirection::Ascending => "asc",
            SortDirection::Descending => "desc",
        };
        format!("{}.{direction}", self.field)
    }
}

/// Writable payload of a resource.
pub trait Draft: Serialize + Clone + fmt::Debug + Send + Sync + 'static {
    /// Reject payloads the remote would refuse anyway.
    fn validate(&self) -> crate::Result<()>;
}

/// One remote table mirrored by a `RemoteCollectionStore`.
pub trait Resource:
    Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Remote table name.
    const TABLE: &'static str;
    /// Order of the initial snapshot query.
    const ORDER: OrderBy;

    type Draft: Draft;
    /// Presentation-facing aggregates over a snapshot.
    type Summary: Clone + fmt::Debug + PartialEq + Default;

    fn id(&self) -> &RecordId;
    fn owner(&self) -> &UserId;
    fn created_at(&self) -> DateTime<Utc>;

    /// Total display order of the snapshot. Must agree with `ORDER` and break
    /// ties deterministically so equal keys never swap places.
    fn display_order(a: &Self, b: &Self) -> Ordering;

    /// Pure aggregate over the current snapshot.
    fn summarize(records: &[Self]) -> Self::Summary;

    /// Materialize a row the way the remote would after an insert or update.
    fn from_draft(id: RecordId, owner: UserId, created_at: DateTime<Utc>, draft: Self::Draft)
        -> Self;
}

/// Newest-first tie breaker shared by every resource.
pub fn recency_then_id<R: Resource>(a: &R, b: &R) -> Ordering {
    b.created_at()
        .cmp(&a.created_at())
        .then_with(|| b.id().cmp(a.id()))
}
