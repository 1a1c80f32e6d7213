//! External collaborators: table storage and the change feed.
//!
//! The store only talks to these traits. `SupabaseBackend` implements them
//! against a hosted project; `MemoryBackend` implements them in-process.

mod memory;
mod phoenix;
mod realtime;
mod rest;
mod supabase;

use std::future::Future;

use crate::error::Result;
use crate::models::{RecordId, UserId};
use crate::resource::Resource;
use crate::sync::SubscriptionHandle;

pub use memory::MemoryBackend;
pub use realtime::SupabaseRealtimeClient;
pub use rest::SupabaseRestClient;
pub use supabase::SupabaseBackend;

/// A write intent for one resource.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation<D> {
    Create(D),
    Update(RecordId, D),
    Delete(RecordId),
}

impl<D> Mutation<D> {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Create(_) => "create",
            Self::Update(..) => "update",
            Self::Delete(_) => "delete",
        }
    }
}

/// Owner-scoped table access.
pub trait RemoteTable: Send + Sync {
    /// All rows of `R::TABLE` owned by `owner`, in `R::ORDER`.
    fn query<R: Resource>(&self, owner: &UserId) -> impl Future<Output = Result<Vec<R>>> + Send;

    /// Apply a write and return the affected row as the remote stored it.
    fn write<R: Resource>(
        &self,
        owner: &UserId,
        mutation: Mutation<R::Draft>,
    ) -> impl Future<Output = Result<R>> + Send;
}

/// Owner-scoped row change notifications.
pub trait ChangeFeed: Send + Sync {
    /// Open a channel for `table` filtered to rows owned by `owner`.
    ///
    /// Establishment continues asynchronously; its outcome arrives as a
    /// status message on the returned handle.
    fn open(
        &self,
        table: &'static str,
        owner: &UserId,
    ) -> impl Future<Output = Result<SubscriptionHandle>> + Send;
}

/// Channel topic for one (table, owner) pair.
pub fn channel_topic(table: &str, owner: &UserId) -> String {
    format!("realtime:{table}-realtime-{owner}")
}

/// Row filter in PostgREST / Realtime syntax.
pub fn owner_filter(owner: &UserId) -> String {
    format!("user_id=eq.{owner}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_and_filter_are_owner_scoped() {
        let owner = UserId::new("u-1");
        assert_eq!(
            channel_topic("budgets", &owner),
            "realtime:budgets-realtime-u-1"
        );
        assert_eq!(owner_filter(&owner), "user_id=eq.u-1");
    }

    #[test]
    fn mutation_labels() {
        assert_eq!(Mutation::Create(()).label(), "create");
        assert_eq!(Mutation::<()>::Delete(RecordId::from(1)).label(), "delete");
    }
}
