//! Hosted backend: PostgREST tables plus Realtime change feed.

use super::{ChangeFeed, Mutation, RemoteTable, SupabaseRealtimeClient, SupabaseRestClient};
use crate::auth::AuthSession;
use crate::config::ProjectEndpoints;
use crate::error::Result;
use crate::models::UserId;
use crate::resource::Resource;
use crate::sync::SubscriptionHandle;

/// Table and change-feed access for one signed-in session.
#[derive(Clone)]
pub struct SupabaseBackend {
    rest: SupabaseRestClient,
    realtime: SupabaseRealtimeClient,
}

impl SupabaseBackend {
    pub fn new(endpoints: &ProjectEndpoints, session: &AuthSession) -> Result<Self> {
        Ok(Self {
            rest: SupabaseRestClient::new(endpoints, session.access_token.clone())?,
            realtime: SupabaseRealtimeClient::new(endpoints, session.access_token.clone())?,
        })
    }
}

impl RemoteTable for SupabaseBackend {
    async fn query<R: Resource>(&self, owner: &UserId) -> Result<Vec<R>> {
        self.rest.query(owner).await
    }

    async fn write<R: Resource>(&self, owner: &UserId, mutation: Mutation<R::Draft>) -> Result<R> {
        self.rest.write(owner, mutation).await
    }
}

impl ChangeFeed for SupabaseBackend {
    async fn open(&self, table: &'static str, owner: &UserId) -> Result<SubscriptionHandle> {
        self.realtime.open(table, owner).await
    }
}
