//! Supabase Realtime change feed over a websocket.
//!
//! Each opened channel gets its own socket task. The task joins the channel,
//! keeps the socket alive with heartbeats, forwards frames to the handle's
//! queue, and leaves the channel when the handle closes.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;

use super::phoenix::{interpret, Frame, RefCounter};
use super::{channel_topic, owner_filter, ChangeFeed};
use crate::config::ProjectEndpoints;
use crate::error::{Error, Result};
use crate::models::UserId;
use crate::sync::{FeedMessage, FeedSender, SubscriptionHandle, SubscriptionStatus};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);

#[derive(Clone)]
pub struct SupabaseRealtimeClient {
    socket_url: String,
    access_token: String,
}

impl SupabaseRealtimeClient {
    pub fn new(endpoints: &ProjectEndpoints, access_token: impl Into<String>) -> Result<Self> {
        let access_token = access_token.into().trim().to_string();
        if access_token.is_empty() {
            return Err(Error::Unauthorized(
                "realtime requires a signed-in access token".to_string(),
            ));
        }
        Ok(Self {
            socket_url: endpoints.realtime_url(),
            access_token,
        })
    }
}

impl ChangeFeed for SupabaseRealtimeClient {
    async fn open(&self, table: &'static str, owner: &UserId) -> Result<SubscriptionHandle> {
        let topic = channel_topic(table, owner);
        let (handle, sender) = SubscriptionHandle::channel(topic.clone());
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let channel = ChannelTask {
            socket_url: self.socket_url.clone(),
            topic,
            join: JoinSpec {
                table,
                filter: owner_filter(owner),
                access_token: self.access_token.clone(),
            },
            sender,
        };
        tokio::spawn(channel.run(shutdown_rx));

        Ok(handle.with_shutdown(shutdown_tx))
    }
}

struct JoinSpec {
    table: &'static str,
    filter: String,
    access_token: String,
}

struct ChannelTask {
    socket_url: String,
    topic: String,
    join: JoinSpec,
    sender: FeedSender,
}

impl ChannelTask {
    async fn run(self, shutdown: oneshot::Receiver<()>) {
        let _ = self
            .sender
            .send(FeedMessage::Status(SubscriptionStatus::Connecting));

        let outcome = self.drive(shutdown).await;
        let final_status = match outcome {
            Ok(()) => SubscriptionStatus::Closed,
            Err(error) => {
                tracing::warn!("Realtime channel {} failed: {}", self.topic, error);
                SubscriptionStatus::Failed(error.to_string())
            }
        };
        let _ = self.sender.send(FeedMessage::Status(final_status));
    }

    async fn drive(&self, mut shutdown: oneshot::Receiver<()>) -> Result<()> {
        let (socket, _) = tokio_tungstenite::connect_async(self.socket_url.as_str()).await?;
        let (mut sink, mut stream) = socket.split();

        let mut refs = RefCounter::default();
        let join_ref = refs.next();
        let join = Frame::join(
            &self.topic,
            self.join.table,
            &self.join.filter,
            &self.join.access_token,
            &join_ref,
        );
        sink.send(Message::Text(join.encode()?)).await?;
        tracing::debug!("Joining realtime channel {}", self.topic);

        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    let leave = Frame::leave(&self.topic, &refs.next(), &join_ref);
                    let _ = sink.send(Message::Text(leave.encode()?)).await;
                    let _ = sink.close().await;
                    return Ok(());
                }
                () = self.sender.closed() => {
                    let _ = sink.close().await;
                    return Ok(());
                }
                _ = heartbeat.tick() => {
                    sink.send(Message::Text(Frame::heartbeat(&refs.next()).encode()?)).await?;
                }
                incoming = stream.next() => match incoming {
                    Some(Ok(Message::Text(text))) => self.forward(&text, &join_ref)?,
                    Some(Ok(Message::Close(_))) | None => {
                        return Err(Error::WebSocket("realtime socket closed by server".to_string()));
                    }
                    Some(Ok(_)) => {}
                    Some(Err(error)) => return Err(error.into()),
                },
            }
        }
    }

    fn forward(&self, text: &str, join_ref: &str) -> Result<()> {
        let frame = match serde_json::from_str::<Frame>(text) {
            Ok(frame) => frame,
            Err(error) => {
                tracing::warn!("Ignoring undecodable realtime frame: {}", error);
                return Ok(());
            }
        };
        let Some(message) = interpret(frame, &self.topic, join_ref) else {
            return Ok(());
        };

        let failure = match &message {
            FeedMessage::Status(SubscriptionStatus::Failed(reason)) => Some(reason.clone()),
            _ => None,
        };
        if self.sender.send(message).is_err() {
            return Ok(());
        }
        match failure {
            Some(reason) => Err(Error::WebSocket(reason)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Transaction;
    use crate::resource::Resource;

    #[test]
    fn client_requires_access_token() {
        let endpoints = ProjectEndpoints::new("https://demo.supabase.co", "anon").unwrap();
        assert!(SupabaseRealtimeClient::new(&endpoints, " ").is_err());
        let client = SupabaseRealtimeClient::new(&endpoints, "jwt").unwrap();
        assert!(client.socket_url.starts_with("wss://demo.supabase.co/realtime/v1/websocket"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn unreachable_socket_reports_failure_on_handle() {
        let endpoints = ProjectEndpoints::new("http://127.0.0.1:9", "anon").unwrap();
        let client = SupabaseRealtimeClient::new(&endpoints, "jwt").unwrap();
        let mut handle = client
            .open(Transaction::TABLE, &UserId::new("u1"))
            .await
            .unwrap();

        assert_eq!(
            handle.recv().await,
            Some(FeedMessage::Status(SubscriptionStatus::Connecting))
        );
        assert!(matches!(
            handle.recv().await,
            Some(FeedMessage::Status(SubscriptionStatus::Failed(_)))
        ));
    }
}
