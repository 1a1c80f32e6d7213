//! Phoenix channel frames spoken by Supabase Realtime.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::sync::{FeedMessage, RawChange, SubscriptionStatus};

pub const PHOENIX_TOPIC: &str = "phoenix";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub join_ref: Option<String>,
}

impl Frame {
    /// Join a channel listening to every change on `table` matching `filter`.
    pub fn join(topic: &str, table: &str, filter: &str, access_token: &str, reference: &str) -> Self {
        Self {
            topic: topic.to_string(),
            event: "phx_join".to_string(),
            payload: json!({
                "config": {
                    "broadcast": { "ack": false, "self": false },
                    "presence": { "key": "" },
                    "postgres_changes": [{
                        "event": "*",
                        "schema": "public",
                        "table": table,
                        "filter": filter,
                    }],
                    "private": false,
                },
                "access_token": access_token,
            }),
            reference: Some(reference.to_string()),
            join_ref: Some(reference.to_string()),
        }
    }

    pub fn leave(topic: &str, reference: &str, join_ref: &str) -> Self {
        Self {
            topic: topic.to_string(),
            event: "phx_leave".to_string(),
            payload: json!({}),
            reference: Some(reference.to_string()),
            join_ref: Some(join_ref.to_string()),
        }
    }

    pub fn heartbeat(reference: &str) -> Self {
        Self {
            topic: PHOENIX_TOPIC.to_string(),
            event: "heartbeat".to_string(),
            payload: json!({}),
            reference: Some(reference.to_string()),
            join_ref: None,
        }
    }

    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Monotonic message references for one socket.
#[derive(Debug, Default)]
pub struct RefCounter(u64);

impl RefCounter {
    pub fn next(&mut self) -> String {
        self.0 += 1;
        self.0.to_string()
    }
}

/// Translate an incoming frame on `topic` into something the store understands.
///
/// Frames for other topics, heartbeat replies and presence traffic yield `None`.
pub fn interpret(frame: Frame, topic: &str, join_ref: &str) -> Option<FeedMessage> {
    if frame.topic != topic {
        return None;
    }

    match frame.event.as_str() {
        "phx_reply" if frame.reference.as_deref() == Some(join_ref) => {
            let status = frame.payload.get("status").and_then(Value::as_str);
            if status == Some("ok") {
                Some(FeedMessage::Status(SubscriptionStatus::Subscribed))
            } else {
                Some(FeedMessage::Status(SubscriptionStatus::Failed(
                    reply_reason(&frame.payload),
                )))
            }
        }
        "postgres_changes" => Some(FeedMessage::Change(change_data(frame.payload, topic))),
        "system" => {
            let status = frame.payload.get("status").and_then(Value::as_str);
            if status == Some("error") {
                Some(FeedMessage::Status(SubscriptionStatus::Failed(
                    reply_reason(&frame.payload),
                )))
            } else {
                None
            }
        }
        "phx_error" => Some(FeedMessage::Status(SubscriptionStatus::Failed(
            "channel error".to_string(),
        ))),
        "phx_close" => Some(FeedMessage::Status(SubscriptionStatus::Closed)),
        _ => None,
    }
}

fn change_data(mut payload: Value, topic: &str) -> RawChange {
    let data = payload
        .get_mut("data")
        .map_or(Value::Null, Value::take);
    match serde_json::from_value::<RawChange>(data.clone()) {
        Ok(raw) => raw,
        Err(error) => {
            tracing::warn!("Undecodable change payload on {}: {}", topic, error);
            RawChange::undecodable(data)
        }
    }
}

fn reply_reason(payload: &Value) -> String {
    payload
        .pointer("/response/reason")
        .or_else(|| payload.get("message"))
        .and_then(Value::as_str)
        .map_or_else(|| "subscription rejected".to_string(), str::to_string)
}
