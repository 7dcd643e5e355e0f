//! Shapes exchanged with the durable store and the realtime channel.

use serde::{Deserialize, Serialize};

use super::Timestamp;

/// A message row as returned by the durable read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StoredMessageRecord {
    pub id: String,
    pub room_id: String,
    #[serde(default)]
    pub sender_user_id: Option<String>,
    #[serde(default)]
    pub sender_agent_id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    pub created_at: Timestamp,
    #[serde(default)]
    pub updated_at: Option<Timestamp>,
    /// Rows written before correlation tokens existed have none.
    #[serde(default)]
    pub correlation_token: Option<String>,
}

/// Body of the durable write.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewMessageRecord {
    pub room_id: String,
    pub text: String,
    pub correlation_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_agent_id: Option<String>,
}

/// Event body pushed on a room's realtime channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RealtimePayload {
    pub message: String,
    #[serde(default)]
    pub correlation_token: Option<String>,
    #[serde(default)]
    pub sender_user_id: Option<String>,
    #[serde(default)]
    pub sender_agent_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stored_record_without_token() {
        let record: StoredMessageRecord = serde_json::from_value(json!({
            "id": "42",
            "roomId": "room-1",
            "senderUserId": null,
            "senderAgentId": "agent-7",
            "text": "hello",
            "createdAt": "2025-03-08T14:30:00Z",
            "updatedAt": null
        }))
        .unwrap();

        assert_eq!(record.correlation_token, None);
        assert_eq!(record.sender_agent_id.as_deref(), Some("agent-7"));
    }

    #[test]
    fn test_new_record_omits_absent_senders() {
        let record = NewMessageRecord {
            room_id: "room-1".into(),
            text: "hi".into(),
            correlation_token: "tok".into(),
            sender_user_id: None,
            sender_agent_id: None,
        };
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(
            value,
            json!({"roomId": "room-1", "text": "hi", "correlationToken": "tok"})
        );
    }

    #[test]
    fn test_realtime_payload_requires_message() {
        assert!(serde_json::from_value::<RealtimePayload>(json!({"correlationToken": "t"})).is_err());
        assert!(serde_json::from_value::<RealtimePayload>(json!("just text")).is_err());

        let payload: RealtimePayload =
            serde_json::from_value(json!({"message": "hey", "correlationToken": "t"})).unwrap();
        assert_eq!(payload.message, "hey");
        assert_eq!(payload.correlation_token.as_deref(), Some("t"));
    }
}
