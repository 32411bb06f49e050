//! Wire protocol spoken over the Lobby WebSocket connection.
//!
//! Every frame is a JSON text frame carrying an [`Envelope`]:
//!
//! ```json
//! {"event": "player-update", "data": {"socketId": "a1", "name": "alice", "totalTime": 12, "isActive": true}}
//! ```
//!
//! `data` is optional and omitted when an event carries no payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Event names used on the wire and by the client's local lifecycle dispatch.
pub mod events {
    /// Transport established (dispatched locally by the client).
    pub const CONNECT: &str = "connect";
    /// A connection attempt failed (dispatched locally by the client).
    pub const CONNECT_ERROR: &str = "connect_error";
    /// An established transport was lost (dispatched locally by the client).
    pub const DISCONNECT: &str = "disconnect";
    /// Transport re-established after a loss (dispatched locally by the client).
    pub const RECONNECT: &str = "reconnect";
    /// Retry ceiling exhausted (dispatched locally by the client).
    pub const RECONNECT_FAILED: &str = "reconnect_failed";
    /// A player's record changed.
    pub const PLAYER_UPDATE: &str = "player-update";
    /// Sent by the relay server right after the upgrade with the connection id.
    pub const SESSION: &str = "session";

    /// Names the client synthesizes itself; the server must never send them.
    pub const LIFECYCLE: [&str; 5] = [CONNECT, CONNECT_ERROR, DISCONNECT, RECONNECT, RECONNECT_FAILED];

    /// Whether `event` is one of the locally dispatched lifecycle names.
    pub fn is_lifecycle(event: &str) -> bool {
        LIFECYCLE.contains(&event)
    }
}

/// Errors raised while encoding or decoding wire payloads.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// Frame is not a JSON envelope
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(String),

    /// Event requires a payload but none was sent
    #[error("event '{0}' carries no payload")]
    MissingPayload(String),

    /// Payload does not match the expected record shape
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// Player record with an empty `socketId`
    #[error("player record has an empty connection id")]
    EmptyConnectionId,

    /// Serialization failure
    #[error("failed to encode: {0}")]
    Encode(String),
}

/// A named message with an optional JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Envelope {
    pub fn new(event: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(|e| ProtocolError::InvalidEnvelope(e.to_string()))
    }
}

/// State of one connected player, keyed by `connection_id`.
///
/// Every field is required on the wire. Records are replaced wholesale on
/// update; there is no partial merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    #[serde(rename = "socketId")]
    pub connection_id: String,
    #[serde(rename = "name")]
    pub display_name: String,
    /// Total elapsed play time in seconds
    #[serde(rename = "totalTime")]
    pub total_elapsed_time: u64,
    /// Advisory only; inactive players stay in the roster
    #[serde(rename = "isActive")]
    pub is_active: bool,
}

impl PlayerRecord {
    pub fn new(
        connection_id: impl Into<String>,
        display_name: impl Into<String>,
        total_elapsed_time: u64,
        is_active: bool,
    ) -> Self {
        Self {
            connection_id: connection_id.into(),
            display_name: display_name.into(),
            total_elapsed_time,
            is_active,
        }
    }

    /// Decode and validate a `player-update` payload.
    pub fn from_payload(data: Option<&Value>) -> Result<Self, ProtocolError> {
        let value = data
            .ok_or_else(|| ProtocolError::MissingPayload(events::PLAYER_UPDATE.to_string()))?;
        let record: PlayerRecord = serde_json::from_value(value.clone())
            .map_err(|e| ProtocolError::InvalidPayload(e.to_string()))?;
        if record.connection_id.trim().is_empty() {
            return Err(ProtocolError::EmptyConnectionId);
        }
        Ok(record)
    }

    pub fn to_payload(&self) -> Result<Value, ProtocolError> {
        serde_json::to_value(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }
}

/// Payload of the server's `session` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    #[serde(rename = "socketId")]
    pub connection_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_without_data_omits_field() {
        // テスト項目: data を持たないイベントは data フィールドを出力しない
        // given (前提条件):
        let envelope = Envelope::new("start", None);

        // when (操作):
        let json = envelope.to_json().unwrap();

        // then (期待する結果):
        assert_eq!(json, r#"{"event":"start"}"#);
    }

    #[test]
    fn test_envelope_rejects_non_json() {
        // テスト項目: JSON でないフレームは InvalidEnvelope になる
        // given (前提条件):
        let text = "hello";

        // when (操作):
        let result = Envelope::from_json(text);

        // then (期待する結果):
        assert!(matches!(result, Err(ProtocolError::InvalidEnvelope(_))));
    }

    #[test]
    fn test_player_record_uses_wire_field_names() {
        // テスト項目: PlayerRecord がワイヤ上のフィールド名でシリアライズされる
        // given (前提条件):
        let record = PlayerRecord::new("a1", "alice", 42, true);

        // when (操作):
        let value = record.to_payload().unwrap();

        // then (期待する結果):
        assert_eq!(
            value,
            json!({"socketId": "a1", "name": "alice", "totalTime": 42, "isActive": true})
        );
    }

    #[test]
    fn test_player_record_from_valid_payload() {
        // テスト項目: 必須フィールドが揃ったペイロードはデコードできる
        // given (前提条件):
        let data = json!({"socketId": "b2", "name": "bob", "totalTime": 0, "isActive": false});

        // when (操作):
        let record = PlayerRecord::from_payload(Some(&data)).unwrap();

        // then (期待する結果):
        assert_eq!(record, PlayerRecord::new("b2", "bob", 0, false));
    }

    #[test]
    fn test_player_record_missing_connection_id_is_rejected() {
        // テスト項目: socketId が欠けたペイロードは拒否される
        // given (前提条件):
        let data = json!({"name": "bob", "totalTime": 3, "isActive": true});

        // when (操作):
        let result = PlayerRecord::from_payload(Some(&data));

        // then (期待する結果):
        assert!(matches!(result, Err(ProtocolError::InvalidPayload(_))));
    }

    #[test]
    fn test_player_record_empty_connection_id_is_rejected() {
        // テスト項目: 空の socketId は拒否される
        // given (前提条件):
        let data = json!({"socketId": "  ", "name": "bob", "totalTime": 3, "isActive": true});

        // when (操作):
        let result = PlayerRecord::from_payload(Some(&data));

        // then (期待する結果):
        assert_eq!(result, Err(ProtocolError::EmptyConnectionId));
    }

    #[test]
    fn test_player_record_negative_time_is_rejected() {
        // テスト項目: 負の経過時間は拒否される
        // given (前提条件):
        let data = json!({"socketId": "c3", "name": "carol", "totalTime": -1, "isActive": true});

        // when (操作):
        let result = PlayerRecord::from_payload(Some(&data));

        // then (期待する結果):
        assert!(matches!(result, Err(ProtocolError::InvalidPayload(_))));
    }

    #[test]
    fn test_player_record_without_payload_is_rejected() {
        // テスト項目: ペイロードなしの player-update は拒否される
        // given (前提条件):

        // when (操作):
        let result = PlayerRecord::from_payload(None);

        // then (期待する結果):
        assert_eq!(
            result,
            Err(ProtocolError::MissingPayload("player-update".to_string()))
        );
    }

    #[test]
    fn test_lifecycle_event_names() {
        // テスト項目: ライフサイクルイベント名のみが予約名として判定される
        // given (前提条件):

        // when (操作) / then (期待する結果):
        assert!(events::is_lifecycle("connect"));
        assert!(events::is_lifecycle("reconnect_failed"));
        assert!(!events::is_lifecycle("player-update"));
        assert!(!events::is_lifecycle("session"));
    }
}
