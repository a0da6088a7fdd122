//! Engine.IO v4 and Socket.IO v5 text framing.
//!
//! Every WebSocket text frame is one Engine.IO packet: a single type digit
//! followed by its payload. Socket.IO packets ride inside Engine.IO
//! `message` packets and use the same digit-prefix scheme. Only the default
//! namespace is used; a namespace prefix on incoming packets is skipped.

use serde_json::Value;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnginePacket {
    Open(String),
    Close,
    Ping(String),
    Pong(String),
    Message(String),
    Upgrade,
    Noop,
}

impl EnginePacket {
    pub fn decode(frame: &str) -> Result<Self> {
        let mut chars = frame.chars();
        let kind = chars.next().ok_or_else(|| Error::Malformed(frame.to_string()))?;
        let payload = chars.as_str().to_string();
        let packet = match kind {
            '0' => EnginePacket::Open(payload),
            '1' => EnginePacket::Close,
            '2' => EnginePacket::Ping(payload),
            '3' => EnginePacket::Pong(payload),
            '4' => EnginePacket::Message(payload),
            '5' => EnginePacket::Upgrade,
            '6' => EnginePacket::Noop,
            _ => return Err(Error::Malformed(frame.to_string())),
        };
        Ok(packet)
    }

    pub fn encode(&self) -> String {
        match self {
            EnginePacket::Open(payload) => format!("0{payload}"),
            EnginePacket::Close => "1".to_string(),
            EnginePacket::Ping(payload) => format!("2{payload}"),
            EnginePacket::Pong(payload) => format!("3{payload}"),
            EnginePacket::Message(payload) => format!("4{payload}"),
            EnginePacket::Upgrade => "5".to_string(),
            EnginePacket::Noop => "6".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    /// Client: optional auth payload. Server: handshake data (`{"sid": ..}`).
    Connect(Option<Value>),
    Disconnect,
    Event { name: String, data: Value },
    ConnectError(Value),
}

impl SocketPacket {
    pub fn event(name: impl Into<String>, data: Value) -> Self {
        SocketPacket::Event {
            name: name.into(),
            data,
        }
    }

    pub fn decode(payload: &str) -> Result<Self> {
        let malformed = || Error::Malformed(payload.to_string());
        let mut chars = payload.chars();
        let kind = chars.next().ok_or_else(malformed)?;
        let body = skip_namespace(chars.as_str());

        match kind {
            '0' => {
                let data = if body.is_empty() {
                    None
                } else {
                    Some(serde_json::from_str(body)?)
                };
                Ok(SocketPacket::Connect(data))
            }
            '1' => Ok(SocketPacket::Disconnect),
            '2' => {
                // An ack id may precede the array.
                let body = body.trim_start_matches(|c: char| c.is_ascii_digit());
                let Value::Array(mut items) = serde_json::from_str(body)? else {
                    return Err(malformed());
                };
                if items.is_empty() {
                    return Err(malformed());
                }
                let Value::String(name) = items.remove(0) else {
                    return Err(malformed());
                };
                let data = if items.is_empty() {
                    Value::Null
                } else {
                    items.remove(0)
                };
                Ok(SocketPacket::Event { name, data })
            }
            '4' => {
                let data = if body.is_empty() {
                    Value::Null
                } else {
                    serde_json::from_str(body)?
                };
                Ok(SocketPacket::ConnectError(data))
            }
            _ => Err(malformed()),
        }
    }

    pub fn encode(&self) -> Result<String> {
        let encoded = match self {
            SocketPacket::Connect(None) => "0".to_string(),
            SocketPacket::Connect(Some(data)) => format!("0{}", serde_json::to_string(data)?),
            SocketPacket::Disconnect => "1".to_string(),
            SocketPacket::Event { name, data } => {
                let items = Value::Array(vec![Value::String(name.clone()), data.clone()]);
                format!("2{}", serde_json::to_string(&items)?)
            }
            SocketPacket::ConnectError(data) => format!("4{}", serde_json::to_string(data)?),
        };
        Ok(encoded)
    }

    /// Wraps the packet in an Engine.IO message frame.
    pub fn to_frame(&self) -> Result<String> {
        Ok(EnginePacket::Message(self.encode()?).encode())
    }
}

fn skip_namespace(body: &str) -> &str {
    if body.starts_with('/') {
        match body.find(',') {
            Some(comma) => &body[comma + 1..],
            None => "",
        }
    } else {
        body
    }
}

/// Human readable reason from a `connect_error` payload.
pub(crate) fn refusal_message(data: &Value) -> String {
    match data {
        Value::String(message) => message.clone(),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| data.to_string()),
        Value::Null => "connection refused".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{EnginePacket, SocketPacket, refusal_message};

    #[test]
    fn decodes_engine_packets() {
        assert_eq!(
            EnginePacket::decode(r#"0{"sid":"abc","pingInterval":25000}"#).unwrap(),
            EnginePacket::Open(r#"{"sid":"abc","pingInterval":25000}"#.to_string())
        );
        assert_eq!(EnginePacket::decode("2").unwrap(), EnginePacket::Ping(String::new()));
        assert_eq!(EnginePacket::decode("1").unwrap(), EnginePacket::Close);
        assert_eq!(
            EnginePacket::decode("40").unwrap(),
            EnginePacket::Message("0".to_string())
        );
    }

    #[test]
    fn rejects_unknown_engine_type() {
        assert!(EnginePacket::decode("9x").is_err());
        assert!(EnginePacket::decode("").is_err());
    }

    #[test]
    fn pong_echoes_probe_payload() {
        assert_eq!(EnginePacket::Pong("probe".to_string()).encode(), "3probe");
        assert_eq!(EnginePacket::Pong(String::new()).encode(), "3");
    }

    #[test]
    fn decodes_event_with_payload() {
        let packet = SocketPacket::decode(
            r#"2["new_mention",{"message_id":5,"content":"hi @bob"}]"#,
        )
        .unwrap();
        assert_eq!(
            packet,
            SocketPacket::event("new_mention", json!({"message_id": 5, "content": "hi @bob"}))
        );
    }

    #[test]
    fn decodes_event_with_namespace_and_ack_id() {
        let packet = SocketPacket::decode(r#"2/chat,12["user_joined",{"channel_id":1}]"#).unwrap();
        assert_eq!(
            packet,
            SocketPacket::event("user_joined", json!({"channel_id": 1}))
        );
    }

    #[test]
    fn event_without_data_has_null_payload() {
        let packet = SocketPacket::decode(r#"2["ping_me"]"#).unwrap();
        assert_eq!(packet, SocketPacket::event("ping_me", serde_json::Value::Null));
    }

    #[test]
    fn rejects_event_without_name() {
        assert!(SocketPacket::decode("2[]").is_err());
        assert!(SocketPacket::decode(r#"2[1,2]"#).is_err());
        assert!(SocketPacket::decode(r#"2{"a":1}"#).is_err());
    }

    #[test]
    fn decodes_connect_ack_and_error() {
        assert_eq!(
            SocketPacket::decode(r#"0{"sid":"xyz"}"#).unwrap(),
            SocketPacket::Connect(Some(json!({"sid": "xyz"})))
        );
        let refused = SocketPacket::decode(r#"4{"message":"Not authorized"}"#).unwrap();
        let SocketPacket::ConnectError(data) = refused else {
            panic!("expected connect error");
        };
        assert_eq!(refusal_message(&data), "Not authorized");
    }

    #[test]
    fn encodes_client_frames() {
        assert_eq!(SocketPacket::Connect(None).to_frame().unwrap(), "40");
        assert_eq!(
            SocketPacket::Connect(Some(json!({"token": "t"})))
                .to_frame()
                .unwrap(),
            r#"40{"token":"t"}"#
        );
        assert_eq!(
            SocketPacket::event("join_channel", json!({"channel_id": 3}))
                .to_frame()
                .unwrap(),
            r#"42["join_channel",{"channel_id":3}]"#
        );
    }
}
