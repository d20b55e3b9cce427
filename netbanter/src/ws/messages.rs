use serde::{Deserialize, Serialize};

// Peer → Server Events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    Identify { name: String },
    ChatMessage { text: String },
}

// Server → Peer Events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundEvent {
    ChatMessage { text: String },
    UserJoined { name: String },
    UserLeft { name: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_inbound() {
        let event: InboundEvent = serde_json::from_str(r#"{"type":"identify","name":"alice"}"#).unwrap();
        assert_eq!(
            event,
            InboundEvent::Identify {
                name: "alice".to_string()
            }
        );

        let event: InboundEvent =
            serde_json::from_str(r#"{"type":"chat_message","text":"hello"}"#).unwrap();
        assert_eq!(
            event,
            InboundEvent::ChatMessage {
                text: "hello".to_string()
            }
        );
    }

    #[test]
    fn test_reject_unknown_shapes() {
        assert!(serde_json::from_str::<InboundEvent>("not json").is_err());
        assert!(serde_json::from_str::<InboundEvent>(r#"{"type":"user_joined","name":"x"}"#).is_err());
        assert!(serde_json::from_str::<InboundEvent>(r#"{"type":"identify"}"#).is_err());
        assert!(serde_json::from_str::<InboundEvent>(r#"{"name":"alice"}"#).is_err());
    }

    #[test]
    fn test_encode_outbound() {
        let joined = serde_json::to_value(OutboundEvent::UserJoined {
            name: "alice".to_string(),
        })
        .unwrap();
        assert_eq!(joined, serde_json::json!({"type": "user_joined", "name": "alice"}));

        let left = serde_json::to_value(OutboundEvent::UserLeft {
            name: "alice".to_string(),
        })
        .unwrap();
        assert_eq!(left, serde_json::json!({"type": "user_left", "name": "alice"}));

        let chat = serde_json::to_value(OutboundEvent::ChatMessage {
            text: "alice: hi".to_string(),
        })
        .unwrap();
        assert_eq!(chat, serde_json::json!({"type": "chat_message", "text": "alice: hi"}));
    }
}
