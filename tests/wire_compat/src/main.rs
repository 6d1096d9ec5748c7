fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use companion_protocol::{
        ChatMessagePayload, ConnectionStatusPayload, Envelope, InboundEvent, MessageType,
        NotificationPayload, RemoteStatus, SyncKind, SyncPayload, TaskUpdatePayload,
        TerminalOutputPayload,
    };

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    fn load_text(name: &str) -> String {
        let path = fixtures_dir().join(name);
        fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()))
    }

    fn load_fixture(name: &str) -> serde_json::Value {
        serde_json::from_str(&load_text(name))
            .unwrap_or_else(|e| panic!("failed to parse fixture {name}: {e}"))
    }

    /// Parses a fixture exactly as the router does: from the raw frame text.
    fn load_envelope(name: &str) -> Envelope {
        serde_json::from_str(&load_text(name))
            .unwrap_or_else(|e| panic!("failed to parse envelope {name}: {e}"))
    }

    /// Normalizes JSON values so that integer-valued floats compare equal.
    fn normalize_value(v: &serde_json::Value) -> serde_json::Value {
        match v {
            serde_json::Value::Number(n) => match n.as_f64() {
                Some(f) => serde_json::json!(f),
                None => v.clone(),
            },
            serde_json::Value::Object(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), normalize_value(v)))
                    .collect(),
            ),
            serde_json::Value::Array(arr) => {
                serde_json::Value::Array(arr.iter().map(normalize_value).collect())
            }
            _ => v.clone(),
        }
    }

    /// Deserializes the fixture's payload into `T`, re-serializes it, and
    /// compares the JSON values (order-independent, float-normalized).
    fn payload_roundtrip<T>(name: &str) -> T
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let payload = load_fixture(name)["payload"].clone();
        let parsed: T = serde_json::from_value(payload.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));
        assert_eq!(
            normalize_value(&payload),
            normalize_value(&reserialized),
            "payload roundtrip mismatch for {name}:\n  wire: {payload}\n  ours: {reserialized}"
        );
        parsed
    }

    fn envelope_roundtrip(name: &str) {
        let fixture = load_fixture(name);
        let reserialized = serde_json::to_value(load_envelope(name)).unwrap();
        assert_eq!(
            normalize_value(&fixture),
            normalize_value(&reserialized),
            "envelope roundtrip mismatch for {name}"
        );
    }

    // --- Envelope ---

    #[test]
    fn every_known_kind_roundtrips_as_envelope() {
        for name in [
            "task_update_move.json",
            "task_update_patch.json",
            "terminal_output.json",
            "chat_message_streaming.json",
            "chat_message_final.json",
            "notification.json",
            "connection_status.json",
            "sync.json",
            "ping.json",
        ] {
            envelope_roundtrip(name);
        }
    }

    #[test]
    fn unknown_kind_parses_but_decodes_to_unknown() {
        let envelope = load_envelope("unknown_kind.json");
        assert_eq!(envelope.msg_type, MessageType::Unknown);
        assert_eq!(envelope.decode().unwrap(), InboundEvent::Unknown);
    }

    #[test]
    fn ping_decodes_as_liveness() {
        let envelope = load_envelope("ping.json");
        assert!(envelope.msg_type.is_liveness());
        assert_eq!(envelope.decode().unwrap(), InboundEvent::Ping);
    }

    // --- Payloads ---

    #[test]
    fn task_update_with_status() {
        let payload: TaskUpdatePayload = payload_roundtrip("task_update_move.json");
        assert_eq!(payload.task_id, "task-42");
        assert_eq!(payload.updates.status.as_deref(), Some("in_progress"));
        assert!(payload.updates.fields.is_empty());

        let InboundEvent::TaskUpdate(decoded) = load_envelope("task_update_move.json")
            .decode()
            .unwrap()
        else {
            panic!("expected task_update");
        };
        assert_eq!(decoded, payload);
    }

    #[test]
    fn task_update_patch_keeps_other_fields() {
        let payload: TaskUpdatePayload = payload_roundtrip("task_update_patch.json");
        assert!(payload.updates.status.is_none());
        assert_eq!(payload.updates.fields["title"], "Refactor parser");
        assert_eq!(payload.updates.fields["priority"], 2);
        assert_eq!(payload.updates.fields.len(), 3);
    }

    #[test]
    fn terminal_output() {
        let payload: TerminalOutputPayload = payload_roundtrip("terminal_output.json");
        assert_eq!(payload.session_id, "term-7");
        assert_eq!(payload.line.line_type, "stderr");
        assert_eq!(payload.line.content, "warning: unused variable");
    }

    #[test]
    fn chat_streaming_fragment() {
        let payload: ChatMessagePayload = payload_roundtrip("chat_message_streaming.json");
        assert!(payload.is_streaming);
        assert_eq!(payload.message.content, "Looking at");
        assert_eq!(payload.message.token_count, None);
    }

    #[test]
    fn chat_final_message() {
        let payload: ChatMessagePayload = payload_roundtrip("chat_message_final.json");
        assert!(!payload.is_streaming);
        assert_eq!(payload.message.token_count, Some(9));
    }

    #[test]
    fn notification() {
        let payload: NotificationPayload = payload_roundtrip("notification.json");
        assert_eq!(payload.notification_type, "task_complete");
        assert_eq!(payload.title, "Task finished");
        let data = payload.data.expect("data");
        assert_eq!(data["taskId"], "task-42");
    }

    #[test]
    fn connection_status() {
        let payload: ConnectionStatusPayload = payload_roundtrip("connection_status.json");
        assert_eq!(payload.status, RemoteStatus::Error);
        assert_eq!(payload.message.as_deref(), Some("agent unreachable"));
    }

    #[test]
    fn sync_request() {
        let payload: SyncPayload = payload_roundtrip("sync.json");
        assert_eq!(payload.sync_type, SyncKind::Partial);
        assert_eq!(
            payload.entities.as_deref(),
            Some(&["tasks".to_owned(), "sessions".to_owned()][..])
        );
    }

    // --- Outbound ---

    #[test]
    fn outbound_envelope_has_wire_shape() {
        let envelope = Envelope::new(
            MessageType::ChatMessage,
            Some(&serde_json::json!({"sessionId": "chat-1", "message": {"content": "hi"}})),
        )
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&envelope.to_json().unwrap()).unwrap();

        assert_eq!(value["type"], "chat_message");
        assert_eq!(value["payload"]["sessionId"], "chat-1");
        let timestamp = value["timestamp"].as_str().unwrap();
        assert!(timestamp.ends_with('Z'), "timestamp {timestamp}");
        assert_eq!(value.as_object().unwrap().len(), 3);
    }
}
