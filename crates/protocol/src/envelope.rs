use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::MessageType;

/// Envelope for all real-time traffic, inbound and outbound.
///
/// The `payload` field uses `serde_json::value::RawValue` so the kind can be
/// inspected before the payload is decoded into its typed shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub msg_type: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Box<serde_json::value::RawValue>>,
    /// ISO-8601 timestamp. Some backends omit it on inbound frames.
    #[serde(default)]
    pub timestamp: String,
}

impl Envelope {
    /// Creates a new envelope stamped with the current time.
    pub fn new<T: Serialize>(
        msg_type: MessageType,
        payload: Option<&T>,
    ) -> Result<Self, serde_json::Error> {
        let raw = match payload {
            Some(p) => {
                let json = serde_json::to_string(p)?;
                Some(serde_json::value::RawValue::from_string(json)?)
            }
            None => None,
        };
        Ok(Self {
            msg_type,
            payload: raw,
            timestamp: now_iso8601(),
        })
    }

    /// Builds the keepalive message: `{"type":"ping","payload":{},"timestamp":…}`.
    pub fn ping() -> Self {
        let payload = serde_json::value::RawValue::from_string("{}".to_owned()).ok();
        Self {
            msg_type: MessageType::Ping,
            payload,
            timestamp: now_iso8601(),
        }
    }

    /// Deserializes the payload into the given type.
    pub fn parse_payload<T: for<'de> Deserialize<'de>>(
        &self,
    ) -> Result<Option<T>, serde_json::Error> {
        match &self.payload {
            Some(raw) => Ok(Some(serde_json::from_str(raw.get())?)),
            None => Ok(None),
        }
    }

    /// Serializes the envelope to its wire form.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Current UTC time as an RFC 3339 string with millisecond precision.
pub fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
