// ── Outbound command envelope ──

use std::ops::Range;

use bytes::Bytes;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Range the message id of each outbound command is drawn from.
pub const COMMAND_ID_RANGE: Range<i64> = 1024..65535;

/// Status request command code.
pub const CMD_STATUS: i64 = 0;

/// Payload published on a device's `command_in` topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub id: i64,
    pub cmd: i64,
    pub lg: String,
}

impl CommandEnvelope {
    /// Status request ("ping") with a fresh random id.
    pub fn ping(language: &str) -> Self {
        Self {
            id: rand::thread_rng().gen_range(COMMAND_ID_RANGE),
            cmd: CMD_STATUS,
            lg: language.to_owned(),
        }
    }

    pub fn to_bytes(&self) -> Result<Bytes, serde_json::Error> {
        serde_json::to_vec(self).map(Bytes::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_id_in_range() {
        for _ in 0..500 {
            let envelope = CommandEnvelope::ping("de");
            assert!(COMMAND_ID_RANGE.contains(&envelope.id), "id {}", envelope.id);
            assert_eq!(envelope.cmd, 0);
        }
    }

    #[test]
    fn wire_format() {
        let envelope = CommandEnvelope {
            id: 2048,
            cmd: CMD_STATUS,
            lg: "de".into(),
        };
        insta::assert_json_snapshot!(envelope, @r#"
        {
          "id": 2048,
          "cmd": 0,
          "lg": "de"
        }
        "#);
    }
}
