//! Wire format for the serial-attached ESP-NOW gateway.
//!
//! Inbound lines are newline-terminated JSON. The expected envelope wraps a
//! `data` object carrying the reporting node's id/seq/timestamp/values; a
//! flat payload without the wrapper is also accepted and normalized to the
//! same shape, since some firmware revisions report lines directly.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct InboundEnvelope {
    #[serde(default)]
    pub rx_ms: Option<u64>,
    #[serde(default)]
    pub mac: String,
    pub data: NodePayload,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodePayload {
    pub id: String,
    #[serde(default)]
    pub seq: u64,
    #[serde(default)]
    pub t: u64,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub vals: Map<String, Value>,
}

/// Parse one line, accepting both the wrapped envelope and a flat
/// `NodePayload` with no `rx_ms`/`mac`/`data` wrapper.
pub fn parse_line(line: &str) -> Option<InboundEnvelope> {
    if let Ok(env) = serde_json::from_str::<InboundEnvelope>(line) {
        return Some(env);
    }
    if let Ok(payload) = serde_json::from_str::<NodePayload>(line) {
        return Some(InboundEnvelope {
            rx_ms: None,
            mac: String::new(),
            data: payload,
        });
    }
    None
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind")]
pub enum OutboundCommand {
    Broadcast { payload: Value },
    ToId { id: String, payload: Value },
    ToMac { mac: String, payload: Value },
}

impl OutboundCommand {
    /// Render as the line-oriented wire format the gateway firmware expects.
    pub fn to_line(&self) -> String {
        match self {
            OutboundCommand::Broadcast { payload } => format!("TXB {payload}\n"),
            OutboundCommand::ToId { id, payload } => format!("TX {id} {payload}\n"),
            OutboundCommand::ToMac { mac, payload } => format!("TXMAC {mac} {payload}\n"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wrapped_envelope() {
        let line = r#"{"rx_ms":123,"mac":"AA:BB","data":{"id":"TOF1","seq":5,"t":100,"vals":{"dist_mm":450}}}"#;
        let env = parse_line(line).unwrap();
        assert_eq!(env.data.id, "TOF1");
        assert_eq!(env.data.vals.get("dist_mm").unwrap(), 450);
    }

    #[test]
    fn parses_flat_payload() {
        let line = r#"{"id":"TOF2","seq":1,"t":50,"vals":{"dist_mm":900}}"#;
        let env = parse_line(line).unwrap();
        assert_eq!(env.data.id, "TOF2");
        assert!(env.mac.is_empty());
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_line("not json").is_none());
    }

    #[test]
    fn broadcast_command_renders_line() {
        let cmd = OutboundCommand::Broadcast {
            payload: serde_json::json!({"angle": 90}),
        };
        assert!(cmd.to_line().starts_with("TXB "));
    }
}
