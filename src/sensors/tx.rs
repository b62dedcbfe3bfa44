//! Outbound command helpers: broadcast, address by id/MAC, and the
//! higher-level servo/sprite conveniences scene scripts call directly.

use crossbeam_channel::Sender;
use serde_json::{json, Value};
use tracing::warn;

use super::protocol::OutboundCommand;

/// Enqueue `cmd`, never blocking the caller. A full queue drops the
/// command and logs rather than stalling a scene thread.
fn enqueue(tx: &Sender<OutboundCommand>, cmd: OutboundCommand) {
    if tx.try_send(cmd).is_err() {
        warn!("sensor tx queue full, dropping outbound command");
    }
}

pub fn tx_broadcast(tx: &Sender<OutboundCommand>, payload: Value) {
    enqueue(tx, OutboundCommand::Broadcast { payload });
}

pub fn tx_to_id(tx: &Sender<OutboundCommand>, id: &str, payload: Value) {
    enqueue(
        tx,
        OutboundCommand::ToId {
            id: id.to_string(),
            payload,
        },
    );
}

pub fn tx_to_mac(tx: &Sender<OutboundCommand>, mac: &str, payload: Value) {
    enqueue(
        tx,
        OutboundCommand::ToMac {
            mac: mac.to_string(),
            payload,
        },
    );
}

/// Clamp `angle` to `[0, 180]` and send to node `id`.
pub fn servo(tx: &Sender<OutboundCommand>, id: &str, angle: i32, ramp_ms: Option<u32>) {
    let angle = angle.clamp(0, 180);
    let mut payload = json!({ "angle": angle });
    if let (Some(ramp), Value::Object(map)) = (ramp_ms, &mut payload) {
        map.insert("ramp_ms".to_string(), json!(ramp));
    }
    tx_to_id(tx, id, payload);
}

pub fn sprite_play(tx: &Sender<OutboundCommand>, id: &str, track_n: u32) {
    tx_to_id(tx, id, json!({ "sprite": "play", "track": track_n }));
}

pub fn sprite_next(tx: &Sender<OutboundCommand>, id: &str, pulse_ms: u32) {
    tx_to_id(tx, id, json!({ "sprite": "next", "pulse_ms": pulse_ms }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn servo_clamps_angle_above_range() {
        let (tx, rx) = crossbeam_channel::unbounded();
        servo(&tx, "SRV1", 999, None);
        match rx.try_recv().unwrap() {
            OutboundCommand::ToId { payload, .. } => {
                assert_eq!(payload["angle"], 180);
            }
            _ => panic!("expected ToId"),
        }
    }

    #[test]
    fn servo_clamps_angle_below_range() {
        let (tx, rx) = crossbeam_channel::unbounded();
        servo(&tx, "SRV1", -10, None);
        match rx.try_recv().unwrap() {
            OutboundCommand::ToId { payload, .. } => assert_eq!(payload["angle"], 0),
            _ => panic!("expected ToId"),
        }
    }

    #[test]
    fn full_queue_drops_without_blocking() {
        let (tx, _rx) = crossbeam_channel::bounded(1);
        tx_broadcast(&tx, json!({"a":1}));
        tx_broadcast(&tx, json!({"a":2})); // queue full, should just log and return
    }
}
