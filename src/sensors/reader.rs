//! Serial reader thread: owns the gateway's serial port, drains outbound
//! commands, parses inbound NDJSON, and keeps the shared table current.
//!
//! Runs on a dedicated OS thread rather than the historical separate
//! process (see the module-level note in [`super`]); a blocking read with a
//! bounded timeout via `serialport` gives the same "never stalls the rest
//! of the program" property without process-boundary overhead.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use tracing::{debug, info, warn};

use crate::config::{SENSOR_BAUD, SENSOR_PORT_HINTS, SENSOR_READ_TIMEOUT, SENSOR_SILENCE_RECONNECT};

use super::buttons::{ButtonEdge, RawButtonEvent};
use super::protocol::{parse_line, OutboundCommand};
use super::table::{SensorRecord, SensorTable};

fn autodetect_port(explicit: Option<&str>) -> Option<String> {
    if let Some(p) = explicit {
        return Some(p.to_string());
    }
    let ports = serialport::available_ports().ok()?;
    for p in &ports {
        let desc = format!("{:?}", p.port_type).to_lowercase();
        if SENSOR_PORT_HINTS.iter().any(|hint| desc.contains(&hint.to_lowercase()) || p.port_name.to_lowercase().contains(&hint.to_lowercase())) {
            return Some(p.port_name.clone());
        }
    }
    ports.first().map(|p| p.port_name.clone())
}

/// Run the reader loop until `stop` is set. Reconnects on open failure or
/// prolonged silence, with exponential backoff capped at 5s between open
/// attempts.
pub fn run(
    table: Arc<SensorTable>,
    tx_rx: Receiver<OutboundCommand>,
    button_tx: crossbeam_channel::Sender<ButtonEdge>,
    port_override: Option<String>,
    stop: Arc<AtomicBool>,
) {
    let mut backoff = Duration::from_millis(250);

    while !stop.load(Ordering::Acquire) {
        let port_name = match autodetect_port(port_override.as_deref()) {
            Some(p) => p,
            None => {
                warn!("no serial port found for sensor gateway, retrying");
                std::thread::sleep(backoff);
                backoff = (backoff * 2).min(Duration::from_secs(5));
                continue;
            }
        };

        let port = serialport::new(&port_name, SENSOR_BAUD)
            .timeout(SENSOR_READ_TIMEOUT)
            .open();

        let mut port = match port {
            Ok(p) => {
                info!("sensor gateway connected on {} @ {}", port_name, SENSOR_BAUD);
                backoff = Duration::from_millis(250);
                p
            }
            Err(e) => {
                warn!("failed to open sensor gateway port {}: {}", port_name, e);
                std::thread::sleep(backoff);
                backoff = (backoff * 2).min(Duration::from_secs(5));
                continue;
            }
        };

        let mut buf = [0u8; 4096];
        let mut pending = Vec::new();
        let mut last_line_at = Instant::now();

        loop {
            if stop.load(Ordering::Acquire) {
                return;
            }

            for cmd in tx_rx.try_iter().take(16) {
                let line = cmd.to_line();
                if let Err(e) = port.write_all(line.as_bytes()) {
                    warn!("sensor gateway write failed: {}", e);
                    break;
                }
            }

            match port.read(&mut buf) {
                Ok(0) => {}
                Ok(n) => {
                    pending.extend_from_slice(&buf[..n]);
                    while let Some(nl) = pending.iter().position(|&b| b == b'\n') {
                        let line: Vec<u8> = pending.drain(..=nl).collect();
                        let text = String::from_utf8_lossy(&line);
                        let text = text.trim();
                        if text.is_empty() {
                            continue;
                        }
                        last_line_at = Instant::now();
                        handle_line(text, &table, &button_tx);
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(e) => {
                    warn!("sensor gateway read error: {}", e);
                    break;
                }
            }

            if last_line_at.elapsed() > SENSOR_SILENCE_RECONNECT {
                warn!("sensor gateway silent for {:?}, reconnecting", SENSOR_SILENCE_RECONNECT);
                break;
            }
        }
    }
}

fn handle_line(text: &str, table: &SensorTable, button_tx: &crossbeam_channel::Sender<ButtonEdge>) {
    let Some(env) = parse_line(text) else {
        debug!("dropping unparsable sensor line: {}", text);
        return;
    };

    let now_ms = SensorTable::now_ms();

    if env.data.kind.as_deref() == Some("button") {
        if let Ok(raw) = serde_json::from_value::<RawButtonEvent>(serde_json::Value::Object(env.data.vals.clone())) {
            let edge = ButtonEdge::from_raw(&env.data.id, raw);
            if button_tx.try_send(edge).is_err() {
                warn!("button edge queue full, dropping oldest-pending edge");
            }
        }
    }

    let record = SensorRecord {
        id: env.data.id.clone(),
        seq: env.data.seq,
        t_send_ms: env.data.t,
        t_rx_ms: env.rx_ms.unwrap_or(now_ms),
        t_host_ms: now_ms,
        mac: env.mac,
        vals: env.data.vals,
    };
    table.record(record, now_ms);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_line_records_sensor_reading() {
        let table = SensorTable::new();
        let (tx, _rx) = crossbeam_channel::unbounded();
        let line = r#"{"rx_ms":10,"mac":"AA","data":{"id":"TOF1","seq":1,"t":5,"vals":{"dist_mm":400}}}"#;
        handle_line(line, &table, &tx);
        assert!(table.get("TOF1").is_some());
    }

    #[test]
    fn handle_line_ignores_garbage() {
        let table = SensorTable::new();
        let (tx, _rx) = crossbeam_channel::unbounded();
        handle_line("garbage", &table, &tx);
        assert!(table.get("anything").is_none());
    }

    #[test]
    fn handle_line_emits_button_edge() {
        let table = SensorTable::new();
        let (tx, rx) = crossbeam_channel::unbounded();
        let line = r#"{"data":{"id":"BTN1","type":"button","vals":{"pressed":true}}}"#;
        handle_line(line, &table, &tx);
        let edge = rx.try_recv().unwrap();
        assert!(edge.pressed);
        assert_eq!(edge.id, "BTN1");
    }
}
