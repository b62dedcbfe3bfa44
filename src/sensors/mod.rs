//! Remote Sensor & Actuator Bus: a live table of readings from ESP-NOW
//! mesh nodes, bridged through a serial-attached gateway, plus the reverse
//! channel for addressing nodes.
//!
//! - [`table::SensorTable`] - latest-value table, distance history, obstruction hysteresis
//! - [`reader`] - the serial reader thread
//! - [`tx`] - outbound command helpers
//! - [`buttons::ButtonEdge`] - press/release edge queue
//! - [`protocol`] - wire format

pub mod buttons;
pub mod protocol;
pub mod reader;
pub mod table;
pub mod tx;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use serde_json::Value;
use tracing::warn;

use self::buttons::ButtonEdge;
use self::protocol::OutboundCommand;
use self::table::SensorTable;

/// Bundles the shared table, the outbound command sender, and the button
/// edge receiver; owns the reader thread's lifecycle, restarting it if it
/// ever exits unexpectedly.
pub struct SensorBus {
    pub table: Arc<SensorTable>,
    tx: Sender<OutboundCommand>,
    button_rx: Receiver<ButtonEdge>,
    stop: Arc<AtomicBool>,
}

impl SensorBus {
    pub fn start(port_override: Option<String>) -> Arc<Self> {
        let table = Arc::new(SensorTable::new());
        let (tx, tx_rx) = crossbeam_channel::bounded::<OutboundCommand>(256);
        let (button_tx, button_rx) = crossbeam_channel::bounded::<ButtonEdge>(64);
        let stop = Arc::new(AtomicBool::new(false));

        spawn_supervised(table.clone(), tx_rx, button_tx, port_override, stop.clone());

        Arc::new(Self {
            table,
            tx,
            button_rx,
            stop,
        })
    }

    pub fn get(&self, id: &str) -> Option<table::SensorRecord> {
        self.table.get(id)
    }

    pub fn get_value(&self, id: &str, key: &str, max_age_ms: Option<u64>) -> Option<Value> {
        self.table.get_value(id, key, max_age_ms, SensorTable::now_ms())
    }

    pub fn get_latency_ms(&self, id: &str) -> Option<u64> {
        self.table.get_latency_ms(id)
    }

    pub fn button_pop(&self, timeout: Duration) -> Option<ButtonEdge> {
        self.button_rx.recv_timeout(timeout).ok()
    }

    /// Latest pressed state for a button sensor. For multi-button devices
    /// that report a `btn_num` alongside `pressed`, only returns a value
    /// when the latest record's `btn_num` matches; otherwise `None`, since
    /// the table only keeps one record per id and a different button may
    /// have reported more recently.
    pub fn get_button_value(&self, id: &str, btn_num: Option<u32>) -> Option<bool> {
        let rec = self.table.get(id)?;
        if let Some(want) = btn_num {
            let got = rec.vals.get("btn_num").and_then(|v| v.as_u64());
            if got != Some(want as u64) {
                return None;
            }
        }
        rec.vals.get("pressed").and_then(|v| v.as_bool())
    }

    pub fn tx_broadcast(&self, payload: Value) {
        tx::tx_broadcast(&self.tx, payload);
    }

    pub fn tx_to_id(&self, id: &str, payload: Value) {
        tx::tx_to_id(&self.tx, id, payload);
    }

    pub fn tx_to_mac(&self, mac: &str, payload: Value) {
        tx::tx_to_mac(&self.tx, mac, payload);
    }

    pub fn servo(&self, id: &str, angle: i32, ramp_ms: Option<u32>) {
        tx::servo(&self.tx, id, angle, ramp_ms);
    }

    pub fn sprite_play(&self, id: &str, track_n: u32) {
        tx::sprite_play(&self.tx, id, track_n);
    }

    pub fn sprite_next(&self, id: &str, pulse_ms: u32) {
        tx::sprite_next(&self.tx, id, pulse_ms);
    }
}

impl Drop for SensorBus {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
    }
}

fn spawn_supervised(
    table: Arc<SensorTable>,
    tx_rx: Receiver<OutboundCommand>,
    button_tx: Sender<ButtonEdge>,
    port_override: Option<String>,
    stop: Arc<AtomicBool>,
) {
    std::thread::Builder::new()
        .name("sensor-reader".to_string())
        .spawn(move || {
            while !stop.load(Ordering::Acquire) {
                let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    reader::run(
                        table.clone(),
                        tx_rx.clone(),
                        button_tx.clone(),
                        port_override.clone(),
                        stop.clone(),
                    );
                }));
                if stop.load(Ordering::Acquire) {
                    break;
                }
                if let Err(e) = result {
                    warn!("sensor reader thread panicked, restarting: {:?}", e);
                } else {
                    warn!("sensor reader loop exited unexpectedly, restarting");
                }
                std::thread::sleep(Duration::from_millis(500));
            }
        })
        .expect("spawning sensor reader thread");
}

impl crate::doors::ObstructionSensor for SensorBus {
    fn obstructed(&self, sensor_id: &str, enter_threshold_mm: i32, window: Duration, min_consecutive: u32) -> bool {
        self.table.obstructed(sensor_id, enter_threshold_mm, window, min_consecutive)
    }
}
