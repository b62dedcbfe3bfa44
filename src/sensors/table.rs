//! Shared latest-value table, per-sensor distance history, and the
//! obstruction hysteresis predicate.
//!
//! Grounded on `control/remote_sensor_monitor.py`'s `get`/`get_value`/
//! `get_latency_ms` trio, extended with the distance-history deque and
//! `obstructed()` predicate the door controller depends on.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;

use crate::config::FAR_DISTANCE_MM;
use crate::doors::ObstructionSensor;

#[derive(Debug, Clone)]
pub struct SensorRecord {
    pub id: String,
    pub seq: u64,
    pub t_send_ms: u64,
    pub t_rx_ms: u64,
    pub t_host_ms: u64,
    pub mac: String,
    pub vals: serde_json::Map<String, Value>,
}

struct History {
    samples: Mutex<VecDeque<(u64, i32)>>,
    latched: AtomicBool,
}

impl History {
    fn new() -> Self {
        Self {
            samples: Mutex::new(VecDeque::new()),
            latched: AtomicBool::new(false),
        }
    }
}

/// The live sensor table. One instance is shared (via `Arc`) between the
/// reader thread (which writes) and every consumer (door controllers, scene
/// scripts) that reads.
pub struct SensorTable {
    records: DashMap<String, SensorRecord>,
    histories: DashMap<String, History>,
}

impl SensorTable {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            histories: DashMap::new(),
        }
    }

    pub fn get(&self, id: &str) -> Option<SensorRecord> {
        self.records.get(id).map(|r| r.clone())
    }

    /// `vals[key]` iff the record exists and is younger than `max_age_ms`
    /// (when given). Normalizes `dist_mm`: negative readings (no target in
    /// range) are mapped to [`FAR_DISTANCE_MM`].
    pub fn get_value(&self, id: &str, key: &str, max_age_ms: Option<u64>, now_ms: u64) -> Option<Value> {
        let rec = self.records.get(id)?;
        if let Some(max_age) = max_age_ms {
            if now_ms.saturating_sub(rec.t_host_ms) > max_age {
                return None;
            }
        }
        let raw = rec.vals.get(key)?.clone();
        if key == "dist_mm" {
            if let Some(n) = raw.as_i64() {
                if n < 0 {
                    return Some(Value::from(FAR_DISTANCE_MM));
                }
            }
        }
        Some(raw)
    }

    pub fn get_latency_ms(&self, id: &str) -> Option<u64> {
        let rec = self.records.get(id)?;
        if rec.t_send_ms == 0 || rec.t_rx_ms == 0 {
            return None;
        }
        Some(rec.t_rx_ms.saturating_sub(rec.t_send_ms))
    }

    /// Record an inbound line, stamping `t_host_ms` and appending to the
    /// distance history when the payload carries `dist_mm`.
    pub fn record(&self, rec: SensorRecord, now_ms: u64) {
        if let Some(dist) = rec.vals.get("dist_mm").and_then(|v| v.as_i64()) {
            let dist = if dist < 0 { FAR_DISTANCE_MM as i64 } else { dist };
            let history = self
                .histories
                .entry(rec.id.clone())
                .or_insert_with(History::new);
            let mut samples = history.samples.lock().unwrap();
            samples.push_back((now_ms, dist as i32));
            while samples.len() > 512 {
                samples.pop_front();
            }
        }
        self.records.insert(rec.id.clone(), rec);
    }

    /// Median distance over the trailing `window_ms`, or `None` if fewer
    /// than `min_samples` remain in that window.
    pub fn get_distance_filtered(&self, id: &str, window_ms: u64, min_samples: usize, now_ms: u64) -> Option<i32> {
        let history = self.histories.get(id)?;
        let mut samples = history.samples.lock().unwrap();
        while let Some(&(t, _)) = samples.front() {
            if now_ms.saturating_sub(t) > window_ms {
                samples.pop_front();
            } else {
                break;
            }
        }
        if samples.len() < min_samples {
            return None;
        }
        let mut vals: Vec<i32> = samples.iter().map(|&(_, d)| d).collect();
        vals.sort_unstable();
        Some(vals[vals.len() / 2])
    }

    fn obstructed_at(&self, id: &str, block_mm: i32, clear_mm: i32, window_ms: u64, min_consecutive: u32, now_ms: u64) -> bool {
        let history = self
            .histories
            .entry(id.to_string())
            .or_insert_with(History::new);
        let samples = history.samples.lock().unwrap();

        let recent: Vec<i32> = samples
            .iter()
            .rev()
            .filter(|&&(t, _)| now_ms.saturating_sub(t) <= window_ms)
            .map(|&(_, d)| d)
            .take(min_consecutive as usize)
            .collect();

        if recent.len() >= min_consecutive as usize && recent.iter().all(|&d| d < block_mm) {
            history.latched.store(true, Ordering::Release);
        } else if let Some(&latest) = samples.back().map(|(_, d)| d) {
            if latest > clear_mm {
                history.latched.store(false, Ordering::Release);
            }
        }
        // Fail-safe: no samples arriving at all leaves the latch untouched.
        history.latched.load(Ordering::Acquire)
    }

    pub fn now_ms() -> u64 {
        // Monotonic host clock; not wall time.
        static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
        let start = START.get_or_init(std::time::Instant::now);
        start.elapsed().as_millis() as u64
    }
}

impl Default for SensorTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ObstructionSensor for SensorTable {
    fn obstructed(&self, sensor_id: &str, enter_threshold_mm: i32, window: Duration, min_consecutive: u32) -> bool {
        let clear_mm = enter_threshold_mm + 50;
        self.obstructed_at(
            sensor_id,
            enter_threshold_mm,
            clear_mm,
            window.as_millis() as u64,
            min_consecutive,
            Self::now_ms(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, dist_mm: i64, t_host_ms: u64) -> SensorRecord {
        let mut vals = serde_json::Map::new();
        vals.insert("dist_mm".to_string(), Value::from(dist_mm));
        SensorRecord {
            id: id.to_string(),
            seq: 0,
            t_send_ms: 10,
            t_rx_ms: 12,
            t_host_ms,
            mac: String::new(),
            vals,
        }
    }

    #[test]
    fn get_value_maps_negative_distance_to_far() {
        let table = SensorTable::new();
        table.record(record("TOF1", -1, 0), 0);
        let v = table.get_value("TOF1", "dist_mm", None, 0).unwrap();
        assert_eq!(v.as_i64().unwrap(), FAR_DISTANCE_MM as i64);
    }

    #[test]
    fn get_value_respects_max_age() {
        let table = SensorTable::new();
        table.record(record("TOF1", 500, 0), 0);
        assert!(table.get_value("TOF1", "dist_mm", Some(100), 50).is_some());
        assert!(table.get_value("TOF1", "dist_mm", Some(100), 500).is_none());
    }

    #[test]
    fn distance_filter_evicts_stale_entries() {
        let table = SensorTable::new();
        table.record(record("TOF1", 100, 0), 0);
        table.record(record("TOF1", 200, 50), 50);
        table.record(record("TOF1", 300, 1000), 1000);
        let filtered = table.get_distance_filtered("TOF1", 200, 2, 1000);
        assert!(filtered.is_none());
    }

    #[test]
    fn obstruction_latches_and_clears_with_hysteresis() {
        let table = SensorTable::new();
        for i in 0..3 {
            table.record(record("TOF1", 100, i * 10), i * 10);
        }
        assert!(table.obstructed("TOF1", 800, Duration::from_millis(250), 2));

        table.record(record("TOF1", 900, 1000), 1000);
        assert!(table.obstructed("TOF1", 800, Duration::from_millis(250), 2));

        table.record(record("TOF1", 10_000, 1010), 1010);
        assert!(!table.obstructed("TOF1", 800, Duration::from_millis(250), 2));
    }

    #[test]
    fn latency_none_when_unset() {
        let table = SensorTable::new();
        assert!(table.get_latency_ms("nope").is_none());
    }
}
