//! Dimmer Controller: a single owner thread drives the AC phase-control
//! mixer's 8 channels at a fixed mix rate, slewing toward producer-set
//! targets and sending a full 8-channel frame whenever something changed
//! or the keepalive interval elapsed.
//!
//! Grounded on `control/dimmer_controller.py`'s `_mixer` loop and
//! `dimmer_flicker` effect, generalized from 1-indexed globals to a
//! `DashMap`-free fixed-size shared array guarded by one lock (the
//! channel count is small and fixed, so a single `Mutex<[..; N]>` is
//! simpler than per-channel atomics and matches the Python's single
//! `_state_lock`).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{info, warn};

use crate::config::{DIMMER_BAUD, DIMMER_CHANNELS, DIMMER_DEFAULT_SLEW_PER_TICK, DIMMER_KEEPALIVE, DIMMER_MIX_HZ, DIMMER_PORT_HINT};
use crate::state::HouseState;

fn norm_channel(ch: usize) -> usize {
    ch.clamp(0, DIMMER_CHANNELS - 1)
}

fn norm_level(v: f64) -> f64 {
    v.clamp(0.0, 100.0)
}

struct MixState {
    desired: [f64; DIMMER_CHANNELS],
    active: [f64; DIMMER_CHANNELS],
    slew_step: [f64; DIMMER_CHANNELS],
    /// Bumped whenever a direct `set()` call preempts a running flicker on
    /// that channel, so the flicker task can notice and exit quietly.
    generation: [u64; DIMMER_CHANNELS],
}

impl MixState {
    fn new() -> Self {
        Self {
            desired: [0.0; DIMMER_CHANNELS],
            active: [0.0; DIMMER_CHANNELS],
            slew_step: [DIMMER_DEFAULT_SLEW_PER_TICK; DIMMER_CHANNELS],
            generation: [0; DIMMER_CHANNELS],
        }
    }
}

/// Owner handle: producers call [`DimmerController::set`] /
/// [`DimmerController::flicker`] without touching the serial port
/// themselves.
pub struct DimmerController {
    state: Arc<Mutex<MixState>>,
    stop: Arc<AtomicBool>,
    ready: Arc<AtomicBool>,
}

impl DimmerController {
    pub fn start(house: Arc<HouseState>, port_override: Option<String>) -> Arc<Self> {
        let state = Arc::new(Mutex::new(MixState::new()));
        let stop = Arc::new(AtomicBool::new(false));
        let ready = Arc::new(AtomicBool::new(false));

        let ctrl = Arc::new(Self {
            state: state.clone(),
            stop: stop.clone(),
            ready: ready.clone(),
        });

        std::thread::Builder::new()
            .name("dimmer-mixer".to_string())
            .spawn(move || mixer_loop(state, stop, ready, house, port_override))
            .expect("spawning dimmer mixer thread");

        ctrl
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Set channel `ch` (0-indexed) to `intensity` (0-100) immediately;
    /// the mixer slews toward it over the next few ticks. Invalidates any
    /// running flicker on this channel.
    pub fn set(&self, ch: usize, intensity: f64) {
        let ch = norm_channel(ch);
        let mut s = self.state.lock().unwrap();
        s.desired[ch] = norm_level(intensity);
        s.slew_step[ch] = DIMMER_DEFAULT_SLEW_PER_TICK;
        s.generation[ch] = s.generation[ch].wrapping_add(1);
    }

    pub fn set_all(&self, levels: [f64; DIMMER_CHANNELS]) {
        let mut s = self.state.lock().unwrap();
        for ch in 0..DIMMER_CHANNELS {
            s.desired[ch] = norm_level(levels[ch]);
            s.generation[ch] = s.generation[ch].wrapping_add(1);
        }
    }

    pub fn snapshot(&self) -> [f64; DIMMER_CHANNELS] {
        self.state.lock().unwrap().active
    }

    /// Spawn a flicker effect on `ch`: repeatedly picks a random target in
    /// `[intensity_min, intensity_max]` and a random ramp duration in
    /// `[ramp_min, ramp_max]`, computing a per-channel slew step so the
    /// ramp completes in roughly that time, until `duration` elapses.
    #[allow(clippy::too_many_arguments)]
    pub fn flicker(
        self: &Arc<Self>,
        ch: usize,
        duration: Duration,
        intensity_min: f64,
        intensity_max: f64,
        ramp_min: Duration,
        ramp_max: Duration,
    ) {
        let ch = norm_channel(ch);
        let (lo, hi) = (norm_level(intensity_min.min(intensity_max)), norm_level(intensity_min.max(intensity_max)));
        let this = self.clone();

        let generation = {
            let mut s = self.state.lock().unwrap();
            s.generation[ch] = s.generation[ch].wrapping_add(1);
            s.generation[ch]
        };

        std::thread::Builder::new()
            .name(format!("dimmer-flicker-{ch}"))
            .spawn(move || {
                let deadline = Instant::now() + duration;
                let mut rng = rand::thread_rng();

                while Instant::now() < deadline {
                    if this.stop.load(Ordering::Acquire) {
                        return;
                    }
                    let still_ours = {
                        let s = this.state.lock().unwrap();
                        s.generation[ch] == generation
                    };
                    if !still_ours {
                        return;
                    }

                    let target = rng.gen_range(lo..=hi);
                    let ramp = Duration::from_secs_f64(rng.gen_range(ramp_min.as_secs_f64()..=ramp_max.as_secs_f64().max(ramp_min.as_secs_f64() + 0.001)));
                    let ticks = ((ramp.as_secs_f64() * DIMMER_MIX_HZ).max(1.0)) as u32;

                    {
                        let mut s = this.state.lock().unwrap();
                        let dist = (target - s.active[ch]).abs();
                        s.slew_step[ch] = if dist > 0.0 { (dist / ticks as f64).max(0.1) } else { DIMMER_DEFAULT_SLEW_PER_TICK };
                        s.desired[ch] = target;
                    }

                    let ramp_end = Instant::now() + ramp;
                    while Instant::now() < ramp_end && Instant::now() < deadline {
                        if this.stop.load(Ordering::Acquire) {
                            return;
                        }
                        std::thread::sleep(Duration::from_millis(20).min(ramp_end.saturating_duration_since(Instant::now())));
                    }
                }

                let mut s = this.state.lock().unwrap();
                if s.generation[ch] == generation {
                    s.desired[ch] = 0.0;
                    s.slew_step[ch] = DIMMER_DEFAULT_SLEW_PER_TICK;
                }
            })
            .expect("spawning dimmer flicker thread");
    }
}

fn mixer_loop(
    state: Arc<Mutex<MixState>>,
    stop: Arc<AtomicBool>,
    ready: Arc<AtomicBool>,
    house: Arc<HouseState>,
    port_override: Option<String>,
) {
    let tick = Duration::from_secs_f64(1.0 / DIMMER_MIX_HZ);
    let mut backoff = Duration::from_millis(500);
    let _ = &house; // reserved for future house-level dimmer policy hooks

    while !stop.load(Ordering::Acquire) {
        let port_name = port_override.clone().unwrap_or_else(|| DIMMER_PORT_HINT.to_string());
        let mut port = match serialport::new(&port_name, DIMMER_BAUD).timeout(Duration::from_millis(20)).open() {
            Ok(p) => {
                info!("dimmer connected on {}", port_name);
                ready.store(true, Ordering::Release);
                backoff = Duration::from_millis(500);
                p
            }
            Err(e) => {
                warn!("dimmer port open failed: {}", e);
                ready.store(false, Ordering::Release);
                std::thread::sleep(backoff);
                backoff = (backoff.mul_f64(1.7)).min(Duration::from_secs(5));
                continue;
            }
        };

        let mut last_keepalive = Instant::now();
        let mut next_tick = Instant::now() + tick;

        loop {
            if stop.load(Ordering::Acquire) {
                ready.store(false, Ordering::Release);
                return;
            }

            drain_responses(port.as_mut());

            let (need_send, frame) = {
                let mut s = state.lock().unwrap();
                let mut changed = false;
                for ch in 0..DIMMER_CHANNELS {
                    let d = s.desired[ch];
                    let a = s.active[ch];
                    if (a - d).abs() > f64::EPSILON {
                        let step = if s.slew_step[ch] <= 0.0 { DIMMER_DEFAULT_SLEW_PER_TICK } else { s.slew_step[ch] };
                        let a2 = if d > a { (a + step).min(d) } else { (a - step).max(d) };
                        if (a2 - a).abs() > f64::EPSILON {
                            s.active[ch] = a2;
                            changed = true;
                        }
                    }
                }
                let due_keepalive = last_keepalive.elapsed() >= DIMMER_KEEPALIVE;
                (changed || due_keepalive, s.active)
            };

            if need_send {
                let line = format!(
                    "A,{}\n",
                    frame.iter().map(|v| format!("{:.0}", v)).collect::<Vec<_>>().join(",")
                );
                use std::io::Write;
                if let Err(e) = port.write_all(line.as_bytes()) {
                    warn!("dimmer write failed: {}", e);
                    break;
                }
                last_keepalive = Instant::now();
            }

            let now = Instant::now();
            if now < next_tick {
                std::thread::sleep(next_tick - now);
                next_tick += tick;
            } else {
                next_tick = Instant::now() + tick;
            }
        }

        ready.store(false, Ordering::Release);
    }
}

fn drain_responses(port: &mut dyn serialport::SerialPort) {
    use std::io::Read;
    let mut buf = [0u8; 256];
    for _ in 0..4 {
        match port.read(&mut buf) {
            Ok(0) => break,
            Ok(_) => {}
            Err(_) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn norm_channel_clamps_to_range() {
        assert_eq!(norm_channel(99), DIMMER_CHANNELS - 1);
        assert_eq!(norm_channel(0), 0);
    }

    #[test]
    fn norm_level_clamps_to_0_100() {
        assert_eq!(norm_level(-5.0), 0.0);
        assert_eq!(norm_level(150.0), 100.0);
    }

    #[test]
    fn mix_state_slew_moves_toward_desired() {
        let mut s = MixState::new();
        s.desired[0] = 50.0;
        let step = s.slew_step[0];
        let a = s.active[0];
        let d = s.desired[0];
        let a2 = if d > a { (a + step).min(d) } else { (a - step).max(d) };
        assert!(a2 > a && a2 <= d);
    }
}
