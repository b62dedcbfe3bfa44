//! Safety-critical door controller: one task per door, driving a solenoid
//! to reach its commanded target state with obstruction-aware retry and
//! unconditional fail-open on shutdown.
//!
//! Grounded on `control/doors.py`'s `door_process`/`handle_change` pair,
//! generalized to two doors and the idle/moving dual-profile obstruction
//! check the latest tuning calls for.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::config::{self, DoorTuning, DOOR_POLL_SLICE};
use crate::state::{DoorState, HouseState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DoorId {
    Door1,
    Door2,
}

impl DoorId {
    pub const ALL: [DoorId; 2] = [DoorId::Door1, DoorId::Door2];
}

/// Drives a single solenoid pin. Implemented by the microcontroller board
/// link; a test double lets the state machine be verified without hardware.
pub trait Board: Send + Sync {
    fn write_solenoid(&self, pin: u8, energize: bool);
}

/// Obstruction predicate over a door's associated distance sensor.
/// Implemented by the sensor table; a test double lets the retry/hysteresis
/// logic be verified without a serial gateway attached.
pub trait ObstructionSensor: Send + Sync {
    fn obstructed(
        &self,
        sensor_id: &str,
        enter_threshold_mm: i32,
        window: Duration,
        min_consecutive: u32,
    ) -> bool;
}

struct DoorController {
    id: DoorId,
    pin: u8,
    tuning: &'static DoorTuning,
    house: Arc<HouseState>,
    board: Arc<dyn Board>,
    sensors: Arc<dyn ObstructionSensor>,
}

impl DoorController {
    fn is_online(&self) -> bool {
        self.house.system_state() == crate::state::SystemState::Online
    }

    fn open(&self) {
        self.board.write_solenoid(self.pin, true);
        self.house.set_door_state(self.id, DoorState::Open);
        info!("door {:?} opened", self.id);
    }

    fn idle_obstructed(&self) -> bool {
        self.sensors.obstructed(
            self.tuning.sensor_id,
            self.tuning.enter_threshold_mm,
            Duration::from_millis(self.tuning.idle_window_ms),
            self.tuning.idle_min_consecutive,
        )
    }

    fn moving_obstructed(&self) -> bool {
        self.sensors.obstructed(
            self.tuning.sensor_id,
            self.tuning.enter_threshold_mm,
            Duration::from_millis(self.tuning.moving_window_ms),
            self.tuning.moving_min_consecutive,
        )
    }

    fn assert_close(&self) {
        self.board.write_solenoid(self.pin, false);
    }

    /// Run the close procedure to completion (or until the target changes
    /// out from under it / the house leaves `ONLINE`). Returns true iff the
    /// door reached `CLOSED`.
    fn close_procedure(&self) -> bool {
        loop {
            if !self.is_online() || self.house.break_check() {
                return false;
            }
            if self.house.door_target(self.id) != DoorState::Closed {
                return false;
            }

            if self.idle_obstructed() {
                self.house.set_door_state(self.id, DoorState::Clopen);
                warn!(
                    "door {:?} obstruction present before close, re-opening",
                    self.id
                );
                self.board.write_solenoid(self.pin, true);
                std::thread::sleep(self.tuning.retry_delay);
                continue;
            }

            self.assert_close();
            std::thread::sleep(self.tuning.self_pass_ignore);

            if self.monitor_until_closed() {
                self.house.set_door_state(self.id, DoorState::Closed);
                info!("door {:?} closed successfully", self.id);
                return true;
            }
            // Obstruction during the monitor window: retry from the top.
        }
    }

    /// Poll the monitor window for moving-profile obstructions. Returns
    /// true once `clear_hold` has elapsed with no obstruction seen, false
    /// if an obstruction forced a retry (caller restarts the procedure).
    fn monitor_until_closed(&self) -> bool {
        let window_deadline = Instant::now() + self.tuning.monitor_window;
        let clear_since = Instant::now();

        loop {
            if !self.is_online() || self.house.break_check() {
                return false;
            }
            if self.house.door_target(self.id) != DoorState::Closed {
                return false;
            }

            if self.moving_obstructed() {
                self.house.set_door_state(self.id, DoorState::Clopen);
                warn!("door {:?} obstruction detected, re-opening and retrying", self.id);
                self.board.write_solenoid(self.pin, true);
                std::thread::sleep(self.tuning.retry_delay);
                self.assert_close();
                std::thread::sleep(self.tuning.self_pass_ignore);
                return false;
            }

            if clear_since.elapsed() >= self.tuning.clear_hold {
                return true;
            }

            if Instant::now() >= window_deadline {
                return true;
            }
            std::thread::sleep(DOOR_POLL_SLICE);
        }
    }

    fn handle_change(&self) {
        match self.house.door_target(self.id) {
            DoorState::Open => self.open(),
            DoorState::Clopen => self.open(),
            DoorState::Closed => {
                self.close_procedure();
            }
        }
    }

    fn run(&self) {
        info!("door {:?} task started", self.id);
        self.open();

        while self.is_online() {
            if self.house.door_state(self.id) != self.house.door_target(self.id) {
                self.handle_change();
            }
            if self.house.break_check() {
                break;
            }
            std::thread::sleep(DOOR_POLL_SLICE);
        }

        info!("door {:?} leaving ONLINE, forcing open", self.id);
        self.open();
    }
}

/// Spawn one OS thread per door. Threads run until the process exits; they
/// re-check `SystemState` on every poll slice and fail open on any
/// non-`ONLINE` transition, including a panic-free shutdown path.
pub fn spawn_doors(
    house: Arc<HouseState>,
    board: Arc<dyn Board>,
    sensors: Arc<dyn ObstructionSensor>,
) -> Vec<std::thread::JoinHandle<()>> {
    DoorId::ALL
        .iter()
        .map(|&id| {
            let controller = DoorController {
                id,
                pin: config::door_solenoid_pin(id),
                tuning: config::door_tuning(id),
                house: house.clone(),
                board: board.clone(),
                sensors: sensors.clone(),
            };
            std::thread::Builder::new()
                .name(format!("door-{id:?}"))
                .spawn(move || controller.run())
                .expect("spawning door thread")
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::SystemState;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    struct MockBoard {
        energized: AtomicBool,
        writes: AtomicU32,
    }

    impl MockBoard {
        fn new() -> Self {
            Self {
                energized: AtomicBool::new(false),
                writes: AtomicU32::new(0),
            }
        }
    }

    impl Board for MockBoard {
        fn write_solenoid(&self, _pin: u8, energize: bool) {
            self.energized.store(energize, Ordering::SeqCst);
            self.writes.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct NeverObstructed;
    impl ObstructionSensor for NeverObstructed {
        fn obstructed(&self, _sensor_id: &str, _enter_threshold_mm: i32, _window: Duration, _min_consecutive: u32) -> bool {
            false
        }
    }

    struct AlwaysObstructed;
    impl ObstructionSensor for AlwaysObstructed {
        fn obstructed(&self, _sensor_id: &str, _enter_threshold_mm: i32, _window: Duration, _min_consecutive: u32) -> bool {
            true
        }
    }

    fn controller(house: Arc<HouseState>, sensors: Arc<dyn ObstructionSensor>) -> DoorController {
        DoorController {
            id: DoorId::Door1,
            pin: config::door_solenoid_pin(DoorId::Door1),
            tuning: config::door_tuning(DoorId::Door1),
            house,
            board: Arc::new(MockBoard::new()),
            sensors,
        }
    }

    #[test]
    fn close_procedure_succeeds_when_clear() {
        let house = HouseState::new();
        house.set_system_state(SystemState::Online);
        house.set_house_active(true);
        house.set_door_target(DoorId::Door1, DoorState::Closed);
        let ctrl = controller(house.clone(), Arc::new(NeverObstructed));
        assert!(ctrl.close_procedure());
        assert_eq!(house.door_state(DoorId::Door1), DoorState::Closed);
    }

    #[test]
    fn close_procedure_aborts_when_break_check_fires() {
        let house = HouseState::new();
        house.set_system_state(SystemState::SoftShutdown);
        house.set_door_target(DoorId::Door1, DoorState::Closed);
        let ctrl = controller(house.clone(), Arc::new(NeverObstructed));
        assert!(!ctrl.close_procedure());
    }

    #[test]
    fn close_procedure_aborts_when_target_changes_before_commanding_close() {
        let house = HouseState::new();
        house.set_system_state(SystemState::Online);
        house.set_house_active(true);
        house.set_door_target(DoorId::Door1, DoorState::Open);
        let ctrl = controller(house.clone(), Arc::new(AlwaysObstructed));
        assert!(!ctrl.close_procedure());
    }

    #[test]
    fn handle_change_to_open_sets_open_state() {
        let house = HouseState::new();
        house.set_door_state(DoorId::Door1, DoorState::Closed);
        house.set_door_target(DoorId::Door1, DoorState::Open);
        let ctrl = controller(house.clone(), Arc::new(NeverObstructed));
        ctrl.handle_change();
        assert_eq!(house.door_state(DoorId::Door1), DoorState::Open);
    }

    #[test]
    fn handle_change_to_clopen_opens_door() {
        let house = HouseState::new();
        house.set_door_target(DoorId::Door1, DoorState::Clopen);
        let ctrl = controller(house.clone(), Arc::new(NeverObstructed));
        ctrl.handle_change();
        assert_eq!(house.door_state(DoorId::Door1), DoorState::Open);
    }
}
