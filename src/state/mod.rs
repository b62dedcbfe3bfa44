//! House State: the process-wide singleton every task polls.
//!
//! Scalar fields are plain atomics (writes are infrequent, readers tolerate
//! stale reads by design); structured fields (per-door state) use a
//! [`dashmap::DashMap`] for per-key updates without a global lock.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::doors::DoorId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SystemState {
    Offline = 0,
    Online = 1,
    SoftShutdown = 2,
    EmergencyShutoff = 3,
    Reboot = 4,
}

impl SystemState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => SystemState::Offline,
            1 => SystemState::Online,
            2 => SystemState::SoftShutdown,
            3 => SystemState::EmergencyShutoff,
            4 => SystemState::Reboot,
            _ => unreachable!("invalid SystemState encoding"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DoorState {
    Open,
    Closed,
    Clopen,
}

pub struct HouseState {
    boot: AtomicBool,
    house_active: AtomicBool,
    demo: AtomicBool,
    system_state: AtomicU8,
    house_lights: AtomicBool,
    door_state: DashMap<DoorId, DoorState>,
    door_target: DashMap<DoorId, DoorState>,
    room_active: DashMap<String, bool>,
    debug: AtomicBool,
}

impl HouseState {
    pub fn new() -> Arc<Self> {
        let s = Self {
            boot: AtomicBool::new(true),
            house_active: AtomicBool::new(false),
            demo: AtomicBool::new(false),
            system_state: AtomicU8::new(SystemState::Offline as u8),
            house_lights: AtomicBool::new(false),
            door_state: DashMap::new(),
            door_target: DashMap::new(),
            room_active: DashMap::new(),
            debug: AtomicBool::new(false),
        };
        for id in DoorId::ALL {
            s.door_state.insert(*id, DoorState::Open);
            s.door_target.insert(*id, DoorState::Open);
        }
        Arc::new(s)
    }

    pub fn boot(&self) -> bool {
        self.boot.load(Ordering::Acquire)
    }

    pub fn clear_boot(&self) {
        self.boot.store(false, Ordering::Release);
    }

    pub fn house_active(&self) -> bool {
        self.house_active.load(Ordering::Acquire)
    }

    pub fn set_house_active(&self, v: bool) {
        self.house_active.store(v, Ordering::Release);
    }

    pub fn demo(&self) -> bool {
        self.demo.load(Ordering::Acquire)
    }

    pub fn set_demo(&self, v: bool) {
        self.demo.store(v, Ordering::Release);
    }

    pub fn system_state(&self) -> SystemState {
        SystemState::from_u8(self.system_state.load(Ordering::Acquire))
    }

    pub fn set_system_state(&self, s: SystemState) {
        self.system_state.store(s as u8, Ordering::Release);
    }

    pub fn house_lights(&self) -> bool {
        self.house_lights.load(Ordering::Acquire)
    }

    pub fn set_house_lights(&self, v: bool) {
        self.house_lights.store(v, Ordering::Release);
    }

    pub fn door_state(&self, id: DoorId) -> DoorState {
        *self.door_state.get(&id).expect("door id always present")
    }

    pub fn set_door_state(&self, id: DoorId, state: DoorState) {
        self.door_state.insert(id, state);
    }

    pub fn door_target(&self, id: DoorId) -> DoorState {
        *self.door_target.get(&id).expect("door id always present")
    }

    pub fn set_door_target(&self, id: DoorId, state: DoorState) {
        self.door_target.insert(id, state);
    }

    pub fn room_active(&self, room: &str) -> bool {
        self.room_active.get(room).map(|v| *v).unwrap_or(false)
    }

    pub fn set_room_active(&self, room: &str, active: bool) {
        self.room_active.insert(room.to_string(), active);
    }

    pub fn debug(&self) -> bool {
        self.debug.load(Ordering::Acquire)
    }

    pub fn set_debug(&self, v: bool) {
        self.debug.store(v, Ordering::Release);
    }

    /// The global cooperative-cancellation predicate: true iff the show is
    /// no longer active or the system has left `ONLINE`.
    pub fn break_check(&self) -> bool {
        !self.house_active() || self.system_state() != SystemState::Online
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn break_check_true_when_inactive() {
        let s = HouseState::new();
        s.set_system_state(SystemState::Online);
        s.set_house_active(false);
        assert!(s.break_check());
    }

    #[test]
    fn break_check_false_when_active_and_online() {
        let s = HouseState::new();
        s.set_system_state(SystemState::Online);
        s.set_house_active(true);
        assert!(!s.break_check());
    }

    #[test]
    fn break_check_true_when_not_online() {
        let s = HouseState::new();
        s.set_house_active(true);
        s.set_system_state(SystemState::SoftShutdown);
        assert!(s.break_check());
    }

    #[test]
    fn doors_start_open() {
        let s = HouseState::new();
        assert_eq!(s.door_state(DoorId::Door1), DoorState::Open);
        assert_eq!(s.door_target(DoorId::Door1), DoorState::Open);
    }
}
