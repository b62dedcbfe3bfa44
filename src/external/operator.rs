//! The command set any operator surface (HTTP today, a GUI tomorrow) drives
//! the core through. Keeping it as a trait means a GUI can be grafted onto
//! the same [`crate::supervisor::Supervisor`] without any HTTP-specific
//! code leaking into it.

use crate::doors::DoorId;
use crate::error::HouseError;
use crate::scene::rooms::RoomId;
use crate::state::{DoorState, SystemState};

pub trait OperatorCommands {
    fn start(&self) -> Result<(), HouseError>;
    fn emergency_shutoff(&self);
    fn soft_shutdown(&self);
    fn set_door_target(&self, door: DoorId, target: DoorState);
    fn toggle_house_lights(&self);
    fn demo(&self, room: RoomId) -> Result<(), HouseError>;
}

impl OperatorCommands for crate::supervisor::Supervisor {
    fn start(&self) -> Result<(), HouseError> {
        if self.house().system_state() != SystemState::Online {
            return Err(HouseError::NotOnline);
        }
        if self.house().house_active() {
            return Err(HouseError::AlreadyActive);
        }
        let ctx = self.room_context();
        std::thread::Builder::new()
            .name("house-run".to_string())
            .spawn(move || crate::scene::engine::start_house(ctx))
            .expect("spawning house run thread");
        Ok(())
    }

    fn emergency_shutoff(&self) {
        self.house().set_system_state(SystemState::EmergencyShutoff);
    }

    fn soft_shutdown(&self) {
        self.house().set_system_state(SystemState::SoftShutdown);
    }

    fn set_door_target(&self, door: DoorId, target: DoorState) {
        self.house().set_door_target(door, target);
    }

    fn toggle_house_lights(&self) {
        let now = self.house().house_lights();
        self.house().set_house_lights(!now);
    }

    fn demo(&self, room: RoomId) -> Result<(), HouseError> {
        if self.house().system_state() != SystemState::Online {
            return Err(HouseError::NotOnline);
        }
        if self.house().house_active() {
            return Err(HouseError::AlreadyActive);
        }
        let ctx = self.room_context();
        std::thread::Builder::new()
            .name(format!("demo-{}", room.name()))
            .spawn(move || crate::scene::engine::demo_room(ctx, room))
            .expect("spawning demo thread");
        Ok(())
    }
}
