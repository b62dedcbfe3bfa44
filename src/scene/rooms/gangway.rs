//! Ported from `rooms/gangway.py`: a sensor trip drives an animatronic,
//! swings door 1 open-then-closed, and plays a stinger.

use std::time::Duration;

use tracing::{error, info, warn};

use crate::doors::{DoorId, ObstructionSensor};
use crate::state::DoorState;

use super::super::RoomContext;

const TOF_SENSOR: &str = "TOF1";
const ANIMATRONIC_PIN: u8 = 27;

pub fn run(ctx: &RoomContext) {
    info!("[gangway] starting");

    while ctx.house.house_active() || ctx.house.demo() {
        let demo = ctx.house.demo();
        let tripped = demo
            || ctx
                .sensors
                .obstructed(TOF_SENSOR, 800, Duration::from_millis(250), 2);

        if tripped {
            info!("[gangway] sensor tripped");
            if let Ok(clip) = ctx.clips.load("gangway_tripped.wav") {
                if let Err(e) = ctx.mixer.play_audio("gangway", clip, false, true) {
                    warn!("[gangway] stinger playback failed: {:#}", e);
                }
            } else {
                error!("[gangway] missing clip gangway_tripped.wav");
            }

            ctx.house.set_door_target(DoorId::Door1, DoorState::Clopen);
            ctx.boards.m1.digital_write(ANIMATRONIC_PIN, true);
            info!("[gangway] animatronic pin {} activated", ANIMATRONIC_PIN);

            if ctx.poll_sleep(Duration::from_secs(5)) {
                ctx.boards.m1.digital_write(ANIMATRONIC_PIN, false);
                break;
            }

            ctx.boards.m1.digital_write(ANIMATRONIC_PIN, false);
            info!("[gangway] animatronic pin {} deactivated", ANIMATRONIC_PIN);
            ctx.house.set_door_target(DoorId::Door1, DoorState::Closed);

            if demo {
                break;
            }
        }

        if ctx.should_exit() {
            break;
        }
        std::thread::sleep(Duration::from_millis(100));
    }

    info!("[gangway] exiting");
}
