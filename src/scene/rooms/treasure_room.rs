//! Ported from `rooms/treasureRoom.py`: the simplest room, an idle loop
//! with no sensor or effect wiring of its own.

use std::time::Duration;

use tracing::info;

use super::super::RoomContext;

pub fn run(ctx: &RoomContext) {
    info!("[treasureRoom] starting");

    while ctx.house.house_active() || ctx.house.demo() {
        if ctx.poll_sleep(Duration::from_secs(5)) {
            break;
        }
        if ctx.house.demo() {
            break;
        }
    }

    info!("[treasureRoom] exiting");
}
