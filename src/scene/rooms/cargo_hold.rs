//! Ported from `rooms/cargoHold.py`: a slow dimmer ramp sequence on the
//! hold's single light channel.

use std::time::Duration;

use tracing::info;

use super::super::RoomContext;

const CHANNEL: usize = 0;

pub fn run(ctx: &RoomContext) {
    info!("[cargoHold] starting");

    while ctx.house.house_active() || ctx.house.demo() {
        for level in [0.0, 50.0, 100.0, 0.0, 25.0, 50.0, 75.0, 100.0] {
            ctx.dimmer.set(CHANNEL, level);
            if ctx.poll_sleep(Duration::from_secs(3)) {
                return;
            }
        }

        for i in 0..100 {
            ctx.dimmer.set(CHANNEL, i as f64);
            if ctx.poll_sleep(Duration::from_millis(100)) {
                return;
            }
        }

        if ctx.should_exit() || ctx.house.demo() {
            break;
        }
    }

    info!("[cargoHold] exiting");
}
