//! Ported from `rooms/swamp.py` (renamed to match the current layout):
//! waits for a sensor trip, then fires a lightning-flash pattern on the
//! strobe relay.

use std::time::Duration;

use rand::Rng;
use tracing::info;

use crate::doors::ObstructionSensor;

use super::super::RoomContext;

const TOF_SENSOR: &str = "TOF2";
const STROBE_PIN: u8 = 23;

pub fn run(ctx: &RoomContext) {
    info!("[quarterdeck] starting");

    while ctx.house.house_active() || ctx.house.demo() {
        loop {
            if ctx.should_exit() {
                return;
            }
            if ctx.house.demo() || ctx.sensors.obstructed(TOF_SENSOR, 1000, Duration::from_millis(250), 2) {
                break;
            }
            if ctx.poll_sleep(Duration::from_secs(1)) {
                return;
            }
        }

        lightning_flash(ctx);

        if ctx.should_exit() || ctx.house.demo() {
            break;
        }
    }

    info!("[quarterdeck] exiting");
}

/// A short burst of 3-5 flashes, each ~100ms on with ~80ms gaps.
fn lightning_flash(ctx: &RoomContext) {
    let mut rng = rand::thread_rng();
    let flashes = rng.gen_range(3..=5);
    for _ in 0..flashes {
        if ctx.should_exit() {
            return;
        }
        ctx.boards.m1.digital_write(STROBE_PIN, true);
        std::thread::sleep(Duration::from_millis(100));
        ctx.boards.m1.digital_write(STROBE_PIN, false);
        std::thread::sleep(Duration::from_millis(80));
    }
}
