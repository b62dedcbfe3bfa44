//! Show orchestration: spawns one supervised task per active room, with
//! panic isolation and stuck-task detection.
//!
//! Grounded on `control/system.py`'s room-thread bookkeeping: the original
//! keeps a dict of `threading.Thread` per room and checks `.is_alive()`
//! from the main loop. Here each room runs on its own OS thread and the
//! engine blocks on `JoinHandle::join`, catching panics so one room
//! crashing never takes down the process.

use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::config::STUCK_TASK_WARN_AFTER;
use crate::doors::DoorId;
use crate::state::DoorState;

use super::rooms::RoomId;
use super::RoomContext;

/// Run every room concurrently until `BreakCheck` fires. Precondition:
/// `house_active == false` and the system is `ONLINE`; sets
/// `house_active = true`, closes the entry doors, and turns off ambient
/// lights for the duration of the run.
pub fn start_house(ctx: RoomContext) {
    if ctx.house.house_active() {
        warn!("start_house called while a house run is already active, ignoring");
        return;
    }

    info!("starting house run");
    ctx.house.set_house_active(true);
    for id in DoorId::ALL {
        ctx.house.set_door_target(id, DoorState::Closed);
    }
    ctx.house.set_house_lights(false);

    let handles: Vec<_> = RoomId::ALL
        .iter()
        .map(|&room| spawn_room(ctx.clone(), room))
        .collect();

    join_all(handles);

    ctx.house.set_house_active(false);
    info!("house run ended");
}

/// Run a single room in isolation for demonstration/testing. Precondition:
/// `house_active == false`. Clears the one-shot `demo` flag once the room
/// task completes, regardless of which exit path the room script took -
/// the historical per-room scripts only cleared it on some paths, which
/// this intentionally does not replicate.
pub fn demo_room(ctx: RoomContext, room: RoomId) {
    if ctx.house.house_active() {
        warn!("demo_room called while a house run is already active, ignoring");
        return;
    }

    info!("starting demo of {}", room.name());
    ctx.house.set_demo(true);
    ctx.house.set_house_active(true);

    let handle = spawn_room(ctx.clone(), room);
    join_all(vec![handle]);

    ctx.house.set_house_active(false);
    ctx.house.set_demo(false);
    info!("demo of {} ended", room.name());
}

struct RoomTask {
    room: RoomId,
    handle: std::thread::JoinHandle<()>,
}

fn spawn_room(ctx: RoomContext, room: RoomId) -> RoomTask {
    let handle = std::thread::Builder::new()
        .name(format!("room-{}", room.name()))
        .spawn(move || {
            ctx.house.set_room_active(room.name(), true);
            let result = std::panic::catch_unwind(AssertUnwindSafe(|| room.run(&ctx)));
            ctx.house.set_room_active(room.name(), false);
            if let Err(payload) = result {
                let msg = panic_message(&payload);
                error!("room {} panicked: {}", room.name(), msg);
            }
        })
        .expect("spawning room thread");
    RoomTask { room, handle }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Block until every room task finishes. Rooms are expected to exit
/// promptly once `BreakCheck` trips; a room that hasn't joined after
/// `STUCK_TASK_WARN_AFTER` is logged and abandoned rather than killed, since
/// there is no safe way to force-terminate an OS thread from the outside.
fn join_all(handles: Vec<RoomTask>) {
    let deadline = Instant::now() + STUCK_TASK_WARN_AFTER;
    let mut pending = handles;
    let mut warned = false;

    loop {
        pending.retain(|task| !task.handle.is_finished());
        if pending.is_empty() {
            return;
        }
        if !warned && Instant::now() >= deadline {
            let stuck: Vec<&str> = pending.iter().map(|t| t.room.name()).collect();
            warn!("rooms still running after stuck-task threshold: {:?}", stuck);
            warned = true;
        }
        std::thread::sleep(Duration::from_millis(100));

        if warned && Instant::now() >= deadline + STUCK_TASK_WARN_AFTER {
            info!("abandoning {} stuck room thread(s)", pending.len());
            return;
        }
    }
}
