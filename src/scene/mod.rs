//! Show Orchestration Engine: one cooperative task per active room,
//! supervised with panic isolation and stuck-task detection.
//!
//! - [`engine`] - `start_house`/`demo_room`/thread supervision
//! - [`rooms`] - one module per room script, ported from the historical
//!   per-room Python scripts with explicit `BreakCheck` polling on every
//!   wait

pub mod clips;
pub mod engine;
pub mod rooms;

use std::sync::Arc;
use std::time::Duration;

use crate::audio::mixer::AudioMixer;
use crate::config::SCENE_POLL_SLICE;
use crate::dimmer::DimmerController;
use crate::hw::Boards;
use crate::sensors::SensorBus;
use crate::state::HouseState;

use self::clips::ClipLibrary;

/// Everything a room script needs: shared state, actuator/output handles,
/// and the clip cache. Cheap to clone (every field is an `Arc`).
#[derive(Clone)]
pub struct RoomContext {
    pub house: Arc<HouseState>,
    pub mixer: Arc<AudioMixer>,
    pub sensors: Arc<SensorBus>,
    pub dimmer: Arc<DimmerController>,
    pub boards: Arc<Boards>,
    pub clips: Arc<ClipLibrary>,
}

impl RoomContext {
    /// Sleep in `SCENE_POLL_SLICE` increments, polling `BreakCheck` or the
    /// demo-one-shot flag on every slice. Returns true if interrupted
    /// before `total` elapsed.
    pub fn poll_sleep(&self, total: Duration) -> bool {
        let mut remaining = total;
        while remaining > Duration::ZERO {
            if self.house.break_check() {
                return true;
            }
            let slice = remaining.min(SCENE_POLL_SLICE);
            std::thread::sleep(slice);
            remaining -= slice;
        }
        self.house.break_check()
    }

    pub fn should_exit(&self) -> bool {
        self.house.break_check()
    }
}
