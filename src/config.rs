//! Compiled-in configuration.
//!
//! Nothing here is loaded from a file or environment at runtime; the CLI
//! (see `main.rs`) only selects *which* port path or log level to use, never
//! show content. This mirrors the "no configuration files" rule: the values
//! below are the single source of truth for channel routing, door tuning,
//! and hardware addressing.

use std::time::Duration;

use crate::audio::channel_map::{ChannelEntry, ChannelTable, Device};
use crate::doors::DoorId;

/// Two fixed-index output devices: primary (HDMI/AVR) and secondary (USB 7.1).
pub const PRIMARY_DEVICE_NAME_HINT: &str = "HDMI";
pub const SECONDARY_DEVICE_NAME_HINT: &str = "USB Audio";

pub const SAMPLE_RATE_HZ: u32 = 48_000;
pub const PLAYBACK_BLOCK_FRAMES: usize = 1920; // ~40ms @ 48kHz

pub const FAR_DISTANCE_MM: i32 = 10_000;

pub const SENSOR_BAUD: u32 = 921_600;
pub const SENSOR_READ_TIMEOUT: Duration = Duration::from_millis(50);
pub const SENSOR_SILENCE_RECONNECT: Duration = Duration::from_secs(2);
pub const SENSOR_PORT_HINTS: &[&str] = &["usbserial", "ttyUSB", "ttyACM", "SLAB", "CP210"];

pub const DIMMER_BAUD: u32 = 115_200;
pub const DIMMER_MIX_HZ: f64 = 240.0;
pub const DIMMER_CHANNELS: usize = 8;
pub const DIMMER_KEEPALIVE: Duration = Duration::from_millis(100);
pub const DIMMER_DEFAULT_SLEW_PER_TICK: f64 = 0.6;
pub const DIMMER_PORT_HINT: &str = "dimmer";

pub const BOARD_PORT_HINTS: [&str; 2] = ["board1", "board2"];
pub const BOARD_BAUD: u32 = 250_000;

pub const HTTP_BIND_ADDR: &str = "0.0.0.0:8080";

pub const SCENE_POLL_SLICE: Duration = Duration::from_millis(100);
pub const DOOR_POLL_SLICE: Duration = Duration::from_millis(100);
pub const STUCK_TASK_WARN_AFTER: Duration = Duration::from_secs(10);

pub const SOFT_SHUTDOWN_REBOOT_DELAY: Duration = Duration::from_secs(5);

/// Relay/solenoid pins driven to inactive on any shutdown, beyond the door
/// solenoids (which the door tasks themselves fail open). Grounded on
/// `control/system.py`'s shutdown routine, which walks a fixed pin list.
pub const RELAY_PINS: &[u8] = &[6, 7, 8, 9, 10, 11, 12, 13];

pub const HOUSE_LIGHT_FLASH_COUNT: u32 = 3;
pub const HOUSE_LIGHT_FLASH_PERIOD: Duration = Duration::from_millis(400);

/// Idle ambience task, grounded in `control/system.py`'s `shipAmbience`.
pub const AMBIENCE_CLIP: &str = "ambience_loop.wav";
pub const AMBIENCE_CHANNEL: &str = "stereo_mainHall";
pub const AMBIENCE_DIMMER_CHANNEL: usize = 1;
pub const AMBIENCE_FLICKER_INTERVAL: Duration = Duration::from_secs(45);

/// Per-door tuning, grounded on `control/doors.py`'s constant block.
#[derive(Debug, Clone, Copy)]
pub struct DoorTuning {
    pub sensor_id: &'static str,
    pub self_pass_ignore: Duration,
    pub enter_threshold_mm: i32,
    pub idle_window_ms: u64,
    pub idle_min_consecutive: u32,
    pub moving_window_ms: u64,
    pub moving_min_consecutive: u32,
    pub monitor_window: Duration,
    pub clear_hold: Duration,
    pub retry_delay: Duration,
}

pub const DOOR1_TUNING: DoorTuning = DoorTuning {
    sensor_id: "TOF3",
    self_pass_ignore: Duration::from_millis(1500),
    enter_threshold_mm: 1500,
    idle_window_ms: 500,
    idle_min_consecutive: 2,
    moving_window_ms: 900,
    moving_min_consecutive: 3,
    monitor_window: Duration::from_millis(6500),
    clear_hold: Duration::from_millis(1200),
    retry_delay: Duration::from_millis(1500),
};

pub const DOOR2_TUNING: DoorTuning = DoorTuning {
    sensor_id: "TOF4",
    self_pass_ignore: Duration::from_millis(1500),
    enter_threshold_mm: 1500,
    idle_window_ms: 500,
    idle_min_consecutive: 2,
    moving_window_ms: 900,
    moving_min_consecutive: 3,
    monitor_window: Duration::from_millis(6500),
    clear_hold: Duration::from_millis(1200),
    retry_delay: Duration::from_millis(1500),
};

pub fn door_tuning(id: DoorId) -> &'static DoorTuning {
    match id {
        DoorId::Door1 => &DOOR1_TUNING,
        DoorId::Door2 => &DOOR2_TUNING,
    }
}

pub fn door_solenoid_pin(id: DoorId) -> u8 {
    match id {
        DoorId::Door1 => 4,
        DoorId::Door2 => 5,
    }
}

/// The primary and secondary named-channel tables, grounded on
/// `control/audio_manager.py`'s `named_channels` dict, extended with the
/// stereo/dual-table shape the latest design calls for.
pub fn primary_channel_table() -> ChannelTable {
    let mut t = ChannelTable::new(Device::Primary);
    t.insert("frontLeft", ChannelEntry::mono(0, 1.0));
    t.insert("frontRight", ChannelEntry::mono(1, 1.0));
    t.insert("center", ChannelEntry::mono(2, 1.0));
    t.insert("subwoofer", ChannelEntry::mono(3, 0.9));
    t.insert("gangway", ChannelEntry::mono(4, 1.0));
    t.insert("stereo_mainHall", ChannelEntry::stereo_pair(0, 1, 1.0));
    t
}

pub fn secondary_channel_table() -> ChannelTable {
    let mut t = ChannelTable::new(Device::Secondary);
    t.insert("swampRoom", ChannelEntry::mono(0, 1.0));
    t.insert("atticSpeaker", ChannelEntry::mono(1, 1.0));
    t.insert("dungeon", ChannelEntry::mono(2, 1.0));
    t.insert("closetCreak", ChannelEntry::mono(3, 1.0));
    t.insert("stereo_cargoHold_L", ChannelEntry::mono(4, 1.0));
    t.insert("stereo_cargoHold_R", ChannelEntry::mono(5, 1.0));
    t.insert("graveyard", ChannelEntry::mono(6, 1.0));
    t
}

/// External command used to synthesize speech, invoked as
/// `<TTS_COMMAND> <text> <output_wav_path>`.
pub const TTS_COMMAND: &str = "espeak-ng";
