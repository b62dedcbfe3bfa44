//! Boot, online, shutdown, and reboot orchestration.
//!
//! Grounded on `control/system.py`'s top-level loop: open persistent
//! hardware links once, then repeatedly bring non-persistent services
//! online, wait for a shutdown request, drive everything to a safe state,
//! and reboot back into `ONLINE`.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{info, warn};

use crate::audio::mixer::AudioMixer;
use crate::config::{
    self, AMBIENCE_CHANNEL, AMBIENCE_CLIP, AMBIENCE_DIMMER_CHANNEL, AMBIENCE_FLICKER_INTERVAL,
    HOUSE_LIGHT_FLASH_COUNT, HOUSE_LIGHT_FLASH_PERIOD, RELAY_PINS, SOFT_SHUTDOWN_REBOOT_DELAY,
};
use crate::dimmer::DimmerController;
use crate::doors::{self, DoorId};
use crate::hw::Boards;
use crate::scene::clips::ClipLibrary;
use crate::scene::RoomContext;
use crate::sensors::SensorBus;
use crate::state::{DoorState, HouseState, SystemState};

pub struct Supervisor {
    house: Arc<HouseState>,
    mixer: Arc<AudioMixer>,
    sensors: Arc<SensorBus>,
    dimmer: Arc<DimmerController>,
    boards: Arc<Boards>,
    clips: Arc<ClipLibrary>,
}

impl Supervisor {
    pub fn new(
        house: Arc<HouseState>,
        mixer: Arc<AudioMixer>,
        sensors: Arc<SensorBus>,
        dimmer: Arc<DimmerController>,
        boards: Arc<Boards>,
        clips: Arc<ClipLibrary>,
    ) -> Arc<Self> {
        Arc::new(Self {
            house,
            mixer,
            sensors,
            dimmer,
            boards,
            clips,
        })
    }

    pub fn house(&self) -> &Arc<HouseState> {
        &self.house
    }

    /// Everything a room script (or the engine) needs, bundled by value.
    pub fn room_context(&self) -> RoomContext {
        RoomContext {
            house: self.house.clone(),
            mixer: self.mixer.clone(),
            sensors: self.sensors.clone(),
            dimmer: self.dimmer.clone(),
            boards: self.boards.clone(),
            clips: self.clips.clone(),
        }
    }

    /// Boot once, then cycle through ONLINE -> shutdown -> REBOOT forever.
    /// Hardware links (boards, dimmer, sensor bus) are opened by the
    /// caller before constructing a `Supervisor`, since they persist across
    /// reboots; this only clears the boot flag and starts the cycle.
    pub fn run(self: &Arc<Self>) -> ! {
        info!("supervisor booting");
        self.house.clear_boot();

        loop {
            self.enter_online();
            self.block_while_online();
            self.shutdown_and_reboot();
        }
    }

    fn enter_online(self: &Arc<Self>) {
        info!("initializing non-persistent services");
        doors::spawn_doors(
            self.house.clone(),
            self.boards.m1.clone(),
            self.sensors.clone(),
        );

        self.house.set_system_state(SystemState::Online);
        self.house.set_house_lights(true);
        info!("system ONLINE");

        self.spawn_ambience();
    }

    fn block_while_online(&self) {
        while self.house.system_state() == SystemState::Online {
            std::thread::sleep(Duration::from_millis(200));
        }
    }

    fn shutdown_and_reboot(&self) {
        let kind = self.house.system_state();
        warn!("leaving ONLINE ({:?}), running shutdown routine", kind);

        self.house.set_house_active(false);
        self.mixer.stop_all_audio(Duration::from_millis(500));

        for pin in RELAY_PINS {
            self.boards.m1.digital_write(*pin, false);
        }
        for id in DoorId::ALL {
            self.house.set_door_target(id, DoorState::Open);
        }
        self.dimmer.set_all([0.0; config::DIMMER_CHANNELS]);

        self.flash_house_lights();

        match kind {
            SystemState::EmergencyShutoff => self.wait_for_operator_ack(),
            _ => std::thread::sleep(SOFT_SHUTDOWN_REBOOT_DELAY),
        }

        self.house.set_system_state(SystemState::Reboot);
        info!("rebooting");
    }

    fn flash_house_lights(&self) {
        for _ in 0..HOUSE_LIGHT_FLASH_COUNT {
            self.house.set_house_lights(false);
            std::thread::sleep(HOUSE_LIGHT_FLASH_PERIOD);
            self.house.set_house_lights(true);
            std::thread::sleep(HOUSE_LIGHT_FLASH_PERIOD);
        }
    }

    /// Block on console input until the operator types "SAFE", confirming
    /// it's safe to re-energize. Grounded on `control/system.py`'s
    /// emergency-shutdown console prompt.
    fn wait_for_operator_ack(&self) {
        warn!("emergency shutoff: waiting for operator to type SAFE");
        let mut line = String::new();
        loop {
            line.clear();
            if std::io::stdin().read_line(&mut line).is_err() {
                std::thread::sleep(Duration::from_secs(1));
                continue;
            }
            if line.trim().eq_ignore_ascii_case("safe") {
                return;
            }
        }
    }

    /// Cosmetic idle-loop task: runs only while `ONLINE` and neither a
    /// full house run nor a demo is active. Cancels the same way scene
    /// tasks do, by polling `BreakCheck`-equivalent conditions.
    fn spawn_ambience(self: &Arc<Self>) {
        let this = self.clone();
        std::thread::Builder::new()
            .name("ambience".to_string())
            .spawn(move || this.run_ambience())
            .expect("spawning ambience thread");
    }

    fn run_ambience(&self) {
        let mut rng = rand::thread_rng();
        while self.house.system_state() == SystemState::Online {
            if self.house.house_active() || self.house.demo() {
                std::thread::sleep(Duration::from_millis(200));
                continue;
            }

            if let Ok(clip) = self.clips.load(AMBIENCE_CLIP) {
                if let Err(e) = self.mixer.play_audio(AMBIENCE_CHANNEL, clip, true, true) {
                    warn!("ambience playback failed: {:#}", e);
                }
            }

            let wait = AMBIENCE_FLICKER_INTERVAL.mul_f64(rng.gen_range(0.7..1.3));
            let slept = self.poll_sleep_while_idle(wait);
            if slept {
                continue;
            }

            self.dimmer.flicker(
                AMBIENCE_DIMMER_CHANNEL,
                Duration::from_secs(3),
                5.0,
                20.0,
                Duration::from_millis(500),
                Duration::from_secs(2),
            );
        }
    }

    /// Sleep in short slices, bailing out early if the house stops being
    /// idle-online. Returns true if interrupted before `total` elapsed.
    fn poll_sleep_while_idle(&self, total: Duration) -> bool {
        let mut remaining = total;
        let slice = Duration::from_millis(200);
        while remaining > Duration::ZERO {
            if self.house.system_state() != SystemState::Online
                || self.house.house_active()
                || self.house.demo()
            {
                return true;
            }
            let step = remaining.min(slice);
            std::thread::sleep(step);
            remaining -= step;
        }
        false
    }
}
