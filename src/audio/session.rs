//! A single playback session's bookkeeping.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::channel_map::ChannelTarget;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackMode {
    /// Mono source written to a single physical channel.
    One,
    /// Mono or stereo source written to an L/R pair.
    Stereo,
    /// Source duplicated to every channel of the device (broadcast).
    All,
}

impl PlaybackMode {
    pub fn from_target(target: ChannelTarget) -> Self {
        match target {
            ChannelTarget::Mono(_) => PlaybackMode::One,
            ChannelTarget::Stereo(_, _) => PlaybackMode::Stereo,
        }
    }
}

/// Shared, per-session cancellation/diagnostic state. Cheap to clone (an
/// `Arc` around a handful of atomics) so both the mixer's active-session
/// registry and the device-callback thread can hold a reference.
pub struct SessionHandle {
    pub epoch: u64,
    pub label: String,
    pub honor_shutdown: bool,
    pub honor_breakcheck: bool,
    done: AtomicBool,
}

impl SessionHandle {
    pub fn new(epoch: u64, label: impl Into<String>, honor_shutdown: bool, honor_breakcheck: bool) -> Arc<Self> {
        Arc::new(Self {
            epoch,
            label: label.into(),
            honor_shutdown,
            honor_breakcheck,
            done: AtomicBool::new(false),
        })
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    pub fn mark_done(&self) {
        self.done.store(true, Ordering::Release);
    }

    /// Should this session stop, given the current cancellation context?
    pub fn should_stop(&self, house_break_check: bool, cutoff_epoch: u64, stop_event: bool) -> bool {
        if self.honor_breakcheck && house_break_check {
            return true;
        }
        if self.honor_shutdown && (self.epoch <= cutoff_epoch || stop_event) {
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tts_session_ignores_shutdown_and_breakcheck() {
        let s = SessionHandle::new(1, "tts", false, false);
        assert!(!s.should_stop(true, 100, true));
    }

    #[test]
    fn normal_session_stops_on_breakcheck() {
        let s = SessionHandle::new(1, "scene", true, true);
        assert!(s.should_stop(true, 0, false));
    }

    #[test]
    fn normal_session_stops_when_epoch_at_or_below_cutoff() {
        let s = SessionHandle::new(5, "scene", true, true);
        assert!(s.should_stop(false, 5, false));
        assert!(s.should_stop(false, 10, false));
    }

    #[test]
    fn session_started_after_cutoff_survives() {
        let s = SessionHandle::new(11, "scene", true, true);
        assert!(!s.should_stop(false, 10, false));
    }
}
