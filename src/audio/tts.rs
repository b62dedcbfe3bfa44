//! Text-to-speech playback: synthesize to a temp WAV via an external
//! command, then broadcast it immune to shutdown and `BreakCheck` — a TTS
//! line (e.g. a safety announcement) must finish even if the house is
//! mid-shutdown.

use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::warn;

use crate::config::TTS_COMMAND;

use super::channel_map::Device;
use super::clip::Clip;
use super::mixer::AudioMixer;
use super::session::SessionHandle;

/// Synthesize `text` and play it back. A `"name: text"` prefix routes the
/// utterance to the named channel instead of broadcasting it; otherwise the
/// whole string is spoken and duplicated to every channel of `device`.
/// Always threaded: the caller gets a handle back immediately and playback
/// continues independently.
pub fn speak(mixer: &AudioMixer, device: Device, text: &str, gain: f32) -> Result<Arc<SessionHandle>> {
    let (channel, spoken) = split_named_channel(text);

    let tmp = tempfile::Builder::new()
        .prefix("tts-")
        .suffix(".wav")
        .tempfile()
        .context("creating temp file for TTS synthesis")?;
    let wav_path = tmp.path().to_path_buf();

    let status = Command::new(TTS_COMMAND)
        .arg(spoken)
        .arg(&wav_path)
        .status()
        .with_context(|| format!("invoking TTS command {TTS_COMMAND}"))?;
    if !status.success() {
        return Err(anyhow::anyhow!("{TTS_COMMAND} exited with {status}"));
    }

    let clip = Arc::new(Clip::open(&wav_path).context("decoding synthesized TTS audio")?);

    let session = match channel {
        Some(name) => mixer.play_audio_with_gain(name, clip, gain, false, true)?,
        None => mixer.play_broadcast(
            device,
            clip,
            gain,
            false,
            false,
            false,
            true,
            format!("tts:{}", truncate_for_label(spoken)),
        )?,
    };

    // Playback reads the decoded in-memory clip, not the file; safe to
    // remove as soon as the session has started.
    if let Err(e) = remove_temp(&wav_path) {
        warn!("failed to remove TTS temp file {}: {}", wav_path.display(), e);
    }
    // Keep `tmp` alive until here so the destructor doesn't race the
    // explicit removal above.
    drop(tmp);

    Ok(session)
}

/// Splits a `"name: text"` prefix off an utterance. The prefix counts as a
/// channel name only if it's non-empty and has no whitespace of its own;
/// otherwise the colon is just punctuation and the whole string is spoken.
fn split_named_channel(text: &str) -> (Option<&str>, &str) {
    if let Some((prefix, rest)) = text.split_once(':') {
        let prefix = prefix.trim();
        if !prefix.is_empty() && !prefix.contains(char::is_whitespace) {
            return (Some(prefix), rest.trim_start());
        }
    }
    (None, text)
}

fn truncate_for_label(text: &str) -> String {
    text.chars().take(24).collect()
}

fn remove_temp(path: &Path) -> std::io::Result<()> {
    if path.exists() {
        std::fs::remove_file(path)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_for_label_caps_length() {
        let long = "a".repeat(100);
        assert_eq!(truncate_for_label(&long).len(), 24);
    }

    #[test]
    fn truncate_for_label_keeps_short_text() {
        assert_eq!(truncate_for_label("hi"), "hi");
    }

    #[test]
    fn split_named_channel_extracts_prefix() {
        let (channel, rest) = split_named_channel("gangway: mind the gap");
        assert_eq!(channel, Some("gangway"));
        assert_eq!(rest, "mind the gap");
    }

    #[test]
    fn split_named_channel_falls_back_to_broadcast() {
        let (channel, rest) = split_named_channel("the ship is sinking: evacuate");
        assert_eq!(channel, None);
        assert_eq!(rest, "the ship is sinking: evacuate");
    }

    #[test]
    fn split_named_channel_handles_no_colon() {
        let (channel, rest) = split_named_channel("all hands on deck");
        assert_eq!(channel, None);
        assert_eq!(rest, "all hands on deck");
    }
}
