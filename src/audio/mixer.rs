//! The multichannel audio mixer: opens device streams and routes playback
//! sessions to fixed channel indices, with epoch-based cancellation.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use dasp_sample::FromSample;
use tracing::{debug, info, warn};

use crate::config::{PLAYBACK_BLOCK_FRAMES, SAMPLE_RATE_HZ};
use crate::state::HouseState;

use super::channel_map::{ChannelMap, ChannelTarget, Device as ChannelDevice};
use super::clip::Clip;
use super::resample::LinearResampler;
use super::session::{PlaybackMode, SessionHandle};

/// One of the two fixed-index output devices, resolved to a concrete cpal
/// device at startup via a name hint, falling back to the host default.
struct OpenedDevice {
    device: cpal::Device,
    channels: u16,
}

fn open_device_by_hint(host: &cpal::Host, name_hint: &str) -> Result<OpenedDevice> {
    let devices = host.output_devices().context("enumerating output devices")?;
    let mut chosen = None;
    for d in devices {
        if let Ok(name) = d.name() {
            if name.to_lowercase().contains(&name_hint.to_lowercase()) {
                chosen = Some(d);
                break;
            }
        }
    }

    let device = match chosen {
        Some(d) => {
            info!("resolved output device for hint '{}': {:?}", name_hint, d.name());
            d
        }
        None => {
            warn!(
                "no output device matched hint '{}', falling back to system default",
                name_hint
            );
            host.default_output_device()
                .ok_or_else(|| anyhow!("no default output device available"))?
        }
    };

    let channels = device
        .default_output_config()
        .context("querying default output config")?
        .channels();

    Ok(OpenedDevice { device, channels })
}

/// Negotiate a stream config, trying strategies in order: requested rate at
/// a small (low-latency) buffer, requested rate at the default buffer, the
/// device's default config outright, then the host default device. Each
/// attempt is logged; the first to succeed wins.
///
/// Takes an owned `device`/`channels` pair (not a borrow of the owning
/// mixer) so it can run entirely on the dedicated per-session thread:
/// `cpal::Stream` is not `Send` on most backends, so the stream must be
/// built, played, and kept alive on the same thread throughout its life.
fn negotiate_stream<F>(
    device: &cpal::Device,
    channels: u16,
    requested_rate: u32,
    mut try_open: F,
) -> Result<cpal::Stream>
where
    F: FnMut(&cpal::Device, &StreamConfig, SampleFormat) -> Result<cpal::Stream>,
{
    let default_config = device
        .default_output_config()
        .context("querying default output config")?;
    let sample_format = default_config.sample_format();

    let attempts: Vec<(&str, StreamConfig)> = vec![
        (
            "requested rate, small buffer",
            StreamConfig {
                channels,
                sample_rate: cpal::SampleRate(requested_rate),
                buffer_size: cpal::BufferSize::Fixed(PLAYBACK_BLOCK_FRAMES as u32 / 4),
            },
        ),
        (
            "requested rate, default buffer",
            StreamConfig {
                channels,
                sample_rate: cpal::SampleRate(requested_rate),
                buffer_size: cpal::BufferSize::Default,
            },
        ),
        ("device default config", default_config.config()),
    ];

    for (label, config) in &attempts {
        debug!("trying stream open strategy: {}", label);
        match try_open(device, config, sample_format) {
            Ok(stream) => {
                info!("stream opened via strategy: {}", label);
                return Ok(stream);
            }
            Err(e) => {
                warn!("stream open strategy '{}' failed: {:#}", label, e);
            }
        }
    }

    debug!("trying stream open strategy: system default device");
    let fallback_device = cpal::default_host()
        .default_output_device()
        .ok_or_else(|| anyhow!("no default output device available"))?;
    let fallback_config = fallback_device
        .default_output_config()
        .context("querying fallback device default config")?;
    let stream = try_open(
        &fallback_device,
        &fallback_config.config(),
        fallback_config.sample_format(),
    )
    .context("all stream-open strategies failed, including system default device")?;
    info!("stream opened via strategy: system default device");
    Ok(stream)
}

struct RoutedSource {
    resampler: LinearResampler,
    clip: Arc<Clip>,
    target: ChannelTarget,
    gain: f32,
    mode: PlaybackMode,
    looping: bool,
    device_channels: usize,
    /// Interleaved scratch buffer, `clip.channels` wide per frame.
    scratch: Vec<f32>,
}

impl RoutedSource {
    /// `samples` is interleaved at `self.clip.channels` per frame (one
    /// resampled frame per entry in `dest`'s frame axis).
    fn write_samples(&self, dest: &mut [f32], samples: &[f32]) {
        let src_channels = self.clip.channels.max(1);
        let frames = samples.len() / src_channels;
        for frame in 0..frames {
            let src_base = frame * src_channels;
            let base = frame * self.device_channels;
            match (self.mode, self.target) {
                (PlaybackMode::One, ChannelTarget::Mono(idx)) => {
                    let value = samples[src_base] * self.gain;
                    if idx < self.device_channels {
                        dest[base + idx] = value;
                    }
                }
                (PlaybackMode::Stereo, ChannelTarget::Stereo(l, r)) => {
                    let l_src = samples[src_base] * self.gain;
                    let r_src = samples[src_base + (1.min(src_channels - 1))] * self.gain;
                    if l < self.device_channels {
                        dest[base + l] = l_src;
                    }
                    if r < self.device_channels {
                        dest[base + r] = r_src;
                    }
                }
                (PlaybackMode::All, _) => {
                    let value = (0..src_channels).map(|c| samples[src_base + c]).sum::<f32>()
                        / src_channels as f32
                        * self.gain;
                    for c in 0..self.device_channels {
                        dest[base + c] = value;
                    }
                }
                _ => {}
            }
        }
    }

    /// Fill one interleaved output block. Returns false once a
    /// non-looping source is exhausted.
    fn fill_block(&mut self, out: &mut [f32]) -> bool {
        let out_frames = out.len() / self.device_channels;
        let src_channels = self.clip.channels.max(1);
        out.fill(0.0);

        self.scratch.resize(out_frames * src_channels, 0.0);
        let produced = self
            .resampler
            .process(&self.clip.samples, &mut self.scratch, out_frames);
        self.write_samples(out, &self.scratch[..produced * src_channels]);

        if produced >= out_frames {
            return true;
        }

        if !self.looping || self.clip.is_empty() {
            return false;
        }

        // Looping: rewind and fill the remainder of this block so playback
        // has no silent gap at the seam.
        self.resampler.reset();
        let remaining = out_frames - produced;
        let mut tail = vec![0.0f32; remaining * src_channels];
        let more = self.resampler.process(&self.clip.samples, &mut tail, remaining);
        let tail_dest = &mut out[produced * self.device_channels..];
        self.write_samples(tail_dest, &tail[..more * src_channels]);
        true
    }
}

/// Per-session cancellation context, captured by value into the `'static`
/// device callback (no reference to the owning [`AudioMixer`] is held).
struct CancelContext {
    house: Arc<HouseState>,
    cutoff_epoch: Arc<AtomicU64>,
    stop_event: Arc<AtomicBool>,
}

/// Routes playback sessions to one of two fixed output devices, with
/// epoch-gated cancellation shared across all active sessions.
pub struct AudioMixer {
    house: Arc<HouseState>,
    channel_map: ChannelMap,
    primary: OpenedDevice,
    secondary: OpenedDevice,
    host: cpal::Host,
    epoch: AtomicU64,
    cutoff_epoch: Arc<AtomicU64>,
    stop_event: Arc<AtomicBool>,
    active: Mutex<Vec<Arc<SessionHandle>>>,
}

impl AudioMixer {
    pub fn new(
        house: Arc<HouseState>,
        channel_map: ChannelMap,
        primary_hint: &str,
        secondary_hint: &str,
    ) -> Result<Self> {
        let host = cpal::default_host();
        let primary = open_device_by_hint(&host, primary_hint)?;
        let secondary = open_device_by_hint(&host, secondary_hint)?;

        Ok(Self {
            house,
            channel_map,
            primary,
            secondary,
            host,
            epoch: AtomicU64::new(0),
            cutoff_epoch: Arc::new(AtomicU64::new(0)),
            stop_event: Arc::new(AtomicBool::new(false)),
            active: Mutex::new(Vec::new()),
        })
    }

    fn next_epoch(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn device_for(&self, kind: ChannelDevice) -> &OpenedDevice {
        match kind {
            ChannelDevice::Primary => &self.primary,
            ChannelDevice::Secondary => &self.secondary,
        }
    }

    /// Play a named, routed clip at the channel table's configured gain.
    /// Blocks until completion when `threaded==false`; otherwise returns
    /// immediately with the session handle while playback continues on a
    /// dedicated thread.
    pub fn play_audio(
        &self,
        name: &str,
        clip: Arc<Clip>,
        looping: bool,
        threaded: bool,
    ) -> Result<Arc<SessionHandle>> {
        self.play_audio_with_gain(name, clip, 1.0, looping, threaded)
    }

    /// Like [`Self::play_audio`], but multiplies the channel table's
    /// configured gain by `gain_mult` for this call, letting a cue override
    /// its own level (e.g. a quieter background loop under a louder cue).
    pub fn play_audio_with_gain(
        &self,
        name: &str,
        clip: Arc<Clip>,
        gain_mult: f32,
        looping: bool,
        threaded: bool,
    ) -> Result<Arc<SessionHandle>> {
        let resolved = self
            .channel_map
            .resolve(name)
            .ok_or_else(|| anyhow!("unknown channel target: {name}"))?;

        self.play_routed(
            resolved.device,
            resolved.target,
            PlaybackMode::from_target(resolved.target),
            resolved.gain * gain_mult,
            clip,
            looping,
            true,
            true,
            threaded,
            name.to_string(),
        )
    }

    /// Play a clip duplicated to every channel of `device`. Used by TTS and
    /// by full-house broadcast cues; TTS always passes
    /// `honor_shutdown=false, honor_breakcheck=false`.
    #[allow(clippy::too_many_arguments)]
    pub fn play_broadcast(
        &self,
        device: ChannelDevice,
        clip: Arc<Clip>,
        gain: f32,
        looping: bool,
        honor_shutdown: bool,
        honor_breakcheck: bool,
        threaded: bool,
        label: String,
    ) -> Result<Arc<SessionHandle>> {
        self.play_routed(
            device,
            ChannelTarget::Mono(0),
            PlaybackMode::All,
            gain,
            clip,
            looping,
            honor_shutdown,
            honor_breakcheck,
            threaded,
            label,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn play_routed(
        &self,
        device_kind: ChannelDevice,
        target: ChannelTarget,
        mode: PlaybackMode,
        gain: f32,
        clip: Arc<Clip>,
        looping: bool,
        honor_shutdown: bool,
        honor_breakcheck: bool,
        threaded: bool,
        label: String,
    ) -> Result<Arc<SessionHandle>> {
        let epoch = self.next_epoch();
        let session = SessionHandle::new(epoch, label, honor_shutdown, honor_breakcheck);
        self.active.lock().unwrap().push(session.clone());

        let opened = self.device_for(device_kind);
        let device = opened.device.clone();
        let device_channels = opened.channels as usize;

        let mut source = RoutedSource {
            resampler: LinearResampler::new(clip.sample_rate, SAMPLE_RATE_HZ, clip.channels.max(1)),
            clip,
            target,
            gain,
            mode,
            looping,
            device_channels,
            scratch: Vec::new(),
        };

        let ctx = CancelContext {
            house: self.house.clone(),
            cutoff_epoch: self.cutoff_epoch.clone(),
            stop_event: self.stop_event.clone(),
        };
        let session_for_stream = session.clone();

        let callback = move |data: &mut [f32]| {
            let should_stop = session_for_stream.should_stop(
                ctx.house.break_check(),
                ctx.cutoff_epoch.load(Ordering::Acquire),
                ctx.stop_event.load(Ordering::Acquire),
            );
            if should_stop {
                data.fill(0.0);
                session_for_stream.mark_done();
                return;
            }
            if !source.fill_block(data) {
                session_for_stream.mark_done();
            }
        };

        // `cpal::Stream` is not `Send` on most backends, so negotiation,
        // building, and playing the stream all happen on the dedicated
        // session thread; only the open result crosses back synchronously.
        let (open_tx, open_rx) = crossbeam_channel::bounded::<Result<()>>(1);
        let session_for_stream = session.clone();
        let session_for_thread = session.clone();

        std::thread::Builder::new()
            .name("audio-session".to_string())
            .spawn(move || {
                let opened = negotiate_stream(&device, device_channels as u16, SAMPLE_RATE_HZ, {
                    let boxed: Box<dyn FnMut(&mut [f32]) + Send> = Box::new(callback);
                    let callback = Arc::new(Mutex::new(boxed));
                    move |dev, config, format| {
                        build_stream_for_format(dev, config, format, callback.clone())
                    }
                });

                let stream = match opened {
                    Ok(s) => s,
                    Err(e) => {
                        let _ = open_tx.send(Err(e));
                        return;
                    }
                };

                if let Err(e) = stream.play().context("starting output stream") {
                    let _ = open_tx.send(Err(e));
                    return;
                }
                let _ = open_tx.send(Ok(()));

                while !session_for_thread.is_done() {
                    std::thread::sleep(Duration::from_millis(10));
                }
                drop(stream);
            })
            .context("spawning audio session thread")?;

        match open_rx.recv_timeout(Duration::from_secs(5)) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow!("timed out waiting for audio stream to open")),
        }

        if !threaded {
            while !session_for_stream.is_done() {
                std::thread::sleep(Duration::from_millis(10));
            }
        }

        Ok(session)
    }

    /// Snapshot the current epoch as the cutoff and request all
    /// `honor_shutdown` sessions started at or before it to exit, waiting
    /// up to `timeout` for them to report done.
    pub fn stop_all_audio(&self, timeout: Duration) {
        let snapshot = self.epoch.load(Ordering::Acquire);
        self.cutoff_epoch.store(snapshot, Ordering::Release);
        self.stop_event.store(true, Ordering::Release);

        let deadline = Instant::now() + timeout;
        loop {
            let all_done = {
                let active = self.active.lock().unwrap();
                active
                    .iter()
                    .filter(|s| s.honor_shutdown && s.epoch <= snapshot)
                    .all(|s| s.is_done())
            };
            if all_done || Instant::now() >= deadline {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }

        self.active.lock().unwrap().retain(|s| !s.is_done());
        self.stop_event.store(false, Ordering::Release);
    }
}

fn build_stream_for_format(
    device: &cpal::Device,
    config: &StreamConfig,
    format: SampleFormat,
    callback: Arc<Mutex<Box<dyn FnMut(&mut [f32]) + Send>>>,
) -> Result<cpal::Stream> {
    let err_fn = |e| warn!("audio stream error: {e}");

    macro_rules! build {
        ($sample_ty:ty) => {
            device.build_output_stream(
                config,
                move |data: &mut [$sample_ty], _| {
                    let mut scratch = vec![0.0f32; data.len()];
                    (callback.lock().unwrap())(&mut scratch);
                    for (dst, src) in data.iter_mut().zip(scratch.into_iter()) {
                        *dst = <$sample_ty>::from_sample(src);
                    }
                },
                err_fn,
                None,
            )
        };
    }

    let stream = match format {
        SampleFormat::F32 => build!(f32),
        SampleFormat::I16 => build!(i16),
        SampleFormat::U16 => build!(u16),
        _ => return Err(anyhow!("unsupported sample format: {:?}", format)),
    }
    .context("building output stream")?;

    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::channel_map::{ChannelEntry, ChannelTable, Device};

    fn mono_clip(samples: Vec<f32>) -> Arc<Clip> {
        Arc::new(Clip {
            samples,
            channels: 1,
            sample_rate: SAMPLE_RATE_HZ,
        })
    }

    #[test]
    fn routed_source_writes_mono_target_and_zeroes_others() {
        let clip = mono_clip(vec![1.0, 1.0, 1.0, 1.0]);
        let mut source = RoutedSource {
            resampler: LinearResampler::new(SAMPLE_RATE_HZ, SAMPLE_RATE_HZ, 1),
            clip,
            target: ChannelTarget::Mono(2),
            gain: 0.5,
            mode: PlaybackMode::One,
            looping: false,
            device_channels: 4,
            scratch: Vec::new(),
        };
        let mut out = vec![9.0f32; 8]; // 2 frames x 4 channels
        source.fill_block(&mut out);
        assert_eq!(out[0], 0.0);
        assert_eq!(out[1], 0.0);
        assert!((out[2] - 0.5).abs() < 1e-6);
        assert_eq!(out[3], 0.0);
    }

    #[test]
    fn routed_source_stereo_duplicates_mono_to_both_channels() {
        let clip = mono_clip(vec![1.0, 1.0]);
        let mut source = RoutedSource {
            resampler: LinearResampler::new(SAMPLE_RATE_HZ, SAMPLE_RATE_HZ, 1),
            clip,
            target: ChannelTarget::Stereo(0, 1),
            gain: 1.0,
            mode: PlaybackMode::Stereo,
            looping: false,
            device_channels: 2,
            scratch: Vec::new(),
        };
        let mut out = vec![0.0f32; 2];
        source.fill_block(&mut out);
        assert_eq!(out[0], 1.0);
        assert_eq!(out[1], 1.0);
    }

    #[test]
    fn non_looping_source_reports_exhaustion() {
        let clip = mono_clip(vec![1.0]);
        let mut source = RoutedSource {
            resampler: LinearResampler::new(SAMPLE_RATE_HZ, SAMPLE_RATE_HZ, 1),
            clip,
            target: ChannelTarget::Mono(0),
            gain: 1.0,
            mode: PlaybackMode::One,
            looping: false,
            device_channels: 1,
            scratch: Vec::new(),
        };
        let mut out = vec![0.0f32; 4];
        let still_playing = source.fill_block(&mut out);
        assert!(!still_playing);
    }

    #[test]
    fn looping_source_wraps_without_exhaustion() {
        let clip = mono_clip(vec![1.0, 2.0]);
        let mut source = RoutedSource {
            resampler: LinearResampler::new(SAMPLE_RATE_HZ, SAMPLE_RATE_HZ, 1),
            clip,
            target: ChannelTarget::Mono(0),
            gain: 1.0,
            mode: PlaybackMode::One,
            looping: true,
            device_channels: 1,
            scratch: Vec::new(),
        };
        let mut out = vec![0.0f32; 5];
        let still_playing = source.fill_block(&mut out);
        assert!(still_playing);
    }

    fn stereo_clip(samples: Vec<f32>) -> Arc<Clip> {
        Arc::new(Clip {
            samples,
            channels: 2,
            sample_rate: SAMPLE_RATE_HZ,
        })
    }

    #[test]
    fn routed_source_stereo_source_writes_independent_l_r() {
        // Interleaved L,R frame: L=1.0, R=-1.0.
        let clip = stereo_clip(vec![1.0, -1.0]);
        let mut source = RoutedSource {
            resampler: LinearResampler::new(SAMPLE_RATE_HZ, SAMPLE_RATE_HZ, 2),
            clip,
            target: ChannelTarget::Stereo(0, 1),
            gain: 1.0,
            mode: PlaybackMode::Stereo,
            looping: false,
            device_channels: 2,
            scratch: Vec::new(),
        };
        let mut out = vec![0.0f32; 2];
        source.fill_block(&mut out);
        assert_eq!(out[0], 1.0);
        assert_eq!(out[1], -1.0);
    }

    fn sample_map() -> ChannelMap {
        let mut p = ChannelTable::new(Device::Primary);
        p.insert("gangway", ChannelEntry::mono(0, 1.0));
        ChannelMap::new(p, ChannelTable::new(Device::Secondary))
    }

    #[test]
    fn epoch_allocation_is_monotonic() {
        let epoch = AtomicU64::new(0);
        let e1 = epoch.fetch_add(1, Ordering::AcqRel) + 1;
        let e2 = epoch.fetch_add(1, Ordering::AcqRel) + 1;
        assert!(e1 < e2);
        let _ = sample_map();
    }
}
