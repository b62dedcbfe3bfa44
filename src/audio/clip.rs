//! Audio file decoding via `symphonia`.
//!
//! Decoding is a one-shot, off-the-real-time-path operation: a [`Clip`] is a
//! fully decoded, interleaved `f32` PCM buffer at the file's native sample
//! rate and channel count. Per-session playback resamples this buffer to the
//! stream's actual rate at stream-open time (see [`super::resample`]).

use std::fs::File;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// A fully decoded audio source, interleaved `f32` PCM.
#[derive(Clone)]
pub struct Clip {
    pub samples: Vec<f32>,
    pub channels: usize,
    pub sample_rate: u32,
}

impl Clip {
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("opening audio file {}", path.display()))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .context("probing audio format")?;

        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| anyhow!("no supported audio track in {}", path.display()))?
            .clone();

        let track_id = track.id;
        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| anyhow!("{} has unknown sample rate", path.display()))?;
        let channels = track
            .codec_params
            .channels
            .map(|c| c.count())
            .unwrap_or(1)
            .max(1);

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .context("creating audio decoder")?;

        let mut samples: Vec<f32> = Vec::new();

        loop {
            let packet = match format.next_packet() {
                Ok(p) => p,
                Err(symphonia::core::errors::Error::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(e) => return Err(e.into()),
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(d) => d,
                Err(symphonia::core::errors::Error::DecodeError(_)) => continue,
                Err(e) => return Err(e.into()),
            };

            extract_interleaved(&decoded, channels, &mut samples);
        }

        Ok(Clip {
            samples,
            channels,
            sample_rate,
        })
    }
}

fn extract_interleaved(decoded: &AudioBufferRef, channels: usize, out: &mut Vec<f32>) {
    macro_rules! push_normalized {
        ($buf:expr, $to_f32:expr) => {{
            let num_channels = $buf.spec().channels.count();
            let num_frames = $buf.frames();
            for frame_idx in 0..num_frames {
                for ch in 0..channels {
                    let src_ch = ch % num_channels;
                    out.push($to_f32($buf.chan(src_ch)[frame_idx]));
                }
            }
        }};
    }

    match decoded {
        AudioBufferRef::F32(buf) => push_normalized!(buf, |v: f32| v),
        AudioBufferRef::S16(buf) => push_normalized!(buf, |v: i16| v as f32 / 32768.0),
        AudioBufferRef::S32(buf) => push_normalized!(buf, |v: i32| v as f32 / 2147483648.0),
        AudioBufferRef::U8(buf) => push_normalized!(buf, |v: u8| (v as f32 - 128.0) / 128.0),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_test_wav(path: &std::path::Path, sample_rate: u32, samples: &[i16]) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn decodes_mono_wav_to_normalized_f32() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_test_wav(&path, 48_000, &[0, 16384, -16384, 32767]);

        let clip = Clip::open(&path).unwrap();
        assert_eq!(clip.channels, 1);
        assert_eq!(clip.sample_rate, 48_000);
        assert_eq!(clip.frames(), 4);
        assert!((clip.samples[1] - 0.5).abs() < 0.01);
    }
}
