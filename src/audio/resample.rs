//! Real-time linear-interpolation resampler.
//!
//! Per the mixer's stream-lifecycle contract: a session's source is
//! resampled to the stream's *actual* sample rate (discovered at stream
//! open, which may differ from the source's native rate) using linear
//! interpolation between sample points. This is deliberately simpler than
//! the FFT-based resampling used for one-shot offline decode, since it runs
//! on every playback block.

/// Interleaved linear-interpolation resampler for a fixed channel count.
pub struct LinearResampler {
    channels: usize,
    ratio: f64, // source_rate / target_rate
    pos: f64,   // fractional read position, in source frames
}

impl LinearResampler {
    pub fn new(source_rate: u32, target_rate: u32, channels: usize) -> Self {
        Self {
            channels,
            ratio: source_rate as f64 / target_rate as f64,
            pos: 0.0,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.ratio == 1.0
    }

    /// Reset the read cursor, e.g. when a looping session rewinds.
    pub fn reset(&mut self) {
        self.pos = 0.0;
    }

    /// Pull `out_frames` frames into `out` (interleaved, `self.channels`
    /// wide) by linearly interpolating `source` (also interleaved).
    /// Returns the number of frames actually produced before the source was
    /// exhausted (less than `out_frames` means the source ran out).
    pub fn process(&mut self, source: &[f32], out: &mut [f32], out_frames: usize) -> usize {
        let ch = self.channels;
        let source_frames = source.len() / ch;
        if source_frames == 0 {
            return 0;
        }

        let mut produced = 0;
        for frame in 0..out_frames {
            let idx = self.pos;
            let i0 = idx.floor() as usize;
            if i0 + 1 >= source_frames {
                if i0 >= source_frames {
                    break;
                }
                // Last frame: no next sample to interpolate with, hold it.
                for c in 0..ch {
                    out[frame * ch + c] = source[i0 * ch + c];
                }
                self.pos += self.ratio;
                produced += 1;
                continue;
            }

            let frac = (idx - i0 as f64) as f32;
            for c in 0..ch {
                let a = source[i0 * ch + c];
                let b = source[(i0 + 1) * ch + c];
                out[frame * ch + c] = a + (b - a) * frac;
            }
            self.pos += self.ratio;
            produced += 1;
        }

        produced
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_ratio_passes_through() {
        let mut r = LinearResampler::new(48_000, 48_000, 1);
        assert!(r.is_identity());
        let source = vec![0.0, 1.0, 2.0, 3.0];
        let mut out = vec![0.0; 4];
        let produced = r.process(&source, &mut out, 4);
        assert_eq!(produced, 4);
        assert_eq!(out, source);
    }

    #[test]
    fn upsampling_interpolates_between_points() {
        // Source at half the target rate: each source frame should appear
        // twice, with a midpoint in between.
        let mut r = LinearResampler::new(24_000, 48_000, 1);
        let source = vec![0.0, 10.0];
        let mut out = vec![0.0; 2];
        let produced = r.process(&source, &mut out, 2);
        assert_eq!(produced, 2);
        assert_eq!(out[0], 0.0);
        assert!((out[1] - 5.0).abs() < 1e-6);
    }

    #[test]
    fn stops_at_source_exhaustion() {
        let mut r = LinearResampler::new(48_000, 48_000, 1);
        let source = vec![1.0, 2.0];
        let mut out = vec![0.0; 8];
        let produced = r.process(&source, &mut out, 8);
        assert_eq!(produced, 2);
    }

    #[test]
    fn reset_rewinds_cursor() {
        let mut r = LinearResampler::new(48_000, 48_000, 1);
        let source = vec![1.0, 2.0, 3.0];
        let mut out = vec![0.0; 2];
        r.process(&source, &mut out, 2);
        r.reset();
        let mut out2 = vec![0.0; 1];
        r.process(&source, &mut out2, 1);
        assert_eq!(out2[0], source[0]);
    }
}
