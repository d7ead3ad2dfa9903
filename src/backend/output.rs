//! Post-processing shared by every backend: fade envelope, silence
//! detection, end-of-track latch and elapsed time.

/// Absolute sample value at or below which a frame counts as silent.
const SILENCE_THRESHOLD: u16 = 8;

#[derive(Debug, Clone, Copy)]
struct Fade {
    start_frame: u64,
    length_frames: u64,
}

impl Fade {
    /// Remaining gain as `(numerator, denominator)`, `None` once fully faded.
    fn gain(&self, frame: u64) -> Option<(i64, i64)> {
        let into = frame.saturating_sub(self.start_frame);
        if into >= self.length_frames {
            None
        } else {
            Some(((self.length_frames - into) as i64, self.length_frames as i64))
        }
    }
}

/// Output stage a backend pushes every raw stereo frame through.
#[derive(Debug, Clone)]
pub struct OutputStage {
    sample_rate: u32,
    frames: u64,
    fade: Option<Fade>,
    silence_timeout_frames: u64,
    silent_run: u64,
    ignore_silence: bool,
    ended: bool,
}

impl OutputStage {
    /// Stage for `sample_rate` Hz output ending tracks after `silence_timeout_ms` of silence.
    pub fn new(sample_rate: u32, silence_timeout_ms: u32) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            frames: 0,
            fade: None,
            silence_timeout_frames: ms_to_frames(silence_timeout_ms, sample_rate),
            silent_run: 0,
            ignore_silence: false,
            ended: false,
        }
    }

    /// Back to track-start defaults: no fade, silence detection on, not ended, time zero.
    pub fn restart(&mut self) {
        self.frames = 0;
        self.fade = None;
        self.silent_run = 0;
        self.ignore_silence = false;
        self.ended = false;
    }

    /// Start a linear fade to zero over `ms` from the current position. 0 clears the fade.
    pub fn set_fade(&mut self, ms: u32) {
        if ms == 0 {
            self.fade = None;
            return;
        }
        self.fade = Some(Fade {
            start_frame: self.frames,
            length_frames: ms_to_frames(ms, self.sample_rate).max(1),
        });
    }

    /// Drop any pending fade; following frames play at unity gain.
    pub fn reset_fade(&mut self) {
        self.fade = None;
    }

    /// Whether a fade is in progress.
    pub fn is_fading(&self) -> bool {
        self.fade.is_some()
    }

    /// Disable or re-enable the silence detector.
    pub fn ignore_silence(&mut self, ignore: bool) {
        self.ignore_silence = ignore;
        if ignore {
            self.silent_run = 0;
        }
    }

    /// Latch the end of the track. Every later frame is silent.
    pub fn end_track(&mut self) {
        self.ended = true;
    }

    /// Whether the track has ended.
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Output time since the last restart, in milliseconds.
    pub fn elapsed_ms(&self) -> u64 {
        self.frames * 1000 / self.sample_rate as u64
    }

    /// Apply gain and bookkeeping to one raw frame.
    pub fn process(&mut self, raw: [i16; 2]) -> [i16; 2] {
        if self.ended {
            return [0, 0];
        }

        if !self.ignore_silence {
            let silent = raw.iter().all(|s| s.unsigned_abs() <= SILENCE_THRESHOLD);
            if silent {
                self.silent_run += 1;
            } else {
                self.silent_run = 0;
            }
        }

        let out = match self.fade {
            None => raw,
            Some(fade) => match fade.gain(self.frames) {
                Some((num, den)) => [
                    (raw[0] as i64 * num / den) as i16,
                    (raw[1] as i64 * num / den) as i16,
                ],
                None => {
                    log::debug!("fade complete at {} ms", self.elapsed_ms());
                    self.ended = true;
                    [0, 0]
                }
            },
        };

        self.frames += 1;

        if !self.ignore_silence
            && self.silence_timeout_frames > 0
            && self.silent_run >= self.silence_timeout_frames
        {
            log::debug!("silence detected at {} ms", self.elapsed_ms());
            self.ended = true;
        }

        out
    }
}

fn ms_to_frames(ms: u32, sample_rate: u32) -> u64 {
    ms as u64 * sample_rate as u64 / 1000
}
