//! Audio-thread side of the engine.

use std::sync::Arc;

use parking_lot::Mutex;

use super::session::{RenderStatus, Session};

/// Cloneable handle that fills audio buffers without ever blocking.
///
/// If a control call holds the engine lock when a buffer is due, the
/// buffer is filled with silence and [`RenderStatus::Busy`] is returned.
#[derive(Clone)]
pub struct Renderer {
    session: Arc<Mutex<Session>>,
    sample_rate: u32,
    block_frames: usize,
}

impl Renderer {
    pub(crate) fn new(session: Arc<Mutex<Session>>) -> Self {
        let (sample_rate, block_frames) = {
            let guard = session.lock();
            (guard.config.sample_rate, guard.config.block_frames)
        };
        Self {
            session,
            sample_rate,
            block_frames,
        }
    }

    /// Fill `out` with interleaved stereo samples. Always writes the whole buffer.
    pub fn fill(&self, out: &mut [i16]) -> RenderStatus {
        match self.session.try_lock() {
            Some(mut session) => session.render(out),
            None => {
                out.fill(0);
                RenderStatus::Busy
            }
        }
    }

    /// Output sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Preferred buffer size in stereo frames.
    pub fn block_frames(&self) -> usize {
        self.block_frames
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("sample_rate", &self.sample_rate)
            .field("block_frames", &self.block_frames)
            .finish()
    }
}
