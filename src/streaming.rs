//! Real-time output through rodio.
//!
//! [`RendererSource`] pulls blocks from a [`Renderer`] on the audio thread.
//! It never ends on its own; the control side drives the transport.

use std::time::Duration;

use rodio::{OutputStream, OutputStreamHandle, Sink, Source};

use crate::engine::Renderer;
use crate::{Error, Result};

/// Endless rodio source over an engine renderer.
pub struct RendererSource {
    renderer: Renderer,
    buffer: Vec<i16>,
    cursor: usize,
}

impl RendererSource {
    /// Source rendering `renderer.block_frames()` frames per refill.
    pub fn new(renderer: Renderer) -> Self {
        let buffer = vec![0; renderer.block_frames().max(1) * 2];
        let cursor = buffer.len();
        Self {
            renderer,
            buffer,
            cursor,
        }
    }
}

impl Iterator for RendererSource {
    type Item = i16;

    fn next(&mut self) -> Option<i16> {
        if self.cursor >= self.buffer.len() {
            self.renderer.fill(&mut self.buffer);
            self.cursor = 0;
        }
        let sample = self.buffer[self.cursor];
        self.cursor += 1;
        Some(sample)
    }
}

impl Source for RendererSource {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        2
    }

    fn sample_rate(&self) -> u32 {
        self.renderer.sample_rate()
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

/// Default output device playing one renderer.
pub struct AudioDevice {
    _stream: OutputStream,
    _handle: OutputStreamHandle,
    sink: Sink,
}

impl AudioDevice {
    /// Open the default device and start pulling from `renderer`.
    pub fn start(renderer: Renderer) -> Result<Self> {
        let (stream, handle) = OutputStream::try_default()
            .map_err(|e| Error::Other(format!("audio device unavailable: {}", e)))?;
        let sink = Sink::try_new(&handle)
            .map_err(|e| Error::Other(format!("failed to create sink: {}", e)))?;
        sink.append(RendererSource::new(renderer));
        log::debug!("audio output started");
        Ok(Self {
            _stream: stream,
            _handle: handle,
            sink,
        })
    }

    /// Output volume, 1.0 is unity.
    pub fn set_volume(&self, volume: f32) {
        self.sink.set_volume(volume);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PlaybackEngine;

    #[test]
    fn test_source_is_endless_stereo() {
        let engine = PlaybackEngine::new();
        let mut source = RendererSource::new(engine.renderer());
        assert_eq!(source.channels(), 2);
        assert_eq!(source.sample_rate(), 44_100);
        let samples: Vec<i16> = source.by_ref().take(5_000).collect();
        assert_eq!(samples.len(), 5_000);
        assert!(samples.iter().all(|&s| s == 0));
        assert!(source.total_duration().is_none());
    }
}
