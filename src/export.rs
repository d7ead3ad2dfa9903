//! WAV export of engine output.

use std::path::Path;

use crate::engine::{PlaybackEngine, RenderStatus};
use crate::Result;

/// Render the current track from the engine into a 16-bit stereo WAV file.
///
/// Starts playback if needed and stops after `max_seconds` or when the
/// track ends, whichever comes first. Returns the number of stereo frames
/// written. Transport preferences (mute, tempo, fades) apply as usual.
///
/// ```no_run
/// use squarewave::{export::render_to_wav, PlaybackEngine};
///
/// # fn main() -> squarewave::Result<()> {
/// let engine = PlaybackEngine::new();
/// engine.set_file("song.ym")?;
/// engine.set_fade_time(5_000);
/// let frames = render_to_wav(&engine, "song.wav", 60.0)?;
/// # Ok(())
/// # }
/// ```
pub fn render_to_wav(
    engine: &PlaybackEngine,
    output_path: impl AsRef<Path>,
    max_seconds: f64,
) -> Result<u64> {
    let sample_rate = engine.sample_rate();
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    engine.play()?;
    let total_frames = (max_seconds.max(0.0) * sample_rate as f64) as u64;
    let block_frames = engine.config().block_frames;
    let mut buffer = vec![0i16; block_frames * 2];
    let mut writer = hound::WavWriter::create(output_path.as_ref(), spec)?;
    let mut frames_written = 0u64;

    while frames_written < total_frames {
        let frames = (total_frames - frames_written).min(block_frames as u64) as usize;
        let chunk = &mut buffer[..frames * 2];
        let status = engine.fill_buffer(chunk);
        for &sample in chunk.iter() {
            writer.write_sample(sample)?;
        }
        frames_written += frames as u64;
        if status != RenderStatus::Rendered {
            break;
        }
    }

    writer.finalize()?;
    log::info!(
        "wrote {} frames ({:.1}s) to {}",
        frames_written,
        frames_written as f64 / sample_rate as f64,
        output_path.as_ref().display()
    );
    Ok(frames_written)
}

#[cfg(all(test, feature = "ym-format"))]
mod tests {
    use super::*;
    use crate::backend::ym::parser::tests::{build_ym6, tone_regs};

    #[test]
    fn test_export_length_and_format() {
        let engine = PlaybackEngine::new();
        engine
            .set_file_bytes(&build_ym6(100, 0, "Export", tone_regs()))
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");

        let frames = render_to_wav(&engine, &path, 0.5).unwrap();
        assert_eq!(frames, 22_050);

        let reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 44_100);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(reader.len(), 44_100);
    }

    #[test]
    fn test_export_stops_at_fade_end() {
        let engine = PlaybackEngine::new();
        engine
            .set_file_bytes(&build_ym6(100, 0, "Fade", tone_regs()))
            .unwrap();
        engine.set_fade_time(100);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fade.wav");

        let frames = render_to_wav(&engine, &path, 5.0).unwrap();
        assert!(frames < 44_100);
        assert!(frames >= 4_410);
    }

    #[test]
    fn test_export_without_file() {
        let engine = PlaybackEngine::new();
        let dir = tempfile::tempdir().unwrap();
        let err = render_to_wav(&engine, dir.path().join("x.wav"), 1.0).unwrap_err();
        assert!(matches!(err, crate::Error::NotReady));
    }
}
