//! End-to-end playback through the public engine API with synthetic YM files.
#![cfg(feature = "ym-format")]

use std::io::Write;

use squarewave::{
    EngineConfig, EngineState, Error, PlaybackEngine, RenderStatus, StereoMode, MAX_TEMPO,
    MIN_TEMPO,
};

/// Interleaved YM6 image holding `frames` copies of `regs`.
fn ym6(frames: u32, loop_frame: u32, title: &str, regs: [u8; 16]) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(b"YM6!LeOnArD!");
    data.extend_from_slice(&frames.to_be_bytes());
    data.extend_from_slice(&1u32.to_be_bytes());
    data.extend_from_slice(&0u16.to_be_bytes());
    data.extend_from_slice(&2_000_000u32.to_be_bytes());
    data.extend_from_slice(&50u16.to_be_bytes());
    data.extend_from_slice(&loop_frame.to_be_bytes());
    data.extend_from_slice(&0u16.to_be_bytes());
    for s in [title, "Composer", "made for tests"] {
        data.extend_from_slice(s.as_bytes());
        data.push(0);
    }
    for reg in regs {
        data.extend(std::iter::repeat(reg).take(frames as usize));
    }
    data.extend_from_slice(b"End!");
    data
}

/// Square wave on channel A only.
fn tone_a() -> [u8; 16] {
    let mut regs = [0u8; 16];
    regs[0] = 0x1C;
    regs[1] = 0x01;
    regs[7] = 0x3E;
    regs[8] = 0x0F;
    regs[13] = 0xFF;
    regs
}

fn peak(buf: &[i16]) -> i32 {
    buf.iter().map(|&s| (s as i32).abs()).max().unwrap_or(0)
}

fn render_ms(engine: &PlaybackEngine, ms: u32) -> (Vec<i16>, RenderStatus) {
    let frames = (engine.sample_rate() as u64 * ms as u64 / 1000) as usize;
    let mut buf = vec![0i16; frames * 2];
    let status = engine.fill_buffer(&mut buf);
    (buf, status)
}

#[test]
fn test_open_from_disk_and_query() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&ym6(250, 50, "Disk Song", tone_a())).unwrap();

    let engine = PlaybackEngine::new();
    engine.set_file(file.path()).unwrap();
    assert_eq!(engine.state(), EngineState::Ready);
    assert_eq!(engine.format_name().unwrap(), "YM");
    assert_eq!(engine.track_count().unwrap(), 1);
    assert_eq!(engine.voice_count().unwrap(), 3);
    assert_eq!(engine.voice_name(0).unwrap(), "Channel A");

    let info = engine.current_track_info().unwrap();
    assert_eq!(info.title, "Disk Song");
    assert_eq!(info.artist, "Composer");
    assert_eq!(info.system, "Atari ST");
    assert_eq!(info.intro_length_ms, 1_000);
    assert_eq!(info.loop_length_ms, 4_000);
    assert_eq!(info.play_length_ms, 5_000);

    let probed = engine.probe_track_info(file.path(), 0).unwrap();
    assert_eq!(probed, info);
}

#[test]
fn test_missing_and_unknown_files() {
    let engine = PlaybackEngine::new();
    assert!(matches!(
        engine.set_file("/definitely/not/here.ym"),
        Err(Error::Io(_))
    ));
    assert!(matches!(
        engine.set_file_bytes(b"RIFF....WAVEfmt "),
        Err(Error::NoCompatibleBackend)
    ));
    assert_eq!(engine.state(), EngineState::Empty);
}

#[test]
fn test_play_produces_audio() {
    let engine = PlaybackEngine::new();
    engine
        .set_file_bytes(&ym6(100, 0, "Tone", tone_a()))
        .unwrap();
    let (idle, status) = render_ms(&engine, 20);
    assert_eq!(status, RenderStatus::Idle);
    assert_eq!(peak(&idle), 0);

    engine.play().unwrap();
    let (buf, status) = render_ms(&engine, 100);
    assert_eq!(status, RenderStatus::Rendered);
    assert!(peak(&buf) > 1_000);
    assert_eq!(engine.elapsed_time(), 100);
}

#[test]
fn test_mute_survives_restart() {
    let engine = PlaybackEngine::new();
    engine
        .set_file_bytes(&ym6(100, 0, "Tone", tone_a()))
        .unwrap();
    engine.set_mute_voices(0b001);
    engine.play().unwrap();
    let (buf, _) = render_ms(&engine, 100);
    assert_eq!(peak(&buf), 0);

    engine.stop().unwrap();
    engine.play().unwrap();
    let (buf, _) = render_ms(&engine, 100);
    assert_eq!(peak(&buf), 0);

    engine.set_mute_voices(0);
    let (buf, _) = render_ms(&engine, 100);
    assert!(peak(&buf) > 1_000);
}

#[test]
fn test_silence_ends_track_unless_ignored() {
    let config = EngineConfig::default().silence_timeout_ms(500);
    let engine = PlaybackEngine::with_config(config).unwrap();
    engine
        .set_file_bytes(&ym6(100, 0, "Tone", tone_a()))
        .unwrap();
    engine.set_mute_voices(0b111);
    engine.play().unwrap();
    let (_, status) = render_ms(&engine, 1_000);
    assert_eq!(status, RenderStatus::Ended);
    assert!(engine.is_track_ended());
    assert_eq!(engine.state(), EngineState::Ready);

    engine.ignore_silence(true);
    engine.play().unwrap();
    assert!(!engine.is_track_ended());
    let (_, status) = render_ms(&engine, 1_000);
    assert_eq!(status, RenderStatus::Rendered);
}

#[test]
fn test_fade_ends_track() {
    let engine = PlaybackEngine::new();
    engine
        .set_file_bytes(&ym6(100, 0, "Tone", tone_a()))
        .unwrap();
    engine.set_fade_time(200);
    engine.play().unwrap();

    let (first, _) = render_ms(&engine, 50);
    let (later, _) = render_ms(&engine, 100);
    assert!(peak(&later[later.len() - 200..]) < peak(&first));
    let (_, status) = render_ms(&engine, 100);
    assert_eq!(status, RenderStatus::Ended);

    engine.reset_fade_time();
    engine.play().unwrap();
    let (_, status) = render_ms(&engine, 500);
    assert_eq!(status, RenderStatus::Rendered);
}

#[test]
fn test_tempo_speeds_up_song_not_clock() {
    let engine = PlaybackEngine::new();
    engine
        .set_file_bytes(&ym6(100, 0, "Tone", tone_a()))
        .unwrap();
    engine.set_tempo(2.0).unwrap();
    engine.play().unwrap();
    render_ms(&engine, 250);
    assert_eq!(engine.elapsed_time(), 250);
    assert_eq!(engine.transport().tempo, 2.0);
    assert!(matches!(engine.set_tempo(0.0), Err(Error::Range(_))));
    assert!(matches!(
        engine.set_tempo(MAX_TEMPO * 2.0),
        Err(Error::Range(_))
    ));
    assert!(matches!(
        engine.set_tempo(MIN_TEMPO / 2.0),
        Err(Error::Range(_))
    ));
    assert_eq!(engine.transport().tempo, 2.0);
}

#[test]
fn test_mono_config() {
    let config = EngineConfig::default()
        .stereo(StereoMode::Mono)
        .sample_rate(22_050);
    let engine = PlaybackEngine::with_config(config).unwrap();
    engine
        .set_file_bytes(&ym6(100, 0, "Tone", tone_a()))
        .unwrap();
    engine.play().unwrap();
    let (buf, _) = render_ms(&engine, 100);
    assert_eq!(buf.len(), 2 * 2_205);
    assert!(buf.chunks(2).all(|f| f[0] == f[1]));
}

#[test]
fn test_invalid_config_rejected() {
    let config = EngineConfig::default().sample_rate(1_000);
    assert!(matches!(
        PlaybackEngine::with_config(config),
        Err(Error::Config(_))
    ));
}
