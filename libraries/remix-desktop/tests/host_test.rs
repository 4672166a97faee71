/// End-to-end tests for the native binding
///
/// Drives a real session through the in-process render graph without an
/// audio device: `advance` renders blocks the way the CPAL callback would.
use remix_audio::DecodedAudio;
use remix_desktop::{DesktopConfig, DesktopError, DesktopHost};
use remix_engine::{
    EngineConfig, EngineError, ExportStatus, MediaFile, SessionEvent, TransportState,
};
use std::io::Cursor;
use std::path::Path;

const RATE: u32 = 48000;

/// Stereo 440 Hz tone at the output rate
fn tone(secs: f32) -> DecodedAudio {
    let frames = (RATE as f32 * secs) as usize;
    let samples = (0..frames)
        .flat_map(|i| {
            let s = (2.0 * std::f32::consts::PI * 440.0 * i as f32 / RATE as f32).sin() * 0.5;
            [s, s]
        })
        .collect();
    DecodedAudio::new(samples, RATE)
}

fn host() -> DesktopHost {
    DesktopHost::new(EngineConfig::default(), DesktopConfig::default()).unwrap()
}

async fn loaded(secs: f32) -> DesktopHost {
    let mut host = host();
    host.open_decoded(MediaFile::new("tone.wav", "audio/wav"), tone(secs))
        .unwrap();
    host.pump().await.unwrap();
    host
}

#[tokio::test]
async fn test_metadata_attaches_processing_graph() {
    let mut host = loaded(1.0).await;

    let events = host.drain_events();
    assert!(events.contains(&SessionEvent::ProcessingChanged { available: true }));
    assert!(events
        .iter()
        .any(|e| matches!(e, SessionEvent::MetadataReady { duration_ms: Some(1000), .. })));

    // speakers + source, pitch, gain, capture
    assert_eq!(host.backend().node_count().unwrap(), 5);
    assert!(host.backend().is_running().unwrap());
    assert!(host.session().is_processing_available());
}

#[tokio::test]
async fn test_unsupported_extension_rejected_before_decoding() {
    let mut host = host();
    let result = host.open(Path::new("/nowhere/notes.txt"));
    assert!(matches!(
        result,
        Err(DesktopError::Engine(EngineError::UnsupportedMedia(_)))
    ));
    assert_eq!(host.backend().node_count().unwrap(), 1);
}

#[tokio::test]
async fn test_open_wav_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("take.wav");
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for _ in 0..(RATE / 2) {
        writer.write_sample(1000i16).unwrap();
    }
    writer.finalize().unwrap();

    let mut host = host();
    host.open(&path).unwrap();
    host.pump().await.unwrap();

    let events = host.drain_events();
    assert!(events.iter().any(|e| matches!(
        e,
        SessionEvent::MediaLoaded { name, .. } if name == "take.wav"
    )));
    assert!(events
        .iter()
        .any(|e| matches!(e, SessionEvent::MetadataReady { duration_ms: Some(500), .. })));
}

#[tokio::test]
async fn test_playback_reaches_natural_end() {
    let mut host = loaded(0.5).await;
    host.session_mut().play().await.unwrap();
    assert_eq!(host.session().transport_state(), TransportState::Playing);

    host.advance(RATE as usize).await.unwrap();

    assert_eq!(host.session().transport_state(), TransportState::Idle);
    let events = host.drain_events();
    assert!(events
        .iter()
        .any(|e| matches!(e, SessionEvent::TimeChanged { .. })));
    assert_eq!(host.session().time_label(), "00:00 / 00:00");
}

#[tokio::test]
async fn test_double_speed_finishes_in_half_the_time() {
    let mut host = loaded(1.0).await;
    host.session_mut().set_speed(2.0).unwrap();
    host.session_mut().play().await.unwrap();

    // 0.4s of output covers 0.8s of media
    host.advance((RATE as f32 * 0.4) as usize).await.unwrap();
    assert_eq!(host.session().transport_state(), TransportState::Playing);

    host.advance((RATE as f32 * 0.2) as usize).await.unwrap();
    assert_eq!(host.session().transport_state(), TransportState::Idle);
}

#[tokio::test]
async fn test_refresh_loop_follows_transport() {
    let mut host = loaded(1.0).await;
    host.session_mut().play().await.unwrap();
    assert_eq!(host.clock().pending(), 1);

    // Each fired frame schedules the next one
    host.pump().await.unwrap();
    assert_eq!(host.clock().pending(), 1);

    host.session_mut().stop(true).unwrap();
    assert_eq!(host.clock().pending(), 0);
}

#[tokio::test]
async fn test_export_produces_wav_artifact() {
    let mut host = loaded(0.5).await;
    host.session_mut().set_pitch(1.5).unwrap();

    host.session_mut().start_export().await.unwrap();
    assert!(matches!(
        host.session().export_status(),
        ExportStatus::Recording
    ));

    // Render past the end; the recorder's data arrives on the following pump
    host.advance(RATE as usize).await.unwrap();
    assert!(matches!(
        host.session().export_status(),
        ExportStatus::Finalizing
    ));
    host.pump().await.unwrap();

    assert!(matches!(
        host.session().export_status(),
        ExportStatus::Succeeded
    ));
    let artifact = host.session().artifact().unwrap();
    assert_eq!(artifact.file_name, "tone-remix.wav");
    assert_eq!(artifact.mime_type, "audio/wav");

    let reader = hound::WavReader::new(Cursor::new(artifact.bytes.clone())).unwrap();
    assert_eq!(reader.spec().channels, 2);
    assert_eq!(reader.spec().sample_rate, RATE);
    assert!(reader.duration() >= RATE / 2);

    assert!(host.session().controls().export);
    assert!(host.session().controls().transport);
}

#[tokio::test]
async fn test_export_without_media_is_unavailable() {
    let mut host = host();
    let result = host.session_mut().start_export().await;
    assert_eq!(result, Err(EngineError::ExportUnavailable));
}

#[tokio::test]
async fn test_replacing_media_ignores_old_callbacks() {
    let mut host = loaded(1.0).await;
    let first = host.session().source().unwrap();
    host.session_mut().play().await.unwrap();

    // Time updates for the first file are queued but not yet delivered
    host.backend().advance(RATE as usize / 2).unwrap();

    let second = host
        .open_decoded(MediaFile::new("other.wav", "audio/wav"), tone(2.0))
        .unwrap();
    assert_ne!(first, second);
    host.pump().await.unwrap();

    assert_eq!(host.session().source(), Some(second));
    assert_eq!(host.backend().node_count().unwrap(), 5);
    assert_eq!(host.session().transport_state(), TransportState::Idle);
}

#[tokio::test]
async fn test_cd_rate_file_plays_for_its_own_duration() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cd.wav");
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: 44100,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for i in 0..22050 {
        let s = ((i % 100) as i16 - 50) * 100;
        writer.write_sample(s).unwrap();
        writer.write_sample(s).unwrap();
    }
    writer.finalize().unwrap();

    let mut host = host();
    host.open(&path).unwrap();
    host.pump().await.unwrap();
    assert!(host
        .drain_events()
        .iter()
        .any(|e| matches!(e, SessionEvent::MetadataReady { duration_ms: Some(500), .. })));

    // Half a second at the 48 kHz output rate
    host.session_mut().play().await.unwrap();
    host.advance((RATE as f32 * 0.49) as usize).await.unwrap();
    assert_eq!(host.session().transport_state(), TransportState::Playing);
    host.advance((RATE as f32 * 0.02) as usize).await.unwrap();
    assert_eq!(host.session().transport_state(), TransportState::Idle);
}
