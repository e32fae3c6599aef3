mod common;

use common::{harness, media_source, wait_for, SyntheticSource, TONE};
use myy_engine::core::init_test_logger;
use myy_engine::{MediaPlayer, PlaybackState, PlayerConfig, PlayerEvent, PlayerRegistry};
use std::thread;
use std::time::{Duration, Instant};

const TIMEOUT: Duration = Duration::from_secs(10);

fn wait_position(player: &MediaPlayer, at_least: f64) {
    let deadline = Instant::now() + TIMEOUT;
    while player.get_current_position() < at_least {
        assert!(Instant::now() < deadline, "播放位置没有前进");
        thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn test_plays_audio_and_video_to_end() {
    init_test_logger();
    let h = harness();
    let player = MediaPlayer::new(PlayerConfig::default(), h.sinks.clone()).unwrap();
    let events = player.events();
    player.set_play_when_ready(true);
    player.open(media_source(SyntheticSource::new(1.0))).unwrap();

    assert_eq!(
        wait_for(&events, TIMEOUT, |e| matches!(e, PlayerEvent::Prepared { .. })),
        PlayerEvent::Prepared { duration: 1.0 }
    );
    wait_for(&events, TIMEOUT, |e| {
        *e == PlayerEvent::VideoSizeChanged { width: 4, height: 2 }
    });
    wait_for(&events, TIMEOUT, |e| {
        *e == PlayerEvent::StateChanged(PlaybackState::Ended)
    });

    assert_eq!(*h.device.peak.lock(), TONE);
    let frames = h.video.frames.lock().clone();
    assert!(!frames.is_empty());
    assert!(frames.windows(2).all(|w| w[0].1 <= w[1].1));
    // 最后一帧不会被丢弃
    assert!((frames[frames.len() - 1].1 - 0.96).abs() < 1e-9);
    assert!(player.get_current_position() > 0.8);

    let state = player.get_state();
    assert_eq!(state.state, PlaybackState::Ended);
    let json = serde_json::to_string(&state).unwrap();
    assert!(json.contains("\"state\":\"ended\""));
}

#[test]
fn test_seek_discards_old_generation() {
    init_test_logger();
    let h = harness();
    let player = MediaPlayer::new(PlayerConfig::default(), h.sinks.clone()).unwrap();
    let events = player.events();
    player.set_play_when_ready(true);
    player.open(media_source(SyntheticSource::new(2.0))).unwrap();
    wait_for(&events, TIMEOUT, |e| {
        *e == PlayerEvent::StateChanged(PlaybackState::Ready)
    });

    player.seek(1.0);
    wait_for(&events, TIMEOUT, |e| {
        *e == PlayerEvent::SeekCompleted { position: 1.0 }
    });
    wait_for(&events, TIMEOUT, |e| {
        *e == PlayerEvent::StateChanged(PlaybackState::Ended)
    });

    let frames = h.video.frames.lock().clone();
    let after_seek: Vec<f64> = frames
        .iter()
        .filter(|(serial, _)| *serial == 2)
        .map(|(_, pts)| *pts)
        .collect();
    assert!(!after_seek.is_empty());
    assert!(after_seek.iter().all(|pts| *pts >= 1.0));
    assert!(frames.iter().all(|(serial, _)| *serial <= 2));
}

#[test]
fn test_pause_freezes_position() {
    init_test_logger();
    let h = harness();
    let player = MediaPlayer::new(PlayerConfig::default(), h.sinks.clone()).unwrap();
    player.set_play_when_ready(true);
    player.open(media_source(SyntheticSource::new(3.0))).unwrap();
    wait_position(&player, 0.2);

    player.set_play_when_ready(false);
    thread::sleep(Duration::from_millis(100));
    let paused_at = player.get_current_position();
    thread::sleep(Duration::from_millis(200));
    assert!((player.get_current_position() - paused_at).abs() < 0.05);
    assert!(!player.play_when_ready());

    player.set_play_when_ready(true);
    wait_position(&player, paused_at + 0.2);
}

#[test]
fn test_video_only_source_uses_fallback_clock() {
    init_test_logger();
    let h = harness();
    let player = MediaPlayer::new(PlayerConfig::default(), h.sinks.clone()).unwrap();
    let events = player.events();
    player.set_play_when_ready(true);
    player
        .open(media_source(SyntheticSource::new(0.5).video_only()))
        .unwrap();
    wait_for(&events, TIMEOUT, |e| {
        *e == PlayerEvent::StateChanged(PlaybackState::Ended)
    });
    // 没有音频流，设备只输出静音
    assert_eq!(*h.device.peak.lock(), 0);
    assert!(player.get_state().buffer.audio_packets == 0);
}

#[test]
fn test_read_error_then_reopen() {
    init_test_logger();
    let h = harness();
    let player = MediaPlayer::new(PlayerConfig::default(), h.sinks.clone()).unwrap();
    let events = player.events();
    player
        .open(media_source(SyntheticSource::new(2.0).failing_at(10)))
        .unwrap();
    match wait_for(&events, TIMEOUT, |e| matches!(e, PlayerEvent::Error(_))) {
        PlayerEvent::Error(message) => assert!(message.contains("connection reset")),
        _ => unreachable!(),
    }
    wait_for(&events, TIMEOUT, |e| {
        *e == PlayerEvent::StateChanged(PlaybackState::Error)
    });

    // 出错后可以重新打开
    player.open(media_source(SyntheticSource::new(0.5))).unwrap();
    wait_for(&events, TIMEOUT, |e| matches!(e, PlayerEvent::Prepared { .. }));
    player.stop();
    assert_eq!(player.playback_state(), PlaybackState::Idle);
}

#[test]
fn test_registry_shutdown_stops_players() {
    init_test_logger();
    let h = harness();
    let registry = PlayerRegistry::new();
    registry.init();
    let (id, player) = registry
        .create(PlayerConfig::default(), h.sinks.clone())
        .unwrap();
    let events = player.events();
    player.open(media_source(SyntheticSource::new(2.0))).unwrap();
    wait_for(&events, TIMEOUT, |e| {
        *e == PlayerEvent::StateChanged(PlaybackState::Ready)
    });
    assert!(registry.get(id).is_some());

    registry.shutdown();
    assert!(registry.is_empty());
    assert_eq!(player.playback_state(), PlaybackState::Idle);
}
