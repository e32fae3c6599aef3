#![allow(dead_code)]

use crossbeam_channel::Receiver;
use myy_engine::core::{
    MediaInfo, PixelFormat, PlayerError, Rational, Result, SampleFormat, StreamType, VideoFrame,
};
use myy_engine::player::codec::{Codec, CodecError, CodecResult, RawAudioFrame, RawVideoFrame};
use myy_engine::player::{
    AudioPuller, AudioRendererSink, DemuxerSource, MediaSource, NullAudioSink, Packet, StreamInfo,
    VideoRendererSink,
};
use myy_engine::{PlayerEvent, RendererSinks};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub const TB: Rational = Rational::new(1, 1000);
pub const PACKET_MS: i64 = 40;
/// 40ms 的 48kHz 立体声 I16
pub const SAMPLES_PER_PACKET: usize = 1920;
pub const TONE: i16 = 1000;

/// 视频/音频交替的包，每路 40ms 一个
pub struct SyntheticSource {
    next: i64,
    count: i64,
    fail_at: Option<i64>,
    info: MediaInfo,
    with_audio: bool,
}

impl SyntheticSource {
    pub fn new(seconds: f64) -> Self {
        let count = (seconds * 1000.0 / PACKET_MS as f64) as i64 * 2;
        Self {
            next: 0,
            count,
            fail_at: None,
            info: MediaInfo {
                duration: seconds,
                width: 4,
                height: 2,
                ..MediaInfo::default()
            },
            with_audio: true,
        }
    }

    pub fn failing_at(mut self, index: i64) -> Self {
        self.fail_at = Some(index);
        self
    }

    pub fn video_only(mut self) -> Self {
        self.with_audio = false;
        self
    }
}

impl DemuxerSource for SyntheticSource {
    fn read_packet(&mut self) -> Result<Option<Packet>> {
        if self.fail_at == Some(self.next) {
            return Err(PlayerError::OpenError("connection reset".into()));
        }
        if self.next >= self.count {
            return Ok(None);
        }
        let index = self.next;
        self.next += 1;
        let stream = if index % 2 == 0 {
            StreamType::Video
        } else {
            StreamType::Audio
        };
        let pts = (index / 2) * PACKET_MS;
        Ok(Some(
            Packet::new(stream, vec![0; 64], Some(pts), TB).with_duration(PACKET_MS),
        ))
    }

    fn seek(&mut self, position: f64) -> Result<()> {
        self.next = ((position * 1000.0) as i64 / PACKET_MS) * 2;
        Ok(())
    }

    fn media_info(&self) -> &MediaInfo {
        &self.info
    }

    fn stream_info(&self, stream: StreamType) -> Option<StreamInfo> {
        if stream == StreamType::Audio && !self.with_audio {
            return None;
        }
        Some(StreamInfo {
            stream,
            time_base: TB,
            frame_rate: Some(Rational::new(25, 1)),
            start_pts: Some(0),
            codec_name: "synthetic".into(),
        })
    }

    fn description(&self) -> String {
        "synthetic".into()
    }
}

/// 一个包解出一帧
#[derive(Default)]
pub struct PassthroughVideoCodec {
    pending: Vec<i64>,
    draining: bool,
}

impl Codec for PassthroughVideoCodec {
    type Frame = RawVideoFrame;

    fn send_packet(&mut self, packet: Option<&Packet>) -> CodecResult<()> {
        match packet {
            Some(packet) => self.pending.push(packet.pts.unwrap_or(0)),
            None => self.draining = true,
        }
        Ok(())
    }

    fn receive_frame(&mut self) -> CodecResult<RawVideoFrame> {
        if self.pending.is_empty() {
            return Err(if self.draining {
                CodecError::Eof
            } else {
                CodecError::Again
            });
        }
        let pts = self.pending.remove(0);
        Ok(RawVideoFrame {
            pts: Some(pts),
            width: 4,
            height: 2,
            format: PixelFormat::RGBA,
            data: vec![0xff; 4 * 2 * 4],
        })
    }

    fn flush(&mut self) {
        self.pending.clear();
        self.draining = false;
    }
}

/// 一个包解出 40ms 恒定幅度的音频
#[derive(Default)]
pub struct ToneAudioCodec {
    pending: Vec<i64>,
    draining: bool,
}

impl Codec for ToneAudioCodec {
    type Frame = RawAudioFrame;

    fn send_packet(&mut self, packet: Option<&Packet>) -> CodecResult<()> {
        match packet {
            Some(packet) => self.pending.push(packet.pts.unwrap_or(0)),
            None => self.draining = true,
        }
        Ok(())
    }

    fn receive_frame(&mut self) -> CodecResult<RawAudioFrame> {
        if self.pending.is_empty() {
            return Err(if self.draining {
                CodecError::Eof
            } else {
                CodecError::Again
            });
        }
        let pts = self.pending.remove(0);
        let data = TONE
            .to_ne_bytes()
            .iter()
            .copied()
            .cycle()
            .take(SAMPLES_PER_PACKET * 2 * 2)
            .collect();
        Ok(RawAudioFrame {
            pts: Some(pts),
            sample_rate: 48000,
            channels: 2,
            format: SampleFormat::I16,
            nb_samples: SAMPLES_PER_PACKET,
            data,
        })
    }

    fn flush(&mut self) {
        self.pending.clear();
        self.draining = false;
    }
}

pub fn media_source(source: SyntheticSource) -> MediaSource {
    MediaSource {
        demuxer: Box::new(source),
        audio_codec: Some(Box::new(ToneAudioCodec::default())),
        video_codec: Some(Box::new(PassthroughVideoCodec::default())),
    }
}

/// 记录每次显示的帧（代数, pts）
#[derive(Clone, Default)]
pub struct CapturingVideoSink {
    pub frames: Arc<Mutex<Vec<(u64, f64)>>>,
}

impl VideoRendererSink for CapturingVideoSink {
    fn render(&mut self, frame: &VideoFrame) {
        self.frames.lock().push((frame.serial, frame.pts));
    }
}

/// 用一个线程按 10ms 节奏拉取音频，模拟设备
pub struct FakeDevice {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    pub peak: Arc<Mutex<i16>>,
}

impl FakeDevice {
    pub fn start(puller: AudioPuller) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let peak = Arc::new(Mutex::new(0i16));
        let handle = {
            let running = running.clone();
            let peak = peak.clone();
            thread::spawn(move || {
                let mut out = vec![0u8; 480 * 4];
                while running.load(Ordering::Relaxed) {
                    puller.pull(&mut out);
                    let max = out
                        .chunks_exact(2)
                        .map(|b| i16::from_ne_bytes([b[0], b[1]]))
                        .max()
                        .unwrap_or(0);
                    let mut peak = peak.lock();
                    *peak = (*peak).max(max);
                    drop(peak);
                    thread::sleep(Duration::from_millis(10));
                }
            })
        };
        Self {
            running,
            handle: Some(handle),
            peak,
        }
    }
}

impl Drop for FakeDevice {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

pub struct Harness {
    pub sinks: RendererSinks,
    pub video: CapturingVideoSink,
    pub device: FakeDevice,
}

pub fn harness() -> Harness {
    let audio = NullAudioSink::new();
    let device = FakeDevice::start(audio.puller());
    let video = CapturingVideoSink::default();
    let video_for_factory = video.clone();
    let sinks = RendererSinks {
        audio: Some(Arc::new(move || Box::new(audio.clone()) as Box<dyn AudioRendererSink>)),
        video: Some(Arc::new(move || {
            Box::new(video_for_factory.clone()) as Box<dyn VideoRendererSink>
        })),
    };
    Harness {
        sinks,
        video,
        device,
    }
}

pub fn wait_for<F>(events: &Receiver<PlayerEvent>, timeout: Duration, pred: F) -> PlayerEvent
where
    F: Fn(&PlayerEvent) -> bool,
{
    let deadline = std::time::Instant::now() + timeout;
    loop {
        let left = deadline.saturating_duration_since(std::time::Instant::now());
        match events.recv_timeout(left) {
            Ok(event) if pred(&event) => return event,
            Ok(_) => continue,
            Err(e) => panic!("等待事件超时: {}", e),
        }
    }
}
