use crate::base::time::relative_time;
use crate::base::{CircularDeque, TaskRunner};
use crate::core::{
    log_ctx, AudioBuffer, AudioConfig, AudioParams, MediaClock, Result, SampleFormat, Serial,
    SyncConfig, SyncType,
};
use crate::player::decoder::{AudioReader, DecoderRead};
use crate::player::resample::Compensator;
use crate::player::sink::{AudioRenderCallback, AudioRendererSink, RendererEvent, RendererNotifier};
use crossbeam::atomic::AtomicCell;
use log::{debug, error, info, trace, warn};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

/// 把 `src` 按音量拷贝到 `dst`（逐采样缩放后截断）
///
/// 静音时输出全零；音量为 1 时直接拷贝。
pub fn mix_with_volume(dst: &mut [u8], src: &[u8], format: SampleFormat, volume: f64, muted: bool) {
    let len = dst.len().min(src.len());
    let (dst, src) = (&mut dst[..len], &src[..len]);
    if muted || volume <= 0.0 {
        dst.fill(0);
        return;
    }
    if (volume - 1.0).abs() < f64::EPSILON {
        dst.copy_from_slice(src);
        return;
    }
    match format {
        SampleFormat::I16 => {
            for (out, chunk) in dst.chunks_exact_mut(2).zip(src.chunks_exact(2)) {
                let sample = i16::from_ne_bytes([chunk[0], chunk[1]]) as f64 * volume;
                let sample = sample.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16;
                out.copy_from_slice(&sample.to_ne_bytes());
            }
        }
        SampleFormat::F32 => {
            for (out, chunk) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
                let sample = f32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) as f64;
                let sample = (sample * volume).clamp(-1.0, 1.0) as f32;
                out.copy_from_slice(&sample.to_ne_bytes());
            }
        }
    }
}

/// 正在输出的音频块
struct PlayingBuffer {
    data: Vec<u8>,
    index: usize,
    serial: Serial,
}

impl PlayingBuffer {
    fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.index)
    }
}

struct AudioState {
    ring: CircularDeque<AudioBuffer>,
    playing: Option<PlayingBuffer>,
    /// 是否有一个读取请求尚未返回
    reading: bool,
    /// 解码端已报告结束的代数
    eos_serial: Option<Serial>,
    ended_reported: bool,
    /// 当前块播放完时对应的 pts
    audio_clock_from_pts: f64,
    audio_clock_serial: Option<Serial>,
    audio_diff_cum: f64,
    audio_diff_avg_count: u32,
    compensator: Compensator,
    paused: bool,
    stopped: bool,
}

/// 音频渲染的数据源，被设备回调和渲染线程共享
pub struct AudioSource {
    runner: TaskRunner,
    reader: AudioReader,
    state: Mutex<AudioState>,
    media_clock: Arc<MediaClock>,
    queue_serial: Arc<AtomicU64>,
    device_params: AtomicCell<AudioParams>,
    /// 最近一次设备回调请求的字节数
    hw_buf_size: AtomicUsize,
    volume: AtomicCell<f64>,
    muted: AtomicBool,
    underruns: AtomicU64,
    audio_config: AudioConfig,
    sync_config: SyncConfig,
    notifier: RendererNotifier,
    self_ref: Weak<AudioSource>,
}

impl AudioSource {
    fn attempt_read(&self) {
        {
            let mut state = self.state.lock();
            if state.stopped || state.reading || state.ring.is_full() {
                return;
            }
            if state.eos_serial == Some(self.current_serial()) {
                return;
            }
            state.reading = true;
        }

        let weak = self.self_ref.clone();
        let posted = self.reader.read(move |result| {
            if let Some(source) = weak.upgrade() {
                let target = source.clone();
                source
                    .runner
                    .post_task(move || target.on_new_buffer(result));
            }
        });
        if !posted {
            self.state.lock().reading = false;
        }
    }

    fn on_new_buffer(&self, result: DecoderRead<AudioBuffer>) {
        let serial = self.current_serial();
        {
            let mut state = self.state.lock();
            state.reading = false;
            match result {
                DecoderRead::Frame(buffer) => {
                    if buffer.serial == serial {
                        state.ring.insert_last(buffer);
                    } else {
                        trace!("{} 丢弃过期音频块 serial={}", log_ctx(), buffer.serial);
                    }
                }
                DecoderRead::EndOfStream(eos) => {
                    debug!("{} 🔚 音频解码结束 serial={}", log_ctx(), eos);
                    state.eos_serial = Some(eos);
                }
                DecoderRead::Aborted => {
                    state.stopped = true;
                    return;
                }
                DecoderRead::Error(message) => {
                    state.stopped = true;
                    drop(state);
                    (self.notifier)(RendererEvent::Error(message));
                    return;
                }
            }
        }
        self.attempt_read();
    }

    fn current_serial(&self) -> Serial {
        self.queue_serial.load(Ordering::Acquire)
    }

    fn request_more(&self) {
        if let Some(source) = self.self_ref.upgrade() {
            self.runner.post_task(move || source.attempt_read());
        }
    }

    /// 取出下一个可播放的块（丢弃过期的），并做同步补偿
    fn next_buffer(&self, state: &mut AudioState) -> Option<PlayingBuffer> {
        let serial = self.current_serial();
        let buffer = loop {
            let buffer = state.ring.pop_front()?;
            if buffer.serial == serial {
                break buffer;
            }
        };

        let data = if self.media_clock.master_sync_type() == SyncType::AudioMaster {
            buffer.data
        } else {
            let wanted = self.synchronize_audio(state, buffer.nb_samples, buffer.params);
            if wanted != buffer.nb_samples {
                trace!(
                    "{} 音频补偿: {} -> {} samples",
                    log_ctx(),
                    buffer.nb_samples,
                    wanted
                );
            }
            match state.compensator.process(&buffer.data, buffer.params, wanted) {
                Ok(data) => data,
                Err(e) => {
                    debug!("{} 音频补偿失败，按原样播放: {}", log_ctx(), e);
                    buffer.data
                }
            }
        };

        state.audio_clock_from_pts = if buffer.pts.is_nan() {
            f64::NAN
        } else {
            buffer.pts + buffer.duration
        };
        state.audio_clock_serial = Some(buffer.serial);
        Some(PlayingBuffer {
            data,
            index: 0,
            serial: buffer.serial,
        })
    }

    /// 音频不是主时钟时，通过增减采样数向主时钟靠拢
    fn synchronize_audio(&self, state: &mut AudioState, nb_samples: usize, params: AudioParams) -> usize {
        if self.media_clock.master_sync_type() == SyncType::AudioMaster {
            return nb_samples;
        }
        let avg_nb = self.audio_config.audio_diff_avg_nb.max(1);
        let coef = (0.01f64.ln() / avg_nb as f64).exp();
        let diff = self.media_clock.audio_clock().get() - self.media_clock.get_master_clock();

        if diff.is_nan() || diff.abs() >= self.sync_config.nosync_threshold {
            // 差距太大，可能是初始状态或时间戳跳变
            state.audio_diff_avg_count = 0;
            state.audio_diff_cum = 0.0;
            return nb_samples;
        }

        state.audio_diff_cum = diff + coef * state.audio_diff_cum;
        if state.audio_diff_avg_count < avg_nb {
            state.audio_diff_avg_count += 1;
            return nb_samples;
        }

        let avg_diff = state.audio_diff_cum * (1.0 - coef);
        let bytes_per_sec = params.bytes_per_sec().max(1);
        let threshold = self.hw_buf_size.load(Ordering::Relaxed) as f64 / bytes_per_sec as f64;
        if avg_diff.abs() < threshold {
            return nb_samples;
        }

        let percent = self.audio_config.sample_correction_percent_max as usize;
        let wanted = nb_samples as i64 + (diff * params.sample_rate as f64) as i64;
        let min = (nb_samples * (100 - percent.min(100)) / 100) as i64;
        let max = (nb_samples * (100 + percent) / 100) as i64;
        wanted.clamp(min, max) as usize
    }

    /// 丢弃旧代数的数据；解码端已经送来的新代数数据保留
    fn flush(&self) {
        let serial = self.current_serial();
        let mut state = self.state.lock();
        state.ring.retain(|buffer| buffer.serial == serial);
        if state.playing.as_ref().is_some_and(|p| p.serial != serial) {
            state.playing = None;
        }
        if state.eos_serial != Some(serial) {
            state.eos_serial = None;
            state.ended_reported = false;
        }
        if state.audio_clock_serial != Some(serial) {
            state.audio_clock_from_pts = f64::NAN;
            state.audio_clock_serial = None;
            state.audio_diff_cum = 0.0;
            state.audio_diff_avg_count = 0;
            state.compensator.reset();
        }
    }
}

impl AudioRenderCallback for AudioSource {
    fn render(&self, delay: f64, out: &mut [u8]) -> usize {
        let callback_time = relative_time();
        let params = self.device_params.load();
        self.hw_buf_size.store(out.len(), Ordering::Relaxed);
        let volume = self.volume.load();
        let muted = self.muted.load(Ordering::Relaxed);

        let mut state = self.state.lock();
        let mut written = 0;
        let mut underrun = false;
        while written < out.len() {
            if state.paused {
                out[written..].fill(0);
                break;
            }
            let exhausted = state.playing.as_ref().map_or(true, |p| p.remaining() == 0);
            if exhausted {
                match self.next_buffer(&mut state) {
                    Some(buffer) => state.playing = Some(buffer),
                    None => {
                        // 没有数据时输出静音，不等待解码
                        state.playing = None;
                        out[written..].fill(0);
                        underrun = true;
                        break;
                    }
                }
            }
            if let Some(playing) = state.playing.as_mut() {
                let len = playing.remaining().min(out.len() - written);
                mix_with_volume(
                    &mut out[written..written + len],
                    &playing.data[playing.index..playing.index + len],
                    params.format,
                    volume,
                    muted,
                );
                playing.index += len;
                written += len;
            }
        }

        let unplayed = state.playing.as_ref().map_or(0, PlayingBuffer::remaining);
        let needs_more = !state.ring.is_full() && !state.reading && !state.stopped;
        let ended = underrun
            && !state.paused
            && !state.ended_reported
            && state.eos_serial.is_some()
            && state.eos_serial == Some(self.current_serial());
        if ended {
            state.ended_reported = true;
        }
        let clock_pts = state.audio_clock_from_pts;
        let clock_serial = state.audio_clock_serial;
        drop(state);

        if underrun && !ended {
            self.underruns.fetch_add(1, Ordering::Relaxed);
        }

        if let (false, Some(serial)) = (clock_pts.is_nan(), clock_serial) {
            let bytes_per_sec = params.bytes_per_sec().max(1) as f64;
            let played = clock_pts - (2 * out.len() + unplayed) as f64 / bytes_per_sec - delay;
            self.media_clock.audio_clock().set_at(played, serial, callback_time);
            self.media_clock
                .ext_clock()
                .sync_to(self.media_clock.audio_clock(), self.sync_config.nosync_threshold);
        }

        if needs_more {
            self.request_more();
        }
        if ended {
            (self.notifier)(RendererEvent::Ended(self.current_serial()));
        }
        out.len()
    }

    fn on_render_error(&self, message: String) {
        error!("{} ❌ 音频设备错误: {}", log_ctx(), message);
        (self.notifier)(RendererEvent::Error(message));
    }
}

/// 音频渲染器
///
/// 解码数据先进入固定容量的环形缓冲；设备回调从中取数据，
/// 取不到时输出静音。音频时钟按设备实际播放位置更新。
pub struct AudioRenderer {
    source: Arc<AudioSource>,
    sink: Box<dyn AudioRendererSink>,
}

impl AudioRenderer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        runner: TaskRunner,
        reader: AudioReader,
        sink: Box<dyn AudioRendererSink>,
        media_clock: Arc<MediaClock>,
        queue_serial: Arc<AtomicU64>,
        audio_config: AudioConfig,
        sync_config: SyncConfig,
        ring_capacity: usize,
        notifier: RendererNotifier,
    ) -> Self {
        let volume = audio_config.volume.clamp(0.0, 1.0);
        let muted = audio_config.muted;
        let source = Arc::new_cyclic(|self_ref| AudioSource {
            runner,
            reader,
            state: Mutex::new(AudioState {
                ring: CircularDeque::new(ring_capacity),
                playing: None,
                reading: false,
                eos_serial: None,
                ended_reported: false,
                audio_clock_from_pts: f64::NAN,
                audio_clock_serial: None,
                audio_diff_cum: 0.0,
                audio_diff_avg_count: 0,
                compensator: Compensator::new(),
                paused: true,
                stopped: true,
            }),
            media_clock,
            queue_serial,
            device_params: AtomicCell::new(AudioParams::default()),
            hw_buf_size: AtomicUsize::new(0),
            volume: AtomicCell::new(volume),
            muted: AtomicBool::new(muted),
            underruns: AtomicU64::new(0),
            audio_config,
            sync_config,
            notifier,
            self_ref: self_ref.clone(),
        });
        Self { source, sink }
    }

    /// 打开设备，返回设备实际参数（解码端应按此参数输出）
    pub fn initialize(&mut self, wanted: AudioParams) -> Result<AudioParams> {
        let callback: Arc<dyn AudioRenderCallback> = self.source.clone();
        let params = self.sink.initialize(wanted, callback)?;
        if params != wanted {
            warn!(
                "{} ⚠️ 音频设备参数与期望不同: {:?} -> {:?}",
                log_ctx(),
                wanted,
                params
            );
        }
        self.source.device_params.store(params);
        info!(
            "{} 🔊 音频输出已初始化: {} Hz, {} 声道, {:?}",
            log_ctx(),
            params.sample_rate,
            params.channels,
            params.format
        );
        Ok(params)
    }

    /// 启动设备并开始预读数据
    pub fn start(&mut self) -> Result<()> {
        self.source.state.lock().stopped = false;
        self.sink.start()?;
        self.source.request_more();
        Ok(())
    }

    pub fn device_params(&self) -> AudioParams {
        self.source.device_params.load()
    }

    pub fn callback(&self) -> Arc<dyn AudioRenderCallback> {
        self.source.clone()
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.source.state.lock().paused = paused;
        if paused {
            self.sink.pause();
        } else {
            self.sink.play();
        }
    }

    pub fn set_volume(&mut self, volume: f64) {
        let volume = volume.clamp(0.0, 1.0);
        self.source.volume.store(volume);
        // 实际音量在混音时生效
        if !self.sink.set_volume(volume) {
            debug!("{} 🔈 设备不支持音量控制，音量 {:.2} 仅在混音时生效", log_ctx(), volume);
        }
    }

    pub fn volume(&self) -> f64 {
        self.source.volume.load()
    }

    pub fn set_muted(&self, muted: bool) {
        self.source.muted.store(muted, Ordering::Relaxed);
    }

    pub fn is_muted(&self) -> bool {
        self.source.muted.load(Ordering::Relaxed)
    }

    /// seek 后丢弃已缓存的数据并重新开始读取
    pub fn flush(&self) {
        self.source.flush();
        self.source.request_more();
    }

    pub fn buffered_blocks(&self) -> usize {
        self.source.state.lock().ring.len()
    }

    pub fn underruns(&self) -> u64 {
        self.source.underruns.load(Ordering::Relaxed)
    }

    pub fn stop(&mut self) {
        {
            let mut state = self.source.state.lock();
            state.stopped = true;
            state.ring.clear();
            state.playing = None;
        }
        self.source.reader.cancel();
        self.source.runner.remove_all_tasks();
        self.sink.stop();
        info!("{} 🔇 音频输出已停止", log_ctx());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::MessageLoop;
    use crate::core::{Rational, StreamType};
    use crate::player::codec::{Codec, CodecError, CodecResult, RawAudioFrame};
    use crate::player::decoder::{AudioDecoder, AudioSpecialization, DecodeCore};
    use crate::player::packet::Packet;
    use crate::player::packet_queue::PacketQueue;
    use crate::player::sink::NullAudioSink;
    use std::time::Duration;

    #[test]
    fn test_mix_volume_i16_scales_and_mutes() {
        let src: Vec<u8> = [1000i16, -2000, 32767]
            .iter()
            .flat_map(|s| s.to_ne_bytes())
            .collect();
        let mut dst = vec![0u8; src.len()];

        mix_with_volume(&mut dst, &src, SampleFormat::I16, 0.5, false);
        let scaled: Vec<i16> = dst
            .chunks_exact(2)
            .map(|b| i16::from_ne_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(scaled, vec![500, -1000, 16384]);

        mix_with_volume(&mut dst, &src, SampleFormat::I16, 1.0, true);
        assert!(dst.iter().all(|b| *b == 0));

        mix_with_volume(&mut dst, &src, SampleFormat::I16, 1.0, false);
        assert_eq!(dst, src);
    }

    #[test]
    fn test_mix_volume_f32_clamps() {
        let src: Vec<u8> = [0.8f32, -0.4].iter().flat_map(|s| s.to_ne_bytes()).collect();
        let mut dst = vec![0u8; src.len()];
        mix_with_volume(&mut dst, &src, SampleFormat::F32, 0.5, false);
        let out: Vec<f32> = dst
            .chunks_exact(4)
            .map(|b| f32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        assert!((out[0] - 0.4).abs() < 1e-6);
        assert!((out[1] + 0.2).abs() < 1e-6);
    }

    /// 每个包解出 480 个采样（10ms），值为 1000
    struct ToneCodec {
        pending: Vec<Option<i64>>,
    }

    impl Codec for ToneCodec {
        type Frame = RawAudioFrame;

        fn send_packet(&mut self, packet: Option<&Packet>) -> CodecResult<()> {
            if let Some(packet) = packet {
                self.pending.push(packet.pts);
            }
            Ok(())
        }

        fn receive_frame(&mut self) -> CodecResult<RawAudioFrame> {
            if self.pending.is_empty() {
                return Err(CodecError::Again);
            }
            let pts = self.pending.remove(0);
            Ok(RawAudioFrame {
                pts,
                sample_rate: 48000,
                channels: 2,
                format: SampleFormat::I16,
                nb_samples: 480,
                data: std::iter::repeat(1000i16.to_ne_bytes())
                    .take(960)
                    .flatten()
                    .collect(),
            })
        }

        fn flush(&mut self) {
            self.pending.clear();
        }
    }

    struct Fixture {
        _render_loop: MessageLoop,
        _decoder: AudioDecoder,
        queue: Arc<PacketQueue>,
        renderer: AudioRenderer,
        media_clock: Arc<MediaClock>,
        sink_puller: crate::player::sink::AudioPuller,
    }

    fn fixture() -> Fixture {
        let tb = Rational::new(1, 1000);
        let queue = Arc::new(PacketQueue::new(StreamType::Audio));
        let core = DecodeCore::new(
            "audio_decoder",
            Box::new(ToneCodec { pending: Vec::new() }),
            AudioSpecialization::new(tb, AudioParams::default()),
            queue.clone(),
            None,
            true,
        );
        let decoder = AudioDecoder::new(core).unwrap();
        decoder.start();

        let media_clock = Arc::new(MediaClock::new(
            queue.serial_handle(),
            queue.serial_handle(),
            SyncType::AudioMaster,
            None,
        ));
        let render_loop = MessageLoop::prepare_looper("audio_render").unwrap();
        let sink = NullAudioSink::new();
        let sink_puller = sink.puller();
        let mut renderer = AudioRenderer::new(
            render_loop.task_runner(),
            decoder.reader(),
            Box::new(sink),
            media_clock.clone(),
            queue.serial_handle(),
            AudioConfig::default(),
            SyncConfig::default(),
            9,
            Arc::new(|_| {}),
        );
        renderer.initialize(AudioParams::default()).unwrap();
        renderer.start().unwrap();
        Fixture {
            _render_loop: render_loop,
            _decoder: decoder,
            queue,
            renderer,
            media_clock,
            sink_puller,
        }
    }

    fn wait_for_blocks(renderer: &AudioRenderer, count: usize) {
        for _ in 0..200 {
            if renderer.buffered_blocks() >= count {
                return;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("renderer did not buffer {} blocks", count);
    }

    #[test]
    fn test_underrun_outputs_silence() {
        let mut fx = fixture();
        fx.renderer.set_paused(false);
        let callback = fx.renderer.callback();
        let mut out = vec![0xAAu8; 4096];
        assert_eq!(callback.render(0.0, &mut out), 4096);
        assert!(out.iter().all(|b| *b == 0));
        assert!(fx.renderer.underruns() >= 1);
    }

    #[test]
    fn test_render_applies_volume_and_sets_clock() {
        let mut fx = fixture();
        for i in 0..4 {
            fx.queue.put(
                Packet::new(StreamType::Audio, vec![0; 4], Some(1000 + i * 10), Rational::new(1, 1000))
                    .with_duration(10),
            );
        }
        wait_for_blocks(&fx.renderer, 4);
        fx.renderer.set_volume(0.5);
        fx.renderer.set_paused(false);
        assert!(fx.sink_puller.is_playing());

        // 一个块是 480 * 4 = 1920 字节
        let mut out = vec![0u8; 1920];
        fx.sink_puller.pull(&mut out);
        let first = i16::from_ne_bytes([out[0], out[1]]);
        assert_eq!(first, 500);

        // 第一块播完：clock_from_pts = 1.01，减去 2 * 1920 字节的设备缓冲（20ms）
        let clock = fx.media_clock.audio_clock().get();
        assert!((clock - 0.99).abs() < 0.01, "audio clock = {}", clock);
        // 外部时钟跟随音频
        assert!((fx.media_clock.ext_clock().get() - clock).abs() < 0.01);
    }

    #[test]
    fn test_paused_renders_silence_without_consuming() {
        let mut fx = fixture();
        fx.queue.put(
            Packet::new(StreamType::Audio, vec![0; 4], Some(0), Rational::new(1, 1000)).with_duration(10),
        );
        wait_for_blocks(&fx.renderer, 1);
        fx.renderer.set_paused(true);
        let mut out = vec![1u8; 512];
        fx.renderer.callback().render(0.0, &mut out);
        assert!(out.iter().all(|b| *b == 0));
        assert_eq!(fx.renderer.buffered_blocks(), 1);
    }

    fn block(serial: Serial, pts: f64) -> AudioBuffer {
        AudioBuffer {
            pts,
            duration: 0.01,
            nb_samples: 480,
            params: AudioParams::default(),
            serial,
            data: vec![0; 1920],
        }
    }

    #[test]
    fn test_flush_keeps_current_generation_audio() {
        let fx = fixture();
        fx.queue.begin_new_generation();
        let serial = fx.queue.serial();
        {
            let mut state = fx.renderer.source.state.lock();
            state.stopped = true;
            state.ring.clear();
            state.ring.insert_last(block(serial - 1, 0.0));
            for i in 0..3 {
                state.ring.insert_last(block(serial, 5.0 + i as f64 * 0.01));
            }
            state.playing = Some(PlayingBuffer {
                data: vec![0; 1920],
                index: 960,
                serial,
            });
        }

        fx.renderer.flush();
        assert_eq!(fx.renderer.buffered_blocks(), 3);
        let state = fx.renderer.source.state.lock();
        assert_eq!(state.ring.front().map(|b| b.pts), Some(5.0));
        assert_eq!(state.playing.as_ref().map(|p| p.index), Some(960));
    }

    #[test]
    fn test_flush_drops_stale_playing_buffer() {
        let fx = fixture();
        {
            let mut state = fx.renderer.source.state.lock();
            state.stopped = true;
            state.playing = Some(PlayingBuffer {
                data: vec![0; 1920],
                index: 0,
                serial: 1,
            });
        }
        fx.queue.begin_new_generation();
        fx.renderer.flush();
        assert!(fx.renderer.source.state.lock().playing.is_none());
    }

    #[test]
    fn test_volume_without_device_control_is_mixed() {
        let mut fx = fixture();
        // NullAudioSink 没有设备音量，音量只在混音时生效
        fx.renderer.set_volume(1.5);
        assert_eq!(fx.renderer.volume(), 1.0);
        fx.renderer.set_volume(0.25);
        assert_eq!(fx.renderer.volume(), 0.25);
        assert!(!fx.renderer.is_muted());
    }
}
