use crate::base::{MessageLoop, TaskRunner};
use crate::core::{
    log_ctx, AudioBuffer, AudioParams, PlayerError, Rational, Result, Serial, VideoFrame,
};
use crate::player::codec::{Codec, CodecError, RawAudioFrame, RawVideoFrame};
use crate::player::packet::{Dequeued, QueueItem};
use crate::player::packet_queue::PacketQueue;
use crate::player::resample::Resampler;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// 解码器因缺包阻塞时的通知（用于唤醒解封装）
pub type BlockingNotifier = Arc<dyn Fn() + Send + Sync>;

/// 音频/视频在通用解码循环之上的差异部分
pub trait FrameSpecialization: Send + 'static {
    type Raw: Send + 'static;
    type Output: Send + 'static;

    /// 收到代数分界时重置状态
    fn on_flush(&mut self);

    /// 把解码输出转换为渲染端数据；返回 None 表示丢弃这一帧
    fn process(&mut self, raw: Self::Raw, serial: Serial) -> Option<Self::Output>;
}

/// 音频：重采样到设备格式，时间戳换算到 1/sample_rate，并延续 next_pts
pub struct AudioSpecialization {
    time_base: Rational,
    next_pts: Option<i64>,
    next_pts_tb: Rational,
    /// 新代数开始时的起始 pts（流的 start_time）
    start_pts: Option<(i64, Rational)>,
    resampler: Resampler,
}

impl AudioSpecialization {
    pub fn new(time_base: Rational, target: AudioParams) -> Self {
        Self {
            time_base,
            next_pts: None,
            next_pts_tb: time_base,
            start_pts: None,
            resampler: Resampler::new(target),
        }
    }

    /// 设置流起始时间（单位 `time_base`）
    pub fn with_start_pts(mut self, start_pts: i64) -> Self {
        self.start_pts = Some((start_pts, self.time_base));
        self.on_flush();
        self
    }
}

impl AudioSpecialization {
    fn set_target(&mut self, target: AudioParams) {
        self.resampler = Resampler::new(target);
    }
}

impl FrameSpecialization for AudioSpecialization {
    type Raw = RawAudioFrame;
    type Output = AudioBuffer;

    fn on_flush(&mut self) {
        self.resampler.reset();
        match self.start_pts {
            Some((pts, tb)) => {
                self.next_pts = Some(pts);
                self.next_pts_tb = tb;
            }
            None => {
                self.next_pts = None;
                self.next_pts_tb = self.time_base;
            }
        }
    }

    fn process(&mut self, raw: RawAudioFrame, serial: Serial) -> Option<AudioBuffer> {
        if raw.sample_rate == 0 || raw.nb_samples == 0 {
            return None;
        }
        let tb = Rational::new(1, raw.sample_rate as i32);
        let pts = match raw.pts {
            Some(pts) => Some(self.time_base.rescale(pts, tb)),
            None => self.next_pts.map(|next| self.next_pts_tb.rescale(next, tb)),
        };
        if let Some(pts) = pts {
            self.next_pts = Some(pts + raw.nb_samples as i64);
            self.next_pts_tb = tb;
        }

        let (data, nb_samples) = match self.resampler.convert(&raw) {
            Ok(converted) => converted,
            Err(e) => {
                warn!("{} ⚠️ 音频重采样失败（已丢弃该帧）: {}", log_ctx(), e);
                return None;
            }
        };
        Some(AudioBuffer {
            pts: pts.map_or(f64::NAN, |pts| pts as f64 * tb.to_f64()),
            duration: raw.nb_samples as f64 / raw.sample_rate as f64,
            nb_samples,
            params: self.resampler.target(),
            serial,
            data,
        })
    }
}

/// 视频：由帧率推算帧时长，原样转发像素数据
pub struct VideoSpecialization {
    time_base: Rational,
    frame_rate: Option<Rational>,
}

impl VideoSpecialization {
    pub fn new(time_base: Rational, frame_rate: Option<Rational>) -> Self {
        Self {
            time_base,
            frame_rate,
        }
    }
}

impl FrameSpecialization for VideoSpecialization {
    type Raw = RawVideoFrame;
    type Output = VideoFrame;

    fn on_flush(&mut self) {}

    fn process(&mut self, raw: RawVideoFrame, serial: Serial) -> Option<VideoFrame> {
        let duration = match self.frame_rate {
            Some(rate) if rate.num > 0 && rate.den > 0 => rate.den as f64 / rate.num as f64,
            _ => 0.0,
        };
        Some(VideoFrame {
            pts: raw
                .pts
                .map_or(f64::NAN, |pts| pts as f64 * self.time_base.to_f64()),
            duration,
            serial,
            width: raw.width,
            height: raw.height,
            format: raw.format,
            data: Arc::new(raw.data),
        })
    }
}

/// 一次解码的结果
#[derive(Debug)]
pub enum DecodeOutcome<T> {
    Frame(T),
    /// 该代数的数据已解码完毕（收到流结束）
    Finished(Serial),
    Aborted,
    Failed(PlayerError),
}

/// 解码统计（跨线程只读）
#[derive(Debug, Default)]
pub struct DecoderStats {
    /// 0 表示未结束
    finished: AtomicU64,
    frames: AtomicU64,
    decode_errors: AtomicU64,
    stale_packets: AtomicU64,
}

impl DecoderStats {
    pub fn finished(&self) -> Option<Serial> {
        match self.finished.load(Ordering::Acquire) {
            0 => None,
            serial => Some(serial),
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    pub fn decode_errors(&self) -> u64 {
        self.decode_errors.load(Ordering::Relaxed)
    }

    /// 因代数过期被丢弃的包数
    pub fn stale_packets(&self) -> u64 {
        self.stale_packets.load(Ordering::Relaxed)
    }
}

/// 通用解码状态机，音频和视频共用
pub struct DecodeCore<S: FrameSpecialization> {
    label: String,
    codec: Box<dyn Codec<Frame = S::Raw>>,
    specialization: S,
    queue: Arc<PacketQueue>,
    /// 最近一次取出的包所属的代数
    pkt_serial: Option<Serial>,
    /// 送包返回 Again 时暂存，下次优先重发
    pending: Option<QueueItem>,
    abort: Arc<AtomicBool>,
    on_blocking: Option<BlockingNotifier>,
    continue_on_error: bool,
    stats: Arc<DecoderStats>,
}

impl<S: FrameSpecialization> DecodeCore<S> {
    pub fn new(
        label: &str,
        codec: Box<dyn Codec<Frame = S::Raw>>,
        specialization: S,
        queue: Arc<PacketQueue>,
        on_blocking: Option<BlockingNotifier>,
        continue_on_error: bool,
    ) -> Self {
        Self {
            label: label.to_string(),
            codec,
            specialization,
            queue,
            pkt_serial: None,
            pending: None,
            abort: Arc::new(AtomicBool::new(false)),
            on_blocking,
            continue_on_error,
            stats: Arc::new(DecoderStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<DecoderStats> {
        self.stats.clone()
    }

    fn aborted(&self) -> bool {
        self.abort.load(Ordering::Acquire) || self.queue.is_aborted()
    }

    /// 解码出下一帧
    ///
    /// 只在缺包时阻塞（阻塞前调用 `on_blocking`）；队列中止后立即返回 `Aborted`。
    pub fn decode_frame(&mut self) -> DecodeOutcome<S::Output> {
        while !self.aborted() {
            if let Some(serial) = self.pkt_serial.filter(|s| *s == self.queue.serial()) {
                loop {
                    if self.aborted() {
                        return DecodeOutcome::Aborted;
                    }
                    match self.codec.receive_frame() {
                        Ok(raw) => {
                            if let Some(output) = self.specialization.process(raw, serial) {
                                self.stats.frames.fetch_add(1, Ordering::Relaxed);
                                return DecodeOutcome::Frame(output);
                            }
                        }
                        Err(CodecError::Eof) => {
                            self.stats.finished.store(serial, Ordering::Release);
                            self.codec.flush();
                            debug!("{} {} 代数 {} 解码完毕", log_ctx(), self.label, serial);
                            return DecodeOutcome::Finished(serial);
                        }
                        Err(CodecError::Again) => break,
                        Err(CodecError::Fatal(e)) => {
                            self.stats.decode_errors.fetch_add(1, Ordering::Relaxed);
                            if !self.continue_on_error {
                                return DecodeOutcome::Failed(PlayerError::DecodeError(e));
                            }
                            warn!("{} ⚠️ {} 解码错误（已跳过）: {}", log_ctx(), self.label, e);
                            break;
                        }
                    }
                }
            }

            let item = match self.pending.take() {
                Some(item) => item,
                None => match self.next_current_item() {
                    Some(item) => item,
                    None => return DecodeOutcome::Aborted,
                },
            };

            match item {
                QueueItem::Flush => {
                    self.codec.flush();
                    self.stats.finished.store(0, Ordering::Release);
                    self.specialization.on_flush();
                }
                QueueItem::Eof => match self.codec.send_packet(None) {
                    Ok(()) | Err(CodecError::Eof) => {}
                    Err(CodecError::Again) => {
                        debug!("{} {} 暂不接受流结束，稍后重发", log_ctx(), self.label);
                        self.pending = Some(QueueItem::Eof);
                    }
                    Err(CodecError::Fatal(e)) => {
                        return DecodeOutcome::Failed(PlayerError::SendPacketError(e));
                    }
                },
                QueueItem::Packet(packet) => match self.codec.send_packet(Some(&packet)) {
                    Ok(()) | Err(CodecError::Eof) => {}
                    Err(CodecError::Again) => {
                        error!(
                            "{} {} receive_frame 与 send_packet 同时返回 Again",
                            log_ctx(),
                            self.label
                        );
                        self.pending = Some(QueueItem::Packet(packet));
                    }
                    Err(CodecError::Fatal(e)) => {
                        return DecodeOutcome::Failed(PlayerError::SendPacketError(e));
                    }
                },
            }
        }
        DecodeOutcome::Aborted
    }

    /// 取出属于当前代数的下一项，丢弃过期的包；中止时返回 None
    fn next_current_item(&mut self) -> Option<QueueItem> {
        loop {
            if self.aborted() {
                return None;
            }
            let on_blocking = self.on_blocking.clone();
            let label = &self.label;
            let dequeued = self.queue.get(true, || {
                debug!("{} {} 等待数据包", log_ctx(), label);
                if let Some(notify) = &on_blocking {
                    notify();
                }
            });
            match dequeued {
                Dequeued::Item { item, serial } => {
                    self.pkt_serial = Some(serial);
                    if serial == self.queue.serial() {
                        return Some(item);
                    }
                    self.stats.stale_packets.fetch_add(1, Ordering::Relaxed);
                }
                Dequeued::Empty => continue,
                Dequeued::Aborted => return None,
            }
        }
    }
}

/// 读取结果
#[derive(Debug)]
pub enum DecoderRead<T> {
    Frame(T),
    EndOfStream(Serial),
    Aborted,
    Error(String),
}

/// 读取回调，在解码线程上调用
pub type ReadCallback<T> = Box<dyn FnOnce(DecoderRead<T>) + Send>;

fn post_read<S, F>(runner: &TaskRunner, core: &Arc<Mutex<DecodeCore<S>>>, callback: F) -> bool
where
    S: FrameSpecialization,
    F: FnOnce(DecoderRead<S::Output>) + Send + 'static,
{
    let core = core.clone();
    runner.post_task(move || {
        let outcome = core.lock().decode_frame();
        let result = match outcome {
            DecodeOutcome::Frame(frame) => DecoderRead::Frame(frame),
            DecodeOutcome::Finished(serial) => DecoderRead::EndOfStream(serial),
            DecodeOutcome::Aborted => DecoderRead::Aborted,
            DecodeOutcome::Failed(e) => {
                error!("{} ❌ 解码线程出错: {}", log_ctx(), e);
                DecoderRead::Error(e.to_string())
            }
        };
        callback(result);
    })
}

/// 解码器的读取句柄
///
/// 解码器退出之后读取请求会被直接丢弃。
pub struct DecoderReader<S: FrameSpecialization> {
    runner: TaskRunner,
    core: Arc<Mutex<DecodeCore<S>>>,
}

impl<S: FrameSpecialization> DecoderReader<S> {
    pub fn read<F>(&self, callback: F) -> bool
    where
        F: FnOnce(DecoderRead<S::Output>) + Send + 'static,
    {
        post_read(&self.runner, &self.core, callback)
    }

    /// 取消尚未开始的读取请求
    pub fn cancel(&self) {
        self.runner.remove_all_tasks();
    }
}

pub type AudioReader = DecoderReader<AudioSpecialization>;
pub type VideoReader = DecoderReader<VideoSpecialization>;

/// 运行在独立消息循环上的解码器
///
/// 渲染端通过 `read` 请求下一帧；解码在解码线程上进行，结果通过回调交还。
pub struct Decoder<S: FrameSpecialization> {
    label: String,
    looper: Option<MessageLoop>,
    runner: TaskRunner,
    core: Arc<Mutex<DecodeCore<S>>>,
    queue: Arc<PacketQueue>,
    abort: Arc<AtomicBool>,
    stats: Arc<DecoderStats>,
}

pub type AudioDecoder = Decoder<AudioSpecialization>;
pub type VideoDecoder = Decoder<VideoSpecialization>;

impl<S: FrameSpecialization> Decoder<S> {
    pub fn new(core: DecodeCore<S>) -> Result<Self> {
        let label = core.label.clone();
        // 解码线程会阻塞等包，不做慢任务告警
        let looper = MessageLoop::prepare_looper_with(&label, Duration::MAX)?;
        let runner = looper.task_runner();
        let queue = core.queue.clone();
        let abort = core.abort.clone();
        let stats = core.stats();
        info!("{} 🎞️ 创建解码器 {} ({})", log_ctx(), label, core.codec.name());
        Ok(Self {
            label,
            looper: Some(looper),
            runner,
            core: Arc::new(Mutex::new(core)),
            queue,
            abort,
            stats,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// 启动包队列（放入第一个代数分界）
    pub fn start(&self) {
        self.abort.store(false, Ordering::Release);
        self.queue.start();
    }

    /// 请求下一帧，结果在解码线程上交给 `callback`
    pub fn read<F>(&self, callback: F) -> bool
    where
        F: FnOnce(DecoderRead<S::Output>) + Send + 'static,
    {
        post_read(&self.runner, &self.core, callback)
    }

    /// 给渲染端使用的读取句柄
    pub fn reader(&self) -> DecoderReader<S> {
        DecoderReader {
            runner: self.runner.clone(),
            core: self.core.clone(),
        }
    }

    /// 中止：中止并清空包队列，唤醒阻塞中的解码
    pub fn abort(&self) {
        self.abort.store(true, Ordering::Release);
        self.queue.abort();
        self.queue.flush();
        self.runner.remove_all_tasks();
    }

    /// 等待解码线程结束（应在 `abort` 之后调用）
    pub fn join(&mut self) {
        if let Some(looper) = self.looper.take() {
            self.runner.reset();
            looper.join();
            info!("{} ✅ 解码器 {} 已退出", log_ctx(), self.label);
        }
    }

    pub fn stats(&self) -> Arc<DecoderStats> {
        self.stats.clone()
    }

    pub fn queue(&self) -> &Arc<PacketQueue> {
        &self.queue
    }
}

impl Decoder<AudioSpecialization> {
    /// 设备参数确定后调整重采样目标（需在第一次读取之前调用）
    pub fn set_output_params(&self, params: AudioParams) {
        self.core.lock().specialization.set_target(params);
    }
}

impl<S: FrameSpecialization> Drop for Decoder<S> {
    fn drop(&mut self) {
        if self.looper.is_some() {
            self.abort();
            self.join();
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::{PixelFormat, SampleFormat, StreamType};
    use crate::player::codec::CodecResult;
    use crate::player::packet::Packet;
    use std::collections::VecDeque;

    /// 每个包解出一帧，帧 pts 等于包 pts
    pub(crate) struct MockVideoCodec {
        buffered: VecDeque<Option<i64>>,
        draining: bool,
        pub(crate) sent: Arc<Mutex<Vec<i64>>>,
    }

    impl MockVideoCodec {
        pub(crate) fn new() -> Self {
            Self {
                buffered: VecDeque::new(),
                draining: false,
                sent: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl Codec for MockVideoCodec {
        type Frame = RawVideoFrame;

        fn send_packet(&mut self, packet: Option<&Packet>) -> CodecResult<()> {
            match packet {
                Some(packet) => {
                    self.sent.lock().push(packet.pts.unwrap_or(-1));
                    self.buffered.push_back(packet.pts);
                }
                None => self.draining = true,
            }
            Ok(())
        }

        fn receive_frame(&mut self) -> CodecResult<RawVideoFrame> {
            match self.buffered.pop_front() {
                Some(pts) => Ok(RawVideoFrame {
                    pts,
                    width: 4,
                    height: 2,
                    format: PixelFormat::RGBA,
                    data: vec![0; 32],
                }),
                None if self.draining => Err(CodecError::Eof),
                None => Err(CodecError::Again),
            }
        }

        fn flush(&mut self) {
            self.buffered.clear();
            self.draining = false;
        }

        fn name(&self) -> &str {
            "mock_video"
        }
    }

    /// 每个包解出 `samples` 个采样，没有 pts
    pub(crate) struct MockAudioCodec {
        ready: usize,
        samples: usize,
    }

    impl MockAudioCodec {
        pub(crate) fn new(samples: usize) -> Self {
            Self { ready: 0, samples }
        }
    }

    impl Codec for MockAudioCodec {
        type Frame = RawAudioFrame;

        fn send_packet(&mut self, packet: Option<&Packet>) -> CodecResult<()> {
            if packet.is_some() {
                self.ready += 1;
            }
            Ok(())
        }

        fn receive_frame(&mut self) -> CodecResult<RawAudioFrame> {
            if self.ready == 0 {
                return Err(CodecError::Again);
            }
            self.ready -= 1;
            Ok(RawAudioFrame {
                pts: None,
                sample_rate: 48000,
                channels: 2,
                format: SampleFormat::I16,
                nb_samples: self.samples,
                data: vec![0; self.samples * 4],
            })
        }

        fn flush(&mut self) {
            self.ready = 0;
        }
    }

    /// send_packet 总是失败
    struct BrokenCodec;

    impl Codec for BrokenCodec {
        type Frame = RawVideoFrame;

        fn send_packet(&mut self, _packet: Option<&Packet>) -> CodecResult<()> {
            Err(CodecError::Fatal("corrupt".into()))
        }

        fn receive_frame(&mut self) -> CodecResult<RawVideoFrame> {
            Err(CodecError::Again)
        }

        fn flush(&mut self) {}
    }

    /// 第一次收到流结束时返回 Again，要求先取走输出
    struct DeferredDrainCodec {
        inner: MockVideoCodec,
        deferred: bool,
    }

    impl Codec for DeferredDrainCodec {
        type Frame = RawVideoFrame;

        fn send_packet(&mut self, packet: Option<&Packet>) -> CodecResult<()> {
            if packet.is_none() && !self.deferred {
                self.deferred = true;
                return Err(CodecError::Again);
            }
            self.inner.send_packet(packet)
        }

        fn receive_frame(&mut self) -> CodecResult<RawVideoFrame> {
            self.inner.receive_frame()
        }

        fn flush(&mut self) {
            self.inner.flush()
        }
    }

    const TB: Rational = Rational::new(1, 1000);

    fn video_packet(pts: i64) -> Packet {
        Packet::new(StreamType::Video, vec![1, 2, 3], Some(pts), TB).with_duration(40)
    }

    fn started_queue(stream: StreamType) -> Arc<PacketQueue> {
        let queue = Arc::new(PacketQueue::new(stream));
        queue.start();
        queue
    }

    fn video_core(queue: Arc<PacketQueue>, codec: MockVideoCodec) -> DecodeCore<VideoSpecialization> {
        DecodeCore::new(
            "video_decoder",
            Box::new(codec),
            VideoSpecialization::new(TB, Some(Rational::new(25, 1))),
            queue,
            None,
            true,
        )
    }

    fn expect_frame<T: std::fmt::Debug>(outcome: DecodeOutcome<T>) -> T {
        match outcome {
            DecodeOutcome::Frame(frame) => frame,
            other => panic!("expected frame, got {:?}", other),
        }
    }

    #[test]
    fn test_stale_packets_discarded_after_seek() {
        let queue = started_queue(StreamType::Video);
        let codec = MockVideoCodec::new();
        let sent = codec.sent.clone();
        let mut core = video_core(queue.clone(), codec);

        for i in 0..5 {
            queue.put(video_packet(i * 40));
        }
        // seek：代数加一并放入分界，旧包留在队列前部
        queue.put_flush();
        for i in 0..3 {
            queue.put(video_packet(10_000 + i * 40));
        }

        let frames: Vec<VideoFrame> = (0..3).map(|_| expect_frame(core.decode_frame())).collect();
        assert_eq!(*sent.lock(), vec![10_000, 10_040, 10_080]);
        assert!(frames.iter().all(|f| f.serial == 2));
        assert!((frames[1].pts - 10.04).abs() < 1e-9);
        assert!((frames[0].duration - 0.04).abs() < 1e-9);
        // 启动时的分界和 5 个旧包
        assert_eq!(core.stats().stale_packets(), 6);
    }

    #[test]
    fn test_eof_marks_finished_generation() {
        let queue = started_queue(StreamType::Video);
        let mut core = video_core(queue.clone(), MockVideoCodec::new());
        queue.put(video_packet(0));
        queue.put_null_packet();

        expect_frame(core.decode_frame());
        assert!(matches!(core.decode_frame(), DecodeOutcome::Finished(1)));
        assert_eq!(core.stats().finished(), Some(1));

        // 新代数清除结束标记
        queue.begin_new_generation();
        queue.put(video_packet(500));
        let frame = expect_frame(core.decode_frame());
        assert_eq!(frame.serial, 2);
        assert_eq!(core.stats().finished(), None);
    }

    #[test]
    fn test_deferred_end_of_stream_is_resent() {
        let queue = started_queue(StreamType::Video);
        let codec = DeferredDrainCodec {
            inner: MockVideoCodec::new(),
            deferred: false,
        };
        let mut core: DecodeCore<VideoSpecialization> = DecodeCore::new(
            "video_decoder",
            Box::new(codec),
            VideoSpecialization::new(TB, None),
            queue.clone(),
            None,
            true,
        );
        queue.put(video_packet(0));
        queue.put_null_packet();

        expect_frame(core.decode_frame());
        assert!(matches!(core.decode_frame(), DecodeOutcome::Finished(1)));
        assert_eq!(core.stats().finished(), Some(1));
    }

    #[test]
    fn test_send_failure_is_fatal() {
        let queue = started_queue(StreamType::Video);
        let mut core: DecodeCore<VideoSpecialization> = DecodeCore::new(
            "video_decoder",
            Box::new(BrokenCodec),
            VideoSpecialization::new(TB, None),
            queue.clone(),
            None,
            true,
        );
        queue.put(video_packet(0));
        assert!(matches!(
            core.decode_frame(),
            DecodeOutcome::Failed(PlayerError::SendPacketError(_))
        ));
    }

    #[test]
    fn test_audio_next_pts_continuity() {
        let queue = started_queue(StreamType::Audio);
        let mut core = DecodeCore::new(
            "audio_decoder",
            Box::new(MockAudioCodec { ready: 0, samples: 1024 }),
            AudioSpecialization::new(TB, AudioParams::default()).with_start_pts(2000),
            queue.clone(),
            None,
            true,
        );
        for _ in 0..3 {
            queue.put(Packet::new(StreamType::Audio, vec![0; 8], None, TB));
        }
        let pts: Vec<f64> = (0..3).map(|_| expect_frame(core.decode_frame()).pts).collect();
        let step = 1024.0 / 48000.0;
        assert!((pts[0] - 2.0).abs() < 1e-6);
        assert!((pts[1] - (2.0 + step)).abs() < 1e-6);
        assert!((pts[2] - (2.0 + 2.0 * step)).abs() < 1e-6);
    }

    #[test]
    fn test_blocking_notifies_and_abort_unblocks() {
        let queue = started_queue(StreamType::Video);
        let (tx, rx) = crossbeam_channel::unbounded();
        let notifier: BlockingNotifier = Arc::new(move || {
            let _ = tx.send(());
        });
        let core = DecodeCore::new(
            "video_decoder",
            Box::new(MockVideoCodec::new()),
            VideoSpecialization::new(TB, None),
            queue.clone(),
            Some(notifier),
            true,
        );
        let mut decoder = Decoder::new(core).unwrap();
        let (result_tx, result_rx) = crossbeam_channel::unbounded();
        decoder.read(move |result| {
            let _ = result_tx.send(matches!(result, DecoderRead::Aborted));
        });

        rx.recv_timeout(Duration::from_secs(2)).unwrap();
        decoder.abort();
        assert!(result_rx.recv_timeout(Duration::from_secs(2)).unwrap());
        decoder.join();
    }

    #[test]
    fn test_threaded_read_delivers_frames() {
        let queue = Arc::new(PacketQueue::new(StreamType::Video));
        let decoder = Decoder::new(video_core(queue.clone(), MockVideoCodec::new())).unwrap();
        decoder.start();
        queue.put(video_packet(80));

        let (tx, rx) = crossbeam_channel::unbounded();
        decoder.read(move |result| {
            if let DecoderRead::Frame(frame) = result {
                let _ = tx.send(frame.pts);
            }
        });
        let pts = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!((pts - 0.08).abs() < 1e-9);
        assert_eq!(decoder.stats().frames(), 1);
    }
}
