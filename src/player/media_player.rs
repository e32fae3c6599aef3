use crate::base::{MessageLoop, TaskRunner};
use crate::core::{
    log_ctx, AudioParams, BufferStatus, MediaClock, MediaInfo, PlaybackState, PlayerConfig,
    PlayerError, PlayerEvent, PlayerState, Rational, Result, Serial, StreamType, SyncType,
    VideoFrame,
};
use crate::player::audio_renderer::AudioRenderer;
use crate::player::codec::{BoxedAudioCodec, BoxedVideoCodec};
use crate::player::decoder::{
    AudioDecoder, AudioSpecialization, DecodeCore, VideoDecoder, VideoSpecialization,
};
use crate::player::demuxer::{Demuxer, DemuxerEvent, DemuxerSource, StreamInfo, StreamQueue};
use crate::player::packet_queue::PacketQueue;
use crate::player::sink::{
    AudioRendererSink, NullAudioSink, RendererEvent, RendererNotifier, VideoRendererSink,
};
use crate::player::video_renderer::VideoRenderer;
use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Weak};
use std::time::Duration;

const STATUS_TASK: u64 = 1;
const BUFFERING_TASK: u64 = 2;
const BUFFERING_CHECK_INTERVAL: Duration = Duration::from_millis(50);

pub type AudioSinkFactory = Arc<dyn Fn() -> Box<dyn AudioRendererSink> + Send + Sync>;
pub type VideoSinkFactory = Arc<dyn Fn() -> Box<dyn VideoRendererSink> + Send + Sync>;

/// 平台输出，每次打开媒体时各创建一个
#[derive(Clone, Default)]
pub struct RendererSinks {
    pub audio: Option<AudioSinkFactory>,
    pub video: Option<VideoSinkFactory>,
}

/// 一个待播放的媒体：数据源加上各路流的解码器
pub struct MediaSource {
    pub demuxer: Box<dyn DemuxerSource>,
    pub audio_codec: Option<BoxedAudioCodec>,
    pub video_codec: Option<BoxedVideoCodec>,
}

struct AudioPipeline {
    queue: Arc<PacketQueue>,
    time_base: Rational,
    decoder: AudioDecoder,
    renderer: AudioRenderer,
    render_loop: Option<MessageLoop>,
    ended: Option<Serial>,
}

struct VideoPipeline {
    queue: Arc<PacketQueue>,
    time_base: Rational,
    decoder: VideoDecoder,
    renderer: VideoRenderer,
    render_loop: Option<MessageLoop>,
    ended: Option<Serial>,
}

/// 一次打开的媒体对应的全部线程和组件
struct Session {
    media_clock: Arc<MediaClock>,
    demuxer: Demuxer,
    audio: Option<AudioPipeline>,
    video: Option<VideoPipeline>,
    media_info: MediaInfo,
}

impl Session {
    fn buffer_status(&self) -> BufferStatus {
        let mut status = BufferStatus::default();
        if let Some(audio) = &self.audio {
            status.audio_packets = audio.queue.len();
            status.audio_frames = audio.renderer.buffered_blocks();
            status.audio_underruns = audio.renderer.underruns();
        }
        if let Some(video) = &self.video {
            status.video_packets = video.queue.len();
            status.video_frames = video.renderer.buffered_frames();
            status.frames_dropped = video.renderer.frames_dropped();
        }
        status
    }

    /// 所有流都已播放到当前代数的末尾
    fn all_ended(&self) -> bool {
        let audio_done = self
            .audio
            .as_ref()
            .map_or(true, |a| a.ended == Some(a.queue.serial()));
        let video_done = self
            .video
            .as_ref()
            .map_or(true, |v| v.ended == Some(v.queue.serial()));
        audio_done && video_done
    }

    /// 按 "中止队列 → 等待解码线程 → 停止输出" 的顺序销毁
    fn teardown(mut self) {
        self.demuxer.stop();
        if let Some(audio) = &self.audio {
            audio.decoder.abort();
        }
        if let Some(video) = &self.video {
            video.decoder.abort();
        }
        if let Some(audio) = self.audio.as_mut() {
            audio.decoder.join();
            audio.renderer.stop();
            if let Some(render_loop) = audio.render_loop.take() {
                render_loop.join();
            }
        }
        if let Some(video) = self.video.as_mut() {
            video.decoder.join();
            video.renderer.stop();
            if let Some(render_loop) = video.render_loop.take() {
                render_loop.join();
            }
        }
    }
}

struct Shared {
    state: PlaybackState,
    play_when_ready: bool,
    volume: f64,
    muted: bool,
    media_info: Option<MediaInfo>,
    /// 最近一次 seek 的目标，主时钟无效时作为当前位置
    seek_target: Option<f64>,
    media_clock: Option<Arc<MediaClock>>,
}

struct PlayerInner {
    runner: TaskRunner,
    config: PlayerConfig,
    sinks: RendererSinks,
    shared: Mutex<Shared>,
    session: Mutex<Option<Session>>,
    event_tx: Sender<PlayerEvent>,
    self_ref: Weak<PlayerInner>,
}

impl PlayerInner {
    fn emit(&self, event: PlayerEvent) {
        let _ = self.event_tx.send(event);
    }

    /// 在播放器线程上执行
    fn post<F>(&self, task: F) -> bool
    where
        F: FnOnce(&Arc<PlayerInner>) + Send + 'static,
    {
        let Some(inner) = self.self_ref.upgrade() else {
            return false;
        };
        self.runner.post_task(move || task(&inner))
    }

    fn set_state(&self, session: Option<&mut Session>, state: PlaybackState) {
        let changed = {
            let mut shared = self.shared.lock();
            let changed = shared.state != state;
            shared.state = state;
            changed
        };
        if changed {
            info!("{} 🎮 播放状态 -> {:?}", log_ctx(), state);
            self.emit(PlayerEvent::StateChanged(state));
        }
        if let Some(session) = session {
            self.apply_playback(session);
        }
    }

    /// 根据状态和 play_when_ready 暂停或恢复输出与时钟
    fn apply_playback(&self, session: &mut Session) {
        let running = {
            let shared = self.shared.lock();
            shared.state == PlaybackState::Ready && shared.play_when_ready
        };
        // 视频先调整 frame_timer，再恢复时钟
        if let Some(video) = &session.video {
            video.renderer.set_paused(!running);
        }
        session.media_clock.set_paused(!running);
        if let Some(audio) = session.audio.as_mut() {
            audio.renderer.set_paused(!running);
        }
    }

    fn fail(&self, error: PlayerError) {
        error!("{} ❌ 播放失败: {}", log_ctx(), error);
        let mut session = self.session.lock();
        self.emit(PlayerEvent::Error(error.to_string()));
        self.set_state(session.as_mut(), PlaybackState::Error);
    }

    fn open_session(self: &Arc<Self>, source: MediaSource) -> Result<Session> {
        let MediaSource {
            demuxer: demuxer_source,
            audio_codec,
            video_codec,
        } = source;
        let media_info = demuxer_source.media_info().clone();
        // 只保留既有流信息又有解码器的流
        let audio_stream = audio_codec.and_then(|codec| {
            demuxer_source
                .stream_info(StreamType::Audio)
                .map(|info| (codec, info))
        });
        let video_stream = video_codec.and_then(|codec| {
            demuxer_source
                .stream_info(StreamType::Video)
                .map(|info| (codec, info))
        });
        if audio_stream.is_none() && video_stream.is_none() {
            return Err(PlayerError::NoStream);
        }

        let audio_queue = audio_stream
            .as_ref()
            .map(|_| Arc::new(PacketQueue::new(StreamType::Audio)));
        let video_queue = video_stream
            .as_ref()
            .map(|_| Arc::new(PacketQueue::new(StreamType::Video)));

        let has_audio = audio_queue.is_some();
        let has_video = video_queue.is_some();
        let serial_of = |queue: &Option<Arc<PacketQueue>>| {
            queue
                .as_ref()
                .map_or_else(|| Arc::new(AtomicU64::new(0)), |q| q.serial_handle())
        };
        let media_clock = Arc::new(MediaClock::new(
            serial_of(&audio_queue),
            serial_of(&video_queue),
            self.config.sync.sync_type,
            Some(Box::new(move |wanted| match wanted {
                SyncType::VideoMaster if has_video => SyncType::VideoMaster,
                SyncType::VideoMaster if has_audio => SyncType::AudioMaster,
                SyncType::AudioMaster if has_audio => SyncType::AudioMaster,
                _ => SyncType::ExternalClock,
            })),
        ));

        let mut stream_queues = Vec::new();
        if let (Some(queue), Some((_, info))) = (&audio_queue, &audio_stream) {
            stream_queues.push(StreamQueue {
                stream: StreamType::Audio,
                queue: queue.clone(),
                time_base: info.time_base,
            });
        }
        if let (Some(queue), Some((_, info))) = (&video_queue, &video_stream) {
            stream_queues.push(StreamQueue {
                stream: StreamType::Video,
                queue: queue.clone(),
                time_base: info.time_base,
            });
        }

        let weak = Arc::downgrade(self);
        let demuxer = Demuxer::new(
            demuxer_source,
            stream_queues,
            media_clock.clone(),
            self.config.buffer.clone(),
            Arc::new(move |event| {
                if let Some(inner) = weak.upgrade() {
                    inner.post(move |inner| inner.on_demuxer_event(event));
                }
            }),
        )?;

        let audio = match (audio_queue, audio_stream) {
            (Some(queue), Some((codec, info))) => {
                Some(self.open_audio(queue, codec, info, &demuxer, &media_clock)?)
            }
            _ => None,
        };
        let video = match (video_queue, video_stream) {
            (Some(queue), Some((codec, info))) => {
                Some(self.open_video(queue, codec, info, &demuxer, &media_clock)?)
            }
            _ => None,
        };

        Ok(Session {
            media_clock,
            demuxer,
            audio,
            video,
            media_info,
        })
    }

    fn renderer_notifier(self: &Arc<Self>, stream: StreamType) -> RendererNotifier {
        let weak = Arc::downgrade(self);
        Arc::new(move |event| {
            if let Some(inner) = weak.upgrade() {
                inner.post(move |inner| inner.on_renderer_event(stream, event));
            }
        })
    }

    fn open_audio(
        self: &Arc<Self>,
        queue: Arc<PacketQueue>,
        codec: BoxedAudioCodec,
        info: StreamInfo,
        demuxer: &Demuxer,
        media_clock: &Arc<MediaClock>,
    ) -> Result<AudioPipeline> {
        let config = &self.config.audio;
        let wanted = AudioParams {
            sample_rate: config.wanted_sample_rate,
            channels: config.wanted_channels,
            format: config.sample_format,
        };
        let mut specialization = AudioSpecialization::new(info.time_base, wanted);
        if let Some(start_pts) = info.start_pts {
            specialization = specialization.with_start_pts(start_pts);
        }
        let core = DecodeCore::new(
            "audio_decoder",
            codec,
            specialization,
            queue.clone(),
            Some(demuxer.blocking_notifier()),
            config.continue_on_decode_error,
        );
        let decoder = AudioDecoder::new(core)?;
        decoder.start();

        let render_loop = MessageLoop::prepare_looper_with(
            "audio_render",
            Duration::from_millis(self.config.scheduler.slow_task_warning_ms),
        )?;
        let sink = match &self.sinks.audio {
            Some(factory) => factory(),
            None => Box::new(NullAudioSink::new()),
        };
        let mut renderer = AudioRenderer::new(
            render_loop.task_runner(),
            decoder.reader(),
            sink,
            media_clock.clone(),
            queue.serial_handle(),
            config.clone(),
            self.config.sync.clone(),
            self.config.buffer.audio_ring_capacity,
            self.renderer_notifier(StreamType::Audio),
        );
        let params = renderer
            .initialize(wanted)
            .map_err(|e| PlayerError::AudioError(e.to_string()))?;
        decoder.set_output_params(params);
        renderer.start()?;
        {
            let shared = self.shared.lock();
            renderer.set_volume(shared.volume);
            renderer.set_muted(shared.muted);
        }
        info!("{} 🔊 音频流: {} ({:?})", log_ctx(), info.codec_name, info.time_base);
        Ok(AudioPipeline {
            queue,
            time_base: info.time_base,
            decoder,
            renderer,
            render_loop: Some(render_loop),
            ended: None,
        })
    }

    fn open_video(
        self: &Arc<Self>,
        queue: Arc<PacketQueue>,
        codec: BoxedVideoCodec,
        info: StreamInfo,
        demuxer: &Demuxer,
        media_clock: &Arc<MediaClock>,
    ) -> Result<VideoPipeline> {
        let core = DecodeCore::new(
            "video_decoder",
            codec,
            VideoSpecialization::new(info.time_base, info.frame_rate),
            queue.clone(),
            Some(demuxer.blocking_notifier()),
            self.config.audio.continue_on_decode_error,
        );
        let decoder = VideoDecoder::new(core)?;
        decoder.start();

        let render_loop = MessageLoop::prepare_looper_with(
            "video_render",
            Duration::from_millis(self.config.scheduler.slow_task_warning_ms),
        )?;
        let sink: Box<dyn VideoRendererSink> = match &self.sinks.video {
            Some(factory) => factory(),
            None => Box::new(DiscardVideoSink),
        };
        let renderer = VideoRenderer::new(
            render_loop.task_runner(),
            decoder.reader(),
            sink,
            media_clock.clone(),
            queue.serial_handle(),
            self.config.sync.clone(),
            self.config.buffer.video_ring_capacity,
            self.renderer_notifier(StreamType::Video),
        );
        renderer.set_paused(true);
        renderer.start();
        info!("{} 🎞️ 视频流: {} ({:?})", log_ctx(), info.codec_name, info.frame_rate);
        Ok(VideoPipeline {
            queue,
            time_base: info.time_base,
            decoder,
            renderer,
            render_loop: Some(render_loop),
            ended: None,
        })
    }

    fn do_open(self: &Arc<Self>, source: MediaSource) {
        // 投递之后又被 stop 了
        if self.shared.lock().state != PlaybackState::Opening {
            return;
        }
        let description = source.demuxer.description();
        info!("{} 📂 打开媒体: {}", log_ctx(), description);
        match self.open_session(source) {
            Ok(session) => {
                let duration = session.media_info.duration;
                {
                    let mut shared = self.shared.lock();
                    shared.media_info = Some(session.media_info.clone());
                    shared.media_clock = Some(session.media_clock.clone());
                    shared.seek_target = None;
                }
                session.demuxer.start();
                let mut guard = self.session.lock();
                *guard = Some(session);
                self.emit(PlayerEvent::Prepared { duration });
                self.set_state(guard.as_mut(), PlaybackState::Buffering);
                drop(guard);
                self.schedule_buffering_check();
                self.schedule_status_dump();
            }
            Err(e) => self.fail(e),
        }
    }

    fn on_demuxer_event(&self, event: DemuxerEvent) {
        let guard = self.session.lock();
        let Some(session) = guard.as_ref() else {
            return;
        };
        match event {
            DemuxerEvent::SeekCompleted { position } => {
                // 队列已进入新代数，渲染端丢弃旧数据
                if let Some(audio) = &session.audio {
                    audio.renderer.flush();
                }
                if let Some(video) = &session.video {
                    video.renderer.flush();
                }
                self.shared.lock().seek_target = Some(position);
                self.emit(PlayerEvent::SeekCompleted { position });
            }
            DemuxerEvent::EndOfFile => {
                debug!("{} 📄 数据已全部读出", log_ctx());
            }
            DemuxerEvent::Error(message) => {
                drop(guard);
                self.fail(PlayerError::Other(message));
            }
        }
    }

    fn on_renderer_event(&self, stream: StreamType, event: RendererEvent) {
        let mut guard = self.session.lock();
        let Some(session) = guard.as_mut() else {
            return;
        };
        match event {
            RendererEvent::Ended(serial) => {
                match stream {
                    StreamType::Audio => {
                        if let Some(audio) = session.audio.as_mut() {
                            audio.ended = Some(serial);
                        }
                    }
                    StreamType::Video => {
                        if let Some(video) = session.video.as_mut() {
                            video.ended = Some(serial);
                        }
                    }
                }
                if session.all_ended() {
                    info!("{} 🏁 播放结束", log_ctx());
                    self.set_state(Some(session), PlaybackState::Ended);
                }
            }
            RendererEvent::FirstVideoFrame { width, height } => {
                {
                    let mut shared = self.shared.lock();
                    if let Some(info) = shared.media_info.as_mut() {
                        info.width = width;
                        info.height = height;
                    }
                }
                self.emit(PlayerEvent::VideoSizeChanged { width, height });
            }
            RendererEvent::Error(message) => {
                drop(guard);
                let error = match stream {
                    StreamType::Audio => PlayerError::AudioError(message),
                    StreamType::Video => PlayerError::RenderError(message),
                };
                self.fail(error);
            }
        }
    }

    /// 缓冲足够时进入 Ready，播放中缺数据时回到 Buffering
    fn check_buffering(&self) {
        let mut guard = self.session.lock();
        let Some(session) = guard.as_mut() else {
            return;
        };
        let state = self.shared.lock().state;
        let buffer = &self.config.buffer;
        let eof = session.demuxer.is_eof();
        let enough = buffer.infinite_buffer
            || eof
            || session.audio.iter().all(|a| {
                a.queue
                    .has_enough_packets(a.time_base, buffer.min_frames, buffer.min_buffer_duration)
            }) && session.video.iter().all(|v| {
                v.queue
                    .has_enough_packets(v.time_base, buffer.min_frames, buffer.min_buffer_duration)
            });
        match state {
            PlaybackState::Buffering if enough => {
                self.set_state(Some(session), PlaybackState::Ready);
            }
            PlaybackState::Ready if !eof && session.starving() => {
                warn!("{} ⏳ 数据不足，重新缓冲", log_ctx());
                self.set_state(Some(session), PlaybackState::Buffering);
            }
            _ => {}
        }
    }

    fn schedule_buffering_check(&self) {
        let Some(inner) = self.self_ref.upgrade() else {
            return;
        };
        self.runner
            .post_delayed_task_with_id(BUFFERING_CHECK_INTERVAL, BUFFERING_TASK, move || {
                inner.check_buffering();
                inner.schedule_buffering_check();
            });
    }

    /// 定时输出时钟与队列状态；实时流同时调整外部时钟速度
    fn dump_status(&self) {
        let guard = self.session.lock();
        let Some(session) = guard.as_ref() else {
            return;
        };
        let clock = &session.media_clock;
        if session.media_info.realtime && clock.master_sync_type() == SyncType::ExternalClock {
            clock.check_external_clock_speed(
                session.video.as_ref().map(|v| v.queue.len()),
                session.audio.as_ref().map(|a| a.queue.len()),
            );
        }
        let status = session.buffer_status();
        debug!(
            "{} 📊 M={:.3} A={:.3} V={:.3} E={:.3} aq={} vq={} af={} vf={} drop={} underrun={}",
            log_ctx(),
            clock.get_master_clock(),
            clock.audio_clock().get(),
            clock.video_clock().get(),
            clock.ext_clock().get(),
            status.audio_packets,
            status.video_packets,
            status.audio_frames,
            status.video_frames,
            status.frames_dropped,
            status.audio_underruns
        );
    }

    fn schedule_status_dump(&self) {
        let Some(inner) = self.self_ref.upgrade() else {
            return;
        };
        let interval_ms = self.config.scheduler.status_dump_interval_ms;
        if interval_ms == 0 {
            return;
        }
        let interval = Duration::from_millis(interval_ms);
        self.runner
            .post_delayed_task_with_id(interval, STATUS_TASK, move || {
                inner.dump_status();
                inner.schedule_status_dump();
            });
    }

    fn stop_session(&self) {
        self.runner.remove_task(STATUS_TASK);
        self.runner.remove_task(BUFFERING_TASK);
        let session = self.session.lock().take();
        if let Some(session) = session {
            info!("{} ⏹ 停止播放", log_ctx());
            session.teardown();
        }
        let mut shared = self.shared.lock();
        shared.media_clock = None;
        shared.media_info = None;
        shared.seek_target = None;
    }
}

impl Session {
    /// 播放中某一路已经没有任何数据
    fn starving(&self) -> bool {
        let audio_starving = self
            .audio
            .as_ref()
            .map_or(false, |a| a.queue.is_empty() && a.renderer.buffered_blocks() == 0);
        let video_starving = self
            .video
            .as_ref()
            .map_or(false, |v| v.queue.is_empty() && v.renderer.buffered_frames() == 0);
        audio_starving || video_starving
    }
}

/// 没有视频输出时丢弃画面
struct DiscardVideoSink;

impl VideoRendererSink for DiscardVideoSink {
    fn render(&mut self, _frame: &VideoFrame) {}
}

/// 媒体播放器
///
/// 所有控制操作都投递到播放器自己的消息循环上执行；
/// 状态查询只读取快照，不会阻塞。
pub struct MediaPlayer {
    looper: Mutex<Option<MessageLoop>>,
    inner: Arc<PlayerInner>,
    events: Receiver<PlayerEvent>,
}

impl MediaPlayer {
    pub fn new(config: PlayerConfig, sinks: RendererSinks) -> Result<Self> {
        config.validate()?;
        let looper = MessageLoop::prepare_looper_with(
            "player",
            Duration::from_millis(config.scheduler.slow_task_warning_ms),
        )?;
        let (event_tx, events) = unbounded();
        let shared = Shared {
            state: PlaybackState::Idle,
            play_when_ready: false,
            volume: config.audio.volume.clamp(0.0, 1.0),
            muted: config.audio.muted,
            media_info: None,
            seek_target: None,
            media_clock: None,
        };
        let runner = looper.task_runner();
        let inner = Arc::new_cyclic(|self_ref| PlayerInner {
            runner,
            config,
            sinks,
            shared: Mutex::new(shared),
            session: Mutex::new(None),
            event_tx,
            self_ref: self_ref.clone(),
        });
        info!("{} 🎮 创建播放器", log_ctx());
        Ok(Self {
            looper: Mutex::new(Some(looper)),
            inner,
            events,
        })
    }

    /// 播放器事件（状态变化、尺寸变化、seek 完成、错误）
    pub fn events(&self) -> Receiver<PlayerEvent> {
        self.events.clone()
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.inner.config
    }

    /// 打开媒体（异步完成，结果通过事件通知）
    pub fn open(&self, source: MediaSource) -> Result<()> {
        let state = self.inner.shared.lock().state;
        match state {
            PlaybackState::Idle | PlaybackState::Ended | PlaybackState::Error => {}
            other => {
                return Err(PlayerError::StateError(format!(
                    "当前状态 {:?} 不能打开新的媒体",
                    other
                )))
            }
        }
        self.inner.stop_session();
        self.inner.set_state(None, PlaybackState::Opening);
        if !self.inner.post(move |inner| inner.do_open(source)) {
            return Err(PlayerError::SchedulerError("播放器线程已退出".into()));
        }
        Ok(())
    }

    pub fn set_play_when_ready(&self, play_when_ready: bool) {
        self.inner.shared.lock().play_when_ready = play_when_ready;
        self.inner.post(|inner| {
            if let Some(session) = inner.session.lock().as_mut() {
                inner.apply_playback(session);
            }
        });
    }

    pub fn play_when_ready(&self) -> bool {
        self.inner.shared.lock().play_when_ready
    }

    /// Seek 到指定位置（秒）
    pub fn seek(&self, position: f64) {
        self.inner.shared.lock().seek_target = Some(position.max(0.0));
        self.inner.post(move |inner| {
            let mut guard = inner.session.lock();
            let Some(session) = guard.as_mut() else {
                return;
            };
            let state = inner.shared.lock().state;
            if matches!(state, PlaybackState::Ready | PlaybackState::Ended) {
                inner.set_state(Some(session), PlaybackState::Buffering);
            }
            session.demuxer.seek(position);
        });
    }

    /// 音量 0.0 - 1.0
    pub fn set_volume(&self, volume: f64) {
        let volume = volume.clamp(0.0, 1.0);
        self.inner.shared.lock().volume = volume;
        self.inner.post(move |inner| {
            if let Some(audio) = inner.session.lock().as_mut().and_then(|s| s.audio.as_mut()) {
                audio.renderer.set_volume(volume);
            }
        });
    }

    pub fn get_volume(&self) -> f64 {
        self.inner.shared.lock().volume
    }

    pub fn set_mute(&self, muted: bool) {
        self.inner.shared.lock().muted = muted;
        self.inner.post(move |inner| {
            if let Some(audio) = inner.session.lock().as_ref().and_then(|s| s.audio.as_ref()) {
                audio.renderer.set_muted(muted);
            }
        });
    }

    pub fn is_mute(&self) -> bool {
        self.inner.shared.lock().muted
    }

    /// 当前位置（秒）：主时钟无效时返回最近的 seek 目标
    pub fn get_current_position(&self) -> f64 {
        let shared = self.inner.shared.lock();
        let master = shared
            .media_clock
            .as_ref()
            .map_or(f64::NAN, |clock| clock.get_master_clock());
        if master.is_nan() {
            shared.seek_target.unwrap_or(0.0)
        } else {
            master.max(0.0)
        }
    }

    /// 总时长（秒），未知时为 NaN
    pub fn get_duration(&self) -> f64 {
        self.inner
            .shared
            .lock()
            .media_info
            .as_ref()
            .map_or(f64::NAN, |info| info.duration)
    }

    pub fn get_media_info(&self) -> Option<MediaInfo> {
        self.inner.shared.lock().media_info.clone()
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.inner.shared.lock().state
    }

    /// 状态快照
    pub fn get_state(&self) -> PlayerState {
        let position = self.get_current_position();
        let buffer = self
            .inner
            .session
            .try_lock()
            .and_then(|guard| guard.as_ref().map(Session::buffer_status))
            .unwrap_or_default();
        let shared = self.inner.shared.lock();
        PlayerState {
            state: shared.state,
            play_when_ready: shared.play_when_ready,
            position,
            duration: shared
                .media_info
                .as_ref()
                .map_or(f64::NAN, |info| info.duration),
            volume: shared.volume,
            muted: shared.muted,
            media_info: shared.media_info.clone(),
            buffer,
        }
    }

    /// 停止播放并释放所有线程，回到 Idle
    pub fn stop(&self) {
        self.inner.stop_session();
        self.inner.set_state(None, PlaybackState::Idle);
    }

    /// 停止并退出播放器线程
    pub fn release(&self) {
        self.stop();
        if let Some(looper) = self.looper.lock().take() {
            looper.join();
        }
    }
}

impl Drop for MediaPlayer {
    fn drop(&mut self) {
        self.release();
    }
}
