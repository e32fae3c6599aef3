use crate::base::time::{duration_from_secs, relative_time};
use crate::base::{CircularDeque, TaskRunner};
use crate::core::{
    log_ctx, FrameDropMode, MediaClock, Serial, SyncConfig, SyncType, VideoFrame,
};
use crate::player::decoder::{DecoderRead, VideoReader};
use crate::player::sink::{RendererEvent, RendererNotifier, VideoRendererSink};
use log::{debug, info, trace};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

const REFRESH_TASK: u64 = 1;

/// 根据主时钟差值调整到下一帧的等待时间
///
/// `diff` 为视频时钟减主时钟；视频自身为主时钟时传 NaN，直接返回 `delay`。
pub fn compute_target_delay(delay: f64, diff: f64, config: &SyncConfig) -> f64 {
    if diff.is_nan() || diff.abs() >= config.max_frame_duration {
        return delay;
    }
    let sync_threshold = delay.clamp(config.sync_threshold_min, config.sync_threshold_max);
    if diff <= -sync_threshold {
        (delay + diff).max(0.0)
    } else if diff >= sync_threshold && delay > config.framedup_threshold {
        delay + diff
    } else if diff >= sync_threshold {
        2.0 * delay
    } else {
        delay
    }
}

/// 两帧之间的显示时长
///
/// 代数不同返回 0；pts 无效或跨度异常时使用帧率推算的时长。
pub fn frame_duration(current: &VideoFrame, next: &VideoFrame, max_frame_duration: f64) -> f64 {
    if current.serial != next.serial {
        return 0.0;
    }
    let duration = next.pts - current.pts;
    if duration.is_nan() || duration <= 0.0 || duration > max_frame_duration {
        current.duration
    } else {
        duration
    }
}

struct VideoState {
    ring: CircularDeque<VideoFrame>,
    /// 最近显示的一帧（重绘时再次送显）
    last_shown: Option<VideoFrame>,
    reading: bool,
    eos_serial: Option<Serial>,
    ended_reported: bool,
    /// 当前帧应当开始显示的时刻
    frame_timer: f64,
    paused: bool,
    force_refresh: bool,
    /// 已通知过的画面尺寸
    notified_size: Option<(u32, u32)>,
    running: bool,
    stopped: bool,
}

struct VideoInner {
    runner: TaskRunner,
    reader: VideoReader,
    sink: Mutex<Box<dyn VideoRendererSink>>,
    state: Mutex<VideoState>,
    media_clock: Arc<MediaClock>,
    queue_serial: Arc<AtomicU64>,
    config: SyncConfig,
    notifier: RendererNotifier,
    frames_rendered: AtomicU64,
    frames_dropped: AtomicU64,
    self_ref: Weak<VideoInner>,
}

impl VideoInner {
    fn current_serial(&self) -> Serial {
        self.queue_serial.load(Ordering::Acquire)
    }

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
            if let Some(inner) = weak.upgrade() {
                let target = inner.clone();
                inner.runner.post_task(move || target.on_new_frame(result));
            }
        });
        if !posted {
            self.state.lock().reading = false;
        }
    }

    fn on_new_frame(&self, result: DecoderRead<VideoFrame>) {
        let serial = self.current_serial();
        {
            let mut state = self.state.lock();
            state.reading = false;
            match result {
                DecoderRead::Frame(frame) => {
                    if frame.serial == serial {
                        state.ring.insert_last(frame);
                    } else {
                        trace!("{} 丢弃过期视频帧 serial={}", log_ctx(), frame.serial);
                    }
                }
                DecoderRead::EndOfStream(eos) => {
                    debug!("{} 🔚 视频解码结束 serial={}", log_ctx(), eos);
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

    fn should_drop_late_frames(&self) -> bool {
        match self.config.framedrop {
            FrameDropMode::Always => true,
            FrameDropMode::Never => false,
            FrameDropMode::Auto => self.media_clock.master_sync_type() != SyncType::VideoMaster,
        }
    }

    fn target_delay(&self, delay: f64) -> f64 {
        let diff = if self.media_clock.master_sync_type() == SyncType::VideoMaster {
            f64::NAN
        } else {
            self.media_clock.video_clock().get() - self.media_clock.get_master_clock()
        };
        let target = compute_target_delay(delay, diff, &self.config);
        trace!(
            "{} video: delay={:.3} A-V={:.3} target={:.3}",
            log_ctx(),
            delay,
            -diff,
            target
        );
        target
    }

    fn update_video_clock(&self, pts: f64, serial: Serial) {
        self.media_clock.video_clock().set(pts, serial);
        self.media_clock
            .ext_clock()
            .sync_to(self.media_clock.video_clock(), self.config.nosync_threshold);
    }

    /// 一次刷新：决定显示哪一帧，返回到下一次刷新的建议等待时间（秒）
    fn refresh(&self) -> f64 {
        let mut remaining_time = self.config.refresh_rate;
        let serial = self.current_serial();
        let mut state = self.state.lock();

        if !state.paused || state.force_refresh {
            loop {
                let Some(vp) = state.ring.front().cloned() else {
                    break;
                };
                if vp.serial != serial {
                    state.ring.pop_front();
                    continue;
                }
                // 新代数的第一帧立即显示
                let last_duration = state
                    .last_shown
                    .as_ref()
                    .filter(|last| last.serial == vp.serial)
                    .map(|last| frame_duration(last, &vp, self.config.max_frame_duration));
                let last_duration = match last_duration {
                    Some(duration) => duration,
                    None => {
                        state.frame_timer = relative_time();
                        0.0
                    }
                };
                if state.paused {
                    break;
                }

                let delay = self.target_delay(last_duration);
                let time = relative_time();
                if time < state.frame_timer + delay {
                    remaining_time = (state.frame_timer + delay - time).min(remaining_time);
                    break;
                }

                state.frame_timer += delay;
                if delay > 0.0 && time - state.frame_timer > self.config.sync_threshold_max {
                    state.frame_timer = time;
                }
                if !vp.pts.is_nan() {
                    self.update_video_clock(vp.pts, vp.serial);
                }

                let next_duration = state
                    .ring
                    .get(1)
                    .map(|next| frame_duration(&vp, next, self.config.max_frame_duration));
                if let Some(duration) = next_duration {
                    if self.should_drop_late_frames() && time > state.frame_timer + duration {
                        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
                        debug!("{} ⏭️ 丢弃迟到的视频帧 pts={:.3}", log_ctx(), vp.pts);
                        state.ring.pop_front();
                        continue;
                    }
                }

                state.last_shown = state.ring.pop_front();
                state.force_refresh = true;
                break;
            }
        }

        let display = if state.force_refresh {
            state.last_shown.clone()
        } else {
            None
        };
        state.force_refresh = false;

        let mut size_changed = None;
        if let Some(frame) = &display {
            let size = (frame.width, frame.height);
            if state.notified_size != Some(size) {
                state.notified_size = Some(size);
                size_changed = Some(size);
            }
        }

        let ended = !state.ended_reported
            && state.eos_serial == Some(serial)
            && state.ring.is_empty();
        if ended {
            state.ended_reported = true;
        }
        let needs_more = !state.stopped && !state.reading && !state.ring.is_full();
        drop(state);

        if let Some(frame) = display {
            self.sink.lock().render(&frame);
            self.frames_rendered.fetch_add(1, Ordering::Relaxed);
        }
        if let Some((width, height)) = size_changed {
            info!("{} 🖼️ 视频尺寸: {}x{}", log_ctx(), width, height);
            (self.notifier)(RendererEvent::FirstVideoFrame { width, height });
        }
        if needs_more {
            self.attempt_read();
        }
        if ended {
            (self.notifier)(RendererEvent::Ended(serial));
        }
        remaining_time
    }

    fn schedule_refresh(&self, delay: f64) {
        let Some(inner) = self.self_ref.upgrade() else {
            return;
        };
        self.runner
            .post_delayed_task_with_id(duration_from_secs(delay), REFRESH_TASK, move || {
                if !inner.state.lock().running {
                    return;
                }
                let remaining = inner.refresh();
                inner.schedule_refresh(remaining);
            });
    }
}

/// 视频渲染器
///
/// 在渲染线程上按 `frame_timer` 节奏刷新：根据与主时钟的差值决定
/// 等待、重复显示或丢弃迟到的帧，显示后更新视频时钟。
pub struct VideoRenderer {
    inner: Arc<VideoInner>,
}

impl VideoRenderer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        runner: TaskRunner,
        reader: VideoReader,
        sink: Box<dyn VideoRendererSink>,
        media_clock: Arc<MediaClock>,
        queue_serial: Arc<AtomicU64>,
        config: SyncConfig,
        ring_capacity: usize,
        notifier: RendererNotifier,
    ) -> Self {
        let inner = Arc::new_cyclic(|self_ref| VideoInner {
            runner,
            reader,
            sink: Mutex::new(sink),
            state: Mutex::new(VideoState {
                ring: CircularDeque::new(ring_capacity),
                last_shown: None,
                reading: false,
                eos_serial: None,
                ended_reported: false,
                frame_timer: 0.0,
                paused: false,
                force_refresh: false,
                notified_size: None,
                running: false,
                stopped: false,
            }),
            media_clock,
            queue_serial,
            config,
            notifier,
            frames_rendered: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
            self_ref: self_ref.clone(),
        });
        Self { inner }
    }

    /// 开始预读并启动刷新循环
    pub fn start(&self) {
        {
            let mut state = self.inner.state.lock();
            if state.running {
                return;
            }
            state.running = true;
        }
        self.inner.sink.lock().start();
        let inner = self.inner.clone();
        self.inner.runner.post_task(move || inner.attempt_read());
        self.inner.schedule_refresh(0.0);
        info!("{} 📺 视频渲染已启动", log_ctx());
    }

    pub fn set_paused(&self, paused: bool) {
        let mut state = self.inner.state.lock();
        if state.paused == paused {
            return;
        }
        if !paused {
            // 暂停期间的时长不计入 frame_timer
            let last_updated = self.inner.media_clock.video_clock().last_updated();
            state.frame_timer += relative_time() - last_updated;
        }
        state.paused = paused;
    }

    /// 下一次刷新时重新送显当前帧
    pub fn force_refresh(&self) {
        self.inner.state.lock().force_refresh = true;
    }

    /// seek 后丢弃旧代数的缓存帧，重新开始读取
    ///
    /// 此时解码端可能已经送来新代数的帧，这些帧保留。
    pub fn flush(&self) {
        let serial = self.inner.current_serial();
        {
            let mut state = self.inner.state.lock();
            state.ring.retain(|frame| frame.serial == serial);
            if state.eos_serial != Some(serial) {
                state.eos_serial = None;
                state.ended_reported = false;
            }
        }
        let inner = self.inner.clone();
        self.inner.runner.post_task(move || inner.attempt_read());
    }

    pub fn buffered_frames(&self) -> usize {
        self.inner.state.lock().ring.len()
    }

    pub fn frames_rendered(&self) -> u64 {
        self.inner.frames_rendered.load(Ordering::Relaxed)
    }

    pub fn frames_dropped(&self) -> u64 {
        self.inner.frames_dropped.load(Ordering::Relaxed)
    }

    pub fn stop(&self) {
        {
            let mut state = self.inner.state.lock();
            state.running = false;
            state.stopped = true;
            state.ring.clear();
        }
        self.inner.runner.remove_task(REFRESH_TASK);
        self.inner.reader.cancel();
        self.inner.sink.lock().stop();
        info!(
            "{} 📺 视频渲染已停止 (显示 {} 帧, 丢弃 {} 帧)",
            log_ctx(),
            self.frames_rendered(),
            self.frames_dropped()
        );
    }
}
