use crate::base::time::relative_time;
use crate::core::{Serial, SyncType};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// 实时流外部时钟调速参数（与 ffplay 一致）
pub const EXTERNAL_CLOCK_MIN_FRAMES: usize = 2;
pub const EXTERNAL_CLOCK_MAX_FRAMES: usize = 10;
pub const EXTERNAL_CLOCK_SPEED_MIN: f64 = 0.900;
pub const EXTERNAL_CLOCK_SPEED_MAX: f64 = 1.010;
pub const EXTERNAL_CLOCK_SPEED_STEP: f64 = 0.001;

#[derive(Debug)]
struct ClockState {
    pts: f64,
    /// pts 减去设置时刻
    pts_drift: f64,
    last_updated: f64,
    /// 时钟基于哪一代数据包设置；None 表示从未设置
    serial: Option<Serial>,
    speed: f64,
    paused: bool,
}

/// 播放时钟
///
/// 与一个包队列的代数号绑定：队列 seek 之后，时钟在重新设置之前读数为 NaN。
/// 写入方只有对应的渲染回调，其他线程只读取快照。
#[derive(Debug)]
pub struct Clock {
    state: Mutex<ClockState>,
    /// 所属包队列的实时代数号；外部时钟没有队列，与自身代数号比较
    queue_serial: Option<Arc<AtomicU64>>,
}

impl Clock {
    /// 绑定到某个包队列的时钟（音频/视频）
    pub fn new(queue_serial: Arc<AtomicU64>) -> Self {
        Self::with_queue_serial(Some(queue_serial))
    }

    /// 外部时钟：没有队列，任何时候都可以读取
    pub fn new_external() -> Self {
        Self::with_queue_serial(None)
    }

    fn with_queue_serial(queue_serial: Option<Arc<AtomicU64>>) -> Self {
        let now = relative_time();
        Self {
            state: Mutex::new(ClockState {
                pts: f64::NAN,
                pts_drift: f64::NAN,
                last_updated: now,
                serial: None,
                speed: 1.0,
                paused: false,
            }),
            queue_serial,
        }
    }

    /// 读取时钟（秒）；代数号过期时返回 NaN
    pub fn get(&self) -> f64 {
        self.get_at(relative_time())
    }

    /// 以给定的时刻读取时钟
    pub fn get_at(&self, time: f64) -> f64 {
        let state = self.state.lock();
        if !self.is_current(state.serial) {
            return f64::NAN;
        }
        if state.paused {
            state.pts
        } else {
            state.pts_drift + time - (time - state.last_updated) * (1.0 - state.speed)
        }
    }

    fn is_current(&self, serial: Option<Serial>) -> bool {
        match (&self.queue_serial, serial) {
            (Some(queue_serial), Some(serial)) => queue_serial.load(Ordering::Acquire) == serial,
            (Some(_), None) => false,
            // 外部时钟与自身比较
            (None, _) => true,
        }
    }

    pub fn set(&self, pts: f64, serial: Serial) {
        self.set_at(pts, serial, relative_time());
    }

    pub fn set_at(&self, pts: f64, serial: Serial, time: f64) {
        let mut state = self.state.lock();
        Self::set_locked(&mut state, pts, Some(serial), time);
    }

    fn set_locked(state: &mut ClockState, pts: f64, serial: Option<Serial>, time: f64) {
        state.pts = pts;
        state.last_updated = time;
        state.pts_drift = pts - time;
        state.serial = serial;
    }

    /// 以当前读数为基准重新设置（修改速度/恢复播放前调用）
    fn rebase_locked(&self, state: &mut ClockState, time: f64) {
        let current = if !self.is_current(state.serial) {
            f64::NAN
        } else if state.paused {
            state.pts
        } else {
            state.pts_drift + time - (time - state.last_updated) * (1.0 - state.speed)
        };
        let serial = state.serial;
        Self::set_locked(state, current, serial, time);
    }

    pub fn set_speed(&self, speed: f64) {
        let mut state = self.state.lock();
        self.rebase_locked(&mut state, relative_time());
        state.speed = speed;
    }

    pub fn speed(&self) -> f64 {
        self.state.lock().speed
    }

    /// 暂停/恢复；恢复时以暂停位置为基准重新计时
    pub fn set_paused(&self, paused: bool) {
        let mut state = self.state.lock();
        if state.paused == paused {
            return;
        }
        if !paused {
            state.paused = false;
            let pts = state.pts;
            let serial = state.serial;
            Self::set_locked(&mut state, pts, serial, relative_time());
        } else {
            self.rebase_locked(&mut state, relative_time());
            state.paused = true;
        }
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    pub fn serial(&self) -> Option<Serial> {
        self.state.lock().serial
    }

    pub fn last_updated(&self) -> f64 {
        self.state.lock().last_updated
    }

    /// 把本时钟拉向 `secondary`
    ///
    /// 仅当 `secondary` 有效，且本时钟无效或两者相差超过 `nosync_threshold` 时才修正。
    /// 返回是否发生了修正。
    pub fn sync_to(&self, secondary: &Clock, nosync_threshold: f64) -> bool {
        let time = relative_time();
        let secondary_clock = secondary.get_at(time);
        let secondary_serial = secondary.serial();
        let clock = self.get_at(time);
        if secondary_clock.is_nan() {
            return false;
        }
        if clock.is_nan() || (clock - secondary_clock).abs() > nosync_threshold {
            let mut state = self.state.lock();
            Self::set_locked(&mut state, secondary_clock, secondary_serial, time);
            return true;
        }
        false
    }
}

/// 主时钟选择函数：输入期望的同步类型，返回实际可用的同步类型
pub type SyncTypeConfirm = Box<dyn Fn(SyncType) -> SyncType + Send + Sync>;

/// 音频、视频、外部三个时钟以及主时钟选举
pub struct MediaClock {
    audio: Clock,
    video: Clock,
    ext: Clock,
    sync_type: SyncType,
    sync_type_confirm: Option<SyncTypeConfirm>,
}

impl MediaClock {
    pub fn new(
        audio_queue_serial: Arc<AtomicU64>,
        video_queue_serial: Arc<AtomicU64>,
        sync_type: SyncType,
        sync_type_confirm: Option<SyncTypeConfirm>,
    ) -> Self {
        Self {
            audio: Clock::new(audio_queue_serial),
            video: Clock::new(video_queue_serial),
            ext: Clock::new_external(),
            sync_type,
            sync_type_confirm,
        }
    }

    pub fn audio_clock(&self) -> &Clock {
        &self.audio
    }

    pub fn video_clock(&self) -> &Clock {
        &self.video
    }

    pub fn ext_clock(&self) -> &Clock {
        &self.ext
    }

    /// 实际生效的主时钟类型
    pub fn master_sync_type(&self) -> SyncType {
        match &self.sync_type_confirm {
            Some(confirm) => confirm(self.sync_type),
            None => self.sync_type,
        }
    }

    pub fn master_clock(&self) -> &Clock {
        match self.master_sync_type() {
            SyncType::AudioMaster => &self.audio,
            SyncType::VideoMaster => &self.video,
            SyncType::ExternalClock => &self.ext,
        }
    }

    /// 主时钟读数（秒），可能为 NaN
    pub fn get_master_clock(&self) -> f64 {
        self.master_clock().get()
    }

    /// 暂停/恢复所有时钟
    pub fn set_paused(&self, paused: bool) {
        self.audio.set_paused(paused);
        self.video.set_paused(paused);
        self.ext.set_paused(paused);
    }

    /// 根据队列水位调整外部时钟速度（实时流使用）
    pub fn check_external_clock_speed(
        &self,
        video_packets: Option<usize>,
        audio_packets: Option<usize>,
    ) {
        let starving = |packets: Option<usize>| {
            packets.map_or(false, |n| n <= EXTERNAL_CLOCK_MIN_FRAMES)
        };
        let plenty = |packets: Option<usize>| packets.map_or(true, |n| n > EXTERNAL_CLOCK_MAX_FRAMES);

        let speed = self.ext.speed();
        if starving(video_packets) || starving(audio_packets) {
            self.ext
                .set_speed(EXTERNAL_CLOCK_SPEED_MIN.max(speed - EXTERNAL_CLOCK_SPEED_STEP));
        } else if plenty(video_packets) && plenty(audio_packets) {
            self.ext
                .set_speed(EXTERNAL_CLOCK_SPEED_MAX.min(speed + EXTERNAL_CLOCK_SPEED_STEP));
        } else if speed != 1.0 {
            self.ext.set_speed(
                speed + EXTERNAL_CLOCK_SPEED_STEP * (1.0 - speed) / (1.0 - speed).abs(),
            );
        }
    }
}

impl std::fmt::Debug for MediaClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaClock")
            .field("audio", &self.audio.get())
            .field("video", &self.video.get())
            .field("ext", &self.ext.get())
            .field("master", &self.master_sync_type())
            .finish()
    }
}
