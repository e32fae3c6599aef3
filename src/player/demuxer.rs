use crate::base::{MessageLoop, TaskRunner};
use crate::core::{log_ctx, BufferConfig, MediaClock, MediaInfo, Rational, Result, StreamType};
use crate::player::decoder::BlockingNotifier;
use crate::player::packet::Packet;
use crate::player::packet_queue::PacketQueue;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;

const READ_TASK: u64 = 1;
/// 每个读取任务最多读的包数，读完让出线程处理 seek 等请求
const READ_BATCH: usize = 32;

/// 一路流的参数
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    pub stream: StreamType,
    pub time_base: Rational,
    pub frame_rate: Option<Rational>,
    /// 流起始时间（单位 `time_base`）
    pub start_pts: Option<i64>,
    pub codec_name: String,
}

/// 解封装数据源
///
/// 不同的媒体源（本地文件、网络流、内存流等）实现这个接口。
/// 所有方法都在解封装线程上调用。
pub trait DemuxerSource: Send {
    /// 读取下一个数据包
    ///
    /// - `Ok(Some(packet))`: 成功读取一个包
    /// - `Ok(None)`: 到达文件末尾
    /// - `Err(e)`: 读取错误
    fn read_packet(&mut self) -> Result<Option<Packet>>;

    /// Seek 到指定位置（秒）
    fn seek(&mut self, position: f64) -> Result<()>;

    fn media_info(&self) -> &MediaInfo;

    fn stream_info(&self, stream: StreamType) -> Option<StreamInfo>;

    fn is_seekable(&self) -> bool {
        true
    }

    /// 描述信息（用于日志）
    fn description(&self) -> String;
}

/// 解封装线程发出的事件
#[derive(Debug, Clone, PartialEq)]
pub enum DemuxerEvent {
    SeekCompleted { position: f64 },
    EndOfFile,
    Error(String),
}

pub type DemuxerListener = Arc<dyn Fn(DemuxerEvent) + Send + Sync>;

/// 一路流对应的包队列
#[derive(Clone)]
pub struct StreamQueue {
    pub stream: StreamType,
    pub queue: Arc<PacketQueue>,
    pub time_base: Rational,
}

#[derive(Debug, Default)]
struct DemuxState {
    eof: bool,
    stopped: bool,
    failed: bool,
    video_packets: u64,
    audio_packets: u64,
}

struct DemuxInner {
    runner: TaskRunner,
    source: Mutex<Box<dyn DemuxerSource>>,
    queues: Vec<StreamQueue>,
    media_clock: Arc<MediaClock>,
    config: BufferConfig,
    state: Mutex<DemuxState>,
    listener: DemuxerListener,
    self_ref: Weak<DemuxInner>,
}

impl DemuxInner {
    fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.config.read_retry_interval_ms)
    }

    fn post_read(&self, delay: Duration) {
        let Some(inner) = self.self_ref.upgrade() else {
            return;
        };
        self.runner.remove_task(READ_TASK);
        self.runner
            .post_delayed_task_with_id(delay, READ_TASK, move || inner.read_packets());
    }

    /// 队列是否还需要数据
    fn needs_more(&self) -> bool {
        if self.config.infinite_buffer {
            return true;
        }
        let total: usize = self.queues.iter().map(|q| q.queue.size_bytes()).sum();
        if total > self.config.max_queue_bytes {
            return false;
        }
        self.queues.iter().any(|q| {
            !q.queue.has_enough_packets(
                q.time_base,
                self.config.min_frames,
                self.config.min_buffer_duration,
            )
        })
    }

    fn queue_for(&self, stream: StreamType) -> Option<&Arc<PacketQueue>> {
        self.queues
            .iter()
            .find(|q| q.stream == stream)
            .map(|q| &q.queue)
    }

    fn read_packets(&self) {
        {
            let state = self.state.lock();
            if state.stopped || state.failed {
                return;
            }
        }

        let mut source = self.source.lock();
        for _ in 0..READ_BATCH {
            if !self.needs_more() {
                // 等待解码端缺包时唤醒，或者超时后重试
                drop(source);
                self.post_read(self.retry_interval());
                return;
            }

            match source.read_packet() {
                Ok(Some(packet)) => {
                    let stream = packet.stream;
                    let Some(queue) = self.queue_for(stream) else {
                        continue;
                    };
                    let mut state = self.state.lock();
                    state.eof = false;
                    let count = match stream {
                        StreamType::Video => {
                            state.video_packets += 1;
                            state.video_packets
                        }
                        StreamType::Audio => {
                            state.audio_packets += 1;
                            state.audio_packets
                        }
                    };
                    drop(state);
                    if count <= 3 || count % 500 == 0 {
                        debug!(
                            "{} 📦 读取{}包 #{} pts={:?}",
                            log_ctx(),
                            stream.as_str(),
                            count,
                            packet.pts_seconds()
                        );
                    }
                    queue.put(packet);
                }
                Ok(None) => {
                    let first_eof = {
                        let mut state = self.state.lock();
                        !std::mem::replace(&mut state.eof, true)
                    };
                    if first_eof {
                        info!("{} 📄 到达文件末尾: {}", log_ctx(), source.description());
                        for q in &self.queues {
                            q.queue.put_null_packet();
                        }
                        (self.listener)(DemuxerEvent::EndOfFile);
                    }
                    drop(source);
                    self.post_read(self.retry_interval());
                    return;
                }
                Err(e) => {
                    error!("{} ❌ 读取数据包失败: {}", log_ctx(), e);
                    self.state.lock().failed = true;
                    drop(source);
                    (self.listener)(DemuxerEvent::Error(e.to_string()));
                    return;
                }
            }
        }
        drop(source);
        self.post_read(Duration::ZERO);
    }

    fn seek(&self, position: f64) {
        let target = {
            let mut source = self.source.lock();
            if !source.is_seekable() {
                warn!("{} ⚠️ 数据源不支持 seek: {}", log_ctx(), source.description());
                return;
            }
            let duration = source.media_info().duration;
            let target = if duration.is_finite() && duration > 0.0 {
                position.clamp(0.0, duration)
            } else {
                position.max(0.0)
            };
            info!("{} ⏩ Seek 到 {:.3}s", log_ctx(), target);
            if let Err(e) = source.seek(target) {
                error!("{} ❌ Seek 失败: {}", log_ctx(), e);
                drop(source);
                (self.listener)(DemuxerEvent::Error(e.to_string()));
                return;
            }
            target
        };

        // 每路流：清空旧包、代数加一、放入分界
        for q in &self.queues {
            if let Some(serial) = q.queue.begin_new_generation() {
                debug!("{} {} 队列进入代数 {}", log_ctx(), q.stream.as_str(), serial);
            }
        }
        self.media_clock.ext_clock().set(target, 0);
        {
            let mut state = self.state.lock();
            state.eof = false;
            state.failed = false;
        }
        (self.listener)(DemuxerEvent::SeekCompleted { position: target });
        self.post_read(Duration::ZERO);
    }
}

/// 解封装器：在独立消息循环上读包并分发到各路包队列
pub struct Demuxer {
    looper: Option<MessageLoop>,
    inner: Arc<DemuxInner>,
}

impl Demuxer {
    pub fn new(
        source: Box<dyn DemuxerSource>,
        queues: Vec<StreamQueue>,
        media_clock: Arc<MediaClock>,
        config: BufferConfig,
        listener: DemuxerListener,
    ) -> Result<Self> {
        let looper = MessageLoop::prepare_looper("demuxer")?;
        info!("{} 🎬 创建解封装器: {}", log_ctx(), source.description());
        let runner = looper.task_runner();
        let inner = Arc::new_cyclic(|self_ref| DemuxInner {
            runner,
            source: Mutex::new(source),
            queues,
            media_clock,
            config,
            state: Mutex::new(DemuxState::default()),
            listener,
            self_ref: self_ref.clone(),
        });
        Ok(Self {
            looper: Some(looper),
            inner,
        })
    }

    pub fn start(&self) {
        self.inner.post_read(Duration::ZERO);
    }

    /// 解码端缺包时调用的通知：立即唤醒读取
    pub fn blocking_notifier(&self) -> BlockingNotifier {
        let weak = Arc::downgrade(&self.inner);
        Arc::new(move || {
            if let Some(inner) = weak.upgrade() {
                if !inner.state.lock().eof {
                    inner.post_read(Duration::ZERO);
                }
            }
        })
    }

    /// 请求 seek（秒），在解封装线程上执行
    pub fn seek(&self, position: f64) {
        let inner = self.inner.clone();
        self.inner.runner.post_task(move || inner.seek(position));
    }

    pub fn is_eof(&self) -> bool {
        self.inner.state.lock().eof
    }

    pub fn packets_read(&self) -> (u64, u64) {
        let state = self.inner.state.lock();
        (state.video_packets, state.audio_packets)
    }

    pub fn stop(&mut self) {
        self.inner.state.lock().stopped = true;
        self.inner.runner.remove_all_tasks();
        if let Some(looper) = self.looper.take() {
            looper.join();
            let (video, audio) = self.packets_read();
            info!(
                "{} 🛑 解封装线程退出（视频包 {}，音频包 {}）",
                log_ctx(),
                video,
                audio
            );
        }
    }
}

impl Drop for Demuxer {
    fn drop(&mut self) {
        self.stop();
    }
}
