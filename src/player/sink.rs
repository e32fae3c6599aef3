use crate::core::{AudioParams, Result, Serial, VideoFrame};
use parking_lot::Mutex;
use std::sync::Arc;

/// 渲染端事件（由播放器投递到自己的线程处理）
#[derive(Debug, Clone, PartialEq)]
pub enum RendererEvent {
    /// 该代数的数据已全部播放
    Ended(Serial),
    /// 第一帧（或尺寸变化后的第一帧）已显示
    FirstVideoFrame { width: u32, height: u32 },
    Error(String),
}

pub type RendererNotifier = Arc<dyn Fn(RendererEvent) + Send + Sync>;

/// 音频设备回调：设备线程调用，不能阻塞
pub trait AudioRenderCallback: Send + Sync {
    /// 填满 `out`，返回写入的字节数
    ///
    /// `delay` 为设备额外的输出延迟（秒），未知时为 0。
    fn render(&self, delay: f64, out: &mut [u8]) -> usize;

    fn on_render_error(&self, message: String);
}

/// 平台音频输出
pub trait AudioRendererSink: Send {
    /// 打开设备，返回实际的设备参数（可能与期望不同）
    fn initialize(
        &mut self,
        wanted: AudioParams,
        callback: Arc<dyn AudioRenderCallback>,
    ) -> Result<AudioParams>;

    /// 设备自身的音量；返回 false 表示不支持（由软件混音处理）
    fn set_volume(&mut self, _volume: f64) -> bool {
        false
    }

    fn start(&mut self) -> Result<()>;

    fn play(&mut self);

    fn pause(&mut self);

    fn stop(&mut self);
}

/// 平台视频输出
///
/// 在视频渲染线程上调用，不要求与任何特定线程绑定。
pub trait VideoRendererSink: Send {
    fn start(&mut self) {}

    fn stop(&mut self) {}

    /// 显示一帧（重复显示时会传入同一帧）
    fn render(&mut self, frame: &VideoFrame);
}

/// 不连接任何设备的音频 sink
///
/// 不会自己驱动回调，由持有 [`AudioPuller`] 的一方按需拉取数据
/// （测试或外部自行驱动输出时使用）。克隆体共享同一个拉取端。
#[derive(Default, Clone)]
pub struct NullAudioSink {
    shared: Arc<Mutex<PullerState>>,
}

#[derive(Default)]
struct PullerState {
    callback: Option<Arc<dyn AudioRenderCallback>>,
    playing: bool,
}

/// 从 [`NullAudioSink`] 拉取音频
#[derive(Clone)]
pub struct AudioPuller {
    shared: Arc<Mutex<PullerState>>,
}

impl AudioPuller {
    /// 模拟一次设备回调；未播放时输出静音
    pub fn pull(&self, out: &mut [u8]) -> usize {
        let callback = {
            let state = self.shared.lock();
            state.callback.clone().filter(|_| state.playing)
        };
        match callback {
            Some(callback) => callback.render(0.0, out),
            None => {
                out.fill(0);
                out.len()
            }
        }
    }

    pub fn is_playing(&self) -> bool {
        self.shared.lock().playing
    }
}

impl NullAudioSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn puller(&self) -> AudioPuller {
        AudioPuller {
            shared: self.shared.clone(),
        }
    }
}

impl AudioRendererSink for NullAudioSink {
    fn initialize(
        &mut self,
        wanted: AudioParams,
        callback: Arc<dyn AudioRenderCallback>,
    ) -> Result<AudioParams> {
        self.shared.lock().callback = Some(callback);
        Ok(wanted)
    }

    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    fn play(&mut self) {
        self.shared.lock().playing = true;
    }

    fn pause(&mut self) {
        self.shared.lock().playing = false;
    }

    fn stop(&mut self) {
        let mut state = self.shared.lock();
        state.playing = false;
        state.callback = None;
    }
}
