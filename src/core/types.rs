use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 代数号（serial）：每次 seek/flush 加一，用于识别并丢弃过期数据
pub type Serial = u64;

/// 有理数时间基
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rational {
    pub num: i32,
    pub den: i32,
}

impl Rational {
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    pub fn to_f64(self) -> f64 {
        if self.den == 0 {
            0.0
        } else {
            self.num as f64 / self.den as f64
        }
    }

    /// 把 `ts`（单位 `self`）换算到 `to` 时间基，四舍五入
    pub fn rescale(self, ts: i64, to: Rational) -> i64 {
        if to.num == 0 || self.den == 0 {
            return 0;
        }
        let num = ts as i128 * self.num as i128 * to.den as i128;
        let den = self.den as i128 * to.num as i128;
        let half = den.abs() / 2;
        let rounded = if (num >= 0) == (den >= 0) {
            (num.abs() + half) / den.abs()
        } else {
            -((num.abs() + half) / den.abs())
        };
        rounded as i64
    }
}

/// 流类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamType {
    Audio,
    Video,
}

impl StreamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamType::Audio => "audio",
            StreamType::Video => "video",
        }
    }
}

/// 像素格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    RGBA,
    RGB,
    YUV420P,
    NV12,
}

/// 音频采样格式（交错存储）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleFormat {
    I16,
    F32,
}

impl SampleFormat {
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            SampleFormat::I16 => 2,
            SampleFormat::F32 => 4,
        }
    }
}

/// 音频参数（采样率、声道、格式）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioParams {
    pub sample_rate: u32,
    pub channels: u16,
    pub format: SampleFormat,
}

impl AudioParams {
    /// 一个采样帧（所有声道各一个采样）的字节数
    pub fn frame_size(&self) -> usize {
        self.channels as usize * self.format.bytes_per_sample()
    }

    pub fn bytes_per_sec(&self) -> usize {
        self.frame_size() * self.sample_rate as usize
    }

    pub fn is_valid(&self) -> bool {
        self.sample_rate > 0 && self.channels > 0
    }
}

impl Default for AudioParams {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            channels: 2,
            format: SampleFormat::I16,
        }
    }
}

/// 已解码并转换为设备格式的音频数据
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    pub pts: f64,           // 秒，NaN 表示未知
    pub duration: f64,      // 秒
    pub nb_samples: usize,
    pub params: AudioParams,
    pub serial: Serial,
    pub data: Vec<u8>,      // 交错存储，格式为 params.format
}

impl AudioBuffer {
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }
}

/// 已解码的视频帧
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub pts: f64,           // 秒，NaN 表示未知
    pub duration: f64,      // 秒（由帧率推算）
    pub serial: Serial,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub data: Arc<Vec<u8>>, // 共享像素数据，重复显示时不拷贝
}

/// 播放状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Idle,
    Opening,
    Ready,
    Buffering,
    Ended,
    Error,
}

/// 媒体信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaInfo {
    pub duration: f64,          // 总时长（秒），未知时为 NaN
    pub start_time: f64,        // 起始时间（秒）
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub video_codec: String,
    pub audio_codec: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub realtime: bool,         // 实时源（直播流）
}

impl Default for MediaInfo {
    fn default() -> Self {
        Self {
            duration: f64::NAN,
            start_time: 0.0,
            width: 0,
            height: 0,
            fps: 0.0,
            video_codec: String::new(),
            audio_codec: String::new(),
            sample_rate: 0,
            channels: 0,
            realtime: false,
        }
    }
}

/// 缓冲状态信息（用于监控和调试）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BufferStatus {
    /// 视频数据包队列长度
    pub video_packets: usize,

    /// 音频数据包队列长度
    pub audio_packets: usize,

    /// 视频渲染环形缓冲中的帧数
    pub video_frames: usize,

    /// 音频渲染环形缓冲中的帧数
    pub audio_frames: usize,

    /// 因同步落后被丢弃的视频帧数
    pub frames_dropped: u64,

    /// 音频欠载（输出静音）次数
    pub audio_underruns: u64,
}

/// 播放器状态信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerState {
    pub state: PlaybackState,
    pub play_when_ready: bool,
    pub position: f64,          // 当前位置（秒）
    pub duration: f64,          // 总时长（秒）
    pub volume: f64,            // 音量 0.0 - 1.0
    pub muted: bool,
    pub media_info: Option<MediaInfo>,
    pub buffer: BufferStatus,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            state: PlaybackState::Idle,
            play_when_ready: false,
            position: 0.0,
            duration: f64::NAN,
            volume: 1.0,
            muted: false,
            media_info: None,
            buffer: BufferStatus::default(),
        }
    }
}

/// 播放器对外发出的消息
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    StateChanged(PlaybackState),
    Prepared { duration: f64 },
    VideoSizeChanged { width: u32, height: u32 },
    SeekCompleted { position: f64 },
    Error(String),
}
