use crate::core::{PlayerError, Result, SampleFormat};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 主时钟类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncType {
    /// 默认：音频为主时钟
    AudioMaster,
    VideoMaster,
    /// 同步到外部时钟
    ExternalClock,
}

/// 丢帧策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameDropMode {
    /// 视频不是主时钟时允许丢帧
    Auto,
    Always,
    Never,
}

/// 渲染轮询间隔上限（秒）
pub const MAX_REFRESH_RATE: f64 = 1.0;

/// 音视频同步参数（单位：秒）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub sync_type: SyncType,
    /// 低于该差值不做同步修正
    pub sync_threshold_min: f64,
    /// 高于该差值必做同步修正
    pub sync_threshold_max: f64,
    /// 帧时长超过该值时不再通过重复帧来补偿
    pub framedup_threshold: f64,
    /// 差值超过该值视为时间戳跳变，不做修正
    pub nosync_threshold: f64,
    /// 单帧最大时长，超过视为时间戳不连续
    pub max_frame_duration: f64,
    /// 渲染轮询最大间隔（同一帧重复显示的最长间隔）
    pub refresh_rate: f64,
    pub framedrop: FrameDropMode,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            sync_type: SyncType::AudioMaster,
            sync_threshold_min: 0.04,
            sync_threshold_max: 0.1,
            framedup_threshold: 0.1,
            nosync_threshold: 10.0,
            max_frame_duration: 10.0,
            refresh_rate: 0.01,
            framedrop: FrameDropMode::Auto,
        }
    }
}

/// 缓冲参数
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// 每条流至少缓存的包数
    pub min_frames: usize,
    /// 所有包队列的总字节上限
    pub max_queue_bytes: usize,
    /// 每条流至少缓存的时长（秒）
    pub min_buffer_duration: f64,
    /// 视频渲染环形缓冲容量
    pub video_ring_capacity: usize,
    /// 音频渲染环形缓冲容量
    pub audio_ring_capacity: usize,
    /// 读到 EOF 或缓冲已满时的重试间隔（毫秒）
    pub read_retry_interval_ms: u64,
    /// 忽略上限，一直读（实时流）
    pub infinite_buffer: bool,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            min_frames: 25,
            max_queue_bytes: 15 * 1024 * 1024,
            min_buffer_duration: 1.0,
            video_ring_capacity: 3,
            audio_ring_capacity: 9,
            read_retry_interval_ms: 10,
            infinite_buffer: false,
        }
    }
}

/// 音频参数
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// 初始音量 0.0 - 1.0
    pub volume: f64,
    pub muted: bool,
    /// 单帧解码失败时是否继续
    pub continue_on_decode_error: bool,
    pub wanted_sample_rate: u32,
    pub wanted_channels: u16,
    pub sample_format: SampleFormat,
    /// 计算 A-V 差值平均值所用的样本数
    pub audio_diff_avg_nb: u32,
    /// 单帧最大采样数修正百分比
    pub sample_correction_percent_max: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            volume: 1.0,
            muted: false,
            continue_on_decode_error: true,
            wanted_sample_rate: 48000,
            wanted_channels: 2,
            sample_format: SampleFormat::I16,
            audio_diff_avg_nb: 20,
            sample_correction_percent_max: 10,
        }
    }
}

/// 消息循环参数
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// 单个任务执行超过该时长（毫秒）会打印警告
    pub slow_task_warning_ms: u64,
    /// 时钟状态打印间隔（毫秒），0 表示关闭
    pub status_dump_interval_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            slow_task_warning_ms: 20,
            status_dump_interval_ms: 1000,
        }
    }
}

/// 播放器配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub sync: SyncConfig,
    pub buffer: BufferConfig,
    pub audio: AudioConfig,
    pub scheduler: SchedulerConfig,
}

impl PlayerConfig {
    /// 从 JSON 字符串解析（缺省字段使用默认值）
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: PlayerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// 从 JSON 文件加载
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
        Self::from_json_str(&content)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// 检查参数是否自洽
    pub fn validate(&self) -> Result<()> {
        let sync = &self.sync;
        if sync.sync_threshold_min <= 0.0 || sync.sync_threshold_min > sync.sync_threshold_max {
            return Err(PlayerError::ConfigError(format!(
                "sync_threshold_min ({}) 必须为正且不大于 sync_threshold_max ({})",
                sync.sync_threshold_min, sync.sync_threshold_max
            )));
        }
        let thresholds = [
            ("sync_threshold_min", sync.sync_threshold_min),
            ("sync_threshold_max", sync.sync_threshold_max),
            ("framedup_threshold", sync.framedup_threshold),
            ("nosync_threshold", sync.nosync_threshold),
            ("max_frame_duration", sync.max_frame_duration),
            ("refresh_rate", sync.refresh_rate),
        ];
        if let Some((name, value)) = thresholds.iter().find(|(_, v)| !v.is_finite()) {
            return Err(PlayerError::ConfigError(format!("{} 必须为有限值: {}", name, value)));
        }
        if sync.refresh_rate <= 0.0 || sync.refresh_rate > MAX_REFRESH_RATE {
            return Err(PlayerError::ConfigError(format!(
                "refresh_rate 必须在 (0, {}] 秒内: {}",
                MAX_REFRESH_RATE, sync.refresh_rate
            )));
        }
        if sync.max_frame_duration <= 0.0 || sync.nosync_threshold <= 0.0 {
            return Err(PlayerError::ConfigError(
                "max_frame_duration / nosync_threshold 必须为正".to_string(),
            ));
        }
        if self.buffer.video_ring_capacity == 0 || self.buffer.audio_ring_capacity == 0 {
            return Err(PlayerError::ConfigError("环形缓冲容量不能为 0".to_string()));
        }
        if !(0.0..=1.0).contains(&self.audio.volume) {
            return Err(PlayerError::ConfigError(format!(
                "音量超出范围 [0, 1]: {}",
                self.audio.volume
            )));
        }
        if self.audio.wanted_sample_rate == 0 || self.audio.wanted_channels == 0 {
            return Err(PlayerError::ConfigError("采样率和声道数必须为正".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PlayerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sync.sync_type, SyncType::AudioMaster);
        assert_eq!(config.buffer.min_frames, 25);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = PlayerConfig::from_json_str(
            r#"{ "sync": { "sync_threshold_max": 0.2, "framedrop": "never" } }"#,
        )
        .unwrap();
        assert_eq!(config.sync.sync_threshold_max, 0.2);
        assert_eq!(config.sync.sync_threshold_min, 0.04);
        assert_eq!(config.sync.framedrop, FrameDropMode::Never);
        assert_eq!(config.audio.wanted_channels, 2);
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        let err = PlayerConfig::from_json_str(
            r#"{ "sync": { "sync_threshold_min": 0.5, "sync_threshold_max": 0.1 } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, PlayerError::ConfigError(_)));
    }

    #[test]
    fn test_json_round_trip_keeps_sync_type() {
        let mut config = PlayerConfig::default();
        config.sync.sync_type = SyncType::ExternalClock;
        let json = config.to_json().unwrap();
        assert!(json.contains("external_clock"));
        let parsed = PlayerConfig::from_json_str(&json).unwrap();
        assert_eq!(parsed.sync.sync_type, SyncType::ExternalClock);
    }

    #[test]
    fn test_load_missing_file_reports_path() {
        let err = PlayerConfig::load("/nonexistent/myy_engine.json").unwrap_err();
        assert!(matches!(err, PlayerError::AnyhowError(_)));
        assert!(err.to_string().contains("myy_engine.json"));
    }

    #[test]
    fn test_huge_refresh_rate_rejected() {
        let err = PlayerConfig::from_json_str(r#"{ "sync": { "refresh_rate": 1e20 } }"#)
            .unwrap_err();
        assert!(matches!(err, PlayerError::ConfigError(_)));
        assert!(err.to_string().contains("refresh_rate"));

        let mut config = PlayerConfig::default();
        config.sync.nosync_threshold = f64::INFINITY;
        assert!(matches!(config.validate(), Err(PlayerError::ConfigError(_))));
    }
}
