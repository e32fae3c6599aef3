use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlayerError {
    #[cfg(feature = "ffmpeg")]
    #[error("FFmpeg 错误: {0}")]
    FFmpegError(#[from] ffmpeg_next::Error),

    #[error("IO 错误: {0}")]
    IoError(#[from] std::io::Error),

    #[error("配置解析错误: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("无法打开媒体源: {0}")]
    OpenError(String),

    #[error("无法找到可播放的音频/视频流")]
    NoStream,

    #[error("无法打开解码器: {0}")]
    CodecOpenError(String),

    #[error("送入数据包失败: {0}")]
    SendPacketError(String),

    #[error("解码错误: {0}")]
    DecodeError(String),

    #[error("渲染错误: {0}")]
    RenderError(String),

    #[error("音频输出错误: {0}")]
    AudioError(String),

    #[error("消息循环已退出: {0}")]
    SchedulerError(String),

    #[error("配置无效: {0}")]
    ConfigError(String),

    #[error("播放器状态错误: {0}")]
    StateError(String),

    #[error("其他错误: {0}")]
    Other(String),

    #[error("Anyhow 错误: {0}")]
    AnyhowError(#[from] anyhow::Error),
}

impl PlayerError {
    /// 是否对所属子系统致命（线程需要退出循环）
    ///
    /// 单次解码失败属于可恢复错误，其余打开/送包/设备类错误都会终止对应线程。
    pub fn is_fatal(&self) -> bool {
        !matches!(self, PlayerError::DecodeError(_))
    }
}

pub type Result<T> = std::result::Result<T, PlayerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_is_recoverable() {
        assert!(!PlayerError::DecodeError("bad frame".into()).is_fatal());
        assert!(PlayerError::SendPacketError("broken".into()).is_fatal());
        assert!(PlayerError::AudioError("no device".into()).is_fatal());
    }

    #[test]
    fn test_anyhow_conversion() {
        let err: PlayerError = anyhow::anyhow!("sink failed").into();
        assert!(err.to_string().contains("sink failed"));
    }
}
