use crate::core::{PixelFormat, SampleFormat};
use crate::player::packet::Packet;
use thiserror::Error;

/// 编解码库的返回码
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodecError {
    /// 需要更多输入（或先取走输出），不是错误
    #[error("需要更多输入")]
    Again,

    /// 当前代数的数据已全部吐出
    #[error("解码结束")]
    Eof,

    #[error("编解码错误: {0}")]
    Fatal(String),
}

pub type CodecResult<T> = std::result::Result<T, CodecError>;

/// 解码器输出的原始音频（交错存储）
#[derive(Debug, Clone)]
pub struct RawAudioFrame {
    /// 单位为包的时间基
    pub pts: Option<i64>,
    pub sample_rate: u32,
    pub channels: u16,
    pub format: SampleFormat,
    pub nb_samples: usize,
    pub data: Vec<u8>,
}

/// 解码器输出的原始视频帧
#[derive(Debug, Clone)]
pub struct RawVideoFrame {
    /// 单位为包的时间基，已经是 best effort 时间戳
    pub pts: Option<i64>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub data: Vec<u8>,
}

/// 编解码器接口（send/receive 模型）
///
/// - `send_packet(None)` 表示流结束，之后 `receive_frame` 会把缓存吐完并返回 `Eof`
/// - `receive_frame` 返回 `Again` 表示需要更多输入
/// - `send_packet` 返回 `Again` 表示要先取走输出，包需要稍后重发
pub trait Codec: Send {
    type Frame: Send + 'static;

    fn send_packet(&mut self, packet: Option<&Packet>) -> CodecResult<()>;

    fn receive_frame(&mut self) -> CodecResult<Self::Frame>;

    /// 清空内部缓存，准备接收新一代数据
    fn flush(&mut self);

    fn name(&self) -> &str {
        "unknown"
    }
}

pub type BoxedAudioCodec = Box<dyn Codec<Frame = RawAudioFrame>>;
pub type BoxedVideoCodec = Box<dyn Codec<Frame = RawVideoFrame>>;

impl<C: Codec + ?Sized> Codec for Box<C> {
    type Frame = C::Frame;

    fn send_packet(&mut self, packet: Option<&Packet>) -> CodecResult<()> {
        (**self).send_packet(packet)
    }

    fn receive_frame(&mut self) -> CodecResult<Self::Frame> {
        (**self).receive_frame()
    }

    fn flush(&mut self) {
        (**self).flush()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
