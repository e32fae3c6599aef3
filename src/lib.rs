//! myy_engine：音视频播放引擎
//!
//! - `base`：消息循环、任务调度、环形队列
//! - `core`：数据类型、时钟、配置、错误和日志
//! - `player`：解封装、解码、音视频渲染和播放器
//!
//! 平台相关的输出（音频设备、窗口纹理）和编解码库通过 trait 接入，
//! `ffmpeg` 和 `cpal-output` feature 提供现成的适配。

pub mod base;
pub mod core;
pub mod player;

pub use crate::core::{
    init_logger, MediaInfo, PlaybackState, PlayerConfig, PlayerError, PlayerEvent, PlayerState,
    Result,
};
pub use crate::player::{MediaPlayer, MediaSource, PlayerRegistry, RendererSinks};
