// 播放管线：包队列、解码、渲染、解封装和播放器

pub mod packet;
pub mod packet_queue;
pub mod codec;
pub mod resample;
pub mod decoder;
pub mod sink;
pub mod audio_renderer;
pub mod video_renderer;
pub mod demuxer;
pub mod media_player;
pub mod registry;

#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;
#[cfg(feature = "cpal-output")]
pub mod cpal_sink;

pub use packet::{Packet, QueueItem};
pub use packet_queue::PacketQueue;
pub use codec::{BoxedAudioCodec, BoxedVideoCodec, Codec, CodecError, RawAudioFrame, RawVideoFrame};
pub use decoder::{AudioDecoder, VideoDecoder};
pub use sink::{AudioPuller, AudioRenderCallback, AudioRendererSink, NullAudioSink, VideoRendererSink};
pub use demuxer::{DemuxerSource, StreamInfo};
pub use media_player::{AudioSinkFactory, MediaPlayer, MediaSource, RendererSinks, VideoSinkFactory};
pub use registry::PlayerRegistry;

#[cfg(feature = "ffmpeg")]
pub use self::ffmpeg::{FfmpegAudioCodec, FfmpegDemuxer, FfmpegVideoCodec};
#[cfg(feature = "cpal-output")]
pub use cpal_sink::CpalAudioSink;
