use crate::core::{
    log_ctx, MediaInfo, PixelFormat, PlayerError, Rational, Result, SampleFormat, StreamType,
};
use crate::player::codec::{
    BoxedAudioCodec, BoxedVideoCodec, Codec, CodecError, CodecResult, RawAudioFrame, RawVideoFrame,
};
use crate::player::demuxer::{DemuxerSource, StreamInfo};
use crate::player::media_player::MediaSource;
use crate::player::packet::Packet;
use ffmpeg_next as ffmpeg;
use ffmpeg_next::{codec, format, media, software, util};
use log::{debug, info};

/// 初始化 FFmpeg（可重复调用）
pub fn init() -> Result<()> {
    ffmpeg::init().map_err(|e| anyhow::anyhow!("FFmpeg 初始化失败: {}", e))?;
    Ok(())
}

fn to_rational(r: ffmpeg::Rational) -> Rational {
    Rational::new(r.numerator(), r.denominator())
}

fn optional_ts(ts: i64) -> Option<i64> {
    (ts != ffmpeg::ffi::AV_NOPTS_VALUE).then_some(ts)
}

fn map_codec_error(e: ffmpeg::Error) -> CodecError {
    match e {
        ffmpeg::Error::Other { errno } if errno == util::error::EAGAIN => CodecError::Again,
        ffmpeg::Error::Eof => CodecError::Eof,
        other => CodecError::Fatal(other.to_string()),
    }
}

fn to_ffmpeg_packet(packet: &Packet) -> ffmpeg::Packet {
    let mut pkt = ffmpeg::Packet::copy(&packet.data);
    pkt.set_pts(packet.pts);
    pkt.set_dts(packet.dts);
    pkt.set_duration(packet.duration);
    pkt
}

struct SelectedStream {
    index: usize,
    info: StreamInfo,
}

/// FFmpeg 容器解封装
pub struct FfmpegDemuxer {
    input: format::context::Input,
    path: String,
    video: Option<SelectedStream>,
    audio: Option<SelectedStream>,
    media_info: MediaInfo,
}

// 输入上下文只在解封装线程上使用
unsafe impl Send for FfmpegDemuxer {}

impl FfmpegDemuxer {
    pub fn open(path: &str) -> Result<Self> {
        info!("{} 📂 打开媒体文件: {}", log_ctx(), path);
        let input = format::input(&path)
            .map_err(|e| PlayerError::OpenError(format!("无法打开文件: {}", e)))?;

        let select = |kind: media::Type, stream_type: StreamType| {
            input.streams().best(kind).map(|s| {
                let avg = s.avg_frame_rate();
                SelectedStream {
                    index: s.index(),
                    info: StreamInfo {
                        stream: stream_type,
                        time_base: to_rational(s.time_base()),
                        frame_rate: (avg.numerator() > 0 && avg.denominator() > 0)
                            .then(|| to_rational(avg)),
                        start_pts: optional_ts(s.start_time()),
                        codec_name: s.parameters().id().name().to_string(),
                    },
                }
            })
        };
        let video = select(media::Type::Video, StreamType::Video);
        let audio = select(media::Type::Audio, StreamType::Audio);
        if video.is_none() && audio.is_none() {
            return Err(PlayerError::NoStream);
        }
        debug!(
            "{} 视频流索引: {:?}, 音频流索引: {:?}",
            log_ctx(),
            video.as_ref().map(|s| s.index),
            audio.as_ref().map(|s| s.index)
        );

        let mut demuxer = Self {
            input,
            path: path.to_string(),
            video,
            audio,
            media_info: MediaInfo::default(),
        };
        demuxer.media_info = demuxer.extract_media_info()?;
        Ok(demuxer)
    }

    fn extract_media_info(&self) -> Result<MediaInfo> {
        let mut info = MediaInfo::default();
        let duration = self.input.duration();
        if duration > 0 {
            info.duration = duration as f64 / f64::from(ffmpeg::ffi::AV_TIME_BASE);
        }
        let format_name = self.input.format().name().to_string();
        info.realtime = matches!(format_name.as_str(), "rtp" | "rtsp" | "sdp")
            || self.path.starts_with("rtp:")
            || self.path.starts_with("udp:");

        if let Some(selected) = &self.video {
            if let Some(stream) = self.input.stream(selected.index) {
                let context = codec::context::Context::from_parameters(stream.parameters())?;
                let decoder = context.decoder().video()?;
                info.width = decoder.width();
                info.height = decoder.height();
                info.fps = selected.info.frame_rate.map_or(0.0, |r| r.to_f64());
                info.video_codec = selected.info.codec_name.clone();
            }
        }
        if let Some(selected) = &self.audio {
            if let Some(stream) = self.input.stream(selected.index) {
                let context = codec::context::Context::from_parameters(stream.parameters())?;
                let decoder = context.decoder().audio()?;
                info.sample_rate = decoder.rate();
                info.channels = decoder.channels();
                info.audio_codec = selected.info.codec_name.clone();
            }
        }
        Ok(info)
    }

    fn parameters(&self, selected: &Option<SelectedStream>) -> Option<codec::Parameters> {
        selected
            .as_ref()
            .and_then(|s| self.input.stream(s.index))
            .map(|s| s.parameters())
    }

    /// 为选中的视频流创建解码器
    pub fn video_codec(&self) -> Result<Option<FfmpegVideoCodec>> {
        self.parameters(&self.video)
            .map(FfmpegVideoCodec::from_parameters)
            .transpose()
    }

    /// 为选中的音频流创建解码器
    pub fn audio_codec(&self) -> Result<Option<FfmpegAudioCodec>> {
        self.parameters(&self.audio)
            .map(FfmpegAudioCodec::from_parameters)
            .transpose()
    }

    fn stream_type_of(&self, index: usize) -> Option<(StreamType, Rational)> {
        [&self.video, &self.audio]
            .into_iter()
            .flatten()
            .find(|s| s.index == index)
            .map(|s| (s.info.stream, s.info.time_base))
    }
}

impl DemuxerSource for FfmpegDemuxer {
    fn read_packet(&mut self) -> Result<Option<Packet>> {
        loop {
            let mut packet = ffmpeg::Packet::empty();
            match packet.read(&mut self.input) {
                Ok(()) => {}
                Err(ffmpeg::Error::Eof) => return Ok(None),
                Err(e) => return Err(e.into()),
            }
            // 跳过没有选中的流
            let Some((stream, time_base)) = self.stream_type_of(packet.stream()) else {
                continue;
            };
            let data = packet.data().map(<[u8]>::to_vec).unwrap_or_default();
            let mut out = Packet::new(stream, data, packet.pts(), time_base)
                .with_duration(packet.duration());
            out.dts = packet.dts();
            out.is_key = packet.is_key();
            return Ok(Some(out));
        }
    }

    fn seek(&mut self, position: f64) -> Result<()> {
        let timestamp = (position * f64::from(ffmpeg::ffi::AV_TIME_BASE)) as i64;
        self.input.seek(timestamp, ..timestamp)?;
        Ok(())
    }

    fn media_info(&self) -> &MediaInfo {
        &self.media_info
    }

    fn stream_info(&self, stream: StreamType) -> Option<StreamInfo> {
        match stream {
            StreamType::Video => self.video.as_ref().map(|s| s.info.clone()),
            StreamType::Audio => self.audio.as_ref().map(|s| s.info.clone()),
        }
    }

    fn is_seekable(&self) -> bool {
        !self.media_info.realtime
    }

    fn description(&self) -> String {
        format!("ffmpeg:{}", self.path)
    }
}

/// FFmpeg 视频解码，输出 RGBA
pub struct FfmpegVideoCodec {
    decoder: codec::decoder::Video,
    scaler: Option<(software::scaling::Context, util::format::Pixel, u32, u32)>,
    name: String,
}

// 解码器和缩放上下文只在解码线程上使用
unsafe impl Send for FfmpegVideoCodec {}

impl FfmpegVideoCodec {
    pub fn from_parameters(parameters: codec::Parameters) -> Result<Self> {
        let name = parameters.id().name().to_string();
        let context = codec::context::Context::from_parameters(parameters)?;
        let decoder = context
            .decoder()
            .video()
            .map_err(|e| PlayerError::CodecOpenError(format!("{}: {}", name, e)))?;
        Ok(Self {
            decoder,
            scaler: None,
            name,
        })
    }

    fn convert(&mut self, frame: &util::frame::Video) -> CodecResult<RawVideoFrame> {
        let (width, height, format) = (frame.width(), frame.height(), frame.format());
        let reuse = matches!(&self.scaler, Some((_, f, w, h)) if *f == format && *w == width && *h == height);
        if !reuse {
            let scaler = software::scaling::Context::get(
                format,
                width,
                height,
                util::format::Pixel::RGBA,
                width,
                height,
                software::scaling::Flags::BILINEAR,
            )
            .map_err(map_codec_error)?;
            self.scaler = Some((scaler, format, width, height));
        }
        let mut rgba = util::frame::Video::empty();
        if let Some((scaler, ..)) = self.scaler.as_mut() {
            scaler.run(frame, &mut rgba).map_err(map_codec_error)?;
        }

        // 去掉行对齐填充
        let row = width as usize * 4;
        let stride = rgba.stride(0);
        let mut data = Vec::with_capacity(row * height as usize);
        for line in rgba.data(0).chunks(stride).take(height as usize) {
            data.extend_from_slice(&line[..row.min(line.len())]);
        }
        Ok(RawVideoFrame {
            pts: frame.timestamp(),
            width,
            height,
            format: PixelFormat::RGBA,
            data,
        })
    }
}

impl Codec for FfmpegVideoCodec {
    type Frame = RawVideoFrame;

    fn send_packet(&mut self, packet: Option<&Packet>) -> CodecResult<()> {
        match packet {
            Some(packet) => self.decoder.send_packet(&to_ffmpeg_packet(packet)),
            None => self.decoder.send_eof(),
        }
        .map_err(map_codec_error)
    }

    fn receive_frame(&mut self) -> CodecResult<RawVideoFrame> {
        let mut frame = util::frame::Video::empty();
        self.decoder
            .receive_frame(&mut frame)
            .map_err(map_codec_error)?;
        self.convert(&frame)
    }

    fn flush(&mut self) {
        self.decoder.flush();
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// FFmpeg 音频解码，输出交错 F32（保持源采样率和声道）
pub struct FfmpegAudioCodec {
    decoder: codec::decoder::Audio,
    converter: Option<(software::resampling::Context, util::format::Sample, u32)>,
    name: String,
}

// 解码器和重采样上下文只在解码线程上使用
unsafe impl Send for FfmpegAudioCodec {}

impl FfmpegAudioCodec {
    pub fn from_parameters(parameters: codec::Parameters) -> Result<Self> {
        let name = parameters.id().name().to_string();
        let context = codec::context::Context::from_parameters(parameters)?;
        let decoder = context
            .decoder()
            .audio()
            .map_err(|e| PlayerError::CodecOpenError(format!("{}: {}", name, e)))?;
        Ok(Self {
            decoder,
            converter: None,
            name,
        })
    }

    fn convert(&mut self, frame: &util::frame::Audio) -> CodecResult<RawAudioFrame> {
        let (format, rate, layout) = (frame.format(), frame.rate(), frame.channel_layout());
        let reuse = matches!(&self.converter, Some((_, f, r)) if *f == format && *r == rate);
        if !reuse {
            debug!(
                "{} 🔧 音频格式转换: {:?} {}Hz -> F32 packed",
                log_ctx(),
                format,
                rate
            );
            let converter = software::resampling::Context::get(
                format,
                layout,
                rate,
                util::format::Sample::F32(util::format::sample::Type::Packed),
                layout,
                rate,
            )
            .map_err(map_codec_error)?;
            self.converter = Some((converter, format, rate));
        }
        let mut packed = util::frame::Audio::empty();
        if let Some((converter, ..)) = self.converter.as_mut() {
            converter.run(frame, &mut packed).map_err(map_codec_error)?;
        }

        let channels = frame.channels();
        let nb_samples = packed.samples();
        let len = nb_samples * channels as usize * 4;
        let plane = packed.data(0);
        Ok(RawAudioFrame {
            pts: frame.pts(),
            sample_rate: rate,
            channels,
            format: SampleFormat::F32,
            nb_samples,
            data: plane[..len.min(plane.len())].to_vec(),
        })
    }
}

impl Codec for FfmpegAudioCodec {
    type Frame = RawAudioFrame;

    fn send_packet(&mut self, packet: Option<&Packet>) -> CodecResult<()> {
        match packet {
            Some(packet) => self.decoder.send_packet(&to_ffmpeg_packet(packet)),
            None => self.decoder.send_eof(),
        }
        .map_err(map_codec_error)
    }

    fn receive_frame(&mut self) -> CodecResult<RawAudioFrame> {
        let mut frame = util::frame::Audio::empty();
        self.decoder
            .receive_frame(&mut frame)
            .map_err(map_codec_error)?;
        self.convert(&frame)
    }

    fn flush(&mut self) {
        self.decoder.flush();
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl MediaSource {
    /// 用 FFmpeg 打开本地文件或网络地址
    pub fn open_ffmpeg(path: &str) -> Result<Self> {
        init()?;
        let demuxer = FfmpegDemuxer::open(path)?;
        let video_codec = demuxer.video_codec()?;
        let audio_codec = demuxer.audio_codec()?;
        Ok(Self {
            audio_codec: audio_codec.map(|c| Box::new(c) as BoxedAudioCodec),
            video_codec: video_codec.map(|c| Box::new(c) as BoxedVideoCodec),
            demuxer: Box::new(demuxer),
        })
    }
}
