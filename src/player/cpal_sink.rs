use crate::core::{log_ctx, AudioParams, PlayerError, Result, SampleFormat};
use crate::player::sink::{AudioRenderCallback, AudioRendererSink};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, OutputCallbackInfo, Stream, StreamConfig, SupportedStreamConfigRange};
use log::{debug, error, info, warn};
use std::sync::Arc;

/// 设备不支持期望参数时依次尝试的配置
const FALLBACK_CONFIGS: [(u32, u16); 4] = [(48000, 2), (44100, 2), (48000, 1), (44100, 1)];

/// 系统音频设备输出（cpal）
///
/// 设备线程在回调里直接向渲染端拉取数据，渲染端负责音量和同步。
pub struct CpalAudioSink {
    device: Option<Device>,
    config: Option<StreamConfig>,
    params: Option<AudioParams>,
    callback: Option<Arc<dyn AudioRenderCallback>>,
    stream: Option<Stream>,
}

// cpal::Stream 在部分平台上不是 Send；sink 只在音频渲染线程上创建和操作
unsafe impl Send for CpalAudioSink {}

impl Default for CpalAudioSink {
    fn default() -> Self {
        Self::new()
    }
}

impl CpalAudioSink {
    pub fn new() -> Self {
        Self {
            device: None,
            config: None,
            params: None,
            callback: None,
            stream: None,
        }
    }

    fn to_cpal_format(format: SampleFormat) -> cpal::SampleFormat {
        match format {
            SampleFormat::I16 => cpal::SampleFormat::I16,
            SampleFormat::F32 => cpal::SampleFormat::F32,
        }
    }

    fn is_config_compatible(
        params: &AudioParams,
        supported: &SupportedStreamConfigRange,
    ) -> bool {
        let rate_in_range = params.sample_rate >= supported.min_sample_rate().0
            && params.sample_rate <= supported.max_sample_rate().0;
        rate_in_range
            && params.channels == supported.channels()
            && supported.sample_format() == Self::to_cpal_format(params.format)
    }

    fn supports(device: &Device, params: &AudioParams) -> Result<bool> {
        let mut configs = device
            .supported_output_configs()
            .map_err(|e| PlayerError::AudioError(format!("无法获取支持的音频配置: {}", e)))?;
        Ok(configs.any(|supported| Self::is_config_compatible(params, &supported)))
    }

    /// 选出设备支持的参数：先用期望值，再依次尝试常见配置和另一种采样格式
    fn negotiate(device: &Device, wanted: AudioParams) -> Result<AudioParams> {
        if Self::supports(device, &wanted)? {
            return Ok(wanted);
        }
        warn!(
            "{} ⚠️ 音频设备不支持 {} Hz, {} 声道, {:?}，尝试回退配置",
            log_ctx(),
            wanted.sample_rate,
            wanted.channels,
            wanted.format
        );
        for format in [wanted.format, SampleFormat::F32, SampleFormat::I16] {
            for (sample_rate, channels) in FALLBACK_CONFIGS {
                let candidate = AudioParams {
                    sample_rate,
                    channels,
                    format,
                };
                if Self::supports(device, &candidate)? {
                    info!(
                        "{} ✅ 使用回退配置: {} Hz, {} 声道, {:?}",
                        log_ctx(),
                        sample_rate,
                        channels,
                        format
                    );
                    return Ok(candidate);
                }
            }
        }
        Err(PlayerError::AudioError(format!(
            "音频设备不支持任何标准配置 (原请求: {} Hz, {} 声道)",
            wanted.sample_rate, wanted.channels
        )))
    }

    fn output_delay(info: &OutputCallbackInfo) -> f64 {
        let timestamp = info.timestamp();
        timestamp
            .playback
            .duration_since(&timestamp.callback)
            .map_or(0.0, |d| d.as_secs_f64())
    }

    fn build_stream(
        device: &Device,
        config: &StreamConfig,
        format: SampleFormat,
        callback: Arc<dyn AudioRenderCallback>,
    ) -> Result<Stream> {
        let error_callback = callback.clone();
        let on_error = move |err: cpal::StreamError| {
            error!("{} ❌ 音频流错误: {}", log_ctx(), err);
            error_callback.on_render_error(err.to_string());
        };
        let mut scratch: Vec<u8> = Vec::new();
        let stream = match format {
            SampleFormat::F32 => device.build_output_stream(
                config,
                move |data: &mut [f32], info: &OutputCallbackInfo| {
                    scratch.resize(data.len() * 4, 0);
                    callback.render(Self::output_delay(info), &mut scratch);
                    for (sample, bytes) in data.iter_mut().zip(scratch.chunks_exact(4)) {
                        *sample = f32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                    }
                },
                on_error,
                None,
            ),
            SampleFormat::I16 => device.build_output_stream(
                config,
                move |data: &mut [i16], info: &OutputCallbackInfo| {
                    scratch.resize(data.len() * 2, 0);
                    callback.render(Self::output_delay(info), &mut scratch);
                    for (sample, bytes) in data.iter_mut().zip(scratch.chunks_exact(2)) {
                        *sample = i16::from_ne_bytes([bytes[0], bytes[1]]);
                    }
                },
                on_error,
                None,
            ),
        };
        stream.map_err(|e| PlayerError::AudioError(format!("创建音频流失败: {}", e)))
    }
}

impl AudioRendererSink for CpalAudioSink {
    fn initialize(
        &mut self,
        wanted: AudioParams,
        callback: Arc<dyn AudioRenderCallback>,
    ) -> Result<AudioParams> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| PlayerError::AudioError("无法找到音频输出设备".to_string()))?;
        debug!(
            "{} 使用音频设备: {}",
            log_ctx(),
            device.name().unwrap_or_default()
        );

        let params = Self::negotiate(&device, wanted)?;
        self.config = Some(StreamConfig {
            channels: params.channels,
            sample_rate: cpal::SampleRate(params.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        });
        self.device = Some(device);
        self.params = Some(params);
        self.callback = Some(callback);
        Ok(params)
    }

    fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }
        let (Some(device), Some(config), Some(params), Some(callback)) = (
            self.device.as_ref(),
            self.config.as_ref(),
            self.params,
            self.callback.clone(),
        ) else {
            return Err(PlayerError::StateError("音频设备尚未初始化".into()));
        };
        let stream = Self::build_stream(device, config, params.format, callback)?;
        // 渲染端暂停时输出静音，设备可以一直运行
        stream
            .play()
            .map_err(|e| PlayerError::AudioError(format!("启动音频流失败: {}", e)))?;
        self.stream = Some(stream);
        info!("{} 🔊 音频输出已启动", log_ctx());
        Ok(())
    }

    fn play(&mut self) {
        if let Some(stream) = &self.stream {
            if let Err(e) = stream.play() {
                warn!("{} ⚠️ 恢复音频流失败: {}", log_ctx(), e);
            }
        }
    }

    fn pause(&mut self) {
        if let Some(stream) = &self.stream {
            if let Err(e) = stream.pause() {
                warn!("{} ⚠️ 暂停音频流失败: {}", log_ctx(), e);
            }
        }
    }

    fn stop(&mut self) {
        if self.stream.take().is_some() {
            info!("{} 音频输出已停止", log_ctx());
        }
        self.callback = None;
    }
}

impl Drop for CpalAudioSink {
    fn drop(&mut self) {
        self.stop();
    }
}
