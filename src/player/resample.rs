use crate::core::{AudioParams, PlayerError, Result, SampleFormat};
use crate::player::codec::RawAudioFrame;
use audioadapter_buffers::direct::InterleavedSlice;
use rubato::{
    Async, FixedAsync, Resampler as _, SincInterpolationParameters, SincInterpolationType,
    WindowFunction,
};

/// 每次送入 rubato 的最大帧数
const RESAMPLE_CHUNK_FRAMES: usize = 1024;
/// 相对比率的可调范围（同步补偿只用到 ±10% 以内）
const MAX_RELATIVE_RATIO: f64 = 2.0;

fn sinc_params() -> SincInterpolationParameters {
    SincInterpolationParameters {
        sinc_len: 128,
        f_cutoff: 0.94,
        oversampling_factor: 128,
        interpolation: SincInterpolationType::Linear,
        window: WindowFunction::Blackman,
    }
}

fn build_sinc(ratio: f64, channels: usize) -> Result<Async<f32>> {
    Async::<f32>::new_sinc(
        ratio,
        MAX_RELATIVE_RATIO,
        &sinc_params(),
        RESAMPLE_CHUNK_FRAMES,
        channels,
        FixedAsync::Input,
    )
    .map_err(|e| PlayerError::AudioError(format!("创建重采样器失败: {}", e)))
}

/// 按块送入 rubato，返回交错存储的输出
fn process_interleaved(
    resampler: &mut Async<f32>,
    samples: &[f32],
    channels: usize,
) -> Result<Vec<f32>> {
    let mut output = Vec::with_capacity(samples.len() + samples.len() / 8);
    for chunk in samples.chunks(RESAMPLE_CHUNK_FRAMES * channels) {
        let frames = chunk.len() / channels;
        if frames == 0 {
            break;
        }
        resampler
            .set_chunk_size(frames)
            .map_err(|e| PlayerError::AudioError(format!("重采样块大小设置失败: {}", e)))?;
        let input = InterleavedSlice::new(&chunk[..frames * channels], channels, frames)
            .map_err(|e| PlayerError::AudioError(format!("重采样输入缓冲错误: {}", e)))?;
        let out = resampler
            .process(&input, 0, None)
            .map_err(|e| PlayerError::AudioError(format!("重采样失败: {}", e)))?;
        output.extend(out.take_data());
    }
    Ok(output)
}

/// 交错字节 → f32 采样
pub fn samples_to_f32(data: &[u8], format: SampleFormat) -> Vec<f32> {
    match format {
        SampleFormat::I16 => data
            .chunks_exact(2)
            .map(|b| i16::from_ne_bytes([b[0], b[1]]) as f32 / 32768.0)
            .collect(),
        SampleFormat::F32 => data
            .chunks_exact(4)
            .map(|b| f32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
            .collect(),
    }
}

/// f32 采样 → 交错字节（超出范围的采样截断）
pub fn samples_from_f32(samples: &[f32], format: SampleFormat) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * format.bytes_per_sample());
    match format {
        SampleFormat::I16 => {
            for &s in samples {
                let v = (s * 32768.0).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16;
                out.extend_from_slice(&v.to_ne_bytes());
            }
        }
        SampleFormat::F32 => {
            for &s in samples {
                out.extend_from_slice(&s.clamp(-1.0, 1.0).to_ne_bytes());
            }
        }
    }
    out
}

fn remix(samples: &[f32], in_channels: usize, out_channels: usize) -> Vec<f32> {
    if in_channels == out_channels || in_channels == 0 {
        return samples.to_vec();
    }
    let frames = samples.len() / in_channels;
    let mut out = Vec::with_capacity(frames * out_channels);
    for frame in samples.chunks_exact(in_channels) {
        if out_channels == 1 {
            out.push(frame.iter().sum::<f32>() / in_channels as f32);
        } else {
            for c in 0..out_channels {
                out.push(frame[c % in_channels]);
            }
        }
    }
    out
}

/// 把解码输出转换到设备参数（采样格式、声道数、采样率）
///
/// 采样率转换由 rubato 完成；源采样率变化时重建转换器。
pub struct Resampler {
    target: AudioParams,
    /// 当前源采样率对应的转换器
    sinc: Option<(u32, Async<f32>)>,
}

impl Resampler {
    pub fn new(target: AudioParams) -> Self {
        Self { target, sinc: None }
    }

    pub fn target(&self) -> AudioParams {
        self.target
    }

    /// 输入与目标参数相同时直接拷贝
    pub fn is_passthrough(&self, frame: &RawAudioFrame) -> bool {
        frame.sample_rate == self.target.sample_rate
            && frame.channels == self.target.channels
            && frame.format == self.target.format
    }

    /// 返回（目标格式数据, 目标采样数）
    pub fn convert(&mut self, frame: &RawAudioFrame) -> Result<(Vec<u8>, usize)> {
        if self.is_passthrough(frame) {
            return Ok((frame.data.clone(), frame.nb_samples));
        }
        let out_channels = self.target.channels as usize;
        if frame.sample_rate == 0 || out_channels == 0 {
            return Ok((Vec::new(), 0));
        }
        let samples = samples_to_f32(&frame.data, frame.format);
        let remixed = remix(&samples, frame.channels as usize, out_channels);

        let resampled = if frame.sample_rate == self.target.sample_rate {
            remixed
        } else {
            let rebuild = !matches!(&self.sinc, Some((rate, _)) if *rate == frame.sample_rate);
            if rebuild {
                let ratio = self.target.sample_rate as f64 / frame.sample_rate as f64;
                self.sinc = Some((frame.sample_rate, build_sinc(ratio, out_channels)?));
            }
            match self.sinc.as_mut() {
                Some((_, resampler)) => process_interleaved(resampler, &remixed, out_channels)?,
                None => remixed,
            }
        };
        let frames = resampled.len() / out_channels;
        Ok((samples_from_f32(&resampled, self.target.format), frames))
    }

    /// 清空转换器内部的历史采样（新代数开始时调用）
    pub fn reset(&mut self) {
        if let Some((_, resampler)) = self.sinc.as_mut() {
            resampler.reset();
        }
    }
}

/// 音频不是主时钟时的采样数补偿
///
/// 设备格式的连续音频流经同一个 rubato 转换器，按 `wanted / actual`
/// 调整相对比率，比率变化在块内平滑过渡。
#[derive(Default)]
pub struct Compensator {
    sinc: Option<(AudioParams, Async<f32>)>,
}

impl Compensator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 把一段设备格式的音频调整到约 `wanted_frames` 帧
    pub fn process(
        &mut self,
        data: &[u8],
        params: AudioParams,
        wanted_frames: usize,
    ) -> Result<Vec<u8>> {
        let channels = params.channels as usize;
        let frame_size = params.frame_size();
        if channels == 0 || frame_size == 0 || data.len() < frame_size {
            return Ok(data.to_vec());
        }
        let frames = data.len() / frame_size;

        let rebuild = !matches!(&self.sinc, Some((current, _)) if *current == params);
        if rebuild {
            self.sinc = Some((params, build_sinc(1.0, channels)?));
        }
        let Some((_, resampler)) = self.sinc.as_mut() else {
            return Ok(data.to_vec());
        };

        let relative = (wanted_frames as f64 / frames as f64)
            .clamp(1.0 / MAX_RELATIVE_RATIO, MAX_RELATIVE_RATIO);
        resampler
            .set_resample_ratio_relative(relative, true)
            .map_err(|e| PlayerError::AudioError(format!("调整重采样比率失败: {}", e)))?;
        let samples = samples_to_f32(data, params.format);
        let out = process_interleaved(resampler, &samples, channels)?;
        Ok(samples_from_f32(&out, params.format))
    }

    pub fn reset(&mut self) {
        if let Some((_, resampler)) = self.sinc.as_mut() {
            resampler.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_i16(samples: &[i16], channels: u16, sample_rate: u32) -> RawAudioFrame {
        RawAudioFrame {
            pts: Some(0),
            sample_rate,
            channels,
            format: SampleFormat::I16,
            nb_samples: samples.len() / channels as usize,
            data: samples.iter().flat_map(|s| s.to_ne_bytes()).collect(),
        }
    }

    #[test]
    fn test_passthrough_keeps_bytes() {
        let target = AudioParams::default();
        let frame = raw_i16(&[1, 2, 3, 4], 2, 48000);
        let (data, frames) = Resampler::new(target).convert(&frame).unwrap();
        assert_eq!(frames, 2);
        assert_eq!(data, frame.data);
    }

    #[test]
    fn test_mono_to_stereo_f32() {
        let target = AudioParams {
            sample_rate: 48000,
            channels: 2,
            format: SampleFormat::F32,
        };
        let frame = raw_i16(&[16384, -16384], 1, 48000);
        let (data, frames) = Resampler::new(target).convert(&frame).unwrap();
        assert_eq!(frames, 2);
        let samples = samples_to_f32(&data, SampleFormat::F32);
        assert_eq!(samples, vec![0.5, 0.5, -0.5, -0.5]);
    }

    #[test]
    fn test_rate_conversion_follows_ratio() {
        let target = AudioParams::default();
        let mut resampler = Resampler::new(target);
        let frame = raw_i16(&vec![16384; 441 * 2], 2, 44100);

        let mut last = Vec::new();
        for _ in 0..10 {
            let (data, frames) = resampler.convert(&frame).unwrap();
            assert!((470..=490).contains(&frames), "frames = {}", frames);
            assert_eq!(data.len(), frames * target.frame_size());
            last = data;
        }
        // 滤波器稳定后直流分量保持不变
        let samples = samples_to_f32(&last, target.format);
        let middle = samples[samples.len() / 2];
        assert!((middle - 0.5).abs() < 0.1, "middle = {}", middle);
    }

    #[test]
    fn test_rate_change_rebuilds_converter() {
        let target = AudioParams::default();
        let mut resampler = Resampler::new(target);
        let (_, frames) = resampler
            .convert(&raw_i16(&vec![0; 441 * 2], 2, 44100))
            .unwrap();
        assert!((470..=490).contains(&frames));
        let (_, frames) = resampler
            .convert(&raw_i16(&vec![0; 240 * 2], 2, 24000))
            .unwrap();
        assert!((470..=490).contains(&frames), "frames = {}", frames);
    }

    #[test]
    fn test_compensator_follows_wanted_frames() {
        let params = AudioParams::default();
        let block = vec![0u8; 480 * params.frame_size()];

        let mut faster = Compensator::new();
        let total: usize = (0..20)
            .map(|_| faster.process(&block, params, 528).unwrap().len() / params.frame_size())
            .sum();
        assert!(total > 480 * 20 + 400 && total < 528 * 20 + 50, "total = {}", total);

        let mut slower = Compensator::new();
        let total: usize = (0..20)
            .map(|_| slower.process(&block, params, 432).unwrap().len() / params.frame_size())
            .sum();
        assert!(total < 480 * 20 - 400 && total > 432 * 20 - 50, "total = {}", total);
    }
}
