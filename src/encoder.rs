//! # 体积约束编码模块
//!
//! ## 设计思路
//!
//! 在质量轴上做有界线性下探：从初始质量开始编码，命中预算立即返回；
//! 否则按固定步长递减，直到预算达成、质量触底或迭代耗尽。
//! 搜索假设“质量降低 → 体积不增”对自然照片内容成立——这是记录在案的
//! 假设而非保证，合成或近不可压内容可能出现非单调体积曲线，
//! 此时循环照常走完，以最后一次产物收尾。
//!
//! 选择线性下探而非二分：质量轴本身很粗，十来次迭代成本可忽略，
//! 而“首次命中立即返回”给用户的是可感知的最快反馈。
//!
//! ## 实现思路
//!
//! - `quality_schedule` 预先展开质量序列，循环不变量（序列长度不超过
//!   迭代上限、每个质量都落在 `(min, initial]`）由它单点保证。
//! - 每次编码都是挂起点：`spawn_blocking` 执行，恢复时校验会话令牌，
//!   同一时刻至多一个编码在途，没有并发投机编码。
//! - 预算未达成不是错误：产物带 `over_budget=true` 正常返回。

use std::sync::Arc;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ExtendedColorType, RgbImage};

use crate::config::PipelineConfig;
use crate::error::PhotoError;
use crate::handler::PhotoHandler;
use crate::session::SessionToken;
use crate::source::{CroppedBitmap, EncodedArtifact};
use crate::specs::TargetSpec;

impl PhotoHandler {
    /// 体积约束搜索编码。
    ///
    /// 裁剪完成后必定产出 `EncodedArtifact`：预算不可达时返回最后一次
    /// 产物并置 `over_budget`，调用侧据此提示用户而非中断流程。
    pub(crate) async fn encode_within_budget(
        &self,
        cropped: &CroppedBitmap,
        spec: &TargetSpec,
        config: &PipelineConfig,
        token: &SessionToken,
    ) -> Result<EncodedArtifact, PhotoError> {
        // JPEG 无透明通道，转换一次后在各次迭代间共享
        let rgb = Arc::new(DynamicImage::ImageRgba8(cropped.image.clone()).to_rgb8());
        let schedule = Self::quality_schedule(config);
        let budget = spec.max_size_bytes;

        let mut last: Option<(Vec<u8>, f32)> = None;

        for (index, quality) in schedule.iter().copied().enumerate() {
            let iteration = (index + 1) as u32;

            let rgb_task = Arc::clone(&rgb);
            let encoded = tokio::task::spawn_blocking(move || Self::encode_jpeg(&rgb_task, quality))
                .await
                .map_err(|e| PhotoError::ResourceLimit(format!("编码任务异常结束：{}", e)))??;

            token.ensure_live("编码")?;

            log::debug!(
                "🗜️ 第 {}/{} 次编码 - quality={:.2} size={:.1}KB 预算={:.1}KB",
                iteration,
                schedule.len(),
                quality,
                encoded.len() as f64 / 1024.0,
                budget as f64 / 1024.0
            );

            if encoded.len() as u64 <= budget {
                log::info!(
                    "✅ 体积搜索命中 - quality={:.2} size={}B 迭代 {} 次",
                    quality,
                    encoded.len(),
                    iteration
                );
                return Ok(Self::artifact(encoded, quality, false, iteration));
            }

            last = Some((encoded, quality));
        }

        let (bytes, quality) = last
            .ok_or_else(|| PhotoError::Encode("质量搜索序列为空".to_string()))?;

        log::warn!(
            "⚠️ 体积预算不可达 - 最终 quality={:.2} size={}B 预算={}B，以最佳努力产物收尾",
            quality,
            bytes.len(),
            budget
        );

        Ok(Self::artifact(bytes, quality, true, schedule.len() as u32))
    }

    /// 展开质量搜索序列。
    ///
    /// 不变量：序列非空、长度不超过 `max_iterations`、
    /// 每个质量都落在 `(min_quality, initial_quality]` 区间内。
    pub(crate) fn quality_schedule(config: &PipelineConfig) -> Vec<f32> {
        let mut schedule = Vec::with_capacity(config.max_iterations as usize);
        let mut quality = config.initial_quality;

        while (schedule.len() as u32) < config.max_iterations {
            schedule.push(quality);

            let next = quality - config.quality_step;
            if next <= config.min_quality {
                break;
            }
            quality = next;
        }

        schedule
    }

    fn encode_jpeg(rgb: &RgbImage, quality: f32) -> Result<Vec<u8>, PhotoError> {
        let mut buffer = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut buffer, Self::quality_percent(quality));

        encoder
            .encode(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
            .map_err(|e| PhotoError::Encode(format!("JPEG 编码失败：{}", e)))?;

        Ok(buffer)
    }

    /// 0.0~1.0 的质量参数换算为编码器的 1~100 百分比。
    fn quality_percent(quality: f32) -> u8 {
        (quality * 100.0).round().clamp(1.0, 100.0) as u8
    }

    fn artifact(bytes: Vec<u8>, quality: f32, over_budget: bool, iterations: u32) -> EncodedArtifact {
        let byte_size = bytes.len();
        EncodedArtifact {
            bytes: Bytes::from(bytes),
            byte_size,
            quality_used: quality,
            over_budget,
            iterations,
        }
    }
}
