//! # 配置模块
//!
//! ## 设计思路
//!
//! 将所有“可调策略”集中到 `PipelineConfig`，保证运行时行为可观测、可调整、可测试。
//! 重采样平滑档位（high / balanced / fast）作为高层语义，映射到底层滤镜选择；
//! 体积搜索参数（初始质量、步长、下限、迭代上限）与发布工具的线上行为保持一致。
//!
//! ## 实现思路
//!
//! - `Default` 提供生产可用配置。
//! - `SmoothingQuality` 负责档位字符串解析与滤镜映射。
//! - `validate` 在处理器构造与运行时改配置两处把关，拒绝越界参数。
//!
//! 注意：PDF 渲染放大系数是为下游打印 DPI 固定选取的，不在配置范围内，
//! 见 `rasterizer` 模块常量。

use image::imageops::FilterType;

use crate::error::PhotoError;

/// 照片处理配置。
///
/// 字段覆盖了加载、解码与体积搜索三个阶段。
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// 读取原始字节时允许的最大文件体积（字节）。
    pub max_file_size: u64,
    /// 解码后的像素上限（`width * height`）。
    pub max_decoded_pixels: u64,
    /// 裁剪重采样的平滑档位。
    pub smoothing: SmoothingQuality,
    /// 体积搜索的初始质量参数。
    pub initial_quality: f32,
    /// 每次迭代的质量递减步长。
    pub quality_step: f32,
    /// 质量下限：递减结果不高于该值时停止搜索。
    pub min_quality: f32,
    /// 单次搜索允许的最大编码次数。
    pub max_iterations: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_file_size: 50 * 1024 * 1024,
            max_decoded_pixels: 40_000_000,
            smoothing: SmoothingQuality::High,
            initial_quality: 0.92,
            quality_step: 0.07,
            min_quality: 0.30,
            max_iterations: 12,
        }
    }
}

impl PipelineConfig {
    /// 校验配置参数范围。
    ///
    /// 处理器构造与运行时改配置都经过这里，保证搜索循环的不变量
    /// （质量始终落在 `(min_quality, initial_quality]` 区间内）成立。
    pub(crate) fn validate(&self) -> Result<(), PhotoError> {
        if self.max_file_size < 1024 * 1024 {
            return Err(PhotoError::InvalidConfig(
                "max_file_size 不能小于 1MB".to_string(),
            ));
        }
        if self.max_decoded_pixels < 1_000_000 {
            return Err(PhotoError::InvalidConfig(
                "max_decoded_pixels 不能小于 100 万像素".to_string(),
            ));
        }
        if !(self.initial_quality > 0.0 && self.initial_quality <= 1.0) {
            return Err(PhotoError::InvalidConfig(
                "initial_quality 必须在 (0, 1] 区间内".to_string(),
            ));
        }
        if !(self.quality_step > 0.0 && self.quality_step <= 0.5) {
            return Err(PhotoError::InvalidConfig(
                "quality_step 必须在 (0, 0.5] 区间内".to_string(),
            ));
        }
        if !(self.min_quality > 0.0 && self.min_quality < self.initial_quality) {
            return Err(PhotoError::InvalidConfig(
                "min_quality 必须大于 0 且小于 initial_quality".to_string(),
            ));
        }
        if !(1..=64).contains(&self.max_iterations) {
            return Err(PhotoError::InvalidConfig(
                "max_iterations 必须在 1~64 之间".to_string(),
            ));
        }

        Ok(())
    }
}

/// 裁剪重采样平滑档位（面向产品/用户语义）。
///
/// - `High`：最高平滑质量，默认档位
/// - `Balanced`：质量与耗时平衡
/// - `Fast`：优先速度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmoothingQuality {
    High,
    Balanced,
    Fast,
}

impl SmoothingQuality {
    /// 从外部字符串解析档位。
    ///
    /// # 示例
    /// ```rust
    /// use exam_photo::SmoothingQuality;
    ///
    /// let q = SmoothingQuality::from_str("high")?;
    /// assert_eq!(q.as_str(), "high");
    /// # Ok::<(), exam_photo::PhotoError>(())
    /// ```
    pub fn from_str(level: &str) -> Result<Self, PhotoError> {
        match level.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Self::High),
            "balanced" => Ok(Self::Balanced),
            "fast" => Ok(Self::Fast),
            other => Err(PhotoError::InvalidInput(format!(
                "未知平滑档位：{}（可选：high / balanced / fast）",
                other
            ))),
        }
    }

    /// 将档位输出为稳定字符串，供前端展示与持久化。
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Balanced => "balanced",
            Self::Fast => "fast",
        }
    }

    /// 档位对应的重采样滤镜。
    pub(crate) fn filter_type(self) -> FilterType {
        match self {
            Self::High => FilterType::Lanczos3,
            Self::Balanced => FilterType::CatmullRom,
            Self::Fast => FilterType::Triangle,
        }
    }
}
