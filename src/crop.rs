//! # 裁剪与重采样模块
//!
//! ## 设计思路
//!
//! 裁剪区域由交互式裁剪面选定并锁定宽高比，本模块只做小容差断言，
//! 然后把区域重采样到目标规格的**精确**像素尺寸——没有保比例留边，
//! 没有舍入漂移，输出尺寸恒等于 `spec.width x spec.height`。
//!
//! ## 实现思路
//!
//! - 区域校验：非空、不越界、宽高比落在目标比例的容差带内。
//! - 重采样优先走 `fast_image_resize`（滤镜由平滑档位决定），
//!   失败时回退 `image::imageops::resize`，两条路径输出尺寸一致。

use fast_image_resize as fr;
use image::RgbaImage;
use image::imageops::FilterType;

use crate::config::PipelineConfig;
use crate::error::PhotoError;
use crate::handler::PhotoHandler;
use crate::source::{CropRectangle, CroppedBitmap, DecodedBitmap};
use crate::specs::TargetSpec;

/// 区域宽高比相对目标比例的允许偏差。
const CROP_ASPECT_TOLERANCE: f64 = 0.02;

impl PhotoHandler {
    /// 裁剪并重采样到目标规格的精确尺寸。
    pub(crate) fn crop_to_spec(
        bitmap: &DecodedBitmap,
        rect: CropRectangle,
        spec: &TargetSpec,
        config: &PipelineConfig,
    ) -> Result<CroppedBitmap, PhotoError> {
        Self::validate_crop_rect(bitmap, &rect, spec)?;

        let region = bitmap.image.crop_imm(rect.x, rect.y, rect.width, rect.height).to_rgba8();

        // 区域恰好等于目标尺寸时无需重采样
        if (region.width(), region.height()) == (spec.width, spec.height) {
            return Ok(CroppedBitmap { image: region });
        }

        let filter = config.smoothing.filter_type();
        let resampled = match Self::resample_exact(&region, spec.width, spec.height, filter) {
            Ok(resampled) => resampled,
            Err(err) => {
                log::warn!("⚠️ fast_image_resize 重采样失败，回退 image::imageops::resize：{}", err);
                image::imageops::resize(&region, spec.width, spec.height, filter)
            }
        };

        log::info!(
            "✂️ 裁剪完成 - 区域 {}x{}@({},{}) -> {}x{}（filter={:?}）",
            rect.width,
            rect.height,
            rect.x,
            rect.y,
            spec.width,
            spec.height,
            filter
        );

        Ok(CroppedBitmap { image: resampled })
    }

    fn validate_crop_rect(
        bitmap: &DecodedBitmap,
        rect: &CropRectangle,
        spec: &TargetSpec,
    ) -> Result<(), PhotoError> {
        if rect.width == 0 || rect.height == 0 {
            return Err(PhotoError::InvalidCropRegion("区域宽高不能为 0".to_string()));
        }

        let right = rect
            .x
            .checked_add(rect.width)
            .ok_or_else(|| PhotoError::InvalidCropRegion("区域坐标溢出".to_string()))?;
        let bottom = rect
            .y
            .checked_add(rect.height)
            .ok_or_else(|| PhotoError::InvalidCropRegion("区域坐标溢出".to_string()))?;

        if right > bitmap.width() || bottom > bitmap.height() {
            return Err(PhotoError::InvalidCropRegion(format!(
                "区域 {}x{}@({},{}) 超出位图范围 {}x{}",
                rect.width,
                rect.height,
                rect.x,
                rect.y,
                bitmap.width(),
                bitmap.height()
            )));
        }

        let target_ratio = spec.aspect_ratio();
        let deviation = (rect.aspect_ratio() - target_ratio).abs() / target_ratio;
        if deviation > CROP_ASPECT_TOLERANCE {
            return Err(PhotoError::InvalidCropRegion(format!(
                "区域宽高比 {:.4} 偏离目标比例 {:.4} 超出容差",
                rect.aspect_ratio(),
                target_ratio
            )));
        }

        Ok(())
    }

    /// 用 `fast_image_resize` 重采样到精确目标尺寸。
    fn resample_exact(
        src: &RgbaImage,
        target_width: u32,
        target_height: u32,
        filter: FilterType,
    ) -> Result<RgbaImage, PhotoError> {
        let (src_width, src_height) = src.dimensions();

        let src_image = fr::images::Image::from_vec_u8(
            src_width,
            src_height,
            src.as_raw().clone(),
            fr::PixelType::U8x4,
        )
        .map_err(|e| PhotoError::InvalidCropRegion(format!("构建源图像缓冲失败：{}", e)))?;

        let mut dst_image =
            fr::images::Image::new(target_width, target_height, fr::PixelType::U8x4);

        let mut resizer = fr::Resizer::new();
        let options = fr::ResizeOptions::new()
            .resize_alg(fr::ResizeAlg::Convolution(Self::to_fast_filter(filter)));

        resizer
            .resize(&src_image, &mut dst_image, Some(&options))
            .map_err(|e| PhotoError::InvalidCropRegion(format!("fast_image_resize 执行失败：{}", e)))?;

        RgbaImage::from_raw(target_width, target_height, dst_image.into_vec())
            .ok_or_else(|| PhotoError::InvalidCropRegion("重采样输出缓冲长度异常".to_string()))
    }

    fn to_fast_filter(filter: FilterType) -> fr::FilterType {
        match filter {
            FilterType::Nearest => fr::FilterType::Box,
            FilterType::Triangle => fr::FilterType::Bilinear,
            FilterType::CatmullRom => fr::FilterType::CatmullRom,
            FilterType::Gaussian => fr::FilterType::Mitchell,
            FilterType::Lanczos3 => fr::FilterType::Lanczos3,
        }
    }
}
