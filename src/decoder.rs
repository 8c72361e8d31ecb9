//! # 解码模块
//!
//! ## 设计思路
//!
//! 将“字节 → 位图”的过程集中管理，并在关键节点增加资源上限控制。
//! 优先读 header 尺寸做像素上限检查，再进行完整解码，
//! 降低恶意输入触发高内存开销的风险。
//!
//! 解码失败从不吞掉分类信息：错误携带输入类别，降级支持类（HEIC / TIFF）
//! 的失败文案与通用解码错误不同，调用侧可以直接展示。
//!
//! ## 实现思路
//!
//! 1. SVG 走 `usvg` 解析 + `resvg` 渲染到白底 RGBA 画布
//! 2. 其余栅格类：猜测格式 → header 尺寸 → 像素上限 → 完整解码 → 复核尺寸
//! 3. 解码为 CPU 密集操作，封装在 `spawn_blocking` 中，恢复点检查会话令牌

use image::{DynamicImage, GenericImageView};
use resvg::{tiny_skia, usvg};
use std::io::Cursor;

use crate::classifier::InputCategory;
use crate::config::PipelineConfig;
use crate::error::PhotoError;
use crate::handler::PhotoHandler;
use crate::session::SessionToken;
use crate::source::{DecodedBitmap, UploadedFile};

impl PhotoHandler {
    /// 解码上传字节为位图（挂起点：阻塞线程池执行，恢复时校验令牌）。
    pub(crate) async fn decode_upload(
        &self,
        upload: UploadedFile,
        category: InputCategory,
        config: &PipelineConfig,
        token: &SessionToken,
    ) -> Result<DecodedBitmap, PhotoError> {
        let config = config.clone();
        let decoded = tokio::task::spawn_blocking(move || Self::decode_bytes(&upload, category, &config))
            .await
            .map_err(|e| PhotoError::ResourceLimit(format!("解码任务异常结束：{}", e)))??;

        token.ensure_live("解码")?;

        Ok(decoded)
    }

    /// 同步解码入口，按内容分发 SVG / 普通栅格两条路径。
    pub(crate) fn decode_bytes(
        upload: &UploadedFile,
        category: InputCategory,
        config: &PipelineConfig,
    ) -> Result<DecodedBitmap, PhotoError> {
        let image = if Self::looks_like_svg(upload) {
            Self::decode_svg(&upload.bytes, category, config)?
        } else {
            Self::decode_raster(&upload.bytes, category, config)?
        };

        if image.width() == 0 || image.height() == 0 {
            return Err(Self::decode_failure(category, "解码结果为空位图"));
        }

        Ok(DecodedBitmap::new(image))
    }

    fn decode_raster(
        bytes: &[u8],
        category: InputCategory,
        config: &PipelineConfig,
    ) -> Result<DynamicImage, PhotoError> {
        image::guess_format(bytes)
            .map_err(|e| Self::decode_failure(category, &format!("无法识别图片格式：{}", e)))?;

        let (header_width, header_height) = Self::inspect_dimensions(bytes, category)?;
        Self::validate_pixel_limits(config, header_width, header_height)?;

        let decoded = image::load_from_memory(bytes)
            .map_err(|e| Self::decode_failure(category, &format!("图片解码失败：{}", e)))?;

        // header 与实际解码尺寸可能不一致（截断流），复核一次
        let (width, height) = decoded.dimensions();
        Self::validate_pixel_limits(config, width, height)?;

        Ok(decoded)
    }

    fn decode_svg(
        bytes: &[u8],
        category: InputCategory,
        config: &PipelineConfig,
    ) -> Result<DynamicImage, PhotoError> {
        let options = usvg::Options::default();
        let tree = usvg::Tree::from_data(bytes, &options)
            .map_err(|e| Self::decode_failure(category, &format!("SVG 解析失败：{}", e)))?;

        let size = tree.size().to_int_size();
        Self::validate_pixel_limits(config, size.width(), size.height())?;

        let mut pixmap = tiny_skia::Pixmap::new(size.width(), size.height())
            .ok_or_else(|| Self::decode_failure(category, "SVG 画布尺寸无效"))?;

        // JPEG 无透明通道，先铺白底再渲染，同时规避预乘 alpha 的色偏
        pixmap.fill(tiny_skia::Color::WHITE);
        resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());

        let rgba = image::RgbaImage::from_raw(size.width(), size.height(), pixmap.take())
            .ok_or_else(|| Self::decode_failure(category, "SVG 渲染输出缓冲长度异常"))?;

        Ok(DynamicImage::ImageRgba8(rgba))
    }

    /// 仅通过内存中的图片头信息读取宽高，用于完整解码前的像素限制检查。
    fn inspect_dimensions(bytes: &[u8], category: InputCategory) -> Result<(u32, u32), PhotoError> {
        let reader = image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| Self::decode_failure(category, &format!("无法识别图片格式：{}", e)))?;

        reader
            .into_dimensions()
            .map_err(|e| Self::decode_failure(category, &format!("无法读取图片尺寸：{}", e)))
    }

    /// 校验像素数量是否超过配置上限。
    pub(crate) fn validate_pixel_limits(
        config: &PipelineConfig,
        width: u32,
        height: u32,
    ) -> Result<(), PhotoError> {
        let pixels = (u64::from(width))
            .checked_mul(u64::from(height))
            .ok_or_else(|| PhotoError::ResourceLimit("图片像素数溢出".to_string()))?;

        if pixels > config.max_decoded_pixels {
            return Err(PhotoError::ResourceLimit(format!(
                "图片像素过大：{} 像素（限制：{} 像素）",
                pixels, config.max_decoded_pixels
            )));
        }

        Ok(())
    }

    /// 按类别生成解码失败文案：降级支持类给出转换建议而非通用错误。
    fn decode_failure(category: InputCategory, detail: &str) -> PhotoError {
        let message = match category {
            InputCategory::HighEfficiencyPhoto => format!(
                "HEIC/HEIF 为降级支持格式，当前环境解码失败（{}）。\
                 请先在手机或相册应用中导出为 JPG / PNG",
                detail
            ),
            InputCategory::TiffPhoto => format!(
                "TIFF 为降级支持格式，解码失败（{}）。请转换为 JPG / PNG 后重试",
                detail
            ),
            _ => detail.to_string(),
        };

        PhotoError::Decode { category, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use image::{ImageBuffer, ImageFormat, Rgba};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            Rgba([(x % 255) as u8, (y % 255) as u8, ((x + y) % 255) as u8, 255])
        });

        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut cursor, ImageFormat::Png)
            .expect("failed to encode test image");
        cursor.into_inner()
    }

    fn upload(bytes: Vec<u8>, media_type: &str, file_name: &str) -> UploadedFile {
        UploadedFile {
            bytes: Bytes::from(bytes),
            declared_media_type: media_type.to_string(),
            file_name: file_name.to_string(),
        }
    }

    #[test]
    fn decodes_png_to_expected_dimensions() {
        let config = PipelineConfig::default();
        let file = upload(png_bytes(320, 200), "image/png", "a.png");

        let bitmap = PhotoHandler::decode_bytes(&file, InputCategory::RasterDirect, &config)
            .expect("png should decode");

        assert_eq!((bitmap.width(), bitmap.height()), (320, 200));
    }

    #[test]
    fn corrupt_stream_preserves_category() {
        let config = PipelineConfig::default();
        // PNG 魔数 + 垃圾负载：签名通过但解码必须失败
        let mut bytes = vec![137, 80, 78, 71, 13, 10, 26, 10];
        bytes.extend_from_slice(&[0u8; 64]);
        let file = upload(bytes, "image/png", "broken.png");

        let result = PhotoHandler::decode_bytes(&file, InputCategory::RasterDirect, &config);

        assert!(matches!(
            result,
            Err(PhotoError::Decode { category: InputCategory::RasterDirect, .. })
        ));
    }

    #[test]
    fn heic_failure_surfaces_degraded_notice() {
        let config = PipelineConfig::default();
        let file = upload(vec![0u8; 32], "image/heic", "photo.heic");

        let result = PhotoHandler::decode_bytes(&file, InputCategory::HighEfficiencyPhoto, &config);

        match result {
            Err(PhotoError::Decode { category, message }) => {
                assert_eq!(category, InputCategory::HighEfficiencyPhoto);
                assert!(message.contains("HEIC"), "message: {}", message);
                assert!(message.contains("降级"), "message: {}", message);
            }
            other => panic!("expected degraded decode error, got {:?}", other),
        }
    }

    #[test]
    fn tiff_failure_surfaces_degraded_notice() {
        let config = PipelineConfig::default();
        let file = upload(vec![0u8; 32], "image/tiff", "scan.tiff");

        let result = PhotoHandler::decode_bytes(&file, InputCategory::TiffPhoto, &config);

        match result {
            Err(PhotoError::Decode { category, message }) => {
                assert_eq!(category, InputCategory::TiffPhoto);
                assert!(message.contains("TIFF"), "message: {}", message);
            }
            other => panic!("expected degraded decode error, got {:?}", other),
        }
    }

    #[test]
    fn svg_renders_at_intrinsic_size() {
        let config = PipelineConfig::default();
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg" width="120" height="80">
            <rect x="10" y="10" width="100" height="60" fill="navy"/>
        </svg>"#;
        let file = upload(svg.as_bytes().to_vec(), "image/svg+xml", "icon.svg");

        let bitmap = PhotoHandler::decode_bytes(&file, InputCategory::RasterDirect, &config)
            .expect("svg should rasterize");

        assert_eq!((bitmap.width(), bitmap.height()), (120, 80));
    }

    #[test]
    fn invalid_svg_is_a_decode_error() {
        let config = PipelineConfig::default();
        let file = upload(b"<svg not really".to_vec(), "image/svg+xml", "bad.svg");

        let result = PhotoHandler::decode_bytes(&file, InputCategory::RasterDirect, &config);
        assert!(matches!(result, Err(PhotoError::Decode { .. })));
    }

    #[test]
    fn pixel_limit_rejects_before_full_decode() {
        let mut config = PipelineConfig::default();
        config.max_decoded_pixels = 1_000_000;
        let file = upload(png_bytes(2000, 2000), "image/png", "big.png");

        let result = PhotoHandler::decode_bytes(&file, InputCategory::RasterDirect, &config);
        assert!(matches!(result, Err(PhotoError::ResourceLimit(_))));
    }

    #[tokio::test]
    async fn async_decode_discards_result_for_stale_token() {
        use std::sync::Arc;
        use std::sync::atomic::AtomicU64;

        let handler = PhotoHandler::new(PipelineConfig::default()).expect("handler init failed");
        let config = handler.config_snapshot().expect("config snapshot failed");
        let file = upload(png_bytes(64, 64), "image/png", "a.png");

        let current = Arc::new(AtomicU64::new(2));
        let stale = SessionToken::new(1, Arc::clone(&current));

        let result = handler
            .decode_upload(file, InputCategory::RasterDirect, &config, &stale)
            .await;

        assert!(matches!(result, Err(PhotoError::Cancelled(_))));
    }
}
