//! # 分页文档栅格化模块
//!
//! ## 设计思路
//!
//! PDF 输入无法直接裁剪，必须先渲染为位图。只渲染第 1 页：
//! 报名材料几乎总是单页，多页输入截断到第 1 页是明确记录的限制，不是缺陷。
//! 渲染放大系数固定为 3.0（按下游打印 DPI 选取），不开放配置。
//!
//! ## 实现思路
//!
//! - 通过系统 pdfium 动态库渲染；绑定失败与文档错误区分上报。
//! - 密码保护与文档损坏是两类错误，调用侧展示不同的补救文案。
//! - pdfium 不是 async-safe 的，整个渲染过程放入 `spawn_blocking`，
//!   恢复点检查会话令牌，失效则丢弃渲染结果。

use bytes::Bytes;
use pdfium_render::prelude::*;

use crate::config::PipelineConfig;
use crate::error::PhotoError;
use crate::handler::PhotoHandler;
use crate::session::SessionToken;
use crate::source::DecodedBitmap;

/// 页面点尺寸 → 渲染像素的固定放大系数。
const RASTERIZE_SCALE: f32 = 3.0;

impl PhotoHandler {
    /// 渲染 PDF 第 1 页为位图（挂起点：阻塞线程池执行，恢复时校验令牌）。
    pub(crate) async fn rasterize_document(
        &self,
        bytes: Bytes,
        config: &PipelineConfig,
        token: &SessionToken,
    ) -> Result<DecodedBitmap, PhotoError> {
        let config = config.clone();
        let bitmap = tokio::task::spawn_blocking(move || Self::rasterize_first_page(&bytes, &config))
            .await
            .map_err(|e| PhotoError::ResourceLimit(format!("渲染任务异常结束：{}", e)))??;

        token.ensure_live("渲染")?;

        Ok(bitmap)
    }

    fn rasterize_first_page(
        bytes: &[u8],
        config: &PipelineConfig,
    ) -> Result<DecodedBitmap, PhotoError> {
        let pdfium = Pdfium::new(
            Pdfium::bind_to_system_library()
                .map_err(|e| PhotoError::RendererUnavailable(e.to_string()))?,
        );

        let document = pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(Self::map_document_open_error)?;

        let pages = document.pages();
        let page_count = pages.len();
        if page_count == 0 {
            return Err(PhotoError::CorruptDocument);
        }
        if page_count > 1 {
            log::warn!("📄 PDF 共 {} 页，仅渲染第 1 页（明确记录的限制）", page_count);
        }

        let page = pages.get(0).map_err(|_| PhotoError::CorruptDocument)?;

        let (target_width, target_height) =
            Self::scaled_page_dimensions(page.width().value, page.height().value);
        if target_width <= 0 || target_height <= 0 {
            return Err(PhotoError::CorruptDocument);
        }
        Self::validate_pixel_limits(config, target_width as u32, target_height as u32)?;

        let rendered = page
            .render_with_config(
                &PdfRenderConfig::new()
                    .set_target_width(target_width)
                    .set_target_height(target_height),
            )
            .map_err(|_| PhotoError::CorruptDocument)?;

        Ok(DecodedBitmap::new(rendered.as_image()))
    }

    /// 页面点尺寸按固定系数换算为渲染像素尺寸。
    pub(crate) fn scaled_page_dimensions(width_pts: f32, height_pts: f32) -> (i32, i32) {
        (
            (width_pts * RASTERIZE_SCALE) as i32,
            (height_pts * RASTERIZE_SCALE) as i32,
        )
    }

    /// 区分“密码保护”与“损坏”两类打开失败。
    fn map_document_open_error(error: PdfiumError) -> PhotoError {
        match error {
            PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError) => {
                PhotoError::PasswordProtectedDocument
            }
            _ => PhotoError::CorruptDocument,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_dimensions_use_fixed_scale() {
        // A4：595.2 x 841.8 pt
        let (width, height) = PhotoHandler::scaled_page_dimensions(595.2, 841.8);
        assert_eq!((width, height), (1785, 2525));
    }

    #[test]
    fn degenerate_page_dimensions_stay_non_positive() {
        let (width, height) = PhotoHandler::scaled_page_dimensions(0.0, 0.0);
        assert_eq!((width, height), (0, 0));
    }

    #[test]
    fn password_error_maps_to_password_protected() {
        let err = PhotoHandler::map_document_open_error(PdfiumError::PdfiumLibraryInternalError(
            PdfiumInternalError::PasswordError,
        ));
        assert!(matches!(err, PhotoError::PasswordProtectedDocument));
    }

    #[test]
    fn other_open_errors_map_to_corrupt_document() {
        let err = PhotoHandler::map_document_open_error(PdfiumError::PdfiumLibraryInternalError(
            PdfiumInternalError::FormatError,
        ));
        assert!(matches!(err, PhotoError::CorruptDocument));
    }

    #[tokio::test]
    #[ignore = "requires system pdfium library"]
    async fn renders_first_page_only_at_fixed_scale() {
        use std::sync::Arc;
        use std::sync::atomic::AtomicU64;

        // 最小合法单页 PDF（空白页，MediaBox 200x100 pt）
        let pdf: &[u8] = b"%PDF-1.4\n\
1 0 obj<</Type/Catalog/Pages 2 0 R>>endobj\n\
2 0 obj<</Type/Pages/Kids[3 0 R]/Count 1>>endobj\n\
3 0 obj<</Type/Page/Parent 2 0 R/MediaBox[0 0 200 100]>>endobj\n\
trailer<</Root 1 0 R>>\n%%EOF";

        let handler = PhotoHandler::new(PipelineConfig::default()).expect("handler init failed");
        let config = handler.config_snapshot().expect("config snapshot failed");
        let current = Arc::new(AtomicU64::new(1));
        let token = SessionToken::new(1, current);

        let bitmap = handler
            .rasterize_document(Bytes::from_static(pdf), &config, &token)
            .await
            .expect("blank pdf should render");

        assert_eq!((bitmap.width(), bitmap.height()), (600, 300));
    }
}
