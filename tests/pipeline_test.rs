//! 端到端流水线测试：选规格 → 上传 → 裁剪 → 体积搜索编码。
//!
//! 用例围绕真实报名流程组织：常规照片、扩展名回退、RAW 拒绝、
//! 预算不可达、会话作废。依赖系统 pdfium 的 PDF 用例单独标记 ignore。

use bytes::Bytes;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgba};
use std::io::Cursor;

use exam_photo::{
    CropRectangle, DocumentKind, OutputFormat, PhotoError, PhotoService, TargetProfile,
    TargetSpec, UploadSource,
};

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// 平滑渐变图：接近真实人像的低频内容，预算内可压缩。
fn gradient_png(width: u32, height: u32) -> Vec<u8> {
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        Rgba([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            128,
            255,
        ])
    });

    let mut cursor = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut cursor, ImageFormat::Png)
        .expect("failed to encode test image");
    cursor.into_inner()
}

/// 高频噪声图：压缩率差，用于逼出预算不可达路径。
fn noisy_png(width: u32, height: u32) -> Vec<u8> {
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        let v = (x.wrapping_mul(31).wrapping_add(y.wrapping_mul(17)) ^ x.wrapping_mul(y)) % 256;
        Rgba([v as u8, (v * 7 % 256) as u8, (v * 13 % 256) as u8, 255])
    });

    let mut cursor = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut cursor, ImageFormat::Png)
        .expect("failed to encode test image");
    cursor.into_inner()
}

fn bytes_source(bytes: Vec<u8>, media_type: &str, file_name: &str) -> UploadSource {
    UploadSource::Bytes {
        bytes: Bytes::from(bytes),
        media_type: media_type.to_string(),
        file_name: file_name.to_string(),
    }
}

#[tokio::test]
async fn full_pipeline_meets_upsc_photo_budget() {
    init_logs();

    let service = PhotoService::new().expect("service init failed");
    service
        .select_target(TargetProfile::Upsc, DocumentKind::Photo)
        .expect("select target should succeed");

    let session = service
        .upload(bytes_source(gradient_png(2000, 2300), "image/png", "portrait.png"))
        .await
        .expect("upload should succeed");

    assert_eq!((session.bitmap().width(), session.bitmap().height()), (2000, 2300));

    let rect = CropRectangle { x: 0, y: 0, width: 2000, height: 2300 };
    let artifact = service.finalize(&session, rect).await.expect("finalize should succeed");

    assert!(!artifact.over_budget);
    assert!(artifact.byte_size as u64 <= 51_200);
    assert_eq!(artifact.byte_size, artifact.bytes.len());
    // 产物是 JPEG 且尺寸精确（解码复核）
    assert_eq!(&artifact.bytes[0..2], &[0xFF, 0xD8]);
    let decoded = image::load_from_memory(&artifact.bytes).expect("artifact should decode");
    assert_eq!((decoded.width(), decoded.height()), (200, 230));
}

#[tokio::test]
async fn extension_fallback_routes_png_without_media_type() {
    let service = PhotoService::new().expect("service init failed");
    service
        .select_target(TargetProfile::IbpsPo, DocumentKind::Photo)
        .expect("select target should succeed");

    let session = service
        .upload(bytes_source(gradient_png(640, 736), "", "scan.png"))
        .await
        .expect("extension fallback should reach the decoder");

    assert_eq!((session.bitmap().width(), session.bitmap().height()), (640, 736));
}

#[tokio::test]
async fn raw_camera_file_is_rejected_without_decoding() {
    let service = PhotoService::new().expect("service init failed");
    service
        .select_target(TargetProfile::Upsc, DocumentKind::Photo)
        .expect("select target should succeed");

    // 字节是完全合法的 PNG——若解码器被调用它会成功；
    // 拒绝只能来自分类结果，证明 RAW 从未进入解码流程。
    let result = service
        .upload(bytes_source(gradient_png(64, 64), "", "IMG_0001.cr2"))
        .await;

    match result {
        Err(PhotoError::UnsupportedFormat(message)) => {
            assert!(message.contains("RAW"), "message: {}", message);
        }
        other => panic!("expected UnsupportedFormat, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn unknown_format_rejection_lists_accepted_formats() {
    let service = PhotoService::new().expect("service init failed");
    service
        .select_target(TargetProfile::Upsc, DocumentKind::Photo)
        .expect("select target should succeed");

    let result = service
        .upload(bytes_source(b"not an image".to_vec(), "text/plain", "notes.txt"))
        .await;

    match result {
        Err(PhotoError::UnsupportedFormat(message)) => {
            assert!(message.contains("JPG"), "message: {}", message);
            assert!(message.contains("PDF"), "message: {}", message);
        }
        other => panic!("expected UnsupportedFormat, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn upload_before_selection_aborts_immediately() {
    let service = PhotoService::new().expect("service init failed");

    let result = service
        .upload(bytes_source(gradient_png(64, 64), "image/png", "a.png"))
        .await;

    assert!(matches!(result, Err(PhotoError::MissingTargetSpec)));
}

#[tokio::test]
async fn unattainable_budget_returns_best_effort_artifact() {
    init_logs();

    let service = PhotoService::new().expect("service init failed");
    // 1KB 预算对噪声内容不可达：走满搜索后以数据而非错误收尾
    service
        .select_spec(TargetSpec {
            width: 200,
            height: 230,
            max_size_bytes: 1024,
            format: OutputFormat::Jpeg,
            dpi: 110,
        })
        .expect("select spec should succeed");

    let session = service
        .upload(bytes_source(noisy_png(400, 460), "image/png", "noise.png"))
        .await
        .expect("upload should succeed");

    let rect = CropRectangle { x: 0, y: 0, width: 400, height: 460 };
    let artifact = service.finalize(&session, rect).await.expect("exhausted search still succeeds");

    assert!(artifact.over_budget);
    assert!(artifact.iterations <= 12);
    assert!(artifact.byte_size as u64 > 1024);
    assert!(artifact.quality_used > 0.30);
    let decoded = image::load_from_memory(&artifact.bytes).expect("artifact should decode");
    assert_eq!((decoded.width(), decoded.height()), (200, 230));
}

#[tokio::test]
async fn data_url_upload_flows_end_to_end() {
    use base64::Engine as _;

    let service = PhotoService::new().expect("service init failed");
    service
        .select_target(TargetProfile::SscCgl, DocumentKind::Signature)
        .expect("select target should succeed");

    let payload = base64::engine::general_purpose::STANDARD.encode(gradient_png(700, 300));
    let session = service
        .upload(UploadSource::DataUrl {
            data: format!("data:image/png;base64,{}", payload),
            file_name: "signature".to_string(),
        })
        .await
        .expect("data url upload should succeed");

    let rect = CropRectangle { x: 0, y: 0, width: 700, height: 300 };
    let artifact = service.finalize(&session, rect).await.expect("finalize should succeed");

    let decoded = image::load_from_memory(&artifact.bytes).expect("artifact should decode");
    assert_eq!((decoded.width(), decoded.height()), (140, 60));
}

#[tokio::test]
async fn stale_session_cannot_finalize_after_new_upload() {
    let service = PhotoService::new().expect("service init failed");
    service
        .select_target(TargetProfile::Upsc, DocumentKind::Photo)
        .expect("select target should succeed");

    let old = service
        .upload(bytes_source(gradient_png(400, 460), "image/png", "old.png"))
        .await
        .expect("first upload failed");
    let _new = service
        .upload(bytes_source(gradient_png(400, 460), "image/png", "new.png"))
        .await
        .expect("second upload failed");

    let rect = CropRectangle { x: 0, y: 0, width: 400, height: 460 };
    let result = service.finalize(&old, rect).await;

    match result {
        Err(err) => assert!(err.is_cancelled(), "expected cancelled, got {}", err),
        Ok(_) => panic!("stale session must not produce an artifact"),
    }
}

#[tokio::test]
#[ignore = "requires system pdfium library"]
async fn four_page_pdf_renders_first_page_only() {
    // 4 页 PDF，第 1 页 MediaBox 100x200 pt，其余页尺寸不同。
    // 固定放大系数 3.0：位图应为 300x600，与后续页无关。
    let pdf: &[u8] = b"%PDF-1.4\n\
1 0 obj<</Type/Catalog/Pages 2 0 R>>endobj\n\
2 0 obj<</Type/Pages/Kids[3 0 R 4 0 R 5 0 R 6 0 R]/Count 4>>endobj\n\
3 0 obj<</Type/Page/Parent 2 0 R/MediaBox[0 0 100 200]>>endobj\n\
4 0 obj<</Type/Page/Parent 2 0 R/MediaBox[0 0 300 300]>>endobj\n\
5 0 obj<</Type/Page/Parent 2 0 R/MediaBox[0 0 400 400]>>endobj\n\
6 0 obj<</Type/Page/Parent 2 0 R/MediaBox[0 0 500 500]>>endobj\n\
trailer<</Root 1 0 R>>\n%%EOF";

    let service = PhotoService::new().expect("service init failed");
    service
        .select_target(TargetProfile::Upsc, DocumentKind::Photo)
        .expect("select target should succeed");

    let session = service
        .upload(bytes_source(pdf.to_vec(), "application/pdf", "form.pdf"))
        .await
        .expect("pdf upload should rasterize page 1");

    assert_eq!((session.bitmap().width(), session.bitmap().height()), (300, 600));
}
