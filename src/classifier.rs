//! # 输入格式分类模块
//!
//! ## 设计思路
//!
//! 上传文件只携带“声明的媒体类型”和“文件名扩展名”两条线索。
//! 分类器是这两条线索的纯函数：先按媒体类型匹配，媒体类型缺失或不认识时回退扩展名。
//! 分类结果是封闭的 `InputCategory` 枚举，每个类别对应一个明确的支持档位，
//! 由编译器保证分发表穷尽，不依赖兜底分支。
//!
//! ## 实现思路
//!
//! - 类别表照搬线上表单工具实际接受的格式清单（含 HEIC 序列、三种 ICO 写法、
//!   八种 RAW 底片 MIME）。
//! - RAW 底片仅凭分类即可拒绝，绝不进入解码流程。
//! - `accepted_formats` 提供拒绝提示中展示的完整可用格式清单。

use once_cell::sync::Lazy;
use serde::Serialize;

/// 可直接解码的栅格类媒体类型。
const RASTER_MEDIA_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/webp",
    "image/bmp",
    "image/gif",
    "image/svg+xml",
    "image/ico",
    "image/x-icon",
    "image/vnd.microsoft.icon",
];

const RASTER_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "bmp", "gif", "svg", "ico"];

/// 高效率照片格式（iPhone 拍摄常见），含序列变体。
const HEIC_MEDIA_TYPES: &[&str] = &[
    "image/heic",
    "image/heif",
    "image/heic-sequence",
    "image/heif-sequence",
];

const HEIC_EXTENSIONS: &[&str] = &["heic", "heif"];

const TIFF_MEDIA_TYPES: &[&str] = &["image/tiff", "image/tif"];

const TIFF_EXTENSIONS: &[&str] = &["tiff", "tif"];

/// RAW 相机底片。浏览器与本库都不存在可用解码器，分类即拒绝。
const RAW_MEDIA_TYPES: &[&str] = &[
    "image/x-canon-cr2",
    "image/x-nikon-nef",
    "image/x-sony-arw",
    "image/x-adobe-dng",
    "image/x-fuji-raf",
    "image/x-olympus-orf",
    "image/x-panasonic-rw2",
    "image/x-samsung-srw",
];

const RAW_EXTENSIONS: &[&str] = &["cr2", "nef", "arw", "dng", "raf", "orf", "rw2", "srw"];

const PDF_MEDIA_TYPE: &str = "application/pdf";
const PDF_EXTENSION: &str = "pdf";

/// 拒绝提示中展示的可用格式清单（可解码格式 + PDF）。
const ACCEPTED_FORMATS: &[&str] = &[
    "JPG", "JPEG", "PNG", "WEBP", "BMP", "GIF", "SVG", "ICO", "PDF", "HEIC", "HEIF", "TIFF",
    "TIF",
];

static ACCEPTED_FORMATS_DISPLAY: Lazy<String> = Lazy::new(|| ACCEPTED_FORMATS.join(", "));

/// 输入类别（封闭枚举）。
///
/// 决定上传字节走哪条处理路径：直接解码、先栅格化、或直接拒绝。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum InputCategory {
    /// 常见栅格格式（JPG/PNG/WEBP/BMP/GIF/SVG/ICO），完整解码支持。
    RasterDirect,
    /// 分页文档（PDF），需要先渲染第 1 页为位图。
    PageDocument,
    /// HEIC/HEIF 高效率照片，尝试解码但不保证（降级支持）。
    HighEfficiencyPhoto,
    /// TIFF 照片，尝试解码但不保证（降级支持）。
    TiffPhoto,
    /// RAW 相机底片，从不解码，分类即拒绝。
    RawCameraFile,
    /// 其余一切格式，拒绝并展示可用格式清单。
    Unsupported,
}

/// 类别对应的支持档位。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupportLevel {
    /// 完整解码支持。
    Full,
    /// 尝试解码，失败时给出降级支持提示而非通用解码错误。
    Degraded,
    /// 需要先渲染为位图。
    RasterizeRequired,
    /// 仅凭分类即拒绝。
    Reject,
}

impl InputCategory {
    /// 类别 → 支持档位的分发表。
    ///
    /// 穷尽匹配，新增类别时由编译器强制补齐档位。
    pub fn support_level(self) -> SupportLevel {
        match self {
            InputCategory::RasterDirect => SupportLevel::Full,
            InputCategory::PageDocument => SupportLevel::RasterizeRequired,
            InputCategory::HighEfficiencyPhoto => SupportLevel::Degraded,
            InputCategory::TiffPhoto => SupportLevel::Degraded,
            InputCategory::RawCameraFile => SupportLevel::Reject,
            InputCategory::Unsupported => SupportLevel::Reject,
        }
    }

    /// 日志与提示文案中使用的稳定类别名。
    pub fn as_str(self) -> &'static str {
        match self {
            InputCategory::RasterDirect => "raster",
            InputCategory::PageDocument => "pdf",
            InputCategory::HighEfficiencyPhoto => "heic",
            InputCategory::TiffPhoto => "tiff",
            InputCategory::RawCameraFile => "raw",
            InputCategory::Unsupported => "unsupported",
        }
    }
}

/// 按（声明媒体类型，扩展名）解析输入类别。
///
/// 纯函数：相同输入永远得到相同类别，无任何副作用。
/// 解析顺序：先按媒体类型匹配；媒体类型为空或不认识时回退扩展名。
///
/// # 示例
/// ```rust
/// use exam_photo::{classify, InputCategory};
///
/// assert_eq!(classify("image/png", "png"), InputCategory::RasterDirect);
/// // 媒体类型缺失时按扩展名回退
/// assert_eq!(classify("", "cr2"), InputCategory::RawCameraFile);
/// ```
pub fn classify(declared_media_type: &str, extension: &str) -> InputCategory {
    let media_type = declared_media_type.trim().to_ascii_lowercase();
    let extension = extension.trim().to_ascii_lowercase();

    if !media_type.is_empty() {
        if let Some(category) = classify_by_media_type(&media_type) {
            return category;
        }
    }

    classify_by_extension(&extension)
}

fn classify_by_media_type(media_type: &str) -> Option<InputCategory> {
    if media_type == PDF_MEDIA_TYPE {
        return Some(InputCategory::PageDocument);
    }
    if HEIC_MEDIA_TYPES.contains(&media_type) {
        return Some(InputCategory::HighEfficiencyPhoto);
    }
    if TIFF_MEDIA_TYPES.contains(&media_type) {
        return Some(InputCategory::TiffPhoto);
    }
    if RAW_MEDIA_TYPES.contains(&media_type) {
        return Some(InputCategory::RawCameraFile);
    }
    if RASTER_MEDIA_TYPES.contains(&media_type) {
        return Some(InputCategory::RasterDirect);
    }

    None
}

fn classify_by_extension(extension: &str) -> InputCategory {
    if extension == PDF_EXTENSION {
        return InputCategory::PageDocument;
    }
    if HEIC_EXTENSIONS.contains(&extension) {
        return InputCategory::HighEfficiencyPhoto;
    }
    if TIFF_EXTENSIONS.contains(&extension) {
        return InputCategory::TiffPhoto;
    }
    if RAW_EXTENSIONS.contains(&extension) {
        return InputCategory::RawCameraFile;
    }
    if RASTER_EXTENSIONS.contains(&extension) {
        return InputCategory::RasterDirect;
    }

    InputCategory::Unsupported
}

/// 可用格式清单（用于拒绝提示与前端展示）。
pub fn accepted_formats() -> &'static [&'static str] {
    ACCEPTED_FORMATS
}

/// 逗号拼接后的可用格式清单。
pub(crate) fn accepted_formats_display() -> &'static str {
    &ACCEPTED_FORMATS_DISPLAY
}
