//! # 数据源与中间模型
//!
//! ## 设计思路
//!
//! 将“外部输入类型”和“流水线中间结果”解耦：
//! - `UploadSource` 表示外部来源语义（内存字节 / Data URL / 本地文件）
//! - `UploadedFile` 表示已加载但未解码的字节及其声明信息
//! - `DecodedBitmap` 表示解码后的位图，由当前会话独占
//! - `CroppedBitmap` 表示已重采样到目标精确尺寸的 RGBA 数据
//! - `EncodedArtifact` 表示一次流水线运行的终点产物

use std::path::PathBuf;

use bytes::Bytes;
use image::DynamicImage;
use serde::Serialize;

/// 上传输入来源。
pub enum UploadSource {
    /// 内存字节（文件选择器 / 拖放面板读出的内容）。
    Bytes {
        /// 原始文件字节。
        bytes: Bytes,
        /// 声明的媒体类型，可为空字符串。
        media_type: String,
        /// 原始文件名（用于扩展名回退）。
        file_name: String,
    },
    /// Data URL（`data:<mime>;base64,...`），媒体类型取自 URL 头部。
    DataUrl {
        /// 完整 Data URL 字符串。
        data: String,
        /// 原始文件名。
        file_name: String,
    },
    /// 本地文件路径，媒体类型留空，按扩展名回退分类。
    FilePath(PathBuf),
}

/// 加载阶段输出：原始字节与声明信息。
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// 原始文件字节。
    pub bytes: Bytes,
    /// 声明的媒体类型（小写），可为空。
    pub declared_media_type: String,
    /// 原始文件名。
    pub file_name: String,
}

impl UploadedFile {
    /// 文件名末段扩展名（小写）；无扩展名时返回空串。
    pub fn extension(&self) -> String {
        std::path::Path::new(&self.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default()
    }

    /// 文件字节体积。
    pub fn byte_size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// 解码阶段输出：当前会话独占的位图。
///
/// 新的上传会构造新的会话并丢弃旧位图，位图从不跨会话存活。
#[derive(Debug, Clone)]
pub struct DecodedBitmap {
    pub(crate) image: DynamicImage,
}

impl DecodedBitmap {
    pub(crate) fn new(image: DynamicImage) -> Self {
        Self { image }
    }

    /// 位图像素宽度。
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// 位图像素高度。
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// 只读访问解码结果，供交互式裁剪面预览。
    pub fn as_image(&self) -> &DynamicImage {
        &self.image
    }
}

/// 用户在裁剪面上选定的区域（位图坐标系）。
///
/// 区域宽高比由裁剪面锁定为目标规格比例，本库只做小容差断言。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRectangle {
    /// 区域左上角 x。
    pub x: u32,
    /// 区域左上角 y。
    pub y: u32,
    /// 区域宽度。
    pub width: u32,
    /// 区域高度。
    pub height: u32,
}

impl CropRectangle {
    /// 区域宽高比。高度为 0 时返回 NaN，由校验逻辑拒绝。
    pub fn aspect_ratio(&self) -> f64 {
        f64::from(self.width) / f64::from(self.height)
    }
}

/// 裁剪阶段输出：尺寸精确等于目标规格的 RGBA 数据。
#[derive(Debug, Clone)]
pub struct CroppedBitmap {
    pub(crate) image: image::RgbaImage,
}

impl CroppedBitmap {
    /// 输出像素宽度（等于目标规格宽度）。
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// 输出像素高度（等于目标规格高度）。
    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// 一次流水线运行的终点产物。
///
/// 裁剪发生后必定产出该值：预算未达标通过 `over_budget` 传达，不抛错误。
#[derive(Debug, Clone)]
pub struct EncodedArtifact {
    /// 编码后的 JPEG 字节。
    pub bytes: Bytes,
    /// 编码后字节体积。
    pub byte_size: usize,
    /// 实际使用的质量参数（0.0 ~ 1.0]。
    pub quality_used: f32,
    /// 体积是否仍超出预算（搜索已穷尽）。
    pub over_budget: bool,
    /// 体积搜索执行的编码次数。
    pub iterations: u32,
}

impl EncodedArtifact {
    /// 产物元数据快照（不含字节），供保存/下载协作方展示。
    pub fn metadata(&self) -> ArtifactMetadata {
        ArtifactMetadata {
            byte_size: self.byte_size,
            quality_used: self.quality_used,
            over_budget: self.over_budget,
            iterations: self.iterations,
        }
    }
}

/// 产物元数据（可序列化给前端）。
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ArtifactMetadata {
    /// 编码后字节体积。
    pub byte_size: usize,
    /// 实际使用的质量参数。
    pub quality_used: f32,
    /// 体积是否仍超出预算。
    pub over_budget: bool,
    /// 体积搜索执行的编码次数。
    pub iterations: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_named(name: &str) -> UploadedFile {
        UploadedFile {
            bytes: Bytes::from_static(b"x"),
            declared_media_type: String::new(),
            file_name: name.to_string(),
        }
    }

    #[test]
    fn extension_is_lowercased_last_segment() {
        assert_eq!(file_named("photo.PNG").extension(), "png");
        assert_eq!(file_named("scan.page1.Tiff").extension(), "tiff");
    }

    #[test]
    fn missing_extension_is_empty() {
        assert_eq!(file_named("photo").extension(), "");
        assert_eq!(file_named("").extension(), "");
    }

    #[test]
    fn crop_rectangle_aspect_ratio() {
        let rect = CropRectangle { x: 0, y: 0, width: 200, height: 230 };
        assert!((rect.aspect_ratio() - 200.0 / 230.0).abs() < 1e-9);
    }

    #[test]
    fn artifact_metadata_mirrors_artifact_fields() {
        let artifact = EncodedArtifact {
            bytes: Bytes::from_static(&[0xFF, 0xD8]),
            byte_size: 2,
            quality_used: 0.78,
            over_budget: true,
            iterations: 3,
        };

        let metadata = artifact.metadata();
        assert_eq!(metadata.byte_size, 2);
        assert!((metadata.quality_used - 0.78).abs() < f32::EPSILON);
        assert!(metadata.over_budget);
        assert_eq!(metadata.iterations, 3);
    }
}
