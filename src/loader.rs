//! # 加载与校验模块
//!
//! ## 设计思路
//!
//! 统一处理不同来源（内存字节 / Data URL / 本地文件）的原始字节加载，
//! 并在“尽可能早”的阶段执行输入校验，尽快失败，减少不必要的内存与 CPU 消耗。
//!
//! ## 实现思路
//!
//! - 内存字节：仅做体积限制。
//! - Data URL：解析头部媒体类型 + 解码前体积估算 + 解码后体积限制。
//! - 文件：metadata 体积预检 + `spawn_blocking` 读取（文件读取是挂起点）。
//! - 分类之后按类别做文件签名（magic bytes）校验：栅格类必须嗅探为图片，
//!   PDF 必须嗅探为 PDF；SVG 是文本格式，豁免签名检查。

use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use std::path::PathBuf;

use crate::classifier::InputCategory;
use crate::config::PipelineConfig;
use crate::error::PhotoError;
use crate::handler::PhotoHandler;
use crate::source::{UploadSource, UploadedFile};

impl PhotoHandler {
    /// 按来源加载上传字节。
    pub(crate) async fn load_upload(
        &self,
        source: UploadSource,
        config: &PipelineConfig,
    ) -> Result<UploadedFile, PhotoError> {
        match source {
            UploadSource::Bytes { bytes, media_type, file_name } => {
                Self::check_file_size(bytes.len() as u64, config)?;
                Ok(UploadedFile {
                    bytes,
                    declared_media_type: media_type.trim().to_ascii_lowercase(),
                    file_name,
                })
            }
            UploadSource::DataUrl { data, file_name } => {
                Self::load_from_data_url(&data, file_name, config)
            }
            UploadSource::FilePath(path) => Self::load_from_file(path, config).await,
        }
    }

    /// 从 Data URL 加载：`data:<mime>;base64,<payload>`。
    fn load_from_data_url(
        data: &str,
        file_name: String,
        config: &PipelineConfig,
    ) -> Result<UploadedFile, PhotoError> {
        log::info!("📝 开始解析 Data URL 输入 - 文件: {}", file_name);

        let normalized = data.trim();
        let rest = normalized
            .strip_prefix("data:")
            .ok_or_else(|| PhotoError::InvalidInput("不是 Data URL（缺少 data: 前缀）".to_string()))?;

        let (header, payload) = rest
            .split_once(";base64,")
            .ok_or_else(|| PhotoError::InvalidInput("Data URL 缺少 base64 标记".to_string()))?;

        // 解码前按 Base64 长度估算上界，避免先解码后拒绝的内存峰值
        let estimated = Self::estimate_base64_decoded_len(payload)?;
        Self::check_file_size(estimated, config)?;

        let bytes = general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| PhotoError::InvalidInput(format!("Base64 解码失败：{}", e)))?;
        Self::check_file_size(bytes.len() as u64, config)?;

        Ok(UploadedFile {
            bytes: Bytes::from(bytes),
            declared_media_type: header.trim().to_ascii_lowercase(),
            file_name,
        })
    }

    /// 从本地路径加载。文件读取是挂起点，放入阻塞线程池执行。
    async fn load_from_file(
        path: PathBuf,
        config: &PipelineConfig,
    ) -> Result<UploadedFile, PhotoError> {
        log::info!("📁 开始读取本地文件 - 路径: {}", path.display());

        if !path.exists() {
            return Err(PhotoError::FileSystem(format!("文件不存在：{}", path.display())));
        }

        let metadata = std::fs::metadata(&path)
            .map_err(|e| PhotoError::FileSystem(format!("无法读取文件信息：{}", e)))?;
        Self::check_file_size(metadata.len(), config)?;

        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("")
            .to_string();

        let read_path = path.clone();
        let bytes = tokio::task::spawn_blocking(move || std::fs::read(&read_path))
            .await
            .map_err(|e| PhotoError::ResourceLimit(format!("文件读取任务异常结束：{}", e)))?
            .map_err(|e| PhotoError::FileSystem(format!("无法读取文件：{}", e)))?;
        Self::check_file_size(bytes.len() as u64, config)?;

        Ok(UploadedFile {
            bytes: Bytes::from(bytes),
            // 本地文件没有声明媒体类型，分类按扩展名回退
            declared_media_type: String::new(),
            file_name,
        })
    }

    fn check_file_size(size: u64, config: &PipelineConfig) -> Result<(), PhotoError> {
        if size > config.max_file_size {
            return Err(PhotoError::ResourceLimit(format!(
                "文件过大：{:.2} MB（限制：{:.2} MB）",
                size as f64 / 1024.0 / 1024.0,
                config.max_file_size as f64 / 1024.0 / 1024.0
            )));
        }
        Ok(())
    }

    /// 估算 Base64 解码后体积上界。
    fn estimate_base64_decoded_len(payload: &str) -> Result<u64, PhotoError> {
        let len = payload.trim().len() as u64;
        let groups = len
            .checked_add(3)
            .ok_or_else(|| PhotoError::ResourceLimit("Base64 输入长度溢出".to_string()))?
            / 4;

        groups
            .checked_mul(3)
            .ok_or_else(|| PhotoError::ResourceLimit("Base64 解码体积估算溢出".to_string()))
    }

    /// 分类后的文件签名（magic bytes）校验。
    ///
    /// 声明信息可以伪造，字节签名不会：栅格/HEIC/TIFF 必须嗅探为图片，
    /// PDF 必须嗅探为 PDF。SVG 是文本格式，无魔数可嗅探，交由解析器把关。
    pub(crate) fn validate_content_signature(
        upload: &UploadedFile,
        category: InputCategory,
    ) -> Result<(), PhotoError> {
        if upload.bytes.is_empty() {
            return Err(PhotoError::InvalidInput("文件内容为空".to_string()));
        }

        match category {
            InputCategory::PageDocument => {
                let is_pdf = infer::get(&upload.bytes)
                    .map(|kind| kind.mime_type() == "application/pdf")
                    .unwrap_or(false);
                if !is_pdf {
                    return Err(PhotoError::CorruptDocument);
                }
                Ok(())
            }
            InputCategory::RasterDirect if Self::looks_like_svg(upload) => Ok(()),
            InputCategory::RasterDirect
            | InputCategory::HighEfficiencyPhoto
            | InputCategory::TiffPhoto => {
                let kind = infer::get(&upload.bytes).ok_or_else(|| PhotoError::Decode {
                    category,
                    message: "无法识别文件签名".to_string(),
                })?;

                if kind.matcher_type() != infer::MatcherType::Image {
                    return Err(PhotoError::Decode {
                        category,
                        message: format!("文件签名不是图片类型：{}", kind.mime_type()),
                    });
                }
                Ok(())
            }
            // 拒绝类在分类分发处即返回，不会到达签名校验
            InputCategory::RawCameraFile | InputCategory::Unsupported => Ok(()),
        }
    }

    pub(crate) fn looks_like_svg(upload: &UploadedFile) -> bool {
        upload.extension() == "svg" || upload.declared_media_type.contains("svg")
    }
}
