//! # 核心编排模块
//!
//! ## 设计思路
//!
//! `PhotoHandler` 只负责流程编排与配置管理，不持有会话状态。
//! 处理链路固定为：
//! 1. 读取配置快照
//! 2. 按来源加载原始字节
//! 3. 分类并按支持档位分发：直接解码 / 先栅格化 / 拒绝
//! 4. 裁剪重采样到目标精确尺寸
//! 5. 体积约束搜索编码
//!
//! ## 实现思路
//!
//! - 配置通过 `Arc<RwLock<PipelineConfig>>` 支持运行时动态调整。
//! - 单次请求内使用“同一配置快照”，避免处理中途配置漂移。
//! - 记录 decode/rasterize/crop/encode 阶段耗时，便于性能诊断。
//! - 各阶段方法分布在 `loader` / `decoder` / `rasterizer` / `crop` / `encoder`
//!   子模块中，本文件只保留编排与配置出入口。

use std::sync::{Arc, RwLock};
use std::time::Instant;

use crate::classifier::{self, InputCategory, SupportLevel};
use crate::config::PipelineConfig;
use crate::error::PhotoError;
use crate::session::SessionToken;
use crate::source::{DecodedBitmap, UploadedFile};

/// 照片处理器。
///
/// 封装配置状态，并编排各子模块实现完整流水线。
pub struct PhotoHandler {
    pub(crate) config: Arc<RwLock<PipelineConfig>>,
}

impl PhotoHandler {
    /// 根据初始配置创建处理器，配置经过范围校验。
    pub fn new(config: PipelineConfig) -> Result<Self, PhotoError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(RwLock::new(config)),
        })
    }

    /// 获取配置快照。
    ///
    /// 作用：保证单次请求链路使用一致参数。
    pub(crate) fn config_snapshot(&self) -> Result<PipelineConfig, PhotoError> {
        self.config
            .read()
            .map(|cfg| cfg.clone())
            .map_err(|_| PhotoError::ResourceLimit("配置读取锁已中毒".to_string()))
    }

    pub(crate) fn update_config<F>(&self, apply: F) -> Result<(), PhotoError>
    where
        F: FnOnce(&mut PipelineConfig),
    {
        let mut config = self
            .config
            .write()
            .map_err(|_| PhotoError::ResourceLimit("配置写入锁已中毒".to_string()))?;

        let mut candidate = config.clone();
        apply(&mut candidate);
        candidate.validate()?;
        *config = candidate;

        Ok(())
    }

    /// 分类上传字节并产出解码位图。
    ///
    /// 拒绝类在任何解码尝试之前返回错误；降级类先给出降级支持提示再尝试解码。
    pub(crate) async fn prepare_bitmap(
        &self,
        upload: UploadedFile,
        config: &PipelineConfig,
        token: &SessionToken,
    ) -> Result<DecodedBitmap, PhotoError> {
        let category = classifier::classify(&upload.declared_media_type, &upload.extension());
        log::info!(
            "🧭 输入分类 - 文件: {} 媒体类型: {:?} 类别: {}",
            upload.file_name,
            upload.declared_media_type,
            category.as_str()
        );

        match category.support_level() {
            SupportLevel::Reject => Err(Self::rejection_error(category)),
            SupportLevel::RasterizeRequired => {
                Self::validate_content_signature(&upload, category)?;

                let start = Instant::now();
                let bitmap = self.rasterize_document(upload.bytes.clone(), config, token).await?;
                log::info!(
                    "📄 PDF 渲染完成 - {}x{} 耗时 {}ms",
                    bitmap.width(),
                    bitmap.height(),
                    start.elapsed().as_millis()
                );

                Ok(bitmap)
            }
            SupportLevel::Full | SupportLevel::Degraded => {
                Self::validate_content_signature(&upload, category)?;

                if category.support_level() == SupportLevel::Degraded {
                    log::warn!(
                        "⚠️ {} 为降级支持格式，解码不保证成功，建议先转换为 JPG / PNG",
                        category.as_str()
                    );
                }

                let start = Instant::now();
                let bitmap = self.decode_upload(upload, category, config, token).await?;
                log::info!(
                    "✅ 解码完成 - {}x{} 耗时 {}ms",
                    bitmap.width(),
                    bitmap.height(),
                    start.elapsed().as_millis()
                );

                Ok(bitmap)
            }
        }
    }

    /// 拒绝类别对应的错误文案。
    fn rejection_error(category: InputCategory) -> PhotoError {
        match category {
            InputCategory::RawCameraFile => PhotoError::UnsupportedFormat(
                "RAW 相机底片（CR2 / NEF / ARW / DNG 等）无法在本工具中解码，\
                 请先在相机或修图软件中导出为 JPG 或 PNG"
                    .to_string(),
            ),
            _ => PhotoError::UnsupportedFormat(format!(
                "请使用以下格式之一：{}",
                classifier::accepted_formats_display()
            )),
        }
    }
}
