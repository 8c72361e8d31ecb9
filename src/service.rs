//! # 服务层（可注入状态）
//!
//! ## 设计思路
//!
//! 使用 `PhotoService` 承载流水线的全部可变状态，替代全局单例：
//! 1. 生命周期清晰，由调用侧统一管理
//! 2. 测试可创建独立实例，减少共享状态副作用
//! 3. 会话代数与规格选择集中一处，取消语义一目了然
//!
//! 同一时刻只有一个活动会话：`upload` 开启新会话时代数自增，
//! 旧会话的挂起操作在各自恢复点发现令牌失效后丢弃结果。
//! 解码位图由返回的 `PhotoSession` 值独占，会话值被丢弃即释放。
//!
//! ## 实现思路
//!
//! 对外暴露少量稳定 API：
//! - `select_target` / `select_spec`：规格选择（注册表查询或外部注入）
//! - `upload`：加载 → 分类 → 解码/渲染，产出会话
//! - `finalize`：裁剪 → 体积搜索编码，产出产物
//! - `reset`：显式作废当前会话（保留已选规格）
//! - 平滑档位与编码搜索参数的运行时读写

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::config::{PipelineConfig, SmoothingQuality};
use crate::error::PhotoError;
use crate::handler::PhotoHandler;
use crate::session::{PhotoSession, SessionToken};
use crate::source::{CropRectangle, EncodedArtifact, UploadSource};
use crate::specs::{self, DocumentKind, TargetProfile, TargetSpec};

/// 体积搜索参数快照（运行时读写用）。
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// 搜索的初始质量。
    pub initial_quality: f32,
    /// 每次迭代的质量递减步长。
    pub quality_step: f32,
    /// 质量下限。
    pub min_quality: f32,
    /// 最大编码次数。
    pub max_iterations: u32,
}

/// 照片处理服务状态。
///
/// 内部持有 `PhotoHandler` 与会话代数计数器。
pub struct PhotoService {
    handler: PhotoHandler,
    generation: Arc<AtomicU64>,
    selected: RwLock<Option<TargetSpec>>,
}

impl PhotoService {
    /// 使用默认配置创建服务状态。
    ///
    /// # 示例
    /// ```rust
    /// use exam_photo::PhotoService;
    ///
    /// let service = PhotoService::new()?;
    /// # Ok::<(), exam_photo::PhotoError>(())
    /// ```
    pub fn new() -> Result<Self, PhotoError> {
        Self::with_config(PipelineConfig::default())
    }

    /// 使用自定义配置创建服务状态，主要用于测试或按场景注入不同策略。
    pub fn with_config(config: PipelineConfig) -> Result<Self, PhotoError> {
        let handler = PhotoHandler::new(config)?;
        Ok(Self {
            handler,
            generation: Arc::new(AtomicU64::new(0)),
            selected: RwLock::new(None),
        })
    }

    /// 按（报考类别，材料类型）从注册表选择目标规格。
    ///
    /// # 示例
    /// ```rust
    /// use exam_photo::{DocumentKind, PhotoService, TargetProfile};
    ///
    /// let service = PhotoService::new()?;
    /// let spec = service.select_target(TargetProfile::Upsc, DocumentKind::Photo)?;
    /// assert_eq!((spec.width, spec.height), (200, 230));
    /// # Ok::<(), exam_photo::PhotoError>(())
    /// ```
    pub fn select_target(
        &self,
        profile: TargetProfile,
        kind: DocumentKind,
    ) -> Result<TargetSpec, PhotoError> {
        let spec = specs::lookup(profile, kind).ok_or(PhotoError::MissingTargetSpec)?;
        self.select_spec(spec)?;

        log::info!(
            "🎯 已选择目标规格 - {}/{} {}x{} 预算 {}KB",
            profile.as_str(),
            kind.as_str(),
            spec.width,
            spec.height,
            spec.max_size_bytes / 1024
        );

        Ok(spec)
    }

    /// 注入外部解析好的目标规格（核心从不自行读表的正规入口）。
    pub fn select_spec(&self, spec: TargetSpec) -> Result<(), PhotoError> {
        let mut selected = self
            .selected
            .write()
            .map_err(|_| PhotoError::ResourceLimit("规格选择锁已中毒".to_string()))?;
        *selected = Some(spec);
        Ok(())
    }

    /// 当前选择的目标规格。
    pub fn selected_spec(&self) -> Result<Option<TargetSpec>, PhotoError> {
        self.selected
            .read()
            .map(|spec| *spec)
            .map_err(|_| PhotoError::ResourceLimit("规格选择锁已中毒".to_string()))
    }

    /// 处理一次上传：加载 → 分类 → 解码/渲染，产出持有位图的会话。
    ///
    /// 未选择规格时在任何解码工作开始前返回 `MissingTargetSpec`。
    /// 调用本方法即作废上一个会话：其挂起操作会在恢复点自行丢弃结果。
    pub async fn upload(&self, source: UploadSource) -> Result<PhotoSession, PhotoError> {
        let spec = self.selected_spec()?.ok_or(PhotoError::MissingTargetSpec)?;

        let token = self.begin_session();
        log::info!("🚀 会话 #{} 开始", token.generation());

        let config = self.handler.config_snapshot()?;
        let total_start = Instant::now();

        let load_start = Instant::now();
        let upload = self.handler.load_upload(source, &config).await?;
        token.ensure_live("加载")?;
        let load_elapsed = load_start.elapsed();

        log::info!(
            "🧾 文件就绪 - 名称: {} 体积: {:.2}MB 声明类型: {:?}",
            upload.file_name,
            upload.byte_size() as f64 / 1024.0 / 1024.0,
            upload.declared_media_type
        );

        let prepare_start = Instant::now();
        let bitmap = self.handler.prepare_bitmap(upload, &config, &token).await?;
        let prepare_elapsed = prepare_start.elapsed();

        log::info!(
            "✅ 上传处理完成 - load={}ms prepare={}ms total={}ms 位图 {}x{}",
            load_elapsed.as_millis(),
            prepare_elapsed.as_millis(),
            total_start.elapsed().as_millis(),
            bitmap.width(),
            bitmap.height()
        );

        Ok(PhotoSession::new(token, spec, bitmap))
    }

    /// 定稿：裁剪区域重采样到精确目标尺寸并做体积约束编码。
    ///
    /// 裁剪发生后必定产出产物；预算不可达以 `over_budget=true` 传达。
    pub async fn finalize(
        &self,
        session: &PhotoSession,
        rect: CropRectangle,
    ) -> Result<EncodedArtifact, PhotoError> {
        session.token.ensure_live("定稿")?;

        let config = self.handler.config_snapshot()?;
        let total_start = Instant::now();

        let crop_start = Instant::now();
        let cropped = PhotoHandler::crop_to_spec(session.bitmap(), rect, session.spec(), &config)?;
        let crop_elapsed = crop_start.elapsed();

        let encode_start = Instant::now();
        let artifact = self
            .handler
            .encode_within_budget(&cropped, session.spec(), &config, session.token())
            .await?;
        let encode_elapsed = encode_start.elapsed();

        log::info!(
            "✅ 定稿完成 - crop={}ms encode={}ms total={}ms size={:.1}KB quality={:.2} 迭代 {} 次",
            crop_elapsed.as_millis(),
            encode_elapsed.as_millis(),
            total_start.elapsed().as_millis(),
            artifact.byte_size as f64 / 1024.0,
            artifact.quality_used,
            artifact.iterations
        );

        if artifact.over_budget {
            log::warn!(
                "⚠️ 产物超出预算 {:.1}KB（上限 {:.1}KB），建议收紧裁剪或更换素材",
                artifact.byte_size as f64 / 1024.0,
                session.spec().max_size_bytes as f64 / 1024.0
            );
        }

        Ok(artifact)
    }

    /// 显式作废当前会话，回到未上传状态（保留已选规格）。
    pub fn reset(&self) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        log::info!("🔄 重置 - 旧会话已作废，当前代数 #{}", generation);
    }

    fn begin_session(&self) -> SessionToken {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        SessionToken::new(generation, Arc::clone(&self.generation))
    }

    /// 设置裁剪重采样平滑档位。
    ///
    /// # 示例
    /// ```rust
    /// use exam_photo::PhotoService;
    ///
    /// let service = PhotoService::new()?;
    /// service.set_smoothing_quality("balanced")?;
    /// assert_eq!(service.get_smoothing_quality()?, "balanced");
    /// # Ok::<(), exam_photo::PhotoError>(())
    /// ```
    pub fn set_smoothing_quality(&self, level: &str) -> Result<(), PhotoError> {
        let smoothing = SmoothingQuality::from_str(level)?;
        self.handler.update_config(|cfg| cfg.smoothing = smoothing)?;

        log::info!("⚙️ 已切换平滑档位：{}", smoothing.as_str());
        Ok(())
    }

    /// 获取当前平滑档位（字符串）。
    pub fn get_smoothing_quality(&self) -> Result<String, PhotoError> {
        let config = self.handler.config_snapshot()?;
        Ok(config.smoothing.as_str().to_string())
    }

    /// 设置体积搜索参数，越界取值被整体拒绝（不产生半套配置）。
    pub fn set_encoder_config(&self, encoder: EncoderConfig) -> Result<(), PhotoError> {
        self.handler.update_config(|cfg| {
            cfg.initial_quality = encoder.initial_quality;
            cfg.quality_step = encoder.quality_step;
            cfg.min_quality = encoder.min_quality;
            cfg.max_iterations = encoder.max_iterations;
        })
    }

    /// 获取体积搜索参数快照。
    pub fn get_encoder_config(&self) -> Result<EncoderConfig, PhotoError> {
        let config = self.handler.config_snapshot()?;
        Ok(EncoderConfig {
            initial_quality: config.initial_quality,
            quality_step: config.quality_step,
            min_quality: config.min_quality,
            max_iterations: config.max_iterations,
        })
    }
}
