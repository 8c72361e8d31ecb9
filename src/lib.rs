//! # 报名证件照处理库 — 库入口
//!
//! 把任意图片类材料（照片、扫描件、PDF、HEIC……）归一化为报名系统要求的
//! 精确像素尺寸与字节体积上限的 JPEG 证件照。
//!
//! ## 架构总览
//!
//! ```text
//! 调用侧（文件选择/拖放面板、交互式裁剪面、保存下载协作方）
//!    ↓
//! service.rs（PhotoService：规格选择 + 会话代数 + 流程入口）
//!    ↓
//! handler.rs（PhotoHandler：统一编排 + 阶段耗时日志）
//!    ├─ loader.rs（来源加载 + 体积/签名校验）
//!    ├─ classifier.rs（媒体类型/扩展名 → 输入类别 → 支持档位）
//!    ├─ decoder.rs（栅格/SVG 解码 + 像素上限）
//!    ├─ rasterizer.rs（PDF 第 1 页渲染，固定放大系数）
//!    ├─ crop.rs（裁剪区域校验 + 精确尺寸重采样）
//!    └─ encoder.rs（体积约束的有界质量下探）
//!    ↓
//! 返回 PhotoSession / EncodedArtifact（或 PhotoError）给调用侧
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 统一错误类型 `PhotoError`，预算未达标以数据而非错误传达 |
//! | [`specs`] | 目标规格注册表：（报考类别，材料类型）→ 尺寸/体积/格式/DPI |
//! | [`classifier`] | 输入分类纯函数与支持档位分发表 |
//! | [`source`] | 上传来源、解码位图、裁剪区域、编码产物等数据模型 |
//! | [`config`] | 运行时配置与平滑档位，快照语义保证单次请求参数一致 |
//! | [`session`] | 会话令牌（代数计数）与位图独占所有权 |
//! | [`service`] | 可注入服务状态：规格选择、上传、定稿、重置 |
//!
//! ## 并发模型
//!
//! 单活动会话、协作式取消：文件读取、PDF 渲染与每次编码迭代都是挂起点
//! （`spawn_blocking`），恢复时检查会话令牌，新上传开启后旧会话的结果
//! 在恢复点被丢弃，不做抢占。位图由会话值独占，无跨会话共享，无锁竞争。

pub mod classifier;
pub mod config;
mod crop;
mod decoder;
mod encoder;
pub mod error;
mod handler;
mod loader;
mod rasterizer;
pub mod service;
pub mod session;
pub mod source;
pub mod specs;

pub use classifier::{InputCategory, SupportLevel, accepted_formats, classify};
pub use config::{PipelineConfig, SmoothingQuality};
pub use error::PhotoError;
pub use service::{EncoderConfig, PhotoService};
pub use session::{PhotoSession, SessionToken};
pub use source::{
    ArtifactMetadata, CropRectangle, CroppedBitmap, DecodedBitmap, EncodedArtifact, UploadSource,
    UploadedFile,
};
pub use specs::{
    DocumentKind, OutputFormat, TargetProfile, TargetSpec, lookup, suggested_filename,
    suggested_filename_at,
};
