//! # 错误模型模块
//!
//! ## 设计思路
//!
//! 使用单一错误枚举承载照片处理链路中的所有错误来源，避免字符串拼接式错误处理。
//! 通过 `thiserror` 保持人类可读错误，同时让调用侧可按分支匹配并展示差异化提示文案。
//!
//! ## 实现思路
//!
//! - 规格未选择、格式拒绝、解码失败、PDF 密码/损坏等“业务错误”各占一个分支。
//! - 体积预算未达标**不是**错误：以 `EncodedArtifact::over_budget` 数据形式返回。
//! - 锁中毒、后台任务中断等基础设施错误统一归入 `ResourceLimit`。

use crate::classifier::InputCategory;

/// 照片处理统一错误类型。
///
/// 所有致命错误都会中止当前上传会话并回到未上传状态；
/// 调用侧可按分支选择面向用户的补救文案。
#[derive(Debug, thiserror::Error)]
pub enum PhotoError {
    /// 分类结果为拒绝类（RAW 底片或完全不支持的格式）。
    #[error("不支持的文件格式：{0}")]
    UnsupportedFormat(String),

    /// 栅格/TIFF/HEIC 解码失败；保留分类结果，便于上层展示按类别定制的提示。
    #[error("解码错误：{message}")]
    Decode {
        category: InputCategory,
        message: String,
    },

    /// PDF 文档受密码保护，与“文档损坏”区分以便给出不同的补救建议。
    #[error("PDF 文档受密码保护，请先解除密码后再上传")]
    PasswordProtectedDocument,

    /// PDF 文档损坏或无法解析。
    #[error("PDF 文档已损坏或无法解析，请改用 JPG / PNG 文件")]
    CorruptDocument,

    /// 上传前未选择目标规格，在任何解码工作开始前即中止。
    #[error("尚未选择目标规格，请先选择报考类别与材料类型")]
    MissingTargetSpec,

    /// 裁剪区域越界、为空或宽高比偏离目标规格。
    #[error("裁剪区域无效：{0}")]
    InvalidCropRegion(String),

    /// JPEG 编码基础设施失败（非预算未达标）。
    #[error("编码错误：{0}")]
    Encode(String),

    /// 输入本身格式错误（Data URL 不完整、内容为空等）。
    #[error("输入格式错误：{0}")]
    InvalidInput(String),

    /// 配置参数不在允许范围内。
    #[error("配置无效：{0}")]
    InvalidConfig(String),

    /// 文件系统 I/O 错误。
    #[error("文件错误：{0}")]
    FileSystem(String),

    /// 资源限制（文件/像素体积超限、锁中毒、后台任务异常结束）。
    #[error("资源限制：{0}")]
    ResourceLimit(String),

    /// PDF 渲染器不可用（系统缺少 pdfium 动态库）。
    #[error("PDF 渲染器不可用：{0}")]
    RendererUnavailable(String),

    /// 会话令牌已失效：新的上传开启后，旧会话的挂起操作在恢复点放弃提交。
    #[error("会话已取消：{0}")]
    Cancelled(String),
}

impl PhotoError {
    /// 判断错误是否由会话失效引起。
    ///
    /// 会话失效不代表输入有问题，调用侧通常静默丢弃而非提示用户。
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PhotoError::Cancelled(_))
    }
}
