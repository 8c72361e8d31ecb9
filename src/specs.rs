//! # 目标规格注册表模块
//!
//! ## 设计思路
//!
//! 每个（报考类别，材料类型）组合对应一份固定的目标规格：精确像素尺寸、
//! 字节体积上限、输出格式与 DPI。注册表是纯数据，不承载任何行为；
//! 核心流水线从不自行读表，规格由调用侧解析后注入。
//!
//! ## 实现思路
//!
//! - 报考类别与材料类型用封闭枚举表达，配套 `from_str` / `as_str` 稳定字符串。
//! - 规格数值来自各报名系统的公开要求，体积上限以 KiB 为单位换算为字节。
//! - `suggested_filename` 生成下载文件名，毫秒时间戳保证同一会话内不重名。

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::PhotoError;

/// 报考类别。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetProfile {
    /// 联邦公务员考试（UPSC）。
    Upsc,
    /// 职员遴选考试（SSC CGL）。
    SscCgl,
    /// 银行从业人员考试（IBPS PO）。
    IbpsPo,
}

impl TargetProfile {
    /// 从外部字符串解析报考类别。
    pub fn from_str(profile: &str) -> Result<Self, PhotoError> {
        match profile.trim().to_ascii_uppercase().as_str() {
            "UPSC" => Ok(Self::Upsc),
            "SSC_CGL" => Ok(Self::SscCgl),
            "IBPS_PO" => Ok(Self::IbpsPo),
            other => Err(PhotoError::InvalidInput(format!(
                "未知报考类别：{}（可选：UPSC / SSC_CGL / IBPS_PO）",
                other
            ))),
        }
    }

    /// 稳定字符串，用于文件名与前端展示。
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Upsc => "UPSC",
            Self::SscCgl => "SSC_CGL",
            Self::IbpsPo => "IBPS_PO",
        }
    }
}

/// 材料类型：证件照或签名。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentKind {
    /// 证件照。
    Photo,
    /// 手写签名扫描件。
    Signature,
}

impl DocumentKind {
    /// 从外部字符串解析材料类型。
    pub fn from_str(kind: &str) -> Result<Self, PhotoError> {
        match kind.trim().to_ascii_lowercase().as_str() {
            "photo" => Ok(Self::Photo),
            "signature" => Ok(Self::Signature),
            other => Err(PhotoError::InvalidInput(format!(
                "未知材料类型：{}（可选：photo / signature）",
                other
            ))),
        }
    }

    /// 稳定字符串。
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Photo => "photo",
            Self::Signature => "signature",
        }
    }
}

/// 输出编码格式。目前所有报名系统只接受 JPEG。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    /// JPEG 有损编码。
    Jpeg,
}

impl OutputFormat {
    /// 下载文件使用的扩展名。
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
        }
    }
}

/// 目标规格：一次流水线运行的不可变输入。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSpec {
    /// 目标像素宽度。
    pub width: u32,
    /// 目标像素高度。
    pub height: u32,
    /// 编码产物的字节体积上限。
    pub max_size_bytes: u64,
    /// 输出编码格式。
    pub format: OutputFormat,
    /// 报名系统要求的 DPI（仅随产物元数据透传，不影响像素尺寸）。
    pub dpi: u32,
}

impl TargetSpec {
    /// 目标宽高比，裁剪区域校验的基准。
    pub fn aspect_ratio(&self) -> f64 {
        f64::from(self.width) / f64::from(self.height)
    }
}

const fn spec(width: u32, height: u32, max_kib: u64, dpi: u32) -> TargetSpec {
    TargetSpec {
        width,
        height,
        max_size_bytes: max_kib * 1024,
        format: OutputFormat::Jpeg,
        dpi,
    }
}

static SPEC_REGISTRY: Lazy<HashMap<(TargetProfile, DocumentKind), TargetSpec>> = Lazy::new(|| {
    HashMap::from([
        ((TargetProfile::Upsc, DocumentKind::Photo), spec(200, 230, 50, 110)),
        ((TargetProfile::Upsc, DocumentKind::Signature), spec(140, 60, 20, 110)),
        ((TargetProfile::SscCgl, DocumentKind::Photo), spec(200, 230, 20, 110)),
        ((TargetProfile::SscCgl, DocumentKind::Signature), spec(140, 60, 10, 110)),
        ((TargetProfile::IbpsPo, DocumentKind::Photo), spec(200, 230, 50, 110)),
        ((TargetProfile::IbpsPo, DocumentKind::Signature), spec(140, 60, 20, 110)),
    ])
});

/// 查询（报考类别，材料类型）对应的目标规格。
///
/// 注册表覆盖枚举域内的全部组合，正常情况下总能命中。
pub fn lookup(profile: TargetProfile, kind: DocumentKind) -> Option<TargetSpec> {
    SPEC_REGISTRY.get(&(profile, kind)).copied()
}

/// 建议的下载文件名：`{报考类别}_{材料类型}_{毫秒时间戳}.jpg`。
pub fn suggested_filename(profile: TargetProfile, kind: DocumentKind) -> String {
    suggested_filename_at(profile, kind, Utc::now())
}

/// 指定时间点的下载文件名（测试可注入固定时间）。
pub fn suggested_filename_at(
    profile: TargetProfile,
    kind: DocumentKind,
    at: DateTime<Utc>,
) -> String {
    format!(
        "{}_{}_{}.{}",
        profile.as_str(),
        kind.as_str(),
        at.timestamp_millis(),
        OutputFormat::Jpeg.extension()
    )
}
