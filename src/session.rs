//! # 会话与取消令牌模块
//!
//! ## 设计思路
//!
//! 同一时刻只存在一个有效的处理会话。新的上传开启时代数计数器自增，
//! 旧会话的令牌随即过期——挂起中的加载/渲染/编码操作在每个恢复点检查
//! 令牌有效性，失效则放弃提交结果，而不是被强行打断。
//!
//! 解码位图由会话值独占持有：会话被丢弃，位图与中间缓冲随之释放，
//! 取消语义由所有权自然给出，不需要额外的共享标志位。
//!
//! ## 实现思路
//!
//! - `SessionToken` 记录自己的代数与共享的“当前代数”计数器。
//! - `is_stale` 为真即表示有更新的上传已经开始。
//! - `ensure_live` 供各恢复点做单行守卫，统一产出 `Cancelled` 错误。

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::PhotoError;
use crate::source::DecodedBitmap;
use crate::specs::TargetSpec;

/// 会话令牌：代数快照 + 共享的当前代数。
#[derive(Debug, Clone)]
pub struct SessionToken {
    generation: u64,
    current: Arc<AtomicU64>,
}

impl SessionToken {
    pub(crate) fn new(generation: u64, current: Arc<AtomicU64>) -> Self {
        Self { generation, current }
    }

    /// 令牌所属的会话代数。
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// 是否已有更新的上传开启（令牌过期）。
    pub fn is_stale(&self) -> bool {
        self.current.load(Ordering::SeqCst) != self.generation
    }

    /// 恢复点守卫：令牌过期时返回 `Cancelled`，调用侧丢弃中间结果。
    pub(crate) fn ensure_live(&self, stage: &str) -> Result<(), PhotoError> {
        if self.is_stale() {
            log::info!("🚫 会话 #{} 已失效，{}阶段结果被丢弃", self.generation, stage);
            return Err(PhotoError::Cancelled(format!(
                "{}阶段恢复时发现会话已被新的上传取代",
                stage
            )));
        }
        Ok(())
    }
}

/// 一次上传对应的处理会话。
///
/// 独占持有解码位图与目标规格；`finalize` 以引用接收会话，
/// 新上传构造新会话后旧会话即过期。
#[derive(Debug)]
pub struct PhotoSession {
    pub(crate) token: SessionToken,
    spec: TargetSpec,
    bitmap: DecodedBitmap,
}

impl PhotoSession {
    pub(crate) fn new(token: SessionToken, spec: TargetSpec, bitmap: DecodedBitmap) -> Self {
        Self { token, spec, bitmap }
    }

    /// 本会话的目标规格。
    pub fn spec(&self) -> &TargetSpec {
        &self.spec
    }

    /// 本会话独占的解码位图（裁剪面预览用）。
    pub fn bitmap(&self) -> &DecodedBitmap {
        &self.bitmap
    }

    /// 会话令牌（只读）。
    pub fn token(&self) -> &SessionToken {
        &self.token
    }
}
