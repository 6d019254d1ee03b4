//! 弹性操作包装器 - 基础设施层
//!
//! 把任意一个可能瞬时失败的页面操作（导航、点击、填充）包装成
//! "立即重试直到成功或截止时间"。这里的失败来自页面加载竞态而非
//! 外部限流，所以不做退避。

use std::future::Future;
use std::time::{Duration, Instant};

use tracing::{error, warn};

use crate::error::{AppError, AppResult};

/// 在截止时间内反复执行同一个操作
///
/// # 参数
/// - `deadline`: 总截止时间
/// - `action`: 操作名称，用于日志与超时错误
/// - `op`: 零参数异步操作，对操作的具体形状不做任何假设
///
/// # 返回
/// 首次成功的结果；截止时间内始终失败时返回 `ActionTimeout`，
/// 内部保留最后一次失败作为错误源
pub async fn until_deadline<T, F, Fut>(deadline: Duration, action: &str, mut op: F) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let started = Instant::now();
    let mut attempts = 0usize;
    loop {
        attempts += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if started.elapsed() >= deadline {
                    error!(
                        "操作「{}」在 {:?} 内未成功，共尝试 {} 次，最后错误: {}",
                        action,
                        deadline,
                        attempts,
                        e
                    );
                    return Err(AppError::action_timeout(action, deadline, attempts, e));
                }
                warn!("操作「{}」第 {} 次尝试失败: {}", action, attempts, e);
            }
        }
    }
}
