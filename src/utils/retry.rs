//! 重试策略
//!
//! 模型调用与网络下载共用同一套有上限的指数退避策略。

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

/// 指数退避重试策略
///
/// 第 n 次失败后的等待时间为 `multiplier * 2^(n-1)`，并限制在 `[min_backoff, max_backoff]`。
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 最大尝试次数（包含第一次）
    pub max_attempts: u32,
    pub min_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(10),
            multiplier: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// 不等待的策略（测试用）
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            min_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            multiplier: Duration::ZERO,
        }
    }

    /// 第 `failed_attempts` 次失败后的等待时间
    pub fn backoff_for(&self, failed_attempts: u32) -> Duration {
        let exponent = failed_attempts.saturating_sub(1).min(31);
        let raw = self.multiplier.saturating_mul(1u32 << exponent);
        raw.clamp(self.min_backoff, self.max_backoff.max(self.min_backoff))
    }

    /// 执行操作，对可重试错误按策略重试
    ///
    /// # 参数
    /// - `what`: 操作描述（仅用于日志）
    /// - `op`: 每次尝试调用一次
    /// - `is_retryable`: 判断错误是否可重试，不可重试的错误立即返回
    pub async fn run<T, E, F, Fut, R>(&self, what: &str, mut op: F, is_retryable: R) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < max_attempts && is_retryable(&e) => {
                    let wait = self.backoff_for(attempt);
                    warn!(
                        "{} 失败 (尝试 {}/{}): {}，{:?} 后重试",
                        what, attempt, max_attempts, e, wait
                    );
                    sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
