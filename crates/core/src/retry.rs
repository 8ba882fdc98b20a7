//! 재시도 정책: 일시적 실패를 견디는 비동기 작업 실행
//!
//! 취약점 DB 준비, 이미지 pull, 업로드가 같은 [`RetryPolicy`]를 공유합니다.
//! 시도 사이에만 대기하며, 마지막 실패 후에는 대기하지 않고 바로 반환합니다.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

/// 시도 간 대기 시간 증가 방식
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Backoff {
    /// 항상 같은 지연
    #[default]
    Fixed,
    /// `delay * attempt`
    Linear,
    /// `delay * 2^(attempt-1)`
    Exponential,
}

/// 재시도 정책
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 최대 시도 횟수 (최소 1)
    pub max_attempts: u32,
    /// 기본 지연 시간
    pub delay: Duration,
    /// 지연 증가 방식
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(1, Duration::ZERO)
    }
}

/// 모든 시도가 실패했을 때의 에러
#[derive(Debug)]
pub struct RetryError<E> {
    /// 수행한 시도 횟수
    pub attempts: u32,
    /// 마지막 시도의 에러
    pub last: E,
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed after {} attempt(s): {}", self.attempts, self.last)
    }
}

impl<E: std::error::Error + 'static> std::error::Error for RetryError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.last)
    }
}

impl RetryPolicy {
    /// 고정 지연 정책을 생성합니다. `max_attempts`가 0이면 1로 올립니다.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
            backoff: Backoff::Fixed,
        }
    }

    /// 지연 증가 방식을 바꿉니다.
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// `attempt`번째 실패 후 다음 시도 전까지의 지연 시간 (attempt는 1부터)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Linear => self.delay.saturating_mul(attempt),
            Backoff::Exponential => {
                let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
                self.delay.saturating_mul(factor)
            }
        }
    }

    /// 작업을 성공할 때까지 최대 `max_attempts`번 실행합니다.
    ///
    /// 클로저는 현재 시도 번호(1부터)를 인자로 받습니다.
    /// 한 번이라도 성공하면 즉시 결과를 반환하며, 이후 재시도는 없습니다.
    pub async fn run<T, E, F, Fut>(&self, operation: &str, mut f: F) -> Result<T, RetryError<E>>
    where
        E: fmt::Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match f(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation, attempt, "operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if attempt >= max_attempts => {
                    warn!(
                        operation,
                        attempt,
                        max_attempts,
                        error = %e,
                        "operation failed, no attempts left"
                    );
                    return Err(RetryError { attempts: attempt, last: e });
                }
                Err(e) => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        operation,
                        attempt,
                        max_attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "operation failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
