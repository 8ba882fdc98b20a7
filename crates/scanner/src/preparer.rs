//! 취약점 DB 준비: 실행 시작 시 한 번, 재시도 정책 아래에서
//!
//! 한 번이라도 성공하면 준비는 끝나며 같은 실행에서 반복되지 않습니다.
//! 모든 시도가 실패하면 [`ScannerError::DbPreparationExhausted`]를 반환하고,
//! 호출자는 어떤 태스크도 만들지 않고 실행을 중단해야 합니다.

use std::sync::Arc;

use imagenie_core::metrics as m;
use imagenie_core::retry::RetryPolicy;
use tracing::{error, info};

use crate::error::ScannerError;
use crate::scanner::VulnScanner;

/// 취약점 DB 준비기
pub struct VulnDbPreparer<S: VulnScanner> {
    scanner: Arc<S>,
    policy: RetryPolicy,
}

impl<S: VulnScanner> VulnDbPreparer<S> {
    /// 스캐너와 재시도 정책으로 생성합니다.
    pub fn new(scanner: Arc<S>, policy: RetryPolicy) -> Self {
        Self { scanner, policy }
    }

    /// 적용 중인 재시도 정책
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// DB를 준비합니다. 성공 시 사용한 시도 횟수를 반환합니다.
    pub async fn prepare(&self) -> Result<u32, ScannerError> {
        info!(
            max_attempts = self.policy.max_attempts,
            delay_secs = self.policy.delay.as_secs(),
            "preparing vulnerability database"
        );

        let scanner = Arc::clone(&self.scanner);
        let mut used = 0;
        let result = self
            .policy
            .run("vuln-db-prepare", |attempt| {
                used = attempt;
                let scanner = Arc::clone(&scanner);
                async move {
                    let result = scanner.prepare_db().await;
                    let label = if result.is_ok() { "success" } else { "failure" };
                    metrics::counter!(m::DB_PREPARE_ATTEMPTS_TOTAL, m::LABEL_RESULT => label)
                        .increment(1);
                    result
                }
            })
            .await;

        match result {
            Ok(()) => {
                info!(attempts = used, "vulnerability database prepared");
                Ok(used)
            }
            Err(e) => {
                error!(
                    attempts = e.attempts,
                    error = %e.last,
                    "vulnerability database preparation exhausted"
                );
                Err(ScannerError::DbPreparationExhausted {
                    attempts: e.attempts,
                    last: e.last.to_string(),
                })
            }
        }
    }
}
