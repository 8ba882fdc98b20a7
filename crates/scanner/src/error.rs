//! 스캐너 에러 타입
//!
//! DB 준비 재시도 소진([`ScannerError::DbPreparationExhausted`])은 실행 전체를
//! 중단시키는 유일한 스캐너 에러입니다. 개별 스캔 실패는 에러가 아니라
//! `ScanOutcome`으로 보고됩니다.

use imagenie_core::error::ProcessError;

/// 스캐너 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum ScannerError {
    /// 취약점 DB 준비 재시도 소진: 실행 전체를 중단해야 함
    #[error("vulnerability db preparation failed after {attempts} attempt(s): {last}")]
    DbPreparationExhausted {
        /// 수행한 시도 횟수
        attempts: u32,
        /// 마지막 실패 원인
        last: String,
    },

    /// 단일 DB 준비 시도 실패
    #[error("vulnerability db download failed: {0}")]
    DbDownload(#[from] ProcessError),

    /// 설정 에러
    #[error("scanner config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },
}
