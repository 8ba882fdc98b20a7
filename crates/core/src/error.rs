//! 에러 타입
//!
//! [`ImagenieError`]는 설정 로드 경로의 에러를 담습니다. 도메인 크레이트
//! (`registry`, `scanner`, `artifact`)는 자체 상세 에러를 정의하고,
//! 실행 바이너리가 이를 실행 단위 에러와 종료 코드로 직접 매핑합니다.
//! [`ProcessError`]는 모든 외부 도구 호출이 공유합니다.

/// imagenie 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum ImagenieError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 외부 프로세스 실행 에러
///
/// 모든 외부 도구 호출(skopeo, trivy, singularity, gcloud)은
/// 성공 또는 이 에러 중 하나를 명시적으로 반환합니다.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// 프로세스를 시작할 수 없음 (바이너리 없음, 권한 없음 등)
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        /// 실행하려던 프로그램
        program: String,
        /// 원본 I/O 에러
        source: std::io::Error,
    },

    /// 제한 시간 초과 (자식 프로세스는 종료됨)
    #[error("'{program}' timed out after {timeout_secs}s")]
    Timeout {
        /// 실행한 프로그램
        program: String,
        /// 적용된 제한 시간 (초)
        timeout_secs: u64,
    },

    /// 0이 아닌 종료 코드
    #[error("'{program}' exited with {status}: {stderr}")]
    NonZeroExit {
        /// 실행한 프로그램
        program: String,
        /// 종료 상태 (시그널로 종료된 경우 "signal")
        status: String,
        /// stderr 마지막 부분
        stderr: String,
    },
}
