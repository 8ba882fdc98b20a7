#![doc = include_str!("../README.md")]

pub mod config;
pub mod error;
pub mod metrics;
pub mod process;
pub mod retry;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, ImagenieError, ProcessError};

// 설정
pub use config::ImagenieConfig;

// 외부 프로세스
pub use process::{CommandOutput, CommandSpec};

// 재시도
pub use retry::{Backoff, RetryError, RetryPolicy};

// 도메인 타입
pub use types::{ClassificationRules, ScanOutcome, Severity, SeverityClass};
