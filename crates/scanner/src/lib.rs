#![doc = include_str!("../README.md")]
//!
//! # Module Structure
//!
//! - [`error`]: 도메인 에러 (`ScannerError`)
//! - [`scanner`]: 스캐너 트레이트 (`VulnScanner`)와 Trivy 어댑터 (`TrivyScanner`)
//! - [`preparer`]: 재시도 기반 DB 준비 (`VulnDbPreparer`)
//! - [`decision`]: 판정 엔진 (`decide`, `ScanAction`)

pub mod decision;
pub mod error;
pub mod preparer;
pub mod scanner;

// --- Public API Re-exports ---

pub use decision::{ScanAction, decide};
pub use error::ScannerError;
pub use preparer::VulnDbPreparer;
pub use scanner::{TrivyScanner, TrivyScannerBuilder, VulnScanner};
