//! 스캔 판정 엔진
//!
//! 스캔 결과 하나를 받아 다음 행동을 결정하는 순수 함수입니다.
//! 스캐너 텍스트는 읽지 않으며, 분류는 [`ScanOutcome::classify`]에서 끝납니다.

use std::fmt;

use imagenie_core::types::{ScanOutcome, SeverityClass};

/// 판정 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanAction {
    /// 변환과 업로드를 진행
    Proceed,
    /// 치명적 취약점: 변환/업로드 없이 건너뜀
    Skip,
    /// 스캔 실패: 태스크를 실패로 보고
    ReportError,
}

impl fmt::Display for ScanAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Proceed => write!(f, "proceed"),
            Self::Skip => write!(f, "skip"),
            Self::ReportError => write!(f, "report_error"),
        }
    }
}

/// 스캔 결과에 따른 행동을 결정합니다.
///
/// | 분류 | 행동 |
/// |------|------|
/// | `Clean`, `NonCritical` | `Proceed` |
/// | `Critical` | `Skip` |
/// | `ScanError` | `ReportError` |
pub fn decide(outcome: &ScanOutcome) -> ScanAction {
    match outcome.class {
        SeverityClass::Clean | SeverityClass::NonCritical => ScanAction::Proceed,
        SeverityClass::Critical => ScanAction::Skip,
        SeverityClass::ScanError => ScanAction::ReportError,
    }
}
