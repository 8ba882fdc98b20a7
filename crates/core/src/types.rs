//! 도메인 타입: 파이프라인 전역에서 사용되는 공통 타입
//!
//! 스캔 결과([`ScanOutcome`])와 그 분류([`SeverityClass`]),
//! 그리고 레지스트리 이름 검증 함수를 정의합니다.

use std::fmt;

use serde::{Deserialize, Serialize};

/// 파일 이름 최대 길이 (Linux `NAME_MAX`)
pub const MAX_FILE_NAME_LEN: usize = 255;

/// 변환 결과 확장자 최대 길이
pub const MAX_EXTENSION_LEN: usize = 16;

/// 이미지 이름 최대 길이
///
/// 이름은 `<name>.<ext>` 파일 이름으로 쓰이므로 레지스트리 제한(255)이 아니라
/// 확장자를 붙여도 [`MAX_FILE_NAME_LEN`]을 넘지 않는 길이로 제한합니다.
pub const MAX_IMAGE_NAME_LEN: usize = MAX_FILE_NAME_LEN - 1 - MAX_EXTENSION_LEN;

/// 스테이징 아카이브 확장자 (변환 결과 확장자와 같으면 안 됨)
pub const ARCHIVE_EXTENSION: &str = "tar";

/// 네임스페이스 최대 길이
pub const MAX_NAMESPACE_LEN: usize = 255;

/// 취약점 심각도
///
/// `Ord` 구현으로 심각도 비교가 가능합니다 (`Unknown < Low < Medium < High < Critical`).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Severity {
    /// 스캐너가 심각도를 매기지 않음
    #[default]
    Unknown,
    /// 낮은 심각도
    Low,
    /// 중간 심각도
    Medium,
    /// 높은 심각도
    High,
    /// 치명적: 아카이브 대상에서 제외
    Critical,
}

impl Severity {
    /// 문자열에서 심각도를 파싱합니다.
    ///
    /// 대소문자를 구분하지 않습니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "unknown" => Some(Self::Unknown),
            "low" => Some(Self::Low),
            "medium" | "med" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" | "crit" => Some(Self::Critical),
            _ => None,
        }
    }

    /// 스캐너 CLI와 리포트가 사용하는 대문자 이름
    pub fn scanner_name(&self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "Unknown"),
            Self::Low => write!(f, "Low"),
            Self::Medium => write!(f, "Medium"),
            Self::High => write!(f, "High"),
            Self::Critical => write!(f, "Critical"),
        }
    }
}

/// 스캔 결과 분류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeverityClass {
    /// 발견된 취약점 없음
    Clean,
    /// 치명적이지 않은 취약점만 발견
    NonCritical,
    /// 치명적 취약점 발견
    Critical,
    /// 스캐너 실행 실패 (시작 실패, 타임아웃, 비정상 종료)
    ScanError,
}

impl SeverityClass {
    /// 로그/리포트용 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::NonCritical => "non_critical",
            Self::Critical => "critical",
            Self::ScanError => "scan_error",
        }
    }

    /// 치명도 게이트 통과 여부
    pub fn passes_gate(&self) -> bool {
        matches!(self, Self::Clean | Self::NonCritical)
    }
}

impl fmt::Display for SeverityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 스캐너 출력 분류 규칙
///
/// 스캐너 텍스트에서 어떤 문자열을 찾을지 정의합니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationRules {
    /// 치명적 취약점 표식
    pub critical_marker: String,
    /// 치명적이지 않은 취약점 표식들
    pub non_critical_markers: Vec<String>,
}

/// 단일 이미지 스캔 결과
///
/// 스캔 단계에서 한 번 생성되고 판정 엔진에서 한 번 소비됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanOutcome {
    /// 분류
    pub class: SeverityClass,
    /// 진단 텍스트 (스캐너 출력 또는 실패 원인)
    pub diagnostic: String,
    /// 스캐너 종료 코드 (시작 실패, 타임아웃, 시그널 종료 시 None)
    pub exit_code: Option<i32>,
    /// 출력에서 발견된 치명적 표식 수
    pub critical_count: usize,
}

impl ScanOutcome {
    /// 스캐너 실행 결과를 분류합니다.
    ///
    /// 종료 코드가 0이 아니면 출력 내용과 무관하게 `ScanError`입니다.
    /// 그 외에는 치명적 표식 → `Critical`, 다른 표식 → `NonCritical`,
    /// 아무것도 없으면 `Clean`입니다.
    pub fn classify(exit_code: Option<i32>, output: &str, rules: &ClassificationRules) -> Self {
        if exit_code != Some(0) {
            return Self {
                class: SeverityClass::ScanError,
                diagnostic: output.to_owned(),
                exit_code,
                critical_count: 0,
            };
        }

        let critical_count = if rules.critical_marker.is_empty() {
            0
        } else {
            output.matches(rules.critical_marker.as_str()).count()
        };

        let class = if critical_count > 0 {
            SeverityClass::Critical
        } else if rules
            .non_critical_markers
            .iter()
            .any(|m| !m.is_empty() && output.contains(m.as_str()))
        {
            SeverityClass::NonCritical
        } else {
            SeverityClass::Clean
        };

        Self {
            class,
            diagnostic: output.to_owned(),
            exit_code,
            critical_count,
        }
    }

    /// 스캐너를 실행하지 못했거나 완료하지 못한 경우의 결과
    pub fn scan_error(diagnostic: impl Into<String>) -> Self {
        Self {
            class: SeverityClass::ScanError,
            diagnostic: diagnostic.into(),
            exit_code: None,
            critical_count: 0,
        }
    }
}

/// 이미지 이름이 레지스트리 repository 규칙을 따르는지 검증합니다.
///
/// 허용 형식: `[a-z0-9]+([._-][a-z0-9]+)*`, 최대 [`MAX_IMAGE_NAME_LEN`]자.
/// 파일 경로와 외부 명령 인자로 그대로 쓰이므로 경로 구분자와 선행 `-`는 거부됩니다.
pub fn validate_image_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("image name is empty".to_owned());
    }
    if name.len() > MAX_IMAGE_NAME_LEN {
        return Err(format!(
            "image name too long: {} chars (max {MAX_IMAGE_NAME_LEN})",
            name.len()
        ));
    }

    let mut prev_separator = true;
    for c in name.chars() {
        match c {
            'a'..='z' | '0'..='9' => prev_separator = false,
            '.' | '_' | '-' => {
                if prev_separator {
                    return Err(format!("image name has misplaced separator: {name}"));
                }
                prev_separator = true;
            }
            _ => return Err(format!("image name contains invalid character {c:?}: {name}")),
        }
    }
    if prev_separator {
        return Err(format!("image name ends with a separator: {name}"));
    }
    Ok(())
}

/// 네임스페이스 검증: 비어있지 않고 `[a-z0-9._-]`만 허용합니다.
pub fn validate_namespace(namespace: &str) -> Result<(), String> {
    if namespace.is_empty() {
        return Err("namespace is empty".to_owned());
    }
    if namespace.len() > MAX_NAMESPACE_LEN {
        return Err(format!(
            "namespace too long: {} chars (max {MAX_NAMESPACE_LEN})",
            namespace.len()
        ));
    }
    if let Some(c) = namespace
        .chars()
        .find(|c| !matches!(c, 'a'..='z' | '0'..='9' | '.' | '_' | '-'))
    {
        return Err(format!("namespace contains invalid character {c:?}"));
    }
    Ok(())
}
