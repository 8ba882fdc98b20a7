//! 취약점 스캐너 추상화와 Trivy 어댑터
//!
//! [`VulnScanner`]는 파이프라인이 스캐너와 대화하는 유일한 경로입니다.
//! 프로덕션은 [`TrivyScanner`], 테스트는 목(mock) 구현을 사용합니다.
//!
//! `scan`은 실패를 에러로 반환하지 않고 [`ScanOutcome`]의 `ScanError` 분류로
//! 접어 넣습니다. 판정 엔진은 이 분류만 보고 결정합니다.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use imagenie_core::config::ScannerConfig;
use imagenie_core::error::ProcessError;
use imagenie_core::process::{self, CommandOutput, CommandSpec};
use imagenie_core::types::{ClassificationRules, ScanOutcome, Severity, SeverityClass};
use tracing::{debug, info, warn};

use crate::error::ScannerError;

/// 취약점 스캐너 트레이트
///
/// `Send + Sync + 'static`이므로 `Arc`로 여러 태스크가 공유할 수 있습니다.
pub trait VulnScanner: Send + Sync + 'static {
    /// 취약점 DB를 내려받거나 갱신합니다 (재시도 없음, 1회 시도).
    fn prepare_db(&self) -> impl Future<Output = Result<(), ScannerError>> + Send;

    /// 이미지 아카이브를 스캔합니다.
    ///
    /// 스캐너 시작 실패, 타임아웃, 비정상 종료는 `SeverityClass::ScanError`로 반환됩니다.
    fn scan(&self, archive: &Path) -> impl Future<Output = ScanOutcome> + Send;
}

/// `trivy` CLI 어댑터
#[derive(Debug, Clone)]
pub struct TrivyScanner {
    program: String,
    severities: Vec<Severity>,
    cache_dir: Option<PathBuf>,
    timeout: Duration,
    rules: ClassificationRules,
}

impl TrivyScanner {
    /// 빌더를 생성합니다.
    pub fn builder() -> TrivyScannerBuilder {
        TrivyScannerBuilder::default()
    }

    /// `[scanner]` 설정 섹션에서 생성합니다.
    pub fn from_config(config: &ScannerConfig) -> Result<Self, ScannerError> {
        let severities = config.severities().ok_or_else(|| ScannerError::Config {
            field: "scanner.severity".to_owned(),
            reason: format!("unrecognised severity list '{}'", config.severity),
        })?;

        let mut builder = Self::builder()
            .program(&config.program)
            .severities(severities)
            .timeout(config.timeout())
            .rules(config.classification_rules());
        if let Some(dir) = config.cache_dir() {
            builder = builder.cache_dir(dir);
        }
        builder.build()
    }

    fn cache_args(&self) -> Vec<String> {
        match &self.cache_dir {
            Some(dir) => vec!["--cache-dir".to_owned(), dir.display().to_string()],
            None => Vec::new(),
        }
    }

    /// DB 준비 명령: `trivy image --download-db-only [--cache-dir DIR]`
    pub fn prepare_command(&self) -> CommandSpec {
        CommandSpec::new(&self.program, self.timeout)
            .args(["image", "--download-db-only", "--quiet"])
            .args(self.cache_args())
    }

    /// 스캔 명령: DB는 이미 준비되었으므로 갱신하지 않습니다.
    pub fn scan_command(&self, archive: &Path) -> CommandSpec {
        let severity = self
            .severities
            .iter()
            .map(Severity::scanner_name)
            .collect::<Vec<_>>()
            .join(",");

        CommandSpec::new(&self.program, self.timeout)
            .args(["image", "--skip-db-update", "--quiet", "--format", "json"])
            .args(["--severity".to_owned(), severity])
            .args(self.cache_args())
            .args(["--input".to_owned(), archive.display().to_string()])
    }

    /// 실행 결과를 스캔 결과로 변환합니다.
    pub fn outcome_from(&self, result: Result<CommandOutput, ProcessError>) -> ScanOutcome {
        match result {
            Ok(output) => {
                // 분류 대상은 JSON 본문(stdout), 실패 시에는 stderr까지 남김
                let text = if output.success() {
                    output.stdout.clone()
                } else {
                    output.diagnostic()
                };
                ScanOutcome::classify(output.status, &text, &self.rules)
            }
            Err(e) => ScanOutcome::scan_error(e.to_string()),
        }
    }
}

impl VulnScanner for TrivyScanner {
    async fn prepare_db(&self) -> Result<(), ScannerError> {
        let spec = self.prepare_command();
        process::run_checked(&spec).await?;
        info!(program = self.program.as_str(), "vulnerability database ready");
        Ok(())
    }

    async fn scan(&self, archive: &Path) -> ScanOutcome {
        let spec = self.scan_command(archive);
        let outcome = self.outcome_from(process::run(&spec).await);
        match outcome.class {
            SeverityClass::ScanError => warn!(
                archive = %archive.display(),
                exit_code = ?outcome.exit_code,
                "scanner did not complete"
            ),
            class => debug!(
                archive = %archive.display(),
                class = %class,
                critical_count = outcome.critical_count,
                "scan classified"
            ),
        }
        outcome
    }
}

/// [`TrivyScanner`] 빌더
#[derive(Debug, Clone)]
pub struct TrivyScannerBuilder {
    program: String,
    severities: Vec<Severity>,
    cache_dir: Option<PathBuf>,
    timeout: Duration,
    rules: ClassificationRules,
}

impl Default for TrivyScannerBuilder {
    fn default() -> Self {
        let defaults = ScannerConfig::default();
        Self {
            program: defaults.program.clone(),
            severities: vec![Severity::Critical],
            cache_dir: None,
            timeout: defaults.timeout(),
            rules: defaults.classification_rules(),
        }
    }
}

impl TrivyScannerBuilder {
    /// 실행 파일
    pub fn program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// 스캔할 심각도 목록
    pub fn severities(mut self, severities: Vec<Severity>) -> Self {
        self.severities = severities;
        self
    }

    /// 캐시 디렉토리
    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// 명령별 제한 시간
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// 출력 분류 규칙
    pub fn rules(mut self, rules: ClassificationRules) -> Self {
        self.rules = rules;
        self
    }

    /// 검증 후 스캐너를 생성합니다.
    pub fn build(self) -> Result<TrivyScanner, ScannerError> {
        if self.program.trim().is_empty() {
            return Err(ScannerError::Config {
                field: "program".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }
        if self.severities.is_empty() {
            return Err(ScannerError::Config {
                field: "severity".to_owned(),
                reason: "at least one severity is required".to_owned(),
            });
        }
        if self.rules.critical_marker.is_empty() {
            return Err(ScannerError::Config {
                field: "critical_marker".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }
        if self.timeout.is_zero() {
            return Err(ScannerError::Config {
                field: "timeout".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }
        Ok(TrivyScanner {
            program: self.program,
            severities: self.severities,
            cache_dir: self.cache_dir,
            timeout: self.timeout,
            rules: self.rules,
        })
    }
}
