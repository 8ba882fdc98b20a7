//! 설정 관리: imagenie.toml 파싱 및 런타임 설정
//!
//! [`ImagenieConfig`]는 파이프라인 전체 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`IMAGENIE_REGISTRY_NAMESPACE=myorg` 형식)
//! 3. 설정 파일 (`imagenie.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), imagenie_core::error::ImagenieError> {
//! use imagenie_core::config::ImagenieConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = ImagenieConfig::load("imagenie.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = ImagenieConfig::parse("[runner]\nconcurrency = 4")?;
//! # Ok(())
//! # }
//! ```

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, ImagenieError};
use crate::retry::RetryPolicy;
use crate::types::{
    ARCHIVE_EXTENSION, ClassificationRules, MAX_EXTENSION_LEN, Severity, validate_namespace,
};

/// 동시 처리 태스크 수 상한
pub const MAX_CONCURRENCY: usize = 64;

/// 레지스트리 페이지 크기 상한 (Docker Hub 제한)
pub const MAX_PAGE_SIZE: u32 = 100;

/// imagenie 통합 설정
///
/// `imagenie.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 크레이트는 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImagenieConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 레지스트리 탐색 설정
    #[serde(default)]
    pub registry: RegistryConfig,
    /// 취약점 스캐너 설정
    #[serde(default)]
    pub scanner: ScannerConfig,
    /// 이미지 pull 설정
    #[serde(default)]
    pub pull: PullConfig,
    /// 아카이브 변환 설정
    #[serde(default)]
    pub convert: ConvertConfig,
    /// 업로드 설정
    #[serde(default)]
    pub upload: UploadConfig,
    /// 실행기 설정
    #[serde(default)]
    pub runner: RunnerConfig,
    /// 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl ImagenieConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용한 뒤 검증합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ImagenieError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 기본값에 환경변수 오버라이드만 적용합니다 (설정 파일 없음).
    pub fn from_env() -> Result<Self, ImagenieError> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 읽습니다 (환경변수 오버라이드, 검증 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ImagenieError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ImagenieError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                ImagenieError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, ImagenieError> {
        toml::from_str(toml_str).map_err(|e| {
            ImagenieError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `IMAGENIE_{SECTION}_{FIELD}`
    /// 예: `IMAGENIE_UPLOAD_DESTINATION=file:///srv/archive`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "IMAGENIE_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "IMAGENIE_GENERAL_LOG_FORMAT");

        // Registry
        override_string(&mut self.registry.base_url, "IMAGENIE_REGISTRY_BASE_URL");
        override_string(&mut self.registry.namespace, "IMAGENIE_REGISTRY_NAMESPACE");
        override_string(&mut self.registry.image_tag, "IMAGENIE_REGISTRY_IMAGE_TAG");
        override_u32(&mut self.registry.page_size, "IMAGENIE_REGISTRY_PAGE_SIZE");
        override_u32(&mut self.registry.max_pages, "IMAGENIE_REGISTRY_MAX_PAGES");
        override_u64(
            &mut self.registry.request_timeout_secs,
            "IMAGENIE_REGISTRY_REQUEST_TIMEOUT_SECS",
        );

        // Scanner
        override_string(&mut self.scanner.program, "IMAGENIE_SCANNER_PROGRAM");
        override_string(&mut self.scanner.severity, "IMAGENIE_SCANNER_SEVERITY");
        override_string(
            &mut self.scanner.critical_marker,
            "IMAGENIE_SCANNER_CRITICAL_MARKER",
        );
        override_csv(
            &mut self.scanner.non_critical_markers,
            "IMAGENIE_SCANNER_NON_CRITICAL_MARKERS",
        );
        override_string(&mut self.scanner.cache_dir, "IMAGENIE_SCANNER_CACHE_DIR");
        override_u64(
            &mut self.scanner.timeout_secs,
            "IMAGENIE_SCANNER_TIMEOUT_SECS",
        );
        override_u32(
            &mut self.scanner.db_prepare_attempts,
            "IMAGENIE_SCANNER_DB_PREPARE_ATTEMPTS",
        );
        override_u64(
            &mut self.scanner.db_prepare_delay_secs,
            "IMAGENIE_SCANNER_DB_PREPARE_DELAY_SECS",
        );

        // Pull
        override_string(&mut self.pull.program, "IMAGENIE_PULL_PROGRAM");
        override_u64(&mut self.pull.timeout_secs, "IMAGENIE_PULL_TIMEOUT_SECS");
        override_u32(&mut self.pull.attempts, "IMAGENIE_PULL_ATTEMPTS");
        override_u64(
            &mut self.pull.retry_delay_secs,
            "IMAGENIE_PULL_RETRY_DELAY_SECS",
        );

        // Convert
        override_string(&mut self.convert.program, "IMAGENIE_CONVERT_PROGRAM");
        override_string(&mut self.convert.extension, "IMAGENIE_CONVERT_EXTENSION");
        override_u64(
            &mut self.convert.timeout_secs,
            "IMAGENIE_CONVERT_TIMEOUT_SECS",
        );

        // Upload
        override_string(&mut self.upload.destination, "IMAGENIE_UPLOAD_DESTINATION");
        override_string(&mut self.upload.prefix, "IMAGENIE_UPLOAD_PREFIX");
        override_string(&mut self.upload.program, "IMAGENIE_UPLOAD_PROGRAM");
        override_u64(&mut self.upload.timeout_secs, "IMAGENIE_UPLOAD_TIMEOUT_SECS");
        override_u32(&mut self.upload.attempts, "IMAGENIE_UPLOAD_ATTEMPTS");
        override_u64(
            &mut self.upload.retry_delay_secs,
            "IMAGENIE_UPLOAD_RETRY_DELAY_SECS",
        );

        // Runner
        override_string(&mut self.runner.staging_dir, "IMAGENIE_RUNNER_STAGING_DIR");
        override_usize(&mut self.runner.concurrency, "IMAGENIE_RUNNER_CONCURRENCY");
        override_u64(
            &mut self.runner.run_timeout_secs,
            "IMAGENIE_RUNNER_RUN_TIMEOUT_SECS",
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "IMAGENIE_METRICS_ENABLED");
        override_string(
            &mut self.metrics.listen_addr,
            "IMAGENIE_METRICS_LISTEN_ADDR",
        );
        override_u16(&mut self.metrics.port, "IMAGENIE_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), ImagenieError> {
        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        // log_format 검증
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        self.registry.validate()?;
        self.scanner.validate()?;

        require_program("pull.program", &self.pull.program)?;
        require_positive("pull.timeout_secs", self.pull.timeout_secs)?;
        require_positive("pull.attempts", u64::from(self.pull.attempts))?;

        require_program("convert.program", &self.convert.program)?;
        require_positive("convert.timeout_secs", self.convert.timeout_secs)?;
        if self.convert.extension.is_empty()
            || self.convert.extension.len() > MAX_EXTENSION_LEN
            || !self
                .convert
                .extension
                .chars()
                .all(|c| c.is_ascii_alphanumeric())
        {
            return Err(invalid(
                "convert.extension",
                format!("must be an alphanumeric file extension of 1 to {MAX_EXTENSION_LEN} characters"),
            ));
        }
        if self.convert.extension.eq_ignore_ascii_case(ARCHIVE_EXTENSION) {
            return Err(invalid(
                "convert.extension",
                format!("must differ from the staging archive extension '{ARCHIVE_EXTENSION}'"),
            ));
        }

        if self.upload.destination.trim().is_empty() {
            return Err(invalid("upload.destination", "must not be empty"));
        }
        require_program("upload.program", &self.upload.program)?;
        require_positive("upload.timeout_secs", self.upload.timeout_secs)?;
        require_positive("upload.attempts", u64::from(self.upload.attempts))?;

        if self.runner.staging_dir.is_empty() {
            return Err(invalid("runner.staging_dir", "must not be empty"));
        }
        if self.runner.concurrency == 0 || self.runner.concurrency > MAX_CONCURRENCY {
            return Err(invalid(
                "runner.concurrency",
                format!("must be between 1 and {MAX_CONCURRENCY}"),
            ));
        }

        if self.metrics.enabled {
            if self.metrics.listen_addr.parse::<IpAddr>().is_err() {
                return Err(invalid(
                    "metrics.listen_addr",
                    "must be a valid IP address",
                ));
            }
            if self.metrics.port == 0 {
                return Err(invalid("metrics.port", "must not be 0 when enabled"));
            }
        }

        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// 레지스트리 탐색 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// 레지스트리 API 기본 URL
    pub base_url: String,
    /// 탐색할 네임스페이스 (조직)
    pub namespace: String,
    /// pull할 이미지 태그
    pub image_tag: String,
    /// 페이지당 항목 수
    pub page_size: u32,
    /// 최대 탐색 페이지 수
    pub max_pages: u32,
    /// 요청 제한 시간 (초)
    pub request_timeout_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: "https://hub.docker.com".to_owned(),
            namespace: "ghtrecontainers".to_owned(),
            image_tag: "latest".to_owned(),
            page_size: 100,
            max_pages: 10_000,
            request_timeout_secs: 30,
        }
    }
}

impl RegistryConfig {
    fn validate(&self) -> Result<(), ImagenieError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(invalid(
                "registry.base_url",
                "must start with http:// or https://",
            ));
        }
        validate_namespace(&self.namespace).map_err(|e| invalid("registry.namespace", e))?;
        if self.image_tag.is_empty()
            || self
                .image_tag
                .chars()
                .any(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
        {
            return Err(invalid(
                "registry.image_tag",
                "must be non-empty and contain only [A-Za-z0-9._-]",
            ));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(invalid(
                "registry.page_size",
                format!("must be between 1 and {MAX_PAGE_SIZE}"),
            ));
        }
        require_positive("registry.max_pages", u64::from(self.max_pages))?;
        require_positive(
            "registry.request_timeout_secs",
            self.request_timeout_secs,
        )?;
        Ok(())
    }

    /// 요청 제한 시간
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// 취약점 스캐너 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// 스캐너 실행 파일
    pub program: String,
    /// 스캔할 심각도 (쉼표 구분, 예: "CRITICAL" 또는 "HIGH,CRITICAL")
    pub severity: String,
    /// 치명적 취약점 표식
    pub critical_marker: String,
    /// 치명적이지 않은 취약점 표식
    pub non_critical_markers: Vec<String>,
    /// 취약점 DB 캐시 디렉토리 (비어있으면 스캐너 기본값)
    pub cache_dir: String,
    /// 이미지 하나 스캔 제한 시간 (초)
    pub timeout_secs: u64,
    /// DB 준비 최대 시도 횟수
    pub db_prepare_attempts: u32,
    /// DB 준비 재시도 간격 (초)
    pub db_prepare_delay_secs: u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            program: "trivy".to_owned(),
            severity: "CRITICAL".to_owned(),
            critical_marker: "\"Severity\": \"CRITICAL\"".to_owned(),
            non_critical_markers: vec![
                "\"Severity\": \"HIGH\"".to_owned(),
                "\"Severity\": \"MEDIUM\"".to_owned(),
                "\"Severity\": \"LOW\"".to_owned(),
            ],
            cache_dir: String::new(),
            timeout_secs: 1800,
            db_prepare_attempts: 5,
            db_prepare_delay_secs: 5,
        }
    }
}

impl ScannerConfig {
    fn validate(&self) -> Result<(), ImagenieError> {
        require_program("scanner.program", &self.program)?;
        if self.severities().is_none() {
            return Err(invalid(
                "scanner.severity",
                "must be a comma-separated list of UNKNOWN, LOW, MEDIUM, HIGH, CRITICAL",
            ));
        }
        if self.critical_marker.is_empty() {
            return Err(invalid("scanner.critical_marker", "must not be empty"));
        }
        require_positive("scanner.timeout_secs", self.timeout_secs)?;
        require_positive(
            "scanner.db_prepare_attempts",
            u64::from(self.db_prepare_attempts),
        )?;
        Ok(())
    }

    /// 심각도 목록을 파싱합니다. 하나라도 알 수 없으면 None.
    pub fn severities(&self) -> Option<Vec<Severity>> {
        let parsed: Option<Vec<Severity>> = self
            .severity
            .split(',')
            .map(Severity::from_str_loose)
            .collect();
        parsed.filter(|v| !v.is_empty())
    }

    /// 스캐너 출력 분류 규칙
    pub fn classification_rules(&self) -> ClassificationRules {
        ClassificationRules {
            critical_marker: self.critical_marker.clone(),
            non_critical_markers: self.non_critical_markers.clone(),
        }
    }

    /// 캐시 디렉토리 (설정된 경우)
    pub fn cache_dir(&self) -> Option<PathBuf> {
        if self.cache_dir.is_empty() {
            None
        } else {
            Some(PathBuf::from(&self.cache_dir))
        }
    }

    /// 스캔 제한 시간
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// DB 준비 재시도 정책
    pub fn db_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(
            self.db_prepare_attempts,
            Duration::from_secs(self.db_prepare_delay_secs),
        )
    }
}

/// 이미지 pull 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PullConfig {
    /// pull 도구 실행 파일
    pub program: String,
    /// 제한 시간 (초)
    pub timeout_secs: u64,
    /// 최대 시도 횟수
    pub attempts: u32,
    /// 재시도 간격 (초)
    pub retry_delay_secs: u64,
}

impl Default for PullConfig {
    fn default() -> Self {
        Self {
            program: "skopeo".to_owned(),
            timeout_secs: 1800,
            attempts: 1,
            retry_delay_secs: 10,
        }
    }
}

impl PullConfig {
    /// 제한 시간
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// 재시도 정책
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.attempts, Duration::from_secs(self.retry_delay_secs))
    }
}

/// 아카이브 변환 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    /// 변환 도구 실행 파일 (singularity 또는 apptainer)
    pub program: String,
    /// 결과 파일 확장자
    pub extension: String,
    /// 제한 시간 (초)
    pub timeout_secs: u64,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            program: "singularity".to_owned(),
            extension: "sif".to_owned(),
            timeout_secs: 3600,
        }
    }
}

impl ConvertConfig {
    /// 제한 시간
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// 업로드 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// 업로드 대상 (`gs://bucket[/base]`, `file:///dir`, 또는 로컬 경로)
    pub destination: String,
    /// 대상 키 접두어
    pub prefix: String,
    /// 업로드 도구 실행 파일 (gs:// 대상에서만 사용)
    pub program: String,
    /// 제한 시간 (초)
    pub timeout_secs: u64,
    /// 최대 시도 횟수
    pub attempts: u32,
    /// 재시도 간격 (초)
    pub retry_delay_secs: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            destination: "gs://qmul-production-sandbox-1-red".to_owned(),
            prefix: "containers".to_owned(),
            program: "gcloud".to_owned(),
            timeout_secs: 1800,
            attempts: 1,
            retry_delay_secs: 10,
        }
    }
}

impl UploadConfig {
    /// 제한 시간
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// 재시도 정책
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.attempts, Duration::from_secs(self.retry_delay_secs))
    }
}

/// 실행기 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// 스테이징 디렉토리
    pub staging_dir: String,
    /// 동시 처리 태스크 수 (1이면 탐색 순서대로 순차 처리)
    pub concurrency: usize,
    /// 전체 실행 제한 시간 (초, 0이면 무제한)
    pub run_timeout_secs: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            staging_dir: std::env::temp_dir()
                .join("imagenie")
                .display()
                .to_string(),
            concurrency: 1,
            run_timeout_secs: 0,
        }
    }
}

impl RunnerConfig {
    /// 전체 실행 제한 시간 (설정된 경우)
    pub fn run_timeout(&self) -> Option<Duration> {
        (self.run_timeout_secs > 0).then(|| Duration::from_secs(self.run_timeout_secs))
    }
}

/// 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Prometheus 엔드포인트 활성화 여부
    pub enabled: bool,
    /// 수신 주소
    pub listen_addr: String,
    /// 수신 포트
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9464,
        }
    }
}

// --- 검증 헬퍼 ---

fn invalid(field: &str, reason: impl Into<String>) -> ImagenieError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

fn require_positive(field: &str, value: u64) -> Result<(), ImagenieError> {
    if value == 0 {
        return Err(invalid(field, "must be greater than 0"));
    }
    Ok(())
}

fn require_program(field: &str, program: &str) -> Result<(), ImagenieError> {
    if program.trim().is_empty() {
        return Err(invalid(field, "must not be empty"));
    }
    if program.starts_with('-') {
        return Err(invalid(field, "must not start with '-'"));
    }
    Ok(())
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_parsed<T: std::str::FromStr>(target: &mut T, env_key: &str, type_name: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.trim().parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                expected = type_name,
                "failed to parse env var, ignoring"
            ),
        }
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    override_parsed(target, env_key, "bool");
}

fn override_usize(target: &mut usize, env_key: &str) {
    override_parsed(target, env_key, "usize");
}

fn override_u16(target: &mut u16, env_key: &str) {
    override_parsed(target, env_key, "u16");
}

fn override_u32(target: &mut u32, env_key: &str) {
    override_parsed(target, env_key, "u32");
}

fn override_u64(target: &mut u64, env_key: &str) {
    override_parsed(target, env_key, "u64");
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}
