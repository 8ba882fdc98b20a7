//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 크레이트는 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `imagenie_`
//! - 접미어: `_total` (counter), `_seconds` (histogram), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use imagenie_core::metrics::{LABEL_DISPOSITION, TASKS_TOTAL};
//! use metrics::counter;
//!
//! counter!(TASKS_TOTAL, LABEL_DISPOSITION => "uploaded").increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 태스크 최종 처리 결과 레이블 키 (uploaded, skipped_critical, failed, not_attempted)
pub const LABEL_DISPOSITION: &str = "disposition";

/// 파이프라인 단계 레이블 키 (pull, scan, convert, upload, cleanup)
pub const LABEL_STEP: &str = "step";

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

// ─── 파이프라인 메트릭 ─────────────────────────────────────────────

/// 처리 완료된 태스크 수 (counter, label: disposition)
pub const TASKS_TOTAL: &str = "imagenie_tasks_total";

/// 단계별 소요 시간 (histogram, label: step)
pub const STEP_DURATION_SECONDS: &str = "imagenie_step_duration_seconds";

/// 취약점 DB 준비 시도 수 (counter, label: result)
pub const DB_PREPARE_ATTEMPTS_TOTAL: &str = "imagenie_db_prepare_attempts_total";

/// 이번 실행에서 발견된 컨테이너 수 (gauge)
pub const CONTAINERS_DISCOVERED: &str = "imagenie_containers_discovered";

/// 탐색한 레지스트리 페이지 수 (counter)
pub const REGISTRY_PAGES_TOTAL: &str = "imagenie_registry_pages_total";

/// 실행 전체 소요 시간 (gauge, 초)
pub const RUN_DURATION_SECONDS: &str = "imagenie_run_duration_seconds";

// ─── 히스토그램 버킷 정의 ────────────────────────────────────────────

/// 단계 소요 시간 히스토그램 버킷 (초)
///
/// 100ms ~ 1h 범위 (대형 이미지 변환은 수십 분 걸림)
pub const STEP_DURATION_BUCKETS: [f64; 10] = [
    0.1, 1.0, 5.0, 15.0, 30.0, 60.0, 300.0, 900.0, 1800.0, 3600.0,
];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    describe_counter!(
        TASKS_TOTAL,
        "Total number of container tasks by final disposition"
    );
    describe_histogram!(
        STEP_DURATION_SECONDS,
        "Duration of a single pipeline step in seconds"
    );
    describe_counter!(
        DB_PREPARE_ATTEMPTS_TOTAL,
        "Vulnerability database preparation attempts by result"
    );
    describe_gauge!(
        CONTAINERS_DISCOVERED,
        "Number of containers discovered in the registry namespace"
    );
    describe_counter!(
        REGISTRY_PAGES_TOTAL,
        "Total number of registry listing pages fetched"
    );
    describe_gauge!(RUN_DURATION_SECONDS, "Wall-clock duration of the last run");
}
