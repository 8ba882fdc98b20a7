//! Vulnerability database preparation: retried, once per run, fatal on exhaustion.

use std::sync::atomic::Ordering;
use std::time::Duration;

use imagenie_runner::RunError;

use crate::helpers::harness::Harness;

#[tokio::test(start_paused = true)]
async fn test_e2e_db_succeeds_on_fifth_attempt() {
    // Given: 4 failures, default policy of 5 attempts with 5s between them
    let h = Harness::with_names(&["alpha"]);
    h.scanner.fail_db_times(4);
    let start = tokio::time::Instant::now();

    // When
    let report = h.run().await.expect("run should proceed after retries");

    // Then
    assert_eq!(h.scanner.db_calls.load(Ordering::SeqCst), 5);
    assert_eq!(report.db_prepare_attempts, 5);
    assert!(start.elapsed() >= Duration::from_secs(20));
    assert_eq!(report.totals.uploaded, 1);
}

#[tokio::test(start_paused = true)]
async fn test_e2e_db_exhaustion_aborts_before_any_container() {
    let h = Harness::with_names(&["alpha", "beta"]);
    h.scanner.fail_db_times(5);

    let err = h.run().await.expect_err("run must abort");

    assert!(matches!(err, RunError::DbPreparation(_)));
    assert_eq!(err.exit_code(), 3);
    assert!(err.to_string().contains("5 attempt(s)"));

    // 어떤 컨테이너도 처리되지 않음
    assert_eq!(h.scanner.db_calls.load(Ordering::SeqCst), 5);
    assert_eq!(h.registry.calls.load(Ordering::SeqCst), 0);
    assert!(h.puller.pulled().is_empty());
    assert!(h.scanner.scanned().is_empty());
    assert!(h.store.keys().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_e2e_db_attempts_are_configurable() {
    let mut h = Harness::with_names(&["alpha"]);
    h.config.scanner.db_prepare_attempts = 2;
    h.config.scanner.db_prepare_delay_secs = 1;
    h.scanner.fail_db_times(2);

    let err = h.run().await.expect_err("run must abort");

    assert_eq!(err.exit_code(), 3);
    assert_eq!(h.scanner.db_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_e2e_db_prepared_once_for_many_containers() {
    let h = Harness::with_names(&["a1", "a2", "a3", "a4"]);

    let report = h.run().await.expect("run should complete");

    assert_eq!(report.db_prepare_attempts, 1);
    assert_eq!(h.scanner.db_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.scanner.scanned().len(), 4);
}
