//! Normal flow: clean images are converted and uploaded, critical ones skipped.

use std::sync::atomic::Ordering;

use imagenie_core::types::SeverityClass;
use imagenie_runner::Disposition;

use crate::helpers::harness::{Harness, disposition_of, dispositions, owned};

#[tokio::test]
async fn test_e2e_clean_uploaded_and_critical_skipped() {
    // Given: alpha is clean, beta has a critical vulnerability
    let h = Harness::with_names(&["alpha", "beta"]);
    h.scanner.mark_critical("beta");

    // When
    let report = h.run().await.expect("run should complete");

    // Then: alpha uploaded under containers/alpha.sif, beta skipped
    assert_eq!(
        dispositions(&report),
        owned(&[("alpha", "uploaded"), ("beta", "skipped_critical")])
    );
    assert_eq!(
        disposition_of(&report, "alpha"),
        &Disposition::Uploaded {
            destination: "mem://containers/alpha.sif".to_owned()
        }
    );
    assert_eq!(h.store.keys(), vec!["containers/alpha.sif".to_owned()]);
    assert_eq!(
        h.store.object("containers/alpha.sif").as_deref(),
        Some(b"SIF from alpha".as_slice())
    );

    // beta는 변환/업로드 호출 없음
    assert_eq!(h.converter.converted(), vec!["alpha".to_owned()]);
    assert_eq!(h.scanner.scanned(), vec!["alpha".to_owned(), "beta".to_owned()]);

    assert_eq!(report.exit_code(), 0);
    assert!(!report.cancelled);
    assert!(h.residual_files().is_empty(), "staging not cleaned: {:?}", h.residual_files());
}

#[tokio::test]
async fn test_e2e_non_critical_findings_pass_the_gate() {
    let h = Harness::with_names(&["alpha"]);
    h.scanner.mark_non_critical("alpha");

    let report = h.run().await.expect("run should complete");

    let alpha = report.container("alpha").expect("alpha in report");
    assert_eq!(alpha.disposition.as_str(), "uploaded");
    assert_eq!(alpha.scan, Some(SeverityClass::NonCritical));
    assert_eq!(h.store.keys(), vec!["containers/alpha.sif".to_owned()]);
}

#[tokio::test]
async fn test_e2e_scan_reads_the_pulled_archive() {
    let h = Harness::with_names(&["alpha"]);

    let report = h.run().await.expect("run should complete");

    // 스캐너는 아카이브가 없으면 scan_error를 반환하므로, 업로드됐다면 pull 결과를 읽은 것
    assert_eq!(report.container("alpha").unwrap().scan, Some(SeverityClass::Clean));
    assert_eq!(h.puller.pulled(), vec!["alpha".to_owned()]);
}

#[tokio::test]
async fn test_e2e_empty_prefix_uploads_to_bucket_root() {
    let mut h = Harness::with_names(&["alpha"]);
    h.config.upload.prefix = String::new();

    h.run().await.expect("run should complete");

    assert_eq!(h.store.keys(), vec!["alpha.sif".to_owned()]);
}

#[tokio::test]
async fn test_e2e_empty_namespace_completes() {
    let h = Harness::empty();

    let report = h.run().await.expect("run should complete");

    assert!(report.containers.is_empty());
    assert_eq!(report.exit_code(), 0);
    assert_eq!(h.scanner.db_calls.load(Ordering::SeqCst), 1);
    assert!(h.puller.pulled().is_empty());
}

#[tokio::test]
async fn test_e2e_parallel_workers_keep_listing_order() {
    let names = ["a1", "a2", "a3", "a4", "a5", "a6"];
    let mut h = Harness::with_names(&names);
    h.config.runner.concurrency = 4;
    h.scanner.mark_critical("a3");

    let report = h.run().await.expect("run should complete");

    let reported: Vec<&str> = report.containers.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(reported, names);
    assert_eq!(report.totals.uploaded, 5);
    assert_eq!(report.totals.skipped_critical, 1);
    assert!(h.residual_files().is_empty());
}

#[tokio::test]
async fn test_e2e_sequential_by_default() {
    let h = Harness::with_names(&["gamma", "alpha", "beta"]);
    assert_eq!(h.config.runner.concurrency, 1);

    h.run().await.expect("run should complete");

    // 동시성 1이면 탐색 순서 그대로 처리
    assert_eq!(
        h.puller.pulled(),
        vec!["gamma".to_owned(), "alpha".to_owned(), "beta".to_owned()]
    );
    assert_eq!(
        h.store.keys(),
        vec![
            "containers/gamma.sif".to_owned(),
            "containers/alpha.sif".to_owned(),
            "containers/beta.sif".to_owned(),
        ]
    );
}
