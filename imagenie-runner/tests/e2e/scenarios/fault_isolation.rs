//! A failing container never stops the batch, and always gets cleaned up.

use imagenie_runner::{Disposition, Step};

use crate::helpers::harness::{Harness, disposition_of, dispositions, owned};

fn failed_step(disposition: &Disposition) -> Option<Step> {
    match disposition {
        Disposition::Failed { step, .. } => Some(*step),
        _ => None,
    }
}

#[tokio::test]
async fn test_e2e_pull_failure_isolated() {
    let h = Harness::with_names(&["alpha", "beta", "gamma"]);
    h.puller.fail_for("beta");

    let report = h.run().await.expect("run should complete");

    assert_eq!(
        dispositions(&report),
        owned(&[("alpha", "uploaded"), ("beta", "failed"), ("gamma", "uploaded")])
    );
    let beta = disposition_of(&report, "beta");
    assert_eq!(failed_step(beta), Some(Step::Pull));
    if let Disposition::Failed { reason, .. } = beta {
        assert!(reason.contains("manifest unknown"), "reason: {reason}");
    }
    assert!(!h.scanner.scanned().contains(&"beta".to_owned()));
    assert_eq!(report.exit_code(), 0);
    assert!(h.residual_files().is_empty());
}

#[tokio::test]
async fn test_e2e_scanner_failure_is_never_uploaded() {
    // Given: the scanner cannot complete for beta (launch failure / timeout)
    let h = Harness::with_names(&["alpha", "beta"]);
    h.scanner.mark_broken("beta");

    // When
    let report = h.run().await.expect("run should complete");

    // Then: beta failed at the scan step, was never converted or uploaded
    assert_eq!(failed_step(disposition_of(&report, "beta")), Some(Step::Scan));
    assert_eq!(h.converter.converted(), vec!["alpha".to_owned()]);
    assert_eq!(h.store.keys(), vec!["containers/alpha.sif".to_owned()]);
    assert!(h.residual_files().is_empty());
}

#[tokio::test]
async fn test_e2e_conversion_failure_removes_partial_artifact() {
    let h = Harness::with_names(&["alpha", "beta"]);
    h.converter.fail_for("alpha");

    let report = h.run().await.expect("run should complete");

    assert_eq!(failed_step(disposition_of(&report, "alpha")), Some(Step::Convert));
    assert_eq!(disposition_of(&report, "beta").as_str(), "uploaded");
    assert_eq!(h.store.keys(), vec!["containers/beta.sif".to_owned()]);
    assert!(h.residual_files().is_empty(), "left: {:?}", h.residual_files());
}

#[tokio::test]
async fn test_e2e_upload_failure_still_cleans_local_files() {
    let h = Harness::with_names(&["alpha", "beta"]);
    h.store.fail_for_key("containers/alpha.sif");

    let report = h.run().await.expect("run should complete");

    let alpha = disposition_of(&report, "alpha");
    assert_eq!(failed_step(alpha), Some(Step::Upload));
    if let Disposition::Failed { reason, .. } = alpha {
        assert!(reason.contains("403"), "reason: {reason}");
    }
    assert_eq!(disposition_of(&report, "beta").as_str(), "uploaded");
    assert!(h.residual_files().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_e2e_upload_is_retried_when_configured() {
    let mut h = Harness::with_names(&["alpha"]);
    h.config.upload.attempts = 3;
    h.config.upload.retry_delay_secs = 10;
    h.store.fail_for_key("containers/alpha.sif");

    let report = h.run().await.expect("run should complete");

    // 재시도해도 계속 실패하면 결국 upload 단계 실패로 기록
    assert_eq!(h.store.put_calls(), 3);
    assert_eq!(failed_step(disposition_of(&report, "alpha")), Some(Step::Upload));
    assert!(h.residual_files().is_empty());
}

#[tokio::test]
async fn test_e2e_single_upload_attempt_by_default() {
    let h = Harness::with_names(&["alpha"]);
    h.store.fail_for_key("containers/alpha.sif");

    h.run().await.expect("run should complete");

    assert_eq!(h.store.put_calls(), 1);
}

#[tokio::test]
async fn test_e2e_panicking_worker_is_isolated() {
    // Given: the puller crashes after writing beta's archive
    let h = Harness::with_names(&["alpha", "beta", "gamma"]);
    h.puller.panic_for("beta");

    // When
    let report = h.run().await.expect("run should complete");

    // Then: beta is an internal failure, the others are unaffected
    assert_eq!(
        dispositions(&report),
        owned(&[("alpha", "uploaded"), ("beta", "failed"), ("gamma", "uploaded")])
    );
    assert_eq!(failed_step(disposition_of(&report, "beta")), Some(Step::Internal));
    assert_eq!(report.exit_code(), 0);
    assert!(h.residual_files().is_empty(), "left: {:?}", h.residual_files());
}

#[tokio::test]
async fn test_e2e_invalid_name_fails_before_pull() {
    let h = Harness::with_names(&["alpha", "Bad_Name!", "beta"]);

    let report = h.run().await.expect("run should complete");

    assert_eq!(
        failed_step(disposition_of(&report, "Bad_Name!")),
        Some(Step::Prepare)
    );
    assert_eq!(h.puller.pulled(), vec!["alpha".to_owned(), "beta".to_owned()]);
    assert_eq!(report.totals.uploaded, 2);
    assert_eq!(report.totals.failed, 1);
}

#[tokio::test]
async fn test_e2e_every_container_failing_still_exits_zero() {
    let h = Harness::with_names(&["alpha", "beta"]);
    h.puller.fail_for("alpha");
    h.puller.fail_for("beta");

    let report = h.run().await.expect("run should complete");

    assert_eq!(report.totals.failed, 2);
    assert_eq!(report.exit_code(), 0);
    assert!(h.residual_files().is_empty());
}
