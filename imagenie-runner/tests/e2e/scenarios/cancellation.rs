//! Cancellation by signal or deadline: no new tasks, cleanup still runs.

use std::time::Duration;

use imagenie_runner::{Disposition, RunError, Step};
use tokio_util::sync::CancellationToken;

use crate::helpers::harness::{Harness, disposition_of, dispositions, owned};

#[tokio::test]
async fn test_e2e_cancel_mid_run_marks_remaining_not_attempted() {
    // Given: the run is cancelled while alpha is being scanned
    let h = Harness::with_names(&["alpha", "beta", "gamma"]);
    let token = CancellationToken::new();
    h.scanner.cancel_while_scanning("alpha", token.clone());

    // When
    let report = h.run_with(token).await.expect("report is still produced");

    // Then: alpha stops at the next step boundary, the rest never start
    assert_eq!(
        dispositions(&report),
        owned(&[
            ("alpha", "failed"),
            ("beta", "not_attempted"),
            ("gamma", "not_attempted"),
        ])
    );
    assert!(matches!(
        disposition_of(&report, "alpha"),
        Disposition::Failed {
            step: Step::Cancelled,
            ..
        }
    ));
    assert!(report.cancelled);
    assert_eq!(report.exit_code(), 4);
    assert!(h.converter.converted().is_empty());
    assert!(h.store.keys().is_empty());
    assert_eq!(h.puller.pulled(), vec!["alpha".to_owned()]);
    assert!(h.residual_files().is_empty(), "left: {:?}", h.residual_files());
}

#[tokio::test]
async fn test_e2e_cancel_before_start_aborts_run() {
    let h = Harness::with_names(&["alpha"]);
    let token = CancellationToken::new();
    token.cancel();

    let err = h.run_with(token).await.expect_err("run must not start");

    assert!(matches!(err, RunError::Cancelled(_)));
    assert_eq!(err.exit_code(), 4);
    assert!(h.puller.pulled().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_e2e_run_deadline_cancels_run() {
    // Given: each pull takes 10s, the run may take at most 1s
    let mut h = Harness::with_names(&["alpha", "beta"]);
    h.config.runner.run_timeout_secs = 1;
    h.puller.set_delay(Duration::from_secs(10));

    // When
    let report = h.run().await.expect("report is still produced");

    // Then: alpha's pull finishes, the task stops before scanning
    assert_eq!(
        dispositions(&report),
        owned(&[("alpha", "failed"), ("beta", "not_attempted")])
    );
    assert!(h.scanner.scanned().is_empty());
    assert_eq!(report.exit_code(), 4);
    assert!(h.residual_files().is_empty());
}

#[tokio::test]
async fn test_e2e_no_deadline_by_default() {
    let h = Harness::with_names(&["alpha"]);
    assert_eq!(h.config.runner.run_timeout_secs, 0);

    let report = h.run().await.expect("run should complete");

    assert!(!report.cancelled);
    assert_eq!(report.exit_code(), 0);
}
