//! Re-running with the same inputs gives the same result and leaves nothing behind.

use crate::helpers::harness::{Harness, dispositions};

#[tokio::test]
async fn test_e2e_repeated_runs_are_identical() {
    let h = Harness::with_names(&["alpha", "beta", "gamma"]);
    h.scanner.mark_critical("beta");
    h.puller.fail_for("gamma");

    let first = h.run().await.expect("first run");
    assert!(h.residual_files().is_empty());
    let second = h.run().await.expect("second run");
    assert!(h.residual_files().is_empty());

    assert_eq!(dispositions(&first), dispositions(&second));
    assert_ne!(first.run_id, second.run_id);

    // 같은 키에 덮어쓰기
    assert_eq!(
        h.store.keys(),
        vec![
            "containers/alpha.sif".to_owned(),
            "containers/alpha.sif".to_owned()
        ]
    );
}

#[tokio::test]
async fn test_e2e_stale_staging_files_are_replaced() {
    // Given: leftovers from an interrupted earlier run
    let h = Harness::with_names(&["alpha"]);
    std::fs::write(h.staging_dir().join("alpha.tar"), b"stale archive").unwrap();
    std::fs::write(h.staging_dir().join("alpha.sif"), b"stale sif").unwrap();

    // When
    let report = h.run().await.expect("run should complete");

    // Then: the fresh artifact is uploaded and the leftovers are gone
    assert_eq!(report.totals.uploaded, 1);
    assert_eq!(
        h.store.object("containers/alpha.sif").as_deref(),
        Some(b"SIF from alpha".as_slice())
    );
    assert!(h.residual_files().is_empty());
}
