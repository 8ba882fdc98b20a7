//! Discovery: pagination, silent truncation and duplicate names.

use crate::helpers::harness::{Harness, dispositions, owned};

#[tokio::test]
async fn test_e2e_pages_are_concatenated_in_order() {
    let h = Harness::empty();
    h.registry.push_page(&["a", "b"]);
    h.registry.push_page(&["c"]);

    let report = h.run().await.expect("run should complete");

    let names: Vec<&str> = report.containers.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["a", "b", "c"]);
    assert_eq!(report.discovery.stopped, "empty page");
    assert!(!report.discovery.truncated);
}

#[tokio::test]
async fn test_e2e_registry_error_truncates_listing_without_failing() {
    // Given: page 1 ok, page 2 returns HTTP 503
    let h = Harness::empty();
    h.registry.push_page(&["alpha", "beta"]);
    h.registry.push_status(503);
    h.registry.push_page(&["never"]);

    // When
    let report = h.run().await.expect("run should complete despite registry error");

    // Then: exactly page 1's containers were processed
    assert_eq!(
        dispositions(&report),
        owned(&[("alpha", "uploaded"), ("beta", "uploaded")])
    );
    assert!(report.discovery.truncated);
    assert!(report.discovery.stopped.contains("page 2"));
    assert_eq!(report.exit_code(), 0);
}

#[tokio::test]
async fn test_e2e_registry_error_on_first_page_yields_empty_run() {
    let h = Harness::empty();
    h.registry.push_status(500);

    let report = h.run().await.expect("run should complete");

    assert!(report.containers.is_empty());
    assert!(report.discovery.truncated);
    assert!(h.puller.pulled().is_empty());
}

#[tokio::test]
async fn test_e2e_duplicate_names_processed_once() {
    let h = Harness::empty();
    h.registry.push_page(&["alpha", "beta"]);
    h.registry.push_page(&["alpha"]);

    let report = h.run().await.expect("run should complete");

    assert_eq!(
        dispositions(&report),
        owned(&[("alpha", "uploaded"), ("beta", "uploaded")])
    );
    assert_eq!(report.discovery.duplicates, 1);
    assert_eq!(h.puller.pulled(), vec!["alpha".to_owned(), "beta".to_owned()]);
}

#[tokio::test]
async fn test_e2e_page_limit_stops_pagination() {
    let mut h = Harness::empty();
    h.config.registry.max_pages = 2;
    h.registry.push_page(&["a"]);
    h.registry.push_page(&["b"]);
    h.registry.push_page(&["c"]);

    let report = h.run().await.expect("run should complete");

    let names: Vec<&str> = report.containers.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["a", "b"]);
    assert!(report.discovery.truncated);
}
