// SPDX-License-Identifier: AGPL-3.0-or-later

use crate::integration_tests::common::{line, settle, spawn_sink};

/// Exercises spec.md §8 scenario 5: a route added at runtime receives
/// matching traffic, and once removed, no longer does.
#[tokio::test]
async fn removed_route_stops_receiving_traffic() {
    let dir = tempfile::tempdir().expect("tempdir");
    let tbl = metricsrelayd::routing::RoutingTable::new(dir.path(), 1000, false);

    let (addr, sink) = spawn_sink();
    tbl.add("r2", "", addr, false).await.expect("add r2");
    settle().await;

    let delivered = tbl.dispatch(line("hello\n")).await;
    assert_eq!(delivered, 1);

    tbl.remove("r2").await.expect("remove r2");

    let delivered = tbl.dispatch(line("hello\n")).await;
    assert_eq!(delivered, 0);

    let received = sink.await.expect("sink join");
    assert_eq!(received, b"hello\n");
}

/// Exercises spec.md §8 scenario 6: updating a route's pattern changes
/// which subsequent lines match, atomically with respect to dispatch.
#[tokio::test]
async fn update_pattern_changes_subsequent_matches() {
    let dir = tempfile::tempdir().expect("tempdir");
    let tbl = metricsrelayd::routing::RoutingTable::new(dir.path(), 1000, false);

    let (addr, _sink) = spawn_sink();
    tbl.add("r", "", addr, false).await.expect("add r");
    settle().await;

    tbl.update("r", Some("^foo".to_string()), None).await.expect("update pattern");

    let delivered = tbl.dispatch(line("foo.bar\n")).await;
    assert_eq!(delivered, 1);

    let delivered = tbl.dispatch(line("bar.foo\n")).await;
    assert_eq!(delivered, 0);

    tbl.shutdown_all().await;
}
