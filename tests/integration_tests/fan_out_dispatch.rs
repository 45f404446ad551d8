// SPDX-License-Identifier: AGPL-3.0-or-later

use crate::integration_tests::common::{line, settle, spawn_sink};

#[tokio::test]
async fn matches_both_routes_with_empty_patterns() {
    let dir = tempfile::tempdir().expect("tempdir");
    let tbl = metricsrelayd::routing::RoutingTable::new(dir.path(), 1000, false);

    let (all_addr, all_sink) = spawn_sink();
    let (dup_addr, dup_sink) = spawn_sink();

    tbl.add("all", "", all_addr, false).await.expect("add all");
    tbl.add("dup", "", dup_addr, false).await.expect("add dup");
    settle().await;

    let delivered = tbl.dispatch(line("x 1 0\n")).await;
    assert_eq!(delivered, 2);

    tbl.shutdown_all().await;

    assert_eq!(all_sink.await.expect("all join"), b"x 1 0\n");
    assert_eq!(dup_sink.await.expect("dup join"), b"x 1 0\n");
}
