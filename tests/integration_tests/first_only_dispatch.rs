// SPDX-License-Identifier: AGPL-3.0-or-later

use crate::integration_tests::common::{line, settle, spawn_sink};

#[tokio::test]
async fn routes_to_first_match_only() {
    let dir = tempfile::tempdir().expect("tempdir");
    let tbl = metricsrelayd::routing::RoutingTable::new(dir.path(), 1000, true);

    let (prod_addr, prod_sink) = spawn_sink();
    let (stag_addr, stag_sink) = spawn_sink();

    tbl.add("prod", r"\.prod\.", prod_addr, false).await.expect("add prod");
    tbl.add("stag", r"\.stag\.", stag_addr, false).await.expect("add stag");
    settle().await;

    let delivered = tbl.dispatch(line("app.prod.count 1 0\n")).await;
    assert_eq!(delivered, 1);

    let delivered = tbl.dispatch(line("app.stag.count 1 0\n")).await;
    assert_eq!(delivered, 1);

    let delivered = tbl.dispatch(line("app.dev.count 1 0\n")).await;
    assert_eq!(delivered, 0);

    tbl.shutdown_all().await;

    let prod_received = prod_sink.await.expect("prod join");
    assert_eq!(prod_received, b"app.prod.count 1 0\n");
    let stag_received = stag_sink.await.expect("stag join");
    assert_eq!(stag_received, b"app.stag.count 1 0\n");
}
