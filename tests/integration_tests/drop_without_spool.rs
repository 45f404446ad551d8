// SPDX-License-Identifier: AGPL-3.0-or-later

use std::time::Duration;

use tokio::net::TcpListener;

use crate::integration_tests::common::{line, reserve_refusing_addr, settle};

/// Exercises spec.md §8 scenario 4: with `spool=false` and no connection,
/// submitted lines are dropped rather than retained anywhere. Later
/// reachability of the sink must not surface the dropped lines.
#[tokio::test]
async fn lines_submitted_while_disconnected_are_dropped() {
    let dir = tempfile::tempdir().expect("tempdir");
    let tbl = metricsrelayd::routing::RoutingTable::new(dir.path(), 1000, false);

    let addr = reserve_refusing_addr();
    tbl.add("s", "", addr.clone(), false).await.expect("add s");
    settle().await;

    tbl.dispatch(line("a\n")).await;
    tbl.dispatch(line("b\n")).await;
    tbl.dispatch(line("c\n")).await;
    settle().await;

    let listener = TcpListener::bind(&addr).await.expect("rebind sink");
    let accept = tokio::spawn(async move { listener.accept().await });

    // The sink only becomes connectable on a later reconnect tick; within a
    // short window no data should have been queued for it at all.
    let outcome = tokio::time::timeout(Duration::from_millis(300), accept).await;
    assert!(outcome.is_err(), "no backlog should exist to deliver with spool disabled");

    tbl.shutdown_all().await;
}
