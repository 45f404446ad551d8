// SPDX-License-Identifier: AGPL-3.0-or-later

use std::time::Duration;

use tokio::{io::AsyncReadExt, net::TcpListener};

use crate::integration_tests::common::{line, reserve_refusing_addr, settle};

/// Exercises spec.md §8 scenario 3: a spooling route whose sink initially
/// refuses connections must, once the sink becomes reachable, drain its
/// backlog in submission order within one reconnect tick (≤ 60 s).
#[tokio::test]
async fn spooled_lines_drain_once_sink_becomes_reachable() {
    tokio::time::pause();

    let dir = tempfile::tempdir().expect("tempdir");
    let tbl = metricsrelayd::routing::RoutingTable::new(dir.path(), 1000, false);

    let addr = reserve_refusing_addr();
    tbl.add("s", "", addr.clone(), true).await.expect("add s");
    settle().await;

    tbl.dispatch(line("a\n")).await;
    tbl.dispatch(line("b\n")).await;
    tbl.dispatch(line("c\n")).await;
    settle().await;

    let listener = TcpListener::bind(&addr).await.expect("rebind sink");
    let accept = tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.expect("accept");
        let mut buf = vec![0u8; 6];
        sock.read_exact(&mut buf).await.expect("read");
        buf
    });

    let received = tokio::time::timeout(Duration::from_secs(65), accept)
        .await
        .expect("reconnect must happen within one tick period")
        .expect("join");
    assert_eq!(received, b"a\nb\nc\n");

    tbl.shutdown_all().await;
}
