// SPDX-License-Identifier: AGPL-3.0-or-later

//! Single-consumer dispatch loop: pulls framed lines off the ingress
//! channel and routes each through the [`RoutingTable`] (spec.md §4.4).

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::routing::RoutingTable;

/// Runs until `ingress_rx` is closed (i.e. every ingress listener has shut
/// down). Intended to be spawned as its own task.
pub async fn run(table: Arc<RoutingTable>, mut ingress_rx: mpsc::Receiver<Bytes>) {
    while let Some(line) = ingress_rx.recv().await {
        let delivered = table.dispatch(line.clone()).await;
        if delivered == 0 {
            tracing::warn!(line = %String::from_utf8_lossy(&line), "no route matched, line dropped");
        }
    }
}
