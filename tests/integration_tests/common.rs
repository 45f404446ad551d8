// SPDX-License-Identifier: AGPL-3.0-or-later

use std::time::Duration;

use bytes::Bytes;
use tokio::{
    io::AsyncReadExt,
    net::TcpListener,
};

/// Starts a bare TCP listener that accepts a single connection and
/// captures everything written to it until the peer closes.
pub fn spawn_sink() -> (String, tokio::task::JoinHandle<Vec<u8>>) {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    std_listener.set_nonblocking(true).expect("nonblocking");
    let addr = std_listener.local_addr().expect("addr").to_string();
    let listener = TcpListener::from_std(std_listener).expect("tokio listener");

    let join = tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.expect("accept");
        let mut buf = Vec::new();
        let _ = sock.read_to_end(&mut buf).await;
        buf
    });

    (addr, join)
}

/// Binds and immediately drops a listener, reserving an address that
/// refuses every connection attempt until a listener rebinds it.
pub fn reserve_refusing_addr() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    listener.local_addr().expect("addr").to_string()
}

pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(150)).await;
}

pub fn line(s: &str) -> Bytes {
    Bytes::copy_from_slice(s.as_bytes())
}
