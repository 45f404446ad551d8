// SPDX-License-Identifier: AGPL-3.0-or-later

//! Ingress listener and line framer (spec.md §6.1).
//!
//! One task per accepted connection, grounded on the teacher's pattern of
//! spawning a detached read loop per socket in `client/client.rs`. Frames
//! are delimited by `\n` and forwarded, trailing newline included, to the
//! dispatcher over a single shared channel.

use bytes::Bytes;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    net::{TcpListener, TcpStream},
    sync::mpsc,
};

use crate::telemetry;

/// Accepts connections on `listen_addr` until the process shuts down.
/// Each line, including the trailing `\n`, is sent to `tx`. The listener
/// never returns under normal operation; callers race it against shutdown
/// signals.
pub async fn listen(listen_addr: &str, max_line_bytes: usize, tx: mpsc::Sender<Bytes>) -> std::io::Result<()> {
    let listener = TcpListener::bind(listen_addr).await?;
    tracing::info!(addr = listen_addr, "ingress listener bound");

    loop {
        let (socket, peer) = listener.accept().await?;
        let tx = tx.clone();
        tokio::spawn(async move {
            if let Err(e) = frame_connection(socket, max_line_bytes, tx).await {
                tracing::debug!(%peer, error = %e, "ingress connection ended");
            }
        });
    }
}

async fn frame_connection(
    socket: TcpStream,
    max_line_bytes: usize,
    tx: mpsc::Sender<Bytes>,
) -> std::io::Result<()> {
    let mut reader = BufReader::new(socket);
    let mut line = Vec::new();

    loop {
        line.clear();
        let n = read_bounded_line(&mut reader, &mut line, max_line_bytes).await?;
        if n == 0 {
            return Ok(()); // clean EOF
        }
        if tx.send(Bytes::from(std::mem::take(&mut line))).await.is_err() {
            return Ok(()); // dispatcher gone, shutting down
        }
    }
}

/// Reads one `\n`-terminated line into `buf`, discarding (and counting as
/// a framing error) any line longer than `max_line_bytes`. Returns the
/// number of bytes read, `0` at EOF with no partial line pending.
async fn read_bounded_line(
    reader: &mut BufReader<TcpStream>,
    buf: &mut Vec<u8>,
    max_line_bytes: usize,
) -> std::io::Result<usize> {
    loop {
        let mut probe = Vec::new();
        let n = reader.read_until(b'\n', &mut probe).await?;
        if n == 0 {
            return Ok(0);
        }
        if probe.len() > max_line_bytes {
            telemetry::record_frame_error(max_line_bytes);
            if probe.last() == Some(&b'\n') {
                continue; // discarded, try the next line
            }
            // oversized and didn't end on a newline boundary: keep
            // reading until we find one, still discarding.
            loop {
                let mut rest = Vec::new();
                let m = reader.read_until(b'\n', &mut rest).await?;
                if m == 0 {
                    return Ok(0);
                }
                if rest.last() == Some(&b'\n') {
                    break;
                }
            }
            continue;
        }
        *buf = probe;
        return Ok(buf.len());
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::AsyncWriteExt;

    use super::*;

    #[tokio::test]
    async fn frames_multiple_lines_from_one_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr").to_string();
        drop(listener);

        let (tx, mut rx) = mpsc::channel(16);
        let listen_task = tokio::spawn(listen(addr.clone(), 65536, tx));
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut client = TcpStream::connect(&addr).await.expect("connect");
        client.write_all(b"app.cpu 1 100\napp.mem 2 100\n").await.expect("write");

        let first = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("no timeout")
            .expect("line");
        assert_eq!(first, Bytes::from_static(b"app.cpu 1 100\n"));
        let second = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("no timeout")
            .expect("line");
        assert_eq!(second, Bytes::from_static(b"app.mem 2 100\n"));

        listen_task.abort();
    }

    #[tokio::test]
    async fn oversized_line_is_discarded_not_forwarded() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr").to_string();
        drop(listener);

        let (tx, mut rx) = mpsc::channel(16);
        let listen_task = tokio::spawn(listen(addr.clone(), 8, tx));
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut client = TcpStream::connect(&addr).await.expect("connect");
        client
            .write_all(b"way.too.long.for.the.limit 1 100\nok\n")
            .await
            .expect("write");

        let line = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("no timeout")
            .expect("line");
        assert_eq!(line, Bytes::from_static(b"ok\n"));

        listen_task.abort();
    }
}
