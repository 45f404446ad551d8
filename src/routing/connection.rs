// SPDX-License-Identifier: AGPL-3.0-or-later

//! One outbound stream to a sink (spec.md §4.1).
//!
//! No keepalive, no read side: the protocol is one-way send. A short write
//! is treated the same as a hard I/O error — the connection is poisoned and
//! must be replaced, never repaired in place.

use tokio::{io::AsyncWriteExt, net::TcpStream};

use crate::error::RelayError;

/// A single outbound TCP connection to a route's sink.
#[derive(Debug)]
pub struct Connection {
    addr: String,
    stream: TcpStream,
}

impl Connection {
    /// Resolves and dials `addr`. DNS resolution happens inside
    /// `TcpStream::connect`; a failure there and a failure to complete the
    /// handshake are both reported, distinguished only by the underlying
    /// `io::Error` kind, since the standard library does not expose the two
    /// phases separately.
    pub async fn open(addr: &str) -> Result<Self, RelayError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| RelayError::Dial {
                addr: addr.to_string(),
                source,
            })?;
        stream.set_nodelay(true).map_err(|source| RelayError::Dial {
            addr: addr.to_string(),
            source,
        })?;

        Ok(Self {
            addr: addr.to_string(),
            stream,
        })
    }

    /// Writes `buf` in full. A short write is reported as
    /// [`RelayError::TruncatedWrite`] rather than `Ok`, so callers always
    /// treat it as connection-poisoning regardless of the underlying I/O
    /// error kind.
    pub async fn write(&mut self, buf: &[u8]) -> Result<(), RelayError> {
        match self.stream.write(buf).await {
            Ok(n) if n == buf.len() => Ok(()),
            Ok(n) => Err(RelayError::TruncatedWrite {
                addr: self.addr.clone(),
                written: n,
                total: buf.len(),
            }),
            Err(source) => Err(RelayError::Write {
                addr: self.addr.clone(),
                source,
            }),
        }
    }

    /// Closes the connection. Idempotent in practice: once a `Connection`
    /// is dropped from its owning `Option<Connection>` slot, a second
    /// "close" is simply never reached.
    pub async fn close(mut self) {
        let _ = self.stream.shutdown().await;
    }
}
