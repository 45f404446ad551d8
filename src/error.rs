// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error taxonomy for the routing and delivery engine (spec.md §7).

use thiserror::Error;

/// Errors surfaced by the routing table, relay, and connection layer.
///
/// Propagation policy (spec.md §7): `Pattern`, `DuplicateKey`, `UnknownKey`,
/// `NotRunning` are returned to the admin caller with no state change.
/// `Resolve`/`Dial`/`Write`/`TruncatedWrite` are logged and handled inside
/// the relay loop (stay disconnected, spool-or-drop); they are never
/// returned across the `submit` boundary.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("invalid pattern for route {key:?}: {source}")]
    Pattern {
        key: String,
        #[source]
        source: regex::Error,
    },

    #[error("failed to resolve {addr}: {source}")]
    Resolve {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to dial {addr}: {source}")]
    Dial {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("write to {addr} failed: {source}")]
    Write {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("truncated write to {addr}: wrote {written} of {total} bytes")]
    TruncatedWrite {
        addr: String,
        written: usize,
        total: usize,
    },

    #[error("route key {0:?} already exists")]
    DuplicateKey(String),

    #[error("no such route {0:?}")]
    UnknownKey(String),

    #[error("route {0:?} is not running")]
    NotRunning(String),

    #[error("spool operation failed for route {key:?}: {source}")]
    Spool {
        key: String,
        #[source]
        source: std::io::Error,
    },
}
