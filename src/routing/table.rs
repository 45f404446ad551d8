// SPDX-License-Identifier: AGPL-3.0-or-later

//! The routing table: maps metric-name patterns to route relays, and
//! dispatches ingress lines to the first (or all) matching routes
//! (spec.md §2, §4.3, §4.4).

use std::{collections::HashMap, path::PathBuf};

use bytes::Bytes;
use regex::Regex;
use tokio::sync::Mutex;

use crate::{error::RelayError, routing::relay::RouteRelay};

/// A snapshot of one route's configuration, returned by `list`/`snapshot`.
/// Decoupled from the internal handle so callers (e.g. the admin surface)
/// can't reach into the live relay.
#[derive(Clone, Debug)]
pub struct RouteSnapshot {
    pub key: String,
    pub pattern: String,
    pub addr: String,
    pub spool: bool,
}

/// The pattern/regex pair and addr/spool mirror live alongside the relay
/// handle, guarded by the table's own mutex — the only reader of the regex
/// is `dispatch`, which already holds that lock, so a route's pattern and
/// its relay never observably disagree (spec.md I5).
struct RouteHandle {
    pattern: String,
    regex: Regex,
    addr: String,
    spool: bool,
    relay: RouteRelay,
    join: tokio::task::JoinHandle<()>,
}

struct Inner {
    routes: HashMap<String, RouteHandle>,
    /// Declaration order of `routes`' keys (spec.md §3 "order"): insertion
    /// order, preserved across mutation, new routes appended at the end.
    /// `HashMap` iteration order is randomized per process, so `dispatch`
    /// must walk this instead of `routes.values()` for `first_only` to be
    /// deterministic by declaration order (spec.md §4.3, P1).
    order: Vec<String>,
    spool_root: PathBuf,
    channel_capacity: usize,
    first_only: bool,
}

/// Shared, mutable routing table. All mutating operations take the same
/// mutex, so `add`/`remove`/`update`/`dispatch` serialize against each
/// other (spec.md §4.3: "table mutations are atomic with respect to
/// dispatch").
pub struct RoutingTable {
    inner: Mutex<Inner>,
}

impl RoutingTable {
    pub fn new(spool_root: impl Into<PathBuf>, channel_capacity: usize, first_only: bool) -> Self {
        Self {
            inner: Mutex::new(Inner {
                routes: HashMap::new(),
                order: Vec::new(),
                spool_root: spool_root.into(),
                channel_capacity,
                first_only,
            }),
        }
    }

    /// Adds a new route and starts its relay immediately. Fails if `key`
    /// is already taken or `pattern` does not compile.
    pub async fn add(
        &self,
        key: impl Into<String>,
        pattern: impl Into<String>,
        addr: impl Into<String>,
        spool: bool,
    ) -> Result<(), RelayError> {
        let key = key.into();
        let pattern = pattern.into();
        let addr = addr.into();

        let mut inner = self.inner.lock().await;
        if inner.routes.contains_key(&key) {
            return Err(RelayError::DuplicateKey(key));
        }

        let regex = Regex::new(&pattern).map_err(|source| RelayError::Pattern {
            key: key.clone(),
            source,
        })?;

        let spool_dir = inner.spool_root.join(format!("spool_{key}"));
        let (relay, join) =
            RouteRelay::start(key.clone(), addr.clone(), spool, spool_dir, inner.channel_capacity);

        inner.routes.insert(
            key.clone(),
            RouteHandle {
                pattern,
                regex,
                addr,
                spool,
                relay,
                join,
            },
        );
        inner.order.push(key);
        Ok(())
    }

    /// Stops and removes a route. The relay is given a chance to flush its
    /// current connection cleanly before its task is dropped.
    pub async fn remove(&self, key: &str) -> Result<(), RelayError> {
        let mut inner = self.inner.lock().await;
        let handle = inner
            .routes
            .remove(key)
            .ok_or_else(|| RelayError::UnknownKey(key.to_string()))?;
        inner.order.retain(|k| k != key);
        handle.relay.shutdown().await;
        handle.join.abort();
        Ok(())
    }

    /// Updates a route's target address, pattern, or both. Address is
    /// applied first so an in-flight pattern recompile failure never
    /// leaves the relay pointed at a half-updated address (resolves
    /// spec.md §4.3's update-ordering open question).
    pub async fn update(
        &self,
        key: &str,
        new_pattern: Option<String>,
        new_addr: Option<String>,
    ) -> Result<(), RelayError> {
        let mut inner = self.inner.lock().await;
        let handle = inner
            .routes
            .get_mut(key)
            .ok_or_else(|| RelayError::UnknownKey(key.to_string()))?;

        if let Some(addr) = new_addr {
            handle.relay.update_addr(addr.clone())?;
            handle.addr = addr;
        }

        if let Some(pattern) = new_pattern {
            let regex = Regex::new(&pattern).map_err(|source| RelayError::Pattern {
                key: key.to_string(),
                source,
            })?;
            handle.pattern = pattern;
            handle.regex = regex;
        }

        Ok(())
    }

    /// Returns a point-in-time snapshot of every configured route, in
    /// declaration order.
    pub async fn snapshot(&self) -> Vec<RouteSnapshot> {
        let inner = self.inner.lock().await;
        inner
            .order
            .iter()
            .filter_map(|key| inner.routes.get(key).map(|h| (key, h)))
            .map(|(key, h)| RouteSnapshot {
                key: key.clone(),
                pattern: h.pattern.clone(),
                addr: h.addr.clone(),
                spool: h.spool,
            })
            .collect()
    }

    /// Routes one ingress line to every route whose pattern matches the
    /// full line (trailing newline included, spec.md §4.3), in declaration
    /// order, or only the first match when `first_only` is set (spec.md
    /// §4.4). Returns the number of routes the line was submitted to; `0`
    /// means unrouteable.
    pub async fn dispatch(&self, line: Bytes) -> usize {
        let inner = self.inner.lock().await;
        let text = String::from_utf8_lossy(&line);
        let mut delivered = 0;
        for key in &inner.order {
            let Some(handle) = inner.routes.get(key) else { continue };
            if handle.regex.is_match(&text) {
                // best-effort: a route whose relay task has died is treated
                // as unrouteable for this line rather than panicking the
                // dispatcher.
                if handle.relay.submit(line.clone()).await.is_ok() {
                    delivered += 1;
                }
                if inner.first_only {
                    break;
                }
            }
        }
        delivered
    }

    /// Shuts down every route, for process exit (spec.md §6.4).
    pub async fn shutdown_all(&self) {
        let mut inner = self.inner.lock().await;
        let routes = std::mem::take(&mut inner.routes);
        for (_, handle) in routes {
            handle.relay.shutdown().await;
            handle.join.abort();
        }
    }
}
