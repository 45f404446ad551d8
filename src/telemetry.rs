// SPDX-License-Identifier: AGPL-3.0-or-later

//! Per-route telemetry counters (spec.md §6 "Telemetry counters").
//!
//! Counters are not a separate metrics pipeline here: they are structured
//! `tracing` fields, tagged `route` and `direction`, the way
//! `other_examples`'s signal-relay crate tags its per-route counters
//! alongside its structured logs rather than reaching for a dedicated
//! metrics crate.

pub fn record_in(route: &str) {
    tracing::info!(route, direction = "in", "ingress line accepted");
}

pub fn record_out(route: &str) {
    tracing::info!(route, direction = "out", "line delivered to sink");
}

pub fn record_spool(route: &str) {
    tracing::info!(route, direction = "spool", "line enqueued to disk");
}

pub fn record_drop(route: &str) {
    tracing::warn!(route, direction = "drop", "line dropped, disconnected and not spooling");
}

pub fn record_frame_error(max_line_bytes: usize) {
    tracing::warn!(
        direction = "frame_error",
        max_line_bytes,
        "ingress line exceeded framing limit, discarded"
    );
}

pub fn record_write_err(route: &str, err: &dyn std::fmt::Display) {
    tracing::warn!(route, unit = "Err", error = %err, "write to sink failed");
}

pub fn record_spool_err(route: &str, err: &dyn std::fmt::Display) {
    tracing::warn!(route, unit = "Err", error = %err, "spool operation failed, line lost");
}
