//! The routing and delivery engine: dispatch table, per-route relay, and
//! connection lifecycle (spec.md §2, §4).

// SPDX-License-Identifier: AGPL-3.0-or-later

pub mod connection;
pub mod relay;
pub mod table;

pub use connection::Connection;
pub use relay::RouteRelay;
pub use table::{RouteSnapshot, RoutingTable};
