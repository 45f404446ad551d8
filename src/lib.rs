// SPDX-License-Identifier: AGPL-3.0-or-later

//! `metricsrelayd` — a routing relay for the Graphite/Carbon plaintext
//! metrics protocol: classify ingress lines against an ordered set of
//! regular-expression routes and forward matches over persistent outbound
//! connections, spooling to disk while a sink is unreachable.

pub mod admin;
pub mod cfg;
pub mod dispatch;
pub mod error;
pub mod ingress;
pub mod routing;
pub mod spool;
pub mod telemetry;

pub use error::RelayError;
