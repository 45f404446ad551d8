// SPDX-License-Identifier: AGPL-3.0-or-later

#![allow(clippy::all)]

mod unit_tests {
    pub mod config_file_roundtrip;
    pub mod error_messages;
}
