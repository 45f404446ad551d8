// SPDX-License-Identifier: AGPL-3.0-or-later

use metricsrelayd::RelayError;

#[test]
fn duplicate_key_message_names_the_key() {
    let err = RelayError::DuplicateKey("prod".to_string());
    assert_eq!(err.to_string(), r#"route key "prod" already exists"#);
}

#[test]
fn unknown_key_message_names_the_key() {
    let err = RelayError::UnknownKey("ghost".to_string());
    assert_eq!(err.to_string(), r#"no such route "ghost""#);
}

#[test]
fn truncated_write_reports_both_byte_counts() {
    let err = RelayError::TruncatedWrite {
        addr: "1.2.3.4:2003".to_string(),
        written: 3,
        total: 10,
    };
    assert_eq!(err.to_string(), "truncated write to 1.2.3.4:2003: wrote 3 of 10 bytes");
}
