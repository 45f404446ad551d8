// SPDX-License-Identifier: AGPL-3.0-or-later

use std::io::Write;

use metricsrelayd::cfg::config::{Config, TelemetryOutput};

#[test]
fn loads_full_config_from_disk() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    writeln!(
        file,
        r#"
listen_addr: "0.0.0.0:2003"
admin_addr: "127.0.0.1:2004"
spool_dir: "/var/spool/metricsrelay"
first_only: true
routing:
  channel_capacity: 500
ingress:
  max_line_bytes: 1024
routes:
  - key: prod
    pattern: '\.prod\.'
    addr: "5.6.7.8:2003"
    spool: true
  - key: catchall
    addr: "9.9.9.9:2003"
telemetry:
  output: stderr
  level: debug
"#
    )
    .expect("write fixture");

    let cfg = Config::load_from_file(file.path()).expect("load");

    assert_eq!(cfg.listen_addr, "0.0.0.0:2003");
    assert!(cfg.first_only);
    assert_eq!(cfg.routing.channel_capacity, 500);
    assert_eq!(cfg.ingress.max_line_bytes, 1024);
    assert_eq!(cfg.routes.len(), 2);
    assert_eq!(cfg.routes[1].pattern, "");
    assert_eq!(cfg.telemetry.output, TelemetryOutput::Stderr);
    assert_eq!(cfg.telemetry.level, "debug");
}
