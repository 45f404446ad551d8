// SPDX-License-Identifier: AGPL-3.0-or-later

//! Admin text control channel (spec.md §6.2): `route list`, `route add`,
//! `route del`, `route patt`, `help`, one connection per task, commands
//! parsed by simple whitespace splitting.

use std::sync::Arc;

use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
};

use crate::routing::RoutingTable;

const HELP_TEXT: &str = "\
commands:
  route list
  route add <key> <pattern> <addr> <spool-0-or-1>
  route del <key>
  route patt <key> <pattern>
  route addr <key> <addr>
  help
";

/// Accepts admin connections on `admin_addr` until the process shuts down.
pub async fn listen(admin_addr: &str, table: Arc<RoutingTable>) -> std::io::Result<()> {
    let listener = TcpListener::bind(admin_addr).await?;
    tracing::info!(addr = admin_addr, "admin listener bound");

    loop {
        let (socket, peer) = listener.accept().await?;
        let table = table.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(socket, table).await {
                tracing::debug!(%peer, error = %e, "admin connection ended");
            }
        });
    }
}

async fn handle_connection(socket: TcpStream, table: Arc<RoutingTable>) -> std::io::Result<()> {
    let (read_half, mut write_half) = socket.into_split();
    let mut lines = BufReader::new(read_half).lines();

    while let Some(line) = lines.next_line().await? {
        let reply = dispatch_command(&table, line.trim()).await;
        write_half.write_all(reply.as_bytes()).await?;
        if !reply.ends_with('\n') {
            write_half.write_all(b"\n").await?;
        }
    }
    Ok(())
}

async fn dispatch_command(table: &RoutingTable, line: &str) -> String {
    let mut parts = line.split_whitespace();
    match parts.next() {
        Some("help") | None => HELP_TEXT.to_string(),
        Some("route") => match parts.next() {
            Some("list") => render_list(table).await,
            Some("add") => {
                let (key, pattern, addr, spool) = (parts.next(), parts.next(), parts.next(), parts.next());
                match (key, pattern, addr, spool) {
                    (Some(key), Some(pattern), Some(addr), Some(spool)) => {
                        let spool = spool == "1";
                        match table.add(key, pattern, addr, spool).await {
                            Ok(()) => "OK\n".to_string(),
                            Err(e) => format!("ERR {e}\n"),
                        }
                    },
                    _ => "ERR usage: route add <key> <pattern> <addr> <spool-0-or-1>\n".to_string(),
                }
            },
            Some("del") => match parts.next() {
                Some(key) => match table.remove(key).await {
                    Ok(()) => "OK\n".to_string(),
                    Err(e) => format!("ERR {e}\n"),
                },
                None => "ERR usage: route del <key>\n".to_string(),
            },
            Some("patt") => match (parts.next(), parts.next()) {
                (Some(key), Some(pattern)) => {
                    match table.update(key, Some(pattern.to_string()), None).await {
                        Ok(()) => "OK\n".to_string(),
                        Err(e) => format!("ERR {e}\n"),
                    }
                },
                _ => "ERR usage: route patt <key> <pattern>\n".to_string(),
            },
            Some("addr") => match (parts.next(), parts.next()) {
                (Some(key), Some(addr)) => {
                    match table.update(key, None, Some(addr.to_string())).await {
                        Ok(()) => "OK\n".to_string(),
                        Err(e) => format!("ERR {e}\n"),
                    }
                },
                _ => "ERR usage: route addr <key> <addr>\n".to_string(),
            },
            _ => HELP_TEXT.to_string(),
        },
        Some(other) => format!("ERR unknown command: {other}\n{HELP_TEXT}"),
    }
}

async fn render_list(table: &RoutingTable) -> String {
    let snapshot = table.snapshot().await;
    if snapshot.is_empty() {
        return "OK 0 routes\n".to_string();
    }
    let mut out = format!("OK {} routes\n", snapshot.len());
    for route in snapshot {
        out.push_str(&format!(
            "{} pattern={} addr={} spool={}\n",
            route.key, route.pattern, route.addr, route.spool
        ));
    }
    out
}
