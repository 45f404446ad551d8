// SPDX-License-Identifier: AGPL-3.0-or-later

//! `DurableQueue`: a single-producer/single-consumer durable on-disk FIFO
//! of opaque byte records (spec.md §4, §6.6).
//!
//! Records are length-prefixed (`u32` little-endian byte count followed by
//! the raw bytes) and appended to a segment file under the route's spool
//! directory. A segment rolls once it exceeds [`SEGMENT_BYTE_LIMIT`]; fully
//! drained segments are deleted. The read side replays from the last
//! fsync'd offset on startup — a crash between writing a batch of records
//! and the next offset fsync may replay that batch on the next open, which
//! is the documented, acceptable at-least-once behavior (spec.md §9, P5).

use std::{
    io::SeekFrom,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use bytes::Bytes;
use tokio::{
    fs::{self, File, OpenOptions},
    io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt},
    sync::{Notify, mpsc},
    task::JoinHandle,
};

/// Soft per-segment byte cap (spec.md §6: "≈ 200 MiB").
const SEGMENT_BYTE_LIMIT: u64 = 200 * 1024 * 1024;
/// Sync after this many records, whichever comes first with the byte/time
/// thresholds below (spec.md §6).
const SYNC_EVERY_RECORDS: u32 = 1000;
const SYNC_EVERY: Duration = Duration::from_secs(2);

/// A durable FIFO of opaque byte records backing one spooling route.
pub struct DurableQueue {
    dir: PathBuf,
    writer: File,
    write_segment: u64,
    bytes_in_segment: u64,
    records_since_sync: u32,
    last_sync: Instant,
    notify: std::sync::Arc<Notify>,
    read_rx: mpsc::UnboundedReceiver<Bytes>,
    reader_task: JoinHandle<()>,
}

impl DurableQueue {
    /// Opens (creating if absent) the durable queue backed by `dir`.
    pub async fn open(dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await?;

        let write_segment = latest_segment_index(&dir).await?.unwrap_or(0);
        let writer = OpenOptions::new()
            .create(true)
            .append(true)
            .open(segment_path(&dir, write_segment))
            .await?;
        let bytes_in_segment = writer.metadata().await?.len();

        let notify = std::sync::Arc::new(Notify::new());
        let (tx, read_rx) = mpsc::unbounded_channel();
        let reader_task = tokio::spawn(drain_loop(dir.clone(), notify.clone(), tx));

        Ok(Self {
            dir,
            writer,
            write_segment,
            bytes_in_segment,
            records_since_sync: 0,
            last_sync: Instant::now(),
            notify,
            read_rx,
            reader_task,
        })
    }

    /// Appends one record, durably. Blocks (awaits) until the write is
    /// issued; fsync happens on the batching schedule above, not on every
    /// call, per spec.md §6 queue parameters.
    pub async fn put(&mut self, record: &[u8]) -> std::io::Result<()> {
        let len = record.len() as u32;
        self.writer.write_all(&len.to_le_bytes()).await?;
        self.writer.write_all(record).await?;
        self.bytes_in_segment += 4 + record.len() as u64;
        self.records_since_sync += 1;

        let due_time = self.last_sync.elapsed() >= SYNC_EVERY;
        if self.records_since_sync >= SYNC_EVERY_RECORDS || due_time {
            self.writer.sync_data().await?;
            self.records_since_sync = 0;
            self.last_sync = Instant::now();
        }

        self.notify.notify_one();

        if self.bytes_in_segment >= SEGMENT_BYTE_LIMIT {
            self.roll_segment().await?;
        }

        Ok(())
    }

    async fn roll_segment(&mut self) -> std::io::Result<()> {
        self.writer.sync_data().await?;
        self.write_segment += 1;
        self.writer = OpenOptions::new()
            .create(true)
            .append(true)
            .open(segment_path(&self.dir, self.write_segment))
            .await?;
        self.bytes_in_segment = 0;
        self.records_since_sync = 0;
        self.last_sync = Instant::now();
        Ok(())
    }

    /// The non-blocking read side: a channel fed by the background drain
    /// task. Only the owning route relay ever holds this receiver,
    /// enforcing the single-consumer discipline (spec.md §5).
    pub fn read_channel(&mut self) -> &mut mpsc::UnboundedReceiver<Bytes> {
        &mut self.read_rx
    }
}

impl Drop for DurableQueue {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

fn segment_path(dir: &Path, index: u64) -> PathBuf {
    dir.join(format!("segment-{index}.log"))
}

fn offset_path(dir: &Path, index: u64) -> PathBuf {
    dir.join(format!("segment-{index}.offset"))
}

async fn latest_segment_index(dir: &Path) -> std::io::Result<Option<u64>> {
    let mut entries = fs::read_dir(dir).await?;
    let mut max = None;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some(rest) = name.strip_prefix("segment-").and_then(|s| s.strip_suffix(".log"))
            && let Ok(idx) = rest.parse::<u64>()
        {
            max = Some(max.map_or(idx, |m: u64| m.max(idx)));
        }
    }
    Ok(max)
}

async fn read_persisted_offset(dir: &Path, index: u64) -> u64 {
    match fs::read(offset_path(dir, index)).await {
        Ok(bytes) if bytes.len() == 8 => {
            u64::from_le_bytes(bytes.try_into().unwrap_or_default())
        },
        _ => 0,
    }
}

async fn persist_offset(dir: &Path, index: u64, offset: u64) -> std::io::Result<()> {
    fs::write(offset_path(dir, index), offset.to_le_bytes()).await
}

/// Background task: tails segment files in index order, forwarding
/// complete records over `tx` and persisting how far it has read so a
/// restart resumes from the last fsync'd offset rather than from zero.
async fn drain_loop(
    dir: PathBuf,
    notify: std::sync::Arc<Notify>,
    tx: mpsc::UnboundedSender<Bytes>,
) {
    let mut segment = match first_segment_index(&dir).await {
        Some(s) => s,
        None => 0,
    };

    loop {
        let path = segment_path(&dir, segment);
        let Ok(mut file) = File::open(&path).await else {
            tokio::time::sleep(Duration::from_millis(100)).await;
            continue;
        };
        let mut offset = read_persisted_offset(&dir, segment).await;
        if file.seek(SeekFrom::Start(offset)).await.is_err() {
            offset = 0;
        }

        loop {
            match read_one_record(&mut file).await {
                Ok(Some((record, consumed))) => {
                    offset += consumed;
                    if tx.send(Bytes::from(record)).is_err() {
                        return;
                    }
                    let _ = persist_offset(&dir, segment, offset).await;
                },
                Ok(None) => {
                    // Caught up to EOF of this segment.
                    if let Some(next) = next_segment_exists(&dir, segment).await {
                        let _ = fs::remove_file(&path).await;
                        let _ = fs::remove_file(offset_path(&dir, segment)).await;
                        segment = next;
                        break;
                    }
                    notify.notified().await;
                },
                Err(_) => {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    break;
                },
            }
        }
    }
}

async fn first_segment_index(dir: &Path) -> Option<u64> {
    let mut entries = fs::read_dir(dir).await.ok()?;
    let mut min = None;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some(rest) = name.strip_prefix("segment-").and_then(|s| s.strip_suffix(".log"))
            && let Ok(idx) = rest.parse::<u64>()
        {
            min = Some(min.map_or(idx, |m: u64| if idx < m { idx } else { m }));
        }
    }
    min
}

async fn next_segment_exists(dir: &Path, current: u64) -> Option<u64> {
    let candidate = current + 1;
    if fs::metadata(segment_path(dir, candidate)).await.is_ok() {
        Some(candidate)
    } else {
        None
    }
}

/// Reads one length-prefixed record from `file` at its current position.
/// Returns `Ok(None)` at a clean EOF (no partial length prefix pending).
async fn read_one_record(file: &mut File) -> std::io::Result<Option<(Vec<u8>, u64)>> {
    let mut len_buf = [0u8; 4];
    match file.read_exact(&mut len_buf).await {
        Ok(()) => {},
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }
    let len = u32::from_le_bytes(len_buf) as usize;
    let mut buf = vec![0u8; len];
    file.read_exact(&mut buf).await?;
    Ok(Some((buf, 4 + len as u64)))
}
