//! File-backed keyed transport
//!
//! Every key gets its own JSON-lines file under the root directory (`log_data_path`).
//! A dedicated writer thread owns the open files; `save` only queues the line, so
//! callers never wait on disk I/O. Reads, expiry sweeps and flushes go through the
//! same queue and therefore observe every line saved before them.

use crate::error::{DataManagerError, Result};
use crate::expiry::{LogExpiry, RetentionPolicy};
use crate::transport::{line_key, Transport};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

const FILE_EXTENSION: &str = "log";

/// One persisted line
#[derive(Debug, Serialize, Deserialize)]
struct StoredLine {
    recorded_at: DateTime<Utc>,
    line: String,
}

enum Command {
    Append {
        line: String,
        recorded_at: DateTime<Utc>,
    },
    Load {
        key: String,
        reply: oneshot::Sender<Result<Vec<String>>>,
    },
    Expire {
        policy: RetentionPolicy,
        reply: oneshot::Sender<Result<usize>>,
    },
    Flush {
        reply: oneshot::Sender<Result<()>>,
    },
}

#[derive(Debug)]
pub struct FileTransport {
    root: PathBuf,
    commands: mpsc::UnboundedSender<Command>,
    dropped: Arc<AtomicU64>,
}

impl FileTransport {
    /// Create `root` if needed and start the writer thread.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;

        let (commands, receiver) = mpsc::unbounded_channel();
        let dropped = Arc::new(AtomicU64::new(0));
        let files = LogFiles {
            root: root.clone(),
            handles: HashMap::new(),
            dropped: dropped.clone(),
        };
        std::thread::Builder::new()
            .name("datamanager-log-writer".to_string())
            .spawn(move || files.run(receiver))?;

        info!(root = %root.display(), "📁 File transport opened");
        Ok(Self {
            root,
            commands,
            dropped,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Queue a line with an explicit timestamp.
    pub fn save_at(&self, line: &str, recorded_at: DateTime<Utc>) {
        let command = Command::Append {
            line: line.to_string(),
            recorded_at,
        };
        if self.commands.send(command).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .map_err(|_| writer_stopped())?;
        response.await.map_err(|_| writer_stopped())
    }
}

fn writer_stopped() -> DataManagerError {
    DataManagerError::LogStore("log writer thread stopped".to_string())
}

#[async_trait]
impl Transport for FileTransport {
    fn name(&self) -> &'static str {
        "file"
    }

    fn save(&self, line: &str) {
        self.save_at(line, Utc::now());
    }

    async fn load(&self, key: &str) -> Result<Vec<String>> {
        self.request(|reply| Command::Load {
            key: key.to_string(),
            reply,
        })
        .await?
    }

    fn dropped_lines(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    async fn flush(&self) -> Result<()> {
        self.request(|reply| Command::Flush { reply }).await?
    }
}

#[async_trait]
impl LogExpiry for FileTransport {
    async fn clear_expired(&self, policy: &RetentionPolicy) -> Result<usize> {
        let policy = *policy;
        self.request(|reply| Command::Expire { policy, reply })
            .await?
    }
}

/// State owned by the writer thread
struct LogFiles {
    root: PathBuf,
    handles: HashMap<String, File>,
    dropped: Arc<AtomicU64>,
}

impl LogFiles {
    fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = commands.blocking_recv() {
            match command {
                Command::Append { line, recorded_at } => {
                    if let Err(e) = self.append(line, recorded_at) {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        warn!(error = %e, "Failed to append log line");
                    }
                }
                Command::Load { key, reply } => {
                    let _ = reply.send(self.read(&key));
                }
                Command::Expire { policy, reply } => {
                    let _ = reply.send(self.expire(&policy, Utc::now()));
                }
                Command::Flush { reply } => {
                    let _ = reply.send(self.flush());
                }
            }
        }
        debug!(root = %self.root.display(), "Log writer thread exiting");
    }

    fn append(&mut self, line: String, recorded_at: DateTime<Utc>) -> Result<()> {
        let key = line_key(&line).to_string();
        let mut record = encode(&StoredLine { recorded_at, line })?;
        record.push('\n');

        let file = match self.handles.entry(key) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let path = self.root.join(file_name(entry.key()));
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                entry.insert(file)
            }
        };
        file.write_all(record.as_bytes())?;
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Vec<String>> {
        let path = self.root.join(file_name(key));
        match read_records(&path) {
            Ok(records) => Ok(records.into_iter().map(|record| record.line).collect()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn expire(&mut self, policy: &RetentionPolicy, now: DateTime<Utc>) -> Result<usize> {
        // Rewritten files are replaced by rename, so cached append handles go stale.
        self.handles.clear();

        let cutoff = policy.cutoff(now);
        let mut removed = 0;
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(FILE_EXTENSION) {
                continue;
            }

            let records = read_records(&path)?;
            let expired =
                policy.expired_prefix(records.iter().map(|record| record.recorded_at), cutoff);
            if expired == 0 {
                continue;
            }
            if expired == records.len() {
                fs::remove_file(&path)?;
            } else {
                rewrite(&path, &records[expired..])?;
            }
            removed += expired;
        }
        Ok(removed)
    }

    fn flush(&mut self) -> Result<()> {
        for file in self.handles.values_mut() {
            file.flush()?;
        }
        Ok(())
    }
}

fn encode(record: &StoredLine) -> Result<String> {
    serde_json::to_string(record).map_err(|e| DataManagerError::LogStore(e.to_string()))
}

/// Records in file order. Lines that do not parse are skipped.
fn read_records(path: &Path) -> io::Result<Vec<StoredLine>> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for raw in reader.lines() {
        let raw = raw?;
        if raw.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<StoredLine>(&raw) {
            Ok(record) => records.push(record),
            Err(e) => warn!(path = %path.display(), error = %e, "Skipping malformed log record"),
        }
    }
    Ok(records)
}

fn rewrite(path: &Path, records: &[StoredLine]) -> Result<()> {
    let staging = path.with_extension(format!("{FILE_EXTENSION}.tmp"));
    let mut writer = BufWriter::new(File::create(&staging)?);
    for record in records {
        writer.write_all(encode(record)?.as_bytes())?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    drop(writer);
    fs::rename(&staging, path)?;
    Ok(())
}

/// File name for a key: ASCII alphanumerics, `-` and `_` are kept, every other byte is
/// percent-encoded. The empty key maps to `@`.
fn file_name(key: &str) -> String {
    if key.is_empty() {
        return format!("@.{FILE_EXTENSION}");
    }
    let mut name = String::with_capacity(key.len() + FILE_EXTENSION.len() + 1);
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            name.push(char::from(byte));
        } else {
            name.push_str(&format!("%{byte:02X}"));
        }
    }
    name.push('.');
    name.push_str(FILE_EXTENSION);
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_load_returns_lines_oldest_first() {
        let dir = tempdir().unwrap();
        let transport = FileTransport::open(dir.path()).unwrap();
        transport.save("users: first");
        transport.save("orders: other");
        transport.save("users: second");

        assert_eq!(
            transport.load("users").await.unwrap(),
            vec!["users: first".to_string(), "users: second".to_string()]
        );
        assert!(transport.load("missing").await.unwrap().is_empty());
        assert_eq!(transport.dropped_lines(), 0);
    }

    #[tokio::test]
    async fn test_lines_survive_reopen() {
        let dir = tempdir().unwrap();
        {
            let transport = FileTransport::open(dir.path()).unwrap();
            transport.save("audit: login");
            transport.save("no key");
            transport.flush().await.unwrap();
        }

        let reopened = FileTransport::open(dir.path()).unwrap();
        assert_eq!(
            reopened.load("audit").await.unwrap(),
            vec!["audit: login".to_string()]
        );
        assert_eq!(reopened.load("").await.unwrap(), vec!["no key".to_string()]);
    }

    #[tokio::test]
    async fn test_open_creates_missing_root() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("nested").join("logs");

        let transport = FileTransport::open(&root).unwrap();
        transport.save("k: v");
        transport.flush().await.unwrap();

        assert!(root.join("k.log").is_file());
        assert_eq!(transport.root(), root.as_path());
    }

    #[tokio::test]
    async fn test_expiry_keeps_minimum_lines() {
        let dir = tempdir().unwrap();
        let transport = FileTransport::open(dir.path()).unwrap();
        let old = Utc::now() - Duration::days(30);
        for index in 0..5 {
            transport.save_at(&format!("users: old {index}"), old);
        }
        transport.save("users: fresh");

        let policy = RetentionPolicy {
            outdate_days: 10,
            min_log_num: 3,
        };
        assert_eq!(transport.clear_expired(&policy).await.unwrap(), 3);
        assert_eq!(
            transport.load("users").await.unwrap(),
            vec![
                "users: old 3".to_string(),
                "users: old 4".to_string(),
                "users: fresh".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_expiry_removes_empty_files_and_appends_resume() {
        let dir = tempdir().unwrap();
        let transport = FileTransport::open(dir.path()).unwrap();
        transport.save_at("gone: x", Utc::now() - Duration::days(11));

        let policy = RetentionPolicy {
            outdate_days: 10,
            min_log_num: 0,
        };
        assert_eq!(transport.clear_expired(&policy).await.unwrap(), 1);
        assert!(!dir.path().join("gone.log").exists());

        transport.save("gone: back");
        assert_eq!(
            transport.load("gone").await.unwrap(),
            vec!["gone: back".to_string()]
        );
    }

    #[tokio::test]
    async fn test_malformed_records_are_skipped() {
        let dir = tempdir().unwrap();
        let valid = encode(&StoredLine {
            recorded_at: Utc::now(),
            line: "jobs: ran".to_string(),
        })
        .unwrap();
        fs::write(dir.path().join("jobs.log"), format!("not json\n{valid}\n\n")).unwrap();

        let transport = FileTransport::open(dir.path()).unwrap();
        assert_eq!(
            transport.load("jobs").await.unwrap(),
            vec!["jobs: ran".to_string()]
        );
    }

    #[test]
    fn test_key_file_names() {
        assert_eq!(file_name("users"), "users.log");
        assert_eq!(file_name("shard_1-a"), "shard_1-a.log");
        assert_eq!(file_name("a/b c"), "a%2Fb%20c.log");
        assert_eq!(file_name("../etc"), "%2E%2E%2Fetc.log");
        assert_eq!(file_name(""), "@.log");
    }
}
