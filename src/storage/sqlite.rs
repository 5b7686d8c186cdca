//! SQLite-backed repository.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use rusqlite::{params, Connection, ErrorCode, Row};
use tokio::sync::mpsc;
use tracing::{info, instrument, trace};
use uuid::Uuid;

use super::{
    check_not_future, format_timestamp, parse_timestamp, MeasurementStream, Repository,
    StorageError,
};
use crate::clock::{Clock, SystemClock};
use crate::measurement::Measurement;

/// Rows buffered between the blocking reader and the async consumer.
const ROW_BUFFER: usize = 64;

/// How long a connection waits on a lock held by a concurrent writer.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS measurements (
    id        TEXT PRIMARY KEY,
    timestamp TEXT NOT NULL,
    download  INTEGER NOT NULL,
    upload    INTEGER NOT NULL
)";

const INSERT: &str =
    "INSERT INTO measurements (id, timestamp, download, upload) VALUES (?1, ?2, ?3, ?4)";

const SELECT_NEWEST_FIRST: &str =
    "SELECT id, timestamp, download, upload FROM measurements ORDER BY timestamp DESC, id DESC";

/// Repository storing measurements in a single SQLite file.
///
/// Holds only the path; every operation opens and closes its own connection.
#[derive(Clone)]
pub struct SqliteRepository {
    path: PathBuf,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for SqliteRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteRepository").field("path", &self.path).finish()
    }
}

impl SqliteRepository {
    /// Open or create a repository at `path`, making sure the table exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        Self::open_with_clock(path, Arc::new(SystemClock))
    }

    /// Like [`open`](Self::open) with an explicit clock for the write-time check.
    pub fn open_with_clock(
        path: impl AsRef<Path>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        create_schema(&path)?;
        Ok(Self { path, clock })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn connect(path: &Path) -> Result<Connection, StorageError> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(conn)
}

fn create_schema(path: &Path) -> Result<(), StorageError> {
    let conn = connect(path)?;
    conn.execute(CREATE_TABLE, [])?;
    Ok(())
}

fn insert(path: &Path, measurement: &Measurement) -> Result<(), StorageError> {
    let download = to_column(measurement.download_bytes_per_sec, "download")?;
    let upload = to_column(measurement.upload_bytes_per_sec, "upload")?;
    let conn = connect(path)?;
    let result = conn.execute(
        INSERT,
        params![
            measurement.id.to_string(),
            format_timestamp(measurement.timestamp),
            download,
            upload
        ],
    );
    match result {
        Ok(_) => Ok(()),
        Err(rusqlite::Error::SqliteFailure(err, _)) if err.code == ErrorCode::ConstraintViolation => {
            Err(StorageError::DuplicateId(measurement.id))
        }
        Err(e) => Err(e.into()),
    }
}

fn to_column(value: u64, column: &str) -> Result<i64, StorageError> {
    i64::try_from(value)
        .map_err(|_| StorageError::InvalidRecord(format!("{column} rate {value} exceeds the INTEGER range")))
}

fn from_row(row: &Row<'_>) -> Result<Measurement, StorageError> {
    let id: String = row.get(0)?;
    let timestamp: String = row.get(1)?;
    let download: i64 = row.get(2)?;
    let upload: i64 = row.get(3)?;

    let id = Uuid::parse_str(&id).map_err(|e| StorageError::corrupt_row(format!("id `{id}`: {e}")))?;
    let download = u64::try_from(download)
        .map_err(|_| StorageError::corrupt_row(format!("negative download rate {download}")))?;
    let upload = u64::try_from(upload)
        .map_err(|_| StorageError::corrupt_row(format!("negative upload rate {upload}")))?;

    Ok(Measurement::new(id, parse_timestamp(&timestamp)?, download, upload))
}

/// Push rows newest first until exhausted or the receiver goes away.
fn read_rows(
    path: &Path,
    tx: &mpsc::Sender<Result<Measurement, StorageError>>,
) -> Result<(), StorageError> {
    let conn = connect(path)?;
    let mut stmt = conn.prepare(SELECT_NEWEST_FIRST)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        if tx.blocking_send(from_row(row)).is_err() {
            trace!("reader dropped, closing cursor");
            break;
        }
    }
    Ok(())
}

#[async_trait]
impl Repository for SqliteRepository {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn ensure_schema(&self) -> Result<(), StorageError> {
        trace!("Start ensure_schema");
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || create_schema(&path)).await??;
        trace!("End ensure_schema");
        Ok(())
    }

    #[instrument(skip(self, measurement), fields(id = %measurement.id))]
    async fn write(&self, measurement: &Measurement) -> Result<(), StorageError> {
        info!("Start write");
        check_not_future(measurement, self.clock.now())?;
        let path = self.path.clone();
        let record = measurement.clone();
        tokio::task::spawn_blocking(move || insert(&path, &record)).await??;
        info!("End write");
        Ok(())
    }

    fn list_all(&self) -> MeasurementStream {
        let path = self.path.clone();
        stream::once(async move {
            trace!("Start list_all");
            let (tx, rx) = mpsc::channel(ROW_BUFFER);
            tokio::task::spawn_blocking(move || {
                if let Err(e) = read_rows(&path, &tx) {
                    let _ = tx.blocking_send(Err(e));
                }
            });
            rx
        })
        .flat_map(|rx| {
            stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) })
        })
        .boxed()
    }
}
