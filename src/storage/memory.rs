//! Non-durable repository kept in process memory.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use parking_lot::RwLock;

use super::{check_not_future, MeasurementStream, Repository, StorageError};
use crate::clock::{Clock, SystemClock};
use crate::measurement::Measurement;

/// Repository holding measurements in a vector.
///
/// Clones share the same records.
#[derive(Clone)]
pub struct InMemoryRepository {
    records: Arc<RwLock<Vec<Measurement>>>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: Arc::new(RwLock::new(Vec::new())),
            clock,
        }
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Copy of every stored record in insertion order.
    pub fn snapshot(&self) -> Vec<Measurement> {
        self.records.read().clone()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn ensure_schema(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn write(&self, measurement: &Measurement) -> Result<(), StorageError> {
        check_not_future(measurement, self.clock.now())?;
        let mut records = self.records.write();
        if records.iter().any(|m| m.id == measurement.id) {
            return Err(StorageError::DuplicateId(measurement.id));
        }
        records.push(measurement.clone());
        Ok(())
    }

    fn list_all(&self) -> MeasurementStream {
        let records = Arc::clone(&self.records);
        stream::once(async move {
            let mut rows = records.read().clone();
            rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));
            stream::iter(rows.into_iter().map(Ok::<_, StorageError>))
        })
        .flatten()
        .boxed()
    }
}
