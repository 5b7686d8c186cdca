use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use parking_lot::Mutex;
use speedwatch::clock::Clock;
use speedwatch::measurement::Measurement;
use speedwatch::source::{MeasurementError, MeasurementSource};

/// Source that replays a fixed list of results, then fails with
/// [`MeasurementError::EmptyOutput`].
#[derive(Default)]
pub struct ScriptedSource {
    script: Mutex<VecDeque<Result<Measurement, MeasurementError>>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then_ok(self, measurement: Measurement) -> Self {
        self.script.lock().push_back(Ok(measurement));
        self
    }

    pub fn then_err(self, error: MeasurementError) -> Self {
        self.script.lock().push_back(Err(error));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MeasurementSource for ScriptedSource {
    async fn measure(&self) -> Result<Measurement, MeasurementError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .pop_front()
            .unwrap_or(Err(MeasurementError::EmptyOutput))
    }
}

/// Clock that only moves when told to.
pub struct FixedClock(Mutex<NaiveDateTime>);

impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Arc<Self> {
        Arc::new(Self(Mutex::new(now)))
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.0.lock() = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *self.0.lock()
    }
}

/// Report sink readable after the fact.
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.0.lock())
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
