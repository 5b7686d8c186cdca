use chrono::NaiveDateTime;
use speedwatch::measurement::{Measurement, BYTES_PER_MBIT};
use uuid::Uuid;

pub struct TestMeasurementBuilder {
    id: Uuid,
    timestamp: NaiveDateTime,
    download_bytes_per_sec: u64,
    upload_bytes_per_sec: u64,
}

impl TestMeasurementBuilder {
    pub fn new(timestamp: NaiveDateTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp,
            download_bytes_per_sec: 100 * BYTES_PER_MBIT,
            upload_bytes_per_sec: 100 * BYTES_PER_MBIT,
        }
    }

    pub fn id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn download_mbits(mut self, mbits: u64) -> Self {
        self.download_bytes_per_sec = mbits * BYTES_PER_MBIT;
        self
    }

    pub fn upload_mbits(mut self, mbits: u64) -> Self {
        self.upload_bytes_per_sec = mbits * BYTES_PER_MBIT;
        self
    }

    pub fn build(self) -> Measurement {
        Measurement::new(self.id, self.timestamp, self.download_bytes_per_sec, self.upload_bytes_per_sec)
    }
}
