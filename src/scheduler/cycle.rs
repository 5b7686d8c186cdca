//! One measurement cycle: measure, report, store.

use tracing::{error, info, instrument, warn};

use super::Scheduler;
use crate::measurement::Measurement;
use crate::source::MeasurementError;
use crate::storage::StorageError;

/// What a single cycle ended with.
///
/// The timer ignores it; callers running a cycle by hand can inspect it.
#[derive(Debug)]
pub enum CycleOutcome {
    /// Measured, reported and stored.
    Recorded(Measurement),
    /// The source failed; nothing was reported or written.
    MeasurementFailed(MeasurementError),
    /// Reported but lost on write.
    StorageFailed {
        measurement: Measurement,
        error: StorageError,
    },
}

impl CycleOutcome {
    pub fn is_recorded(&self) -> bool {
        matches!(self, CycleOutcome::Recorded(_))
    }

    pub fn measurement(&self) -> Option<&Measurement> {
        match self {
            CycleOutcome::Recorded(m) | CycleOutcome::StorageFailed { measurement: m, .. } => Some(m),
            CycleOutcome::MeasurementFailed(_) => None,
        }
    }
}

impl Scheduler {
    /// Run one cycle. Never fails: every error ends the cycle and is logged.
    #[instrument(skip(self))]
    pub async fn run_cycle(&self) -> CycleOutcome {
        info!("Start cycle");

        let measurement = match self.source.measure().await {
            Ok(measurement) => measurement,
            Err(e) => {
                warn!(error = %e, "measurement failed, skipping cycle");
                return CycleOutcome::MeasurementFailed(e);
            }
        };

        self.reporter.measurement(&measurement, self.clock.now());

        if let Err(e) = self.repository.write(&measurement).await {
            error!(id = %measurement.id, error = %e, "failed to store measurement");
            return CycleOutcome::StorageFailed { measurement, error: e };
        }

        info!(
            id = %measurement.id,
            download = %measurement.download_mbits(),
            upload = %measurement.upload_mbits(),
            link = %measurement.result_link(),
            "End cycle"
        );
        CycleOutcome::Recorded(measurement)
    }
}
