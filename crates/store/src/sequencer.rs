//! Timestamp sequencer — strictly increasing `createdAt` per store.
//!
//! Freshly authored messages are stamped after everything already stored,
//! even when the clock stalls or goes backwards. Recalled (`memory`)
//! messages keep the timestamp they were saved with.

use chrono::{DateTime, Duration, Utc};
use threadloom_core::Provenance;
use tracing::debug;

/// Per-store timestamp state. Each message list owns exactly one.
#[derive(Debug, Clone, Default)]
pub struct TimestampSequencer {
    high_water: Option<DateTime<Utc>>,
}

impl TimestampSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest timestamp handed out so far.
    pub(crate) fn high_water_mark(&self) -> Option<DateTime<Utc>> {
        self.high_water
    }

    /// Timestamp for a new or updated message, using the wall clock as "now".
    ///
    /// `latest_stored` is the maximum `createdAt` currently in the store.
    pub fn next(
        &mut self,
        source: Provenance,
        supplied: Option<DateTime<Utc>>,
        latest_stored: Option<DateTime<Utc>>,
    ) -> DateTime<Utc> {
        self.next_at(source, supplied, latest_stored, Utc::now())
    }

    /// Same as [`next`](Self::next) with an explicit "now".
    pub fn next_at(
        &mut self,
        source: Provenance,
        supplied: Option<DateTime<Utc>>,
        latest_stored: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> DateTime<Utc> {
        if let Some(at) = supplied {
            if self.high_water.is_none() {
                self.high_water = Some(at);
                return at;
            }
            if source == Provenance::Memory {
                return at;
            }
        }

        let candidate = supplied.unwrap_or(now);
        let floor = match (latest_stored, self.high_water) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };

        match floor {
            Some(floor) if candidate <= floor => {
                let bumped = floor + Duration::milliseconds(1);
                debug!(%candidate, %bumped, "Timestamp not after latest message, bumping");
                self.high_water = Some(bumped);
                bumped
            }
            _ => {
                self.high_water = Some(candidate);
                candidate
            }
        }
    }
}
