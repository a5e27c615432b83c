//! Scheduled trigger: fires once per interval boundary.

use async_trait::async_trait;
use chrono::TimeDelta;
use serde::Deserialize;

use cadence_domain::automation::{AutomationResult, Parameters, TriggerDefinition};
use cadence_domain::error::{ArgumentError, CadenceError, ValidationError};
use cadence_domain::time::{self, Timestamp};

use super::schema::{PropertySchema, PropertyType, TriggerSchema};
use super::{Trigger, TriggerHeader, delegate_header};

/// Parameter carrying the evaluation time, RFC 3339.
pub const UTC_NOW: &str = "utcNow";

/// How long after each boundary the trigger keeps reporting met.
pub const TOLERANCE: TimeDelta = TimeDelta::seconds(30);

/// Shortest accepted interval.
pub const MIN_INTERVAL: TimeDelta = TimeDelta::minutes(1);

/// Met for [`TOLERANCE`] after `start_time_utc + k * interval`, for any `k >= 0`.
///
/// The tolerance absorbs scheduler polling jitter: a poller that runs at
/// least every 30 seconds sees each boundary exactly once.
#[derive(Debug, Clone)]
pub struct ScheduledTrigger {
    header: TriggerHeader,
    start_time_utc: Timestamp,
    interval: TimeDelta,
}

#[derive(Debug, Deserialize)]
struct Settings {
    start_time_utc: Timestamp,
    interval_secs: i64,
}

impl ScheduledTrigger {
    pub const KIND: &'static str = "scheduled";

    /// # Errors
    ///
    /// Returns [`ValidationError::IntervalTooShort`] when `interval` is under a minute.
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        start_time_utc: Timestamp,
        interval: TimeDelta,
    ) -> Result<Self, ValidationError> {
        let header = TriggerHeader::new(id, description);
        if interval < MIN_INTERVAL {
            return Err(ValidationError::IntervalTooShort {
                trigger: header.id,
                seconds: interval.num_seconds(),
            });
        }
        Ok(Self {
            header,
            start_time_utc,
            interval,
        })
    }

    /// Build from a stored definition.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when the settings are missing, malformed
    /// or describe an interval under a minute.
    pub fn from_definition(definition: &TriggerDefinition) -> Result<Self, ValidationError> {
        let settings: Settings = definition.decode_settings()?;
        let interval = TimeDelta::try_seconds(settings.interval_secs).unwrap_or(
            if settings.interval_secs < 0 {
                TimeDelta::MIN
            } else {
                TimeDelta::MAX
            },
        );
        Self::new(
            definition.id.clone(),
            definition.description.clone(),
            settings.start_time_utc,
            interval,
        )
    }

    #[must_use]
    pub fn schema() -> TriggerSchema {
        TriggerSchema::new(Self::KIND)
            .required(
                "start_time_utc",
                PropertySchema::new(PropertyType::String, "Start time (UTC)")
                    .description("First boundary the schedule is aligned to")
                    .format("date-time"),
            )
            .required(
                "interval_secs",
                PropertySchema::new(PropertyType::Integer, "Interval")
                    .description("Seconds between boundaries, at least 60")
                    .format("seconds"),
            )
    }

    #[must_use]
    pub fn start_time_utc(&self) -> Timestamp {
        self.start_time_utc
    }

    #[must_use]
    pub fn interval(&self) -> TimeDelta {
        self.interval
    }

    /// Whether `now` falls in the tolerance window after a boundary.
    #[must_use]
    pub fn is_met_at(&self, now: Timestamp) -> bool {
        if now < self.start_time_utc {
            return false;
        }
        let elapsed = (now - self.start_time_utc).num_milliseconds();
        let interval = self.interval.num_milliseconds();
        elapsed % interval < TOLERANCE.num_milliseconds()
    }
}

/// Read and parse the `utcNow` parameter.
///
/// # Errors
///
/// [`ArgumentError::Missing`] when absent, [`ArgumentError::Malformed`] when
/// it is not an RFC 3339 timestamp.
pub fn utc_now(parameters: &Parameters) -> Result<Timestamp, ArgumentError> {
    let raw = parameters.get(UTC_NOW).ok_or_else(|| ArgumentError::Missing {
        name: UTC_NOW.to_string(),
    })?;
    time::parse(raw).map_err(|_| ArgumentError::Malformed {
        name: UTC_NOW.to_string(),
        value: raw.clone(),
    })
}

#[async_trait]
impl Trigger for ScheduledTrigger {
    delegate_header!();

    async fn execute(&self, parameters: &Parameters) -> Result<AutomationResult, CadenceError> {
        let now = utc_now(parameters)?;
        let met = self.is_met_at(now);
        tracing::trace!(trigger = %self.header.id, %now, met, "scheduled trigger evaluated");
        Ok(if met {
            AutomationResult::met(Parameters::new())
        } else {
            AutomationResult::not_met()
        })
    }
}
