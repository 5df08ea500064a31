//! The scheduler API (spec §6): list/get/enable/disable/update-config/run-now.

use async_trait::async_trait;
use thiserror::Error;

use relaybridge_model::{JobTrigger, ScheduledJob, ScheduledJobId};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerApiError {
    #[error("job not found: {0}")]
    NotFound(ScheduledJobId),

    #[error("job name {0:?} is already in use")]
    DuplicateName(String),

    #[error("invalid trigger: {0}")]
    InvalidTrigger(String),
}

pub type Result<T> = std::result::Result<T, SchedulerApiError>;

/// Validates a trigger independent of persistence (spec §6: "cron expression
/// is non-empty; interval requires at least one positive unit").
pub fn validate_trigger(trigger: &JobTrigger) -> Result<()> {
    match trigger {
        JobTrigger::Cron { expression } if expression.trim().is_empty() => {
            Err(SchedulerApiError::InvalidTrigger(
                "cron expression must not be empty".into(),
            ))
        }
        JobTrigger::Interval { days, hours, minutes, seconds, .. }
            if *days == 0 && *hours == 0 && *minutes == 0 && *seconds == 0 =>
        {
            Err(SchedulerApiError::InvalidTrigger(
                "interval trigger requires at least one positive unit".into(),
            ))
        }
        _ => Ok(()),
    }
}

#[async_trait]
pub trait SchedulerApi: Send + Sync {
    async fn list(&self) -> Result<Vec<ScheduledJob>>;

    async fn get(&self, id: ScheduledJobId) -> Result<ScheduledJob>;

    async fn set_enabled(&self, id: ScheduledJobId, enabled: bool) -> Result<()>;

    async fn update_trigger(&self, id: ScheduledJobId, trigger: JobTrigger) -> Result<()>;

    async fn run_now(&self, id: ScheduledJobId) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_cron_expression() {
        let trigger = JobTrigger::Cron { expression: "  ".into() };
        assert!(validate_trigger(&trigger).is_err());
    }

    #[test]
    fn rejects_all_zero_interval() {
        let trigger = JobTrigger::Interval {
            days: 0,
            hours: 0,
            minutes: 0,
            seconds: 0,
            run_immediately: false,
        };
        assert!(validate_trigger(&trigger).is_err());
    }

    #[test]
    fn accepts_single_positive_unit() {
        let trigger = JobTrigger::Interval {
            days: 0,
            hours: 0,
            minutes: 5,
            seconds: 0,
            run_immediately: false,
        };
        assert!(validate_trigger(&trigger).is_ok());
    }
}
