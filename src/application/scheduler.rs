//! # Scheduler Service
//!
//! Runs feature methods on a cron pattern or a fixed interval. Each scheduler is one
//! tokio task keyed by `feature.method`; re-registering a key aborts the old task before
//! the new one is spawned. Every execution runs on its own task, so a failing or slow
//! run never stops later ticks and aborting a job never interrupts a run in progress.

use chrono::{DateTime, Local, TimeZone, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::application::registry::SchedulerRegistration;
use crate::domain::errors::SchedulerError;
use crate::domain::types::MethodCall;

/// Cron jobs of this feature fire in local time. Everything else is UTC.
pub const LOCAL_TIME_FEATURE: &str = "system";

/// Clock a cron pattern is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CronZone {
    Utc,
    Local,
}

impl CronZone {
    pub fn for_feature(feature: &str) -> Self {
        if feature == LOCAL_TIME_FEATURE {
            Self::Local
        } else {
            Self::Utc
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Trigger {
    Cron { pattern: String, zone: CronZone },
    Every(Duration),
}

struct ActiveScheduler {
    trigger: Trigger,
    handle: JoinHandle<()>,
}

enum Plan {
    Cron(cron::Schedule),
    Every(Duration),
}

#[derive(Default)]
pub struct SchedulerService {
    jobs: Mutex<HashMap<String, ActiveScheduler>>,
}

/// Parse a 5 or 6 field cron expression. Five fields get a leading `0` seconds field.
pub fn parse_cron(pattern: &str) -> Result<cron::Schedule, SchedulerError> {
    let normalized = match pattern.split_whitespace().count() {
        5 => format!("0 {}", pattern.trim()),
        _ => pattern.trim().to_string(),
    };
    cron::Schedule::from_str(&normalized).map_err(|e| SchedulerError::InvalidCron {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

impl SchedulerService {
    pub fn new() -> Self {
        Self::default()
    }

    fn plan(registration: &SchedulerRegistration) -> Result<(Plan, Trigger), SchedulerError> {
        let options = &registration.options;
        match (&options.pattern, options.interval) {
            (Some(pattern), interval) => {
                if interval.is_some() {
                    tracing::warn!(
                        key = %registration.key(),
                        "Scheduler has both a cron pattern and an interval, using the pattern"
                    );
                }
                let schedule = parse_cron(pattern)?;
                let trigger = Trigger::Cron {
                    pattern: pattern.clone(),
                    zone: CronZone::for_feature(&registration.feature),
                };
                Ok((Plan::Cron(schedule), trigger))
            }
            (None, Some(period)) if period.is_zero() => Err(SchedulerError::ZeroInterval(registration.key())),
            (None, Some(period)) => Ok((Plan::Every(period), Trigger::Every(period))),
            (None, None) => Err(SchedulerError::MissingTrigger(registration.key())),
        }
    }

    /// Start the job for `registration`. Returns `true` if it replaced a running job.
    ///
    /// A configuration error leaves any existing job under the same key untouched.
    pub fn register_scheduler(&self, registration: SchedulerRegistration) -> Result<bool, SchedulerError> {
        let (plan, trigger) = Self::plan(&registration)?;
        let key = registration.key();

        let mut jobs = self.jobs.lock();
        let replaced = match jobs.remove(&key) {
            Some(old) => {
                old.handle.abort();
                tracing::info!(key = %key, "Stopped previous scheduler");
                true
            }
            None => false,
        };

        let handle = match (plan, &trigger) {
            (Plan::Every(period), _) => tokio::spawn(run_interval(registration, period)),
            (Plan::Cron(schedule), Trigger::Cron { zone: CronZone::Local, .. }) => {
                tokio::spawn(run_cron(registration, schedule, Local))
            }
            (Plan::Cron(schedule), _) => tokio::spawn(run_cron(registration, schedule, Utc)),
        };
        tracing::info!(key = %key, trigger = ?trigger, "Scheduler started");
        jobs.insert(key, ActiveScheduler { trigger, handle });
        Ok(replaced)
    }

    pub fn unregister_scheduler(&self, key: &str) -> bool {
        match self.jobs.lock().remove(key) {
            Some(job) => {
                job.handle.abort();
                tracing::debug!(key = %key, "Scheduler stopped");
                true
            }
            None => false,
        }
    }

    pub fn stop_all(&self) {
        let jobs: Vec<_> = self.jobs.lock().drain().collect();
        for (_, job) in &jobs {
            job.handle.abort();
        }
        if !jobs.is_empty() {
            tracing::info!(count = jobs.len(), "Stopped all schedulers");
        }
    }

    pub fn active_keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.jobs.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn trigger(&self, key: &str) -> Option<Trigger> {
        self.jobs.lock().get(key).map(|j| j.trigger.clone())
    }

    pub fn is_active(&self, key: &str) -> bool {
        self.jobs.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for SchedulerService {
    fn drop(&mut self) {
        for (_, job) in self.jobs.get_mut().drain() {
            job.handle.abort();
        }
    }
}

fn fire(registration: &SchedulerRegistration) {
    let registration = registration.clone();
    tokio::spawn(async move {
        if let Err(e) = registration.handler.invoke(MethodCall::Scheduled).await {
            tracing::error!(key = %registration.key(), "Scheduled run failed: {:#}", e);
        }
    });
}

async fn run_interval(registration: SchedulerRegistration, period: Duration) {
    if registration.options.run_on_init {
        fire(&registration);
    }
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        fire(&registration);
    }
}

async fn run_cron<Tz>(registration: SchedulerRegistration, schedule: cron::Schedule, tz: Tz)
where
    Tz: TimeZone + Send + 'static,
    Tz::Offset: Send,
{
    if registration.options.run_on_init {
        fire(&registration);
    }
    let mut cursor: DateTime<Tz> = Utc::now().with_timezone(&tz);
    loop {
        let Some(next) = schedule.after(&cursor).next() else {
            tracing::info!(key = %registration.key(), "Cron pattern has no further fire times");
            return;
        };
        let wait = (next.with_timezone(&Utc) - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO);
        tokio::time::sleep(wait).await;
        fire(&registration);
        cursor = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::feature::{BoundHandler, Feature};
    use crate::application::registry::SchedulerOptions;
    use crate::application::test_support::Recorder;
    use std::sync::Arc;

    fn registration(feature: &Arc<dyn Feature>, method: &'static str, options: SchedulerOptions) -> SchedulerRegistration {
        SchedulerRegistration {
            feature: "jobs".into(),
            method,
            options,
            handler: BoundHandler::new(feature.clone(), method),
        }
    }

    fn recorder() -> (Arc<dyn Feature>, Arc<parking_lot::Mutex<Vec<String>>>) {
        let (feature, calls) = Recorder::new("jobs");
        (Arc::new(feature), calls)
    }

    #[test]
    fn test_parse_cron_accepts_five_and_six_fields() {
        assert!(parse_cron("*/5 * * * *").is_ok());
        assert!(parse_cron("0 30 9 * * Mon-Fri").is_ok());
        let err = parse_cron("every tuesday").unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidCron { pattern, .. } if pattern == "every tuesday"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_ticks_and_run_on_init() {
        let (feature, calls) = recorder();
        let service = SchedulerService::new();
        service
            .register_scheduler(registration(
                &feature,
                "tick",
                SchedulerOptions::every(Duration::from_secs(10)).run_on_init(),
            ))
            .unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(calls.lock().len(), 1);

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(calls.lock().len(), 3);
        service.stop_all();
    }

    #[tokio::test(start_paused = true)]
    async fn test_reregistration_replaces_previous_job() {
        let (feature, calls) = recorder();
        let service = SchedulerService::new();
        let options = SchedulerOptions::every(Duration::from_secs(10));

        assert!(!service.register_scheduler(registration(&feature, "tick", options.clone())).unwrap());
        assert!(service.register_scheduler(registration(&feature, "tick", options)).unwrap());
        assert_eq!(service.active_keys(), vec!["jobs.tick"]);

        tokio::time::sleep(Duration::from_secs(15)).await;
        // Only one live job fires.
        assert_eq!(calls.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_run_does_not_stop_schedule() {
        let (feature, calls) = recorder();
        let service = SchedulerService::new();
        service
            .register_scheduler(registration(&feature, "explode", SchedulerOptions::every(Duration::from_secs(5))))
            .unwrap();

        tokio::time::sleep(Duration::from_secs(16)).await;
        assert_eq!(calls.lock().len(), 3);
        assert!(service.is_active("jobs.explode"));
    }

    #[tokio::test]
    async fn test_configuration_errors_create_no_job() {
        let (feature, _) = recorder();
        let service = SchedulerService::new();

        let err = service
            .register_scheduler(registration(&feature, "tick", SchedulerOptions::default()))
            .unwrap_err();
        assert_eq!(err, SchedulerError::MissingTrigger("jobs.tick".into()));

        let err = service
            .register_scheduler(registration(&feature, "tick", SchedulerOptions::cron("61 * * * *")))
            .unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidCron { .. }));

        let err = service
            .register_scheduler(registration(&feature, "tick", SchedulerOptions::every(Duration::ZERO)))
            .unwrap_err();
        assert_eq!(err, SchedulerError::ZeroInterval("jobs.tick".into()));
        assert!(service.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pattern_wins_over_interval() {
        let (feature, _) = recorder();
        let service = SchedulerService::new();
        let options = SchedulerOptions {
            pattern: Some("0 0 * * *".into()),
            interval: Some(Duration::from_secs(1)),
            run_on_init: false,
        };
        service.register_scheduler(registration(&feature, "tick", options)).unwrap();
        assert_eq!(
            service.trigger("jobs.tick"),
            Some(Trigger::Cron {
                pattern: "0 0 * * *".into(),
                zone: CronZone::Utc,
            })
        );
    }

    #[test]
    fn test_only_system_feature_uses_local_time() {
        assert_eq!(CronZone::for_feature(LOCAL_TIME_FEATURE), CronZone::Local);
        assert_eq!(CronZone::for_feature("jobs"), CronZone::Utc);
        assert_eq!(CronZone::for_feature("System"), CronZone::Utc);
        assert_eq!(CronZone::for_feature(""), CronZone::Utc);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cron_trigger_records_zone() {
        let (feature, _) = recorder();
        let service = SchedulerService::new();
        let mut local = registration(&feature, "tick", SchedulerOptions::cron("*/5 * * * *"));
        local.feature = LOCAL_TIME_FEATURE.into();
        service.register_scheduler(local).unwrap();
        service
            .register_scheduler(registration(&feature, "tock", SchedulerOptions::cron("*/5 * * * *")))
            .unwrap();

        assert!(matches!(
            service.trigger("system.tick"),
            Some(Trigger::Cron { zone: CronZone::Local, .. })
        ));
        assert!(matches!(
            service.trigger("jobs.tock"),
            Some(Trigger::Cron { zone: CronZone::Utc, .. })
        ));
        service.stop_all();
    }

    #[tokio::test(start_paused = true)]
    async fn test_unregister_and_stop_all() {
        let (feature, calls) = recorder();
        let service = SchedulerService::new();
        service
            .register_scheduler(registration(&feature, "tick", SchedulerOptions::every(Duration::from_secs(5))))
            .unwrap();
        service
            .register_scheduler(registration(&feature, "other", SchedulerOptions::every(Duration::from_secs(5))))
            .unwrap();

        assert!(service.unregister_scheduler("jobs.tick"));
        assert!(!service.unregister_scheduler("jobs.tick"));
        service.stop_all();
        assert!(service.is_empty());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(calls.lock().is_empty());
    }
}
