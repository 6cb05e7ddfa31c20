use chrono::NaiveDate;
use interview_booking::config::SchedulingConfig;
use interview_booking::scheduling::{
    Clock, EmployerId, InMemoryNotificationSink, InMemoryScheduleStore, JobId, JobPosting,
    RepositoryError, SchedulingEngine,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub(crate) type InMemoryEngine = SchedulingEngine<InMemoryScheduleStore, InMemoryNotificationSink>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Job posting registered with the in-memory directory at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SeedJob {
    pub(crate) employer_id: String,
    pub(crate) job_id: String,
    pub(crate) title: String,
}

impl SeedJob {
    fn posting(&self) -> JobPosting {
        JobPosting {
            id: JobId::new(self.job_id.clone()),
            employer_id: EmployerId::new(self.employer_id.clone()),
            title: self.title.clone(),
        }
    }
}

/// In-process store, sink and engine wired together.
pub(crate) struct InMemoryInfra {
    pub(crate) engine: InMemoryEngine,
    pub(crate) notifications: Arc<InMemoryNotificationSink>,
}

pub(crate) fn in_memory_engine(
    jobs: &[SeedJob],
    clock: Arc<dyn Clock>,
    config: SchedulingConfig,
) -> Result<InMemoryInfra, RepositoryError> {
    let store = Arc::new(InMemoryScheduleStore::new());
    for job in jobs {
        store.register_job(job.posting())?;
    }
    let notifications = Arc::new(InMemoryNotificationSink::new());
    let engine = SchedulingEngine::new(store, notifications.clone(), clock, config);
    Ok(InMemoryInfra {
        engine,
        notifications,
    })
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

pub(crate) fn parse_job(raw: &str) -> Result<SeedJob, String> {
    let mut parts = raw.trim().splitn(3, ':');
    let employer_id = parts.next().map(str::trim).unwrap_or_default();
    let job_id = parts.next().map(str::trim).unwrap_or_default();
    if employer_id.is_empty() || job_id.is_empty() {
        return Err(format!(
            "expected EMPLOYER_ID:JOB_ID[:TITLE], got '{raw}'"
        ));
    }
    let title = parts
        .next()
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .unwrap_or(job_id);

    Ok(SeedJob {
        employer_id: employer_id.to_string(),
        job_id: job_id.to_string(),
        title: title.to_string(),
    })
}
