//! The schedule poller.
//!
//! A single ticker, not one timer per schedule: per-schedule timers don't
//! survive a restart cleanly, whereas a periodic `find_due_before` scan is
//! trivially resumable — the persisted `next_due_at` is the only state
//! that matters. The start/stop/cancellation shape mirrors
//! `operion-sources-kafka`'s `ConsumerManager`, generalized from "one task
//! per broker fingerprint" to "one task, period".

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use operion_sources_core::callback::{SourceEvent, SourceEventCallback};
use operion_sources_core::model::{ProviderId, Schedule};
use operion_sources_core::repository::ScheduleRepository;
use serde_json::json;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::SchedulerError;

const TICK_INTERVAL: Duration = Duration::from_secs(60);
const STOP_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Created,
    Running,
    Stopping,
    Stopped,
}

/// Drives the one-minute due-schedule scan.
pub struct SchedulePoller {
    repository: Arc<dyn ScheduleRepository>,
    callback: SourceEventCallback,
    cancel: CancellationToken,
    state: RwLock<PollerState>,
    task: RwLock<Option<JoinHandle<()>>>,
}

impl SchedulePoller {
    pub fn new(repository: Arc<dyn ScheduleRepository>, callback: SourceEventCallback) -> Self {
        Self {
            repository,
            callback,
            cancel: CancellationToken::new(),
            state: RwLock::new(PollerState::Created),
            task: RwLock::new(None),
        }
    }

    pub async fn state(&self) -> PollerState {
        *self.state.read().await
    }

    /// Idempotent: a second call while already running is a no-op.
    pub async fn start(&self) {
        let mut state = self.state.write().await;
        if *state == PollerState::Running {
            return;
        }

        let repository = self.repository.clone();
        let callback = self.callback.clone();
        let cancel = self.cancel.clone();
        let handle = tokio::spawn(async move {
            tick_loop(repository, callback, cancel).await;
        });
        *self.task.write().await = Some(handle);
        *state = PollerState::Running;
    }

    /// Idempotent: cancels the ticker and waits up to [`STOP_GRACE`] for
    /// the in-flight tick (if any) to finish.
    pub async fn stop(&self) {
        {
            let mut state = self.state.write().await;
            if *state == PollerState::Stopped || *state == PollerState::Stopping {
                return;
            }
            *state = PollerState::Stopping;
        }

        self.cancel.cancel();
        if let Some(handle) = self.task.write().await.take() {
            if tokio::time::timeout(STOP_GRACE, handle).await.is_err() {
                tracing::warn!("schedule poller did not stop within the graceful shutdown grace period");
            }
        }
        *self.state.write().await = PollerState::Stopped;
    }
}

async fn tick_loop(repository: Arc<dyn ScheduleRepository>, callback: SourceEventCallback, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(TICK_INTERVAL);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("schedule poller stopping");
                return;
            }
            _ = interval.tick() => {
                if let Err(err) = process_due(&repository, &callback).await {
                    tracing::error!(%err, "schedule poller tick failed");
                }
            }
        }
    }
}

/// One scan-and-fire pass.
///
/// Due schedules are processed sequentially, one at a time — no
/// parallel dispatch. A schedule whose callback fails keeps its old
/// `next_due_at` so it is picked up again on the next tick (at-least-once);
/// only a successful callback is followed by `update_next_due_at` + `save`.
/// At most one event fires per schedule per tick even if multiple cron
/// occurrences fell due in the meantime — there is no catch-up replay.
async fn process_due(repository: &Arc<dyn ScheduleRepository>, callback: &SourceEventCallback) -> Result<(), SchedulerError> {
    let now = Utc::now();
    let due = repository.find_due_before(now).await?;

    for mut schedule in due {
        if let Err(err) = fire_and_advance(repository, callback, &mut schedule, now).await {
            tracing::error!(schedule_id = %schedule.id, %err, "failed to process due schedule");
        }
    }
    Ok(())
}

async fn fire_and_advance(
    repository: &Arc<dyn ScheduleRepository>,
    callback: &SourceEventCallback,
    schedule: &mut Schedule,
    now: chrono::DateTime<Utc>,
) -> Result<(), SchedulerError> {
    let event = build_event(schedule, now);
    if let Err(err) = callback.invoke(event).await {
        tracing::error!(schedule_id = %schedule.id, %err, "schedule callback failed, next_due_at left unchanged");
        return Ok(());
    }

    schedule
        .update_next_due_at(now)
        .map_err(|err| SchedulerError::Persistence(operion_sources_core::error::PersistenceError::Other(err.to_string())))?;
    repository.save(schedule).await?;
    Ok(())
}

fn build_event(schedule: &Schedule, now: chrono::DateTime<Utc>) -> SourceEvent {
    let payload = json!({
        "cron_expression": schedule.cron_expression,
        "due_at": schedule.next_due_at.format("%Y-%m-%d %H:%M").to_string(),
        "published_at": now.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
    });

    SourceEvent {
        provider: ProviderId::Scheduler,
        source_id: schedule.source_id().to_string(),
        external_id: schedule.external_id,
        event_type: "schedule_due",
        occurred_at: now,
        payload,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use operion_sources_core::callback::CallbackError;
    use operion_sources_core::error::PersistenceError;
    use operion_sources_core::repository::{HealthCheckable, SourceRepository};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use uuid::Uuid;

    struct FakeRepo {
        schedules: Mutex<Vec<Schedule>>,
    }

    #[async_trait]
    impl SourceRepository<Schedule> for FakeRepo {
        async fn find_by_id(&self, id: &str) -> Result<Option<Schedule>, PersistenceError> {
            Ok(self.schedules.lock().unwrap().iter().find(|s| s.id == id).cloned())
        }
        async fn find_by_external_id(&self, external_id: Uuid) -> Result<Option<Schedule>, PersistenceError> {
            Ok(self.schedules.lock().unwrap().iter().find(|s| s.external_id == external_id).cloned())
        }
        async fn find_all(&self) -> Result<Vec<Schedule>, PersistenceError> {
            Ok(self.schedules.lock().unwrap().clone())
        }
        async fn find_all_active(&self) -> Result<Vec<Schedule>, PersistenceError> {
            Ok(self.schedules.lock().unwrap().iter().filter(|s| s.active).cloned().collect())
        }
        async fn save(&self, source: &Schedule) -> Result<(), PersistenceError> {
            let mut schedules = self.schedules.lock().unwrap();
            if let Some(existing) = schedules.iter_mut().find(|s| s.id == source.id) {
                *existing = source.clone();
            }
            Ok(())
        }
        async fn delete(&self, _id: &str) -> Result<(), PersistenceError> {
            Ok(())
        }
    }

    #[async_trait]
    impl ScheduleRepository for FakeRepo {
        async fn find_due_before(&self, before: chrono::DateTime<Utc>) -> Result<Vec<Schedule>, PersistenceError> {
            Ok(self
                .schedules
                .lock()
                .unwrap()
                .iter()
                .filter(|s| s.active && s.next_due_at <= before)
                .cloned()
                .collect())
        }
    }

    #[async_trait]
    impl HealthCheckable for FakeRepo {
        async fn health_check(&self) -> bool {
            true
        }
    }

    fn due_schedule() -> Schedule {
        let mut s = Schedule::new("sch1", json!({"cron_expression": "*/1 * * * *"})).unwrap();
        s.next_due_at = Utc::now() - chrono::Duration::minutes(1);
        s
    }

    #[tokio::test]
    async fn successful_callback_advances_next_due_at() {
        let schedule = due_schedule();
        let original_due = schedule.next_due_at;
        let repo: Arc<dyn ScheduleRepository> = Arc::new(FakeRepo {
            schedules: Mutex::new(vec![schedule]),
        });
        let callback = SourceEventCallback::new(|_event| async { Ok(()) });

        process_due(&repo, &callback).await.unwrap();

        let saved = repo.find_by_id("sch1").await.unwrap().unwrap();
        assert!(saved.next_due_at > original_due);
    }

    #[tokio::test]
    async fn failed_callback_leaves_next_due_at_unchanged() {
        let schedule = due_schedule();
        let original_due = schedule.next_due_at;
        let repo: Arc<dyn ScheduleRepository> = Arc::new(FakeRepo {
            schedules: Mutex::new(vec![schedule]),
        });
        let callback = SourceEventCallback::new(|_event| async { Err(CallbackError::new("boom")) });

        process_due(&repo, &callback).await.unwrap();

        let saved = repo.find_by_id("sch1").await.unwrap().unwrap();
        assert_eq!(saved.next_due_at, original_due);
    }

    #[tokio::test]
    async fn only_due_schedules_fire() {
        let due = due_schedule();
        let mut not_due = Schedule::new("sch2", json!({"cron_expression": "*/1 * * * *"})).unwrap();
        not_due.next_due_at = Utc::now() + chrono::Duration::hours(1);
        let repo: Arc<dyn ScheduleRepository> = Arc::new(FakeRepo {
            schedules: Mutex::new(vec![due, not_due]),
        });

        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        let callback = SourceEventCallback::new(move |_event| {
            let fired = fired_clone.clone();
            async move {
                fired.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        process_due(&repo, &callback).await.unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn start_and_stop_is_idempotent() {
        let repo: Arc<dyn ScheduleRepository> = Arc::new(FakeRepo {
            schedules: Mutex::new(Vec::new()),
        });
        let callback = SourceEventCallback::new(|_event| async { Ok(()) });
        let poller = SchedulePoller::new(repo, callback);

        poller.start().await;
        poller.start().await;
        assert_eq!(poller.state().await, PollerState::Running);

        poller.stop().await;
        poller.stop().await;
        assert_eq!(poller.state().await, PollerState::Stopped);
    }
}
