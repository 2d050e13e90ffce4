//! Integration tests for the schedule poller's tick loop, exercised with
//! a paused mock clock rather than real one-minute waits.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use operion_sources_core::callback::SourceEventCallback;
use operion_sources_core::error::PersistenceError;
use operion_sources_core::model::Schedule;
use operion_sources_core::repository::{HealthCheckable, ScheduleRepository, SourceRepository};
use operion_sources_scheduler::{PollerState, SchedulePoller};
use serde_json::json;
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
    async fn find_due_before(&self, before: DateTime<Utc>) -> Result<Vec<Schedule>, PersistenceError> {
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

#[tokio::test(start_paused = true)]
async fn tick_loop_fires_due_schedule_and_stops_on_cancel() {
    let mut schedule = Schedule::new("sch1", json!({"cron_expression": "*/1 * * * *"})).unwrap();
    schedule.next_due_at = Utc::now() - chrono::Duration::minutes(1);
    let repo = Arc::new(FakeRepo {
        schedules: Mutex::new(vec![schedule]),
    });

    let fired = Arc::new(AtomicUsize::new(0));
    let fired_clone = fired.clone();
    let callback = SourceEventCallback::new(move |event| {
        let fired = fired_clone.clone();
        async move {
            assert_eq!(event.event_type, "schedule_due");
            fired.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    });

    let poller = SchedulePoller::new(repo.clone(), callback);
    poller.start().await;
    assert_eq!(poller.state().await, PollerState::Running);

    // Advance past the 60s tick so the poller's first scan runs.
    tokio::time::advance(std::time::Duration::from_secs(61)).await;
    tokio::task::yield_now().await;

    assert_eq!(fired.load(Ordering::SeqCst), 1);

    poller.stop().await;
    assert_eq!(poller.state().await, PollerState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn tick_loop_does_not_fire_schedule_not_yet_due() {
    let mut schedule = Schedule::new("sch1", json!({"cron_expression": "*/1 * * * *"})).unwrap();
    schedule.next_due_at = Utc::now() + chrono::Duration::hours(1);
    let repo = Arc::new(FakeRepo {
        schedules: Mutex::new(vec![schedule]),
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

    let poller = SchedulePoller::new(repo, callback);
    poller.start().await;

    tokio::time::advance(std::time::Duration::from_secs(61)).await;
    tokio::task::yield_now().await;

    assert_eq!(fired.load(Ordering::SeqCst), 0);
    poller.stop().await;
}
