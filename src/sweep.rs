//! Hourly reminder sweep.
//!
//! Each pass loads every pending reminder, and for each one that is due
//! posts a message to the reminders channel and then deletes the reminder.
//! Notify and delete are separate steps: if the process dies between them
//! the reminder fires again on the next pass.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::db::Repository;
use crate::discord::MessageSink;
use crate::error::{AppError, Result};
use crate::models::Reminder;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub checked: usize,
    pub fired: usize,
    pub failed: usize,
}

pub struct ReminderSweep {
    repository: Arc<Repository>,
    sink: Arc<dyn MessageSink>,
    channel_id: String,
    interval: Duration,
}

impl ReminderSweep {
    pub fn new(
        repository: Arc<Repository>,
        sink: Arc<dyn MessageSink>,
        channel_id: String,
        interval: Duration,
    ) -> Self {
        Self {
            repository,
            sink,
            channel_id,
            interval,
        }
    }

    /// Runs passes forever on a fixed interval, starting immediately. A pass
    /// always finishes before the next tick is awaited, so passes never overlap.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                "reminder sweep started, every {}s into channel {}",
                self.interval.as_secs(),
                self.channel_id
            );
            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                match self.run_once().await {
                    Ok(report) => info!(
                        "reminder sweep done: {} checked, {} fired, {} failed",
                        report.checked, report.fired, report.failed
                    ),
                    Err(e) => error!("reminder sweep failed: {}", e),
                }
            }
        })
    }

    pub async fn run_once(&self) -> Result<SweepReport> {
        self.run_once_at(Local::now().naive_local()).await
    }

    pub async fn run_once_at(&self, now: NaiveDateTime) -> Result<SweepReport> {
        let reminders = self.repository.get_reminders().await?;
        info!("checking {} reminders", reminders.len());

        let mut report = SweepReport::default();
        for reminder in reminders {
            report.checked += 1;
            debug!("reminder: {}, {}", reminder.id, reminder.reminder_datetime);

            if !reminder.is_due(now) {
                continue;
            }

            match self.fire(&reminder).await {
                Ok(title) => {
                    report.fired += 1;
                    info!("processed reminder: {}, for reading {}", reminder.id, title);
                }
                Err(e) => {
                    report.failed += 1;
                    error!("failed to process reminder {}: {}", reminder.id, e);
                }
            }
        }

        Ok(report)
    }

    async fn fire(&self, reminder: &Reminder) -> Result<String> {
        let reading = self
            .repository
            .get_reading(reminder.reading_id)
            .await?
            .ok_or_else(|| AppError::not_found("Reading", reminder.reading_id))?;

        self.sink
            .send_message(&self.channel_id, &reminder_message(&reading.title))
            .await?;
        self.repository.delete_reminder(reminder.id).await?;

        Ok(reading.title)
    }
}

pub fn reminder_message(title: &str) -> String {
    format!("Chop chop time to discuss '{}'", title)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discord::testing::RecordingSink;
    use crate::models::ReadingStatus;
    use chrono::{Days, NaiveDate};

    fn morning() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 4, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    async fn setup(sink: RecordingSink) -> (Arc<Repository>, Arc<RecordingSink>, ReminderSweep) {
        let repo = Arc::new(Repository::open_in_memory().await.unwrap());
        let sink = Arc::new(sink);
        let sweep = ReminderSweep::new(
            Arc::clone(&repo),
            sink.clone(),
            "chan-1".to_string(),
            Duration::from_secs(3600),
        );
        (repo, sink, sweep)
    }

    async fn add(repo: &Repository, title: &str, days: u32) -> i64 {
        let reading = repo
            .create_reading(title, days, ReadingStatus::InProgress)
            .await
            .unwrap();
        repo.create_reminder(reading.id, morning() + Days::new(u64::from(days)))
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn due_reminder_fires_once_and_is_deleted() {
        let (repo, sink, sweep) = setup(RecordingSink::default()).await;
        add(&repo, "Zero Day Paper", 0).await;

        let report = sweep.run_once_at(morning()).await.unwrap();
        assert_eq!(report, SweepReport { checked: 1, fired: 1, failed: 0 });
        assert_eq!(
            sink.sent(),
            vec![(
                "chan-1".to_string(),
                "Chop chop time to discuss 'Zero Day Paper'".to_string()
            )]
        );
        assert!(repo.get_reminders().await.unwrap().is_empty());

        let again = sweep.run_once_at(morning()).await.unwrap();
        assert_eq!(again.fired, 0);
        assert_eq!(sink.sent().len(), 1);
    }

    #[tokio::test]
    async fn future_reminder_is_left_alone() {
        let (repo, sink, sweep) = setup(RecordingSink::default()).await;
        let id = add(&repo, "Long Book", 7).await;

        let report = sweep.run_once_at(morning()).await.unwrap();
        assert_eq!(report, SweepReport { checked: 1, fired: 0, failed: 0 });
        assert!(sink.sent().is_empty());
        assert!(repo.get_reminder(id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn one_failure_does_not_block_the_rest() {
        let (repo, sink, sweep) = setup(RecordingSink::failing_on("Broken")).await;
        let broken = add(&repo, "Broken", 0).await;
        add(&repo, "Fine", 0).await;

        let report = sweep.run_once_at(morning()).await.unwrap();
        assert_eq!(report, SweepReport { checked: 2, fired: 1, failed: 1 });
        assert_eq!(sink.sent().len(), 1);
        assert!(sink.sent()[0].1.contains("Fine"));

        let remaining = repo.get_reminders().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, broken);
    }

    #[tokio::test]
    async fn spawned_sweep_runs_first_pass_immediately() {
        let (repo, sink, sweep) = setup(RecordingSink::default()).await;
        let reading = repo
            .create_reading("Already Due", 0, ReadingStatus::InProgress)
            .await
            .unwrap();
        repo.create_reminder(reading.id, morning()).await.unwrap();

        let handle = sweep.spawn();
        let fired = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if repo.get_reminders().await.unwrap().is_empty() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        handle.abort();

        assert!(fired.is_ok());
        assert_eq!(sink.sent().len(), 1);
    }
}
