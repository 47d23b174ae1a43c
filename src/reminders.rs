use crate::db::Store;
use crate::error::AppResult;
use crate::models::{from_millis, to_millis};
use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(10);

/// Everything a delivery channel needs to tell a user their rental ends soon.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReminderNotice {
    pub reminder_id: i64,
    pub rental_id: i64,
    pub email: String,
    pub title: String,
    pub end_date: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("delivery to {recipient} failed: {reason}")]
    Delivery { recipient: String, reason: String },
}

/// A delivery channel. A reminder is marked sent only after `notify`
/// succeeds, so a failing channel sees the same reminder again on the next
/// sweep.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: &ReminderNotice) -> Result<(), NotifyError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: &ReminderNotice) -> Result<(), NotifyError> {
        log::info!(
            "[reminder] to {}: rental \"{}\" ends {}",
            notice.email,
            notice.title,
            notice.end_date.to_rfc3339()
        );
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub due: usize,
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct ReminderScheduler {
    store: Store,
    notifier: Arc<dyn Notifier>,
}

impl ReminderScheduler {
    pub fn new(store: Store, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    pub fn due(&self, now: DateTime<Utc>) -> AppResult<Vec<ReminderNotice>> {
        let conn = self.store.lock()?;
        let mut stmt = conn.prepare(
            "SELECT rr.id, r.id, u.email, b.title, r.end_date
             FROM rent_reminders rr
             JOIN rentals r ON rr.rental_id = r.id
             JOIN users u ON r.user_id = u.id
             JOIN books b ON r.book_id = b.id
             WHERE rr.sent = 0 AND rr.remind_date <= ?1
             ORDER BY rr.remind_date, rr.id",
        )?;
        let rows = stmt.query_map(params![to_millis(now)], |row| {
            Ok(ReminderNotice {
                reminder_id: row.get(0)?,
                rental_id: row.get(1)?,
                email: row.get(2)?,
                title: row.get(3)?,
                end_date: from_millis(4, row.get(4)?)?,
            })
        })?;
        let mut notices = Vec::new();
        for row in rows {
            notices.push(row?);
        }
        Ok(notices)
    }

    /// One pass over due reminders. Each one is delivered and marked on its
    /// own; a failure is logged and counted and the pass moves on.
    pub fn sweep(&self, now: DateTime<Utc>) -> AppResult<SweepReport> {
        let due = self.due(now)?;
        let mut report = SweepReport {
            due: due.len(),
            ..SweepReport::default()
        };
        for notice in &due {
            if let Err(err) = self.notifier.notify(notice) {
                log::warn!("[reminder] reminder {}: {}", notice.reminder_id, err);
                report.failed += 1;
                continue;
            }
            match self.mark_sent(notice.reminder_id) {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    log::warn!(
                        "[reminder] reminder {} delivered but not marked: {}",
                        notice.reminder_id,
                        err
                    );
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    fn mark_sent(&self, reminder_id: i64) -> AppResult<()> {
        let conn = self.store.lock()?;
        conn.execute(
            "UPDATE rent_reminders SET sent = 1 WHERE id = ?1 AND sent = 0",
            params![reminder_id],
        )?;
        Ok(())
    }

    #[cfg(test)]
    fn reminders_for(&self, rental_id: i64) -> AppResult<Vec<crate::models::Reminder>> {
        let conn = self.store.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, rental_id, remind_date, sent FROM rent_reminders WHERE rental_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![rental_id], |row| {
            Ok(crate::models::Reminder {
                id: row.get(0)?,
                rental_id: row.get(1)?,
                remind_date: from_millis(2, row.get(2)?)?,
                sent: row.get(3)?,
            })
        })?;
        let mut reminders = Vec::new();
        for row in rows {
            reminders.push(row?);
        }
        Ok(reminders)
    }

    /// Runs a sweep on every tick until the runtime shuts down. Sweeps run on
    /// the blocking pool so request handling keeps going meanwhile. A zero
    /// interval is raised to `MIN_SWEEP_INTERVAL`.
    pub fn spawn(self, every: Duration) -> JoinHandle<()> {
        let every = if every < MIN_SWEEP_INTERVAL {
            log::warn!(
                "[reminder] sweep interval {:?} too short, using {:?}",
                every,
                MIN_SWEEP_INTERVAL
            );
            MIN_SWEEP_INTERVAL
        } else {
            every
        };
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let scheduler = self.clone();
                match tokio::task::spawn_blocking(move || scheduler.sweep(Utc::now())).await {
                    Ok(Ok(report)) if report.due > 0 => log::info!(
                        "[reminder] sweep: {} due, {} delivered, {} failed",
                        report.due,
                        report.delivered,
                        report.failed
                    ),
                    Ok(Ok(_)) => {}
                    Ok(Err(err)) => log::error!("[reminder] sweep failed: {}", err),
                    Err(err) => log::error!("[reminder] sweep task panicked: {}", err),
                }
            }
        })
    }
}
