//! Monthly reminder scheduler.
//!
//! A background task wakes at each occurrence of the configured cron
//! schedule and re-engages every active user whose reminder has come due.

use chrono::{DateTime, Duration, Months, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use std::sync::Arc;
use tracing::{info, warn};

use crate::bot::BotState;
use crate::bot::gateway::{DeliveryError, Keyboard};

/// One calendar month after `from`, anchored at `hour:00` local time.
///
/// End-of-month overflow clamps (Jan 31 plus one month is Feb 28/29). An
/// anchor swallowed by a DST gap moves one hour forward.
pub fn next_reminder_after(from: DateTime<Utc>, tz: Tz, hour: u32) -> DateTime<Utc> {
    let local_date = from.with_timezone(&tz).date_naive();
    let next_date = local_date
        .checked_add_months(Months::new(1))
        .unwrap_or(NaiveDate::MAX);
    let anchor = NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN);
    let next_local = next_date.and_time(anchor);

    tz.from_local_datetime(&next_local)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(next_local + Duration::hours(1))).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| from + Duration::days(31))
}

/// Spawn the scheduler task. Sleeps until the next cron occurrence, runs a
/// pass, repeats.
pub fn spawn(state: Arc<BotState>, schedule: Schedule) {
    tokio::spawn(async move {
        loop {
            let now = Utc::now();
            let Some(next) = schedule.after(&now).next() else {
                warn!("Reminder schedule has no future occurrence; scheduler stopping");
                break;
            };
            let wait = (next - now).to_std().unwrap_or(std::time::Duration::ZERO);
            tokio::time::sleep(wait).await;

            if let Err(e) = run_pass(&state, Utc::now()).await {
                warn!("Reminder pass failed: {}", e);
            }
        }
    });
}

/// One pass over the users whose reminder is due at `now`.
pub async fn run_pass(state: &BotState, now: DateTime<Utc>) -> rusqlite::Result<()> {
    let due = state.store.due_reminders(now)?;
    if due.is_empty() {
        return Ok(());
    }

    info!("Sending {} due reminder(s)", due.len());

    for user in due {
        let text = user.language.texts().reminder;
        match state.delivery.send_text(user.chat_id, text, Keyboard::None).await {
            Ok(()) => {
                // Advance from the previous target, not from the send time,
                // so the monthly anchor does not drift with tick timing.
                let base = user.next_reminder.unwrap_or(user.last_interaction);
                let next = next_reminder_after(base, state.timezone, state.reminder_hour);
                if let Err(e) = state.store.set_next_reminder(user.chat_id, next) {
                    warn!("Failed to reschedule chat {}: {}", user.chat_id, e);
                } else {
                    info!("Reminded chat {}; next reminder {}", user.chat_id, next);
                }
            }
            Err(DeliveryError::Unreachable) => {
                info!("Chat {} unreachable; deactivating", user.chat_id);
                if let Err(e) = state.store.deactivate_user(user.chat_id) {
                    warn!("Failed to deactivate chat {}: {}", user.chat_id, e);
                }
            }
            Err(e) => {
                // Transient: leave the user due and let the next pass retry.
                warn!("Failed to remind chat {}: {}", user.chat_id, e);
            }
        }
    }

    Ok(())
}
