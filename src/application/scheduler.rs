//! Daily backup schedule.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::domain::{next_day, AppError, Result};

/// Fires once a day at a fixed local wall-clock time.
#[derive(Debug, Clone, Copy)]
pub struct DailySchedule {
    at: NaiveTime,
    tz: FixedOffset,
}

impl DailySchedule {
    #[must_use]
    pub const fn new(at: NaiveTime, tz: FixedOffset) -> Self {
        Self { at, tz }
    }

    /// The first firing strictly after `now`.
    ///
    /// # Errors
    /// Returns error only at the end of the representable calendar.
    pub fn next_after(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let local_now = now.with_timezone(&self.tz);
        let mut date = local_now.date_naive();
        loop {
            let candidate = self
                .tz
                .from_local_datetime(&date.and_time(self.at))
                .single()
                .ok_or_else(|| AppError::config(format!("Ambiguous local time on {date}")))?
                .with_timezone(&Utc);
            if candidate > now {
                return Ok(candidate);
            }
            date = next_day(date)?;
        }
    }

    /// Sleep until the next firing.
    ///
    /// # Errors
    /// See [`DailySchedule::next_after`].
    pub async fn wait(&self) -> Result<DateTime<Utc>> {
        let now = Utc::now();
        let next = self.next_after(now)?;
        let delay = (next - now).to_std().unwrap_or_default();
        tracing::info!(next = %next.with_timezone(&self.tz), "Waiting for next daily backup");
        tokio::time::sleep(delay).await;
        Ok(next)
    }

    /// The window a run firing at `fired_at` backs up: yesterday to today.
    #[must_use]
    pub fn window_for(&self, fired_at: DateTime<Utc>) -> (NaiveDate, NaiveDate) {
        let today = fired_at.with_timezone(&self.tz).date_naive();
        (today - Duration::days(1), today)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::at;

    fn schedule(hour: u32) -> DailySchedule {
        DailySchedule::new(
            NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
            FixedOffset::east_opt(8 * 3600).unwrap(),
        )
    }

    #[test]
    fn test_next_after_same_day() {
        let next = schedule(12).next_after(at("2023-01-01T09:00:00+08:00")).unwrap();
        assert_eq!(next, at("2023-01-01T12:00:00+08:00"));
    }

    #[test]
    fn test_next_after_rolls_to_tomorrow() {
        let next = schedule(0).next_after(at("2023-01-01T00:00:00+08:00")).unwrap();
        assert_eq!(next, at("2023-01-02T00:00:00+08:00"));
    }

    #[test]
    fn test_window_is_yesterday_to_today() {
        let (start, end) = schedule(0).window_for(at("2023-03-01T00:00:05+08:00"));
        assert_eq!(start, NaiveDate::from_ymd_opt(2023, 2, 28).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2023, 3, 1).unwrap());
    }
}
