//! Daily login streak tracker
//!
//! The calendar day gates whether a login is evaluated at all; elapsed
//! hours decide between incrementing and resetting. A second login on the
//! same calendar day never touches the record.

use chrono::{DateTime, Duration, FixedOffset, Utc};
use jobquest_core::{
    parse_notification_time, AccountId, Result, StreakEvent, StreakRecord,
};
use jobquest_persistence::{sqlite, Database};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Logins closer together than this keep the streak alive
const GRACE_WINDOW_HOURS: i64 = 24;

/// Attempts before giving up on a contended compare-and-set
const MAX_CAS_ATTEMPTS: usize = 3;

/// What a login did to the streak
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginOutcome {
    pub event: StreakEvent,
    pub current_streak: u32,
    pub best_streak: u32,
    pub total_days: u32,
}

impl LoginOutcome {
    fn from_record(event: StreakEvent, record: &StreakRecord) -> Self {
        Self {
            event,
            current_streak: record.current_streak,
            best_streak: record.best_streak,
            total_days: record.total_days,
        }
    }
}

/// Decide the next record state for a login at `now`.
///
/// Returns `None` when the login falls on the same calendar day as the last
/// one (or before it), in which case nothing must be written.
pub fn advance_streak(
    record: &StreakRecord,
    now: DateTime<Utc>,
    offset: &FixedOffset,
) -> Option<(StreakEvent, StreakRecord)> {
    let mut next = record.clone();
    next.last_login = Some(now);

    let Some(last_login) = record.last_login else {
        // Record exists (preferences saved earlier) but never logged in
        next.current_streak = 1;
        next.best_streak = next.best_streak.max(1);
        if record.best_streak < 1 {
            next.best_streak_at = Some(now);
        }
        next.streak_started_at = Some(now);
        next.total_days = record.total_days + 1;
        return Some((StreakEvent::New, next));
    };

    let same_day =
        now.with_timezone(offset).date_naive() == last_login.with_timezone(offset).date_naive();
    if same_day || now <= last_login {
        return None;
    }

    next.total_days = record.total_days + 1;

    if now - last_login < Duration::hours(GRACE_WINDOW_HOURS) {
        next.current_streak = record.current_streak + 1;
        if next.current_streak == 1 {
            next.streak_started_at = Some(now);
        }
        if next.current_streak > record.best_streak {
            next.best_streak = next.current_streak;
            next.best_streak_at = Some(now);
        }
        Some((StreakEvent::Incremented, next))
    } else {
        next.current_streak = 1;
        next.streak_started_at = Some(now);
        next.best_streak = next.best_streak.max(1);
        Some((StreakEvent::Reset, next))
    }
}

#[derive(Clone)]
pub struct StreakTracker {
    db: Database,
    offset: FixedOffset,
}

impl StreakTracker {
    pub fn new(db: Database, offset: FixedOffset) -> Self {
        Self { db, offset }
    }

    /// Apply a login at `now` to the account's streak.
    pub async fn record_login(&self, account: AccountId, now: DateTime<Utc>) -> Result<LoginOutcome> {
        if account.is_guest() {
            return Ok(LoginOutcome::from_record(
                StreakEvent::Maintained,
                &StreakRecord::empty(account.as_i64()),
            ));
        }

        let account_id = account.as_i64();
        sqlite::require_account(self.db.pool(), account_id).await?;

        for _ in 0..MAX_CAS_ATTEMPTS {
            let Some(record) = sqlite::get_streak(self.db.pool(), account_id).await? else {
                let mut fresh = StreakRecord::empty(account_id);
                fresh.current_streak = 1;
                fresh.best_streak = 1;
                fresh.total_days = 1;
                fresh.last_login = Some(now);
                fresh.streak_started_at = Some(now);
                fresh.best_streak_at = Some(now);

                if sqlite::insert_streak(self.db.pool(), &fresh).await? {
                    info!("Streak started for account {}", account);
                    return Ok(LoginOutcome::from_record(StreakEvent::New, &fresh));
                }
                // Someone else created it first; evaluate against theirs
                continue;
            };

            let Some((event, next)) = advance_streak(&record, now, &self.offset) else {
                debug!("Same-day login for {}, streak stays {}", account, record.current_streak);
                return Ok(LoginOutcome::from_record(StreakEvent::Maintained, &record));
            };

            if sqlite::update_streak_if_version(self.db.pool(), &next).await? {
                info!(
                    "Streak {:?} for account {}: {} -> {} (best {})",
                    event, account, record.current_streak, next.current_streak, next.best_streak
                );
                return Ok(LoginOutcome::from_record(event, &next));
            }
            debug!("Streak write for {} lost a race, re-reading", account);
        }

        warn!("Streak update for {} kept conflicting, reporting stored state", account);
        let record = sqlite::get_streak(self.db.pool(), account_id)
            .await?
            .unwrap_or_else(|| StreakRecord::empty(account_id));
        Ok(LoginOutcome::from_record(StreakEvent::Maintained, &record))
    }

    /// Current record, if the account ever logged in or saved preferences
    pub async fn get(&self, account: AccountId) -> Result<Option<StreakRecord>> {
        if account.is_guest() {
            return Ok(None);
        }
        sqlite::get_streak(self.db.pool(), account.as_i64()).await
    }

    /// Validate and store reminder preferences
    pub async fn configure_notifications(
        &self,
        account: AccountId,
        enabled: bool,
        time: &str,
    ) -> Result<StreakRecord> {
        parse_notification_time(time)?;

        if account.is_guest() {
            let mut record = StreakRecord::empty(account.as_i64());
            record.notifications_enabled = enabled;
            record.notification_time = time.to_string();
            return Ok(record);
        }

        let account_id = account.as_i64();
        sqlite::require_account(self.db.pool(), account_id).await?;
        sqlite::upsert_notification_prefs(self.db.pool(), account_id, enabled, time).await?;

        sqlite::get_streak(self.db.pool(), account_id)
            .await?
            .ok_or(jobquest_core::Error::AccountNotFound(account_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use jobquest_core::{Error, NewAccount};

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, day, hour, 0, 0).unwrap()
    }

    fn record_with(current: u32, best: u32, last: DateTime<Utc>) -> StreakRecord {
        let mut r = StreakRecord::empty(1);
        r.current_streak = current;
        r.best_streak = best;
        r.total_days = best;
        r.last_login = Some(last);
        r
    }

    async fn setup() -> (StreakTracker, AccountId) {
        let db = Database::connect_in_memory().await.unwrap();
        let id = sqlite::create_account(
            db.pool(),
            &NewAccount {
                name: "Elena".into(),
                email: "elena@example.com".into(),
                password: "x".into(),
            },
        )
        .await
        .unwrap();
        (StreakTracker::new(db, utc()), AccountId(id))
    }

    #[test]
    fn test_same_calendar_day_is_noop() {
        let r = record_with(3, 3, at(10, 1));
        assert!(advance_streak(&r, at(10, 23), &utc()).is_none());
    }

    #[test]
    fn test_new_day_within_grace_increments() {
        let r = record_with(4, 4, at(10, 22));
        let (event, next) = advance_streak(&r, at(11, 18), &utc()).unwrap();
        assert_eq!(event, StreakEvent::Incremented);
        assert_eq!(next.current_streak, 5);
        assert_eq!(next.best_streak, 5);
        assert_eq!(next.total_days, 5);
        assert_eq!(next.last_login, Some(at(11, 18)));
    }

    #[test]
    fn test_gap_of_a_day_or_more_resets_to_one() {
        let r = record_with(6, 9, at(10, 8));
        let (event, next) = advance_streak(&r, at(11, 8), &utc()).unwrap();
        assert_eq!(event, StreakEvent::Reset);
        assert_eq!(next.current_streak, 1);
        assert_eq!(next.best_streak, 9);
        assert_eq!(next.streak_started_at, Some(at(11, 8)));
    }

    #[test]
    fn test_reset_from_one_is_still_reset() {
        let r = record_with(1, 1, at(10, 8));
        let (event, next) = advance_streak(&r, at(14, 8), &utc()).unwrap();
        assert_eq!(event, StreakEvent::Reset);
        assert_eq!(next.current_streak, 1);
    }

    #[test]
    fn test_calendar_day_follows_offset() {
        // 23:00 and 01:00 UTC are the same day at UTC-3
        let minus_three = FixedOffset::west_opt(3 * 3600).unwrap();
        let r = record_with(2, 2, at(10, 23));
        assert!(advance_streak(&r, at(11, 1), &minus_three).is_none());
        assert!(advance_streak(&r, at(11, 1), &utc()).is_some());
    }

    #[test]
    fn test_zero_streak_increment_starts_new_streak() {
        let r = record_with(0, 0, at(10, 20));
        let (_, next) = advance_streak(&r, at(11, 9), &utc()).unwrap();
        assert_eq!(next.current_streak, 1);
        assert_eq!(next.streak_started_at, Some(at(11, 9)));
    }

    #[test]
    fn test_best_never_below_current() {
        let mut r = record_with(1, 1, at(1, 12));
        for day in 2..=28 {
            // skip every 5th day to force resets
            if day % 5 == 0 {
                continue;
            }
            if let Some((_, next)) = advance_streak(&r, at(day, 12), &utc()) {
                r = next;
            }
            assert!(r.best_streak >= r.current_streak);
        }
    }

    #[tokio::test]
    async fn test_first_login_creates_record() {
        let (tracker, account) = setup().await;
        let outcome = tracker.record_login(account, at(3, 9)).await.unwrap();
        assert_eq!(outcome.event, StreakEvent::New);
        assert_eq!(outcome.current_streak, 1);
        assert_eq!(outcome.best_streak, 1);
        assert_eq!(outcome.total_days, 1);
    }

    #[tokio::test]
    async fn test_repeated_same_day_logins_match_single_login() {
        let (tracker, account) = setup().await;
        tracker.record_login(account, at(3, 9)).await.unwrap();
        let once = tracker.record_login(account, at(4, 8)).await.unwrap();
        let twice = tracker.record_login(account, at(4, 20)).await.unwrap();

        assert_eq!(once.event, StreakEvent::Incremented);
        assert_eq!(twice.event, StreakEvent::Maintained);
        assert_eq!(once.current_streak, twice.current_streak);
        assert_eq!(once.total_days, twice.total_days);
    }

    #[tokio::test]
    async fn test_concurrent_logins_increment_once() {
        let (tracker, account) = setup().await;
        tracker.record_login(account, at(3, 9)).await.unwrap();

        let now = at(4, 9);
        let handles: Vec<_> = (0..5)
            .map(|_| {
                let tracker = tracker.clone();
                tokio::spawn(async move { tracker.record_login(account, now).await.unwrap() })
            })
            .collect();

        let mut incremented = 0;
        for handle in handles {
            if handle.await.unwrap().event == StreakEvent::Incremented {
                incremented += 1;
            }
        }
        assert_eq!(incremented, 1);

        let stored = tracker.get(account).await.unwrap().unwrap();
        assert_eq!(stored.current_streak, 2);
        assert_eq!(stored.total_days, 2);
    }

    #[tokio::test]
    async fn test_unknown_account_is_rejected() {
        let (tracker, _) = setup().await;
        assert!(matches!(
            tracker.record_login(AccountId(77), at(3, 9)).await,
            Err(Error::AccountNotFound(77))
        ));
    }

    #[tokio::test]
    async fn test_guest_login_is_not_persisted() {
        let (tracker, _) = setup().await;
        let outcome = tracker.record_login(AccountId::GUEST, at(3, 9)).await.unwrap();
        assert_eq!(outcome.event, StreakEvent::Maintained);
        assert_eq!(outcome.current_streak, 0);
        assert!(tracker.get(AccountId::GUEST).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_notification_preferences() {
        let (tracker, account) = setup().await;
        assert!(matches!(
            tracker.configure_notifications(account, true, "7:30").await,
            Err(Error::Validation(_))
        ));
        assert!(tracker.get(account).await.unwrap().is_none());

        let saved = tracker.configure_notifications(account, true, "07:30").await.unwrap();
        assert!(saved.notifications_enabled);
        assert_eq!(saved.notification_time, "07:30");

        // Preferences first, login later: the login starts the streak
        let outcome = tracker.record_login(account, at(5, 9)).await.unwrap();
        assert_eq!(outcome.event, StreakEvent::New);
        assert_eq!(outcome.current_streak, 1);
        let stored = tracker.get(account).await.unwrap().unwrap();
        assert!(stored.notifications_enabled);
    }
}
