//! Point ledger and leveler
//!
//! Crediting and level recomputation are two separate steps. Callers run
//! both after every point-granting action (`award` does it for them).
//! Level is a pure function of the total, so recomputing is always safe.
//! A recomputation that raises the level books the level-up bonus; only the
//! caller whose conditional level write succeeded sees the level-up.

use chrono::{DateTime, Utc};
use jobquest_core::{
    calculate_level, level_info, AccountId, CreditOutcome, Error, LevelChange, PointSource,
    PointTransaction, Result, LEVELS,
};
use jobquest_persistence::{sqlite, Database};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::{EngineConfig, RewardTable};

/// Result of a job review attempt
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewOutcome {
    pub points_granted: i64,
    pub reviews_today: u32,
    pub limit_reached: bool,
    pub credit: Option<CreditOutcome>,
}

#[derive(Clone)]
pub struct PointLedger {
    db: Database,
    level_up_bonus: i64,
}

impl PointLedger {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            level_up_bonus: RewardTable::default().level_up,
        }
    }

    /// Override the level-up bonus; zero or less disables it
    pub fn with_level_up_bonus(mut self, bonus: i64) -> Self {
        self.level_up_bonus = bonus;
        self
    }

    /// Add `amount` to the account total and append a ledger entry.
    ///
    /// Returns the new total. Guests are a no-op returning 0.
    pub async fn credit(&self, account: AccountId, amount: i64, source: PointSource) -> Result<i64> {
        if account.is_guest() {
            return Ok(0);
        }
        if amount <= 0 {
            return Err(Error::Validation(format!(
                "credited amount must be positive, got {}",
                amount
            )));
        }

        let total =
            sqlite::add_points(self.db.pool(), account.as_i64(), amount, source.as_str(), Utc::now())
                .await?;

        debug!("Credited {} points to {} ({}), total {}", amount, account, source.as_str(), total);
        Ok(total)
    }

    /// Bring the stored level in line with the current total.
    ///
    /// Only writes when the level differs, and only if nobody else changed
    /// it since it was read, so a concurrent recomputation reports the
    /// level-up once.
    pub async fn recompute_level(&self, account: AccountId) -> Result<LevelChange> {
        if account.is_guest() {
            let first = LEVELS[0];
            return Ok(LevelChange {
                previous_level: first.level,
                new_level: first.level,
                leveled_up: false,
                level_info: first,
            });
        }

        let stored = sqlite::require_account(self.db.pool(), account.as_i64()).await?;
        let target = calculate_level(stored.points);

        let changed = target.level != stored.level
            && sqlite::set_level_if(self.db.pool(), stored.id, stored.level, target.level).await?;

        if changed {
            info!(
                "Account {} moved from level {} to {} ({} points)",
                account, stored.level, target.level, stored.points
            );
        }

        Ok(LevelChange {
            previous_level: stored.level,
            new_level: if changed { target.level } else { stored.level },
            leveled_up: changed && target.level > stored.level,
            level_info: if changed {
                *target
            } else {
                level_info(stored.level).copied().unwrap_or(*target)
            },
        })
    }

    /// Credit then recompute, the sequence every reward follows
    pub async fn award(&self, account: AccountId, amount: i64, source: PointSource) -> Result<CreditOutcome> {
        if account.is_guest() {
            return Ok(CreditOutcome::unchanged(0, LEVELS[0].level));
        }

        let total = self.credit(account, amount, source).await?;
        self.settle(account, amount, total).await
    }

    /// Recompute the level after `granted` points brought the total to
    /// `total`, booking the level-up bonus for every level-up it causes.
    ///
    /// The bonus can itself cross the next boundary, which counts as a new
    /// level-up. The level table is finite so this always ends.
    pub async fn settle(&self, account: AccountId, granted: i64, total: i64) -> Result<CreditOutcome> {
        let change = self.recompute_level(account).await?;
        let mut outcome = CreditOutcome::new(granted, total, &change);

        let mut leveled_up = change.leveled_up;
        while leveled_up && self.level_up_bonus > 0 {
            outcome.new_total = self
                .credit(account, self.level_up_bonus, PointSource::LevelUp)
                .await?;
            outcome.level_bonus += self.level_up_bonus;

            let next = self.recompute_level(account).await?;
            outcome.new_level = next.new_level;
            leveled_up = next.leveled_up;
        }

        Ok(outcome)
    }

    /// Count a job review and grant its points unless today's cap is hit.
    ///
    /// Reaching the cap is not an error: the outcome carries
    /// `points_granted: 0` and `limit_reached: true`.
    pub async fn record_review(
        &self,
        account: AccountId,
        now: DateTime<Utc>,
        config: &EngineConfig,
    ) -> Result<ReviewOutcome> {
        let rewards = &config.rewards;
        if account.is_guest() {
            return Ok(ReviewOutcome {
                points_granted: 0,
                reviews_today: 0,
                limit_reached: false,
                credit: None,
            });
        }

        let today = now.with_timezone(&config.day_offset()).date_naive();
        let counted =
            sqlite::try_count_review(self.db.pool(), account.as_i64(), today, rewards.reviews_per_day)
                .await?;

        match counted {
            Some(count) => {
                let credit = self.award(account, rewards.review, PointSource::Review).await?;
                Ok(ReviewOutcome {
                    points_granted: rewards.review,
                    reviews_today: count,
                    limit_reached: count >= rewards.reviews_per_day,
                    credit: Some(credit),
                })
            }
            None => {
                // Either capped for today or the account does not exist
                sqlite::require_account(self.db.pool(), account.as_i64()).await?;
                debug!("Daily review limit reached for {}", account);
                Ok(ReviewOutcome {
                    points_granted: 0,
                    reviews_today: rewards.reviews_per_day,
                    limit_reached: true,
                    credit: None,
                })
            }
        }
    }

    /// Current total and level without changing anything
    pub async fn balance(&self, account: AccountId) -> Result<(i64, u32)> {
        if account.is_guest() {
            return Ok((0, LEVELS[0].level));
        }
        let stored = sqlite::require_account(self.db.pool(), account.as_i64()).await?;
        Ok((stored.points, stored.level))
    }

    /// Most recent ledger entries
    pub async fn history(&self, account: AccountId, limit: u32) -> Result<Vec<PointTransaction>> {
        if account.is_guest() {
            return Ok(Vec::new());
        }
        sqlite::list_point_transactions(self.db.pool(), account.as_i64(), limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use jobquest_core::NewAccount;

    async fn setup() -> (Database, PointLedger, AccountId) {
        let db = Database::connect_in_memory().await.unwrap();
        let id = sqlite::create_account(
            db.pool(),
            &NewAccount {
                name: "Pablo".into(),
                email: "pablo@example.com".into(),
                password: "x".into(),
            },
        )
        .await
        .unwrap();
        (db.clone(), PointLedger::new(db), AccountId(id))
    }

    #[tokio::test]
    async fn test_application_keeps_novato() {
        let (_db, ledger, account) = setup().await;
        let outcome = ledger.award(account, 10, PointSource::JobApplication).await.unwrap();

        assert_eq!(outcome.new_total, 10);
        assert_eq!(outcome.new_level, 1);
        assert!(!outcome.leveled_up);
    }

    #[tokio::test]
    async fn test_profile_step_crosses_into_aprendiz() {
        let (_db, ledger, account) = setup().await;
        ledger.credit(account, 195, PointSource::Manual).await.unwrap();
        let before = ledger.recompute_level(account).await.unwrap();
        assert_eq!(before.level_info.name, "Novato");

        let outcome = ledger.award(account, 50, PointSource::ProfileStep).await.unwrap();
        assert_eq!(outcome.points_granted, 50);
        assert_eq!(outcome.level_bonus, 25);
        assert_eq!(outcome.new_total, 270);
        assert_eq!(outcome.previous_level, 1);
        assert_eq!(outcome.new_level, 2);
        assert!(outcome.leveled_up);

        let bonuses: Vec<_> = ledger
            .history(account, 10)
            .await
            .unwrap()
            .into_iter()
            .filter(|t| t.source == "level_up")
            .collect();
        assert_eq!(bonuses.len(), 1);
        assert_eq!(bonuses[0].delta, 25);

        // Recomputing again books nothing more
        assert!(!ledger.recompute_level(account).await.unwrap().leveled_up);
        let again = ledger.award(account, 10, PointSource::JobApplication).await.unwrap();
        assert_eq!(again.level_bonus, 0);
        assert_eq!(again.new_total, 280);
    }

    #[tokio::test]
    async fn test_level_bonus_can_cross_next_boundary() {
        let (db, ledger, account) = setup().await;
        let ledger = ledger.with_level_up_bonus(30);
        ledger.credit(account, 180, PointSource::Manual).await.unwrap();
        ledger.recompute_level(account).await.unwrap();

        // 180 + 200 = 380 reaches Aprendiz; the bonus lifts it to 410, Competente
        let outcome = ledger.award(account, 200, PointSource::Manual).await.unwrap();
        assert_eq!(outcome.level_bonus, 60);
        assert_eq!(outcome.new_total, 440);
        assert_eq!(outcome.new_level, 3);
        assert_eq!(sqlite::sum_point_transactions(db.pool(), account.as_i64()).await.unwrap(), 440);
    }

    #[tokio::test]
    async fn test_disabled_level_bonus() {
        let (_db, ledger, account) = setup().await;
        let ledger = ledger.with_level_up_bonus(0);
        let outcome = ledger.award(account, 250, PointSource::Manual).await.unwrap();
        assert!(outcome.leveled_up);
        assert_eq!(outcome.level_bonus, 0);
        assert_eq!(outcome.new_total, 250);
    }

    #[tokio::test]
    async fn test_recompute_is_idempotent() {
        let (_db, ledger, account) = setup().await;
        ledger.credit(account, 450, PointSource::Manual).await.unwrap();

        let first = ledger.recompute_level(account).await.unwrap();
        assert!(first.leveled_up);
        assert_eq!(first.level_info.name, "Competente");

        let second = ledger.recompute_level(account).await.unwrap();
        assert!(!second.leveled_up);
        assert_eq!(second.previous_level, second.new_level);
        assert_eq!(second.level_info.name, "Competente");
    }

    #[tokio::test]
    async fn test_non_positive_credit_rejected() {
        let (db, ledger, account) = setup().await;
        assert!(matches!(
            ledger.credit(account, 0, PointSource::Manual).await,
            Err(Error::Validation(_))
        ));
        assert!(ledger.credit(account, -5, PointSource::Manual).await.is_err());
        assert_eq!(sqlite::sum_point_transactions(db.pool(), account.as_i64()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_guest_is_never_persisted() {
        let (_db, ledger, _account) = setup().await;
        assert_eq!(ledger.credit(AccountId::GUEST, 10, PointSource::Manual).await.unwrap(), 0);
        let change = ledger.recompute_level(AccountId::GUEST).await.unwrap();
        assert!(!change.leveled_up);
        assert!(ledger.history(AccountId::GUEST, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_account_is_not_found() {
        let (_db, ledger, _account) = setup().await;
        assert!(matches!(
            ledger.credit(AccountId(404), 10, PointSource::Manual).await,
            Err(Error::AccountNotFound(404))
        ));
    }

    #[tokio::test]
    async fn test_review_cap_and_daily_reset() {
        let (_db, ledger, account) = setup().await;
        let config = EngineConfig::default();
        let day = Utc.with_ymd_and_hms(2025, 5, 1, 9, 0, 0).unwrap();

        for i in 1..=10 {
            let outcome = ledger.record_review(account, day, &config).await.unwrap();
            assert_eq!(outcome.points_granted, 5);
            assert_eq!(outcome.reviews_today, i);
        }

        let capped = ledger.record_review(account, day, &config).await.unwrap();
        assert_eq!(capped.points_granted, 0);
        assert!(capped.limit_reached);
        assert_eq!(ledger.balance(account).await.unwrap().0, 50);

        let next_day = ledger
            .record_review(account, day + Duration::days(1), &config)
            .await
            .unwrap();
        assert_eq!(next_day.points_granted, 5);
        assert_eq!(next_day.reviews_today, 1);
        assert_eq!(ledger.history(account, 100).await.unwrap().len(), 11);
    }
}
