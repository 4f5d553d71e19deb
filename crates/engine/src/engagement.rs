//! Engagement service
//!
//! The layer the HTTP handlers talk to. Each user action maps to one
//! method that runs the component calls in order and returns a payload
//! describing what changed.

use chrono::{DateTime, Utc};
use jobquest_core::{
    Account, AccountId, BadgeAward, BadgeRecord, BadgeType, CreditOutcome, Error, NewAccount, PointSource,
    PointTransaction, ProfileStep, Result, StreakRecord, LEVELS,
};
use jobquest_persistence::{sqlite, Database};
use serde::Serialize;
use tracing::{debug, info};

use crate::badges::BadgeIssuer;
use crate::config::{EngineConfig, ENGINE_CONFIG_KEY};
use crate::ledger::{PointLedger, ReviewOutcome};
use crate::messages;
use crate::streak::{LoginOutcome, StreakTracker};

/// Streak length that earns the "5 Days Active" badge
pub const STREAK_BADGE_DAYS: u32 = 5;

/// Share of profile completion each step is worth
const PERCENT_PER_STEP: usize = 25;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub account: Account,
    pub credit: CreditOutcome,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    #[serde(flatten)]
    pub streak: LoginOutcome,
    pub message: String,
    /// Set only on the login that earned it
    pub badge: Option<BadgeRecord>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationOutcome {
    pub points_granted: i64,
    pub new_total: i64,
    pub level: u32,
    pub leveled_up: bool,
    pub badge: Option<BadgeRecord>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileStepOutcome {
    pub points_granted: i64,
    pub completion: u8,
    pub credit: Option<CreditOutcome>,
    pub badge: Option<BadgeRecord>,
}

#[derive(Clone)]
pub struct Engagement {
    db: Database,
    config: EngineConfig,
    streaks: StreakTracker,
    ledger: PointLedger,
    badges: BadgeIssuer,
}

impl Engagement {
    pub fn new(db: Database, config: EngineConfig) -> Self {
        let ledger = PointLedger::new(db.clone()).with_level_up_bonus(config.rewards.level_up);
        let badges = BadgeIssuer::new(db.clone(), ledger.clone());
        let streaks = StreakTracker::new(db.clone(), config.day_offset());
        Self {
            db,
            config,
            streaks,
            ledger,
            badges,
        }
    }

    /// Stored engine configuration, defaults when none was saved
    pub async fn load_config(db: &Database) -> Result<EngineConfig> {
        let stored = sqlite::get_setting::<EngineConfig>(db.pool(), ENGINE_CONFIG_KEY).await?;
        Ok(stored.unwrap_or_default())
    }

    pub async fn save_config(db: &Database, config: &EngineConfig) -> Result<()> {
        sqlite::set_setting(db.pool(), ENGINE_CONFIG_KEY, config).await
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn ledger(&self) -> &PointLedger {
        &self.ledger
    }

    /// Create an account and grant the registration reward
    pub async fn register(&self, new_account: NewAccount) -> Result<RegisterResponse> {
        new_account.validate()?;

        let id = sqlite::create_account(self.db.pool(), &new_account).await?;
        let account = AccountId(id);
        info!("Registered account {} ({})", id, new_account.email);

        let credit = self
            .ledger
            .award(account, self.config.rewards.registration, PointSource::Registration)
            .await?;
        for badge_type in BadgeType::ALL {
            self.badges.ensure_placeholder(account, badge_type).await?;
        }

        let account = sqlite::require_account(self.db.pool(), id).await?;
        Ok(RegisterResponse { account, credit })
    }

    /// Record a login and award the streak badge when the streak hits five days
    pub async fn login(&self, account: AccountId, now: DateTime<Utc>) -> Result<LoginResponse> {
        let streak = self.streaks.record_login(account, now).await?;

        let badge = if streak.current_streak == STREAK_BADGE_DAYS {
            let award = self.badges.ensure_awarded(account, BadgeType::FiveDayStreak).await?;
            award.badge.filter(|_| award.newly_awarded)
        } else {
            None
        };

        let message = messages::login_message(streak.event, streak.current_streak, &mut rand::thread_rng());
        Ok(LoginResponse {
            streak,
            message,
            badge,
        })
    }

    /// Grant the application reward once per (account, job)
    pub async fn apply_to_job(
        &self,
        account: AccountId,
        job_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ApplicationOutcome> {
        let job_id = job_id.trim();
        if job_id.is_empty() {
            return Err(Error::Validation("job id must not be empty".to_string()));
        }
        if account.is_guest() {
            return Ok(ApplicationOutcome {
                points_granted: 0,
                new_total: 0,
                level: LEVELS[0].level,
                leveled_up: false,
                badge: None,
            });
        }

        sqlite::require_account(self.db.pool(), account.as_i64()).await?;
        let inserted = sqlite::insert_job_application(self.db.pool(), account.as_i64(), job_id, now).await?;
        if !inserted {
            debug!("Account {} already applied to job {}", account, job_id);
            let (total, level) = self.ledger.balance(account).await?;
            return Ok(ApplicationOutcome {
                points_granted: 0,
                new_total: total,
                level,
                leveled_up: false,
                badge: None,
            });
        }

        let credit = self
            .ledger
            .award(account, self.config.rewards.job_application, PointSource::JobApplication)
            .await?;
        let award = self.badges.ensure_awarded(account, BadgeType::FirstApplication).await?;

        // The badge bonus may have moved the total and level again
        let (total, level) = self.ledger.balance(account).await?;
        Ok(ApplicationOutcome {
            points_granted: credit.points_granted,
            new_total: total,
            level,
            leveled_up: level > credit.previous_level,
            badge: award.badge.filter(|_| award.newly_awarded),
        })
    }

    /// Daily-capped review reward
    pub async fn review_job(
        &self,
        account: AccountId,
        job_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ReviewOutcome> {
        debug!("Account {} reviewed job {}", account, job_id);
        self.ledger.record_review(account, now, &self.config).await
    }

    /// Mark a profile step complete, rewarding it the first time only
    pub async fn complete_profile_step(
        &self,
        account: AccountId,
        step: ProfileStep,
        now: DateTime<Utc>,
    ) -> Result<ProfileStepOutcome> {
        if account.is_guest() {
            return Ok(ProfileStepOutcome {
                points_granted: 0,
                completion: 0,
                credit: None,
                badge: None,
            });
        }

        let account_id = account.as_i64();
        sqlite::require_account(self.db.pool(), account_id).await?;

        let inserted = sqlite::insert_profile_step(self.db.pool(), account_id, step.as_str(), now).await?;
        let completed = sqlite::list_profile_steps(self.db.pool(), account_id).await?;
        let completion = (completed.len() * PERCENT_PER_STEP).min(100) as u8;

        let credit = if inserted {
            sqlite::set_profile_completion(self.db.pool(), account_id, completion).await?;
            let points = self.config.rewards.profile_step(step);
            Some(self.ledger.award(account, points, PointSource::ProfileStep).await?)
        } else {
            None
        };

        let badge = if completion >= 100 {
            let award = self.badges.ensure_awarded(account, BadgeType::ProfileComplete).await?;
            award.badge.filter(|_| award.newly_awarded)
        } else {
            None
        };

        Ok(ProfileStepOutcome {
            points_granted: credit.as_ref().map(|c| c.points_granted).unwrap_or(0),
            completion,
            credit,
            badge,
        })
    }

    /// Manual credit, used by admin tooling
    pub async fn credit_points(
        &self,
        account: AccountId,
        amount: i64,
        source: PointSource,
    ) -> Result<CreditOutcome> {
        self.ledger.award(account, amount, source).await
    }

    pub async fn ensure_badge(&self, account: AccountId, badge_type: BadgeType) -> Result<BadgeAward> {
        self.badges.ensure_awarded(account, badge_type).await
    }

    pub async fn badges(&self, account: AccountId) -> Result<Vec<BadgeRecord>> {
        self.badges.list(account).await
    }

    pub async fn pending_badges(&self, account: AccountId) -> Result<Vec<BadgeRecord>> {
        self.badges.take_unnotified(account).await
    }

    pub async fn streak(&self, account: AccountId) -> Result<Option<StreakRecord>> {
        self.streaks.get(account).await
    }

    pub async fn configure_notifications(
        &self,
        account: AccountId,
        enabled: bool,
        time: &str,
    ) -> Result<StreakRecord> {
        self.streaks.configure_notifications(account, enabled, time).await
    }

    pub async fn history(&self, account: AccountId, limit: u32) -> Result<Vec<PointTransaction>> {
        self.ledger.history(account, limit).await
    }
}
