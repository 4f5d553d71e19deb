//! Badge issuer
//!
//! `ensure_awarded` may be called any number of times, from any request,
//! concurrently. Exactly one call per (account, badge) sees
//! `newly_awarded: true`, and only that call credits the bonus. The flip and
//! the bonus credit commit together. Telling the client about a badge is
//! tracked separately through `notification_sent`.

use chrono::Utc;
use jobquest_core::{AccountId, BadgeAward, BadgeRecord, BadgeType, Result};
use jobquest_persistence::{sqlite, Database};
use tracing::{debug, info};

use crate::ledger::PointLedger;

#[derive(Clone)]
pub struct BadgeIssuer {
    db: Database,
    ledger: PointLedger,
}

impl BadgeIssuer {
    pub fn new(db: Database, ledger: PointLedger) -> Self {
        Self { db, ledger }
    }

    /// Award `badge_type` unless the account already holds it.
    pub async fn ensure_awarded(&self, account: AccountId, badge_type: BadgeType) -> Result<BadgeAward> {
        if account.is_guest() {
            return Ok(BadgeAward {
                already_held: false,
                newly_awarded: false,
                badge: None,
            });
        }

        let account_id = account.as_i64();
        let descriptor = badge_type.descriptor();
        sqlite::require_account(self.db.pool(), account_id).await?;

        sqlite::ensure_badge_row(self.db.pool(), account_id, &descriptor).await?;
        let awarded = sqlite::award_badge(
            self.db.pool(),
            account_id,
            badge_type.as_str(),
            descriptor.bonus,
            Utc::now(),
        )
        .await?;

        let newly_awarded = match awarded {
            Some(total) => {
                info!("Badge '{}' awarded to account {}", descriptor.title, account);
                self.ledger.settle(account, descriptor.bonus, total).await?;
                true
            }
            None => {
                debug!("Badge '{}' already held by {}", descriptor.title, account);
                false
            }
        };

        let badge = sqlite::get_badge(self.db.pool(), account_id, badge_type.as_str()).await?;
        Ok(BadgeAward {
            already_held: !newly_awarded,
            newly_awarded,
            badge,
        })
    }

    /// Create the unobtained placeholder so the badge shows as locked
    pub async fn ensure_placeholder(&self, account: AccountId, badge_type: BadgeType) -> Result<()> {
        if account.is_guest() {
            return Ok(());
        }
        sqlite::require_account(self.db.pool(), account.as_i64()).await?;
        sqlite::ensure_badge_row(self.db.pool(), account.as_i64(), &badge_type.descriptor()).await
    }

    pub async fn list(&self, account: AccountId) -> Result<Vec<BadgeRecord>> {
        if account.is_guest() {
            return Ok(Vec::new());
        }
        sqlite::list_badges(self.db.pool(), account.as_i64()).await
    }

    /// Obtained badges not yet shown to the client, marking them as shown.
    ///
    /// Each badge is returned by exactly one call even if two requests
    /// poll at the same time.
    pub async fn take_unnotified(&self, account: AccountId) -> Result<Vec<BadgeRecord>> {
        if account.is_guest() {
            return Ok(Vec::new());
        }

        let pending = sqlite::list_unnotified_badges(self.db.pool(), account.as_i64()).await?;
        let mut delivered = Vec::with_capacity(pending.len());
        for mut badge in pending {
            if sqlite::mark_badge_notified(self.db.pool(), badge.id).await? {
                badge.notification_sent = true;
                delivered.push(badge);
            }
        }
        Ok(delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobquest_core::NewAccount;

    async fn setup() -> (Database, BadgeIssuer, PointLedger, AccountId) {
        let db = Database::connect_in_memory().await.unwrap();
        let id = sqlite::create_account(
            db.pool(),
            &NewAccount {
                name: "Nora".into(),
                email: "nora@example.com".into(),
                password: "x".into(),
            },
        )
        .await
        .unwrap();
        let ledger = PointLedger::new(db.clone());
        let issuer = BadgeIssuer::new(db.clone(), ledger.clone());
        (db, issuer, ledger, AccountId(id))
    }

    #[tokio::test]
    async fn test_first_award_credits_bonus_once() {
        let (_db, issuer, ledger, account) = setup().await;

        let first = issuer.ensure_awarded(account, BadgeType::ProfileComplete).await.unwrap();
        assert!(first.newly_awarded);
        assert!(!first.already_held);
        let badge = first.badge.unwrap();
        assert!(badge.obtained);
        assert!(badge.obtained_at.is_some());
        assert!(!badge.notification_sent);

        let second = issuer.ensure_awarded(account, BadgeType::ProfileComplete).await.unwrap();
        assert!(!second.newly_awarded);
        assert!(second.already_held);

        assert_eq!(ledger.balance(account).await.unwrap().0, 100);
    }

    #[tokio::test]
    async fn test_concurrent_awards_grant_exactly_once() {
        let (db, issuer, ledger, account) = setup().await;

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let issuer = issuer.clone();
                tokio::spawn(async move {
                    issuer.ensure_awarded(account, BadgeType::FiveDayStreak).await.unwrap()
                })
            })
            .collect();

        let mut newly = 0;
        for handle in handles {
            if handle.await.unwrap().newly_awarded {
                newly += 1;
            }
        }

        assert_eq!(newly, 1);
        assert_eq!(
            sqlite::count_badge_rows(db.pool(), account.as_i64(), "five_day_streak").await.unwrap(),
            1
        );
        assert_eq!(ledger.balance(account).await.unwrap().0, 50);
    }

    #[tokio::test]
    async fn test_placeholder_then_award() {
        let (_db, issuer, _ledger, account) = setup().await;
        issuer.ensure_placeholder(account, BadgeType::FirstApplication).await.unwrap();

        let listed = issuer.list(account).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(!listed[0].obtained);

        let award = issuer.ensure_awarded(account, BadgeType::FirstApplication).await.unwrap();
        assert!(award.newly_awarded);
    }

    #[tokio::test]
    async fn test_notification_is_delivered_once_without_regranting() {
        let (_db, issuer, ledger, account) = setup().await;
        issuer.ensure_awarded(account, BadgeType::FirstApplication).await.unwrap();

        let delivered = issuer.take_unnotified(account).await.unwrap();
        assert_eq!(delivered.len(), 1);
        assert!(delivered[0].notification_sent);
        assert!(issuer.take_unnotified(account).await.unwrap().is_empty());

        let again = issuer.ensure_awarded(account, BadgeType::FirstApplication).await.unwrap();
        assert!(again.already_held);
        assert_eq!(ledger.balance(account).await.unwrap().0, 50);
    }

    #[tokio::test]
    async fn test_guest_gets_nothing_persisted() {
        let (_db, issuer, _ledger, _account) = setup().await;
        let award = issuer.ensure_awarded(AccountId::GUEST, BadgeType::FiveDayStreak).await.unwrap();
        assert!(!award.newly_awarded);
        assert!(award.badge.is_none());
    }

    #[tokio::test]
    async fn test_badge_bonus_is_booked_and_can_level_up() {
        let (_db, issuer, ledger, account) = setup().await;
        ledger.award(account, 150, jobquest_core::PointSource::Manual).await.unwrap();

        let award = issuer.ensure_awarded(account, BadgeType::ProfileComplete).await.unwrap();
        assert!(award.newly_awarded);

        // 150 + 100 badge bonus crosses into Aprendiz, which adds the level bonus
        assert_eq!(ledger.balance(account).await.unwrap(), (275, 2));
        let sources: Vec<_> = ledger
            .history(account, 10)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.source)
            .collect();
        assert_eq!(sources, vec!["level_up", "badge", "manual"]);
    }
}
