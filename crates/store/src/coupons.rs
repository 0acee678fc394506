use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use shopmate_core::{CouponSpec, Eligibility, IssuedCoupon};

use crate::StoreError;

/// Coupon issuance collaborator. Eligibility and issuance are separate so
/// the pipeline can decline to issue even when the shopper qualifies.
#[async_trait]
pub trait CouponIssuer: Send + Sync {
    async fn check_eligibility(
        &self,
        session_id: &str,
        site_id: &str,
        user_id: Option<&str>,
    ) -> Result<Eligibility, StoreError>;

    /// Returns `None` when the collaborator declines (already issued for the
    /// session, campaign exhausted, ...).
    async fn issue(
        &self,
        session_id: &str,
        site_id: &str,
        spec: CouponSpec,
    ) -> Result<Option<IssuedCoupon>, StoreError>;
}

/// One-coupon-per-session issuer with a configurable ceiling.
pub struct InMemoryCouponIssuer {
    eligibility: Eligibility,
    issued: RwLock<Vec<(String, IssuedCoupon)>>,
}

impl InMemoryCouponIssuer {
    pub fn new(eligible: bool, max_discount_pct: u8) -> Self {
        Self {
            eligibility: Eligibility { eligible, max_discount_pct },
            issued: RwLock::new(Vec::new()),
        }
    }

    pub async fn issued_count(&self) -> usize {
        self.issued.read().await.len()
    }
}

impl Default for InMemoryCouponIssuer {
    fn default() -> Self {
        Self::new(true, 15)
    }
}

#[async_trait]
impl CouponIssuer for InMemoryCouponIssuer {
    async fn check_eligibility(
        &self,
        _session_id: &str,
        _site_id: &str,
        _user_id: Option<&str>,
    ) -> Result<Eligibility, StoreError> {
        Ok(self.eligibility)
    }

    async fn issue(
        &self,
        session_id: &str,
        _site_id: &str,
        spec: CouponSpec,
    ) -> Result<Option<IssuedCoupon>, StoreError> {
        if !self.eligibility.eligible {
            return Ok(None);
        }

        let mut issued = self.issued.write().await;
        if issued.iter().any(|(session, _)| session == session_id) {
            return Ok(None);
        }

        let token = Uuid::new_v4().simple().to_string();
        let code = format!("CHAT-{}", token[..8].to_uppercase());
        let coupon = IssuedCoupon {
            code,
            discount_type: spec.discount_type,
            amount: spec.amount,
            expires_at: Utc::now() + Duration::days(i64::from(spec.validity_days)),
        };
        issued.push((session_id.to_string(), coupon.clone()));
        Ok(Some(coupon))
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use shopmate_core::{CouponSpec, DiscountType};

    use super::{CouponIssuer, InMemoryCouponIssuer};

    fn spec() -> CouponSpec {
        CouponSpec {
            discount_type: DiscountType::Percentage,
            amount: Decimal::new(10, 0),
            validity_days: 7,
        }
    }

    #[tokio::test]
    async fn issues_once_per_session() {
        let issuer = InMemoryCouponIssuer::default();
        let first = issuer.issue("sess", "site", spec()).await.unwrap();
        assert!(first.is_some());

        let second = issuer.issue("sess", "site", spec()).await.unwrap();
        assert!(second.is_none());
        assert_eq!(issuer.issued_count().await, 1);
    }

    #[tokio::test]
    async fn ineligible_issuer_declines() {
        let issuer = InMemoryCouponIssuer::new(false, 0);
        let eligibility = issuer.check_eligibility("sess", "site", None).await.unwrap();
        assert!(!eligibility.eligible);
        assert!(issuer.issue("sess", "site", spec()).await.unwrap().is_none());
    }
}
