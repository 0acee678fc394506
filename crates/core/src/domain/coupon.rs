use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Percentage,
    Fixed,
}

/// What the pipeline asks the coupon collaborator to issue.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CouponSpec {
    pub discount_type: DiscountType,
    pub amount: Decimal,
    pub validity_days: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IssuedCoupon {
    pub code: String,
    pub discount_type: DiscountType,
    pub amount: Decimal,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Eligibility {
    pub eligible: bool,
    pub max_discount_pct: u8,
}

impl Eligibility {
    pub fn ineligible() -> Self {
        Self { eligible: false, max_discount_pct: 0 }
    }
}
