use serde::{Deserialize, Serialize};

use super::analysis::Intent;
use super::coupon::IssuedCoupon;
use super::product::ProductId;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn accumulate(&mut self, other: TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// An action the model asked for during generation, in detection order.
/// Every variant carries a non-empty payload; action execution drops calls
/// that resolved to nothing rather than emitting hollow entries.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DispatchedAction {
    ShowProducts { product_ids: Vec<ProductId> },
    GenerateCoupon { coupon: IssuedCoupon },
    TransferHuman { reason: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Badge {
    Sale,
    OutOfStock,
}

impl Badge {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Sale => "Sale",
            Self::OutOfStock => "Out of Stock",
        }
    }
}

/// Display-ready product summary attached to a reply.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductCard {
    pub id: ProductId,
    pub name: String,
    pub price_markup: String,
    pub rating_markup: String,
    pub badge: Option<Badge>,
    pub on_sale: bool,
    pub in_stock: bool,
    pub image_url: Option<String>,
    pub permalink: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseMeta {
    pub model: String,
    pub token_usage: TokenUsage,
    pub cached: bool,
    pub fallback: bool,
    /// Diagnostic detail for fallback replies; never user-facing text.
    pub error: Option<String>,
}

/// The pipeline's sole output: exactly one per inbound request. Partial
/// failures degrade fields (an empty product list, no coupon) but the
/// message text is always present.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnhancedResponse {
    pub message: String,
    pub intent: Intent,
    pub confidence: f64,
    pub sentiment: f64,
    pub actions: Vec<DispatchedAction>,
    pub products: Vec<ProductCard>,
    /// Total published-product count, only for inventory-count queries.
    pub product_total: Option<u64>,
    pub coupons: Vec<IssuedCoupon>,
    pub should_end_conversation: bool,
    pub meta: ResponseMeta,
}

impl EnhancedResponse {
    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            intent: Intent::Unknown,
            confidence: 0.5,
            sentiment: 0.0,
            actions: Vec::new(),
            products: Vec::new(),
            product_total: None,
            coupons: Vec::new(),
            should_end_conversation: false,
            meta: ResponseMeta::default(),
        }
    }
}
