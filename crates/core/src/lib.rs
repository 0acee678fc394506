pub mod classify;
pub mod config;
pub mod domain;
pub mod errors;
pub mod query;
pub mod ranking;

pub use classify::{fallback_analysis, fallback_intent, lexicon_sentiment};
pub use config::{AppConfig, ConfigError, LoadOptions, LogFormat};
pub use domain::analysis::{
    ExtractedEntities, Intent, MessageAnalysis, PurchaseReadiness, Urgency,
};
pub use domain::context::{
    ChatMessage, ChatRole, ConversationContext, PriceRange, ProductPreferences,
};
pub use domain::coupon::{CouponSpec, DiscountType, Eligibility, IssuedCoupon};
pub use domain::knowledge::KnowledgeNode;
pub use domain::product::{CatalogProduct, ProductId, SearchFilters};
pub use domain::response::{
    Badge, DispatchedAction, EnhancedResponse, ProductCard, ResponseMeta, TokenUsage,
};
pub use errors::PipelineError;
pub use query::QueryShape;
