use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Greeting,
    ProductInquiry,
    PriceQuestion,
    Comparison,
    PurchaseIntent,
    Complaint,
    Goodbye,
    #[default]
    #[serde(other)]
    Unknown,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::ProductInquiry => "product_inquiry",
            Self::PriceQuestion => "price_question",
            Self::Comparison => "comparison",
            Self::PurchaseIntent => "purchase_intent",
            Self::Complaint => "complaint",
            Self::Goodbye => "goodbye",
            Self::Unknown => "unknown",
        }
    }

    /// Intents that justify attaching merchandise to the reply on their own.
    pub fn is_product_seeking(&self) -> bool {
        matches!(self, Self::ProductInquiry | Self::Comparison | Self::PurchaseIntent)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    High,
    #[default]
    #[serde(other)]
    Medium,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseReadiness {
    Considering,
    ReadyToBuy,
    #[default]
    #[serde(other)]
    Researching,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedEntities {
    #[serde(default)]
    pub products: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default, alias = "priceMentions")]
    pub price_mentions: Vec<String>,
}

/// One turn's classification result.
///
/// The model may emit fields beyond the known schema; those survive in
/// `extra` untouched rather than being dropped on parse.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageAnalysis {
    #[serde(default)]
    pub intent: Intent,
    #[serde(default)]
    pub sentiment: f64,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub entities: ExtractedEntities,
    #[serde(default)]
    pub urgency: Urgency,
    #[serde(default, alias = "purchaseReadiness")]
    pub purchase_readiness: PurchaseReadiness,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for MessageAnalysis {
    fn default() -> Self {
        Self {
            intent: Intent::default(),
            sentiment: 0.0,
            confidence: default_confidence(),
            entities: ExtractedEntities::default(),
            urgency: Urgency::default(),
            purchase_readiness: PurchaseReadiness::default(),
            extra: Map::new(),
        }
    }
}

fn default_confidence() -> f64 {
    0.5
}
