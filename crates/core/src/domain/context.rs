use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::analysis::Intent;

/// Fixed vocabulary scanned over user-authored messages to derive interest
/// tags. A case-insensitive substring match activates the tag; tags are never
/// removed within the scanned window.
pub const INTEREST_VOCABULARY: &[&str] = &[
    "laptop",
    "phone",
    "tablet",
    "headphones",
    "camera",
    "gaming",
    "monitor",
    "keyboard",
    "speaker",
    "wireless",
    "shoes",
    "clothing",
    "jacket",
    "fitness",
    "outdoor",
    "kitchen",
    "furniture",
    "beauty",
    "budget",
    "premium",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: ChatRole::User, text: text.into(), timestamp: Utc::now() }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, text: text.into(), timestamp: Utc::now() }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: Decimal,
    pub max: Decimal,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductPreferences {
    pub categories: Vec<String>,
    pub price_range: Option<PriceRange>,
    pub features: Vec<String>,
}

/// Per-session conversational state, rebuilt every turn from the cache plus
/// the incoming request's message history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationContext {
    pub session_id: String,
    pub user_id: Option<String>,
    pub site_id: String,
    pub previous_messages: Vec<ChatMessage>,
    pub user_interests: BTreeSet<String>,
    pub product_preferences: ProductPreferences,
    pub sentiment_history: Vec<f64>,
    pub current_intent: Option<Intent>,
}

impl ConversationContext {
    pub fn new(session_id: impl Into<String>, site_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            user_id: None,
            site_id: site_id.into(),
            previous_messages: Vec::new(),
            user_interests: BTreeSet::new(),
            product_preferences: ProductPreferences::default(),
            sentiment_history: Vec::new(),
            current_intent: None,
        }
    }

    /// Recomputes interest tags and the preferred price range from the
    /// current message window. Existing interests stay activated; the price
    /// range only moves when a single message names two or more amounts.
    pub fn refresh_derived_state(&mut self) {
        for tag in scan_interests(&self.previous_messages) {
            self.user_interests.insert(tag);
        }
        if let Some(range) = extract_price_range(&self.previous_messages) {
            self.product_preferences.price_range = Some(range);
        }
    }
}

pub fn scan_interests(messages: &[ChatMessage]) -> BTreeSet<String> {
    let mut interests = BTreeSet::new();
    for message in messages.iter().filter(|m| m.role == ChatRole::User) {
        let lowered = message.text.to_lowercase();
        for keyword in INTEREST_VOCABULARY {
            if lowered.contains(keyword) {
                interests.insert((*keyword).to_string());
            }
        }
    }
    interests
}

static MONEY_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[$€£]?\s?(\d{1,3}(?:,\d{3})*(?:\.\d{1,2})?|\d+(?:\.\d{1,2})?)").expect("money token pattern"));

/// Scans user messages in order for numeric/currency tokens. A message with
/// two or more distinct amounts sets the range to {min, max} of that message,
/// overwriting any earlier value. Messages with fewer than two amounts leave
/// the previous range in place.
pub fn extract_price_range(messages: &[ChatMessage]) -> Option<PriceRange> {
    let mut range = None;

    for message in messages.iter().filter(|m| m.role == ChatRole::User) {
        let mut amounts: Vec<Decimal> = MONEY_TOKEN
            .captures_iter(&message.text)
            .filter_map(|caps| caps.get(1))
            .filter_map(|m| m.as_str().replace(',', "").parse::<Decimal>().ok())
            .collect();
        amounts.sort();
        amounts.dedup();

        if amounts.len() >= 2 {
            range = Some(PriceRange {
                min: amounts[0],
                max: *amounts.last().expect("non-empty amounts"),
            });
        }
    }

    range
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{extract_price_range, scan_interests, ChatMessage, ConversationContext};

    #[test]
    fn interests_match_case_insensitively_across_user_messages() {
        let messages = vec![
            ChatMessage::user("Looking for a GAMING laptop"),
            ChatMessage::assistant("We have several gaming laptops and cameras."),
            ChatMessage::user("also need wireless headphones"),
        ];

        let interests = scan_interests(&messages);
        assert!(interests.contains("gaming"));
        assert!(interests.contains("laptop"));
        assert!(interests.contains("wireless"));
        assert!(interests.contains("headphones"));
        // assistant text never activates tags
        assert!(!interests.contains("camera"));
    }

    #[test]
    fn two_amounts_in_one_message_set_the_range() {
        let messages = vec![ChatMessage::user("something between $500 and $1,000 please")];
        let range = extract_price_range(&messages).expect("range");
        assert_eq!(range.min, Decimal::new(500, 0));
        assert_eq!(range.max, Decimal::new(1000, 0));
    }

    #[test]
    fn sparse_later_messages_leave_the_range_untouched() {
        let messages = vec![
            ChatMessage::user("budget is 500 to 1000"),
            ChatMessage::user("maybe something cheaper, like 300"),
        ];
        let range = extract_price_range(&messages).expect("range");
        assert_eq!(range.min, Decimal::new(500, 0));
        assert_eq!(range.max, Decimal::new(1000, 0));
    }

    #[test]
    fn later_pair_overwrites_earlier_pair() {
        let messages = vec![
            ChatMessage::user("budget 500 to 1000"),
            ChatMessage::user("actually make it 200 to 400"),
        ];
        let range = extract_price_range(&messages).expect("range");
        assert_eq!(range.min, Decimal::new(200, 0));
        assert_eq!(range.max, Decimal::new(400, 0));
    }

    #[test]
    fn refresh_accumulates_interests_without_removal() {
        let mut context = ConversationContext::new("s-1", "site-1");
        context.previous_messages = vec![ChatMessage::user("need a laptop")];
        context.refresh_derived_state();
        assert!(context.user_interests.contains("laptop"));

        context.previous_messages = vec![ChatMessage::user("what about cameras")];
        context.refresh_derived_state();
        assert!(context.user_interests.contains("laptop"));
        assert!(context.user_interests.contains("camera"));
    }
}
