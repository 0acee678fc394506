//! Deterministic fallback classification used whenever the model-backed
//! classifier fails, times out, or returns something that is not JSON.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::analysis::{Intent, MessageAnalysis};

/// Confidence reported for every fallback classification.
pub const FALLBACK_CONFIDENCE: f64 = 0.3;

const POSITIVE_WORDS: &[&str] = &[
    "great", "good", "love", "excellent", "amazing", "perfect", "awesome", "nice", "helpful",
    "thanks", "thank", "wonderful", "fantastic",
];

const NEGATIVE_WORDS: &[&str] = &[
    "bad", "terrible", "awful", "broken", "hate", "horrible", "disappointed", "useless", "worst",
    "wrong", "problem", "slow", "poor",
];

struct IntentPattern {
    intent: Intent,
    pattern: &'static Lazy<Regex>,
}

static GREETING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(hi|hello|hey|howdy|good (morning|afternoon|evening))\b")
        .expect("greeting pattern")
});

static PRODUCT_INQUIRY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(looking for|do you (have|sell|carry)|show me|recommend|suggest|find me|search)\b")
        .expect("product-inquiry pattern")
});

static PRICE_QUESTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(price|cost|how much|expensive|cheap|afford|budget)\b")
        .expect("price-question pattern")
});

static COMPARISON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(compare|comparison|versus|vs\.?|difference between|which (one|is better))\b")
        .expect("comparison pattern")
});

static PURCHASE_INTENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(buy|purchase|order|checkout|add to cart|take it|i'll take)\b")
        .expect("purchase-intent pattern")
});

static COMPLAINT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(broken|terrible|awful|refund|return|complaint|complain|disappointed|not working|damaged)\b")
        .expect("complaint pattern")
});

static GOODBYE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(bye|goodbye|farewell|see you|that's all|talk later)\b")
        .expect("goodbye pattern")
});

/// Tested in priority order; first match wins.
static INTENT_PATTERNS: &[IntentPattern] = &[
    IntentPattern { intent: Intent::Greeting, pattern: &GREETING },
    IntentPattern { intent: Intent::ProductInquiry, pattern: &PRODUCT_INQUIRY },
    IntentPattern { intent: Intent::PriceQuestion, pattern: &PRICE_QUESTION },
    IntentPattern { intent: Intent::Comparison, pattern: &COMPARISON },
    IntentPattern { intent: Intent::PurchaseIntent, pattern: &PURCHASE_INTENT },
    IntentPattern { intent: Intent::Complaint, pattern: &COMPLAINT },
    IntentPattern { intent: Intent::Goodbye, pattern: &GOODBYE },
];

pub fn fallback_intent(message: &str) -> Intent {
    INTENT_PATTERNS
        .iter()
        .find(|entry| entry.pattern.is_match(message))
        .map(|entry| entry.intent)
        .unwrap_or(Intent::Unknown)
}

/// Lexicon sentiment: +1 per positive token, -1 per negative token,
/// normalized by `10 * counter / token_count` and clamped to [-1, 1].
pub fn lexicon_sentiment(message: &str) -> f64 {
    let tokens: Vec<String> = message
        .split_whitespace()
        .map(|token| {
            token
                .trim_matches(|c: char| !c.is_ascii_alphanumeric())
                .to_ascii_lowercase()
        })
        .filter(|token| !token.is_empty())
        .collect();

    if tokens.is_empty() {
        return 0.0;
    }

    let mut counter = 0i64;
    for token in &tokens {
        if POSITIVE_WORDS.contains(&token.as_str()) {
            counter += 1;
        } else if NEGATIVE_WORDS.contains(&token.as_str()) {
            counter -= 1;
        }
    }

    let score = 10.0 * counter as f64 / tokens.len() as f64;
    score.clamp(-1.0, 1.0)
}

pub fn fallback_analysis(message: &str) -> MessageAnalysis {
    MessageAnalysis {
        intent: fallback_intent(message),
        sentiment: lexicon_sentiment(message),
        confidence: FALLBACK_CONFIDENCE,
        ..MessageAnalysis::default()
    }
}
