use once_cell::sync::Lazy;
use regex::Regex;

/// Product nouns shared by the query predicates. Kept as one alternation so
/// the inventory/show-all patterns agree on what counts as merchandise.
const PRODUCT_NOUNS: &str = "products?|items?|laptops?|phones?|tablets?|headphones|cameras?|monitors?|keyboards?|speakers?|shoes|jackets?|watches|goods|stock|things";

/// Brand/model tokens that mark a query as asking for one specific product.
const BRAND_TOKENS: &str = "iphone|galaxy|pixel|macbook|thinkpad|surface|airpods|kindle|playstation|xbox|nintendo|dyson|roomba|gopro|fitbit";

/// Shape of the raw query string, decided by an ordered predicate table.
/// Earlier rows win, so a counting question stays `InventoryCount` even when
/// it also names merchandise.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QueryShape {
    /// "how many laptops do you have": wants a number, not a list.
    InventoryCount,
    /// "show me all products" / "what's in your catalog".
    ShowAll,
    /// Names a known brand or model token.
    SpecificProduct,
    /// Explicit ask to show/recommend/find merchandise.
    ProductSearch,
    /// Everything else: small talk, complaints, open questions.
    General,
}

struct QueryPredicate {
    shape: QueryShape,
    pattern: &'static Lazy<Regex>,
}

static INVENTORY_COUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b(how many|total( number)?|count of|number of)\b.*\b(?:{PRODUCT_NOUNS})\b"
    ))
    .expect("inventory-count pattern")
});

static SHOW_ALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b(all|every|everything|entire|whole|full|inventory|catalog(ue)?)\b.*\b(?:{PRODUCT_NOUNS})\b|\b(?:{PRODUCT_NOUNS})\b.*\b(inventory|catalog(ue)?)\b|\b(show|list|see|view|browse)\b.*\b(inventory|catalog(ue)?|everything)\b"
    ))
    .expect("show-all pattern")
});

static SPECIFIC_PRODUCT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\b(?:{BRAND_TOKENS})\b")).expect("specific-product pattern")
});

static PRODUCT_SEARCH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b(show|recommend|suggest|find|looking for|search|browse|do you (have|sell)|need|want)\b.*\b(?:{PRODUCT_NOUNS})\b"
    ))
    .expect("product-search pattern")
});

static QUERY_PREDICATES: &[QueryPredicate] = &[
    QueryPredicate { shape: QueryShape::InventoryCount, pattern: &INVENTORY_COUNT },
    QueryPredicate { shape: QueryShape::ShowAll, pattern: &SHOW_ALL },
    QueryPredicate { shape: QueryShape::SpecificProduct, pattern: &SPECIFIC_PRODUCT },
    QueryPredicate { shape: QueryShape::ProductSearch, pattern: &PRODUCT_SEARCH },
];

impl QueryShape {
    pub fn classify(query: &str) -> Self {
        QUERY_PREDICATES
            .iter()
            .find(|predicate| predicate.pattern.is_match(query))
            .map(|predicate| predicate.shape)
            .unwrap_or(Self::General)
    }

    /// Inline-preview cap for the reply's product list. Show-all gets a
    /// larger grid, a specific model gets a tight shortlist, everything else
    /// a middle ground.
    pub fn product_cap(&self) -> usize {
        match self {
            Self::ShowAll => 12,
            Self::SpecificProduct => 3,
            _ => 6,
        }
    }

    /// Whether the query alone justifies attaching products.
    pub fn requests_products(&self) -> bool {
        matches!(self, Self::ShowAll | Self::SpecificProduct | Self::ProductSearch)
    }
}
