use serde::{Deserialize, Serialize};

use super::product::{CatalogProduct, ProductId};

/// Placeholder relevance for product facts. There is no learned similarity
/// ranking; product nodes always outrank category nodes.
pub const PRODUCT_RELEVANCE: f64 = 1.0;
pub const CATEGORY_RELEVANCE: f64 = 0.8;

/// One retrievable fact surfaced to the model as grounding context.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KnowledgeNode {
    Product { id: ProductId, summary: String },
    Category { name: String, summary: String },
}

impl KnowledgeNode {
    pub fn from_product(product: &CatalogProduct) -> Self {
        let stock = if product.in_stock { "in stock" } else { "out of stock" };
        let summary = format!(
            "{} — {}. Price: {} {}. Categories: {}. Rating: {:.1} ({} reviews, {stock}).",
            product.name,
            product.description,
            product.display_price(),
            product.currency,
            product.categories.join(", "),
            product.rating,
            product.review_count,
        );
        Self::Product { id: product.id.clone(), summary }
    }

    pub fn from_category(name: &str) -> Self {
        Self::Category {
            name: name.to_string(),
            summary: format!("{name}: a browsable category of related products in this store."),
        }
    }

    pub fn relevance(&self) -> f64 {
        match self {
            Self::Product { .. } => PRODUCT_RELEVANCE,
            Self::Category { .. } => CATEGORY_RELEVANCE,
        }
    }

    pub fn summary(&self) -> &str {
        match self {
            Self::Product { summary, .. } | Self::Category { summary, .. } => summary,
        }
    }

    pub fn product_id(&self) -> Option<&ProductId> {
        match self {
            Self::Product { id, .. } => Some(id),
            Self::Category { .. } => None,
        }
    }
}
