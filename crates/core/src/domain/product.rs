use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProductId(pub String);

/// A full catalog record as surfaced by the storefront collaborator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogProduct {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub regular_price: Decimal,
    pub sale_price: Option<Decimal>,
    pub currency: String,
    pub categories: Vec<String>,
    pub rating: f64,
    pub review_count: u32,
    pub in_stock: bool,
    pub image_url: Option<String>,
    pub permalink: Option<String>,
    pub published: bool,
}

impl CatalogProduct {
    /// Price the shopper actually pays.
    pub fn display_price(&self) -> Decimal {
        self.sale_price.unwrap_or(self.regular_price)
    }

    pub fn on_sale(&self) -> bool {
        self.sale_price.map(|sale| sale < self.regular_price).unwrap_or(false)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    pub category: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub in_stock_only: bool,
    pub on_sale_only: bool,
    pub min_rating: Option<f64>,
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{CatalogProduct, ProductId};

    fn product(regular: i64, sale: Option<i64>) -> CatalogProduct {
        CatalogProduct {
            id: ProductId("p-1".to_string()),
            name: "Trail Runner".to_string(),
            description: "Lightweight running shoe".to_string(),
            regular_price: Decimal::new(regular, 2),
            sale_price: sale.map(|cents| Decimal::new(cents, 2)),
            currency: "USD".to_string(),
            categories: vec!["shoes".to_string()],
            rating: 4.4,
            review_count: 51,
            in_stock: true,
            image_url: None,
            permalink: None,
            published: true,
        }
    }

    #[test]
    fn sale_price_below_regular_marks_on_sale() {
        assert!(product(12_999, Some(9_999)).on_sale());
        assert_eq!(product(12_999, Some(9_999)).display_price(), Decimal::new(9_999, 2));
    }

    #[test]
    fn sale_price_at_or_above_regular_is_not_a_sale() {
        assert!(!product(12_999, Some(12_999)).on_sale());
        assert!(!product(12_999, None).on_sale());
    }
}
