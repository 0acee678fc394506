//! Deterministic demo dataset for the CLI and integration tests.

use rust_decimal::Decimal;

use shopmate_core::{CatalogProduct, ProductId};

use crate::catalog::InMemoryCatalog;

fn item(
    id: &str,
    name: &str,
    description: &str,
    price_cents: i64,
    sale_cents: Option<i64>,
    categories: &[&str],
    rating: f64,
    review_count: u32,
    in_stock: bool,
) -> CatalogProduct {
    CatalogProduct {
        id: ProductId(id.to_string()),
        name: name.to_string(),
        description: description.to_string(),
        regular_price: Decimal::new(price_cents, 2),
        sale_price: sale_cents.map(|cents| Decimal::new(cents, 2)),
        currency: "USD".to_string(),
        categories: categories.iter().map(|c| (*c).to_string()).collect(),
        rating,
        review_count,
        in_stock,
        image_url: Some(format!("https://cdn.example.test/{id}.jpg")),
        permalink: Some(format!("https://shop.example.test/products/{id}")),
        published: true,
    }
}

/// Ten published products across five categories, two of them out of stock,
/// two on sale. Stable ids so tests can assert on ordering.
pub fn demo_catalog() -> Vec<CatalogProduct> {
    vec![
        item("lap-01", "Aero Laptop 14", "Ultralight 14-inch laptop for travel", 129_900, None, &["laptops", "electronics"], 4.7, 214, true),
        item("lap-02", "Forge Laptop 16", "16-inch creator laptop with discrete GPU", 189_900, Some(169_900), &["laptops", "electronics"], 4.5, 98, true),
        item("lap-03", "Nano Laptop 11", "Compact budget laptop for students", 49_900, None, &["laptops", "electronics"], 4.1, 301, false),
        item("aud-01", "Drift Wireless Headphones", "Over-ear noise cancelling headphones", 29_900, None, &["headphones", "audio"], 4.8, 1_022, true),
        item("aud-02", "Pulse Earbuds", "Sweat-resistant wireless earbuds", 9_900, Some(7_900), &["headphones", "audio"], 4.2, 540, true),
        item("cam-01", "Summit Action Camera", "Waterproof 4K action camera", 39_900, None, &["cameras", "electronics"], 4.4, 187, true),
        item("cam-02", "Studio Mirrorless", "24MP mirrorless camera body", 99_900, None, &["cameras", "electronics"], 4.6, 76, false),
        item("sho-01", "Trail Runner Shoes", "Grippy trail running shoes", 12_900, None, &["shoes", "fitness"], 4.3, 330, true),
        item("sho-02", "Road Racer Shoes", "Lightweight road racing shoes", 15_900, None, &["shoes", "fitness"], 4.0, 122, true),
        item("kit-01", "Brew Kettle", "Gooseneck pour-over kettle", 6_900, None, &["kitchen"], 4.5, 415, true),
    ]
}

pub async fn seed(catalog: &InMemoryCatalog, site_id: &str) -> usize {
    let products = demo_catalog();
    let count = products.len();
    catalog.insert_all(site_id, products).await;
    count
}

#[cfg(test)]
mod tests {
    use crate::catalog::{CatalogStore, InMemoryCatalog};

    use super::{demo_catalog, seed};

    #[test]
    fn dataset_shape_is_stable() {
        let products = demo_catalog();
        assert_eq!(products.len(), 10);
        assert_eq!(products.iter().filter(|p| !p.in_stock).count(), 2);
        assert_eq!(products.iter().filter(|p| p.on_sale()).count(), 2);
        assert!(products.iter().all(|p| p.published));
    }

    #[tokio::test]
    async fn seed_loads_every_product() {
        let catalog = InMemoryCatalog::new();
        let count = seed(&catalog, "demo").await;
        assert_eq!(count as u64, catalog.count_published("demo").await.unwrap());
    }
}
