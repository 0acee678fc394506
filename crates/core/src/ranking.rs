//! Product ranking and display formatting applied after generation.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::domain::product::CatalogProduct;
use crate::domain::response::{Badge, ProductCard};

/// Deduplicates by product id (first occurrence wins) and sorts by the
/// strict cascade: in-stock first, then higher rating, then more reviews.
/// Deterministic and idempotent for a fixed input set.
pub fn rank_products(products: Vec<CatalogProduct>) -> Vec<CatalogProduct> {
    let mut seen = BTreeSet::new();
    let mut deduped: Vec<CatalogProduct> =
        products.into_iter().filter(|product| seen.insert(product.id.clone())).collect();

    deduped.sort_by(compare_products);
    deduped
}

fn compare_products(a: &CatalogProduct, b: &CatalogProduct) -> Ordering {
    b.in_stock
        .cmp(&a.in_stock)
        .then_with(|| b.rating.partial_cmp(&a.rating).unwrap_or(Ordering::Equal))
        .then_with(|| b.review_count.cmp(&a.review_count))
}

/// Price string reflecting sale vs. regular pricing, ready for the chat
/// widget to render.
pub fn price_markup(product: &CatalogProduct) -> String {
    if product.on_sale() {
        format!(
            "<del>{} {}</del> <ins>{} {}</ins>",
            product.regular_price,
            product.currency,
            product.display_price(),
            product.currency
        )
    } else {
        format!("{} {}", product.regular_price, product.currency)
    }
}

/// Five-slot star markup: full stars for the floor of the rating, a half
/// indicator when the fractional part reaches 0.5, empty stars after.
pub fn rating_markup(rating: f64) -> String {
    let clamped = rating.clamp(0.0, 5.0);
    let full = clamped.floor() as usize;
    let half = clamped - clamped.floor() >= 0.5;

    let mut stars = "★".repeat(full);
    if half {
        stars.push('½');
    }
    while stars.chars().count() < 5 {
        stars.push('☆');
    }
    stars
}

pub fn badge(product: &CatalogProduct) -> Option<Badge> {
    if !product.in_stock {
        Some(Badge::OutOfStock)
    } else if product.on_sale() {
        Some(Badge::Sale)
    } else {
        None
    }
}

pub fn to_card(product: &CatalogProduct) -> ProductCard {
    ProductCard {
        id: product.id.clone(),
        name: product.name.clone(),
        price_markup: price_markup(product),
        rating_markup: rating_markup(product.rating),
        badge: badge(product),
        on_sale: product.on_sale(),
        in_stock: product.in_stock,
        image_url: product.image_url.clone(),
        permalink: product.permalink.clone(),
    }
}
