use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use shopmate_core::{CatalogProduct, ProductId, SearchFilters};

use crate::StoreError;

/// Catalog access as the pipeline needs it. Search is keyword-based; there
/// is no similarity ranking at this boundary.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn search(
        &self,
        site_id: &str,
        query: &str,
        filters: &SearchFilters,
    ) -> Result<Vec<CatalogProduct>, StoreError>;

    async fn find_by_id(
        &self,
        site_id: &str,
        id: &ProductId,
    ) -> Result<Option<CatalogProduct>, StoreError>;

    /// Every published product for the site, optionally including items that
    /// are out of stock.
    async fn all_published(
        &self,
        site_id: &str,
        include_out_of_stock: bool,
    ) -> Result<Vec<CatalogProduct>, StoreError>;

    async fn in_category(
        &self,
        site_id: &str,
        category: &str,
    ) -> Result<Vec<CatalogProduct>, StoreError>;

    async fn count_published(&self, site_id: &str) -> Result<u64, StoreError>;
}

#[derive(Default)]
pub struct InMemoryCatalog {
    products: RwLock<HashMap<String, Vec<CatalogProduct>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, site_id: &str, product: CatalogProduct) {
        self.products.write().await.entry(site_id.to_string()).or_default().push(product);
    }

    pub async fn insert_all(&self, site_id: &str, products: Vec<CatalogProduct>) {
        self.products.write().await.entry(site_id.to_string()).or_default().extend(products);
    }

    async fn site_products(&self, site_id: &str) -> Vec<CatalogProduct> {
        self.products.read().await.get(site_id).cloned().unwrap_or_default()
    }
}

fn matches_keywords(product: &CatalogProduct, query: &str) -> bool {
    let haystack = format!(
        "{} {} {}",
        product.name.to_lowercase(),
        product.description.to_lowercase(),
        product.categories.join(" ").to_lowercase()
    );

    query
        .to_lowercase()
        .split_whitespace()
        .filter(|token| token.len() > 2)
        .any(|token| haystack.contains(token.trim_end_matches('s')))
}

fn passes_filters(product: &CatalogProduct, filters: &SearchFilters) -> bool {
    if let Some(category) = &filters.category {
        let wanted = category.to_lowercase();
        if !product.categories.iter().any(|c| c.to_lowercase() == wanted) {
            return false;
        }
    }
    if let Some(min) = filters.min_price {
        if product.display_price() < min {
            return false;
        }
    }
    if let Some(max) = filters.max_price {
        if product.display_price() > max {
            return false;
        }
    }
    if filters.in_stock_only && !product.in_stock {
        return false;
    }
    if filters.on_sale_only && !product.on_sale() {
        return false;
    }
    if let Some(min_rating) = filters.min_rating {
        if product.rating < min_rating {
            return false;
        }
    }
    true
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn search(
        &self,
        site_id: &str,
        query: &str,
        filters: &SearchFilters,
    ) -> Result<Vec<CatalogProduct>, StoreError> {
        Ok(self
            .site_products(site_id)
            .await
            .into_iter()
            .filter(|product| product.published)
            .filter(|product| matches_keywords(product, query))
            .filter(|product| passes_filters(product, filters))
            .collect())
    }

    async fn find_by_id(
        &self,
        site_id: &str,
        id: &ProductId,
    ) -> Result<Option<CatalogProduct>, StoreError> {
        Ok(self.site_products(site_id).await.into_iter().find(|product| &product.id == id))
    }

    async fn all_published(
        &self,
        site_id: &str,
        include_out_of_stock: bool,
    ) -> Result<Vec<CatalogProduct>, StoreError> {
        Ok(self
            .site_products(site_id)
            .await
            .into_iter()
            .filter(|product| product.published)
            .filter(|product| include_out_of_stock || product.in_stock)
            .collect())
    }

    async fn in_category(
        &self,
        site_id: &str,
        category: &str,
    ) -> Result<Vec<CatalogProduct>, StoreError> {
        let wanted = category.to_lowercase();
        Ok(self
            .site_products(site_id)
            .await
            .into_iter()
            .filter(|product| product.published)
            .filter(|product| product.categories.iter().any(|c| c.to_lowercase() == wanted))
            .collect())
    }

    async fn count_published(&self, site_id: &str) -> Result<u64, StoreError> {
        Ok(self
            .site_products(site_id)
            .await
            .iter()
            .filter(|product| product.published)
            .count() as u64)
    }
}
